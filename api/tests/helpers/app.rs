use axum::{body::Body, http::Request, response::Response};
use chrono::NaiveTime;
use db::models::{class, enrollment, fingerprint, iot_device, room, room_activator, student, user};
use db::test_utils::setup_test_db;
use std::convert::Infallible;
use tower::ServiceExt;
use tower::util::BoxCloneService;
use util::{state::AppState, ws::WebSocketManager};

pub type TestService = BoxCloneService<Request<Body>, Response, Infallible>;

pub const KIOSK: &str = "kiosk-lab1";
pub const ADA_SLOT: i32 = 1;
pub const ACTIVATOR_SLOT: i32 = 90;

/// Full application over a fresh in-memory database.
pub async fn make_test_app() -> (TestService, AppState) {
    let db = setup_test_db().await;
    let state = AppState::new(db, WebSocketManager::new());
    let router = api::app(state.clone());
    (router.into_service().boxed_clone(), state)
}

pub struct Seed {
    pub lecturer: user::Model,
    pub admin: user::Model,
    pub facilities: user::Model,
    pub room: room::Model,
    /// No timetable, so every check-in grades as present whatever the wall clock says.
    pub open_lab: class::Model,
    pub timed: class::Model,
    pub ada: student::Model,
}

pub async fn seed(state: &AppState) -> Seed {
    let db = state.db();
    let lecturer = user::Model::create(db, "lect", "Dr Lect", "lect@test.com", false, false)
        .await
        .unwrap();
    let admin = user::Model::create(db, "admin", "Admin", "admin@test.com", true, false)
        .await
        .unwrap();
    let facilities = user::Model::create(db, "fac", "Facilities", "fac@test.com", false, true)
        .await
        .unwrap();

    let room = room::Model::create(db, "Lab 1").await.unwrap();
    let open_lab = class::Model::create(db, "Open Lab", lecturer.id, Some(room.id), None, None)
        .await
        .unwrap();
    let timed = class::Model::create(
        db,
        "COS301",
        lecturer.id,
        Some(room.id),
        NaiveTime::from_hms_opt(8, 0, 0),
        NaiveTime::from_hms_opt(10, 0, 0),
    )
    .await
    .unwrap();

    let ada = student::Model::create(db, "u001", "Ada Lovelace", None, "ada@test.com")
        .await
        .unwrap();
    enrollment::Model::enroll(db, ada.id, open_lab.id).await.unwrap();
    fingerprint::Model::register(db, KIOSK, ADA_SLOT, ada.id)
        .await
        .unwrap();

    room_activator::Model::bind(db, facilities.id, room.id, KIOSK, ACTIVATOR_SLOT)
        .await
        .unwrap();
    iot_device::Model::create(db, room.id, "Lights", "plug-lights", "switch_1")
        .await
        .unwrap();

    Seed {
        lecturer,
        admin,
        facilities,
        room,
        open_lab,
        timed,
        ada,
    }
}
