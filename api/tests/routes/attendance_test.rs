use crate::helpers::app::TestService;
use crate::helpers::{
    ACTIVATOR_SLOT, ADA_SLOT, KIOSK, get, make_test_app, post_json, seed, send,
};
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use db::models::attendance_session::{AttendanceStatus, EntryMethod, Model as Session, NewSession};
use db::models::{room, student};
use serde_json::{Value, json};
use serial_test::serial;
use services::AttendanceEngine;
use services::collaborators::{
    CollaboratorError, DbNotificationSink, DbOccupancyCounter, DeviceActuator,
};
use services::correction::CorrectionManager;
use services::ledger::SessionLedger;
use services::side_effects::SideEffectDispatcher;
use std::sync::Arc;
use tower::ServiceExt;

const EVENTS: &str = "/api/attendance/events";

fn scan(kind: &str, class_id: i64, slot: i32) -> Value {
    json!({
        "attendance_type": kind,
        "class_id": class_id,
        "fingerprint_slot_id": slot,
        "device_id": KIOSK,
        "timestamp": "1999-01-01T00:00:00Z"
    })
}

async fn post_scan(app: TestService, kind: &str, class_id: i64, slot: i32) -> (StatusCode, Value) {
    send(app, post_json(EVENTS, &scan(kind, class_id, slot))).await
}

async fn session_started(
    db: &sea_orm::DatabaseConnection,
    student_id: i64,
    class_id: i64,
    ago: Duration,
) -> Session {
    let at = Utc::now() - ago;
    Session::insert_live(
        db,
        NewSession {
            student_id,
            class_id,
            session_day: at.date_naive(),
            check_in_at: at,
            check_out_at: None,
            status: AttendanceStatus::Present,
            entry_method: EntryMethod::Biometric,
            corrects_session_id: None,
            created_by: None,
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
#[serial]
async fn fingerprint_time_in_then_time_out() {
    let (app, state) = make_test_app().await;
    let s = seed(&state).await;

    let (status, json) = post_scan(app.clone(), "Time In", s.open_lab.id, ADA_SLOT).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["action"], "time_in");
    assert_eq!(json["data"]["status"], "present");
    assert_eq!(json["data"]["student_name"], "Ada Lovelace");

    let r = room::Model::get_by_id(state.db(), s.room.id).await.unwrap().unwrap();
    assert_eq!(r.occupancy, 1);

    let (status, json) = post_scan(app, "Time Out", s.open_lab.id, ADA_SLOT).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["action"], "time_out");
}

#[tokio::test]
#[serial]
async fn duplicate_time_in_is_conflict() {
    let (app, state) = make_test_app().await;
    let s = seed(&state).await;

    post_scan(app.clone(), "Time In", s.open_lab.id, ADA_SLOT).await;
    let (status, json) = post_scan(app, "Time In", s.open_lab.id, ADA_SLOT).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);
    assert_eq!(json["data"]["code"], "duplicate_check_in");
    assert_eq!(json["data"]["duplicate"], true);
    assert_eq!(json["data"]["student_name"], "Ada Lovelace");
}

#[tokio::test]
#[serial]
async fn time_out_without_session_is_out_of_sequence() {
    let (app, state) = make_test_app().await;
    let s = seed(&state).await;

    let (status, json) = post_scan(app, "Time Out", s.open_lab.id, ADA_SLOT).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["data"]["code"], "no_open_session");
    assert_eq!(json["data"]["duplicate"], true);
}

#[tokio::test]
#[serial]
async fn unknown_fingerprint_is_not_found() {
    let (app, state) = make_test_app().await;
    let s = seed(&state).await;

    let (status, json) = post_scan(app, "Time In", s.open_lab.id, 55).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["data"]["code"], "identity_not_found");
}

#[tokio::test]
#[serial]
async fn locked_and_unenrolled_students_are_forbidden() {
    let (app, state) = make_test_app().await;
    let s = seed(&state).await;

    let (status, json) = post_scan(app.clone(), "Time In", s.timed.id, ADA_SLOT).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["data"]["code"], "not_enrolled");

    student::Model::set_fingerprint_locked(state.db(), s.ada.id, true)
        .await
        .unwrap();
    let (status, json) = post_scan(app, "Time In", s.open_lab.id, ADA_SLOT).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["data"]["code"], "fingerprint_locked");
}

#[tokio::test]
#[serial]
async fn unknown_attendance_type_is_bad_request() {
    let (app, state) = make_test_app().await;
    let s = seed(&state).await;

    let (status, json) = post_scan(app, "Coffee", s.open_lab.id, ADA_SLOT).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["data"]["code"], "invalid_request");
}

#[tokio::test]
#[serial]
async fn activator_scan_toggles_room() {
    let (app, state) = make_test_app().await;
    let s = seed(&state).await;

    let (status, json) = post_scan(app, "Room Control", s.open_lab.id, ACTIVATOR_SLOT).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["action"], "activator_trigger");
    assert_eq!(json["data"]["student_name"], s.facilities.full_name);
    assert_eq!(json["data"]["room"]["turned_on"], true);
    assert_eq!(json["data"]["room"]["switched"], 1);
}

#[tokio::test]
#[serial]
async fn name_based_scan_records_manual_entry() {
    let (app, state) = make_test_app().await;
    let s = seed(&state).await;

    let body = json!({
        "attendance_type": "Time In",
        "class_id": s.open_lab.id,
        "instructor_id": s.lecturer.id,
        "student_name": "ada lovelace",
        "actor_id": s.lecturer.id
    });
    let (status, json) = send(app, post_json(EVENTS, &body)).await;
    assert_eq!(status, StatusCode::OK);

    let id = json["data"]["session_id"].as_i64().unwrap();
    let session = Session::get_by_id(state.db(), id).await.unwrap().unwrap();
    assert_eq!(session.entry_method, EntryMethod::ManualOverride);
    assert_eq!(session.created_by, Some(s.lecturer.id));
}

#[tokio::test]
#[serial]
async fn correction_window_is_enforced() {
    let (app, state) = make_test_app().await;
    let s = seed(&state).await;

    let fresh = session_started(state.db(), s.ada.id, s.open_lab.id, Duration::minutes(1)).await;
    let body = json!({
        "attendance_type": "Time Out",
        "is_correction": true,
        "corrects_log_id": fresh.id
    });
    let (status, json) = send(app.clone(), post_json(EVENTS, &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["action"], "correction");
    assert_ne!(json["data"]["session_id"], fresh.id);

    let stale = session_started(state.db(), s.ada.id, s.timed.id, Duration::minutes(10)).await;
    let body = json!({
        "attendance_type": "Time In",
        "is_correction": true,
        "corrects_log_id": stale.id
    });
    let (status, json) = send(app, post_json(EVENTS, &body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["data"]["code"], "correction_window_expired");
}

#[tokio::test]
#[serial]
async fn notes_on_frozen_sessions_need_an_admin() {
    let (app, state) = make_test_app().await;
    let s = seed(&state).await;

    let recent = session_started(state.db(), s.ada.id, s.open_lab.id, Duration::hours(1)).await;
    let uri = format!("/api/attendance/sessions/{}/note", recent.id);
    let (status, json) = send(
        app.clone(),
        post_json(
            &uri,
            &json!({ "note": "arrived with a doctor's note", "actor_id": s.lecturer.id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["admin_note"], "arrived with a doctor's note");
    assert_eq!(json["data"]["note_by"], s.lecturer.id);

    let old = session_started(state.db(), s.ada.id, s.timed.id, Duration::days(3)).await;
    let uri = format!("/api/attendance/sessions/{}/note", old.id);
    let (status, json) = send(
        app.clone(),
        post_json(&uri, &json!({ "note": "late edit", "actor_id": s.lecturer.id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["data"]["code"], "frozen_record");

    let (status, _) = send(
        app,
        post_json(&uri, &json!({ "note": "late edit", "actor_id": s.admin.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn class_summary_lists_sessions_with_labels() {
    let (app, state) = make_test_app().await;
    let s = seed(&state).await;

    let (status, _) = post_scan(app.clone(), "Time In", s.open_lab.id, ADA_SLOT).await;
    assert_eq!(status, StatusCode::OK);

    let today = Utc::now().date_naive();
    let uri = format!("/api/attendance/classes/{}/summary?date={}", s.open_lab.id, today);
    let (status, json) = send(app.clone(), get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["summary"]["total"], 1);
    assert_eq!(json["data"]["summary"]["present"], 1);
    assert_eq!(json["data"]["summary"]["open"], 1);
    assert_eq!(json["data"]["sessions"][0]["display_status"], "present");
    assert!(json["data"]["sessions"][0].get("check_in_slot").is_none());

    let (status, json) = send(app, get("/api/attendance/classes/9999/summary")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["data"]["code"], "not_found");
}

struct OfflineGateway;

#[async_trait::async_trait]
impl DeviceActuator for OfflineGateway {
    async fn set_device_state(&self, _: &str, _: &str, _: bool) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Gateway("offline".into()))
    }
}

#[tokio::test]
#[serial]
async fn handlers_share_the_engine_the_app_was_built_with() {
    let (_, state) = make_test_app().await;
    let s = seed(&state).await;

    let effects = SideEffectDispatcher::new(
        state.db_clone(),
        Arc::new(DbOccupancyCounter::new(state.db_clone())),
        Arc::new(DbNotificationSink::new(state.db_clone(), state.ws_clone())),
        Arc::new(OfflineGateway),
    );
    let engine = Arc::new(AttendanceEngine::new(
        state.db_clone(),
        SessionLedger::from_config(),
        CorrectionManager::from_config(),
        effects,
    ));
    let app: TestService = api::app_with_engine(state.clone(), engine)
        .into_service()
        .boxed_clone();

    for _ in 0..2 {
        let (status, json) =
            post_scan(app.clone(), "Room Control", s.open_lab.id, ACTIVATOR_SLOT).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["room"]["switched"], 0);
        assert_eq!(json["data"]["room"]["failed"], 1);
    }
}
