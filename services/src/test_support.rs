//! Fixtures and fake collaborators shared by the unit tests of this crate.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use db::models::notification::Severity;
use db::models::{class, enrollment, fingerprint, iot_device, room, room_activator, student, user};
use db::test_utils::setup_test_db;
use sea_orm::DatabaseConnection;
use std::sync::{Arc, Mutex};

use crate::collaborators::{
    CollaboratorError, DbOccupancyCounter, DeviceActuator, NotificationSink, OccupancyCounter,
};
use crate::side_effects::SideEffectDispatcher;

pub const KIOSK: &str = "kiosk-lab1";

/// A lecturer, one class in one room, one enrolled student and a facilities
/// user who can switch the room on and off.
pub struct Campus {
    pub db: DatabaseConnection,
    pub lecturer: user::Model,
    pub admin: user::Model,
    pub facilities: user::Model,
    pub room: room::Model,
    pub class: class::Model,
    pub ada: student::Model,
    pub ada_slot: i32,
    pub activator_slot: i32,
    pub devices: Vec<iot_device::Model>,
}

pub async fn campus() -> Campus {
    let db = setup_test_db().await;

    let lecturer = user::Model::create(&db, "lect", "Dr Lect", "lect@test.com", false, false)
        .await
        .unwrap();
    let admin = user::Model::create(&db, "admin", "Admin", "admin@test.com", true, false)
        .await
        .unwrap();
    let facilities = user::Model::create(&db, "fac", "Facilities", "fac@test.com", false, true)
        .await
        .unwrap();

    let room = room::Model::create(&db, "Lab 1").await.unwrap();
    let class = class::Model::create(
        &db,
        "COS301",
        lecturer.id,
        Some(room.id),
        NaiveTime::from_hms_opt(8, 0, 0),
        NaiveTime::from_hms_opt(10, 0, 0),
    )
    .await
    .unwrap();

    let ada = student::Model::create(&db, "u001", "Ada Lovelace", Some("Countess"), "ada@test.com")
        .await
        .unwrap();
    enrollment::Model::enroll(&db, ada.id, class.id).await.unwrap();
    let ada_slot = 1;
    fingerprint::Model::register(&db, KIOSK, ada_slot, ada.id)
        .await
        .unwrap();

    let activator_slot = 90;
    room_activator::Model::bind(&db, facilities.id, room.id, KIOSK, activator_slot)
        .await
        .unwrap();

    let mut devices = Vec::new();
    for (name, ext) in [("Lights", "plug-lights"), ("Aircon", "plug-aircon")] {
        devices.push(
            iot_device::Model::create(&db, room.id, name, ext, "switch_1")
                .await
                .unwrap(),
        );
    }

    Campus {
        db,
        lecturer,
        admin,
        facilities,
        room,
        class,
        ada,
        ada_slot,
        activator_slot,
        devices,
    }
}

/// `h:m` UTC on the fixture day.
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

pub fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(i64, String, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(i64, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(
        &self,
        instructor_user_id: i64,
        title: &str,
        message: &str,
        _severity: Severity,
    ) -> Result<(), CollaboratorError> {
        self.sent
            .lock()
            .unwrap()
            .push((instructor_user_id, title.to_owned(), message.to_owned()));
        Ok(())
    }
}

/// Records commands; fails for the device ids listed in `broken`.
#[derive(Default)]
pub struct RecordingActuator {
    pub commands: Mutex<Vec<(String, bool)>>,
    pub broken: Vec<String>,
}

#[async_trait]
impl DeviceActuator for RecordingActuator {
    async fn set_device_state(
        &self,
        device_id: &str,
        _dp_code: &str,
        value: bool,
    ) -> Result<(), CollaboratorError> {
        if self.broken.iter().any(|d| d == device_id) {
            return Err(CollaboratorError::Gateway(format!("{device_id} offline")));
        }
        self.commands
            .lock()
            .unwrap()
            .push((device_id.to_owned(), value));
        Ok(())
    }
}

pub struct FailingOccupancy;

#[async_trait]
impl OccupancyCounter for FailingOccupancy {
    async fn adjust(&self, _room_id: i64, _delta: i64) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Gateway("counter unavailable".into()))
    }
}

/// Dispatcher wired to the real occupancy counter and recording fakes.
pub fn dispatcher(
    db: &DatabaseConnection,
) -> (SideEffectDispatcher, Arc<RecordingNotifier>, Arc<RecordingActuator>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let actuator = Arc::new(RecordingActuator::default());
    let dispatcher = SideEffectDispatcher::new(
        db.clone(),
        Arc::new(DbOccupancyCounter::new(db.clone())),
        notifier.clone(),
        actuator.clone(),
    );
    (dispatcher, notifier, actuator)
}
