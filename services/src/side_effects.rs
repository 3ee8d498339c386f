//! Best-effort consequences of a committed scan.
//!
//! Nothing here can fail a scan: the attendance row is already committed when
//! these run, so every collaborator error is logged and dropped.

use db::models::attendance_session::{AttendanceStatus, Model as Session};
use db::models::notification::Severity;
use db::models::{class, iot_device, student};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use util::config;
use util::state::AppState;

use crate::collaborators::{
    DbNotificationSink, DbOccupancyCounter, DeviceActuator, HttpDeviceActuator,
    NoopDeviceActuator, NotificationSink, OccupancyCounter,
};
use crate::error::AttendanceError;
use crate::router::ScanAction;

/// Result of an activator scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoomToggle {
    pub room_id: i64,
    /// The state every device was asked to move to.
    pub turned_on: bool,
    pub switched: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct SideEffectDispatcher {
    db: DatabaseConnection,
    occupancy: Arc<dyn OccupancyCounter>,
    notifier: Arc<dyn NotificationSink>,
    actuator: Arc<dyn DeviceActuator>,
}

impl SideEffectDispatcher {
    pub fn new(
        db: DatabaseConnection,
        occupancy: Arc<dyn OccupancyCounter>,
        notifier: Arc<dyn NotificationSink>,
        actuator: Arc<dyn DeviceActuator>,
    ) -> Self {
        Self {
            db,
            occupancy,
            notifier,
            actuator,
        }
    }

    /// Database-backed counter and notifications; HTTP actuation when a
    /// device gateway is configured.
    pub fn from_state(state: &AppState) -> Self {
        let actuator: Arc<dyn DeviceActuator> = match config::device_gateway_url() {
            Some(url) => match HttpDeviceActuator::new(url) {
                Ok(http) => Arc::new(http),
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        "device gateway client unavailable, actuation disabled"
                    );
                    Arc::new(NoopDeviceActuator)
                }
            },
            None => Arc::new(NoopDeviceActuator),
        };

        Self::new(
            state.db_clone(),
            Arc::new(DbOccupancyCounter::new(state.db_clone())),
            Arc::new(DbNotificationSink::new(state.db_clone(), state.ws_clone())),
            actuator,
        )
    }

    pub async fn after_check_in(
        &self,
        class: &class::Model,
        student: &student::Model,
        session: &Session,
    ) {
        self.adjust_occupancy(class, 1).await;
        self.notify(class, student, session, ScanAction::TimeIn).await;
    }

    pub async fn after_check_out(
        &self,
        class: &class::Model,
        student: &student::Model,
        session: &Session,
    ) {
        self.adjust_occupancy(class, -1).await;
        self.notify(class, student, session, ScanAction::TimeOut).await;
    }

    /// The head count follows whether the session is open before and after the replacement.
    pub async fn after_correction(
        &self,
        class: &class::Model,
        student: &student::Model,
        original: &Session,
        replacement: &Session,
    ) {
        match (original.check_out_at.is_none(), replacement.check_out_at.is_none()) {
            (true, false) => self.adjust_occupancy(class, -1).await,
            (false, true) => self.adjust_occupancy(class, 1).await,
            _ => {}
        }
        self.notify(class, student, replacement, ScanAction::Correction).await;
    }

    /// Switches every appliance in `room_id`: all off turns them on, anything on turns them off.
    ///
    /// A device's stored state only changes once the gateway accepted the command.
    pub async fn toggle_room(&self, room_id: i64) -> Result<RoomToggle, AttendanceError> {
        let devices = iot_device::Model::list_for_room(&self.db, room_id).await?;
        let turned_on = !devices.iter().any(|d| d.is_on);

        let mut toggle = RoomToggle {
            room_id,
            turned_on,
            switched: 0,
            failed: 0,
        };
        for device in devices {
            if let Err(err) = self
                .actuator
                .set_device_state(&device.external_id, &device.dp_code, turned_on)
                .await
            {
                tracing::warn!(device = %device.external_id, error = %err, "device command failed");
                toggle.failed += 1;
                continue;
            }
            let device_id = device.id;
            match iot_device::Model::set_on(&self.db, device, turned_on).await {
                Ok(_) => toggle.switched += 1,
                Err(err) => {
                    tracing::warn!(device_id, error = %err, "device switched but state not saved");
                    toggle.failed += 1;
                }
            }
        }

        tracing::info!(
            room_id,
            turned_on,
            switched = toggle.switched,
            failed = toggle.failed,
            "room toggled"
        );
        Ok(toggle)
    }

    async fn adjust_occupancy(&self, class: &class::Model, delta: i64) {
        let Some(room_id) = class.room_id else {
            return;
        };
        if let Err(err) = self.occupancy.adjust(room_id, delta).await {
            tracing::warn!(room_id, delta, error = %err, "occupancy update failed");
        }
    }

    async fn notify(
        &self,
        class: &class::Model,
        student: &student::Model,
        session: &Session,
        action: ScanAction,
    ) {
        let title = format!("{}: {}", class.name, action);
        let message = match action {
            ScanAction::TimeIn => format!("{} checked in ({})", student.full_name, session.status),
            ScanAction::TimeOut => {
                format!("{} checked out ({})", student.full_name, session.status)
            }
            ScanAction::Correction => format!(
                "{} had a scan corrected ({})",
                student.full_name, session.status
            ),
            ScanAction::ActivatorTrigger => return,
        };
        let severity = match session.status {
            AttendanceStatus::Absent => Severity::Warning,
            _ => Severity::Info,
        };

        if let Err(err) = self
            .notifier
            .notify(class.instructor_id, &title, &message, severity)
            .await
        {
            tracing::warn!(
                instructor_id = class.instructor_id,
                %action,
                error = %err,
                "instructor notification failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        FailingOccupancy, RecordingActuator, RecordingNotifier, at, campus, dispatcher,
    };
    use db::models::attendance_session::{EntryMethod, NewSession};
    use db::models::room;

    async fn open_session(c: &crate::test_support::Campus) -> Session {
        Session::insert_live(
            &c.db,
            NewSession {
                student_id: c.ada.id,
                class_id: c.class.id,
                session_day: at(8, 5).date_naive(),
                check_in_at: at(8, 5),
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

    async fn occupancy(c: &crate::test_support::Campus) -> i64 {
        room::Model::get_by_id(&c.db, c.room.id).await.unwrap().unwrap().occupancy
    }

    #[tokio::test]
    async fn check_in_and_out_move_occupancy_and_notify() {
        let c = campus().await;
        let (d, notifier, _) = dispatcher(&c.db);
        let s = open_session(&c).await;

        d.after_check_in(&c.class, &c.ada, &s).await;
        assert_eq!(occupancy(&c).await, 1);
        d.after_check_out(&c.class, &c.ada, &s).await;
        assert_eq!(occupancy(&c).await, 0);

        let sent = notifier.messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, c.lecturer.id);
        assert_eq!(sent[0].1, "COS301: time_in");
        assert!(sent[0].2.contains("Ada Lovelace"));
        assert_eq!(sent[1].1, "COS301: time_out");
    }

    #[tokio::test]
    async fn occupancy_failure_is_swallowed() {
        let c = campus().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let d = SideEffectDispatcher::new(
            c.db.clone(),
            Arc::new(FailingOccupancy),
            notifier.clone(),
            Arc::new(RecordingActuator::default()),
        );
        let s = open_session(&c).await;

        d.after_check_in(&c.class, &c.ada, &s).await;
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn correction_moves_occupancy_only_when_openness_changes() {
        let c = campus().await;
        let (d, notifier, _) = dispatcher(&c.db);
        room::Model::adjust_occupancy(&c.db, c.room.id, 1).await.unwrap();

        let open = open_session(&c).await;
        let mut closed = open.clone();
        closed.check_out_at = Some(at(8, 7));

        d.after_correction(&c.class, &c.ada, &open, &open).await;
        assert_eq!(occupancy(&c).await, 1);

        d.after_correction(&c.class, &c.ada, &open, &closed).await;
        assert_eq!(occupancy(&c).await, 0);

        d.after_correction(&c.class, &c.ada, &closed, &closed).await;
        assert_eq!(occupancy(&c).await, 0);

        // reopening a closed session counts as a check-in
        d.after_correction(&c.class, &c.ada, &closed, &open).await;
        assert_eq!(occupancy(&c).await, 1);

        assert_eq!(notifier.messages().len(), 4);
        assert!(notifier.messages().iter().all(|m| m.1 == "COS301: correction"));
    }

    #[tokio::test]
    async fn toggle_turns_dark_room_on_then_off() {
        let c = campus().await;
        let (d, _, actuator) = dispatcher(&c.db);

        let first = d.toggle_room(c.room.id).await.unwrap();
        assert!(first.turned_on);
        assert_eq!(first.switched, 2);
        assert!(
            iot_device::Model::list_for_room(&c.db, c.room.id)
                .await
                .unwrap()
                .iter()
                .all(|dev| dev.is_on)
        );

        let second = d.toggle_room(c.room.id).await.unwrap();
        assert!(!second.turned_on);
        assert_eq!(actuator.commands.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn any_device_on_means_switch_everything_off() {
        let c = campus().await;
        let (d, _, actuator) = dispatcher(&c.db);
        iot_device::Model::set_on(&c.db, c.devices[0].clone(), true)
            .await
            .unwrap();

        let t = d.toggle_room(c.room.id).await.unwrap();
        assert!(!t.turned_on);
        assert!(actuator.commands.lock().unwrap().iter().all(|(_, v)| !v));
    }

    #[tokio::test]
    async fn failed_device_keeps_its_stored_state() {
        let c = campus().await;
        let actuator = Arc::new(RecordingActuator {
            broken: vec!["plug-aircon".into()],
            ..Default::default()
        });
        let d = SideEffectDispatcher::new(
            c.db.clone(),
            Arc::new(FailingOccupancy),
            Arc::new(RecordingNotifier::default()),
            actuator,
        );

        let t = d.toggle_room(c.room.id).await.unwrap();
        assert_eq!((t.switched, t.failed), (1, 1));

        let devices = iot_device::Model::list_for_room(&c.db, c.room.id).await.unwrap();
        let lights = devices.iter().find(|d| d.external_id == "plug-lights").unwrap();
        let aircon = devices.iter().find(|d| d.external_id == "plug-aircon").unwrap();
        assert!(lights.is_on);
        assert!(!aircon.is_on);
    }
}
