//! Outbound seams of the engine.
//!
//! The router never talks to a dashboard, a room counter or a smart plug
//! directly; it goes through these traits so that failures can be injected in
//! tests and the device gateway can be swapped per deployment.

use async_trait::async_trait;
use db::models::notification::{self, Severity};
use db::models::room;
use sea_orm::{DatabaseConnection, DbErr};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use util::ws::{WebSocketManager, emit, notification_topic};

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("storage error: {0}")]
    Storage(#[from] DbErr),

    #[error("device gateway error: {0}")]
    Gateway(String),
}

/// Delivers a message to a staff user.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        instructor_user_id: i64,
        title: &str,
        message: &str,
        severity: Severity,
    ) -> Result<(), CollaboratorError>;
}

/// Switches a single room appliance.
#[async_trait]
pub trait DeviceActuator: Send + Sync {
    async fn set_device_state(
        &self,
        device_id: &str,
        dp_code: &str,
        value: bool,
    ) -> Result<(), CollaboratorError>;
}

/// Live head count of a room.
#[async_trait]
pub trait OccupancyCounter: Send + Sync {
    async fn adjust(&self, room_id: i64, delta: i64) -> Result<(), CollaboratorError>;
}

/// Persists notifications and pushes them to any open dashboard of the recipient.
#[derive(Clone)]
pub struct DbNotificationSink {
    db: DatabaseConnection,
    ws: WebSocketManager,
}

impl DbNotificationSink {
    pub fn new(db: DatabaseConnection, ws: WebSocketManager) -> Self {
        Self { db, ws }
    }
}

#[derive(Serialize)]
struct NotificationPayload<'a> {
    id: i64,
    title: &'a str,
    message: &'a str,
    severity: Severity,
}

#[async_trait]
impl NotificationSink for DbNotificationSink {
    async fn notify(
        &self,
        instructor_user_id: i64,
        title: &str,
        message: &str,
        severity: Severity,
    ) -> Result<(), CollaboratorError> {
        let saved =
            notification::Model::create(&self.db, instructor_user_id, title, message, severity)
                .await?;

        let payload = NotificationPayload {
            id: saved.id,
            title,
            message,
            severity,
        };
        emit(
            &self.ws,
            &notification_topic(instructor_user_id),
            "notification.created",
            &payload,
        )
        .await;
        Ok(())
    }
}

/// Keeps `rooms.occupancy` in step with check-ins and check-outs.
#[derive(Clone)]
pub struct DbOccupancyCounter {
    db: DatabaseConnection,
}

impl DbOccupancyCounter {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OccupancyCounter for DbOccupancyCounter {
    async fn adjust(&self, room_id: i64, delta: i64) -> Result<(), CollaboratorError> {
        room::Model::adjust_occupancy(&self.db, room_id, delta).await?;
        Ok(())
    }
}

/// Sends switch commands to the room-device gateway over HTTP.
///
/// Each call posts `{"commands":[{"code": <dp_code>, "value": <bool>}]}` to
/// `{base_url}/devices/{device_id}/commands`.
#[derive(Clone)]
pub struct HttpDeviceActuator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDeviceActuator {
    pub fn new(base_url: impl Into<String>) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CollaboratorError::Gateway(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl DeviceActuator for HttpDeviceActuator {
    async fn set_device_state(
        &self,
        device_id: &str,
        dp_code: &str,
        value: bool,
    ) -> Result<(), CollaboratorError> {
        let url = format!("{}/devices/{}/commands", self.base_url, device_id);
        let body = json!({ "commands": [{ "code": dp_code, "value": value }] });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::Gateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Gateway(format!("{status}: {text}")));
        }

        tracing::debug!(device_id, dp_code, value, "device command accepted");
        Ok(())
    }
}

/// Used when no gateway is configured. Every command is accepted and dropped.
#[derive(Clone, Copy, Default)]
pub struct NoopDeviceActuator;

#[async_trait]
impl DeviceActuator for NoopDeviceActuator {
    async fn set_device_state(
        &self,
        device_id: &str,
        dp_code: &str,
        value: bool,
    ) -> Result<(), CollaboratorError> {
        tracing::debug!(device_id, dp_code, value, "no device gateway configured, skipping");
        Ok(())
    }
}
