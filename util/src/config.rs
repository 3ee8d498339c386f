//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.
//!
//! The free functions at the bottom of this module are shorthand accessors so
//! call sites can write `config::database_path()` instead of locking the
//! singleton themselves.

use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock, RwLockReadGuard};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    /// Offset (minutes east of UTC) of the campus clock used for day scoping and grading.
    pub utc_offset_minutes: i32,
    pub correction_window_seconds: i64,
    pub frozen_after_hours: i64,
    /// Base URL of the room-device gateway. `None` disables actuation.
    pub device_gateway_url: Option<String>,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Malformed numeric values fall back to their defaults rather than panicking.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "roll-call".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "api=info,services=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "api.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/attendance.db".into()),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: parse_or("PORT", 3000),
            utc_offset_minutes: parse_or("ATTENDANCE_UTC_OFFSET_MINUTES", 0),
            correction_window_seconds: parse_or("CORRECTION_WINDOW_SECONDS", 300),
            frozen_after_hours: parse_or("FROZEN_AFTER_HOURS", 48),
            device_gateway_url: env::var("DEVICE_GATEWAY_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn global() -> RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            if let Ok(mut guard) = lock.write() {
                *guard = AppConfig::from_env();
            }
        }
    }

    /// Generic internal setter for any field in the config.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    /// The fixed campus time zone built from `utc_offset_minutes`.
    ///
    /// Offsets outside ±24h are rejected by chrono; UTC is used instead.
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_utc_offset_minutes(value: i32) {
        AppConfig::set_field(|cfg| cfg.utc_offset_minutes = value);
    }

    pub fn set_correction_window_seconds(value: i64) {
        AppConfig::set_field(|cfg| cfg.correction_window_seconds = value);
    }

    pub fn set_frozen_after_hours(value: i64) {
        AppConfig::set_field(|cfg| cfg.frozen_after_hours = value);
    }

    pub fn set_device_gateway_url(value: Option<String>) {
        AppConfig::set_field(|cfg| cfg.device_gateway_url = value);
    }
}

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn host() -> String {
    AppConfig::global().host.clone()
}

pub fn port() -> u16 {
    AppConfig::global().port
}

pub fn timezone() -> FixedOffset {
    AppConfig::global().timezone()
}

pub fn correction_window_seconds() -> i64 {
    AppConfig::global().correction_window_seconds
}

pub fn frozen_after_hours() -> i64 {
    AppConfig::global().frozen_after_hours
}

pub fn device_gateway_url() -> Option<String> {
    AppConfig::global().device_gateway_url.clone()
}
