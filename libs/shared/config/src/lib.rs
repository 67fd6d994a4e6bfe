use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Offset of the clinic's wall clock from UTC, in minutes.
    pub clinic_utc_offset_minutes: i32,
    pub reminder_interval_seconds: u64,
    /// Half-width of the tolerance window around each reminder target.
    pub reminder_window_minutes: i64,
    pub reminder_24h_enabled: bool,
    pub reminder_1h_enabled: bool,
    pub min_cancellation_notice_hours: i64,
    pub reset_reminders_on_reschedule: bool,
    pub notification_workers: usize,
    pub notification_queue_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            clinic_utc_offset_minutes: 0,
            reminder_interval_seconds: 600,
            reminder_window_minutes: 10,
            reminder_24h_enabled: true,
            reminder_1h_enabled: true,
            min_cancellation_notice_hours: 24,
            reset_reminders_on_reschedule: false,
            notification_workers: 4,
            notification_queue_capacity: 256,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            clinic_utc_offset_minutes: env_or(
                "CLINIC_UTC_OFFSET_MINUTES",
                defaults.clinic_utc_offset_minutes,
            ),
            reminder_interval_seconds: env_or(
                "REMINDER_INTERVAL_SECONDS",
                defaults.reminder_interval_seconds,
            ),
            reminder_window_minutes: env_or(
                "REMINDER_WINDOW_MINUTES",
                defaults.reminder_window_minutes,
            ),
            reminder_24h_enabled: env_or("REMINDER_24H_ENABLED", defaults.reminder_24h_enabled),
            reminder_1h_enabled: env_or("REMINDER_1H_ENABLED", defaults.reminder_1h_enabled),
            min_cancellation_notice_hours: env_or(
                "MIN_CANCELLATION_NOTICE_HOURS",
                defaults.min_cancellation_notice_hours,
            ),
            reset_reminders_on_reschedule: env_or(
                "RESET_REMINDERS_ON_RESCHEDULE",
                defaults.reset_reminders_on_reschedule,
            ),
            notification_workers: env_or("NOTIFICATION_WORKERS", defaults.notification_workers),
            notification_queue_capacity: env_or(
                "NOTIFICATION_QUEUE_CAPACITY",
                defaults.notification_queue_capacity,
            ),
        };

        if !config.is_valid() {
            warn!("Scheduler configuration contains out-of-range values, check the environment");
        }

        config
    }

    pub fn is_valid(&self) -> bool {
        self.clinic_offset().is_some()
            && self.reminder_interval_seconds > 0
            && self.reminder_window_minutes >= 0
            && self.min_cancellation_notice_hours >= 0
            && self.notification_workers > 0
            && self.notification_queue_capacity > 0
    }

    /// The clinic timezone. `None` when the configured offset is outside ±24h.
    pub fn clinic_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes.checked_mul(60)?)
    }

    /// The clinic timezone, falling back to UTC when the offset is out of range.
    pub fn clinic_offset_or_utc(&self) -> FixedOffset {
        self.clinic_offset().unwrap_or_else(|| {
            warn!(
                "CLINIC_UTC_OFFSET_MINUTES={} is out of range, using UTC",
                self.clinic_utc_offset_minutes
            );
            Utc.fix()
        })
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_seconds)
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("{} has invalid value {:?}, using default {:?}", key, raw, default);
                default
            }
        },
        Err(_) => {
            warn!("{} not set, using default {:?}", key, default);
            default
        }
    }
}
