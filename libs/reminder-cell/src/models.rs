use std::fmt;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use shared_config::AppConfig;
use shared_database::DatabaseError;
use shared_models::appointment::Appointment;

/// The two reminders every confirmed appointment can receive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    DayBefore,
    HourBefore,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 2] = [ReminderKind::DayBefore, ReminderKind::HourBefore];

    /// How far ahead of the appointment the reminder goes out.
    pub fn lead_time(&self) -> Duration {
        match self {
            ReminderKind::DayBefore => Duration::hours(24),
            ReminderKind::HourBefore => Duration::hours(1),
        }
    }

    pub fn already_sent(&self, appointment: &Appointment) -> bool {
        match self {
            ReminderKind::DayBefore => appointment.reminder_24h_sent,
            ReminderKind::HourBefore => appointment.reminder_1h_sent,
        }
    }

    /// Short text carried in the notice so the recipient knows which reminder this is.
    pub fn label(&self) -> &'static str {
        match self {
            ReminderKind::DayBefore => "Your appointment is in 24 hours",
            ReminderKind::HourBefore => "Your appointment is in 1 hour",
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderKind::DayBefore => write!(f, "24h"),
            ReminderKind::HourBefore => write!(f, "1h"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub interval: StdDuration,
    /// Half-width of the window around each reminder target.
    pub window: Duration,
    pub day_before_enabled: bool,
    pub hour_before_enabled: bool,
}

impl ReminderConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            interval: config.reminder_interval().max(StdDuration::from_secs(1)),
            window: Duration::minutes(config.reminder_window_minutes.max(0)),
            day_before_enabled: config.reminder_24h_enabled,
            hour_before_enabled: config.reminder_1h_enabled,
        }
    }

    pub fn enabled(&self, kind: ReminderKind) -> bool {
        match kind {
            ReminderKind::DayBefore => self.day_before_enabled,
            ReminderKind::HourBefore => self.hour_before_enabled,
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

/// What one scan of one reminder kind did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub kind: ReminderKind,
    /// Confirmed appointments in the window still waiting for this reminder.
    pub due: usize,
    pub sent: usize,
    /// Sent, but the flag could not be recorded; they stay eligible.
    pub unmarked: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ScanSummary {
    pub fn empty(kind: ReminderKind) -> Self {
        Self {
            kind,
            due: 0,
            sent: 0,
            unmarked: 0,
            failed: 0,
            skipped: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_app_config() {
        let config = ReminderConfig::from_app_config(&AppConfig {
            reminder_interval_seconds: 0,
            reminder_window_minutes: 5,
            reminder_1h_enabled: false,
            ..AppConfig::default()
        });

        assert_eq!(config.interval, StdDuration::from_secs(1));
        assert_eq!(config.window, Duration::minutes(5));
        assert!(config.enabled(ReminderKind::DayBefore));
        assert!(!config.enabled(ReminderKind::HourBefore));
    }

    #[test]
    fn test_kind_lead_times() {
        assert_eq!(ReminderKind::DayBefore.lead_time(), Duration::hours(24));
        assert_eq!(ReminderKind::HourBefore.lead_time(), Duration::hours(1));
        assert_eq!(ReminderKind::HourBefore.to_string(), "1h");
    }
}
