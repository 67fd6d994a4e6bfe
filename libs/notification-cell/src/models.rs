use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::appointment::Appointment;
use shared_models::notification::NotificationKind;

/// Who hears about an appointment event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Patient,
    Doctor,
    Both,
}

impl Audience {
    pub fn includes_patient(&self) -> bool {
        matches!(self, Audience::Patient | Audience::Both)
    }

    pub fn includes_doctor(&self) -> bool {
        matches!(self, Audience::Doctor | Audience::Both)
    }
}

/// A fire-and-forget notification carrying a snapshot of the appointment
/// as it was when the event happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    pub job_id: Uuid,
    pub kind: NotificationKind,
    pub audience: Audience,
    pub appointment: Appointment,
    pub detail: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl NotificationJob {
    pub fn new(kind: NotificationKind, appointment: &Appointment) -> Self {
        let audience = match kind {
            NotificationKind::Cancelled => Audience::Both,
            _ => Audience::Patient,
        };

        Self {
            job_id: Uuid::new_v4(),
            kind,
            audience,
            appointment: appointment.clone(),
            detail: None,
            enqueued_at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl WorkerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            workers: config.notification_workers.max(1),
            queue_capacity: config.notification_queue_capacity.max(1),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}
