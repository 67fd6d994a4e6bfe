use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Created,
    Confirmed,
    Cancelled,
    Completed,
    Reminder,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Created => write!(f, "appointment_created"),
            NotificationKind::Confirmed => write!(f, "appointment_confirmed"),
            NotificationKind::Cancelled => write!(f, "appointment_cancelled"),
            NotificationKind::Completed => write!(f, "appointment_completed"),
            NotificationKind::Reminder => write!(f, "appointment_reminder"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

/// Everything a notification template needs about one appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppointmentNotice {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub doctor_name: String,
    /// Clinic-local date, `YYYY-MM-DD`.
    pub date: String,
    /// Clinic-local time, `HH:MM`.
    pub time: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Notification channel unavailable")]
    Unavailable,
}

/// Outbound channel for appointment notifications (email, SMS, ...).
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn send_appointment_created(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError>;

    async fn send_appointment_confirmed(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError>;

    async fn send_appointment_cancelled(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError>;

    async fn send_appointment_completed(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError>;

    async fn send_appointment_reminder(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError>;
}

/// Routes a notice to the port method matching `kind`.
pub async fn deliver(
    port: &dyn NotificationPort,
    kind: NotificationKind,
    recipient: &Recipient,
    notice: &AppointmentNotice,
) -> Result<(), NotificationError> {
    match kind {
        NotificationKind::Created => port.send_appointment_created(recipient, notice).await,
        NotificationKind::Confirmed => port.send_appointment_confirmed(recipient, notice).await,
        NotificationKind::Cancelled => port.send_appointment_cancelled(recipient, notice).await,
        NotificationKind::Completed => port.send_appointment_completed(recipient, notice).await,
        NotificationKind::Reminder => port.send_appointment_reminder(recipient, notice).await,
    }
}
