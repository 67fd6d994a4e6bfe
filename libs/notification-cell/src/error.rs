use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::ErrorKind;
use shared_models::notification::NotificationError;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Notification queue is full")]
    QueueFull,

    #[error("Notification queue is closed")]
    QueueClosed,

    #[error("Cannot resolve recipients for appointment {appointment_id}")]
    RecipientNotFound { appointment_id: Uuid },

    #[error("Delivery failed: {0}")]
    Delivery(#[from] NotificationError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::RecipientNotFound { .. } => ErrorKind::NotFound,
            DispatchError::QueueFull
            | DispatchError::QueueClosed
            | DispatchError::Delivery(_)
            | DispatchError::Database(_) => ErrorKind::Storage,
        }
    }
}
