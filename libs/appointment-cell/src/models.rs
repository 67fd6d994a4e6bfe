use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::appointment::AppointmentStatus;
use shared_models::error::ErrorKind;

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub service_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub scheduled_at: DateTime<Utc>,
}

/// The lifecycle operations that move an appointment or its time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Confirm,
    Complete,
    Cancel,
    Reschedule,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleAction::Confirm => write!(f, "confirm"),
            LifecycleAction::Complete => write!(f, "complete"),
            LifecycleAction::Cancel => write!(f, "cancel"),
            LifecycleAction::Reschedule => write!(f, "reschedule"),
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Patient account is not active")]
    PatientInactive,

    #[error("Doctor is not active")]
    DoctorInactive,

    #[error("Service is not active")]
    ServiceInactive,

    #[error("Doctor does not offer this service")]
    ServiceNotOffered,

    #[error("Appointment slot not available, conflicts with appointment {conflicting}")]
    SlotNotAvailable { conflicting: Uuid },

    #[error("Not allowed to access this appointment")]
    Forbidden,

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidStateTransition {
        from: AppointmentStatus,
        action: LifecycleAction,
    },

    #[error("Appointment is already cancelled")]
    AlreadyCancelled,

    #[error("Appointment is already completed")]
    AlreadyCompleted,

    #[error("Appointments can only be cancelled at least {notice_hours} hours in advance")]
    TooLateToCancel { notice_hours: i64 },

    #[error("Appointment time must be in the future")]
    PastSchedule,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl AppointmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::NotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::ServiceNotFound => ErrorKind::NotFound,
            AppointmentError::PatientInactive
            | AppointmentError::DoctorInactive
            | AppointmentError::ServiceInactive => ErrorKind::Inactive,
            AppointmentError::ServiceNotOffered | AppointmentError::Validation(_) => ErrorKind::Validation,
            AppointmentError::SlotNotAvailable { .. } => ErrorKind::Conflict,
            AppointmentError::Forbidden => ErrorKind::Forbidden,
            AppointmentError::InvalidStateTransition { .. }
            | AppointmentError::AlreadyCancelled
            | AppointmentError::AlreadyCompleted => ErrorKind::InvalidStateTransition,
            AppointmentError::TooLateToCancel { .. } => ErrorKind::TooLate,
            AppointmentError::PastSchedule => ErrorKind::PastSchedule,
            AppointmentError::Database(_) => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(AppointmentError::AlreadyCancelled.kind(), ErrorKind::InvalidStateTransition);
        assert_eq!(
            AppointmentError::SlotNotAvailable { conflicting: Uuid::nil() }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(AppointmentError::TooLateToCancel { notice_hours: 24 }.kind(), ErrorKind::TooLate);
        assert_eq!(AppointmentError::ServiceInactive.kind(), ErrorKind::Inactive);
        assert_eq!(
            AppointmentError::from(DatabaseError::Unavailable("down".into())).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn test_transition_error_message() {
        let err = AppointmentError::InvalidStateTransition {
            from: AppointmentStatus::Completed,
            action: LifecycleAction::Reschedule,
        };
        assert_eq!(err.to_string(), "Cannot reschedule an appointment that is completed");
    }
}
