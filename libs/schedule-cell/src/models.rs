use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::ErrorKind;

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Times are `HH:MM` wall-clock strings in the clinic timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
    pub slot_duration_minutes: i32,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub day_of_week: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub slot_duration_minutes: Option<i32>,
    pub active: Option<bool>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid time format {0:?}, expected HH:MM")]
    InvalidTimeFormat(String),

    #[error("Start time {start} must be before end time {end}")]
    InvalidRange { start: String, end: String },

    #[error("Slot duration must be positive, got {0}")]
    InvalidDuration(i32),

    #[error("Invalid day of week {0:?}")]
    InvalidDayOfWeek(String),

    #[error("Schedule overlaps with existing schedule {existing} for this day")]
    OverlapConflict { existing: Uuid },

    #[error("Schedule not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Doctor is not active")]
    DoctorInactive,

    #[error("Service is not active")]
    ServiceInactive,

    #[error("Service duration of {0} minutes is out of range")]
    InvalidServiceDuration(i32),

    #[error("Doctor does not offer this service")]
    ServiceNotOffered,

    #[error("Not allowed to manage this doctor's schedule")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ScheduleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScheduleError::InvalidTimeFormat(_)
            | ScheduleError::InvalidRange { .. }
            | ScheduleError::InvalidDuration(_)
            | ScheduleError::InvalidDayOfWeek(_)
            | ScheduleError::InvalidServiceDuration(_)
            | ScheduleError::ServiceNotOffered => ErrorKind::Validation,
            ScheduleError::OverlapConflict { .. } => ErrorKind::Conflict,
            ScheduleError::NotFound | ScheduleError::DoctorNotFound | ScheduleError::ServiceNotFound => {
                ErrorKind::NotFound
            }
            ScheduleError::DoctorInactive | ScheduleError::ServiceInactive => ErrorKind::Inactive,
            ScheduleError::Forbidden => ErrorKind::Forbidden,
            ScheduleError::Database(_) => ErrorKind::Storage,
        }
    }
}
