use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification shared by every cell error.
///
/// The delivery layer maps these onto its own status codes; the scheduling
/// core never deals in transport concepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Inactive,
    Validation,
    Conflict,
    Forbidden,
    InvalidStateTransition,
    TooLate,
    PastSchedule,
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Inactive => "inactive",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidStateTransition => "invalid_state_transition",
            ErrorKind::TooLate => "too_late",
            ErrorKind::PastSchedule => "past_schedule",
            ErrorKind::Storage => "storage",
        };
        f.write_str(name)
    }
}
