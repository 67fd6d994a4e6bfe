use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::interval::TimeRange;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub service_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub reason: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub reminder_24h_sent: bool,
    pub reminder_1h_sent: bool,
}

impl Appointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.scheduled_at, self.end_time())
    }

    /// Whether this appointment still holds its slot in the doctor's calendar.
    /// Completed visits keep their interval; only cancellation frees it.
    pub fn occupies_doctor(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    /// Whether the appointment blocks `range` for its doctor.
    pub fn blocks(&self, range: &TimeRange) -> bool {
        self.occupies_doctor() && self.time_range().overlaps(range)
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn appointment(status: AppointmentStatus) -> Appointment {
        let scheduled_at = Utc.with_ymd_and_hms(2030, 5, 6, 10, 0, 0).unwrap();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            scheduled_at,
            duration_minutes: 45,
            reason: "check-up".to_string(),
            notes: None,
            status,
            created_at: scheduled_at - Duration::days(3),
            updated_at: scheduled_at - Duration::days(3),
            cancelled_at: None,
            cancellation_reason: None,
            reminder_24h_sent: false,
            reminder_1h_sent: false,
        }
    }

    #[test]
    fn test_end_time_uses_duration() {
        let apt = appointment(AppointmentStatus::Pending);
        assert_eq!(apt.end_time(), Utc.with_ymd_and_hms(2030, 5, 6, 10, 45, 0).unwrap());
    }

    #[test]
    fn test_cancelled_appointments_free_their_slot() {
        let probe = TimeRange::starting_at(Utc.with_ymd_and_hms(2030, 5, 6, 10, 30, 0).unwrap(), 30);

        assert!(appointment(AppointmentStatus::Pending).blocks(&probe));
        assert!(appointment(AppointmentStatus::Confirmed).blocks(&probe));
        assert!(appointment(AppointmentStatus::Completed).blocks(&probe));
        assert!(!appointment(AppointmentStatus::Cancelled).blocks(&probe));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_value(AppointmentStatus::Confirmed).unwrap(), "confirmed");
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(!AppointmentStatus::Pending.is_terminal());
    }
}
