use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::BookingTransaction;
use shared_models::appointment::Appointment;
use shared_models::catalog::MAX_SERVICE_DURATION_MINUTES;
use shared_models::interval::TimeRange;

use crate::models::AppointmentError;

/// Start instants an appointment must have to possibly overlap `range`:
/// nothing lasts longer than the longest service, so look back that far.
pub fn candidate_window(range: &TimeRange) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        range.start - Duration::minutes(i64::from(MAX_SERVICE_DURATION_MINUTES)),
        range.end,
    )
}

/// The first appointment that still occupies the doctor during `range`, ignoring `exclude`.
///
/// Runs inside the caller's transaction so the answer holds until it commits.
pub async fn find_conflict(
    tx: &mut dyn BookingTransaction,
    range: &TimeRange,
    exclude: Option<Uuid>,
) -> Result<Option<Appointment>, AppointmentError> {
    let (from, to) = candidate_window(range);
    let nearby = tx.appointments_in_range(from, to).await?;
    debug!(
        "Checking {} nearby appointment(s) for doctor {} between {} and {}",
        nearby.len(),
        tx.doctor_id(),
        range.start,
        range.end
    );

    let conflict = nearby
        .into_iter()
        .filter(|a| Some(a.id) != exclude)
        .find(|a| a.blocks(range));

    if let Some(existing) = &conflict {
        warn!(
            "Conflict detected for doctor {}: appointment {} at {}",
            existing.doctor_id, existing.id, existing.scheduled_at
        );
    }
    Ok(conflict)
}
