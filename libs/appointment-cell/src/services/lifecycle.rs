use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_models::appointment::{Appointment, AppointmentStatus};

use crate::models::{AppointmentError, LifecycleAction};

#[derive(Debug, Clone)]
pub struct LifecycleRules {
    pub min_cancellation_notice: Duration,
    pub reset_reminders_on_reschedule: bool,
}

impl LifecycleRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_cancellation_notice: Duration::hours(config.min_cancellation_notice_hours.max(0)),
            reset_reminders_on_reschedule: config.reset_reminders_on_reschedule,
        }
    }
}

impl Default for LifecycleRules {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Pure appointment state machine.
///
/// `pending -> confirmed -> completed`, and `pending | confirmed -> cancelled`.
/// Every method either applies the whole change to the appointment or leaves it untouched.
pub struct AppointmentLifecycleService {
    rules: LifecycleRules,
}

impl AppointmentLifecycleService {
    pub fn new(rules: LifecycleRules) -> Self {
        Self { rules }
    }

    /// Statuses reachable from `status` in one step.
    pub fn valid_transitions(status: AppointmentStatus) -> &'static [AppointmentStatus] {
        match status {
            AppointmentStatus::Pending => &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
            AppointmentStatus::Confirmed => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            AppointmentStatus::Cancelled | AppointmentStatus::Completed => &[],
        }
    }

    pub fn confirm(&self, appointment: &mut Appointment, now: DateTime<Utc>) -> Result<(), AppointmentError> {
        self.require_status(appointment, AppointmentStatus::Pending, LifecycleAction::Confirm)?;
        if appointment.is_past(now) {
            return Err(AppointmentError::PastSchedule);
        }

        appointment.status = AppointmentStatus::Confirmed;
        appointment.updated_at = now;
        Ok(())
    }

    pub fn complete(
        &self,
        appointment: &mut Appointment,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        self.require_status(appointment, AppointmentStatus::Confirmed, LifecycleAction::Complete)?;

        appointment.status = AppointmentStatus::Completed;
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            appointment.notes = Some(notes);
        }
        appointment.updated_at = now;
        Ok(())
    }

    pub fn cancel(
        &self,
        appointment: &mut Appointment,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        match appointment.status {
            AppointmentStatus::Cancelled => return Err(AppointmentError::AlreadyCancelled),
            AppointmentStatus::Completed => return Err(AppointmentError::AlreadyCompleted),
            AppointmentStatus::Pending | AppointmentStatus::Confirmed => {}
        }

        if appointment.scheduled_at - now < self.rules.min_cancellation_notice {
            debug!(
                "Cancellation of {} refused, {} minute(s) left",
                appointment.id,
                (appointment.scheduled_at - now).num_minutes()
            );
            return Err(AppointmentError::TooLateToCancel {
                notice_hours: self.rules.min_cancellation_notice.num_hours(),
            });
        }

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppointmentError::Validation(
                "Cancellation reason is required".to_string(),
            ));
        }

        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancelled_at = Some(now);
        appointment.cancellation_reason = Some(reason.to_string());
        appointment.updated_at = now;
        Ok(())
    }

    /// Moves the appointment in time; status is unchanged. The caller still
    /// has to check the new interval against the doctor's calendar.
    pub fn reschedule(
        &self,
        appointment: &mut Appointment,
        scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if appointment.status.is_terminal() {
            return Err(AppointmentError::InvalidStateTransition {
                from: appointment.status,
                action: LifecycleAction::Reschedule,
            });
        }
        if scheduled_at <= now {
            return Err(AppointmentError::PastSchedule);
        }

        appointment.scheduled_at = scheduled_at;
        appointment.updated_at = now;
        if self.rules.reset_reminders_on_reschedule {
            appointment.reminder_24h_sent = false;
            appointment.reminder_1h_sent = false;
        }
        Ok(())
    }

    fn require_status(
        &self,
        appointment: &Appointment,
        expected: AppointmentStatus,
        action: LifecycleAction,
    ) -> Result<(), AppointmentError> {
        if appointment.status != expected {
            warn!(
                "Invalid transition attempted on {}: {} while {}",
                appointment.id, action, appointment.status
            );
            return Err(AppointmentError::InvalidStateTransition {
                from: appointment.status,
                action,
            });
        }
        Ok(())
    }
}
