use async_trait::async_trait;
use tracing::info;

use shared_models::notification::{
    AppointmentNotice, NotificationError, NotificationKind, NotificationPort, Recipient,
};

/// Notification port that writes every message to the log instead of a mailbox.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    fn emit(&self, kind: NotificationKind, recipient: &Recipient, notice: &AppointmentNotice) {
        info!(
            kind = %kind,
            appointment_id = %notice.appointment_id,
            to = %recipient.email,
            "{} with {} on {} at {}{}",
            notice.patient_name,
            notice.doctor_name,
            notice.date,
            notice.time,
            notice
                .detail
                .as_deref()
                .map(|d| format!(" ({})", d))
                .unwrap_or_default()
        );
    }
}

#[async_trait]
impl NotificationPort for TracingNotifier {
    async fn send_appointment_created(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.emit(NotificationKind::Created, recipient, notice);
        Ok(())
    }

    async fn send_appointment_confirmed(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.emit(NotificationKind::Confirmed, recipient, notice);
        Ok(())
    }

    async fn send_appointment_cancelled(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.emit(NotificationKind::Cancelled, recipient, notice);
        Ok(())
    }

    async fn send_appointment_completed(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.emit(NotificationKind::Completed, recipient, notice);
        Ok(())
    }

    async fn send_appointment_reminder(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.emit(NotificationKind::Reminder, recipient, notice);
        Ok(())
    }
}
