use std::sync::Arc;

use tracing::info;

use appointment_cell::services::{AppointmentBookingService, BookingRepositories};
use notification_cell::{NotificationDispatcher, NotificationWorkerPool, ParticipantResolver, WorkerConfig};
use reminder_cell::{ReminderConfig, ReminderScanner, ReminderScannerHandle};
use schedule_cell::services::{AvailabilityService, ScheduleService};
use shared_config::AppConfig;
use shared_database::InMemoryDatabase;
use shared_models::notification::NotificationPort;
use shared_utils::clock::Clock;

/// Every scheduling service wired to one store, plus the background tasks.
pub struct ClinicEngine {
    pub booking: Arc<AppointmentBookingService>,
    pub availability: Arc<AvailabilityService>,
    pub schedules: Arc<ScheduleService>,
    notifications: NotificationWorkerPool,
    reminders: ReminderScannerHandle,
}

impl ClinicEngine {
    /// Must be called inside a tokio runtime; spawns the notification workers
    /// and the reminder scanner.
    pub fn start(
        config: &AppConfig,
        store: InMemoryDatabase,
        port: Arc<dyn NotificationPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(store);
        let resolver = Arc::new(ParticipantResolver::new(config, store.clone(), store.clone()));

        let (dispatcher, notifications) = NotificationDispatcher::start(
            &WorkerConfig::from_app_config(config),
            port.clone(),
            resolver.clone(),
        );

        let booking = Arc::new(AppointmentBookingService::new(
            config,
            BookingRepositories::from_store(store.clone()),
            dispatcher,
            clock.clone(),
        ));
        let availability = Arc::new(AvailabilityService::new(
            config,
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        ));
        let schedules = Arc::new(ScheduleService::new(store.clone(), store.clone(), clock.clone()));

        let scanner = Arc::new(ReminderScanner::new(
            ReminderConfig::from_app_config(config),
            store,
            resolver,
            port,
            clock,
        ));
        let reminders = scanner.spawn();

        info!("Clinic scheduling engine started");
        Self {
            booking,
            availability,
            schedules,
            notifications,
            reminders,
        }
    }

    /// Stops the reminder scanner, then drains queued notifications.
    pub async fn shutdown(self) {
        self.reminders.shutdown().await;
        self.notifications.shutdown().await;
        info!("Clinic scheduling engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appointment_cell::models::CreateAppointmentRequest;
    use schedule_cell::models::CreateScheduleRequest;
    use shared_models::notification::NotificationKind;
    use shared_models::schedule::DayOfWeek;
    use shared_utils::test_utils::{RecordingNotifier, TestClinic};

    #[tokio::test]
    async fn test_engine_books_an_offered_slot() {
        let clinic = TestClinic::new().await;
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = ClinicEngine::start(
            &clinic.config,
            clinic.db.clone(),
            notifier.clone(),
            clinic.clock.clone(),
        );

        engine
            .schedules
            .create_schedule(
                &clinic.doctor_actor(),
                clinic.doctor.id,
                CreateScheduleRequest {
                    day_of_week: "monday".to_string(),
                    start_time: "09:00".to_string(),
                    end_time: "10:00".to_string(),
                    slot_duration_minutes: 30,
                    active: None,
                },
            )
            .await
            .unwrap();

        let monday = clinic.next(DayOfWeek::Monday);
        let slots = engine
            .availability
            .get_available_slots(clinic.doctor.id, clinic.service.id, monday)
            .await
            .unwrap();
        assert_eq!(slots.len(), 2);

        let first = clinic.at(monday, &slots[0].start_time.format("%H:%M").to_string());
        engine
            .booking
            .create_appointment(
                &clinic.patient_actor(),
                CreateAppointmentRequest {
                    patient_id: clinic.patient.id,
                    doctor_id: clinic.doctor.id,
                    service_id: clinic.service.id,
                    scheduled_at: first,
                    reason: "Back pain".to_string(),
                    notes: None,
                },
            )
            .await
            .unwrap();

        let after = engine
            .availability
            .get_available_slots(clinic.doctor.id, clinic.service.id, monday)
            .await
            .unwrap();
        assert!(!after[0].available);
        assert!(after[1].available);

        engine.shutdown().await;
        assert_eq!(notifier.sent_of_kind(NotificationKind::Created).len(), 1);
    }
}
