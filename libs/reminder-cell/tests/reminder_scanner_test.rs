use std::sync::Arc;
use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use mockall::mock;
use uuid::Uuid;

use notification_cell::ParticipantResolver;
use reminder_cell::{ReminderConfig, ReminderError, ReminderKind, ReminderScanner, ScanSummary};
use shared_database::{AppointmentRepository, DatabaseError};
use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::notification::{
    AppointmentNotice, NotificationError, NotificationKind, NotificationPort, Recipient,
};
use shared_utils::test_utils::{RecordingNotifier, TestClinic};

mock! {
    pub Appointments {}

    #[async_trait]
    impl AppointmentRepository for Appointments {
        async fn create(&self, appointment: &Appointment) -> Result<(), DatabaseError>;
        async fn update(&self, appointment: &Appointment) -> Result<(), DatabaseError>;
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;
        async fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DatabaseError>;
        async fn find_by_doctor_and_date(
            &self,
            doctor_id: Uuid,
            date: NaiveDate,
            clinic_offset: FixedOffset,
        ) -> Result<Vec<Appointment>, DatabaseError>;
        async fn find_by_doctor_and_date_range(
            &self,
            doctor_id: Uuid,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<Appointment>, DatabaseError>;
        async fn find_by_scheduled_at_range(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            status: AppointmentStatus,
        ) -> Result<Vec<Appointment>, DatabaseError>;
        async fn mark_reminder_24h_sent(&self, id: Uuid) -> Result<(), DatabaseError>;
        async fn mark_reminder_1h_sent(&self, id: Uuid) -> Result<(), DatabaseError>;
    }
}

/// Records like `RecordingNotifier`, but each reminder takes `delay` to go out.
struct SlowNotifier {
    inner: RecordingNotifier,
    delay: StdDuration,
}

impl SlowNotifier {
    fn new(delay: StdDuration) -> Self {
        Self {
            inner: RecordingNotifier::new(),
            delay,
        }
    }
}

#[async_trait]
impl NotificationPort for SlowNotifier {
    async fn send_appointment_created(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.inner.send_appointment_created(recipient, notice).await
    }

    async fn send_appointment_confirmed(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.inner.send_appointment_confirmed(recipient, notice).await
    }

    async fn send_appointment_cancelled(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.inner.send_appointment_cancelled(recipient, notice).await
    }

    async fn send_appointment_completed(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.inner.send_appointment_completed(recipient, notice).await
    }

    async fn send_appointment_reminder(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        tokio::time::sleep(self.delay).await;
        self.inner.send_appointment_reminder(recipient, notice).await
    }
}

fn appointment_at(clinic: &TestClinic, at: DateTime<Utc>, status: AppointmentStatus) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        patient_id: clinic.patient.id,
        doctor_id: clinic.doctor.id,
        service_id: clinic.service.id,
        scheduled_at: at,
        duration_minutes: 30,
        reason: "Annual checkup".to_string(),
        notes: None,
        status,
        created_at: TestClinic::epoch() - Duration::days(7),
        updated_at: TestClinic::epoch() - Duration::days(7),
        cancelled_at: None,
        cancellation_reason: None,
        reminder_24h_sent: false,
        reminder_1h_sent: false,
    }
}

async fn confirmed_in(clinic: &TestClinic, from_now: Duration) -> Appointment {
    let appointment = appointment_at(clinic, TestClinic::epoch() + from_now, AppointmentStatus::Confirmed);
    clinic.db.create(&appointment).await.unwrap();
    appointment
}

fn scanner_for(
    clinic: &TestClinic,
    config: ReminderConfig,
    appointments: Arc<dyn AppointmentRepository>,
    notifier: Arc<dyn NotificationPort>,
) -> ReminderScanner {
    let db = Arc::new(clinic.db.clone());
    let resolver = Arc::new(ParticipantResolver::new(&clinic.config, db.clone(), db));
    ReminderScanner::new(config, appointments, resolver, notifier, clinic.clock.clone())
}

fn store_backed(clinic: &TestClinic, notifier: Arc<RecordingNotifier>) -> ReminderScanner {
    scanner_for(clinic, ReminderConfig::default(), Arc::new(clinic.db.clone()), notifier)
}

async fn stored(clinic: &TestClinic, id: Uuid) -> Appointment {
    clinic.db.find_by_id(id).await.unwrap().unwrap()
}

fn summary_of(summaries: &[ScanSummary], kind: ReminderKind) -> ScanSummary {
    summaries
        .iter()
        .find(|s| s.kind == kind)
        .cloned()
        .unwrap_or_else(|| ScanSummary::empty(kind))
}

#[tokio::test]
async fn test_day_before_reminder_is_sent_once() {
    let clinic = TestClinic::new().await;
    let notifier = Arc::new(RecordingNotifier::new());
    let appointment = confirmed_in(&clinic, Duration::hours(24) + Duration::minutes(5)).await;
    let scanner = store_backed(&clinic, notifier.clone());

    let first = scanner.tick().await;
    assert_eq!(summary_of(&first, ReminderKind::DayBefore).sent, 1);

    let second = scanner.tick().await;
    assert_eq!(summary_of(&second, ReminderKind::DayBefore).due, 0);

    let reminders = notifier.sent_of_kind(NotificationKind::Reminder);
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].recipient.email, clinic.patient.email);
    assert_eq!(reminders[0].notice.appointment_id, appointment.id);
    assert_eq!(
        reminders[0].notice.detail.as_deref(),
        Some(ReminderKind::DayBefore.label())
    );

    let after = stored(&clinic, appointment.id).await;
    assert!(after.reminder_24h_sent);
    assert!(!after.reminder_1h_sent);
}

#[tokio::test]
async fn test_only_confirmed_appointments_inside_the_window() {
    let clinic = TestClinic::new().await;
    let notifier = Arc::new(RecordingNotifier::new());

    let edge = confirmed_in(&clinic, Duration::hours(24) - Duration::minutes(10)).await;
    confirmed_in(&clinic, Duration::hours(24) + Duration::minutes(11)).await;
    confirmed_in(&clinic, Duration::hours(3)).await;
    let pending = appointment_at(
        &clinic,
        TestClinic::epoch() + Duration::hours(24),
        AppointmentStatus::Pending,
    );
    clinic.db.create(&pending).await.unwrap();

    let scanner = store_backed(&clinic, notifier.clone());
    let summary = scanner.scan(ReminderKind::DayBefore).await.unwrap();

    assert_eq!(summary.due, 1);
    assert_eq!(summary.sent, 1);
    let reminders = notifier.sent_of_kind(NotificationKind::Reminder);
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].notice.appointment_id, edge.id);
    assert!(!stored(&clinic, pending.id).await.reminder_24h_sent);
}

#[tokio::test]
async fn test_hour_before_reminder_has_its_own_flag() {
    let clinic = TestClinic::new().await;
    let notifier = Arc::new(RecordingNotifier::new());
    let appointment = confirmed_in(&clinic, Duration::minutes(55)).await;
    clinic.db.mark_reminder_24h_sent(appointment.id).await.unwrap();

    let scanner = store_backed(&clinic, notifier.clone());
    let summaries = scanner.tick().await;

    assert_eq!(summary_of(&summaries, ReminderKind::HourBefore).sent, 1);
    assert_eq!(summary_of(&summaries, ReminderKind::DayBefore).sent, 0);
    let after = stored(&clinic, appointment.id).await;
    assert!(after.reminder_1h_sent);

    // Later in the window nothing is sent again.
    clinic.clock.advance(Duration::minutes(5));
    scanner.tick().await;
    assert_eq!(notifier.sent_of_kind(NotificationKind::Reminder).len(), 1);
}

#[tokio::test]
async fn test_disabled_reminders_are_not_scanned() {
    let clinic = TestClinic::new().await;
    let notifier = Arc::new(RecordingNotifier::new());
    let day = confirmed_in(&clinic, Duration::hours(24)).await;
    let hour = confirmed_in(&clinic, Duration::hours(1)).await;

    let config = ReminderConfig {
        day_before_enabled: false,
        ..ReminderConfig::default()
    };
    let scanner = scanner_for(&clinic, config, Arc::new(clinic.db.clone()), notifier.clone());

    let summaries = scanner.tick().await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].kind, ReminderKind::HourBefore);
    assert!(!stored(&clinic, day.id).await.reminder_24h_sent);
    assert!(stored(&clinic, hour.id).await.reminder_1h_sent);
}

#[tokio::test]
async fn test_failed_delivery_leaves_appointment_eligible() {
    let clinic = TestClinic::new().await;
    let notifier = Arc::new(RecordingNotifier::new());
    let appointment = confirmed_in(&clinic, Duration::hours(24)).await;
    let scanner = store_backed(&clinic, notifier.clone());

    notifier.set_failing(true);
    let summary = scanner.scan(ReminderKind::DayBefore).await.unwrap();
    assert_eq!((summary.due, summary.sent, summary.failed), (1, 0, 1));
    assert!(!stored(&clinic, appointment.id).await.reminder_24h_sent);

    notifier.set_failing(false);
    let retry = scanner.scan(ReminderKind::DayBefore).await.unwrap();
    assert_eq!(retry.sent, 1);
    assert!(stored(&clinic, appointment.id).await.reminder_24h_sent);
}

#[tokio::test]
async fn test_unknown_patient_is_skipped() {
    let clinic = TestClinic::new().await;
    let notifier = Arc::new(RecordingNotifier::new());
    let mut orphan = appointment_at(
        &clinic,
        TestClinic::epoch() + Duration::hours(24),
        AppointmentStatus::Confirmed,
    );
    orphan.patient_id = Uuid::new_v4();
    clinic.db.create(&orphan).await.unwrap();
    let known = confirmed_in(&clinic, Duration::hours(24) + Duration::minutes(1)).await;

    let scanner = store_backed(&clinic, notifier.clone());
    let summary = scanner.scan(ReminderKind::DayBefore).await.unwrap();

    assert_eq!((summary.due, summary.sent, summary.skipped), (2, 1, 1));
    assert!(!stored(&clinic, orphan.id).await.reminder_24h_sent);
    assert!(stored(&clinic, known.id).await.reminder_24h_sent);
}

#[tokio::test]
async fn test_marking_failure_is_not_fatal() {
    let clinic = TestClinic::new().await;
    let notifier = Arc::new(RecordingNotifier::new());
    let appointment = appointment_at(
        &clinic,
        TestClinic::epoch() + Duration::hours(24),
        AppointmentStatus::Confirmed,
    );

    let mut appointments = MockAppointments::new();
    let due = appointment.clone();
    appointments
        .expect_find_by_scheduled_at_range()
        .returning(move |_, _, _| Ok(vec![due.clone()]));
    appointments
        .expect_mark_reminder_24h_sent()
        .times(2)
        .returning(|_| Err(DatabaseError::Unavailable("write timeout".to_string())));

    let scanner = scanner_for(&clinic, ReminderConfig::default(), Arc::new(appointments), notifier.clone());

    let summary = scanner.scan(ReminderKind::DayBefore).await.unwrap();
    assert_eq!((summary.sent, summary.unmarked), (1, 1));

    // Still eligible, so the next scan sends again.
    let again = scanner.scan(ReminderKind::DayBefore).await.unwrap();
    assert_eq!(again.sent, 1);
    assert_eq!(notifier.sent_of_kind(NotificationKind::Reminder).len(), 2);
}

#[tokio::test]
async fn test_query_failure_is_reported() {
    let clinic = TestClinic::new().await;
    let notifier = Arc::new(RecordingNotifier::new());

    let mut appointments = MockAppointments::new();
    appointments
        .expect_find_by_scheduled_at_range()
        .returning(|_, _, _| Err(DatabaseError::Unavailable("connection reset".to_string())));
    let scanner = scanner_for(&clinic, ReminderConfig::default(), Arc::new(appointments), notifier.clone());

    assert_matches!(
        scanner.scan(ReminderKind::HourBefore).await,
        Err(ReminderError::Database(DatabaseError::Unavailable(_)))
    );
    assert!(scanner.tick().await.is_empty());
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_spawned_scanner_ticks_immediately_and_stops() {
    let clinic = TestClinic::new().await;
    let notifier = Arc::new(RecordingNotifier::new());
    let appointment = confirmed_in(&clinic, Duration::hours(1)).await;

    let config = ReminderConfig {
        interval: StdDuration::from_secs(3600),
        ..ReminderConfig::default()
    };
    let scanner = Arc::new(scanner_for(&clinic, config, Arc::new(clinic.db.clone()), notifier.clone()));
    let handle = scanner.spawn();

    tokio::time::timeout(StdDuration::from_secs(5), async {
        while notifier.sent().is_empty() {
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
    })
    .await
    .expect("first tick should run on start");

    tokio::time::timeout(StdDuration::from_secs(5), handle.shutdown())
        .await
        .expect("scanner should stop promptly");
    assert!(stored(&clinic, appointment.id).await.reminder_1h_sent);
}

#[tokio::test]
async fn test_overlapping_ticks_do_not_double_send() {
    let clinic = TestClinic::new().await;
    let notifier = Arc::new(SlowNotifier::new(StdDuration::from_millis(100)));
    let appointment = confirmed_in(&clinic, Duration::hours(24)).await;
    let scanner = scanner_for(
        &clinic,
        ReminderConfig::default(),
        Arc::new(clinic.db.clone()),
        notifier.clone(),
    );

    let (first, second) = tokio::join!(scanner.tick(), scanner.tick());

    assert_eq!(summary_of(&first, ReminderKind::DayBefore).sent, 1);
    assert!(second.is_empty());
    assert_eq!(notifier.inner.sent_of_kind(NotificationKind::Reminder).len(), 1);
    assert!(stored(&clinic, appointment.id).await.reminder_24h_sent);
}

#[tokio::test]
async fn test_shutdown_during_a_tick_runs_no_further_tick() {
    let clinic = TestClinic::new().await;
    let notifier = Arc::new(SlowNotifier::new(StdDuration::from_millis(200)));
    let appointment = appointment_at(
        &clinic,
        TestClinic::epoch() + Duration::hours(24),
        AppointmentStatus::Confirmed,
    );

    // Never flagged, so every tick would send again.
    let mut appointments = MockAppointments::new();
    appointments
        .expect_find_by_scheduled_at_range()
        .returning(move |_, _, _| Ok(vec![appointment.clone()]));
    appointments.expect_mark_reminder_24h_sent().returning(|_| Ok(()));

    let config = ReminderConfig {
        interval: StdDuration::from_millis(10),
        hour_before_enabled: false,
        ..ReminderConfig::default()
    };
    let scanner = Arc::new(scanner_for(&clinic, config, Arc::new(appointments), notifier.clone()));
    let handle = scanner.spawn();

    // Let the first tick reach the slow send, with the next tick already due.
    tokio::time::sleep(StdDuration::from_millis(50)).await;
    handle.shutdown().await;

    assert_eq!(notifier.inner.sent_of_kind(NotificationKind::Reminder).len(), 1);
}
