use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::InMemoryDatabase;
use shared_models::auth::Actor;
use shared_models::catalog::{Doctor, Patient, Service};
use shared_models::notification::{
    AppointmentNotice, NotificationError, NotificationKind, NotificationPort, Recipient,
};
use shared_models::schedule::{clinic_instant, parse_clock_time, DayOfWeek};

use crate::clock::Clock;

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub kind: NotificationKind,
    pub recipient: Recipient,
    pub notice: AppointmentNotice,
}

/// Notification port that keeps every delivery in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every send fails with `NotificationError::Delivery`.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_of_kind(&self, kind: NotificationKind) -> Vec<SentNotification> {
        self.sent().into_iter().filter(|n| n.kind == kind).collect()
    }

    fn record(
        &self,
        kind: NotificationKind,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        if *self.failing.lock().unwrap() {
            return Err(NotificationError::Delivery(format!("{} to {} refused", kind, recipient.email)));
        }
        self.sent.lock().unwrap().push(SentNotification {
            kind,
            recipient: recipient.clone(),
            notice: notice.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn send_appointment_created(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.record(NotificationKind::Created, recipient, notice)
    }

    async fn send_appointment_confirmed(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.record(NotificationKind::Confirmed, recipient, notice)
    }

    async fn send_appointment_cancelled(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.record(NotificationKind::Cancelled, recipient, notice)
    }

    async fn send_appointment_completed(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.record(NotificationKind::Completed, recipient, notice)
    }

    async fn send_appointment_reminder(
        &self,
        recipient: &Recipient,
        notice: &AppointmentNotice,
    ) -> Result<(), NotificationError> {
        self.record(NotificationKind::Reminder, recipient, notice)
    }
}

/// A seeded clinic: one doctor offering one 30 minute service, one patient,
/// an admin, and a clock frozen on Friday 2030-03-01 08:00 UTC.
pub struct TestClinic {
    pub db: InMemoryDatabase,
    pub config: AppConfig,
    pub clock: Arc<ManualClock>,
    pub doctor: Doctor,
    pub patient: Patient,
    pub service: Service,
    pub admin: Actor,
}

impl TestClinic {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let db = InMemoryDatabase::new();
        let clock = Arc::new(ManualClock::new(Self::epoch()));

        let service = Service {
            id: Uuid::new_v4(),
            name: "General consultation".to_string(),
            description: Some("Standard visit".to_string()),
            duration_minutes: 30,
            price: 50.0,
            active: true,
            created_at: Self::epoch(),
        };
        db.insert_service(service.clone()).await;

        let clinic = Self {
            db,
            config,
            clock,
            doctor: Self::doctor_offering(&[service.id], "Dr. Ana Torres"),
            patient: Self::patient_named("Luis Ramos"),
            service,
            admin: Actor::admin(Uuid::new_v4()),
        };
        clinic.db.insert_doctor(clinic.doctor.clone()).await;
        clinic.db.insert_patient(clinic.patient.clone()).await;
        clinic
    }

    pub fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 1, 8, 0, 0).unwrap()
    }

    pub fn doctor_offering(service_ids: &[Uuid], name: &str) -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: format!("{}@clinic.test", name.to_lowercase().replace([' ', '.'], "")),
            specialty: "general".to_string(),
            active: true,
            service_ids: service_ids.to_vec(),
            created_at: Self::epoch(),
        }
    }

    pub fn patient_named(name: &str) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: format!("{}@mail.test", name.to_lowercase().replace(' ', ".")),
            active: true,
            created_at: Self::epoch(),
        }
    }

    pub async fn add_patient(&self, name: &str) -> Patient {
        let patient = Self::patient_named(name);
        self.db.insert_patient(patient.clone()).await;
        patient
    }

    pub async fn add_service(&self, name: &str, duration_minutes: i32, active: bool) -> Service {
        let service = Service {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            duration_minutes,
            price: 80.0,
            active,
            created_at: Self::epoch(),
        };
        self.db.insert_service(service.clone()).await;
        service
    }

    /// Re-registers the seeded doctor, e.g. after changing `service_ids` or `active`.
    pub async fn save_doctor(&mut self, doctor: Doctor) {
        self.db.insert_doctor(doctor.clone()).await;
        self.doctor = doctor;
    }

    pub fn doctor_actor(&self) -> Actor {
        Actor::doctor(self.doctor.user_id)
    }

    pub fn patient_actor(&self) -> Actor {
        Actor::patient(self.patient.id)
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        self.config.clinic_offset().unwrap()
    }

    /// The first `day` strictly after the clock's current date.
    pub fn next(&self, day: DayOfWeek) -> NaiveDate {
        let mut date = self.clock.now().with_timezone(&self.clinic_offset()).date_naive();
        loop {
            date = date.succ_opt().unwrap();
            if DayOfWeek::of_date(date) == day {
                return date;
            }
        }
    }

    /// `date` at clinic wall-clock time `hhmm`.
    pub fn at(&self, date: NaiveDate, hhmm: &str) -> DateTime<Utc> {
        clinic_instant(date, parse_clock_time(hhmm).unwrap(), self.clinic_offset())
    }
}
