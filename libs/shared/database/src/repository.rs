//! Storage ports consumed by the scheduling cells.
//!
//! Every trait is object-safe and used behind `Arc<dyn ...>`, so cells never
//! name a concrete storage engine.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use uuid::Uuid;

use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::catalog::{Doctor, Patient, Service};
use shared_models::schedule::{DayOfWeek, ScheduleBlock};

use crate::error::DatabaseError;

#[async_trait]
pub trait DoctorRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Doctor>, DatabaseError>;

    /// Maps an authenticated user to the doctor record they own.
    async fn find_id_by_user_id(&self, user_id: Uuid) -> Result<Option<Uuid>, DatabaseError>;

    async fn offers_service(&self, doctor_id: Uuid, service_id: Uuid) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, DatabaseError>;
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Service>, DatabaseError>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn create(&self, appointment: &Appointment) -> Result<(), DatabaseError>;

    async fn update(&self, appointment: &Appointment) -> Result<(), DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;

    async fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DatabaseError>;

    /// Appointments starting on `date` as seen on the clinic clock, ascending.
    async fn find_by_doctor_and_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        clinic_offset: FixedOffset,
    ) -> Result<Vec<Appointment>, DatabaseError>;

    /// Appointments with `start <= scheduled_at < end`, ascending.
    async fn find_by_doctor_and_date_range(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, DatabaseError>;

    /// Appointments in `status` with `start <= scheduled_at <= end`, ascending.
    async fn find_by_scheduled_at_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, DatabaseError>;

    async fn mark_reminder_24h_sent(&self, id: Uuid) -> Result<(), DatabaseError>;

    async fn mark_reminder_1h_sent(&self, id: Uuid) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn create(&self, block: &ScheduleBlock) -> Result<(), DatabaseError>;

    async fn update(&self, block: &ScheduleBlock) -> Result<(), DatabaseError>;

    /// Returns `false` when no block had that id.
    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduleBlock>, DatabaseError>;

    /// Blocks for one weekday ordered by start time, active or not.
    async fn find_by_doctor_and_day(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
    ) -> Result<Vec<ScheduleBlock>, DatabaseError>;

    /// All blocks for a doctor ordered by weekday then start time.
    async fn find_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<ScheduleBlock>, DatabaseError>;
}

/// Opens write scopes for appointment mutations.
///
/// A scope is bound to one doctor and is serialised against every other scope
/// for that doctor until it is committed or dropped, so a conflict check made
/// inside it still holds when its writes land.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self, doctor_id: Uuid) -> Result<Box<dyn BookingTransaction>, DatabaseError>;
}

/// Writes are staged and only become visible on `commit`. Dropping the
/// transaction discards them.
#[async_trait]
pub trait BookingTransaction: Send {
    fn doctor_id(&self) -> Uuid;

    async fn find_appointment(&mut self, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;

    /// The scoped doctor's appointments with `start <= scheduled_at < end`,
    /// including writes staged in this transaction.
    async fn appointments_in_range(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, DatabaseError>;

    async fn insert(&mut self, appointment: Appointment) -> Result<(), DatabaseError>;

    async fn update(&mut self, appointment: Appointment) -> Result<(), DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;
}
