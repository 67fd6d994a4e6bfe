use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};
use tracing::debug;
use uuid::Uuid;

use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::catalog::{Doctor, Patient, Service};
use shared_models::schedule::{clinic_day_bounds, DayOfWeek, ScheduleBlock};

use crate::error::DatabaseError;
use crate::repository::{
    AppointmentRepository, BookingTransaction, DoctorRepository, PatientRepository,
    ScheduleRepository, ServiceRepository, UnitOfWork,
};

#[derive(Default)]
struct Tables {
    doctors: HashMap<Uuid, Doctor>,
    patients: HashMap<Uuid, Patient>,
    services: HashMap<Uuid, Service>,
    appointments: HashMap<Uuid, Appointment>,
    schedules: HashMap<Uuid, ScheduleBlock>,
}

/// Process-local storage engine backing every repository port.
///
/// Appointment writes for a doctor are serialised through a per-doctor lease
/// held by [`MemoryTransaction`] and by the reminder markers.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<RwLock<Tables>>,
    doctor_leases: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_doctor(&self, doctor: Doctor) {
        self.tables.write().await.doctors.insert(doctor.id, doctor);
    }

    pub async fn insert_patient(&self, patient: Patient) {
        self.tables.write().await.patients.insert(patient.id, patient);
    }

    pub async fn insert_service(&self, service: Service) {
        self.tables.write().await.services.insert(service.id, service);
    }

    pub async fn appointment_count(&self) -> usize {
        self.tables.read().await.appointments.len()
    }

    async fn lease(&self, doctor_id: Uuid) -> Result<OwnedMutexGuard<()>, DatabaseError> {
        let lease = {
            let mut leases = self
                .doctor_leases
                .lock()
                .map_err(|_| DatabaseError::Transaction("doctor lease table poisoned".to_string()))?;
            Arc::clone(leases.entry(doctor_id).or_default())
        };
        Ok(lease.lock_owned().await)
    }

    async fn mark_reminder(
        &self,
        id: Uuid,
        mark: fn(&mut Appointment),
    ) -> Result<(), DatabaseError> {
        let doctor_id = self
            .tables
            .read()
            .await
            .appointments
            .get(&id)
            .map(|a| a.doctor_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("appointment {}", id)))?;

        let _lease = self.lease(doctor_id).await?;
        let mut tables = self.tables.write().await;
        let appointment = tables
            .appointments
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("appointment {}", id)))?;
        mark(appointment);
        Ok(())
    }
}

fn sorted_by_start(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by_key(|a| a.scheduled_at);
    appointments
}

#[async_trait]
impl DoctorRepository for InMemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Doctor>, DatabaseError> {
        Ok(self.tables.read().await.doctors.get(&id).cloned())
    }

    async fn find_id_by_user_id(&self, user_id: Uuid) -> Result<Option<Uuid>, DatabaseError> {
        Ok(self
            .tables
            .read()
            .await
            .doctors
            .values()
            .find(|d| d.user_id == user_id)
            .map(|d| d.id))
    }

    async fn offers_service(&self, doctor_id: Uuid, service_id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self
            .tables
            .read()
            .await
            .doctors
            .get(&doctor_id)
            .map(|d| d.offers(service_id))
            .unwrap_or(false))
    }
}

#[async_trait]
impl PatientRepository for InMemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, DatabaseError> {
        Ok(self.tables.read().await.patients.get(&id).cloned())
    }
}

#[async_trait]
impl ServiceRepository for InMemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Service>, DatabaseError> {
        Ok(self.tables.read().await.services.get(&id).cloned())
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryDatabase {
    async fn create(&self, appointment: &Appointment) -> Result<(), DatabaseError> {
        let _lease = self.lease(appointment.doctor_id).await?;
        let mut tables = self.tables.write().await;
        if tables.appointments.contains_key(&appointment.id) {
            return Err(DatabaseError::Duplicate(format!("appointment {}", appointment.id)));
        }
        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn update(&self, appointment: &Appointment) -> Result<(), DatabaseError> {
        let _lease = self.lease(appointment.doctor_id).await?;
        let mut tables = self.tables.write().await;
        match tables.appointments.get_mut(&appointment.id) {
            Some(existing) => {
                *existing = appointment.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("appointment {}", appointment.id))),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut found: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        Ok(found)
    }

    async fn find_by_doctor_and_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        clinic_offset: FixedOffset,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let (start, end) = clinic_day_bounds(date, clinic_offset);
        self.find_by_doctor_and_date_range(doctor_id, start, end).await
    }

    async fn find_by_doctor_and_date_range(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(sorted_by_start(
            tables
                .appointments
                .values()
                .filter(|a| a.doctor_id == doctor_id && a.scheduled_at >= start && a.scheduled_at < end)
                .cloned()
                .collect(),
        ))
    }

    async fn find_by_scheduled_at_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(sorted_by_start(
            tables
                .appointments
                .values()
                .filter(|a| a.status == status && a.scheduled_at >= start && a.scheduled_at <= end)
                .cloned()
                .collect(),
        ))
    }

    async fn mark_reminder_24h_sent(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.mark_reminder(id, |a| a.reminder_24h_sent = true).await
    }

    async fn mark_reminder_1h_sent(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.mark_reminder(id, |a| a.reminder_1h_sent = true).await
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryDatabase {
    async fn create(&self, block: &ScheduleBlock) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.schedules.contains_key(&block.id) {
            return Err(DatabaseError::Duplicate(format!("schedule {}", block.id)));
        }
        tables.schedules.insert(block.id, block.clone());
        Ok(())
    }

    async fn update(&self, block: &ScheduleBlock) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables.schedules.get_mut(&block.id) {
            Some(existing) => {
                *existing = block.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("schedule {}", block.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.tables.write().await.schedules.remove(&id).is_some())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduleBlock>, DatabaseError> {
        Ok(self.tables.read().await.schedules.get(&id).cloned())
    }

    async fn find_by_doctor_and_day(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
    ) -> Result<Vec<ScheduleBlock>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut blocks: Vec<ScheduleBlock> = tables
            .schedules
            .values()
            .filter(|b| b.doctor_id == doctor_id && b.day_of_week == day)
            .cloned()
            .collect();
        blocks.sort_by_key(|b| b.start_time);
        Ok(blocks)
    }

    async fn find_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<ScheduleBlock>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut blocks: Vec<ScheduleBlock> = tables
            .schedules
            .values()
            .filter(|b| b.doctor_id == doctor_id)
            .cloned()
            .collect();
        blocks.sort_by_key(|b| (b.day_of_week, b.start_time));
        Ok(blocks)
    }
}

// ==============================================================================
// TRANSACTIONS
// ==============================================================================

enum StagedWrite {
    Insert(Appointment),
    Update(Appointment),
}

impl StagedWrite {
    fn appointment(&self) -> &Appointment {
        match self {
            StagedWrite::Insert(a) | StagedWrite::Update(a) => a,
        }
    }
}

pub struct MemoryTransaction {
    doctor_id: Uuid,
    tables: Arc<RwLock<Tables>>,
    staged: Vec<StagedWrite>,
    _lease: OwnedMutexGuard<()>,
}

impl MemoryTransaction {
    fn staged_version(&self, id: Uuid) -> Option<&Appointment> {
        self.staged
            .iter()
            .rev()
            .map(StagedWrite::appointment)
            .find(|a| a.id == id)
    }

    fn ensure_scoped(&self, appointment: &Appointment) -> Result<(), DatabaseError> {
        if appointment.doctor_id != self.doctor_id {
            return Err(DatabaseError::Transaction(format!(
                "appointment {} belongs to doctor {}, transaction is scoped to {}",
                appointment.id, appointment.doctor_id, self.doctor_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryDatabase {
    async fn begin(&self, doctor_id: Uuid) -> Result<Box<dyn BookingTransaction>, DatabaseError> {
        let lease = self.lease(doctor_id).await?;
        debug!("Opened booking transaction for doctor {}", doctor_id);
        Ok(Box::new(MemoryTransaction {
            doctor_id,
            tables: Arc::clone(&self.tables),
            staged: Vec::new(),
            _lease: lease,
        }))
    }
}

#[async_trait]
impl BookingTransaction for MemoryTransaction {
    fn doctor_id(&self) -> Uuid {
        self.doctor_id
    }

    async fn find_appointment(&mut self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        if let Some(staged) = self.staged_version(id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn appointments_in_range(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let mut visible: HashMap<Uuid, Appointment> = self
            .tables
            .read()
            .await
            .appointments
            .values()
            .filter(|a| a.doctor_id == self.doctor_id)
            .map(|a| (a.id, a.clone()))
            .collect();

        for write in &self.staged {
            let appointment = write.appointment();
            visible.insert(appointment.id, appointment.clone());
        }

        Ok(sorted_by_start(
            visible
                .into_values()
                .filter(|a| a.scheduled_at >= start && a.scheduled_at < end)
                .collect(),
        ))
    }

    async fn insert(&mut self, appointment: Appointment) -> Result<(), DatabaseError> {
        self.ensure_scoped(&appointment)?;
        if self.staged_version(appointment.id).is_some()
            || self.tables.read().await.appointments.contains_key(&appointment.id)
        {
            return Err(DatabaseError::Duplicate(format!("appointment {}", appointment.id)));
        }
        self.staged.push(StagedWrite::Insert(appointment));
        Ok(())
    }

    async fn update(&mut self, appointment: Appointment) -> Result<(), DatabaseError> {
        self.ensure_scoped(&appointment)?;
        if self.staged_version(appointment.id).is_none()
            && !self.tables.read().await.appointments.contains_key(&appointment.id)
        {
            return Err(DatabaseError::NotFound(format!("appointment {}", appointment.id)));
        }
        self.staged.push(StagedWrite::Update(appointment));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let MemoryTransaction {
            doctor_id,
            tables,
            staged,
            _lease,
        } = *self;

        let mut tables = tables.write().await;
        let count = staged.len();
        for write in staged {
            match write {
                StagedWrite::Insert(a) | StagedWrite::Update(a) => {
                    tables.appointments.insert(a.id, a);
                }
            }
        }
        debug!("Committed {} write(s) for doctor {}", count, doctor_id);
        Ok(())
    }
}
