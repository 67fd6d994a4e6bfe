use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use notification_cell::{NotificationDispatcher, NotificationJob};
use shared_config::AppConfig;
use shared_database::{
    AppointmentRepository, DoctorRepository, PatientRepository, ServiceRepository, UnitOfWork,
};
use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::auth::{Actor, Role};
use shared_models::notification::NotificationKind;
use shared_utils::clock::Clock;

use crate::models::{
    AppointmentError, CancelAppointmentRequest, CompleteAppointmentRequest, CreateAppointmentRequest,
    RescheduleAppointmentRequest,
};
use crate::services::conflict::find_conflict;
use crate::services::lifecycle::{AppointmentLifecycleService, LifecycleRules};

/// Storage ports the booking flow needs.
#[derive(Clone)]
pub struct BookingRepositories {
    pub appointments: Arc<dyn AppointmentRepository>,
    pub patients: Arc<dyn PatientRepository>,
    pub doctors: Arc<dyn DoctorRepository>,
    pub services: Arc<dyn ServiceRepository>,
    pub unit_of_work: Arc<dyn UnitOfWork>,
}

impl BookingRepositories {
    /// Uses one store for every port.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: AppointmentRepository
            + PatientRepository
            + DoctorRepository
            + ServiceRepository
            + UnitOfWork
            + 'static,
    {
        Self {
            appointments: store.clone(),
            patients: store.clone(),
            doctors: store.clone(),
            services: store.clone(),
            unit_of_work: store,
        }
    }
}

pub struct AppointmentBookingService {
    repos: BookingRepositories,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    lifecycle: AppointmentLifecycleService,
    clinic_offset: FixedOffset,
}

impl AppointmentBookingService {
    pub fn new(
        config: &AppConfig,
        repos: BookingRepositories,
        dispatcher: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repos,
            dispatcher,
            clock,
            lifecycle: AppointmentLifecycleService::new(LifecycleRules::from_config(config)),
            clinic_offset: config.clinic_offset_or_utc(),
        }
    }

    /// Books a pending appointment. The doctor's calendar is re-read and
    /// written inside one transaction, so two concurrent bookings of the
    /// same interval cannot both succeed.
    #[instrument(skip(self, request), fields(actor = %actor.user_id, doctor_id = %request.doctor_id))]
    pub async fn create_appointment(
        &self,
        actor: &Actor,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        if !(actor.is_admin() || (actor.role == Role::Patient && actor.user_id == request.patient_id)) {
            return Err(AppointmentError::Forbidden);
        }

        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(AppointmentError::Validation("Reason is required".to_string()));
        }

        let patient = self
            .repos
            .patients
            .find_by_id(request.patient_id)
            .await?
            .ok_or(AppointmentError::PatientNotFound)?;
        if !patient.active {
            return Err(AppointmentError::PatientInactive);
        }

        let doctor = self
            .repos
            .doctors
            .find_by_id(request.doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;
        if !doctor.active {
            return Err(AppointmentError::DoctorInactive);
        }

        let service = self
            .repos
            .services
            .find_by_id(request.service_id)
            .await?
            .ok_or(AppointmentError::ServiceNotFound)?;
        if !service.active {
            return Err(AppointmentError::ServiceInactive);
        }
        if !service.has_valid_duration() {
            return Err(AppointmentError::Validation(format!(
                "Service {} has an invalid duration of {} minutes",
                service.id, service.duration_minutes
            )));
        }
        if !self.repos.doctors.offers_service(doctor.id, service.id).await? {
            return Err(AppointmentError::ServiceNotOffered);
        }

        let now = self.clock.now();
        if request.scheduled_at <= now {
            return Err(AppointmentError::PastSchedule);
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            doctor_id: doctor.id,
            service_id: service.id,
            scheduled_at: request.scheduled_at,
            duration_minutes: service.duration_minutes,
            reason: reason.to_string(),
            notes: request.notes.filter(|n| !n.trim().is_empty()),
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
            cancellation_reason: None,
            reminder_24h_sent: false,
            reminder_1h_sent: false,
        };

        let mut tx = self.repos.unit_of_work.begin(doctor.id).await?;
        if let Some(existing) = find_conflict(tx.as_mut(), &appointment.time_range(), None).await? {
            return Err(AppointmentError::SlotNotAvailable {
                conflicting: existing.id,
            });
        }
        tx.insert(appointment.clone()).await?;
        tx.commit().await?;

        info!(
            "Created appointment {} for patient {} with doctor {} at {}",
            appointment.id, appointment.patient_id, appointment.doctor_id, appointment.scheduled_at
        );
        self.notify(NotificationKind::Created, &appointment, None);
        Ok(appointment)
    }

    #[instrument(skip(self), fields(actor = %actor.user_id))]
    pub async fn confirm_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if !(actor.is_admin() || self.is_doctor_of_record(actor, appointment.doctor_id).await?) {
            return Err(AppointmentError::Forbidden);
        }

        let confirmed = self
            .transition(&appointment, |apt, now| self.lifecycle.confirm(apt, now))
            .await?;

        info!("Confirmed appointment {}", confirmed.id);
        self.notify(NotificationKind::Confirmed, &confirmed, None);
        Ok(confirmed)
    }

    #[instrument(skip(self, request), fields(actor = %actor.user_id))]
    pub async fn cancel_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        let allowed = actor.is_admin()
            || self.is_patient_of_record(actor, &appointment)
            || self.is_doctor_of_record(actor, appointment.doctor_id).await?;
        if !allowed {
            return Err(AppointmentError::Forbidden);
        }

        let cancelled = self
            .transition(&appointment, |apt, now| {
                self.lifecycle.cancel(apt, &request.reason, now)
            })
            .await?;

        info!(
            "Cancelled appointment {} by {} {}",
            cancelled.id, actor.role, actor.user_id
        );
        self.notify(
            NotificationKind::Cancelled,
            &cancelled,
            cancelled.cancellation_reason.clone(),
        );
        Ok(cancelled)
    }

    #[instrument(skip(self, request), fields(actor = %actor.user_id))]
    pub async fn complete_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: CompleteAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if !(actor.is_admin() || self.is_doctor_of_record(actor, appointment.doctor_id).await?) {
            return Err(AppointmentError::Forbidden);
        }

        let completed = self
            .transition(&appointment, |apt, now| {
                self.lifecycle.complete(apt, request.notes, now)
            })
            .await?;

        info!("Completed appointment {}", completed.id);
        self.notify(NotificationKind::Completed, &completed, completed.notes.clone());
        Ok(completed)
    }

    /// Moves an appointment to a new start time, keeping its status.
    #[instrument(skip(self, request), fields(actor = %actor.user_id))]
    pub async fn reschedule_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if !(actor.is_admin() || self.is_patient_of_record(actor, &appointment)) {
            return Err(AppointmentError::Forbidden);
        }

        let mut tx = self.repos.unit_of_work.begin(appointment.doctor_id).await?;
        let mut current = tx
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;
        let previous = current.scheduled_at;

        self.lifecycle
            .reschedule(&mut current, request.scheduled_at, self.clock.now())?;

        if let Some(existing) = find_conflict(tx.as_mut(), &current.time_range(), Some(current.id)).await? {
            return Err(AppointmentError::SlotNotAvailable {
                conflicting: existing.id,
            });
        }
        tx.update(current.clone()).await?;
        tx.commit().await?;

        info!(
            "Rescheduled appointment {} from {} to {}",
            current.id, previous, current.scheduled_at
        );
        Ok(current)
    }

    /// Visible to admins and to the patient and doctor of record.
    pub async fn get_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        let visible = actor.is_admin()
            || self.is_patient_of_record(actor, &appointment)
            || self.is_doctor_of_record(actor, appointment.doctor_id).await?;
        if !visible {
            return Err(AppointmentError::Forbidden);
        }
        Ok(appointment)
    }

    /// A patient's appointment history, newest first.
    pub async fn list_patient_appointments(
        &self,
        actor: &Actor,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if !(actor.is_admin() || (actor.role == Role::Patient && actor.user_id == patient_id)) {
            return Err(AppointmentError::Forbidden);
        }

        let appointments = self.repos.appointments.find_by_patient(patient_id).await?;
        debug!("Patient {} has {} appointment(s)", patient_id, appointments.len());
        Ok(appointments)
    }

    /// A doctor's agenda for one clinic-local day, earliest first.
    pub async fn list_doctor_appointments(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if !(actor.is_admin() || self.is_doctor_of_record(actor, doctor_id).await?) {
            return Err(AppointmentError::Forbidden);
        }

        Ok(self
            .repos
            .appointments
            .find_by_doctor_and_date(doctor_id, date, self.clinic_offset)
            .await?)
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.repos
            .appointments
            .find_by_id(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    /// Re-reads the appointment under the doctor's transaction, applies
    /// `change` and commits, so concurrent transitions cannot overwrite each other.
    async fn transition<F>(&self, appointment: &Appointment, change: F) -> Result<Appointment, AppointmentError>
    where
        F: FnOnce(&mut Appointment, DateTime<Utc>) -> Result<(), AppointmentError> + Send,
    {
        let mut tx = self.repos.unit_of_work.begin(appointment.doctor_id).await?;
        let mut current = tx
            .find_appointment(appointment.id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        change(&mut current, self.clock.now())?;

        tx.update(current.clone()).await?;
        tx.commit().await?;
        Ok(current)
    }

    fn is_patient_of_record(&self, actor: &Actor, appointment: &Appointment) -> bool {
        actor.role == Role::Patient && actor.user_id == appointment.patient_id
    }

    async fn is_doctor_of_record(&self, actor: &Actor, doctor_id: Uuid) -> Result<bool, AppointmentError> {
        if actor.role != Role::Doctor {
            return Ok(false);
        }
        let own = self.repos.doctors.find_id_by_user_id(actor.user_id).await?;
        Ok(own == Some(doctor_id))
    }

    fn notify(&self, kind: NotificationKind, appointment: &Appointment, detail: Option<String>) {
        let job = NotificationJob::new(kind, appointment);
        let job = match detail {
            Some(detail) => job.with_detail(detail),
            None => job,
        };

        if let Err(e) = self.dispatcher.submit(job) {
            warn!("{} notification for appointment {} not queued: {}", kind, appointment.id, e);
        }
    }
}
