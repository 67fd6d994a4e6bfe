use std::sync::Arc;

use chrono::{Duration, FixedOffset, NaiveDate};
use tracing::{debug, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{AppointmentRepository, DoctorRepository, ScheduleRepository, ServiceRepository};
use shared_models::appointment::Appointment;
use shared_models::catalog::MAX_SERVICE_DURATION_MINUTES;
use shared_models::interval::TimeRange;
use shared_models::schedule::{clinic_day_bounds, clinic_instant, DayOfWeek, TimeSlot};

use crate::models::ScheduleError;
use crate::services::slots::generate_slots;

/// Marks each candidate unavailable when its `[start, start + duration)` on
/// `date` overlaps an appointment that still occupies the doctor.
pub fn resolve<I>(
    candidates: I,
    date: NaiveDate,
    clinic_offset: FixedOffset,
    existing: &[Appointment],
    service_duration_minutes: i32,
) -> Vec<TimeSlot>
where
    I: IntoIterator<Item = TimeSlot>,
{
    candidates
        .into_iter()
        .map(|mut slot| {
            let range = TimeRange::starting_at(
                clinic_instant(date, slot.start_time, clinic_offset),
                service_duration_minutes,
            );
            slot.available = !existing.iter().any(|appointment| appointment.blocks(&range));
            slot
        })
        .collect()
}

pub struct AvailabilityService {
    doctors: Arc<dyn DoctorRepository>,
    services: Arc<dyn ServiceRepository>,
    schedules: Arc<dyn ScheduleRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    clinic_offset: FixedOffset,
}

impl AvailabilityService {
    pub fn new(
        config: &AppConfig,
        doctors: Arc<dyn DoctorRepository>,
        services: Arc<dyn ServiceRepository>,
        schedules: Arc<dyn ScheduleRepository>,
        appointments: Arc<dyn AppointmentRepository>,
    ) -> Self {
        Self {
            doctors,
            services,
            schedules,
            appointments,
            clinic_offset: config.clinic_offset_or_utc(),
        }
    }

    /// Slots for a doctor/service on a clinic-local date, each flagged available or not.
    /// A point-in-time snapshot; booking re-checks under its own transaction.
    #[instrument(skip(self))]
    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        service_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, ScheduleError> {
        // Same eligibility checks, in the same order, as booking.
        let doctor = self
            .doctors
            .find_by_id(doctor_id)
            .await?
            .ok_or(ScheduleError::DoctorNotFound)?;
        if !doctor.active {
            return Err(ScheduleError::DoctorInactive);
        }

        let service = self
            .services
            .find_by_id(service_id)
            .await?
            .ok_or(ScheduleError::ServiceNotFound)?;
        if !service.active {
            return Err(ScheduleError::ServiceInactive);
        }
        if !service.has_valid_duration() {
            return Err(ScheduleError::InvalidServiceDuration(service.duration_minutes));
        }
        if !self.doctors.offers_service(doctor_id, service_id).await? {
            return Err(ScheduleError::ServiceNotOffered);
        }

        let day = DayOfWeek::of_date(date);
        let blocks = self.schedules.find_by_doctor_and_day(doctor_id, day).await?;
        if blocks.is_empty() {
            debug!("Doctor {} has no schedule on {}", doctor_id, day);
            return Ok(Vec::new());
        }

        // Reach back far enough to see visits that started the evening before.
        let (day_start, day_end) = clinic_day_bounds(date, self.clinic_offset);
        let lookback = day_start - Duration::minutes(i64::from(MAX_SERVICE_DURATION_MINUTES));
        let existing = self
            .appointments
            .find_by_doctor_and_date_range(doctor_id, lookback, day_end)
            .await?;

        let slots = resolve(
            generate_slots(&blocks, service.duration_minutes),
            date,
            self.clinic_offset,
            &existing,
            service.duration_minutes,
        );

        debug!(
            "Found {} slot(s), {} available, for doctor {} on {}",
            slots.len(),
            slots.iter().filter(|s| s.available).count(),
            doctor_id,
            date
        );
        Ok(slots)
    }
}
