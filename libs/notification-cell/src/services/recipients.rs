use std::sync::Arc;

use chrono::FixedOffset;
use tracing::warn;

use shared_config::AppConfig;
use shared_database::{DoctorRepository, PatientRepository};
use shared_models::appointment::Appointment;
use shared_models::notification::{AppointmentNotice, Recipient};

use crate::error::DispatchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participants {
    pub patient: Recipient,
    pub doctor: Recipient,
    pub notice: AppointmentNotice,
}

/// Looks up the people behind an appointment and renders the notice they receive.
pub struct ParticipantResolver {
    patients: Arc<dyn PatientRepository>,
    doctors: Arc<dyn DoctorRepository>,
    clinic_offset: FixedOffset,
}

impl ParticipantResolver {
    pub fn new(
        config: &AppConfig,
        patients: Arc<dyn PatientRepository>,
        doctors: Arc<dyn DoctorRepository>,
    ) -> Self {
        Self {
            patients,
            doctors,
            clinic_offset: config.clinic_offset_or_utc(),
        }
    }

    pub async fn resolve(
        &self,
        appointment: &Appointment,
        detail: Option<String>,
    ) -> Result<Participants, DispatchError> {
        let not_found = || DispatchError::RecipientNotFound {
            appointment_id: appointment.id,
        };

        let patient = self.patients.find_by_id(appointment.patient_id).await?.ok_or_else(|| {
            warn!("Patient {} of appointment {} not found", appointment.patient_id, appointment.id);
            not_found()
        })?;
        let doctor = self.doctors.find_by_id(appointment.doctor_id).await?.ok_or_else(|| {
            warn!("Doctor {} of appointment {} not found", appointment.doctor_id, appointment.id);
            not_found()
        })?;

        let local = appointment.scheduled_at.with_timezone(&self.clinic_offset);
        let notice = AppointmentNotice {
            appointment_id: appointment.id,
            patient_name: patient.full_name.clone(),
            doctor_name: doctor.full_name.clone(),
            date: local.format("%Y-%m-%d").to_string(),
            time: local.format("%H:%M").to_string(),
            detail,
        };

        Ok(Participants {
            patient: Recipient {
                name: patient.full_name,
                email: patient.email,
            },
            doctor: Recipient {
                name: doctor.full_name,
                email: doctor.email,
            },
            notice,
        })
    }
}
