use std::sync::Arc;

use chrono::NaiveTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{DoctorRepository, ScheduleRepository};
use shared_models::auth::{Actor, Role};
use shared_models::schedule::{format_clock_time, parse_clock_time, DayOfWeek, ScheduleBlock};
use shared_utils::clock::Clock;

use crate::models::{CreateScheduleRequest, ScheduleError, UpdateScheduleRequest};

/// Weekly availability management for doctors.
pub struct ScheduleService {
    doctors: Arc<dyn DoctorRepository>,
    schedules: Arc<dyn ScheduleRepository>,
    clock: Arc<dyn Clock>,
}

impl ScheduleService {
    pub fn new(
        doctors: Arc<dyn DoctorRepository>,
        schedules: Arc<dyn ScheduleRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            doctors,
            schedules,
            clock,
        }
    }

    #[instrument(skip(self, request), fields(actor = %actor.user_id))]
    pub async fn create_schedule(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        request: CreateScheduleRequest,
    ) -> Result<ScheduleBlock, ScheduleError> {
        self.authorize(actor, doctor_id).await?;
        if self.doctors.find_by_id(doctor_id).await?.is_none() {
            return Err(ScheduleError::DoctorNotFound);
        }

        let now = self.clock.now();
        let block = ScheduleBlock {
            id: Uuid::new_v4(),
            doctor_id,
            day_of_week: parse_day(&request.day_of_week)?,
            start_time: parse_time(&request.start_time)?,
            end_time: parse_time(&request.end_time)?,
            slot_duration_minutes: request.slot_duration_minutes,
            active: request.active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        validate(&block)?;
        self.ensure_no_overlap(&block).await?;
        self.schedules.create(&block).await?;

        info!(
            "Created schedule {} for doctor {} on {} {}-{}",
            block.id,
            doctor_id,
            block.day_of_week,
            format_clock_time(&block.start_time),
            format_clock_time(&block.end_time)
        );
        Ok(block)
    }

    #[instrument(skip(self, request), fields(actor = %actor.user_id))]
    pub async fn update_schedule(
        &self,
        actor: &Actor,
        schedule_id: Uuid,
        request: UpdateScheduleRequest,
    ) -> Result<ScheduleBlock, ScheduleError> {
        let mut block = self
            .schedules
            .find_by_id(schedule_id)
            .await?
            .ok_or(ScheduleError::NotFound)?;
        self.authorize(actor, block.doctor_id).await?;

        if let Some(day) = request.day_of_week {
            block.day_of_week = parse_day(&day)?;
        }
        if let Some(start) = request.start_time {
            block.start_time = parse_time(&start)?;
        }
        if let Some(end) = request.end_time {
            block.end_time = parse_time(&end)?;
        }
        if let Some(duration) = request.slot_duration_minutes {
            block.slot_duration_minutes = duration;
        }
        if let Some(active) = request.active {
            block.active = active;
        }
        block.updated_at = self.clock.now();

        validate(&block)?;
        self.ensure_no_overlap(&block).await?;
        self.schedules.update(&block).await?;

        info!("Updated schedule {} for doctor {}", block.id, block.doctor_id);
        Ok(block)
    }

    #[instrument(skip(self), fields(actor = %actor.user_id))]
    pub async fn delete_schedule(&self, actor: &Actor, schedule_id: Uuid) -> Result<(), ScheduleError> {
        let block = self
            .schedules
            .find_by_id(schedule_id)
            .await?
            .ok_or(ScheduleError::NotFound)?;
        self.authorize(actor, block.doctor_id).await?;

        if !self.schedules.delete(schedule_id).await? {
            return Err(ScheduleError::NotFound);
        }

        info!("Deleted schedule {} for doctor {}", schedule_id, block.doctor_id);
        Ok(())
    }

    /// Every block for the doctor, ordered by weekday then start time.
    pub async fn get_doctor_schedules(&self, doctor_id: Uuid) -> Result<Vec<ScheduleBlock>, ScheduleError> {
        if self.doctors.find_by_id(doctor_id).await?.is_none() {
            return Err(ScheduleError::DoctorNotFound);
        }

        let blocks = self.schedules.find_by_doctor(doctor_id).await?;
        debug!("Doctor {} has {} schedule block(s)", doctor_id, blocks.len());
        Ok(blocks)
    }

    async fn authorize(&self, actor: &Actor, doctor_id: Uuid) -> Result<(), ScheduleError> {
        match actor.role {
            Role::Admin => Ok(()),
            Role::Doctor => {
                let own = self.doctors.find_id_by_user_id(actor.user_id).await?;
                if own == Some(doctor_id) {
                    Ok(())
                } else {
                    warn!("User {} tried to manage schedule of doctor {}", actor.user_id, doctor_id);
                    Err(ScheduleError::Forbidden)
                }
            }
            Role::Patient => Err(ScheduleError::Forbidden),
        }
    }

    /// Active blocks may not intersect other active blocks of the same doctor/day.
    async fn ensure_no_overlap(&self, block: &ScheduleBlock) -> Result<(), ScheduleError> {
        if !block.active {
            return Ok(());
        }

        let same_day = self
            .schedules
            .find_by_doctor_and_day(block.doctor_id, block.day_of_week)
            .await?;

        match same_day
            .iter()
            .find(|other| other.id != block.id && other.active && block.overlaps(other))
        {
            Some(other) => Err(ScheduleError::OverlapConflict { existing: other.id }),
            None => Ok(()),
        }
    }
}

fn parse_day(raw: &str) -> Result<DayOfWeek, ScheduleError> {
    raw.parse()
        .map_err(|_| ScheduleError::InvalidDayOfWeek(raw.to_string()))
}

fn parse_time(raw: &str) -> Result<NaiveTime, ScheduleError> {
    parse_clock_time(raw).ok_or_else(|| ScheduleError::InvalidTimeFormat(raw.to_string()))
}

fn validate(block: &ScheduleBlock) -> Result<(), ScheduleError> {
    if block.start_time >= block.end_time {
        return Err(ScheduleError::InvalidRange {
            start: format_clock_time(&block.start_time),
            end: format_clock_time(&block.end_time),
        });
    }
    if block.slot_duration_minutes <= 0 {
        return Err(ScheduleError::InvalidDuration(block.slot_duration_minutes));
    }
    Ok(())
}
