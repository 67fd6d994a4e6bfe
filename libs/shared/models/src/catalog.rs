use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound on a single service's length (8 hours).
pub const MAX_SERVICE_DURATION_MINUTES: i32 = 480;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub specialty: String,
    pub active: bool,
    pub service_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    pub fn offers(&self, service_id: Uuid) -> bool {
        self.service_ids.contains(&service_id)
    }
}

/// Patients are keyed by their user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub price: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Service {
    pub fn has_valid_duration(&self) -> bool {
        self.duration_minutes > 0 && self.duration_minutes <= MAX_SERVICE_DURATION_MINUTES
    }
}
