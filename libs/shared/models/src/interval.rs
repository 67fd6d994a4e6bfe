use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open overlap test: `[a_start, a_end)` and `[b_start, b_end)` share at
/// least one instant. Touching boundaries (`a_end == b_start`) do not overlap.
pub fn overlaps<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && b_start < a_end
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn starting_at(start: DateTime<Utc>, duration_minutes: i32) -> Self {
        Self {
            start,
            end: start + Duration::minutes(i64::from(duration_minutes)),
        }
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }
}
