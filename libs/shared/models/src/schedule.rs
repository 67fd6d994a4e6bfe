use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::interval::overlaps;

// ==============================================================================
// DAY OF WEEK
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }

    pub fn of_date(date: NaiveDate) -> Self {
        Self::from_weekday(date.weekday())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid day of week: {0}")]
pub struct ParseDayOfWeekError(pub String);

impl FromStr for DayOfWeek {
    type Err = ParseDayOfWeekError;

    /// Accepts full names and three-letter abbreviations, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        DayOfWeek::ALL
            .into_iter()
            .find(|day| day.as_str() == normalized || day.as_str()[..3] == normalized)
            .ok_or_else(|| ParseDayOfWeekError(s.to_string()))
    }
}

// ==============================================================================
// CLOCK TIMES (HH:MM)
// ==============================================================================

fn clock_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-1][0-9]|2[0-3]):([0-5][0-9])$").expect("clock pattern is a valid regex")
    })
}

/// Parses a strict 24-hour `HH:MM` wall-clock time.
pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let captures = clock_pattern().captures(raw)?;
    let hour = captures[1].parse().ok()?;
    let minute = captures[2].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

pub fn format_clock_time(time: &NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn minutes_since_midnight(time: &NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Serde adapter for `NaiveTime` fields stored as `"HH:MM"`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_clock_time(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_clock_time(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid time {:?}, expected HH:MM", raw)))
    }
}

// ==============================================================================
// CLINIC CLOCK
// ==============================================================================

/// The instant at which the clinic's wall clock reads `time` on `date`.
pub fn clinic_instant(date: NaiveDate, time: NaiveTime, clinic_offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(time);
    (local - Duration::seconds(i64::from(clinic_offset.local_minus_utc()))).and_utc()
}

pub fn clinic_date(instant: DateTime<Utc>, clinic_offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&clinic_offset).date_naive()
}

/// `[midnight, next midnight)` of a clinic-local date, as UTC instants.
pub fn clinic_day_bounds(date: NaiveDate, clinic_offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = clinic_instant(date, NaiveTime::MIN, clinic_offset);
    (start, start + Duration::days(1))
}

// ==============================================================================
// SCHEDULE BLOCKS
// ==============================================================================

/// A recurring weekly working window for one doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleBlock {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: DayOfWeek,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleBlock {
    pub fn start_minute(&self) -> u32 {
        minutes_since_midnight(&self.start_time)
    }

    pub fn end_minute(&self) -> u32 {
        minutes_since_midnight(&self.end_time)
    }

    /// Whether both blocks fall on the same doctor/day and their windows intersect.
    /// Activity is not considered here; callers decide which blocks take part.
    pub fn overlaps(&self, other: &ScheduleBlock) -> bool {
        self.doctor_id == other.doctor_id
            && self.day_of_week == other.day_of_week
            && overlaps(self.start_time, self.end_time, other.start_time, other.end_time)
    }
}

// ==============================================================================
// TIME SLOTS
// ==============================================================================

/// A derived, never persisted candidate start time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub available: bool,
}

impl TimeSlot {
    pub fn new(start_time: NaiveTime) -> Self {
        Self {
            start_time,
            available: true,
        }
    }

    pub fn label(&self) -> String {
        format_clock_time(&self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(day: DayOfWeek, start: &str, end: &str) -> ScheduleBlock {
        ScheduleBlock {
            id: Uuid::new_v4(),
            doctor_id: Uuid::nil(),
            day_of_week: day,
            start_time: parse_clock_time(start).unwrap(),
            end_time: parse_clock_time(end).unwrap(),
            slot_duration_minutes: 30,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(parse_clock_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_clock_time("00:00"), NaiveTime::from_hms_opt(0, 0, 0));
        assert_eq!(parse_clock_time("23:59"), NaiveTime::from_hms_opt(23, 59, 0));

        for bad in ["9:30", "24:00", "12:60", "12:5", "noon", "", "09:30:00", " 09:30"] {
            assert!(parse_clock_time(bad).is_none(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_day_of_week_parsing() {
        assert_eq!("monday".parse::<DayOfWeek>(), Ok(DayOfWeek::Monday));
        assert_eq!("Wed".parse::<DayOfWeek>(), Ok(DayOfWeek::Wednesday));
        assert_eq!(" SUNDAY ".parse::<DayOfWeek>(), Ok(DayOfWeek::Sunday));
        assert!("funday".parse::<DayOfWeek>().is_err());
        assert!("mo".parse::<DayOfWeek>().is_err());
    }

    #[test]
    fn test_day_of_date() {
        let date = NaiveDate::from_ymd_opt(2030, 3, 4).unwrap();
        assert_eq!(DayOfWeek::of_date(date), DayOfWeek::Monday);
        assert_eq!(DayOfWeek::of_date(date.succ_opt().unwrap()), DayOfWeek::Tuesday);
    }

    #[test]
    fn test_clinic_clock_conversions() {
        let lima = FixedOffset::west_opt(5 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2030, 3, 4).unwrap();
        let nine = parse_clock_time("09:00").unwrap();

        let instant = clinic_instant(date, nine, lima);
        assert_eq!(instant.to_rfc3339(), "2030-03-04T14:00:00+00:00");
        assert_eq!(clinic_date(instant, lima), date);

        let (start, end) = clinic_day_bounds(date, lima);
        assert_eq!(start.to_rfc3339(), "2030-03-04T05:00:00+00:00");
        assert_eq!(end - start, Duration::days(1));

        let late_evening = clinic_instant(date, parse_clock_time("21:30").unwrap(), lima);
        assert_eq!(clinic_date(late_evening, lima), date);
        assert_eq!(late_evening.date_naive(), date.succ_opt().unwrap());
    }

    #[test]
    fn test_block_overlap_rules() {
        let morning = block(DayOfWeek::Monday, "09:00", "12:00");
        let adjacent = block(DayOfWeek::Monday, "12:00", "14:00");
        let crossing = block(DayOfWeek::Monday, "11:30", "13:00");
        let other_day = block(DayOfWeek::Tuesday, "09:00", "12:00");

        assert!(!morning.overlaps(&adjacent));
        assert!(morning.overlaps(&crossing));
        assert!(crossing.overlaps(&morning));
        assert!(!morning.overlaps(&other_day));
    }

    #[test]
    fn test_block_serializes_clock_times() {
        let block = block(DayOfWeek::Thursday, "08:05", "17:45");
        let json = serde_json::to_value(&block).unwrap();

        assert_eq!(json["start_time"], "08:05");
        assert_eq!(json["end_time"], "17:45");
        assert_eq!(json["day_of_week"], "thursday");

        let back: ScheduleBlock = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }
}
