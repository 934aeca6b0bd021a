use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Wall-clock time of day stored as minutes since midnight.
///
/// All slot arithmetic and comparisons happen on this integer form;
/// 12-hour labels ("1:00 PM") and 24-hour storage strings ("13:00")
/// convert losslessly in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self(hour * 60 + minute))
        } else {
            None
        }
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    /// Parses either the 24-hour storage form ("13:00") or a 12-hour
    /// label ("1:00 PM").
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        match s.split_once(' ') {
            Some((clock, meridiem)) => {
                let (hour12, minute) = split_clock(clock)?;
                if hour12 < 1 || hour12 > 12 || minute > 59 {
                    return None;
                }
                let hour = match meridiem.to_ascii_uppercase().as_str() {
                    "AM" => hour12 % 12,
                    "PM" => hour12 % 12 + 12,
                    _ => return None,
                };
                Self::from_hm(hour, minute)
            }
            None => {
                let (hour, minute) = split_clock(s)?;
                Self::from_hm(hour, minute)
            }
        }
    }

    /// 12-hour display label, e.g. "9:00 AM", "12:40 PM".
    pub fn label(self) -> String {
        let hour12 = match self.hour() % 12 {
            0 => 12,
            h => h,
        };
        let meridiem = if self.hour() < 12 { "AM" } else { "PM" };
        format!("{}:{:02} {}", hour12, self.minute(), meridiem)
    }

    /// Combines this time with a calendar date into a UTC instant.
    pub fn on(self, date: NaiveDate) -> Option<DateTime<Utc>> {
        date.and_hms_opt(self.hour() as u32, self.minute() as u32, 0)
            .map(|dt| dt.and_utc())
    }
}

fn split_clock(s: &str) -> Option<(u16, u16)> {
    let (h, m) = s.split_once(':')?;
    Some((h.parse().ok()?, m.parse().ok()?))
}

// Stored and transmitted as "HH:MM" (24-hour)
impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TimeOfDay::parse(&s)
            .ok_or_else(|| de::Error::custom(format!("invalid time of day: {}", s)))
    }
}

/// Weekly availability configuration, one row per doctor per day of week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyAvailabilityRule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: u8, // 0 = Sunday, 1 = Monday, etc.
    pub is_available: bool,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub lunch_break_start: Option<TimeOfDay>,
    pub lunch_break_end: Option<TimeOfDay>,
    pub slot_duration_minutes: u16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeeklyAvailabilityRule {
    /// Both break bounds must be present for the break to apply.
    pub fn lunch_break(&self) -> Option<(TimeOfDay, TimeOfDay)> {
        self.lunch_break_start.zip(self.lunch_break_end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Upcoming,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Upcoming => write!(f, "upcoming"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Booked appointment, consumed read-only by the slot engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub scheduled_start_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    PastDate,
    PastTime,
    DayOff,
    LunchBreak,
}

impl BlockReason {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockReason::PastDate => "past_date",
            BlockReason::PastTime => "past_time",
            BlockReason::DayOff => "day_off",
            BlockReason::LunchBreak => "lunch_break",
        }
    }
}

/// Classification of a single (date, time) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked {
        patient_id: Uuid,
        patient_name: String,
    },
    Blocked {
        reason: BlockReason,
    },
}

/// Ephemeral, derived slot; computed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySlot {
    pub time: TimeOfDay,
    pub label: String,
    #[serde(flatten)]
    pub status: SlotStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<DaySlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekSchedule {
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    pub days: Vec<DaySchedule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextAvailableSlot {
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    AlreadyBooked,
    PastDate,
    PastTime,
    DayOff,
    LunchBreak,
    OutsideSchedule,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::AlreadyBooked => "already_booked",
            RejectionReason::PastDate => "past_date",
            RejectionReason::PastTime => "past_time",
            RejectionReason::DayOff => "day_off",
            RejectionReason::LunchBreak => "lunch_break",
            RejectionReason::OutsideSchedule => "outside_schedule",
        }
    }
}

impl From<BlockReason> for RejectionReason {
    fn from(reason: BlockReason) -> Self {
        match reason {
            BlockReason::PastDate => RejectionReason::PastDate,
            BlockReason::PastTime => RejectionReason::PastTime,
            BlockReason::DayOff => RejectionReason::DayOff,
            BlockReason::LunchBreak => RejectionReason::LunchBreak,
        }
    }
}

/// Outcome of booking validation. A rejection is a normal return value,
/// not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum BookingDecision {
    Accepted,
    Rejected { reason: RejectionReason },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub date: NaiveDate,
    pub time: TimeOfDay,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub decision: BookingDecision,
    pub appointment: Option<Appointment>,
}

// Request DTOs for availability-rule management

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRuleRequest {
    pub day_of_week: u8,
    pub is_available: Option<bool>,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub lunch_break_start: Option<TimeOfDay>,
    pub lunch_break_end: Option<TimeOfDay>,
    pub slot_duration_minutes: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvailabilityRuleRequest {
    pub is_available: Option<bool>,
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
    pub lunch_break_start: Option<TimeOfDay>,
    pub lunch_break_end: Option<TimeOfDay>,
    pub slot_duration_minutes: Option<u16>,
}

// Error types specific to booking operations
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Invalid booking time: {0}")]
    InvalidTime(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
