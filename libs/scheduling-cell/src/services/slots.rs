//! Slot availability engine.
//!
//! Pure calendar computation: given a doctor's weekly availability rules,
//! the booked appointments, and a caller-supplied `now`, derives the
//! per-day, per-slot booking status used to render a booking calendar and
//! to validate booking requests. Owns no state and performs no I/O, so it
//! is safe to call from any number of tasks.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentStatus, BlockReason, BookingDecision, DaySchedule, DaySlot,
    SlotStatus, TimeOfDay, WeeklyAvailabilityRule,
};

// Grid used before a doctor has configured any availability:
// 09:00-19:00, lunch 13:00-14:00, 20-minute slots.
const DEFAULT_START_MINUTES: u16 = 9 * 60;
const DEFAULT_END_MINUTES: u16 = 19 * 60;
const DEFAULT_LUNCH_START_MINUTES: u16 = 13 * 60;
const DEFAULT_LUNCH_END_MINUTES: u16 = 14 * 60;
pub const DEFAULT_SLOT_DURATION_MINUTES: u16 = 20;

/// Day-of-week index with Sunday = 0, matching the stored rules.
pub fn day_of_week_index(date: NaiveDate) -> u8 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

/// At most one rule per day of week; the boundary enforces that on write.
pub fn rule_for_day(
    rules: &[WeeklyAvailabilityRule],
    date: NaiveDate,
) -> Option<&WeeklyAvailabilityRule> {
    let day = day_of_week_index(date);
    rules.iter().find(|rule| rule.day_of_week == day)
}

/// Generates the ordered slot grid for one day. `None` means no rule is
/// configured for that day, in which case the default grid applies so the
/// calendar has a stable shape.
///
/// Slots are emitted at `slot_duration` steps from the start of the working
/// window; a slot whose end would pass the window boundary is dropped, and
/// slots starting inside `[lunch_start, lunch_end)` are excluded. A rule
/// with `start >= end` or a zero duration yields no slots.
pub fn generate_day_slots(rule: Option<&WeeklyAvailabilityRule>) -> Vec<TimeOfDay> {
    let (start, end, lunch, duration) = match rule {
        Some(rule) => (
            rule.start_time.minutes() as u32,
            rule.end_time.minutes() as u32,
            rule.lunch_break()
                .map(|(s, e)| (s.minutes() as u32, e.minutes() as u32)),
            rule.slot_duration_minutes as u32,
        ),
        None => (
            DEFAULT_START_MINUTES as u32,
            DEFAULT_END_MINUTES as u32,
            Some((
                DEFAULT_LUNCH_START_MINUTES as u32,
                DEFAULT_LUNCH_END_MINUTES as u32,
            )),
            DEFAULT_SLOT_DURATION_MINUTES as u32,
        ),
    };

    if duration == 0 || start >= end {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut current = start;

    while current + duration <= end {
        let in_lunch = lunch.is_some_and(|(lunch_start, lunch_end)| {
            current >= lunch_start && current < lunch_end
        });

        if !in_lunch {
            if let Some(time) = TimeOfDay::from_minutes(current as u16) {
                slots.push(time);
            }
        }

        current += duration;
    }

    slots
}

fn minutes_of(instant: DateTime<Utc>) -> u16 {
    (instant.time().hour() * 60 + instant.time().minute()) as u16
}

/// Classifies one (date, time) pair. First match wins, in this order:
/// past date, past time (equality counts as past), day off (no rule or
/// rule marked unavailable), lunch break, booked, available.
///
/// Lunch blocking is checked before the appointment lookup so a data
/// anomaly inside a break never surfaces as bookable.
pub fn classify_slot(
    date: NaiveDate,
    time: TimeOfDay,
    rules: &[WeeklyAvailabilityRule],
    appointments: &[Appointment],
    now: DateTime<Utc>,
) -> SlotStatus {
    let today = now.date_naive();

    if date < today {
        return SlotStatus::Blocked {
            reason: BlockReason::PastDate,
        };
    }

    if date == today && time.minutes() <= minutes_of(now) {
        return SlotStatus::Blocked {
            reason: BlockReason::PastTime,
        };
    }

    let rule = match rule_for_day(rules, date) {
        Some(rule) if rule.is_available => rule,
        _ => {
            return SlotStatus::Blocked {
                reason: BlockReason::DayOff,
            }
        }
    };

    if let Some((lunch_start, lunch_end)) = rule.lunch_break() {
        if time >= lunch_start && time < lunch_end {
            return SlotStatus::Blocked {
                reason: BlockReason::LunchBreak,
            };
        }
    }

    let booked = appointments.iter().find(|apt| {
        apt.status != AppointmentStatus::Cancelled
            && apt.scheduled_start_time.date_naive() == date
            && minutes_of(apt.scheduled_start_time) == time.minutes()
    });

    if let Some(apt) = booked {
        return SlotStatus::Booked {
            patient_id: apt.patient_id,
            patient_name: apt.patient_name.clone(),
        };
    }

    SlotStatus::Available
}

/// Booking precondition: accepts only a slot that classifies as available
/// and lies on the day's generated grid. Must be re-run at write time
/// against fresh appointment data, never trusted from an earlier read.
pub fn validate_booking(
    date: NaiveDate,
    time: TimeOfDay,
    rules: &[WeeklyAvailabilityRule],
    appointments: &[Appointment],
    now: DateTime<Utc>,
) -> BookingDecision {
    match classify_slot(date, time, rules, appointments, now) {
        SlotStatus::Available => {
            if generate_day_slots(rule_for_day(rules, date)).contains(&time) {
                BookingDecision::Accepted
            } else {
                BookingDecision::Rejected {
                    reason: crate::models::RejectionReason::OutsideSchedule,
                }
            }
        }
        SlotStatus::Booked { .. } => BookingDecision::Rejected {
            reason: crate::models::RejectionReason::AlreadyBooked,
        },
        SlotStatus::Blocked { reason } => BookingDecision::Rejected {
            reason: reason.into(),
        },
    }
}

/// Full classified grid for one day.
pub fn day_schedule(
    doctor_id: Uuid,
    date: NaiveDate,
    rules: &[WeeklyAvailabilityRule],
    appointments: &[Appointment],
    now: DateTime<Utc>,
) -> DaySchedule {
    let slots = generate_day_slots(rule_for_day(rules, date))
        .into_iter()
        .map(|time| DaySlot {
            time,
            label: time.label(),
            status: classify_slot(date, time, rules, appointments, now),
        })
        .collect();

    DaySchedule {
        doctor_id,
        date,
        slots,
    }
}
