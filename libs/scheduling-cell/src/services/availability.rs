use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::ClinicStoreClient;

use crate::models::{
    Appointment, CreateAvailabilityRuleRequest, DaySchedule, NextAvailableSlot, TimeOfDay,
    UpdateAvailabilityRuleRequest, WeekSchedule, WeeklyAvailabilityRule,
};
use crate::services::slots;

pub struct AvailabilityService {
    store: ClinicStoreClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: ClinicStoreClient::new(config),
        }
    }

    /// Get a doctor's weekly availability rules, ordered by day of week
    pub async fn list_rules(&self, doctor_id: Uuid) -> Result<Vec<WeeklyAvailabilityRule>> {
        debug!("Fetching availability rules for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/availability_rules?doctor_id=eq.{}&order=day_of_week.asc",
            doctor_id
        );
        let result: Vec<Value> = self.store.request(Method::GET, &path, None).await?;

        let rules: Vec<WeeklyAvailabilityRule> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<WeeklyAvailabilityRule>, _>>()?;

        Ok(rules)
    }

    /// Create a weekly availability rule for a doctor
    pub async fn create_rule(
        &self,
        doctor_id: Uuid,
        request: CreateAvailabilityRuleRequest,
    ) -> Result<WeeklyAvailabilityRule> {
        debug!("Creating availability rule for doctor: {}", doctor_id);

        if request.day_of_week > 6 {
            return Err(anyhow!(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)"
            ));
        }

        validate_working_window(
            request.start_time,
            request.end_time,
            request.lunch_break_start,
            request.lunch_break_end,
            request.slot_duration_minutes,
        )?;

        // At most one rule per doctor per day of week
        let existing_path = format!(
            "/rest/v1/availability_rules?doctor_id=eq.{}&day_of_week=eq.{}",
            doctor_id, request.day_of_week
        );
        let existing: Vec<Value> = self.store.request(Method::GET, &existing_path, None).await?;

        if !existing.is_empty() {
            return Err(anyhow!(
                "An availability rule already exists for day {}",
                request.day_of_week
            ));
        }

        let rule_data = json!({
            "doctor_id": doctor_id,
            "day_of_week": request.day_of_week,
            "is_available": request.is_available.unwrap_or(true),
            "start_time": request.start_time,
            "end_time": request.end_time,
            "lunch_break_start": request.lunch_break_start,
            "lunch_break_end": request.lunch_break_end,
            "slot_duration_minutes": request.slot_duration_minutes,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .store
            .request_with_headers(
                Method::POST,
                "/rest/v1/availability_rules",
                Some(rule_data),
                Some(headers),
            )
            .await?;

        if result.is_empty() {
            return Err(anyhow!("Failed to create availability rule"));
        }

        let rule: WeeklyAvailabilityRule = serde_json::from_value(result[0].clone())?;
        debug!("Availability rule created with ID: {}", rule.id);

        Ok(rule)
    }

    /// Update an existing availability rule
    pub async fn update_rule(
        &self,
        rule_id: Uuid,
        request: UpdateAvailabilityRuleRequest,
    ) -> Result<WeeklyAvailabilityRule> {
        debug!("Updating availability rule: {}", rule_id);

        let existing = self.get_rule_by_id(rule_id).await?;

        // Validate the merged window, not just the changed fields
        let start = request.start_time.unwrap_or(existing.start_time);
        let end = request.end_time.unwrap_or(existing.end_time);
        let lunch_start = request.lunch_break_start.or(existing.lunch_break_start);
        let lunch_end = request.lunch_break_end.or(existing.lunch_break_end);
        let duration = request
            .slot_duration_minutes
            .unwrap_or(existing.slot_duration_minutes);

        validate_working_window(start, end, lunch_start, lunch_end, duration)?;

        let mut update_data = serde_json::Map::new();

        if let Some(is_available) = request.is_available {
            update_data.insert("is_available".to_string(), json!(is_available));
        }
        if let Some(start_time) = request.start_time {
            update_data.insert("start_time".to_string(), json!(start_time));
        }
        if let Some(end_time) = request.end_time {
            update_data.insert("end_time".to_string(), json!(end_time));
        }
        if let Some(lunch_break_start) = request.lunch_break_start {
            update_data.insert("lunch_break_start".to_string(), json!(lunch_break_start));
        }
        if let Some(lunch_break_end) = request.lunch_break_end {
            update_data.insert("lunch_break_end".to_string(), json!(lunch_break_end));
        }
        if let Some(slot_duration) = request.slot_duration_minutes {
            update_data.insert("slot_duration_minutes".to_string(), json!(slot_duration));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/availability_rules?id=eq.{}", rule_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .store
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(Value::Object(update_data)),
                Some(headers),
            )
            .await?;

        if result.is_empty() {
            return Err(anyhow!("Failed to update availability rule"));
        }

        let updated: WeeklyAvailabilityRule = serde_json::from_value(result[0].clone())?;
        Ok(updated)
    }

    /// Delete an availability rule
    pub async fn delete_rule(&self, rule_id: Uuid) -> Result<()> {
        debug!("Deleting availability rule: {}", rule_id);

        let path = format!("/rest/v1/availability_rules?id=eq.{}", rule_id);

        // Without this header the datastore answers 204 with an empty body,
        // which the client cannot parse
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let _: Vec<Value> = self
            .store
            .request_with_headers(Method::DELETE, &path, None, Some(headers))
            .await?;

        Ok(())
    }

    /// Classified slot grid for one day
    pub async fn day_schedule(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DaySchedule> {
        debug!("Computing day schedule for doctor {} on {}", doctor_id, date);

        let rules = self.list_rules(doctor_id).await?;
        let appointments = self.appointments_for_range(doctor_id, date, date).await?;

        Ok(slots::day_schedule(
            doctor_id,
            date,
            &rules,
            &appointments,
            now,
        ))
    }

    /// Seven consecutive day grids starting at `start_date`
    pub async fn week_schedule(
        &self,
        doctor_id: Uuid,
        start_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<WeekSchedule> {
        debug!(
            "Computing week schedule for doctor {} from {}",
            doctor_id, start_date
        );

        let end_date = start_date + Duration::days(6);
        let rules = self.list_rules(doctor_id).await?;
        let appointments = self
            .appointments_for_range(doctor_id, start_date, end_date)
            .await?;

        let days = (0..7)
            .map(|offset| {
                let date = start_date + Duration::days(offset);
                slots::day_schedule(doctor_id, date, &rules, &appointments, now)
            })
            .collect();

        Ok(WeekSchedule {
            doctor_id,
            start_date,
            days,
        })
    }

    /// First available slot scanning forward from today, bounded by
    /// `horizon_days`. Used by automated booking intake.
    pub async fn next_available_slot(
        &self,
        doctor_id: Uuid,
        now: DateTime<Utc>,
        horizon_days: i64,
    ) -> Result<Option<NextAvailableSlot>> {
        let today = now.date_naive();
        let end_date = today + Duration::days(horizon_days);

        let rules = self.list_rules(doctor_id).await?;
        let appointments = self
            .appointments_for_range(doctor_id, today, end_date)
            .await?;

        for offset in 0..=horizon_days {
            let date = today + Duration::days(offset);
            let schedule = slots::day_schedule(doctor_id, date, &rules, &appointments, now);

            if let Some(slot) = schedule
                .slots
                .into_iter()
                .find(|slot| slot.status == crate::models::SlotStatus::Available)
            {
                return Ok(Some(NextAvailableSlot {
                    date,
                    time: slot.time,
                    label: slot.label,
                }));
            }
        }

        Ok(None)
    }

    /// Non-deleted appointments for a doctor across a closed date range.
    /// Cancelled rows are fetched too; the engine decides what occupies
    /// a slot.
    pub async fn appointments_for_range(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>> {
        let start_of_range = from
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("Invalid range start"))?
            .and_utc();
        let end_of_range = to
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| anyhow!("Invalid range end"))?
            .and_utc();

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&scheduled_start_time=gte.{}&scheduled_start_time=lte.{}&order=scheduled_start_time.asc",
            doctor_id,
            start_of_range.to_rfc3339_opts(SecondsFormat::Secs, true),
            end_of_range.to_rfc3339_opts(SecondsFormat::Secs, true)
        );

        let result: Vec<Value> = self.store.request(Method::GET, &path, None).await?;

        let appointments: Vec<Appointment> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Appointment>, _>>()?;

        Ok(appointments)
    }

    async fn get_rule_by_id(&self, rule_id: Uuid) -> Result<WeeklyAvailabilityRule> {
        let path = format!("/rest/v1/availability_rules?id=eq.{}", rule_id);
        let result: Vec<Value> = self.store.request(Method::GET, &path, None).await?;

        if result.is_empty() {
            return Err(anyhow!("Availability rule not found"));
        }

        let rule: WeeklyAvailabilityRule = serde_json::from_value(result[0].clone())?;
        Ok(rule)
    }
}

/// Settings-side validation; the slot engine itself only degrades
/// gracefully on a bad window, so malformed rules must be stopped here.
fn validate_working_window(
    start: TimeOfDay,
    end: TimeOfDay,
    lunch_start: Option<TimeOfDay>,
    lunch_end: Option<TimeOfDay>,
    slot_duration_minutes: u16,
) -> Result<()> {
    if start >= end {
        return Err(anyhow!("Start time must be before end time"));
    }

    if slot_duration_minutes == 0 {
        return Err(anyhow!("Slot duration must be positive"));
    }

    match (lunch_start, lunch_end) {
        (None, None) => {}
        (Some(lunch_start), Some(lunch_end)) => {
            if lunch_start >= lunch_end {
                return Err(anyhow!("Lunch break start must be before lunch break end"));
            }
            if lunch_start < start || lunch_end > end {
                return Err(anyhow!("Lunch break must fall within the working window"));
            }
        }
        _ => {
            return Err(anyhow!(
                "Lunch break requires both a start and an end time"
            ));
        }
    }

    Ok(())
}
