use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    BookingDecision, BookingRequest, CreateAvailabilityRuleRequest, SchedulingError,
    UpdateAvailabilityRuleRequest,
};
use crate::services::availability::AvailabilityService;
use crate::services::booking::BookingService;

// Query parameters for schedule endpoints

#[derive(Debug, Deserialize)]
pub struct DayScheduleQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct WeekScheduleQuery {
    pub start_date: NaiveDate,
}

// ==============================================================================
// AVAILABILITY RULE MANAGEMENT
// ==============================================================================

#[axum::debug_handler]
pub async fn get_availability_rules(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let rules = availability_service
        .list_rules(doctor_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "rules": rules
    })))
}

#[axum::debug_handler]
pub async fn create_availability_rule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<CreateAvailabilityRuleRequest>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let rule = availability_service
        .create_rule(doctor_id, request)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Json(json!(rule)))
}

#[axum::debug_handler]
pub async fn update_availability_rule(
    State(state): State<Arc<AppConfig>>,
    Path((_doctor_id, rule_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateAvailabilityRuleRequest>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let rule = availability_service
        .update_rule(rule_id, request)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Json(json!(rule)))
}

#[axum::debug_handler]
pub async fn delete_availability_rule(
    State(state): State<Arc<AppConfig>>,
    Path((_doctor_id, rule_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    availability_service
        .delete_rule(rule_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({ "deleted": rule_id })))
}

// ==============================================================================
// SLOT GRIDS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_day_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DayScheduleQuery>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let schedule = availability_service
        .day_schedule(doctor_id, query.date, Utc::now())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn get_week_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<WeekScheduleQuery>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let schedule = availability_service
        .week_schedule(doctor_id, query.start_date, Utc::now())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn get_next_available_slot(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let next_slot = availability_service
        .next_available_slot(doctor_id, Utc::now(), state.booking_horizon_days)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    match next_slot {
        Some(slot) => Ok(Json(json!(slot))),
        None => Err(AppError::NotFound(
            "No available slot within the booking horizon".to_string(),
        )),
    }
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn validate_booking(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);

    let decision = booking_service
        .validate_booking_request(&request, Utc::now())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(decision)))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);

    let outcome = booking_service
        .book_appointment(request, Utc::now())
        .await
        .map_err(map_scheduling_error)?;

    match outcome.decision {
        BookingDecision::Accepted => Ok(Json(json!(outcome))),
        BookingDecision::Rejected { reason } => {
            Err(AppError::Conflict(reason.as_str().to_string()))
        }
    }
}

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::InvalidTime(msg) => AppError::BadRequest(msg),
        SchedulingError::DatabaseError(msg) => AppError::Database(msg),
    }
}
