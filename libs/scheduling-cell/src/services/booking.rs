use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::{ClinicStoreClient, StoreError};

use crate::models::{
    Appointment, AppointmentStatus, BookingDecision, BookingOutcome, BookingRequest,
    RejectionReason, SchedulingError,
};
use crate::services::availability::AvailabilityService;
use crate::services::slots;

pub struct BookingService {
    store: ClinicStoreClient,
    availability: AvailabilityService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: ClinicStoreClient::new(config),
            availability: AvailabilityService::new(config),
        }
    }

    /// Re-runs the slot engine's decision against fresh reads. This is the
    /// same precondition the UI evaluated when it rendered the grid, and it
    /// must run again here because the appointment set may have changed
    /// since then.
    pub async fn validate_booking_request(
        &self,
        request: &BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<BookingDecision, SchedulingError> {
        debug!(
            "Validating booking for doctor {} at {} {}",
            request.doctor_id, request.date, request.time
        );

        let rules = self
            .availability
            .list_rules(request.doctor_id)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;
        let appointments = self
            .availability
            .appointments_for_range(request.doctor_id, request.date, request.date)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        Ok(slots::validate_booking(
            request.date,
            request.time,
            &rules,
            &appointments,
            now,
        ))
    }

    /// Validates and persists a booking. The datastore's uniqueness
    /// constraint on (doctor_id, scheduled_start_time) is the atomic
    /// arbiter for two callers racing on one slot; a conflict there comes
    /// back as a rejection, not an error.
    pub async fn book_appointment(
        &self,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<BookingOutcome, SchedulingError> {
        let decision = self.validate_booking_request(&request, now).await?;

        if let BookingDecision::Rejected { reason } = decision {
            info!(
                "Booking rejected for doctor {} at {} {}: {}",
                request.doctor_id,
                request.date,
                request.time,
                reason.as_str()
            );
            return Ok(BookingOutcome {
                decision: BookingDecision::Rejected { reason },
                appointment: None,
            });
        }

        let scheduled_start = request.time.on(request.date).ok_or_else(|| {
            SchedulingError::InvalidTime(format!("{} {}", request.date, request.time))
        })?;

        let appointment_data = json!({
            "doctor_id": request.doctor_id,
            "patient_id": request.patient_id,
            "patient_name": request.patient_name,
            "scheduled_start_time": scheduled_start.to_rfc3339(),
            "status": AppointmentStatus::Upcoming.to_string(),
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = match self
            .store
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(appointment_data),
                Some(headers),
            )
            .await
        {
            Ok(result) => result,
            // Lost the race between validation and insert
            Err(StoreError::Conflict(_)) => {
                warn!(
                    "Slot taken between validation and insert: doctor {} at {} {}",
                    request.doctor_id, request.date, request.time
                );
                return Ok(BookingOutcome {
                    decision: BookingDecision::Rejected {
                        reason: RejectionReason::AlreadyBooked,
                    },
                    appointment: None,
                });
            }
            Err(e) => return Err(SchedulingError::DatabaseError(e.to_string())),
        };

        if result.is_empty() {
            return Err(SchedulingError::DatabaseError(
                "Failed to create appointment".to_string(),
            ));
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e)))?;

        info!(
            "Appointment {} booked for doctor {} at {}",
            appointment.id, appointment.doctor_id, appointment.scheduled_start_time
        );

        Ok(BookingOutcome {
            decision: BookingDecision::Accepted,
            appointment: Some(appointment),
        })
    }
}
