// libs/scheduling-cell/tests/services_test.rs
//
// Service tests against a mock datastore: rule CRUD validation at the
// write boundary, schedule composition over fetched rows, and the
// write-time booking re-validation path.

use assert_matches::assert_matches;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::models::{
    BookingDecision, BookingRequest, CreateAvailabilityRuleRequest, RejectionReason, SlotStatus,
    TimeOfDay,
};
use scheduling_cell::services::availability::AvailabilityService;
use scheduling_cell::services::booking::BookingService;
use shared_config::AppConfig;

// ==============================================================================
// TEST FIXTURES AND UTILITIES
// ==============================================================================

struct TestSetup {
    mock_server: MockServer,
    config: AppConfig,
}

impl TestSetup {
    async fn new() -> Self {
        let mock_server = MockServer::start().await;

        let config = AppConfig {
            datastore_url: mock_server.uri(),
            datastore_api_key: "test_key".to_string(),
            booking_horizon_days: 14,
        };

        Self {
            mock_server,
            config,
        }
    }

    fn availability(&self) -> AvailabilityService {
        AvailabilityService::new(&self.config)
    }

    fn booking(&self) -> BookingService {
        BookingService::new(&self.config)
    }

    // Monday rule row as stored: 09:00-11:00, no lunch, 20-minute slots
    fn monday_rule_row(&self, doctor_id: Uuid) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "day_of_week": 1,
            "is_available": true,
            "start_time": "09:00",
            "end_time": "11:00",
            "lunch_break_start": null,
            "lunch_break_end": null,
            "slot_duration_minutes": 20,
            "created_at": "2024-06-01T08:00:00Z",
            "updated_at": "2024-06-01T08:00:00Z"
        })
    }

    fn appointment_row(&self, doctor_id: Uuid, start: &str, status: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "patient_id": Uuid::new_v4(),
            "patient_name": "Jane Doe",
            "scheduled_start_time": start,
            "status": status,
            "created_at": "2024-06-01T08:00:00Z"
        })
    }

    async fn mock_rules(&self, rows: Vec<serde_json::Value>) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/availability_rules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(&self.mock_server)
            .await;
    }

    async fn mock_appointments(&self, rows: Vec<serde_json::Value>) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(&self.mock_server)
            .await;
    }
}

fn tod(s: &str) -> TimeOfDay {
    TimeOfDay::parse(s).unwrap()
}

fn create_request(day_of_week: u8, start: &str, end: &str) -> CreateAvailabilityRuleRequest {
    CreateAvailabilityRuleRequest {
        day_of_week,
        is_available: None,
        start_time: tod(start),
        end_time: tod(end),
        lunch_break_start: None,
        lunch_break_end: None,
        slot_duration_minutes: 20,
    }
}

// ==============================================================================
// RULE CRUD BOUNDARY VALIDATION
// ==============================================================================

#[tokio::test]
async fn test_create_rule_rejects_day_out_of_range() {
    let setup = TestSetup::new().await;

    let result = setup
        .availability()
        .create_rule(Uuid::new_v4(), create_request(7, "09:00", "17:00"))
        .await;

    let err = result.unwrap_err().to_string();
    assert!(err.contains("Day of week"), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_create_rule_rejects_inverted_window() {
    let setup = TestSetup::new().await;

    let result = setup
        .availability()
        .create_rule(Uuid::new_v4(), create_request(1, "17:00", "09:00"))
        .await;

    let err = result.unwrap_err().to_string();
    assert!(err.contains("Start time"), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_create_rule_rejects_zero_duration() {
    let setup = TestSetup::new().await;

    let mut request = create_request(1, "09:00", "17:00");
    request.slot_duration_minutes = 0;

    let result = setup.availability().create_rule(Uuid::new_v4(), request).await;

    let err = result.unwrap_err().to_string();
    assert!(err.contains("duration"), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_create_rule_rejects_lunch_outside_window() {
    let setup = TestSetup::new().await;

    let mut request = create_request(1, "09:00", "12:00");
    request.lunch_break_start = Some(tod("13:00"));
    request.lunch_break_end = Some(tod("14:00"));

    let result = setup.availability().create_rule(Uuid::new_v4(), request).await;

    let err = result.unwrap_err().to_string();
    assert!(err.contains("Lunch break"), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_create_rule_rejects_duplicate_day() {
    let setup = TestSetup::new().await;
    let doctor_id = Uuid::new_v4();

    setup.mock_rules(vec![setup.monday_rule_row(doctor_id)]).await;

    let result = setup
        .availability()
        .create_rule(doctor_id, create_request(1, "09:00", "17:00"))
        .await;

    let err = result.unwrap_err().to_string();
    assert!(err.contains("already exists"), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_create_rule_persists_and_returns_row() {
    let setup = TestSetup::new().await;
    let doctor_id = Uuid::new_v4();

    setup.mock_rules(vec![]).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_rules"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(vec![setup.monday_rule_row(doctor_id)]),
        )
        .mount(&setup.mock_server)
        .await;

    let rule = setup
        .availability()
        .create_rule(doctor_id, create_request(1, "09:00", "11:00"))
        .await
        .unwrap();

    assert_eq!(rule.doctor_id, doctor_id);
    assert_eq!(rule.day_of_week, 1);
    assert_eq!(rule.start_time, tod("09:00"));
    assert_eq!(rule.slot_duration_minutes, 20);
}

// ==============================================================================
// SCHEDULE COMPOSITION
// ==============================================================================

#[tokio::test]
async fn test_day_schedule_marks_booked_slot() {
    let setup = TestSetup::new().await;
    let doctor_id = Uuid::new_v4();

    setup.mock_rules(vec![setup.monday_rule_row(doctor_id)]).await;
    setup
        .mock_appointments(vec![setup.appointment_row(
            doctor_id,
            "2024-06-10T10:00:00Z",
            "upcoming",
        )])
        .await;

    let now = Utc.with_ymd_and_hms(2024, 6, 9, 8, 0, 0).unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();

    let schedule = setup
        .availability()
        .day_schedule(doctor_id, date, now)
        .await
        .unwrap();

    assert_eq!(schedule.slots.len(), 6);
    let booked: Vec<_> = schedule
        .slots
        .iter()
        .filter(|slot| matches!(slot.status, SlotStatus::Booked { .. }))
        .collect();
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0].time, tod("10:00"));
}

#[tokio::test]
async fn test_week_schedule_covers_seven_days() {
    let setup = TestSetup::new().await;
    let doctor_id = Uuid::new_v4();

    setup.mock_rules(vec![setup.monday_rule_row(doctor_id)]).await;
    setup.mock_appointments(vec![]).await;

    let now = Utc.with_ymd_and_hms(2024, 6, 9, 8, 0, 0).unwrap();
    let start_date = NaiveDate::from_ymd_opt(2024, 6, 9).unwrap();

    let schedule = setup
        .availability()
        .week_schedule(doctor_id, start_date, now)
        .await
        .unwrap();

    assert_eq!(schedule.days.len(), 7);
    assert_eq!(schedule.days[0].date, start_date);

    // Only Monday is configured and available; every other day's slots
    // are blocked
    let monday = &schedule.days[1];
    assert!(monday
        .slots
        .iter()
        .all(|slot| slot.status == SlotStatus::Available));
    let tuesday = &schedule.days[2];
    assert!(tuesday
        .slots
        .iter()
        .all(|slot| matches!(slot.status, SlotStatus::Blocked { .. })));
}

#[tokio::test]
async fn test_next_available_slot_skips_booked_grid_start() {
    let setup = TestSetup::new().await;
    let doctor_id = Uuid::new_v4();

    setup.mock_rules(vec![setup.monday_rule_row(doctor_id)]).await;
    setup
        .mock_appointments(vec![setup.appointment_row(
            doctor_id,
            "2024-06-10T09:00:00Z",
            "upcoming",
        )])
        .await;

    let now = Utc.with_ymd_and_hms(2024, 6, 9, 8, 0, 0).unwrap();

    let next = setup
        .availability()
        .next_available_slot(doctor_id, now, 14)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(next.date, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
    assert_eq!(next.time, tod("09:20"));
    assert_eq!(next.label, "9:20 AM");
}

// ==============================================================================
// BOOKING
// ==============================================================================

fn booking_request(doctor_id: Uuid, date: (i32, u32, u32), time: &str) -> BookingRequest {
    BookingRequest {
        doctor_id,
        patient_id: Uuid::new_v4(),
        patient_name: "Jane Doe".to_string(),
        date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        time: tod(time),
    }
}

#[tokio::test]
async fn test_validate_rejects_occupied_slot() {
    let setup = TestSetup::new().await;
    let doctor_id = Uuid::new_v4();

    setup.mock_rules(vec![setup.monday_rule_row(doctor_id)]).await;
    setup
        .mock_appointments(vec![setup.appointment_row(
            doctor_id,
            "2024-06-10T10:00:00Z",
            "upcoming",
        )])
        .await;

    let now = Utc.with_ymd_and_hms(2024, 6, 9, 8, 0, 0).unwrap();
    let decision = setup
        .booking()
        .validate_booking_request(&booking_request(doctor_id, (2024, 6, 10), "10:00"), now)
        .await
        .unwrap();

    assert_eq!(
        decision,
        BookingDecision::Rejected {
            reason: RejectionReason::AlreadyBooked
        }
    );
}

#[tokio::test]
async fn test_validate_accepts_free_slot_after_cancellation() {
    let setup = TestSetup::new().await;
    let doctor_id = Uuid::new_v4();

    setup.mock_rules(vec![setup.monday_rule_row(doctor_id)]).await;
    setup
        .mock_appointments(vec![setup.appointment_row(
            doctor_id,
            "2024-06-10T10:00:00Z",
            "cancelled",
        )])
        .await;

    let now = Utc.with_ymd_and_hms(2024, 6, 9, 8, 0, 0).unwrap();
    let decision = setup
        .booking()
        .validate_booking_request(&booking_request(doctor_id, (2024, 6, 10), "10:00"), now)
        .await
        .unwrap();

    assert_eq!(decision, BookingDecision::Accepted);
}

#[tokio::test]
async fn test_book_appointment_persists_accepted_booking() {
    let setup = TestSetup::new().await;
    let doctor_id = Uuid::new_v4();

    setup.mock_rules(vec![setup.monday_rule_row(doctor_id)]).await;
    setup.mock_appointments(vec![]).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![setup.appointment_row(
            doctor_id,
            "2024-06-10T10:00:00Z",
            "upcoming",
        )]))
        .mount(&setup.mock_server)
        .await;

    let now = Utc.with_ymd_and_hms(2024, 6, 9, 8, 0, 0).unwrap();
    let outcome = setup
        .booking()
        .book_appointment(booking_request(doctor_id, (2024, 6, 10), "10:00"), now)
        .await
        .unwrap();

    assert_eq!(outcome.decision, BookingDecision::Accepted);
    let appointment = outcome.appointment.unwrap();
    assert_eq!(appointment.doctor_id, doctor_id);
}

#[tokio::test]
async fn test_book_appointment_maps_write_conflict_to_rejection() {
    let setup = TestSetup::new().await;
    let doctor_id = Uuid::new_v4();

    // Validation sees a free slot, but the insert loses the race
    setup.mock_rules(vec![setup.monday_rule_row(doctor_id)]).await;
    setup.mock_appointments(vec![]).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
        .mount(&setup.mock_server)
        .await;

    let now = Utc.with_ymd_and_hms(2024, 6, 9, 8, 0, 0).unwrap();
    let outcome = setup
        .booking()
        .book_appointment(booking_request(doctor_id, (2024, 6, 10), "10:00"), now)
        .await
        .unwrap();

    assert_eq!(
        outcome.decision,
        BookingDecision::Rejected {
            reason: RejectionReason::AlreadyBooked
        }
    );
    assert_matches!(outcome.appointment, None);
}

#[tokio::test]
async fn test_book_appointment_rejects_before_touching_insert() {
    let setup = TestSetup::new().await;
    let doctor_id = Uuid::new_v4();

    // No POST mock mounted: a rejected booking must never attempt the
    // insert
    setup.mock_rules(vec![setup.monday_rule_row(doctor_id)]).await;
    setup.mock_appointments(vec![]).await;

    let now = Utc.with_ymd_and_hms(2024, 6, 9, 8, 0, 0).unwrap();
    let outcome = setup
        .booking()
        .book_appointment(booking_request(doctor_id, (2024, 6, 10), "10:07"), now)
        .await
        .unwrap();

    assert_eq!(
        outcome.decision,
        BookingDecision::Rejected {
            reason: RejectionReason::OutsideSchedule
        }
    );
}
