// libs/scheduling-cell/tests/availability_test.rs

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};

use scheduling_cell::clock::FixedClock;
use scheduling_cell::services::availability::AvailabilityService;
use shared_config::AppConfig;
use shared_utils::test_utils::TestConfig;

fn test_config(mock_server: &MockServer) -> AppConfig {
    TestConfig::with_supabase_url(&mock_server.uri()).to_app_config()
}

fn slot_definition_json(
    doctor_id: Uuid,
    day_of_week: &str,
    start_time: &str,
    end_time: &str,
) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "doctor_id": doctor_id,
        "kind": "recurring",
        "day_of_week": day_of_week,
        "specific_date": null,
        "start_time": start_time,
        "end_time": end_time,
        "location_id": null,
        "active": true,
        "deleted_at": null,
        "created_at": "2026-01-05T08:00:00Z",
        "updated_at": "2026-01-05T08:00:00Z"
    })
}

fn appointment_json(doctor_id: Uuid, scheduled_at: &str, status: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "doctor_id": doctor_id,
        "patient_id": Uuid::new_v4(),
        "scheduled_at": scheduled_at,
        "status": status
    })
}

async fn mount_no_blocked_dates(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_dates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn booked_start_time_is_excluded() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mount_no_blocked_dates(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/slot_definitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            slot_definition_json(doctor_id, "monday", "09:00:00", "12:00:00")
        ])))
        .mount(&mock_server)
        .await;

    // The resolver must only ask for appointments that still occupy a slot.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "in.(scheduled,rescheduled,in_progress)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_json(doctor_id, "2026-09-07T09:45:00Z", "scheduled")
        ])))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    // Not "today", so the lead-time filter stays out of the way.
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap());
    let service = AvailabilityService::with_clock(&config, Arc::new(clock));

    let date = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap(); // a Monday
    let availability = service.get_available_slots(doctor_id, date, None).await.unwrap();

    assert!(!availability.blocked);
    let times: Vec<&str> = availability.slots.iter().map(|slot| slot.time.as_str()).collect();
    assert_eq!(times, vec!["09:00", "10:30", "11:15"]);
}

#[tokio::test]
async fn blocked_date_short_circuits_slot_computation() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_dates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": Uuid::new_v4(),
                "doctor_id": doctor_id,
                "date": "2026-09-14",
                "reason": "vacation",
                "active": true,
                "created_at": "2026-09-01T08:00:00Z"
            }
        ])))
        .mount(&mock_server)
        .await;

    // No slot definition or appointment mocks: a blocked date must return
    // before the resolver ever looks at them.
    let config = test_config(&mock_server);
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap());
    let service = AvailabilityService::with_clock(&config, Arc::new(clock));

    let date = NaiveDate::from_ymd_opt(2026, 9, 14).unwrap();
    let availability = service.get_available_slots(doctor_id, date, None).await.unwrap();

    assert!(availability.blocked);
    assert_eq!(availability.blocked_reason.as_deref(), Some("vacation"));
    assert!(availability.slots.is_empty());
}

#[tokio::test]
async fn same_day_lead_time_drops_imminent_slots() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mount_no_blocked_dates(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/slot_definitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            slot_definition_json(doctor_id, "monday", "10:00:00", "12:00:00")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let date = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();

    // At 09:58 the 10:00 slot is inside the 5-minute lead window.
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 9, 7, 9, 58, 0).unwrap());
    let service = AvailabilityService::with_clock(&config, Arc::new(clock));
    let availability = service.get_available_slots(doctor_id, date, None).await.unwrap();
    let times: Vec<&str> = availability.slots.iter().map(|slot| slot.time.as_str()).collect();
    assert_eq!(times, vec!["10:45", "11:30"]);

    // At 09:50 it clears the lead window.
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 9, 7, 9, 50, 0).unwrap());
    let service = AvailabilityService::with_clock(&config, Arc::new(clock));
    let availability = service.get_available_slots(doctor_id, date, None).await.unwrap();
    let times: Vec<&str> = availability.slots.iter().map(|slot| slot.time.as_str()).collect();
    assert_eq!(times, vec!["10:00", "10:45", "11:30"]);
}

#[tokio::test]
async fn location_metadata_is_attached_to_slots() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let location_id = Uuid::new_v4();

    mount_no_blocked_dates(&mock_server).await;

    let mut definition = slot_definition_json(doctor_id, "monday", "09:00:00", "11:00:00");
    definition["location_id"] = json!(location_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/slot_definitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([definition])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": location_id,
                "doctor_id": doctor_id,
                "name": "Downtown office",
                "kind": "office",
                "address": "12 Main St",
                "phone": null,
                "active": true,
                "created_at": "2026-01-05T08:00:00Z",
                "updated_at": "2026-01-05T08:00:00Z"
            }
        ])))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap());
    let service = AvailabilityService::with_clock(&config, Arc::new(clock));

    let date = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();
    let availability = service.get_available_slots(doctor_id, date, None).await.unwrap();

    assert!(!availability.slots.is_empty());
    for slot in &availability.slots {
        assert_eq!(slot.location_id, Some(location_id));
        assert_eq!(slot.location.as_ref().unwrap().name, "Downtown office");
    }
}

#[tokio::test]
async fn doctor_without_configuration_gets_an_empty_list() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mount_no_blocked_dates(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/slot_definitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap());
    let service = AvailabilityService::with_clock(&config, Arc::new(clock));

    let date = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();
    let availability = service.get_available_slots(doctor_id, date, None).await.unwrap();

    assert!(!availability.blocked);
    assert!(availability.slots.is_empty());
}

/// Recurring Monday availability 08:00-12:00, one Monday blocked, the next
/// one open: the blocked date wins on its day and the full grid comes back
/// on the following week.
#[tokio::test]
async fn weekly_schedule_with_one_blocked_monday() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_dates"))
        .and(query_param("date", "eq.2026-09-14"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": Uuid::new_v4(),
                "doctor_id": doctor_id,
                "date": "2026-09-14",
                "reason": null,
                "active": true,
                "created_at": "2026-09-01T08:00:00Z"
            }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_dates"))
        .and(query_param("date", "eq.2026-09-21"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/slot_definitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            slot_definition_json(doctor_id, "monday", "08:00:00", "12:00:00")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap());
    let service = AvailabilityService::with_clock(&config, Arc::new(clock));

    let blocked_monday = NaiveDate::from_ymd_opt(2026, 9, 14).unwrap();
    let availability = service.get_available_slots(doctor_id, blocked_monday, None).await.unwrap();
    assert!(availability.blocked);
    assert!(availability.slots.is_empty());

    let open_monday = NaiveDate::from_ymd_opt(2026, 9, 21).unwrap();
    let availability = service.get_available_slots(doctor_id, open_monday, None).await.unwrap();
    assert!(!availability.blocked);
    let times: Vec<&str> = availability.slots.iter().map(|slot| slot.time.as_str()).collect();
    assert_eq!(times, vec!["08:00", "08:45", "09:30", "10:15", "11:00", "11:45"]);
}
