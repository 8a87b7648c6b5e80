// libs/scheduling-cell/tests/timeline_test.rs

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};

use scheduling_cell::clock::FixedClock;
use scheduling_cell::models::{OverviewWindow, SlotStatus};
use scheduling_cell::services::timeline::ScheduleOverviewService;
use shared_config::AppConfig;
use shared_utils::test_utils::TestConfig;

fn test_config(mock_server: &MockServer) -> AppConfig {
    TestConfig::with_supabase_url(&mock_server.uri()).to_app_config()
}

fn specific_definition_json(
    doctor_id: Uuid,
    id: Uuid,
    date: &str,
    start_time: &str,
    end_time: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "doctor_id": doctor_id,
        "kind": "specific",
        "day_of_week": null,
        "specific_date": date,
        "start_time": start_time,
        "end_time": end_time,
        "location_id": null,
        "active": true,
        "deleted_at": null,
        "created_at": "2026-01-05T08:00:00Z",
        "updated_at": "2026-01-05T08:00:00Z"
    })
}

#[tokio::test]
async fn overview_projects_statuses_and_summary() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let expired_slot = Uuid::new_v4();
    let busy_slot = Uuid::new_v4();
    let open_slot = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/slot_definitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            specific_definition_json(doctor_id, expired_slot, "2026-09-08", "09:00:00", "10:00:00"),
            specific_definition_json(doctor_id, busy_slot, "2026-09-10", "10:00:00", "11:00:00"),
            specific_definition_json(doctor_id, open_slot, "2026-09-11", "14:00:00", "15:00:00"),
        ])))
        .mount(&mock_server)
        .await;

    // Window-wide appointment fetch carries no limit; the two summary
    // queries below do.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param_is_missing("limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": appointment_id,
                "doctor_id": doctor_id,
                "patient_id": Uuid::new_v4(),
                "scheduled_at": "2026-09-10T10:00:00Z",
                "status": "scheduled"
            }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": appointment_id,
                "doctor_id": doctor_id,
                "patient_id": Uuid::new_v4(),
                "scheduled_at": "2026-09-10T10:00:00Z",
                "status": "scheduled"
            }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": Uuid::new_v4(),
                "doctor_id": doctor_id,
                "patient_id": Uuid::new_v4(),
                "scheduled_at": "2026-09-02T10:00:00Z",
                "status": "completed"
            }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    // Wednesday noon, between the expired slot and the upcoming ones.
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 9, 9, 12, 0, 0).unwrap());
    let service = ScheduleOverviewService::with_clock(&config, Arc::new(clock));

    let window = OverviewWindow {
        start: NaiveDate::from_ymd_opt(2026, 9, 7).unwrap(),
        end: NaiveDate::from_ymd_opt(2026, 9, 13).unwrap(),
    };

    let overview = service.get_overview(doctor_id, Some(window), None).await.unwrap();

    // One entry per day in the window, empty days included.
    assert_eq!(overview.timeline.len(), 7);
    assert_eq!(overview.window.start, window.start);

    let slot_status = |slot_id: Uuid| {
        overview
            .timeline
            .iter()
            .flat_map(|day| day.slots.iter())
            .find(|slot| slot.slot_id == slot_id)
            .unwrap()
            .clone()
    };

    let expired = slot_status(expired_slot);
    assert_eq!(expired.status, SlotStatus::Expired);
    assert!(!expired.can_edit);
    assert!(!expired.can_delete);

    let busy = slot_status(busy_slot);
    assert_eq!(busy.status, SlotStatus::Busy);
    assert_eq!(busy.appointment_id, Some(appointment_id));
    // A merely scheduled appointment does not freeze the slot.
    assert!(busy.can_edit);

    let open = slot_status(open_slot);
    assert_eq!(open.status, SlotStatus::Available);
    assert!(open.can_edit);

    assert_eq!(overview.summary.future_slots, 2);
    assert_eq!(overview.summary.past_slots, 1);
    assert_eq!(overview.summary.available_this_week, 1);
    assert_eq!(overview.summary.week_ahead.total, 2);
    assert_eq!(overview.summary.week_ahead.available, 1);
    assert_eq!(overview.summary.week_ahead.busy, 1);
    assert_eq!(
        overview.summary.next_appointment.as_ref().map(|appointment| appointment.id),
        Some(appointment_id)
    );
    assert_eq!(overview.summary.recent_sessions.len(), 1);
}

#[tokio::test]
async fn completed_consultation_freezes_its_slot() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let slot_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/slot_definitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            specific_definition_json(doctor_id, slot_id, "2026-09-10", "10:00:00", "11:00:00"),
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param_is_missing("limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": Uuid::new_v4(),
                "doctor_id": doctor_id,
                "patient_id": Uuid::new_v4(),
                "scheduled_at": "2026-09-10T10:00:00Z",
                "status": "completed"
            }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 9, 9, 12, 0, 0).unwrap());
    let service = ScheduleOverviewService::with_clock(&config, Arc::new(clock));

    let window = OverviewWindow {
        start: NaiveDate::from_ymd_opt(2026, 9, 10).unwrap(),
        end: NaiveDate::from_ymd_opt(2026, 9, 10).unwrap(),
    };

    let overview = service.get_overview(doctor_id, Some(window), None).await.unwrap();
    let slot = &overview.timeline[0].slots[0];

    // Even though the slot is in the future, the completed consultation
    // pins it: no silent edits of history.
    assert_eq!(slot.status, SlotStatus::Completed);
    assert!(!slot.can_edit);
    assert!(!slot.can_delete);
}

#[tokio::test]
async fn inverted_window_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 9, 9, 12, 0, 0).unwrap());
    let service = ScheduleOverviewService::with_clock(&config, Arc::new(clock));

    let window = OverviewWindow {
        start: NaiveDate::from_ymd_opt(2026, 9, 13).unwrap(),
        end: NaiveDate::from_ymd_opt(2026, 9, 7).unwrap(),
    };

    let result = service.get_overview(Uuid::new_v4(), Some(window), None).await;
    assert!(result.is_err());
}
