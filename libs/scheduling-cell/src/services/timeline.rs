// libs/scheduling-cell/src/services/timeline.rs
//
// Dashboard projection over a rolling window. Only specific (one-off) slot
// definitions appear on the timeline; recurring rules are open-ended weekly
// availability, not discrete future commitments.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::{AppConfig, SchedulingConfig};
use shared_database::supabase::SupabaseClient;

use crate::clock::{Clock, SystemClock};
use crate::models::{
    Appointment, AppointmentStatus, Location, OverviewWindow, ScheduleError,
    ScheduleOverview, ScheduleSummary, SlotDefinition, SlotStatus, TimelineDay,
    TimelineSlot, WeekAheadBreakdown, Weekday,
};
use crate::services::appointments::AppointmentLookup;

pub struct ScheduleOverviewService {
    supabase: SupabaseClient,
    appointments: AppointmentLookup,
    scheduling: SchedulingConfig,
    clock: Arc<dyn Clock>,
}

impl ScheduleOverviewService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            appointments: AppointmentLookup::new(config),
            scheduling: config.scheduling.clone(),
            clock,
        }
    }

    pub async fn get_overview(
        &self,
        doctor_id: Uuid,
        window: Option<OverviewWindow>,
        auth_token: Option<&str>,
    ) -> Result<ScheduleOverview, ScheduleError> {
        let now = self.clock.now();
        let today = now.date_naive();

        let window = window.unwrap_or(OverviewWindow {
            start: today - Duration::days(self.scheduling.overview_window_days),
            end: today + Duration::days(self.scheduling.overview_window_days),
        });

        if window.start > window.end {
            return Err(ScheduleError::Validation(
                "Window start must not be after window end".to_string(),
            ));
        }

        debug!(
            "Building schedule overview for doctor {} from {} to {}",
            doctor_id, window.start, window.end
        );

        let definitions = self.specific_definitions_in_window(doctor_id, &window, auth_token).await?;

        let booked = self.appointments.find_in_range(
            doctor_id,
            window.start.and_hms_opt(0, 0, 0).unwrap().and_utc(),
            window.end.and_hms_opt(23, 59, 59).unwrap().and_utc(),
            None,
            auth_token,
        ).await?;
        let booked_by_time = index_by_start_time(&booked);

        let mut by_date: BTreeMap<NaiveDate, Vec<SlotDefinition>> = BTreeMap::new();
        for definition in definitions {
            if let Some(date) = definition.specific_date {
                by_date.entry(date).or_default().push(definition);
            }
        }

        let mut timeline = Vec::new();
        for date in window.start.iter_days().take_while(|date| *date <= window.end) {
            let slots = by_date
                .get(&date)
                .map(|definitions| {
                    definitions
                        .iter()
                        .map(|definition| project_slot(definition, date, &booked_by_time, now))
                        .collect()
                })
                .unwrap_or_default();

            timeline.push(TimelineDay {
                date,
                day_of_week: Weekday::from(date.weekday()),
                slots,
            });
        }

        let next_appointment = self.appointments.next_upcoming(doctor_id, now, auth_token).await?;
        let recent_sessions = self.appointments.recently_completed(
            doctor_id,
            self.scheduling.recent_sessions_limit,
            auth_token,
        ).await?;

        let summary = summarize(
            &timeline,
            now,
            self.scheduling.week_ahead_days,
            next_appointment,
            recent_sessions,
        );

        let locations = self.active_locations(doctor_id, auth_token).await?;

        Ok(ScheduleOverview {
            timeline,
            summary,
            window,
            locations,
        })
    }

    async fn specific_definitions_in_window(
        &self,
        doctor_id: Uuid,
        window: &OverviewWindow,
        auth_token: Option<&str>,
    ) -> Result<Vec<SlotDefinition>, ScheduleError> {
        let path = format!(
            "/rest/v1/slot_definitions?doctor_id=eq.{}&kind=eq.specific&active=is.true&deleted_at=is.null\
             &specific_date=gte.{}&specific_date=lte.{}&order=specific_date.asc,start_time.asc",
            doctor_id, window.start, window.end
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        result
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(|e| ScheduleError::Storage(e.into())))
            .collect()
    }

    async fn active_locations(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<Location>, ScheduleError> {
        let path = format!(
            "/rest/v1/locations?doctor_id=eq.{}&active=is.true&order=name.asc",
            doctor_id
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        result
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(|e| ScheduleError::Storage(e.into())))
            .collect()
    }
}

/// Index appointments by `(date, HH:MM)` start key. When a cancelled and a
/// rebooked appointment share the same start, the one that still counts
/// wins.
fn index_by_start_time(appointments: &[Appointment]) -> HashMap<(NaiveDate, String), Appointment> {
    let mut index: HashMap<(NaiveDate, String), Appointment> = HashMap::new();

    for appointment in appointments {
        let key = (
            appointment.scheduled_at.date_naive(),
            appointment.scheduled_at.format("%H:%M").to_string(),
        );

        match index.get(&key) {
            Some(existing) if status_rank(existing.status) >= status_rank(appointment.status) => {}
            _ => {
                index.insert(key, appointment.clone());
            }
        }
    }

    index
}

fn status_rank(status: AppointmentStatus) -> u8 {
    match status {
        AppointmentStatus::Scheduled
        | AppointmentStatus::Rescheduled
        | AppointmentStatus::InProgress => 3,
        AppointmentStatus::Completed => 2,
        AppointmentStatus::NoShow => 1,
        AppointmentStatus::Cancelled => 0,
    }
}

fn project_slot(
    definition: &SlotDefinition,
    date: NaiveDate,
    booked_by_time: &HashMap<(NaiveDate, String), Appointment>,
    now: DateTime<Utc>,
) -> TimelineSlot {
    let key = (date, definition.start_time.format("%H:%M").to_string());
    let appointment = booked_by_time.get(&key);

    let end_at = date.and_time(definition.end_time).and_utc();
    let start_at = date.and_time(definition.start_time).and_utc();

    let status = resolve_slot_status(appointment, end_at, now);
    let modifiable = can_modify(start_at, now, appointment);

    TimelineSlot {
        slot_id: definition.id,
        start_time: definition.start_time,
        end_time: definition.end_time,
        location_id: definition.location_id,
        status,
        appointment_id: appointment.map(|appointment| appointment.id),
        can_edit: modifiable,
        can_delete: modifiable,
    }
}

fn resolve_slot_status(
    appointment: Option<&Appointment>,
    end_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> SlotStatus {
    match appointment.map(|appointment| appointment.status) {
        Some(AppointmentStatus::Scheduled) | Some(AppointmentStatus::Rescheduled) => SlotStatus::Busy,
        Some(AppointmentStatus::InProgress) => SlotStatus::Ongoing,
        Some(AppointmentStatus::Completed) => SlotStatus::Completed,
        Some(AppointmentStatus::Cancelled) => SlotStatus::Cancelled,
        Some(AppointmentStatus::NoShow) => SlotStatus::NoShow,
        None => {
            if end_at <= now {
                SlotStatus::Expired
            } else {
                SlotStatus::Available
            }
        }
    }
}

/// A slot may be edited or deleted only while it is strictly in the future
/// and no committed or historical consultation hangs off it.
fn can_modify(
    start_at: DateTime<Utc>,
    now: DateTime<Utc>,
    appointment: Option<&Appointment>,
) -> bool {
    if start_at <= now {
        return false;
    }

    match appointment {
        None => true,
        Some(appointment) => !matches!(
            appointment.status,
            AppointmentStatus::Completed | AppointmentStatus::InProgress
        ),
    }
}

fn summarize(
    timeline: &[TimelineDay],
    now: DateTime<Utc>,
    week_ahead_days: i64,
    next_appointment: Option<Appointment>,
    recent_sessions: Vec<Appointment>,
) -> ScheduleSummary {
    let today = now.date_naive();
    let week_start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    let week_end = week_start + Duration::days(6);
    let ahead_end = today + Duration::days(week_ahead_days);

    let mut future_slots = 0;
    let mut past_slots = 0;
    let mut available_this_week = 0;
    let mut week_ahead = WeekAheadBreakdown {
        total: 0,
        available: 0,
        busy: 0,
    };

    for day in timeline {
        for slot in &day.slots {
            let start_at = day.date.and_time(slot.start_time).and_utc();

            if start_at > now {
                future_slots += 1;
            } else {
                past_slots += 1;
            }

            if slot.status == SlotStatus::Available
                && day.date >= week_start
                && day.date <= week_end
            {
                available_this_week += 1;
            }

            if day.date >= today && day.date < ahead_end {
                week_ahead.total += 1;
                match slot.status {
                    SlotStatus::Available => week_ahead.available += 1,
                    SlotStatus::Busy => week_ahead.busy += 1,
                    _ => {}
                }
            }
        }
    }

    ScheduleSummary {
        future_slots,
        available_this_week,
        week_ahead,
        past_slots,
        next_appointment,
        recent_sessions,
    }
}
