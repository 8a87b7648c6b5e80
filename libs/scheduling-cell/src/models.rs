// libs/scheduling-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveTime};
use std::fmt;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

/// Closed weekday set for recurring availability rules. Stored as lowercase
/// strings; an out-of-range value cannot be represented.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
            Weekday::Sunday => "sunday",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(weekday: chrono::Weekday) -> Self {
        match weekday {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Recurring,
    Specific,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Recurring => write!(f, "recurring"),
            SlotKind::Specific => write!(f, "specific"),
        }
    }
}

/// A doctor's availability rule. Exactly one of `day_of_week` /
/// `specific_date` is set, matching `kind`. Rows are soft-deleted:
/// `deleted_at` is stamped and `active` cleared, the record stays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDefinition {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub kind: SlotKind,
    pub day_of_week: Option<Weekday>,
    pub specific_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location_id: Option<Uuid>,
    pub active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlotDefinition {
    pub fn applies_to(&self, date: NaiveDate) -> bool {
        match self.kind {
            SlotKind::Recurring => {
                self.day_of_week == Some(Weekday::from(chrono::Datelike::weekday(&date)))
            }
            SlotKind::Specific => self.specific_date == Some(date),
        }
    }
}

/// A date on which the doctor is fully unavailable, regardless of any slot
/// definitions. Uniqueness per doctor+date is conventional, not enforced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedDate {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub reason: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Teleconsultation,
    Office,
    Hospital,
    Clinic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub name: String,
    pub kind: LocationKind,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// APPOINTMENTS (EXTERNAL, READ-ONLY)
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    /// Statuses that reserve their start-time slot. Completed, cancelled and
    /// no-show appointments never block a slot.
    pub fn is_occupying(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Scheduled
                | AppointmentStatus::Rescheduled
                | AppointmentStatus::InProgress
        )
    }

    pub fn occupying() -> &'static [AppointmentStatus] {
        &[
            AppointmentStatus::Scheduled,
            AppointmentStatus::Rescheduled,
            AppointmentStatus::InProgress,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
            AppointmentStatus::Rescheduled => "rescheduled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Booked appointment as read from the appointments collaborator. The
/// scheduling core only consumes time and status; loose metadata stays in
/// `extra` and is never interpreted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

// ==============================================================================
// AVAILABILITY RESOLUTION
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub time: String,
    pub location_id: Option<Uuid>,
    pub location: Option<Location>,
}

/// Resolved bookable slots for one calendar date. A blocked date yields
/// `blocked = true` with an empty slot list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub blocked: bool,
    pub blocked_reason: Option<String>,
    pub slots: Vec<AvailableSlot>,
}

impl DayAvailability {
    pub fn blocked(date: NaiveDate, reason: Option<String>) -> Self {
        Self {
            date,
            blocked: true,
            blocked_reason: reason,
            slots: Vec::new(),
        }
    }

    pub fn open(date: NaiveDate, slots: Vec<AvailableSlot>) -> Self {
        Self {
            date,
            blocked: false,
            blocked_reason: None,
            slots,
        }
    }
}

// ==============================================================================
// TIMELINE / SUMMARY PROJECTION
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Busy,
    Ongoing,
    Completed,
    Cancelled,
    NoShow,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineSlot {
    pub slot_id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location_id: Option<Uuid>,
    pub status: SlotStatus,
    pub appointment_id: Option<Uuid>,
    pub can_edit: bool,
    pub can_delete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineDay {
    pub date: NaiveDate,
    pub day_of_week: Weekday,
    pub slots: Vec<TimelineSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekAheadBreakdown {
    pub total: usize,
    pub available: usize,
    pub busy: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub future_slots: usize,
    pub available_this_week: usize,
    pub week_ahead: WeekAheadBreakdown,
    pub past_slots: usize,
    pub next_appointment: Option<Appointment>,
    pub recent_sessions: Vec<Appointment>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OverviewWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOverview {
    pub timeline: Vec<TimelineDay>,
    pub summary: ScheduleSummary,
    pub window: OverviewWindow,
    pub locations: Vec<Location>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotDefinitionRequest {
    pub kind: SlotKind,
    pub day_of_week: Option<Weekday>,
    pub specific_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSlotDefinitionRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location_id: Option<Uuid>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateSlotRequest {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub day_of_week: Option<Weekday>,
    pub specific_date: Option<NaiveDate>,
    pub location_id: Option<Uuid>,
    pub exclude_slot_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBlockedDateRequest {
    pub date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
    pub kind: LocationKind,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLocationRequest {
    pub name: Option<String>,
    pub kind: Option<LocationKind>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
}

// ==============================================================================
// BATCH SCHEDULE CONFIGURATION
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecurringSlot {
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSpecificSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location_id: Option<Uuid>,
}

/// One atomic schedule-configuration save. Either every element is
/// persisted or none of them are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfigBatch {
    #[serde(default)]
    pub locations: Vec<CreateLocationRequest>,
    #[serde(default)]
    pub recurring_slots: Vec<BatchRecurringSlot>,
    #[serde(default)]
    pub specific_slots: Vec<BatchSpecificSlot>,
    #[serde(default)]
    pub blocked_dates: Vec<CreateBlockedDateRequest>,
}

impl ScheduleConfigBatch {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
            && self.recurring_slots.is_empty()
            && self.specific_slots.is_empty()
            && self.blocked_dates.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfigApplied {
    pub locations: usize,
    pub recurring_slots: usize,
    pub specific_slots: usize,
    pub blocked_dates: usize,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Schedule conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
