// libs/scheduling-cell/src/services/conflict.rs

use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;
use chrono::NaiveTime;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{ScheduleError, SlotDefinition, ValidateSlotRequest};

/// Half-open interval overlap: `[a_start, a_end)` against `[b_start, b_end)`.
/// Touching endpoints do not overlap.
pub fn intervals_overlap(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Whether an existing definition collides with a proposed `[start, end)`
/// interval. A definition without a location is a wildcard and collides with
/// any proposed location; with no proposed location, every overlap collides.
pub fn slot_conflicts(
    existing: &SlotDefinition,
    start: NaiveTime,
    end: NaiveTime,
    location_id: Option<Uuid>,
) -> bool {
    if !intervals_overlap(existing.start_time, existing.end_time, start, end) {
        return false;
    }

    match location_id {
        Some(location) => {
            existing.location_id.is_none() || existing.location_id == Some(location)
        }
        None => true,
    }
}

pub struct SlotConflictService {
    supabase: SupabaseClient,
}

impl SlotConflictService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Check a proposed slot definition against the doctor's existing active
    /// definitions of the same kind. Returns `Ok(true)` when the slot can be
    /// created; `Ok(false)` is a normal "reject with a conflict message"
    /// outcome, not an error.
    pub async fn validate(
        &self,
        doctor_id: Uuid,
        request: &ValidateSlotRequest,
        auth_token: Option<&str>,
    ) -> Result<bool, ScheduleError> {
        let mut path = format!(
            "/rest/v1/slot_definitions?doctor_id=eq.{}&active=is.true&deleted_at=is.null",
            doctor_id
        );

        match (request.day_of_week, request.specific_date) {
            (Some(day), None) => {
                path.push_str(&format!("&kind=eq.recurring&day_of_week=eq.{}", day));
            }
            (None, Some(date)) => {
                path.push_str(&format!("&kind=eq.specific&specific_date=eq.{}", date));
            }
            _ => {
                return Err(ScheduleError::Validation(
                    "Exactly one of day_of_week or specific_date must be set".to_string(),
                ));
            }
        }

        if let Some(exclude_id) = request.exclude_slot_id {
            path.push_str(&format!("&id=neq.{}", exclude_id));
        }

        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        for value in existing {
            let definition: SlotDefinition = serde_json::from_value(value)
                .map_err(|e| ScheduleError::Storage(e.into()))?;

            if slot_conflicts(
                &definition,
                request.start_time,
                request.end_time,
                request.location_id,
            ) {
                debug!(
                    "Proposed slot {}-{} conflicts with definition {} ({}-{})",
                    request.start_time,
                    request.end_time,
                    definition.id,
                    definition.start_time,
                    definition.end_time
                );
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::models::{SlotKind, Weekday};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn definition(start: NaiveTime, end: NaiveTime, location_id: Option<Uuid>) -> SlotDefinition {
        SlotDefinition {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            kind: SlotKind::Recurring,
            day_of_week: Some(Weekday::Monday),
            specific_date: None,
            start_time: start,
            end_time: end,
            location_id,
            active: true,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn overlap_is_symmetric() {
        assert!(intervals_overlap(t(9, 0), t(10, 0), t(9, 30), t(10, 30)));
        assert!(intervals_overlap(t(9, 30), t(10, 30), t(9, 0), t(10, 0)));
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        assert!(!intervals_overlap(t(9, 0), t(10, 0), t(10, 0), t(11, 0)));
        assert!(!intervals_overlap(t(10, 0), t(11, 0), t(9, 0), t(10, 0)));
    }

    #[test]
    fn containment_overlaps() {
        assert!(intervals_overlap(t(9, 0), t(12, 0), t(10, 0), t(10, 30)));
    }

    #[test]
    fn null_location_is_a_wildcard() {
        let existing = definition(t(9, 0), t(10, 0), None);
        assert!(slot_conflicts(&existing, t(9, 30), t(10, 30), Some(Uuid::new_v4())));
    }

    #[test]
    fn distinct_locations_do_not_conflict() {
        let existing = definition(t(9, 0), t(10, 0), Some(Uuid::new_v4()));
        assert!(!slot_conflicts(&existing, t(9, 30), t(10, 30), Some(Uuid::new_v4())));
    }

    #[test]
    fn same_location_conflicts() {
        let location = Uuid::new_v4();
        let existing = definition(t(9, 0), t(10, 0), Some(location));
        assert!(slot_conflicts(&existing, t(9, 30), t(10, 30), Some(location)));
    }

    #[test]
    fn no_proposed_location_conflicts_with_any_overlap() {
        let existing = definition(t(9, 0), t(10, 0), Some(Uuid::new_v4()));
        assert!(slot_conflicts(&existing, t(9, 30), t(10, 30), None));
    }
}
