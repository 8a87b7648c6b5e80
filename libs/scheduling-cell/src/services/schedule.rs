// libs/scheduling-cell/src/services/schedule.rs
//
// Durable schedule configuration: slot definitions, blocked dates and
// locations. Deletion is always soft; every read here filters inactive and
// deleted rows explicitly.

use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::{AppConfig, SchedulingConfig};
use shared_database::supabase::SupabaseClient;

use crate::models::{
    BlockedDate, CreateBlockedDateRequest, CreateLocationRequest,
    CreateSlotDefinitionRequest, Location, ScheduleConfigApplied,
    ScheduleConfigBatch, ScheduleError, SlotDefinition, SlotKind,
    UpdateLocationRequest, UpdateSlotDefinitionRequest, ValidateSlotRequest, Weekday,
};
use crate::services::conflict::{intervals_overlap, SlotConflictService};

pub struct ScheduleService {
    supabase: SupabaseClient,
    conflicts: SlotConflictService,
    scheduling: SchedulingConfig,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            conflicts: SlotConflictService::new(config),
            scheduling: config.scheduling.clone(),
        }
    }

    // ----- slot definitions -------------------------------------------------

    pub async fn create_slot_definition(
        &self,
        doctor_id: Uuid,
        request: CreateSlotDefinitionRequest,
        auth_token: Option<&str>,
    ) -> Result<SlotDefinition, ScheduleError> {
        debug!("Creating {} slot definition for doctor {}", request.kind, doctor_id);

        validate_kind_shape(request.kind, request.day_of_week, request.specific_date)?;
        self.validate_time_range(request.start_time, request.end_time)?;

        let can_create = self.conflicts.validate(
            doctor_id,
            &ValidateSlotRequest {
                start_time: request.start_time,
                end_time: request.end_time,
                day_of_week: request.day_of_week,
                specific_date: request.specific_date,
                location_id: request.location_id,
                exclude_slot_id: None,
            },
            auth_token,
        ).await?;

        if !can_create {
            return Err(ScheduleError::Conflict(
                "Slot overlaps an existing availability definition".to_string(),
            ));
        }

        let body = json!({
            "doctor_id": doctor_id,
            "kind": request.kind,
            "day_of_week": request.day_of_week,
            "specific_date": request.specific_date,
            "start_time": request.start_time,
            "end_time": request.end_time,
            "location_id": request.location_id,
            "active": true,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/slot_definitions",
            auth_token,
            Some(body),
            Some(representation_headers()),
        ).await?;

        decode_first(result, "Slot definition")
    }

    pub async fn update_slot_definition(
        &self,
        doctor_id: Uuid,
        slot_id: Uuid,
        request: UpdateSlotDefinitionRequest,
        auth_token: Option<&str>,
    ) -> Result<SlotDefinition, ScheduleError> {
        debug!("Updating slot definition {}", slot_id);

        let existing = self.get_slot_definition(doctor_id, slot_id, auth_token).await?;

        let start_time = request.start_time.unwrap_or(existing.start_time);
        let end_time = request.end_time.unwrap_or(existing.end_time);
        self.validate_time_range(start_time, end_time)?;

        let can_update = self.conflicts.validate(
            doctor_id,
            &ValidateSlotRequest {
                start_time,
                end_time,
                day_of_week: existing.day_of_week,
                specific_date: existing.specific_date,
                location_id: request.location_id.or(existing.location_id),
                exclude_slot_id: Some(slot_id),
            },
            auth_token,
        ).await?;

        if !can_update {
            return Err(ScheduleError::Conflict(
                "Slot overlaps an existing availability definition".to_string(),
            ));
        }

        let mut update_data = serde_json::Map::new();
        if let Some(start) = request.start_time {
            update_data.insert("start_time".to_string(), json!(start));
        }
        if let Some(end) = request.end_time {
            update_data.insert("end_time".to_string(), json!(end));
        }
        if let Some(location_id) = request.location_id {
            update_data.insert("location_id".to_string(), json!(location_id));
        }
        if let Some(active) = request.active {
            update_data.insert("active".to_string(), json!(active));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/slot_definitions?id=eq.{}", slot_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            auth_token,
            Some(Value::Object(update_data)),
            Some(representation_headers()),
        ).await?;

        decode_first(result, "Slot definition")
    }

    /// Soft delete: the row is kept as a historical record.
    pub async fn delete_slot_definition(
        &self,
        doctor_id: Uuid,
        slot_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<(), ScheduleError> {
        debug!("Deleting slot definition {}", slot_id);

        self.get_slot_definition(doctor_id, slot_id, auth_token).await?;

        let path = format!("/rest/v1/slot_definitions?id=eq.{}", slot_id);
        let body = json!({
            "active": false,
            "deleted_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let _: Vec<Value> = self.supabase.request(
            Method::PATCH,
            &path,
            auth_token,
            Some(body),
        ).await?;

        Ok(())
    }

    pub async fn list_slot_definitions(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<SlotDefinition>, ScheduleError> {
        let path = format!(
            "/rest/v1/slot_definitions?doctor_id=eq.{}&active=is.true&deleted_at=is.null\
             &order=kind.asc,day_of_week.asc,specific_date.asc,start_time.asc",
            doctor_id
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        decode_all(result)
    }

    /// Can-create probe for the booking UI; no write happens either way.
    pub async fn validate_slot(
        &self,
        doctor_id: Uuid,
        request: &ValidateSlotRequest,
        auth_token: Option<&str>,
    ) -> Result<bool, ScheduleError> {
        self.conflicts.validate(doctor_id, request, auth_token).await
    }

    async fn get_slot_definition(
        &self,
        doctor_id: Uuid,
        slot_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<SlotDefinition, ScheduleError> {
        let path = format!(
            "/rest/v1/slot_definitions?id=eq.{}&deleted_at=is.null",
            slot_id
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        let definition: SlotDefinition = match result.into_iter().next() {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ScheduleError::Storage(e.into()))?,
            None => return Err(ScheduleError::NotFound("Slot definition")),
        };

        if definition.doctor_id != doctor_id {
            return Err(ScheduleError::NotFound("Slot definition"));
        }

        Ok(definition)
    }

    // ----- blocked dates ----------------------------------------------------

    pub async fn create_blocked_date(
        &self,
        doctor_id: Uuid,
        request: CreateBlockedDateRequest,
        auth_token: Option<&str>,
    ) -> Result<BlockedDate, ScheduleError> {
        debug!("Blocking {} for doctor {}", request.date, doctor_id);

        let body = json!({
            "doctor_id": doctor_id,
            "date": request.date,
            "reason": request.reason,
            "active": true,
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/blocked_dates",
            auth_token,
            Some(body),
            Some(representation_headers()),
        ).await?;

        decode_first(result, "Blocked date")
    }

    pub async fn remove_blocked_date(
        &self,
        doctor_id: Uuid,
        blocked_date_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<(), ScheduleError> {
        let path = format!(
            "/rest/v1/blocked_dates?id=eq.{}&doctor_id=eq.{}",
            blocked_date_id, doctor_id
        );

        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        if existing.is_empty() {
            return Err(ScheduleError::NotFound("Blocked date"));
        }

        let _: Vec<Value> = self.supabase.request(
            Method::PATCH,
            &path,
            auth_token,
            Some(json!({ "active": false })),
        ).await?;

        Ok(())
    }

    pub async fn list_blocked_dates(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<BlockedDate>, ScheduleError> {
        let path = format!(
            "/rest/v1/blocked_dates?doctor_id=eq.{}&active=is.true&order=date.asc",
            doctor_id
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        decode_all(result)
    }

    // ----- locations --------------------------------------------------------

    pub async fn create_location(
        &self,
        doctor_id: Uuid,
        request: CreateLocationRequest,
        auth_token: Option<&str>,
    ) -> Result<Location, ScheduleError> {
        validate_location_name(&request.name)?;

        let body = json!({
            "doctor_id": doctor_id,
            "name": request.name,
            "kind": request.kind,
            "address": request.address,
            "phone": request.phone,
            "active": true,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/locations",
            auth_token,
            Some(body),
            Some(representation_headers()),
        ).await?;

        decode_first(result, "Location")
    }

    pub async fn update_location(
        &self,
        doctor_id: Uuid,
        location_id: Uuid,
        request: UpdateLocationRequest,
        auth_token: Option<&str>,
    ) -> Result<Location, ScheduleError> {
        if let Some(ref name) = request.name {
            validate_location_name(name)?;
        }

        let path = format!(
            "/rest/v1/locations?id=eq.{}&doctor_id=eq.{}",
            location_id, doctor_id
        );

        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        if existing.is_empty() {
            return Err(ScheduleError::NotFound("Location"));
        }

        let mut update_data = serde_json::Map::new();
        if let Some(name) = request.name {
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(kind) = request.kind {
            update_data.insert("kind".to_string(), json!(kind));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(active) = request.active {
            update_data.insert("active".to_string(), json!(active));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            auth_token,
            Some(Value::Object(update_data)),
            Some(representation_headers()),
        ).await?;

        decode_first(result, "Location")
    }

    pub async fn list_locations(
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

        decode_all(result)
    }

    // ----- atomic batch save ------------------------------------------------

    /// Apply a whole schedule configuration in one shot. Every element is
    /// validated first, against the batch itself and against the stored
    /// definitions; the write then goes through a single transactional RPC,
    /// so a booking request can never observe a half-applied configuration.
    pub async fn apply_config(
        &self,
        doctor_id: Uuid,
        batch: ScheduleConfigBatch,
        auth_token: Option<&str>,
    ) -> Result<ScheduleConfigApplied, ScheduleError> {
        if batch.is_empty() {
            return Ok(ScheduleConfigApplied {
                locations: 0,
                recurring_slots: 0,
                specific_slots: 0,
                blocked_dates: 0,
            });
        }

        let mut errors = self.validate_batch_shape(&batch);
        errors.extend(intra_batch_conflicts(&batch));

        // Only consult the store once the batch is internally sound.
        if errors.is_empty() {
            errors.extend(self.stored_conflicts(doctor_id, &batch, auth_token).await?);
        }

        if !errors.is_empty() {
            return Err(ScheduleError::Validation(errors.join("; ")));
        }

        debug!(
            "Applying schedule configuration for doctor {}: {} locations, {} recurring, {} specific, {} blocked",
            doctor_id,
            batch.locations.len(),
            batch.recurring_slots.len(),
            batch.specific_slots.len(),
            batch.blocked_dates.len()
        );

        let applied = ScheduleConfigApplied {
            locations: batch.locations.len(),
            recurring_slots: batch.recurring_slots.len(),
            specific_slots: batch.specific_slots.len(),
            blocked_dates: batch.blocked_dates.len(),
        };

        let _: Value = self.supabase.rpc(
            "apply_schedule_config",
            auth_token,
            json!({
                "p_doctor_id": doctor_id,
                "p_locations": batch.locations,
                "p_recurring_slots": batch.recurring_slots,
                "p_specific_slots": batch.specific_slots,
                "p_blocked_dates": batch.blocked_dates,
            }),
        ).await?;

        Ok(applied)
    }

    fn validate_batch_shape(&self, batch: &ScheduleConfigBatch) -> Vec<String> {
        let mut errors = Vec::new();

        for (index, location) in batch.locations.iter().enumerate() {
            if location.name.trim().is_empty() {
                errors.push(format!("location #{}: name must not be empty", index + 1));
            }
        }

        for (index, slot) in batch.recurring_slots.iter().enumerate() {
            if let Err(message) = self.check_time_range(slot.start_time, slot.end_time) {
                errors.push(format!("recurring slot #{}: {}", index + 1, message));
            }
        }

        for (index, slot) in batch.specific_slots.iter().enumerate() {
            if let Err(message) = self.check_time_range(slot.start_time, slot.end_time) {
                errors.push(format!("specific slot #{}: {}", index + 1, message));
            }
        }

        errors
    }

    async fn stored_conflicts(
        &self,
        doctor_id: Uuid,
        batch: &ScheduleConfigBatch,
        auth_token: Option<&str>,
    ) -> Result<Vec<String>, ScheduleError> {
        let mut errors = Vec::new();

        for (index, slot) in batch.recurring_slots.iter().enumerate() {
            let ok = self.conflicts.validate(
                doctor_id,
                &ValidateSlotRequest {
                    start_time: slot.start_time,
                    end_time: slot.end_time,
                    day_of_week: Some(slot.day_of_week),
                    specific_date: None,
                    location_id: slot.location_id,
                    exclude_slot_id: None,
                },
                auth_token,
            ).await?;

            if !ok {
                errors.push(format!(
                    "recurring slot #{}: overlaps an existing definition",
                    index + 1
                ));
            }
        }

        for (index, slot) in batch.specific_slots.iter().enumerate() {
            let ok = self.conflicts.validate(
                doctor_id,
                &ValidateSlotRequest {
                    start_time: slot.start_time,
                    end_time: slot.end_time,
                    day_of_week: None,
                    specific_date: Some(slot.date),
                    location_id: slot.location_id,
                    exclude_slot_id: None,
                },
                auth_token,
            ).await?;

            if !ok {
                errors.push(format!(
                    "specific slot #{}: overlaps an existing definition",
                    index + 1
                ));
            }
        }

        Ok(errors)
    }

    fn validate_time_range(&self, start: NaiveTime, end: NaiveTime) -> Result<(), ScheduleError> {
        self.check_time_range(start, end).map_err(ScheduleError::Validation)
    }

    fn check_time_range(&self, start: NaiveTime, end: NaiveTime) -> Result<(), String> {
        if start >= end {
            return Err("start time must be before end time".to_string());
        }

        let minutes = (end - start).num_minutes();
        if minutes < self.scheduling.min_slot_duration_minutes as i64 {
            return Err(format!(
                "availability window must be at least {} minutes",
                self.scheduling.min_slot_duration_minutes
            ));
        }

        Ok(())
    }
}

fn validate_kind_shape(
    kind: SlotKind,
    day_of_week: Option<Weekday>,
    specific_date: Option<NaiveDate>,
) -> Result<(), ScheduleError> {
    let valid = match kind {
        SlotKind::Recurring => day_of_week.is_some() && specific_date.is_none(),
        SlotKind::Specific => specific_date.is_some() && day_of_week.is_none(),
    };

    if valid {
        Ok(())
    } else {
        Err(ScheduleError::Validation(format!(
            "A {} slot must set exactly the matching recurrence field",
            kind
        )))
    }
}

fn validate_location_name(name: &str) -> Result<(), ScheduleError> {
    if name.trim().is_empty() {
        Err(ScheduleError::Validation(
            "Location name must not be empty".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Pairwise overlap check inside one batch: two new rules for the same day
/// (or date) must not collide with each other either. Location semantics
/// match the store check - a missing location is a wildcard.
fn intra_batch_conflicts(batch: &ScheduleConfigBatch) -> Vec<String> {
    let mut errors = Vec::new();

    for i in 0..batch.recurring_slots.len() {
        for j in (i + 1)..batch.recurring_slots.len() {
            let a = &batch.recurring_slots[i];
            let b = &batch.recurring_slots[j];
            if a.day_of_week == b.day_of_week
                && intervals_overlap(a.start_time, a.end_time, b.start_time, b.end_time)
                && locations_collide(a.location_id, b.location_id)
            {
                errors.push(format!(
                    "recurring slots #{} and #{} overlap each other",
                    i + 1,
                    j + 1
                ));
            }
        }
    }

    for i in 0..batch.specific_slots.len() {
        for j in (i + 1)..batch.specific_slots.len() {
            let a = &batch.specific_slots[i];
            let b = &batch.specific_slots[j];
            if a.date == b.date
                && intervals_overlap(a.start_time, a.end_time, b.start_time, b.end_time)
                && locations_collide(a.location_id, b.location_id)
            {
                errors.push(format!(
                    "specific slots #{} and #{} overlap each other",
                    i + 1,
                    j + 1
                ));
            }
        }
    }

    errors
}

fn locations_collide(a: Option<Uuid>, b: Option<Uuid>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn representation_headers() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "Prefer",
        reqwest::header::HeaderValue::from_static("return=representation"),
    );
    headers
}

fn decode_first<T: serde::de::DeserializeOwned>(
    result: Vec<Value>,
    entity: &'static str,
) -> Result<T, ScheduleError> {
    match result.into_iter().next() {
        Some(value) => serde_json::from_value(value).map_err(|e| ScheduleError::Storage(e.into())),
        None => Err(ScheduleError::NotFound(entity)),
    }
}

fn decode_all<T: serde::de::DeserializeOwned>(result: Vec<Value>) -> Result<Vec<T>, ScheduleError> {
    result
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(|e| ScheduleError::Storage(e.into())))
        .collect()
}
