use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use chrono::NaiveDate;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateBlockedDateRequest, CreateLocationRequest, CreateSlotDefinitionRequest,
    OverviewWindow, ScheduleConfigBatch, ScheduleError, UpdateLocationRequest,
    UpdateSlotDefinitionRequest, ValidateSlotRequest,
};
use crate::services::{
    availability::AvailabilityService,
    schedule::ScheduleService,
    timeline::ScheduleOverviewService,
};

// Query parameters
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    pub window_start: Option<NaiveDate>,
    pub window_end: Option<NaiveDate>,
}

fn map_schedule_error(error: ScheduleError) -> AppError {
    match error {
        ScheduleError::Validation(message) => AppError::ValidationError(message),
        ScheduleError::Conflict(message) => AppError::Conflict(message),
        ScheduleError::NotFound(entity) => AppError::NotFound(format!("{} not found", entity)),
        ScheduleError::Storage(error) => AppError::Database(error.to_string()),
    }
}

/// Doctors manage only their own schedule; admins may manage any.
fn ensure_schedule_owner(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.id == doctor_id.to_string() || user.role.as_deref() == Some("admin") {
        Ok(())
    } else {
        Err(AppError::Auth(
            "Not allowed to manage this doctor's schedule".to_string(),
        ))
    }
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots_public(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let availability = availability_service
        .get_available_slots(doctor_id, query.date, None)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(availability)))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_schedule_overview(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let window = match (query.window_start, query.window_end) {
        (Some(start), Some(end)) => Some(OverviewWindow { start, end }),
        (None, None) => None,
        _ => {
            return Err(AppError::ValidationError(
                "window_start and window_end must be provided together".to_string(),
            ));
        }
    };

    let overview_service = ScheduleOverviewService::new(&state);
    let overview = overview_service
        .get_overview(doctor_id, window, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(overview)))
}

#[axum::debug_handler]
pub async fn list_slot_definitions(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let schedule_service = ScheduleService::new(&state);
    let slots = schedule_service
        .list_slot_definitions(doctor_id, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn create_slot_definition(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<CreateSlotDefinitionRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let schedule_service = ScheduleService::new(&state);
    let slot = schedule_service
        .create_slot_definition(doctor_id, request, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn update_slot_definition(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path((doctor_id, slot_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateSlotDefinitionRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let schedule_service = ScheduleService::new(&state);
    let slot = schedule_service
        .update_slot_definition(doctor_id, slot_id, request, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn delete_slot_definition(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path((doctor_id, slot_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let schedule_service = ScheduleService::new(&state);
    schedule_service
        .delete_slot_definition(doctor_id, slot_id, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({ "deleted": true })))
}

#[axum::debug_handler]
pub async fn validate_slot(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<ValidateSlotRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    // Zero-length and inverted intervals never reach the validator itself.
    if request.start_time >= request.end_time {
        return Err(AppError::ValidationError(
            "Start time must be before end time".to_string(),
        ));
    }

    let schedule_service = ScheduleService::new(&state);
    let valid = schedule_service
        .validate_slot(doctor_id, &request, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({ "valid": valid })))
}

#[axum::debug_handler]
pub async fn list_blocked_dates(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let schedule_service = ScheduleService::new(&state);
    let blocked_dates = schedule_service
        .list_blocked_dates(doctor_id, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "blocked_dates": blocked_dates,
        "total": blocked_dates.len()
    })))
}

#[axum::debug_handler]
pub async fn create_blocked_date(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<CreateBlockedDateRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let schedule_service = ScheduleService::new(&state);
    let blocked = schedule_service
        .create_blocked_date(doctor_id, request, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(blocked)))
}

#[axum::debug_handler]
pub async fn remove_blocked_date(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path((doctor_id, blocked_date_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let schedule_service = ScheduleService::new(&state);
    schedule_service
        .remove_blocked_date(doctor_id, blocked_date_id, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({ "removed": true })))
}

#[axum::debug_handler]
pub async fn list_locations(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let schedule_service = ScheduleService::new(&state);
    let locations = schedule_service
        .list_locations(doctor_id, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "locations": locations,
        "total": locations.len()
    })))
}

#[axum::debug_handler]
pub async fn create_location(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<CreateLocationRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let schedule_service = ScheduleService::new(&state);
    let location = schedule_service
        .create_location(doctor_id, request, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(location)))
}

#[axum::debug_handler]
pub async fn update_location(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path((doctor_id, location_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateLocationRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let schedule_service = ScheduleService::new(&state);
    let location = schedule_service
        .update_location(doctor_id, location_id, request, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(location)))
}

#[axum::debug_handler]
pub async fn apply_schedule_config(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
    Json(batch): Json<ScheduleConfigBatch>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let schedule_service = ScheduleService::new(&state);
    let applied = schedule_service
        .apply_config(doctor_id, batch, Some(auth.token()))
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(applied)))
}
