//! Reservation parameters and the genre limit table

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::domain::{Module, ReservationError, UpsertGenreLimitInput};
use crate::infrastructure::AppState;

/// Partial update of a module's parameters; absent fields keep their value
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub enabled: Option<bool>,
    pub general_cap: Option<u32>,
    pub novelty_cap: Option<u32>,
    pub novelty_window_days: Option<u32>,
    pub novelty_tracking_enabled: Option<bool>,
    pub ready_expiry_days: Option<u32>,
    pub reminder_days_before: Option<u32>,
    pub loan_duration_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct GenreLimitQuery {
    pub module: Option<Module>,
}

#[utoipa::path(
    get,
    path = "/api/reservation-settings",
    responses((status = 200, description = "Parameters of every module"))
)]
pub async fn list_settings(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ReservationError> {
    let settings = state.params.list().await?;
    Ok(Json(json!({ "settings": settings })))
}

#[utoipa::path(
    get,
    path = "/api/reservation-settings/{module}",
    params(("module" = String, Path, description = "books, games, films or discs")),
    responses(
        (status = 200, description = "Parameters of the module"),
        (status = 404, description = "Module has no parameters yet")
    )
)]
pub async fn get_settings(
    State(state): State<AppState>,
    Path(module): Path<Module>,
) -> Result<impl IntoResponse, ReservationError> {
    let settings = state
        .params
        .list()
        .await?
        .into_iter()
        .find(|s| s.module == module)
        .ok_or_else(|| ReservationError::NotFound(format!("Settings for {}", module)))?;

    Ok(Json(settings))
}

#[utoipa::path(
    put,
    path = "/api/reservation-settings/{module}",
    params(("module" = String, Path, description = "books, games, films or discs")),
    responses(
        (status = 200, description = "Parameters updated"),
        (status = 400, description = "Invalid value")
    )
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Path(module): Path<Module>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, ReservationError> {
    let mut settings = state
        .params
        .list()
        .await?
        .into_iter()
        .find(|s| s.module == module)
        .ok_or_else(|| ReservationError::NotFound(format!("Settings for {}", module)))?;

    if let Some(enabled) = payload.enabled {
        settings.enabled = enabled;
    }
    if let Some(cap) = payload.general_cap {
        settings.general_cap = cap;
    }
    if let Some(cap) = payload.novelty_cap {
        settings.novelty_cap = cap;
    }
    if let Some(days) = payload.novelty_window_days {
        settings.novelty_window_days = days;
    }
    if let Some(tracking) = payload.novelty_tracking_enabled {
        settings.novelty_tracking_enabled = tracking;
    }
    if let Some(days) = payload.ready_expiry_days {
        settings.ready_expiry_days = days;
    }
    if let Some(days) = payload.reminder_days_before {
        settings.reminder_days_before = days;
    }
    if let Some(days) = payload.loan_duration_days {
        settings.loan_duration_days = days;
    }

    settings.validate().map_err(ReservationError::Validation)?;

    let updated = state.params.update(settings).await?;
    Ok(Json(updated))
}

#[utoipa::path(
    get,
    path = "/api/genre-limits",
    params(("module" = Option<String>, Query, description = "Only limits of this module")),
    responses((status = 200, description = "Configured genre limits"))
)]
pub async fn list_genre_limits(
    State(state): State<AppState>,
    Query(query): Query<GenreLimitQuery>,
) -> Result<impl IntoResponse, ReservationError> {
    let limits = state.genre_limits.list(query.module).await?;
    Ok(Json(json!({ "genre_limits": limits })))
}

#[utoipa::path(
    post,
    path = "/api/genre-limits",
    responses((status = 200, description = "Limit created or replaced"))
)]
pub async fn upsert_genre_limit(
    State(state): State<AppState>,
    Json(payload): Json<UpsertGenreLimitInput>,
) -> Result<impl IntoResponse, ReservationError> {
    let limit = state.genre_limits.upsert(payload).await?;
    Ok(Json(limit))
}

#[utoipa::path(
    delete,
    path = "/api/genre-limits/{id}",
    params(("id" = i32, Path, description = "Genre limit ID")),
    responses(
        (status = 200, description = "Limit deleted"),
        (status = 404, description = "Limit not found")
    )
)]
pub async fn delete_genre_limit(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ReservationError> {
    state.genre_limits.delete(id).await?;
    Ok(Json(json!({ "message": "Genre limit deleted successfully" })))
}
