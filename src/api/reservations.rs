use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use crate::domain::{Direction, ItemRef, Module, ReservationError, ReservationStatus};
use crate::infrastructure::AppState;
use crate::services::{CreateReservation, ReservationFilter};

/// Target of a reservation as sent by clients: exactly one of the four ids
#[derive(Debug, Deserialize)]
pub struct ReservationRequest {
    pub patron_id: i32,
    pub book_id: Option<i32>,
    pub game_id: Option<i32>,
    pub film_id: Option<i32>,
    pub disc_id: Option<i32>,
    pub comment: Option<String>,
}

impl ReservationRequest {
    fn target(&self) -> Result<ItemRef, ReservationError> {
        Ok(ItemRef::from_module_ids(
            self.book_id,
            self.game_id,
            self.film_id,
            self.disc_id,
        )?)
    }
}

#[derive(Debug, Deserialize)]
pub struct ListReservationsQuery {
    pub patron_id: Option<i32>,
    pub module: Option<Module>,
    pub item_id: Option<i32>,
    pub status: Option<ReservationStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertRequest {
    pub due_date: Option<NaiveDate>,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtendRequest {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub direction: Direction,
}

/// Body of an endpoint whose payload is optional: an empty body means
/// defaults, anything else has to parse.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ReservationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ReservationError::Validation(format!("Invalid request body: {}", e)))
}

#[utoipa::path(
    get,
    path = "/api/reservations",
    params(
        ("patron_id" = Option<i32>, Query, description = "Only this patron's reservations"),
        ("module" = Option<String>, Query, description = "books, games, films or discs"),
        ("item_id" = Option<i32>, Query, description = "Only reservations on this item"),
        (
            "status" = Option<String>,
            Query,
            description = "waiting, ready, converted, cancelled or expired"
        )
    ),
    responses(
        (status = 200, description = "Reservations, newest first")
    )
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    Query(query): Query<ListReservationsQuery>,
) -> Result<impl IntoResponse, ReservationError> {
    let reservations = state
        .reservations
        .list(ReservationFilter {
            patron_id: query.patron_id,
            module: query.module,
            item_id: query.item_id,
            status: query.status,
        })
        .await?;

    Ok(Json(json!({
        "total": reservations.len(),
        "reservations": reservations,
    })))
}

#[utoipa::path(
    get,
    path = "/api/reservations/{id}",
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation found"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ReservationError> {
    let reservation = state.reservations.get(id).await?;
    Ok(Json(json!({ "reservation": reservation })))
}

#[utoipa::path(
    post,
    path = "/api/reservations",
    responses(
        (status = 201, description = "Reservation queued"),
        (status = 400, description = "Denied by a limit, with the reasons"),
        (status = 403, description = "Patron account is not active"),
        (status = 404, description = "Patron not found"),
        (status = 409, description = "Lost a race for the queue slot")
    )
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(payload): Json<ReservationRequest>,
) -> Result<impl IntoResponse, ReservationError> {
    let item = payload.target()?;

    let applied = state
        .reservations
        .create(CreateReservation {
            patron_id: payload.patron_id,
            item,
            comment: payload.comment,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Reservation created successfully",
            "reservation": applied.value,
            "warnings": applied.warnings,
        })),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/reservations/{id}",
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled"),
        (status = 400, description = "Reservation is already terminal"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ReservationError> {
    let applied = state.reservations.cancel(id).await?;

    Ok(Json(json!({
        "message": "Reservation cancelled",
        "reservation": applied.value,
        "warnings": applied.warnings,
    })))
}

#[utoipa::path(
    post,
    path = "/api/reservations/{id}/mark-ready",
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Item held for the patron"),
        (status = 400, description = "Reservation is not waiting")
    )
)]
pub async fn mark_ready(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ReservationError> {
    let applied = state.reservations.mark_ready(id).await?;

    Ok(Json(json!({
        "reservation": applied.value,
        "warnings": applied.warnings,
    })))
}

#[utoipa::path(
    post,
    path = "/api/reservations/{id}/convert",
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Loan created from the reservation"),
        (status = 400, description = "Not ready, malformed body, or due date in the past")
    )
)]
pub async fn convert_to_loan(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    body: Bytes,
) -> Result<impl IntoResponse, ReservationError> {
    let payload: ConvertRequest = optional_body(&body)?;

    let applied = state
        .reservations
        .convert_to_loan(id, payload.due_date, payload.comment)
        .await?;

    Ok(Json(json!({
        "message": "Reservation converted to loan",
        "reservation": applied.value.reservation,
        "loan": applied.value.loan,
        "warnings": applied.warnings,
    })))
}

#[utoipa::path(
    post,
    path = "/api/reservations/{id}/extend",
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Pickup deadline pushed back"),
        (status = 400, description = "Not ready or expired, malformed body, or days out of range")
    )
)]
pub async fn extend_reservation(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    body: Bytes,
) -> Result<impl IntoResponse, ReservationError> {
    let payload: ExtendRequest = optional_body(&body)?;
    let days = payload.days.unwrap_or(state.config.default_extend_days);

    let applied = state.reservations.extend(id, days).await?;

    Ok(Json(json!({
        "reservation": applied.value,
        "warnings": applied.warnings,
    })))
}

#[utoipa::path(
    post,
    path = "/api/reservations/{id}/reorder",
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation swapped with its neighbour"),
        (status = 400, description = "Already at the boundary, or not waiting")
    )
)]
pub async fn reorder_reservation(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ReorderRequest>,
) -> Result<impl IntoResponse, ReservationError> {
    let applied = state.reservations.reorder(id, payload.direction).await?;
    Ok(Json(json!({ "reservation": applied.value })))
}

#[utoipa::path(
    post,
    path = "/api/reservations/{id}/notify",
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Ready notification sent again"),
        (status = 400, description = "Reservation is not ready")
    )
)]
pub async fn notify_reservation(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ReservationError> {
    let applied = state.reservations.notify(id).await?;

    Ok(Json(json!({
        "reservation": applied.value,
        "warnings": applied.warnings,
    })))
}

/// Advisory pre-check. Nothing is created and the answer may be stale by the
/// time the reservation is actually submitted.
#[utoipa::path(
    post,
    path = "/api/reservations/validate-limits",
    responses(
        (status = 200, description = "Verdict with the reasons of any denial"),
        (status = 403, description = "Patron account is not active")
    )
)]
pub async fn validate_limits(
    State(state): State<AppState>,
    Json(payload): Json<ReservationRequest>,
) -> Result<impl IntoResponse, ReservationError> {
    let item = payload.target()?;
    let verdict = state.reservations.validate(payload.patron_id, item).await?;
    Ok(Json(verdict))
}

#[utoipa::path(
    get,
    path = "/api/reservations/limits-summary/{patron_id}/{module}",
    params(
        ("patron_id" = i32, Path, description = "Patron ID"),
        ("module" = String, Path, description = "books, games, films or discs")
    ),
    responses(
        (status = 200, description = "Usage against every cap of the module"),
        (status = 404, description = "Patron not found")
    )
)]
pub async fn limits_summary(
    State(state): State<AppState>,
    Path((patron_id, module)): Path<(i32, Module)>,
) -> Result<impl IntoResponse, ReservationError> {
    let summary = state.reservations.limits_summary(patron_id, module).await?;
    Ok(Json(summary))
}

#[utoipa::path(
    get,
    path = "/api/reservations/queue/{module}/{item_id}",
    params(
        ("module" = String, Path, description = "books, games, films or discs"),
        ("item_id" = i32, Path, description = "Item ID within the module")
    ),
    responses(
        (status = 200, description = "Item status and its ordered queue"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn item_queue(
    State(state): State<AppState>,
    Path((module, item_id)): Path<(Module, i32)>,
) -> Result<impl IntoResponse, ReservationError> {
    let queue = state
        .reservations
        .queue(ItemRef::new(module, item_id))
        .await?;
    Ok(Json(queue))
}
