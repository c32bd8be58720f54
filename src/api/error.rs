use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::{DomainError, ReservationError};

impl ReservationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReservationError::Denied(_)
            | ReservationError::InvalidOperation(_)
            | ReservationError::Validation(_) => StatusCode::BAD_REQUEST,
            ReservationError::NotFound(_) => StatusCode::NOT_FOUND,
            ReservationError::PatronInactive(_) => StatusCode::FORBIDDEN,
            ReservationError::Conflict(_) => StatusCode::CONFLICT,
            ReservationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ReservationError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            ReservationError::Denied(reasons) => (
                status,
                Json(json!({
                    "error": "Reservation denied",
                    "reasons": reasons,
                })),
            )
                .into_response(),
            ReservationError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (status, Json(json!({ "error": "Internal server error" }))).into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        ReservationError::from(self).into_response()
    }
}
