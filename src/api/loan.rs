use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::domain::{Module, ReservationError};
use crate::infrastructure::AppState;
use crate::services::loan_service::{self, LoanFilter};

#[derive(Deserialize)]
pub struct ListLoansQuery {
    pub patron_id: Option<i32>,
    pub module: Option<Module>,
    pub status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/loans",
    params(
        ("patron_id" = Option<i32>, Query, description = "Only this patron's loans"),
        ("module" = Option<String>, Query, description = "books, games, films or discs"),
        ("status" = Option<String>, Query, description = "active or returned")
    ),
    responses((status = 200, description = "Loans, most recent first"))
)]
pub async fn list_loans(
    State(state): State<AppState>,
    Query(query): Query<ListLoansQuery>,
) -> Result<impl IntoResponse, ReservationError> {
    let loans = loan_service::list_loans(
        state.db(),
        LoanFilter {
            patron_id: query.patron_id,
            module: query.module,
            status: query.status,
        },
    )
    .await?;

    Ok(Json(json!({ "loans": loans })))
}

#[utoipa::path(
    put,
    path = "/api/loans/{id}/return",
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan returned, item handed back to its queue"),
        (status = 400, description = "Loan already returned"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ReservationError> {
    let (loan, item_status) = state.reservations.return_loan(id).await?;

    Ok(Json(json!({
        "message": "Loan returned successfully",
        "loan": loan,
        "item_status": item_status,
    })))
}
