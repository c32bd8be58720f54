pub mod error;
pub mod health;
pub mod loan;
pub mod reservations;
pub mod settings;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::infrastructure::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Reservations
        .route(
            "/reservations",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route(
            "/reservations/validate-limits",
            post(reservations::validate_limits),
        )
        .route(
            "/reservations/limits-summary/:patron_id/:module",
            get(reservations::limits_summary),
        )
        .route(
            "/reservations/queue/:module/:item_id",
            get(reservations::item_queue),
        )
        .route(
            "/reservations/:id",
            get(reservations::get_reservation).delete(reservations::cancel_reservation),
        )
        .route("/reservations/:id/mark-ready", post(reservations::mark_ready))
        .route("/reservations/:id/convert", post(reservations::convert_to_loan))
        .route("/reservations/:id/extend", post(reservations::extend_reservation))
        .route("/reservations/:id/reorder", post(reservations::reorder_reservation))
        .route("/reservations/:id/notify", post(reservations::notify_reservation))
        // Parameters
        .route("/reservation-settings", get(settings::list_settings))
        .route(
            "/reservation-settings/:module",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route(
            "/genre-limits",
            get(settings::list_genre_limits).post(settings::upsert_genre_limit),
        )
        .route("/genre-limits/:id", delete(settings::delete_genre_limit))
        // Loans
        .route("/loans", get(loan::list_loans))
        .route("/loans/:id/return", put(loan::return_loan))
        .with_state(state)
}
