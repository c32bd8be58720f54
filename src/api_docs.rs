use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::reservations::list_reservations,
        api::reservations::get_reservation,
        api::reservations::create_reservation,
        api::reservations::cancel_reservation,
        api::reservations::mark_ready,
        api::reservations::convert_to_loan,
        api::reservations::extend_reservation,
        api::reservations::reorder_reservation,
        api::reservations::notify_reservation,
        api::reservations::validate_limits,
        api::reservations::limits_summary,
        api::reservations::item_queue,
        api::settings::list_settings,
        api::settings::get_settings,
        api::settings::update_settings,
        api::settings::list_genre_limits,
        api::settings::upsert_genre_limit,
        api::settings::delete_genre_limit,
        api::loan::list_loans,
        api::loan::return_loan,
    ),
    tags(
        (name = "collectiva", description = "Collectiva reservation API")
    )
)]
pub struct ApiDoc;
