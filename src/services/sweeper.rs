//! Periodic expiry of lapsed reservations and pickup reminders

use chrono::Utc;
use std::time::Duration;

use crate::services::reservation_service::ReservationService;

/// Run one sweep: expire overdue ready reservations, then queue reminders
pub async fn sweep_once(service: &ReservationService) {
    let now = Utc::now();

    match service.expire_overdue(now).await {
        Ok(applied) if !applied.value.is_empty() => {
            tracing::info!("⌛ Sweeper expired {} reservation(s)", applied.value.len())
        }
        Ok(_) => {}
        Err(e) => tracing::error!("❌ Error expiring reservations: {}", e),
    }

    if let Err(e) = service.send_due_reminders(now).await {
        tracing::error!("❌ Error sending reservation reminders: {}", e);
    }
}

pub async fn run_sweeper(service: ReservationService, interval: Duration) {
    tracing::info!("🔄 Reservation sweeper started (every {:?})", interval);

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        sweep_once(&service).await;
    }
}
