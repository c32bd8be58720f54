//! Outbound reservation notifications
//!
//! Lifecycle operations push events onto an unbounded channel after their
//! transaction commits. A worker task drains the channel and records each
//! event in the notification log (the email/SMS outbox). Delivery never
//! affects the outcome of the operation that triggered it.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::domain::ItemRef;
use crate::models::{notification_log, reservation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCode {
    Ready,
    Cancelled,
    Reminder,
    Extended,
    Expired,
}

impl EventCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCode::Ready => "ready",
            EventCode::Cancelled => "cancelled",
            EventCode::Reminder => "reminder",
            EventCode::Extended => "extended",
            EventCode::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationEvent {
    pub code: EventCode,
    pub reservation_id: i32,
    pub patron_id: i32,
    pub item: ItemRef,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ReservationEvent {
    pub fn for_reservation(code: EventCode, reservation: &reservation::Model) -> Self {
        Self {
            code,
            reservation_id: reservation.id,
            patron_id: reservation.patron_id,
            item: reservation.item(),
            expires_at: reservation.expires_at,
        }
    }
}

/// Sending half of the notification channel
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<ReservationEvent>,
}

impl NotificationDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReservationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an event. Returns a warning instead of failing when the worker
    /// is gone.
    pub fn trigger(&self, event: ReservationEvent) -> Option<String> {
        let code = event.code;
        let reservation_id = event.reservation_id;

        match self.tx.send(event) {
            Ok(()) => None,
            Err(e) => {
                let warning = format!(
                    "Notification '{}' for reservation {} could not be queued: {}",
                    code.as_str(),
                    reservation_id,
                    e
                );
                tracing::warn!("{}", warning);
                Some(warning)
            }
        }
    }
}

/// Record one event in the notification log
pub async fn record_event(
    db: &DatabaseConnection,
    event: &ReservationEvent,
) -> Result<(), sea_orm::DbErr> {
    let payload = json!({
        "reservation_id": event.reservation_id,
        "patron_id": event.patron_id,
        "module": event.item.module,
        "item_id": event.item.item_id,
        "expires_at": event.expires_at,
    });

    notification_log::ActiveModel {
        event_code: Set(event.code.as_str().to_owned()),
        reservation_id: Set(event.reservation_id),
        patron_id: Set(event.patron_id),
        module: Set(event.item.module),
        item_id: Set(event.item.item_id),
        payload: Set(Some(payload.to_string())),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(())
}

/// Drain the channel until every dispatcher is dropped
pub async fn run_notification_worker(
    db: DatabaseConnection,
    mut rx: mpsc::UnboundedReceiver<ReservationEvent>,
) {
    tracing::info!("📨 Notification worker started");

    while let Some(event) = rx.recv().await {
        match record_event(&db, &event).await {
            Ok(()) => tracing::info!(
                "📨 {} notification for reservation {} (patron {}, {})",
                event.code.as_str(),
                event.reservation_id,
                event.patron_id,
                event.item
            ),
            Err(e) => tracing::warn!(
                "⚠️ Failed to record {} notification for reservation {}: {}",
                event.code.as_str(),
                event.reservation_id,
                e
            ),
        }
    }

    tracing::info!("Notification worker stopped");
}
