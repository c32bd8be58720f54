//! Availability/Queue Index
//!
//! Derives the ordered line of active reservations for an item and keeps
//! queue positions gap-free. Every function runs inside the caller's
//! transaction; selects that feed a write take an exclusive row lock.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Serialize;

use crate::domain::{CatalogItem, ItemRef, Module, ReservationStatus};
use crate::models::reservation::{self, Entity as Reservation};

/// An item together with its current line of active reservations
#[derive(Debug, Clone, Serialize)]
pub struct ItemQueue {
    pub item: CatalogItem,
    pub reservations: Vec<reservation::Model>,
}

fn active_condition() -> Condition {
    Condition::all().add(reservation::Column::Status.is_in(ReservationStatus::ACTIVE))
}

fn item_condition(item: ItemRef) -> Condition {
    active_condition()
        .add(reservation::Column::Module.eq(item.module))
        .add(reservation::Column::ItemId.eq(item.item_id))
}

/// Active reservations of an item ordered by queue position, locked
pub async fn active_queue(
    txn: &DatabaseTransaction,
    item: ItemRef,
) -> Result<Vec<reservation::Model>, DbErr> {
    Reservation::find()
        .filter(item_condition(item))
        .order_by_asc(reservation::Column::QueuePosition)
        .lock_exclusive()
        .all(txn)
        .await
}

/// Position a newly queued reservation should take
pub async fn next_position(txn: &DatabaseTransaction, item: ItemRef) -> Result<i32, DbErr> {
    let queue = active_queue(txn, item).await?;
    Ok(queue.last().map_or(0, |r| r.queue_position) + 1)
}

/// Whether any active reservation remains for the item
pub async fn has_active(txn: &DatabaseTransaction, item: ItemRef) -> Result<bool, DbErr> {
    Ok(!active_queue(txn, item).await?.is_empty())
}

/// The patron's active reservation for one item, if any
pub async fn find_active_for(
    txn: &DatabaseTransaction,
    patron_id: i32,
    item: ItemRef,
) -> Result<Option<reservation::Model>, DbErr> {
    Reservation::find()
        .filter(item_condition(item))
        .filter(reservation::Column::PatronId.eq(patron_id))
        .lock_exclusive()
        .one(txn)
        .await
}

/// All active reservations a patron holds in a module
pub async fn active_for_patron(
    txn: &DatabaseTransaction,
    patron_id: i32,
    module: Module,
) -> Result<Vec<reservation::Model>, DbErr> {
    Reservation::find()
        .filter(active_condition())
        .filter(reservation::Column::PatronId.eq(patron_id))
        .filter(reservation::Column::Module.eq(module))
        .order_by_asc(reservation::Column::CreatedAt)
        .lock_exclusive()
        .all(txn)
        .await
}

async fn set_position(txn: &DatabaseTransaction, id: i32, position: i32) -> Result<(), DbErr> {
    Reservation::update_many()
        .col_expr(reservation::Column::QueuePosition, Expr::value(position))
        .col_expr(reservation::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(reservation::Column::Id.eq(id))
        .exec(txn)
        .await?;
    Ok(())
}

/// Renumber the active line of an item to 1..N, keeping its order.
///
/// Positions only ever decrease here, and they are rewritten in ascending
/// order, so no two active rows share a slot at any point.
pub async fn compact(txn: &DatabaseTransaction, item: ItemRef) -> Result<Vec<i32>, DbErr> {
    let queue = active_queue(txn, item).await?;
    let mut moved = Vec::new();

    for (index, entry) in queue.iter().enumerate() {
        let position = index as i32 + 1;
        if entry.queue_position != position {
            set_position(txn, entry.id, position).await?;
            moved.push(entry.id);
        }
    }

    if !moved.is_empty() {
        tracing::debug!("Compacted queue of {}: {} entries moved", item, moved.len());
    }
    Ok(moved)
}

/// Shift every active reservation of the item one slot down the line,
/// freeing position 1. Rewrites from the back so slots never collide.
pub async fn make_room_at_head(txn: &DatabaseTransaction, item: ItemRef) -> Result<(), DbErr> {
    let queue = active_queue(txn, item).await?;
    for entry in queue.iter().rev() {
        set_position(txn, entry.id, entry.queue_position + 1).await?;
    }
    Ok(())
}

/// Exchange the positions of two active reservations of the same item.
/// Both rows must already be locked by the caller.
pub async fn swap_positions(
    txn: &DatabaseTransaction,
    first: &reservation::Model,
    second: &reservation::Model,
) -> Result<(), DbErr> {
    // 0 is never a live slot, park the first row there while the second moves
    set_position(txn, first.id, 0).await?;
    set_position(txn, second.id, first.queue_position).await?;
    set_position(txn, first.id, second.queue_position).await?;
    Ok(())
}

/// True when the positions are exactly 1..=N
pub fn is_gap_free(queue: &[reservation::Model]) -> bool {
    queue
        .iter()
        .enumerate()
        .all(|(index, entry)| entry.queue_position == index as i32 + 1)
}
