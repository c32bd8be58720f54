//! Reservation domain types
//!
//! The reservation target is a tagged value (`ItemRef`) rather than four
//! nullable foreign keys, so "exactly one item per reservation" holds by
//! construction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::DomainError;

/// One of the four parallel collections lent by the association.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum Module {
    #[sea_orm(string_value = "books")]
    Books,
    #[sea_orm(string_value = "games")]
    Games,
    #[sea_orm(string_value = "films")]
    Films,
    #[sea_orm(string_value = "discs")]
    Discs,
}

impl Module {
    pub const ALL: [Module; 4] = [Module::Books, Module::Games, Module::Films, Module::Discs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Books => "books",
            Module::Games => "games",
            Module::Films => "films",
            Module::Discs => "discs",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to a single catalog item in one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub module: Module,
    pub item_id: i32,
}

impl ItemRef {
    pub fn new(module: Module, item_id: i32) -> Self {
        Self { module, item_id }
    }

    /// Build a target from the module-specific id fields used by API payloads.
    ///
    /// Exactly one of the four ids must be present.
    pub fn from_module_ids(
        book_id: Option<i32>,
        game_id: Option<i32>,
        film_id: Option<i32>,
        disc_id: Option<i32>,
    ) -> Result<Self, DomainError> {
        let candidates = [
            (Module::Books, book_id),
            (Module::Games, game_id),
            (Module::Films, film_id),
            (Module::Discs, disc_id),
        ];

        let mut present = candidates
            .into_iter()
            .filter_map(|(module, id)| id.map(|id| ItemRef::new(module, id)));

        match (present.next(), present.next()) {
            (Some(target), None) => Ok(target),
            (None, _) => Err(DomainError::Validation(
                "One of book_id, game_id, film_id or disc_id is required".to_string(),
            )),
            (Some(_), Some(_)) => Err(DomainError::Validation(
                "Only one of book_id, game_id, film_id or disc_id may be given".to_string(),
            )),
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.module, self.item_id)
    }
}

/// Reservation lifecycle state.
///
/// `waiting` and `ready` are active; the other three are terminal, except that
/// an `expired` reservation may still be extended back to `ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[sea_orm(string_value = "waiting")]
    Waiting,
    #[sea_orm(string_value = "ready")]
    Ready,
    #[sea_orm(string_value = "converted")]
    Converted,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl ReservationStatus {
    pub const ACTIVE: [ReservationStatus; 2] =
        [ReservationStatus::Waiting, ReservationStatus::Ready];

    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Waiting | ReservationStatus::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Waiting => "waiting",
            ReservationStatus::Ready => "ready",
            ReservationStatus::Converted => "converted",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle operations, used to check a transition before applying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Cancel,
    MarkReady,
    ConvertToLoan,
    Extend,
    Reorder,
    Notify,
    Expire,
}

impl Transition {
    /// Returns an explanation when `status` does not allow this transition.
    pub fn check(self, status: ReservationStatus) -> Result<(), String> {
        use ReservationStatus::*;

        let allowed = match self {
            Transition::Cancel => matches!(status, Waiting | Ready | Expired),
            Transition::MarkReady | Transition::Reorder => status == Waiting,
            Transition::ConvertToLoan | Transition::Notify | Transition::Expire => status == Ready,
            Transition::Extend => matches!(status, Ready | Expired),
        };

        if allowed {
            return Ok(());
        }

        let message = match self {
            Transition::Cancel => format!("Reservation is already {}", status),
            Transition::MarkReady => format!(
                "Only waiting reservations can be marked ready (status: {})",
                status
            ),
            Transition::Reorder => format!(
                "Only waiting reservations can be reordered (status: {})",
                status
            ),
            Transition::ConvertToLoan => format!(
                "Only ready reservations can be converted to a loan (status: {})",
                status
            ),
            Transition::Notify => format!(
                "Only ready reservations can be notified (status: {})",
                status
            ),
            Transition::Expire => {
                format!("Only ready reservations can expire (status: {})", status)
            }
            Transition::Extend => format!(
                "Only ready or expired reservations can be extended (status: {})",
                status
            ),
        };
        Err(message)
    }
}

/// Availability of a catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "reserved")]
    Reserved,
    #[sea_orm(string_value = "on_loan")]
    OnLoan,
    #[sea_orm(string_value = "unavailable")]
    Unavailable,
}

/// Manual override of the novelty time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum NoveltyOverride {
    #[sea_orm(string_value = "force_new")]
    ForceNew,
    #[sea_orm(string_value = "force_not_new")]
    ForceNotNew,
}

/// Direction for swapping a waiting reservation with its neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}
