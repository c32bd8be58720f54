use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{ItemRef, Module, ReservationStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub patron_id: i32,
    pub module: Module,
    pub item_id: i32,
    pub status: ReservationStatus,
    /// 1-based rank among the active reservations of the same item
    pub queue_position: i32,
    pub comment: Option<String>,
    pub created_at: DateTimeUtc,
    pub notified_at: Option<DateTimeUtc>,
    pub expires_at: Option<DateTimeUtc>,
    pub reminded_at: Option<DateTimeUtc>,
    pub converted_at: Option<DateTimeUtc>,
    pub loan_id: Option<i32>,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn item(&self) -> ItemRef {
        ItemRef::new(self.module, self.item_id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::patron::Entity",
        from = "Column::PatronId",
        to = "super::patron::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Patron,
    #[sea_orm(
        belongs_to = "super::loan::Entity",
        from = "Column::LoanId",
        to = "super::loan::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Loan,
}

impl Related<super::patron::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Patron.def()
    }
}

impl Related<super::loan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Loan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
