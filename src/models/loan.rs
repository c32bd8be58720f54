use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{ItemRef, LoanRecord, Module};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub patron_id: i32,
    pub module: Module,
    pub item_id: i32,
    pub loan_date: DateTimeUtc,
    pub due_date: Date,
    pub return_date: Option<DateTimeUtc>,
    pub status: String, // 'active', 'returned'
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::patron::Entity",
        from = "Column::PatronId",
        to = "super::patron::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Patron,
}

impl Related<super::patron::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Patron.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for LoanRecord {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            patron_id: model.patron_id,
            item: ItemRef::new(model.module, model.item_id),
            loan_date: model.loan_date,
            due_date: model.due_date,
            notes: model.notes,
        }
    }
}
