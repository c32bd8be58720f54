use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{ItemStatus, NoveltyOverride};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "games")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub publisher: Option<String>,
    pub status: ItemStatus,
    /// Date the item joined the collection, drives the novelty window
    pub added_at: DateTimeUtc,
    pub novelty_override: Option<NoveltyOverride>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
