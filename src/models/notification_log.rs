use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::Module;

/// Outbound notification record (email/SMS log)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub event_code: String, // ready, cancelled, reminder, extended, expired
    pub reservation_id: i32,
    pub patron_id: i32,
    pub module: Module,
    pub item_id: i32,
    pub payload: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
