use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{GenreLimit, Module};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "genre_limits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub module: Module,
    pub genre_id: i32,
    pub max_concurrent: i32,
    pub enabled: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for GenreLimit {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            module: model.module,
            genre_id: model.genre_id,
            max_concurrent: model.max_concurrent.max(0) as u32,
            enabled: model.enabled,
        }
    }
}
