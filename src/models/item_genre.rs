use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::Module;

/// Genre/category tag of a catalog item, shared by the four modules
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "item_genres")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub module: Module,
    pub item_id: i32,
    pub genre_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
