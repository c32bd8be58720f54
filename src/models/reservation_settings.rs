use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{LimitsConfig, Module};

/// Parameter store row, one per module
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservation_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub module: Module,
    pub enabled: bool,
    pub general_cap: i32,
    /// 0 means novelties can never be reserved
    pub novelty_cap: i32,
    pub novelty_window_days: i32,
    pub novelty_tracking_enabled: bool,
    pub ready_expiry_days: i32,
    pub reminder_days_before: i32,
    pub loan_duration_days: i32,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for LimitsConfig {
    fn from(model: Model) -> Self {
        Self {
            module: model.module,
            enabled: model.enabled,
            general_cap: model.general_cap.max(0) as u32,
            novelty_cap: model.novelty_cap.max(0) as u32,
            novelty_window_days: model.novelty_window_days.max(0) as u32,
            novelty_tracking_enabled: model.novelty_tracking_enabled,
            ready_expiry_days: model.ready_expiry_days.max(0) as u32,
            reminder_days_before: model.reminder_days_before.max(0) as u32,
            loan_duration_days: model.loan_duration_days.max(0) as u32,
        }
    }
}
