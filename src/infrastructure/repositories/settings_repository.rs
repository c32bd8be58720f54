//! SeaORM implementation of ParameterStore

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TryIntoModel,
};

use crate::domain::{DomainError, LimitsConfig, Module, ParameterStore};
use crate::models::reservation_settings::{self, ActiveModel, Column, Entity as SettingsEntity};

/// SeaORM-based implementation of ParameterStore
pub struct SeaOrmParameterStore {
    db: DatabaseConnection,
}

impl SeaOrmParameterStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[async_trait]
impl ParameterStore for SeaOrmParameterStore {
    async fn get_limits(
        &self,
        txn: &DatabaseTransaction,
        module: Module,
    ) -> Result<LimitsConfig, DomainError> {
        SettingsEntity::find()
            .filter(Column::Module.eq(module))
            .one(txn)
            .await?
            .map(LimitsConfig::from)
            .ok_or_else(|| {
                DomainError::Internal(format!("No reservation settings for module {}", module))
            })
    }

    async fn list(&self) -> Result<Vec<LimitsConfig>, DomainError> {
        let rows = SettingsEntity::find()
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(LimitsConfig::from).collect())
    }

    async fn update(&self, config: LimitsConfig) -> Result<LimitsConfig, DomainError> {
        let existing = SettingsEntity::find()
            .filter(Column::Module.eq(config.module))
            .one(&self.db)
            .await?;

        let mut active: ActiveModel = match existing {
            Some(model) => model.into(),
            None => reservation_settings::ActiveModel {
                module: Set(config.module),
                ..Default::default()
            },
        };

        active.enabled = Set(config.enabled);
        active.general_cap = Set(to_i32(config.general_cap));
        active.novelty_cap = Set(to_i32(config.novelty_cap));
        active.novelty_window_days = Set(to_i32(config.novelty_window_days));
        active.novelty_tracking_enabled = Set(config.novelty_tracking_enabled);
        active.ready_expiry_days = Set(to_i32(config.ready_expiry_days));
        active.reminder_days_before = Set(to_i32(config.reminder_days_before));
        active.loan_duration_days = Set(to_i32(config.loan_duration_days));
        active.updated_at = Set(chrono::Utc::now());

        let saved = active.save(&self.db).await?;
        let model = saved.try_into_model()?;

        tracing::info!("Reservation settings updated for {}", model.module);
        Ok(LimitsConfig::from(model))
    }
}
