//! SeaORM implementation of GenreLimitStore

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::{DomainError, GenreLimit, GenreLimitStore, Module, UpsertGenreLimitInput};
use crate::models::genre_limit::{ActiveModel, Column, Entity as GenreLimitEntity};

/// SeaORM-based implementation of GenreLimitStore
pub struct SeaOrmGenreLimitStore {
    db: DatabaseConnection,
}

impl SeaOrmGenreLimitStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GenreLimitStore for SeaOrmGenreLimitStore {
    async fn list_for_module(
        &self,
        txn: &DatabaseTransaction,
        module: Module,
    ) -> Result<Vec<GenreLimit>, DomainError> {
        let rows = GenreLimitEntity::find()
            .filter(Column::Module.eq(module))
            .order_by_asc(Column::GenreId)
            .all(txn)
            .await?;
        Ok(rows.into_iter().map(GenreLimit::from).collect())
    }

    async fn list(&self, module: Option<Module>) -> Result<Vec<GenreLimit>, DomainError> {
        let mut condition = Condition::all();
        if let Some(module) = module {
            condition = condition.add(Column::Module.eq(module));
        }

        let rows = GenreLimitEntity::find()
            .filter(condition)
            .order_by_asc(Column::Module)
            .order_by_asc(Column::GenreId)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(GenreLimit::from).collect())
    }

    async fn upsert(&self, input: UpsertGenreLimitInput) -> Result<GenreLimit, DomainError> {
        let max_concurrent = i32::try_from(input.max_concurrent)
            .map_err(|_| DomainError::Validation("max_concurrent is too large".to_string()))?;
        let now = chrono::Utc::now();

        let existing = GenreLimitEntity::find()
            .filter(Column::Module.eq(input.module))
            .filter(Column::GenreId.eq(input.genre_id))
            .one(&self.db)
            .await?;

        let model = match existing {
            Some(model) => {
                let mut active: ActiveModel = model.into();
                active.max_concurrent = Set(max_concurrent);
                if let Some(enabled) = input.enabled {
                    active.enabled = Set(enabled);
                }
                active.updated_at = Set(now);
                active.update(&self.db).await?
            }
            None => {
                ActiveModel {
                    module: Set(input.module),
                    genre_id: Set(input.genre_id),
                    max_concurrent: Set(max_concurrent),
                    enabled: Set(input.enabled.unwrap_or(true)),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(&self.db)
                .await?
            }
        };

        Ok(GenreLimit::from(model))
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let result = GenreLimitEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        Ok(())
    }
}
