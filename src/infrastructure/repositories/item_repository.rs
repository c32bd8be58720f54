//! SeaORM implementations of ItemRepository, one per catalog table

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveEnum, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{
    Catalog, CatalogItem, DomainError, ItemRef, ItemRepository, ItemStatus, Module,
};
use crate::models::item_genre;

/// Genre tags of the given items, keyed by item id
async fn load_genres(
    txn: &DatabaseTransaction,
    module: Module,
    item_ids: &[i32],
) -> Result<HashMap<i32, Vec<i32>>, DbErr> {
    let rows = item_genre::Entity::find()
        .filter(item_genre::Column::Module.eq(module))
        .filter(item_genre::Column::ItemId.is_in(item_ids.iter().copied()))
        .all(txn)
        .await?;

    let mut genres: HashMap<i32, Vec<i32>> = HashMap::new();
    for row in rows {
        genres.entry(row.item_id).or_default().push(row.genre_id);
    }
    Ok(genres)
}

/// The four catalog tables share their reservation-relevant columns, so the
/// repositories differ only in the entity they query.
macro_rules! item_repository {
    ($(#[$doc:meta])* $name:ident, $module:expr, $model:ident) => {
        $(#[$doc])*
        #[derive(Default)]
        pub struct $name;

        impl $name {
            pub fn new() -> Self {
                Self
            }
        }

        #[async_trait]
        impl ItemRepository for $name {
            fn module(&self) -> Module {
                $module
            }

            async fn find(
                &self,
                txn: &DatabaseTransaction,
                item_id: i32,
            ) -> Result<Option<CatalogItem>, DomainError> {
                Ok(self.find_many(txn, &[item_id]).await?.into_iter().next())
            }

            async fn find_many(
                &self,
                txn: &DatabaseTransaction,
                item_ids: &[i32],
            ) -> Result<Vec<CatalogItem>, DomainError> {
                if item_ids.is_empty() {
                    return Ok(Vec::new());
                }

                let models = crate::models::$model::Entity::find()
                    .filter(crate::models::$model::Column::Id.is_in(item_ids.iter().copied()))
                    .all(txn)
                    .await?;
                let mut genres = load_genres(txn, $module, item_ids).await?;

                Ok(models
                    .into_iter()
                    .map(|model| CatalogItem {
                        item: ItemRef::new($module, model.id),
                        genre_ids: genres.remove(&model.id).unwrap_or_default(),
                        title: model.title,
                        status: model.status,
                        added_at: model.added_at,
                        novelty_override: model.novelty_override,
                    })
                    .collect())
            }

            async fn set_status(
                &self,
                txn: &DatabaseTransaction,
                item_id: i32,
                status: ItemStatus,
            ) -> Result<(), DomainError> {
                let result = crate::models::$model::Entity::update_many()
                    .col_expr(
                        crate::models::$model::Column::Status,
                        Expr::value(status.to_value()),
                    )
                    .col_expr(
                        crate::models::$model::Column::UpdatedAt,
                        Expr::value(Utc::now()),
                    )
                    .filter(crate::models::$model::Column::Id.eq(item_id))
                    .exec(txn)
                    .await?;

                if result.rows_affected == 0 {
                    return Err(DomainError::NotFound);
                }

                tracing::debug!("{} #{} status -> {:?}", $module, item_id, status);
                Ok(())
            }
        }
    };
}

item_repository!(
    /// Books catalog
    SeaOrmBookRepository,
    Module::Books,
    book
);
item_repository!(
    /// Board games catalog
    SeaOrmGameRepository,
    Module::Games,
    game
);
item_repository!(SeaOrmFilmRepository, Module::Films, film);
item_repository!(SeaOrmDiscRepository, Module::Discs, disc);

/// Catalog backed by the four SeaORM repositories
pub fn sea_orm_catalog() -> Catalog {
    Catalog::new(
        Arc::new(SeaOrmBookRepository::new()),
        Arc::new(SeaOrmGameRepository::new()),
        Arc::new(SeaOrmFilmRepository::new()),
        Arc::new(SeaOrmDiscRepository::new()),
    )
}
