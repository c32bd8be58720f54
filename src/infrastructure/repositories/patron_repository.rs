//! SeaORM implementation of PatronRepository

use async_trait::async_trait;
use sea_orm::{DatabaseTransaction, EntityTrait};

use crate::domain::{DomainError, Patron, PatronRepository};
use crate::models::patron::Entity as PatronEntity;

/// SeaORM-based implementation of PatronRepository
#[derive(Default)]
pub struct SeaOrmPatronRepository;

impl SeaOrmPatronRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PatronRepository for SeaOrmPatronRepository {
    async fn find(
        &self,
        txn: &DatabaseTransaction,
        patron_id: i32,
    ) -> Result<Option<Patron>, DomainError> {
        Ok(PatronEntity::find_by_id(patron_id)
            .one(txn)
            .await?
            .map(Patron::from))
    }
}
