//! Collaborator contracts used by the reservation engine
//!
//! Catalogs, the parameter store, the genre limit table, patrons and loans are
//! owned by other parts of the platform. Reads that feed a reservation
//! decision take the caller's `DatabaseTransaction`, so they observe the same
//! snapshot as the write that follows.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::DatabaseTransaction;
use serde::Serialize;
use std::sync::Arc;

use super::DomainError;
use super::limits::{GenreLimit, LimitsConfig};
use super::reservation::{ItemRef, ItemStatus, Module, NoveltyOverride};

/// The slice of a catalog item the reservation engine cares about.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogItem {
    pub item: ItemRef,
    pub title: String,
    pub status: ItemStatus,
    pub genre_ids: Vec<i32>,
    pub added_at: DateTime<Utc>,
    pub novelty_override: Option<NoveltyOverride>,
}

/// Catalog access for one module. One implementation exists per module.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// The module served by this repository
    fn module(&self) -> Module;

    /// Find a single item with its genre tags
    async fn find(
        &self,
        txn: &DatabaseTransaction,
        item_id: i32,
    ) -> Result<Option<CatalogItem>, DomainError>;

    /// Find several items with their genre tags; missing ids are skipped
    async fn find_many(
        &self,
        txn: &DatabaseTransaction,
        item_ids: &[i32],
    ) -> Result<Vec<CatalogItem>, DomainError>;

    /// Update an item's availability status
    async fn set_status(
        &self,
        txn: &DatabaseTransaction,
        item_id: i32,
        status: ItemStatus,
    ) -> Result<(), DomainError>;
}

/// The four catalogs, selected by the module of an `ItemRef`
#[derive(Clone)]
pub struct Catalog {
    books: Arc<dyn ItemRepository>,
    games: Arc<dyn ItemRepository>,
    films: Arc<dyn ItemRepository>,
    discs: Arc<dyn ItemRepository>,
}

impl Catalog {
    pub fn new(
        books: Arc<dyn ItemRepository>,
        games: Arc<dyn ItemRepository>,
        films: Arc<dyn ItemRepository>,
        discs: Arc<dyn ItemRepository>,
    ) -> Self {
        Self {
            books,
            games,
            films,
            discs,
        }
    }

    pub fn repository(&self, module: Module) -> &dyn ItemRepository {
        match module {
            Module::Books => self.books.as_ref(),
            Module::Games => self.games.as_ref(),
            Module::Films => self.films.as_ref(),
            Module::Discs => self.discs.as_ref(),
        }
    }

    pub async fn find(
        &self,
        txn: &DatabaseTransaction,
        item: ItemRef,
    ) -> Result<Option<CatalogItem>, DomainError> {
        self.repository(item.module).find(txn, item.item_id).await
    }

    pub async fn set_status(
        &self,
        txn: &DatabaseTransaction,
        item: ItemRef,
        status: ItemStatus,
    ) -> Result<(), DomainError> {
        self.repository(item.module)
            .set_status(txn, item.item_id, status)
            .await
    }
}

/// Per-module reservation parameters
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Limits for one module, read inside the caller's transaction
    async fn get_limits(
        &self,
        txn: &DatabaseTransaction,
        module: Module,
    ) -> Result<LimitsConfig, DomainError>;

    /// Limits of every module
    async fn list(&self) -> Result<Vec<LimitsConfig>, DomainError>;

    /// Replace the limits of a module
    async fn update(&self, config: LimitsConfig) -> Result<LimitsConfig, DomainError>;
}

/// Input for creating or replacing a genre limit
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UpsertGenreLimitInput {
    pub module: Module,
    pub genre_id: i32,
    pub max_concurrent: u32,
    pub enabled: Option<bool>,
}

/// The (module, genre) → max concurrent reservations table
#[async_trait]
pub trait GenreLimitStore: Send + Sync {
    /// Every limit of a module, read inside the caller's transaction
    async fn list_for_module(
        &self,
        txn: &DatabaseTransaction,
        module: Module,
    ) -> Result<Vec<GenreLimit>, DomainError>;

    /// All limits, optionally restricted to one module
    async fn list(&self, module: Option<Module>) -> Result<Vec<GenreLimit>, DomainError>;

    /// Create or replace the limit for (module, genre)
    async fn upsert(&self, input: UpsertGenreLimitInput) -> Result<GenreLimit, DomainError>;

    /// Delete a limit by ID
    async fn delete(&self, id: i32) -> Result<(), DomainError>;
}

/// Patron data needed to accept a reservation
#[derive(Debug, Clone, Serialize)]
pub struct Patron {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub is_active: bool,
}

/// Patron directory (owned by the membership/auth system)
#[async_trait]
pub trait PatronRepository: Send + Sync {
    async fn find(
        &self,
        txn: &DatabaseTransaction,
        patron_id: i32,
    ) -> Result<Option<Patron>, DomainError>;
}

/// Loan created from a ready reservation
#[derive(Debug, Clone, Serialize)]
pub struct LoanRecord {
    pub id: i32,
    pub patron_id: i32,
    pub item: ItemRef,
    pub loan_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

/// Hand-off point to the loan subsystem
#[async_trait]
pub trait LoanGateway: Send + Sync {
    async fn create_loan(
        &self,
        txn: &DatabaseTransaction,
        patron_id: i32,
        item: ItemRef,
        due_date: NaiveDate,
        notes: Option<String>,
    ) -> Result<LoanRecord, DomainError>;
}
