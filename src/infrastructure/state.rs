//! Application state containing repositories and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::domain::{GenreLimitStore, ParameterStore};
use crate::infrastructure::config::Config;
use crate::infrastructure::{
    sea_orm_catalog, SeaOrmGenreLimitStore, SeaOrmLoanGateway, SeaOrmParameterStore,
    SeaOrmPatronRepository,
};
use crate::services::{Collaborators, NotificationDispatcher, ReservationService};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    pub config: Arc<Config>,
    /// Reservation lifecycle manager
    pub reservations: ReservationService,
    /// Parameter store (per-module limits)
    pub params: Arc<dyn ParameterStore>,
    /// Genre limit table
    pub genre_limits: Arc<dyn GenreLimitStore>,
}

impl AppState {
    /// Create a new AppState with all repositories initialized
    pub fn new(db: DatabaseConnection, config: Config, notifier: NotificationDispatcher) -> Self {
        let params: Arc<dyn ParameterStore> = Arc::new(SeaOrmParameterStore::new(db.clone()));
        let genre_limits: Arc<dyn GenreLimitStore> =
            Arc::new(SeaOrmGenreLimitStore::new(db.clone()));

        let collaborators = Collaborators {
            catalog: sea_orm_catalog(),
            params: params.clone(),
            genre_limits: genre_limits.clone(),
            patrons: Arc::new(SeaOrmPatronRepository::new()),
            loans: Arc::new(SeaOrmLoanGateway::new()),
        };
        let reservations = ReservationService::new(db.clone(), collaborators, notifier);

        Self {
            db,
            config: Arc::new(config),
            reservations,
            params,
            genre_limits,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
