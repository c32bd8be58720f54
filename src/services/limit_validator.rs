//! Limit Validator
//!
//! Evaluates the three-tier quota hierarchy (general, novelty, genre) for a
//! patron and a target item. It only reads, always inside the caller's
//! transaction, so a verdict computed within `create` reflects the same
//! snapshot as the insert that follows it.

use chrono::{DateTime, Utc};
use sea_orm::DatabaseTransaction;
use std::sync::Arc;

use crate::domain::{
    Catalog, CatalogItem, GenreLimitStore, GenreUsage, ItemRef, LimitsConfig, LimitsSummary,
    Reason, ReasonKind, ReservationError, Usage, Verdict,
};
use crate::models::reservation;
use crate::services::queue_index;

/// Verdict plus the target item it was computed for
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub item: Option<CatalogItem>,
}

/// The patron's current holdings in one module
struct Holdings {
    reservations: Vec<reservation::Model>,
    items: Vec<CatalogItem>,
}

impl Holdings {
    fn count(&self) -> u32 {
        self.reservations.len() as u32
    }

    fn novelty_count(&self, limits: &LimitsConfig, now: DateTime<Utc>) -> u32 {
        self.items
            .iter()
            .filter(|item| limits.is_novelty(item.added_at, item.novelty_override, now))
            .count() as u32
    }

    fn genre_count(&self, genre_id: i32) -> u32 {
        self.items
            .iter()
            .filter(|item| item.genre_ids.contains(&genre_id))
            .count() as u32
    }
}

#[derive(Clone)]
pub struct LimitValidator {
    catalog: Catalog,
    genre_limits: Arc<dyn GenreLimitStore>,
}

impl LimitValidator {
    pub fn new(catalog: Catalog, genre_limits: Arc<dyn GenreLimitStore>) -> Self {
        Self {
            catalog,
            genre_limits,
        }
    }

    async fn holdings(
        &self,
        txn: &DatabaseTransaction,
        patron_id: i32,
        limits: &LimitsConfig,
    ) -> Result<Holdings, ReservationError> {
        let reservations = queue_index::active_for_patron(txn, patron_id, limits.module).await?;
        let item_ids: Vec<i32> = reservations.iter().map(|r| r.item_id).collect();
        let items = self
            .catalog
            .repository(limits.module)
            .find_many(txn, &item_ids)
            .await?;

        Ok(Holdings {
            reservations,
            items,
        })
    }

    /// Decide whether `patron_id` may reserve `target`.
    ///
    /// Stops at the first hard failure; genre caps are all evaluated so every
    /// violated genre is reported.
    pub async fn evaluate(
        &self,
        txn: &DatabaseTransaction,
        patron_id: i32,
        target: ItemRef,
        limits: &LimitsConfig,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, ReservationError> {
        if !limits.enabled {
            return Ok(Evaluation {
                verdict: Verdict::deny(Reason::new(
                    ReasonKind::ModuleDisabled,
                    0,
                    0,
                    format!("Reservations are disabled for {}", target.module),
                )),
                item: None,
            });
        }

        let Some(item) = self.catalog.find(txn, target).await? else {
            return Ok(Evaluation {
                verdict: Verdict::deny(Reason::new(
                    ReasonKind::ItemNotFound,
                    0,
                    0,
                    format!("Item {} not found", target),
                )),
                item: None,
            });
        };

        let holdings = self.holdings(txn, patron_id, limits).await?;

        let deny = |reason: Reason, item: CatalogItem| Evaluation {
            verdict: Verdict::deny(reason),
            item: Some(item),
        };

        if holdings
            .reservations
            .iter()
            .any(|r| r.item_id == target.item_id)
        {
            return Ok(deny(
                Reason::new(
                    ReasonKind::AlreadyReserved,
                    1,
                    1,
                    "The patron already has an active reservation for this item",
                ),
                item,
            ));
        }

        let current = holdings.count();
        if current >= limits.general_cap {
            return Ok(deny(
                Reason::new(
                    ReasonKind::GeneralCapReached,
                    current,
                    limits.general_cap,
                    format!(
                        "Reservation limit reached for {} ({}/{})",
                        target.module, current, limits.general_cap
                    ),
                ),
                item,
            ));
        }

        if limits.is_novelty(item.added_at, item.novelty_override, now) {
            let novelties = holdings.novelty_count(limits, now);
            if novelties >= limits.novelty_cap {
                let message = if limits.novelty_cap == 0 {
                    format!("Novelties cannot be reserved in {}", target.module)
                } else {
                    format!(
                        "Novelty reservation limit reached ({}/{})",
                        novelties, limits.novelty_cap
                    )
                };
                return Ok(deny(
                    Reason::new(
                        ReasonKind::NoveltyCapReached,
                        novelties,
                        limits.novelty_cap,
                        message,
                    ),
                    item,
                ));
            }
        }

        let genre_limits = self.genre_limits.list_for_module(txn, target.module).await?;
        let reasons: Vec<Reason> = genre_limits
            .iter()
            .filter(|limit| limit.enabled && item.genre_ids.contains(&limit.genre_id))
            .filter_map(|limit| {
                let current = holdings.genre_count(limit.genre_id);
                (current >= limit.max_concurrent)
                    .then(|| Reason::genre(limit.genre_id, current, limit.max_concurrent))
            })
            .collect();

        Ok(Evaluation {
            verdict: Verdict::from_reasons(reasons),
            item: Some(item),
        })
    }

    /// Current usage of a patron against every cap of a module
    pub async fn summary(
        &self,
        txn: &DatabaseTransaction,
        patron_id: i32,
        limits: &LimitsConfig,
        now: DateTime<Utc>,
    ) -> Result<LimitsSummary, ReservationError> {
        let holdings = self.holdings(txn, patron_id, limits).await?;
        let genre_limits = self.genre_limits.list_for_module(txn, limits.module).await?;

        Ok(LimitsSummary {
            patron_id,
            module: limits.module,
            enabled: limits.enabled,
            general: Usage {
                current: holdings.count(),
                limit: limits.general_cap,
            },
            novelty: Usage {
                current: holdings.novelty_count(limits, now),
                limit: limits.novelty_cap,
            },
            novelty_tracking_enabled: limits.novelty_tracking_enabled,
            genres: genre_limits
                .into_iter()
                .map(|limit| GenreUsage {
                    genre_id: limit.genre_id,
                    current: holdings.genre_count(limit.genre_id),
                    limit: limit.max_concurrent,
                    enabled: limit.enabled,
                })
                .collect(),
        })
    }
}
