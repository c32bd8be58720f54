//! Reservation Lifecycle Manager
//!
//! Owns every state transition of a reservation. Each mutating operation
//! takes the in-process queue lock(s), opens one transaction, re-reads the
//! rows it touches under an exclusive lock, applies the transition and
//! commits. Notifications are queued only after the commit and can never
//! fail the operation.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::*;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::{
    Catalog, Direction, GenreLimitStore, ItemRef, ItemStatus, LimitsSummary, LoanGateway,
    LoanRecord, MAX_DAYS, Module, ParameterStore, PatronRepository, ReservationError,
    ReservationStatus, Transition, Verdict,
};
use crate::models::loan::{self, Entity as Loan};
use crate::models::reservation::{self, Entity as Reservation};
use crate::services::limit_validator::LimitValidator;
use crate::services::locks::QueueLocks;
use crate::services::notifications::{EventCode, NotificationDispatcher, ReservationEvent};
use crate::services::queue_index::{self, ItemQueue};

/// Result of a mutating operation plus non-fatal warnings (notification
/// delivery problems)
#[derive(Debug, Clone, Serialize)]
pub struct Applied<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

impl<T> Applied<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    fn with_warning(value: T, warning: Option<String>) -> Self {
        Self {
            value,
            warnings: warning.into_iter().collect(),
        }
    }
}

/// Request to place a patron in an item's queue
#[derive(Debug, Clone)]
pub struct CreateReservation {
    pub patron_id: i32,
    pub item: ItemRef,
    pub comment: Option<String>,
}

/// A reservation handed over to the loan subsystem
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub reservation: reservation::Model,
    pub loan: LoanRecord,
}

/// Filter parameters for listing reservations
#[derive(Debug, Default, Clone)]
pub struct ReservationFilter {
    pub patron_id: Option<i32>,
    pub module: Option<Module>,
    pub item_id: Option<i32>,
    pub status: Option<ReservationStatus>,
}

/// Collaborators the lifecycle manager depends on
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Catalog,
    pub params: Arc<dyn ParameterStore>,
    pub genre_limits: Arc<dyn GenreLimitStore>,
    pub patrons: Arc<dyn PatronRepository>,
    pub loans: Arc<dyn LoanGateway>,
}

#[derive(Clone)]
pub struct ReservationService {
    db: DatabaseConnection,
    catalog: Catalog,
    params: Arc<dyn ParameterStore>,
    patrons: Arc<dyn PatronRepository>,
    loans: Arc<dyn LoanGateway>,
    validator: LimitValidator,
    notifier: NotificationDispatcher,
    locks: QueueLocks,
}

fn invalid(message: String) -> ReservationError {
    ReservationError::InvalidOperation(message)
}

fn days(n: u32) -> Duration {
    Duration::days(i64::from(n))
}

/// `now` pushed `n` days forward, rejected when it leaves the calendar
fn days_after(now: DateTime<Utc>, n: u32, what: &str) -> Result<DateTime<Utc>, ReservationError> {
    now.checked_add_signed(days(n)).ok_or_else(|| {
        ReservationError::Validation(format!("{} of {} days is out of range", what, n))
    })
}

impl ReservationService {
    pub fn new(
        db: DatabaseConnection,
        collaborators: Collaborators,
        notifier: NotificationDispatcher,
    ) -> Self {
        let validator = LimitValidator::new(
            collaborators.catalog.clone(),
            collaborators.genre_limits.clone(),
        );

        Self {
            db,
            catalog: collaborators.catalog,
            params: collaborators.params,
            patrons: collaborators.patrons,
            loans: collaborators.loans,
            validator,
            notifier,
            locks: QueueLocks::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Find a reservation by ID
    pub async fn get(&self, id: i32) -> Result<reservation::Model, ReservationError> {
        Reservation::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Reservation {}", id)))
    }

    /// List reservations, newest first
    pub async fn list(
        &self,
        filter: ReservationFilter,
    ) -> Result<Vec<reservation::Model>, ReservationError> {
        let mut condition = Condition::all();

        if let Some(patron_id) = filter.patron_id {
            condition = condition.add(reservation::Column::PatronId.eq(patron_id));
        }
        if let Some(module) = filter.module {
            condition = condition.add(reservation::Column::Module.eq(module));
        }
        if let Some(item_id) = filter.item_id {
            condition = condition.add(reservation::Column::ItemId.eq(item_id));
        }
        if let Some(status) = filter.status {
            condition = condition.add(reservation::Column::Status.eq(status));
        }

        Ok(Reservation::find()
            .filter(condition)
            .order_by_desc(reservation::Column::CreatedAt)
            .order_by_desc(reservation::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Item status and its ordered line of active reservations
    pub async fn queue(&self, item: ItemRef) -> Result<ItemQueue, ReservationError> {
        let txn = self.db.begin().await?;
        let catalog_item = self
            .catalog
            .find(&txn, item)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Item {}", item)))?;
        let reservations = queue_index::active_queue(&txn, item).await?;
        txn.commit().await?;

        Ok(ItemQueue {
            item: catalog_item,
            reservations,
        })
    }

    async fn check_patron(
        &self,
        txn: &DatabaseTransaction,
        patron_id: i32,
    ) -> Result<(), ReservationError> {
        let patron = self
            .patrons
            .find(txn, patron_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Patron {}", patron_id)))?;

        if !patron.is_active {
            return Err(ReservationError::PatronInactive(patron_id));
        }
        Ok(())
    }

    /// Advisory pre-check. The verdict can go stale; `create` re-validates.
    pub async fn validate(
        &self,
        patron_id: i32,
        item: ItemRef,
    ) -> Result<Verdict, ReservationError> {
        let txn = self.db.begin().await?;
        self.check_patron(&txn, patron_id).await?;
        let limits = self.params.get_limits(&txn, item.module).await?;
        let evaluation = self
            .validator
            .evaluate(&txn, patron_id, item, &limits, Utc::now())
            .await?;
        txn.commit().await?;

        Ok(evaluation.verdict)
    }

    /// Current usage of a patron against the caps of a module
    pub async fn limits_summary(
        &self,
        patron_id: i32,
        module: Module,
    ) -> Result<LimitsSummary, ReservationError> {
        let txn = self.db.begin().await?;
        self.patrons
            .find(&txn, patron_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Patron {}", patron_id)))?;
        let limits = self.params.get_limits(&txn, module).await?;
        let summary = self
            .validator
            .summary(&txn, patron_id, &limits, Utc::now())
            .await?;
        txn.commit().await?;

        Ok(summary)
    }

    // ---------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------

    async fn locked(
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<reservation::Model, ReservationError> {
        Reservation::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Reservation {}", id)))
    }

    /// Revert a `reserved` item to `available` once nobody is queued for it
    async fn release_item_if_idle(
        &self,
        txn: &DatabaseTransaction,
        item: ItemRef,
    ) -> Result<(), ReservationError> {
        if queue_index::has_active(txn, item).await? {
            return Ok(());
        }
        if let Some(current) = self.catalog.find(txn, item).await? {
            if current.status == ItemStatus::Reserved {
                self.catalog
                    .set_status(txn, item, ItemStatus::Available)
                    .await?;
            }
        }
        Ok(())
    }

    /// Place a patron at the end of an item's queue
    pub async fn create(
        &self,
        input: CreateReservation,
    ) -> Result<Applied<reservation::Model>, ReservationError> {
        let target = input.item;
        let _guard = self
            .locks
            .lock_patron_and_item(input.patron_id, target)
            .await?;
        let txn = self.db.begin().await?;

        self.check_patron(&txn, input.patron_id).await?;

        // Limits are re-derived under the held locks, inside the write transaction
        let limits = self.params.get_limits(&txn, target.module).await?;
        let now = Utc::now();
        let evaluation = self
            .validator
            .evaluate(&txn, input.patron_id, target, &limits, now)
            .await?;

        if !evaluation.verdict.allowed {
            txn.rollback().await?;
            tracing::info!(
                "Reservation denied for patron {} on {}: {:?}",
                input.patron_id,
                target,
                evaluation
                    .verdict
                    .reasons
                    .iter()
                    .map(|r| r.kind)
                    .collect::<Vec<_>>()
            );
            return Err(ReservationError::Denied(evaluation.verdict.reasons));
        }

        let item = evaluation
            .item
            .ok_or_else(|| ReservationError::NotFound(format!("Item {}", target)))?;
        let position = queue_index::next_position(&txn, target).await?;

        let saved = reservation::ActiveModel {
            patron_id: Set(input.patron_id),
            module: Set(target.module),
            item_id: Set(target.item_id),
            status: Set(ReservationStatus::Waiting),
            queue_position: Set(position),
            comment: Set(input.comment),
            created_at: Set(now),
            notified_at: Set(None),
            expires_at: Set(None),
            reminded_at: Set(None),
            converted_at: Set(None),
            loan_id: Set(None),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if item.status == ItemStatus::Available {
            self.catalog
                .set_status(&txn, target, ItemStatus::Reserved)
                .await?;
        }

        txn.commit().await?;

        tracing::info!(
            "📌 Reservation #{} created: patron {} on {} at position {}",
            saved.id,
            saved.patron_id,
            target,
            position
        );
        Ok(Applied::new(saved))
    }

    /// Cancel a reservation and close the gap it leaves in the queue
    pub async fn cancel(&self, id: i32) -> Result<Applied<reservation::Model>, ReservationError> {
        let item = self.get(id).await?.item();
        let _guard = self.locks.lock_item(item).await?;
        let txn = self.db.begin().await?;

        let current = Self::locked(&txn, id).await?;
        Transition::Cancel.check(current.status).map_err(invalid)?;
        let was_active = current.status.is_active();

        let mut active: reservation::ActiveModel = current.into();
        active.status = Set(ReservationStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let cancelled = active.update(&txn).await?;

        if was_active {
            queue_index::compact(&txn, item).await?;
            self.release_item_if_idle(&txn, item).await?;
        }

        txn.commit().await?;
        tracing::info!("Reservation #{} cancelled ({})", id, item);

        let warning = self.notifier.trigger(ReservationEvent::for_reservation(
            EventCode::Cancelled,
            &cancelled,
        ));
        Ok(Applied::with_warning(cancelled, warning))
    }

    /// Hold the item for the patron until the module's ready expiry
    pub async fn mark_ready(
        &self,
        id: i32,
    ) -> Result<Applied<reservation::Model>, ReservationError> {
        let item = self.get(id).await?.item();
        let _guard = self.locks.lock_item(item).await?;
        let txn = self.db.begin().await?;

        let current = Self::locked(&txn, id).await?;
        Transition::MarkReady.check(current.status).map_err(invalid)?;

        let limits = self.params.get_limits(&txn, item.module).await?;
        let now = Utc::now();
        let expires_at = days_after(now, limits.ready_expiry_days, "Ready expiry")?;

        let mut active: reservation::ActiveModel = current.into();
        active.status = Set(ReservationStatus::Ready);
        active.notified_at = Set(Some(now));
        active.expires_at = Set(Some(expires_at));
        active.reminded_at = Set(None);
        active.updated_at = Set(now);
        let ready = active.update(&txn).await?;

        self.catalog
            .set_status(&txn, item, ItemStatus::Reserved)
            .await?;

        txn.commit().await?;
        tracing::info!(
            "✅ Reservation #{} ready for patron {} until {:?}",
            id,
            ready.patron_id,
            ready.expires_at
        );

        let warning = self
            .notifier
            .trigger(ReservationEvent::for_reservation(EventCode::Ready, &ready));
        Ok(Applied::with_warning(ready, warning))
    }

    /// Turn a ready reservation into a loan
    pub async fn convert_to_loan(
        &self,
        id: i32,
        due_date: Option<NaiveDate>,
        comment: Option<String>,
    ) -> Result<Applied<Conversion>, ReservationError> {
        let item = self.get(id).await?.item();
        let _guard = self.locks.lock_item(item).await?;
        let txn = self.db.begin().await?;

        let current = Self::locked(&txn, id).await?;
        Transition::ConvertToLoan.check(current.status).map_err(invalid)?;

        let now = Utc::now();
        let due_date = match due_date {
            Some(date) => date,
            None => {
                let limits = self.params.get_limits(&txn, item.module).await?;
                days_after(now, limits.loan_duration_days, "Loan duration")?.date_naive()
            }
        };
        if due_date < now.date_naive() {
            return Err(ReservationError::Validation(format!(
                "Due date {} is in the past",
                due_date
            )));
        }

        let loan = self
            .loans
            .create_loan(&txn, current.patron_id, item, due_date, comment)
            .await?;
        self.catalog
            .set_status(&txn, item, ItemStatus::OnLoan)
            .await?;

        let mut active: reservation::ActiveModel = current.into();
        active.status = Set(ReservationStatus::Converted);
        active.converted_at = Set(Some(now));
        active.loan_id = Set(Some(loan.id));
        active.updated_at = Set(now);
        let converted = active.update(&txn).await?;

        queue_index::compact(&txn, item).await?;
        txn.commit().await?;

        tracing::info!(
            "📚 Reservation #{} converted to loan #{} (due {})",
            id,
            loan.id,
            loan.due_date
        );
        Ok(Applied::new(Conversion {
            reservation: converted,
            loan,
        }))
    }

    /// Push the pickup deadline `days_from_now` days past now, reviving an
    /// expired reservation at the head of the line
    pub async fn extend(
        &self,
        id: i32,
        days_from_now: u32,
    ) -> Result<Applied<reservation::Model>, ReservationError> {
        if days_from_now == 0 || days_from_now > MAX_DAYS {
            return Err(ReservationError::Validation(format!(
                "Extension must be between 1 and {} days",
                MAX_DAYS
            )));
        }

        let item = self.get(id).await?.item();
        let _guard = self.locks.lock_item(item).await?;
        let txn = self.db.begin().await?;

        let current = Self::locked(&txn, id).await?;
        Transition::Extend.check(current.status).map_err(invalid)?;

        let now = Utc::now();
        let expires_at = days_after(now, days_from_now, "Extension")?;
        let revived = current.status == ReservationStatus::Expired;

        if revived {
            if let Some(other) =
                queue_index::find_active_for(&txn, current.patron_id, item).await?
            {
                return Err(invalid(format!(
                    "Patron {} already holds active reservation #{} for this item",
                    current.patron_id, other.id
                )));
            }
            queue_index::make_room_at_head(&txn, item).await?;
        }

        let mut active: reservation::ActiveModel = current.into();
        active.expires_at = Set(Some(expires_at));
        active.reminded_at = Set(None);
        active.updated_at = Set(now);
        if revived {
            active.status = Set(ReservationStatus::Ready);
            active.queue_position = Set(1);
        }
        let extended = active.update(&txn).await?;

        if revived {
            if let Some(catalog_item) = self.catalog.find(&txn, item).await? {
                if catalog_item.status == ItemStatus::Available {
                    self.catalog
                        .set_status(&txn, item, ItemStatus::Reserved)
                        .await?;
                }
            }
        }

        txn.commit().await?;
        tracing::info!(
            "Reservation #{} extended until {:?}{}",
            id,
            extended.expires_at,
            if revived { " (revived)" } else { "" }
        );

        let warning = self.notifier.trigger(ReservationEvent::for_reservation(
            EventCode::Extended,
            &extended,
        ));
        Ok(Applied::with_warning(extended, warning))
    }

    /// Swap a waiting reservation with its neighbour in the line
    pub async fn reorder(
        &self,
        id: i32,
        direction: Direction,
    ) -> Result<Applied<reservation::Model>, ReservationError> {
        let item = self.get(id).await?.item();
        let _guard = self.locks.lock_item(item).await?;
        let txn = self.db.begin().await?;

        let current = Self::locked(&txn, id).await?;
        Transition::Reorder.check(current.status).map_err(invalid)?;

        // Locks every row of the line, both participants included
        let line = queue_index::active_queue(&txn, item).await?;
        let index = line
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| {
                ReservationError::Conflict(format!("Reservation {} left the queue", id))
            })?;

        let neighbour = match direction {
            Direction::Up if index == 0 => {
                return Err(invalid(
                    "Reservation is already at the head of the queue".to_string(),
                ));
            }
            Direction::Up => &line[index - 1],
            Direction::Down => line.get(index + 1).ok_or_else(|| {
                invalid("Reservation is already at the end of the queue".to_string())
            })?,
        };

        queue_index::swap_positions(&txn, &line[index], neighbour).await?;
        let moved = Self::locked(&txn, id).await?;
        txn.commit().await?;

        tracing::info!(
            "Reservation #{} moved {:?} to position {}",
            id,
            direction,
            moved.queue_position
        );
        Ok(Applied::new(moved))
    }

    /// Send the ready notification again
    pub async fn notify(&self, id: i32) -> Result<Applied<reservation::Model>, ReservationError> {
        let item = self.get(id).await?.item();
        let _guard = self.locks.lock_item(item).await?;
        let txn = self.db.begin().await?;

        let current = Self::locked(&txn, id).await?;
        Transition::Notify.check(current.status).map_err(invalid)?;

        let mut active: reservation::ActiveModel = current.into();
        active.notified_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        let notified = active.update(&txn).await?;
        txn.commit().await?;

        let warning = self
            .notifier
            .trigger(ReservationEvent::for_reservation(EventCode::Ready, &notified));
        Ok(Applied::with_warning(notified, warning))
    }

    /// Hold a returned item for its queue, or put it back on the shelf
    async fn restore_returned_item(
        &self,
        txn: &DatabaseTransaction,
        item: ItemRef,
    ) -> Result<ItemStatus, ReservationError> {
        let status = if queue_index::has_active(txn, item).await? {
            ItemStatus::Reserved
        } else {
            ItemStatus::Available
        };
        self.catalog.set_status(txn, item, status).await?;
        Ok(status)
    }

    /// An item came back from loan: hold it for the queue or free it
    pub async fn item_returned(&self, item: ItemRef) -> Result<ItemStatus, ReservationError> {
        let _guard = self.locks.lock_item(item).await?;
        let txn = self.db.begin().await?;
        let status = self.restore_returned_item(&txn, item).await?;
        txn.commit().await?;

        tracing::info!("Item {} returned, now {:?}", item, status);
        Ok(status)
    }

    /// Close a loan and hand its item back to the queue in one transaction
    pub async fn return_loan(
        &self,
        loan_id: i32,
    ) -> Result<(loan::Model, ItemStatus), ReservationError> {
        let item = Loan::find_by_id(loan_id)
            .one(&self.db)
            .await?
            .map(|l| ItemRef::new(l.module, l.item_id))
            .ok_or_else(|| ReservationError::NotFound(format!("Loan {}", loan_id)))?;
        let _guard = self.locks.lock_item(item).await?;
        let txn = self.db.begin().await?;

        let current = Loan::find_by_id(loan_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Loan {}", loan_id)))?;
        if current.status == "returned" {
            return Err(invalid(format!("Loan {} is already returned", loan_id)));
        }

        let now = Utc::now();
        let mut active: loan::ActiveModel = current.into();
        active.return_date = Set(Some(now));
        active.status = Set("returned".to_owned());
        active.updated_at = Set(now);
        let returned = active.update(&txn).await?;

        let status = self.restore_returned_item(&txn, item).await?;
        txn.commit().await?;

        tracing::info!("📚 Loan #{} returned, {} now {:?}", loan_id, item, status);
        Ok((returned, status))
    }

    // ---------------------------------------------------------------------
    // Scheduled work
    // ---------------------------------------------------------------------

    /// Lapse every ready reservation whose pickup deadline is before `now`
    pub async fn expire_overdue(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Applied<Vec<reservation::Model>>, ReservationError> {
        let candidates = Reservation::find()
            .filter(reservation::Column::Status.eq(ReservationStatus::Ready))
            .filter(reservation::Column::ExpiresAt.lt(now))
            .all(&self.db)
            .await?;

        let mut expired = Vec::new();
        let mut warnings = Vec::new();

        for candidate in candidates {
            let item = candidate.item();
            let _guard = self.locks.lock_item(item).await?;
            let txn = self.db.begin().await?;

            // Re-check under the lock, an extension may have won the race
            let current = Self::locked(&txn, candidate.id).await?;
            let overdue = current.expires_at.is_some_and(|at| at < now);
            if Transition::Expire.check(current.status).is_err() || !overdue {
                txn.rollback().await?;
                continue;
            }

            let mut active: reservation::ActiveModel = current.into();
            active.status = Set(ReservationStatus::Expired);
            active.updated_at = Set(now);
            let lapsed = active.update(&txn).await?;

            queue_index::compact(&txn, item).await?;
            self.release_item_if_idle(&txn, item).await?;
            txn.commit().await?;

            tracing::info!("⌛ Reservation #{} expired ({})", lapsed.id, item);
            warnings.extend(self.notifier.trigger(ReservationEvent::for_reservation(
                EventCode::Expired,
                &lapsed,
            )));
            expired.push(lapsed);
        }

        Ok(Applied {
            value: expired,
            warnings,
        })
    }

    /// Remind patrons whose ready reservation lapses soon. Each reservation
    /// is reminded at most once per ready period.
    pub async fn send_due_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Applied<usize>, ReservationError> {
        let mut sent = 0;
        let mut warnings = Vec::new();

        for limits in self.params.list().await? {
            // Lookahead is clamped so the bound stays a storable timestamp
            let lookahead = days(limits.reminder_days_before.min(MAX_DAYS));
            let horizon = now.checked_add_signed(lookahead).unwrap_or(now);
            let due = Reservation::find()
                .filter(reservation::Column::Module.eq(limits.module))
                .filter(reservation::Column::Status.eq(ReservationStatus::Ready))
                .filter(reservation::Column::RemindedAt.is_null())
                .filter(reservation::Column::ExpiresAt.gte(now))
                .filter(reservation::Column::ExpiresAt.lte(horizon))
                .all(&self.db)
                .await?;

            for reservation in due {
                // Conditional update so two sweepers never remind twice
                let result = Reservation::update_many()
                    .col_expr(reservation::Column::RemindedAt, sea_query::Expr::value(now))
                    .filter(reservation::Column::Id.eq(reservation.id))
                    .filter(reservation::Column::RemindedAt.is_null())
                    .exec(&self.db)
                    .await?;

                if result.rows_affected == 1 {
                    sent += 1;
                    warnings.extend(self.notifier.trigger(ReservationEvent::for_reservation(
                        EventCode::Reminder,
                        &reservation,
                    )));
                }
            }
        }

        if sent > 0 {
            tracing::info!("🔔 {} reservation reminder(s) queued", sent);
        }
        Ok(Applied {
            value: sent,
            warnings,
        })
    }
}
