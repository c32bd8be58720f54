//! SeaORM implementation of LoanGateway

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set};

use crate::domain::{DomainError, ItemRef, LoanGateway, LoanRecord};
use crate::models::loan;

/// SeaORM-based implementation of LoanGateway
#[derive(Default)]
pub struct SeaOrmLoanGateway;

impl SeaOrmLoanGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LoanGateway for SeaOrmLoanGateway {
    async fn create_loan(
        &self,
        txn: &DatabaseTransaction,
        patron_id: i32,
        item: ItemRef,
        due_date: NaiveDate,
        notes: Option<String>,
    ) -> Result<LoanRecord, DomainError> {
        let now = Utc::now();

        let new_loan = loan::ActiveModel {
            patron_id: Set(patron_id),
            module: Set(item.module),
            item_id: Set(item.item_id),
            loan_date: Set(now),
            due_date: Set(due_date),
            return_date: Set(None),
            status: Set("active".to_owned()),
            notes: Set(notes),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let saved = new_loan.insert(txn).await?;
        Ok(LoanRecord::from(saved))
    }
}
