//! Loan Service - loans created from reservations
//!
//! Returning a loan touches the reservation queue, so it lives on
//! `ReservationService::return_loan`.

use sea_orm::*;

use crate::domain::{Module, ReservationError};
use crate::models::loan::{self, Entity as Loan};
use crate::models::patron::Entity as Patron;

/// Enriched loan with related data
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoanWithDetails {
    #[serde(flatten)]
    pub loan: loan::Model,
    pub patron_name: String,
}

/// Filter parameters for listing loans
#[derive(Debug, Default, Clone)]
pub struct LoanFilter {
    pub patron_id: Option<i32>,
    pub module: Option<Module>,
    pub status: Option<String>,
}

/// List loans with the borrowing patron's name
pub async fn list_loans(
    db: &DatabaseConnection,
    filter: LoanFilter,
) -> Result<Vec<LoanWithDetails>, ReservationError> {
    let mut condition = Condition::all();

    if let Some(patron_id) = filter.patron_id {
        condition = condition.add(loan::Column::PatronId.eq(patron_id));
    }

    if let Some(module) = filter.module {
        condition = condition.add(loan::Column::Module.eq(module));
    }

    if let Some(status) = filter.status {
        condition = condition.add(loan::Column::Status.eq(status));
    }

    let loans_with_patrons = Loan::find()
        .filter(condition)
        .order_by_desc(loan::Column::LoanDate)
        .find_also_related(Patron)
        .all(db)
        .await?;

    Ok(loans_with_patrons
        .into_iter()
        .map(|(loan, patron)| LoanWithDetails {
            loan,
            patron_name: patron
                .map(|p| p.name)
                .unwrap_or_else(|| "Unknown".to_string()),
        })
        .collect())
}
