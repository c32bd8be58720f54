//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.

use std::fmt;

use super::limits::Reason;

#[derive(Debug)]
pub enum DomainError {
    /// Resource not found
    NotFound,
    /// Validation error with message
    Validation(String),
    /// Database/persistence error
    Database(String),
    /// Generic internal error
    Internal(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::NotFound => write!(f, "Resource not found"),
            DomainError::Validation(msg) => write!(f, "Validation error: {}", msg),
            DomainError::Database(msg) => write!(f, "Database error: {}", msg),
            DomainError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

// Conversion from SeaORM errors (used in infrastructure layer)
impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Database(e.to_string())
    }
}

/// Failures of the reservation lifecycle and limit validator.
#[derive(Debug)]
pub enum ReservationError {
    /// The limit validator refused the request
    Denied(Vec<Reason>),
    /// The reservation's current status does not allow the operation
    InvalidOperation(String),
    /// Malformed request
    Validation(String),
    /// Missing patron, item or reservation
    NotFound(String),
    /// The patron account exists but is not active
    PatronInactive(i32),
    /// Lost race on a queue slot or a double booking
    Conflict(String),
    /// Storage failure
    Database(String),
}

impl fmt::Display for ReservationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationError::Denied(reasons) => {
                let kinds: Vec<&str> = reasons.iter().map(|r| r.message.as_str()).collect();
                write!(f, "Reservation denied: {}", kinds.join("; "))
            }
            ReservationError::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            ReservationError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ReservationError::NotFound(what) => write!(f, "{} not found", what),
            ReservationError::PatronInactive(id) => write!(f, "Patron {} is not active", id),
            ReservationError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ReservationError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for ReservationError {}

impl From<sea_orm::DbErr> for ReservationError {
    fn from(e: sea_orm::DbErr) -> Self {
        match e.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(msg)) => {
                ReservationError::Conflict(msg)
            }
            _ => ReservationError::Database(e.to_string()),
        }
    }
}

impl From<DomainError> for ReservationError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound => ReservationError::NotFound("Resource".to_string()),
            DomainError::Validation(msg) => ReservationError::Validation(msg),
            other => ReservationError::Database(other.to_string()),
        }
    }
}
