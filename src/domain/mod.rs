//! Domain layer - Business types and collaborator contracts
//!
//! No HTTP concerns live here. Collaborator traits borrow SeaORM's
//! transaction handle so reads and writes share one unit of work.

pub mod errors;
pub mod limits;
pub mod repositories;
pub mod reservation;

pub use errors::{DomainError, ReservationError};
pub use limits::*;
pub use repositories::*;
pub use reservation::*;
