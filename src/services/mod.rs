//! Services Layer
//!
//! Reservation business logic, independent of the HTTP layer.

pub mod limit_validator;
pub mod loan_service;
pub mod locks;
pub mod notifications;
pub mod queue_index;
pub mod reservation_service;
pub mod sweeper;

pub use limit_validator::{Evaluation, LimitValidator};
pub use notifications::{EventCode, NotificationDispatcher, ReservationEvent};
pub use reservation_service::{
    Applied, Collaborators, Conversion, CreateReservation, ReservationFilter, ReservationService,
};
