//! Reservation scheduling and conflict resolution for appointment-based
//! services: weekly working hours, calendar overrides, overlap detection and
//! the reservation status lifecycle.

pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod services;

pub use errors::{ErrorKind, SchedulingError};
pub use scheduler::Scheduler;
pub use services::admission::BookingRequest;
pub use services::availability::AvailabilityResult;
