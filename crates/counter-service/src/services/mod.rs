//! Business logic for the visitor counter.

pub mod counter_service;

pub use counter_service::{CounterOutcome, CounterService, MAX_ATTEMPTS};
