//! Observability for the visitor counter.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
