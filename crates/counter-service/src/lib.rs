//! Visitor Counter Service Library
//!
//! A single persistent visit counter behind a small HTTP API, backed by an
//! Azure Cosmos DB document and updated with optimistic concurrency.
//!
//! # Architecture
//!
//! The service follows the Handler -> Service -> Store pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> store/*.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Correlation id and HTTP metrics middleware
//! - `models` - Counter document and response types
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - Counter business logic
//! - `store` - Document store trait, Cosmos DB and in-memory implementations

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
pub mod store;
