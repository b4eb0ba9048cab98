//! Document store seam for the counter.
//!
//! The service only relies on three primitives: a point read, a create
//! that fails if the document exists, and a write that is conditional on
//! the version token returned by the read. Nothing here ever overwrites a
//! document unconditionally.
//!
//! # Components
//!
//! - `cosmos` - Azure Cosmos DB REST implementation
//! - `memory` - In-process implementation with fault injection for tests

pub mod cosmos;
pub mod memory;

pub use cosmos::CosmosStore;
pub use memory::InMemoryStore;

use crate::models::{CounterDocument, Versioned};
use thiserror::Error;

/// Errors surfaced by a [`CounterStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// `create` found an existing document with the same id.
    #[error("Document already exists")]
    AlreadyExists,

    /// Conditional write rejected: the document changed since it was read.
    #[error("Concurrency conflict: document was modified since it was read")]
    ConcurrencyConflict,

    /// Store unreachable, throttling, or failing server-side.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Stored document could not be decoded.
    #[error("Malformed document: {0}")]
    Malformed(String),

    /// Any other rejection (bad credentials, unexpected status).
    #[error("Unexpected store response: {0}")]
    Unexpected(String),
}

impl StoreError {
    /// Low-cardinality label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::AlreadyExists => "already_exists",
            StoreError::ConcurrencyConflict => "conflict",
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Malformed(_) => "malformed",
            StoreError::Unexpected(_) => "unexpected",
        }
    }
}

/// Storage operations needed by the counter (enables mocking).
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Point read by id and partition key. `Ok(None)` when absent.
    async fn read(
        &self,
        id: &str,
        partition_key: &str,
    ) -> Result<Option<Versioned<CounterDocument>>, StoreError>;

    /// Create the document; `StoreError::AlreadyExists` if it is already there.
    async fn create(&self, document: &CounterDocument) -> Result<(), StoreError>;

    /// Write the document only if its current version token equals `etag`;
    /// `StoreError::ConcurrencyConflict` otherwise.
    async fn upsert(&self, document: &CounterDocument, etag: &str) -> Result<(), StoreError>;
}
