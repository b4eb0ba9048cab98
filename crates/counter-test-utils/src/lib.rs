//! # Counter Test Utilities
//!
//! Shared test utilities for the visitor counter service.
//!
//! This crate provides:
//! - Server test harness (`TestCounterServer` for E2E tests)
//! - Document fixtures (`counter_document`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use counter_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestCounterServer::spawn(InMemoryStore::new()).await?;
//!     let client = reqwest::Client::new();
//!
//!     let response = client
//!         .post(format!("{}/api/counter", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 201);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use counter_service::store::InMemoryStore;
pub use fixtures::*;
pub use server_harness::*;
