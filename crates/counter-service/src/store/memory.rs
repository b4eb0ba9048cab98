//! In-process counter store.
//!
//! Emulates the optimistic concurrency contract of a document database with
//! a monotonically increasing version per document: every successful write
//! bumps the version and a conditional write only succeeds if the caller's
//! etag still names the current version.
//!
//! Faults can be injected to exercise the service's error paths, and every
//! call is counted so tests can assert how often the store was contacted.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = InMemoryStore::new().with_forced_conflicts(u32::MAX);
//! let service = CounterService::new(Arc::new(store.clone()), "visitorCount", "visitorCount");
//!
//! assert_eq!(service.increment(&correlation_id).await, CounterOutcome::Conflict);
//! assert_eq!(store.read_count(), MAX_ATTEMPTS as usize);
//! ```

use crate::models::{CounterDocument, Versioned};
use crate::store::{CounterStore, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory [`CounterStore`]; clones share the same documents and counters.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// (id, partition key) -> (document, version)
    documents: Mutex<HashMap<(String, String), (CounterDocument, u64)>>,
    reads: AtomicUsize,
    creates: AtomicUsize,
    upserts: AtomicUsize,
    /// Remaining conditional writes to reject with a conflict.
    forced_conflicts: AtomicU32,
    fail_reads: AtomicBool,
    fail_creates: AtomicBool,
    /// Report every create as `AlreadyExists` without storing anything.
    creates_already_existing: AtomicBool,
    fail_upserts: AtomicBool,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `document` (version 1).
    #[must_use]
    pub fn with_document(document: CounterDocument) -> Self {
        let key = (document.id.clone(), document.partition_key.clone());
        let documents = HashMap::from([(key, (document, 1))]);
        Self {
            inner: Arc::new(Inner {
                documents: Mutex::new(documents),
                ..Inner::default()
            }),
        }
    }

    /// Reject the next `n` conditional writes with a concurrency conflict.
    #[must_use]
    pub fn with_forced_conflicts(self, n: u32) -> Self {
        self.inner.forced_conflicts.store(n, Ordering::SeqCst);
        self
    }

    /// Make every read fail with `StoreError::Unavailable`.
    #[must_use]
    pub fn with_failing_reads(self) -> Self {
        self.inner.fail_reads.store(true, Ordering::SeqCst);
        self
    }

    /// Make every create fail with `StoreError::Unavailable`.
    #[must_use]
    pub fn with_failing_creates(self) -> Self {
        self.inner.fail_creates.store(true, Ordering::SeqCst);
        self
    }

    /// Make every create fail with `StoreError::AlreadyExists`, as if another
    /// writer created the document between the caller's read and create.
    #[must_use]
    pub fn with_creates_already_existing(self) -> Self {
        self.inner
            .creates_already_existing
            .store(true, Ordering::SeqCst);
        self
    }

    /// Make every conditional write fail with `StoreError::Unavailable`.
    #[must_use]
    pub fn with_failing_upserts(self) -> Self {
        self.inner.fail_upserts.store(true, Ordering::SeqCst);
        self
    }

    /// Current copy of a stored document, if any.
    pub async fn document(&self, id: &str, partition_key: &str) -> Option<CounterDocument> {
        let documents = self.inner.documents.lock().await;
        documents
            .get(&(id.to_string(), partition_key.to_string()))
            .map(|(doc, _)| doc.clone())
    }

    /// Number of `read` calls made.
    pub fn read_count(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Number of `create` calls made.
    pub fn create_count(&self) -> usize {
        self.inner.creates.load(Ordering::SeqCst)
    }

    /// Number of `upsert` calls made.
    pub fn upsert_count(&self) -> usize {
        self.inner.upserts.load(Ordering::SeqCst)
    }

    fn take_forced_conflict(&self) -> bool {
        self.inner
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn etag_for(version: u64) -> String {
    format!("\"{}\"", version)
}

#[async_trait::async_trait]
impl CounterStore for InMemoryStore {
    async fn read(
        &self,
        id: &str,
        partition_key: &str,
    ) -> Result<Option<Versioned<CounterDocument>>, StoreError> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".to_string()));
        }

        let found = {
            let documents = self.inner.documents.lock().await;
            documents
                .get(&(id.to_string(), partition_key.to_string()))
                .map(|(doc, version)| Versioned {
                    document: doc.clone(),
                    etag: etag_for(*version),
                })
        };

        // Let other tasks run between the read and the caller's write, as a
        // network round trip would.
        tokio::task::yield_now().await;

        Ok(found)
    }

    async fn create(&self, document: &CounterDocument) -> Result<(), StoreError> {
        self.inner.creates.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected create failure".to_string()));
        }
        if self.inner.creates_already_existing.load(Ordering::SeqCst) {
            return Err(StoreError::AlreadyExists);
        }

        let mut documents = self.inner.documents.lock().await;
        let key = (document.id.clone(), document.partition_key.clone());
        if documents.contains_key(&key) {
            return Err(StoreError::AlreadyExists);
        }
        documents.insert(key, (document.clone(), 1));
        Ok(())
    }

    async fn upsert(&self, document: &CounterDocument, etag: &str) -> Result<(), StoreError> {
        self.inner.upserts.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_upserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected upsert failure".to_string()));
        }
        if self.take_forced_conflict() {
            return Err(StoreError::ConcurrencyConflict);
        }

        let mut documents = self.inner.documents.lock().await;
        let key = (document.id.clone(), document.partition_key.clone());
        match documents.get_mut(&key) {
            Some((stored, version)) if etag_for(*version) == etag => {
                *stored = document.clone();
                *version += 1;
                Ok(())
            }
            _ => Err(StoreError::ConcurrencyConflict),
        }
    }
}
