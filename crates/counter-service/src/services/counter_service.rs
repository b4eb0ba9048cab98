//! Visitor counter service.
//!
//! Owns the read-modify-write protocol for the single counter document.
//! There is no in-process locking: correctness rests entirely on the store's
//! conditional write, so concurrent increments race on the version token and
//! losers re-read and try again, up to [`MAX_ATTEMPTS`] times.
//!
//! Store errors never escape this module. Both operations return a
//! [`CounterOutcome`]; diagnostic detail goes to the log.

use crate::middleware::CorrelationId;
use crate::models::{CounterDocument, Versioned};
use crate::observability::metrics::{
    record_concurrency_conflict, record_counter_operation, record_increment_attempts,
};
use crate::store::{CounterStore, StoreError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Attempts an increment makes before giving up with `Conflict`.
pub const MAX_ATTEMPTS: u32 = 3;

/// Result of a counter operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOutcome {
    /// The counter document was created by this call.
    Created(u64),
    /// The operation succeeded against an existing (or absent, for fetch) counter.
    Ok(u64),
    /// Every attempt lost the optimistic concurrency race.
    Conflict,
    /// Store failure or corrupt stored value.
    ServerError,
}

impl CounterOutcome {
    /// The counter value, for the successful outcomes.
    pub fn count(&self) -> Option<u64> {
        match self {
            CounterOutcome::Created(count) | CounterOutcome::Ok(count) => Some(*count),
            CounterOutcome::Conflict | CounterOutcome::ServerError => None,
        }
    }

    /// HTTP status code this outcome maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            CounterOutcome::Created(_) => 201,
            CounterOutcome::Ok(_) => 200,
            CounterOutcome::Conflict => 409,
            CounterOutcome::ServerError => 500,
        }
    }

    /// Low-cardinality label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CounterOutcome::Created(_) => "created",
            CounterOutcome::Ok(_) => "ok",
            CounterOutcome::Conflict => "conflict",
            CounterOutcome::ServerError => "server_error",
        }
    }
}

/// States of the increment loop. `Done` is the only terminal state.
#[derive(Debug)]
enum IncrementState {
    Read {
        attempt: u32,
    },
    Create {
        attempt: u32,
        document: CounterDocument,
    },
    Write {
        attempt: u32,
        current: Versioned<CounterDocument>,
        new_count: u64,
    },
    Done {
        attempt: u32,
        outcome: CounterOutcome,
    },
}

/// Service object holding the injected store and the counter's location.
pub struct CounterService {
    store: Arc<dyn CounterStore>,
    counter_id: String,
    partition_key: String,
}

impl CounterService {
    /// Create a service for the counter document `counter_id` in
    /// partition `partition_key`.
    pub fn new(
        store: Arc<dyn CounterStore>,
        counter_id: impl Into<String>,
        partition_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            counter_id: counter_id.into(),
            partition_key: partition_key.into(),
        }
    }

    /// Current counter value. Never writes.
    ///
    /// - absent document → `Ok(0)`
    /// - invalid stored count → `ServerError` (logged with the value)
    /// - store failure → `ServerError`
    #[instrument(skip_all, name = "counter.fetch", fields(correlation_id = %correlation_id))]
    pub async fn fetch(&self, correlation_id: &CorrelationId) -> CounterOutcome {
        let start = Instant::now();

        let outcome = match self.store.read(&self.counter_id, &self.partition_key).await {
            Ok(None) => {
                debug!(target: "counter.service", "Counter not created yet, reporting zero");
                CounterOutcome::Ok(0)
            }
            Ok(Some(current)) => match current.document.count() {
                Ok(count) => CounterOutcome::Ok(count),
                Err(e) => {
                    error!(
                        target: "counter.service",
                        value = %current.document.count,
                        error = %e,
                        "Invalid counter value"
                    );
                    CounterOutcome::ServerError
                }
            },
            Err(e) => {
                error!(target: "counter.service", error = %e, "Error fetching counter");
                CounterOutcome::ServerError
            }
        };

        record_counter_operation("fetch", outcome.label(), start.elapsed());
        outcome
    }

    /// Add one visit.
    ///
    /// Creates the document with `count = 1` on the first visit
    /// (`Created(1)`), otherwise writes `count + 1` conditionally on the
    /// version read in the same attempt (`Ok(count + 1)`). Only lost races
    /// are retried; after [`MAX_ATTEMPTS`] the result is `Conflict`.
    #[instrument(skip_all, name = "counter.increment", fields(correlation_id = %correlation_id))]
    pub async fn increment(&self, correlation_id: &CorrelationId) -> CounterOutcome {
        let start = Instant::now();
        let mut state = IncrementState::Read { attempt: 1 };

        let (attempts, outcome) = loop {
            state = match state {
                IncrementState::Done { attempt, outcome } => break (attempt, outcome),
                IncrementState::Read { attempt } => self.read_step(attempt, correlation_id).await,
                IncrementState::Create { attempt, document } => {
                    self.create_step(attempt, document).await
                }
                IncrementState::Write {
                    attempt,
                    current,
                    new_count,
                } => {
                    self.write_step(attempt, current, new_count, correlation_id)
                        .await
                }
            };
        };

        record_increment_attempts(attempts);
        record_counter_operation("increment", outcome.label(), start.elapsed());
        outcome
    }

    async fn read_step(&self, attempt: u32, correlation_id: &CorrelationId) -> IncrementState {
        match self.store.read(&self.counter_id, &self.partition_key).await {
            Ok(None) => {
                info!(
                    target: "counter.service",
                    attempt,
                    "Counter not found, creating initial counter"
                );
                IncrementState::Create {
                    attempt,
                    document: CounterDocument::initial(
                        &self.counter_id,
                        &self.partition_key,
                        correlation_id.as_str(),
                        Utc::now(),
                    ),
                }
            }
            Ok(Some(current)) => match current.document.next_count() {
                Ok(new_count) => IncrementState::Write {
                    attempt,
                    current,
                    new_count,
                },
                Err(e) => {
                    // Corrupt data does not repair itself; retrying is pointless.
                    error!(
                        target: "counter.service",
                        value = %current.document.count,
                        error = %e,
                        "Invalid counter value found"
                    );
                    IncrementState::Done {
                        attempt,
                        outcome: CounterOutcome::ServerError,
                    }
                }
            },
            Err(e) => {
                error!(target: "counter.service", attempt, error = %e, "Failed to read counter");
                IncrementState::Done {
                    attempt,
                    outcome: CounterOutcome::ServerError,
                }
            }
        }
    }

    async fn create_step(&self, attempt: u32, document: CounterDocument) -> IncrementState {
        match self.store.create(&document).await {
            Ok(()) => {
                info!(target: "counter.service", "Counter created with count 1");
                IncrementState::Done {
                    attempt,
                    outcome: CounterOutcome::Created(1),
                }
            }
            // Creation is never retried, not even when another request won
            // the race to create the counter first.
            Err(e) => {
                error!(target: "counter.service", attempt, error = %e, "Failed to create counter");
                IncrementState::Done {
                    attempt,
                    outcome: CounterOutcome::ServerError,
                }
            }
        }
    }

    async fn write_step(
        &self,
        attempt: u32,
        current: Versioned<CounterDocument>,
        new_count: u64,
        correlation_id: &CorrelationId,
    ) -> IncrementState {
        let updated = current
            .document
            .incremented(new_count, correlation_id.as_str(), Utc::now());

        match self.store.upsert(&updated, &current.etag).await {
            Ok(()) => {
                info!(target: "counter.service", new_count, attempt, "Counter incremented");
                IncrementState::Done {
                    attempt,
                    outcome: CounterOutcome::Ok(new_count),
                }
            }
            Err(StoreError::ConcurrencyConflict) => self.lost_race(attempt),
            Err(e) => {
                error!(target: "counter.service", attempt, error = %e, "Failed to write counter");
                IncrementState::Done {
                    attempt,
                    outcome: CounterOutcome::ServerError,
                }
            }
        }
    }

    /// Re-read on the next attempt, or give up once attempts are spent.
    fn lost_race(&self, attempt: u32) -> IncrementState {
        record_concurrency_conflict();
        warn!(
            target: "counter.service",
            attempt,
            max_attempts = MAX_ATTEMPTS,
            "Concurrency conflict"
        );

        if attempt >= MAX_ATTEMPTS {
            IncrementState::Done {
                attempt,
                outcome: CounterOutcome::Conflict,
            }
        } else {
            IncrementState::Read {
                attempt: attempt + 1,
            }
        }
    }

    /// Whether the store answers a point read (absent counts as reachable).
    #[instrument(skip_all, name = "counter.store_ready")]
    pub async fn store_ready(&self) -> Result<(), StoreError> {
        self.store
            .read(&self.counter_id, &self.partition_key)
            .await
            .map(|_| ())
    }
}
