//! Data models for the visitor counter.
//!
//! The counter document is stored in an open-schema document database, so
//! `count` is kept as a raw JSON value until it has been validated and any
//! fields this service does not know about are carried through writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name stamped into the `createdBy` / `lastModifiedBy` audit fields.
pub const SERVICE_NAME: &str = "VisitorCounterService";

/// The persisted counter document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDocument {
    /// Stable id of the counter document.
    #[serde(default)]
    pub id: String,

    /// Partition key value used to locate the document.
    #[serde(default)]
    pub partition_key: String,

    /// Visible counter value; validated by [`CounterDocument::count`].
    #[serde(default)]
    pub count: Value,

    /// When the document was first created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// When the document was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    /// Correlation id of the request that last wrote the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,

    /// Fields written by other tools (or by the store itself).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Stored `count` is not a usable counter value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidCount {
    #[error("count field is missing")]
    Missing,

    #[error("count is not a non-negative integer: {0}")]
    NotANonNegativeInteger(Value),

    #[error("count {0} cannot be incremented")]
    AtCeiling(u64),
}

impl CounterDocument {
    /// Build the initial document written on the first visit.
    pub fn initial(
        counter_id: &str,
        partition_key: &str,
        correlation_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: counter_id.to_string(),
            partition_key: partition_key.to_string(),
            count: Value::from(1u64),
            created: Some(now),
            last_updated: Some(now),
            correlation_id: Some(correlation_id.to_string()),
            created_by: Some(SERVICE_NAME.to_string()),
            last_modified_by: Some(SERVICE_NAME.to_string()),
            extra: Map::new(),
        }
    }

    /// Validated counter value.
    ///
    /// Only JSON integers `>= 0` are accepted; floats, strings, negatives
    /// and a missing field are all rejected.
    pub fn count(&self) -> Result<u64, InvalidCount> {
        match &self.count {
            Value::Null => Err(InvalidCount::Missing),
            value => value
                .as_u64()
                .ok_or_else(|| InvalidCount::NotANonNegativeInteger(value.clone())),
        }
    }

    /// The value the next successful increment will write.
    pub fn next_count(&self) -> Result<u64, InvalidCount> {
        let current = self.count()?;
        current
            .checked_add(1)
            .ok_or(InvalidCount::AtCeiling(current))
    }

    /// Copy of this document with `count` advanced and audit fields stamped.
    pub fn incremented(&self, new_count: u64, correlation_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            count: Value::from(new_count),
            last_updated: Some(now),
            correlation_id: Some(correlation_id.to_string()),
            last_modified_by: Some(SERVICE_NAME.to_string()),
            ..self.clone()
        }
    }
}

/// A document together with the store's version token for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub document: T,

    /// Opaque token that must match for a conditional write to succeed.
    pub etag: String,
}

/// JSON body of successful counter responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountResponse {
    pub count: u64,
}

/// Readiness probe response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub store: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
