//! Counter document fixtures.

use chrono::Utc;
use counter_service::config::{DEFAULT_COUNTER_ID, DEFAULT_PARTITION_KEY};
use counter_service::models::CounterDocument;
use serde_json::Value;

/// Correlation id stamped on seeded documents.
pub const SEED_CORRELATION_ID: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// The default counter document holding `count`.
///
/// `count` is a raw JSON value so tests can seed corrupt data.
pub fn counter_document(count: impl Into<Value>) -> CounterDocument {
    let mut document = CounterDocument::initial(
        DEFAULT_COUNTER_ID,
        DEFAULT_PARTITION_KEY,
        SEED_CORRELATION_ID,
        Utc::now(),
    );
    document.count = count.into();
    document
}
