//! Correlation id middleware.
//!
//! Every request gets a correlation id before it reaches a handler. A
//! well-formed `x-correlation-id` header (64 lowercase hex characters) is
//! reused verbatim; anything else is replaced by a freshly minted id: the
//! SHA-256 of 32 bytes from the system CSPRNG, hex encoded.
//!
//! The id is only tracing metadata. It is attached to the request
//! extensions, the request span, the stored audit fields and the response
//! header, and never influences what the handlers do.

use crate::errors::CounterError;
use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use tracing::{error, info_span, Instrument};

/// Header carrying the correlation id in both directions.
pub const CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// Length of a correlation id in hex characters.
pub const CORRELATION_ID_LEN: usize = 64;

/// Opaque per-request tracing token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Accept `value` only if it is exactly 64 lowercase hex characters.
    pub fn parse(value: &str) -> Option<Self> {
        let well_formed = value.len() == CORRELATION_ID_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

        well_formed.then(|| Self(value.to_string()))
    }

    /// Mint a new id from 32 random bytes.
    ///
    /// # Errors
    ///
    /// Returns `CounterError::Internal` if the system RNG fails.
    pub fn generate() -> Result<Self, CounterError> {
        let rng = SystemRandom::new();
        let mut seed = [0u8; 32];
        rng.fill(&mut seed).map_err(|_| {
            error!(target: "counter.middleware", "System RNG failed to produce a correlation id");
            CounterError::Internal("Internal server error".to_string())
        })?;

        Ok(Self(hex::encode(digest(&SHA256, &seed).as_ref())))
    }

    /// Reuse a well-formed inbound id, otherwise mint a new one.
    pub fn resolve(inbound: Option<&str>) -> Result<Self, CounterError> {
        match inbound.and_then(Self::parse) {
            Some(id) => Ok(id),
            None => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Middleware that resolves the correlation id, runs the rest of the stack
/// inside a span carrying it, and echoes it on the response.
pub async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let inbound = request
        .headers()
        .get(&CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok());

    let correlation_id = match CorrelationId::resolve(inbound) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    let span = info_span!(
        "counter.request",
        method = %request.method(),
        correlation_id = %correlation_id
    );
    tracing::info!(target: "counter.middleware", parent: &span, "Processing request");

    request.extensions_mut().insert(correlation_id.clone());
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }

    response
}
