//! Azure Cosmos DB (SQL API) counter store.
//!
//! Talks to the Cosmos REST API directly. Every request is signed with the
//! account master key (HMAC-SHA256 over verb, resource type, resource link
//! and date). Optimistic concurrency uses the document `_etag`: the
//! conditional write sends it as `If-Match` and Cosmos answers 412 when the
//! document has changed since it was read.
//!
//! The container's partition key path must be `/partitionKey`.
//!
//! # Status mapping
//!
//! - 404 on read → `Ok(None)`
//! - 409 on create → `StoreError::AlreadyExists`
//! - 412 on conditional write → `StoreError::ConcurrencyConflict`
//! - 429, 5xx, transport errors → `StoreError::Unavailable`
//! - anything else → `StoreError::Unexpected`

use crate::config::Config;
use crate::models::{CounterDocument, Versioned};
use crate::observability::metrics::record_store_request;
use crate::store::{CounterStore, StoreError};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use ring::hmac;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Cosmos REST API version sent in `x-ms-version`.
pub const API_VERSION: &str = "2018-12-31";

/// Timeout for a single Cosmos request in seconds.
const COSMOS_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Connect timeout in seconds.
const COSMOS_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Resource type of every request this store makes.
const RESOURCE_TYPE_DOCS: &str = "docs";

/// Cosmos DB implementation of [`CounterStore`].
pub struct CosmosStore {
    client: Client,
    /// Account endpoint without trailing slash.
    endpoint: String,
    /// Decoded master key.
    key: hmac::Key,
    database: String,
    container: String,
}

impl CosmosStore {
    /// Create a store for the configured account, database and container.
    ///
    /// # Errors
    ///
    /// - `StoreError::Unexpected` if the key is not valid base64 or the
    ///   HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        let key_bytes = STANDARD
            .decode(config.cosmos_key.expose_secret())
            .map_err(|_| StoreError::Unexpected("Cosmos key is not valid base64".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(COSMOS_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(COSMOS_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "counter.store.cosmos", error = %e, "Failed to build HTTP client");
                StoreError::Unexpected("HTTP client unavailable".to_string())
            })?;

        Ok(Self {
            client,
            endpoint: config.cosmos_endpoint.trim_end_matches('/').to_string(),
            key: hmac::Key::new(hmac::HMAC_SHA256, &key_bytes),
            database: config.database_name.clone(),
            container: config.container_name.clone(),
        })
    }

    /// `dbs/{db}/colls/{coll}`: the resource link used to sign creates.
    fn collection_link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database, self.container)
    }

    /// `dbs/{db}/colls/{coll}/docs/{id}`: the resource link of one document.
    fn document_link(&self, id: &str) -> String {
        format!("{}/docs/{}", self.collection_link(), id)
    }

    /// Absolute URL for a path made of raw (unencoded) segments.
    fn url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.endpoint, encoded.join("/"))
    }

    /// Signed request builder carrying the headers every call needs.
    fn request(
        &self,
        method: Method,
        path: &str,
        resource_link: &str,
        partition_key: &str,
    ) -> Result<RequestBuilder, StoreError> {
        let date = http_date(Utc::now());
        let token = authorization_token(
            &self.key,
            method.as_str(),
            RESOURCE_TYPE_DOCS,
            resource_link,
            &date,
        );
        let partition_header = serde_json::to_string(&[partition_key])
            .map_err(|e| StoreError::Unexpected(format!("partition key encoding: {}", e)))?;

        Ok(self
            .client
            .request(method, self.url(path))
            .header("authorization", token)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-documentdb-partitionkey", partition_header))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        builder.send().await.map_err(|e| {
            warn!(target: "counter.store.cosmos", error = %e, "Cosmos request failed");
            StoreError::Unavailable("Cosmos DB is unreachable".to_string())
        })
    }
}

#[async_trait::async_trait]
impl CounterStore for CosmosStore {
    #[instrument(skip_all, fields(id = %id))]
    async fn read(
        &self,
        id: &str,
        partition_key: &str,
    ) -> Result<Option<Versioned<CounterDocument>>, StoreError> {
        let start = Instant::now();
        let link = self.document_link(id);

        let result: Result<Option<Versioned<CounterDocument>>, StoreError> = async {
            let response = self
                .send(self.request(Method::GET, &link, &link, partition_key)?)
                .await?;

            match response.status() {
                StatusCode::OK => {
                    let body: Value = response.json().await.map_err(|e| {
                        StoreError::Malformed(format!("response body is not JSON: {}", e))
                    })?;
                    parse_versioned(body).map(Some)
                }
                StatusCode::NOT_FOUND => {
                    debug!(target: "counter.store.cosmos", "Counter document not found");
                    Ok(None)
                }
                status => Err(classify_status(status)),
            }
        }
        .await;

        record_store_request("read", status_label(&result), start.elapsed());
        result
    }

    #[instrument(skip_all, fields(id = %document.id))]
    async fn create(&self, document: &CounterDocument) -> Result<(), StoreError> {
        let start = Instant::now();
        let collection = self.collection_link();
        let path = format!("{}/docs", collection);

        let result: Result<(), StoreError> = async {
            let response = self
                .send(
                    self.request(Method::POST, &path, &collection, &document.partition_key)?
                        .json(document),
                )
                .await?;

            match response.status() {
                StatusCode::CREATED | StatusCode::OK => Ok(()),
                StatusCode::CONFLICT => Err(StoreError::AlreadyExists),
                status => Err(classify_status(status)),
            }
        }
        .await;

        record_store_request("create", status_label(&result), start.elapsed());
        result
    }

    #[instrument(skip_all, fields(id = %document.id))]
    async fn upsert(&self, document: &CounterDocument, etag: &str) -> Result<(), StoreError> {
        let start = Instant::now();
        let collection = self.collection_link();
        let path = format!("{}/docs", collection);

        let result: Result<(), StoreError> = async {
            let response = self
                .send(
                    self.request(Method::POST, &path, &collection, &document.partition_key)?
                        .header("x-ms-documentdb-is-upsert", "True")
                        .header("if-match", etag)
                        .json(document),
                )
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(()),
                StatusCode::PRECONDITION_FAILED => Err(StoreError::ConcurrencyConflict),
                status => Err(classify_status(status)),
            }
        }
        .await;

        record_store_request("upsert", status_label(&result), start.elapsed());
        result
    }
}

/// Build the master-key authorization header value.
///
/// The signed payload is `verb\nresourceType\nresourceLink\ndate\n\n` with
/// verb, resource type and date lowercased; the resource link keeps its case.
pub fn authorization_token(
    key: &hmac::Key,
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> String {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );
    let signature = STANDARD.encode(hmac::sign(key, payload.as_bytes()).as_ref());
    urlencoding::encode(&format!("type=master&ver=1.0&sig={}", signature)).into_owned()
}

/// RFC 1123 date as required by `x-ms-date`.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Split the store's `_etag` off a document body.
fn parse_versioned(mut body: Value) -> Result<Versioned<CounterDocument>, StoreError> {
    let etag = match body.as_object_mut().and_then(|o| o.remove("_etag")) {
        Some(Value::String(etag)) => etag,
        _ => return Err(StoreError::Malformed("document has no _etag".to_string())),
    };

    let document = serde_json::from_value(body)
        .map_err(|e| StoreError::Malformed(format!("unexpected document shape: {}", e)))?;

    Ok(Versioned { document, etag })
}

fn classify_status(status: StatusCode) -> StoreError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        warn!(target: "counter.store.cosmos", status = %status, "Cosmos DB unavailable");
        StoreError::Unavailable(format!("Cosmos DB returned {}", status))
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        error!(target: "counter.store.cosmos", status = %status, "Cosmos DB rejected credentials");
        StoreError::Unexpected(format!("Cosmos DB rejected credentials ({})", status))
    } else {
        warn!(target: "counter.store.cosmos", status = %status, "Unexpected Cosmos DB response");
        StoreError::Unexpected(format!("Cosmos DB returned {}", status))
    }
}

fn status_label<T>(result: &Result<T, StoreError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    }
}
