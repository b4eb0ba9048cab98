//! Visitor counter configuration.
//!
//! Configuration is loaded from environment variables. The Cosmos DB
//! access key is held as a [`SecretString`] and redacted in Debug output.

use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default Cosmos DB database name.
pub const DEFAULT_DATABASE: &str = "AzureResume";

/// Default Cosmos DB container name.
pub const DEFAULT_CONTAINER: &str = "VisitorCounter";

/// Default partition key value of the counter document.
pub const DEFAULT_PARTITION_KEY: &str = "visitorCount";

/// Default id of the counter document.
pub const DEFAULT_COUNTER_ID: &str = "visitorCount";

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Allowed origins for cross-origin requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    /// Any origin (`*`).
    Any,
    /// An explicit list of origins.
    List(Vec<String>),
}

/// Visitor counter configuration.
#[derive(Clone)]
pub struct Config {
    /// Cosmos DB account endpoint (`https://<account>.documents.azure.com:443/`).
    pub cosmos_endpoint: String,

    /// Cosmos DB master key (base64).
    pub cosmos_key: SecretString,

    /// Database holding the counter container.
    pub database_name: String,

    /// Container holding the counter document.
    pub container_name: String,

    /// Partition key value of the counter document.
    pub partition_key: String,

    /// Id of the counter document.
    pub counter_id: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Origins allowed by the CORS layer.
    pub cors_allowed_origins: CorsOrigins,
}

/// Custom Debug implementation that redacts the access key.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("cosmos_endpoint", &self.cosmos_endpoint)
            .field("cosmos_key", &"[REDACTED]")
            .field("database_name", &self.database_name)
            .field("container_name", &self.container_name)
            .field("partition_key", &self.partition_key)
            .field("counter_id", &self.counter_id)
            .field("bind_address", &self.bind_address)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid Cosmos endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid CORS origin: {0}")]
    InvalidCorsOrigin(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let cosmos_endpoint = required(vars, "COSMOS_ENDPOINT")?;
        if !(cosmos_endpoint.starts_with("https://") || cosmos_endpoint.starts_with("http://")) {
            return Err(ConfigError::InvalidEndpoint(
                "COSMOS_ENDPOINT must be an http:// or https:// URL".to_string(),
            ));
        }

        let cosmos_key = SecretString::from(required(vars, "COSMOS_KEY")?);

        let database_name = with_default(vars, "COSMOS_DATABASE", DEFAULT_DATABASE)?;
        let container_name = with_default(vars, "COSMOS_CONTAINER", DEFAULT_CONTAINER)?;
        let partition_key = with_default(vars, "COSMOS_PARTITION_KEY", DEFAULT_PARTITION_KEY)?;
        let counter_id = with_default(vars, "COSMOS_COUNTER_ID", DEFAULT_COUNTER_ID)?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let cors_allowed_origins = match vars.get("CORS_ALLOWED_ORIGINS") {
            Some(value) => parse_cors_origins(value)?,
            None => CorsOrigins::Any,
        };

        Ok(Config {
            cosmos_endpoint,
            cosmos_key,
            database_name,
            container_name,
            partition_key,
            counter_id,
            bind_address,
            cors_allowed_origins,
        })
    }
}

/// Present and non-blank, or `MissingEnvVar`.
fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// Absent falls back to `default`; present but blank is still missing.
fn with_default(
    vars: &HashMap<String, String>,
    name: &str,
    default: &str,
) -> Result<String, ConfigError> {
    match vars.get(name) {
        Some(_) => required(vars, name),
        None => Ok(default.to_string()),
    }
}

fn parse_cors_origins(value: &str) -> Result<CorsOrigins, ConfigError> {
    let origins: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return Ok(CorsOrigins::Any);
    }

    if let Some(bad) = origins
        .iter()
        .find(|o| !(o.starts_with("https://") || o.starts_with("http://")))
    {
        return Err(ConfigError::InvalidCorsOrigin(format!(
            "CORS_ALLOWED_ORIGINS entries must be http(s) origins, got '{}'",
            bad
        )));
    }

    Ok(CorsOrigins::List(origins))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "COSMOS_ENDPOINT".to_string(),
                "https://counter-test.documents.azure.com:443/".to_string(),
            ),
            ("COSMOS_KEY".to_string(), "c2VjcmV0LWtleQ==".to_string()),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(
            config.cosmos_endpoint,
            "https://counter-test.documents.azure.com:443/"
        );
        assert_eq!(config.cosmos_key.expose_secret(), "c2VjcmV0LWtleQ==");
        assert_eq!(config.database_name, DEFAULT_DATABASE);
        assert_eq!(config.container_name, DEFAULT_CONTAINER);
        assert_eq!(config.partition_key, DEFAULT_PARTITION_KEY);
        assert_eq!(config.counter_id, DEFAULT_COUNTER_ID);
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.cors_allowed_origins, CorsOrigins::Any);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("COSMOS_DATABASE".to_string(), "Resume".to_string());
        vars.insert("COSMOS_CONTAINER".to_string(), " Visitors ".to_string());
        vars.insert("COSMOS_PARTITION_KEY".to_string(), "site".to_string());
        vars.insert("COSMOS_COUNTER_ID".to_string(), "home".to_string());
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert(
            "CORS_ALLOWED_ORIGINS".to_string(),
            "https://example.com, http://localhost:3000".to_string(),
        );

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.database_name, "Resume");
        assert_eq!(config.container_name, "Visitors");
        assert_eq!(config.partition_key, "site");
        assert_eq!(config.counter_id, "home");
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(
            config.cors_allowed_origins,
            CorsOrigins::List(vec![
                "https://example.com".to_string(),
                "http://localhost:3000".to_string()
            ])
        );
    }

    #[test]
    fn test_from_vars_missing_endpoint() {
        let mut vars = base_vars();
        vars.remove("COSMOS_ENDPOINT");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "COSMOS_ENDPOINT"));
    }

    #[test]
    fn test_from_vars_missing_key() {
        let mut vars = base_vars();
        vars.remove("COSMOS_KEY");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "COSMOS_KEY"));
    }

    #[test]
    fn test_blank_key_is_missing() {
        let mut vars = base_vars();
        vars.insert("COSMOS_KEY".to_string(), "   ".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "COSMOS_KEY"));
    }

    #[test]
    fn test_blank_defaulted_value_is_missing() {
        let mut vars = base_vars();
        vars.insert("COSMOS_DATABASE".to_string(), String::new());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "COSMOS_DATABASE"));
    }

    #[test]
    fn test_endpoint_rejects_non_http_url() {
        let mut vars = base_vars();
        vars.insert("COSMOS_ENDPOINT".to_string(), "invalid_url".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidEndpoint(msg)) if msg.contains("http:// or https://"))
        );
    }

    #[test]
    fn test_endpoint_accepts_plain_http() {
        let mut vars = base_vars();
        vars.insert(
            "COSMOS_ENDPOINT".to_string(),
            "http://localhost:8081".to_string(),
        );

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.cosmos_endpoint, "http://localhost:8081");
    }

    #[test]
    fn test_cors_wildcard_means_any() {
        let mut vars = base_vars();
        vars.insert(
            "CORS_ALLOWED_ORIGINS".to_string(),
            "https://example.com,*".to_string(),
        );

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.cors_allowed_origins, CorsOrigins::Any);
    }

    #[test]
    fn test_cors_rejects_bare_hostname() {
        let mut vars = base_vars();
        vars.insert(
            "CORS_ALLOWED_ORIGINS".to_string(),
            "example.com".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidCorsOrigin(msg)) if msg.contains("example.com"))
        );
    }

    #[test]
    fn test_debug_redacts_cosmos_key() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("c2VjcmV0LWtleQ=="));
    }
}
