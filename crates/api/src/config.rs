use axum::http::HeaderValue;
use std::time::Duration;
use thiserror::Error;

use blob::{AzureBlobConfig, AzureCredential, BlobError, BlobStoreConfig, DEFAULT_CONTAINER};
use graph::GraphConfig;
use ingest::{ChunkerConfig, ConfigurationError};

use crate::jobs::DEFAULT_JOB_RETENTION;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Chunking(#[from] ConfigurationError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Everything the service needs at startup. Built once, then handed to `AppState`.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Only origin allowed by CORS; any origin when unset.
    pub frontend_origin: Option<HeaderValue>,
    pub chunking: ChunkerConfig,
    pub blob: BlobStoreConfig,
    /// Upper bound on every storage and health call.
    pub storage_timeout: Duration,
    pub graph: GraphConfig,
    pub max_upload_bytes: usize,
    /// How long finished indexing jobs stay visible.
    pub job_retention: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            frontend_origin: None,
            chunking: ChunkerConfig::default(),
            blob: BlobStoreConfig::Unconfigured,
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            graph: GraphConfig::Unconfigured,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            job_retention: DEFAULT_JOB_RETENTION,
        }
    }
}

impl ServiceConfig {
    /// Read `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        // A non-numeric PORT falls back to the default rather than aborting startup.
        let port = get("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let frontend_origin = get("FRONTEND_ORIGIN")
            .map(|origin| {
                HeaderValue::from_str(&origin).map_err(|e| ConfigError::Invalid {
                    var: "FRONTEND_ORIGIN",
                    message: e.to_string(),
                })
            })
            .transpose()?;

        let chunking = match (get("CHUNK_SIZE"), get("CHUNK_OVERLAP")) {
            (None, None) => defaults.chunking,
            (size, overlap) => ChunkerConfig::from_signed(
                parse_or("CHUNK_SIZE", size, defaults.chunking.chunk_size() as i64)?,
                parse_or("CHUNK_OVERLAP", overlap, defaults.chunking.chunk_overlap() as i64)?,
            )?,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            frontend_origin,
            chunking,
            blob: blob_config(&get)?,
            storage_timeout: Duration::from_secs(parse_or(
                "STORAGE_TIMEOUT_SECS",
                get("STORAGE_TIMEOUT_SECS"),
                defaults.storage_timeout.as_secs(),
            )?),
            graph: graph_config(&get),
            max_upload_bytes: parse_or(
                "MAX_UPLOAD_BYTES",
                get("MAX_UPLOAD_BYTES"),
                defaults.max_upload_bytes,
            )?,
            job_retention: Duration::from_secs(parse_or(
                "JOB_RETENTION_SECS",
                get("JOB_RETENTION_SECS"),
                defaults.job_retention.as_secs(),
            )?),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            message: format!("'{}' is not valid: {}", raw, e),
        }),
    }
}

fn blob_config(get: &impl Fn(&str) -> Option<String>) -> Result<BlobStoreConfig, ConfigError> {
    let container = get("AZURE_BLOB_CONTAINER").unwrap_or_else(|| DEFAULT_CONTAINER.to_string());

    if get("BLOB_BACKEND").is_some_and(|b| b.eq_ignore_ascii_case("memory")) {
        return Ok(BlobStoreConfig::InMemory { container });
    }

    if let Some(connection_string) = get("AZURE_STORAGE_CONNECTION_STRING") {
        let azure = AzureBlobConfig::from_connection_string(&connection_string, container)?;
        return Ok(BlobStoreConfig::Azure(azure));
    }

    let Some(account_url) = get("AZURE_STORAGE_ACCOUNT_URL") else {
        return Ok(BlobStoreConfig::Unconfigured);
    };

    let credential = if let Some(sas) = get("AZURE_STORAGE_SAS_TOKEN") {
        AzureCredential::Sas(sas.trim_start_matches('?').to_string())
    } else if let Some(key) = get("AZURE_STORAGE_ACCOUNT_KEY") {
        let account = get("AZURE_STORAGE_ACCOUNT_NAME")
            .or_else(|| blob::config::account_from_url(&account_url))
            .ok_or(ConfigError::Invalid {
                var: "AZURE_STORAGE_ACCOUNT_NAME",
                message: "required with AZURE_STORAGE_ACCOUNT_KEY for this account URL".to_string(),
            })?;
        AzureCredential::SharedKey { account, key }
    } else if let Some(token) = get("AZURE_STORAGE_ACCESS_TOKEN") {
        AzureCredential::Bearer(token)
    } else {
        AzureCredential::Anonymous
    };

    let azure = AzureBlobConfig::from_account_url(&account_url, container, credential)?;
    Ok(BlobStoreConfig::Azure(azure))
}

fn graph_config(get: &impl Fn(&str) -> Option<String>) -> GraphConfig {
    match get("NEO4J_URI") {
        Some(uri) => GraphConfig::Neo4j {
            uri,
            user: get("NEO4J_USER").unwrap_or_else(|| "neo4j".to_string()),
            password: get("NEO4J_PASSWORD").unwrap_or_default(),
        },
        None => GraphConfig::Unconfigured,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.chunking, ChunkerConfig::default());
        assert_eq!(config.blob, BlobStoreConfig::Unconfigured);
        assert_eq!(config.graph, GraphConfig::Unconfigured);
        assert_eq!(config.storage_timeout, Duration::from_secs(30));
        assert_eq!(config.job_retention, Duration::from_secs(3600));
        assert!(config.frontend_origin.is_none());
    }

    #[test]
    fn test_timeouts_from_env() {
        let config =
            config_from(&[("STORAGE_TIMEOUT_SECS", "5"), ("JOB_RETENTION_SECS", "60")]).unwrap();
        assert_eq!(config.storage_timeout, Duration::from_secs(5));
        assert_eq!(config.job_retention, Duration::from_secs(60));

        assert!(matches!(
            config_from(&[("STORAGE_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Invalid { var: "STORAGE_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn test_bad_port_falls_back() {
        let config = config_from(&[("PORT", "eighty")]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        let config = config_from(&[("PORT", "9100")]).unwrap();
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn test_chunking_validation() {
        let config = config_from(&[("CHUNK_SIZE", "400")]).unwrap();
        assert_eq!(config.chunking.chunk_size(), 400);
        assert_eq!(config.chunking.chunk_overlap(), 100);

        assert!(matches!(
            config_from(&[("CHUNK_OVERLAP", "-1")]),
            Err(ConfigError::Chunking(_))
        ));
        assert!(matches!(
            config_from(&[("CHUNK_SIZE", "100"), ("CHUNK_OVERLAP", "100")]),
            Err(ConfigError::Chunking(_))
        ));
        assert!(matches!(
            config_from(&[("CHUNK_SIZE", "big")]),
            Err(ConfigError::Invalid { var: "CHUNK_SIZE", .. })
        ));
    }

    #[test]
    fn test_connection_string_wins() {
        let config = config_from(&[
            (
                "AZURE_STORAGE_CONNECTION_STRING",
                "AccountName=ivy;AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net",
            ),
            ("AZURE_STORAGE_ACCOUNT_URL", "https://other.blob.core.windows.net"),
            ("AZURE_BLOB_CONTAINER", "uploads"),
        ])
        .unwrap();

        let BlobStoreConfig::Azure(azure) = config.blob else {
            panic!("expected Azure config");
        };
        assert_eq!(azure.endpoint, "https://ivy.blob.core.windows.net");
        assert_eq!(azure.container, "uploads");
    }

    #[test]
    fn test_account_url_credentials() {
        let config = config_from(&[
            ("AZURE_STORAGE_ACCOUNT_URL", "https://ivy.blob.core.windows.net"),
            ("AZURE_STORAGE_ACCOUNT_KEY", "c2VjcmV0"),
        ])
        .unwrap();
        let BlobStoreConfig::Azure(azure) = config.blob else {
            panic!("expected Azure config");
        };
        assert_eq!(azure.container, DEFAULT_CONTAINER);
        assert_eq!(
            azure.credential,
            AzureCredential::SharedKey {
                account: "ivy".to_string(),
                key: "c2VjcmV0".to_string(),
            }
        );

        let config = config_from(&[
            ("AZURE_STORAGE_ACCOUNT_URL", "https://ivy.blob.core.windows.net"),
            ("AZURE_STORAGE_SAS_TOKEN", "?sv=1&sig=x"),
        ])
        .unwrap();
        let BlobStoreConfig::Azure(azure) = config.blob else {
            panic!("expected Azure config");
        };
        assert_eq!(azure.credential, AzureCredential::Sas("sv=1&sig=x".to_string()));

        assert!(matches!(
            config_from(&[
                ("AZURE_STORAGE_ACCOUNT_URL", "http://127.0.0.1:10000/devstoreaccount1"),
                ("AZURE_STORAGE_ACCOUNT_KEY", "c2VjcmV0"),
            ]),
            Err(ConfigError::Invalid { var: "AZURE_STORAGE_ACCOUNT_NAME", .. })
        ));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = config_from(&[
            ("AZURE_STORAGE_CONNECTION_STRING", ""),
            ("AZURE_STORAGE_ACCOUNT_URL", "  "),
        ])
        .unwrap();
        assert!(!config.blob.is_configured());
    }

    #[test]
    fn test_memory_backend_and_graph() {
        let config = config_from(&[
            ("BLOB_BACKEND", "memory"),
            ("NEO4J_URI", "bolt://localhost:7687"),
            ("NEO4J_PASSWORD", "pw"),
            ("FRONTEND_ORIGIN", "http://localhost:5173"),
        ])
        .unwrap();

        assert_eq!(
            config.blob,
            BlobStoreConfig::InMemory {
                container: "pdfs".to_string()
            }
        );
        assert_eq!(
            config.graph,
            GraphConfig::Neo4j {
                uri: "bolt://localhost:7687".to_string(),
                user: "neo4j".to_string(),
                password: "pw".to_string(),
            }
        );
        assert_eq!(
            config.frontend_origin,
            Some(HeaderValue::from_static("http://localhost:5173"))
        );
    }
}
