//! Connection settings for blob storage.

use std::collections::HashMap;

use crate::error::{BlobError, Result};

pub const DEFAULT_CONTAINER: &str = "pdfs";

/// Well-known account and key of the local storage emulator.
const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobStoreConfig {
    /// No storage settings were supplied. Every store attempt fails fast.
    Unconfigured,
    /// Process-local store, for development and tests.
    InMemory { container: String },
    Azure(AzureBlobConfig),
}

impl BlobStoreConfig {
    pub fn is_configured(&self) -> bool {
        !matches!(self, Self::Unconfigured)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum AzureCredential {
    SharedKey { account: String, key: String },
    Sas(String),
    Bearer(String),
    Anonymous,
}

impl std::fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
            Self::Sas(_) => f.write_str("Sas(<redacted>)"),
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureBlobConfig {
    /// Blob service endpoint without a trailing slash.
    pub endpoint: String,
    pub container: String,
    pub credential: AzureCredential,
}

impl AzureBlobConfig {
    pub fn from_account_url(
        account_url: &str,
        container: impl Into<String>,
        credential: AzureCredential,
    ) -> Result<Self> {
        let endpoint = account_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&endpoint)
            .map_err(|e| BlobError::Config(format!("invalid account URL '{}': {}", endpoint, e)))?;

        Ok(Self {
            endpoint,
            container: container.into(),
            credential,
        })
    }

    /// Parse an Azure storage connection string
    /// (`AccountName=..;AccountKey=..;EndpointSuffix=..` and friends).
    pub fn from_connection_string(
        connection_string: &str,
        container: impl Into<String>,
    ) -> Result<Self> {
        let settings = parse_connection_string(connection_string)?;
        let get = |key: &str| settings.get(&key.to_ascii_lowercase()).map(String::as_str);

        if get("UseDevelopmentStorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Self::from_account_url(
                DEV_BLOB_ENDPOINT,
                container,
                AzureCredential::SharedKey {
                    account: DEV_ACCOUNT.to_string(),
                    key: DEV_ACCOUNT_KEY.to_string(),
                },
            );
        }

        let account = get("AccountName");
        let endpoint = match (get("BlobEndpoint"), account) {
            (Some(endpoint), _) => endpoint.to_string(),
            (None, Some(account)) => format!(
                "{}://{}.blob.{}",
                get("DefaultEndpointsProtocol").unwrap_or("https"),
                account,
                get("EndpointSuffix").unwrap_or("core.windows.net")
            ),
            (None, None) => {
                return Err(BlobError::Config(
                    "connection string needs AccountName or BlobEndpoint".to_string(),
                ));
            }
        };

        let credential = match (get("AccountKey"), get("SharedAccessSignature")) {
            (Some(key), _) => AzureCredential::SharedKey {
                account: account
                    .ok_or_else(|| {
                        BlobError::Config("AccountKey given without AccountName".to_string())
                    })?
                    .to_string(),
                key: key.to_string(),
            },
            (None, Some(sas)) => AzureCredential::Sas(sas.trim_start_matches('?').to_string()),
            (None, None) => AzureCredential::Anonymous,
        };

        Self::from_account_url(&endpoint, container, credential)
    }
}

fn parse_connection_string(connection_string: &str) -> Result<HashMap<String, String>> {
    let mut settings = HashMap::new();
    for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        // Values (keys, SAS tokens) may themselves contain '='.
        let (key, value) = part.split_once('=').ok_or_else(|| {
            BlobError::Config(format!("malformed connection string segment '{}'", part))
        })?;
        settings.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }
    if settings.is_empty() {
        return Err(BlobError::Config("connection string is empty".to_string()));
    }
    Ok(settings)
}

/// Account name from a `https://<account>.blob.<suffix>` URL.
pub fn account_from_url(account_url: &str) -> Option<String> {
    let url = reqwest::Url::parse(account_url).ok()?;
    let host = url.host_str()?;
    let (account, rest) = host.split_once('.')?;
    rest.starts_with("blob.").then(|| account.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_key_connection_string() {
        let config = AzureBlobConfig::from_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=ivy;AccountKey=c2VjcmV0a2V5==;EndpointSuffix=core.windows.net",
            "pdfs",
        )
        .unwrap();

        assert_eq!(config.endpoint, "https://ivy.blob.core.windows.net");
        assert_eq!(config.container, "pdfs");
        assert_eq!(
            config.credential,
            AzureCredential::SharedKey {
                account: "ivy".to_string(),
                key: "c2VjcmV0a2V5==".to_string(),
            }
        );
    }

    #[test]
    fn test_sas_connection_string() {
        let config = AzureBlobConfig::from_connection_string(
            "BlobEndpoint=https://ivy.blob.core.windows.net/;SharedAccessSignature=?sv=2022-11-02&sig=abc%3D",
            "docs",
        )
        .unwrap();

        assert_eq!(config.endpoint, "https://ivy.blob.core.windows.net");
        assert_eq!(
            config.credential,
            AzureCredential::Sas("sv=2022-11-02&sig=abc%3D".to_string())
        );
    }

    #[test]
    fn test_development_storage() {
        let config =
            AzureBlobConfig::from_connection_string("UseDevelopmentStorage=true", "pdfs").unwrap();
        assert_eq!(config.endpoint, DEV_BLOB_ENDPOINT);
        assert!(matches!(config.credential, AzureCredential::SharedKey { ref account, .. } if account == DEV_ACCOUNT));
    }

    #[test]
    fn test_malformed_connection_strings() {
        assert!(AzureBlobConfig::from_connection_string("", "pdfs").is_err());
        assert!(AzureBlobConfig::from_connection_string("garbage", "pdfs").is_err());
        assert!(AzureBlobConfig::from_connection_string("AccountKey=abc", "pdfs").is_err());
        assert!(
            AzureBlobConfig::from_connection_string(
                "BlobEndpoint=https://x.blob.core.windows.net;AccountKey=abc",
                "pdfs"
            )
            .is_err()
        );
    }

    #[test]
    fn test_account_from_url() {
        assert_eq!(
            account_from_url("https://ivy.blob.core.windows.net/"),
            Some("ivy".to_string())
        );
        assert_eq!(account_from_url("http://127.0.0.1:10000/devstoreaccount1"), None);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cred = AzureCredential::SharedKey {
            account: "ivy".to_string(),
            key: "topsecret".to_string(),
        };
        let rendered = format!("{:?}", cred);
        assert!(rendered.contains("ivy"));
        assert!(!rendered.contains("topsecret"));
        assert!(!format!("{:?}", AzureCredential::Sas("sig=abc".to_string())).contains("abc"));
    }
}
