//! Azure Blob Storage over its REST API.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Request, StatusCode, Url};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::{AzureBlobConfig, AzureCredential};
use crate::error::{BlobError, Result};
use crate::key::{build_blob_name, validate_blob_name};
use crate::{BlobDescriptor, BlobStore, ensure_not_empty};

const API_VERSION: &str = "2021-08-06";
const PDF_CONTENT_TYPE: &str = "application/pdf";

pub struct AzureBlobStore {
    client: reqwest::Client,
    config: AzureBlobConfig,
    /// Decoded Shared Key, when that is the credential in use.
    signing_key: Option<Vec<u8>>,
    container_ready: OnceCell<()>,
}

impl AzureBlobStore {
    pub fn new(config: AzureBlobConfig, timeout: Duration) -> Result<Self> {
        let signing_key = match &config.credential {
            AzureCredential::SharedKey { key, .. } => Some(
                BASE64
                    .decode(key)
                    .map_err(|e| BlobError::Config(format!("AccountKey is not base64: {}", e)))?,
            ),
            _ => None,
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| BlobError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            signing_key,
            container_ready: OnceCell::new(),
        })
    }

    pub fn container(&self) -> &str {
        &self.config.container
    }

    /// Public URL of a blob. Never carries the SAS token.
    pub fn blob_url(&self, blob_name: &str) -> String {
        format!("{}/{}/{}", self.config.endpoint, self.config.container, blob_name)
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.config.endpoint, path))
            .map_err(|e| BlobError::InvalidInput(format!("invalid blob URL: {}", e)))?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        if let AzureCredential::Sas(token) = &self.config.credential {
            let joined = match url.query() {
                Some(existing) => format!("{}&{}", existing, token),
                None => token.clone(),
            };
            url.set_query(Some(&joined));
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .request(method, url)
            .headers(headers)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-date", http_date());
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let mut request = builder.build()?;
        self.authorize(&mut request)?;

        Ok(self.client.execute(request).await?)
    }

    fn authorize(&self, request: &mut Request) -> Result<()> {
        let value = match &self.config.credential {
            AzureCredential::SharedKey { account, .. } => {
                let key = self
                    .signing_key
                    .as_deref()
                    .ok_or_else(|| BlobError::Config("missing Shared Key".to_string()))?;
                let signature = sign(key, &string_to_sign(request, account))?;
                format!("SharedKey {}:{}", account, signature)
            }
            AzureCredential::Bearer(token) => format!("Bearer {}", token),
            AzureCredential::Sas(_) | AzureCredential::Anonymous => return Ok(()),
        };
        let value = HeaderValue::from_str(&value)
            .map_err(|e| BlobError::Config(format!("invalid authorization header: {}", e)))?;
        request.headers_mut().insert(reqwest::header::AUTHORIZATION, value);
        Ok(())
    }

    /// Create the container once per process; an existing container is fine.
    async fn ensure_container(&self) -> Result<()> {
        self.container_ready
            .get_or_try_init(|| async {
                let url = self.url(&self.config.container, &[("restype", "container")])?;
                let response = self.send(Method::PUT, url, HeaderMap::new(), None).await?;
                match response.status() {
                    StatusCode::CREATED => {
                        tracing::info!(container = %self.config.container, "Created blob container");
                        Ok::<(), BlobError>(())
                    }
                    StatusCode::CONFLICT => Ok(()),
                    _ => Err(error_from_response(response, &self.config.container).await),
                }
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn store(
        &self,
        bytes: &[u8],
        filename: Option<&str>,
        metadata: &HashMap<String, String>,
    ) -> Result<BlobDescriptor> {
        ensure_not_empty(bytes)?;
        let headers = upload_headers(metadata)?;
        self.ensure_container().await?;

        let blob_name = build_blob_name(filename);
        let url = self.url(&format!("{}/{}", self.config.container, blob_name), &[])?;
        let response = self
            .send(Method::PUT, url, headers, Some(bytes.to_vec()))
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, &blob_name).await);
        }

        tracing::info!(
            container = %self.config.container,
            blob_name = %blob_name,
            size_bytes = bytes.len(),
            "Stored blob"
        );

        Ok(BlobDescriptor {
            container: self.config.container.clone(),
            blob_url: self.blob_url(&blob_name),
            blob_name,
            size_bytes: bytes.len(),
        })
    }

    async fn fetch(&self, blob_name: &str) -> Result<Vec<u8>> {
        validate_blob_name(blob_name)?;
        let url = self.url(&format!("{}/{}", self.config.container, blob_name), &[])?;
        let response = self.send(Method::GET, url, HeaderMap::new(), None).await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, blob_name).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, blob_name: &str) -> Result<()> {
        validate_blob_name(blob_name)?;
        let url = self.url(&format!("{}/{}", self.config.container, blob_name), &[])?;
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-delete-snapshots", HeaderValue::from_static("include"));
        let response = self.send(Method::DELETE, url, headers, None).await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, blob_name).await);
        }
        tracing::info!(blob_name = %blob_name, "Deleted blob");
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let url = self.url(&self.config.container, &[("restype", "container")])?;
        let response = self.send(Method::GET, url, HeaderMap::new(), None).await?;

        // A missing container is created on first upload.
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(error_from_response(response, &self.config.container).await)
        }
    }

    fn name(&self) -> &str {
        "azure"
    }
}

fn upload_headers(metadata: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert("x-ms-blob-type", HeaderValue::from_static("BlockBlob"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(PDF_CONTENT_TYPE));

    for (key, value) in metadata {
        let name = HeaderName::from_bytes(format!("x-ms-meta-{}", key.to_ascii_lowercase()).as_bytes())
            .map_err(|_| BlobError::InvalidInput(format!("invalid metadata key: {}", key)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| BlobError::InvalidInput(format!("invalid metadata value for {}", key)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

async fn error_from_response(response: reqwest::Response, target: &str) -> BlobError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return BlobError::NotFound(target.to_string());
    }
    let code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    tracing::warn!(status = %status, error_code = %code, target = %target, "Blob request rejected");
    BlobError::Unavailable(format!("{} {} for {}", status, code, target).replace("  ", " "))
}

fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn sign(key: &[u8], string_to_sign: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| BlobError::Config(format!("invalid Shared Key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Shared Key string-to-sign for the Blob service (version 2009-09-19 and later).
pub(crate) fn string_to_sign(request: &Request, account: &str) -> String {
    let headers = request.headers();
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };

    let content_length = request
        .body()
        .and_then(|b| b.as_bytes())
        .map(|b| b.len())
        .filter(|len| *len > 0)
        .map(|len| len.to_string())
        .unwrap_or_default();

    let mut ms_headers: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("").trim().to_string(),
            )
        })
        .collect();
    ms_headers.sort();
    let canonical_headers: String = ms_headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();

    let url = request.url();
    let mut resource = format!("/{}{}", account, url.path());
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.into_owned()))
        .collect();
    params.sort();
    for (name, value) in params {
        resource.push_str(&format!("\n{}:{}", name, value));
    }

    [
        request.method().as_str().to_string(),
        header("content-encoding"),
        header("content-language"),
        content_length,
        header("content-md5"),
        header("content-type"),
        header("date"),
        header("if-modified-since"),
        header("if-match"),
        header("if-none-match"),
        header("if-unmodified-since"),
        header("range"),
    ]
    .join("\n")
        + "\n"
        + &canonical_headers
        + &resource
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sas_store(server: &MockServer) -> AzureBlobStore {
        let config = AzureBlobConfig::from_account_url(
            &server.uri(),
            "pdfs",
            AzureCredential::Sas("sv=2022-11-02&sig=test".to_string()),
        )
        .unwrap();
        AzureBlobStore::new(config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_string_to_sign_layout() {
        let client = reqwest::Client::new();
        let request = client
            .put("https://ivy.blob.core.windows.net/pdfs/uploads/a.pdf")
            .header("x-ms-version", API_VERSION)
            .header("x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT")
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, PDF_CONTENT_TYPE)
            .body(vec![1u8, 2, 3])
            .build()
            .unwrap();

        let expected = "PUT\n\n\n3\n\napplication/pdf\n\n\n\n\n\n\n\
            x-ms-blob-type:BlockBlob\n\
            x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\n\
            x-ms-version:2021-08-06\n\
            /ivy/pdfs/uploads/a.pdf";
        assert_eq!(string_to_sign(&request, "ivy"), expected);
    }

    #[test]
    fn test_string_to_sign_sorts_query_params() {
        let client = reqwest::Client::new();
        let request = client
            .put("http://127.0.0.1:10000/devstoreaccount1/pdfs?restype=container&comp=acl")
            .build()
            .unwrap();

        let signed = string_to_sign(&request, "devstoreaccount1");
        assert!(signed.starts_with("PUT\n\n\n\n"));
        assert!(signed.ends_with("/devstoreaccount1/devstoreaccount1/pdfs\ncomp:acl\nrestype:container"));
    }

    #[test]
    fn test_rejects_non_base64_key() {
        let config = AzureBlobConfig::from_account_url(
            "https://ivy.blob.core.windows.net",
            "pdfs",
            AzureCredential::SharedKey {
                account: "ivy".to_string(),
                key: "not base64!".to_string(),
            },
        )
        .unwrap();
        assert!(matches!(
            AzureBlobStore::new(config, Duration::from_secs(1)),
            Err(BlobError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_store_uploads_block_blob() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/pdfs"))
            .and(query_param("restype", "container"))
            .and(query_param("sig", "test"))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path_regex(r"^/pdfs/uploads/\d{4}/\d{2}/\d{2}/[0-9a-f]{32}\.pdf$"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .and(header("content-type", "application/pdf"))
            .and(header("x-ms-meta-content_sha256", "abc"))
            .and(header_exists("x-ms-date"))
            .respond_with(ResponseTemplate::new(201))
            .expect(2)
            .mount(&server)
            .await;

        let store = sas_store(&server);
        let metadata = HashMap::from([("content_sha256".to_string(), "abc".to_string())]);

        let first = store.store(b"%PDF-", Some("a.pdf"), &metadata).await.unwrap();
        let second = store.store(b"%PDF-", Some("a.pdf"), &metadata).await.unwrap();

        assert_eq!(first.container, "pdfs");
        assert_eq!(first.size_bytes, 5);
        assert_ne!(first.blob_name, second.blob_name);
        assert_eq!(first.blob_url, format!("{}/pdfs/{}", server.uri(), first.blob_name));
        assert!(!first.blob_url.contains("sig="));
    }

    #[tokio::test]
    async fn test_store_rejects_empty_bytes_without_network() {
        let server = MockServer::start().await;
        let store = sas_store(&server);

        let err = store.store(b"", None, &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, BlobError::InvalidInput(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forbidden_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(403).insert_header("x-ms-error-code", "AuthenticationFailed"),
            )
            .mount(&server)
            .await;

        let err = sas_store(&server)
            .store(b"data", Some("a.pdf"), &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Unavailable(ref m) if m.contains("AuthenticationFailed")));
    }

    #[tokio::test]
    async fn test_unreachable_is_unavailable() {
        let config = AzureBlobConfig::from_account_url(
            "http://127.0.0.1:9",
            "pdfs",
            AzureCredential::Anonymous,
        )
        .unwrap();
        let store = AzureBlobStore::new(config, Duration::from_millis(500)).unwrap();

        let err = store.store(b"data", None, &HashMap::new()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_slow_response_times_out_as_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let config = AzureBlobConfig::from_account_url(
            &server.uri(),
            "pdfs",
            AzureCredential::Anonymous,
        )
        .unwrap();
        let store = AzureBlobStore::new(config, Duration::from_millis(300)).unwrap();

        let started = std::time::Instant::now();
        let err = store.fetch("uploads/slow.pdf").await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(matches!(err, BlobError::Unavailable(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn test_fetch_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdfs/uploads/2024/01/01/abc.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/pdfs/uploads/2024/01/01/abc.pdf"))
            .and(header("x-ms-delete-snapshots", "include"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pdfs/uploads/missing.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = sas_store(&server);
        let bytes = store.fetch("uploads/2024/01/01/abc.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.7");
        store.delete("uploads/2024/01/01/abc.pdf").await.unwrap();

        let err = store.fetch("uploads/missing.pdf").await.unwrap_err();
        assert_eq!(err, BlobError::NotFound("uploads/missing.pdf".to_string()));
    }

    #[tokio::test]
    async fn test_shared_key_sets_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdfs"))
            .and(query_param("restype", "container"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = AzureBlobConfig::from_account_url(
            &server.uri(),
            "pdfs",
            AzureCredential::SharedKey {
                account: "ivy".to_string(),
                key: BASE64.encode(b"secret"),
            },
        )
        .unwrap();
        let store = AzureBlobStore::new(config, Duration::from_secs(5)).unwrap();
        store.health_check().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let auth = requests[0].headers.get("authorization").unwrap().to_str().unwrap();
        assert!(auth.starts_with("SharedKey ivy:"));
    }
}
