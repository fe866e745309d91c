//! Orthanc REST client
//!
//! [`ArchiveClient`] is the seam between the pipeline and the archive; the
//! listener and exporter only see the trait, so tests can substitute an
//! in-memory archive. [`OrthancClient`] is the HTTP implementation.

use super::models::{ChangesPage, SystemInfo};
use crate::config::ArchiveConfig;
use crate::domain::{ArchiveError, Cursor, ExportError, InstanceId, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use std::time::Duration;

/// Read access to an Orthanc archive
///
/// # Example
///
/// ```no_run
/// use orthanc_export::adapters::orthanc::{ArchiveClient, OrthancClient};
/// use orthanc_export::config::ArchiveConfig;
/// use orthanc_export::domain::Cursor;
///
/// # async fn example() -> orthanc_export::domain::Result<()> {
/// let client = OrthancClient::new(ArchiveConfig::default())?;
/// let page = client.get_changes(Cursor::new(6000), None).await?;
/// for change in &page.changes {
///     println!("{} {} {}", change.seq, change.change_type, change.id);
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ArchiveClient: Send + Sync {
    /// Fetches changes strictly after `since`
    async fn get_changes(&self, since: Cursor, limit: Option<u32>) -> Result<ChangesPage>;

    /// Fetches the simplified (keyword keyed) tags of an instance
    async fn get_simplified_tags(&self, id: &InstanceId) -> Result<Map<String, Value>>;

    /// Downloads the DICOM payload of an instance
    async fn get_file(&self, id: &InstanceId) -> Result<Vec<u8>>;

    /// Fetches archive system information
    async fn system_info(&self) -> Result<SystemInfo>;

    /// Base URL of the archive, for logging
    fn base_url(&self) -> &str;
}

/// HTTP client for the Orthanc REST API
pub struct OrthancClient {
    /// Base URL without trailing slash
    base_url: String,

    /// HTTP client for making requests
    client: Client,

    /// Archive configuration
    config: ArchiveConfig,
}

impl OrthancClient {
    /// Creates a client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Configuration`] if the base URL is malformed or
    /// the HTTP client cannot be built.
    pub fn new(config: ArchiveConfig) -> Result<Self> {
        url::Url::parse(&config.base_url).map_err(|e| {
            ExportError::Configuration(format!(
                "Invalid archive base URL '{}': {e}",
                config.base_url
            ))
        })?;
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            tracing::warn!("TLS certificate verification is disabled for the archive");
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            ExportError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url,
            client,
            config,
        })
    }

    /// Build authorization header value
    fn auth_header_value(&self) -> Option<String> {
        match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) => {
                let credentials = format!("{username}:{}", password.expose_secret().as_ref());
                let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
                Some(format!("Basic {encoded}"))
            }
            _ => None,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match self.auth_header_value() {
            Some(auth) => request.header("Authorization", auth),
            None => request,
        }
    }

    /// Sends a request and maps transport and status failures
    async fn send(&self, request: RequestBuilder, resource: Option<&InstanceId>) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ArchiveError::Timeout(e.to_string())
            } else {
                ArchiveError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        let error = match (status, resource) {
            (StatusCode::NOT_FOUND, Some(id)) => ArchiveError::InstanceNotFound(id.to_string()),
            (s, _) if s.is_server_error() => ArchiveError::ServerError {
                status: s.as_u16(),
                message,
            },
            (s, _) => ArchiveError::ClientError {
                status: s.as_u16(),
                message,
            },
        };
        Err(error.into())
    }

    /// Checks that the archive is reachable and answering
    ///
    /// # Errors
    ///
    /// Returns an error if `/system` cannot be fetched.
    pub async fn health_check(&self) -> Result<SystemInfo> {
        let info = self.system_info().await?;
        tracing::info!(
            base_url = %self.base_url,
            name = info.name.as_deref().unwrap_or("unknown"),
            version = info.version.as_deref().unwrap_or("unknown"),
            "Archive health check passed"
        );
        Ok(info)
    }
}

#[async_trait]
impl ArchiveClient for OrthancClient {
    async fn get_changes(&self, since: Cursor, limit: Option<u32>) -> Result<ChangesPage> {
        let mut request = self.get("/changes").query(&[("since", since.value())]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }

        tracing::trace!(since = %since, "Querying change feed");

        let response = self.send(request, None).await.map_err(|e| match e {
            ExportError::Archive(ArchiveError::ClientError { status, message }) => {
                ArchiveError::ChangesFailed(format!("status {status}: {message}")).into()
            }
            other => other,
        })?;

        response
            .json::<ChangesPage>()
            .await
            .map_err(|e| ArchiveError::InvalidResponse(format!("changes: {e}")).into())
    }

    async fn get_simplified_tags(&self, id: &InstanceId) -> Result<Map<String, Value>> {
        let request = self.get(&format!("/instances/{id}/simplified-tags"));
        let response = self.send(request, Some(id)).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ArchiveError::InvalidResponse(format!("simplified-tags: {e}")))?;

        match body {
            Value::Object(tags) => Ok(tags),
            other => Err(ArchiveError::InvalidResponse(format!(
                "simplified-tags for {id} is not an object: {other}"
            ))
            .into()),
        }
    }

    async fn get_file(&self, id: &InstanceId) -> Result<Vec<u8>> {
        let request = self.get(&format!("/instances/{id}/file"));
        let response = self.send(request, Some(id)).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ArchiveError::ConnectionFailed(format!("file body for {id}: {e}")))?;

        tracing::debug!(instance_id = %id, bytes = bytes.len(), "Downloaded instance payload");
        Ok(bytes.to_vec())
    }

    async fn system_info(&self) -> Result<SystemInfo> {
        let response = self.send(self.get("/system"), None).await?;
        response
            .json::<SystemInfo>()
            .await
            .map_err(|e| ArchiveError::InvalidResponse(format!("system: {e}")).into())
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    #[test]
    fn test_client_strips_trailing_slash() {
        let config = ArchiveConfig {
            base_url: "http://pacs:8042/".to_string(),
            ..ArchiveConfig::default()
        };
        let client = OrthancClient::new(config).unwrap();
        assert_eq!(client.base_url(), "http://pacs:8042");
    }

    #[test]
    fn test_client_rejects_bad_url() {
        let config = ArchiveConfig {
            base_url: "not a url".to_string(),
            ..ArchiveConfig::default()
        };
        assert!(matches!(
            OrthancClient::new(config),
            Err(ExportError::Configuration(_))
        ));
    }

    #[test]
    fn test_basic_auth_header() {
        let config = ArchiveConfig {
            username: Some("orthanc".to_string()),
            password: Some(secret_string("orthanc".to_string())),
            ..ArchiveConfig::default()
        };
        let client = OrthancClient::new(config).unwrap();
        assert_eq!(
            client.auth_header_value().as_deref(),
            Some("Basic b3J0aGFuYzpvcnRoYW5j")
        );
    }

    #[test]
    fn test_no_auth_without_credentials() {
        let client = OrthancClient::new(ArchiveConfig::default()).unwrap();
        assert!(client.auth_header_value().is_none());
    }
}
