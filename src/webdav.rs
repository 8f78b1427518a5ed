use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tokio::time::{sleep, timeout};
use tracing::debug;
use url::Url;

use crate::config::is_absolute_url;
use crate::error::{HarvestError, RemoteAccessError};
use crate::propfind::{PROPFIND_BODY, parse_multistatus};
use crate::remote::{ByteStream, RemoteFolderClient, RemoteResource};

static PROPFIND_METHOD: OnceLock<Method> = OnceLock::new();

fn propfind_method() -> &'static Method {
    PROPFIND_METHOD.get_or_init(|| {
        Method::from_bytes(b"PROPFIND").expect("PROPFIND is a valid HTTP method token")
    })
}

/// Configuration for the WebDAV client
#[derive(Debug, Clone)]
pub struct WebDavConfig {
    /// Request timeout in seconds, covering the whole exchange including the body
    pub timeout_seconds: u64,
    /// Connect timeout in seconds
    pub connect_timeout_seconds: u64,
    /// Number of retry attempts
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds (for exponential backoff cap)
    pub max_retry_delay_ms: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for WebDavConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
            user_agent: format!("xml-to-xsd/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP basic credentials, sent preemptively with every request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// WebDAV folder client: PROPFIND for listings, GET for content
pub struct WebDavClient {
    client: Client,
    base_url: Option<Url>,
    credentials: Option<Credentials>,
    config: WebDavConfig,
}

impl WebDavClient {
    /// Create a client. Relative folder paths are resolved against `base_url`.
    pub fn new(
        base_url: Option<Url>,
        credentials: Option<Credentials>,
        config: WebDavConfig,
    ) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(HarvestError::from)?;

        Ok(Self {
            client,
            base_url,
            credentials,
            config,
        })
    }

    /// Resolve a configured folder to the URL of the collection (with trailing slash)
    pub fn resolve_folder(&self, folder: &str) -> Result<Url, RemoteAccessError> {
        let invalid = |details: String| RemoteAccessError::Io {
            url: folder.to_string(),
            details,
        };

        let mut url = if is_absolute_url(folder) {
            Url::parse(folder).map_err(|e| invalid(format!("invalid folder URL: {}", e)))?
        } else {
            let base = self
                .base_url
                .as_ref()
                .ok_or_else(|| invalid("no remote host configured".to_string()))?;
            base.join(folder)
                .map_err(|e| invalid(format!("invalid folder path: {}", e)))?
        };

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// Get the client configuration
    pub fn config(&self) -> &WebDavConfig {
        &self.config
    }

    /// Send a request with retry logic and exponential backoff
    async fn send_with_retry<F>(&self, url: &Url, build: F) -> Result<Response, RemoteAccessError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            match self.make_request(url, build()).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    // Retry on server errors (5xx) but not client errors (4xx)
                    if status.is_server_error() && attempt < self.config.retry_attempts {
                        self.wait_before_retry(attempt).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(Self::status_error(url, status));
                }
                Err(error) => {
                    if attempt < self.config.retry_attempts && Self::is_retryable_error(&error) {
                        debug!(%url, attempt, %error, "retrying request");
                        self.wait_before_retry(attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Make a single HTTP request with timeout
    async fn make_request(
        &self,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<Response, RemoteAccessError> {
        let request = match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => request,
        };

        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            request.send(),
        )
        .await
        .map_err(|_| RemoteAccessError::Timeout {
            url: url.to_string(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(|e| Self::transport_error(url.as_str(), self.config.timeout_seconds, e))
    }

    /// Wait before retry with exponential backoff
    async fn wait_before_retry(&self, attempt: u32) {
        sleep(self.retry_delay(attempt)).await;
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .config
            .retry_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.config.max_retry_delay_ms))
    }

    /// Timeouts and connection-level failures are worth another try
    fn is_retryable_error(error: &RemoteAccessError) -> bool {
        matches!(
            error,
            RemoteAccessError::Timeout { .. } | RemoteAccessError::Io { .. }
        )
    }

    fn status_error(url: &Url, status: StatusCode) -> RemoteAccessError {
        let url = url.to_string();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                RemoteAccessError::Unauthorized { url }
            }
            StatusCode::NOT_FOUND | StatusCode::GONE => RemoteAccessError::NotFound { url },
            _ => RemoteAccessError::Io {
                url,
                details: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            },
        }
    }

    fn transport_error(
        url: &str,
        timeout_seconds: u64,
        error: reqwest::Error,
    ) -> RemoteAccessError {
        if error.is_timeout() {
            RemoteAccessError::Timeout {
                url: url.to_string(),
                timeout_seconds,
            }
        } else {
            RemoteAccessError::Io {
                url: url.to_string(),
                details: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl RemoteFolderClient for WebDavClient {
    async fn list(&self, folder: &str) -> Result<Vec<RemoteResource>, RemoteAccessError> {
        let url = self.resolve_folder(folder)?;
        debug!(%url, "listing remote folder");

        let response = self
            .send_with_retry(&url, || {
                self.client
                    .request(propfind_method().clone(), url.clone())
                    .header("Depth", "1")
                    .header(
                        CONTENT_TYPE,
                        HeaderValue::from_static("application/xml; charset=utf-8"),
                    )
                    .body(PROPFIND_BODY)
            })
            .await?;

        let body = response
            .text()
            .await
            .map_err(|e| Self::transport_error(url.as_str(), self.config.timeout_seconds, e))?;

        parse_multistatus(&body, folder, &url).map_err(|details| RemoteAccessError::Io {
            url: url.to_string(),
            details,
        })
    }

    async fn fetch(&self, resource: &RemoteResource) -> Result<ByteStream, RemoteAccessError> {
        let url = Url::parse(&resource.href).map_err(|e| RemoteAccessError::Io {
            url: resource.href.clone(),
            details: format!("invalid resource URL: {}", e),
        })?;

        let response = self
            .send_with_retry(&url, || self.client.get(url.clone()))
            .await?;

        let href = resource.href.clone();
        let timeout_seconds = self.config.timeout_seconds;
        Ok(response
            .bytes_stream()
            .map_err(move |e| Self::transport_error(&href, timeout_seconds, e))
            .boxed())
    }
}
