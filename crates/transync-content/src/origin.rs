//! Origin port
//!
//! Every upstream request goes through [`HttpClient`]. Non-success
//! statuses are returned as data; callers decide how to classify them.

use crate::error::OriginError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Raw response from an origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Undecoded body bytes
    pub body: Vec<u8>,
    /// Declared content type, if any
    pub content_type: Option<String>,
}

impl HttpResponse {
    /// 200 response with the given body
    #[must_use]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: None,
        }
    }

    /// Response with a status and an empty body
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            content_type: None,
        }
    }

    /// With declared content type
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Check for a 2xx status
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into an error
    ///
    /// # Errors
    /// Returns [`OriginError::ServerError`] for 5xx and
    /// [`OriginError::Status`] for anything else outside 2xx.
    pub fn error_for_status(self, url: &str) -> Result<Self, OriginError> {
        match OriginError::from_status(self.status, url) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// HTTP GET capability
#[async_trait]
pub trait HttpClient: Debug + Send + Sync {
    /// Issue a GET request
    ///
    /// # Errors
    /// Returns transport-level failures only; status codes are carried
    /// in the response.
    async fn get(&self, url: &str) -> Result<HttpResponse, OriginError>;
}

/// reqwest-backed origin client
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
    timeout: Duration,
}

impl ReqwestClient {
    /// Browser-like agent; several document hosts serve login shells to
    /// unknown agents.
    pub const USER_AGENT: &'static str =
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) transync/0.1";

    /// Create client with a per-request timeout
    ///
    /// # Errors
    /// Returns a transport error if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, OriginError> {
        let inner = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| OriginError::transport("<client>", e.to_string()))?;
        Ok(Self { inner, timeout })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, OriginError> {
        let response = self.inner.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                OriginError::Timeout {
                    url: url.to_string(),
                    after: self.timeout,
                }
            } else {
                OriginError::transport(url, e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| OriginError::transport(url, e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            body,
            content_type,
        })
    }
}
