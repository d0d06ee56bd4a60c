//! HTTP transport seam.
//!
//! The client builds fully-described [`DirectLineRequest`]s (method, path,
//! query, headers, body) and hands them to a [`Transport`]. The production
//! implementation is [`ReqwestTransport`]; tests substitute their own.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

/// Maximum characters of an error body kept in [`TransportError::HttpStatus`].
const MAX_ERROR_BODY_CHARS: usize = 256;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// HTTP verbs used by the Direct Line protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

/// A request relative to the Direct Line base URL.
#[derive(Clone, PartialEq, Eq)]
pub struct DirectLineRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path relative to the base URL, without a leading slash.
    pub path: String,
    /// Query parameters in order.
    pub query: Vec<(String, String)>,
    /// Header name/value pairs (names lowercase).
    pub headers: Vec<(String, String)>,
    /// Encoded request body.
    pub body: Option<Vec<u8>>,
}

impl DirectLineRequest {
    /// Look up a header value by (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Look up a query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The bearer token carried in the `authorization` header.
    fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

impl std::fmt::Debug for DirectLineRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                if k.eq_ignore_ascii_case("authorization") {
                    (k.as_str(), "[REDACTED]")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("DirectLineRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("headers", &headers)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// HTTP-layer failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection, timeout or body read failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The service responded with a non-success status.
    #[error("non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// The configured base URL or request path is not a valid URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// HTTP status code, when the server responded.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::HttpStatus { status, .. } => Some(*status),
            Self::InvalidUrl(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Executes Direct Line requests.
///
/// Implementations return the response body of a successful (2xx) exchange
/// and a [`TransportError`] for everything else.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request and return the response body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on connectivity failure or non-2xx status.
    async fn execute(&self, request: DirectLineRequest) -> Result<String, TransportError>;
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: Url,
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport rooted at `base_url`.
    ///
    /// `timeout` bounds each request end to end; `None` keeps reqwest's
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] if `base_url` does not parse and
    /// [`TransportError::Request`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        // Without the trailing slash `Url::join` would drop the last segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_owned()
        } else {
            format!("{base_url}/")
        };
        let base_url =
            Url::parse(&normalized).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base_url,
            client: builder.build()?,
        })
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: DirectLineRequest) -> Result<String, TransportError> {
        let url = self
            .base_url
            .join(&request.path)
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        check_http_response(response, request.bearer_token()).await
    }
}

/// Check HTTP response status and return body text or a structured error.
///
/// # Errors
///
/// Returns `TransportError::Request` on body read failure and
/// `TransportError::HttpStatus` on non-2xx.
pub async fn check_http_response(
    response: reqwest::Response,
    secret: Option<&str>,
) -> Result<String, TransportError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(TransportError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_error_body(&body, secret),
        });
    }
    Ok(body)
}

/// Collapse whitespace, redact the secret and truncate an error body.
pub fn sanitize_error_body(raw: &str, secret: Option<&str>) -> String {
    let mut sanitized = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        sanitized = sanitized.replace(secret, "[REDACTED]");
    }

    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}
