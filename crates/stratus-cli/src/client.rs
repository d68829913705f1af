//! HTTP client for the platform API.
//!
//! [`ApiClient`] attaches basic-auth credentials to every request, decodes
//! gzip and JSON bodies, and turns error statuses into [`ApiError`] values.
//!
//! # Example
//!
//! ```rust,no_run
//! use stratus_cli::client::ApiClient;
//! use stratus_cli::credentials::Credentials;
//! use stratus_cli::endpoints;
//!
//! # async fn example() -> Result<(), stratus_cli::error::ApiError> {
//! let base = url::Url::parse("https://api.stratusapp.com").expect("static url");
//! let client = ApiClient::new(base, Credentials::new("dev@example.com", "key"), Default::default())?;
//! let apps = client.call(&endpoints::APP_LIST, &[], &[], None).await?;
//! println!("{}", apps.body.text());
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::io::Read;

use flate2::read::GzDecoder;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::credentials::Credentials;
use crate::endpoints::{Endpoint, MediaType, Verb};
use crate::error::ApiError;

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("stratus/", env!("CARGO_PKG_VERSION"));

const LEGACY_VERSION_HEADER: &str = "x-stratus-api-version";
const LEGACY_VERSION: &str = "2";
const UNKNOWN_ERROR: &str = "unknown error";
const NOT_FOUND: &str = "Resource not found.";

static XML_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<error>([^<]*)</error>").unwrap_or_else(|_| unreachable!()));

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// No content.
    Empty,
    /// A JSON document.
    Json(Value),
    /// Anything that is not JSON, as text.
    Raw(String),
}

impl Body {
    /// The JSON value, if the body was JSON.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The body as text.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Json(value) => value.to_string(),
            Self::Raw(text) => text.clone(),
        }
    }
}

/// A successful API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Decoded body.
    pub body: Body,
}

impl ApiResponse {
    /// Deserialize the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] if the body is not JSON or has the wrong
    /// shape.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let value = self
            .body
            .as_json()
            .ok_or_else(|| ApiError::Decode("expected a JSON body".into()))?;
        T::deserialize(value).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Authenticated client for the platform API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    credentials: Credentials,
    extra_headers: HeaderMap,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .field("identity", &self.credentials.identity)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for `base` using `credentials`.
    ///
    /// `extra_headers` are sent with every request made by this client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base: Url, credentials: Credentials, extra_headers: HeaderMap) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base,
            credentials,
            extra_headers,
        })
    }

    /// The credentials attached to requests.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Issue a request to `path` (relative to the base URL, may carry a
    /// query string).
    ///
    /// # Errors
    ///
    /// Returns a classified [`ApiError`] for error statuses and transport
    /// failures.
    pub async fn request(
        &self,
        verb: Verb,
        path: &str,
        headers: HeaderMap,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))?;
        self.send(verb, url, headers, body).await
    }

    /// Call a catalog endpoint.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ApiError`]; a success status the endpoint does
    /// not list is reported as [`ApiError::Generic`].
    pub async fn call(
        &self,
        endpoint: &Endpoint,
        params: &[(&str, &str)],
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let mut url = endpoint.url(&self.base, params)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }

        let mut headers = HeaderMap::new();
        if let Ok(accept) = HeaderValue::from_str(&endpoint.media.accept()) {
            headers.insert(ACCEPT, accept);
        }
        if endpoint.media == MediaType::Legacy {
            headers.insert(
                HeaderName::from_static(LEGACY_VERSION_HEADER),
                HeaderValue::from_static(LEGACY_VERSION),
            );
        }

        trace!(endpoint = endpoint.name, "calling endpoint");
        let response = self.send(endpoint.verb, url, headers, body).await?;
        if !endpoint.accepts(response.status) {
            return Err(ApiError::Generic {
                status: response.status,
                message: format!("unexpected status from {}", endpoint.name),
            });
        }
        Ok(response)
    }

    /// Open a long-lived unauthenticated GET, returning the response as soon
    /// as headers arrive so the body can be read incrementally.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ApiError`] if the status is not a success.
    pub async fn open_stream(&self, url: Url) -> Result<reqwest::Response, ApiError> {
        debug!(url = %url, "opening stream");
        let response = self
            .http
            .get(url.clone())
            .headers(self.extra_headers.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        if status >= 400 {
            let headers = response.headers().clone();
            let bytes = response.bytes().await?;
            let body = decode_body(&headers, &bytes)?;
            return Err(classify(status, url.path(), &headers, &body));
        }
        Ok(response)
    }

    async fn send(
        &self,
        verb: Verb,
        url: Url,
        headers: HeaderMap,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let path = url.path().to_string();
        debug!(method = ?verb, %url, "API request");

        let mut request = self
            .http
            .request(verb.as_method(), url)
            .headers(self.extra_headers.clone())
            .headers(headers)
            .header(ACCEPT_ENCODING, "gzip")
            .basic_auth(&self.credentials.identity, Some(&self.credentials.secret));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;
        let body = decode_body(&headers, &bytes)?;
        trace!(status, bytes = bytes.len(), "API response");

        if status >= 400 {
            let err = classify(status, &path, &headers, &body);
            debug!(status, error = %err, "API error");
            return Err(err);
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// Decode a raw response body: gunzip when declared, then JSON when it
/// looks like JSON, otherwise text.
///
/// # Errors
///
/// Returns [`ApiError::Decode`] if a gzip body is corrupt.
pub fn decode_body(headers: &HeaderMap, raw: &[u8]) -> Result<Body, ApiError> {
    let gzipped = header_str(headers, &CONTENT_ENCODING).is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

    let bytes: Cow<'_, [u8]> = if gzipped && !raw.is_empty() {
        let mut inflated = Vec::new();
        GzDecoder::new(raw)
            .read_to_end(&mut inflated)
            .map_err(|e| ApiError::Decode(format!("gzip: {e}")))?;
        Cow::Owned(inflated)
    } else {
        Cow::Borrowed(raw)
    };

    let text = String::from_utf8_lossy(&bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Body::Empty);
    }

    let json_type = header_str(headers, &CONTENT_TYPE).is_some_and(|v| v.contains("json"));
    if json_type || trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return Ok(Body::Json(value));
        }
    }
    Ok(Body::Raw(text.into_owned()))
}

/// Map an error status to an [`ApiError`].
#[must_use]
pub fn classify(status: u16, path: &str, headers: &HeaderMap, body: &Body) -> ApiError {
    let message = error_message(headers, body);
    let or_unknown = || message.clone().unwrap_or_else(|| UNKNOWN_ERROR.to_string());

    match status {
        401 => ApiError::Unauthorized,
        402 if error_id(body) == Some("verification_required") => ApiError::VerificationRequired {
            message: or_unknown(),
        },
        402 => ApiError::PaymentRequired {
            message: or_unknown(),
        },
        403 => ApiError::Forbidden {
            message: or_unknown(),
        },
        404 if has_empty_app_segment(path) => ApiError::NilApp,
        404 => ApiError::NotFound {
            message: message.clone().unwrap_or_else(|| NOT_FOUND.to_string()),
        },
        408 => ApiError::Timeout,
        423 => ApiError::Locked {
            message: or_unknown(),
        },
        429 => ApiError::RateLimited,
        422 | 500..=599 => ApiError::RequestFailed {
            status,
            message: or_unknown(),
        },
        _ => ApiError::Generic {
            status,
            message: or_unknown(),
        },
    }
}

/// Server-supplied error text, if any can be found.
fn error_message(headers: &HeaderMap, body: &Body) -> Option<String> {
    match body {
        Body::Empty => None,
        Body::Json(value) => ["error", "message"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str))
            .map(str::to_string),
        Body::Raw(text) => {
            if let Some(caps) = XML_ERROR.captures(text) {
                return Some(unescape_xml(caps[1].trim()));
            }
            let plain = header_str(headers, &CONTENT_TYPE).is_some_and(|v| v.starts_with("text/plain"));
            plain.then(|| text.trim().to_string())
        }
    }
}

fn error_id(body: &Body) -> Option<&str> {
    body.as_json()?.get("id")?.as_str()
}

fn has_empty_app_segment(path: &str) -> bool {
    path == "/apps/" || path.starts_with("/apps//")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
