//! Entity Facts lookup client and response classification

use efdump_core::{HttpConfig, SHARED_RUNTIME, build_http_client};
use reqwest::header::ACCEPT_LANGUAGE;
use reqwest::Url;

/// Default lookup endpoint; `{ID}` is replaced by the identifier
pub const DEFAULT_URL_TEMPLATE: &str = "http://hub.culturegraph.org/entityfacts/{ID}";

/// Error text for identifiers the service does not handle
pub const NOT_SUPPORTED_PHRASE: &str = "currently not supported";

/// Error text for identifiers the service does not know
pub const NOT_FOUND_PHRASE: &str = "NOT found in database";

/// Longest error body kept for logging
const MAX_ERROR_BODY: usize = 512;

/// Validated JSON response body, kept as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    bytes: Vec<u8>,
}

impl Document {
    /// Accept `bytes` if they hold exactly one JSON value.
    pub fn parse(bytes: Vec<u8>) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<serde::de::IgnoredAny>(&bytes)?;
        Ok(Self { bytes })
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        Self {
            bytes: value.to_string().into_bytes(),
        }
    }

    /// Body without surrounding whitespace
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.trim_ascii()
    }
}

/// `identifier` percent-encoded for use as one URL path segment
fn encode_segment(identifier: &str) -> Option<String> {
    let mut url = Url::parse("http://localhost/").ok()?;
    url.path_segments_mut().ok()?.clear().push(identifier);
    Some(url.path().trim_start_matches('/').to_string())
}

/// Why the service will never answer for this identifier/language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotSupported,
    NotFound,
}

/// Failed lookup
#[derive(Debug)]
pub enum FetchError {
    /// Request URL could not be built
    InvalidUrl(String),
    /// Connection refused, reset or timed out
    Connect(String),
    /// Non-success status; `error_text` is the body's `Error` field if present
    Status {
        status: u16,
        error_text: Option<String>,
        body: String,
    },
    /// Success status with a body that is not JSON
    Malformed { message: String, body: Vec<u8> },
    /// Any other transport failure
    Transport(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUrl(msg) => write!(f, "malformed URL: {msg}"),
            Self::Connect(msg) => write!(f, "server did not respond: {msg}"),
            Self::Status {
                status,
                error_text: Some(text),
                ..
            } => write!(f, "HTTP {status}: {text}"),
            Self::Status { status, body, .. } => write!(f, "HTTP {status}: {body}"),
            Self::Malformed { message, .. } => write!(f, "JSON is malformed: {message}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Self::Connect(e.to_string())
        } else if e.is_builder() {
            Self::InvalidUrl(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }

    /// Known "will never succeed" answer from the service
    pub fn rejection(&self) -> Option<Rejection> {
        let Self::Status {
            error_text: Some(text),
            ..
        } = self
        else {
            return None;
        };
        if text.contains(NOT_SUPPORTED_PHRASE) {
            Some(Rejection::NotSupported)
        } else if text.contains(NOT_FOUND_PHRASE) {
            Some(Rejection::NotFound)
        } else {
            None
        }
    }

    /// No retry can help
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::InvalidUrl(_)) || self.rejection().is_some()
    }

    pub fn is_retryable(&self) -> bool {
        !self.is_permanent()
    }
}

/// One lookup per (identifier, language). Called from pool worker threads.
pub trait Fetch: Send + Sync {
    fn fetch(&self, identifier: &str, language: &str) -> Result<Document, FetchError>;
}

/// HTTP client for the Entity Facts service
#[derive(Debug, Clone)]
pub struct EntityFactsClient {
    client: reqwest::Client,
    url_template: String,
}

impl EntityFactsClient {
    pub fn new(url_template: &str, http: &HttpConfig) -> Result<Self, FetchError> {
        let client = build_http_client(http).map_err(|e| FetchError::Transport(e.to_string()))?;
        let this = Self {
            client,
            url_template: url_template.to_string(),
        };
        // Fail on a bad template before any work is queued
        this.url_for("0")?;
        Ok(this)
    }

    /// Lookup URL for `identifier`.
    ///
    /// Substitutes `{ID}`; a template without it gets the identifier
    /// appended as a path segment. The identifier is always percent-encoded
    /// as a single path segment.
    pub fn url_for(&self, identifier: &str) -> Result<Url, FetchError> {
        let invalid = |url: &str, e: &dyn std::fmt::Display| {
            FetchError::InvalidUrl(format!("{url}: {e}"))
        };
        if self.url_template.contains("{ID}") {
            let segment = encode_segment(identifier)
                .ok_or_else(|| invalid(identifier, &"not encodable as a path segment"))?;
            let url = self.url_template.replace("{ID}", &segment);
            return Url::parse(&url).map_err(|e| invalid(&url, &e));
        }
        let mut url =
            Url::parse(&self.url_template).map_err(|e| invalid(&self.url_template, &e))?;
        url.path_segments_mut()
            .map_err(|()| invalid(&self.url_template, &"cannot be a base URL"))?
            .pop_if_empty()
            .push(identifier);
        Ok(url)
    }

    async fn fetch_async(&self, identifier: &str, language: &str) -> Result<Document, FetchError> {
        let url = self.url_for(identifier)?;
        let response = self
            .client
            .get(url)
            .header(ACCEPT_LANGUAGE, language)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        if status.is_success() {
            return Document::parse(body.to_vec()).map_err(|e| FetchError::Malformed {
                message: e.to_string(),
                body: body.to_vec(),
            });
        }

        let error_text = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("Error")?.as_str().map(str::to_string));
        let mut body = String::from_utf8_lossy(&body).into_owned();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        Err(FetchError::Status {
            status: status.as_u16(),
            error_text,
            body,
        })
    }
}

impl Fetch for EntityFactsClient {
    fn fetch(&self, identifier: &str, language: &str) -> Result<Document, FetchError> {
        SHARED_RUNTIME.block_on(self.fetch_async(identifier, language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(error_text: Option<&str>) -> FetchError {
        FetchError::Status {
            status: 404,
            error_text: error_text.map(str::to_string),
            body: String::new(),
        }
    }

    #[test]
    fn url_substitution() {
        let client = EntityFactsClient::new(DEFAULT_URL_TEMPLATE, &HttpConfig::default()).unwrap();
        assert_eq!(
            client.url_for("118540238").unwrap().as_str(),
            "http://hub.culturegraph.org/entityfacts/118540238"
        );
    }

    #[test]
    fn template_without_placeholder_appends_id() {
        let client =
            EntityFactsClient::new("http://localhost:8080/ef/", &HttpConfig::default()).unwrap();
        assert_eq!(
            client.url_for("4005728-8").unwrap().as_str(),
            "http://localhost:8080/ef/4005728-8"
        );
    }

    #[test]
    fn reserved_characters_stay_in_one_segment() {
        let client = EntityFactsClient::new(DEFAULT_URL_TEMPLATE, &HttpConfig::default()).unwrap();
        let url = client.url_for("a/b?c#d e").unwrap();
        assert_eq!(
            url.as_str(),
            "http://hub.culturegraph.org/entityfacts/a%2Fb%3Fc%23d%20e"
        );
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());

        let client =
            EntityFactsClient::new("http://localhost:8080/ef", &HttpConfig::default()).unwrap();
        let url = client.url_for("x/../y?z").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/ef/x%2F..%2Fy%3Fz");
    }

    #[test]
    fn bad_template_is_rejected() {
        let err = EntityFactsClient::new("not a url/{ID}", &HttpConfig::default()).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        assert!(err.is_permanent());
    }

    #[test]
    fn classification() {
        let unsupported = status(Some(
            "GND-ID 4000001-6 is currently not supported by Entity Facts",
        ));
        assert_eq!(unsupported.rejection(), Some(Rejection::NotSupported));
        assert!(!unsupported.is_retryable());

        let missing = status(Some("GND-ID 1 NOT found in database"));
        assert_eq!(missing.rejection(), Some(Rejection::NotFound));
        assert!(missing.is_permanent());

        assert!(status(Some("Internal error")).is_retryable());
        assert!(status(None).is_retryable());
        assert!(FetchError::Connect("refused".into()).is_retryable());
        assert!(FetchError::Malformed {
            message: "eof".into(),
            body: b"{".to_vec()
        }
        .is_retryable());
    }

    #[test]
    fn document_validation() {
        assert!(Document::parse(b"{\"id\":\"1\"}\n".to_vec()).is_ok());
        assert!(Document::parse(b"{\"id\":".to_vec()).is_err());
        assert!(Document::parse(b"<html></html>".to_vec()).is_err());

        let doc = Document::parse(b"  {\"b\":1,\"a\":2}\n".to_vec()).unwrap();
        assert_eq!(doc.as_bytes(), b"{\"b\":1,\"a\":2}");
    }

    #[test]
    fn display() {
        assert_eq!(
            status(Some("GND-ID 1 NOT found in database")).to_string(),
            "HTTP 404: GND-ID 1 NOT found in database"
        );
    }
}
