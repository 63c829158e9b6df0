//! HTTP lexicon client.
//!
//! `GET {endpoint}/{language}/{term}?apiKey={key}`; the term is sent as a
//! single percent-encoded path segment.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::{is_routable, LexiconClient, LexiconError, Lookup, SimilarityPayload};

pub const DEFAULT_ENDPOINT: &str = "https://api.gavagai.se/v3/lexicon";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Clone)]
pub struct LexiconConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl LexiconConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            timeout_secs: 30,
            user_agent: concat!("lexigraph/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// The API key never ends up in logs.
impl fmt::Debug for LexiconConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LexiconConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct HttpLexiconClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl HttpLexiconClient {
    pub fn new(config: LexiconConfig) -> Result<Self, LexiconError> {
        if config.api_key.trim().is_empty() {
            return Err(LexiconError::Config("API key must not be empty".to_string()));
        }

        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| LexiconError::Config(format!("invalid endpoint {}: {e}", config.endpoint)))?;
        if endpoint.cannot_be_a_base() {
            return Err(LexiconError::Config(format!(
                "endpoint cannot be used as a base url: {}",
                config.endpoint
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("lexigraph")),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LexiconError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
        })
    }

    /// Build the request URL for a lookup.
    pub fn lookup_url(&self, term: &str, language: &str) -> Result<Url, LexiconError> {
        if !is_routable(term) {
            return Err(LexiconError::Unroutable(term.to_string()));
        }

        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| LexiconError::Config("endpoint cannot carry path segments".to_string()))?
            .pop_if_empty()
            .push(language)
            .push(term);
        url.query_pairs_mut().append_pair("apiKey", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl LexiconClient for HttpLexiconClient {
    async fn lookup(&self, term: &str, language: &str) -> Result<Lookup, LexiconError> {
        let url = self.lookup_url(term, language)?;
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LexiconError::Network(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                tracing::debug!(term, language, "lexicon has no entry for term");
                return Ok(Lookup::Empty);
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(LexiconError::Unauthorized {
                    status: status.as_u16(),
                });
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(term, status = status.as_u16(), body = %body, "lexicon lookup failed");
                return Err(LexiconError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LexiconError::Network(e.to_string()))?;
        let payload = SimilarityPayload::from_slice(&bytes)?;

        tracing::debug!(
            term,
            language,
            words = payload.word_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "lexicon lookup complete"
        );

        Ok(Lookup::from_payload(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> HttpLexiconClient {
        HttpLexiconClient::new(LexiconConfig::new("secret").with_endpoint(endpoint)).unwrap()
    }

    #[test]
    fn lookup_url_encodes_term_as_one_segment() {
        let url = client(DEFAULT_ENDPOINT)
            .lookup_url("mc donalds", "sv")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.gavagai.se/v3/lexicon/sv/mc%20donalds?apiKey=secret"
        );
    }

    #[test]
    fn lookup_url_tolerates_trailing_slash() {
        let url = client("http://localhost:8080/lexicon/")
            .lookup_url("h&m", "sv")
            .unwrap();
        assert_eq!(url.path(), "/lexicon/sv/h&m");
        assert_eq!(url.query(), Some("apiKey=secret"));
    }

    #[test]
    fn lookup_url_rejects_slash() {
        let err = client(DEFAULT_ENDPOINT)
            .lookup_url("sir/madam", "en")
            .unwrap_err();
        assert!(matches!(err, LexiconError::Unroutable(_)));
    }

    #[test]
    fn empty_api_key_is_a_config_error() {
        let err = HttpLexiconClient::new(LexiconConfig::default()).err().unwrap();
        assert!(matches!(err, LexiconError::Config(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let rendered = format!("{:?}", LexiconConfig::new("top-secret"));
        assert!(!rendered.contains("top-secret"));
    }

    #[tokio::test]
    async fn unroutable_term_never_reaches_the_network() {
        // Port 9 (discard) would fail with a network error if contacted.
        let client = client("http://127.0.0.1:9/lexicon");
        let err = client.lookup("a/b", "en").await.unwrap_err();
        assert!(matches!(err, LexiconError::Unroutable(_)));
    }
}
