//! One-shot history pull.
//!
//! The session asks for history exactly once, right after subscribing. The
//! wire shape is [`HistoryRecord`]; conversion to [`ChatMessage`] happens in
//! the session so every source gets the same display-name rules.
//!
//! [`ChatMessage`]: confer_types::ChatMessage

use async_trait::async_trait;
use confer_types::{HistoryRecord, SessionId};
use reqwest::Url;
use thiserror::Error;
use tracing::debug;

/// Errors fetching history. Always non-fatal to the session.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid history URL: {0}")]
    InvalidUrl(String),
    #[error("history request timed out")]
    Timeout,
    #[error("history unavailable: {0}")]
    Unavailable(String),
}

/// Where past messages of a session come from.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch(&self, session: &SessionId) -> Result<Vec<HistoryRecord>, HistoryError>;
}

// ============================================================================
// HTTP
// ============================================================================

/// `GET {base}/sessions/{session}/messages`, returning a JSON array of
/// [`HistoryRecord`].
#[derive(Clone, Debug)]
pub struct HttpHistory {
    client: reqwest::Client,
    base: Url,
}

impl HttpHistory {
    pub fn new(base: &str) -> Result<Self, HistoryError> {
        let base = Url::parse(base).map_err(|e| HistoryError::InvalidUrl(format!("{base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(HistoryError::InvalidUrl(base.to_string()));
        }
        Ok(Self { client: reqwest::Client::new(), base })
    }

    /// Use a preconfigured client (auth headers, proxies, timeouts).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The request URL for `session`. The id is percent-encoded as a single
    /// path segment.
    pub fn messages_url(&self, session: &SessionId) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["sessions", session.as_str(), "messages"]);
        }
        url
    }
}

#[async_trait]
impl HistorySource for HttpHistory {
    async fn fetch(&self, session: &SessionId) -> Result<Vec<HistoryRecord>, HistoryError> {
        let url = self.messages_url(session);
        debug!(url = %url, "fetching history");
        let records = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<HistoryRecord>>()
            .await?;
        Ok(records)
    }
}

// ============================================================================
// Static
// ============================================================================

/// Fixed history, for tests and offline embedding.
#[derive(Clone, Debug)]
pub struct StaticHistory {
    result: Result<Vec<HistoryRecord>, String>,
}

impl StaticHistory {
    pub fn new(records: Vec<HistoryRecord>) -> Self {
        Self { result: Ok(records) }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// A source whose every fetch fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self { result: Err(reason.into()) }
    }
}

#[async_trait]
impl HistorySource for StaticHistory {
    async fn fetch(&self, _session: &SessionId) -> Result<Vec<HistoryRecord>, HistoryError> {
        self.result.clone().map_err(HistoryError::Unavailable)
    }
}

// ============================================================================
// Tests
// ============================================================================
