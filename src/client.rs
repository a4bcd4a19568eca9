use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    message: Option<String>,
}

// ── Results ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    /// The backend replied successfully but without a usable answer
    Empty,
}

impl Answer {
    /// Classify a successful `/chat` body. A body that is not JSON at all is
    /// an error; valid JSON without a non-blank string under `answer` counts
    /// as "no answer".
    fn from_body(body: &[u8]) -> Result<Self, AskError> {
        let parsed: Value =
            serde_json::from_slice(body).map_err(|e| AskError::Malformed(e.to_string()))?;
        Ok(match parsed.get("answer") {
            Some(Value::String(s)) if !s.trim().is_empty() => Answer::Text(s.clone()),
            _ => Answer::Empty,
        })
    }
}

#[derive(Debug, Error)]
pub enum AskError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response body: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for AskError {
    fn from(e: reqwest::Error) -> Self {
        AskError::Transport(e.to_string())
    }
}

// ── Service seam ──────────────────────────────────────────────────────────────

/// The remote question-answering operation. The session controller only ever
/// talks to this trait, so tests can script replies without a network.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn ask(&self, query: &str) -> Result<Answer, AskError>;
}

/// Run `service.ask` under a hard time limit.
pub async fn ask_bounded(
    service: &dyn AnswerService,
    query: &str,
    limit: Duration,
) -> Result<Answer, AskError> {
    match tokio::time::timeout(limit, service.ask(query)).await {
        Ok(result) => result,
        Err(_) => Err(AskError::Timeout(limit)),
    }
}

// ── HTTP client ───────────────────────────────────────────────────────────────

pub struct HttpAnswerClient {
    http: reqwest::Client,
    pub endpoint: String,
    timeout: Duration,
}

impl HttpAnswerClient {
    pub fn new(endpoint: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sitechat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, endpoint, timeout })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint.trim_end_matches('/'))
    }

    /// Probe the backend's root route. Returns its status message.
    pub async fn ping(&self) -> Result<String, AskError> {
        let resp = self
            .http
            .get(self.url("/"))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AskError::Status { status, body });
        }

        let body = resp.bytes().await.map_err(|e| self.classify(e))?;
        let message = serde_json::from_slice::<HealthResponse>(&body)
            .ok()
            .and_then(|h| h.message)
            .unwrap_or_else(|| String::from_utf8_lossy(&body).trim().to_string());
        Ok(message)
    }

    fn classify(&self, e: reqwest::Error) -> AskError {
        if e.is_timeout() {
            AskError::Timeout(self.timeout)
        } else {
            AskError::from(e)
        }
    }
}

#[async_trait]
impl AnswerService for HttpAnswerClient {
    async fn ask(&self, query: &str) -> Result<Answer, AskError> {
        let body = AskRequest { query: query.to_string() };

        let resp = self
            .http
            .post(self.url("/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(AskError::Status { status, body: text });
        }

        let bytes = resp.bytes().await.map_err(|e| self.classify(e))?;
        Answer::from_body(&bytes)
    }
}
