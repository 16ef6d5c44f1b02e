//! DetectorClient - HTTP クライアント（SDK）
//!
//! サーバーの 3 つのエンドポイントを core と同じ形の API で呼び出します。
//! 201 / 409 / 404 は結果の値に戻し、それ以外のステータスはエラーです。

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use termination_core::domain::{
    CompletionOutcome, ProcessId, ProcessView, RegistrationOutcome, TaskKey, TerminalState,
};
use thiserror::Error;
use tracing::debug;

use crate::api::{TaskCompletionRequest, TaskRegistration};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("unexpected response {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
}

#[derive(Debug, Clone)]
pub struct DetectorClient {
    http: reqwest::Client,
    base_url: Url,
}

impl DetectorClient {
    /// Client for the server at `base_url` using [`DEFAULT_TIMEOUT`].
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let invalid = |reason: String| ClientError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason,
        };
        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("cannot be a base".to_owned()));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: parsed,
        })
    }

    /// `base_url` extended by `segments`, each percent-encoded as one path
    /// segment, so IDs containing `/`, `?` or `#` stay intact.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "cannot be a base".to_owned(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn task_url(&self, key: &TaskKey, suffix: Option<&str>) -> Result<Url, ClientError> {
        let mut segments = vec![
            "processes",
            key.process_id.as_str(),
            "tasks",
            key.task_id.as_str(),
        ];
        segments.extend(suffix);
        self.endpoint(&segments)
    }

    pub async fn register(
        &self,
        key: &TaskKey,
        expiration_time: DateTime<Utc>,
    ) -> Result<RegistrationOutcome, ClientError> {
        let response = self
            .http
            .put(self.task_url(key, None)?)
            .json(&TaskRegistration { expiration_time })
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => Ok(RegistrationOutcome::Created),
            StatusCode::CONFLICT => Ok(RegistrationOutcome::AlreadyRegistered),
            _ => Err(unexpected(response).await),
        }
    }

    pub async fn complete(
        &self,
        key: &TaskKey,
        state: TerminalState,
        message: Option<String>,
    ) -> Result<CompletionOutcome, ClientError> {
        let body = TaskCompletionRequest {
            state: state.into(),
            error_message: message,
        };
        let response = self
            .http
            .put(self.task_url(key, Some("completion"))?)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => Ok(CompletionOutcome::Completed),
            StatusCode::CONFLICT => Ok(CompletionOutcome::Conflict),
            _ => Err(unexpected(response).await),
        }
    }

    /// `None` when the server answers 404.
    pub async fn get(&self, process_id: &ProcessId) -> Result<Option<ProcessView>, ClientError> {
        let response = self
            .http
            .get(self.endpoint(&["processes", process_id.as_str()])?)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND => {
                debug!(process_id = %process_id, "process not found");
                Ok(None)
            }
            _ => Err(unexpected(response).await),
        }
    }
}

async fn unexpected(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ClientError::UnexpectedStatus { status, body }
}
