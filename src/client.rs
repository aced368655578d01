// src/client.rs

use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

use crate::{
    config::DEFAULT_REQUEST_TIMEOUT_SECS,
    error::FetchError,
    models::{question::QuestionSet, session::SessionIdentity},
};

/// Builds `{base}/api/exams/{identity}[/{suffix}]`, percent-encoding the
/// identity as a single path segment.
pub(crate) fn exam_endpoint(
    base: &Url,
    identity: &SessionIdentity,
    suffix: Option<&str>,
) -> Option<Url> {
    let mut url = base.clone();
    {
        let mut segments = url.path_segments_mut().ok()?;
        segments.pop_if_empty();
        segments.extend(["api", "exams", identity.as_str()]);
        if let Some(suffix) = suffix {
            segments.push(suffix);
        }
    }
    Some(url)
}

/// HTTP client whose every request gives up after `timeout`.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::error!("Failed to build HTTP client, requests will not time out: {}", e);
            reqwest::Client::new()
        })
}

/// Reads exams from the exam server.
#[derive(Debug, Clone)]
pub struct ExamClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ExamClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: http_client(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            base_url,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = http_client(timeout);
        self
    }

    /// Fetches the ordered questions and metadata of an exam.
    ///
    /// * `NotFound` when the server does not know the identity.
    /// * `Transient` for connection failures, timeouts and 5xx answers.
    /// * `Invalid` for any other answer we cannot run an exam from.
    pub async fn fetch_question_set(
        &self,
        identity: &SessionIdentity,
    ) -> Result<QuestionSet, FetchError> {
        let url = exam_endpoint(&self.base_url, identity, None)
            .ok_or_else(|| FetchError::Invalid(format!("bad base url {}", self.base_url)))?;

        let response = self.http.get(url).send().await.map_err(|e| {
            tracing::warn!("Question set fetch for {} failed: {}", identity, e);
            FetchError::Transient(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(identity.to_string()));
        }
        if status.is_server_error() {
            return Err(FetchError::Transient(format!("server answered {}", status)));
        }
        if !status.is_success() {
            return Err(FetchError::Invalid(format!("server answered {}", status)));
        }

        let set: QuestionSet = response
            .json()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Transient(e.to_string())
                } else {
                    FetchError::Invalid(e.to_string())
                }
            })?;

        if !set.is_consistent() {
            return Err(FetchError::Invalid(format!(
                "metadata of {} does not match its questions",
                identity
            )));
        }

        tracing::info!(
            "Loaded exam {} ({} questions, {}s)",
            identity,
            set.question_count,
            set.duration_seconds
        );
        Ok(set)
    }
}
