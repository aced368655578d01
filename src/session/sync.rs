// src/session/sync.rs

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use url::Url;

use crate::{
    client::{exam_endpoint, http_client},
    config::DEFAULT_REQUEST_TIMEOUT_SECS,
    error::SyncError,
    models::session::{RemoteSyncRecord, SessionIdentity},
};

/// Network collaborator that accepts full-state progress records.
///
/// Implementations must treat a repeated record as a no-op upsert.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn push(
        &self,
        identity: &SessionIdentity,
        record: &RemoteSyncRecord,
    ) -> Result<(), SyncError>;
}

/// `PUT /api/exams/{identity}/progress` on the exam server.
#[derive(Debug, Clone)]
pub struct HttpSyncTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpSyncTransport {
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
}

#[async_trait]
impl SyncTransport for HttpSyncTransport {
    async fn push(
        &self,
        identity: &SessionIdentity,
        record: &RemoteSyncRecord,
    ) -> Result<(), SyncError> {
        let url = exam_endpoint(&self.base_url, identity, Some("progress"))
            .ok_or_else(|| SyncError::Network(format!("bad base url {}", self.base_url)))?;

        let response = self.http.put(url).json(record).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Rejected(status.as_u16(), body));
        }
        Ok(())
    }
}

/// Best-effort push of session state for one attempt.
///
/// No acknowledgement tracking, no retry queue: the next interval resends
/// whatever is current by then.
#[derive(Clone)]
pub struct RemoteSync {
    transport: Arc<dyn SyncTransport>,
    identity: SessionIdentity,
}

impl RemoteSync {
    pub fn new(transport: Arc<dyn SyncTransport>, identity: SessionIdentity) -> Self {
        Self {
            transport,
            identity,
        }
    }

    pub async fn send(&self, record: &RemoteSyncRecord) -> Result<(), SyncError> {
        match self.transport.push(&self.identity, record).await {
            Ok(()) => {
                tracing::debug!(
                    "Synced {} ({} answers, {}s left, {})",
                    self.identity,
                    record.answers.len(),
                    record.time_left,
                    record.status
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Sync for {} failed: {}", self.identity, e);
                Err(e)
            }
        }
    }

    /// Fire-and-forget send. Needs a running tokio runtime; without one the
    /// send is skipped.
    pub fn send_detached(&self, record: RemoteSyncRecord) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No runtime for detached sync of {}, skipping", self.identity);
            return;
        };
        let channel = self.clone();
        runtime.spawn(async move {
            let _ = channel.send(&record).await;
        });
    }
}
