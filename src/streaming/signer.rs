//! Client for the media service that mints signed segment URLs.

use super::RetryPolicy;
use crate::server::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// One playable segment. Serialized as a bare URL string when the signer
/// did not report a duration, matching the media service's own format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignedSegment {
    Url(String),
    Timed { url: String, duration: f64 },
}

impl SignedSegment {
    pub fn url(&self) -> &str {
        match self {
            SignedSegment::Url(url) => url,
            SignedSegment::Timed { url, .. } => url,
        }
    }

    /// Duration reported by the signer, if it is usable.
    pub fn duration_secs(&self) -> Option<f64> {
        match self {
            SignedSegment::Url(_) => None,
            SignedSegment::Timed { duration, .. } => {
                Some(*duration).filter(|d| d.is_finite() && *d > 0.0)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    Music,
    Ad,
}

impl SegmentKind {
    pub fn is_ad(&self) -> bool {
        matches!(self, SegmentKind::Ad)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("signing service unreachable: {0}")]
    Transport(String),
    #[error("signing service returned status {0}")]
    Status(u16),
    #[error("unreadable signing service response: {0}")]
    Decode(String),
}

impl SignerError {
    /// Client errors are terminal; everything else may be transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            SignerError::Transport(_) => true,
            SignerError::Status(status) => *status >= 500 || *status == 429,
            SignerError::Decode(_) => false,
        }
    }
}

#[async_trait]
pub trait SegmentSigner: Send + Sync {
    /// Signed segment list for `audio_id`, in playback order, valid for
    /// `expiry`.
    async fn sign(
        &self,
        audio_id: &str,
        kind: SegmentKind,
        expiry: Duration,
    ) -> Result<Vec<SignedSegment>, SignerError>;
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(default)]
    data: Option<Vec<SignedSegment>>,
}

pub struct HttpSegmentSigner {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpSegmentSigner {
    /// # Arguments
    /// * `base_url` - Base URL of the media service (e.g., "http://localhost:8000")
    /// * `timeout` - Per-attempt request timeout
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("Failed to create HTTP client: {}", err))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    async fn attempt(
        &self,
        audio_id: &str,
        kind: SegmentKind,
        expiry: Duration,
    ) -> Result<Vec<SignedSegment>, SignerError> {
        let url = format!("{}/signed_url", self.base_url);
        let expiration = expiry.as_secs().to_string();
        let is_add = kind.is_ad().to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("audio_id", audio_id),
                ("is_add", is_add.as_str()),
                ("expiration", expiration.as_str()),
            ])
            .send()
            .await
            .map_err(|err| SignerError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignerError::Status(status.as_u16()));
        }

        let body: SignedUrlResponse = response
            .json()
            .await
            .map_err(|err| SignerError::Decode(err.to_string()))?;
        Ok(body.data.unwrap_or_default())
    }
}

#[async_trait]
impl SegmentSigner for HttpSegmentSigner {
    async fn sign(
        &self,
        audio_id: &str,
        kind: SegmentKind,
        expiry: Duration,
    ) -> Result<Vec<SignedSegment>, SignerError> {
        let mut attempt = 1;
        loop {
            match self.attempt(audio_id, kind, expiry).await {
                Ok(segments) => {
                    debug!("Signed {} segments for {}", segments.len(), audio_id);
                    metrics::record_signer_request("ok");
                    return Ok(segments);
                }
                Err(err) if self.retry.should_retry(&err, attempt) => {
                    let backoff = self.retry.jittered_backoff(attempt - 1);
                    warn!(
                        "Signing {} failed (attempt {}/{}), retrying in {:?}: {}",
                        audio_id, attempt, self.retry.max_attempts, backoff, err
                    );
                    metrics::record_signer_request("retry");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    metrics::record_signer_request("error");
                    return Err(err);
                }
            }
        }
    }
}
