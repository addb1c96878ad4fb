//! Play-history recording for stream requests.

use crate::catalog_store::CatalogStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Configured name of a recording policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayRecordingMode {
    FirstPlayOnly,
    EveryRequest,
    #[default]
    OncePerWindow,
}

/// When a stream request adds a play-history row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayRecordingPolicy {
    /// One row per (listener, track), ever.
    FirstPlayOnly,
    /// One row per manifest request, including player re-fetches.
    EveryRequest,
    /// At most one row per (listener, track) within `secs`.
    OncePerWindow { secs: i64 },
}

impl PlayRecordingPolicy {
    pub fn from_mode(mode: PlayRecordingMode, window_secs: u64) -> Self {
        match mode {
            PlayRecordingMode::FirstPlayOnly => PlayRecordingPolicy::FirstPlayOnly,
            PlayRecordingMode::EveryRequest => PlayRecordingPolicy::EveryRequest,
            PlayRecordingMode::OncePerWindow => PlayRecordingPolicy::OncePerWindow {
                secs: i64::try_from(window_secs).unwrap_or(i64::MAX),
            },
        }
    }

    /// Existing rows at or after this timestamp suppress a new one. `None`
    /// means always insert.
    pub fn dedupe_since(&self, now: i64) -> Option<i64> {
        match self {
            PlayRecordingPolicy::FirstPlayOnly => Some(i64::MIN),
            PlayRecordingPolicy::EveryRequest => None,
            PlayRecordingPolicy::OncePerWindow { secs } => Some(now.saturating_sub(*secs)),
        }
    }
}

impl Default for PlayRecordingPolicy {
    fn default() -> Self {
        PlayRecordingPolicy::OncePerWindow { secs: 1800 }
    }
}

/// Fire-and-forget writer of play-history rows.
pub struct PlayRecorder {
    store: Arc<dyn CatalogStore>,
    policy: PlayRecordingPolicy,
}

impl PlayRecorder {
    pub fn new(store: Arc<dyn CatalogStore>, policy: PlayRecordingPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> PlayRecordingPolicy {
        self.policy
    }

    /// Spawns the write and returns immediately. Failures are logged only.
    pub fn record(&self, listener_id: &str, track_id: &str, now: i64) -> JoinHandle<()> {
        let store = self.store.clone();
        let listener_id = listener_id.to_string();
        let track_id = track_id.to_string();
        let dedupe_since = self.policy.dedupe_since(now);
        tokio::task::spawn_blocking(move || {
            match store.record_play(&listener_id, &track_id, now, dedupe_since) {
                Ok(true) => debug!("Recorded play of {} by {}", track_id, listener_id),
                Ok(false) => debug!("Play of {} by {} already recorded", track_id, listener_id),
                Err(err) => warn!(
                    "Failed to record play of {} by {}: {}",
                    track_id, listener_id, err
                ),
            }
        })
    }
}
