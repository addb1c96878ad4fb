//! Ranking query descriptions handed to the store.

use super::models::{Embedding, Page};
use super::scoring::ScoreExpr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Candidate restrictions for track ranking. All filters are conjunctive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackFilter {
    /// Drop the tracks in this listener's `n` most recent play-history rows.
    pub exclude_recent_plays: Option<(String, usize)>,
    /// Drop tracks this listener played at or after the given unix time.
    pub exclude_played_since: Option<(String, i64)>,
    /// Keep only tracks by artists this listener follows.
    pub followed_by: Option<String>,
    pub exclude_ids: Vec<String>,
    /// Keep only tracks whose audio embedding is strictly closer than the
    /// given cosine distance to the vector.
    pub audio_within: Option<(Embedding, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackOrder {
    /// `score DESC`, then newest first.
    Score,
    /// `created_at DESC`, ignoring the score.
    Newest,
    /// Raw play count since the unix time, then score. The count is exposed to
    /// the score as `PopularitySignal::RecentPlays`.
    PlayCountSince(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackRankQuery {
    pub score: ScoreExpr,
    pub filter: TrackFilter,
    pub order: TrackOrder,
    pub page: Page,
}

/// Ranking over albums, artists or public playlists. Results are ordered by
/// score, ties broken by follower count (artists), then newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRankQuery {
    pub score: ScoreExpr,
    pub page: Page,
}

/// Returned by ranking methods whose [`QueryCancellation`] was raised.
#[derive(Debug, thiserror::Error)]
#[error("query cancelled")]
pub struct QueryCancelled;

/// Cooperative cancellation for a running store query. Cloned into the
/// request that owns the query; the SQLite progress handler polls it.
#[derive(Debug, Clone, Default)]
pub struct QueryCancellation {
    cancelled: Arc<AtomicBool>,
}

impl QueryCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Returns a guard that cancels the query when dropped, unless disarmed.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop {
            cancellation: Some(self.clone()),
        }
    }
}

pub struct CancelOnDrop {
    cancellation: Option<QueryCancellation>,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.cancellation = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(cancellation) = self.cancellation.take() {
            cancellation.cancel();
        }
    }
}
