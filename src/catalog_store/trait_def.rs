//! CatalogStore trait definition.

use super::models::*;
use super::queries::{EntityRankQuery, QueryCancellation, TrackRankQuery};
use anyhow::Result;

/// Vector-capable catalog storage.
///
/// Methods are synchronous; async callers run them on the blocking pool.
/// Ranking methods never mutate the store and abort with an error once the
/// supplied [`QueryCancellation`] is raised.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait CatalogStore: Send + Sync {
    // =========================================================================
    // Entity lookup
    // =========================================================================

    fn get_track(&self, id: &str) -> Result<Option<Track>>;

    fn get_track_embeddings(&self, id: &str) -> Result<Option<TrackEmbeddings>>;

    fn get_advertisement(&self, id: &str) -> Result<Option<Advertisement>>;

    /// Active advertisement ids, sorted.
    fn list_active_advertisement_ids(&self) -> Result<Vec<String>>;

    fn get_counts(&self) -> Result<CatalogCounts>;

    // =========================================================================
    // Listening activity
    // =========================================================================

    /// Appends a play-history row unless the listener already has a row for
    /// the track at or after `dedupe_since`. Returns whether a row was written.
    fn record_play(
        &self,
        listener_id: &str,
        track_id: &str,
        played_at: i64,
        dedupe_since: Option<i64>,
    ) -> Result<bool>;

    fn record_ad_impression(&self, ad_id: &str, listener_id: &str, shown_at: i64) -> Result<()>;

    // =========================================================================
    // Ranking and retrieval
    // =========================================================================

    fn rank_tracks(
        &self,
        query: &TrackRankQuery,
        cancel: &QueryCancellation,
    ) -> Result<Vec<RankedTrack>>;

    fn rank_albums(
        &self,
        query: &EntityRankQuery,
        cancel: &QueryCancellation,
    ) -> Result<Vec<RankedAlbum>>;

    fn rank_artists(
        &self,
        query: &EntityRankQuery,
        cancel: &QueryCancellation,
    ) -> Result<Vec<RankedArtist>>;

    /// Ranks public playlists only.
    fn rank_playlists(
        &self,
        query: &EntityRankQuery,
        cancel: &QueryCancellation,
    ) -> Result<Vec<RankedPlaylist>>;

    /// Entities of `kind` with a meta embedding within `max_distance` of
    /// `vector`, nearest first.
    fn nearest_by_meta(
        &self,
        kind: EntityKind,
        vector: &[f32],
        max_distance: f64,
        page: Page,
        cancel: &QueryCancellation,
    ) -> Result<Vec<SearchHit>>;

    /// Case-insensitive substring match on the entity's name or title.
    fn search_by_text(
        &self,
        kind: EntityKind,
        text: &str,
        page: Page,
        cancel: &QueryCancellation,
    ) -> Result<Vec<SearchHit>>;

    // =========================================================================
    // Embedding worker support
    // =========================================================================

    /// Embeddings of the listener's most recently played distinct tracks,
    /// most recent first.
    fn recent_play_embeddings(&self, listener_id: &str, limit: usize)
        -> Result<Vec<TrackEmbeddings>>;

    /// Embeddings of the listener's most recently liked tracks.
    fn recent_like_embeddings(&self, listener_id: &str, limit: usize)
        -> Result<Vec<TrackEmbeddings>>;

    fn preference_embedding(&self, listener_id: &str) -> Result<Option<Embedding>>;

    /// Text an entity's meta embedding is computed from.
    fn embedding_source_text(&self, target: ReembedTarget, id: &str) -> Result<Option<String>>;

    /// Returns false when the entity does not exist.
    fn set_meta_embedding(&self, target: ReembedTarget, id: &str, embedding: &[f32])
        -> Result<bool>;
}
