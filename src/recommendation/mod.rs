//! Personalized feeds and semantic search over the catalog store.

mod ranker;
mod semantic_search;
mod taste_vectors;
mod weights;

pub use ranker::RecommendationRanker;
pub use semantic_search::{SearchMode, SearchResults, SearchSettings, SemanticSearch};
pub use taste_vectors::{
    TasteVectorProvider, DEFAULT_GENERATION_TIMEOUT, DEFAULT_TASTE_VECTOR_TTL,
};
pub use weights::{
    FeaturedArtistsWeights, FollowedArtistsWeights, ForYouWeights, NewAlbumsWeights,
    PopularPlaylistsWeights, RankingWeights, SimilarSoundingWeights, TrendingWeights,
};

use crate::catalog_store::QueryCancellation;
use crate::server::metrics;
use anyhow::{Context, Result};
use std::time::Instant;

/// Runs a store query on the blocking pool. If the calling future is dropped
/// (client went away) the query is interrupted through its cancellation flag.
pub(crate) async fn run_store_query<T, F>(label: &'static str, query: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&QueryCancellation) -> Result<T> + Send + 'static,
{
    let cancellation = QueryCancellation::new();
    let guard = cancellation.cancel_on_drop();
    let started = Instant::now();

    let result = tokio::task::spawn_blocking(move || query(&cancellation))
        .await
        .with_context(|| format!("{} query task panicked", label));

    guard.disarm();
    metrics::record_ranking_query(label, started.elapsed());
    result?
}
