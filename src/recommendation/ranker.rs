//! Feed ranking.
//!
//! Every feed turns the listener's taste vectors into a [`ScoreExpr`] and
//! hands it to the store. Missing vectors remove similarity terms (for you
//! needs both vectors or none are used); when nothing personal is left the
//! feed degrades to a fixed cold-start ordering instead of failing.

use super::{run_store_query, RankingWeights, TasteVectorProvider};
use crate::catalog_store::{
    CatalogStore, EmbeddingColumn, EntityRankQuery, Page, PopularitySignal, RankedAlbum,
    RankedArtist, RankedPlaylist, RankedTrack, ScoreExpr, ScoreTerm, TrackFilter, TrackOrder,
    TrackRankQuery,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

pub struct RecommendationRanker {
    store: Arc<dyn CatalogStore>,
    tastes: Arc<TasteVectorProvider>,
    weights: RankingWeights,
}

impl RecommendationRanker {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        tastes: Arc<TasteVectorProvider>,
        weights: RankingWeights,
    ) -> Self {
        Self {
            store,
            tastes,
            weights,
        }
    }

    pub fn weights(&self) -> &RankingWeights {
        &self.weights
    }

    /// Tracks close to the listener's taste, minus their latest plays.
    /// A half-built taste is not trusted: unless both vectors are present the
    /// feed is newest-first.
    pub async fn for_you(&self, listener: Option<&str>, page: Page) -> Result<Vec<RankedTrack>> {
        let taste = self.tastes.resolve(listener).await;
        let w = &self.weights.for_you;

        let score = match (taste.meta_vector(), taste.audio_vector()) {
            (Some(meta), Some(audio)) => ScoreExpr::new()
                .with_similarity(EmbeddingColumn::Meta, Some(meta), w.meta)
                .with_similarity(EmbeddingColumn::Audio, Some(audio), w.audio),
            _ => ScoreExpr::new(),
        };
        let order = personalized_order(&score);
        debug!("for_you: {} score terms, order {:?}", score.terms().len(), order);

        let filter = TrackFilter {
            exclude_recent_plays: listener
                .filter(|_| w.anti_repeat_plays > 0)
                .map(|l| (l.to_string(), w.anti_repeat_plays)),
            ..TrackFilter::default()
        };
        self.rank_tracks(
            "for_you",
            TrackRankQuery {
                score,
                filter,
                order,
                page,
            },
        )
        .await
    }

    /// Acoustic nearest neighbours of the listener's audio taste.
    pub async fn similar_sounding(
        &self,
        listener: Option<&str>,
        page: Page,
    ) -> Result<Vec<RankedTrack>> {
        let taste = self.tastes.resolve(listener).await;
        let query = self.audio_neighbours(taste.audio_vector(), Vec::new(), page);
        self.rank_tracks("similar_sounding", query).await
    }

    /// Acoustic nearest neighbours of a seed track, never including the seed.
    /// `None` when the seed does not exist.
    pub async fn similar_to_track(
        &self,
        track_id: &str,
        page: Page,
    ) -> Result<Option<Vec<RankedTrack>>> {
        let store = self.store.clone();
        let seed_id = track_id.to_string();
        let seed = tokio::task::spawn_blocking(move || store.get_track_embeddings(&seed_id))
            .await
            .context("Seed lookup task panicked")??;
        let Some(seed) = seed else {
            return Ok(None);
        };

        let query = self.audio_neighbours(
            seed.audio.as_deref().filter(|v| !v.is_empty()),
            vec![track_id.to_string()],
            page,
        );
        self.rank_tracks("similar_to_track", query).await.map(Some)
    }

    /// Most played tracks over the trending window; similarity to the
    /// listener only breaks ties between equal play counts.
    pub async fn trending_now(
        &self,
        listener: Option<&str>,
        page: Page,
    ) -> Result<Vec<RankedTrack>> {
        let taste = self.tastes.resolve(listener).await;
        let w = &self.weights.trending;
        let since = now() - w.window_days * SECONDS_PER_DAY;

        let personal = ScoreExpr::new()
            .with_similarity(EmbeddingColumn::Meta, taste.meta_vector(), w.meta)
            .with_similarity(EmbeddingColumn::Audio, taste.audio_vector(), w.audio);
        let popularity_weight = if personal.is_empty() { 1.0 } else { w.popularity };
        let score = personal.with(ScoreTerm::Popularity {
            signal: PopularitySignal::RecentPlays,
            cap: w.popularity_cap,
            weight: popularity_weight,
        });

        self.rank_tracks(
            "trending_now",
            TrackRankQuery {
                score,
                filter: TrackFilter::default(),
                order: TrackOrder::PlayCountSince(since),
                page,
            },
        )
        .await
    }

    /// Tracks by followed artists the listener has not heard recently.
    /// Anonymous listeners follow nobody.
    pub async fn from_followed_artists(
        &self,
        listener: Option<&str>,
        page: Page,
    ) -> Result<Vec<RankedTrack>> {
        let Some(listener_id) = listener else {
            return Ok(Vec::new());
        };
        let taste = self.tastes.resolve(listener).await;
        let w = &self.weights.followed_artists;

        let score = ScoreExpr::new()
            .with_similarity(EmbeddingColumn::Meta, taste.meta_vector(), w.meta)
            .with_similarity(EmbeddingColumn::Audio, taste.audio_vector(), w.audio);
        let order = personalized_order(&score);
        let filter = TrackFilter {
            followed_by: Some(listener_id.to_string()),
            exclude_played_since: Some((
                listener_id.to_string(),
                now() - w.resurface_after_days * SECONDS_PER_DAY,
            )),
            ..TrackFilter::default()
        };
        self.rank_tracks(
            "followed_artists",
            TrackRankQuery {
                score,
                filter,
                order,
                page,
            },
        )
        .await
    }

    pub async fn new_albums(&self, listener: Option<&str>, page: Page) -> Result<Vec<RankedAlbum>> {
        let taste = self.tastes.resolve(listener).await;
        let w = &self.weights.new_albums;
        let score = match taste.meta_vector() {
            Some(meta) => ScoreExpr::new().with_similarity(EmbeddingColumn::Meta, Some(meta), w.meta),
            None => ScoreExpr::constant(w.cold_start),
        };

        let store = self.store.clone();
        let query = EntityRankQuery { score, page };
        run_store_query("new_albums", move |cancel| store.rank_albums(&query, cancel)).await
    }

    pub async fn featured_artists(
        &self,
        listener: Option<&str>,
        page: Page,
    ) -> Result<Vec<RankedArtist>> {
        let taste = self.tastes.resolve(listener).await;
        let w = &self.weights.featured_artists;
        let score = meta_or_flat(taste.meta_vector(), w.meta).with(ScoreTerm::Popularity {
            signal: PopularitySignal::Followers,
            cap: w.followers_cap,
            weight: w.followers,
        });

        let store = self.store.clone();
        let query = EntityRankQuery { score, page };
        run_store_query("featured_artists", move |cancel| {
            store.rank_artists(&query, cancel)
        })
        .await
    }

    /// Public playlists ranked by engagement with their tracks, nudged by
    /// similarity to the listener.
    pub async fn popular_playlists(
        &self,
        listener: Option<&str>,
        page: Page,
    ) -> Result<Vec<RankedPlaylist>> {
        let taste = self.tastes.resolve(listener).await;
        let w = &self.weights.popular_playlists;
        let score = meta_or_flat(taste.meta_vector(), w.meta)
            .with(ScoreTerm::Popularity {
                signal: PopularitySignal::MemberLikes,
                cap: w.popularity_cap,
                weight: w.likes,
            })
            .with(ScoreTerm::Popularity {
                signal: PopularitySignal::MemberPlays,
                cap: w.popularity_cap,
                weight: w.plays,
            });

        let store = self.store.clone();
        let query = EntityRankQuery { score, page };
        run_store_query("popular_playlists", move |cancel| {
            store.rank_playlists(&query, cancel)
        })
        .await
    }

    fn audio_neighbours(
        &self,
        audio: Option<&[f32]>,
        exclude_ids: Vec<String>,
        page: Page,
    ) -> TrackRankQuery {
        match audio {
            Some(audio) => TrackRankQuery {
                score: ScoreExpr::new().with_similarity(EmbeddingColumn::Audio, Some(audio), 1.0),
                filter: TrackFilter {
                    exclude_ids,
                    audio_within: Some((audio.to_vec(), self.weights.similar_sounding.max_distance)),
                    ..TrackFilter::default()
                },
                order: TrackOrder::Score,
                page,
            },
            None => TrackRankQuery {
                score: ScoreExpr::new(),
                filter: TrackFilter {
                    exclude_ids,
                    ..TrackFilter::default()
                },
                order: TrackOrder::Newest,
                page,
            },
        }
    }

    async fn rank_tracks(&self, label: &'static str, query: TrackRankQuery) -> Result<Vec<RankedTrack>> {
        let store = self.store.clone();
        run_store_query(label, move |cancel| store.rank_tracks(&query, cancel)).await
    }
}

/// Newest-first when nothing personal is left to score by.
fn personalized_order(score: &ScoreExpr) -> TrackOrder {
    if score.is_empty() {
        TrackOrder::Newest
    } else {
        TrackOrder::Score
    }
}

/// Meta similarity, or its full weight as a flat score for cold start.
fn meta_or_flat(meta: Option<&[f32]>, weight: f64) -> ScoreExpr {
    match meta {
        Some(meta) => ScoreExpr::new().with_similarity(EmbeddingColumn::Meta, Some(meta), weight),
        None => ScoreExpr::constant(weight),
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::catalog_store::test_support::TestCatalog;
    use crate::jobs::{
        EnqueueError, JobData, JobOutcome, JobQueue, JobRequest, JobTicket, TasteVectors,
    };
    use crate::recommendation::{DEFAULT_GENERATION_TIMEOUT, DEFAULT_TASTE_VECTOR_TTL};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tokio::sync::oneshot;
    use uuid::Uuid;

    /// Answers every taste request with the same vectors.
    struct FixedTasteQueue(TasteVectors);

    #[async_trait]
    impl JobQueue for FixedTasteQueue {
        async fn enqueue(&self, request: JobRequest) -> Result<JobTicket, EnqueueError> {
            let (tx, rx) = oneshot::channel();
            let job_type = request.job_type();
            let _ = tx.send(JobOutcome::done(JobData::Taste(self.0.clone())));
            Ok(JobTicket::new(Uuid::new_v4(), job_type, rx))
        }
    }

    fn ranker_with(catalog: &TestCatalog, taste: TasteVectors) -> RecommendationRanker {
        let tastes = TasteVectorProvider::new(
            Arc::new(InMemoryCache::new()),
            Arc::new(FixedTasteQueue(taste)),
            DEFAULT_TASTE_VECTOR_TTL,
            DEFAULT_GENERATION_TIMEOUT,
        );
        RecommendationRanker::new(
            catalog.store.clone(),
            Arc::new(tastes),
            RankingWeights::default(),
        )
    }

    fn taste(meta: &[f32], audio: &[f32]) -> TasteVectors {
        TasteVectors {
            meta: Some(meta.to_vec()),
            audio: Some(audio.to_vec()),
        }
    }

    fn ids(tracks: &[RankedTrack]) -> Vec<&str> {
        tracks.iter().map(|t| t.track.id.as_str()).collect()
    }

    fn page(page: usize, limit: usize) -> Page {
        Page::new(page, limit).unwrap()
    }

    fn seeded() -> TestCatalog {
        let catalog = TestCatalog::new();
        catalog.artist("a1");
        catalog.artist("a2");
        catalog.track("t1", "a1", 100, Some(&[1.0, 0.0]), Some(&[0.0, 1.0]));
        catalog.track("t2", "a1", 200, Some(&[0.6, 0.8]), Some(&[0.8, 0.6]));
        catalog.track("t3", "a2", 300, Some(&[0.0, 1.0]), Some(&[1.0, 0.0]));
        catalog.track("t4", "a2", 400, None, None);
        catalog.track("t5", "a2", 500, Some(&[0.8, 0.6]), None);
        catalog.track("t6", "a1", 600, Some(&[0.3, 0.9]), Some(&[0.2, 0.9]));
        catalog
    }

    #[tokio::test]
    async fn cold_start_is_newest_first() {
        let catalog = seeded();
        let ranker = ranker_with(&catalog, TasteVectors::empty());

        let anonymous = ranker.for_you(None, page(1, 10)).await.unwrap();
        assert_eq!(ids(&anonymous), vec!["t6", "t5", "t4", "t3", "t2", "t1"]);

        let cold_listener = ranker.for_you(Some("u1"), page(1, 10)).await.unwrap();
        assert_eq!(ids(&cold_listener), ids(&anonymous));
    }

    #[tokio::test]
    async fn for_you_with_one_taste_vector_is_newest_first() {
        let catalog = seeded();
        let newest = vec!["t6", "t5", "t4", "t3", "t2", "t1"];

        let meta_only = TasteVectors {
            meta: Some(vec![1.0, 0.0]),
            audio: None,
        };
        let audio_only = TasteVectors {
            meta: None,
            audio: Some(vec![0.0, 1.0]),
        };
        let empty_audio = TasteVectors {
            meta: Some(vec![1.0, 0.0]),
            audio: Some(Vec::new()),
        };
        for taste in [meta_only, audio_only, empty_audio] {
            let ranker = ranker_with(&catalog, taste.clone());
            let tracks = ranker.for_you(Some("u1"), page(1, 10)).await.unwrap();
            assert_eq!(ids(&tracks), newest, "{:?}", taste);
            assert!(tracks.iter().all(|t| t.score == 0.0));
        }
    }

    #[tokio::test]
    async fn identical_embedding_scores_one_and_ranks_first() {
        let catalog = seeded();
        let ranker = ranker_with(&catalog, taste(&[1.0, 0.0], &[0.0, 1.0]));

        let tracks = ranker.for_you(Some("u1"), page(1, 10)).await.unwrap();
        assert_eq!(tracks[0].track.id, "t1");
        assert!((tracks[0].score - 1.0).abs() < 1e-9);
        // Tracks without embeddings are kept with a zero contribution.
        let bare = tracks.iter().find(|t| t.track.id == "t4").unwrap();
        assert_eq!(bare.score, 0.0);
        assert_eq!(tracks.len(), 6);
    }

    #[tokio::test]
    async fn for_you_never_returns_the_three_latest_plays() {
        let catalog = seeded();
        catalog.play("u1", "t1", 1_000);
        catalog.play("u1", "t2", 2_000);
        catalog.play("u1", "t3", 3_000);
        catalog.play("u1", "t6", 4_000);

        for taste in [TasteVectors::empty(), taste(&[1.0, 0.0], &[0.0, 1.0])] {
            let ranker = ranker_with(&catalog, taste);
            let tracks = ranker.for_you(Some("u1"), page(1, 10)).await.unwrap();
            let ids = ids(&tracks);
            assert!(!ids.contains(&"t2"));
            assert!(!ids.contains(&"t3"));
            assert!(!ids.contains(&"t6"));
            assert!(ids.contains(&"t1"));
        }
    }

    #[tokio::test]
    async fn pages_are_disjoint() {
        let catalog = seeded();
        for taste in [TasteVectors::empty(), taste(&[0.7, 0.7], &[0.5, 0.5])] {
            let ranker = ranker_with(&catalog, taste);
            let mut seen = HashSet::new();
            for n in 1..=3 {
                let tracks = ranker.for_you(Some("u9"), page(n, 2)).await.unwrap();
                assert_eq!(tracks.len(), 2);
                for track in tracks {
                    assert!(seen.insert(track.track.id));
                }
            }
            let trending_1 = ranker.trending_now(None, page(1, 3)).await.unwrap();
            let trending_2 = ranker.trending_now(None, page(2, 3)).await.unwrap();
            for t in &trending_2 {
                assert!(!trending_1.iter().any(|o| o.track.id == t.track.id));
            }
        }
    }

    #[tokio::test]
    async fn trending_orders_by_recent_play_count() {
        let catalog = seeded();
        let recent = now() - SECONDS_PER_DAY;
        let stale = now() - 20 * SECONDS_PER_DAY;
        for user in ["u1", "u2", "u3"] {
            catalog.play(user, "t2", recent);
        }
        catalog.play("u1", "t5", recent);
        for user in ["u1", "u2", "u3", "u4", "u5"] {
            catalog.play(user, "t1", stale);
        }

        let ranker = ranker_with(&catalog, TasteVectors::empty());
        let tracks = ranker.trending_now(None, page(1, 10)).await.unwrap();
        assert_eq!(&ids(&tracks)[..2], &["t2", "t5"]);
        assert_eq!(tracks[0].play_count, Some(3));
        assert!(tracks[0].score > tracks[1].score);
        assert_eq!(tracks.len(), 6);

        // Vectors only break ties between equal counts.
        let ranker = ranker_with(&catalog, taste(&[1.0, 0.0], &[0.0, 1.0]));
        let tracks = ranker.trending_now(Some("u1"), page(1, 10)).await.unwrap();
        assert_eq!(&ids(&tracks)[..3], &["t2", "t5", "t1"]);
    }

    #[tokio::test]
    async fn followed_artists_resurface_after_window() {
        let catalog = seeded();
        catalog.follow("u1", "a1");
        catalog.play("u1", "t1", now() - 40 * SECONDS_PER_DAY);
        catalog.play("u1", "t2", now() - 10 * SECONDS_PER_DAY);

        let ranker = ranker_with(&catalog, TasteVectors::empty());
        let tracks = ranker
            .from_followed_artists(Some("u1"), page(1, 10))
            .await
            .unwrap();
        assert_eq!(ids(&tracks), vec!["t6", "t1"]);

        assert!(ranker
            .from_followed_artists(None, page(1, 10))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn similar_sounding_is_audio_only_and_bounded() {
        let catalog = seeded();
        let ranker = ranker_with(&catalog, taste(&[1.0, 0.0], &[0.0, 1.0]));

        let tracks = ranker.similar_sounding(Some("u1"), page(1, 10)).await.unwrap();
        // t1 is identical and t6 is within 0.2 of the taste.
        assert_eq!(ids(&tracks), vec!["t1", "t6"]);

        let cold = ranker_with(&catalog, TasteVectors::empty());
        let tracks = cold.similar_sounding(Some("u1"), page(1, 2)).await.unwrap();
        assert_eq!(ids(&tracks), vec!["t6", "t5"]);
    }

    #[tokio::test]
    async fn similar_to_track_excludes_seed() {
        let catalog = seeded();
        let ranker = ranker_with(&catalog, TasteVectors::empty());

        let tracks = ranker
            .similar_to_track("t1", page(1, 10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids(&tracks), vec!["t6"]);

        assert!(ranker
            .similar_to_track("missing", page(1, 10))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn new_albums_cold_start_is_newest_with_flat_score() {
        let catalog = seeded();
        catalog.album("al1", "a1", 100, Some(&[1.0, 0.0]));
        catalog.album("al2", "a2", 200, None);

        let ranker = ranker_with(&catalog, TasteVectors::empty());
        let albums = ranker.new_albums(None, page(1, 10)).await.unwrap();
        let ids: Vec<_> = albums.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["al2", "al1"]);
        assert!(albums.iter().all(|a| a.score == 1.0));

        let ranker = ranker_with(&catalog, taste(&[1.0, 0.0], &[0.0, 1.0]));
        let albums = ranker.new_albums(Some("u1"), page(1, 10)).await.unwrap();
        assert_eq!(albums[0].id, "al1");
    }

    #[tokio::test]
    async fn featured_artists_cold_start_favours_followers() {
        let catalog = seeded();
        catalog.follow("u1", "a2");
        catalog.follow("u2", "a2");

        let ranker = ranker_with(&catalog, TasteVectors::empty());
        let artists = ranker.featured_artists(None, page(1, 10)).await.unwrap();
        assert_eq!(artists[0].id, "a2");
        assert_eq!(artists[0].follower_count, 2);
        assert_eq!(artists.len(), 2);
    }

    #[tokio::test]
    async fn popular_playlists_rank_by_engagement() {
        let catalog = seeded();
        catalog.playlist("p1", "owner", true, None);
        catalog.playlist("p2", "owner", true, None);
        catalog.playlist("hidden", "owner", false, None);
        catalog.playlist_item("p1", "t1", 0);
        catalog.playlist_item("p2", "t2", 0);
        catalog.playlist_item("hidden", "t2", 0);
        for user in ["u1", "u2", "u3"] {
            catalog.like(user, "t2", 100);
        }
        catalog.play("u1", "t1", 100);

        let ranker = ranker_with(&catalog, TasteVectors::empty());
        let playlists = ranker.popular_playlists(None, page(1, 10)).await.unwrap();
        let ids: Vec<_> = playlists.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }
}
