//! Tunable blend weights for every feed.
//!
//! Loaded from the `[ranking.*]` TOML sections; anything not given keeps its
//! default.

use anyhow::{bail, Result};
use serde::Deserialize;

/// Tolerance when checking that a feed's weights sum to at most one.
const WEIGHT_SUM_EPSILON: f64 = 1e-9;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForYouWeights {
    pub meta: f64,
    pub audio: f64,
    /// How many of the listener's latest plays are never recommended back.
    pub anti_repeat_plays: usize,
}

impl Default for ForYouWeights {
    fn default() -> Self {
        Self {
            meta: 0.8,
            audio: 0.2,
            anti_repeat_plays: 3,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimilarSoundingWeights {
    /// Strict upper bound on audio cosine distance.
    pub max_distance: f64,
}

impl Default for SimilarSoundingWeights {
    fn default() -> Self {
        Self { max_distance: 0.2 }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrendingWeights {
    pub meta: f64,
    pub audio: f64,
    pub popularity: f64,
    pub popularity_cap: f64,
    pub window_days: i64,
}

impl Default for TrendingWeights {
    fn default() -> Self {
        Self {
            meta: 0.4,
            audio: 0.4,
            popularity: 0.2,
            popularity_cap: 5.0,
            window_days: 15,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FollowedArtistsWeights {
    pub meta: f64,
    pub audio: f64,
    /// Tracks played within this many days are left out.
    pub resurface_after_days: i64,
}

impl Default for FollowedArtistsWeights {
    fn default() -> Self {
        Self {
            meta: 0.6,
            audio: 0.4,
            resurface_after_days: 30,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewAlbumsWeights {
    pub meta: f64,
    /// Flat score every album gets when the listener has no meta vector.
    pub cold_start: f64,
}

impl Default for NewAlbumsWeights {
    fn default() -> Self {
        Self {
            meta: 1.0,
            cold_start: 1.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeaturedArtistsWeights {
    pub meta: f64,
    pub followers: f64,
    pub followers_cap: f64,
}

impl Default for FeaturedArtistsWeights {
    fn default() -> Self {
        Self {
            meta: 0.8,
            followers: 0.2,
            followers_cap: 5.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PopularPlaylistsWeights {
    pub likes: f64,
    pub plays: f64,
    pub meta: f64,
    pub popularity_cap: f64,
}

impl Default for PopularPlaylistsWeights {
    fn default() -> Self {
        Self {
            likes: 0.5,
            plays: 0.3,
            meta: 0.2,
            popularity_cap: 5.0,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingWeights {
    pub for_you: ForYouWeights,
    pub similar_sounding: SimilarSoundingWeights,
    pub trending: TrendingWeights,
    pub followed_artists: FollowedArtistsWeights,
    pub new_albums: NewAlbumsWeights,
    pub featured_artists: FeaturedArtistsWeights,
    pub popular_playlists: PopularPlaylistsWeights,
}

impl RankingWeights {
    pub fn validate(&self) -> Result<()> {
        check_blend("for_you", &[self.for_you.meta, self.for_you.audio])?;
        check_blend(
            "trending",
            &[self.trending.meta, self.trending.audio, self.trending.popularity],
        )?;
        check_blend(
            "followed_artists",
            &[self.followed_artists.meta, self.followed_artists.audio],
        )?;
        // Blend and cold start are alternatives, never summed.
        check_blend("new_albums", &[self.new_albums.meta])?;
        check_blend("new_albums", &[self.new_albums.cold_start])?;
        check_blend(
            "featured_artists",
            &[self.featured_artists.meta, self.featured_artists.followers],
        )?;
        check_blend(
            "popular_playlists",
            &[
                self.popular_playlists.likes,
                self.popular_playlists.plays,
                self.popular_playlists.meta,
            ],
        )?;

        let distance = self.similar_sounding.max_distance;
        if !(distance > 0.0 && distance <= 2.0) {
            bail!(
                "ranking.similar_sounding.max_distance must be in (0, 2], got {}",
                distance
            );
        }
        for (name, cap) in [
            ("trending.popularity_cap", self.trending.popularity_cap),
            ("featured_artists.followers_cap", self.featured_artists.followers_cap),
            ("popular_playlists.popularity_cap", self.popular_playlists.popularity_cap),
        ] {
            if !(cap > 0.0) {
                bail!("ranking.{} must be positive, got {}", name, cap);
            }
        }
        if self.trending.window_days <= 0 {
            bail!("ranking.trending.window_days must be positive");
        }
        if self.followed_artists.resurface_after_days <= 0 {
            bail!("ranking.followed_artists.resurface_after_days must be positive");
        }
        Ok(())
    }
}

fn check_blend(feed: &str, weights: &[f64]) -> Result<()> {
    if let Some(w) = weights.iter().find(|w| !(**w >= 0.0)) {
        bail!("ranking.{} weights must be non-negative, got {}", feed, w);
    }
    let sum: f64 = weights.iter().sum();
    if sum > 1.0 + WEIGHT_SUM_EPSILON {
        bail!("ranking.{} weights sum to {} which exceeds 1.0", feed, sum);
    }
    Ok(())
}
