//! Signed segment lists, cached for slightly less than their signatures
//! stay valid.

use super::{SegmentKind, SegmentSigner, SignedSegment, SignerError};
use crate::cache::{self, KeyValueCache};
use crate::server::metrics;
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Expiry requested from the signing service.
pub const SIGNED_URL_EXPIRY_SECS: u64 = 1200;
/// Cache lifetime of a signed list. Must stay below the signed expiry so a
/// cached list never outlives its URLs.
pub const PLAYLIST_CACHE_TTL_SECS: u64 = 1140;

const _: () = assert!(PLAYLIST_CACHE_TTL_SECS < SIGNED_URL_EXPIRY_SECS);

/// Paired signed-URL expiry and cache TTL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaylistTtl {
    signed_expiry: Duration,
    cache_ttl: Duration,
}

impl PlaylistTtl {
    pub fn new(signed_expiry: Duration, cache_ttl: Duration) -> Result<Self> {
        if cache_ttl.is_zero() {
            bail!("playlist cache TTL must be positive");
        }
        if cache_ttl >= signed_expiry {
            bail!(
                "playlist cache TTL ({:?}) must be shorter than the signed URL expiry ({:?})",
                cache_ttl,
                signed_expiry
            );
        }
        Ok(Self {
            signed_expiry,
            cache_ttl,
        })
    }

    pub fn signed_expiry(&self) -> Duration {
        self.signed_expiry
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }
}

impl Default for PlaylistTtl {
    fn default() -> Self {
        Self {
            signed_expiry: Duration::from_secs(SIGNED_URL_EXPIRY_SECS),
            cache_ttl: Duration::from_secs(PLAYLIST_CACHE_TTL_SECS),
        }
    }
}

pub fn cache_key(audio_id: &str, kind: SegmentKind) -> String {
    match kind {
        SegmentKind::Music => format!("playlist:{}", audio_id),
        SegmentKind::Ad => format!("playlist:ad:{}", audio_id),
    }
}

pub struct PlaylistCache {
    cache: Arc<dyn KeyValueCache>,
    signer: Arc<dyn SegmentSigner>,
    ttl: PlaylistTtl,
}

impl PlaylistCache {
    pub fn new(cache: Arc<dyn KeyValueCache>, signer: Arc<dyn SegmentSigner>, ttl: PlaylistTtl) -> Self {
        Self { cache, signer, ttl }
    }

    /// Cached list for `audio_id`, or a freshly signed one. Cache failures
    /// fall through to the signer. Empty lists are returned but not cached,
    /// so a track whose transcoding finishes is playable right away.
    pub async fn get_or_generate(
        &self,
        audio_id: &str,
        kind: SegmentKind,
    ) -> Result<Vec<SignedSegment>, SignerError> {
        let key = cache_key(audio_id, kind);

        if let Some(raw) = cache::get_or_miss(self.cache.as_ref(), &key).await {
            match serde_json::from_str::<Vec<SignedSegment>>(&raw) {
                Ok(segments) => {
                    debug!("Playlist cache hit for {}", key);
                    metrics::record_playlist_cache("hit");
                    return Ok(segments);
                }
                Err(err) => warn!("Ignoring unreadable cached playlist {}: {}", key, err),
            }
        }
        debug!("Playlist cache miss for {}", key);
        metrics::record_playlist_cache("miss");

        let segments = self
            .signer
            .sign(audio_id, kind, self.ttl.signed_expiry())
            .await?;

        if !segments.is_empty() {
            match serde_json::to_string(&segments) {
                Ok(raw) => {
                    cache::set_best_effort(self.cache.as_ref(), &key, self.ttl.cache_ttl(), raw).await
                }
                Err(err) => warn!("Could not serialize playlist {}: {}", key, err),
            }
        }
        Ok(segments)
    }
}
