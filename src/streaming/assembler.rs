//! HLS manifest assembly for tracks and standalone ads.

use super::ad_selector::{AdContext, AdSelector};
use super::interleave::{interleave, DEFAULT_AD_INTERVAL};
use super::manifest::{render_manifest, NOMINAL_SEGMENT_SECS};
use super::play_history::PlayRecorder;
use super::{is_valid_id, now_secs, PlaylistCache, SegmentKind, SignedSegment, SignerError};
use crate::catalog_store::{Advertisement, CatalogStore};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// The caller of a stream endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listener {
    pub id: String,
    pub premium: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Upstream(#[from] SignerError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AssemblerSettings {
    /// Base segments between ad breaks.
    pub ad_interval: usize,
    pub nominal_segment_secs: f64,
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self {
            ad_interval: DEFAULT_AD_INTERVAL,
            nominal_segment_secs: NOMINAL_SEGMENT_SECS,
        }
    }
}

/// Player-facing description of a track's streams.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub main_stream_url: String,
    pub ad_stream_url: Option<String>,
    pub advertisement: Option<Advertisement>,
    pub ad_interval_seconds: u64,
    pub is_premium: bool,
}

pub fn track_manifest_path(track_id: &str) -> String {
    format!("/v1/stream/{}/master.m3u8", track_id)
}

pub fn ad_manifest_path(ad_id: &str) -> String {
    format!("/v1/stream/ad/{}/ad.m3u8", ad_id)
}

pub struct StreamAssembler {
    store: Arc<dyn CatalogStore>,
    playlists: PlaylistCache,
    ads: Arc<dyn AdSelector>,
    plays: PlayRecorder,
    settings: AssemblerSettings,
}

impl StreamAssembler {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        playlists: PlaylistCache,
        ads: Arc<dyn AdSelector>,
        plays: PlayRecorder,
        settings: AssemblerSettings,
    ) -> Self {
        Self {
            store,
            playlists,
            ads,
            plays,
            settings,
        }
    }

    /// Manifest for `track_id`. Free-tier listeners get the selected ad run
    /// spliced in every `ad_interval` segments; any failure on the ad side
    /// only drops the ads.
    pub async fn stream_manifest(
        &self,
        track_id: &str,
        listener: &Listener,
    ) -> Result<String, StreamError> {
        validate_id(track_id)?;

        let store = self.store.clone();
        let id = track_id.to_string();
        let track = tokio::task::spawn_blocking(move || store.get_track(&id))
            .await
            .context("Track lookup task panicked")??
            .ok_or_else(|| StreamError::NotFound("Track not found".to_string()))?;

        let base = self
            .playlists
            .get_or_generate(&track.id, SegmentKind::Music)
            .await?;
        if base.is_empty() {
            return Err(StreamError::NotFound(
                "No segments available for this track".to_string(),
            ));
        }

        let segments = if listener.premium {
            base
        } else {
            let now = now_secs();
            let ad = self.ad_segments(&listener.id, &track.id, now).await;
            interleave(&base, &ad, self.settings.ad_interval)
        };
        debug!(
            "Assembled {} segments for {} (premium: {})",
            segments.len(),
            track.id,
            listener.premium
        );

        let manifest = render_manifest(&segments, self.settings.nominal_segment_secs);
        self.plays.record(&listener.id, &track.id, now_secs());
        Ok(manifest)
    }

    /// Standalone playlist for an active advertisement.
    pub async fn ad_manifest(&self, ad_id: &str, listener: &Listener) -> Result<String, StreamError> {
        validate_id(ad_id)?;

        let ad = self
            .active_ad(ad_id)
            .await?
            .ok_or_else(|| StreamError::NotFound("Advertisement not found".to_string()))?;

        let segments = self
            .playlists
            .get_or_generate(&ad.audio_id, SegmentKind::Ad)
            .await?;
        if segments.is_empty() {
            return Err(StreamError::NotFound(
                "No segments available for this advertisement".to_string(),
            ));
        }

        let store = self.store.clone();
        let listener_id = listener.id.clone();
        let shown_at = now_secs();
        tokio::task::spawn_blocking(move || {
            if let Err(err) = store.record_ad_impression(&ad.id, &listener_id, shown_at) {
                warn!("Failed to record impression of ad {}: {}", ad.id, err);
            }
        });

        Ok(render_manifest(&segments, self.settings.nominal_segment_secs))
    }

    /// Stream URLs for a track, plus the ad a free-tier player should use.
    pub async fn stream_info(
        &self,
        track_id: &str,
        listener: &Listener,
    ) -> Result<StreamInfo, StreamError> {
        validate_id(track_id)?;

        let store = self.store.clone();
        let id = track_id.to_string();
        let track = tokio::task::spawn_blocking(move || store.get_track(&id))
            .await
            .context("Track lookup task panicked")??
            .ok_or_else(|| StreamError::NotFound("Track not found".to_string()))?;

        let advertisement = if listener.premium {
            None
        } else {
            match self.selected_ad(&listener.id, &track.id, now_secs()).await {
                Ok(ad) => ad,
                Err(err) => {
                    warn!("Ad selection for {} failed: {:#}", listener.id, err);
                    None
                }
            }
        };

        let interval_secs = self.settings.ad_interval as f64 * self.settings.nominal_segment_secs;
        Ok(StreamInfo {
            main_stream_url: track_manifest_path(&track.id),
            ad_stream_url: advertisement.as_ref().map(|ad| ad_manifest_path(&ad.id)),
            advertisement,
            ad_interval_seconds: interval_secs.round() as u64,
            is_premium: listener.premium,
        })
    }

    async fn active_ad(&self, ad_id: &str) -> anyhow::Result<Option<Advertisement>> {
        let store = self.store.clone();
        let id = ad_id.to_string();
        let ad = tokio::task::spawn_blocking(move || store.get_advertisement(&id))
            .await
            .context("Advertisement lookup task panicked")??;
        Ok(ad.filter(|ad| ad.is_active))
    }

    async fn selected_ad(
        &self,
        listener_id: &str,
        track_id: &str,
        now: i64,
    ) -> anyhow::Result<Option<Advertisement>> {
        let ctx = AdContext { track_id, now };
        match self.ads.select_ad(listener_id, ctx).await? {
            Some(ad_id) => self.active_ad(&ad_id).await,
            None => Ok(None),
        }
    }

    async fn ad_segments(&self, listener_id: &str, track_id: &str, now: i64) -> Vec<SignedSegment> {
        let ad = match self.selected_ad(listener_id, track_id, now).await {
            Ok(Some(ad)) => ad,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!("Ad selection for {} failed, streaming without ads: {:#}", listener_id, err);
                return Vec::new();
            }
        };
        match self.playlists.get_or_generate(&ad.audio_id, SegmentKind::Ad).await {
            Ok(segments) => segments,
            Err(err) => {
                warn!("Signing ad {} failed, streaming without ads: {}", ad.id, err);
                Vec::new()
            }
        }
    }
}

fn validate_id(id: &str) -> Result<(), StreamError> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(StreamError::InvalidId(id.to_string()))
    }
}
