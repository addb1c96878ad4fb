mod file_config;

pub use file_config::{FileConfig, PersonalizationConfig, SearchConfig, StreamingConfig};

use crate::recommendation::{RankingWeights, SearchSettings};
use crate::server::RequestsLoggingLevel;
use crate::streaming::{
    AssemblerSettings, PlayRecordingMode, PlayRecordingPolicy, PlaylistTtl,
    PLAYLIST_CACHE_TTL_SECS, SIGNED_URL_EXPIRY_SECS,
};
use anyhow::{bail, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Upper bound on a single API request, signer retries included.
pub const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 60;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub signer_url: Option<String>,
    pub signer_timeout_sec: u64,
    pub embedder_url: Option<String>,
    pub embedder_timeout_sec: u64,
}

/// How free-tier streams pick their ad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdSelection {
    None,
    /// Always `static_ad_id`.
    Static,
    /// Rotate through active ads per listener.
    #[default]
    Rotating,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub signer_url: String,
    pub signer_timeout_sec: u64,
    /// Without an embedder, search falls back to substring matching.
    pub embedder_url: Option<String>,
    pub embedder_timeout_sec: u64,
    pub request_timeout_sec: u64,

    // Feature configs (with defaults)
    pub streaming: StreamingSettings,
    pub personalization: PersonalizationSettings,
    pub search: SearchSettings,
    pub ranking: RankingWeights,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }
        let parent = db_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        if !parent.is_dir() {
            bail!("Database directory does not exist: {:?}", parent);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = match file.logging_level {
            Some(s) => parse_logging_level(&s)
                .ok_or_else(|| anyhow::anyhow!("Invalid logging_level: {}", s))?,
            None => cli.logging_level,
        };

        let signer_url = file
            .signer_url
            .or_else(|| cli.signer_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("signer_url must be specified via --signer-url or in config file")
            })?;
        let signer_timeout_sec = file.signer_timeout_sec.unwrap_or(cli.signer_timeout_sec);
        let embedder_url = file.embedder_url.or_else(|| cli.embedder_url.clone());
        let embedder_timeout_sec = file
            .embedder_timeout_sec
            .unwrap_or(cli.embedder_timeout_sec);
        let request_timeout_sec = file
            .request_timeout_sec
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SEC);
        if request_timeout_sec == 0 {
            bail!("request_timeout_sec must be positive");
        }
        if request_timeout_sec <= signer_timeout_sec {
            warn!(
                "request_timeout_sec ({}) does not leave room for a single signer call ({}s)",
                request_timeout_sec, signer_timeout_sec
            );
        }

        let streaming = StreamingSettings::from_file(file.streaming.unwrap_or_default());
        streaming.validate()?;

        let personalization =
            PersonalizationSettings::from_file(file.personalization.unwrap_or_default());
        personalization.validate()?;

        let search = search_settings(file.search.unwrap_or_default());
        validate_search(&search)?;

        let ranking = file.ranking.unwrap_or_default();
        ranking.validate()?;

        Ok(Self {
            db_path,
            port,
            metrics_port,
            logging_level,
            signer_url,
            signer_timeout_sec,
            embedder_url,
            embedder_timeout_sec,
            request_timeout_sec,
            streaming,
            personalization,
            search,
            ranking,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamingSettings {
    pub signed_url_expiry_secs: u64,
    pub playlist_cache_ttl_secs: u64,
    pub ad_interval_segments: usize,
    pub nominal_segment_secs: f64,
    pub ad_selection: AdSelection,
    pub static_ad_id: Option<String>,
    pub ad_rotation_window_secs: u64,
    pub play_recording: PlayRecordingMode,
    pub play_window_secs: u64,
    pub signer_max_attempts: u32,
    pub signer_initial_backoff_ms: u64,
    pub signer_max_backoff_ms: u64,
    pub signer_backoff_multiplier: f64,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            signed_url_expiry_secs: SIGNED_URL_EXPIRY_SECS,
            playlist_cache_ttl_secs: PLAYLIST_CACHE_TTL_SECS,
            ad_interval_segments: 12,
            nominal_segment_secs: 10.0,
            ad_selection: AdSelection::default(),
            static_ad_id: None,
            ad_rotation_window_secs: 900,
            play_recording: PlayRecordingMode::default(),
            play_window_secs: 1800,
            signer_max_attempts: 3,
            signer_initial_backoff_ms: 200,
            signer_max_backoff_ms: 2000,
            signer_backoff_multiplier: 2.0,
        }
    }
}

impl StreamingSettings {
    fn from_file(file: StreamingConfig) -> Self {
        let d = Self::default();
        Self {
            signed_url_expiry_secs: file.signed_url_expiry_secs.unwrap_or(d.signed_url_expiry_secs),
            playlist_cache_ttl_secs: file
                .playlist_cache_ttl_secs
                .unwrap_or(d.playlist_cache_ttl_secs),
            ad_interval_segments: file.ad_interval_segments.unwrap_or(d.ad_interval_segments),
            nominal_segment_secs: file.nominal_segment_secs.unwrap_or(d.nominal_segment_secs),
            ad_selection: file.ad_selection.unwrap_or(d.ad_selection),
            static_ad_id: file.static_ad_id,
            ad_rotation_window_secs: file
                .ad_rotation_window_secs
                .unwrap_or(d.ad_rotation_window_secs),
            play_recording: file.play_recording.unwrap_or(d.play_recording),
            play_window_secs: file.play_window_secs.unwrap_or(d.play_window_secs),
            signer_max_attempts: file.signer_max_attempts.unwrap_or(d.signer_max_attempts),
            signer_initial_backoff_ms: file
                .signer_initial_backoff_ms
                .unwrap_or(d.signer_initial_backoff_ms),
            signer_max_backoff_ms: file.signer_max_backoff_ms.unwrap_or(d.signer_max_backoff_ms),
            signer_backoff_multiplier: file
                .signer_backoff_multiplier
                .unwrap_or(d.signer_backoff_multiplier),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.playlist_ttl()?;
        if self.ad_interval_segments == 0 {
            bail!("streaming.ad_interval_segments must be at least 1");
        }
        if !(self.nominal_segment_secs.is_finite() && self.nominal_segment_secs > 0.0) {
            bail!("streaming.nominal_segment_secs must be positive");
        }
        if self.ad_selection == AdSelection::Static
            && self.static_ad_id.as_deref().map_or(true, str::is_empty)
        {
            bail!("streaming.static_ad_id is required when ad_selection = \"static\"");
        }
        if self.ad_rotation_window_secs == 0 {
            bail!("streaming.ad_rotation_window_secs must be positive");
        }
        if self.play_recording == PlayRecordingMode::OncePerWindow && self.play_window_secs == 0 {
            bail!("streaming.play_window_secs must be positive");
        }
        if self.signer_max_attempts == 0 {
            bail!("streaming.signer_max_attempts must be at least 1");
        }
        if self.signer_backoff_multiplier < 1.0 {
            bail!("streaming.signer_backoff_multiplier must be at least 1.0");
        }
        if self.signer_initial_backoff_ms > self.signer_max_backoff_ms {
            bail!("streaming.signer_initial_backoff_ms must not exceed signer_max_backoff_ms");
        }
        Ok(())
    }

    pub fn playlist_ttl(&self) -> Result<PlaylistTtl> {
        PlaylistTtl::new(
            Duration::from_secs(self.signed_url_expiry_secs),
            Duration::from_secs(self.playlist_cache_ttl_secs),
        )
    }

    pub fn play_policy(&self) -> PlayRecordingPolicy {
        PlayRecordingPolicy::from_mode(self.play_recording, self.play_window_secs)
    }

    pub fn assembler_settings(&self) -> AssemblerSettings {
        AssemblerSettings {
            ad_interval: self.ad_interval_segments,
            nominal_segment_secs: self.nominal_segment_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalizationSettings {
    pub taste_vector_ttl_secs: u64,
    pub generation_timeout_ms: u64,
    pub worker_concurrency: usize,
    pub queue_capacity: usize,
}

impl Default for PersonalizationSettings {
    fn default() -> Self {
        Self {
            taste_vector_ttl_secs: 600,
            generation_timeout_ms: 5000,
            worker_concurrency: 5,
            queue_capacity: 256,
        }
    }
}

impl PersonalizationSettings {
    fn from_file(file: PersonalizationConfig) -> Self {
        let d = Self::default();
        Self {
            taste_vector_ttl_secs: file.taste_vector_ttl_secs.unwrap_or(d.taste_vector_ttl_secs),
            generation_timeout_ms: file.generation_timeout_ms.unwrap_or(d.generation_timeout_ms),
            worker_concurrency: file.worker_concurrency.unwrap_or(d.worker_concurrency),
            queue_capacity: file.queue_capacity.unwrap_or(d.queue_capacity),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.taste_vector_ttl_secs == 0 {
            bail!("personalization.taste_vector_ttl_secs must be positive");
        }
        if self.generation_timeout_ms == 0 {
            bail!("personalization.generation_timeout_ms must be positive");
        }
        if self.worker_concurrency == 0 {
            bail!("personalization.worker_concurrency must be at least 1");
        }
        if self.queue_capacity == 0 {
            bail!("personalization.queue_capacity must be at least 1");
        }
        Ok(())
    }

    pub fn taste_vector_ttl(&self) -> Duration {
        Duration::from_secs(self.taste_vector_ttl_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

fn search_settings(file: SearchConfig) -> SearchSettings {
    let d = SearchSettings::default();
    SearchSettings {
        sql_max_distance: file.sql_max_distance.unwrap_or(d.sql_max_distance),
        min_similarity: file.min_similarity.unwrap_or(d.min_similarity),
        embed_timeout: file
            .embed_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(d.embed_timeout),
    }
}

/// The store-side distance bound must let through everything the similarity
/// floor would accept, otherwise the floor is silently tighter than
/// configured.
fn validate_search(search: &SearchSettings) -> Result<()> {
    if !(0.0..=2.0).contains(&search.sql_max_distance) || search.sql_max_distance == 0.0 {
        bail!("search.sql_max_distance must be in (0, 2]");
    }
    if !(-1.0..=1.0).contains(&search.min_similarity) {
        bail!("search.min_similarity must be in [-1, 1]");
    }
    if 1.0 - search.sql_max_distance > search.min_similarity + 1e-9 {
        bail!(
            "search.sql_max_distance ({}) is tighter than search.min_similarity ({})",
            search.sql_max_distance,
            search.min_similarity
        );
    }
    if search.embed_timeout.is_zero() {
        bail!("search.embed_timeout_ms must be positive");
    }
    Ok(())
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
