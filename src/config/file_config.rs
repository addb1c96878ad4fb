use crate::recommendation::RankingWeights;
use crate::streaming::PlayRecordingMode;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::AdSelection;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub signer_url: Option<String>,
    pub signer_timeout_sec: Option<u64>,
    pub embedder_url: Option<String>,
    pub embedder_timeout_sec: Option<u64>,
    pub request_timeout_sec: Option<u64>,

    // Feature configs
    pub streaming: Option<StreamingConfig>,
    pub personalization: Option<PersonalizationConfig>,
    pub search: Option<SearchConfig>,
    /// Complete tables; missing keys take their defaults.
    pub ranking: Option<RankingWeights>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StreamingConfig {
    pub signed_url_expiry_secs: Option<u64>,
    pub playlist_cache_ttl_secs: Option<u64>,
    pub ad_interval_segments: Option<usize>,
    pub nominal_segment_secs: Option<f64>,
    pub ad_selection: Option<AdSelection>,
    pub static_ad_id: Option<String>,
    pub ad_rotation_window_secs: Option<u64>,
    pub play_recording: Option<PlayRecordingMode>,
    pub play_window_secs: Option<u64>,
    // Signing service retries
    pub signer_max_attempts: Option<u32>,
    pub signer_initial_backoff_ms: Option<u64>,
    pub signer_max_backoff_ms: Option<u64>,
    pub signer_backoff_multiplier: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PersonalizationConfig {
    pub taste_vector_ttl_secs: Option<u64>,
    pub generation_timeout_ms: Option<u64>,
    pub worker_concurrency: Option<usize>,
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub sql_max_distance: Option<f64>,
    pub min_similarity: Option<f64>,
    pub embed_timeout_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
