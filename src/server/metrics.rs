use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all Cadence metrics
const PREFIX: &str = "cadence";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Streaming Metrics
    pub static ref PLAYLIST_CACHE_LOOKUPS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_playlist_cache_lookups_total"), "Signed playlist cache lookups"),
        &["outcome"]
    ).expect("Failed to create playlist_cache_lookups_total metric");

    pub static ref SIGNER_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_signer_requests_total"), "Signing service calls by outcome"),
        &["outcome"]
    ).expect("Failed to create signer_requests_total metric");

    // Personalization Metrics
    pub static ref TASTE_VECTOR_RESOLUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_taste_vector_resolutions_total"), "Taste vector lookups by source"),
        &["source"]
    ).expect("Failed to create taste_vector_resolutions_total metric");

    pub static ref RANKING_QUERY_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_ranking_query_duration_seconds"),
            "Ranking and search query duration in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["feed"]
    ).expect("Failed to create ranking_query_duration_seconds metric");

    pub static ref EMBEDDING_JOBS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_embedding_jobs_total"), "Embedding jobs by type and status"),
        &["job_type", "status"]
    ).expect("Failed to create embedding_jobs_total metric");

    pub static ref EMBEDDING_JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_embedding_job_duration_seconds"),
            "Embedding job processing time in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 30.0]),
        &["job_type"]
    ).expect("Failed to create embedding_job_duration_seconds metric");

    // Catalog Metrics
    pub static ref CATALOG_ITEMS_TOTAL: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_catalog_items_total"), "Total items in catalog"),
        &["type"]
    ).expect("Failed to create catalog_items_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PLAYLIST_CACHE_LOOKUPS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SIGNER_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TASTE_VECTOR_RESOLUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RANKING_QUERY_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(EMBEDDING_JOBS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(EMBEDDING_JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_ITEMS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn init_catalog_metrics(artists: usize, albums: usize, tracks: usize, playlists: usize) {
    for (kind, count) in [
        ("artist", artists),
        ("album", albums),
        ("track", tracks),
        ("playlist", playlists),
    ] {
        CATALOG_ITEMS_TOTAL
            .with_label_values(&[kind])
            .set(count as f64);
    }

    tracing::info!(
        "Catalog metrics initialized: {} artists, {} albums, {} tracks, {} playlists",
        artists,
        albums,
        tracks,
        playlists
    );
}

/// Collapses ids out of a request path so label cardinality stays bounded.
pub fn categorize_endpoint(path: &str) -> &'static str {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        [""] => "/",
        ["v1", "stream", "ad", _, _] => "/v1/stream/ad/{id}/ad.m3u8",
        ["v1", "stream", _, "master.m3u8"] => "/v1/stream/{id}/master.m3u8",
        ["v1", "stream", _] => "/v1/stream/{id}",
        ["v1", "feed", _] => "/v1/feed",
        ["v1", "track", _, "similar-sounding"] => "/v1/track/{id}/similar-sounding",
        ["v1", "search", _] => "/v1/search",
        _ => "other",
    }
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let endpoint = categorize_endpoint(path);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, endpoint])
        .observe(duration.as_secs_f64());
}

/// `outcome` is "hit" or "miss".
pub fn record_playlist_cache(outcome: &str) {
    PLAYLIST_CACHE_LOOKUPS_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

/// `outcome` is "ok", "retry" or "error".
pub fn record_signer_request(outcome: &str) {
    SIGNER_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// `source` is "anonymous", "cache", "generated" or "fallback".
pub fn record_taste_vector_resolution(source: &str) {
    TASTE_VECTOR_RESOLUTIONS_TOTAL
        .with_label_values(&[source])
        .inc();
}

pub fn record_ranking_query(feed: &'static str, duration: Duration) {
    RANKING_QUERY_DURATION_SECONDS
        .with_label_values(&[feed])
        .observe(duration.as_secs_f64());
}

pub fn record_embedding_job(job_type: &str, status: &str, duration: Duration) {
    EMBEDDING_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    EMBEDDING_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration.as_secs_f64());
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // kB
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<f64>() {
                            PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
