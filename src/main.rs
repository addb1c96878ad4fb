use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cadence_server::cache::{InMemoryCache, KeyValueCache};
use cadence_server::catalog_store::{CatalogStore, SqliteCatalogStore, DEFAULT_READ_POOL_SIZE};
use cadence_server::config::{self, AdSelection, AppConfig};
use cadence_server::jobs::{
    DisabledEmbedder, EmbeddingWorker, HttpTextEmbedder, JobQueue, LocalJobQueue,
    TasteProfileBuilder, TextEmbedder,
};
use cadence_server::recommendation::{RecommendationRanker, SemanticSearch, TasteVectorProvider};
use cadence_server::server::{
    metrics, run_server, GatewayHeaderResolver, RequestsLoggingLevel, ServerComponents,
    ServerConfig,
};
use cadence_server::streaming::{
    AdSelector, HttpSegmentSigner, NoAds, PlayRecorder, PlaylistCache, RetryPolicy,
    RotatingAdSelector, StaticAdSelector, StreamAssembler,
};

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite catalog database file. Created if missing.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Base URL of the media service that signs segment URLs.
    #[clap(long)]
    pub signer_url: Option<String>,

    /// Timeout in seconds for a single signing request.
    #[clap(long, default_value_t = 10)]
    pub signer_timeout_sec: u64,

    /// Base URL of the text embedding service. Without it search matches names only.
    #[clap(long)]
    pub embedder_url: Option<String>,

    /// Timeout in seconds for embedding requests.
    #[clap(long, default_value_t = 30)]
    pub embedder_timeout_sec: u64,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_path: args.db_path.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level,
            signer_url: args.signer_url.clone(),
            signer_timeout_sec: args.signer_timeout_sec,
            embedder_url: args.embedder_url.clone(),
            embedder_timeout_sec: args.embedder_timeout_sec,
        }
    }
}

fn make_ad_selector(
    config: &AppConfig,
    store: Arc<dyn CatalogStore>,
) -> Result<Arc<dyn AdSelector>> {
    let streaming = &config.streaming;
    Ok(match streaming.ad_selection {
        AdSelection::None => Arc::new(NoAds),
        AdSelection::Static => {
            let ad_id = streaming
                .static_ad_id
                .clone()
                .context("static ad selection without static_ad_id")?;
            Arc::new(StaticAdSelector::new(ad_id))
        }
        AdSelection::Rotating => Arc::new(RotatingAdSelector::new(
            store,
            Duration::from_secs(streaming.ad_rotation_window_secs),
        )),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_path: {:?}", app_config.db_path);
    info!("  port: {}", app_config.port);
    info!("  signer_url: {}", app_config.signer_url);
    info!(
        "  embedder_url: {}",
        app_config.embedder_url.as_deref().unwrap_or("(disabled)")
    );
    info!("  ad_selection: {:?}", app_config.streaming.ad_selection);
    info!("  play_recording: {:?}", app_config.streaming.play_recording);

    info!("Opening SQLite catalog database at {:?}...", app_config.db_path);
    let catalog_store: Arc<dyn CatalogStore> = Arc::new(SqliteCatalogStore::new(
        &app_config.db_path,
        DEFAULT_READ_POOL_SIZE,
    )?);

    info!("Initializing metrics...");
    metrics::init_metrics();
    let counts = catalog_store.get_counts()?;
    metrics::init_catalog_metrics(
        counts.artists,
        counts.albums,
        counts.tracks,
        counts.playlists,
    );

    let shutdown_token = CancellationToken::new();

    let memory_cache = Arc::new(InMemoryCache::new());
    {
        let cache = memory_cache.clone();
        let token = shutdown_token.child_token();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CACHE_PURGE_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired().await;
                        if purged > 0 {
                            debug!("Purged {} expired cache entries", purged);
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });
    }
    let cache: Arc<dyn KeyValueCache> = memory_cache;

    // Embedding jobs
    let embedder: Arc<dyn TextEmbedder> = match &app_config.embedder_url {
        Some(url) => {
            info!("Embedding service configured at {}", url);
            Arc::new(HttpTextEmbedder::new(
                url,
                Duration::from_secs(app_config.embedder_timeout_sec),
            )?)
        }
        None => Arc::new(DisabledEmbedder),
    };
    let worker = Arc::new(EmbeddingWorker::new(
        catalog_store.clone(),
        embedder,
        TasteProfileBuilder::default(),
    ));
    let personalization = &app_config.personalization;
    let job_queue = Arc::new(LocalJobQueue::start(
        worker,
        personalization.worker_concurrency,
        personalization.queue_capacity,
    ));
    let queue: Arc<dyn JobQueue> = job_queue.clone();

    // Streaming
    let signer = Arc::new(HttpSegmentSigner::new(
        &app_config.signer_url,
        Duration::from_secs(app_config.signer_timeout_sec),
        RetryPolicy::new(&app_config.streaming),
    )?);
    let playlists = PlaylistCache::new(
        cache.clone(),
        signer,
        app_config.streaming.playlist_ttl()?,
    );
    let assembler = StreamAssembler::new(
        catalog_store.clone(),
        playlists,
        make_ad_selector(&app_config, catalog_store.clone())?,
        PlayRecorder::new(catalog_store.clone(), app_config.streaming.play_policy()),
        app_config.streaming.assembler_settings(),
    );

    // Recommendations and search
    let tastes = Arc::new(TasteVectorProvider::new(
        cache,
        queue.clone(),
        personalization.taste_vector_ttl(),
        personalization.generation_timeout(),
    ));
    let ranker = RecommendationRanker::new(
        catalog_store.clone(),
        tastes,
        app_config.ranking.clone(),
    );
    let search = SemanticSearch::new(catalog_store.clone(), queue, app_config.search.clone());

    let components = ServerComponents {
        catalog_store,
        assembler: Arc::new(assembler),
        ranker: Arc::new(ranker),
        search: Arc::new(search),
        session_resolver: Arc::new(GatewayHeaderResolver),
    };
    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level,
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        request_timeout: Duration::from_secs(app_config.request_timeout_sec),
    };

    {
        let token = shutdown_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, initiating graceful shutdown");
            }
            token.cancel();
        });
    }

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);
    let result = run_server(server_config, components, shutdown_token.clone()).await;
    info!("HTTP server stopped: {:?}", result);

    shutdown_token.cancel();
    job_queue.shutdown().await;
    result
}
