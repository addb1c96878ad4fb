//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own catalog database and its
//! own fake upstream services.
#![allow(dead_code)]

use super::constants::*;
use super::fakes::{FakeEmbedder, FakeMediaService};
use super::fixtures::create_test_catalog;
use cadence_server::cache::{InMemoryCache, KeyValueCache};
use cadence_server::catalog_store::{CatalogStore, SqliteCatalogStore};
use cadence_server::jobs::{
    DisabledEmbedder, EmbeddingWorker, HttpTextEmbedder, JobQueue, LocalJobQueue,
    TasteProfileBuilder, TextEmbedder,
};
use cadence_server::recommendation::{
    RankingWeights, RecommendationRanker, SearchSettings, SemanticSearch, TasteVectorProvider,
};
use cadence_server::server::{
    make_app, GatewayHeaderResolver, RequestsLoggingLevel, ServerComponents, ServerConfig,
};
use cadence_server::streaming::{
    AdSelector, AssemblerSettings, HttpSegmentSigner, NoAds, PlayRecorder, PlayRecordingPolicy,
    PlaylistCache, PlaylistTtl, RetryPolicy, RotatingAdSelector, StreamAssembler,
};
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Knobs for the few tests that need a non-default server.
#[derive(Clone)]
pub struct TestServerOptions {
    /// Without an embedder, search falls back to text matching.
    pub with_embedder: bool,
    pub with_ads: bool,
    pub play_policy: PlayRecordingPolicy,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            with_embedder: true,
            with_ads: true,
            play_policy: PlayRecordingPolicy::default(),
        }
    }
}

/// Test server instance with isolated catalog and upstream fakes
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Catalog database, for direct inspection in tests
    pub db_path: PathBuf,

    pub media: FakeMediaService,
    pub embedder: Option<FakeEmbedder>,

    // Private fields - keep resources alive until drop
    _temp_catalog_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port with default options
    pub async fn spawn() -> Self {
        Self::spawn_with(TestServerOptions::default()).await
    }

    /// Spawns a new test server on a random port
    ///
    /// This function:
    /// 1. Creates a temporary catalog with test data
    /// 2. Starts the fake media service (and embedder, if requested)
    /// 3. Wires the components the same way `main` does
    /// 4. Binds to a random port (127.0.0.1:0) and serves in a background task
    /// 5. Waits for the server to be ready
    ///
    /// # Panics
    ///
    /// Panics if any of the steps fail.
    pub async fn spawn_with(options: TestServerOptions) -> Self {
        let (temp_catalog_dir, db_path) =
            create_test_catalog().expect("Failed to create test catalog");

        let catalog_store: Arc<dyn CatalogStore> = Arc::new(
            SqliteCatalogStore::new(&db_path, 2).expect("Failed to open catalog store"),
        );

        let media = FakeMediaService::spawn().await;
        let embedder_service = if options.with_embedder {
            Some(FakeEmbedder::spawn().await)
        } else {
            None
        };

        let cache: Arc<dyn KeyValueCache> = Arc::new(InMemoryCache::new());

        // Embedding jobs
        let text_embedder: Arc<dyn TextEmbedder> = match &embedder_service {
            Some(service) => Arc::new(
                HttpTextEmbedder::new(&service.base_url, Duration::from_secs(5))
                    .expect("Failed to build embedder client"),
            ),
            None => Arc::new(DisabledEmbedder),
        };
        let worker = Arc::new(EmbeddingWorker::new(
            catalog_store.clone(),
            text_embedder,
            TasteProfileBuilder::default(),
        ));
        let queue: Arc<dyn JobQueue> = Arc::new(LocalJobQueue::start(worker, 2, 64));

        // Streaming, with fast retries so failure tests stay quick
        let retry = RetryPolicy {
            max_attempts: 2,
            initial_backoff_ms: 10,
            max_backoff_ms: 20,
            backoff_multiplier: 2.0,
        };
        let signer = Arc::new(
            HttpSegmentSigner::new(&media.base_url, Duration::from_secs(5), retry)
                .expect("Failed to build signer client"),
        );
        let ads: Arc<dyn AdSelector> = if options.with_ads {
            Arc::new(RotatingAdSelector::new(
                catalog_store.clone(),
                Duration::from_secs(900),
            ))
        } else {
            Arc::new(NoAds)
        };
        let assembler = StreamAssembler::new(
            catalog_store.clone(),
            PlaylistCache::new(cache.clone(), signer, PlaylistTtl::default()),
            ads,
            PlayRecorder::new(catalog_store.clone(), options.play_policy),
            AssemblerSettings {
                ad_interval: AD_INTERVAL,
                ..AssemblerSettings::default()
            },
        );

        // Recommendations and search
        let tastes = Arc::new(TasteVectorProvider::new(
            cache,
            queue.clone(),
            Duration::from_secs(600),
            Duration::from_secs(5),
        ));
        let ranker = RecommendationRanker::new(
            catalog_store.clone(),
            tastes,
            RankingWeights::default(),
        );
        let search = SemanticSearch::new(
            catalog_store.clone(),
            queue,
            SearchSettings {
                embed_timeout: Duration::from_secs(5),
                ..SearchSettings::default()
            },
        );

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            metrics_port: 0,
            ..ServerConfig::default()
        };
        let app = make_app(
            config,
            ServerComponents {
                catalog_store,
                assembler: Arc::new(assembler),
                ranker: Arc::new(ranker),
                search: Arc::new(search),
                session_resolver: Arc::new(GatewayHeaderResolver),
            },
        );

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            db_path,
            media,
            embedder: embedder_service,
            _temp_catalog_dir: temp_catalog_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            if let Ok(response) = client.get(format!("{}/", self.base_url)).send().await {
                if response.status().is_success() {
                    return;
                }
            }

            tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
        }
    }

    fn count(&self, sql: &str, args: &[&str]) -> i64 {
        let conn = Connection::open(&self.db_path).expect("Failed to open catalog db");
        conn.query_row(sql, rusqlite::params_from_iter(args.iter()), |row| {
            row.get(0)
        })
        .expect("Count query failed")
    }

    pub fn play_count(&self, listener_id: &str, track_id: &str) -> i64 {
        self.count(
            "SELECT COUNT(*) FROM play_history WHERE user_id = ?1 AND track_id = ?2",
            &[listener_id, track_id],
        )
    }

    pub fn impression_count(&self, ad_id: &str) -> i64 {
        self.count(
            "SELECT COUNT(*) FROM ad_impressions WHERE ad_id = ?1",
            &[ad_id],
        )
    }

    /// Polls until the listener has `expected` plays of the track. Play
    /// recording happens off the request path.
    pub async fn wait_for_plays(&self, listener_id: &str, track_id: &str, expected: i64) -> i64 {
        let start = std::time::Instant::now();
        loop {
            let count = self.play_count(listener_id, track_id);
            if count >= expected || start.elapsed() > Duration::from_secs(2) {
                return count;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub async fn wait_for_impressions(&self, ad_id: &str, expected: i64) -> i64 {
        let start = std::time::Instant::now();
        loop {
            let count = self.impression_count(ad_id);
            if count >= expected || start.elapsed() > Duration::from_secs(2) {
                return count;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Appends a play as if it happened `secs_ago` seconds ago.
    pub fn insert_play(&self, listener_id: &str, track_id: &str, secs_ago: i64) {
        let conn = Connection::open(&self.db_path).expect("Failed to open catalog db");
        conn.execute(
            "INSERT INTO play_history (user_id, track_id, played_at)
             VALUES (?1, ?2, CAST(strftime('%s','now') AS INTEGER) - ?3)",
            params![listener_id, track_id, secs_ago],
        )
        .expect("Failed to insert play");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
