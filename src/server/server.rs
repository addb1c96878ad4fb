use anyhow::{Context, Result};
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use super::error::{ok, ServiceError};
use super::state::*;
use super::{feeds, log_requests, metrics, search, stream, ServerConfig};
use crate::catalog_store::CatalogCounts;

/// Everything the HTTP layer needs besides its own configuration.
#[derive(Clone)]
pub struct ServerComponents {
    pub catalog_store: GuardedCatalogStore,
    pub assembler: GuardedStreamAssembler,
    pub ranker: GuardedRanker,
    pub search: GuardedSemanticSearch,
    pub session_resolver: GuardedSessionResolver,
}

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub catalog: CatalogCounts,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> Result<Response, ServiceError> {
    let store = state.catalog_store.clone();
    let catalog = tokio::task::spawn_blocking(move || store.get_counts())
        .await
        .context("Catalog counts task panicked")??;
    Ok(ok(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        catalog,
    }))
}

async fn not_found() -> Response {
    ServiceError::NotFound("Not found".to_string()).into_response()
}

impl ServerState {
    fn new(config: ServerConfig, components: ServerComponents) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            hash: env!("GIT_HASH").to_owned(),
            catalog_store: components.catalog_store,
            assembler: components.assembler,
            ranker: components.ranker,
            search: components.search,
            session_resolver: components.session_resolver,
        }
    }
}

pub fn make_app(config: ServerConfig, components: ServerComponents) -> Router {
    let request_timeout = config.request_timeout;
    let state = ServerState::new(config, components);

    let stream_routes: Router = Router::new()
        .route("/{track_id}", get(stream::stream_info))
        .route("/{track_id}/master.m3u8", get(stream::stream_manifest))
        .route("/ad/{ad_id}/ad.m3u8", get(stream::ad_manifest))
        .with_state(state.clone());

    let feed_routes: Router = Router::new()
        .route("/{feed}", get(feeds::get_feed))
        .with_state(state.clone());

    let track_routes: Router = Router::new()
        .route("/{id}/similar-sounding", get(feeds::get_similar_to_track))
        .with_state(state.clone());

    let search_routes: Router = Router::new()
        .route("/{kind}", get(search::search))
        .with_state(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    home_router
        .nest("/v1/stream", stream_routes)
        .nest("/v1/feed", feed_routes)
        .nest("/v1/track", track_routes)
        .nest("/v1/search", search_routes)
        .fallback(not_found)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

/// Serves the API and the metrics endpoint until `shutdown` fires.
pub async fn run_server(
    config: ServerConfig,
    components: ServerComponents,
    shutdown: CancellationToken,
) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, components);

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Serving API on port {}", port);

    let metrics_server = if metrics_port == 0 {
        None
    } else {
        let metrics_listener = TcpListener::bind(("0.0.0.0", metrics_port))
            .await
            .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
        info!("Serving metrics on port {}", metrics_port);
        let metrics_shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            axum::serve(metrics_listener, make_metrics_app())
                .with_graceful_shutdown(async move { metrics_shutdown.cancelled().await })
                .await
        }))
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    if let Some(metrics_server) = metrics_server {
        metrics_server.await.context("Metrics server task panicked")??;
    }
    Ok(())
}
