use axum::extract::FromRef;

use crate::catalog_store::CatalogStore;
use crate::recommendation::{RecommendationRanker, SemanticSearch};
use crate::streaming::StreamAssembler;
use std::sync::Arc;
use std::time::Instant;

use super::session::SessionResolver;
use super::ServerConfig;

pub type GuardedCatalogStore = Arc<dyn CatalogStore>;
pub type GuardedStreamAssembler = Arc<StreamAssembler>;
pub type GuardedRanker = Arc<RecommendationRanker>;
pub type GuardedSemanticSearch = Arc<SemanticSearch>;
pub type GuardedSessionResolver = Arc<dyn SessionResolver>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub catalog_store: GuardedCatalogStore,
    pub assembler: GuardedStreamAssembler,
    pub ranker: GuardedRanker,
    pub search: GuardedSemanticSearch,
    pub session_resolver: GuardedSessionResolver,
}

impl FromRef<ServerState> for GuardedCatalogStore {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog_store.clone()
    }
}

impl FromRef<ServerState> for GuardedStreamAssembler {
    fn from_ref(input: &ServerState) -> Self {
        input.assembler.clone()
    }
}

impl FromRef<ServerState> for GuardedRanker {
    fn from_ref(input: &ServerState) -> Self {
        input.ranker.clone()
    }
}

impl FromRef<ServerState> for GuardedSemanticSearch {
    fn from_ref(input: &ServerState) -> Self {
        input.search.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
