mod models;
mod queries;
mod schema;
mod scoring;
mod store;
mod trait_def;
mod vector_functions;

#[cfg(test)]
pub(crate) mod test_support;

pub use models::*;
pub use queries::{
    CancelOnDrop, EntityRankQuery, QueryCancellation, QueryCancelled, TrackFilter, TrackOrder,
    TrackRankQuery,
};
pub use schema::CATALOG_VERSIONED_SCHEMAS;
pub use scoring::{EmbeddingColumn, PopularitySignal, ScoreExpr, ScoreTerm, SqlBinds};
pub use store::{SqliteCatalogStore, DEFAULT_READ_POOL_SIZE};
pub use trait_def::CatalogStore;
#[cfg(any(test, feature = "mock"))]
pub use trait_def::MockCatalogStore;
pub use vector_functions::{
    cosine_distance, cosine_similarity, decode_embedding, encode_embedding,
    register_vector_functions,
};
