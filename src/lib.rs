//! Cadence Server Library
//!
//! Ad-stitched HLS streaming and personalized catalog feeds. The modules are
//! exposed for the binary and for end-to-end tests.

pub mod cache;
pub mod catalog_store;
pub mod config;
pub mod jobs;
pub mod recommendation;
pub mod server;
pub mod sqlite_persistence;
pub mod streaming;

// Re-export commonly used types for convenience
pub use catalog_store::{CatalogStore, SqliteCatalogStore};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerComponents, ServerConfig};
