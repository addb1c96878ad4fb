//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, TRACK_1_ID};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_stream_manifest() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::free_listener(server.base_url.clone(), "listener-1");
//!
//!     let response = client.stream_manifest(TRACK_1_ID).await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod client;
mod constants;
mod fakes;
mod fixtures;
mod server;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use client::{hit_ids, item_ids, TestClient};
pub use constants::*;
#[allow(unused_imports)]
pub use fakes::{FakeEmbedder, FakeMediaService};
#[allow(unused_imports)]
pub use server::{TestServer, TestServerOptions};
