//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all cadence-server endpoints.
//!
//! When API routes or request formats change, update only this file.
#![allow(dead_code)]

use super::constants::*;
use cadence_server::server::{
    HEADER_LISTENER_ID, HEADER_SUBSCRIPTION_STATUS, HEADER_SUBSCRIPTION_TIER,
};
use reqwest::{RequestBuilder, Response};
use std::time::Duration;

/// Identity the auth gateway would inject in front of the service.
#[derive(Clone, Debug)]
struct GatewayIdentity {
    listener_id: String,
    tier: &'static str,
    status: &'static str,
}

/// HTTP test client impersonating the auth gateway
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    identity: Option<GatewayIdentity>,
}

impl TestClient {
    /// Creates a client that sends no identity headers
    pub fn anonymous(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            identity: None,
        }
    }

    fn with_identity(base_url: String, listener_id: &str, tier: &'static str, status: &'static str) -> Self {
        Self {
            identity: Some(GatewayIdentity {
                listener_id: listener_id.to_string(),
                tier,
                status,
            }),
            ..Self::anonymous(base_url)
        }
    }

    /// Creates a client for a free-tier listener
    pub fn free_listener(base_url: String, listener_id: &str) -> Self {
        Self::with_identity(base_url, listener_id, "free", "active")
    }

    /// Creates a client for a listener with an active premium subscription
    pub fn premium_listener(base_url: String, listener_id: &str) -> Self {
        Self::with_identity(base_url, listener_id, "premium", "active")
    }

    /// Creates a client for a listener whose premium subscription lapsed
    pub fn lapsed_premium_listener(base_url: String, listener_id: &str) -> Self {
        Self::with_identity(base_url, listener_id, "premium", "cancelled")
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let mut request = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(identity) = &self.identity {
            request = request
                .header(HEADER_LISTENER_ID, identity.listener_id.as_str())
                .header(HEADER_SUBSCRIPTION_TIER, identity.tier)
                .header(HEADER_SUBSCRIPTION_STATUS, identity.status);
        }
        request
    }

    async fn send(request: RequestBuilder) -> Response {
        request.send().await.expect("Request failed")
    }

    // ========================================================================
    // Server
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        Self::send(self.get("/")).await
    }

    /// GET with an arbitrary path, for routing edge cases
    pub async fn get_path(&self, path: &str) -> Response {
        Self::send(self.get(path)).await
    }

    // ========================================================================
    // Streaming Endpoints
    // ========================================================================

    /// GET /v1/stream/{track_id}/master.m3u8
    pub async fn stream_manifest(&self, track_id: &str) -> Response {
        Self::send(self.get(&format!("/v1/stream/{}/master.m3u8", track_id))).await
    }

    /// GET /v1/stream/ad/{ad_id}/ad.m3u8
    pub async fn ad_manifest(&self, ad_id: &str) -> Response {
        Self::send(self.get(&format!("/v1/stream/ad/{}/ad.m3u8", ad_id))).await
    }

    /// GET /v1/stream/{track_id}
    pub async fn stream_info(&self, track_id: &str) -> Response {
        Self::send(self.get(&format!("/v1/stream/{}", track_id))).await
    }

    // ========================================================================
    // Feed Endpoints
    // ========================================================================

    /// GET /v1/feed/{feed}
    pub async fn feed(&self, feed: &str) -> Response {
        Self::send(self.get(&format!("/v1/feed/{}", feed))).await
    }

    /// GET /v1/feed/{feed}?page=&limit=
    pub async fn feed_page(&self, feed: &str, page: usize, limit: usize) -> Response {
        let request = self
            .get(&format!("/v1/feed/{}", feed))
            .query(&[("page", page), ("limit", limit)]);
        Self::send(request).await
    }

    /// GET /v1/feed/{feed} with raw query values
    pub async fn feed_raw_query(&self, feed: &str, query: &[(&str, &str)]) -> Response {
        Self::send(self.get(&format!("/v1/feed/{}", feed)).query(query)).await
    }

    /// GET /v1/track/{id}/similar-sounding
    pub async fn similar_to_track(&self, track_id: &str) -> Response {
        Self::send(self.get(&format!("/v1/track/{}/similar-sounding", track_id))).await
    }

    // ========================================================================
    // Search Endpoints
    // ========================================================================

    /// GET /v1/search/{kind}?q=
    pub async fn search(&self, kind: &str, query: &str) -> Response {
        Self::send(self.get(&format!("/v1/search/{}", kind)).query(&[("q", query)])).await
    }

    /// GET /v1/search/{kind}?q=&limit=
    pub async fn search_with_limit(&self, kind: &str, query: &str, limit: &str) -> Response {
        let request = self
            .get(&format!("/v1/search/{}", kind))
            .query(&[("q", query), ("limit", limit)]);
        Self::send(request).await
    }
}

/// Ids of the `items` of a feed response body.
pub fn item_ids(body: &serde_json::Value) -> Vec<String> {
    body["data"]["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["id"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Ids of the `hits` of a search response body.
pub fn hit_ids(body: &serde_json::Value) -> Vec<String> {
    body["data"]["hits"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| hit["id"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
