//! Text embedding backends.

use crate::catalog_store::Embedding;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maps text into the meta embedding space.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Embedding,
}

/// HTTP client for an external embedding model service.
pub struct HttpTextEmbedder {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTextEmbedder {
    /// # Arguments
    /// * `base_url` - Base URL of the embedding service (e.g., "http://localhost:7000")
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl TextEmbedder for HttpTextEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let url = format!("{}/embed", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest { text })
            .send()
            .await
            .context("Failed to connect to embedding service")?;

        if !response.status().is_success() {
            anyhow::bail!("Embedding request failed with status: {}", response.status());
        }

        let body: EmbedResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;
        if body.embedding.is_empty() {
            anyhow::bail!("Embedding service returned an empty vector");
        }
        Ok(body.embedding)
    }
}

/// Used when no embedding service is configured. Every call fails, which
/// sends search to its text fallback.
pub struct DisabledEmbedder;

#[async_trait]
impl TextEmbedder for DisabledEmbedder {
    async fn embed(&self, _text: &str) -> Result<Embedding> {
        anyhow::bail!("No embedding service configured")
    }
}
