//! Job processor backed by the catalog store and a text embedder.

use super::{JobData, JobOutcome, JobProcessor, JobRequest, TasteProfileBuilder, TextEmbedder};
use crate::catalog_store::{CatalogStore, ReembedTarget};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct EmbeddingWorker {
    store: Arc<dyn CatalogStore>,
    embedder: Arc<dyn TextEmbedder>,
    profile: TasteProfileBuilder,
}

impl EmbeddingWorker {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        embedder: Arc<dyn TextEmbedder>,
        profile: TasteProfileBuilder,
    ) -> Self {
        Self {
            store,
            embedder,
            profile,
        }
    }

    async fn embed_query(&self, text: &str) -> JobOutcome {
        if text.trim().is_empty() {
            return JobOutcome::error("empty search query");
        }
        match self.embedder.embed(text).await {
            Ok(vector) => JobOutcome::done(JobData::Vector(vector)),
            Err(err) => JobOutcome::error(format!("{:#}", err)),
        }
    }

    async fn build_taste(&self, listener_id: String, recent: bool) -> Result<JobData> {
        let store = self.store.clone();
        let listened_limit = self.profile.listened_limit(recent);
        let liked_limit = self.profile.liked_limit(recent);
        let (preference, listened, liked) = tokio::task::spawn_blocking(move || {
            let preference = store.preference_embedding(&listener_id)?;
            let listened = store.recent_play_embeddings(&listener_id, listened_limit)?;
            let liked = store.recent_like_embeddings(&listener_id, liked_limit)?;
            anyhow::Ok((preference, listened, liked))
        })
        .await
        .context("Taste profile task panicked")??;

        debug!(
            "Building taste vectors from {} plays and {} likes (preference: {})",
            listened.len(),
            liked.len(),
            preference.is_some()
        );
        let taste = self
            .profile
            .build(preference.as_deref(), &listened, &liked);
        Ok(JobData::Taste(taste))
    }

    async fn reembed(&self, target: ReembedTarget, id: String) -> Result<JobOutcome> {
        if target == ReembedTarget::TrackAudio {
            return Ok(JobOutcome::unsupported(
                "audio embeddings are computed by the acoustic analysis pipeline",
            ));
        }

        let store = self.store.clone();
        let lookup_id = id.clone();
        let text = tokio::task::spawn_blocking(move || store.embedding_source_text(target, &lookup_id))
            .await
            .context("Source text task panicked")??;
        let Some(text) = text else {
            return Ok(JobOutcome::error(format!("{} {} not found", target.as_str(), id)));
        };

        let vector = self.embedder.embed(&text).await?;

        let store = self.store.clone();
        let written = tokio::task::spawn_blocking(move || store.set_meta_embedding(target, &id, &vector))
            .await
            .context("Embedding write task panicked")??;
        if !written {
            return Ok(JobOutcome::error("entity disappeared before the embedding was stored"));
        }
        Ok(JobOutcome::done(JobData::None))
    }
}

#[async_trait]
impl JobProcessor for EmbeddingWorker {
    async fn process(&self, request: JobRequest) -> JobOutcome {
        match request {
            JobRequest::SearchQuery { text } => self.embed_query(&text).await,
            JobRequest::ForYou {
                listener_id,
                recent,
            } => match self.build_taste(listener_id, recent).await {
                Ok(data) => JobOutcome::done(data),
                Err(err) => {
                    warn!("Taste vector generation failed: {:#}", err);
                    JobOutcome::error(format!("{:#}", err))
                }
            },
            JobRequest::Reembed { target, id } => match self.reembed(target, id).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!("Re-embedding {} failed: {:#}", target.as_str(), err);
                    JobOutcome::error(format!("{:#}", err))
                }
            },
        }
    }
}
