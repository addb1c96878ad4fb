//! Free-text search over meta embeddings, with a substring fallback.

use super::run_store_query;
use crate::catalog_store::{CatalogStore, EntityKind, Page, SearchHit};
use crate::jobs::{JobData, JobQueue, JobRequest, JobStatus};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq)]
pub struct SearchSettings {
    /// Loose bound applied inside the store query.
    pub sql_max_distance: f64,
    /// Relevance floor applied to the store's results, inclusive.
    pub min_similarity: f64,
    pub embed_timeout: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            sql_max_distance: 0.80,
            min_similarity: 0.20,
            embed_timeout: Duration::from_millis(5000),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Semantic,
    Text,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResults {
    pub mode: SearchMode,
    pub hits: Vec<SearchHit>,
}

pub struct SemanticSearch {
    store: Arc<dyn CatalogStore>,
    queue: Arc<dyn JobQueue>,
    settings: SearchSettings,
}

impl SemanticSearch {
    pub fn new(store: Arc<dyn CatalogStore>, queue: Arc<dyn JobQueue>, settings: SearchSettings) -> Self {
        Self {
            store,
            queue,
            settings,
        }
    }

    pub async fn search(&self, kind: EntityKind, query: &str, page: Page) -> Result<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResults {
                mode: SearchMode::Text,
                hits: vec![],
            });
        }

        match self.embed(query).await {
            Some(vector) => {
                let store = self.store.clone();
                let max_distance = self.settings.sql_max_distance;
                let hits = run_store_query("search", move |cancel| {
                    store.nearest_by_meta(kind, &vector, max_distance, page, cancel)
                })
                .await?;
                let hits = apply_floor(hits, self.settings.min_similarity);
                debug!("Semantic {:?} search returned {} hits", kind, hits.len());
                Ok(SearchResults {
                    mode: SearchMode::Semantic,
                    hits,
                })
            }
            None => {
                let store = self.store.clone();
                let text = query.to_string();
                let hits = run_store_query("search_text", move |cancel| {
                    store.search_by_text(kind, &text, page, cancel)
                })
                .await?;
                Ok(SearchResults {
                    mode: SearchMode::Text,
                    hits,
                })
            }
        }
    }

    async fn embed(&self, query: &str) -> Option<Vec<f32>> {
        let ticket = match self
            .queue
            .enqueue(JobRequest::SearchQuery {
                text: query.to_string(),
            })
            .await
        {
            Ok(ticket) => ticket,
            Err(err) => {
                warn!("Search embedding not queued, using text match: {}", err);
                return None;
            }
        };

        match ticket.wait_until_finished(self.settings.embed_timeout).await {
            Ok(outcome) => match (outcome.status, outcome.data) {
                (JobStatus::Done, JobData::Vector(vector)) if !vector.is_empty() => Some(vector),
                (status, _) => {
                    warn!(
                        "Search embedding finished as {}, using text match: {}",
                        status.as_str(),
                        outcome.message.unwrap_or_default()
                    );
                    None
                }
            },
            Err(err) => {
                warn!("Search embedding unavailable, using text match: {}", err);
                None
            }
        }
    }
}

/// Keeps hits at or above the floor. Hits without a similarity never pass.
fn apply_floor(hits: Vec<SearchHit>, min_similarity: f64) -> Vec<SearchHit> {
    hits.into_iter()
        .filter(|hit| hit.similarity.is_some_and(|s| s >= min_similarity))
        .collect()
}
