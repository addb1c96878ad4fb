//! Cached, on-demand taste vectors.

use crate::cache::{self, KeyValueCache};
use crate::jobs::{JobData, JobQueue, JobRequest, JobStatus, SingleFlight, TasteVectors};
use crate::server::metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TASTE_VECTOR_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_millis(5000);

fn cache_key(listener_id: &str) -> String {
    format!("user_vectors:{}", listener_id)
}

/// Resolves a listener's taste vectors: cache first, then a `for_you` job
/// with a bounded wait. Never fails; anything that goes wrong yields empty
/// vectors so feeds fall back to their cold-start ordering.
pub struct TasteVectorProvider {
    cache: Arc<dyn KeyValueCache>,
    queue: Arc<dyn JobQueue>,
    flights: SingleFlight<String, TasteVectors>,
    ttl: Duration,
    generation_timeout: Duration,
}

impl TasteVectorProvider {
    pub fn new(
        cache: Arc<dyn KeyValueCache>,
        queue: Arc<dyn JobQueue>,
        ttl: Duration,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            queue,
            flights: SingleFlight::new(),
            ttl,
            generation_timeout,
        }
    }

    pub async fn resolve(&self, listener_id: Option<&str>) -> TasteVectors {
        let Some(listener_id) = listener_id else {
            metrics::record_taste_vector_resolution("anonymous");
            return TasteVectors::empty();
        };

        let key = cache_key(listener_id);
        if let Some(raw) = cache::get_or_miss(self.cache.as_ref(), &key).await {
            match serde_json::from_str::<TasteVectors>(&raw) {
                Ok(taste) => {
                    debug!("Taste vectors for {} served from cache", listener_id);
                    metrics::record_taste_vector_resolution("cache");
                    return taste;
                }
                Err(err) => warn!("Discarding unreadable cached taste vectors {}: {}", key, err),
            }
        }

        let cache = self.cache.clone();
        let queue = self.queue.clone();
        let ttl = self.ttl;
        let timeout = self.generation_timeout;
        let listener = listener_id.to_string();
        self.flights
            .run(listener_id.to_string(), move || {
                generate(cache, queue, listener, ttl, timeout)
            })
            .await
    }
}

async fn generate(
    cache: Arc<dyn KeyValueCache>,
    queue: Arc<dyn JobQueue>,
    listener_id: String,
    ttl: Duration,
    timeout: Duration,
) -> TasteVectors {
    let ticket = match queue
        .enqueue(JobRequest::ForYou {
            listener_id: listener_id.clone(),
            recent: false,
        })
        .await
    {
        Ok(ticket) => ticket,
        Err(err) => {
            warn!("Could not enqueue taste vector job for {}: {}", listener_id, err);
            metrics::record_taste_vector_resolution("fallback");
            return TasteVectors::empty();
        }
    };

    let outcome = match ticket.wait_until_finished(timeout).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!("Taste vectors for {} unavailable: {}", listener_id, err);
            metrics::record_taste_vector_resolution("fallback");
            return TasteVectors::empty();
        }
    };

    match (outcome.status, outcome.data) {
        (JobStatus::Done, JobData::Taste(taste)) => {
            match serde_json::to_string(&taste) {
                Ok(raw) => {
                    cache::set_best_effort(cache.as_ref(), &cache_key(&listener_id), ttl, raw).await
                }
                Err(err) => warn!("Could not serialize taste vectors: {}", err),
            }
            metrics::record_taste_vector_resolution("generated");
            taste
        }
        (status, _) => {
            warn!(
                "Taste vector job for {} finished as {}: {}",
                listener_id,
                status.as_str(),
                outcome.message.unwrap_or_default()
            );
            metrics::record_taste_vector_resolution("fallback");
            TasteVectors::empty()
        }
    }
}
