//! Ad selection policies.
//!
//! Selectors return advertisement ids; the assembler resolves the id to the
//! ad's audio through the catalog store.

use crate::catalog_store::CatalogStore;
use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Request-level inputs available to a selector.
#[derive(Clone, Copy, Debug)]
pub struct AdContext<'a> {
    pub track_id: &'a str,
    /// Unix seconds.
    pub now: i64,
}

#[async_trait]
pub trait AdSelector: Send + Sync {
    async fn select_ad(&self, listener_id: &str, ctx: AdContext<'_>) -> Result<Option<String>>;
}

pub struct NoAds;

#[async_trait]
impl AdSelector for NoAds {
    async fn select_ad(&self, _listener_id: &str, _ctx: AdContext<'_>) -> Result<Option<String>> {
        Ok(None)
    }
}

pub struct StaticAdSelector {
    ad_id: String,
}

impl StaticAdSelector {
    pub fn new(ad_id: impl Into<String>) -> Self {
        Self {
            ad_id: ad_id.into(),
        }
    }
}

#[async_trait]
impl AdSelector for StaticAdSelector {
    async fn select_ad(&self, _listener_id: &str, _ctx: AdContext<'_>) -> Result<Option<String>> {
        Ok(Some(self.ad_id.clone()))
    }
}

/// Picks one of the active ads per listener per rotation window. The choice
/// is a pure function of (listener, window index, active ad set), so every
/// request inside one window sees the same ad.
pub struct RotatingAdSelector {
    store: Arc<dyn CatalogStore>,
    window_secs: i64,
}

impl RotatingAdSelector {
    pub fn new(store: Arc<dyn CatalogStore>, window: Duration) -> Self {
        Self {
            store,
            window_secs: (window.as_secs() as i64).max(1),
        }
    }

    fn pick<'a>(&self, ads: &'a [String], listener_id: &str, now: i64) -> Option<&'a String> {
        if ads.is_empty() {
            return None;
        }
        let window = now.div_euclid(self.window_secs);
        let mut hasher = Sha256::new();
        hasher.update(listener_id.as_bytes());
        hasher.update(b":");
        hasher.update(window.to_be_bytes());
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let index = u64::from_be_bytes(head) % ads.len() as u64;
        ads.get(index as usize)
    }
}

#[async_trait]
impl AdSelector for RotatingAdSelector {
    async fn select_ad(&self, listener_id: &str, ctx: AdContext<'_>) -> Result<Option<String>> {
        let store = self.store.clone();
        let ads = tokio::task::spawn_blocking(move || store.list_active_advertisement_ids()).await??;
        Ok(self.pick(&ads, listener_id, ctx.now).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::test_support::TestCatalog;
    use crate::catalog_store::MockCatalogStore;

    fn ctx(now: i64) -> AdContext<'static> {
        AdContext { track_id: "t1", now }
    }

    #[tokio::test]
    async fn fixed_selectors() {
        assert_eq!(NoAds.select_ad("u1", ctx(0)).await.unwrap(), None);
        assert_eq!(
            StaticAdSelector::new("ad-1").select_ad("u1", ctx(0)).await.unwrap(),
            Some("ad-1".to_string())
        );
    }

    #[tokio::test]
    async fn rotation_is_stable_within_a_window() {
        let catalog = TestCatalog::new();
        for id in ["a1", "a2", "a3", "a4"] {
            catalog.advertisement(id, &format!("audio-{}", id), true);
        }
        let selector = RotatingAdSelector::new(catalog.store.clone(), Duration::from_secs(900));

        let first = selector.select_ad("u1", ctx(900)).await.unwrap();
        assert!(first.is_some());
        for now in [901, 1200, 1799] {
            assert_eq!(selector.select_ad("u1", ctx(now)).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn rotation_only_picks_active_ads() {
        let catalog = TestCatalog::new();
        catalog.advertisement("on", "audio-on", true);
        catalog.advertisement("off", "audio-off", false);
        let selector = RotatingAdSelector::new(catalog.store.clone(), Duration::from_secs(60));

        for now in (0..6000).step_by(60) {
            assert_eq!(
                selector.select_ad("u1", ctx(now)).await.unwrap(),
                Some("on".to_string())
            );
        }
    }

    #[tokio::test]
    async fn rotation_spreads_over_windows() {
        let catalog = TestCatalog::new();
        for id in ["a1", "a2", "a3"] {
            catalog.advertisement(id, &format!("audio-{}", id), true);
        }
        let selector = RotatingAdSelector::new(catalog.store.clone(), Duration::from_secs(60));

        let mut seen = std::collections::HashSet::new();
        for window in 0..60 {
            seen.insert(selector.select_ad("u1", ctx(window * 60)).await.unwrap());
        }
        assert!(seen.len() > 1);
    }

    #[tokio::test]
    async fn no_active_ads_selects_nothing() {
        let mut store = MockCatalogStore::new();
        store
            .expect_list_active_advertisement_ids()
            .returning(|| Ok(vec![]));
        let selector = RotatingAdSelector::new(Arc::new(store), Duration::from_secs(60));
        assert_eq!(selector.select_ad("u1", ctx(0)).await.unwrap(), None);
    }
}
