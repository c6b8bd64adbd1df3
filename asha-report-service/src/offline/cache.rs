//! Declarative cache policy for asset delivery.
//!
//! Three asset classes map to three strategies, each backed by a bounded,
//! time-expiring cache:
//!
//! | class      | strategy               | cache    | cap          |
//! |------------|------------------------|----------|--------------|
//! | navigation | network-first          | `pages`  | 50 / 24 h    |
//! | asset      | stale-while-revalidate | `assets` | 60 / 30 days |
//! | image      | cache-first            | `images` | 60 / 30 days |
//!
//! Navigations that fail while nothing is cached fall back to the designated
//! offline page. Only status-200 responses are cached, except images, where
//! opaque (status 0) responses are accepted too.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("asset fetch failed: {0}")]
    Network(String),
}

#[derive(Debug, Clone)]
pub struct CachedAsset {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
    pub stored_at: DateTime<Utc>,
}

impl CachedAsset {
    pub fn fresh(status: u16, content_type: impl Into<String>, body: Bytes) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body,
            stored_at: Utc::now(),
        }
    }
}

/// Named cache with an entry cap and a maximum age. Expired entries are
/// dropped on lookup; inserts evict oldest-first past the cap.
pub struct BoundedCache {
    name: &'static str,
    max_entries: usize,
    max_age: Duration,
    entries: DashMap<String, CachedAsset>,
}

impl BoundedCache {
    pub fn new(name: &'static str, max_entries: usize, max_age: Duration) -> Self {
        Self {
            name,
            max_entries,
            max_age,
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, url: &str) -> Option<CachedAsset> {
        let expired = {
            let entry = self.entries.get(url)?;
            Utc::now() - entry.stored_at > self.max_age
        };
        if expired {
            debug!(cache = self.name, url, "evicting expired entry");
            self.entries.remove(url);
            return None;
        }
        self.entries.get(url).map(|entry| entry.clone())
    }

    pub fn insert(&self, url: impl Into<String>, asset: CachedAsset) {
        self.entries.insert(url.into(), asset);
        while self.entries.len() > self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.stored_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    debug!(cache = self.name, url = %key, "evicting oldest entry over cap");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Navigation,
    Asset,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NetworkFirst,
    StaleWhileRevalidate,
    CacheFirst,
}

pub fn strategy_for(class: RequestClass) -> Strategy {
    match class {
        RequestClass::Navigation => Strategy::NetworkFirst,
        RequestClass::Asset => Strategy::StaleWhileRevalidate,
        RequestClass::Image => Strategy::CacheFirst,
    }
}

fn cacheable(class: RequestClass, status: u16) -> bool {
    match class {
        // Opaque cross-origin responses surface as status 0 and are accepted
        // for images only.
        RequestClass::Image => status == 0 || status == 200,
        _ => status == 200,
    }
}

/// Fetches assets through the strategy table.
#[derive(Clone)]
pub struct AssetFetcher {
    http: reqwest::Client,
    pages: std::sync::Arc<BoundedCache>,
    assets: std::sync::Arc<BoundedCache>,
    images: std::sync::Arc<BoundedCache>,
    offline_page: CachedAsset,
}

impl AssetFetcher {
    pub fn new(offline_page: CachedAsset) -> Self {
        Self {
            http: reqwest::Client::new(),
            pages: std::sync::Arc::new(BoundedCache::new("pages", 50, Duration::hours(24))),
            assets: std::sync::Arc::new(BoundedCache::new("assets", 60, Duration::days(30))),
            images: std::sync::Arc::new(BoundedCache::new("images", 60, Duration::days(30))),
            offline_page,
        }
    }

    fn cache_for(&self, class: RequestClass) -> &BoundedCache {
        match class {
            RequestClass::Navigation => &self.pages,
            RequestClass::Asset => &self.assets,
            RequestClass::Image => &self.images,
        }
    }

    pub async fn fetch(&self, class: RequestClass, url: &str) -> Result<CachedAsset, FetchError> {
        match strategy_for(class) {
            Strategy::NetworkFirst => self.network_first(class, url).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(class, url).await,
            Strategy::CacheFirst => self.cache_first(class, url).await,
        }
    }

    async fn network_first(&self, class: RequestClass, url: &str) -> Result<CachedAsset, FetchError> {
        match self.fetch_network(url).await {
            Ok(asset) => {
                if cacheable(class, asset.status) {
                    self.cache_for(class).insert(url, asset.clone());
                }
                Ok(asset)
            }
            Err(err) => {
                // Offline: serve the cached page, or the offline fallback.
                warn!(url, error = %err, "navigation fetch failed, serving cache");
                Ok(self
                    .cache_for(class)
                    .get(url)
                    .unwrap_or_else(|| self.offline_page.clone()))
            }
        }
    }

    async fn stale_while_revalidate(
        &self,
        class: RequestClass,
        url: &str,
    ) -> Result<CachedAsset, FetchError> {
        if let Some(hit) = self.cache_for(class).get(url) {
            // Serve stale, refresh in the background.
            let fetcher = self.clone();
            let url = url.to_string();
            tokio::spawn(async move {
                if let Ok(asset) = fetcher.fetch_network(&url).await {
                    if cacheable(class, asset.status) {
                        fetcher.cache_for(class).insert(&url, asset);
                    }
                }
            });
            return Ok(hit);
        }

        let asset = self.fetch_network(url).await?;
        if cacheable(class, asset.status) {
            self.cache_for(class).insert(url, asset.clone());
        }
        Ok(asset)
    }

    async fn cache_first(&self, class: RequestClass, url: &str) -> Result<CachedAsset, FetchError> {
        if let Some(hit) = self.cache_for(class).get(url) {
            return Ok(hit);
        }
        let asset = self.fetch_network(url).await?;
        if cacheable(class, asset.status) {
            self.cache_for(class).insert(url, asset.clone());
        }
        Ok(asset)
    }

    async fn fetch_network(&self, url: &str) -> Result<CachedAsset, FetchError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(CachedAsset::fresh(status, content_type, body))
    }

    pub fn cache_sizes(&self) -> (usize, usize, usize) {
        (self.pages.len(), self.assets.len(), self.images.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(body: &str) -> CachedAsset {
        CachedAsset::fresh(200, "text/html", Bytes::from(body.to_string()))
    }

    #[test]
    fn the_policy_table_matches_the_asset_classes() {
        assert_eq!(strategy_for(RequestClass::Navigation), Strategy::NetworkFirst);
        assert_eq!(
            strategy_for(RequestClass::Asset),
            Strategy::StaleWhileRevalidate
        );
        assert_eq!(strategy_for(RequestClass::Image), Strategy::CacheFirst);
    }

    #[test]
    fn only_images_accept_opaque_responses() {
        assert!(cacheable(RequestClass::Image, 0));
        assert!(cacheable(RequestClass::Image, 200));
        assert!(!cacheable(RequestClass::Navigation, 0));
        assert!(!cacheable(RequestClass::Asset, 0));
        assert!(!cacheable(RequestClass::Navigation, 404));
    }

    #[test]
    fn expired_entries_are_dropped_on_lookup() {
        let cache = BoundedCache::new("test", 10, Duration::hours(24));
        let mut stale = asset("old page");
        stale.stored_at = Utc::now() - Duration::hours(25);
        cache.insert("/page", stale);

        assert!(cache.get("/page").is_none());
        assert!(cache.is_empty());

        cache.insert("/page", asset("fresh page"));
        assert!(cache.get("/page").is_some());
    }

    #[test]
    fn inserts_evict_oldest_first_past_the_cap() {
        let cache = BoundedCache::new("test", 3, Duration::hours(24));
        for i in 0..3 {
            let mut entry = asset("body");
            // Strictly increasing ages, oldest at /url-0.
            entry.stored_at = Utc::now() - Duration::minutes(30 - i);
            cache.insert(format!("/url-{i}"), entry);
        }

        cache.insert("/url-3", asset("newest"));
        assert_eq!(cache.len(), 3);
        assert!(cache.get("/url-0").is_none());
        assert!(cache.get("/url-3").is_some());
    }

    #[tokio::test]
    async fn offline_navigation_falls_back_to_the_offline_page() {
        let fetcher = AssetFetcher::new(asset("<h1>offline</h1>"));
        // Nothing is listening here; the network fetch fails.
        let result = fetcher
            .fetch(RequestClass::Navigation, "http://127.0.0.1:1/index.html")
            .await
            .unwrap();
        assert_eq!(result.body, Bytes::from("<h1>offline</h1>"));
    }

    #[tokio::test]
    async fn offline_navigation_prefers_a_cached_page_over_the_fallback() {
        let fetcher = AssetFetcher::new(asset("offline"));
        fetcher
            .cache_for(RequestClass::Navigation)
            .insert("http://127.0.0.1:1/index.html", asset("cached page"));

        let result = fetcher
            .fetch(RequestClass::Navigation, "http://127.0.0.1:1/index.html")
            .await
            .unwrap();
        assert_eq!(result.body, Bytes::from("cached page"));
    }

    #[tokio::test]
    async fn cached_images_are_served_without_touching_the_network() {
        let fetcher = AssetFetcher::new(asset("offline"));
        fetcher
            .cache_for(RequestClass::Image)
            .insert("http://127.0.0.1:1/logo.png", asset("png bytes"));

        let result = fetcher
            .fetch(RequestClass::Image, "http://127.0.0.1:1/logo.png")
            .await
            .unwrap();
        assert_eq!(result.body, Bytes::from("png bytes"));
    }

    #[tokio::test]
    async fn stale_assets_are_served_while_revalidation_happens_in_background() {
        let fetcher = AssetFetcher::new(asset("offline"));
        fetcher
            .cache_for(RequestClass::Asset)
            .insert("http://127.0.0.1:1/app.js", asset("stale js"));

        let result = fetcher
            .fetch(RequestClass::Asset, "http://127.0.0.1:1/app.js")
            .await
            .unwrap();
        // The stale copy comes back immediately even though revalidation
        // against the dead endpoint fails.
        assert_eq!(result.body, Bytes::from("stale js"));
    }
}
