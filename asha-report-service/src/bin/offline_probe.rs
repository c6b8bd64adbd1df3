//! Drives the offline layer against a running service instance.
//!
//! Usage: offline_probe [BASE_URL]
//! (defaults to http://localhost:3001)

use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use asha_report_service::offline::{
    AssetFetcher, CachedAsset, ConnectivityMonitor, RequestClass, SyncQueue, UpdateMonitor,
    spawn_reconnect_sync,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:3001".to_string());

    println!("Probing offline layer against {base_url}");

    let offline_page = CachedAsset::fresh(
        200,
        "text/html",
        Bytes::from_static(b"<h1>You are offline</h1>"),
    );
    let fetcher = AssetFetcher::new(offline_page);

    // Navigation: network-first with offline fallback.
    let root = fetcher.fetch(RequestClass::Navigation, &base_url).await?;
    println!(
        "navigation fetch: status={} type={} bytes={}",
        root.status,
        root.content_type,
        root.body.len()
    );

    // Second fetch of the same URL exercises the pages cache.
    let again = fetcher.fetch(RequestClass::Navigation, &base_url).await?;
    println!("second navigation fetch: status={}", again.status);
    let (pages, assets, images) = fetcher.cache_sizes();
    println!("cache sizes: pages={pages} assets={assets} images={images}");

    // Queue a report while "offline", then replay it on reconnect.
    let monitor = ConnectivityMonitor::new(true);
    let queue = Arc::new(SyncQueue::new());
    let endpoint = format!("{base_url}/api/reports");
    let sync_task = spawn_reconnect_sync(&monitor, queue.clone(), endpoint);

    monitor.set_online(false);
    queue
        .enqueue(json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "case_id": uuid::Uuid::new_v4().to_string(),
            "language": "en",
            "patient": null,
            "extracted_text": "BP: 120/80",
            "summary": {
                "interpretation": "Normal blood pressure",
                "action_items": ["No action needed"],
                "model": "gemini-1.5-flash"
            },
            "image": null,
            "created_at": chrono::Utc::now().to_rfc3339()
        }))
        .await;
    println!("queued reports while offline: {}", queue.len().await);

    monitor.set_online(true);
    tokio::time::sleep(Duration::from_secs(2)).await;
    println!("queued reports after reconnect: {}", queue.len().await);

    // Update protocol: one poll plus an explicit skip-waiting activation.
    let updates = Arc::new(UpdateMonitor::new(
        format!("{base_url}/api/health"),
        "0.0.0",
    ));
    match updates.check_now().await {
        Ok(staged) => {
            println!("version check staged update: {staged}");
            if let Some(version) = updates.skip_waiting() {
                println!("activated version: {} chars", version.len());
            }
        }
        Err(err) => println!("version check failed: {err}"),
    }

    sync_task.abort();
    Ok(())
}
