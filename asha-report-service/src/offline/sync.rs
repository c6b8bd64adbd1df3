//! Background sync queue for report submissions made while offline.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct QueuedReport {
    pub id: String,
    pub payload: Value,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReplayOutcome {
    pub delivered: usize,
    pub remaining: usize,
}

/// Queue of report submissions awaiting delivery. Delivered entries are
/// evicted; failed ones stay queued for the next sync trigger.
pub struct SyncQueue {
    http: reqwest::Client,
    entries: Mutex<Vec<QueuedReport>>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub async fn enqueue(&self, payload: Value) -> String {
        let entry = QueuedReport {
            id: Uuid::new_v4().to_string(),
            payload,
            queued_at: Utc::now(),
        };
        let id = entry.id.clone();
        debug!(id = %id, "report queued for background sync");
        self.entries.lock().await.push(entry);
        id
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// POST every queued entry to `endpoint`. Entries accepted by the server
    /// are removed; everything else remains queued.
    pub async fn replay(&self, endpoint: &str) -> ReplayOutcome {
        let mut entries = self.entries.lock().await;
        let mut kept = Vec::new();
        let mut delivered = 0;

        for entry in entries.drain(..) {
            match self.http.post(endpoint).json(&entry.payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(id = %entry.id, "queued report delivered");
                    delivered += 1;
                }
                Ok(response) => {
                    warn!(id = %entry.id, status = %response.status(), "sync rejected, keeping queued");
                    kept.push(entry);
                }
                Err(err) => {
                    warn!(id = %entry.id, error = %err, "sync failed, keeping queued");
                    kept.push(entry);
                }
            }
        }

        *entries = kept;
        ReplayOutcome {
            delivered,
            remaining: entries.len(),
        }
    }
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn failed_deliveries_remain_queued_for_the_next_trigger() {
        let queue = SyncQueue::new();
        queue.enqueue(json!({"report": 1})).await;
        queue.enqueue(json!({"report": 2})).await;
        assert_eq!(queue.len().await, 2);

        // Nothing is listening here, so every delivery fails.
        let outcome = queue.replay("http://127.0.0.1:1/api/reports").await;
        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.remaining, 2);
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn queue_starts_empty() {
        let queue = SyncQueue::new();
        assert!(queue.is_empty().await);
        let outcome = queue.replay("http://127.0.0.1:1/api/reports").await;
        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.remaining, 0);
    }
}
