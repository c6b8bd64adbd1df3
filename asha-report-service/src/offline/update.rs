//! Update protocol: poll for a new app version while running, and activate a
//! pending version on an explicit one-way "skip waiting" control message.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// How often the running app checks for a new version.
pub const UPDATE_POLL_PERIOD: Duration = Duration::from_secs(60 * 60);

pub struct UpdateMonitor {
    http: reqwest::Client,
    version_url: String,
    current: Mutex<String>,
    pending: Mutex<Option<String>>,
    tx: watch::Sender<bool>,
}

impl UpdateMonitor {
    pub fn new(version_url: impl Into<String>, current_version: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            http: reqwest::Client::new(),
            version_url: version_url.into(),
            current: Mutex::new(current_version.into()),
            pending: Mutex::new(None),
            tx,
        }
    }

    pub fn current_version(&self) -> String {
        self.current.lock().expect("version lock poisoned").clone()
    }

    pub fn update_available(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Fetch the published version once; stage it and signal subscribers when
    /// it differs from the running one.
    pub async fn check_now(&self) -> Result<bool, super::cache::FetchError> {
        let version = self
            .http
            .get(&self.version_url)
            .send()
            .await
            .map_err(|e| super::cache::FetchError::Network(e.to_string()))?
            .text()
            .await
            .map_err(|e| super::cache::FetchError::Network(e.to_string()))?
            .trim()
            .to_string();

        Ok(self.stage(version))
    }

    /// Stage a discovered version; returns whether an update became pending.
    pub fn stage(&self, version: String) -> bool {
        if version.is_empty() || version == self.current_version() {
            return false;
        }
        info!(version = %version, "new version available");
        *self.pending.lock().expect("version lock poisoned") = Some(version);
        self.tx.send_replace(true);
        true
    }

    /// One-way control message: activate the pending version immediately.
    /// Returns the version that became current, if any was pending.
    pub fn skip_waiting(&self) -> Option<String> {
        let pending = self.pending.lock().expect("version lock poisoned").take()?;
        *self.current.lock().expect("version lock poisoned") = pending.clone();
        self.tx.send_replace(false);
        info!(version = %pending, "activated pending version");
        Some(pending)
    }

    /// Poll for new versions on a fixed period, hourly by default.
    pub fn spawn_polling(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // the first tick fires immediately
            loop {
                ticker.tick().await;
                if let Err(err) = monitor.check_now().await {
                    warn!(error = %err, "version check failed");
                }
            }
        })
    }
}
