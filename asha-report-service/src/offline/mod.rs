//! Offline resilience layer: the asset-cache strategy table, the
//! connectivity monitor, the offline report sync queue, and the update
//! protocol for rolling out new app versions.

pub mod cache;
pub mod connectivity;
pub mod sync;
pub mod update;

pub use cache::{AssetFetcher, BoundedCache, CachedAsset, FetchError, RequestClass, Strategy};
pub use connectivity::{ConnectivityMonitor, spawn_reconnect_sync};
pub use sync::{ReplayOutcome, SyncQueue};
pub use update::{UPDATE_POLL_PERIOD, UpdateMonitor};
