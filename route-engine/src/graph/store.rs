//! Registry of the current snapshot per region.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::Coordinate;

use super::GraphSnapshot;

/// Errors from installing a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot version {offered} for region {region} is not newer than {current}")]
    StaleVersion {
        region: String,
        offered: u64,
        current: u64,
    },
}

/// Thread-safe registry of graph snapshots.
///
/// Readers take an `Arc` to the snapshot current at the time of the call
/// and keep using it even if a newer version is installed meanwhile.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<BTreeMap<String, Arc<GraphSnapshot>>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a snapshot, replacing the region's current one.
    ///
    /// Versions must increase per region.
    pub async fn install(&self, snapshot: GraphSnapshot) -> Result<Arc<GraphSnapshot>, StoreError> {
        let region = snapshot.region().id.clone();
        let mut guard = self.inner.write().await;

        if let Some(current) = guard.get(&region) {
            if snapshot.version() <= current.version() {
                return Err(StoreError::StaleVersion {
                    region,
                    offered: snapshot.version(),
                    current: current.version(),
                });
            }
        }

        let snapshot = Arc::new(snapshot);
        tracing::info!(region = %region, version = snapshot.version(), "installed snapshot");
        guard.insert(region, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Current snapshot for a region.
    pub async fn current(&self, region: &str) -> Option<Arc<GraphSnapshot>> {
        let guard = self.inner.read().await;
        guard.get(region).cloned()
    }

    /// The tightest region whose bounds contain both endpoints.
    pub async fn covering(
        &self,
        origin: &Coordinate,
        destination: &Coordinate,
    ) -> Option<Arc<GraphSnapshot>> {
        let guard = self.inner.read().await;
        guard
            .values()
            .filter(|s| {
                let bbox = &s.region().bbox;
                bbox.contains(origin) && bbox.contains(destination)
            })
            .min_by(|a, b| a.region().bbox.area().total_cmp(&b.region().bbox.area()))
            .cloned()
    }

    pub async fn regions(&self) -> Vec<String> {
        let guard = self.inner.read().await;
        guard.keys().cloned().collect()
    }
}
