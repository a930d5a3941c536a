//! Current overlay per agency.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::{AgencyId, Timestamp};

use super::{FeedError, OverlayFeed, OverlayView, RealtimeOverlay};

/// Thread-safe registry of the latest overlay for each agency.
///
/// Overlays are replaced wholesale. A query takes an [`OverlayView`] once
/// and is unaffected by refreshes that land while it runs.
#[derive(Clone, Default)]
pub struct OverlayStore {
    inner: Arc<RwLock<BTreeMap<AgencyId, Arc<RealtimeOverlay>>>>,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an overlay. Returns false, leaving the store unchanged, if
    /// the agency already has a newer one.
    pub async fn install(&self, overlay: RealtimeOverlay) -> bool {
        let mut guard = self.inner.write().await;
        if let Some(current) = guard.get(&overlay.agency) {
            if current.fetched_at > overlay.fetched_at {
                tracing::warn!(
                    agency = %overlay.agency,
                    offered = %overlay.fetched_at,
                    current = %current.fetched_at,
                    "ignoring out-of-order overlay"
                );
                return false;
            }
        }
        tracing::debug!(agency = %overlay.agency, trips = overlay.trips.len(), "installed overlay");
        guard.insert(overlay.agency.clone(), Arc::new(overlay));
        true
    }

    /// Fetch a fresh overlay for `agency` from `feed` and install it.
    ///
    /// On failure the existing overlay is kept and the error returned.
    /// Returns the number of trips in the new overlay.
    pub async fn refresh<F: OverlayFeed>(
        &self,
        feed: &F,
        agency: &AgencyId,
    ) -> Result<usize, FeedError> {
        let overlay = feed.fetch_overlay(agency).await?;
        let count = overlay.trips.len();
        self.install(overlay).await;
        Ok(count)
    }

    pub async fn get(&self, agency: &AgencyId) -> Option<Arc<RealtimeOverlay>> {
        let guard = self.inner.read().await;
        guard.get(agency).cloned()
    }

    /// Point-in-time copy for one query.
    pub async fn view(&self, now: Timestamp, freshness_secs: i64) -> OverlayView {
        let guard = self.inner.read().await;
        OverlayView::new(guard.clone(), now, freshness_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TripId;
    use crate::realtime::{OverlayLookup, StaticOverlayFeed, TripStatus};

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[tokio::test]
    async fn refresh_replaces_wholesale() {
        let store = OverlayStore::new();
        let feed = StaticOverlayFeed::new();
        let agency = AgencyId::new("bmtc");

        feed.set(
            RealtimeOverlay::new("bmtc", ts("2025-01-15T08:00:00"))
                .with_trip("a", TripStatus::delayed(60))
                .with_trip("b", TripStatus::delayed(120)),
        )
        .await;
        assert_eq!(store.refresh(&feed, &agency).await.unwrap(), 2);

        feed.set(
            RealtimeOverlay::new("bmtc", ts("2025-01-15T08:01:00"))
                .with_trip("b", TripStatus::cancelled()),
        )
        .await;
        assert_eq!(store.refresh(&feed, &agency).await.unwrap(), 1);

        let overlay = store.get(&agency).await.unwrap();
        assert_eq!(overlay.status(&TripId::new("a")), None);
        assert_eq!(
            overlay.status(&TripId::new("b")),
            Some(TripStatus::cancelled())
        );
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_overlay() {
        let store = OverlayStore::new();
        store
            .install(RealtimeOverlay::new("bmtc", ts("2025-01-15T08:00:00")))
            .await;

        let feed = StaticOverlayFeed::new();
        assert!(store.refresh(&feed, &AgencyId::new("bmtc")).await.is_err());
        assert!(store.get(&AgencyId::new("bmtc")).await.is_some());
    }

    #[tokio::test]
    async fn older_overlay_is_ignored() {
        let store = OverlayStore::new();
        assert!(
            store
                .install(RealtimeOverlay::new("bmtc", ts("2025-01-15T08:05:00")))
                .await
        );
        assert!(
            !store
                .install(RealtimeOverlay::new("bmtc", ts("2025-01-15T08:00:00")))
                .await
        );
        let overlay = store.get(&AgencyId::new("bmtc")).await.unwrap();
        assert_eq!(overlay.fetched_at, ts("2025-01-15T08:05:00"));
    }

    #[tokio::test]
    async fn view_is_a_snapshot() {
        let store = OverlayStore::new();
        store
            .install(
                RealtimeOverlay::new("bmtc", ts("2025-01-15T08:59:00"))
                    .with_trip("t", TripStatus::delayed(600)),
            )
            .await;

        let view = store.view(ts("2025-01-15T09:00:00"), 300).await;
        store
            .install(RealtimeOverlay::new("bmtc", ts("2025-01-15T09:00:00")))
            .await;

        assert_eq!(
            view.lookup(Some(&AgencyId::new("bmtc")), &TripId::new("t")),
            OverlayLookup::Live(Some(TripStatus::delayed(600)))
        );
    }
}
