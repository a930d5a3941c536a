//! Realtime delay and cancellation facts.
//!
//! An overlay belongs to one agency and is replaced wholesale on refresh.
//! Queries never read the store directly: they take an [`OverlayView`],
//! a point-in-time copy that also fixes "now" for freshness checks.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{AgencyId, Timestamp, TripId};

/// Live status of one trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TripStatus {
    /// Seconds the trip runs behind its schedule. Negative when early.
    pub delay_secs: i64,
    pub cancelled: bool,
}

impl TripStatus {
    pub fn delayed(delay_secs: i64) -> Self {
        Self {
            delay_secs,
            cancelled: false,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            delay_secs: 0,
            cancelled: true,
        }
    }
}

/// Realtime facts for the trips of one agency.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeOverlay {
    pub agency: AgencyId,
    pub fetched_at: Timestamp,
    pub trips: HashMap<TripId, TripStatus>,
}

impl RealtimeOverlay {
    pub fn new(agency: impl Into<String>, fetched_at: Timestamp) -> Self {
        Self {
            agency: AgencyId::new(agency),
            fetched_at,
            trips: HashMap::new(),
        }
    }

    pub fn with_trip(mut self, trip: impl Into<String>, status: TripStatus) -> Self {
        self.trips.insert(TripId::new(trip), status);
        self
    }

    pub fn status(&self, trip: &TripId) -> Option<TripStatus> {
        self.trips.get(trip).copied()
    }
}

/// What the overlay says about a scheduled trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayLookup {
    /// A fresh overlay exists; `None` means it has no entry for the trip,
    /// which is taken as running to schedule.
    Live(Option<TripStatus>),
    /// The agency's overlay is older than the freshness threshold. Its
    /// delays are no longer trusted but its cancellations still stand.
    Stale { cancelled: bool },
    /// No overlay for the agency, or the edge names no agency.
    Missing,
}

/// Point-in-time set of overlays used by one query.
#[derive(Debug, Clone, Default)]
pub struct OverlayView {
    overlays: BTreeMap<AgencyId, Arc<RealtimeOverlay>>,
    now: Option<Timestamp>,
    freshness_secs: i64,
}

impl OverlayView {
    pub fn new(
        overlays: BTreeMap<AgencyId, Arc<RealtimeOverlay>>,
        now: Timestamp,
        freshness_secs: i64,
    ) -> Self {
        Self {
            overlays,
            now: Some(now),
            freshness_secs,
        }
    }

    /// A view with no realtime data at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lookup(&self, agency: Option<&AgencyId>, trip: &TripId) -> OverlayLookup {
        let Some(overlay) = agency.and_then(|a| self.overlays.get(a)) else {
            return OverlayLookup::Missing;
        };
        match self.now {
            Some(now) if now.secs_since(overlay.fetched_at) > self.freshness_secs => {
                OverlayLookup::Stale {
                    cancelled: overlay.status(trip).is_some_and(|s| s.cancelled),
                }
            }
            _ => OverlayLookup::Live(overlay.status(trip)),
        }
    }

    pub fn agencies(&self) -> impl Iterator<Item = &AgencyId> {
        self.overlays.keys()
    }
}
