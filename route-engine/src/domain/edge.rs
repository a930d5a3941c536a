//! Graph edges and their travel-time functions.

use serde::{Deserialize, Serialize};

use super::{AgencyId, Coordinate, EdgeAccessibility, EdgeId, Mode, NodeId, Timestamp, TripId};

/// Half-open validity interval `[start, end)` for a scheduled edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: Timestamp) -> bool {
        self.start <= t && t < self.end
    }
}

/// One scheduled instance of a transit edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledDeparture {
    pub trip: TripId,
    pub departure: Timestamp,
    pub duration_secs: i64,
}

impl ScheduledDeparture {
    pub fn new(trip: impl Into<String>, departure: Timestamp, duration_secs: i64) -> Self {
        Self {
            trip: TripId::new(trip),
            departure,
            duration_secs,
        }
    }

    pub fn arrival(&self) -> Timestamp {
        self.departure + self.duration_secs
    }
}

/// How long an edge takes as a function of departure time.
#[derive(Debug, Clone, PartialEq)]
pub enum TravelTime {
    /// Distance divided by the mode's speed, at any time.
    Street,
    /// Timetable lookup; sorted by departure.
    Schedule(Vec<ScheduledDeparture>),
}

/// Fare information attached to an edge by the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FareData {
    #[default]
    Free,
    Amount(f64),
    Unknown,
}

/// A directed edge in a graph snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub mode: Mode,
    pub geometry: Vec<Coordinate>,
    pub distance_m: f64,
    pub travel_time: TravelTime,
    /// Validity windows for scheduled edges. Empty means unrestricted.
    pub windows: Vec<TimeWindow>,
    pub fare: FareData,
    pub accessibility: EdgeAccessibility,
    /// Operator of a scheduled edge, used to find its realtime overlay.
    pub agency: Option<AgencyId>,
}

impl Edge {
    /// Scheduled instances, empty for street edges.
    pub fn schedule(&self) -> &[ScheduledDeparture] {
        match &self.travel_time {
            TravelTime::Street => &[],
            TravelTime::Schedule(departures) => departures,
        }
    }

    /// True if the edge exists for a departure at `t`.
    pub fn valid_at(&self, t: Timestamp) -> bool {
        self.windows.is_empty() || self.windows.iter().any(|w| w.contains(t))
    }
}
