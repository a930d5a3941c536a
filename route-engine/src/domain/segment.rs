//! Journey segments.
//!
//! A `JourneySegment` is one mode-homogeneous leg of a route: a stretch of
//! walking, a ride on a single transit trip, and so on. The router produces
//! them by grouping consecutive edge traversals.

use std::ops::Add;

use serde::Serialize;

use super::{Coordinate, EdgeId, FareData, Mode, NodeId, Timestamp, TripId};

/// Fare of a segment: an amount, or explicitly unknown.
///
/// Unknown is a distinct value and never stands in for zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fare {
    Known(f64),
    Unknown,
}

impl Fare {
    pub fn amount(&self) -> Option<f64> {
        match self {
            Fare::Known(amount) => Some(*amount),
            Fare::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Fare::Unknown)
    }
}

impl Add for Fare {
    type Output = Fare;

    fn add(self, rhs: Fare) -> Fare {
        match (self, rhs) {
            (Fare::Known(a), Fare::Known(b)) => Fare::Known(a + b),
            _ => Fare::Unknown,
        }
    }
}

impl From<FareData> for Fare {
    fn from(data: FareData) -> Self {
        match data {
            FareData::Free => Fare::Known(0.0),
            FareData::Amount(amount) => Fare::Known(amount),
            FareData::Unknown => Fare::Unknown,
        }
    }
}

/// How far the timing of a segment can be trusted.
///
/// Ordered from most to least trustworthy, so `max` gives the weakest link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingConfidence {
    /// Unscheduled travel (walking, cycling, rideshare).
    Static,
    /// Scheduled travel checked against a fresh realtime overlay.
    Live,
    /// Scheduled travel with no fresh overlay; timetable times only.
    Degraded,
}

/// Whether the accessibility of a segment has been established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessibilityConfidence {
    /// The query did not ask for accessible routing.
    NotEvaluated,
    /// Every edge and node is known to be compatible.
    Confirmed,
    /// At least one edge or node has unknown compatibility.
    Uncertain,
}

/// One mode-homogeneous leg of a route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JourneySegment {
    pub mode: Mode,
    pub origin: NodeId,
    pub destination: NodeId,
    pub departure: Timestamp,
    pub arrival: Timestamp,
    pub distance_m: f64,
    pub geometry: Vec<Coordinate>,
    pub fare: Fare,
    pub emissions_g: f64,
    pub accessibility: AccessibilityConfidence,
    pub timing: TimingConfidence,
    /// The transit trip ridden, if any.
    pub trip: Option<TripId>,
    /// Delay applied from the realtime overlay, in seconds.
    pub delay_secs: i64,
    /// Edges traversed, in order.
    pub edges: Vec<EdgeId>,
}

impl JourneySegment {
    pub fn duration_secs(&self) -> i64 {
        self.arrival.secs_since(self.departure)
    }

    pub fn is_transit(&self) -> bool {
        self.mode.is_scheduled()
    }
}
