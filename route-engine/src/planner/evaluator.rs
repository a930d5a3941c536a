//! Per-edge traversal at a point in time.
//!
//! The evaluator is the only place realtime data touches the search: the
//! router asks "can I take this edge if I'm ready at T?" and gets back a
//! concrete departure, arrival and cost figures, or `Unavailable`.

use crate::domain::{Edge, Fare, ScheduledDeparture, TimingConfidence, Timestamp, TripId};
use crate::realtime::{OverlayLookup, OverlayView};

/// Result of evaluating one edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Unavailable,
    Traversal(Traversal),
}

/// A concrete way of traversing an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    pub departure: Timestamp,
    pub arrival: Timestamp,
    pub fare: Fare,
    pub emissions_g: f64,
    /// Scheduled instance taken, for transit edges.
    pub trip: Option<TripId>,
    pub delay_secs: i64,
    pub timing: TimingConfidence,
}

impl Traversal {
    pub fn duration_secs(&self) -> i64 {
        self.arrival.secs_since(self.departure)
    }
}

/// Evaluates edges against a point-in-time overlay.
#[derive(Debug, Clone, Copy)]
pub struct EdgeEvaluator<'a> {
    overlay: &'a OverlayView,
}

impl<'a> EdgeEvaluator<'a> {
    pub fn new(overlay: &'a OverlayView) -> Self {
        Self { overlay }
    }

    /// Traverse `edge` with the traveller ready to leave at `ready`.
    ///
    /// Street edges depart immediately. Transit edges take the catchable,
    /// non-cancelled instance that arrives first.
    pub fn evaluate(&self, edge: &Edge, ready: Timestamp) -> Evaluation {
        let Some(duration) = edge.mode.street_duration_secs(edge.distance_m) else {
            let first = self
                .instances(edge, ready)
                .into_iter()
                .reduce(|best, t| if t.arrival < best.arrival { t } else { best });
            return match first {
                Some(traversal) => Evaluation::Traversal(traversal),
                None => Evaluation::Unavailable,
            };
        };
        Evaluation::Traversal(Traversal {
            departure: ready,
            arrival: ready + duration,
            fare: Fare::from(edge.fare),
            emissions_g: edge.mode.emissions_g(edge.distance_m),
            trip: None,
            delay_secs: 0,
            timing: TimingConfidence::Static,
        })
    }

    /// Traverse `edge` staying aboard `trip`.
    pub fn evaluate_trip(&self, edge: &Edge, trip: &TripId, ready: Timestamp) -> Evaluation {
        match self
            .instances(edge, ready)
            .into_iter()
            .find(|t| t.trip.as_ref() == Some(trip))
        {
            Some(traversal) => Evaluation::Traversal(traversal),
            None => Evaluation::Unavailable,
        }
    }

    /// Every trip that can be boarded on a scheduled edge at or after
    /// `ready`, each at its earliest-arriving instance, in schedule order.
    ///
    /// Street edges have no instances.
    pub fn instances(&self, edge: &Edge, ready: Timestamp) -> Vec<Traversal> {
        let mut found: Vec<Traversal> = Vec::new();

        for scheduled in edge.schedule() {
            let Some(traversal) = self.instance(edge, scheduled) else {
                continue;
            };
            if traversal.departure < ready {
                continue;
            }

            match found.iter_mut().find(|t| t.trip == traversal.trip) {
                Some(existing) if traversal.arrival < existing.arrival => *existing = traversal,
                Some(_) => {}
                None => found.push(traversal),
            }
        }
        found
    }

    /// One scheduled instance with realtime applied, or `None` if it is
    /// outside the edge's windows or cancelled.
    fn instance(&self, edge: &Edge, scheduled: &ScheduledDeparture) -> Option<Traversal> {
        if !edge.valid_at(scheduled.departure) {
            return None;
        }

        let (delay_secs, timing) = match self.overlay.lookup(edge.agency.as_ref(), &scheduled.trip)
        {
            OverlayLookup::Live(Some(status)) if status.cancelled => return None,
            OverlayLookup::Live(Some(status)) => (status.delay_secs, TimingConfidence::Live),
            OverlayLookup::Live(None) => (0, TimingConfidence::Live),
            OverlayLookup::Stale { cancelled: true } => return None,
            OverlayLookup::Stale { cancelled: false } | OverlayLookup::Missing => {
                (0, TimingConfidence::Degraded)
            }
        };

        let departure = scheduled.departure + delay_secs;
        Some(Traversal {
            departure,
            arrival: departure + scheduled.duration_secs.max(0),
            fare: Fare::from(edge.fare),
            emissions_g: edge.mode.emissions_g(edge.distance_m),
            trip: Some(scheduled.trip.clone()),
            delay_secs,
            timing,
        })
    }
}
