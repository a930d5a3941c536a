//! Route type.
//!
//! A `Route` is a complete trip from origin to destination made of one or
//! more journey segments. All structural invariants are checked in
//! [`Route::new`], so code holding a `Route` can rely on them.

use std::collections::BTreeSet;

use serde::Serialize;

use super::{
    AccessibilityConfidence, DomainError, EdgeId, Fare, JourneySegment, Mode, NodeId,
    TimingConfidence, Timestamp, TripId,
};

/// Sum of segment fares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalFare {
    /// Every segment fare is known.
    Known(f64),
    /// At least one segment fare is unknown; the known part is kept for
    /// display but is not a total.
    Unknown {
        known_subtotal: f64,
        unknown_segments: usize,
    },
}

impl TotalFare {
    fn from_segments(segments: &[JourneySegment]) -> Self {
        let mut known = 0.0;
        let mut unknown = 0;
        for segment in segments {
            match segment.fare {
                Fare::Known(amount) => known += amount,
                Fare::Unknown => unknown += 1,
            }
        }
        if unknown == 0 {
            TotalFare::Known(known)
        } else {
            TotalFare::Unknown {
                known_subtotal: known,
                unknown_segments: unknown,
            }
        }
    }

    pub fn amount(&self) -> Option<f64> {
        match self {
            TotalFare::Known(amount) => Some(*amount),
            TotalFare::Unknown { .. } => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TotalFare::Unknown { .. })
    }
}

/// A complete route.
///
/// # Invariants
///
/// - At least one segment
/// - Consecutive segments connect (destination of one = origin of next)
/// - No segment departs before the previous one arrives
/// - A change of mode leaves at least the minimum transfer gap
/// - The first departure is not after the last arrival
/// - `total_fare` is the sum of segment fares, or unknown if any is unknown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    segments: Vec<JourneySegment>,
    total_fare: TotalFare,
}

impl Route {
    /// Constructs a route, checking every invariant.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the segment list is empty, segments do not connect,
    /// overlap in time, change mode too quickly, or run backwards.
    pub fn new(
        segments: Vec<JourneySegment>,
        min_transfer_secs: i64,
    ) -> Result<Self, DomainError> {
        let (first, last) = match (segments.first(), segments.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(DomainError::EmptyRoute),
        };

        for segment in &segments {
            if segment.arrival < segment.departure {
                return Err(DomainError::InvertedRoute);
            }
        }

        for (i, pair) in segments.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);

            if prev.destination != next.origin {
                return Err(DomainError::Disconnected {
                    index: i,
                    from: prev.destination,
                    to: next.origin,
                });
            }

            let gap = next.departure.secs_since(prev.arrival);
            if gap < 0 {
                return Err(DomainError::OverlappingSegments { index: i });
            }

            if prev.mode != next.mode && gap < min_transfer_secs {
                return Err(DomainError::TransferTooShort {
                    index: i,
                    gap_secs: gap,
                    min_secs: min_transfer_secs,
                });
            }
        }

        if first.departure > last.arrival {
            return Err(DomainError::InvertedRoute);
        }

        let total_fare = TotalFare::from_segments(&segments);
        Ok(Route {
            segments,
            total_fare,
        })
    }

    /// Returns a copy with segment fares replaced, in order.
    ///
    /// Extra or missing entries leave the corresponding fares unchanged.
    pub fn with_fares(&self, fares: &[Fare]) -> Route {
        let mut segments = self.segments.clone();
        for (segment, fare) in segments.iter_mut().zip(fares) {
            segment.fare = *fare;
        }
        let total_fare = TotalFare::from_segments(&segments);
        Route {
            segments,
            total_fare,
        }
    }

    pub fn segments(&self) -> &[JourneySegment] {
        &self.segments
    }

    pub fn total_fare(&self) -> TotalFare {
        self.total_fare
    }

    pub fn origin(&self) -> NodeId {
        self.segments[0].origin
    }

    pub fn destination(&self) -> NodeId {
        self.segments[self.segments.len() - 1].destination
    }

    pub fn departure(&self) -> Timestamp {
        self.segments[0].departure
    }

    pub fn arrival(&self) -> Timestamp {
        self.segments[self.segments.len() - 1].arrival
    }

    pub fn duration_secs(&self) -> i64 {
        self.arrival().secs_since(self.departure())
    }

    /// Number of segment boundaries (mode or vehicle changes).
    pub fn transfer_count(&self) -> usize {
        self.segments.len() - 1
    }

    pub fn modes(&self) -> Vec<Mode> {
        self.segments.iter().map(|s| s.mode).collect()
    }

    /// Every edge used by the route.
    pub fn edge_set(&self) -> BTreeSet<EdgeId> {
        self.segments
            .iter()
            .flat_map(|s| s.edges.iter().copied())
            .collect()
    }

    /// Transit trips ridden, in order.
    pub fn trips(&self) -> impl Iterator<Item = &TripId> {
        self.segments.iter().filter_map(|s| s.trip.as_ref())
    }

    pub fn distance_m(&self) -> f64 {
        self.segments.iter().map(|s| s.distance_m).sum()
    }

    pub fn walk_distance_m(&self) -> f64 {
        self.segments
            .iter()
            .filter(|s| s.mode == Mode::Walk)
            .map(|s| s.distance_m)
            .sum()
    }

    pub fn emissions_g(&self) -> f64 {
        self.segments.iter().map(|s| s.emissions_g).sum()
    }

    /// Weakest timing confidence over all segments.
    pub fn timing(&self) -> TimingConfidence {
        self.segments
            .iter()
            .map(|s| s.timing)
            .max()
            .unwrap_or(TimingConfidence::Static)
    }

    /// Weakest accessibility confidence over all segments.
    pub fn accessibility(&self) -> AccessibilityConfidence {
        self.segments
            .iter()
            .map(|s| s.accessibility)
            .max()
            .unwrap_or(AccessibilityConfidence::NotEvaluated)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn ts(s: &str) -> Timestamp {
        Timestamp::parse(&format!("2025-01-15T{s}")).unwrap()
    }

    pub(crate) fn segment(
        mode: Mode,
        from: u32,
        to: u32,
        dep: &str,
        arr: &str,
        fare: Fare,
    ) -> JourneySegment {
        JourneySegment {
            mode,
            origin: NodeId(from),
            destination: NodeId(to),
            departure: ts(dep),
            arrival: ts(arr),
            distance_m: 1000.0,
            geometry: Vec::new(),
            fare,
            emissions_g: mode.emissions_g(1000.0),
            accessibility: AccessibilityConfidence::NotEvaluated,
            timing: if mode.is_scheduled() {
                TimingConfidence::Live
            } else {
                TimingConfidence::Static
            },
            trip: mode.is_scheduled().then(|| TripId::new(format!("T{from}"))),
            delay_secs: 0,
            edges: vec![EdgeId(from)],
        }
    }

    #[test]
    fn single_segment_route() {
        let route = Route::new(
            vec![segment(Mode::Bus, 0, 1, "09:00:00", "09:30:00", Fare::Known(20.0))],
            180,
        )
        .unwrap();

        assert_eq!(route.origin(), NodeId(0));
        assert_eq!(route.destination(), NodeId(1));
        assert_eq!(route.duration_secs(), 1800);
        assert_eq!(route.transfer_count(), 0);
        assert_eq!(route.total_fare(), TotalFare::Known(20.0));
        assert_eq!(route.trips().count(), 1);
    }

    #[test]
    fn walk_bus_walk_route() {
        let route = Route::new(
            vec![
                segment(Mode::Walk, 0, 1, "09:00:00", "09:05:00", Fare::Known(0.0)),
                segment(Mode::Bus, 1, 2, "09:08:00", "09:25:00", Fare::Known(25.0)),
                segment(Mode::Walk, 2, 3, "09:28:00", "09:33:00", Fare::Known(0.0)),
            ],
            180,
        )
        .unwrap();

        assert_eq!(route.transfer_count(), 2);
        assert_eq!(route.modes(), vec![Mode::Walk, Mode::Bus, Mode::Walk]);
        assert_eq!(route.walk_distance_m(), 2000.0);
        assert_eq!(route.edge_set().len(), 3);
        assert_eq!(route.timing(), TimingConfidence::Live);
    }

    #[test]
    fn empty_route_rejected() {
        assert!(matches!(Route::new(vec![], 180), Err(DomainError::EmptyRoute)));
    }

    #[test]
    fn disconnected_rejected() {
        let result = Route::new(
            vec![
                segment(Mode::Bus, 0, 1, "09:00:00", "09:30:00", Fare::Known(1.0)),
                segment(Mode::Bus, 5, 6, "09:40:00", "09:50:00", Fare::Known(1.0)),
            ],
            180,
        );
        assert!(matches!(result, Err(DomainError::Disconnected { index: 0, .. })));
    }

    #[test]
    fn overlap_rejected() {
        let result = Route::new(
            vec![
                segment(Mode::Bus, 0, 1, "09:00:00", "09:30:00", Fare::Known(1.0)),
                segment(Mode::Bus, 1, 2, "09:29:00", "09:50:00", Fare::Known(1.0)),
            ],
            180,
        );
        assert!(matches!(result, Err(DomainError::OverlappingSegments { index: 0 })));
    }

    #[test]
    fn short_mode_change_rejected() {
        let result = Route::new(
            vec![
                segment(Mode::Walk, 0, 1, "09:00:00", "09:05:00", Fare::Known(0.0)),
                segment(Mode::Bus, 1, 2, "09:07:59", "09:30:00", Fare::Known(1.0)),
            ],
            180,
        );
        assert!(matches!(
            result,
            Err(DomainError::TransferTooShort {
                gap_secs: 179,
                min_secs: 180,
                ..
            })
        ));
    }

    #[test]
    fn same_mode_change_needs_no_minimum() {
        let route = Route::new(
            vec![
                segment(Mode::Bus, 0, 1, "09:00:00", "09:30:00", Fare::Known(1.0)),
                segment(Mode::Bus, 1, 2, "09:30:00", "09:50:00", Fare::Known(1.0)),
            ],
            180,
        );
        assert!(route.is_ok());
    }

    #[test]
    fn unknown_fare_is_not_zero() {
        let route = Route::new(
            vec![
                segment(Mode::Bus, 0, 1, "09:00:00", "09:30:00", Fare::Known(2.0)),
                segment(Mode::Train, 1, 2, "09:35:00", "09:50:00", Fare::Unknown),
            ],
            180,
        )
        .unwrap();

        assert_eq!(
            route.total_fare(),
            TotalFare::Unknown {
                known_subtotal: 2.0,
                unknown_segments: 1
            }
        );
        assert_eq!(route.total_fare().amount(), None);
    }

    #[test]
    fn with_fares_recomputes_total() {
        let route = Route::new(
            vec![segment(Mode::Bus, 0, 1, "09:00:00", "09:30:00", Fare::Unknown)],
            180,
        )
        .unwrap();
        assert!(route.total_fare().is_unknown());

        let priced = route.with_fares(&[Fare::Known(3.0)]);
        assert_eq!(priced.total_fare(), TotalFare::Known(3.0));
    }
}
