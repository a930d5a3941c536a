//! Turning search paths into routes.

use crate::domain::{AccessibilityConfidence, Coordinate, DomainError, JourneySegment, Route};
use crate::graph::GraphSnapshot;

use super::router::{FoundPath, Step};

/// Group the steps of `path` into segments and build a checked [`Route`].
///
/// Consecutive steps share a segment when they use the same mode and the
/// same trip (or no trip, for street modes).
pub fn assemble(
    snapshot: &GraphSnapshot,
    path: &FoundPath,
    min_transfer_secs: i64,
) -> Result<Route, DomainError> {
    let mut groups: Vec<Vec<&Step>> = Vec::new();
    for step in &path.steps {
        let mode = snapshot.edge(step.edge).mode;
        let continues = groups.last().and_then(|g| g.last()).is_some_and(|prev| {
            snapshot.edge(prev.edge).mode == mode && prev.traversal.trip == step.traversal.trip
        });
        match groups.last_mut() {
            Some(group) if continues => group.push(step),
            _ => groups.push(vec![step]),
        }
    }

    let segments = groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let starts_uncertain = i == 0 && path.origin_uncertain;
            segment(snapshot, group, starts_uncertain, path.accessibility_checked)
        })
        .collect();

    Route::new(segments, min_transfer_secs)
}

fn segment(
    snapshot: &GraphSnapshot,
    steps: &[&Step],
    starts_uncertain: bool,
    accessibility_checked: bool,
) -> JourneySegment {
    let first = steps[0];
    let last = steps[steps.len() - 1];
    let first_edge = snapshot.edge(first.edge);
    let last_edge = snapshot.edge(last.edge);

    let mut geometry: Vec<Coordinate> = Vec::new();
    for step in steps {
        let edge = snapshot.edge(step.edge);
        let joined = geometry.last().is_some() && geometry.last() == edge.geometry.first();
        geometry.extend(edge.geometry.iter().skip(usize::from(joined)).copied());
    }

    let accessibility = if !accessibility_checked {
        AccessibilityConfidence::NotEvaluated
    } else if starts_uncertain || steps.iter().any(|s| s.uncertain) {
        AccessibilityConfidence::Uncertain
    } else {
        AccessibilityConfidence::Confirmed
    };

    JourneySegment {
        mode: first_edge.mode,
        origin: first_edge.source,
        destination: last_edge.target,
        departure: first.traversal.departure,
        arrival: last.traversal.arrival,
        distance_m: steps.iter().map(|s| snapshot.edge(s.edge).distance_m).sum(),
        geometry,
        fare: steps
            .iter()
            .map(|s| s.traversal.fare)
            .reduce(|a, b| a + b)
            .unwrap_or(first.traversal.fare),
        emissions_g: steps.iter().map(|s| s.traversal.emissions_g).sum(),
        accessibility,
        timing: steps
            .iter()
            .map(|s| s.traversal.timing)
            .max()
            .unwrap_or(first.traversal.timing),
        trip: first.traversal.trip.clone(),
        delay_secs: last.traversal.delay_secs,
        edges: steps.iter().map(|s| s.edge).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BoundingBox, EdgeId, Fare, FareData, Mode, NodeAccessibility, NodeKind, ScheduledDeparture,
        TimingConfidence, Timestamp, TripId,
    };
    use crate::graph::{EdgeSpec, SnapshotBuilder};
    use crate::planner::evaluator::Traversal;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(&format!("2025-01-15T{s}")).unwrap()
    }

    fn snapshot() -> GraphSnapshot {
        let mut b = SnapshotBuilder::new("t", BoundingBox::new(12.0, 77.0, 13.0, 78.0));
        let n: Vec<_> = (0..4)
            .map(|i| {
                b.add_node(
                    format!("n{i}"),
                    Coordinate::new(12.5, 77.5 + 0.001 * i as f64).unwrap(),
                    NodeKind::TransitStop,
                    NodeAccessibility::default(),
                )
            })
            .collect();
        b.add_edge(EdgeSpec::street(n[0], n[1], Mode::Walk, 100.0));
        for (from, to) in [(1, 2), (2, 3)] {
            b.add_edge(
                EdgeSpec::transit(
                    n[from],
                    n[to],
                    Mode::Bus,
                    100.0,
                    vec![ScheduledDeparture::new("T", ts("09:10:00"), 60)],
                )
                .fare(FareData::Amount(2.0)),
            );
        }
        b.build(1).unwrap()
    }

    fn step(edge: u32, dep: &str, arr: &str, trip: Option<&str>, fare: Fare) -> Step {
        Step {
            edge: EdgeId(edge),
            traversal: Traversal {
                departure: ts(dep),
                arrival: ts(arr),
                fare,
                emissions_g: 1.0,
                trip: trip.map(TripId::new),
                delay_secs: 0,
                timing: if trip.is_some() {
                    TimingConfidence::Live
                } else {
                    TimingConfidence::Static
                },
            },
            uncertain: false,
        }
    }

    #[test]
    fn groups_steps_by_mode_and_trip() {
        let snapshot = snapshot();
        let path = FoundPath {
            steps: vec![
                step(0, "09:00:00", "09:02:00", None, Fare::Known(0.0)),
                step(1, "09:10:00", "09:11:00", Some("T"), Fare::Known(2.0)),
                step(2, "09:11:00", "09:12:00", Some("T"), Fare::Known(2.0)),
            ],
            cost: 1.0,
            accessibility_checked: false,
            origin_uncertain: false,
        };

        let route = assemble(&snapshot, &path, 180).unwrap();
        assert_eq!(route.segments().len(), 2);
        let bus = &route.segments()[1];
        assert_eq!(bus.edges, vec![EdgeId(1), EdgeId(2)]);
        assert_eq!(bus.fare, Fare::Known(4.0));
        assert_eq!(bus.geometry.len(), 3);
        assert_eq!(bus.emissions_g, 2.0);
        assert_eq!(bus.accessibility, AccessibilityConfidence::NotEvaluated);
        assert_eq!(route.timing(), TimingConfidence::Live);
    }

    #[test]
    fn different_trips_split_segments() {
        let snapshot = snapshot();
        let path = FoundPath {
            steps: vec![
                step(1, "09:10:00", "09:11:00", Some("A"), Fare::Known(2.0)),
                step(2, "09:15:00", "09:16:00", Some("B"), Fare::Unknown),
            ],
            cost: 1.0,
            accessibility_checked: true,
            origin_uncertain: true,
        };

        let route = assemble(&snapshot, &path, 180).unwrap();
        assert_eq!(route.transfer_count(), 1);
        assert!(route.total_fare().is_unknown());
        assert_eq!(
            route.segments()[0].accessibility,
            AccessibilityConfidence::Uncertain
        );
        assert_eq!(
            route.segments()[1].accessibility,
            AccessibilityConfidence::Confirmed
        );
    }

    #[test]
    fn short_mode_change_is_rejected() {
        let snapshot = snapshot();
        let path = FoundPath {
            steps: vec![
                step(0, "09:00:00", "09:09:00", None, Fare::Known(0.0)),
                step(1, "09:10:00", "09:11:00", Some("T"), Fare::Known(2.0)),
            ],
            cost: 1.0,
            accessibility_checked: false,
            origin_uncertain: false,
        };
        assert!(matches!(
            assemble(&snapshot, &path, 180),
            Err(DomainError::TransferTooShort { .. })
        ));
    }
}
