//! Route ranking.
//!
//! Routes arrive ordered by scalarized cost. Routes whose costs are close
//! to each other are then reordered by how likely they are to run as
//! planned, so a marginally cheaper but fragile route does not hide a
//! dependable one.

use std::collections::HashMap;
use std::future::Future;

use futures::future::join_all;
use serde::Serialize;

use super::config::Epsilon;
use super::fares::PassOption;
use crate::domain::{AgencyId, Route, TripId};

/// External source of per-trip reliability scores.
pub trait ReliabilitySource: Send + Sync {
    /// Probability in `[0, 1]` that `trip` runs as planned, if known.
    fn trip_reliability(&self, trip: &TripId) -> impl Future<Output = Option<f64>> + Send;
}

/// Knows nothing; every trip falls back to the configured default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReliability;

impl ReliabilitySource for NoReliability {
    async fn trip_reliability(&self, _trip: &TripId) -> Option<f64> {
        None
    }
}

/// Fixed scores, for tests and offline use.
#[derive(Debug, Clone, Default)]
pub struct StaticReliability(pub HashMap<TripId, f64>);

impl StaticReliability {
    pub fn with(mut self, trip: impl Into<String>, score: f64) -> Self {
        self.0.insert(TripId::new(trip), score);
        self
    }
}

impl ReliabilitySource for StaticReliability {
    async fn trip_reliability(&self, trip: &TripId) -> Option<f64> {
        self.0.get(trip).copied()
    }
}

/// Probability that every trip on `route` runs as planned.
///
/// Trips without a score count as `default`. Routes with no transit score 1.
pub async fn route_reliability<R: ReliabilitySource>(
    source: &R,
    route: &Route,
    default: f64,
) -> f64 {
    let scores = join_all(route.trips().map(|trip| source.trip_reliability(trip))).await;
    scores
        .into_iter()
        .map(|s| s.unwrap_or(default).clamp(0.0, 1.0))
        .product()
}

/// Something the traveller should know about a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteWarning {
    /// The agency's realtime data is too old and was ignored.
    StaleRealtime { agency: AgencyId },
    /// No realtime data was available for the agency.
    RealtimeMissing { agency: AgencyId },
    /// Some segment fares are unknown.
    UnknownFare { segments: usize },
    /// Accessibility could not be confirmed for every segment.
    AccessibilityUncertain,
}

/// A route ready to present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRoute {
    pub route: Route,
    pub cost: f64,
    pub reliability: f64,
    /// Overall confidence in the route's figures, in `[0, 1]`.
    pub confidence: f64,
    pub warnings: Vec<RouteWarning>,
    pub pass: Option<PassOption>,
}

/// Order routes by cost, then by reliability among near-ties.
///
/// Routes are sorted by cost and cut into clusters: each cluster starts at
/// the cheapest route not yet placed and takes every following route
/// within `epsilon` of it. Inside a cluster, higher reliability comes
/// first; equal reliability keeps cost order.
pub fn rerank(mut routes: Vec<RankedRoute>, epsilon: Epsilon) -> Vec<RankedRoute> {
    routes.sort_by(|a, b| a.cost.total_cmp(&b.cost));

    let mut start = 0;
    while start < routes.len() {
        let anchor = routes[start].cost;
        let end = routes[start + 1..]
            .iter()
            .position(|r| !epsilon.within(anchor, r.cost))
            .map_or(routes.len(), |offset| start + 1 + offset);
        routes[start..end].sort_by(|a, b| b.reliability.total_cmp(&a.reliability));
        start = end;
    }

    routes
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::route_fixtures::segment;
    use crate::domain::{Fare, Mode};
    use proptest::prelude::*;

    fn ranked(id: usize, cost: f64, reliability: f64) -> RankedRoute {
        RankedRoute {
            route: Route::new(
                vec![segment(Mode::Walk, 0, 1, "09:00:00", "09:10:00", Fare::Known(id as f64))],
                180,
            )
            .unwrap(),
            cost,
            reliability,
            confidence: 1.0,
            warnings: Vec::new(),
            pass: None,
        }
    }

    /// Routes tagged with their index through the fare, so a permutation
    /// can be checked without comparing floats.
    fn routes_strategy() -> impl Strategy<Value = Vec<RankedRoute>> {
        prop::collection::vec((0.0f64..100.0, 0.0f64..=1.0), 0..12).prop_map(|pairs| {
            pairs
                .into_iter()
                .enumerate()
                .map(|(i, (cost, reliability))| ranked(i, cost, reliability))
                .collect()
        })
    }

    fn epsilon_strategy() -> impl Strategy<Value = Epsilon> {
        prop_oneof![
            (0.0f64..10.0).prop_map(Epsilon::Absolute),
            (0.0f64..0.2).prop_map(Epsilon::Relative),
        ]
    }

    fn ids(routes: &[RankedRoute]) -> Vec<usize> {
        let mut ids: Vec<usize> = routes
            .iter()
            .filter_map(|r| r.route.total_fare().amount())
            .map(|f| f as usize)
            .collect();
        ids.sort_unstable();
        ids
    }

    proptest! {
        #[test]
        fn rerank_is_a_permutation(routes in routes_strategy(), eps in epsilon_strategy()) {
            let before = ids(&routes);
            let after = rerank(routes, eps);
            prop_assert_eq!(ids(&after), before);
        }

        #[test]
        fn zero_epsilon_is_a_cost_sort(routes in routes_strategy()) {
            let ranked = rerank(routes, Epsilon::Absolute(0.0));
            for window in ranked.windows(2) {
                prop_assert!(window[0].cost <= window[1].cost);
            }
        }

        #[test]
        fn reordering_stays_within_epsilon(routes in routes_strategy(), eps in epsilon_strategy()) {
            let ranked = rerank(routes, eps);

            // Every inversion in cost order must be a near-tie resolved by reliability
            for (i, a) in ranked.iter().enumerate() {
                for b in &ranked[i + 1..] {
                    if b.cost < a.cost {
                        prop_assert!(eps.within(b.cost, a.cost));
                        prop_assert!(a.reliability >= b.reliability);
                    }
                }
            }
        }
    }
}
