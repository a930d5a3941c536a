//! Diverse alternative routes.
//!
//! The primary route is the plain optimum. Each further candidate comes from
//! a re-run with the edges of every accepted route made more expensive, and
//! is kept only if it is different enough from every route already accepted.
//! Penalties compound on every re-run, so a rejected near-duplicate is
//! pushed further away each time without its own detours being punished.

use std::collections::BTreeSet;

use tracing::debug;

use crate::domain::{DomainError, EdgeId, Route};
use crate::graph::GraphSnapshot;

use super::path::assemble;
use super::router::{EdgePenalties, Router, SearchBudget, SearchOutcome, SearchQuery, SearchStats};
use super::EngineConfig;

/// A route together with the search cost that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub route: Route,
    pub cost: f64,
}

/// How alternative generation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AlternativesOutcome {
    /// At least the primary route; possibly fewer than requested.
    Found(Vec<Candidate>),
    NoPath,
    /// The primary search ran out of budget.
    Timeout(Option<Candidate>),
    Cancelled,
}

/// Share of `candidate`'s edges that also appear in `accepted`.
pub fn overlap(candidate: &BTreeSet<EdgeId>, accepted: &BTreeSet<EdgeId>) -> f64 {
    if candidate.is_empty() {
        return 1.0;
    }
    candidate.intersection(accepted).count() as f64 / candidate.len() as f64
}

/// Produces up to `count` diverse routes for one query.
pub struct AlternativeGenerator<'a> {
    router: Router<'a>,
    snapshot: &'a GraphSnapshot,
    config: &'a EngineConfig,
}

impl<'a> AlternativeGenerator<'a> {
    pub fn new(router: Router<'a>, snapshot: &'a GraphSnapshot, config: &'a EngineConfig) -> Self {
        Self {
            router,
            snapshot,
            config,
        }
    }

    pub fn generate(
        &self,
        query: &SearchQuery<'_>,
        count: usize,
        budget: &SearchBudget,
    ) -> Result<(AlternativesOutcome, SearchStats), DomainError> {
        let settings = &self.config.alternatives;
        let mut penalties = EdgePenalties::new();
        let mut stats = SearchStats::default();

        let (outcome, run_stats) = self.router.search(query, &penalties, budget);
        stats += run_stats;
        let primary = match outcome {
            SearchOutcome::Found(path) => self.candidate(&path)?,
            SearchOutcome::NoPath => return Ok((AlternativesOutcome::NoPath, stats)),
            SearchOutcome::Cancelled => return Ok((AlternativesOutcome::Cancelled, stats)),
            SearchOutcome::Timeout(partial) => {
                let partial = partial.map(|p| self.candidate(&p)).transpose()?;
                return Ok((AlternativesOutcome::Timeout(partial), stats));
            }
        };

        let mut used_edges = primary.route.edge_set();
        let mut accepted_edges = vec![used_edges.clone()];
        let mut accepted = vec![primary];

        let mut retries = 0;
        while accepted.len() < count && retries < settings.max_retries {
            retries += 1;
            penalties.penalize(used_edges.iter().copied(), settings.penalty_factor);

            let (outcome, run_stats) = self.router.search(query, &penalties, budget);
            stats += run_stats;
            let path = match outcome {
                SearchOutcome::Found(path) => path,
                SearchOutcome::NoPath => break,
                SearchOutcome::Cancelled => return Ok((AlternativesOutcome::Cancelled, stats)),
                SearchOutcome::Timeout(_) => {
                    debug!(accepted = accepted.len(), "alternative search out of budget");
                    break;
                }
            };

            let candidate = self.candidate(&path)?;
            let edges = candidate.route.edge_set();
            let max_overlap = accepted_edges
                .iter()
                .map(|a| overlap(&edges, a))
                .fold(0.0, f64::max);

            if max_overlap <= settings.max_overlap {
                debug!(retries, max_overlap, "accepted alternative");
                used_edges.extend(edges.iter().copied());
                accepted_edges.push(edges);
                accepted.push(candidate);
            } else {
                debug!(retries, max_overlap, "rejected alternative");
            }
        }

        Ok((AlternativesOutcome::Found(accepted), stats))
    }

    fn candidate(&self, path: &super::router::FoundPath) -> Result<Candidate, DomainError> {
        Ok(Candidate {
            route: assemble(self.snapshot, path, self.config.min_transfer_secs)?,
            cost: path.cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::domain::{
        BoundingBox, Coordinate, FareData, Mode, NodeAccessibility, NodeId, NodeKind, Preferences,
        ScheduledDeparture, Timestamp,
    };
    use crate::graph::{EdgeSpec, SnapshotBuilder};
    use crate::planner::evaluator::EdgeEvaluator;
    use crate::planner::router::CancelFlag;
    use crate::realtime::OverlayView;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(&format!("2025-01-15T{s}")).unwrap()
    }

    fn set(ids: &[u32]) -> BTreeSet<EdgeId> {
        ids.iter().map(|&i| EdgeId(i)).collect()
    }

    #[test]
    fn overlap_is_relative_to_candidate() {
        assert_eq!(overlap(&set(&[1, 2, 3, 4]), &set(&[1, 2, 3])), 0.75);
        assert_eq!(overlap(&set(&[1, 2]), &set(&[1, 2, 3, 4, 5])), 1.0);
        assert_eq!(overlap(&set(&[7]), &set(&[1])), 0.0);
    }

    /// Three parallel buses between two stops, plus a detour via a third.
    fn parallel() -> (GraphSnapshot, NodeId, NodeId) {
        let mut b = SnapshotBuilder::new("p", BoundingBox::new(12.0, 77.0, 13.0, 78.0));
        let stop = |b: &mut SnapshotBuilder, key: &str, lon: f64| {
            b.add_node(
                key,
                Coordinate::new(12.5, lon).unwrap(),
                NodeKind::TransitStop,
                NodeAccessibility::default(),
            )
        };
        let a = stop(&mut b, "a", 77.50);
        let z = stop(&mut b, "z", 77.52);
        let m = stop(&mut b, "m", 77.51);

        for (trip, secs) in [("fast", 600), ("mid", 660), ("slow", 720)] {
            b.add_edge(
                EdgeSpec::transit(
                    a,
                    z,
                    Mode::Bus,
                    2000.0,
                    vec![ScheduledDeparture::new(trip, ts("09:05:00"), secs)],
                )
                .fare(FareData::Amount(5.0)),
            );
        }
        b.add_edge(EdgeSpec::street(a, m, Mode::Walk, 1000.0));
        b.add_edge(EdgeSpec::street(m, z, Mode::Walk, 1000.0));
        (b.build(1).unwrap(), a, z)
    }

    fn generate(count: usize, config: &EngineConfig) -> AlternativesOutcome {
        let (snapshot, a, z) = parallel();
        let view = OverlayView::empty();
        let router = Router::new(&snapshot, EdgeEvaluator::new(&view), config);
        let generator = AlternativeGenerator::new(router, &snapshot, config);
        let prefs = Preferences::default();
        let query = SearchQuery {
            origin: a,
            destination: z,
            departure: ts("09:00:00"),
            preferences: &prefs,
        };
        let budget = SearchBudget {
            deadline: Instant::now() + Duration::from_secs(5),
            max_steps: 10_000,
            cancel: CancelFlag::new(),
        };
        generator.generate(&query, count, &budget).unwrap().0
    }

    fn routes(outcome: AlternativesOutcome) -> Vec<Candidate> {
        match outcome {
            AlternativesOutcome::Found(c) => c,
            other => panic!("expected routes, got {other:?}"),
        }
    }

    #[test]
    fn produces_distinct_alternatives() {
        let config = EngineConfig::default();
        let candidates = routes(generate(3, &config));

        assert_eq!(candidates.len(), 3);
        let trips: Vec<_> = candidates
            .iter()
            .map(|c| c.route.trips().next().map(|t| t.to_string()))
            .collect();
        assert_eq!(trips[0].as_deref(), Some("fast"));
        for (i, a) in candidates.iter().enumerate() {
            for b in &candidates[i + 1..] {
                assert!(overlap(&b.route.edge_set(), &a.route.edge_set()) <= 0.7);
            }
        }
    }

    #[test]
    fn single_request_returns_primary_only() {
        let config = EngineConfig::default();
        let candidates = routes(generate(1, &config));
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn retry_cap_bounds_reruns() {
        let mut config = EngineConfig::default();
        config.alternatives.max_retries = 0;
        assert_eq!(routes(generate(5, &config)).len(), 1);

        // Only four distinct a-z routes exist
        config.alternatives.max_retries = 20;
        let candidates = routes(generate(10, &config));
        assert!(candidates.len() <= 4);
        assert!(candidates.len() >= 2);
    }

    /// A walk a-b-c-d-z, a near copy with a different last leg, a bus from
    /// a to d that ends on that last leg, and a slow direct bus.
    fn near_duplicate() -> (GraphSnapshot, NodeId, NodeId) {
        let mut b = SnapshotBuilder::new("d", BoundingBox::new(12.0, 77.0, 13.0, 78.0));
        let nodes: Vec<NodeId> = ["a", "b", "c", "d", "z"]
            .iter()
            .enumerate()
            .map(|(i, key)| {
                b.add_node(
                    *key,
                    Coordinate::new(12.5, 77.50 + 0.0025 * i as f64).unwrap(),
                    NodeKind::TransitStop,
                    NodeAccessibility::default(),
                )
            })
            .collect();
        let (a, d, z) = (nodes[0], nodes[3], nodes[4]);

        for pair in nodes.windows(2) {
            b.add_edge(EdgeSpec::street(pair[0], pair[1], Mode::Walk, 250.0));
        }
        b.add_edge(EdgeSpec::street(d, z, Mode::Walk, 260.0));
        b.add_edge(
            EdgeSpec::transit(
                a,
                d,
                Mode::Bus,
                1000.0,
                vec![ScheduledDeparture::new("feeder", ts("09:05:00"), 480)],
            )
            .fare(FareData::Amount(1.0)),
        );
        b.add_edge(
            EdgeSpec::transit(
                a,
                z,
                Mode::Bus,
                1000.0,
                vec![ScheduledDeparture::new("direct", ts("09:05:00"), 900)],
            )
            .fare(FareData::Amount(1.0)),
        );
        (b.build(1).unwrap(), a, z)
    }

    #[test]
    fn rejected_candidates_are_not_penalized() {
        // The first re-run finds the walk with the other last leg, which
        // shares three of four edges and is rejected. Its last leg stays
        // unpenalized, so the feeder bus onto it beats the direct bus.
        let (snapshot, a, z) = near_duplicate();
        let config = EngineConfig::default();
        let view = OverlayView::empty();
        let router = Router::new(&snapshot, EdgeEvaluator::new(&view), &config);
        let generator = AlternativeGenerator::new(router, &snapshot, &config);
        let prefs = Preferences::default();
        let query = SearchQuery {
            origin: a,
            destination: z,
            departure: ts("09:00:00"),
            preferences: &prefs,
        };
        let budget = SearchBudget {
            deadline: Instant::now() + Duration::from_secs(5),
            max_steps: 10_000,
            cancel: CancelFlag::new(),
        };

        let candidates = routes(generator.generate(&query, 2, &budget).unwrap().0);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].route.modes(), vec![Mode::Walk]);
        let trips: Vec<_> = candidates[1].route.trips().map(|t| t.to_string()).collect();
        assert_eq!(trips, vec!["feeder".to_string()]);
    }
}
