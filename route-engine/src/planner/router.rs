//! Multi-criteria label-setting search.
//!
//! The search explores states `(node, arrival, last mode)` in order of
//! scalarized cost. Each state carries a label with the criteria that
//! matter for what can still happen from it: arrival time, accumulated
//! non-time cost, transfers used, walking distance used, whether
//! accessibility is uncertain, and the trip currently ridden. Labels are
//! stored per `(node, last mode)` and only Pareto-optimal ones survive, so
//! several labels can coexist at a node when none dominates the others.
//!
//! The first destination label popped is optimal: every edge adds a
//! non-negative amount to the scalarized cost.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, trace};

use crate::domain::{EdgeId, Mode, NodeId, Preferences, Timestamp, TriState, TripId};
use crate::graph::GraphSnapshot;

use super::EngineConfig;
use super::evaluator::{EdgeEvaluator, Evaluation, Traversal};

/// Slack for floating-point cost comparisons.
const COST_EPS: f64 = 1e-9;

/// Number of `last mode` buckets per node: one per mode plus "none yet".
const MODE_SLOTS: usize = Mode::ALL.len() + 1;

/// Shared flag used to abandon a query, e.g. when the caller disconnects.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

/// Resource limits for one search run.
#[derive(Debug, Clone)]
pub struct SearchBudget {
    pub deadline: Instant,
    pub max_steps: usize,
    pub cancel: CancelFlag,
}

/// Cost multipliers on individual edges, used to push re-runs away from
/// routes already found.
#[derive(Debug, Clone, Default)]
pub struct EdgePenalties {
    factors: HashMap<EdgeId, f64>,
}

impl EdgePenalties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Multiply the cost of every edge in `edges` by `factor`. Repeated
    /// penalties compound.
    pub fn penalize(&mut self, edges: impl IntoIterator<Item = EdgeId>, factor: f64) {
        for edge in edges {
            *self.factors.entry(edge).or_insert(1.0) *= factor;
        }
    }

    pub fn factor(&self, edge: EdgeId) -> f64 {
        self.factors.get(&edge).copied().unwrap_or(1.0)
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

/// One search request against a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SearchQuery<'a> {
    pub origin: NodeId,
    pub destination: NodeId,
    pub departure: Timestamp,
    pub preferences: &'a Preferences,
}

/// One edge traversal on a found path.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub edge: EdgeId,
    pub traversal: Traversal,
    /// The edge or the node it leads to has unknown compatibility.
    pub uncertain: bool,
}

/// A path from origin to destination.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundPath {
    pub steps: Vec<Step>,
    /// Scalarized cost, excluding re-run penalties.
    pub cost: f64,
    /// Accessibility was checked during the search.
    pub accessibility_checked: bool,
    /// The origin node has unknown or negative compatibility.
    pub origin_uncertain: bool,
}

/// How a search run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(FoundPath),
    NoPath,
    /// Budget exhausted; carries the cheapest destination label seen, if any.
    Timeout(Option<FoundPath>),
    Cancelled,
}

/// Counters for one search run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub labels_created: usize,
    pub labels_popped: usize,
    pub labels_dominated: usize,
}

impl std::ops::AddAssign for SearchStats {
    fn add_assign(&mut self, rhs: Self) {
        self.labels_created += rhs.labels_created;
        self.labels_popped += rhs.labels_popped;
        self.labels_dominated += rhs.labels_dominated;
    }
}

/// The part of a label that decides what can still happen from it.
#[derive(Debug, Clone)]
struct LabelState {
    node: NodeId,
    arrival: Timestamp,
    mode: Option<Mode>,
    trip: Option<TripId>,
    /// Money, emissions, surcharges and penalties, already weighted.
    extra: f64,
    /// Share of `extra` due to re-run penalties.
    penalty: f64,
    transfers: u32,
    walk_m: f64,
    uncertain: bool,
}

impl LabelState {
    /// True if `self` is at least as good as `other` in every respect that
    /// matters for the rest of the journey.
    fn dominates(&self, other: &LabelState) -> bool {
        self.arrival <= other.arrival
            && self.extra <= other.extra + COST_EPS
            && self.transfers <= other.transfers
            && self.walk_m <= other.walk_m + COST_EPS
            && (!self.uncertain || other.uncertain)
            // Staying aboard a trip saves a transfer, so a label on another
            // trip must already be a transfer ahead.
            && (self.trip == other.trip || self.transfers < other.transfers)
    }

    fn bucket(&self) -> (NodeId, usize) {
        let slot = self.mode.map_or(0, |m| m as usize + 1);
        debug_assert!(slot < MODE_SLOTS);
        (self.node, slot)
    }
}

#[derive(Debug)]
struct Label {
    state: LabelState,
    cost: f64,
    parent: Option<usize>,
    step: Option<Step>,
    alive: bool,
}

/// Frontier entry. Ordered by cost, then earlier arrival, then fewer
/// transfers, then insertion order.
#[derive(Debug)]
struct QueueEntry {
    cost: f64,
    arrival: Timestamp,
    transfers: u32,
    seq: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| self.arrival.cmp(&other.arrival))
            .then_with(|| self.transfers.cmp(&other.transfers))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Mutable state of one search run.
struct Search<'q> {
    query: &'q SearchQuery<'q>,
    labels: Vec<Label>,
    buckets: HashMap<(NodeId, usize), Vec<usize>>,
    frontier: BinaryHeap<Reverse<QueueEntry>>,
    best_goal: Option<usize>,
    stats: SearchStats,
}

impl<'q> Search<'q> {
    fn new(query: &'q SearchQuery<'q>) -> Self {
        Self {
            query,
            labels: Vec::new(),
            buckets: HashMap::new(),
            frontier: BinaryHeap::new(),
            best_goal: None,
            stats: SearchStats::default(),
        }
    }

    fn insert(&mut self, state: LabelState, parent: Option<usize>, step: Option<Step>) {
        let bucket = self.buckets.entry(state.bucket()).or_default();

        if bucket.iter().any(|&i| self.labels[i].state.dominates(&state)) {
            self.stats.labels_dominated += 1;
            return;
        }

        let labels = &mut self.labels;
        bucket.retain(|&i| {
            if state.dominates(&labels[i].state) {
                labels[i].alive = false;
                false
            } else {
                true
            }
        });

        let cost = self.query.preferences.weights.time_cost(
            state.arrival.secs_since(self.query.departure),
        ) + state.extra;
        let idx = labels.len();
        bucket.push(idx);
        self.frontier.push(Reverse(QueueEntry {
            cost,
            arrival: state.arrival,
            transfers: state.transfers,
            seq: idx,
        }));

        if state.node == self.query.destination {
            let better = self
                .best_goal
                .is_none_or(|best| cost < labels[best].cost - COST_EPS);
            if better {
                self.best_goal = Some(idx);
            }
        }

        labels.push(Label {
            state,
            cost,
            parent,
            step,
            alive: true,
        });
        self.stats.labels_created += 1;
    }

    fn path(&self, idx: usize, accessibility_checked: bool, origin_uncertain: bool) -> FoundPath {
        let mut steps = Vec::new();
        let mut current = Some(idx);
        while let Some(i) = current {
            let label = &self.labels[i];
            if let Some(step) = &label.step {
                steps.push(step.clone());
            }
            current = label.parent;
        }
        steps.reverse();

        let label = &self.labels[idx];
        FoundPath {
            steps,
            cost: label.cost - label.state.penalty,
            accessibility_checked,
            origin_uncertain,
        }
    }
}

/// Runs searches over one snapshot with one overlay view.
#[derive(Debug, Clone, Copy)]
pub struct Router<'a> {
    snapshot: &'a GraphSnapshot,
    evaluator: EdgeEvaluator<'a>,
    config: &'a EngineConfig,
}

impl<'a> Router<'a> {
    pub fn new(
        snapshot: &'a GraphSnapshot,
        evaluator: EdgeEvaluator<'a>,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            snapshot,
            evaluator,
            config,
        }
    }

    /// Find the cheapest path for `query` under `penalties`.
    pub fn search(
        &self,
        query: &SearchQuery<'_>,
        penalties: &EdgePenalties,
        budget: &SearchBudget,
    ) -> (SearchOutcome, SearchStats) {
        let prefs = query.preferences;
        let aid = prefs.effective_aid();
        let origin_uncertain = aid.is_some_and(|aid| {
            self.snapshot.node(query.origin).accessibility.for_aid(aid) != TriState::Yes
        });

        let mut search = Search::new(query);
        search.insert(
            LabelState {
                node: query.origin,
                arrival: query.departure,
                mode: None,
                trip: None,
                extra: 0.0,
                penalty: 0.0,
                transfers: 0,
                walk_m: 0.0,
                uncertain: origin_uncertain,
            },
            None,
            None,
        );

        let mut steps = 0usize;
        while let Some(Reverse(entry)) = search.frontier.pop() {
            if budget.cancel.is_cancelled() {
                debug!(steps, "search cancelled");
                return (SearchOutcome::Cancelled, search.stats);
            }
            if steps >= budget.max_steps || Instant::now() >= budget.deadline {
                debug!(steps, found = search.best_goal.is_some(), "search budget exhausted");
                let partial = search
                    .best_goal
                    .map(|idx| search.path(idx, aid.is_some(), origin_uncertain));
                return (SearchOutcome::Timeout(partial), search.stats);
            }
            steps += 1;

            let idx = entry.seq;
            if !search.labels[idx].alive {
                continue;
            }
            search.stats.labels_popped += 1;

            let state = search.labels[idx].state.clone();
            if state.node == query.destination {
                trace!(steps, cost = entry.cost, "destination reached");
                let path = search.path(idx, aid.is_some(), origin_uncertain);
                return (SearchOutcome::Found(path), search.stats);
            }

            self.expand(&mut search, idx, &state, penalties);
        }

        debug!(steps, "frontier exhausted");
        (SearchOutcome::NoPath, search.stats)
    }

    fn expand(
        &self,
        search: &mut Search<'_>,
        idx: usize,
        from: &LabelState,
        penalties: &EdgePenalties,
    ) {
        let prefs = search.query.preferences;
        let aid = prefs.effective_aid();

        for edge in self.snapshot.outgoing(from.node) {
            if !prefs.allows(edge.mode) {
                continue;
            }

            let mut uncertain = false;
            if let Some(aid) = aid {
                let target = self.snapshot.node(edge.target);
                match edge.accessibility.for_aid(aid).and(target.accessibility.for_aid(aid)) {
                    TriState::No => continue,
                    TriState::Unknown => uncertain = true,
                    TriState::Yes => {}
                }
            }

            let walk_m = from.walk_m
                + if edge.mode == Mode::Walk {
                    edge.distance_m
                } else {
                    0.0
                };
            if walk_m > prefs.max_walk_m + COST_EPS {
                continue;
            }

            let same_mode = from.mode == Some(edge.mode);
            let ready = match from.mode {
                Some(last) if last != edge.mode => {
                    from.arrival + self.config.transfer_penalty_secs(last, edge.mode)
                }
                _ => from.arrival,
            };

            let mut options: Vec<(Traversal, bool)> = Vec::new();
            let staying = if same_mode { from.trip.as_ref() } else { None };
            if let Some(trip) = staying {
                if let Evaluation::Traversal(t) = self.evaluator.evaluate_trip(edge, trip, from.arrival)
                {
                    options.push((t, true));
                }
            }
            if edge.mode.is_scheduled() {
                // Every boardable trip, not only the first to arrive: a later
                // one may run further without a change. Dominance drops the
                // redundant labels.
                for t in self.evaluator.instances(edge, ready) {
                    if t.trip.as_ref() != staying {
                        options.push((t, false));
                    }
                }
            } else if let Evaluation::Traversal(t) = self.evaluator.evaluate(edge, ready) {
                options.push((t, same_mode));
            }

            for (traversal, continues) in options {
                let transfers = if from.mode.is_none() || continues {
                    from.transfers
                } else {
                    from.transfers + 1
                };
                if transfers > prefs.max_transfers {
                    continue;
                }

                let weights = &prefs.weights;
                let money = traversal
                    .fare
                    .amount()
                    .unwrap_or(self.config.unknown_fare_cost);
                let money_and_eco = weights.money_and_eco_cost(money, traversal.emissions_g);
                let delta = weights.time_cost(traversal.arrival.secs_since(from.arrival))
                    + money_and_eco;
                let surcharge = if prefs.is_non_preferred(edge.mode) {
                    self.config.non_preferred_surcharge * delta
                } else {
                    0.0
                };
                let penalty = (penalties.factor(edge.id) - 1.0).max(0.0) * delta;

                let state = LabelState {
                    node: edge.target,
                    arrival: traversal.arrival,
                    mode: Some(edge.mode),
                    trip: traversal.trip.clone(),
                    extra: from.extra + money_and_eco + surcharge + penalty,
                    penalty: from.penalty + penalty,
                    transfers,
                    walk_m,
                    uncertain: from.uncertain || uncertain,
                };
                let step = Step {
                    edge: edge.id,
                    traversal,
                    uncertain,
                };
                search.insert(state, Some(idx), Some(step));
            }
        }
    }
}
