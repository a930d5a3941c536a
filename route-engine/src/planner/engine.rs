//! Query entry point.
//!
//! [`Engine::plan_routes`] validates a request, picks the snapshot covering
//! it, snaps the endpoints, runs the search on the blocking pool, then
//! prices, scores and orders the routes it found.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::EngineConfig;
use super::alternatives::{AlternativeGenerator, AlternativesOutcome, Candidate};
use super::evaluator::EdgeEvaluator;
use super::fares::{FareCalculator, FareSummary, aggregate};
use super::rank::{RankedRoute, ReliabilitySource, RouteWarning, route_reliability, rerank};
use super::router::{CancelFlag, Router, SearchBudget, SearchQuery, SearchStats};
use crate::domain::{
    AccessibilityConfidence, Clock, Coordinate, DomainError, NodeId, Preferences,
    TimingConfidence, Timestamp,
};
use crate::graph::{GraphSnapshot, SnapshotStore};
use crate::realtime::{OverlayStore, OverlayView};

/// Error from route planning.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// The request itself is malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No loaded data covers the request
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// The caller cancelled the query
    #[error("query cancelled")]
    Cancelled,

    /// The search task failed
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for PlanError {
    fn from(err: DomainError) -> Self {
        PlanError::InvalidInput(err.to_string())
    }
}

/// A route planning request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub departure: Timestamp,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default = "default_alternatives")]
    pub num_alternatives: usize,
}

fn default_alternatives() -> usize {
    3
}

impl PlanRequest {
    pub fn new(origin: Coordinate, destination: Coordinate, departure: Timestamp) -> Self {
        Self {
            origin,
            destination,
            departure,
            preferences: Preferences::default(),
            num_alternatives: default_alternatives(),
        }
    }

    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_alternatives(mut self, count: usize) -> Self {
        self.num_alternatives = count;
        self
    }

    /// Check everything that can be checked without loaded data.
    pub fn validate(&self, now: Timestamp, past_tolerance_secs: i64) -> Result<(), PlanError> {
        self.preferences.validate()?;
        if self.num_alternatives == 0 {
            return Err(PlanError::InvalidInput(
                "num_alternatives must be at least 1".to_string(),
            ));
        }
        let earliest = now + -past_tolerance_secs;
        if self.departure < earliest {
            return Err(PlanError::InvalidInput(format!(
                "departure {} is before {earliest}",
                self.departure
            )));
        }
        Ok(())
    }
}

/// Result of a planning query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanOutcome {
    /// Best first.
    Routes { routes: Vec<RankedRoute> },
    NoPathFound,
    /// The time budget ran out before the first route was confirmed.
    Timeout { partial: Option<RankedRoute> },
}

/// The route planning engine.
///
/// Holds the shared stores and collaborators. Every query works against
/// the snapshot and overlays current when it starts.
pub struct Engine<F, R> {
    snapshots: SnapshotStore,
    overlays: OverlayStore,
    fares: F,
    reliability: R,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl<F: FareCalculator, R: ReliabilitySource> Engine<F, R> {
    pub fn new(
        snapshots: SnapshotStore,
        overlays: OverlayStore,
        fares: F,
        reliability: R,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            snapshots,
            overlays,
            fares,
            reliability,
            clock,
            config: Arc::new(config),
        }
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn overlays(&self) -> &OverlayStore {
        &self.overlays
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Plan routes for `request`.
    ///
    /// `cancel` may be set from another task at any time; the search
    /// notices at its next step.
    pub async fn plan_routes(
        &self,
        request: &PlanRequest,
        cancel: &CancelFlag,
    ) -> Result<PlanOutcome, PlanError> {
        let started = Instant::now();
        let now = self.clock.now();
        request.validate(now, self.config.past_tolerance_secs)?;

        let snapshot = self
            .snapshots
            .covering(&request.origin, &request.destination)
            .await
            .ok_or_else(|| {
                PlanError::DataUnavailable("no snapshot covers both endpoints".to_string())
            })?;
        let origin = self.snap(&snapshot, &request.origin, "origin")?;
        let destination = self.snap(&snapshot, &request.destination, "destination")?;
        if origin == destination {
            return Err(PlanError::InvalidInput(
                "origin and destination snap to the same node".to_string(),
            ));
        }

        let view = self
            .overlays
            .view(now, self.config.overlay_freshness_secs)
            .await;
        let budget = SearchBudget {
            deadline: started + self.config.timeout(),
            max_steps: self.config.max_steps,
            cancel: cancel.clone(),
        };

        let (outcome, stats) = {
            let snapshot = Arc::clone(&snapshot);
            let view = view.clone();
            let config = Arc::clone(&self.config);
            let preferences = request.preferences.clone();
            let departure = request.departure;
            let count = request.num_alternatives;
            tokio::task::spawn_blocking(move || {
                let query = SearchQuery {
                    origin,
                    destination,
                    departure,
                    preferences: &preferences,
                };
                let router = Router::new(&snapshot, EdgeEvaluator::new(&view), &config);
                AlternativeGenerator::new(router, &snapshot, &config).generate(&query, count, &budget)
            })
            .await
            .map_err(|e| PlanError::Internal(format!("search task failed: {e}")))?
            .map_err(|e| PlanError::Internal(format!("search produced an invalid route: {e}")))?
        };

        let outcome = match outcome {
            AlternativesOutcome::Found(candidates) => {
                let scored = join_all(
                    candidates
                        .into_iter()
                        .map(|c| self.score(&snapshot, &view, c)),
                )
                .await;
                PlanOutcome::Routes {
                    routes: rerank(scored, self.config.rerank.epsilon),
                }
            }
            AlternativesOutcome::NoPath => PlanOutcome::NoPathFound,
            AlternativesOutcome::Timeout(partial) => {
                warn!(elapsed_ms = started.elapsed().as_millis() as u64, "planning timed out");
                let partial = match partial {
                    Some(c) => Some(self.score(&snapshot, &view, c).await),
                    None => None,
                };
                PlanOutcome::Timeout { partial }
            }
            AlternativesOutcome::Cancelled => {
                debug!("planning cancelled");
                return Err(PlanError::Cancelled);
            }
        };

        log_outcome(&outcome, &stats, snapshot.version(), started);
        Ok(outcome)
    }

    fn snap(
        &self,
        snapshot: &GraphSnapshot,
        coord: &Coordinate,
        which: &str,
    ) -> Result<NodeId, PlanError> {
        match snapshot.nearest_node(coord, self.config.snap_radius_m) {
            Some((node, distance_m)) => {
                debug!(which, ?node, distance_m, "snapped endpoint");
                Ok(node)
            }
            None => Err(PlanError::DataUnavailable(format!(
                "no node within {} m of the {which}",
                self.config.snap_radius_m
            ))),
        }
    }

    async fn score(
        &self,
        snapshot: &GraphSnapshot,
        view: &OverlayView,
        candidate: Candidate,
    ) -> RankedRoute {
        let (fares, reliability) = futures::join!(
            aggregate(&self.fares, &candidate.route),
            route_reliability(
                &self.reliability,
                &candidate.route,
                self.config.default_reliability
            ),
        );
        let warnings = warnings(snapshot, view, &fares);
        let confidence = self.confidence(&fares);

        RankedRoute {
            route: fares.route,
            cost: candidate.cost,
            reliability,
            confidence,
            warnings,
            pass: fares.pass,
        }
    }

    fn confidence(&self, fares: &FareSummary) -> f64 {
        let mut confidence = fares.confidence_factor();
        if fares.route.timing() == TimingConfidence::Degraded {
            confidence *= self.config.degraded_timing_factor;
        }
        if fares.route.accessibility() == AccessibilityConfidence::Uncertain {
            confidence *= self.config.uncertain_access_factor;
        }
        confidence.clamp(0.0, 1.0)
    }
}

fn warnings(snapshot: &GraphSnapshot, view: &OverlayView, fares: &FareSummary) -> Vec<RouteWarning> {
    let mut warnings = Vec::new();

    let degraded = fares
        .route
        .segments()
        .iter()
        .filter(|s| s.timing == TimingConfidence::Degraded)
        .flat_map(|s| s.edges.iter());
    for edge in degraded {
        let Some(agency) = &snapshot.edge(*edge).agency else {
            continue;
        };
        let warning = if view.agencies().any(|a| a == agency) {
            RouteWarning::StaleRealtime {
                agency: agency.clone(),
            }
        } else {
            RouteWarning::RealtimeMissing {
                agency: agency.clone(),
            }
        };
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }

    if fares.unknown_segments > 0 {
        warnings.push(RouteWarning::UnknownFare {
            segments: fares.unknown_segments,
        });
    }
    if fares.route.accessibility() == AccessibilityConfidence::Uncertain {
        warnings.push(RouteWarning::AccessibilityUncertain);
    }
    warnings
}

fn log_outcome(outcome: &PlanOutcome, stats: &SearchStats, version: u64, started: Instant) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match outcome {
        PlanOutcome::Routes { routes } => info!(
            routes = routes.len(),
            snapshot = version,
            labels = stats.labels_created,
            popped = stats.labels_popped,
            elapsed_ms,
            "planned routes"
        ),
        PlanOutcome::NoPathFound => info!(
            snapshot = version,
            labels = stats.labels_created,
            elapsed_ms,
            "no path found"
        ),
        PlanOutcome::Timeout { partial } => info!(
            partial = partial.is_some(),
            snapshot = version,
            labels = stats.labels_created,
            elapsed_ms,
            "returning partial result"
        ),
    }
}
