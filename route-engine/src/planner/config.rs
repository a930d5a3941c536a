//! Configuration for the route planner.

use std::collections::BTreeMap;

use chrono::Duration;

use crate::domain::Mode;

/// Configuration parameters for route planning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock budget for one query (milliseconds), shared by every
    /// search run the query makes.
    pub timeout_ms: u64,

    /// Maximum number of frontier pops per search run.
    pub max_steps: usize,

    /// Maximum distance from a requested coordinate to its snapped node.
    pub snap_radius_m: f64,

    /// How far in the past a departure may be before it is rejected (seconds).
    pub past_tolerance_secs: i64,

    /// Overlays older than this fall back to scheduled timing (seconds).
    pub overlay_freshness_secs: i64,

    /// Minimum gap between segments of different modes (seconds).
    pub min_transfer_secs: i64,

    /// Extra time charged when changing mode.
    pub transfer_penalties: TransferPenalties,

    /// Fare assumed by the search for edges with unknown fare data.
    /// Only steers the search; the reported fare stays unknown.
    pub unknown_fare_cost: f64,

    /// Extra cost, as a fraction of an edge's own cost, charged for modes
    /// outside a non-empty preferred set.
    pub non_preferred_surcharge: f64,

    /// Reliability assumed for trips with no history.
    pub default_reliability: f64,

    /// Confidence multiplier for routes with degraded realtime timing.
    pub degraded_timing_factor: f64,

    /// Confidence multiplier for routes with uncertain accessibility.
    pub uncertain_access_factor: f64,

    pub alternatives: AlternativeConfig,

    pub rerank: RerankConfig,
}

impl EngineConfig {
    /// Returns the query timeout.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    /// Returns the past-departure tolerance as a Duration.
    pub fn past_tolerance(&self) -> Duration {
        Duration::seconds(self.past_tolerance_secs)
    }

    /// Returns the overlay freshness threshold as a Duration.
    pub fn overlay_freshness(&self) -> Duration {
        Duration::seconds(self.overlay_freshness_secs)
    }

    /// Returns the minimum transfer gap as a Duration.
    pub fn min_transfer(&self) -> Duration {
        Duration::seconds(self.min_transfer_secs)
    }

    /// Transfer penalty between two modes, never below the minimum gap.
    pub fn transfer_penalty_secs(&self, from: Mode, to: Mode) -> i64 {
        self.transfer_penalties
            .get(from, to)
            .max(self.min_transfer_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_steps: 1_000_000,
            snap_radius_m: 500.0,
            past_tolerance_secs: 300,
            overlay_freshness_secs: 300,
            min_transfer_secs: 180,
            transfer_penalties: TransferPenalties::default(),
            unknown_fare_cost: 3.0,
            non_preferred_surcharge: 0.25,
            default_reliability: 0.8,
            degraded_timing_factor: 0.9,
            uncertain_access_factor: 0.9,
            alternatives: AlternativeConfig::default(),
            rerank: RerankConfig::default(),
        }
    }
}

/// Mode-pair transfer penalties in seconds.
///
/// Pairs not in the table cost nothing beyond the minimum transfer gap.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferPenalties {
    table: BTreeMap<(Mode, Mode), i64>,
}

impl TransferPenalties {
    pub fn empty() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    pub fn with(mut self, from: Mode, to: Mode, secs: i64) -> Self {
        self.table.insert((from, to), secs);
        self
    }

    pub fn get(&self, from: Mode, to: Mode) -> i64 {
        self.table.get(&(from, to)).copied().unwrap_or(0)
    }
}

impl Default for TransferPenalties {
    fn default() -> Self {
        let mut penalties = Self::empty();
        for mode in Mode::ALL.iter().copied().filter(|m| m.is_scheduled()) {
            // Locking up or unloading a bike takes longer than walking off
            penalties = penalties
                .with(Mode::Bike, mode, 300)
                .with(mode, Mode::Bike, 300);
            for other in Mode::ALL.iter().copied().filter(|m| m.is_scheduled()) {
                if other != mode {
                    penalties = penalties.with(mode, other, 240);
                }
            }
        }
        penalties
    }
}

/// Configuration for alternative route generation.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternativeConfig {
    /// Largest share of a candidate's edges that may also appear in an
    /// accepted route.
    pub max_overlap: f64,

    /// Maximum number of re-runs after the primary search.
    pub max_retries: usize,

    /// Cost multiplier applied to edges of every candidate already seen.
    pub penalty_factor: f64,
}

impl Default for AlternativeConfig {
    fn default() -> Self {
        Self {
            max_overlap: 0.7,
            max_retries: 8,
            penalty_factor: 1.5,
        }
    }
}

/// How close two costs must be for reliability to reorder them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Epsilon {
    /// Costs closer than this many cost units.
    Absolute(f64),
    /// Costs closer than this fraction of the cheaper cost.
    Relative(f64),
}

impl Epsilon {
    /// True if `cost` is close enough to `anchor`, the cheaper cost.
    pub fn within(&self, anchor: f64, cost: f64) -> bool {
        let diff = (cost - anchor).abs();
        match *self {
            Epsilon::Absolute(eps) => diff < eps,
            Epsilon::Relative(frac) => diff < frac * anchor.abs(),
        }
    }
}

/// Configuration for the reliability re-ranker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankConfig {
    pub epsilon: Epsilon,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            epsilon: Epsilon::Relative(0.02),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();

        assert_eq!(config.timeout_ms, 5_000);
        assert_eq!(config.snap_radius_m, 500.0);
        assert_eq!(config.min_transfer_secs, 180);
        assert_eq!(config.alternatives.max_overlap, 0.7);
        assert_eq!(config.alternatives.max_retries, 8);
        assert_eq!(config.alternatives.penalty_factor, 1.5);
        assert_eq!(config.rerank.epsilon, Epsilon::Relative(0.02));
    }

    #[test]
    fn duration_methods() {
        let config = EngineConfig::default();

        assert_eq!(config.timeout(), std::time::Duration::from_secs(5));
        assert_eq!(config.min_transfer(), Duration::minutes(3));
        assert_eq!(config.past_tolerance(), Duration::minutes(5));
        assert_eq!(config.overlay_freshness(), Duration::minutes(5));
    }

    #[test]
    fn transfer_penalty_never_below_minimum() {
        let config = EngineConfig::default();

        assert_eq!(config.transfer_penalty_secs(Mode::Walk, Mode::Bus), 180);
        assert_eq!(config.transfer_penalty_secs(Mode::Bike, Mode::Train), 300);
        assert_eq!(config.transfer_penalty_secs(Mode::Bus, Mode::Subway), 240);

        let config = EngineConfig {
            transfer_penalties: TransferPenalties::empty().with(Mode::Walk, Mode::Bus, 30),
            ..EngineConfig::default()
        };
        assert_eq!(config.transfer_penalty_secs(Mode::Walk, Mode::Bus), 180);
    }

    #[test]
    fn epsilon_regimes() {
        let abs = Epsilon::Absolute(1.0);
        assert!(abs.within(100.0, 100.9));
        assert!(!abs.within(100.0, 101.0));
        assert!(abs.within(1.0, 1.5));

        let rel = Epsilon::Relative(0.05);
        assert!(rel.within(100.0, 104.9));
        assert!(!rel.within(100.0, 105.0));
        assert!(!rel.within(1.0, 1.5));
    }
}
