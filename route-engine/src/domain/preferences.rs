//! Per-query traveller preferences.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{DomainError, MobilityAid, Mode};

/// Tolerance on the weight sum.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Optimization weights for the three objectives. Non-negative, sum to 1.
///
/// The objectives are measured in minutes, currency units and kilograms of
/// CO2e respectively, so a weight trades one minute against one currency
/// unit against one kilogram.
///
/// # Examples
///
/// ```
/// use route_engine::domain::Weights;
///
/// let w = Weights::new(0.5, 0.3, 0.2).unwrap();
/// // 30 minutes, fare 20, 1 kg CO2e
/// assert!((w.scalarize(1800, 20.0, 1000.0) - 21.2).abs() < 1e-9);
///
/// assert!(Weights::new(0.5, 0.5, 0.5).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    time: f64,
    cost: f64,
    eco: f64,
}

impl Weights {
    pub fn new(time: f64, cost: f64, eco: f64) -> Result<Self, DomainError> {
        let weights = Self { time, cost, eco };
        weights.validate()?;
        Ok(weights)
    }

    /// Optimize for travel time only.
    pub fn fastest() -> Self {
        Self {
            time: 1.0,
            cost: 0.0,
            eco: 0.0,
        }
    }

    /// Optimize for fare only.
    pub fn cheapest() -> Self {
        Self {
            time: 0.0,
            cost: 1.0,
            eco: 0.0,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        let parts = [self.time, self.cost, self.eco];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(DomainError::InvalidWeights(
                "weights must be finite and non-negative".to_string(),
            ));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(DomainError::InvalidWeights(format!(
                "weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn eco(&self) -> f64 {
        self.eco
    }

    /// Time component for `secs` of elapsed time.
    pub fn time_cost(&self, secs: i64) -> f64 {
        self.time * secs as f64 / 60.0
    }

    /// Non-time component for a fare and an emissions figure in grams.
    pub fn money_and_eco_cost(&self, fare: f64, emissions_g: f64) -> f64 {
        self.cost * fare + self.eco * emissions_g / 1000.0
    }

    /// Scalarized cost of a whole path.
    pub fn scalarize(&self, elapsed_secs: i64, fare: f64, emissions_g: f64) -> f64 {
        self.time_cost(elapsed_secs) + self.money_and_eco_cost(fare, emissions_g)
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            time: 0.6,
            cost: 0.3,
            eco: 0.1,
        }
    }
}

/// Preferences for one query. Constructed once and read-only thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub weights: Weights,

    /// Maximum cumulative walking distance in meters.
    pub max_walk_m: f64,

    /// Maximum number of segment boundaries (mode or vehicle changes).
    pub max_transfers: u32,

    /// Exclude edges and nodes explicitly incompatible with the mobility aid.
    pub accessible_only: bool,

    /// Aid to check compatibility for; wheelchair if unset.
    pub mobility_aid: Option<MobilityAid>,

    /// Modes to favour. Empty means no preference.
    pub preferred_modes: BTreeSet<Mode>,

    /// Modes never to use.
    pub avoided_modes: BTreeSet<Mode>,
}

impl Preferences {
    pub fn with_weights(weights: Weights) -> Self {
        Self {
            weights,
            ..Self::default()
        }
    }

    /// Check every field, including weights deserialized without validation.
    pub fn validate(&self) -> Result<(), DomainError> {
        self.weights.validate()?;
        if !self.max_walk_m.is_finite() || self.max_walk_m < 0.0 {
            return Err(DomainError::InvalidPreference(
                "max_walk_m must be finite and non-negative",
            ));
        }
        if let Some(mode) = self.preferred_modes.intersection(&self.avoided_modes).next() {
            tracing::debug!(%mode, "mode both preferred and avoided");
            return Err(DomainError::InvalidPreference(
                "a mode cannot be both preferred and avoided",
            ));
        }
        Ok(())
    }

    /// The aid accessibility is checked against, when it is checked at all.
    pub fn effective_aid(&self) -> Option<MobilityAid> {
        self.accessible_only
            .then(|| self.mobility_aid.unwrap_or(MobilityAid::Wheelchair))
    }

    pub fn allows(&self, mode: Mode) -> bool {
        !self.avoided_modes.contains(&mode)
    }

    /// True if `mode` should carry the non-preferred surcharge.
    pub fn is_non_preferred(&self, mode: Mode) -> bool {
        mode != Mode::Walk
            && !self.preferred_modes.is_empty()
            && !self.preferred_modes.contains(&mode)
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            max_walk_m: 2_000.0,
            max_transfers: 5,
            accessible_only: false,
            mobility_aid: None,
            preferred_modes: BTreeSet::new(),
            avoided_modes: BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_must_sum_to_one() {
        assert!(Weights::new(0.5, 0.3, 0.2).is_ok());
        assert!(Weights::new(1.0, 0.0, 0.0).is_ok());
        assert!(Weights::new(0.5, 0.3, 0.1).is_err());
        assert!(Weights::new(1.2, -0.2, 0.0).is_err());
        assert!(Weights::new(f64::NAN, 0.5, 0.5).is_err());
    }

    #[test]
    fn scalarize_units() {
        let w = Weights::fastest();
        assert_eq!(w.scalarize(600, 100.0, 5000.0), 10.0);

        let w = Weights::cheapest();
        assert_eq!(w.scalarize(600, 7.5, 5000.0), 7.5);
    }

    #[test]
    fn deserialized_weights_are_checked() {
        let prefs: Preferences =
            serde_json::from_str(r#"{"weights":{"time":0.9,"cost":0.9,"eco":0.0}}"#).unwrap();
        assert!(matches!(
            prefs.validate(),
            Err(DomainError::InvalidWeights(_))
        ));
    }

    #[test]
    fn conflicting_modes_rejected() {
        let mut prefs = Preferences::default();
        prefs.preferred_modes.insert(Mode::Bus);
        prefs.avoided_modes.insert(Mode::Bus);
        assert!(prefs.validate().is_err());
    }

    #[test]
    fn effective_aid_defaults_to_wheelchair() {
        let mut prefs = Preferences::default();
        assert_eq!(prefs.effective_aid(), None);

        prefs.accessible_only = true;
        assert_eq!(prefs.effective_aid(), Some(MobilityAid::Wheelchair));

        prefs.mobility_aid = Some(MobilityAid::StepFree);
        assert_eq!(prefs.effective_aid(), Some(MobilityAid::StepFree));
    }

    #[test]
    fn non_preferred_never_applies_to_walking() {
        let mut prefs = Preferences::default();
        assert!(!prefs.is_non_preferred(Mode::Bus));

        prefs.preferred_modes.insert(Mode::Train);
        assert!(prefs.is_non_preferred(Mode::Bus));
        assert!(!prefs.is_non_preferred(Mode::Train));
        assert!(!prefs.is_non_preferred(Mode::Walk));
    }
}
