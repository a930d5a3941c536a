//! Fare aggregation.
//!
//! Per-segment prices come from a [`FareCalculator`]. The aggregator asks
//! for every segment concurrently, sums what is known and keeps unknown
//! prices explicit, and passes through any cheaper pass the calculator
//! recommends.

use std::future::Future;

use futures::future::join_all;
use serde::Serialize;

use crate::domain::{Fare, JourneySegment, Route};

/// A calculator's estimate for one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareQuote {
    pub fare: Fare,
    /// How much the calculator trusts the figure, in `[0, 1]`.
    pub confidence: f64,
}

/// A ticket product cheaper than paying per ride.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassOption {
    pub name: String,
    pub price: f64,
}

/// External fare calculator.
pub trait FareCalculator: Send + Sync {
    /// Price `segment`, given the segments ridden before it on the same route.
    fn estimate_fare(
        &self,
        segment: &JourneySegment,
        prior: &[JourneySegment],
    ) -> impl Future<Output = FareQuote> + Send;

    /// A pass covering `segments` that is cheaper than the per-ride total.
    fn recommend_pass(
        &self,
        segments: &[JourneySegment],
    ) -> impl Future<Output = Option<PassOption>> + Send;
}

/// Uses the fare data stored on the graph edges and never recommends passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotFares;

impl FareCalculator for SnapshotFares {
    async fn estimate_fare(&self, segment: &JourneySegment, _prior: &[JourneySegment]) -> FareQuote {
        FareQuote {
            fare: segment.fare,
            confidence: if segment.fare.is_unknown() { 0.0 } else { 1.0 },
        }
    }

    async fn recommend_pass(&self, _segments: &[JourneySegment]) -> Option<PassOption> {
        None
    }
}

/// A route with fares attached.
#[derive(Debug, Clone, PartialEq)]
pub struct FareSummary {
    pub route: Route,
    pub unknown_segments: usize,
    /// Lowest confidence among the known quotes; 1.0 if there are none.
    pub min_quote_confidence: f64,
    pub pass: Option<PassOption>,
}

impl FareSummary {
    pub fn unknown_fraction(&self) -> f64 {
        self.unknown_segments as f64 / self.route.segments().len() as f64
    }

    /// Confidence multiplier: halved when every fare is unknown, scaled
    /// linearly in between.
    pub fn confidence_factor(&self) -> f64 {
        (1.0 - 0.5 * self.unknown_fraction()) * self.min_quote_confidence
    }
}

/// Price every segment of `route` and look for a cheaper pass.
pub async fn aggregate<C: FareCalculator>(calculator: &C, route: &Route) -> FareSummary {
    let segments = route.segments();
    let quotes = join_all(
        segments
            .iter()
            .enumerate()
            .map(|(i, segment)| calculator.estimate_fare(segment, &segments[..i])),
    )
    .await;

    let fares: Vec<Fare> = quotes.iter().map(|q| q.fare).collect();
    let priced = route.with_fares(&fares);
    let unknown_segments = fares.iter().filter(|f| f.is_unknown()).count();
    let min_quote_confidence = quotes
        .iter()
        .filter(|q| !q.fare.is_unknown())
        .map(|q| q.confidence.clamp(0.0, 1.0))
        .fold(1.0, f64::min);

    let pass = calculator.recommend_pass(priced.segments()).await;

    FareSummary {
        route: priced,
        unknown_segments,
        min_quote_confidence,
        pass,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Mode;
    use crate::domain::route_fixtures::segment;

    /// Charges a flat 10 per transit segment, with free transfers after the
    /// first ride, and offers a day pass above 15.
    struct FlatFares;

    impl FareCalculator for FlatFares {
        async fn estimate_fare(
            &self,
            segment: &JourneySegment,
            prior: &[JourneySegment],
        ) -> FareQuote {
            let fare = if !segment.is_transit() || prior.iter().any(|s| s.is_transit()) {
                Fare::Known(0.0)
            } else {
                Fare::Known(10.0)
            };
            FareQuote {
                fare,
                confidence: 0.8,
            }
        }

        async fn recommend_pass(&self, segments: &[JourneySegment]) -> Option<PassOption> {
            let total: f64 = segments.iter().filter_map(|s| s.fare.amount()).sum();
            (total > 15.0).then(|| PassOption {
                name: "day pass".to_string(),
                price: 15.0,
            })
        }
    }

    fn walk_bus_train() -> Route {
        Route::new(
            vec![
                segment(Mode::Walk, 0, 1, "09:00:00", "09:05:00", Fare::Known(0.0)),
                segment(Mode::Bus, 1, 2, "09:08:00", "09:25:00", Fare::Known(25.0)),
                segment(Mode::Train, 2, 3, "09:30:00", "09:50:00", Fare::Unknown),
            ],
            180,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn snapshot_fares_keep_unknowns() {
        let summary = aggregate(&SnapshotFares, &walk_bus_train()).await;

        assert!(summary.route.total_fare().is_unknown());
        assert_eq!(summary.unknown_segments, 1);
        assert!((summary.confidence_factor() - (1.0 - 0.5 / 3.0)).abs() < 1e-9);
        assert_eq!(summary.pass, None);
    }

    #[tokio::test]
    async fn calculator_sees_prior_segments() {
        let summary = aggregate(&FlatFares, &walk_bus_train()).await;

        let fares: Vec<_> = summary.route.segments().iter().map(|s| s.fare).collect();
        assert_eq!(
            fares,
            vec![Fare::Known(0.0), Fare::Known(10.0), Fare::Known(0.0)]
        );
        assert_eq!(summary.route.total_fare().amount(), Some(10.0));
        assert_eq!(summary.unknown_segments, 0);
        assert!((summary.confidence_factor() - 0.8).abs() < 1e-9);
        assert_eq!(summary.pass, None);
    }

    #[tokio::test]
    async fn pass_is_surfaced() {
        struct Expensive;
        impl FareCalculator for Expensive {
            async fn estimate_fare(&self, _: &JourneySegment, _: &[JourneySegment]) -> FareQuote {
                FareQuote {
                    fare: Fare::Known(9.0),
                    confidence: 1.0,
                }
            }
            async fn recommend_pass(&self, segments: &[JourneySegment]) -> Option<PassOption> {
                FlatFares.recommend_pass(segments).await
            }
        }

        let summary = aggregate(&Expensive, &walk_bus_train()).await;
        assert_eq!(summary.route.total_fare().amount(), Some(27.0));
        assert_eq!(summary.pass.unwrap().price, 15.0);
    }
}
