//! Domain error types.
//!
//! These errors represent validation failures and broken invariants in the
//! domain layer. They are distinct from planning outcomes and IO errors.

use super::NodeId;

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// Coordinate is NaN or out of range
    #[error("invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// Optimization weights are negative or do not sum to 1
    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    /// Some other preference is out of range
    #[error("invalid preference: {0}")]
    InvalidPreference(&'static str),

    /// Route has no segments
    #[error("route must have at least one segment")]
    EmptyRoute,

    /// Segment `index` does not end where segment `index + 1` starts
    #[error("segment {index} ends at {from:?} but the next starts at {to:?}")]
    Disconnected { index: usize, from: NodeId, to: NodeId },

    /// Segment `index + 1` departs before segment `index` arrives
    #[error("segment {} departs before segment {index} arrives", .index + 1)]
    OverlappingSegments { index: usize },

    /// Mode change after segment `index` is faster than allowed
    #[error("transfer after segment {index} is {gap_secs}s, minimum is {min_secs}s")]
    TransferTooShort {
        index: usize,
        gap_secs: i64,
        min_secs: i64,
    },

    /// A segment or the route as a whole arrives before it departs
    #[error("route arrives before it departs")]
    InvertedRoute,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DomainError::InvalidCoordinate {
            lat: f64::NAN,
            lon: 1.0,
        };
        assert_eq!(err.to_string(), "invalid coordinate (NaN, 1)");

        let err = DomainError::Disconnected {
            index: 0,
            from: NodeId(1),
            to: NodeId(4),
        };
        assert_eq!(
            err.to_string(),
            "segment 0 ends at n1 but the next starts at n4"
        );

        let err = DomainError::OverlappingSegments { index: 2 };
        assert_eq!(err.to_string(), "segment 3 departs before segment 2 arrives");

        let err = DomainError::TransferTooShort {
            index: 1,
            gap_secs: 60,
            min_secs: 180,
        };
        assert_eq!(
            err.to_string(),
            "transfer after segment 1 is 60s, minimum is 180s"
        );

        let err = DomainError::EmptyRoute;
        assert_eq!(err.to_string(), "route must have at least one segment");
    }
}
