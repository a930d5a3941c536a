//! Accessibility attributes.
//!
//! Every attribute is tri-state. `Unknown` is never silently treated as
//! accessible: the router lets such edges through but flags the route.

use serde::{Deserialize, Serialize};

/// A yes/no fact that may be missing from the source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriState {
    Yes,
    No,
    #[default]
    Unknown,
}

impl TriState {
    /// Combine two facts that must both hold.
    pub fn and(self, other: TriState) -> TriState {
        match (self, other) {
            (TriState::No, _) | (_, TriState::No) => TriState::No,
            (TriState::Yes, TriState::Yes) => TriState::Yes,
            _ => TriState::Unknown,
        }
    }

    /// Combine two facts where either suffices.
    pub fn or(self, other: TriState) -> TriState {
        match (self, other) {
            (TriState::Yes, _) | (_, TriState::Yes) => TriState::Yes,
            (TriState::No, TriState::No) => TriState::No,
            _ => TriState::Unknown,
        }
    }
}

impl From<bool> for TriState {
    fn from(b: bool) -> Self {
        if b { TriState::Yes } else { TriState::No }
    }
}

/// Mobility aid the traveller uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobilityAid {
    Wheelchair,
    /// Walkers, strollers and anything else needing step-free access.
    StepFree,
}

/// Accessibility attributes of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAccessibility {
    pub wheelchair: TriState,
    pub elevator: TriState,
    pub ramp: TriState,
}

impl NodeAccessibility {
    /// Fully accessible node.
    pub fn accessible() -> Self {
        Self {
            wheelchair: TriState::Yes,
            elevator: TriState::Yes,
            ramp: TriState::Yes,
        }
    }

    /// Compatibility of this node for the given aid.
    pub fn for_aid(&self, aid: MobilityAid) -> TriState {
        match aid {
            MobilityAid::Wheelchair => self.wheelchair,
            MobilityAid::StepFree => self.elevator.or(self.ramp),
        }
    }
}

/// Accessibility compatibility of an edge. Static, independent of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeAccessibility {
    pub wheelchair: TriState,
    pub step_free: TriState,
}

impl EdgeAccessibility {
    pub fn accessible() -> Self {
        Self {
            wheelchair: TriState::Yes,
            step_free: TriState::Yes,
        }
    }

    pub fn for_aid(&self, aid: MobilityAid) -> TriState {
        match aid {
            MobilityAid::Wheelchair => self.wheelchair,
            MobilityAid::StepFree => self.step_free,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tristate_logic() {
        use TriState::*;
        assert_eq!(Yes.and(Yes), Yes);
        assert_eq!(Yes.and(Unknown), Unknown);
        assert_eq!(Unknown.and(No), No);
        assert_eq!(No.or(Yes), Yes);
        assert_eq!(No.or(Unknown), Unknown);
        assert_eq!(No.or(No), No);
        assert_eq!(TriState::from(true), Yes);
    }

    #[test]
    fn node_step_free_needs_elevator_or_ramp() {
        let node = NodeAccessibility {
            wheelchair: TriState::No,
            elevator: TriState::No,
            ramp: TriState::Yes,
        };
        assert_eq!(node.for_aid(MobilityAid::Wheelchair), TriState::No);
        assert_eq!(node.for_aid(MobilityAid::StepFree), TriState::Yes);
        assert_eq!(
            NodeAccessibility::default().for_aid(MobilityAid::StepFree),
            TriState::Unknown
        );
    }

    #[test]
    fn missing_fields_deserialize_as_unknown() {
        let edge: EdgeAccessibility = serde_json::from_str(r#"{"wheelchair":"yes"}"#).unwrap();
        assert_eq!(edge.wheelchair, TriState::Yes);
        assert_eq!(edge.step_free, TriState::Unknown);
    }
}
