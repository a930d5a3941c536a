//! Domain types for the route planning engine.
//!
//! This module contains the core value types: graph elements, journey
//! segments, routes and preferences. All types enforce their invariants at
//! construction time, so code that receives them can trust their validity.

mod access;
mod coord;
mod edge;
mod error;
mod ids;
mod mode;
mod node;
mod preferences;
mod route;
mod segment;
mod time;

pub use access::{EdgeAccessibility, MobilityAid, NodeAccessibility, TriState};
pub use coord::{BoundingBox, Coordinate};
pub use edge::{Edge, FareData, ScheduledDeparture, TimeWindow, TravelTime};
pub use error::DomainError;
pub use ids::{AgencyId, EdgeId, NodeId, TripId};
pub use mode::{Mode, ModeProfile};
pub use node::{Node, NodeKind};
pub use preferences::{Preferences, Weights};
pub use route::{Route, TotalFare};
pub use segment::{AccessibilityConfidence, Fare, JourneySegment, TimingConfidence};
pub use time::{Clock, FixedClock, SystemClock, TimeError, Timestamp};

#[cfg(test)]
pub(crate) use route::tests as route_fixtures;
