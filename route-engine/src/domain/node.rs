//! Graph nodes.

use serde::{Deserialize, Serialize};

use super::{Coordinate, NodeAccessibility, NodeId};

/// What a node represents on the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Intersection,
    TransitStop,
    PointOfInterest,
}

/// A node in a graph snapshot. Immutable once the snapshot is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// External identifier assigned by the ingestion pipeline.
    pub key: String,
    pub coord: Coordinate,
    pub kind: NodeKind,
    pub accessibility: NodeAccessibility,
}
