//! Immutable, versioned graph snapshots.
//!
//! A `GraphSnapshot` holds every node and edge of one region. It is built
//! once through [`SnapshotBuilder`], validated, and then only ever read:
//! queries share it through an `Arc`, and a newer version replaces it by
//! pointer swap in the [`SnapshotStore`](super::SnapshotStore).

use std::collections::HashMap;

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::domain::{
    AgencyId, BoundingBox, Coordinate, Edge, EdgeAccessibility, EdgeId, FareData, Mode, Node,
    NodeAccessibility, NodeId, NodeKind, ScheduledDeparture, TimeWindow, TravelTime,
};

/// Default tolerance between geometry endpoints and node coordinates.
pub const DEFAULT_GEOMETRY_TOLERANCE_M: f64 = 25.0;

/// A malformed snapshot. These are contract violations by the builder of
/// the snapshot and are reported once, at construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SnapshotError {
    #[error("duplicate node key {0:?}")]
    DuplicateNode(String),

    #[error("edge {edge} references missing node {node:?}")]
    MissingNode { edge: usize, node: NodeId },

    #[error("edge {edge} has invalid distance {distance_m}")]
    InvalidDistance { edge: usize, distance_m: f64 },

    #[error("edge {edge} geometry endpoint is {offset_m:.1}m from its node")]
    GeometryMismatch { edge: usize, offset_m: f64 },

    #[error("edge {edge}: {reason}")]
    InvalidSchedule { edge: usize, reason: &'static str },

    #[error("edge {edge} has an invalid fare")]
    InvalidFare { edge: usize },
}

/// A region covered by a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: String,
    pub bbox: BoundingBox,
}

/// Entry in the nearest-node index.
#[derive(Debug, Clone, Copy)]
struct IndexedNode {
    point: [f64; 2],
    id: NodeId,
}

impl RTreeObject for IndexedNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for IndexedNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Immutable graph for one region.
#[derive(Debug)]
pub struct GraphSnapshot {
    version: u64,
    region: Region,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    outgoing: Vec<Vec<EdgeId>>,
    index: RTree<IndexedNode>,
}

impl GraphSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges leaving `node`, in insertion order.
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.outgoing[node.index()].iter().map(|id| self.edge(*id))
    }

    pub fn node_by_key(&self, key: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.key == key).map(|n| n.id)
    }

    /// Nearest node to `coord` within `max_distance_m`, with its distance.
    ///
    /// The index ranks candidates by planar degree distance; the returned
    /// distance is the haversine distance of the winner.
    pub fn nearest_node(&self, coord: &Coordinate, max_distance_m: f64) -> Option<(NodeId, f64)> {
        let nearest = self.index.nearest_neighbor(&coord.xy())?;
        let distance = self.node(nearest.id).coord.distance_m(coord);
        (distance <= max_distance_m).then_some((nearest.id, distance))
    }
}

/// Description of an edge to add to a [`SnapshotBuilder`].
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub source: NodeId,
    pub target: NodeId,
    pub mode: Mode,
    pub distance_m: f64,
    pub geometry: Vec<Coordinate>,
    pub schedule: Vec<ScheduledDeparture>,
    pub windows: Vec<TimeWindow>,
    pub fare: FareData,
    pub accessibility: EdgeAccessibility,
    pub agency: Option<AgencyId>,
}

impl EdgeSpec {
    /// An unscheduled edge (walk, bike, rideshare).
    pub fn street(source: NodeId, target: NodeId, mode: Mode, distance_m: f64) -> Self {
        Self {
            source,
            target,
            mode,
            distance_m,
            geometry: Vec::new(),
            schedule: Vec::new(),
            windows: Vec::new(),
            fare: FareData::Free,
            accessibility: EdgeAccessibility::default(),
            agency: None,
        }
    }

    /// A scheduled transit edge.
    pub fn transit(
        source: NodeId,
        target: NodeId,
        mode: Mode,
        distance_m: f64,
        schedule: Vec<ScheduledDeparture>,
    ) -> Self {
        Self {
            schedule,
            fare: FareData::Unknown,
            ..Self::street(source, target, mode, distance_m)
        }
    }

    pub fn fare(mut self, fare: FareData) -> Self {
        self.fare = fare;
        self
    }

    pub fn windows(mut self, windows: Vec<TimeWindow>) -> Self {
        self.windows = windows;
        self
    }

    pub fn accessibility(mut self, accessibility: EdgeAccessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    pub fn agency(mut self, agency: impl Into<String>) -> Self {
        self.agency = Some(AgencyId::new(agency));
        self
    }

    pub fn geometry(mut self, geometry: Vec<Coordinate>) -> Self {
        self.geometry = geometry;
        self
    }
}

/// Incremental builder for a [`GraphSnapshot`].
///
/// Nodes get dense ids in insertion order. Validation happens in
/// [`build`](Self::build).
#[derive(Debug)]
pub struct SnapshotBuilder {
    region: Region,
    nodes: Vec<Node>,
    keys: HashMap<String, NodeId>,
    edges: Vec<EdgeSpec>,
    duplicate: Option<String>,
    geometry_tolerance_m: f64,
}

impl SnapshotBuilder {
    pub fn new(region_id: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            region: Region {
                id: region_id.into(),
                bbox,
            },
            nodes: Vec::new(),
            keys: HashMap::new(),
            edges: Vec::new(),
            duplicate: None,
            geometry_tolerance_m: DEFAULT_GEOMETRY_TOLERANCE_M,
        }
    }

    pub fn geometry_tolerance(mut self, meters: f64) -> Self {
        self.geometry_tolerance_m = meters;
        self
    }

    pub fn add_node(
        &mut self,
        key: impl Into<String>,
        coord: Coordinate,
        kind: NodeKind,
        accessibility: NodeAccessibility,
    ) -> NodeId {
        let key = key.into();
        let id = NodeId(self.nodes.len() as u32);
        if self.keys.insert(key.clone(), id).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(key.clone());
        }
        self.nodes.push(Node {
            id,
            key,
            coord,
            kind,
            accessibility,
        });
        id
    }

    pub fn node_id(&self, key: &str) -> Option<NodeId> {
        self.keys.get(key).copied()
    }

    pub fn add_edge(&mut self, spec: EdgeSpec) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(spec);
        id
    }

    /// Validate and freeze the snapshot.
    pub fn build(self, version: u64) -> Result<GraphSnapshot, SnapshotError> {
        if let Some(key) = self.duplicate {
            return Err(SnapshotError::DuplicateNode(key));
        }

        let mut edges = Vec::with_capacity(self.edges.len());
        let mut outgoing = vec![Vec::new(); self.nodes.len()];

        for (i, spec) in self.edges.into_iter().enumerate() {
            let edge = validate_edge(i, spec, &self.nodes, self.geometry_tolerance_m)?;
            outgoing[edge.source.index()].push(edge.id);
            edges.push(edge);
        }

        let index = RTree::bulk_load(
            self.nodes
                .iter()
                .map(|n| IndexedNode {
                    point: n.coord.xy(),
                    id: n.id,
                })
                .collect(),
        );

        tracing::debug!(
            region = %self.region.id,
            version,
            nodes = self.nodes.len(),
            edges = edges.len(),
            "built graph snapshot"
        );

        Ok(GraphSnapshot {
            version,
            region: self.region,
            nodes: self.nodes,
            edges,
            outgoing,
            index,
        })
    }
}

fn validate_edge(
    i: usize,
    spec: EdgeSpec,
    nodes: &[Node],
    tolerance_m: f64,
) -> Result<Edge, SnapshotError> {
    let node = |id: NodeId| {
        nodes
            .get(id.index())
            .ok_or(SnapshotError::MissingNode { edge: i, node: id })
    };
    let source = node(spec.source)?;
    let target = node(spec.target)?;

    if !spec.distance_m.is_finite() || spec.distance_m < 0.0 {
        return Err(SnapshotError::InvalidDistance {
            edge: i,
            distance_m: spec.distance_m,
        });
    }

    let geometry = if spec.geometry.is_empty() {
        vec![source.coord, target.coord]
    } else {
        spec.geometry
    };
    for (endpoint, node) in [(geometry.first(), source), (geometry.last(), target)] {
        if let Some(point) = endpoint {
            let offset_m = point.distance_m(&node.coord);
            if offset_m > tolerance_m {
                return Err(SnapshotError::GeometryMismatch { edge: i, offset_m });
            }
        }
    }

    let travel_time = if spec.mode.is_scheduled() {
        if spec.schedule.is_empty() {
            return Err(SnapshotError::InvalidSchedule {
                edge: i,
                reason: "scheduled mode without a timetable",
            });
        }
        if spec.schedule.iter().any(|d| d.duration_secs < 0) {
            return Err(SnapshotError::InvalidSchedule {
                edge: i,
                reason: "negative scheduled duration",
            });
        }
        let mut schedule = spec.schedule;
        schedule.sort_by_key(|d| d.departure);
        TravelTime::Schedule(schedule)
    } else {
        if !spec.schedule.is_empty() || !spec.windows.is_empty() {
            return Err(SnapshotError::InvalidSchedule {
                edge: i,
                reason: "unscheduled mode with a timetable or time windows",
            });
        }
        TravelTime::Street
    };

    if spec.windows.iter().any(|w| w.start >= w.end) {
        return Err(SnapshotError::InvalidSchedule {
            edge: i,
            reason: "empty time window",
        });
    }

    if let FareData::Amount(amount) = spec.fare {
        if !amount.is_finite() || amount < 0.0 {
            return Err(SnapshotError::InvalidFare { edge: i });
        }
    }

    Ok(Edge {
        id: EdgeId(i as u32),
        source: spec.source,
        target: spec.target,
        mode: spec.mode,
        geometry,
        distance_m: spec.distance_m,
        travel_time,
        windows: spec.windows,
        fare: spec.fare,
        accessibility: spec.accessibility,
        agency: spec.agency,
    })
}
