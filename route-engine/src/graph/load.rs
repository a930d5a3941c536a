//! Snapshot loading.
//!
//! Snapshots are produced by an external ingestion pipeline. The engine
//! only consumes them through [`SnapshotLoader`]; [`FileSnapshotLoader`]
//! reads the pipeline's JSON output from a directory.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{
    BoundingBox, Coordinate, EdgeAccessibility, FareData, Mode, NodeAccessibility, NodeKind,
    ScheduledDeparture, TimeWindow,
};

use super::{EdgeSpec, GraphSnapshot, SnapshotBuilder, SnapshotError};

/// Errors from loading a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Json { path: PathBuf, message: String },

    #[error("edge {edge} references unknown node key {key:?}")]
    UnknownNodeKey { edge: usize, key: String },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("no snapshot covers the requested region")]
    NotCovered,
}

/// Source of graph snapshots.
pub trait SnapshotLoader: Send + Sync {
    /// Load the newest snapshot whose region covers `bbox`.
    fn load_snapshot(
        &self,
        bbox: BoundingBox,
    ) -> impl Future<Output = Result<GraphSnapshot, LoadError>> + Send;
}

/// On-disk snapshot format.
#[derive(Debug, Deserialize)]
pub struct SnapshotFile {
    pub region: RegionRecord,
    pub version: u64,
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Deserialize)]
pub struct RegionRecord {
    pub id: String,
    pub bbox: BoundingBox,
}

#[derive(Debug, Deserialize)]
pub struct NodeRecord {
    pub key: String,
    pub coord: Coordinate,
    pub kind: NodeKind,
    #[serde(default)]
    pub accessibility: NodeAccessibility,
}

#[derive(Debug, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub mode: Mode,
    pub distance_m: f64,
    #[serde(default)]
    pub geometry: Vec<Coordinate>,
    #[serde(default)]
    pub schedule: Vec<ScheduledDeparture>,
    #[serde(default)]
    pub windows: Vec<TimeWindow>,
    #[serde(default)]
    pub fare: FareData,
    #[serde(default)]
    pub accessibility: EdgeAccessibility,
    #[serde(default)]
    pub agency: Option<String>,
}

impl SnapshotFile {
    pub fn from_json(path: &Path, json: &str) -> Result<Self, LoadError> {
        serde_json::from_str(json).map_err(|e| LoadError::Json {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Resolve node keys and build a validated snapshot.
    pub fn into_snapshot(self) -> Result<GraphSnapshot, LoadError> {
        let mut builder = SnapshotBuilder::new(self.region.id, self.region.bbox);
        for node in self.nodes {
            builder.add_node(node.key, node.coord, node.kind, node.accessibility);
        }

        for (i, edge) in self.edges.into_iter().enumerate() {
            let lookup = |key: &str| {
                builder.node_id(key).ok_or_else(|| LoadError::UnknownNodeKey {
                    edge: i,
                    key: key.to_string(),
                })
            };
            let source = lookup(&edge.source)?;
            let target = lookup(&edge.target)?;

            let mut spec = EdgeSpec::street(source, target, edge.mode, edge.distance_m)
                .geometry(edge.geometry)
                .windows(edge.windows)
                .fare(edge.fare)
                .accessibility(edge.accessibility);
            spec.schedule = edge.schedule;
            if let Some(agency) = edge.agency {
                spec = spec.agency(agency);
            }
            builder.add_edge(spec);
        }

        Ok(builder.build(self.version)?)
    }
}

/// Loads snapshots from the `*.json` files in a directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotLoader {
    dir: PathBuf,
}

impl FileSnapshotLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Read and build a single snapshot file.
    pub async fn load_file(path: &Path) -> Result<GraphSnapshot, LoadError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        SnapshotFile::from_json(path, &json)?.into_snapshot()
    }

    async fn candidates(&self) -> Result<Vec<PathBuf>, LoadError> {
        let io_err = |source| LoadError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_err)?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl SnapshotLoader for FileSnapshotLoader {
    async fn load_snapshot(&self, bbox: BoundingBox) -> Result<GraphSnapshot, LoadError> {
        let mut best: Option<GraphSnapshot> = None;

        for path in self.candidates().await? {
            let snapshot = Self::load_file(&path).await?;
            let region = &snapshot.region().bbox;
            if !region.covers(&bbox) {
                tracing::trace!(path = %path.display(), "snapshot does not cover region");
                continue;
            }

            let better = match &best {
                None => true,
                Some(current) => {
                    let (area, current_area) = (region.area(), current.region().bbox.area());
                    area < current_area
                        || (area == current_area && snapshot.version() > current.version())
                }
            };
            if better {
                best = Some(snapshot);
            }
        }

        let snapshot = best.ok_or(LoadError::NotCovered)?;
        tracing::info!(
            region = %snapshot.region().id,
            version = snapshot.version(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }
}
