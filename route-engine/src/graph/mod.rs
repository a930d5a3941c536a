//! The routable graph: immutable snapshots, their registry and loading.

mod load;
mod snapshot;
mod store;

pub use load::{FileSnapshotLoader, LoadError, SnapshotFile, SnapshotLoader};
pub use snapshot::{
    DEFAULT_GEOMETRY_TOLERANCE_M, EdgeSpec, GraphSnapshot, Region, SnapshotBuilder, SnapshotError,
};
pub use store::{SnapshotStore, StoreError};
