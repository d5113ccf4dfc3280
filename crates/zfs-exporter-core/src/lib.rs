//! zfs-exporter-core - turns ZFS pool statistics into Prometheus metrics.
//!
//! Provides:
//! - `source` - pool statistics sources (file dumps, mock filesystem)
//! - `model` - typed pool record and vdev tree
//! - `schema` - static stat tables and the descriptor registry
//! - `identity` - stable `vdev` label names for tree nodes
//! - `histogram` - power-of-two bucket decoding
//! - `emit` - per-vdev metric emission and tree traversal
//! - `pool` - one collection pass over every pool
//! - `exposition` - Prometheus text format rendering

pub mod config;
pub mod emit;
pub mod error;
pub mod exposition;
pub mod histogram;
pub mod identity;
pub mod model;
pub mod pool;
pub mod schema;
pub mod source;

pub use config::ExporterConfig;
pub use error::{ExportError, SourceError};
pub use pool::PoolCollector;
pub use schema::Registry;

/// Crate version with the short git commit it was built from.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("ZFS_EXPORTER_GIT_SHA"),
    ")"
);
