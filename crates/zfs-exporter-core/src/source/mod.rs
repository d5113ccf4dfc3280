//! Where pool statistics come from.
//!
//! A [`PoolSource`] lists pools and returns one statistics record per pool.
//! [`DumpSource`] reads JSON renderings of the kernel's pool stats nvlists
//! from a directory, through the [`FileSystem`] trait so tests can use
//! [`MockFs`] in place of the real filesystem.

mod dump;
pub mod fs;
pub mod mock;

pub use dump::DumpSource;
pub use fs::{FileSystem, RealFs};
pub use mock::MockFs;

use crate::error::SourceError;
use crate::model::PoolStats;

/// Provider of per-pool statistics records.
pub trait PoolSource: Send + Sync {
    /// Names of every known pool, sorted.
    fn list_pools(&self) -> Result<Vec<String>, SourceError>;

    /// Fresh statistics record for one pool.
    fn pool_stats(&self, pool: &str) -> Result<PoolStats, SourceError>;
}
