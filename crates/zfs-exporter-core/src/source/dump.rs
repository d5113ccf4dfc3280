//! Pool statistics read from a directory of JSON dumps, one `<pool>.json` per pool.

use std::path::{Path, PathBuf};

use super::PoolSource;
use super::fs::FileSystem;
use crate::error::SourceError;
use crate::model::PoolStats;

const DUMP_EXTENSION: &str = "json";

pub struct DumpSource<F: FileSystem> {
    fs: F,
    dir: PathBuf,
}

impl<F: FileSystem> DumpSource<F> {
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `dir` - Directory holding the `<pool>.json` dumps
    pub fn new(fs: F, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn dump_path(&self, pool: &str) -> PathBuf {
        self.dir.join(format!("{pool}.{DUMP_EXTENSION}"))
    }
}

impl<F: FileSystem> PoolSource for DumpSource<F> {
    fn list_pools(&self) -> Result<Vec<String>, SourceError> {
        let entries = self.fs.read_dir(&self.dir).map_err(|source| SourceError::List {
            path: self.dir.clone(),
            source,
        })?;
        let mut pools: Vec<String> = entries
            .iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == DUMP_EXTENSION))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()))
            .map(str::to_string)
            .collect();
        pools.sort();
        Ok(pools)
    }

    fn pool_stats(&self, pool: &str) -> Result<PoolStats, SourceError> {
        let content = self
            .fs
            .read_to_string(&self.dump_path(pool))
            .map_err(|source| SourceError::Read {
                pool: pool.to_string(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| SourceError::Decode {
            pool: pool.to_string(),
            source,
        })
    }
}
