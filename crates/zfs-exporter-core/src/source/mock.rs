//! In-memory filesystem for testing sources without real pool dumps.
//!
//! `MockFs` holds files and directories in memory. The scenario builders
//! below lay out dump directories for common pool shapes.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use super::fs::FileSystem;

/// Directory the scenario builders place their dumps in.
pub const MOCK_DUMP_DIR: &str = "/run/zfs-exporter";

/// In-memory filesystem for testing.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: HashMap<PathBuf, String>,
    directories: HashSet<PathBuf>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content. Parent directories are created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    /// Adds `<MOCK_DUMP_DIR>/<pool>.json`.
    pub fn add_pool(&mut self, pool: &str, json: impl Into<String>) {
        self.add_file(Path::new(MOCK_DUMP_DIR).join(format!("{pool}.json")), json);
    }

    /// One pool, `tank`, with a mirror of two disks.
    pub fn mirror_pool() -> Self {
        let mut fs = Self::new();
        fs.add_pool("tank", MIRROR_POOL);
        fs
    }

    /// One pool, `tank`, resilvering: mirror-0 holds a disk and a replacing
    /// vdev with the outgoing and incoming disks.
    pub fn resilvering_pool() -> Self {
        let mut fs = Self::new();
        fs.add_pool("tank", RESILVERING_POOL);
        fs
    }

    /// Two pools: `tank` (mirror) and `backup` (raidz2 of four disks, scrub
    /// running). The first raidz disk carries a full `vdev_stats` array and
    /// two histograms.
    pub fn two_pools() -> Self {
        let mut fs = Self::mirror_pool();
        fs.add_pool("backup", RAIDZ_POOL);
        fs
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut entries = HashSet::new();
        for file_path in self.files.keys() {
            if file_path.parent().is_some_and(|parent| parent == path) {
                entries.insert(file_path.clone());
            }
        }
        for dir_path in &self.directories {
            if dir_path.parent().is_some_and(|parent| parent == path) && dir_path != path {
                entries.insert(dir_path.clone());
            }
        }
        Ok(entries.into_iter().collect())
    }
}

const MIRROR_POOL: &str = r#"{
    "name": "tank",
    "pool_guid": 1234567890123,
    "error_count": 0,
    "vdev_children": 1,
    "txg": 4,
    "initial_load_time": [1700000000, 123456],
    "vdev_tree": {
        "type": "root",
        "id": 0,
        "vdev_stats": [1, 7, 0, 4096, 1048576],
        "children": [
            {
                "type": "mirror",
                "id": 0,
                "vdev_stats": [1, 7, 0, 4096, 1048576],
                "children": [
                    {
                        "type": "disk",
                        "id": 0,
                        "path": "/dev/disk/by-id/ata-A-part1",
                        "vdev_stats": [1, 7, 0, 2048, 1048576],
                        "vdev_stats_ex": {
                            "vdev_sync_r_active_queue": 1
                        }
                    },
                    {
                        "type": "disk",
                        "id": 1,
                        "path": "/dev/disk/by-id/ata-B-part1",
                        "vdev_stats": [1, 7, 0, 2048, 1048576]
                    }
                ]
            }
        ]
    }
}"#;

const RESILVERING_POOL: &str = r#"{
    "pool_guid": 42,
    "error_count": 0,
    "vdev_children": 1,
    "txg": 90,
    "vdev_tree": {
        "type": "root",
        "vdev_stats": [1, 6],
        "children": [
            {
                "type": "mirror",
                "id": 0,
                "vdev_stats": [1, 6],
                "children": [
                    {"type": "disk", "id": 0, "path": "/dev/sdb", "vdev_stats": [1, 7]},
                    {
                        "type": "replacing",
                        "id": 1,
                        "vdev_stats": [1, 6],
                        "children": [
                            {"type": "disk", "id": 0, "path": "/dev/sdc", "vdev_stats": [1, 5]},
                            {"type": "disk", "id": 1, "path": "/dev/sdd", "vdev_stats": [1, 7]}
                        ]
                    }
                ]
            }
        ]
    }
}"#;

const RAIDZ_POOL: &str = r#"{
    "pool_guid": 99,
    "error_count": 2,
    "vdev_children": 1,
    "txg": 812,
    "initial_load_time": [1700000500, 0],
    "vdev_tree": {
        "type": "root",
        "id": 0,
        "vdev_stats": [1, 7],
        "scan_stats": [1, 1, 1700001000, 0, 2000000, 500000],
        "children": [
            {
                "type": "raidz",
                "id": 0,
                "nparity": 2,
                "vdev_stats": [1, 7],
                "children": [
                    {
                        "type": "disk",
                        "id": 0,
                        "path": "/dev/sda1",
                        "vdev_stats": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46],
                        "vdev_stats_ex": {
                            "vdev_disk_r_lat_histo": [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
                            "vdev_sync_ind_r_histo": [0, 2, 1]
                        }
                    },
                    {"type": "disk", "id": 1, "path": "/dev/sdb1", "vdev_stats": [1, 7]},
                    {"type": "disk", "id": 2, "path": "/dev/sdc1", "vdev_stats": [1, 7]},
                    {"type": "disk", "id": 3, "path": "/dev/sdd1", "vdev_stats": [1, 7]}
                ]
            }
        ]
    }
}"#;
