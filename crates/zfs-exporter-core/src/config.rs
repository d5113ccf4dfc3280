//! Exporter settings consumed by a collection pass.

/// How much of each pool's vdev tree is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExporterConfig {
    /// Depth of the vdev tree to report on. 0 is the pool only, 1 adds top
    /// level vdevs, 2 or more reports the whole tree.
    pub depth: u32,
    /// Report the full path of disks instead of the final path component.
    pub full_path: bool,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            depth: 1,
            full_path: false,
        }
    }
}

impl ExporterConfig {
    /// Creates a new ExporterConfig with custom values.
    pub fn new(depth: u32, full_path: bool) -> Self {
        Self { depth, full_path }
    }
}
