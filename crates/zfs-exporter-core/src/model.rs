//! Typed pool statistics as reported by the kernel for one pool.
//!
//! Field names follow the kernel's nvlist keys, so a pool record can be
//! decoded directly from a JSON rendering of that nvlist. Anything whose shape
//! does not match is rejected once, when the record is decoded.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Statistics record for one pool.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoolStats {
    pub pool_guid: u64,
    pub error_count: u64,
    /// Number of top level vdevs.
    pub vdev_children: u64,
    /// Transaction group of the last configuration change or pool load.
    pub txg: u64,
    /// `[seconds, nanoseconds]` of the pool import.
    #[serde(default)]
    pub initial_load_time: Vec<u64>,
    pub vdev_tree: VdevNode,
}

impl PoolStats {
    /// Import time in seconds, 0 when the source does not report one.
    pub fn load_time(&self) -> u64 {
        self.initial_load_time.first().copied().unwrap_or_default()
    }

    /// Positional scan/resilver progress record, carried on the root vdev.
    pub fn scan_stats(&self) -> Option<&[u64]> {
        self.vdev_tree.scan_stats.as_deref()
    }
}

/// Vdev types that get special treatment when naming vdevs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum VdevType {
    Disk,
    File,
    Mirror,
    Raidz,
    Draid,
    Root,
    Indirect,
    /// Any other type token (replacing, spare, hole, ...), kept verbatim.
    Other(String),
}

impl VdevType {
    pub fn as_str(&self) -> &str {
        match self {
            VdevType::Disk => "disk",
            VdevType::File => "file",
            VdevType::Mirror => "mirror",
            VdevType::Raidz => "raidz",
            VdevType::Draid => "draid",
            VdevType::Root => "root",
            VdevType::Indirect => "indirect",
            VdevType::Other(s) => s,
        }
    }

    /// Leaf devices: physical disks and backing files.
    pub fn is_leaf(&self) -> bool {
        matches!(self, VdevType::Disk | VdevType::File)
    }
}

impl From<String> for VdevType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "disk" => VdevType::Disk,
            "file" => VdevType::File,
            "mirror" => VdevType::Mirror,
            "raidz" => VdevType::Raidz,
            "draid" => VdevType::Draid,
            "root" => VdevType::Root,
            "indirect" => VdevType::Indirect,
            _ => VdevType::Other(s),
        }
    }
}

impl std::fmt::Display for VdevType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the vdev tree: the root, a group, or a leaf device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VdevNode {
    #[serde(rename = "type")]
    pub vdev_type: VdevType,
    /// Position among siblings.
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub children: Option<Vec<VdevNode>>,
    #[serde(default)]
    pub nparity: Option<u64>,
    #[serde(default)]
    pub draid_ndata: Option<u64>,
    #[serde(default)]
    pub draid_nspares: Option<u64>,
    /// Positional counters (`vdev_stat_t`), layout per `schema::VDEV_STATS`.
    #[serde(default)]
    pub vdev_stats: Vec<u64>,
    /// Extended stats keyed by name (`vdev_stats_ex`).
    #[serde(default)]
    pub vdev_stats_ex: BTreeMap<String, ExtStatValue>,
    /// Only present on the root node.
    #[serde(default)]
    pub scan_stats: Option<Vec<u64>>,
}

impl VdevNode {
    /// Creates a node of the given type with no attributes or stats.
    pub fn new(vdev_type: VdevType, id: u64) -> Self {
        Self {
            vdev_type,
            id,
            path: None,
            children: None,
            nparity: None,
            draid_ndata: None,
            draid_nspares: None,
            vdev_stats: Vec::new(),
            vdev_stats_ex: BTreeMap::new(),
            scan_stats: None,
        }
    }

    /// Direct children, empty for leaves.
    pub fn children(&self) -> &[VdevNode] {
        self.children.as_deref().unwrap_or_default()
    }
}

/// Value of one extended stat.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExtStatValue {
    Scalar(u64),
    Histogram(Vec<u64>),
    /// Anything else. Rejected when emitted.
    Unsupported(serde_json::Value),
}

impl ExtStatValue {
    /// Short description of an unsupported value's shape for error reports.
    pub fn shape(&self) -> &'static str {
        match self {
            ExtStatValue::Scalar(_) => "uint64",
            ExtStatValue::Histogram(_) => "uint64 array",
            ExtStatValue::Unsupported(v) => match v {
                serde_json::Value::Null => "null",
                serde_json::Value::Bool(_) => "bool",
                serde_json::Value::Number(n) if n.is_i64() => "negative integer",
                serde_json::Value::Number(_) => "float",
                serde_json::Value::String(_) => "string",
                serde_json::Value::Array(_) => "array",
                serde_json::Value::Object(_) => "object",
            },
        }
    }
}
