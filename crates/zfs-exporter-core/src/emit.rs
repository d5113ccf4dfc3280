//! Per-vdev metric emission and vdev tree traversal.
//!
//! Vdevs, the pool root and individual devices all carry vdev stats, though
//! not every stat applies to every type. Everything present in the data is
//! reported; inapplicable stats are generally 0.

use std::path::Path;

use prometheus::core::Desc;
use tracing::{debug, trace};

use crate::config::ExporterConfig;
use crate::error::ExportError;
use crate::histogram::{self, Histogram};
use crate::identity::vdev_name;
use crate::model::{ExtStatValue, VdevNode, VdevType};
use crate::schema::Registry;

/// `max_depth` for an unbounded [`Emitter::descend`].
pub const FULL_DEPTH: u32 = u32::MAX;

/// Sample value of one observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Gauge(f64),
    Untyped(f64),
    Histogram(Histogram),
}

/// One metric sample: a descriptor, label values in descriptor order, and a value.
#[derive(Debug, Clone)]
pub struct Observation<'r> {
    pub desc: &'r Desc,
    pub labels: Vec<String>,
    pub value: Value,
}

impl<'r> Observation<'r> {
    pub fn new<I, S>(desc: &'r Desc, labels: I, value: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            desc,
            labels: labels.into_iter().map(Into::into).collect(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.desc.fq_name
    }

    /// Value of the named label, if the descriptor declares it.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .variable_labels
            .iter()
            .position(|l| l == name)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }
}

/// Emits vdev metrics for one pool into an observation buffer.
pub struct Emitter<'r, 'a> {
    registry: &'r Registry,
    config: &'a ExporterConfig,
    pool: &'a str,
}

impl<'r, 'a> Emitter<'r, 'a> {
    pub fn new(registry: &'r Registry, config: &'a ExporterConfig, pool: &'a str) -> Self {
        Self {
            registry,
            config,
            pool,
        }
    }

    /// Value of the `path` label: empty without a path, otherwise the final
    /// component unless full paths are requested. Files always keep the full path.
    fn path_label(&self, node: &VdevNode) -> String {
        let Some(path) = node.path.as_deref() else {
            return String::new();
        };
        if self.config.full_path || node.vdev_type == VdevType::File {
            return path.to_string();
        }
        Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string())
    }

    /// Reports basic and extended stats of `node` under the `vdev` label `name`.
    pub fn vdev_stats(
        &self,
        name: &str,
        node: &VdevNode,
        out: &mut Vec<Observation<'r>>,
    ) -> Result<(), ExportError> {
        let reg = self.registry;
        let pool = self.pool;

        // The child count makes disk IO stats that bubble up into a vdev
        // interpretable. It is approximate in nested layouts.
        if let Some(children) = &node.children {
            out.push(Observation::new(
                &reg.vdev_children,
                [name, pool],
                Value::Gauge(children.len() as f64),
            ));
        }
        if let Some(nparity) = node.nparity {
            out.push(Observation::new(
                &reg.vdev_nparity,
                [name, pool],
                Value::Gauge(nparity as f64),
            ));
        }

        let path = self.path_label(node);

        // zip stops at whichever runs out: extra raw stats from newer kernels
        // are ignored, shorter arrays from older kernels end the walk early.
        let layout = reg.vdev_layout();
        if node.vdev_stats.len() < layout.len() {
            debug!(
                pool,
                vdev = name,
                raw = node.vdev_stats.len(),
                known = layout.len(),
                "short vdev_stats array"
            );
        }
        for (&raw, slot) in node.vdev_stats.iter().zip(layout) {
            let Some(slot) = slot else {
                continue;
            };
            let mut labels = vec![name.to_string(), pool.to_string(), path.clone()];
            labels.extend(slot.variant.map(str::to_string));
            out.push(Observation {
                desc: reg.slot_desc(slot),
                labels,
                value: Value::Untyped(raw as f64),
            });
        }

        for (key, value) in &node.vdev_stats_ex {
            let Some(stat) = reg.ext_stat(key) else {
                trace!(key = key.as_str(), "ignoring unknown extended stat");
                continue;
            };
            let value = match value {
                ExtStatValue::Scalar(v) => Value::Gauge(*v as f64),
                ExtStatValue::Histogram(buckets) => Value::Histogram(histogram::decode(buckets)),
                ExtStatValue::Unsupported(_) => {
                    return Err(ExportError::UnexpectedExtStat {
                        key: key.clone(),
                        shape: value.shape(),
                    });
                }
            };
            out.push(Observation::new(
                stat.desc,
                [stat.label, name, pool, path.as_str()],
                value,
            ));
        }
        Ok(())
    }

    /// Reports the children of `node`, named under `parent`, descending while
    /// `depth < max_depth`. Depth 0 reports nothing. Pass [`FULL_DEPTH`] as
    /// `max_depth` to walk the whole subtree.
    pub fn descend(
        &self,
        parent: &str,
        node: &VdevNode,
        max_depth: u32,
        depth: u32,
        out: &mut Vec<Observation<'r>>,
    ) -> Result<(), ExportError> {
        if depth == 0 {
            return Ok(());
        }
        for child in node.children() {
            let name = vdev_name(parent, child);
            self.vdev_stats(&name, child, out)?;
            if depth < max_depth {
                self.descend(&name, child, max_depth, depth + 1, out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn registry() -> Registry {
        Registry::new().unwrap()
    }

    fn disk(id: u64, path: &str) -> VdevNode {
        let mut node = VdevNode::new(VdevType::Disk, id);
        node.path = Some(path.to_string());
        node
    }

    fn named<'a, 'r>(out: &'a [Observation<'r>], name: &str) -> Vec<&'a Observation<'r>> {
        out.iter().filter(|o| o.name() == name).collect()
    }

    #[test]
    fn test_children_and_nparity_gauges() {
        let reg = registry();
        let config = ExporterConfig::default();
        let emitter = Emitter::new(&reg, &config, "tank");
        let mut raidz = VdevNode::new(VdevType::Raidz, 0);
        raidz.nparity = Some(2);
        raidz.children = Some(vec![disk(0, "/dev/sda"), disk(1, "/dev/sdb")]);

        let mut out = Vec::new();
        emitter.vdev_stats("raidz2-0", &raidz, &mut out).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name(), "zfs_vdev_children");
        assert_eq!(out[0].labels, vec!["raidz2-0", "tank"]);
        assert_eq!(out[0].value, Value::Gauge(2.0));
        assert_eq!(out[1].name(), "zfs_vdev_nparity");
        assert_eq!(out[1].value, Value::Gauge(2.0));
    }

    #[test]
    fn test_path_label() {
        let reg = registry();
        let short = ExporterConfig::new(1, false);
        let full = ExporterConfig::new(1, true);
        let node = disk(0, "/dev/disk/by-id/ata-foo-part1");
        let mut file = VdevNode::new(VdevType::File, 0);
        file.path = Some("/var/tmp/pool.img".to_string());

        let emitter = Emitter::new(&reg, &short, "tank");
        assert_eq!(emitter.path_label(&node), "ata-foo-part1");
        assert_eq!(emitter.path_label(&file), "/var/tmp/pool.img");
        assert_eq!(emitter.path_label(&VdevNode::new(VdevType::Mirror, 0)), "");

        let emitter = Emitter::new(&reg, &full, "tank");
        assert_eq!(emitter.path_label(&node), "/dev/disk/by-id/ata-foo-part1");
    }

    #[test]
    fn test_short_vdev_stats_array() {
        let reg = registry();
        let config = ExporterConfig::default();
        let emitter = Emitter::new(&reg, &config, "tank");
        let mut node = disk(0, "/dev/sda");
        // timestamp, state, aux state, allocated, capacity
        node.vdev_stats = vec![100, 7, 0, 1024, 4096];

        let mut out = Vec::new();
        emitter.vdev_stats("mirror-0", &node, &mut out).unwrap();
        let names: Vec<_> = out.iter().map(|o| o.name()).collect();
        assert_eq!(
            names,
            vec![
                "zfs_vdev_state",
                "zfs_vdev_space_allocated_bytes",
                "zfs_vdev_space_capacity_bytes"
            ]
        );
        assert_eq!(out[0].value, Value::Untyped(7.0));
        assert_eq!(out[0].labels, vec!["mirror-0", "tank", "sda"]);
    }

    #[test]
    fn test_full_and_oversized_vdev_stats_array() {
        let reg = registry();
        let config = ExporterConfig::default();
        let emitter = Emitter::new(&reg, &config, "tank");
        let mut node = disk(0, "/dev/sda");
        let width = reg.vdev_layout().len();
        node.vdev_stats = (0..width as u64 + 5).collect();

        let mut out = Vec::new();
        emitter.vdev_stats("disk-0", &node, &mut out).unwrap();
        assert_eq!(out.len(), width - 3);
        let last = out.last().unwrap();
        assert_eq!(last.name(), "zfs_vdev_physical_capacity_bytes");
        assert_eq!(last.value, Value::Untyped((width - 1) as f64));
    }

    #[test]
    fn test_variant_stat_emits_one_per_variant() {
        let reg = registry();
        let config = ExporterConfig::default();
        let emitter = Emitter::new(&reg, &config, "tank");
        let mut node = disk(0, "/dev/sda");
        node.vdev_stats = (0..30).collect();

        let mut out = Vec::new();
        emitter.vdev_stats("disk-0", &node, &mut out).unwrap();
        let ops = named(&out, "zfs_vdev_ops");
        let types: Vec<_> = ops.iter().map(|o| o.label("type").unwrap()).collect();
        assert_eq!(types, vec!["null", "read", "write", "free", "claim", "ioctl"]);
        let values: Vec<_> = ops.iter().map(|o| o.value.clone()).collect();
        assert_eq!(values, (8..14).map(|v| Value::Untyped(v as f64)).collect::<Vec<_>>());

        let errors = named(&out, "zfs_vdev_errors");
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[2].label("type"), Some("checksum"));
        assert_eq!(errors[2].value, Value::Untyped(22.0));
    }

    #[test]
    fn test_extended_stats() {
        let reg = registry();
        let config = ExporterConfig::default();
        let emitter = Emitter::new(&reg, &config, "tank");
        let mut node = disk(0, "/dev/sda");
        let mut ex = BTreeMap::new();
        ex.insert("vdev_sync_r_active_queue".to_string(), ExtStatValue::Scalar(4));
        ex.insert("vdev_disk_r_lat_histo".to_string(), ExtStatValue::Histogram(vec![1; 37]));
        ex.insert("vdev_future_thing".to_string(), ExtStatValue::Scalar(9));
        node.vdev_stats_ex = ex;

        let mut out = Vec::new();
        emitter.vdev_stats("mirror-0", &node, &mut out).unwrap();
        assert_eq!(out.len(), 2);

        let latency = &out[0];
        assert_eq!(latency.name(), "zfs_vdev_latency_disk");
        assert_eq!(latency.labels, vec!["read", "mirror-0", "tank", "sda"]);
        match &latency.value {
            Value::Histogram(h) => {
                assert_eq!(h.count, 37);
                assert_eq!(h.buckets.len(), 37);
            }
            other => panic!("expected histogram, got {other:?}"),
        }

        let queue = &out[1];
        assert_eq!(queue.name(), "zfs_vdev_queue_active_length");
        assert_eq!(queue.label("type"), Some("sync_read"));
        assert_eq!(queue.value, Value::Gauge(4.0));
    }

    #[test]
    fn test_unknown_extended_stat_only() {
        let reg = registry();
        let config = ExporterConfig::default();
        let emitter = Emitter::new(&reg, &config, "tank");
        let mut node = disk(0, "/dev/sda");
        node.vdev_stats_ex
            .insert("vdev_new_in_future".to_string(), ExtStatValue::Histogram(vec![1, 2]));

        let mut out = Vec::new();
        emitter.vdev_stats("disk-0", &node, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_unsupported_extended_stat_is_fatal() {
        let reg = registry();
        let config = ExporterConfig::default();
        let emitter = Emitter::new(&reg, &config, "tank");
        let mut node = disk(0, "/dev/sda");
        node.vdev_stats_ex.insert(
            "vdev_trim_histo".to_string(),
            ExtStatValue::Unsupported(serde_json::Value::String("x".into())),
        );

        let mut out = Vec::new();
        let err = emitter.vdev_stats("disk-0", &node, &mut out).unwrap_err();
        match err {
            ExportError::UnexpectedExtStat { key, shape } => {
                assert_eq!(key, "vdev_trim_histo");
                assert_eq!(shape, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_descend_respects_depth() {
        let reg = registry();
        let config = ExporterConfig::default();
        let emitter = Emitter::new(&reg, &config, "tank");
        let with_state = |id, path| {
            let mut d = disk(id, path);
            d.vdev_stats = vec![0, 7];
            d
        };

        let mut replacing = VdevNode::new(VdevType::Other("replacing".to_string()), 1);
        replacing.children = Some(vec![with_state(0, "/dev/sdc"), with_state(1, "/dev/sdd")]);
        let mut mirror = VdevNode::new(VdevType::Mirror, 0);
        mirror.children = Some(vec![with_state(0, "/dev/sdb"), replacing]);

        // Children of mirror-0 only.
        let mut out = Vec::new();
        emitter.descend("mirror-0", &mirror, 1, 1, &mut out).unwrap();
        let states: Vec<_> = named(&out, "zfs_vdev_state")
            .into_iter()
            .map(|o| (o.label("vdev").unwrap(), o.label("path").unwrap()))
            .collect();
        assert_eq!(states, vec![("mirror-0", "sdb")]);
        let groups = named(&out, "zfs_vdev_children");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label("vdev"), Some("mirror-0/replacing-1"));

        // Unbounded, the disks under replacing-1 show up too.
        let mut deeper = Vec::new();
        emitter.descend("mirror-0", &mirror, FULL_DEPTH, 1, &mut deeper).unwrap();
        let states: Vec<_> = named(&deeper, "zfs_vdev_state")
            .into_iter()
            .map(|o| (o.label("vdev").unwrap(), o.label("path").unwrap()))
            .collect();
        assert_eq!(
            states,
            vec![
                ("mirror-0", "sdb"),
                ("mirror-0/replacing-1", "sdc"),
                ("mirror-0/replacing-1", "sdd"),
            ]
        );

        let mut none = Vec::new();
        emitter.descend("mirror-0", &mirror, FULL_DEPTH, 0, &mut none).unwrap();
        assert!(none.is_empty());
    }
}
