//! Static stat tables and the descriptor registry built from them.
//!
//! The order of `VDEV_STATS` and `SCAN_STATS` must match the kernel's
//! `vdev_stat_t` and `pool_scan_stat_t` layouts exactly: raw stats are
//! positional and carry no names of their own.

use std::collections::HashMap;

use prometheus::core::Desc;

use crate::error::ExportError;

/// One entry of a positional stat table.
///
/// An entry with an empty name is a placeholder for a raw slot that is not
/// reported. An entry with variants covers one raw slot per variant.
#[derive(Debug, Clone, Copy)]
pub struct StatDef {
    pub name: &'static str,
    pub help: &'static str,
    /// Label name and values for entries spanning several raw slots.
    pub dimension: Option<(&'static str, &'static [&'static str])>,
}

impl StatDef {
    const fn skip() -> Self {
        Self {
            name: "",
            help: "",
            dimension: None,
        }
    }

    const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            dimension: None,
        }
    }

    const fn with_variants(
        name: &'static str,
        help: &'static str,
        dimension: &'static str,
        variants: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            dimension: Some((dimension, variants)),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.name.is_empty()
    }

    /// Number of raw slots this entry consumes.
    pub fn width(&self) -> usize {
        match self.dimension {
            Some((_, variants)) => variants.len(),
            None => 1,
        }
    }
}

const ZIO_TYPES: &[&str] = &["null", "read", "write", "free", "claim", "ioctl"];

/// Layout of `vdev_stat_t`.
pub const VDEV_STATS: &[StatDef] = &[
    StatDef::skip(), // timestamp
    StatDef::new("state", "state (see pool_state_t)"),
    StatDef::skip(), // aux state, only meaningful for pools that are not imported
    StatDef::new("space_allocated_bytes", "allocated space in bytes"),
    StatDef::new("space_capacity_bytes", "total capacity in bytes"),
    StatDef::new("space_deflated_capacity_bytes", "deflated capacity in bytes"),
    StatDef::new("devsize_replaceable", "replaceable device size"),
    StatDef::new("devsize_expandable", "expandable device size"),
    StatDef::with_variants("ops", "I/O operations", "type", ZIO_TYPES),
    StatDef::with_variants("bytes", "bytes processed", "type", ZIO_TYPES),
    StatDef::with_variants(
        "errors",
        "errors encountered",
        "type",
        &["read", "write", "checksum", "initialize"],
    ),
    StatDef::new("self_healed_bytes", "bytes self-healed"),
    StatDef::skip(), // removed from the kernel
    StatDef::new("scan_processed_bytes", "bytes scanned"),
    StatDef::new("fragmentation", "fragmentation"),
    StatDef::new("initialize_processed_bytes", "bytes already initialized"),
    StatDef::new(
        "initialize_estimated_bytes",
        "estimated total number of bytes to initialize",
    ),
    StatDef::new("initialize_state", "initialize state (see initialize_state_t)"),
    StatDef::new("initialize_action_time", "initialize time"),
    StatDef::new("checkpoint_space_bytes", "checkpoint space in bytes"),
    StatDef::new("resilver_deferred", "resilver deferred"),
    StatDef::new(
        "slow_ios",
        "slow I/O operations (30 seconds or more to complete)",
    ),
    StatDef::new("trim_errors", "trim errors"),
    StatDef::new("trim_unsupported", "doesn't support TRIM"),
    StatDef::new("trim_processed_bytes", "TRIMmed bytes"),
    StatDef::new("trim_estimated_bytes", "estimated bytes to TRIM"),
    StatDef::new("trim_state", "trim state"),
    StatDef::new("trim_action_time", "trim time"),
    StatDef::new("rebuild_processed_bytes", "bytes already rebuilt"),
    StatDef::new("ashift_configured", "configured ashift"),
    StatDef::new("ashift_logical", "logical ashift"),
    StatDef::new("ashift_physical", "physical ashift"),
    // OpenZFS 2.1+.
    StatDef::new("noalloc_status", "allocations halted?"),
    StatDef::new("physical_capacity_bytes", "physical capacity"),
];

/// Layout of `pool_scan_stat_t`.
pub const SCAN_STATS: &[StatDef] = &[
    StatDef::new(
        "scan_func",
        "Pool scan function: 0 none, 1 scrub, 2 resilver, 3 rebuild (maybe)",
    ),
    StatDef::new(
        "scan_state",
        "Pool scan state: 0 none, 1 scanning, 2 finished, 3 cancelled",
    ),
    StatDef::new("scan_start_time_seconds", "Pool scan start time"),
    StatDef::new("scan_end_time_seconds", "Pool scan end time"),
    StatDef::new("scan_to_examine_bytes", "Total bytes to scan"),
    StatDef::new("scan_examined_bytes", "Total bytes examined"),
    StatDef::new("scan_to_process_bytes", "Total bytes to process"),
    StatDef::new("scan_processed_bytes", "Total bytes processed"),
    StatDef::new("scan_errors", "Scan errors"),
    // Not stored on disk.
    StatDef::new("scan_pass_examined_bytes", "Examined bytes per scan pass"),
    StatDef::new("scan_pass_start_seconds", "Start time of a scan pass"),
    StatDef::new("scan_scrub_pause", "Pause time of a scrub pass"),
    StatDef::new(
        "scan_scrub_pause_time_spent",
        "Cumulative time the scrub spent paused",
    ),
    StatDef::new("scan_pass_issued_bytes", "Issued bytes per scan pass"),
    StatDef::new("scan_issued_bytes", "Total bytes checked by scanner"),
];

/// Shared descriptors for extended stats. Several keys report into the same
/// descriptor, told apart by their `type` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtKind {
    ActiveQueue,
    PendingQueue,
    QueueLatency,
    ZioLatencyTotal,
    DiskLatency,
    /// Non-aggregated I/O sizes. There is no histogram of physical I/O sizes.
    IndividualSize,
    AggregatedSize,
}

impl ExtKind {
    /// In declaration order, so `kind as usize` indexes it.
    const ALL: [ExtKind; 7] = [
        ExtKind::ActiveQueue,
        ExtKind::PendingQueue,
        ExtKind::QueueLatency,
        ExtKind::ZioLatencyTotal,
        ExtKind::DiskLatency,
        ExtKind::IndividualSize,
        ExtKind::AggregatedSize,
    ];

    fn name_and_help(self) -> (&'static str, &'static str) {
        match self {
            ExtKind::ActiveQueue => (
                "zfs_vdev_queue_active_length",
                "Number of ZIOs issued to disk and waiting to finish",
            ),
            ExtKind::PendingQueue => (
                "zfs_vdev_queue_pending_length",
                "Number of ZIOs pending to be issued to disk",
            ),
            ExtKind::QueueLatency => (
                "zfs_vdev_queue_latency",
                "Amount of time an IO request spent in the queue",
            ),
            ExtKind::ZioLatencyTotal => (
                "zfs_vdev_zio_latency_total",
                "Total ZIO latency including queuing and disk access time.",
            ),
            ExtKind::DiskLatency => (
                "zfs_vdev_latency_disk",
                "Amount of time to read/write the disk",
            ),
            ExtKind::IndividualSize => (
                "zfs_vdev_io_size_individual",
                "Size of the 'individual' non-aggregated I/O requests issued",
            ),
            ExtKind::AggregatedSize => (
                "zfs_vdev_io_size_aggregated",
                "Size of the aggregated I/O requests issued",
            ),
        }
    }
}

/// Extended stat keys, the descriptor each one reports into, and its `type` label.
///
/// `vdev_slow_ios` is left out: it is a copy of the positional `slow_ios` stat.
pub const EXT_STATS: &[(&str, ExtKind, &str)] = &[
    ("vdev_agg_scrub_histo", ExtKind::AggregatedSize, "scrub"),
    ("vdev_agg_trim_histo", ExtKind::AggregatedSize, "trim"),
    ("vdev_async_agg_r_histo", ExtKind::AggregatedSize, "async_read"),
    ("vdev_async_agg_w_histo", ExtKind::AggregatedSize, "async_write"),
    ("vdev_async_ind_r_histo", ExtKind::IndividualSize, "async_read"),
    ("vdev_async_ind_w_histo", ExtKind::IndividualSize, "async_write"),
    ("vdev_async_r_active_queue", ExtKind::ActiveQueue, "async_read"),
    ("vdev_async_r_lat_histo", ExtKind::QueueLatency, "async_read"),
    ("vdev_async_r_pend_queue", ExtKind::PendingQueue, "async_read"),
    ("vdev_async_scrub_active_queue", ExtKind::ActiveQueue, "scrub"),
    ("vdev_async_scrub_pend_queue", ExtKind::PendingQueue, "scrub"),
    ("vdev_async_trim_active_queue", ExtKind::ActiveQueue, "trim"),
    ("vdev_async_trim_pend_queue", ExtKind::PendingQueue, "trim"),
    ("vdev_async_w_active_queue", ExtKind::ActiveQueue, "async_write"),
    ("vdev_async_w_lat_histo", ExtKind::QueueLatency, "async_write"),
    ("vdev_async_w_pend_queue", ExtKind::PendingQueue, "async_write"),
    ("vdev_disk_r_lat_histo", ExtKind::DiskLatency, "read"),
    ("vdev_disk_w_lat_histo", ExtKind::DiskLatency, "write"),
    ("vdev_ind_scrub_histo", ExtKind::IndividualSize, "scrub"),
    ("vdev_ind_trim_histo", ExtKind::IndividualSize, "trim"),
    ("vdev_scrub_histo", ExtKind::QueueLatency, "scrub"),
    ("vdev_sync_agg_r_histo", ExtKind::AggregatedSize, "sync_read"),
    ("vdev_sync_agg_w_histo", ExtKind::AggregatedSize, "sync_write"),
    ("vdev_sync_ind_r_histo", ExtKind::IndividualSize, "sync_read"),
    ("vdev_sync_ind_w_histo", ExtKind::IndividualSize, "sync_write"),
    ("vdev_sync_r_active_queue", ExtKind::ActiveQueue, "sync_read"),
    ("vdev_sync_r_lat_histo", ExtKind::QueueLatency, "sync_read"),
    ("vdev_sync_r_pend_queue", ExtKind::PendingQueue, "sync_read"),
    ("vdev_sync_w_active_queue", ExtKind::ActiveQueue, "sync_write"),
    ("vdev_sync_w_lat_histo", ExtKind::QueueLatency, "sync_write"),
    ("vdev_sync_w_pend_queue", ExtKind::PendingQueue, "sync_write"),
    ("vdev_tot_r_lat_histo", ExtKind::ZioLatencyTotal, "read"),
    ("vdev_tot_w_lat_histo", ExtKind::ZioLatencyTotal, "write"),
    ("vdev_trim_histo", ExtKind::QueueLatency, "trim"),
    // OpenZFS 2.2+.
    ("vdev_rebuild_active_queue", ExtKind::ActiveQueue, "rebuild"),
    ("vdev_rebuild_pend_queue", ExtKind::PendingQueue, "rebuild"),
    ("vdev_ind_rebuild_histo", ExtKind::IndividualSize, "rebuild"),
    ("vdev_agg_rebuild_histo", ExtKind::AggregatedSize, "rebuild"),
    ("vdev_rebuild_histo", ExtKind::QueueLatency, "rebuild"),
];

const VDEV_LABELS: &[&str] = &["vdev", "zpool", "path"];
const EXT_LABELS: &[&str] = &["type", "vdev", "zpool", "path"];
const POOL_LABELS: &[&str] = &["zpool", "guid"];

/// One raw slot of the positional vdev stats.
#[derive(Debug, Clone, Copy)]
pub struct Slot {
    /// Index into the vdev stat descriptors.
    desc: usize,
    /// Value of the dimension label for multi-slot entries.
    pub variant: Option<&'static str>,
}

/// Extended stat lookup result.
#[derive(Debug, Clone, Copy)]
pub struct ExtStat<'r> {
    pub desc: &'r Desc,
    /// Value of the `type` label.
    pub label: &'static str,
}

/// Immutable set of every metric descriptor the exporter reports.
///
/// Built once at startup and shared by every collection pass.
#[derive(Debug)]
pub struct Registry {
    vdev_descs: Vec<Desc>,
    /// One entry per raw `vdev_stats` position; `None` for skipped slots.
    vdev_layout: Vec<Option<Slot>>,
    /// One entry per raw `scan_stats` position; `None` for skipped slots.
    scan_layout: Vec<Option<Desc>>,
    ext_descs: Vec<Desc>,
    ext_index: HashMap<&'static str, (usize, &'static str)>,
    pub pool_load_time: Desc,
    pub pool_errors: Desc,
    pub pool_vdevs: Desc,
    pub pool_config_txg: Desc,
    pub vdev_children: Desc,
    pub vdev_nparity: Desc,
}

fn desc(
    name: impl Into<String>,
    help: impl Into<String>,
    labels: &[&str],
) -> Result<Desc, ExportError> {
    let labels = labels.iter().map(|l| l.to_string()).collect();
    Ok(Desc::new(name.into(), help.into(), labels, HashMap::new())?)
}

impl Registry {
    /// Builds descriptors for every table entry.
    pub fn new() -> Result<Self, ExportError> {
        Self::from_tables(VDEV_STATS, SCAN_STATS, EXT_STATS)
    }

    /// Builds a registry from custom tables. `new()` uses the kernel layouts.
    pub fn from_tables(
        vdev_stats: &'static [StatDef],
        scan_stats: &'static [StatDef],
        ext_stats: &[(&'static str, ExtKind, &'static str)],
    ) -> Result<Self, ExportError> {
        let mut vdev_descs = Vec::new();
        let mut vdev_layout = Vec::new();
        for def in vdev_stats {
            if def.is_placeholder() {
                vdev_layout.push(None);
                continue;
            }
            let name = format!("zfs_vdev_{}", def.name);
            let help = format!("ZFS VDev {}", def.help);
            let idx = vdev_descs.len();
            match def.dimension {
                None => {
                    vdev_descs.push(desc(name, help, VDEV_LABELS)?);
                    vdev_layout.push(Some(Slot {
                        desc: idx,
                        variant: None,
                    }));
                }
                Some((dimension, variants)) => {
                    let mut labels = VDEV_LABELS.to_vec();
                    labels.push(dimension);
                    vdev_descs.push(desc(name, help, &labels)?);
                    vdev_layout.extend(variants.iter().map(|v| {
                        Some(Slot {
                            desc: idx,
                            variant: Some(*v),
                        })
                    }));
                }
            }
        }

        let scan_layout = scan_stats
            .iter()
            .map(|def| {
                if def.is_placeholder() {
                    return Ok(None);
                }
                desc(
                    format!("zfs_pool_{}", def.name),
                    format!("ZFS Pool Scan {}", def.help),
                    &["zpool"],
                )
                .map(Some)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ext_descs = ExtKind::ALL
            .iter()
            .map(|kind| {
                let (name, help) = kind.name_and_help();
                desc(name, help, EXT_LABELS)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let ext_index = ext_stats
            .iter()
            .map(|&(key, kind, label)| (key, (kind as usize, label)))
            .collect();

        Ok(Self {
            vdev_descs,
            vdev_layout,
            scan_layout,
            ext_descs,
            ext_index,
            pool_load_time: desc(
                "zfs_pool_load_time_seconds",
                "The time when the pool was imported (often at system boot)",
                POOL_LABELS,
            )?,
            pool_errors: desc("zfs_pool_errors", "ZFS pool error count", POOL_LABELS)?,
            pool_vdevs: desc(
                "zfs_pool_vdevs",
                "ZFS pool top level vdev count",
                POOL_LABELS,
            )?,
            pool_config_txg: desc(
                "zfs_pool_config_txg",
                "ZFS pool configuration load or change txg",
                &["zpool"],
            )?,
            vdev_children: desc(
                "zfs_vdev_children",
                "Count of children of a vdev",
                &["vdev", "zpool"],
            )?,
            vdev_nparity: desc(
                "zfs_vdev_nparity",
                "The parity level of a vdev (not always defined)",
                &["vdev", "zpool"],
            )?,
        })
    }

    /// Raw `vdev_stats` positions in order, `None` for skipped ones.
    pub fn vdev_layout(&self) -> &[Option<Slot>] {
        &self.vdev_layout
    }

    pub fn slot_desc(&self, slot: &Slot) -> &Desc {
        &self.vdev_descs[slot.desc]
    }

    /// Raw `scan_stats` positions in `pool_scan_stat_t` order, `None` for skipped ones.
    pub fn scan_layout(&self) -> &[Option<Desc>] {
        &self.scan_layout
    }

    /// Looks up an extended stat key. Unknown keys return `None`.
    pub fn ext_stat(&self, key: &str) -> Option<ExtStat<'_>> {
        self.ext_index.get(key).map(|&(idx, label)| ExtStat {
            desc: &self.ext_descs[idx],
            label,
        })
    }

    /// Every descriptor, each listed once.
    pub fn descs(&self) -> Vec<&Desc> {
        let mut all: Vec<&Desc> = Vec::new();
        all.extend(&self.vdev_descs);
        all.extend(self.scan_layout.iter().flatten());
        all.extend(&self.ext_descs);
        all.extend([
            &self.pool_load_time,
            &self.pool_errors,
            &self.pool_vdevs,
            &self.pool_config_txg,
            &self.vdev_children,
            &self.vdev_nparity,
        ]);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_layout_covers_every_raw_slot() {
        let registry = Registry::new().unwrap();
        let expected: usize = VDEV_STATS.iter().map(StatDef::width).sum();
        assert_eq!(registry.vdev_layout().len(), expected);
        // timestamp, aux state and the removed stat
        let skipped = registry.vdev_layout().iter().filter(|s| s.is_none()).count();
        assert_eq!(skipped, 3);
    }

    #[test]
    fn test_variants_take_consecutive_slots() {
        let registry = Registry::new().unwrap();
        let layout = registry.vdev_layout();
        // ops starts after timestamp, state, aux, and five space/devsize stats
        let ops: Vec<_> = layout[8..14].iter().map(|s| s.unwrap()).collect();
        let names: Vec<_> = ops.iter().map(|s| s.variant.unwrap()).collect();
        assert_eq!(names, ZIO_TYPES);
        for slot in &ops {
            assert_eq!(registry.slot_desc(slot).fq_name, "zfs_vdev_ops");
            assert_eq!(
                registry.slot_desc(slot).variable_labels,
                vec!["vdev", "zpool", "path", "type"]
            );
        }
        let after = layout[14].unwrap();
        assert_eq!(registry.slot_desc(&after).fq_name, "zfs_vdev_bytes");
    }

    #[test]
    fn test_scalar_desc_naming() {
        let registry = Registry::new().unwrap();
        let state = registry.vdev_layout()[1].unwrap();
        let desc = registry.slot_desc(&state);
        assert_eq!(desc.fq_name, "zfs_vdev_state");
        assert_eq!(desc.help, "ZFS VDev state (see pool_state_t)");
        assert_eq!(desc.variable_labels, vec!["vdev", "zpool", "path"]);
        assert!(state.variant.is_none());
    }

    #[test]
    fn test_scan_layout() {
        let registry = Registry::new().unwrap();
        let layout = registry.scan_layout();
        assert_eq!(layout.len(), SCAN_STATS.len());
        let func = layout[0].as_ref().unwrap();
        assert_eq!(func.fq_name, "zfs_pool_scan_func");
        assert_eq!(func.variable_labels, vec!["zpool"]);
    }

    #[test]
    fn test_scan_placeholder_keeps_positions() {
        static SCAN: &[StatDef] = &[
            StatDef::new("a", "a"),
            StatDef::skip(),
            StatDef::new("c", "c"),
        ];
        let registry = Registry::from_tables(&[], SCAN, &[]).unwrap();
        let names: Vec<_> = registry
            .scan_layout()
            .iter()
            .map(|d| d.as_ref().map(|d| d.fq_name.as_str()))
            .collect();
        assert_eq!(names, vec![Some("zfs_pool_a"), None, Some("zfs_pool_c")]);
        assert_eq!(registry.descs().len(), 2 + 7 + 6);
    }

    #[test]
    fn test_ext_stat_lookup_shares_descriptors() {
        let registry = Registry::new().unwrap();
        let scrub = registry.ext_stat("vdev_agg_scrub_histo").unwrap();
        let trim = registry.ext_stat("vdev_agg_trim_histo").unwrap();
        assert_eq!(scrub.desc.fq_name, "zfs_vdev_io_size_aggregated");
        assert!(std::ptr::eq(scrub.desc, trim.desc));
        assert_eq!(scrub.label, "scrub");
        assert_eq!(trim.label, "trim");
        assert!(registry.ext_stat("vdev_slow_ios").is_none());
        assert!(registry.ext_stat("vdev_future_histo").is_none());
    }

    #[test]
    fn test_ext_keys_unique() {
        let keys: HashSet<_> = EXT_STATS.iter().map(|(k, _, _)| *k).collect();
        assert_eq!(keys.len(), EXT_STATS.len());
    }

    #[test]
    fn test_descriptor_names_unique() {
        let registry = Registry::new().unwrap();
        let descs = registry.descs();
        let names: HashSet<_> = descs.iter().map(|d| d.fq_name.as_str()).collect();
        assert_eq!(names.len(), descs.len());
    }

    #[test]
    fn test_custom_tables() {
        static VDEV: &[StatDef] = &[
            StatDef::skip(),
            StatDef::with_variants("x", "x", "kind", &["a", "b", "c"]),
        ];
        let registry = Registry::from_tables(VDEV, &[], &[]).unwrap();
        assert_eq!(registry.vdev_layout().len(), 4);
        assert!(registry.scan_layout().is_empty());
        assert!(registry.ext_stat("vdev_agg_scrub_histo").is_none());
    }
}
