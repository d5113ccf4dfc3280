//! One collection pass over every pool.

use std::time::Instant;

use prometheus::proto::MetricFamily;
use tracing::debug;

use crate::config::ExporterConfig;
use crate::emit::{Emitter, FULL_DEPTH, Observation, Value};
use crate::error::ExportError;
use crate::exposition;
use crate::identity::vdev_name;
use crate::model::PoolStats;
use crate::schema::Registry;
use crate::source::PoolSource;

/// Collects metrics for every pool a source knows about.
///
/// Holds no state between passes apart from the immutable registry.
pub struct PoolCollector<S: PoolSource> {
    source: S,
    registry: Registry,
    config: ExporterConfig,
}

impl<S: PoolSource> PoolCollector<S> {
    pub fn new(source: S, config: ExporterConfig) -> Result<Self, ExportError> {
        Ok(Self::with_registry(source, Registry::new()?, config))
    }

    pub fn with_registry(source: S, registry: Registry, config: ExporterConfig) -> Self {
        Self {
            source,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs one pass. Any error aborts the whole pass.
    pub fn collect(&self) -> Result<Vec<Observation<'_>>, ExportError> {
        let mut out = Vec::new();
        for pool in self.source.list_pools()? {
            let started = Instant::now();
            let stats = self.source.pool_stats(&pool)?;
            let before = out.len();
            self.report_pool(&pool, &stats, &mut out)?;
            debug!(
                pool = pool.as_str(),
                metrics = out.len() - before,
                elapsed_us = started.elapsed().as_micros() as u64,
                "collected pool"
            );
        }
        Ok(out)
    }

    /// Runs one pass and groups the result into metric families.
    pub fn gather(&self) -> Result<Vec<MetricFamily>, ExportError> {
        Ok(exposition::families(&self.collect()?))
    }

    /// Runs one pass and renders it in the Prometheus text format.
    pub fn render(&self) -> Result<Vec<u8>, ExportError> {
        exposition::encode_text(&self.gather()?)
    }

    fn report_pool<'r>(
        &'r self,
        pool: &str,
        stats: &PoolStats,
        out: &mut Vec<Observation<'r>>,
    ) -> Result<(), ExportError> {
        let reg = &self.registry;
        let guid = stats.pool_guid.to_string();
        out.push(Observation::new(
            &reg.pool_load_time,
            [pool, guid.as_str()],
            Value::Gauge(stats.load_time() as f64),
        ));
        out.push(Observation::new(
            &reg.pool_errors,
            [pool, guid.as_str()],
            Value::Gauge(stats.error_count as f64),
        ));
        out.push(Observation::new(
            &reg.pool_vdevs,
            [pool, guid.as_str()],
            Value::Gauge(stats.vdev_children as f64),
        ));
        out.push(Observation::new(
            &reg.pool_config_txg,
            [pool],
            Value::Gauge(stats.txg as f64),
        ));

        let emitter = Emitter::new(reg, &self.config, pool);
        let root = &stats.vdev_tree;
        emitter.vdev_stats("root", root, out)?;
        let depth = self.config.depth;
        if depth > 0 {
            for vdev in root.children() {
                let name = vdev_name("", vdev);
                emitter.vdev_stats(&name, vdev, out)?;
                // 2 and above report everything below the top level vdevs.
                if depth > 1 {
                    emitter.descend(&name, vdev, FULL_DEPTH, 1, out)?;
                }
            }
        }

        if let Some(raw) = stats.scan_stats() {
            for (&v, desc) in raw.iter().zip(reg.scan_layout()) {
                if let Some(desc) = desc {
                    out.push(Observation::new(desc, [pool], Value::Gauge(v as f64)));
                }
            }
        }
        Ok(())
    }
}
