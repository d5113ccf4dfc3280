//! zfs-exporter - Prometheus exporter for ZFS pool, vdev and disk statistics.
//!
//! Metrics may be reported for just pools, for pools and top level vdevs,
//! or for pools, vdevs and disks. Each scrape re-reads every pool's stats.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::io::Write;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use zfs_exporter_core::exposition;
use zfs_exporter_core::source::{DumpSource, RealFs};
use zfs_exporter_core::{ExporterConfig, PoolCollector};

type Collector = PoolCollector<DumpSource<RealFs>>;

/// Prometheus exporter for ZFS statistics.
#[derive(Parser, Debug)]
#[command(
    name = "zfs-exporter",
    about = "Prometheus exporter for ZFS statistics",
    version = zfs_exporter_core::VERSION
)]
struct Args {
    /// Address the ZFS exporter should listen on.
    #[arg(long, default_value = "0.0.0.0:9700", env = "ZFS_EXPORTER_LISTEN")]
    listen_addr: SocketAddr,

    /// Depth of the vdev tree to report on. 0 is the pool, 1 is top level
    /// vdevs, 2 is devices and any nested vdevs too.
    #[arg(long, default_value = "1", env = "ZFS_EXPORTER_DEPTH")]
    depth: u32,

    /// Report the full path of disks.
    #[arg(long, env = "ZFS_EXPORTER_FULLPATH")]
    fullpath: bool,

    /// Directory holding one `<pool>.json` stats dump per pool.
    #[arg(long, default_value = "/run/zfs-exporter", env = "ZFS_EXPORTER_SOURCE_DIR")]
    source_dir: String,

    /// Collect once, print the metrics to stdout and exit.
    #[arg(long)]
    once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn exporter_config(&self) -> ExporterConfig {
        ExporterConfig::new(self.depth, self.fullpath)
    }
}

/// Initializes the tracing subscriber. Default level is INFO; -q shows errors only.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["zfs_exporter", "zfs_exporter_core"] {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let config = args.exporter_config();
    let source = DumpSource::new(RealFs::new(), &args.source_dir);
    let collector = match PoolCollector::new(source, config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to build metric descriptors");
            process::exit(1);
        }
    };

    if args.once {
        match collector.render() {
            Ok(body) => {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = stdout.write_all(&body).and_then(|()| stdout.flush()) {
                    error!(error = %e, "failed to write metrics");
                    process::exit(1);
                }
            }
            Err(e) => {
                error!(error = %e, "collection failed");
                process::exit(1);
            }
        }
        return;
    }

    info!(
        version = zfs_exporter_core::VERSION,
        listen = %args.listen_addr,
        depth = config.depth,
        fullpath = config.full_path,
        source_dir = %args.source_dir,
        descriptors = collector.registry().descs().len(),
        "zfs-exporter starting"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };
    runtime.block_on(serve(args.listen_addr, Arc::new(collector)));
}

fn router(collector: Arc<Collector>) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .with_state(collector)
        .layer(CompressionLayer::new())
}

async fn serve(addr: SocketAddr, collector: Arc<Collector>) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, error = %e, "failed to listen");
            process::exit(1);
        }
    };
    info!(%addr, "listening");

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
        }
    };
    if let Err(e) = axum::serve(listener, router(collector))
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(error = %e, "server error");
        process::exit(1);
    }
    info!("shutdown complete");
}

async fn handle_health() -> &'static str {
    "ok"
}

/// Runs one collection pass per scrape. A failed pass terminates the
/// process rather than serving partial metrics.
async fn handle_metrics(State(collector): State<Arc<Collector>>) -> Response {
    let result = tokio::task::spawn_blocking(move || collector.render()).await;
    match result {
        Ok(Ok(body)) => {
            ([(header::CONTENT_TYPE, exposition::content_type())], body).into_response()
        }
        Ok(Err(e)) => {
            error!(error = %e, "collection failed, exiting");
            process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "collection task failed, exiting");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::try_parse_from(["zfs-exporter"]).unwrap();
        assert_eq!(args.listen_addr, "0.0.0.0:9700".parse::<SocketAddr>().unwrap());
        assert_eq!(args.exporter_config(), ExporterConfig::new(1, false));
        assert_eq!(args.source_dir, "/run/zfs-exporter");
        assert!(!args.once);
    }

    #[test]
    fn test_depth_and_fullpath() {
        let args = Args::try_parse_from([
            "zfs-exporter",
            "--depth",
            "3",
            "--fullpath",
            "--listen-addr",
            "127.0.0.1:9100",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.exporter_config(), ExporterConfig::new(3, true));
        assert_eq!(args.listen_addr.port(), 9100);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_invalid_listen_addr() {
        assert!(Args::try_parse_from(["zfs-exporter", "--listen-addr", "nope"]).is_err());
    }
}
