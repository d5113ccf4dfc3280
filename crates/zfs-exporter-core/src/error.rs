//! Error types for pool statistics retrieval and metric export.

use std::io;
use std::path::PathBuf;

/// Failure to obtain pool statistics from a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The pool listing could not be read.
    #[error("failed to list pools in {}: {source}", path.display())]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A pool record could not be read.
    #[error("failed to read stats for pool {pool}: {source}")]
    Read {
        pool: String,
        #[source]
        source: io::Error,
    },
    /// A pool record does not have the expected shape.
    #[error("failed to decode stats for pool {pool}: {source}")]
    Decode {
        pool: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of a collection pass. Every variant is fatal to the pass.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A metric descriptor was rejected at registry construction.
    #[error("invalid metric descriptor: {0}")]
    Descriptor(#[from] prometheus::Error),

    /// An extended stat holds something other than a counter or a histogram.
    #[error("invalid type encountered in extended stat {key}: {shape}")]
    UnexpectedExtStat { key: String, shape: &'static str },

    /// The text exposition could not be written.
    #[error("failed to encode metrics: {0}")]
    Encode(#[source] prometheus::Error),
}
