//! Decoding of power-of-two bucketed extended stats.
//!
//! Bucket `i` counts values up to `2^i`. The kernel exports only the bucket
//! counts, never the true sum, so the sum here is an estimate built from
//! bucket midpoints the same way `zpool iostat` computes it.

/// Length of the latency histograms, which count nanoseconds.
pub const LATENCY_BUCKETS: usize = 37;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Decoded histogram ready for exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `(upper bound, cumulative count)` in ascending bound order.
    pub buckets: Vec<(f64, u64)>,
    pub count: u64,
    /// Midpoint estimate, not an exact sum.
    pub sum: f64,
}

/// Decodes raw bucket counts into cumulative buckets, a total and an estimated sum.
///
/// Latency histograms (37 buckets) are scaled from nanoseconds to seconds;
/// any other length (sizes, queue depths) keeps raw units.
pub fn decode(raw: &[u64]) -> Histogram {
    let divisor = if raw.len() == LATENCY_BUCKETS {
        NANOS_PER_SEC
    } else {
        1.0
    };

    let mut buckets = Vec::with_capacity(raw.len());
    let mut count: u64 = 0;
    let mut acc = 0.0;
    for (i, &v) in raw.iter().enumerate() {
        let bound = 2f64.powi(i as i32);
        count = count.saturating_add(v);
        buckets.push((bound / divisor, count));
        // midpoint is 2^i + 2^(i-1)
        acc += v as f64 * (bound * 1.5);
    }

    Histogram {
        buckets,
        count,
        sum: acc / divisor,
    }
}
