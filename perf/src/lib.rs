//! Measurement helpers shared by the `perf_report` binary and the criterion
//! benches. Every measured operation moves a whole block, so results carry the
//! block length alongside the per-call timing.

use std::time::Instant;

const RULE_WIDTH: usize = 96;

// ─── Distribution ───────────────────────────────────────────────────────────

/// Summary of a set of nanosecond samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct Stats {
    pub count: usize,
    pub min: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
    pub mean: f64,
}

impl Stats {
    /// Sorts `samples` in place and summarises them. `None` when empty.
    pub fn from_samples(samples: &mut [u64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable();
        let total: u128 = samples.iter().map(|&s| s as u128).sum();
        Some(Self {
            count: samples.len(),
            min: samples[0],
            p50: quantile(samples, 0.50),
            p90: quantile(samples, 0.90),
            p99: quantile(samples, 0.99),
            p999: quantile(samples, 0.999),
            max: samples[samples.len() - 1],
            mean: total as f64 / samples.len() as f64,
        })
    }
}

/// Nearest sample to position `q * (len - 1)` of a sorted, non-empty slice.
fn quantile(sorted: &[u64], q: f64) -> u64 {
    let last = sorted.len() - 1;
    let idx = (last as f64 * q).round() as usize;
    sorted[idx.min(last)]
}

// ─── Block Measurements ─────────────────────────────────────────────────────

/// Per-call timing of an operation that moves `elements_per_op` elements.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BlockMeasurement {
    pub name: String,
    pub elements_per_op: usize,
    pub ns_per_op: Stats,
    /// Median throughput, derived from `ns_per_op.p50`.
    pub elements_per_sec: u64,
}

impl BlockMeasurement {
    pub fn new(name: impl Into<String>, elements_per_op: usize, ns_per_op: Stats) -> Self {
        let elements_per_sec = elements_per_sec(elements_per_op as u64, ns_per_op.p50);
        Self {
            name: name.into(),
            elements_per_op,
            ns_per_op,
            elements_per_sec,
        }
    }
}

/// Elements per second for `elements` moved in `nanos`. Zero-length spans
/// count as one nanosecond.
pub fn elements_per_sec(elements: u64, nanos: u64) -> u64 {
    (elements as u128 * 1_000_000_000 / nanos.max(1) as u128) as u64
}

/// Times `op` in `batches` batches of `batch_size` calls after one untimed
/// warm-up batch, recording the mean ns per call of each batch.
pub fn measure_blocks<F: FnMut()>(
    name: &str,
    elements_per_op: usize,
    batches: usize,
    batch_size: usize,
    mut op: F,
) -> BlockMeasurement {
    let batch_size = batch_size.max(1);
    for _ in 0..batch_size {
        op();
    }

    let mut samples = Vec::with_capacity(batches.max(1));
    for _ in 0..batches.max(1) {
        let start = Instant::now();
        for _ in 0..batch_size {
            op();
        }
        let per_op = start.elapsed().as_nanos() / batch_size as u128;
        samples.push((per_op as u64).max(1));
    }

    let ns_per_op = Stats::from_samples(&mut samples).unwrap_or_default();
    BlockMeasurement::new(name, elements_per_op, ns_per_op)
}

/// A block of `len` sequence numbers starting at `start`.
pub fn make_block(start: u64, len: usize) -> Vec<u64> {
    (start..start + len as u64).collect()
}

// ─── Table Output ───────────────────────────────────────────────────────────

pub fn human_count(n: u64) -> String {
    match n {
        1_000_000_000.. => format!("{:.2}G", n as f64 / 1e9),
        1_000_000.. => format!("{:.2}M", n as f64 / 1e6),
        1_000.. => format!("{:.1}K", n as f64 / 1e3),
        _ => n.to_string(),
    }
}

pub fn section(title: &str) {
    println!("\n{}", "─".repeat(RULE_WIDTH));
    println!("  {title}");
    println!("{}\n", "─".repeat(RULE_WIDTH));
}

pub fn print_stats_header() {
    println!(
        "  {:<28} {:>6} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10}",
        "operation", "elems", "min", "p50", "p99", "p99.9", "max", "elems/s",
    );
    println!("  {}", "─".repeat(RULE_WIDTH - 2));
}

/// One table row. `elements` is the block length behind each sample and
/// `rate` the throughput column, when the row has one. All times in ns.
pub fn print_stats_row(label: &str, elements: usize, stats: &Stats, rate: Option<u64>) {
    let rate = rate.map_or_else(|| "-".to_string(), human_count);
    println!(
        "  {:<28} {:>6} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10}",
        label, elements, stats.min, stats.p50, stats.p99, stats.p999, stats.max, rate,
    );
}

pub fn print_measurement(m: &BlockMeasurement) {
    print_stats_row(&m.name, m.elements_per_op, &m.ns_per_op, Some(m.elements_per_sec));
}
