use std::hint::black_box;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use lithos_perf::*;
use lithos_ring::BlockRing;

const CAPACITY: usize = 1 << 16;
const CHUNK: usize = 1024;
const PIPELINE_BLOCKS: u64 = 50_000;
const WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Results from one producer/consumer run.
#[derive(Debug, Default, serde::Serialize)]
struct PipelineDiag {
    latency: Option<Stats>,
    blocks_written: u64,
    blocks_read: u64,
    lost_chunks: u64,
    stale_wakeups: u64,
    elapsed_ms: u64,
}

fn main() {
    let mut results: Vec<BlockMeasurement> = Vec::new();

    // ═══════════════════════════════════════════════════════════════════════
    // 1. Banner
    // ═══════════════════════════════════════════════════════════════════════
    println!("\n{}", "\u{2550}".repeat(90));
    println!("  LITHOS BLOCK RING PERF REPORT");
    println!("  capacity {CAPACITY}, chunk {CHUNK}, element u64");
    println!("{}", "\u{2550}".repeat(90));

    // ═══════════════════════════════════════════════════════════════════════
    // 2. Single-thread hot path
    // ═══════════════════════════════════════════════════════════════════════
    section("SINGLE-THREAD  put / get  (ns per call)");
    print_stats_header();
    section_single_thread(&mut results);

    // ═══════════════════════════════════════════════════════════════════════
    // 3. Cross-thread, writer paced so nothing is overwritten
    // ═══════════════════════════════════════════════════════════════════════
    section("CROSS-THREAD  paced writer \u{2192} ring \u{2192} waiting reader");
    let paced = run_pipeline(true);
    print_pipeline(&paced);

    // ═══════════════════════════════════════════════════════════════════════
    // 4. Cross-thread, writer flat out
    // ═══════════════════════════════════════════════════════════════════════
    section("CROSS-THREAD  unpaced writer (overwrite on full)");
    let unpaced = run_pipeline(false);
    print_pipeline(&unpaced);

    save_results(&results, &paced, &unpaced);
}

fn section_single_thread(results: &mut Vec<BlockMeasurement>) {
    for &chunk in &[16usize, 256, CHUNK, 16384] {
        let mut ring = BlockRing::<u64>::new(CAPACITY).expect("ring");
        let block = make_block(0, chunk);
        let r = measure_blocks("put (overwrite)", chunk, 200, 100, || {
            ring.put(black_box(&block)).unwrap();
        });
        print_measurement(&r);
        results.push(r);

        let mut ring = BlockRing::<u64>::new(CAPACITY).expect("ring");
        ring.register_threshold(chunk).unwrap();
        let r = measure_blocks("put + get", chunk, 200, 100, || {
            ring.put(black_box(&block)).unwrap();
            black_box(ring.get().unwrap());
        });
        print_measurement(&r);
        results.push(r);
    }
}

/// Producer stamps each block's first element with nanoseconds since `base`;
/// the consumer records put-to-get latency for every block it reads.
fn run_pipeline(paced: bool) -> PipelineDiag {
    let (mut writer, mut reader) = BlockRing::<u64>::new(CAPACITY).expect("ring").split();
    let ready = reader.register_threshold(CHUNK).unwrap();
    let base = Instant::now();
    let start = Arc::new(Barrier::new(2));

    let producer = {
        let start = Arc::clone(&start);
        thread::spawn(move || {
            let mut block = make_block(0, CHUNK);
            start.wait();
            for _ in 0..PIPELINE_BLOCKS {
                while paced && writer.stats().used + CHUNK > CAPACITY {
                    std::hint::spin_loop();
                }
                block[0] = base.elapsed().as_nanos() as u64;
                writer.put(&block).unwrap();
            }
        })
    };

    start.wait();
    let t0 = Instant::now();
    let mut diag = PipelineDiag::default();
    let mut latencies = Vec::with_capacity(PIPELINE_BLOCKS as usize);

    while !producer.is_finished() || ready.is_set() {
        if !ready.wait(WAIT_TIMEOUT) {
            continue;
        }
        match reader.get() {
            Ok(block) => {
                let now = base.elapsed().as_nanos() as u64;
                latencies.push(now.saturating_sub(block[0]));
                diag.blocks_read += 1;
            }
            Err(_) => diag.stale_wakeups += 1,
        }
    }
    producer.join().expect("producer thread panicked");

    diag.elapsed_ms = t0.elapsed().as_millis() as u64;
    diag.blocks_written = PIPELINE_BLOCKS;
    diag.lost_chunks = reader.lost_chunks();
    diag.latency = Stats::from_samples(&mut latencies);
    diag
}

fn print_pipeline(diag: &PipelineDiag) {
    let elapsed_ns = diag.elapsed_ms.max(1) * 1_000_000;
    let rate = elements_per_sec(diag.blocks_read * CHUNK as u64, elapsed_ns);
    if let Some(stats) = &diag.latency {
        print_stats_header();
        print_stats_row("put \u{2192} get latency", CHUNK, stats, Some(rate));
    }
    println!();
    println!("  {:<30} {:>12}", "blocks written", human_count(diag.blocks_written));
    println!("  {:<30} {:>12}", "blocks read", human_count(diag.blocks_read));
    println!("  {:<30} {:>12}", "lost chunks", human_count(diag.lost_chunks));
    println!("  {:<30} {:>12}", "stale wakeups", human_count(diag.stale_wakeups));
    println!("  {:<30} {:>12}", "read elements/s", human_count(rate));
}

fn save_results(results: &[BlockMeasurement], paced: &PipelineDiag, unpaced: &PipelineDiag) {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let results_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/results");
    let _ = std::fs::create_dir_all(results_dir);
    let json_path = format!("{results_dir}/{timestamp}_report.json");

    let output = serde_json::json!({
        "report_type": "block_ring",
        "timestamp": timestamp,
        "capacity": CAPACITY,
        "chunk": CHUNK,
        "single_thread": results,
        "cross_thread": {
            "paced": paced,
            "unpaced": unpaced,
        },
    });

    let bar = "\u{2550}".repeat(90);
    let written = serde_json::to_string_pretty(&output)
        .map_err(std::io::Error::other)
        .and_then(|json| std::fs::write(&json_path, json));
    match written {
        Ok(()) => {
            println!("\n{bar}");
            println!("  Results saved to: {json_path}");
            println!("{bar}\n");
        }
        Err(e) => eprintln!("\n  [failed to save results: {e}]\n"),
    }
}
