//! Producer and consumer loops for the demo driver.

use lithos_config::RingPumpConfig;
use lithos_ring::{RingError, RingReader, RingWriter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Counters shared between the two loops and `main`.
#[derive(Debug, Default)]
pub struct PumpCounters {
    pub written: AtomicU64,
    pub read: AtomicU64,
    pub shutdown: AtomicBool,
}

impl PumpCounters {
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn stopped(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// Writes sequence-numbered blocks of `write_chunk` elements until shutdown.
pub fn run_producer(
    mut writer: RingWriter<u64>,
    write_chunk: usize,
    counters: Arc<PumpCounters>,
) -> Result<(), RingError> {
    let mut block = vec![0u64; write_chunk];
    let mut next = 0u64;

    while !counters.stopped() {
        for slot in block.iter_mut() {
            *slot = next;
            next = next.wrapping_add(1);
        }
        writer.put(&block)?;
        counters.written.fetch_add(write_chunk as u64, Ordering::Relaxed);
        std::hint::spin_loop();
    }

    debug!(lost_chunks = writer.lost_chunks(), "producer stopped");
    Ok(())
}

/// Waits for the ready signal, reads a block, and reports once per interval.
pub fn run_consumer(
    mut reader: RingReader<u64>,
    config: &RingPumpConfig,
    counters: Arc<PumpCounters>,
) -> Result<(), RingError> {
    let ready = reader.register_threshold(config.threshold)?;
    let wait_timeout = Duration::from_millis(config.wait_timeout_ms);
    let report_interval = Duration::from_millis(config.report_interval_ms);

    let mut last_report = Instant::now();
    let mut last_written = 0u64;
    let mut last_read = 0u64;

    while !counters.stopped() {
        if ready.wait(wait_timeout) {
            match reader.get() {
                Ok(block) => {
                    counters.read.fetch_add(block.len() as u64, Ordering::Relaxed);
                }
                // An overwriting put can pull occupancy below the threshold
                // between the wakeup and the read.
                Err(err) => debug!(%err, "ready signal went stale"),
            }
        }

        if last_report.elapsed() >= report_interval {
            let written = counters.written.load(Ordering::Relaxed);
            let read = counters.read.load(Ordering::Relaxed);
            let lost_chunks = reader.lost_chunks();
            let secs = last_report.elapsed().as_secs_f64();
            info!(
                written,
                read,
                lost_chunks,
                approx_lost = lost_chunks * config.write_chunk as u64,
                write_rate = ((written - last_written) as f64 / secs) as u64,
                read_rate = ((read - last_read) as f64 / secs) as u64,
                used = reader.len(),
                "ringpump"
            );
            last_written = written;
            last_read = read;
            last_report = Instant::now();
        }
    }

    debug!("consumer stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lithos_ring::BlockRing;
    use std::thread;

    #[test]
    fn short_run_moves_data_both_ways() {
        let config = RingPumpConfig {
            capacity: 1024,
            threshold: 64,
            write_chunk: 32,
            wait_timeout_ms: 5,
            report_interval_ms: 10,
            ..RingPumpConfig::default()
        };
        let (writer, reader) = BlockRing::<u64>::new(config.capacity).unwrap().split();
        let counters = Arc::new(PumpCounters::default());

        let producer = {
            let counters = Arc::clone(&counters);
            let chunk = config.write_chunk;
            thread::spawn(move || run_producer(writer, chunk, counters))
        };
        let consumer = {
            let counters = Arc::clone(&counters);
            let config = config.clone();
            thread::spawn(move || run_consumer(reader, &config, counters))
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while counters.read.load(Ordering::Relaxed) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        counters.stop();
        producer.join().unwrap().unwrap();
        consumer.join().unwrap().unwrap();

        let written = counters.written.load(Ordering::Relaxed);
        let read = counters.read.load(Ordering::Relaxed);
        assert!(written > 0);
        assert!(read > 0, "consumer never completed a get");
        assert_eq!(written % 32, 0);
        assert_eq!(read % 64, 0);
    }
}
