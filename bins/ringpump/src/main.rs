mod pump;

use anyhow::{Context, anyhow};
use lithos_config::RingPumpConfig;
use lithos_ring::BlockRing;
use pump::{PumpCounters, run_consumer, run_producer};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => RingPumpConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => RingPumpConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        capacity = config.capacity,
        threshold = config.threshold,
        write_chunk = config.write_chunk,
        "RINGPUMP: starting producer and consumer"
    );

    let (writer, reader) = BlockRing::<u64>::new(config.capacity)?.split();
    let counters = Arc::new(PumpCounters::default());

    let producer = {
        let counters = Arc::clone(&counters);
        let chunk = config.write_chunk;
        thread::Builder::new()
            .name("ringpump-producer".into())
            .spawn(move || run_producer(writer, chunk, counters))?
    };
    let consumer = {
        let counters = Arc::clone(&counters);
        let config = config.clone();
        thread::Builder::new()
            .name("ringpump-consumer".into())
            .spawn(move || run_consumer(reader, &config, counters))?
    };

    let start = Instant::now();
    match config.run_secs {
        Some(secs) => thread::sleep(Duration::from_secs(secs)),
        None => loop {
            thread::park();
        },
    }
    counters.stop();

    producer.join().map_err(|_| anyhow!("producer thread panicked"))??;
    consumer.join().map_err(|_| anyhow!("consumer thread panicked"))??;

    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        written = counters.written.load(Ordering::Relaxed),
        read = counters.read.load(Ordering::Relaxed),
        "RINGPUMP: done"
    );
    Ok(())
}
