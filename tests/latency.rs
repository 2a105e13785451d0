mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use xian_compositor::engine::display::NullDisplayReport;
use xian_compositor::{
    CompositorConfig, CompositorRuntime, OutputId, Platform, QueueConfig, SurfaceParams,
};

const POOL: usize = 3;
const SUBMISSIONS: usize = 100;
const ERROR_MARGIN: f64 = 0.4;

fn runtime() -> Arc<CompositorRuntime> {
    let config = CompositorConfig {
        target_fps: 0,
        queue: QueueConfig::fixed(POOL),
        ..CompositorConfig::default()
    };
    Arc::new(
        CompositorRuntime::new(config, Platform::headless(), Arc::new(NullDisplayReport)).unwrap(),
    )
}

/// Runs a producer that swaps as fast as it can against a consumer ticking every `vblank`.
fn measure(vblank: Duration) -> Vec<u64> {
    let runtime = runtime();
    let surface = runtime
        .create_surface(SurfaceParams::new(dpi::PhysicalSize::new(8, 8)))
        .unwrap();
    runtime.attach_surface(surface, OutputId(1)).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let producer = {
        let runtime = runtime.clone();
        let done = done.clone();
        thread::spawn(move || {
            for _ in 0..SUBMISSIONS {
                runtime.swap_buffers(surface).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let mut latencies = Vec::new();
    let deadline = std::time::Instant::now() + common::TIMEOUT * 4;
    while !done.load(Ordering::SeqCst) {
        assert!(std::time::Instant::now() < deadline, "producer never finished");
        let outcome = runtime.tick().unwrap();
        latencies.extend(outcome.posted.iter().map(|posted| posted.latency));
        thread::sleep(vblank);
    }
    producer.join().unwrap();
    latencies
}

#[test]
fn average_latency_stays_within_the_pool_bound() {
    let latencies = measure(Duration::from_millis(4));
    assert!(!latencies.is_empty());

    let average = latencies.iter().sum::<u64>() as f64 / latencies.len() as f64;
    let low = (POOL - 2) as f64 - ERROR_MARGIN;
    let high = (POOL - 1) as f64 + ERROR_MARGIN;
    assert!(
        (low..=high).contains(&average),
        "average latency {average} outside [{low}, {high}]"
    );
}

#[test]
fn latency_never_exceeds_the_pool_size() {
    let latencies = measure(Duration::from_millis(2));
    let max = latencies.iter().copied().max().unwrap_or(0);
    assert!(max <= POOL as u64, "max latency {max} exceeds {POOL}");
}
