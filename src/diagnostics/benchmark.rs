use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

pub const ONE_MILLION: u64 = 1_000_000;
pub const TEN_MILLION: u64 = 10_000_000;
pub const HUNDRED_MILLION: u64 = 100_000_000;

const UNITS: [&str; 4] = ["s", "ms", "µs", "ns"];

/// Total time spent over a number of iterations
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchResult {
    elapsed: Duration,
    iterations: u64,
}

impl BenchResult {
    pub fn new(elapsed: Duration, iterations: u64) -> Self {
        Self {
            elapsed,
            iterations: iterations.max(1),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Average seconds per iteration
    pub fn seconds_per_iteration(&self) -> f64 {
        self.elapsed.as_secs_f64() / self.iterations as f64
    }

    /// How many times slower this result is than `other`
    pub fn compare_to(&self, other: &BenchResult) -> f64 {
        self.seconds_per_iteration() / other.seconds_per_iteration()
    }
}

impl fmt::Display for BenchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.seconds_per_iteration();
        let mut order = 0;
        while value < 1.0 && order < UNITS.len() - 1 {
            value *= 1000.0;
            order += 1;
        }
        write!(f, "{:.3}{}", value, UNITS[order])
    }
}

/// Measures the average time an action takes
///
/// # Example
///
/// ```rust,ignore
/// use forgecore::diagnostics::{Benchmark, ONE_MILLION};
///
/// let result = Benchmark::run(ONE_MILLION, || {
///     std::hint::black_box(registry.instance::<AudioService>());
/// });
/// tracing::info!("instance() takes {}", result);
/// ```
pub struct Benchmark;

impl Benchmark {
    pub fn run<F: FnMut()>(iterations: u64, mut action: F) -> BenchResult {
        let started = Instant::now();
        for _ in 0..iterations {
            action();
        }
        BenchResult::new(started.elapsed(), iterations)
    }

    /// Like [`run`](Self::run), with an unmeasured `setup` before every iteration
    pub fn run_with_setup<S, F>(iterations: u64, mut setup: S, mut action: F) -> BenchResult
    where
        S: FnMut(),
        F: FnMut(),
    {
        let mut elapsed = Duration::ZERO;
        for _ in 0..iterations {
            setup();
            let started = Instant::now();
            action();
            elapsed += started.elapsed();
        }
        BenchResult::new(elapsed, iterations)
    }
}
