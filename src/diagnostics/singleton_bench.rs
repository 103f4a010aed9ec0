//! Latency of singleton construction and access, per policy

use super::{BenchResult, Benchmark, BenchmarkReport};
use crate::error::{ForgeError, Result};
use crate::singleton::{Singleton, SingletonRegistry};
use rayon::prelude::*;
use std::hint::black_box;
use std::time::Instant;

pub const WARMUP_ITERATIONS: u64 = 1_000;
pub const TEST_ITERATIONS: u64 = 1_000_000;

const INITIALIZATION: &str = "Singleton Initialization Tests";
const ACCESS: &str = "Singleton Access Tests (after initialization)";
const CONCURRENT: &str = "Singleton Concurrent Access Tests";

#[derive(Default, crate::Singleton)]
#[singleton(policy = "eager")]
struct EagerProbe;

#[derive(Default, crate::Singleton)]
#[singleton(policy = "locked")]
struct LockedProbe;

#[derive(Default, crate::Singleton)]
#[singleton(policy = "lazy")]
struct LazyProbe;

/// Benchmarks every access policy against a private registry
pub struct SingletonBenchmark {
    warmup_iterations: u64,
    test_iterations: u64,
    threads: usize,
}

impl Default for SingletonBenchmark {
    fn default() -> Self {
        Self {
            warmup_iterations: WARMUP_ITERATIONS,
            test_iterations: TEST_ITERATIONS,
            threads: num_cpus::get(),
        }
    }
}

impl SingletonBenchmark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_iterations(mut self, warmup: u64, test: u64) -> Self {
        self.warmup_iterations = warmup;
        self.test_iterations = test;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn run(&self) -> Result<BenchmarkReport> {
        let mut report = BenchmarkReport::new();
        tracing::info!("=== Singleton Performance Tests Start ===");

        self.initialization::<EagerProbe>(&mut report, "Eager Singleton")?;
        self.initialization::<LockedProbe>(&mut report, "Lock Singleton")?;
        self.initialization::<LazyProbe>(&mut report, "Lazy Singleton")?;

        let registry = SingletonRegistry::new();
        self.access::<EagerProbe>(&registry, &mut report, "Eager Singleton")?;
        self.access::<LockedProbe>(&registry, &mut report, "Lock Singleton")?;
        self.access::<LazyProbe>(&registry, &mut report, "Lazy Singleton")?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| ForgeError::Diagnostics(format!("Failed to build thread pool: {}", e)))?;
        self.concurrent::<EagerProbe>(&pool, &registry, &mut report, "Eager Singleton")?;
        self.concurrent::<LockedProbe>(&pool, &registry, &mut report, "Lock Singleton")?;
        self.concurrent::<LazyProbe>(&pool, &registry, &mut report, "Lazy Singleton")?;

        tracing::info!("=== Singleton Performance Tests End ===");
        Ok(report)
    }

    /// Every iteration builds a new instance into an emptied slot
    fn initialization<T: Singleton>(&self, report: &mut BenchmarkReport, label: &str) -> Result<()> {
        let registry = SingletonRegistry::new();
        registry.instance::<T>()?;

        let result = Benchmark::run_with_setup(
            self.warmup_iterations,
            || {
                registry.reset();
            },
            || {
                let _ = black_box(registry.instance::<T>());
            },
        );
        report.record(INITIALIZATION, label, result, "per initialization");
        Ok(())
    }

    fn access<T: Singleton>(
        &self,
        registry: &SingletonRegistry,
        report: &mut BenchmarkReport,
        label: &str,
    ) -> Result<()> {
        let access = registry.access::<T>()?;
        access.instance()?;

        let result = Benchmark::run(self.test_iterations, || {
            let _ = black_box(access.instance());
        });
        report.record(ACCESS, label, result, "per access");
        Ok(())
    }

    fn concurrent<T: Singleton>(
        &self,
        pool: &rayon::ThreadPool,
        registry: &SingletonRegistry,
        report: &mut BenchmarkReport,
        label: &str,
    ) -> Result<()> {
        let access = registry.access::<T>()?;
        access.instance()?;
        let per_thread = (self.test_iterations / self.threads as u64).max(1);

        let started = Instant::now();
        pool.install(|| {
            (0..self.threads).into_par_iter().for_each(|_| {
                for _ in 0..per_thread {
                    let _ = black_box(access.instance());
                }
            });
        });
        let result = BenchResult::new(started.elapsed(), per_thread * self.threads as u64);

        report.record(
            CONCURRENT,
            format!("{} ({} threads)", label, self.threads),
            result,
            "per access",
        );
        Ok(())
    }
}
