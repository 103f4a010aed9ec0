//! Diagnostics
//!
//! A small in-process timing harness and the singleton access report built
//! on it, for producing the `SingletonBenchmark_*.log` file from a running
//! build. Statistically sound measurements live in `benches/` and run
//! under criterion (`cargo bench`).

mod benchmark;
mod report;
mod singleton_bench;

pub use benchmark::{BenchResult, Benchmark, HUNDRED_MILLION, ONE_MILLION, TEN_MILLION};
pub use report::{BenchmarkEntry, BenchmarkReport};
pub use singleton_bench::{SingletonBenchmark, TEST_ITERATIONS, WARMUP_ITERATIONS};
