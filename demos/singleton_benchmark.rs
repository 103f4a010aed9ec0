//! Runs the singleton access benchmark and saves the log next to the
//! working directory.
//!
//! ```text
//! cargo run --release --example singleton_benchmark
//! ```

use forgecore::diagnostics::SingletonBenchmark;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let report = SingletonBenchmark::new().run()?;
    let path = report.write_to(std::env::current_dir()?)?;

    println!("{}", report.render());
    println!("Results saved to: {}", path.display());
    Ok(())
}
