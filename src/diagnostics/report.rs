use super::BenchResult;
use crate::error::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// One measured line of a benchmark report
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkEntry {
    pub section: String,
    pub label: String,
    pub result: BenchResult,
    /// What one iteration stands for, e.g. "per access"
    pub per: String,
}

/// Timestamped collection of benchmark results
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub started_at: DateTime<Local>,
    pub entries: Vec<BenchmarkEntry>,
}

impl Default for BenchmarkReport {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkReport {
    pub fn new() -> Self {
        Self::started_at(Local::now())
    }

    pub fn started_at(started_at: DateTime<Local>) -> Self {
        Self {
            started_at,
            entries: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        section: impl Into<String>,
        label: impl Into<String>,
        result: BenchResult,
        per: impl Into<String>,
    ) {
        let entry = BenchmarkEntry {
            section: section.into(),
            label: label.into(),
            result,
            per: per.into(),
        };
        tracing::info!("{}: {} {}", entry.label, entry.result, entry.per);
        self.entries.push(entry);
    }

    pub fn entries_in<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a BenchmarkEntry> {
        self.entries.iter().filter(move |entry| entry.section == section)
    }

    /// `SingletonBenchmark_<MM-dd_HH-mm>.log`
    pub fn file_name(&self) -> String {
        format!(
            "SingletonBenchmark_{}.log",
            self.started_at.format("%m-%d_%H-%M")
        )
    }

    /// Human-readable log, grouped by section in recording order
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Singleton Performance Tests Start - {} ===",
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        );

        let mut current: Option<&str> = None;
        for entry in &self.entries {
            if current != Some(entry.section.as_str()) {
                let _ = writeln!(out, "\n{}:", entry.section);
                current = Some(entry.section.as_str());
            }
            let _ = writeln!(out, "{}: {} {}", entry.label, entry.result, entry.per);
        }

        out.push_str("=== Singleton Performance Tests End ===\n");
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the rendered log into `dir`, returning the file path
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(self.file_name());
        std::fs::write(&path, self.render()).inspect_err(|e| {
            tracing::error!("Error while saving benchmark results: {}", e);
        })?;
        tracing::info!("Results saved to: {}", path.display());
        Ok(path)
    }
}
