//! Report generation and artifact publishing collaborators
//!
//! Both collaborators consume the core's persisted files and never call back
//! into the store: a [`ReportGenerator`] turns the two JSON datasets into
//! artifacts under the report directory, and a [`Publisher`] copies a
//! finished artifact to a destination.
//!
//! The built-in [`TableReporter`] renders text tables — a latest-per-function
//! summary plus one over-time table per function key.

use crate::error::Result;
use crate::metrics::ProfilingEntry;
use crate::store::{FunctionLog, TimeSeriesDataset, LOG_FILE, TIME_SERIES_FILE};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

/// Turns the persisted datasets into report artifacts.
///
/// Implementations read `profiler_log.json` / `profiler_time_series.json`
/// from `data_dir` (read-only) and write whatever they produce under
/// `artifact_dir`.
pub trait ReportGenerator: Send + Sync {
    /// Generate artifacts from the persisted datasets.
    fn generate(&self, data_dir: &Path, artifact_dir: &Path) -> Result<()>;
}

/// Uploads one finished artifact to a destination, overwriting anything
/// already there. Never invoked by the core.
pub trait Publisher {
    /// `true` on success, `false` otherwise (failures are logged).
    fn upload(&self, artifact: &Path, destination: &str) -> bool;
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "function")]
    function: String,
    #[tabled(rename = "location")]
    location: String,
    #[tabled(rename = "calls")]
    calls: usize,
    #[tabled(rename = "last exec (s)")]
    execution_time: f64,
    #[tabled(rename = "last peak mem (MB)")]
    peak_memory_mb: f64,
    #[tabled(rename = "last cpu (%)")]
    cpu_usage: f64,
}

#[derive(Tabled)]
struct SeriesRow {
    #[tabled(rename = "timestamp")]
    timestamp: String,
    #[tabled(rename = "exec (s)")]
    execution_time: f64,
    #[tabled(rename = "peak mem (MB)")]
    peak_memory_mb: f64,
    #[tabled(rename = "current mem (MB)")]
    current_memory_mb: f64,
    #[tabled(rename = "cpu (%)")]
    cpu_usage: f64,
}

/// Built-in report generator rendering text tables.
#[derive(Debug, Default)]
pub struct TableReporter;

impl TableReporter {
    pub fn new() -> Self {
        TableReporter
    }
}

impl ReportGenerator for TableReporter {
    fn generate(&self, data_dir: &Path, artifact_dir: &Path) -> Result<()> {
        let log: FunctionLog = load_dataset(&data_dir.join(LOG_FILE));
        let series: TimeSeriesDataset = load_dataset(&data_dir.join(TIME_SERIES_FILE));

        fs::create_dir_all(artifact_dir)?;

        if log.is_empty() && series.is_empty() {
            info!("no profiling data available, skipping report generation");
            return Ok(());
        }

        write_summary(&log, &series, artifact_dir)?;
        write_over_time(&series, artifact_dir)?;

        info!("reports written to {}", artifact_dir.display());
        Ok(())
    }
}

fn load_dataset<T: DeserializeOwned + Default>(path: &Path) -> T {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            warn!("could not parse {}: {err}; reporting as empty", path.display());
            T::default()
        }),
        Err(_) => T::default(),
    }
}

fn write_summary(log: &FunctionLog, series: &TimeSeriesDataset, artifact_dir: &Path) -> Result<()> {
    // Latest entry per function key; the log is already in completion order.
    let mut latest: BTreeMap<String, &ProfilingEntry> = BTreeMap::new();
    for entry in log {
        latest.insert(entry.function_key(), entry);
    }

    let rows: Vec<SummaryRow> = latest
        .into_iter()
        .map(|(key, entry)| SummaryRow {
            function: entry.function_name.clone(),
            location: entry.source_location.clone(),
            calls: series.get(&key).map_or(1, Vec::len),
            execution_time: entry.execution_time,
            peak_memory_mb: entry.peak_memory_mb,
            cpu_usage: entry.cpu_usage,
        })
        .collect();

    let table = Table::new(rows).with(Style::sharp()).to_string();
    fs::write(artifact_dir.join("summary.txt"), table)?;
    Ok(())
}

fn write_over_time(series: &TimeSeriesDataset, artifact_dir: &Path) -> Result<()> {
    let over_time_dir = artifact_dir.join("over_time");
    fs::create_dir_all(&over_time_dir)?;

    for (key, entries) in series {
        let rows: Vec<SeriesRow> = entries
            .iter()
            .map(|entry| SeriesRow {
                timestamp: entry.timestamp.to_rfc3339(),
                execution_time: entry.execution_time,
                peak_memory_mb: entry.peak_memory_mb,
                current_memory_mb: entry.current_memory_mb,
                cpu_usage: entry.cpu_usage,
            })
            .collect();

        let table = Table::new(rows).with(Style::sharp()).to_string();
        let path = over_time_dir.join(format!("{}.txt", sanitize_filename(key)));
        fs::write(&path, table)?;
        debug!("wrote over-time report for {key}");
    }
    Ok(())
}

/// Keep artifact names filesystem-safe; anything outside `[A-Za-z0-9._-]`
/// becomes `_`.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Publishes artifacts by copying them under a destination root,
/// overwriting any previous object of the same name.
#[derive(Debug)]
pub struct DirectoryPublisher {
    root: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Publisher for DirectoryPublisher {
    fn upload(&self, artifact: &Path, destination: &str) -> bool {
        if !artifact.exists() {
            error!("file not found: {}", artifact.display());
            return false;
        }
        let object_name = if destination.is_empty() {
            artifact
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            destination.to_string()
        };
        if object_name.is_empty() {
            error!("no destination name for {}", artifact.display());
            return false;
        }

        let target = self.root.join(&object_name);
        let target_dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let result = fs::create_dir_all(target_dir).and_then(|_| fs::copy(artifact, &target));
        match result {
            Ok(_) => {
                info!(
                    "uploaded {} to {}",
                    artifact.display(),
                    target.display()
                );
                true
            }
            Err(err) => {
                error!("upload of {} failed: {err}", artifact.display());
                false
            }
        }
    }
}
