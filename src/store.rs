//! Durable storage for the accumulated profiling datasets
//!
//! The store owns the two complementary views of history — the flat
//! chronological log and the per-function time series — loads prior state at
//! startup and writes both back after every append (write-through).
//!
//! Each file is replaced atomically: the document is serialized to a sibling
//! temp file, synced, then renamed over the final path, so a crash mid-write
//! never leaves a half-written file for the next load. The two files are
//! written independently; a crash between the writes leaves one of them one
//! entry behind until the next append.

use crate::error::Result;
use crate::metrics::ProfilingEntry;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the flat chronological log.
pub const LOG_FILE: &str = "profiler_log.json";
/// File name of the per-function time series.
pub const TIME_SERIES_FILE: &str = "profiler_time_series.json";

/// Flat chronological log of every entry ever recorded.
pub type FunctionLog = Vec<ProfilingEntry>;

/// Per-function time series, keyed by
/// [`function_key`](ProfilingEntry::function_key). Entry order within a key
/// is call completion order.
pub type TimeSeriesDataset = BTreeMap<String, Vec<ProfilingEntry>>;

/// Owns and persists the accumulated datasets.
#[derive(Debug)]
pub struct DataStore {
    log_path: PathBuf,
    series_path: PathBuf,
    log: FunctionLog,
    series: TimeSeriesDataset,
}

impl DataStore {
    /// Open the store under `data_dir`, loading any previously persisted
    /// state.
    ///
    /// A missing file yields empty state; a file that exists but does not
    /// parse is discarded for that dataset only, with a warning — corruption
    /// never aborts startup and never takes the other, valid file with it.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let log_path = data_dir.join(LOG_FILE);
        let series_path = data_dir.join(TIME_SERIES_FILE);

        let log = load_or_empty(&log_path);
        let series = load_or_empty(&series_path);

        Ok(Self {
            log_path,
            series_path,
            log,
            series,
        })
    }

    /// Append one entry to both views, then persist.
    ///
    /// The time-series key is created on first observation of a function and
    /// never deleted. Both views are updated before any write, so a reader
    /// of this store never sees the log ahead of the series.
    pub fn append(&mut self, entry: ProfilingEntry) -> Result<()> {
        let key = entry.function_key();
        self.log.push(entry.clone());
        self.series.entry(key).or_default().push(entry);
        self.persist()
    }

    /// Write both datasets to their durable locations.
    pub fn persist(&self) -> Result<()> {
        write_atomic(&self.log_path, &self.log)?;
        write_atomic(&self.series_path, &self.series)?;
        Ok(())
    }

    /// The flat chronological log.
    pub fn log(&self) -> &FunctionLog {
        &self.log
    }

    /// The per-function time series.
    pub fn series(&self) -> &TimeSeriesDataset {
        &self.series
    }

    /// Path of the persisted log file.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Path of the persisted time-series file.
    pub fn series_path(&self) -> &Path {
        &self.series_path
    }
}

fn load_or_empty<T: DeserializeOwned + Default>(path: &Path) -> T {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(err) => {
            warn!("could not read {}: {err}; starting empty", path.display());
            return T::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                "could not parse {}: {err}; discarding and starting empty",
                path.display()
            );
            T::default()
        }
    }
}

/// Serialize `value` with 4-space indentation and atomically replace `path`
/// with it.
fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = parent.join(format!(".{}.tmp.{}", file_name, std::process::id()));

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;

    let result = (|| -> Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ProfilingEntry;
    use crate::system_info::SystemInfo;
    use chrono::Utc;

    fn entry(name: &str, location: &str) -> ProfilingEntry {
        ProfilingEntry {
            function_name: name.to_string(),
            source_location: location.to_string(),
            current_memory_mb: 0.5,
            peak_memory_mb: 1.0,
            cpu_usage: 10.0,
            execution_time: 0.1,
            timestamp: Utc::now(),
            system_info: SystemInfo::collect(),
        }
    }

    #[test]
    fn test_open_on_empty_dir_yields_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        assert!(store.log().is_empty());
        assert!(store.series().is_empty());
    }

    #[test]
    fn test_append_updates_both_views_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DataStore::open(dir.path()).unwrap();

        store.append(entry("alpha", "mod_a")).unwrap();
        store.append(entry("beta", "mod_b")).unwrap();
        store.append(entry("alpha", "mod_a")).unwrap();

        assert_eq!(store.log().len(), 3);
        assert_eq!(store.series().len(), 2);
        assert_eq!(store.series()["mod_a:alpha"].len(), 2);

        assert!(dir.path().join(LOG_FILE).exists());
        assert!(dir.path().join(TIME_SERIES_FILE).exists());
    }

    #[test]
    fn test_accumulation_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = DataStore::open(dir.path()).unwrap();
            store.append(entry("alpha", "mod_a")).unwrap();
            store.append(entry("alpha", "mod_a")).unwrap();
        }
        let mut store = DataStore::open(dir.path()).unwrap();
        assert_eq!(store.log().len(), 2);
        store.append(entry("alpha", "mod_a")).unwrap();
        assert_eq!(store.log().len(), 3);

        let reloaded = DataStore::open(dir.path()).unwrap();
        assert_eq!(reloaded.log().len(), 3);
        assert_eq!(reloaded.series()["mod_a:alpha"].len(), 3);
    }

    #[test]
    fn test_round_trip_preserves_keys_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DataStore::open(dir.path()).unwrap();
        store.append(entry("first", "m")).unwrap();
        store.append(entry("second", "m")).unwrap();
        store.append(entry("first", "m")).unwrap();

        let reloaded = DataStore::open(dir.path()).unwrap();
        assert_eq!(
            reloaded.series().keys().collect::<Vec<_>>(),
            store.series().keys().collect::<Vec<_>>()
        );
        let timestamps: Vec<_> = store.series()["m:first"]
            .iter()
            .map(|e| e.timestamp)
            .collect();
        let reloaded_timestamps: Vec<_> = reloaded.series()["m:first"]
            .iter()
            .map(|e| e.timestamp)
            .collect();
        assert_eq!(timestamps, reloaded_timestamps);
    }

    #[test]
    fn test_corrupt_log_does_not_poison_series() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = DataStore::open(dir.path()).unwrap();
            store.append(entry("alpha", "mod_a")).unwrap();
        }
        fs::write(dir.path().join(LOG_FILE), b"{not json").unwrap();

        let store = DataStore::open(dir.path()).unwrap();
        assert!(store.log().is_empty());
        assert_eq!(store.series()["mod_a:alpha"].len(), 1);
    }

    #[test]
    fn test_persist_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DataStore::open(dir.path()).unwrap();
        store.append(entry("alpha", "mod_a")).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
    }

    #[test]
    fn test_files_use_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DataStore::open(dir.path()).unwrap();
        store.append(entry("alpha", "mod_a")).unwrap();

        let text = fs::read_to_string(dir.path().join(LOG_FILE)).unwrap();
        assert!(text.contains("\n    \"function\"") || text.contains("\n    {"));
    }
}
