//! The profiling engine
//!
//! A [`Profiler`] loads the accumulated history at construction, takes one
//! host snapshot, and exposes transparent wrappers that bracket a call with
//! resource sampling and append the resulting entry to the store.
//!
//! ```no_run
//! use perfil::{call_id, Profiler, ProfilerConfig};
//!
//! let profiler = Profiler::new(ProfilerConfig::default()).unwrap();
//! let total: u64 = profiler.profile(call_id!("sum_range"), || (0..1000u64).sum());
//! assert_eq!(total, 499_500);
//! ```

use crate::config::ProfilerConfig;
use crate::error::Result;
use crate::metrics::{bytes_to_mb, round3, sanitize, CallId, ProfilingEntry};
use crate::sampler::{MetricSampler, Sample};
use crate::store::{DataStore, FunctionLog, TimeSeriesDataset};
use crate::system_info::SystemInfo;
use log::error;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

/// Instrumentation-and-persistence engine.
pub struct Profiler {
    config: ProfilerConfig,
    system_info: SystemInfo,
    sampler: MetricSampler,
    store: Mutex<DataStore>,
}

impl Profiler {
    /// Create an engine, loading any previously persisted history from the
    /// configured report directory.
    pub fn new(config: ProfilerConfig) -> Result<Self> {
        config.validate()?;
        let store = DataStore::open(&config.data_dir())?;
        Ok(Self {
            config,
            system_info: SystemInfo::collect(),
            sampler: MetricSampler::new(),
            store: Mutex::new(store),
        })
    }

    /// Engine with the default configuration (`./reports`).
    pub fn with_defaults() -> Result<Self> {
        Self::new(ProfilerConfig::default())
    }

    /// Instrument a blocking call and record one entry.
    ///
    /// The call's return value comes back untouched. A persistence failure
    /// is logged and does not displace the value; use
    /// [`append`](Self::append)/[`persist`](Self::persist) directly when the
    /// error must be observed.
    pub fn profile<T>(&self, id: impl Into<CallId>, call: impl FnOnce() -> T) -> T {
        let (value, sample) = self.sampler.sample(call);
        self.record(id.into(), sample);
        value
    }

    /// Instrument a fallible blocking call.
    ///
    /// Records an entry only when the call succeeds; an `Err` is returned
    /// unchanged with no entry appended — a failed call's resource profile
    /// is not meaningful for trend analysis.
    pub fn try_profile<T, E>(
        &self,
        id: impl Into<CallId>,
        call: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let (value, sample) = self.sampler.sample(call);
        if value.is_ok() {
            self.record(id.into(), sample);
        }
        value
    }

    /// Instrument a call that may suspend.
    ///
    /// The bracket spans suspension: wall-clock time includes time spent
    /// waiting, and the CPU figure covers the whole span.
    pub async fn profile_async<F: Future>(&self, id: impl Into<CallId>, call: F) -> F::Output {
        let (value, sample) = self.sampler.sample_async(call).await;
        self.record(id.into(), sample);
        value
    }

    /// Instrument a fallible call that may suspend; no entry on `Err`.
    pub async fn try_profile_async<T, E, F>(
        &self,
        id: impl Into<CallId>,
        call: F,
    ) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
    {
        let (value, sample) = self.sampler.sample_async(call).await;
        if value.is_ok() {
            self.record(id.into(), sample);
        }
        value
    }

    /// Append an already-built entry to both views and persist.
    pub fn append(&self, entry: ProfilingEntry) -> Result<()> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(entry)
    }

    /// Write both datasets to durable storage.
    pub fn persist(&self) -> Result<()> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .persist()
    }

    /// Snapshot of the flat chronological log.
    pub fn function_log(&self) -> FunctionLog {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .log()
            .clone()
    }

    /// Snapshot of the per-function time series.
    pub fn time_series(&self) -> TimeSeriesDataset {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .series()
            .clone()
    }

    /// Number of entries recorded across all runs.
    pub fn entry_count(&self) -> usize {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .log()
            .len()
    }

    /// Host snapshot attached to entries from this engine.
    pub fn system_info(&self) -> &SystemInfo {
        &self.system_info
    }

    /// The engine's configuration.
    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    fn record(&self, id: CallId, sample: Sample) {
        let entry = self.build_entry(id, sample);
        if let Err(err) = self.append(entry) {
            error!("failed to persist profiling entry: {err}");
        }
    }

    fn build_entry(&self, id: CallId, sample: Sample) -> ProfilingEntry {
        ProfilingEntry {
            function_name: id.name,
            source_location: id.location,
            current_memory_mb: round3(sanitize(bytes_to_mb(sample.current_bytes))),
            peak_memory_mb: round3(sanitize(bytes_to_mb(sample.peak_bytes))),
            cpu_usage: round3(sanitize(sample.cpu_usage)),
            execution_time: round3(sanitize(sample.duration.as_secs_f64())),
            timestamp: sample.completed_at,
            system_info: self.system_info.clone(),
        }
    }
}
