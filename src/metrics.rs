//! Profiling entry data types
//!
//! One [`ProfilingEntry`] is one measurement of one call. The JSON field
//! names (`function`, `file`) are the wire format consumed by report
//! tooling, so they are pinned with serde renames.

use crate::system_info::SystemInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel used when the caller supplies no source location.
pub const UNKNOWN_LOCATION: &str = "<unknown>";

/// Identifier of an instrumented callable.
///
/// Names are supplied by the caller rather than recovered from stack
/// introspection; the [`call_id!`](crate::call_id) macro binds the defining
/// module path statically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallId {
    /// Function name recorded in entries
    pub name: String,
    /// Defining module/file, or [`UNKNOWN_LOCATION`]
    pub location: String,
}

impl CallId {
    /// Identifier with an unknown source location.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: UNKNOWN_LOCATION.to_string(),
        }
    }

    /// Identifier with an explicit source location.
    pub fn at(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

impl From<&str> for CallId {
    fn from(name: &str) -> Self {
        CallId::new(name)
    }
}

impl From<String> for CallId {
    fn from(name: String) -> Self {
        CallId::new(name)
    }
}

/// Build a [`CallId`] whose location is the calling module's path.
#[macro_export]
macro_rules! call_id {
    ($name:expr) => {
        $crate::CallId::at($name, module_path!())
    };
}

/// One measurement of one function invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilingEntry {
    /// Name of the instrumented callable
    #[serde(rename = "function")]
    pub function_name: String,
    /// Module/file the callable was defined in, best effort
    #[serde(rename = "file")]
    pub source_location: String,
    /// Bytes still allocated at call completion, in MB
    pub current_memory_mb: f64,
    /// Peak traced allocation during the call, in MB
    pub peak_memory_mb: f64,
    /// Process CPU utilization over the call, percent (may exceed 100 on
    /// multi-core hosts)
    pub cpu_usage: f64,
    /// Wall-clock duration in seconds, including suspended time
    pub execution_time: f64,
    /// UTC instant the entry was created (call completion)
    pub timestamp: DateTime<Utc>,
    /// Host snapshot taken at engine construction
    pub system_info: SystemInfo,
}

impl ProfilingEntry {
    /// Composite key grouping entries of the same callable:
    /// `"{source_location}:{function_name}"`.
    pub fn function_key(&self) -> String {
        format!("{}:{}", self.source_location, self.function_name)
    }
}

/// Round to three decimal places, the precision every persisted numeric
/// metric carries.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Clamp a reading into a finite, non-negative value before it enters an
/// entry. JSON cannot carry NaN/infinity and persisted metrics must be
/// non-negative.
pub(crate) fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Convert traced bytes to megabytes.
pub(crate) fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
