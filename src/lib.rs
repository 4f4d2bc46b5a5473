//! perfil — function-level resource profiler with a durable history
//!
//! Wrap a callable (blocking or suspendable) and every invocation is
//! bracketed with resource sampling — wall-clock time, traced heap
//! allocation, CPU utilization — and appended to two durable views of the
//! accumulated history: a flat chronological log and a per-function time
//! series. Both are persisted after every call with atomic file replacement,
//! so repeated process runs accumulate instead of overwriting and a crash
//! never leaves a half-written dataset.
//!
//! Memory figures come from a counting allocator. Install it once in the
//! binary being profiled (without it, traced memory reads zero):
//!
//! ```rust,ignore
//! #[global_allocator]
//! static ALLOC: perfil::TrackingAllocator = perfil::TrackingAllocator::new();
//! ```
//!
//! Then instrument calls through a [`Profiler`]:
//!
//! ```rust,ignore
//! use perfil::{call_id, Profiler, ProfilerSession};
//! use std::sync::Arc;
//!
//! let profiler = Arc::new(Profiler::with_defaults()?);
//! let session = ProfilerSession::new(profiler.clone());
//!
//! let total: i64 = profiler.profile(call_id!("sum_range"), || {
//!     (0..1_000_000i64).sum()
//! });
//!
//! session.finalize()?; // flush + generate reports, exactly once
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod profiler;
pub mod report;
pub mod sampler;
pub mod session;
pub mod store;
pub mod system_info;
pub mod tracer;

pub use config::{ProfilerConfig, ProfilerConfigBuilder};
pub use error::{ProfilerError, Result};
pub use metrics::{CallId, ProfilingEntry};
pub use profiler::Profiler;
pub use report::{DirectoryPublisher, Publisher, ReportGenerator, TableReporter};
pub use sampler::{MetricSampler, Sample};
pub use session::ProfilerSession;
pub use store::{DataStore, FunctionLog, TimeSeriesDataset};
pub use system_info::SystemInfo;
pub use tracer::{TraceSession, TrackingAllocator};

// The unit-test binary profiles itself, so it installs the tracking
// allocator the same way a consumer binary would.
#[cfg(test)]
#[global_allocator]
static TEST_ALLOC: TrackingAllocator = TrackingAllocator::new();
