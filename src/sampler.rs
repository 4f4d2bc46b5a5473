//! Metric sampling around a single call
//!
//! [`MetricSampler`] brackets exactly one invocation: it opens the
//! process-wide tracing window, baselines a CPU reading, runs the call,
//! then reads elapsed time, traced memory and CPU utilization.
//!
//! CPU convention: the reported figure is the OS-reported utilization of
//! this process over the bracketed interval itself — a baseline refresh when
//! the bracket opens and a second refresh at completion — not an
//! instantaneous post-call snapshot. Calls shorter than the OS accounting
//! granularity may therefore read 0.0. The figure may exceed 100 on
//! multi-core hosts.

use crate::tracer::TraceSession;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Raw readings from one bracketed call, before rounding.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Bytes still allocated when the call completed
    pub current_bytes: u64,
    /// Peak traced allocation during the call
    pub peak_bytes: u64,
    /// Process CPU utilization over the bracket, percent
    pub cpu_usage: f64,
    /// Wall-clock duration, suspension included
    pub duration: Duration,
    /// UTC instant the bracket closed
    pub completed_at: DateTime<Utc>,
}

/// Brackets calls with resource sampling.
#[derive(Debug)]
pub struct MetricSampler {
    pid: Pid,
}

impl MetricSampler {
    /// Sampler for the current process.
    pub fn new() -> Self {
        Self {
            pid: Pid::from_u32(std::process::id()),
        }
    }

    /// Bracket a blocking call.
    ///
    /// The call's output is returned untouched; panics unwind through the
    /// bracket and the tracing window is released on the way out.
    pub fn sample<T>(&self, call: impl FnOnce() -> T) -> (T, Sample) {
        let bracket = self.begin();
        let value = call();
        (value, bracket.finish())
    }

    /// Bracket a call that may suspend.
    ///
    /// The bracket spans from before the first poll to logical completion,
    /// so wall-clock time includes any time spent suspended and the CPU
    /// figure covers the whole span.
    pub async fn sample_async<F: Future>(&self, call: F) -> (F::Output, Sample) {
        let bracket = self.begin();
        let value = call.await;
        (value, bracket.finish())
    }

    fn begin(&self) -> SampleBracket {
        let session = TraceSession::start();
        // Fresh System per bracket: concurrent brackets must not share CPU
        // accounting intervals.
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
        SampleBracket {
            session,
            system,
            pid: self.pid,
            started: Instant::now(),
        }
    }
}

impl Default for MetricSampler {
    fn default() -> Self {
        Self::new()
    }
}

struct SampleBracket {
    session: TraceSession,
    system: System,
    pid: Pid,
    started: Instant,
}

impl SampleBracket {
    fn finish(mut self) -> Sample {
        let duration = self.started.elapsed();
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
        let cpu_usage = self
            .system
            .process(self.pid)
            .map(|process| f64::from(process.cpu_usage()))
            .unwrap_or(0.0);
        let (current_bytes, peak_bytes) = self.session.traced_memory();

        Sample {
            current_bytes,
            peak_bytes,
            cpu_usage,
            duration,
            completed_at: Utc::now(),
        }
        // Dropping self closes the tracing window.
    }
}
