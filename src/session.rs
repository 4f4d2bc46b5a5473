//! Scoped profiling session with exactly-once finalization
//!
//! A [`ProfilerSession`] wraps an engine for the duration of a profiling
//! run. On normal or exceptional exit — or on an explicit
//! [`finalize`](ProfilerSession::finalize) call — it flushes the store and
//! triggers report generation exactly once; any later exit path is a no-op.
//!
//! ```no_run
//! use perfil::{call_id, Profiler, ProfilerSession};
//! use std::sync::Arc;
//!
//! let profiler = Arc::new(Profiler::with_defaults().unwrap());
//! {
//!     let session = ProfilerSession::new(profiler.clone());
//!     session.profiler().profile(call_id!("work"), || ());
//!     // reports generated here, when the session drops
//! }
//! ```

use crate::error::{ProfilerError, Result};
use crate::profiler::Profiler;
use crate::report::{ReportGenerator, TableReporter};
use log::error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Scoped wrapper around a profiling run.
pub struct ProfilerSession {
    profiler: Arc<Profiler>,
    reporter: Option<Box<dyn ReportGenerator>>,
    auto_finalize: bool,
    finalized: AtomicBool,
}

impl ProfilerSession {
    /// Wrap an engine. Auto-finalization on drop follows the engine's
    /// `auto_report` configuration; the default report generator is
    /// [`TableReporter`].
    pub fn new(profiler: Arc<Profiler>) -> Self {
        let auto_finalize = profiler.config().auto_report;
        Self {
            profiler,
            reporter: Some(Box::new(TableReporter::new())),
            auto_finalize,
            finalized: AtomicBool::new(false),
        }
    }

    /// Replace the report generator invoked at finalization.
    pub fn with_reporter(mut self, reporter: Box<dyn ReportGenerator>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Finalize without generating any reports.
    pub fn without_reports(mut self) -> Self {
        self.reporter = None;
        self
    }

    /// The wrapped engine.
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Whether this session has already finalized.
    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }

    /// Flush the store and trigger report generation.
    ///
    /// Only the first call does anything; repeated calls (including the
    /// implicit one on drop) are no-ops, so a report is never produced
    /// twice. Failures surface to the caller; the persisted data is written
    /// before, and independently of, report generation and survives a
    /// reporting failure.
    pub fn finalize(&self) -> Result<()> {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.profiler.persist()?;
        if let Some(reporter) = &self.reporter {
            let config = self.profiler.config();
            reporter
                .generate(&config.data_dir(), &config.artifact_dir())
                .map_err(|err| ProfilerError::Report(err.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for ProfilerSession {
    fn drop(&mut self) {
        if self.auto_finalize && !self.is_finalized() {
            if let Err(err) = self.finalize() {
                error!("session finalization failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_id;
    use crate::config::ProfilerConfig;
    use crate::error::Result as ProfResult;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    struct CountingReporter(Arc<AtomicUsize>);

    impl ReportGenerator for CountingReporter {
        fn generate(&self, _data_dir: &Path, _artifact_dir: &Path) -> ProfResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingReporter;

    impl ReportGenerator for FailingReporter {
        fn generate(&self, _data_dir: &Path, _artifact_dir: &Path) -> ProfResult<()> {
            Err(ProfilerError::Report("renderer exploded".to_string()))
        }
    }

    fn profiler_in(dir: &tempfile::TempDir, auto_report: bool) -> Arc<Profiler> {
        let config = ProfilerConfig::builder()
            .report_dir(dir.path())
            .auto_report(auto_report)
            .build()
            .unwrap();
        Arc::new(Profiler::new(config).unwrap())
    }

    #[test]
    fn test_finalize_runs_reports_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let session = ProfilerSession::new(profiler_in(&dir, true))
            .with_reporter(Box::new(CountingReporter(count.clone())));

        session.finalize().unwrap();
        session.finalize().unwrap();
        drop(session);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_auto_finalizes_once() {
        let dir = tempfile::tempdir().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        {
            let session = ProfilerSession::new(profiler_in(&dir, true))
                .with_reporter(Box::new(CountingReporter(count.clone())));
            session.profiler().profile(call_id!("work"), || ());
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_auto_report_disabled_skips_drop_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        {
            let session = ProfilerSession::new(profiler_in(&dir, false))
                .with_reporter(Box::new(CountingReporter(count.clone())));
            let _ = &session;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_report_failure_surfaces_but_data_survives() {
        let dir = tempfile::tempdir().unwrap();
        let profiler = profiler_in(&dir, false);
        profiler.profile(call_id!("precious"), || ());

        let session =
            ProfilerSession::new(profiler.clone()).with_reporter(Box::new(FailingReporter));
        let err = session.finalize().unwrap_err();
        assert!(err.to_string().contains("report generation failed"));

        // The persisted dataset is intact despite the reporting failure.
        let reopened = profiler_in(&dir, false);
        assert_eq!(reopened.entry_count(), 1);
    }
}
