//! Profiler configuration
//!
//! A `ProfilerConfig` fixes where the accumulated datasets and generated
//! report artifacts live, and whether a session finalizes reports
//! automatically on exit. Construct one through the builder:
//!
//! ```no_run
//! use perfil::ProfilerConfig;
//!
//! let config = ProfilerConfig::builder()
//!     .report_dir("./reports")
//!     .auto_report(true)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::{ProfilerError, Result};
use std::path::{Path, PathBuf};

/// Subdirectory of the report dir holding the persisted JSON datasets.
pub const DATA_SUBDIR: &str = "JsonData";
/// Subdirectory of the report dir holding generated report artifacts.
pub const REPORT_SUBDIR: &str = "Reports";

/// Configuration for a profiling engine.
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Root directory for datasets and report artifacts
    pub report_dir: PathBuf,
    /// Generate reports automatically when a session finalizes
    pub auto_report: bool,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from("reports"),
            auto_report: true,
        }
    }
}

impl ProfilerConfig {
    /// Start building a configuration.
    pub fn builder() -> ProfilerConfigBuilder {
        ProfilerConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.report_dir.as_os_str().is_empty() {
            return Err(ProfilerError::InvalidConfiguration(
                "report directory cannot be empty".to_string(),
            ));
        }
        if self.report_dir.is_file() {
            return Err(ProfilerError::InvalidConfiguration(format!(
                "report directory {} is an existing file",
                self.report_dir.display()
            )));
        }
        Ok(())
    }

    /// Directory holding the two persisted JSON datasets.
    pub fn data_dir(&self) -> PathBuf {
        self.report_dir.join(DATA_SUBDIR)
    }

    /// Directory report artifacts are written under.
    pub fn artifact_dir(&self) -> PathBuf {
        self.report_dir.join(REPORT_SUBDIR)
    }

    /// Path of the flat chronological log dataset.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join(crate::store::LOG_FILE)
    }

    /// Path of the per-function time-series dataset.
    pub fn time_series_path(&self) -> PathBuf {
        self.data_dir().join(crate::store::TIME_SERIES_FILE)
    }
}

/// Builder for [`ProfilerConfig`].
#[derive(Debug, Default)]
pub struct ProfilerConfigBuilder {
    report_dir: Option<PathBuf>,
    auto_report: Option<bool>,
}

impl ProfilerConfigBuilder {
    /// Set the root directory for datasets and report artifacts.
    pub fn report_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.report_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Enable or disable automatic report generation on session finalize.
    pub fn auto_report(mut self, enabled: bool) -> Self {
        self.auto_report = Some(enabled);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<ProfilerConfig> {
        let defaults = ProfilerConfig::default();
        let config = ProfilerConfig {
            report_dir: self.report_dir.unwrap_or(defaults.report_dir),
            auto_report: self.auto_report.unwrap_or(defaults.auto_report),
        };
        config.validate()?;
        Ok(config)
    }
}
