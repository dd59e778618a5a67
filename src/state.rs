//! Last-run report, persisted as JSON in the state directory

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::{Platform, RunStatus, RunSummary, SummaryCounts};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const REPORT_FILE: &str = "last_run.json";

/// What one `apply` did
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub finished_at: DateTime<Utc>,
    pub manifest: String,
    pub root: PathBuf,
    pub platform: &'a Platform,
    pub status: RunStatus,
    pub counts: SummaryCounts,
    pub summary: &'a RunSummary,
}

impl<'a> RunReport<'a> {
    pub fn new(manifest: &str, root: &Path, platform: &'a Platform, summary: &'a RunSummary) -> Self {
        Self {
            finished_at: Utc::now(),
            manifest: manifest.to_string(),
            root: root.to_path_buf(),
            platform,
            status: summary.status(),
            counts: summary.counts(),
            summary,
        }
    }

    /// Write the report to the state directory
    pub fn save(&self) -> Result<PathBuf> {
        self.save_to(&crate::paths::state_dir()?)
    }

    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

        let path = dir.join(REPORT_FILE);
        let content = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write run report: {}", path.display()))?;

        log::debug!("Saved run report to {}", path.display());
        Ok(path)
    }
}
