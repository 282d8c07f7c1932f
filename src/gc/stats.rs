//! Run statistics handed to the reporters

use std::time::Duration;

use super::probe::DiskReport;
use super::reaper::ReapOutcome;
use super::scanner::ScanOutcome;

/// Everything one collection run measured
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    /// Display form of the error that stopped the run early
    pub fatal_error: Option<String>,
    pub candidates_count: usize,
    pub candidates_walltime: Duration,
    pub removed_count: usize,
    pub removed_avg_walltime: Duration,
    pub free_gb: u64,
    pub total_gb: u64,
    pub disk_type: String,
    /// Whole run, from start-up to just before reporting
    pub walltime: Duration,
}

impl RunStatistics {
    pub fn collect(
        scan: &ScanOutcome,
        reap: &ReapOutcome,
        disk: DiskReport,
        walltime: Duration,
    ) -> Self {
        Self {
            fatal_error: reap.fatal.as_ref().map(|e| e.to_string()),
            candidates_count: scan.candidates.len(),
            candidates_walltime: scan.walltime,
            removed_count: reap.removed,
            removed_avg_walltime: reap.average_removal_walltime(),
            free_gb: disk.free_gb,
            total_gb: disk.total_gb,
            disk_type: disk.disk_type,
            walltime,
        }
    }
}

/// Whole seconds, rounded to nearest, as the reports print them
pub fn format_secs(duration: Duration) -> String {
    format!("{:.0}", duration.as_secs_f64())
}
