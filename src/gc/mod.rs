//! Garbage collection of stale sandbox directories
//!
//! A run scans the siblings of the invoking sandbox, claims and deletes the
//! stale ones, then samples the disk. Only setup problems are returned as
//! errors; anything that goes wrong mid-run ends up in
//! [`RunStatistics::fatal_error`].

pub mod probe;
pub mod reaper;
pub mod scanner;
pub mod stats;

pub use probe::{DiskProbe, DiskReport};
pub use reaper::{ClaimPolicy, ReapOutcome, Reaper};
pub use scanner::{CandidateScanner, ScanOutcome};
pub use stats::RunStatistics;

use rand::Rng;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::abstractions::NodeFs;
use crate::config::GcConfig;
use crate::error::{GcError, Result};

pub struct GarbageCollector {
    scanner: CandidateScanner,
    reaper: Reaper,
    probe: DiskProbe,
}

impl GarbageCollector {
    pub fn new(fs: Arc<dyn NodeFs>, config: &GcConfig) -> Result<Self> {
        Ok(Self {
            scanner: CandidateScanner::new(fs.clone(), config)?,
            reaper: Reaper::new(fs.clone(), ClaimPolicy::from_config(config)),
            probe: DiskProbe::new(fs),
        })
    }

    /// Collect garbage next to `sandbox_dir`, which must be an absolute path
    /// to the invoking sandbox. Siblings are judged against `now` and
    /// processed in an order drawn from `rng`; the reported walltime runs
    /// from `started`.
    pub async fn run<R: Rng + ?Sized>(
        &self,
        sandbox_dir: &Path,
        started: Instant,
        now: SystemTime,
        rng: &mut R,
    ) -> Result<RunStatistics> {
        let (root, own_name) = match (sandbox_dir.parent(), sandbox_dir.file_name()) {
            (Some(root), Some(name)) => (root, name),
            _ => {
                return Err(GcError::Config(format!(
                    "sandbox directory {} has no parent to scan",
                    sandbox_dir.display()
                )))
            }
        };
        debug!(root = %root.display(), sandbox = ?own_name, "Scanning for stale sandboxes");

        let scan = self.scanner.scan(root, own_name, now).await;
        info!(
            candidates = scan.candidates.len(),
            walltime = ?scan.walltime,
            "Scan complete"
        );

        let reap = self
            .reaper
            .reap(root, sandbox_dir, scan.candidates.clone(), rng)
            .await;
        let disk = self.probe.sample(sandbox_dir).await;

        Ok(RunStatistics::collect(&scan, &reap, disk, started.elapsed()))
    }
}
