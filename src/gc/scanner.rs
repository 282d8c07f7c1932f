//! Candidate scanner
//!
//! Looks at the siblings of the invoking sandbox and decides, from top-level
//! metadata only, which of them are abandoned. A sandbox with a lease marker
//! is judged by the marker's mtime; one without is judged by its own mtime
//! against a much longer threshold.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::abstractions::NodeFs;
use crate::config::GcConfig;
use crate::error::Result;

/// Result of one scan of the sandbox root
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutcome {
    /// Names of sibling directories judged stale
    pub candidates: Vec<String>,
    /// Wall-clock time spent scanning
    pub walltime: Duration,
}

/// Why a sandbox was classified as garbage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Staleness {
    LeaseExpired(Duration),
    NeverLeased(Duration),
}

pub struct CandidateScanner {
    fs: Arc<dyn NodeFs>,
    matcher: glob::Pattern,
    lease_file: String,
    lease_max_age: Duration,
    unleased_max_age: Duration,
}

impl CandidateScanner {
    pub fn new(fs: Arc<dyn NodeFs>, config: &GcConfig) -> Result<Self> {
        Ok(Self {
            fs,
            matcher: config.sandbox_matcher()?,
            lease_file: config.lease_file.clone(),
            lease_max_age: config.lease_max_age,
            unleased_max_age: config.unleased_max_age,
        })
    }

    /// Find stale sandboxes under `root`, never returning `exclude`.
    ///
    /// Ages are measured against `now`. Failures on individual entries are
    /// logged and the entry is skipped; the scan itself never fails.
    pub async fn scan(&self, root: &Path, exclude: &OsStr, now: SystemTime) -> ScanOutcome {
        let started = Instant::now();
        let uid = self.fs.current_uid();

        let entries = match self.fs.list_dir(root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Error listing sandbox root");
                return ScanOutcome {
                    candidates: Vec::new(),
                    walltime: started.elapsed(),
                };
            }
        };

        let mut candidates = Vec::new();
        for entry in entries {
            if !entry.is_dir || entry.name.as_os_str() == exclude {
                continue;
            }

            let Some(name) = entry.name.to_str() else {
                debug!(name = ?entry.name, "Skipping non-UTF8 entry");
                continue;
            };
            if !self.matcher.matches(name) {
                continue;
            }

            if let Some(reason) = self.classify(&root.join(name), uid, now).await {
                debug!(name, ?reason, "Sandbox is a removal candidate");
                candidates.push(name.to_string());
            }
        }

        ScanOutcome {
            candidates,
            walltime: started.elapsed(),
        }
    }

    async fn classify(&self, dir: &Path, uid: u32, now: SystemTime) -> Option<Staleness> {
        let dir_stat = match self.fs.stat(dir).await {
            Ok(stat) => stat,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Error stating sandbox");
                return None;
            }
        };

        if dir_stat.owner_id != uid {
            debug!(path = %dir.display(), owner = dir_stat.owner_id, "Not our sandbox");
            return None;
        }

        let lease_path = dir.join(&self.lease_file);
        match self.fs.stat(&lease_path).await {
            Ok(lease) => {
                let age = age_at(now, lease.modified);
                (age > self.lease_max_age).then_some(Staleness::LeaseExpired(age))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let age = age_at(now, dir_stat.modified);
                (age > self.unleased_max_age).then_some(Staleness::NeverLeased(age))
            }
            Err(e) => {
                warn!(path = %lease_path.display(), error = %e, "Error stating lease file");
                None
            }
        }
    }
}

/// Age of a timestamp; timestamps in the future count as brand new.
fn age_at(now: SystemTime, then: SystemTime) -> Duration {
    now.duration_since(then).unwrap_or(Duration::ZERO)
}
