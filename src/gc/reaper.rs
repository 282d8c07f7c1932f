//! Claim-and-reap engine
//!
//! Each candidate is first renamed into the collector's own sandbox. Rename
//! is atomic, so only one collector on the node can win a given candidate;
//! once it sits under our sandbox nobody else will touch it and it can be
//! deleted at leisure.

use rand::seq::SliceRandom;
use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::abstractions::NodeFs;
use crate::config::GcConfig;
use crate::error::{GcError, Result};

/// Retry schedule for claiming a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPolicy {
    /// Total rename attempts, including the first
    pub attempts: u32,
    /// Delay after failed attempt `n` is `backoff_base^n` seconds
    pub backoff_base: u64,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self::from_config(&GcConfig::default())
    }
}

impl ClaimPolicy {
    pub fn from_config(config: &GcConfig) -> Self {
        Self {
            attempts: config.claim_attempts,
            backoff_base: config.backoff_base,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.backoff_base.saturating_pow(attempt))
    }
}

/// What a reap pass accomplished
#[derive(Debug, Default)]
pub struct ReapOutcome {
    pub removed: usize,
    /// Sum of the time spent deleting claimed directories
    pub removal_walltime: Duration,
    /// The error that stopped the pass early, if any
    pub fatal: Option<GcError>,
}

impl ReapOutcome {
    pub fn average_removal_walltime(&self) -> Duration {
        match u32::try_from(self.removed) {
            Ok(0) => Duration::ZERO,
            Ok(removed) => self.removal_walltime / removed,
            Err(_) => Duration::from_secs_f64(
                self.removal_walltime.as_secs_f64() / self.removed as f64,
            ),
        }
    }
}

pub struct Reaper {
    fs: Arc<dyn NodeFs>,
    policy: ClaimPolicy,
}

impl Reaper {
    pub fn new(fs: Arc<dyn NodeFs>, policy: ClaimPolicy) -> Self {
        Self { fs, policy }
    }

    /// Claim and delete every candidate under `root`, in random order.
    ///
    /// Claimed directories are moved into `claim_dir` before deletion. The
    /// first fatal error stops the pass; directories already removed stay
    /// counted in the outcome.
    pub async fn reap<R: Rng + ?Sized>(
        &self,
        root: &Path,
        claim_dir: &Path,
        mut candidates: Vec<String>,
        rng: &mut R,
    ) -> ReapOutcome {
        candidates.shuffle(rng);

        let mut outcome = ReapOutcome::default();
        for name in candidates {
            let claimed = match self.claim(root, claim_dir, &name).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    error!(candidate = %name, error = %e, "Stopping collection");
                    outcome.fatal = Some(e);
                    break;
                }
            };

            let started = Instant::now();
            if let Err(source) = self.fs.remove_all(&claimed).await {
                error!(path = %claimed.display(), error = %source, "Unable to remove directory");
                outcome.fatal = Some(GcError::RemoveFailed {
                    path: claimed,
                    source,
                });
                break;
            }
            let elapsed = started.elapsed();

            info!(candidate = %name, ?elapsed, "Removed stale sandbox");
            outcome.removed += 1;
            outcome.removal_walltime += elapsed;
        }

        outcome
    }

    /// Rename `root/name` to `claim_dir/name`, backing off on failures other
    /// than the source having vanished.
    async fn claim(&self, root: &Path, claim_dir: &Path, name: &str) -> Result<PathBuf> {
        let source = root.join(name);
        let target = claim_dir.join(name);

        let mut attempt = 1;
        loop {
            match self.fs.rename(&source, &target).await {
                Ok(()) => {
                    debug!(from = %source.display(), to = %target.display(), attempt, "Claimed");
                    return Ok(target);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(candidate = name, "Candidate vanished, a peer collector claimed it");
                    return Err(GcError::ClaimLost {
                        name: name.to_string(),
                        source: e,
                    });
                }
                Err(e) if attempt >= self.policy.attempts => {
                    return Err(GcError::ClaimExhausted {
                        name: name.to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        candidate = name,
                        error = %e,
                        "Unable to move directory, retrying in {:?} (attempt {}/{})",
                        delay,
                        attempt,
                        self.policy.attempts
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
