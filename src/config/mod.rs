//! Collector configuration
//!
//! Every knob has a default matching the glidein layout, so a config file is
//! only needed to override thresholds or naming on unusual sites.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path};
use std::time::Duration;

use crate::error::{GcError, Result};

pub mod loader;

pub use loader::load_config;

/// Thresholds and naming used by the scanner and the reaper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Glob matched against sibling directory names
    pub sandbox_pattern: String,

    /// Name of the lease marker file inside a sandbox
    pub lease_file: String,

    /// A lease not renewed for longer than this marks the sandbox abandoned
    #[serde(with = "humantime_serde")]
    pub lease_max_age: Duration,

    /// Age after which a sandbox that never took a lease is garbage
    #[serde(with = "humantime_serde")]
    pub unleased_max_age: Duration,

    /// Total rename attempts per candidate
    pub claim_attempts: u32,

    /// Backoff after failed attempt `n` is `backoff_base^n` seconds
    pub backoff_base: u64,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            sandbox_pattern: default_sandbox_pattern(),
            lease_file: default_lease_file(),
            lease_max_age: Duration::from_secs(60 * 60),
            unleased_max_age: Duration::from_secs(10 * 24 * 60 * 60),
            claim_attempts: 3,
            backoff_base: 10,
        }
    }
}

impl GcConfig {
    /// Compiled form of `sandbox_pattern`
    pub fn sandbox_matcher(&self) -> Result<glob::Pattern> {
        glob::Pattern::new(&self.sandbox_pattern).map_err(|e| {
            GcError::Config(format!(
                "invalid sandbox_pattern '{}': {}",
                self.sandbox_pattern, e
            ))
        })
    }

    /// Reject settings the collector cannot run with
    pub fn validate(&self) -> Result<()> {
        self.sandbox_matcher()?;

        let mut components = Path::new(&self.lease_file).components();
        let single_name = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_name {
            return Err(GcError::Config(format!(
                "lease_file must be a plain file name, got '{}'",
                self.lease_file
            )));
        }

        if self.claim_attempts == 0 {
            return Err(GcError::Config(
                "claim_attempts must be at least 1".to_string(),
            ));
        }

        if self.backoff_base == 0 {
            return Err(GcError::Config("backoff_base must be at least 1".to_string()));
        }

        Ok(())
    }
}

fn default_sandbox_pattern() -> String {
    "glide_*".to_string()
}

fn default_lease_file() -> String {
    "_GLIDE_LEASE_FILE".to_string()
}
