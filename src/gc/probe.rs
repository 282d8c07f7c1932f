//! Disk and environment probe

use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::abstractions::NodeFs;

const GIB: u64 = 1024 * 1024 * 1024;

/// Placeholder reported when the filesystem type cannot be determined
pub const UNKNOWN_DISK_TYPE: &str = "n/a";

/// Disk figures for the filesystem holding the sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskReport {
    /// Whole GiB available to unprivileged users, rounded down
    pub free_gb: u64,
    /// Whole GiB of the filesystem, rounded down
    pub total_gb: u64,
    pub disk_type: String,
}

impl Default for DiskReport {
    fn default() -> Self {
        Self {
            free_gb: 0,
            total_gb: 0,
            disk_type: UNKNOWN_DISK_TYPE.to_string(),
        }
    }
}

pub struct DiskProbe {
    fs: Arc<dyn NodeFs>,
}

impl DiskProbe {
    pub fn new(fs: Arc<dyn NodeFs>) -> Self {
        Self { fs }
    }

    /// Sample `path`. Failures fall back to zeros and "n/a".
    pub async fn sample(&self, path: &Path) -> DiskReport {
        let mut report = DiskReport::default();

        match self.fs.disk_space(path).await {
            Ok(space) => {
                report.free_gb = space.available_bytes / GIB;
                report.total_gb = space.total_bytes / GIB;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Unable to stat sandbox filesystem"),
        }

        match self.fs.filesystem_type(path).await {
            Ok(disk_type) => report.disk_type = disk_type,
            Err(e) => warn!(path = %path.display(), error = %e, "Unable to determine filesystem type"),
        }

        report
    }
}
