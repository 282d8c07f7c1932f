//! Publishing run statistics as glidein attributes
//!
//! Two files are appended to: the glidein config receives `<Key> <value>`
//! lines, and the condor vars file receives one schema line per key telling
//! the startd how to type and publish it.

use std::fmt;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::gc::stats::{format_secs, RunStatistics};

/// Type code of a published attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Integer,
    /// Unquoted expression; used for fractional values
    Expression,
}

impl AttributeType {
    fn code(self) -> char {
        match self {
            AttributeType::String => 'S',
            AttributeType::Integer => 'I',
            AttributeType::Expression => 'C',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: &'static str,
    pub kind: AttributeType,
    pub value: String,
}

impl Attribute {
    fn new(key: &'static str, kind: AttributeType, value: impl fmt::Display) -> Self {
        Self {
            key,
            kind,
            value: value.to_string(),
        }
    }

    /// Line for the glidein config
    pub fn config_line(&self) -> String {
        format!("{} {}\n", self.key, self.value)
    }

    /// Line for the condor vars file: type, no default, publish to the
    /// startd, not a job env var, export to the job ad, no user override
    pub fn schema_line(&self) -> String {
        format!("{}  {}  -  +  N  Y  -\n", self.key, self.kind.code())
    }
}

/// Attributes for one run, in publishing order
pub fn attributes(stats: &RunStatistics) -> Vec<Attribute> {
    let mut attrs = Vec::with_capacity(9);
    if let Some(error) = &stats.fatal_error {
        attrs.push(Attribute::new("GCFatalError", AttributeType::String, error));
    }
    attrs.extend([
        Attribute::new(
            "GCCandidatesCount",
            AttributeType::Integer,
            stats.candidates_count,
        ),
        Attribute::new(
            "GCCandidatesWalltime",
            AttributeType::Expression,
            format_secs(stats.candidates_walltime),
        ),
        Attribute::new("GCRemovedCount", AttributeType::Integer, stats.removed_count),
        Attribute::new(
            "GCRemovedAvgWalltime",
            AttributeType::Expression,
            format_secs(stats.removed_avg_walltime),
        ),
        Attribute::new("GCFreeGB", AttributeType::Integer, stats.free_gb),
        Attribute::new("GCTotalGB", AttributeType::Integer, stats.total_gb),
        Attribute::new("GCDiskType", AttributeType::String, &stats.disk_type),
        Attribute::new(
            "GCWalltime",
            AttributeType::Expression,
            format_secs(stats.walltime),
        ),
    ]);
    attrs
}

/// Append the run's attributes to both files.
///
/// The glidein config must already exist; the condor vars file is created
/// when missing. Nothing is written to either file if the glidein config
/// cannot be opened.
pub async fn publish_attributes(
    glidein_config: &Path,
    condor_vars: &Path,
    stats: &RunStatistics,
) -> Result<()> {
    let mut config_file = OpenOptions::new().append(true).open(glidein_config).await?;
    let mut vars_file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(condor_vars)
        .await?;

    let attrs = attributes(stats);
    let config_lines: String = attrs.iter().map(Attribute::config_line).collect();
    let schema_lines: String = attrs.iter().map(Attribute::schema_line).collect();

    config_file.write_all(config_lines.as_bytes()).await?;
    config_file.flush().await?;
    vars_file.write_all(schema_lines.as_bytes()).await?;
    vars_file.flush().await?;

    tracing::debug!(
        glidein_config = %glidein_config.display(),
        condor_vars = %condor_vars.display(),
        count = attrs.len(),
        "Published collection attributes"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GcError;
    use std::time::Duration;
    use tempfile::TempDir;

    fn stats(fatal_error: Option<&str>) -> RunStatistics {
        RunStatistics {
            fatal_error: fatal_error.map(|e| e.to_string()),
            candidates_count: 4,
            candidates_walltime: Duration::from_millis(2500),
            removed_count: 3,
            removed_avg_walltime: Duration::from_millis(12_400),
            free_gb: 812,
            total_gb: 1024,
            disk_type: "xfs".to_string(),
            walltime: Duration::from_secs(41),
        }
    }

    #[test]
    fn test_attribute_order_without_error() {
        let keys: Vec<&str> = attributes(&stats(None)).iter().map(|a| a.key).collect();
        assert_eq!(
            keys,
            vec![
                "GCCandidatesCount",
                "GCCandidatesWalltime",
                "GCRemovedCount",
                "GCRemovedAvgWalltime",
                "GCFreeGB",
                "GCTotalGB",
                "GCDiskType",
                "GCWalltime",
            ]
        );
    }

    #[test]
    fn test_fatal_error_comes_first() {
        let attrs = attributes(&stats(Some("unable to remove directory /x: busy")));
        assert_eq!(attrs.len(), 9);
        assert_eq!(
            attrs[0].config_line(),
            "GCFatalError unable to remove directory /x: busy\n"
        );
        assert_eq!(attrs[0].schema_line(), "GCFatalError  S  -  +  N  Y  -\n");
    }

    #[tokio::test]
    async fn test_publish_appends_to_both_files() {
        let temp_dir = TempDir::new().unwrap();
        let glidein_config = temp_dir.path().join("glidein_config");
        let condor_vars = temp_dir.path().join("condor_vars.lst");
        tokio::fs::write(&glidein_config, "GLIDEIN_Site Example\n")
            .await
            .unwrap();

        publish_attributes(&glidein_config, &condor_vars, &stats(None))
            .await
            .unwrap();

        let config = tokio::fs::read_to_string(&glidein_config).await.unwrap();
        assert_eq!(
            config,
            "GLIDEIN_Site Example\n\
             GCCandidatesCount 4\n\
             GCCandidatesWalltime 2\n\
             GCRemovedCount 3\n\
             GCRemovedAvgWalltime 12\n\
             GCFreeGB 812\n\
             GCTotalGB 1024\n\
             GCDiskType xfs\n\
             GCWalltime 41\n"
        );

        let vars = tokio::fs::read_to_string(&condor_vars).await.unwrap();
        assert_eq!(
            vars,
            "GCCandidatesCount  I  -  +  N  Y  -\n\
             GCCandidatesWalltime  C  -  +  N  Y  -\n\
             GCRemovedCount  I  -  +  N  Y  -\n\
             GCRemovedAvgWalltime  C  -  +  N  Y  -\n\
             GCFreeGB  I  -  +  N  Y  -\n\
             GCTotalGB  I  -  +  N  Y  -\n\
             GCDiskType  S  -  +  N  Y  -\n\
             GCWalltime  C  -  +  N  Y  -\n"
        );
    }

    #[tokio::test]
    async fn test_missing_glidein_config_is_not_created() {
        let temp_dir = TempDir::new().unwrap();
        let glidein_config = temp_dir.path().join("glidein_config");
        let condor_vars = temp_dir.path().join("condor_vars.lst");

        let result = publish_attributes(&glidein_config, &condor_vars, &stats(None)).await;

        assert!(matches!(result, Err(GcError::Io(_))));
        assert!(!glidein_config.exists());
        assert!(!condor_vars.exists());
    }
}
