//! Common test utilities and helpers

#![allow(dead_code)]

use anyhow::Result;
use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub const HOUR: u64 = 60 * 60;
pub const DAY: u64 = 24 * HOUR;
pub const LEASE_FILE: &str = "_GLIDE_LEASE_FILE";

/// A sibling sandbox to lay out on the fake node
struct SandboxSpec {
    name: String,
    dir_age: Duration,
    lease_age: Option<Duration>,
}

/// Builder for a node directory holding the invoking sandbox and its siblings
pub struct NodeBuilder {
    temp_dir: TempDir,
    own_sandbox: String,
    sandboxes: Vec<SandboxSpec>,
    glidein_config: Option<String>,
}

impl NodeBuilder {
    /// Create a new builder; the invoking sandbox is `glide_me`
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            own_sandbox: "glide_me".to_string(),
            sandboxes: Vec::new(),
            glidein_config: Some("GLIDEIN_Site Test\n".to_string()),
        })
    }

    /// Add a sandbox without a lease marker, last touched `dir_age_secs` ago
    pub fn with_unleased(mut self, name: &str, dir_age_secs: u64) -> Self {
        self.sandboxes.push(SandboxSpec {
            name: name.to_string(),
            dir_age: Duration::from_secs(dir_age_secs),
            lease_age: None,
        });
        self
    }

    /// Add a sandbox whose lease marker was renewed `lease_age_secs` ago
    pub fn with_leased(mut self, name: &str, dir_age_secs: u64, lease_age_secs: u64) -> Self {
        self.sandboxes.push(SandboxSpec {
            name: name.to_string(),
            dir_age: Duration::from_secs(dir_age_secs),
            lease_age: Some(Duration::from_secs(lease_age_secs)),
        });
        self
    }

    /// Do not create the glidein config file
    pub fn without_glidein_config(mut self) -> Self {
        self.glidein_config = None;
        self
    }

    /// Lay out the node
    pub fn build(self) -> Result<TestNode> {
        let root = self.temp_dir.path().join("node");
        fs::create_dir(&root)?;

        let sandbox_dir = root.join(&self.own_sandbox);
        fs::create_dir(&sandbox_dir)?;

        let now = SystemTime::now();
        for spec in &self.sandboxes {
            let dir = root.join(&spec.name);
            fs::create_dir(&dir)?;
            fs::write(dir.join("payload.bin"), vec![0u8; 4096])?;
            fs::create_dir(dir.join("execute"))?;
            fs::write(dir.join("execute").join("job.out"), "output")?;

            if let Some(lease_age) = spec.lease_age {
                let lease = dir.join(LEASE_FILE);
                fs::write(&lease, "")?;
                set_mtime(&lease, now - lease_age)?;
            }
            // Last, since creating children bumps the directory mtime
            set_mtime(&dir, now - spec.dir_age)?;
        }

        let config_dir = self.temp_dir.path().join("config");
        fs::create_dir(&config_dir)?;
        let glidein_config = config_dir.join("glidein_config");
        if let Some(content) = &self.glidein_config {
            fs::write(&glidein_config, content)?;
        }

        Ok(TestNode {
            temp_dir: self.temp_dir,
            root,
            sandbox_dir,
            glidein_config,
            condor_vars: config_dir.join("condor_vars.lst"),
        })
    }
}

/// A laid-out node that cleans itself up on drop
pub struct TestNode {
    temp_dir: TempDir,
    pub root: PathBuf,
    pub sandbox_dir: PathBuf,
    pub glidein_config: PathBuf,
    pub condor_vars: PathBuf,
}

impl TestNode {
    /// Whether a sibling sandbox is still on the node
    pub fn has_sandbox(&self, name: &str) -> bool {
        self.root.join(name).exists()
    }

    /// Names of everything left inside the invoking sandbox
    pub fn sandbox_contents(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.sandbox_dir)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Write a file next to the node, e.g. a collector config
    pub fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn read_glidein_config(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.glidein_config)?)
    }

    pub fn read_condor_vars(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.condor_vars)?)
    }
}

/// Set the modification time of a file or directory
pub fn set_mtime(path: &Path, modified: SystemTime) -> Result<()> {
    File::open(path)?.set_times(FileTimes::new().set_modified(modified))?;
    Ok(())
}
