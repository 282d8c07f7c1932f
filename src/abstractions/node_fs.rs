//! Node filesystem abstraction layer
//!
//! Everything the collector needs from the host filesystem goes through
//! [`NodeFs`], so the scanner and reaper can be exercised against an
//! in-memory tree where ownership, races and failures are easy to stage.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ffi::OsString;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

/// One immediate child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: OsString,
    /// True only for real directories; symlinks are not followed
    pub is_dir: bool,
}

/// The subset of stat(2) the collector looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub owner_id: u32,
    pub modified: SystemTime,
}

/// Capacity of the filesystem holding a path, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskSpace {
    /// Space available to unprivileged users
    pub available_bytes: u64,
    pub total_bytes: u64,
}

/// Trait for node filesystem operations
#[async_trait]
pub trait NodeFs: Send + Sync {
    /// Uid of the user running the collector
    fn current_uid(&self) -> u32;

    /// List the immediate children of `dir`
    async fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>>;

    /// Owner and modification time of `path`, following symlinks
    async fn stat(&self, path: &Path) -> io::Result<FileStat>;

    /// Atomically rename `from` to `to`
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Recursively delete the directory at `path`
    async fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Free and total space of the filesystem holding `path`
    async fn disk_space(&self, path: &Path) -> io::Result<DiskSpace>;

    /// Human-readable type of the filesystem holding `path`
    async fn filesystem_type(&self, path: &Path) -> io::Result<String>;
}

/// Real implementation of NodeFs backed by the host filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct RealNodeFs;

impl RealNodeFs {
    /// Create a new RealNodeFs instance
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NodeFs for RealNodeFs {
    fn current_uid(&self) -> u32 {
        nix::unistd::Uid::current().as_raw()
    }

    async fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || list_children(&dir))
            .await
            .map_err(io::Error::other)?
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        use std::os::unix::fs::MetadataExt;

        let metadata = tokio::fs::metadata(path).await?;
        Ok(FileStat {
            owner_id: metadata.uid(),
            modified: metadata.modified()?,
        })
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_dir_all(path).await
    }

    #[allow(clippy::unnecessary_cast)] // statvfs field widths vary by platform
    async fn disk_space(&self, path: &Path) -> io::Result<DiskSpace> {
        let stat = nix::sys::statvfs::statvfs(path)?;
        let fragment = stat.fragment_size() as u64;
        Ok(DiskSpace {
            available_bytes: (stat.blocks_available() as u64).saturating_mul(fragment),
            total_bytes: (stat.blocks() as u64).saturating_mul(fragment),
        })
    }

    async fn filesystem_type(&self, path: &Path) -> io::Result<String> {
        if let Some(fs_type) = statfs_fs_type(path)? {
            return Ok(fs_type.to_string());
        }

        tracing::debug!(
            path = %path.display(),
            "Unknown filesystem magic, asking stat(1) for the filesystem type"
        );
        stat_command_fs_type(path).await
    }
}

fn list_children(dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
    let mut entries = Vec::new();

    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        match entry {
            Ok(entry) => entries.push(DirEntryInfo {
                name: entry.file_name().to_os_string(),
                is_dir: entry.file_type().is_dir(),
            }),
            // The root itself could not be read
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
            }
        }
    }

    Ok(entries)
}

/// Name of the filesystem holding `path`, read from its statfs(2) magic.
/// `Ok(None)` means the magic is not one we know by name.
#[cfg(target_os = "linux")]
#[allow(clippy::unnecessary_cast)] // f_type is a signed word of platform width
fn statfs_fs_type(path: &Path) -> io::Result<Option<&'static str>> {
    let stat = nix::sys::statfs::statfs(path)?;
    let magic = (stat.filesystem_type().0 as u64) & 0xFFFF_FFFF;
    Ok(fs_type_name(magic))
}

#[cfg(not(target_os = "linux"))]
fn statfs_fs_type(_path: &Path) -> io::Result<Option<&'static str>> {
    Ok(None)
}

/// The names GNU `stat -f -c %T` prints for the filesystems found on
/// worker nodes
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn fs_type_name(magic: u64) -> Option<&'static str> {
    let name = match magic {
        0xEF53 => "ext2/ext3",
        0x0102_1994 => "tmpfs",
        0x8584_58F6 => "ramfs",
        0x5846_5342 => "xfs",
        0x9123_683E => "btrfs",
        0xF2F5_2010 => "f2fs",
        0x2FC1_2FC1 => "zfs",
        0x794C_7630 => "overlayfs",
        0x6173_6673 => "aufs",
        0x7371_7368 => "squashfs",
        0x6969 => "nfs",
        0x6E66_7364 => "nfsd",
        0xFF53_4D42 => "cifs",
        0xFE53_4D42 => "smb2",
        0x517B => "smb",
        0x5346_414F => "afs",
        0x0102_1997 => "v9fs",
        0x0BD0_0BD0 => "lustre",
        0x4750_4653 => "gpfs",
        0x00C3_6400 => "ceph",
        0x1983_0326 => "fhgfs",
        0x0116_1970 => "gfs/gfs2",
        0x7461_636F => "ocfs2",
        0x6573_5546 => "fuseblk",
        0x6573_5543 => "fusectl",
        0x3153_464A => "jfs",
        0x5265_4973 => "reiserfs",
        0x4D44 => "msdos",
        0x2011_BAB0 => "exfat",
        0x5346_544E => "ntfs",
        0x9660 => "isofs",
        0x6367_7270 => "cgroup2fs",
        0x0027_E0EB => "cgroupfs",
        0x9FA0 => "proc",
        0x6265_6572 => "sysfs",
        0x1CD1 => "devpts",
        _ => return None,
    };
    Some(name)
}

async fn stat_command_fs_type(path: &Path) -> io::Result<String> {
    let output = tokio::process::Command::new("stat")
        .args(["-f", "-c", "%T"])
        .arg(path)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(io::Error::other(format!("stat failed: {}", stderr.trim())));
    }

    let fs_type = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if fs_type.is_empty() {
        return Err(io::Error::other("stat reported an empty filesystem type"));
    }
    Ok(fs_type)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockKind {
    Dir,
    File,
    Symlink,
}

#[derive(Debug, Clone, Copy)]
struct MockNode {
    kind: MockKind,
    stat: FileStat,
}

#[derive(Debug, Default)]
struct MockState {
    nodes: BTreeMap<PathBuf, MockNode>,
    stat_errors: HashMap<PathBuf, ErrorKind>,
    rename_script: VecDeque<Option<ErrorKind>>,
    remove_errors: VecDeque<ErrorKind>,
    stat_log: Vec<PathBuf>,
    rename_log: Vec<(PathBuf, PathBuf)>,
    disk_space: Option<DiskSpace>,
    fs_type: Option<String>,
}

/// Mock implementation of NodeFs for testing
///
/// Holds an in-memory tree keyed by absolute path. Failures are scripted per
/// operation and consumed in order by the next matching call.
#[derive(Debug)]
pub struct MockNodeFs {
    uid: u32,
    state: Mutex<MockState>,
}

impl MockNodeFs {
    /// Create an empty tree for a collector running as `uid`
    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert(&self, path: impl Into<PathBuf>, kind: MockKind, owner_id: u32, modified: SystemTime) {
        self.state().nodes.insert(
            path.into(),
            MockNode {
                kind,
                stat: FileStat { owner_id, modified },
            },
        );
    }

    /// Add a directory
    pub fn add_dir(&self, path: impl Into<PathBuf>, owner_id: u32, modified: SystemTime) {
        self.insert(path, MockKind::Dir, owner_id, modified);
    }

    /// Add a regular file
    pub fn add_file(&self, path: impl Into<PathBuf>, owner_id: u32, modified: SystemTime) {
        self.insert(path, MockKind::File, owner_id, modified);
    }

    /// Add a symlink whose target stats as the given owner and mtime
    pub fn add_symlink(&self, path: impl Into<PathBuf>, owner_id: u32, modified: SystemTime) {
        self.insert(path, MockKind::Symlink, owner_id, modified);
    }

    /// Make every stat of `path` fail with `kind`
    pub fn fail_stat(&self, path: impl Into<PathBuf>, kind: ErrorKind) {
        self.state().stat_errors.insert(path.into(), kind);
    }

    /// Fail the next rename with `kind`
    pub fn push_rename_error(&self, kind: ErrorKind) {
        self.state().rename_script.push_back(Some(kind));
    }

    /// Let the next rename run normally; only useful ahead of a scripted error
    pub fn push_rename_ok(&self) {
        self.state().rename_script.push_back(None);
    }

    /// Fail the next recursive removal with `kind`
    pub fn push_remove_error(&self, kind: ErrorKind) {
        self.state().remove_errors.push_back(kind);
    }

    /// Report this capacity from `disk_space`
    pub fn set_disk_space(&self, space: DiskSpace) {
        self.state().disk_space = Some(space);
    }

    /// Report this name from `filesystem_type`
    pub fn set_fs_type(&self, fs_type: &str) {
        self.state().fs_type = Some(fs_type.to_string());
    }

    /// Drop `path` and everything below it, as a peer collector would
    pub fn remove_tree(&self, path: &Path) {
        self.state().nodes.retain(|p, _| !p.starts_with(path));
    }

    /// Whether `path` is present in the tree
    pub fn exists(&self, path: &Path) -> bool {
        self.state().nodes.contains_key(path)
    }

    /// Every path passed to `stat`, in call order
    pub fn stat_log(&self) -> Vec<PathBuf> {
        self.state().stat_log.clone()
    }

    /// Every rename attempted, in call order
    pub fn rename_log(&self) -> Vec<(PathBuf, PathBuf)> {
        self.state().rename_log.clone()
    }
}

#[async_trait]
impl NodeFs for MockNodeFs {
    fn current_uid(&self) -> u32 {
        self.uid
    }

    async fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
        let state = self.state();
        match state.nodes.get(dir) {
            Some(node) if node.kind == MockKind::Dir => {}
            Some(_) => return Err(io::Error::other("not a directory")),
            None => return Err(ErrorKind::NotFound.into()),
        }

        Ok(state
            .nodes
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .filter_map(|(path, node)| {
                path.file_name().map(|name| DirEntryInfo {
                    name: name.to_os_string(),
                    is_dir: node.kind == MockKind::Dir,
                })
            })
            .collect())
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let mut state = self.state();
        state.stat_log.push(path.to_path_buf());

        if let Some(kind) = state.stat_errors.get(path) {
            return Err((*kind).into());
        }
        state
            .nodes
            .get(path)
            .map(|node| node.stat)
            .ok_or_else(|| ErrorKind::NotFound.into())
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.state();
        state.rename_log.push((from.to_path_buf(), to.to_path_buf()));

        if let Some(Some(kind)) = state.rename_script.pop_front() {
            return Err(kind.into());
        }
        if !state.nodes.contains_key(from) {
            return Err(ErrorKind::NotFound.into());
        }

        let moved: Vec<PathBuf> = state
            .nodes
            .keys()
            .filter(|path| path.starts_with(from))
            .cloned()
            .collect();
        for old in moved {
            if let (Some(node), Ok(rest)) = (state.nodes.remove(&old), old.strip_prefix(from)) {
                let new = if rest.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(rest)
                };
                state.nodes.insert(new, node);
            }
        }
        Ok(())
    }

    async fn remove_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state();
        if let Some(kind) = state.remove_errors.pop_front() {
            return Err(kind.into());
        }
        if !state.nodes.contains_key(path) {
            return Err(ErrorKind::NotFound.into());
        }
        state.nodes.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    async fn disk_space(&self, _path: &Path) -> io::Result<DiskSpace> {
        self.state()
            .disk_space
            .ok_or_else(|| io::Error::other("statvfs unavailable"))
    }

    async fn filesystem_type(&self, _path: &Path) -> io::Result<String> {
        self.state()
            .fs_type
            .clone()
            .ok_or_else(|| io::Error::other("filesystem type unavailable"))
    }
}
