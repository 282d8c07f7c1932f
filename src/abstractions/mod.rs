//! Abstraction layers for external dependencies
//!
//! This module provides trait-based abstractions over the host filesystem
//! to enable testing the collector without touching real sandboxes.

pub mod node_fs;

pub use node_fs::{DirEntryInfo, DiskSpace, FileStat, MockNodeFs, NodeFs, RealNodeFs};
