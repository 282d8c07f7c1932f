//! # glide-gc
//!
//! Reclaims disk space on shared compute nodes by removing the working
//! directories of expired glidein sandboxes.
//!
//! ## Usage
//!
//! ```bash
//! glide-gc <glidein_config> <condor_vars> [--sandbox-dir DIR] [--config gc.toml] [-v]
//! ```
//!
//! ## Modules
//!
//! - `abstractions` - Trait-based access to the node filesystem, with a mock for tests
//! - `config` - Collector thresholds and naming, loadable from TOML
//! - `error` - Error types for setup and run-fatal conditions
//! - `gc` - Candidate scanning, claim-and-reap, disk probing and run statistics
//! - `report` - `GC:` console summary and glidein attribute publishing
pub mod abstractions;
pub mod config;
pub mod error;
pub mod gc;
pub mod report;
