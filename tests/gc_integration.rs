//! Integration tests for the collector against the real filesystem

mod common;

use common::{NodeBuilder, DAY, HOUR};
use glide_gc::abstractions::RealNodeFs;
use glide_gc::config::GcConfig;
use glide_gc::gc::{CandidateScanner, GarbageCollector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::Instant;

#[tokio::test]
async fn test_scan_real_node() {
    let node = NodeBuilder::new()
        .unwrap()
        .with_unleased("glide_A", 11 * DAY)
        .with_leased("glide_B", 11 * DAY, 30 * 60)
        .with_leased("glide_D", HOUR, 90 * 60)
        .build()
        .unwrap();

    let scanner = CandidateScanner::new(Arc::new(RealNodeFs::new()), &GcConfig::default()).unwrap();
    let outcome = scanner
        .scan(&node.root, OsStr::new("glide_me"), SystemTime::now())
        .await;

    let mut candidates = outcome.candidates;
    candidates.sort();
    assert_eq!(candidates, vec!["glide_A", "glide_D"]);

    // Scanning does not touch anything
    let again = scanner
        .scan(&node.root, OsStr::new("glide_me"), SystemTime::now())
        .await;
    assert_eq!(again.candidates.len(), 2);
    assert!(node.has_sandbox("glide_A"));
}

#[tokio::test]
async fn test_full_run_real_node() {
    let node = NodeBuilder::new()
        .unwrap()
        .with_unleased("glide_old_1", 12 * DAY)
        .with_unleased("glide_old_2", 30 * DAY)
        .with_leased("glide_live", DAY, 5 * 60)
        .build()
        .unwrap();

    let gc = GarbageCollector::new(Arc::new(RealNodeFs::new()), &GcConfig::default()).unwrap();
    let stats = gc
        .run(
            &node.sandbox_dir,
            Instant::now(),
            SystemTime::now(),
            &mut StdRng::seed_from_u64(42),
        )
        .await
        .unwrap();

    assert_eq!(stats.fatal_error, None);
    assert_eq!(stats.candidates_count, 2);
    assert_eq!(stats.removed_count, 2);
    assert!(stats.free_gb <= stats.total_gb);
    assert!(!stats.disk_type.is_empty());
    assert!(!node.has_sandbox("glide_old_1"));
    assert!(!node.has_sandbox("glide_old_2"));
    assert!(node.has_sandbox("glide_live"));
    assert!(node.sandbox_contents().unwrap().is_empty());
}
