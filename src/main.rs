use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

use glide_gc::abstractions::RealNodeFs;
use glide_gc::config::load_config;
use glide_gc::gc::GarbageCollector;
use glide_gc::report::{publish_attributes, start_line, write_summary};

/// Remove the working directories of abandoned glidein sandboxes
#[derive(Parser)]
#[command(name = "glide-gc")]
#[command(about = "Reclaim disk space from stale glidein sandboxes", long_about = None)]
struct Cli {
    /// Glidein config file to append summary attributes to (must exist)
    glidein_config: PathBuf,

    /// Condor vars file to append attribute declarations to (created if missing)
    condor_vars: PathBuf,

    /// Sandbox this collector runs from (default: current directory)
    #[arg(long)]
    sandbox_dir: Option<PathBuf>,

    /// Path to a TOML file overriding collector thresholds
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Enable verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let started = Instant::now();
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("glide-gc started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli, started).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, started: Instant) -> anyhow::Result<()> {
    console(|out| writeln!(out, "{}", start_line(&chrono::Local::now())));

    let config = load_config(cli.config.as_deref())
        .await
        .context("Failed to load collector configuration")?;
    let sandbox_dir = resolve_sandbox_dir(cli.sandbox_dir.as_deref())?;

    debug!(
        user = %whoami::username(),
        host = ?hostname::get().unwrap_or_default(),
        sandbox = %sandbox_dir.display(),
        "Starting garbage collection"
    );

    let gc = GarbageCollector::new(Arc::new(RealNodeFs::new()), &config)?;
    let stats = gc
        .run(&sandbox_dir, started, SystemTime::now(), &mut rand::rng())
        .await?;

    console(|out| write_summary(out, &stats));

    // The attribute files are the source of truth for failures, but a failed
    // publish must not turn into a failed job.
    if let Err(e) = publish_attributes(&cli.glidein_config, &cli.condor_vars, &stats).await {
        error!(error = %e, "Unable to publish collection attributes");
        console(|out| writeln!(out, "GC: Unable to publish attributes: {e}"));
    }

    Ok(())
}

/// Write to stdout, logging instead of failing: the console is informational
/// and a full disk must not stop collection or publishing.
fn console<F>(write: F)
where
    F: FnOnce(&mut std::io::StdoutLock<'static>) -> std::io::Result<()>,
{
    let mut out = std::io::stdout().lock();
    if let Err(e) = write(&mut out).and_then(|()| out.flush()) {
        warn!(error = %e, "Unable to write to the console");
    }
}

fn resolve_sandbox_dir(sandbox_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = match sandbox_dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("Unable to get the current directory")?,
    };
    dir.canonicalize()
        .with_context(|| format!("Unable to resolve sandbox directory {}", dir.display()))
}
