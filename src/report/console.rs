use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::io::{self, Write};

use crate::gc::stats::{format_secs, RunStatistics};

/// Line announcing the start of a run, stamped in RFC 1123 form
pub fn start_line<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!(
        "GC: Starting garbage collection at {}",
        at.format("%a, %d %b %Y %H:%M:%S %Z")
    )
}

/// Write the end-of-run summary, one `GC:` line per figure
pub fn write_summary<W: Write>(out: &mut W, stats: &RunStatistics) -> io::Result<()> {
    if let Some(error) = &stats.fatal_error {
        writeln!(out, "GC: Fatal error: {error}")?;
    }
    writeln!(out, "GC: Number of candidates: {}", stats.candidates_count)?;
    writeln!(
        out,
        "GC: Candidates list walltime: {} seconds",
        format_secs(stats.candidates_walltime)
    )?;
    writeln!(out, "GC: Directories removed: {}", stats.removed_count)?;
    writeln!(
        out,
        "GC: Directory average removal walltime: {} seconds",
        format_secs(stats.removed_avg_walltime)
    )?;
    writeln!(out, "GC: Glidein disk free: {} GB", stats.free_gb)?;
    writeln!(out, "GC: Glidein disk total: {} GB", stats.total_gb)?;
    writeln!(out, "GC: Glidein disk type: {}", stats.disk_type)?;
    writeln!(
        out,
        "GC: Garbage collection walltime: {} seconds",
        format_secs(stats.walltime)
    )?;
    Ok(())
}
