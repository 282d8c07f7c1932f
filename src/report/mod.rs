//! Reporting of run statistics
//!
//! - `console` - human-readable `GC:` lines for the job's stdout
//! - `advertise` - key/value attributes appended to the glidein config files

pub mod advertise;
pub mod console;

pub use advertise::{publish_attributes, Attribute, AttributeType};
pub use console::{start_line, write_summary};
