use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcError {
    /// The candidate vanished before we could rename it, so a peer collector
    /// got there first.
    #[error("claim of {name} lost to a peer collector: {source}")]
    ClaimLost {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to claim {name} after {attempts} attempts: {source}")]
    ClaimExhausted {
        name: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to remove directory {}: {source}", path.display())]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, GcError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_display_includes_candidate_name() {
        let err = GcError::ClaimExhausted {
            name: "glide_b".to_string(),
            attempts: 3,
            source: IoError::other("device busy"),
        };
        let msg = err.to_string();
        assert!(msg.contains("glide_b"));
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("device busy"));
    }
}
