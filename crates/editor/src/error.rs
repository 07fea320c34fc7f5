use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by the editor crate.
pub type Result<T> = std::result::Result<T, EditorError>;

/// Errors produced while setting up the editor model.
#[derive(Debug)]
pub enum EditorError {
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseConfig {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidConfig {
        reason: &'static str,
    },
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadConfig { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            Self::ParseConfig { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
            Self::InvalidConfig { reason } => write!(f, "invalid config: {reason}"),
        }
    }
}

impl std::error::Error for EditorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadConfig { source, .. } => Some(source),
            Self::ParseConfig { source, .. } => Some(source),
            Self::InvalidConfig { .. } => None,
        }
    }
}
