use std::{fmt, io, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use serde_yaml::Error as YamlError;
use thiserror::Error;

/// Exit code reported when a run is cancelled by the operator (SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum ConceptLinkError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Snapshot is corrupt or unreadable: {0}")]
    CorruptSnapshot(String),
    #[error(
        "Insufficient disk space at {path}: {available} bytes available, {required} bytes required"
    )]
    DiskSpace {
        path: String,
        available: u64,
        required: u64,
    },
    #[error("Run interrupted by user")]
    Interrupted,
    #[error("File System error: {0}")]
    Io(String),
    #[error("Timed out after {waited:?} waiting for exclusive lock on {path}")]
    LockTimeout { path: String, waited: Duration },
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("You do not have permission to access this resource: {0}")]
    PermissionDenied(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl ConceptLinkError {
    pub fn parse<P: fmt::Display, R: fmt::Display>(path: P, reason: R) -> Self {
        ConceptLinkError::Parse {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Process exit code for the CLI surface. Success is always 0 and is not represented here.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConceptLinkError::Interrupted => EXIT_INTERRUPTED,
            ConceptLinkError::Config(_) => 2,
            ConceptLinkError::LockTimeout { .. } => 3,
            ConceptLinkError::DiskSpace { .. } => 4,
            ConceptLinkError::CorruptSnapshot(_) | ConceptLinkError::Serialization(_) => 5,
            ConceptLinkError::Io(_)
            | ConceptLinkError::NotFound(_)
            | ConceptLinkError::Parse { .. }
            | ConceptLinkError::PermissionDenied(_) => 1,
        }
    }
}

impl From<toml::de::Error> for ConceptLinkError {
    fn from(src: toml::de::Error) -> ConceptLinkError {
        ConceptLinkError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<JsonError> for ConceptLinkError {
    fn from(src: JsonError) -> ConceptLinkError {
        ConceptLinkError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<YamlError> for ConceptLinkError {
    fn from(src: YamlError) -> ConceptLinkError {
        ConceptLinkError::Serialization(format!("YAML frontmatter error: {src}"))
    }
}

impl From<io::Error> for ConceptLinkError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => ConceptLinkError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => ConceptLinkError::PermissionDenied(format!("{x}")),
            _ => ConceptLinkError::Io(format!("IOError ({}): {x}", x.kind())),
        }
    }
}

impl From<tempfile::PersistError> for ConceptLinkError {
    fn from(x: tempfile::PersistError) -> Self {
        ConceptLinkError::Io(format!(
            "Atomic rename of {:?} failed: {}",
            x.file.path(),
            x.error
        ))
    }
}

impl From<walkdir::Error> for ConceptLinkError {
    fn from(x: walkdir::Error) -> Self {
        let path = x
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        match x.into_io_error() {
            Some(io_error) => ConceptLinkError::from(io_error),
            None => ConceptLinkError::Io(format!("Directory walk failed at {path}")),
        }
    }
}
