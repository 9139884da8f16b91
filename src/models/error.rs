use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One file that could not be processed as part of a batch.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FileFailure {
    pub path: Utf8PathBuf,
    pub reason: String,
}

impl FileFailure {
    pub fn new(path: impl Into<Utf8PathBuf>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Error, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum SError {
    #[error("the game is running")]
    GameRunning,
    #[error("the name '{0}' is already taken")]
    DuplicateName(String),
    #[error("slot '{0}' is not the loaded slot")]
    NotLoaded(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{} file(s) failed", .0.len())]
    PartialFailure(Vec<FileFailure>),
    #[error("manifest is corrupt: {0}")]
    CorruptManifest(String),
    #[error("io error: {0}")]
    IOError(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("archive error: {0}")]
    ArchiveError(String),
    #[error("files already owned by another mod: {}", .0.join(", "))]
    FileCollision(Vec<String>),
}

impl From<std::io::Error> for SError {
    fn from(e: std::io::Error) -> Self {
        SError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for SError {
    fn from(e: serde_json::Error) -> Self {
        SError::ParseError(e.to_string())
    }
}

impl From<zip::result::ZipError> for SError {
    fn from(e: zip::result::ZipError) -> Self {
        SError::ArchiveError(e.to_string())
    }
}

impl From<walkdir::Error> for SError {
    fn from(e: walkdir::Error) -> Self {
        SError::IOError(e.to_string())
    }
}

impl From<std::path::StripPrefixError> for SError {
    fn from(e: std::path::StripPrefixError) -> Self {
        SError::ParseError(e.to_string())
    }
}

impl From<camino::FromPathBufError> for SError {
    fn from(e: camino::FromPathBufError) -> Self {
        SError::ParseError(format!("Invalid UTF-8 path: {}", e.as_path().display()))
    }
}
