// SPDX-License-Identifier: MIT OR Apache-2.0
//! Project layer errors.

use std::path::PathBuf;
use thiserror::Error;

/// Project errors
#[derive(Debug, Error)]
pub enum ProjectError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Funscript JSON could not be read or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary container encoding failed
    #[error("Binary encoding error: {0}")]
    Binary(#[from] bincode::Error),

    /// Wrong file extension
    #[error("Expected a .{expected} file: {path}")]
    InvalidExtension {
        /// Offending path
        path: PathBuf,
        /// Extension that was expected, without the dot
        expected: &'static str,
    },

    /// Container framing is broken or the project is marked invalid
    #[error("Invalid project container: {0}")]
    InvalidContainer(String),

    /// Written by a newer editor
    #[error("Project version {found} is newer than supported version {supported}")]
    VersionTooNew {
        /// Version in the file
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },

    /// No script at this index
    #[error("Script index {0} out of range")]
    ScriptIndexOutOfRange(usize),

    /// No media file found for a script
    #[error("No media found for {0}")]
    MediaNotFound(PathBuf),

    /// A script with this path is already part of the project
    #[error("Script already in project: {0}")]
    AlreadyExists(PathBuf),

    /// The background writer has shut down
    #[error("Save worker unavailable")]
    WorkerUnavailable,
}

/// Result type for project operations
pub type Result<T> = std::result::Result<T, ProjectError>;
