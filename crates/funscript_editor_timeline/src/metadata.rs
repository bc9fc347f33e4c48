// SPDX-License-Identifier: MIT OR Apache-2.0
//! Descriptive metadata carried by funscript documents and projects.

use serde::{Deserialize, Serialize};

/// Script type written when nothing else is known
pub const DEFAULT_SCRIPT_TYPE: &str = "basic";

/// Document metadata block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Script type
    #[serde(rename = "type")]
    pub kind: String,
    /// Title
    pub title: String,
    /// Author
    pub creator: String,
    /// Where the script is published
    pub script_url: String,
    /// Where the matching video is published
    pub video_url: String,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Performers
    pub performers: Vec<String>,
    /// Description
    pub description: String,
    /// License
    pub license: String,
    /// Notes
    pub notes: String,
    /// Media duration in seconds
    pub duration: i64,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            kind: DEFAULT_SCRIPT_TYPE.to_string(),
            title: String::new(),
            creator: String::new(),
            script_url: String::new(),
            video_url: String::new(),
            tags: Vec::new(),
            performers: Vec::new(),
            description: String::new(),
            license: String::new(),
            notes: String::new(),
            duration: 0,
        }
    }
}

impl Metadata {
    /// Create metadata with a title
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}
