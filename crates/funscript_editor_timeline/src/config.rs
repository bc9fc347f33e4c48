// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline configuration stored as RON.

use crate::action_set::DEFAULT_ACTION_LIMIT;
use crate::history::DEFAULT_UNDO_DEPTH;
use crate::interpolation::InterpolationMode;
use crate::selection::PositionMatch;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Current config format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Config file name used when no path is given
pub const CONFIG_FILE_NAME: &str = "funscript_editor.ron";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer editor
    #[error("Config version {found} is newer than supported version {supported}")]
    VersionTooNew {
        /// Version in the file
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },
}

/// Result type for config operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Editing engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Config format version
    pub version: u32,
    /// Hard cap on actions per script
    pub action_limit: usize,
    /// Undo entries kept per script
    pub undo_depth: usize,
    /// Position tolerance for top/bottom/mid selection
    pub extreme_position_tolerance: u8,
    /// Default sampling strategy
    pub interpolation: InterpolationMode,
    /// Search window for add-or-edit, in milliseconds
    pub nearest_tolerance_ms: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            action_limit: DEFAULT_ACTION_LIMIT,
            undo_depth: DEFAULT_UNDO_DEPTH,
            extreme_position_tolerance: 0,
            interpolation: InterpolationMode::default(),
            nearest_tolerance_ms: 1000.0 / 60.0,
        }
    }
}

impl TimelineConfig {
    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TimelineConfig = ron::from_str(&content)?;

        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::VersionTooNew {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }

        tracing::debug!(path = %path.display(), "loaded timeline config");
        Ok(config)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, pretty)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Position matching used by top/bottom/mid selection
    pub fn position_match(&self) -> PositionMatch {
        PositionMatch::within(self.extreme_position_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("{}_{}_{}", name, std::process::id(), uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_default_values() {
        let config = TimelineConfig::default();
        assert_eq!(config.action_limit, 65_536);
        assert_eq!(config.undo_depth, 100);
        assert_eq!(config.extreme_position_tolerance, 0);
        assert_eq!(config.interpolation, InterpolationMode::Spline);
        assert!((config.nearest_tolerance_ms - 16.666).abs() < 0.01);
    }

    #[test]
    fn test_save_load() {
        let path = temp_path("timeline_config.ron");
        let config = TimelineConfig {
            undo_depth: 12,
            interpolation: InterpolationMode::Linear,
            ..TimelineConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = TimelineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_fields_default() {
        let config: TimelineConfig = ron::from_str("(undo_depth: 5)").unwrap();
        assert_eq!(config.undo_depth, 5);
        assert_eq!(config.action_limit, DEFAULT_ACTION_LIMIT);
    }

    #[test]
    fn test_newer_version_rejected() {
        let path = temp_path("timeline_config_new.ron");
        std::fs::write(&path, "(version: 99)").unwrap();
        assert!(matches!(
            TimelineConfig::load(&path),
            Err(ConfigError::VersionTooNew { found: 99, .. })
        ));
        let _ = std::fs::remove_file(&path);
    }
}
