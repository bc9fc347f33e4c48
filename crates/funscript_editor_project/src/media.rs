// SPDX-License-Identifier: MIT OR Apache-2.0
//! Locating the media file that belongs to a script.

use std::path::{Path, PathBuf};

/// Video extensions tried by [`SiblingMediaResolver`], in order
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "wmv", "avi", "m4v"];

/// Audio extensions tried by [`SiblingMediaResolver`] after every video extension
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "ogg", "flac", "wav"];

/// Supplies the media file for a script, if there is one
pub trait MediaResolver {
    /// Media path for `script_path`
    fn resolve(&self, script_path: &Path) -> Option<PathBuf>;
}

/// Looks for a media file next to the script with the same stem
#[derive(Debug, Clone, Copy, Default)]
pub struct SiblingMediaResolver;

impl MediaResolver for SiblingMediaResolver {
    fn resolve(&self, script_path: &Path) -> Option<PathBuf> {
        VIDEO_EXTENSIONS
            .iter()
            .chain(AUDIO_EXTENSIONS)
            .map(|ext| script_path.with_extension(ext))
            .find(|candidate| candidate.is_file())
    }
}

/// Always answers with the same path
#[derive(Debug, Clone)]
pub struct FixedMediaResolver(pub PathBuf);

impl MediaResolver for FixedMediaResolver {
    fn resolve(&self, _script_path: &Path) -> Option<PathBuf> {
        Some(self.0.clone())
    }
}

/// Whether `path` has one of the supported media extensions
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|ext| {
            VIDEO_EXTENSIONS.contains(&ext.as_str()) || AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
}
