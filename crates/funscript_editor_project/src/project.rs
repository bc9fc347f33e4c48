// SPDX-License-Identifier: MIT OR Apache-2.0
//! A project: one media file and the scripts made for it.
//!
//! Scripts are stored in insertion order and addressed by [`ScriptId`]. All
//! of them report events on one channel owned by the project. Saving encodes
//! an immutable snapshot on the calling thread and hands the bytes to the
//! [`SaveWorker`]; unsaved flags are cleared once the worker reports success.

use crate::container::{PlayerSettings, ProjectContainer, ScriptRecord, PROJECT_EXTENSION};
use crate::document::{FunscriptDocument, FUNSCRIPT_EXTENSION};
use crate::error::{ProjectError, Result};
use crate::media::MediaResolver;
use crate::writer::{SaveOutcome, SaveTicket, SaveWorker};
use funscript_editor_timeline::{Metadata, Script, ScriptEvent, ScriptId, TimelineConfig};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

/// `path` relative to `base` when it lies below it, otherwise unchanged
fn relative_to(base: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

fn has_extension(path: &Path, expected: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(expected))
}

/// Funscript project
#[derive(Debug)]
pub struct Project {
    config: TimelineConfig,
    path: Option<PathBuf>,
    media_path: Option<PathBuf>,
    metadata: Metadata,
    player: PlayerSettings,
    scripts: IndexMap<ScriptId, Script>,
    events_tx: Sender<ScriptEvent>,
    events_rx: Receiver<ScriptEvent>,
    writer: SaveWorker,
    /// Generation of every script captured per outstanding save
    pending_saves: HashMap<SaveTicket, Vec<(ScriptId, u64)>>,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    /// Create an empty project with the default config
    pub fn new() -> Self {
        Self::with_config(TimelineConfig::default())
    }

    /// Create an empty project
    pub fn with_config(config: TimelineConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            config,
            path: None,
            media_path: None,
            metadata: Metadata::default(),
            player: PlayerSettings::default(),
            scripts: IndexMap::new(),
            events_tx,
            events_rx,
            writer: SaveWorker::new(),
            pending_saves: HashMap::new(),
        }
    }

    /// Reset to an empty project. Outstanding saves keep running.
    pub fn clear(&mut self) {
        self.path = None;
        self.media_path = None;
        self.metadata = Metadata::default();
        self.player = PlayerSettings::default();
        self.scripts.clear();
        self.pending_saves.clear();
        self.writer.clear_finished();
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Project file path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Media file path
    pub fn media_path(&self) -> Option<&Path> {
        self.media_path.as_deref()
    }

    /// Set the media file
    pub fn set_media_path(&mut self, path: impl Into<PathBuf>) {
        self.media_path = Some(path.into());
    }

    /// Shared metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Mutable shared metadata
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Player state
    pub fn player(&self) -> &PlayerSettings {
        &self.player
    }

    /// Mutable player state
    pub fn player_mut(&mut self) -> &mut PlayerSettings {
        &mut self.player
    }

    /// Settings used for new scripts
    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Scripts in project order
    pub fn scripts(&self) -> impl ExactSizeIterator<Item = &Script> {
        self.scripts.values()
    }

    /// Number of scripts
    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    /// Script by handle
    pub fn script(&self, id: ScriptId) -> Option<&Script> {
        self.scripts.get(&id)
    }

    /// Mutable script by handle
    pub fn script_mut(&mut self, id: ScriptId) -> Option<&mut Script> {
        self.scripts.get_mut(&id)
    }

    /// Script by position
    pub fn script_at(&self, index: usize) -> Option<&Script> {
        self.scripts.get_index(index).map(|(_, script)| script)
    }

    /// Position of a script
    pub fn script_index(&self, id: ScriptId) -> Option<usize> {
        self.scripts.get_index_of(&id)
    }

    /// Events raised by every script of this project
    pub fn events(&self) -> &Receiver<ScriptEvent> {
        &self.events_rx
    }

    /// Whether any script has unsaved edits
    pub fn has_unsaved_edits(&self) -> bool {
        self.scripts.values().any(Script::has_unsaved_edits)
    }

    /// End-of-tick processing for every script
    pub fn update(&mut self) {
        for script in self.scripts.values_mut() {
            script.update();
        }
    }

    fn base_dir(&self) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Absolute location of a script's file
    pub fn script_path(&self, script: &Script) -> PathBuf {
        self.base_dir().join(script.relative_path())
    }

    fn insert_script(&mut self, mut script: Script) -> ScriptId {
        script.set_notifier(self.events_tx.clone());
        let id = script.id();
        self.scripts.insert(id, script);
        id
    }

    fn open_script(&self, path: &Path) -> Result<Script> {
        let parsed = FunscriptDocument::read(path)?;
        if !parsed.is_complete() {
            tracing::warn!(path = %path.display(), rejected = parsed.rejected, "script loaded partially");
        }
        let relative = relative_to(&self.base_dir(), path);
        let (script, dropped) = parsed.document.into_script(&self.config, &relative);
        if dropped > 0 {
            tracing::warn!(path = %path.display(), dropped, "script exceeds the action limit");
        }
        Ok(script)
    }

    // ------------------------------------------------------------------
    // Scripts
    // ------------------------------------------------------------------

    fn empty_script(&self, path: &Path) -> Script {
        let mut script = Script::with_config(&self.config);
        script.update_relative_path(&relative_to(&self.base_dir(), path));
        script
    }

    /// Import a script or a media file into a fresh project.
    ///
    /// A `.funscript` path is opened as is; its media comes from `resolver`
    /// unless the project already has one. Any other path is taken as the
    /// media file and the script next to it with the same stem is opened, or
    /// created empty if it does not exist yet.
    ///
    /// The project file defaults to the imported path with the project
    /// extension. Importing fails if that file already exists, so an existing
    /// project is never overwritten.
    pub fn import_script(&mut self, path: &Path, resolver: &dyn MediaResolver) -> Result<ScriptId> {
        if self.path.is_none() {
            let project_path = path.with_extension(PROJECT_EXTENSION);
            if project_path.exists() {
                return Err(ProjectError::AlreadyExists(project_path));
            }
        }

        let from_script = has_extension(path, FUNSCRIPT_EXTENSION);
        let script_path = if from_script {
            path.to_path_buf()
        } else {
            if !path.is_file() {
                return Err(ProjectError::MediaNotFound(path.to_path_buf()));
            }
            if self.media_path.is_none() {
                self.media_path = Some(path.to_path_buf());
            }
            path.with_extension(FUNSCRIPT_EXTENSION)
        };

        if self.media_path.is_none() {
            let media = resolver
                .resolve(&script_path)
                .ok_or_else(|| ProjectError::MediaNotFound(script_path.clone()))?;
            tracing::info!(media = %media.display(), "found media");
            self.media_path = Some(media);
        }
        if self.path.is_none() {
            self.path = Some(path.with_extension(PROJECT_EXTENSION));
        }

        let script = if from_script || script_path.is_file() {
            self.open_script(&script_path)?
        } else {
            self.empty_script(&script_path)
        };
        let id = self.insert_script(script);
        tracing::info!(path = %script_path.display(), script = %id, "imported script");
        Ok(id)
    }

    /// Add a script bound to `path`, opening it if the file exists
    pub fn add_script(&mut self, path: &Path) -> Result<ScriptId> {
        let relative = relative_to(&self.base_dir(), path);
        let relative_str = relative.to_string_lossy().replace('\\', "/");
        if self.scripts.values().any(|s| s.relative_path() == relative_str) {
            return Err(ProjectError::AlreadyExists(path.to_path_buf()));
        }

        let script = if path.is_file() {
            self.open_script(path)?
        } else {
            self.empty_script(path)
        };
        let id = self.insert_script(script);
        tracing::info!(path = %path.display(), script = %id, "added script");
        Ok(id)
    }

    /// Remove the script at `index` and return it
    pub fn remove_script(&mut self, index: usize) -> Result<Script> {
        let (id, script) = self
            .scripts
            .shift_remove_index(index)
            .ok_or(ProjectError::ScriptIndexOutOfRange(index))?;

        let _ = self.events_tx.send(ScriptEvent::Removed {
            script: id,
            title: script.title().to_string(),
        });
        tracing::info!(script = %id, title = script.title(), "removed script");
        Ok(script)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Load a project file, replacing the current contents.
    ///
    /// On any failure the project is left cleared.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.clear();
        let result = self.load_container(path);
        if result.is_err() {
            self.clear();
        }
        result
    }

    fn load_container(&mut self, path: &Path) -> Result<()> {
        if !has_extension(path, PROJECT_EXTENSION) {
            return Err(ProjectError::InvalidExtension {
                path: path.to_path_buf(),
                expected: PROJECT_EXTENSION,
            });
        }

        let bytes = std::fs::read(path)?;
        let container = ProjectContainer::decode(&bytes)?;
        if !container.valid {
            return Err(ProjectError::InvalidContainer("project is marked invalid".into()));
        }

        self.path = Some(path.to_path_buf());
        let base = self.base_dir();
        if !container.media_path.is_empty() {
            self.media_path = Some(base.join(&container.media_path));
        }
        self.metadata = container.metadata;
        self.player = container.player;

        for record in container.scripts {
            let (mut script, dropped) = Script::with_actions(&self.config, record.actions);
            if dropped > 0 {
                tracing::warn!(path = %record.relative_path, dropped, "dropped actions while loading");
            }
            script.update_relative_path(Path::new(&record.relative_path));
            script.set_title(record.title);
            script.set_enabled(record.enabled);
            self.insert_script(script);
        }

        tracing::info!(path = %path.display(), scripts = self.scripts.len(), "loaded project");
        Ok(())
    }

    fn container(&self) -> ProjectContainer {
        let base = self.base_dir();
        ProjectContainer {
            valid: true,
            media_path: self
                .media_path
                .as_deref()
                .map(|media| relative_to(&base, media).to_string_lossy().into_owned())
                .unwrap_or_default(),
            metadata: self.metadata.clone(),
            player: self.player.clone(),
            scripts: self
                .scripts
                .values()
                .map(|script| {
                    let snapshot = script.snapshot();
                    ScriptRecord {
                        actions: snapshot.actions.as_slice().to_vec(),
                        relative_path: snapshot.relative_path,
                        title: snapshot.title,
                        enabled: snapshot.enabled,
                    }
                })
                .collect(),
        }
    }

    /// Move the project file to `path`, keeping script paths pointing at the same files
    fn rebase(&mut self, path: &Path) {
        let old_base = self.base_dir();
        self.path = Some(path.to_path_buf());
        let new_base = self.base_dir();
        if old_base == new_base {
            return;
        }

        for script in self.scripts.values_mut() {
            if script.relative_path().is_empty() {
                continue;
            }
            let absolute = old_base.join(script.relative_path());
            script.set_relative_path(&relative_to(&new_base, &absolute));
        }
    }

    /// Save to `path` in the background.
    ///
    /// The project is encoded on the calling thread; the write happens on the
    /// save worker. Unsaved flags are cleared by [`Project::poll_saves`] once
    /// the write succeeds.
    pub fn save(&mut self, path: &Path) -> Result<SaveTicket> {
        if !has_extension(path, PROJECT_EXTENSION) {
            return Err(ProjectError::InvalidExtension {
                path: path.to_path_buf(),
                expected: PROJECT_EXTENSION,
            });
        }

        self.rebase(path);
        self.metadata.title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let buffer = self.container().encode()?;
        let generations = self
            .scripts
            .values()
            .map(|s| (s.id(), s.edit_generation()))
            .collect();

        let ticket = self.writer.submit(path, buffer)?;
        self.pending_saves.insert(ticket, generations);
        Ok(ticket)
    }

    fn finish_saves(&mut self, outcomes: Vec<SaveOutcome>) -> Vec<SaveOutcome> {
        for outcome in &outcomes {
            let Some(generations) = self.pending_saves.remove(&outcome.ticket) else {
                continue;
            };
            if let Some(err) = &outcome.error {
                tracing::warn!(path = %outcome.path.display(), "project save failed: {err}");
                continue;
            }
            for (id, generation) in generations {
                if let Some(script) = self.scripts.get_mut(&id) {
                    script.acknowledge_save(generation);
                }
            }
        }
        outcomes
    }

    /// Apply finished saves without blocking
    pub fn poll_saves(&mut self) -> Vec<SaveOutcome> {
        let outcomes = self.writer.poll();
        self.finish_saves(outcomes)
    }

    /// Block until every outstanding save has finished, then apply them
    pub fn flush_saves(&mut self) -> Vec<SaveOutcome> {
        let outcomes = self.writer.flush();
        self.finish_saves(outcomes)
    }

    /// Returns the generation written, or `None` if actions were merged on
    /// the way out and the file no longer matches the script.
    fn write_script(&mut self, index: usize, path: &Path) -> Result<Option<u64>> {
        let metadata = self.metadata.clone();
        let (_, script) = self
            .scripts
            .get_index_mut(index)
            .ok_or(ProjectError::ScriptIndexOutOfRange(index))?;

        *script.local_metadata_mut() = metadata;
        let snapshot = script.snapshot();
        let merged = FunscriptDocument::from_snapshot(&snapshot).write(path)?;
        tracing::info!(path = %path.display(), actions = snapshot.actions.len(), "exported script");
        Ok((merged == 0).then_some(snapshot.generation))
    }

    /// Write the script at `index` to `path`
    pub fn export_script(&mut self, index: usize, path: &Path) -> Result<()> {
        self.write_script(index, path).map(|_| ())
    }

    /// Write every script into `dir` as `<title>.funscript`
    pub fn export_scripts(&mut self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.scripts.len());
        for index in 0..self.scripts.len() {
            let Some(script) = self.script_at(index) else {
                continue;
            };
            let path = dir.join(format!("{}.{}", script.title(), FUNSCRIPT_EXTENSION));
            self.write_script(index, &path)?;
            written.push(path);
        }
        Ok(written)
    }

    /// Write every script back to its own file
    pub fn export_in_place(&mut self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.scripts.len());
        for index in 0..self.scripts.len() {
            let Some(script) = self.script_at(index) else {
                continue;
            };
            if script.relative_path().is_empty() {
                tracing::warn!(script = %script.id(), "script has no path, skipping");
                continue;
            }
            let path = self.script_path(script);
            let written_generation = self.write_script(index, &path)?;
            if let (Some(generation), Some((_, script))) =
                (written_generation, self.scripts.get_index_mut(index))
            {
                script.acknowledge_save(generation);
            }
            written.push(path);
        }
        Ok(written)
    }
}
