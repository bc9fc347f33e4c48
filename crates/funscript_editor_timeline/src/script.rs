// SPDX-License-Identifier: MIT OR Apache-2.0
//! One motion axis: actions, selection, metadata, dirty tracking and history.
//!
//! Every mutating call on [`Script`] is transactional. The closure doing the
//! work runs against the live data; if it reports failure the previous state
//! is restored and nothing is journaled, otherwise the previous state is
//! committed to the [`UndoJournal`] and the script is marked edited.

use crate::action::{Action, Direction};
use crate::action_set::ActionSet;
use crate::config::TimelineConfig;
use crate::events::{ScriptEvent, ScriptId};
use crate::history::{HistoryError, HistoryStats, UndoJournal};
use crate::interpolation::{sample_linear, InterpolationMode, SplineSampler};
use crate::metadata::Metadata;
use crate::selection::{EqualizeMode, Selection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

/// Undoable state of a script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ScriptData {
    actions: ActionSet,
    selection: Selection,
}

impl ScriptData {
    fn with_limit(limit: usize) -> Self {
        Self {
            actions: ActionSet::with_limit(limit),
            selection: Selection::with_limit(limit),
        }
    }

    /// Swap every selected action for `replacement` in one step.
    ///
    /// Fails without side effects if the result would contain duplicate
    /// times. The replacement becomes the new selection.
    fn replace_selected(&mut self, replacement: &[Action]) -> Option<()> {
        let kept = self
            .actions
            .iter()
            .copied()
            .filter(|a| !self.selection.contains(a));
        let (actions, rejected) =
            ActionSet::from_actions(kept.chain(replacement.iter().copied()), self.actions.limit());
        if rejected > 0 {
            return None;
        }

        self.actions = actions;
        self.selection.set(&self.actions, replacement);
        Some(())
    }
}

/// Kind of edit, used as the undo label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// Single insert
    AddAction,
    /// Batch insert
    AddActions,
    /// Insert or replace the nearest action
    AddEditAction,
    /// Replace one action
    EditAction,
    /// Remove one action
    RemoveAction,
    /// Remove a batch of actions
    RemoveActions,
    /// Remove a time interval
    RemoveInterval,
    /// Remove everything selected
    RemoveSelected,
    /// Override all actions
    SetActions,
    /// Shift the whole script in time
    MoveAllTime,
    /// Shift the selection in time
    MoveSelectionTime,
    /// Shift the selection's positions
    MoveSelectionPosition,
    /// Equalize the selection
    EqualizeSelection,
}

impl EditKind {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::AddAction => "Add action",
            Self::AddActions => "Add actions",
            Self::AddEditAction => "Add/edit action",
            Self::EditAction => "Edit action",
            Self::RemoveAction => "Remove action",
            Self::RemoveActions => "Remove actions",
            Self::RemoveInterval => "Remove interval",
            Self::RemoveSelected => "Remove selection",
            Self::SetActions => "Set actions",
            Self::MoveAllTime => "Move all actions",
            Self::MoveSelectionTime => "Move selection time",
            Self::MoveSelectionPosition => "Move selection position",
            Self::EqualizeSelection => "Equalize selection",
        }
    }
}

/// Unsaved-edit tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    /// Never edited since it was created or opened
    Clean,
    /// Has edits that were not saved
    Changed,
    /// Every edit has been saved
    Saved,
}

/// Immutable copy of everything a writer needs to persist a script
#[derive(Debug, Clone)]
pub struct ScriptSnapshot {
    /// Script handle
    pub id: ScriptId,
    /// Title
    pub title: String,
    /// Path relative to the project
    pub relative_path: String,
    /// Enabled flag
    pub enabled: bool,
    /// Metadata block
    pub metadata: Metadata,
    /// Actions
    pub actions: ActionSet,
    /// Edit generation captured with this snapshot
    pub generation: u64,
}

/// A single editable funscript
#[derive(Debug)]
pub struct Script {
    id: ScriptId,
    data: ScriptData,
    journal: UndoJournal,
    config: TimelineConfig,
    spline: SplineSampler,

    title: String,
    relative_path: String,
    enabled: bool,
    local_metadata: Metadata,

    actions_changed: bool,
    unsaved_edits: bool,
    saved_generation: Option<u64>,
    edit_generation: u64,
    edit_time: Option<SystemTime>,

    notifier: Option<Sender<ScriptEvent>>,
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl Script {
    /// Create an empty script with the default config
    pub fn new() -> Self {
        Self::with_config(&TimelineConfig::default())
    }

    /// Create an empty script
    pub fn with_config(config: &TimelineConfig) -> Self {
        Self {
            id: ScriptId::new(),
            data: ScriptData::with_limit(config.action_limit),
            journal: UndoJournal::with_max_depth(config.undo_depth),
            config: config.clone(),
            spline: SplineSampler::new(),
            title: String::new(),
            relative_path: String::new(),
            enabled: true,
            local_metadata: Metadata::default(),
            actions_changed: false,
            unsaved_edits: false,
            saved_generation: None,
            edit_generation: 0,
            edit_time: None,
            notifier: None,
        }
    }

    /// Create a script holding `actions` without recording any history.
    ///
    /// Returns the script and the number of actions that were dropped as
    /// duplicates or past the configured limit.
    pub fn with_actions(config: &TimelineConfig, actions: impl IntoIterator<Item = Action>) -> (Self, usize) {
        let mut script = Self::with_config(config);
        let (set, rejected) = ActionSet::from_actions(actions, config.action_limit);
        script.data.actions = set;
        (script, rejected)
    }

    // ------------------------------------------------------------------
    // Identity and metadata
    // ------------------------------------------------------------------

    /// Opaque handle used in events
    pub fn id(&self) -> ScriptId {
        self.id
    }

    /// Display title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Set the display title, raising `MetadataChanged` if it differs
    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if title != self.title {
            let old_title = std::mem::replace(&mut self.title, title);
            self.notify(ScriptEvent::MetadataChanged {
                script: self.id,
                old_title,
            });
        }
    }

    /// Path relative to the owning project
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Point the script at a new file; the title follows the file stem
    pub fn update_relative_path(&mut self, path: &Path) {
        self.set_relative_path(path);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.set_title(stem);
    }

    /// Change the stored path without touching the title
    pub fn set_relative_path(&mut self, path: &Path) {
        self.relative_path = path.to_string_lossy().replace('\\', "/");
    }

    /// Whether the script takes part in playback and export
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the script
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Metadata written with this script on export
    pub fn local_metadata(&self) -> &Metadata {
        &self.local_metadata
    }

    /// Mutable metadata
    pub fn local_metadata_mut(&mut self) -> &mut Metadata {
        &mut self.local_metadata
    }

    /// Settings this script was built with
    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Notifications and dirty tracking
    // ------------------------------------------------------------------

    /// Route events to `sender`
    pub fn set_notifier(&mut self, sender: Sender<ScriptEvent>) {
        self.notifier = Some(sender);
    }

    fn notify(&self, event: ScriptEvent) {
        if let Some(sender) = &self.notifier {
            if sender.send(event).is_err() {
                tracing::trace!(script = %self.id, "event listener gone");
            }
        }
    }

    /// End-of-tick processing.
    ///
    /// Emits a single `ActionsChanged` if any edit happened since the last
    /// tick and returns whether it did.
    pub fn update(&mut self) -> bool {
        let changed = std::mem::take(&mut self.actions_changed);
        if changed {
            self.notify(ScriptEvent::ActionsChanged(self.id));
        }
        changed
    }

    /// Whether actions changed during the current tick
    pub fn actions_changed_this_tick(&self) -> bool {
        self.actions_changed
    }

    /// Whether there are edits not yet acknowledged as saved
    pub fn has_unsaved_edits(&self) -> bool {
        self.unsaved_edits
    }

    /// When the first unsaved edit happened
    pub fn edit_time(&self) -> Option<SystemTime> {
        self.edit_time
    }

    /// Counter bumped by every semantic edit
    pub fn edit_generation(&self) -> u64 {
        self.edit_generation
    }

    /// Current unsaved-edit state
    pub fn edit_state(&self) -> EditState {
        if self.unsaved_edits {
            EditState::Changed
        } else if self.saved_generation.is_some() {
            EditState::Saved
        } else {
            EditState::Clean
        }
    }

    /// Acknowledge that the state at `generation` reached disk.
    ///
    /// Clears the unsaved flag only if nothing was edited after that
    /// snapshot was taken. Returns whether the flag was cleared.
    pub fn acknowledge_save(&mut self, generation: u64) -> bool {
        if generation != self.edit_generation {
            tracing::debug!(
                script = %self.id,
                saved = generation,
                current = self.edit_generation,
                "save acknowledged for an older generation"
            );
            return false;
        }
        self.unsaved_edits = false;
        self.edit_time = None;
        self.saved_generation = Some(generation);
        true
    }

    fn mark_edited(&mut self) {
        self.edit_generation += 1;
        self.actions_changed = true;
        if !self.unsaved_edits {
            self.unsaved_edits = true;
            self.edit_time = Some(SystemTime::now());
        }
    }

    /// Immutable copy for persistence
    pub fn snapshot(&self) -> ScriptSnapshot {
        let mut metadata = self.local_metadata.clone();
        metadata.title = self.title.clone();
        ScriptSnapshot {
            id: self.id,
            title: self.title.clone(),
            relative_path: self.relative_path.clone(),
            enabled: self.enabled,
            metadata,
            actions: self.data.actions.clone(),
            generation: self.edit_generation,
        }
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    fn edit<R>(&mut self, kind: EditKind, apply: impl FnOnce(&mut ScriptData) -> Option<R>) -> Option<R> {
        let before = self.data.clone();

        let Some(result) = apply(&mut self.data) else {
            self.data = before;
            tracing::debug!(script = %self.id, edit = kind.label(), "edit rejected");
            return None;
        };

        let ScriptData { actions, selection } = &mut self.data;
        selection.prune(actions);

        if let Err(err) = self.journal.commit(kind.label(), &before) {
            tracing::warn!(script = %self.id, edit = kind.label(), "failed to journal edit: {err}");
        }

        self.mark_edited();
        if self.data.selection != before.selection {
            self.notify(ScriptEvent::SelectionChanged(self.id));
        }
        Some(result)
    }

    fn select(&mut self, apply: impl FnOnce(&mut Selection, &ActionSet)) -> bool {
        let before = self.data.selection.clone();
        let ScriptData { actions, selection } = &mut self.data;
        apply(selection, actions);

        let changed = self.data.selection != before;
        if changed {
            self.notify(ScriptEvent::SelectionChanged(self.id));
        }
        changed
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    /// Insert one action. Fails on a duplicate time or a full script.
    pub fn add_action(&mut self, action: Action) -> bool {
        self.edit(EditKind::AddAction, |d| d.actions.insert(action).then_some(()))
            .is_some()
    }

    /// Insert a batch, skipping duplicates. Returns how many were inserted.
    pub fn add_actions(&mut self, batch: &[Action]) -> usize {
        self.edit(EditKind::AddActions, |d| {
            let inserted = batch.iter().filter(|&&a| d.actions.insert(a)).count();
            (inserted > 0).then_some(inserted)
        })
        .unwrap_or(0)
    }

    /// Replace the action nearest to `action.at()` within `tolerance` ms,
    /// or insert `action` if there is none.
    pub fn add_edit_action(&mut self, action: Action, tolerance: f64) -> bool {
        self.edit(EditKind::AddEditAction, |d| {
            match d.actions.nearest_within(action.at(), tolerance).copied() {
                Some(existing) if existing == action => None,
                Some(existing) => {
                    if !d.actions.replace(&existing, action) {
                        return None;
                    }
                    if d.selection.contains(&existing) {
                        d.selection.replace(&existing, action);
                    }
                    Some(())
                }
                None => d.actions.insert(action).then_some(()),
            }
        })
        .is_some()
    }

    /// [`Script::add_edit_action`] with the configured tolerance
    pub fn add_edit_action_default(&mut self, action: Action) -> bool {
        let tolerance = self.config.nearest_tolerance_ms;
        self.add_edit_action(action, tolerance)
    }

    /// Replace `old` with `new`; a selected action stays selected
    pub fn edit_action(&mut self, old: Action, new: Action) -> bool {
        if old == new {
            return false;
        }
        self.edit(EditKind::EditAction, |d| {
            if !d.actions.replace(&old, new) {
                return None;
            }
            if d.selection.contains(&old) {
                d.selection.replace(&old, new);
            }
            Some(())
        })
        .is_some()
    }

    /// Remove one action
    pub fn remove_action(&mut self, action: &Action) -> bool {
        self.edit(EditKind::RemoveAction, |d| d.actions.remove(action).then_some(()))
            .is_some()
    }

    /// Remove a batch. Returns how many were removed.
    pub fn remove_actions(&mut self, batch: &[Action]) -> usize {
        self.edit(EditKind::RemoveActions, |d| {
            let removed = batch.iter().filter(|a| d.actions.remove(a)).count();
            (removed > 0).then_some(removed)
        })
        .unwrap_or(0)
    }

    /// Remove every action with time in `[from, to]`
    pub fn remove_actions_in_interval(&mut self, from: f64, to: f64) -> usize {
        self.edit(EditKind::RemoveInterval, |d| {
            let removed = d.actions.remove_range(from, to).len();
            (removed > 0).then_some(removed)
        })
        .unwrap_or(0)
    }

    /// Remove every selected action
    pub fn remove_selected_actions(&mut self) -> usize {
        self.edit(EditKind::RemoveSelected, |d| {
            let ScriptData { actions, selection } = d;
            let removed = actions.remove_where(|a| selection.contains(a)).len();
            selection.clear();
            (removed > 0).then_some(removed)
        })
        .unwrap_or(0)
    }

    /// Override all actions. Returns how many inputs were rejected.
    pub fn set_actions(&mut self, actions: impl IntoIterator<Item = Action>) -> usize {
        let limit = self.data.actions.limit();
        let (set, rejected) = ActionSet::from_actions(actions, limit);
        self.edit(EditKind::SetActions, |d| {
            d.actions = set;
            Some(rejected)
        })
        .unwrap_or(rejected)
    }

    /// Shift every action by `offset` ms, clamped so nothing goes below zero
    pub fn move_all_actions_time(&mut self, offset: f64) -> bool {
        self.edit(EditKind::MoveAllTime, |d| {
            let first = d.actions.first()?;
            let offset = offset.max(-first.at());
            if offset == 0.0 || !offset.is_finite() {
                return None;
            }

            let shift = |a: &Action| a.with_time(a.at() + offset);
            let (actions, rejected) =
                ActionSet::from_actions(d.actions.iter().map(shift), d.actions.limit());
            if rejected > 0 {
                return None;
            }
            let selected: Vec<Action> = d.selection.iter().map(shift).collect();
            d.actions = actions;
            d.selection.set(&d.actions, &selected);
            Some(())
        })
        .is_some()
    }

    /// Shift the selection by `offset` ms, rounded to a multiple of `quantum`.
    ///
    /// The offset is clamped so no selected action goes below zero. Selected
    /// actions whose target time is taken by an action that does not move
    /// stay where they are; the check repeats until stable because a stayer
    /// can block another mover in turn.
    pub fn move_selection_time(&mut self, offset: f64, quantum: f64) -> bool {
        self.edit(EditKind::MoveSelectionTime, |d| {
            let first = d.selection.first()?;
            let mut offset = if quantum > 0.0 && quantum.is_finite() {
                (offset / quantum).round() * quantum
            } else {
                offset
            };
            offset = offset.max(-first.at());
            if offset == 0.0 || !offset.is_finite() {
                return None;
            }

            let selected = d.selection.as_slice();
            let mut stayers = ActionSet::with_limit(selected.len());
            loop {
                let mut blocked_any = false;
                for action in selected {
                    if stayers.contains(action) {
                        continue;
                    }
                    let target = action.at() + offset;
                    let blocked = d.actions.find(target).is_some_and(|hit| !d.selection.contains(hit))
                        || stayers.find(target).is_some();
                    if blocked {
                        stayers.insert(*action);
                        blocked_any = true;
                    }
                }
                if !blocked_any {
                    break;
                }
            }
            if stayers.len() == selected.len() {
                return None;
            }

            let replacement: Vec<Action> = selected
                .iter()
                .map(|a| {
                    if stayers.contains(a) {
                        *a
                    } else {
                        a.with_time(a.at() + offset)
                    }
                })
                .collect();
            d.replace_selected(&replacement)
        })
        .is_some()
    }

    /// Shift every selected position by `offset`, each clamped to `0..=100`
    pub fn move_selection_position(&mut self, offset: i32) -> bool {
        self.edit(EditKind::MoveSelectionPosition, |d| {
            let replacement: Vec<Action> = d
                .selection
                .iter()
                .map(|a| a.offset_position(offset))
                .collect();
            if replacement.as_slice() == d.selection.as_slice() {
                return None;
            }
            d.replace_selected(&replacement)
        })
        .is_some()
    }

    /// Equalize the selection. Rejected if fewer than three actions are
    /// selected, nothing would change, or a new time hits an unselected action.
    pub fn equalize_selection(&mut self, mode: EqualizeMode) -> bool {
        self.edit(EditKind::EqualizeSelection, |d| {
            let replacement = d.selection.equalized(mode)?;
            if replacement.as_slice() == d.selection.as_slice() {
                return None;
            }
            d.replace_selected(&replacement)
        })
        .is_some()
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    /// Restore the state before the last edit
    pub fn undo(&mut self) -> bool {
        let result = self.journal.undo(&self.data);
        self.rollback(result)
    }

    /// Re-apply the last undone edit
    pub fn redo(&mut self) -> bool {
        let result = self.journal.redo(&self.data);
        self.rollback(result)
    }

    fn rollback(&mut self, restored: Result<ScriptData, HistoryError>) -> bool {
        match restored {
            Ok(data) => {
                let selection_changed = data.selection != self.data.selection;
                self.data = data;
                self.mark_edited();
                if selection_changed {
                    self.notify(ScriptEvent::SelectionChanged(self.id));
                }
                tracing::debug!(script = %self.id, undo_depth = self.journal.undo_depth(), "restored snapshot");
                true
            }
            Err(HistoryError::NothingToUndo | HistoryError::NothingToRedo) => false,
            Err(err) => {
                tracing::warn!(script = %self.id, "failed to restore snapshot: {err}");
                false
            }
        }
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.journal.can_undo()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.journal.can_redo()
    }

    /// Label of the next undo step
    pub fn undo_description(&self) -> Option<&str> {
        self.journal.undo_description()
    }

    /// Label of the next redo step
    pub fn redo_description(&self) -> Option<&str> {
        self.journal.redo_description()
    }

    /// Journal statistics
    pub fn history_stats(&self) -> HistoryStats {
        self.journal.stats()
    }

    /// Drop all history
    pub fn clear_history(&mut self) {
        self.journal.clear();
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// All actions
    pub fn actions(&self) -> &ActionSet {
        &self.data.actions
    }

    /// Action nearest to `time` within `max_error` ms
    pub fn action_at_time(&self, time: f64, max_error: f64) -> Option<&Action> {
        self.data.actions.nearest_within(time, max_error)
    }

    /// Action nearest to `time`
    pub fn closest_action(&self, time: f64) -> Option<&Action> {
        self.data.actions.closest(time)
    }

    /// First action strictly after `time`
    pub fn next_action(&self, time: f64) -> Option<&Action> {
        self.data.actions.next_after(time)
    }

    /// Last action strictly before `time`
    pub fn previous_action(&self, time: f64) -> Option<&Action> {
        self.data.actions.previous_before(time)
    }

    /// Monotonic run of actions ending at the last action at or before `time`.
    ///
    /// Empty if fewer than two actions precede `time`.
    pub fn last_stroke(&self, time: f64) -> Vec<Action> {
        let actions = self.data.actions.as_slice();
        let end = self.data.actions.upper_bound(time);
        if end < 2 {
            return Vec::new();
        }

        let last = end - 1;
        let direction = Direction::between(&actions[last - 1], &actions[last]);
        let mut start = last - 1;
        while start > 0 && Direction::between(&actions[start - 1], &actions[start]) == direction {
            start -= 1;
        }
        actions[start..=last].to_vec()
    }

    /// Position at `time` using `mode`
    pub fn position_at(&mut self, time: f64, mode: InterpolationMode) -> Option<f32> {
        match mode {
            InterpolationMode::Linear => sample_linear(&self.data.actions, time),
            InterpolationMode::Spline => self.spline.sample(&self.data.actions, time),
        }
    }

    /// Position at `time` using the configured interpolation
    pub fn sample(&mut self, time: f64) -> Option<f32> {
        self.position_at(time, self.config.interpolation)
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Current selection
    pub fn selection(&self) -> &Selection {
        &self.data.selection
    }

    /// Whether `action` is selected
    pub fn is_selected(&self, action: &Action) -> bool {
        self.data.selection.contains(action)
    }

    /// Whether anything is selected
    pub fn has_selection(&self) -> bool {
        !self.data.selection.is_empty()
    }

    /// Number of selected actions
    pub fn selection_size(&self) -> usize {
        self.data.selection.len()
    }

    /// Actions in `[from, to]` without touching the selection
    pub fn get_selection(&self, from: f64, to: f64) -> Vec<Action> {
        self.data.actions.range(from, to).to_vec()
    }

    /// Selected action closest to `time`
    pub fn closest_selected(&self, time: f64) -> Option<&Action> {
        self.data.selection.closest(time)
    }

    /// Select one action
    pub fn select_action(&mut self, action: Action) -> bool {
        self.select(|s, owner| {
            s.set_selected(owner, action, true);
        })
    }

    /// Deselect one action
    pub fn deselect_action(&mut self, action: Action) -> bool {
        self.select(|s, owner| {
            s.set_selected(owner, action, false);
        })
    }

    /// Set one action's selection state
    pub fn set_selected(&mut self, action: Action, selected: bool) -> bool {
        self.select(|s, owner| {
            s.set_selected(owner, action, selected);
        })
    }

    /// Flip one action's selection state
    pub fn toggle_selection(&mut self, action: Action) -> bool {
        self.select(|s, owner| {
            s.toggle(owner, action);
        })
    }

    /// Select everything
    pub fn select_all(&mut self) -> bool {
        self.select(|s, owner| s.select_all(owner))
    }

    /// Deselect everything
    pub fn clear_selection(&mut self) -> bool {
        self.select(|s, _| {
            s.clear();
        })
    }

    /// Select actions with time in `[from, to]`
    pub fn select_range(&mut self, from: f64, to: f64, clear_first: bool) -> bool {
        self.select(|s, owner| s.select_range(owner, from, to, clear_first))
    }

    /// Replace the selection
    pub fn set_selection(&mut self, actions: &[Action]) -> bool {
        self.select(|s, owner| s.set(owner, actions))
    }

    /// Narrow to the highest positions
    pub fn select_top_actions(&mut self) -> bool {
        let matching = self.config.position_match();
        self.select(|s, owner| {
            s.select_top(owner, matching);
        })
    }

    /// Narrow to the lowest positions
    pub fn select_bottom_actions(&mut self) -> bool {
        let matching = self.config.position_match();
        self.select(|s, owner| {
            s.select_bottom(owner, matching);
        })
    }

    /// Narrow to positions between the extremes
    pub fn select_mid_actions(&mut self) -> bool {
        let matching = self.config.position_match();
        self.select(|s, owner| {
            s.select_mid(owner, matching);
        })
    }

    /// Invert the selection
    pub fn invert_selection(&mut self) -> bool {
        self.select(|s, owner| s.invert(owner))
    }

    /// Grow the selection by `count` neighbours on each side
    pub fn extend_selection(&mut self, count: usize) -> bool {
        self.select(|s, owner| {
            s.extend(owner, count);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::mpsc;

    fn script(points: &[(f64, u8)]) -> Script {
        Script::with_actions(
            &TimelineConfig::default(),
            points.iter().map(|&(t, p)| Action::new(t, p)),
        )
        .0
    }

    fn times(script: &Script) -> Vec<f64> {
        script.actions().iter().map(|a| a.at()).collect()
    }

    #[test]
    fn test_example_scenario() {
        let mut script = script(&[(1000.0, 0), (2000.0, 100), (3000.0, 0)]);
        assert_eq!(script.action_at_time(2100.0, 200.0), Some(&Action::new(2000.0, 100)));
        assert_eq!(script.position_at(2500.0, InterpolationMode::Linear), Some(50.0));

        assert!(!script.add_action(Action::new(2000.0, 50)));
        assert_eq!(script.actions().find(2000.0), Some(&Action::new(2000.0, 100)));
        assert_eq!(script.edit_state(), EditState::Clean);

        assert!(script.select_action(Action::new(2000.0, 100)));
        assert_eq!(script.remove_actions_in_interval(1500.0, 2500.0), 1);
        assert_eq!(times(&script), vec![1000.0, 3000.0]);
        assert!(!script.has_selection());
    }

    #[test]
    fn test_rejected_edit_is_not_journaled() {
        let mut script = script(&[(0.0, 10)]);
        assert!(!script.remove_action(&Action::new(5.0, 10)));
        assert!(!script.can_undo());
        assert!(!script.has_unsaved_edits());
        assert_eq!(script.edit_generation(), 0);
    }

    #[test]
    fn test_undo_restores_selection() {
        let mut script = script(&[(0.0, 0), (100.0, 100)]);
        script.select_all();
        assert_eq!(script.remove_selected_actions(), 2);
        assert!(script.actions().is_empty());

        assert!(script.undo());
        assert_eq!(script.actions().len(), 2);
        assert_eq!(script.selection_size(), 2);

        assert!(script.redo());
        assert!(script.actions().is_empty());
        assert!(!script.redo());
    }

    #[test]
    fn test_dirty_tracking_and_save_ack() {
        let mut script = Script::new();
        assert_eq!(script.edit_state(), EditState::Clean);

        script.add_action(Action::new(0.0, 0));
        assert_eq!(script.edit_state(), EditState::Changed);
        let first_edit = script.edit_time();
        assert!(first_edit.is_some());

        script.add_action(Action::new(10.0, 0));
        assert_eq!(script.edit_time(), first_edit);

        let saved = script.snapshot();
        script.add_action(Action::new(20.0, 0));
        assert!(!script.acknowledge_save(saved.generation));
        assert!(script.has_unsaved_edits());

        let saved = script.snapshot();
        assert!(script.acknowledge_save(saved.generation));
        assert_eq!(script.edit_state(), EditState::Saved);
        assert!(script.edit_time().is_none());
    }

    #[test]
    fn test_actions_changed_coalesced_per_tick() {
        let (tx, rx) = mpsc::channel();
        let mut script = Script::new();
        script.set_notifier(tx);

        script.add_action(Action::new(0.0, 0));
        script.add_action(Action::new(10.0, 50));
        script.add_action(Action::new(20.0, 100));
        assert!(script.actions_changed_this_tick());
        assert!(script.update());
        assert!(!script.update());

        let events: Vec<ScriptEvent> = rx.try_iter().collect();
        assert_eq!(events, vec![ScriptEvent::ActionsChanged(script.id())]);
    }

    #[test]
    fn test_update_relative_path_sets_title() {
        let (tx, rx) = mpsc::channel();
        let mut script = Script::new();
        script.set_title("old");
        script.set_notifier(tx);

        script.update_relative_path(Path::new("scripts/scene.roll.funscript"));
        assert_eq!(script.title(), "scene.roll");
        assert_eq!(script.relative_path(), "scripts/scene.roll.funscript");
        assert_eq!(
            rx.try_recv().unwrap(),
            ScriptEvent::MetadataChanged {
                script: script.id(),
                old_title: "old".into()
            }
        );
    }

    #[test]
    fn test_update_relative_path_same_stem_is_silent() {
        let (tx, rx) = mpsc::channel();
        let mut script = Script::new();
        script.update_relative_path(Path::new("scene.funscript"));
        script.set_notifier(tx);

        script.update_relative_path(Path::new("other/scene.funscript"));
        script.set_relative_path(Path::new("/abs/scene.funscript"));
        assert_eq!(script.relative_path(), "/abs/scene.funscript");
        assert_eq!(script.title(), "scene");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_selection_changed_on_pruning_edit() {
        let (tx, rx) = mpsc::channel();
        let mut script = script(&[(0.0, 0), (100.0, 50), (200.0, 100)]);
        script.select_action(Action::new(100.0, 50));
        script.set_notifier(tx);

        assert_eq!(script.remove_actions_in_interval(50.0, 150.0), 1);
        assert!(!script.has_selection());
        script.update();

        let events: Vec<ScriptEvent> = rx.try_iter().collect();
        let selection_events = events
            .iter()
            .filter(|e| matches!(e, ScriptEvent::SelectionChanged(_)))
            .count();
        assert_eq!(selection_events, 1);
        assert!(events.contains(&ScriptEvent::ActionsChanged(script.id())));
    }

    #[test]
    fn test_selection_changed_on_select_only() {
        let (tx, rx) = mpsc::channel();
        let mut script = script(&[(0.0, 0), (100.0, 50)]);
        script.set_notifier(tx);

        assert!(script.select_all());
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![ScriptEvent::SelectionChanged(script.id())]
        );
        assert!(!script.has_unsaved_edits());
    }

    #[test]
    fn test_noop_selection_is_silent() {
        let (tx, rx) = mpsc::channel();
        let mut script = script(&[(0.0, 0), (100.0, 50)]);
        script.set_notifier(tx);

        assert!(!script.clear_selection());
        script.update();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_extreme_offsets_do_not_panic() {
        let mut script = script(&[(0.0, 20), (10.0, 60), (20.0, 80)]);
        script.select_all();
        assert!(script.move_selection_position(i32::MAX));
        assert!(script.actions().iter().all(|a| a.pos() == 100));
        assert!(script.move_selection_position(i32::MIN));
        assert!(script.actions().iter().all(|a| a.pos() == 0));

        script.clear_selection();
        script.select_action(Action::new(10.0, 0));
        assert!(script.extend_selection(usize::MAX));
        assert_eq!(script.selection_size(), 3);
    }

    #[test]
    fn test_add_edit_action() {
        let mut script = script(&[(1000.0, 10)]);
        assert!(script.add_edit_action(Action::new(1010.0, 90), 16.0));
        assert_eq!(times(&script), vec![1010.0]);
        assert_eq!(script.actions().first().unwrap().pos(), 90);

        assert!(script.add_edit_action(Action::new(2000.0, 50), 16.0));
        assert_eq!(script.actions().len(), 2);
        assert!(!script.add_edit_action(Action::new(2000.0, 50), 16.0));
    }

    #[test]
    fn test_edit_action_keeps_selection() {
        let mut script = script(&[(0.0, 0), (100.0, 50)]);
        script.select_action(Action::new(100.0, 50));
        assert!(script.edit_action(Action::new(100.0, 50), Action::new(150.0, 60)));
        assert!(script.is_selected(&Action::new(150.0, 60)));
        assert!(!script.edit_action(Action::new(150.0, 60), Action::new(0.0, 60)));
    }

    #[test]
    fn test_move_selection_time_rounds_to_quantum() {
        let mut script = script(&[(0.0, 0), (100.0, 100), (200.0, 0), (300.0, 100)]);
        script.select_range(100.0, 200.0, true);
        assert!(script.move_selection_time(-40.0, 50.0));
        assert_eq!(times(&script), vec![0.0, 50.0, 150.0, 300.0]);
        assert_eq!(
            script.selection().as_slice(),
            &[Action::new(50.0, 100), Action::new(150.0, 0)]
        );
    }

    #[test]
    fn test_move_selection_time_blocked_chain() {
        let mut script = script(&[(0.0, 0), (100.0, 100), (200.0, 0), (300.0, 100)]);
        script.select_range(100.0, 200.0, true);
        // 200 -> 300 hits an unselected action, which then blocks 100 -> 200
        assert!(!script.move_selection_time(95.0, 50.0));
        assert_eq!(times(&script), vec![0.0, 100.0, 200.0, 300.0]);
        assert!(!script.can_undo());
    }

    #[test]
    fn test_move_selection_time_partial_skip() {
        let mut script = script(&[(0.0, 0), (100.0, 100), (150.0, 0), (200.0, 50)]);
        script.set_selection(&[Action::new(0.0, 0), Action::new(100.0, 100)]);
        assert!(script.move_selection_time(50.0, 0.0));
        assert_eq!(times(&script), vec![50.0, 100.0, 150.0, 200.0]);
        assert!(script.is_selected(&Action::new(100.0, 100)));
        assert!(script.is_selected(&Action::new(50.0, 0)));
    }

    #[test]
    fn test_move_selection_time_clamps_at_zero() {
        let mut script = script(&[(100.0, 10), (300.0, 20)]);
        script.select_action(Action::new(100.0, 10));
        assert!(script.move_selection_time(-500.0, 0.0));
        assert_eq!(times(&script), vec![0.0, 300.0]);
    }

    #[test]
    fn test_move_selection_position_clamps() {
        let mut script = script(&[(0.0, 95), (100.0, 50)]);
        script.select_all();
        assert!(script.move_selection_position(10));
        let positions: Vec<u8> = script.actions().iter().map(|a| a.pos()).collect();
        assert_eq!(positions, vec![100, 60]);
        assert_eq!(script.selection_size(), 2);
    }

    #[test]
    fn test_move_all_actions_time() {
        let mut script = script(&[(100.0, 0), (200.0, 100)]);
        script.select_action(Action::new(200.0, 100));
        assert!(script.move_all_actions_time(-250.0));
        assert_eq!(times(&script), vec![0.0, 100.0]);
        assert!(script.is_selected(&Action::new(100.0, 100)));
        assert!(!script.move_all_actions_time(-10.0));
    }

    #[test]
    fn test_equalize_selection() {
        let mut script = script(&[(0.0, 0), (10.0, 50), (90.0, 20), (300.0, 100)]);
        script.select_all();
        assert!(script.equalize_selection(EqualizeMode::Spacing));
        assert_eq!(times(&script), vec![0.0, 100.0, 200.0, 300.0]);
    }

    #[test]
    fn test_equalize_rejected_on_collision() {
        let mut script = script(&[(0.0, 0), (10.0, 50), (150.0, 70), (300.0, 100)]);
        script.set_selection(&[Action::new(0.0, 0), Action::new(10.0, 50), Action::new(300.0, 100)]);
        assert!(!script.equalize_selection(EqualizeMode::Spacing));
        assert_eq!(times(&script), vec![0.0, 10.0, 150.0, 300.0]);
    }

    #[test]
    fn test_last_stroke() {
        let script = script(&[(0.0, 0), (100.0, 100), (200.0, 60), (300.0, 20), (400.0, 90)]);
        assert_eq!(
            script.last_stroke(350.0),
            vec![Action::new(100.0, 100), Action::new(200.0, 60), Action::new(300.0, 20)]
        );
        assert_eq!(script.last_stroke(50.0), Vec::<Action>::new());
    }

    #[test]
    fn test_select_extremes_use_config_tolerance() {
        let config = TimelineConfig {
            extreme_position_tolerance: 5,
            ..TimelineConfig::default()
        };
        let (mut script, _) = Script::with_actions(
            &config,
            [Action::new(0.0, 96), Action::new(10.0, 50), Action::new(20.0, 100)],
        );
        assert!(script.select_top_actions());
        assert_eq!(script.selection_size(), 2);
    }

    #[test]
    fn test_capacity_limit() {
        let config = TimelineConfig {
            action_limit: 2,
            ..TimelineConfig::default()
        };
        let mut script = Script::with_config(&config);
        assert!(script.add_action(Action::new(0.0, 0)));
        assert!(script.add_action(Action::new(1.0, 0)));
        assert!(!script.add_action(Action::new(2.0, 0)));
        assert_eq!(script.actions().len(), 2);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u16, u8),
        Remove(u16),
        Interval(u16, u16),
        Select(u16, u16),
        MoveTime(i16),
        MovePos(i8),
        RemoveSelected,
        Undo,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u16..500, 0u8..=100).prop_map(|(t, p)| Op::Add(t, p)),
            (0u16..500).prop_map(Op::Remove),
            (0u16..500, 0u16..100).prop_map(|(a, w)| Op::Interval(a, a + w)),
            (0u16..500, 0u16..200).prop_map(|(a, w)| Op::Select(a, a + w)),
            (-100i16..100).prop_map(Op::MoveTime),
            (-30i8..30).prop_map(Op::MovePos),
            Just(Op::RemoveSelected),
            Just(Op::Undo),
        ]
    }

    fn apply(script: &mut Script, op: &Op) -> bool {
        match *op {
            Op::Add(t, p) => script.add_action(Action::new(f64::from(t), p)),
            Op::Remove(t) => {
                let found = script.actions().find(f64::from(t)).copied();
                match found {
                    Some(action) => script.remove_action(&action),
                    None => false,
                }
            }
            Op::Interval(a, b) => script.remove_actions_in_interval(f64::from(a), f64::from(b)) > 0,
            Op::Select(a, b) => {
                script.select_range(f64::from(a), f64::from(b), true);
                false
            }
            Op::MoveTime(dt) => script.move_selection_time(f64::from(dt), 10.0),
            Op::MovePos(dp) => script.move_selection_position(i32::from(dp)),
            Op::RemoveSelected => script.remove_selected_actions() > 0,
            Op::Undo => {
                script.undo();
                false
            }
        }
    }

    proptest! {
        #[test]
        fn selection_stays_consistent(ops in proptest::collection::vec(op(), 0..60)) {
            let mut script = Script::new();
            for op in &ops {
                apply(&mut script, op);
                prop_assert!(script.actions().is_strictly_sorted());
                for selected in script.selection().iter() {
                    prop_assert!(script.actions().contains(selected));
                }
            }
        }

        #[test]
        fn undo_redo_closure(ops in proptest::collection::vec(op(), 0..40)) {
            let mut script = Script::new();
            let mut committed = 0usize;
            for op in ops.iter().filter(|op| !matches!(op, Op::Undo)) {
                if apply(&mut script, op) {
                    committed += 1;
                }
            }
            let final_actions = script.actions().clone();

            for _ in 0..committed {
                prop_assert!(script.undo());
            }
            prop_assert!(!script.can_undo());
            for _ in 0..committed {
                prop_assert!(script.redo());
            }
            prop_assert_eq!(script.actions(), &final_actions);
        }
    }
}
