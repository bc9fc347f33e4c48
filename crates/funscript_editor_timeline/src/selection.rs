// SPDX-License-Identifier: MIT OR Apache-2.0
//! Selected subset of a script's actions.
//!
//! A [`Selection`] does not know its owner. Every operation that needs the
//! full action list takes the owning [`ActionSet`] as a parameter, and only
//! actions present in that set are ever selected.

use crate::action::{Action, MAX_POSITION};
use crate::action_set::{ActionSet, DEFAULT_ACTION_LIMIT};
use serde::{Deserialize, Serialize};

/// How positions are compared for top/bottom/mid selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionMatch {
    /// Allowed distance from the extreme position; `0` means exact match
    pub tolerance: u8,
}

impl PositionMatch {
    /// Exact position comparison
    pub const EXACT: Self = Self { tolerance: 0 };

    /// Comparison with a tolerance band
    pub fn within(tolerance: u8) -> Self {
        Self {
            tolerance: tolerance.min(MAX_POSITION),
        }
    }
}

/// What [`Selection::equalized`] redistributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EqualizeMode {
    /// Uniform time spacing between the first and last selected action
    #[default]
    Spacing,
    /// Positions on the straight line between the first and last selected action
    Position,
}

/// Ordered set of selected actions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    actions: ActionSet,
}

impl Selection {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_ACTION_LIMIT)
    }

    /// Create an empty selection sized for an owner with `limit` actions
    pub fn with_limit(limit: usize) -> Self {
        Self {
            actions: ActionSet::with_limit(limit),
        }
    }

    fn rebuild(&mut self, actions: impl IntoIterator<Item = Action>) {
        self.actions = ActionSet::from_actions(actions, self.actions.limit()).0;
    }

    /// Number of selected actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterate selected actions in time order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Action> + ExactSizeIterator {
        self.actions.iter()
    }

    /// Selected actions as a sorted slice
    pub fn as_slice(&self) -> &[Action] {
        self.actions.as_slice()
    }

    /// Selected actions as an action set
    pub fn as_set(&self) -> &ActionSet {
        &self.actions
    }

    /// Earliest selected action
    pub fn first(&self) -> Option<&Action> {
        self.actions.first()
    }

    /// Latest selected action
    pub fn last(&self) -> Option<&Action> {
        self.actions.last()
    }

    /// Whether `action` is selected
    pub fn contains(&self, action: &Action) -> bool {
        self.actions.contains(action)
    }

    /// Selected action closest to `time`
    pub fn closest(&self, time: f64) -> Option<&Action> {
        self.actions.closest(time)
    }

    /// Selected actions with time in `[from, to]`
    pub fn range(&self, from: f64, to: f64) -> &[Action] {
        self.actions.range(from, to)
    }

    /// Deselect everything. Returns whether anything changed.
    pub fn clear(&mut self) -> bool {
        let changed = !self.actions.is_empty();
        self.actions.clear();
        changed
    }

    /// Select or deselect a single action. Returns whether anything changed.
    pub fn set_selected(&mut self, owner: &ActionSet, action: Action, selected: bool) -> bool {
        if selected {
            owner.contains(&action) && self.actions.insert(action)
        } else {
            self.actions.remove(&action)
        }
    }

    /// Flip an action's selection state. Returns whether it is now selected.
    pub fn toggle(&mut self, owner: &ActionSet, action: Action) -> bool {
        if self.actions.remove(&action) {
            false
        } else {
            owner.contains(&action) && self.actions.insert(action)
        }
    }

    /// Select every action of the owner
    pub fn select_all(&mut self, owner: &ActionSet) {
        self.rebuild(owner.iter().copied());
    }

    /// Select the owner's actions with time in `[from, to]`
    pub fn select_range(&mut self, owner: &ActionSet, from: f64, to: f64, clear_first: bool) {
        let mut selected: Vec<Action> = if clear_first {
            Vec::new()
        } else {
            self.actions.iter().copied().collect()
        };
        selected.extend_from_slice(owner.range(from, to));
        self.rebuild(selected);
    }

    /// Replace the selection with the subset of `actions` present in the owner
    pub fn set(&mut self, owner: &ActionSet, actions: &[Action]) {
        self.rebuild(actions.iter().copied().filter(|a| owner.contains(a)));
    }

    /// Narrow to the actions at the highest position.
    ///
    /// Works on the current selection, or on all actions when nothing is
    /// selected.
    pub fn select_top(&mut self, owner: &ActionSet, matching: PositionMatch) -> bool {
        let tolerance = i32::from(matching.tolerance);
        self.narrow_by_position(owner, |_, max, pos| pos >= max - tolerance)
    }

    /// Narrow to the actions at the lowest position
    pub fn select_bottom(&mut self, owner: &ActionSet, matching: PositionMatch) -> bool {
        let tolerance = i32::from(matching.tolerance);
        self.narrow_by_position(owner, |min, _, pos| pos <= min + tolerance)
    }

    /// Narrow to the actions that are neither top nor bottom actions under
    /// the same [`PositionMatch`]
    pub fn select_mid(&mut self, owner: &ActionSet, matching: PositionMatch) -> bool {
        let tolerance = i32::from(matching.tolerance);
        self.narrow_by_position(owner, |min, max, pos| {
            pos > min + tolerance && pos < max - tolerance
        })
    }

    fn narrow_by_position(
        &mut self,
        owner: &ActionSet,
        predicate: impl Fn(i32, i32, i32) -> bool,
    ) -> bool {
        let scope: &[Action] = if self.actions.is_empty() {
            owner.as_slice()
        } else {
            self.actions.as_slice()
        };

        let Some(min) = scope.iter().map(|a| i32::from(a.pos())).min() else {
            return false;
        };
        let max = scope.iter().map(|a| i32::from(a.pos())).max().unwrap_or(min);

        let chosen: Vec<Action> = scope
            .iter()
            .copied()
            .filter(|a| predicate(min, max, i32::from(a.pos())))
            .collect();

        let changed = chosen.as_slice() != self.actions.as_slice();
        self.rebuild(chosen);
        changed
    }

    /// Select exactly the owner's actions that are currently not selected
    pub fn invert(&mut self, owner: &ActionSet) {
        let inverted: Vec<Action> = owner
            .iter()
            .copied()
            .filter(|a| !self.actions.contains(a))
            .collect();
        self.rebuild(inverted);
    }

    /// Grow the selection by `count` neighbouring actions on each side
    pub fn extend(&mut self, owner: &ActionSet, count: usize) -> bool {
        if count == 0 {
            return false;
        }
        let (Some(first), Some(last)) = (self.first().copied(), self.last().copied()) else {
            return false;
        };

        let first_idx = owner.lower_bound(first.at());
        let last_idx = owner.upper_bound(last.at());

        let mut grown: Vec<Action> = self.actions.iter().copied().collect();
        grown.extend_from_slice(&owner.as_slice()[first_idx.saturating_sub(count)..first_idx]);
        let end = last_idx.saturating_add(count).min(owner.len());
        grown.extend_from_slice(&owner.as_slice()[last_idx.min(end)..end]);

        let before = self.len();
        self.rebuild(grown);
        self.len() != before
    }

    /// Drop every selected action the owner no longer contains.
    /// Returns the number of pruned entries.
    pub fn prune(&mut self, owner: &ActionSet) -> usize {
        self.actions.remove_where(|a| !owner.contains(a)).len()
    }

    /// Swap a selected action for its edited replacement
    pub(crate) fn replace(&mut self, old: &Action, new: Action) -> bool {
        self.actions.replace(old, new)
    }

    /// Compute the equalized version of the selection.
    ///
    /// Returns the new actions in selection order, or `None` when fewer than
    /// three actions are selected.
    pub fn equalized(&self, mode: EqualizeMode) -> Option<Vec<Action>> {
        if self.len() < 3 {
            return None;
        }
        let first = *self.first()?;
        let last = *self.last()?;
        let span = last.at() - first.at();
        let steps = (self.len() - 1) as f64;

        let result = self
            .actions
            .iter()
            .enumerate()
            .map(|(i, action)| match mode {
                EqualizeMode::Spacing => action.with_time(first.at() + span * (i as f64 / steps)),
                EqualizeMode::Position => {
                    let t = (action.at() - first.at()) / span;
                    let from = f64::from(first.pos());
                    let to = f64::from(last.pos());
                    action.with_position((from + (to - from) * t).round() as u8)
                }
            })
            .collect();

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(points: &[(f64, u8)]) -> ActionSet {
        ActionSet::from_actions(
            points.iter().map(|&(t, p)| Action::new(t, p)),
            DEFAULT_ACTION_LIMIT,
        )
        .0
    }

    fn wave() -> ActionSet {
        owner(&[
            (0.0, 0),
            (100.0, 100),
            (200.0, 50),
            (300.0, 100),
            (400.0, 0),
            (500.0, 98),
        ])
    }

    #[test]
    fn test_only_owned_actions_selectable() {
        let set = wave();
        let mut selection = Selection::new();
        assert!(!selection.set_selected(&set, Action::new(100.0, 99), true));
        assert!(selection.set_selected(&set, Action::new(100.0, 100), true));
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_toggle() {
        let set = wave();
        let mut selection = Selection::new();
        let action = Action::new(200.0, 50);
        assert!(selection.toggle(&set, action));
        assert!(selection.contains(&action));
        assert!(!selection.toggle(&set, action));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_select_range() {
        let set = wave();
        let mut selection = Selection::new();
        selection.select_range(&set, 100.0, 300.0, true);
        assert_eq!(selection.len(), 3);

        selection.select_range(&set, 500.0, 600.0, false);
        assert_eq!(selection.len(), 4);

        selection.select_range(&set, 0.0, 0.0, true);
        assert_eq!(selection.as_slice(), &[Action::new(0.0, 0)]);
    }

    #[test]
    fn test_select_top_bottom_exact() {
        let set = wave();
        let mut selection = Selection::new();
        selection.select_top(&set, PositionMatch::EXACT);
        assert_eq!(selection.len(), 2);
        assert!(selection.iter().all(|a| a.pos() == 100));

        selection.clear();
        selection.select_bottom(&set, PositionMatch::EXACT);
        assert_eq!(selection.len(), 2);
        assert!(selection.iter().all(|a| a.pos() == 0));
    }

    #[test]
    fn test_select_top_with_tolerance() {
        let set = wave();
        let mut selection = Selection::new();
        selection.select_top(&set, PositionMatch::within(5));
        assert_eq!(selection.len(), 3);
    }

    #[test]
    fn test_select_mid() {
        let set = wave();
        let mut selection = Selection::new();
        selection.select_mid(&set, PositionMatch::within(5));
        assert_eq!(selection.as_slice(), &[Action::new(200.0, 50)]);
    }

    #[test]
    fn test_extremes_scope_to_existing_selection() {
        let set = wave();
        let mut selection = Selection::new();
        selection.select_range(&set, 200.0, 500.0, true);
        selection.select_top(&set, PositionMatch::EXACT);
        assert_eq!(selection.as_slice(), &[Action::new(300.0, 100)]);
    }

    #[test]
    fn test_invert() {
        let set = wave();
        let mut selection = Selection::new();
        selection.select_range(&set, 0.0, 200.0, true);
        selection.invert(&set);
        assert_eq!(selection.len(), 3);
        assert_eq!(selection.first(), Some(&Action::new(300.0, 100)));
    }

    #[test]
    fn test_extend() {
        let set = wave();
        let mut selection = Selection::new();
        selection.set_selected(&set, Action::new(200.0, 50), true);
        assert!(selection.extend(&set, 1));
        assert_eq!(selection.len(), 3);
        assert!(selection.extend(&set, 5));
        assert_eq!(selection.len(), set.len());
        assert!(!selection.extend(&set, 1));
    }

    #[test]
    fn test_extend_by_huge_count() {
        let set = wave();
        let mut selection = Selection::new();
        selection.set_selected(&set, Action::new(200.0, 50), true);
        assert!(selection.extend(&set, usize::MAX));
        assert_eq!(selection.len(), set.len());
    }

    #[test]
    fn test_prune() {
        let mut set = wave();
        let mut selection = Selection::new();
        selection.select_all(&set);
        set.remove_range(100.0, 200.0);
        assert_eq!(selection.prune(&set), 2);
        assert_eq!(selection.len(), set.len());
    }

    #[test]
    fn test_equalized_spacing() {
        let set = owner(&[(0.0, 0), (10.0, 50), (90.0, 20), (300.0, 100)]);
        let mut selection = Selection::new();
        selection.select_all(&set);
        let equalized = selection.equalized(EqualizeMode::Spacing).unwrap();
        let times: Vec<f64> = equalized.iter().map(Action::at).collect();
        assert_eq!(times, vec![0.0, 100.0, 200.0, 300.0]);
        assert_eq!(equalized[1].pos(), 50);
    }

    #[test]
    fn test_equalized_position() {
        let set = owner(&[(0.0, 0), (50.0, 90), (100.0, 100)]);
        let mut selection = Selection::new();
        selection.select_all(&set);
        let equalized = selection.equalized(EqualizeMode::Position).unwrap();
        assert_eq!(equalized[1], Action::new(50.0, 50));
    }

    #[test]
    fn test_equalized_needs_three() {
        let set = owner(&[(0.0, 0), (50.0, 90)]);
        let mut selection = Selection::new();
        selection.select_all(&set);
        assert!(selection.equalized(EqualizeMode::Spacing).is_none());
    }
}
