// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ordered, unique-by-time action container.
//!
//! [`ActionSet`] is a sorted growable array. Lookups are binary searches over
//! the time key; inserts shift the tail, which stays cheap because the set is
//! capped at [`ActionSet::limit`] entries.

use crate::action::Action;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Default hard cap on the number of actions in one set
pub const DEFAULT_ACTION_LIMIT: usize = 65_536;

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Sorted set of actions, strictly increasing by time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ActionSetRepr", into = "ActionSetRepr")]
pub struct ActionSet {
    actions: Vec<Action>,
    limit: usize,
    /// Process-unique token, replaced on every structural change
    revision: u64,
}

/// Wire form of an [`ActionSet`]; normalized again on the way in.
#[derive(Serialize, Deserialize)]
struct ActionSetRepr {
    actions: Vec<Action>,
    limit: usize,
}

impl From<ActionSetRepr> for ActionSet {
    fn from(repr: ActionSetRepr) -> Self {
        Self::from_actions(repr.actions, repr.limit).0
    }
}

impl From<ActionSet> for ActionSetRepr {
    fn from(set: ActionSet) -> Self {
        Self {
            actions: set.actions,
            limit: set.limit,
        }
    }
}

impl PartialEq for ActionSet {
    fn eq(&self, other: &Self) -> bool {
        self.actions == other.actions
    }
}

impl Default for ActionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionSet {
    /// Create an empty set with the default limit
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_ACTION_LIMIT)
    }

    /// Create an empty set holding at most `limit` actions
    pub fn with_limit(limit: usize) -> Self {
        Self {
            actions: Vec::new(),
            limit,
            revision: next_revision(),
        }
    }

    /// Build a set from arbitrary actions.
    ///
    /// Actions are sorted by time; for duplicate times the first occurrence
    /// wins. Anything past `limit` is dropped. Returns the set together with
    /// the number of rejected actions.
    pub fn from_actions(actions: impl IntoIterator<Item = Action>, limit: usize) -> (Self, usize) {
        let mut actions: Vec<Action> = actions.into_iter().collect();
        let total = actions.len();

        actions.sort_by(Action::cmp_time);
        actions.dedup_by(|later, earlier| later.at() == earlier.at());
        actions.truncate(limit);

        let rejected = total - actions.len();
        (
            Self {
                actions,
                limit,
                revision: next_revision(),
            },
            rejected,
        )
    }

    /// Maximum number of actions this set accepts
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Whether the set reached its limit
    pub fn is_full(&self) -> bool {
        self.actions.len() >= self.limit
    }

    /// Revision token; changes whenever the contents change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Iterate in time order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Action> + ExactSizeIterator {
        self.actions.iter()
    }

    /// All actions as a sorted slice
    pub fn as_slice(&self) -> &[Action] {
        &self.actions
    }

    /// Action at an index
    pub fn get(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    /// Earliest action
    pub fn first(&self) -> Option<&Action> {
        self.actions.first()
    }

    /// Latest action
    pub fn last(&self) -> Option<&Action> {
        self.actions.last()
    }

    /// Index of the first action with `at >= time`
    pub fn lower_bound(&self, time: f64) -> usize {
        self.actions.partition_point(|a| a.at() < time)
    }

    /// Index of the first action with `at > time`
    pub fn upper_bound(&self, time: f64) -> usize {
        self.actions.partition_point(|a| a.at() <= time)
    }

    fn index_of_time(&self, time: f64) -> Option<usize> {
        let idx = self.lower_bound(time);
        self.actions
            .get(idx)
            .filter(|a| a.at() == time)
            .map(|_| idx)
    }

    /// Exact-time lookup
    pub fn find(&self, time: f64) -> Option<&Action> {
        self.index_of_time(time).map(|idx| &self.actions[idx])
    }

    /// Index of an action matching both time and position
    pub fn position_of(&self, action: &Action) -> Option<usize> {
        self.index_of_time(action.at())
            .filter(|&idx| self.actions[idx] == *action)
    }

    /// Whether an action with the same time and position exists
    pub fn contains(&self, action: &Action) -> bool {
        self.position_of(action).is_some()
    }

    /// Closest action whose distance to `time` is at most `max_error`.
    ///
    /// Binary-searches to `time - max_error`, then scans forward. Distances are
    /// compared in time order and the first minimal one is kept, so of two
    /// equidistant actions the earlier wins. The scan stops once the distance
    /// grows again after a candidate was found.
    pub fn nearest_within(&self, time: f64, max_error: f64) -> Option<&Action> {
        if self.actions.is_empty() || !time.is_finite() || max_error.is_nan() || max_error < 0.0 {
            return None;
        }

        let start = self.lower_bound(time - max_error).saturating_sub(1);
        let mut best: Option<(&Action, f64)> = None;

        for action in &self.actions[start..] {
            if action.at() > time + max_error {
                break;
            }

            let error = action.distance(time);
            if error > max_error {
                continue;
            }

            match best {
                Some((_, smallest)) if error > smallest => break,
                Some((_, smallest)) if error == smallest => {}
                _ => best = Some((action, error)),
            }
        }

        best.map(|(action, _)| action)
    }

    /// Closest action to `time` regardless of distance; earlier wins ties
    pub fn closest(&self, time: f64) -> Option<&Action> {
        if !time.is_finite() {
            return None;
        }
        let idx = self.lower_bound(time);
        let before = idx.checked_sub(1).and_then(|i| self.actions.get(i));
        let after = self.actions.get(idx);

        match (before, after) {
            (Some(b), Some(a)) => {
                if a.distance(time) < b.distance(time) {
                    Some(a)
                } else {
                    Some(b)
                }
            }
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    }

    /// First action strictly after `time`
    pub fn next_after(&self, time: f64) -> Option<&Action> {
        self.actions.get(self.upper_bound(time))
    }

    /// Last action strictly before `time`
    pub fn previous_before(&self, time: f64) -> Option<&Action> {
        self.lower_bound(time)
            .checked_sub(1)
            .and_then(|idx| self.actions.get(idx))
    }

    /// Actions with time in `[from, to]`
    pub fn range(&self, from: f64, to: f64) -> &[Action] {
        if from.is_nan() || to.is_nan() || from > to {
            return &[];
        }
        let start = self.lower_bound(from);
        let end = self.upper_bound(to);
        &self.actions[start..end]
    }

    /// Insert an action, keeping sort order.
    ///
    /// Returns `false` without touching the set if an action already exists
    /// at the same time or the set is full.
    pub fn insert(&mut self, action: Action) -> bool {
        if self.is_full() {
            return false;
        }

        let idx = self.lower_bound(action.at());
        if self.actions.get(idx).is_some_and(|a| a.at() == action.at()) {
            return false;
        }

        self.actions.insert(idx, action);
        self.touch();
        true
    }

    /// Replace `old` with `new` atomically.
    ///
    /// Fails if `old` is missing or `new` would land on the time of a
    /// different existing action.
    pub fn replace(&mut self, old: &Action, new: Action) -> bool {
        let Some(idx) = self.position_of(old) else {
            return false;
        };
        if new.at() != old.at() && self.index_of_time(new.at()).is_some() {
            return false;
        }

        self.actions.remove(idx);
        let target = self.lower_bound(new.at());
        self.actions.insert(target, new);
        self.touch();
        true
    }

    /// Remove an action matching both time and position
    pub fn remove(&mut self, action: &Action) -> bool {
        match self.position_of(action) {
            Some(idx) => {
                self.actions.remove(idx);
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Remove whatever action sits exactly at `time`
    pub fn remove_at_time(&mut self, time: f64) -> Option<Action> {
        let idx = self.index_of_time(time)?;
        let removed = self.actions.remove(idx);
        self.touch();
        Some(removed)
    }

    /// Remove every action with time in `[from, to]` and return them
    pub fn remove_range(&mut self, from: f64, to: f64) -> Vec<Action> {
        if from.is_nan() || to.is_nan() || from > to {
            return Vec::new();
        }
        let start = self.lower_bound(from);
        let end = self.upper_bound(to);
        if start == end {
            return Vec::new();
        }

        let removed: Vec<Action> = self.actions.drain(start..end).collect();
        self.touch();
        removed
    }

    /// Remove every action matching `predicate` and return them
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&Action) -> bool) -> Vec<Action> {
        let mut removed = Vec::new();
        self.actions.retain(|action| {
            if predicate(action) {
                removed.push(*action);
                false
            } else {
                true
            }
        });

        if !removed.is_empty() {
            self.touch();
        }
        removed
    }

    /// Remove all actions
    pub fn clear(&mut self) {
        if !self.actions.is_empty() {
            self.actions.clear();
            self.touch();
        }
    }

    /// Sort check: strictly ascending by time
    pub fn is_strictly_sorted(&self) -> bool {
        self.actions.windows(2).all(|w| w[0].at() < w[1].at())
    }

    fn touch(&mut self) {
        self.revision = next_revision();
        debug_assert!(self.is_strictly_sorted(), "action set lost its ordering");
    }
}

impl<'a> IntoIterator for &'a ActionSet {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}
