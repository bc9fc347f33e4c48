// SPDX-License-Identifier: MIT OR Apache-2.0
//! Action definitions for the timeline.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Lowest valid action position
pub const MIN_POSITION: u8 = 0;

/// Highest valid action position
pub const MAX_POSITION: u8 = 100;

/// A single timestamped position sample.
///
/// Actions are immutable values. Editing an action means replacing it with a
/// new one built through [`Action::with_time`] or [`Action::with_position`].
///
/// Two actions are equal when both time and position match. Ordering inside
/// an [`ActionSet`](crate::ActionSet) is by time alone, see [`Action::cmp_time`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Time in milliseconds
    at: f64,
    /// Position in `0..=100`
    pos: u8,
}

impl Action {
    /// Create a new action, clamping time to `>= 0` and position to `0..=100`.
    ///
    /// Non-finite times collapse to `0`.
    pub fn new(at: f64, pos: u8) -> Self {
        let at = if at.is_finite() { at.max(0.0) } else { 0.0 };
        Self {
            at,
            pos: pos.min(MAX_POSITION),
        }
    }

    /// Create an action from untrusted input.
    ///
    /// Returns `None` for negative or non-finite times and for positions
    /// outside `0..=100`.
    pub fn try_new(at: f64, pos: i64) -> Option<Self> {
        if !at.is_finite() || at < 0.0 {
            return None;
        }
        if !(i64::from(MIN_POSITION)..=i64::from(MAX_POSITION)).contains(&pos) {
            return None;
        }
        Some(Self { at, pos: pos as u8 })
    }

    /// Time in milliseconds
    pub fn at(&self) -> f64 {
        self.at
    }

    /// Position in `0..=100`
    pub fn pos(&self) -> u8 {
        self.pos
    }

    /// Copy of this action moved to a new time
    pub fn with_time(self, at: f64) -> Self {
        Self::new(at, self.pos)
    }

    /// Copy of this action with a new position
    pub fn with_position(self, pos: u8) -> Self {
        Self::new(self.at, pos)
    }

    /// Copy of this action with its position shifted by `offset`, clamped to `0..=100`
    pub fn offset_position(self, offset: i32) -> Self {
        let pos = i32::from(self.pos)
            .saturating_add(offset)
            .clamp(i32::from(MIN_POSITION), i32::from(MAX_POSITION));
        Self::new(self.at, pos as u8)
    }

    /// Total order by time only
    pub fn cmp_time(&self, other: &Action) -> Ordering {
        self.at.total_cmp(&other.at)
    }

    /// Absolute distance in milliseconds between this action and `time`
    pub fn distance(&self, time: f64) -> f64 {
        (self.at - time).abs()
    }

    /// Position normalized to `0.0..=1.0`
    pub fn normalized(&self) -> f32 {
        f32::from(self.pos) / f32::from(MAX_POSITION)
    }
}

/// Direction of movement between two actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Position increases
    Up,
    /// Position decreases
    Down,
    /// Position unchanged
    Flat,
}

impl Direction {
    /// Direction of travel going from `from` to `to`
    pub fn between(from: &Action, to: &Action) -> Self {
        match to.pos.cmp(&from.pos) {
            Ordering::Greater => Direction::Up,
            Ordering::Less => Direction::Down,
            Ordering::Equal => Direction::Flat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps() {
        let action = Action::new(-5.0, 150);
        assert_eq!(action.at(), 0.0);
        assert_eq!(action.pos(), 100);

        let action = Action::new(f64::NAN, 20);
        assert_eq!(action.at(), 0.0);
    }

    #[test]
    fn test_try_new_rejects_malformed() {
        assert!(Action::try_new(-1.0, 50).is_none());
        assert!(Action::try_new(10.0, 101).is_none());
        assert!(Action::try_new(10.0, -1).is_none());
        assert!(Action::try_new(f64::INFINITY, 0).is_none());
        assert_eq!(Action::try_new(10.0, 100), Some(Action::new(10.0, 100)));
    }

    #[test]
    fn test_offset_position_clamps() {
        let action = Action::new(100.0, 90);
        assert_eq!(action.offset_position(20).pos(), 100);
        assert_eq!(action.offset_position(-95).pos(), 0);
        assert_eq!(action.offset_position(-10).pos(), 80);
    }

    #[test]
    fn test_offset_position_extreme_offsets() {
        let action = Action::new(100.0, 40);
        assert_eq!(action.offset_position(i32::MAX).pos(), 100);
        assert_eq!(action.offset_position(i32::MIN).pos(), 0);
    }

    #[test]
    fn test_direction() {
        let low = Action::new(0.0, 10);
        let high = Action::new(100.0, 90);
        assert_eq!(Direction::between(&low, &high), Direction::Up);
        assert_eq!(Direction::between(&high, &low), Direction::Down);
        assert_eq!(Direction::between(&low, &low.with_time(50.0)), Direction::Flat);
    }
}
