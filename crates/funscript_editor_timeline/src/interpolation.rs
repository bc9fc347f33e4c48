// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reconstruction of a continuous position signal from discrete actions.
//!
//! Two strategies are provided:
//! - [`sample_linear`]: straight lines between neighbouring actions
//! - [`SplineSampler`]: Catmull-Rom through the four nearest actions
//!
//! Both return `None` for an empty set, the single position for a one-action
//! set, hold the first/last position outside the covered time range and are
//! clamped to `0..=100`.

use crate::action::{Action, MAX_POSITION};
use crate::action_set::ActionSet;
use serde::{Deserialize, Serialize};

/// Sampling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// Linear interpolation
    Linear,
    /// Catmull-Rom spline
    #[default]
    Spline,
}

impl InterpolationMode {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "Linear",
            Self::Spline => "Spline",
        }
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Catmull-Rom coefficients for the segment between `p1` and `p2`.
    ///
    /// The curve is `c[0] + c[1]*t + c[2]*t^2 + c[3]*t^3` for `t` in `0..=1`.
    pub fn catmull_rom_coefficients(p0: f32, p1: f32, p2: f32, p3: f32) -> [f32; 4] {
        [
            p1,
            0.5 * (p2 - p0),
            0.5 * (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3),
            0.5 * (-p0 + 3.0 * p1 - 3.0 * p2 + p3),
        ]
    }

    /// Evaluate a cubic polynomial given by its coefficients
    pub fn eval_cubic(c: [f32; 4], t: f32) -> f32 {
        ((c[3] * t + c[2]) * t + c[1]) * t + c[0]
    }

    /// Catmull-Rom spline interpolation
    pub fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
        Self::eval_cubic(Self::catmull_rom_coefficients(p0, p1, p2, p3), t)
    }
}

fn clamp_position(value: f32) -> f32 {
    value.clamp(0.0, f32::from(MAX_POSITION))
}

/// Segment lookup shared by both strategies.
///
/// `Ok(i)` means `time` lies in `[actions[i-1].at, actions[i].at)`, `Err(pos)`
/// means the time is outside the covered range or the set has one action.
fn segment(actions: &ActionSet, time: f64) -> Result<usize, Option<u8>> {
    let (first, last) = match (actions.first(), actions.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(None),
    };
    if actions.len() == 1 || time.is_nan() || time <= first.at() {
        return Err(Some(first.pos()));
    }
    if time >= last.at() {
        return Err(Some(last.pos()));
    }
    Ok(actions.upper_bound(time))
}

fn fraction(a: &Action, b: &Action, time: f64) -> f32 {
    ((time - a.at()) / (b.at() - a.at())) as f32
}

/// Linear sample of `actions` at `time`
pub fn sample_linear(actions: &ActionSet, time: f64) -> Option<f32> {
    match segment(actions, time) {
        Err(held) => held.map(f32::from),
        Ok(idx) => {
            let a = actions.get(idx - 1)?;
            let b = actions.get(idx)?;
            let value = Interpolation::lerp(f32::from(a.pos()), f32::from(b.pos()), fraction(a, b, time));
            Some(clamp_position(value))
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedSegment {
    revision: u64,
    start: f64,
    end: f64,
    coefficients: [f32; 4],
}

/// Catmull-Rom sampler with a lazily rebuilt segment cache.
///
/// The cache remembers the coefficients of the last segment hit together with
/// the [`ActionSet::revision`] it was built from. Samples inside the same
/// segment of an unchanged set skip the search; any structural change to the
/// set invalidates the entry on the next call.
#[derive(Debug, Clone, Default)]
pub struct SplineSampler {
    cached: Option<CachedSegment>,
}

impl SplineSampler {
    /// Create a sampler with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached segment
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Spline sample of `actions` at `time`
    pub fn sample(&mut self, actions: &ActionSet, time: f64) -> Option<f32> {
        if let Some(cached) = self.cached {
            if cached.revision == actions.revision() && time >= cached.start && time < cached.end {
                let t = ((time - cached.start) / (cached.end - cached.start)) as f32;
                return Some(clamp_position(Interpolation::eval_cubic(cached.coefficients, t)));
            }
        }

        let idx = match segment(actions, time) {
            Err(held) => return held.map(f32::from),
            Ok(idx) => idx,
        };

        let last = actions.len() - 1;
        let i1 = idx - 1;
        let i2 = idx;
        let i0 = i1.saturating_sub(1);
        let i3 = (i2 + 1).min(last);

        let pos = |i: usize| actions.get(i).map_or(0.0, |a| f32::from(a.pos()));
        let (a, b) = (actions.get(i1)?, actions.get(i2)?);

        let cached = CachedSegment {
            revision: actions.revision(),
            start: a.at(),
            end: b.at(),
            coefficients: Interpolation::catmull_rom_coefficients(pos(i0), pos(i1), pos(i2), pos(i3)),
        };
        self.cached = Some(cached);

        let t = fraction(a, b, time);
        Some(clamp_position(Interpolation::eval_cubic(cached.coefficients, t)))
    }
}
