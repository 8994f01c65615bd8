// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interval resolution.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use super::spec::{INDEFINITE, SimpleDuration, TimingAttributes};

/// A resolved `[begin, end)` activation window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    /// Begin time.
    pub begin: f64,
    /// End time ([`INDEFINITE`] when unbounded).
    pub end: f64,
    /// Length of one repeat cycle.
    pub simple_duration: f64,
    /// `end - begin`.
    pub active_duration: f64,
}

impl Interval {
    /// Resolves the interval that starts at `begin`, given the element's
    /// attributes and its sorted end instance times.
    ///
    /// Follows the SMIL active duration rules: repeat count and repeat
    /// duration first, then the earliest end instance after `begin`, then
    /// the `min` / `max` clamp.
    pub(crate) fn resolve(begin: f64, attrs: &TimingAttributes, ends: &[f64]) -> Self {
        let d = attrs.dur.seconds();
        let repeats = attrs.repeat_count.is_some() || attrs.repeat_dur.is_some();
        let intermediate = if d == 0.0 {
            0.0
        } else if !repeats {
            d
        } else {
            let by_count = attrs.repeat_count.map_or(INDEFINITE, |n| n * d);
            by_count.min(attrs.repeat_dur.unwrap_or(INDEFINITE))
        };

        let end_instance = ends.iter().copied().find(|&e| e > begin);
        let bounded_by_end = !attrs.end.is_empty() || end_instance.is_some();
        let preliminary = match end_instance {
            Some(e) if attrs.dur == SimpleDuration::Unspecified && !repeats => e - begin,
            Some(e) => intermediate.min(e - begin),
            None if bounded_by_end && attrs.dur == SimpleDuration::Unspecified && !repeats => {
                INDEFINITE
            }
            None => intermediate,
        };

        let (min, max) = attrs.min_max();
        let active_duration = preliminary.max(min).min(max);
        Self {
            begin,
            end: begin + active_duration,
            simple_duration: d,
            active_duration,
        }
    }

    /// Repeat cycle and simple-time fraction at time `t` inside the interval.
    pub(crate) fn position(&self, t: f64) -> (u32, f64) {
        let d = self.simple_duration;
        if d == 0.0 {
            return (0, 1.0);
        }
        if !d.is_finite() {
            return (0, 0.0);
        }
        let local = (t - self.begin).max(0.0);
        let cycles = (local / d).floor();
        (cycle_index(cycles), (local - cycles * d) / d)
    }

    /// Cycle and fraction held after the interval ends.
    ///
    /// An active duration that is a whole number of cycles ends at fraction
    /// 1 of the last cycle rather than fraction 0 of the next.
    pub(crate) fn end_position(&self) -> (u32, f64) {
        let d = self.simple_duration;
        if d == 0.0 {
            return (0, 1.0);
        }
        if !d.is_finite() || !self.active_duration.is_finite() {
            return (0, 0.0);
        }
        let cycles = self.active_duration / d;
        let whole = cycles.floor();
        if whole > 0.0 && whole == cycles {
            (cycle_index(whole - 1.0), 1.0)
        } else {
            (cycle_index(whole), cycles - whole)
        }
    }

    /// Whether `t` is inside `[begin, end)`.
    #[must_use]
    pub fn contains(&self, t: f64) -> bool {
        self.begin <= t && t < self.end
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "cycle counts are clamped to the u32 range first"
)]
fn cycle_index(cycles: f64) -> u32 {
    cycles.clamp(0.0, f64::from(u32::MAX)) as u32
}
