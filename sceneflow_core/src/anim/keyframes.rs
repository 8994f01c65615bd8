// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Key/value table evaluation.

use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{CubicBez, ParamCurve, Point};

use super::interp::Interpolate;
use crate::error::{Error, Result};
use crate::value::FieldValue;

/// How values between keys are computed (`calcMode`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CalcMode {
    /// Jump from key to key.
    Discrete,
    /// Straight-line interpolation between bracketing keys.
    #[default]
    Linear,
    /// Constant speed over the whole value list.
    Paced,
    /// Per-segment timing curve from `keySplines`.
    Spline,
}

/// One `keySplines` entry: the two inner control points of a cubic timing
/// curve from `(0, 0)` to `(1, 1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeySpline {
    curve: CubicBez,
}

/// Bisection stops once the bracket is this narrow.
const SPLINE_TOLERANCE: f64 = 1e-9;
const SPLINE_MAX_STEPS: u32 = 64;

impl KeySpline {
    /// Creates a timing curve. All coordinates must lie in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCurve`] for coordinates outside `[0, 1]`.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        if [x1, y1, x2, y2].iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(Error::InvalidCurve("keySplines values must be in [0, 1]"));
        }
        Ok(Self {
            curve: CubicBez::new(
                Point::ZERO,
                Point::new(x1, y1),
                Point::new(x2, y2),
                Point::new(1.0, 1.0),
            ),
        })
    }

    /// Maps a segment-local fraction through the curve: finds the parameter
    /// whose x equals `u` by bisection, then returns y there.
    #[must_use]
    pub fn apply(&self, u: f64) -> f64 {
        let u = u.clamp(0.0, 1.0);
        let (mut lo, mut hi) = (0.0, 1.0);
        let mut t = u;
        for _ in 0..SPLINE_MAX_STEPS {
            let x = self.curve.eval(t).x;
            if (x - u).abs() < SPLINE_TOLERANCE {
                break;
            }
            if x < u {
                lo = t;
            } else {
                hi = t;
            }
            t = 0.5 * (lo + hi);
            if hi - lo < SPLINE_TOLERANCE {
                break;
            }
        }
        self.curve.eval(t).y
    }
}

/// Index of the segment `[times[i], times[i + 1])` holding `f`, clamped to
/// the last segment.
fn segment(times: &[f64], f: f64) -> usize {
    let last = times.len().saturating_sub(2);
    times.partition_point(|&t| t <= f).saturating_sub(1).min(last)
}

fn uniform_times(n: usize) -> Vec<f64> {
    let steps = n.saturating_sub(1).max(1);
    (0..n).map(|i| index_f64(i) / index_f64(steps)).collect()
}

fn index_f64(i: usize) -> f64 {
    i as f64
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "the product is clamped to [0, n - 1] first"
)]
fn discrete_index(f: f64, n: usize) -> usize {
    (f * index_f64(n)).floor().clamp(0.0, index_f64(n - 1)) as usize
}

/// Evaluates a key/value table at `fraction`.
///
/// `key_times`, when given, must have one entry per value; without it keys
/// are spaced evenly. `splines` holds one entry per segment and is only read
/// in [`CalcMode::Spline`]. Returns `None` when the table is malformed or
/// the values cannot be blended, so the caller can leave the target alone.
#[must_use]
pub fn evaluate_keyframes(
    values: &[FieldValue],
    key_times: Option<&[f64]>,
    splines: &[KeySpline],
    mode: CalcMode,
    fraction: f64,
) -> Option<FieldValue> {
    let n = values.len();
    let f = fraction.clamp(0.0, 1.0);
    match n {
        0 => return None,
        1 => return values.first().cloned(),
        _ => {}
    }
    if key_times.is_some_and(|k| k.len() != n) {
        return None;
    }

    match mode {
        CalcMode::Discrete => {
            let i = match key_times {
                Some(times) => times.partition_point(|&t| t <= f).saturating_sub(1),
                None => discrete_index(f, n),
            };
            values.get(i).cloned()
        }
        CalcMode::Paced => paced(values, f),
        CalcMode::Linear | CalcMode::Spline => {
            let owned;
            let times = match key_times {
                Some(k) => k,
                None => {
                    owned = uniform_times(n);
                    &owned
                }
            };
            let i = segment(times, f);
            let span = times[i + 1] - times[i];
            let mut u = if span > 0.0 { (f - times[i]) / span } else { 1.0 };
            if mode == CalcMode::Spline {
                u = splines.get(i)?.apply(u);
            }
            // Keys are hit exactly, not through rounding.
            if u >= 1.0 {
                return values.get(i + 1).cloned();
            }
            if u <= 0.0 {
                return values.get(i).cloned();
            }
            values[i].lerp(&values[i + 1], u)
        }
    }
}

/// Re-parameterizes `f` by cumulative distance so the value moves at
/// constant speed. Falls back to linear when the values have no distance.
fn paced(values: &[FieldValue], f: f64) -> Option<FieldValue> {
    let mut cumulative = Vec::with_capacity(values.len());
    let mut total = 0.0;
    cumulative.push(0.0);
    for pair in values.windows(2) {
        let Some(d) = pair[0].distance(&pair[1]) else {
            return evaluate_keyframes(values, None, &[], CalcMode::Linear, f);
        };
        total += d;
        cumulative.push(total);
    }
    if total <= 0.0 {
        return values.first().cloned();
    }
    let target = f * total;
    let i = segment(&cumulative, target);
    let span = cumulative[i + 1] - cumulative[i];
    let u = if span > 0.0 {
        (target - cumulative[i]) / span
    } else {
        1.0
    };
    values[i].lerp(&values[i + 1], u.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use kurbo::Vec2;

    use super::*;

    fn floats(v: &[f32]) -> Vec<FieldValue> {
        v.iter().map(|&x| FieldValue::Float(x)).collect()
    }

    fn as_f32(v: Option<FieldValue>) -> f32 {
        match v {
            Some(FieldValue::Float(x)) => x,
            other => panic!("expected a float, got {other:?}"),
        }
    }

    #[test]
    fn endpoints_are_exact_for_linear_and_discrete() {
        for n in 2..6 {
            let values: Vec<FieldValue> = (0..n).map(|i| FieldValue::Float(i as f32 * 3.0)).collect();
            for mode in [CalcMode::Linear, CalcMode::Discrete] {
                assert_eq!(
                    evaluate_keyframes(&values, None, &[], mode, 0.0).as_ref(),
                    values.first(),
                    "{mode:?} with {n} keys at 0"
                );
                assert_eq!(
                    evaluate_keyframes(&values, None, &[], mode, 1.0).as_ref(),
                    values.last(),
                    "{mode:?} with {n} keys at 1"
                );
            }
        }
    }

    #[test]
    fn linear_uses_key_times() {
        let values = floats(&[0.0, 10.0, 20.0]);
        let times = [0.0, 0.8, 1.0];
        let v = as_f32(evaluate_keyframes(&values, Some(&times), &[], CalcMode::Linear, 0.4));
        assert!((v - 5.0).abs() < 1e-5);
        let v = as_f32(evaluate_keyframes(&values, Some(&times), &[], CalcMode::Linear, 0.9));
        assert!((v - 15.0).abs() < 1e-5);
    }

    #[test]
    fn discrete_picks_the_key_below() {
        let values = floats(&[1.0, 2.0, 3.0]);
        assert_eq!(as_f32(evaluate_keyframes(&values, None, &[], CalcMode::Discrete, 0.5)), 2.0);
        let times = [0.0, 0.9, 1.0];
        assert_eq!(
            as_f32(evaluate_keyframes(&values, Some(&times), &[], CalcMode::Discrete, 0.5)),
            1.0
        );
    }

    #[test]
    fn paced_moves_at_constant_speed() {
        let values = vec![
            FieldValue::Vec2(Vec2::new(0.0, 0.0)),
            FieldValue::Vec2(Vec2::new(1.0, 0.0)),
            FieldValue::Vec2(Vec2::new(4.0, 0.0)),
        ];
        let Some(FieldValue::Vec2(v)) = evaluate_keyframes(&values, None, &[], CalcMode::Paced, 0.5)
        else {
            panic!("expected a Vec2");
        };
        assert!((v - Vec2::new(2.0, 0.0)).hypot() < 1e-9, "got {v:?}");
    }

    #[test]
    fn spline_eases_each_segment() {
        let values = floats(&[0.0, 1.0]);
        let ease_in = KeySpline::new(0.42, 0.0, 1.0, 1.0).unwrap();
        let v = as_f32(evaluate_keyframes(&values, None, &[ease_in], CalcMode::Spline, 0.5));
        assert!(v < 0.5, "ease-in lags behind linear, got {v}");
        let linear = KeySpline::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let v = as_f32(evaluate_keyframes(&values, None, &[linear], CalcMode::Spline, 0.3));
        assert!((v - 0.3).abs() < 1e-5);
    }

    #[test]
    fn malformed_tables_yield_none() {
        let values = floats(&[0.0, 1.0]);
        assert_eq!(evaluate_keyframes(&[], None, &[], CalcMode::Linear, 0.5), None);
        assert_eq!(
            evaluate_keyframes(&values, Some(&[0.0]), &[], CalcMode::Linear, 0.5),
            None
        );
        assert_eq!(evaluate_keyframes(&values, None, &[], CalcMode::Spline, 0.5), None);
        assert!(KeySpline::new(1.5, 0.0, 0.0, 1.0).is_err());
    }
}
