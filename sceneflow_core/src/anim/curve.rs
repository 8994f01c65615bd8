// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Curve keys: NURBS and Bézier paths.
//!
//! [`Nurbs`] evaluates with the usual knot-span search followed by the
//! Cox-de Boor triangle for the `p + 1` nonzero basis functions. A rational
//! curve divides by the weighted basis sum. [`Curve::Path`] wraps a
//! `kurbo::BezPath`, so quadratic and cubic segments are evaluated (and
//! arc-length parameterized for paced motion) by kurbo.

use alloc::vec;
use alloc::vec::Vec;
use core::ops::{Add, Mul};

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{BezPath, ParamCurve, ParamCurveArclen, PathSeg, Vec2};

use crate::error::{Error, Result};
use crate::field::ValueKind;
use crate::value::{FieldValue, Vec3};

/// Accuracy passed to kurbo's arc-length routines.
const ARCLEN_ACCURACY: f64 = 1e-6;

/// A control point type: anything that can be scaled and summed.
pub trait ControlPoint: Copy + Add<Output = Self> + Mul<f64, Output = Self> {}

impl<P: Copy + Add<Output = P> + Mul<f64, Output = P>> ControlPoint for P {}

/// A non-uniform rational B-spline of degree `p`.
#[derive(Clone, Debug, PartialEq)]
pub struct Nurbs<P> {
    degree: usize,
    points: Vec<P>,
    knots: Vec<f64>,
    weights: Option<Vec<f64>>,
}

impl<P: ControlPoint> Nurbs<P> {
    /// Creates a curve.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCurve`] when there are not more points than the
    /// degree, the knot count is not `points + degree + 1`, the knots
    /// decrease or span nothing, or the weights do not match the points or
    /// are not positive.
    pub fn new(degree: usize, points: Vec<P>, knots: Vec<f64>, weights: Option<Vec<f64>>) -> Result<Self> {
        if degree == 0 || points.len() <= degree {
            return Err(Error::InvalidCurve("a curve needs more control points than its degree"));
        }
        if knots.len() != points.len() + degree + 1 {
            return Err(Error::InvalidCurve("knot count must be points + degree + 1"));
        }
        if knots.iter().any(|k| !k.is_finite()) || knots.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::InvalidCurve("knot vector must be non-decreasing"));
        }
        if knots[degree] >= knots[points.len()] {
            return Err(Error::InvalidCurve("knot vector has an empty domain"));
        }
        if let Some(w) = &weights {
            if w.len() != points.len() {
                return Err(Error::InvalidCurve("one weight per control point"));
            }
            if w.iter().any(|&w| !(w > 0.0 && w.is_finite())) {
                return Err(Error::InvalidCurve("weights must be positive"));
            }
        }
        Ok(Self {
            degree,
            points,
            knots,
            weights,
        })
    }

    /// The Bézier curve of degree `points.len() - 1`, as a clamped NURBS.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCurve`] for fewer than two points.
    pub fn bezier(points: Vec<P>) -> Result<Self> {
        let n = points.len();
        if n < 2 {
            return Err(Error::InvalidCurve("a curve needs more control points than its degree"));
        }
        let mut knots = vec![0.0; n];
        knots.extend(core::iter::repeat_n(1.0, n));
        Self::new(n - 1, points, knots, None)
    }

    /// Sets per-point weights, making the curve rational.
    ///
    /// # Errors
    ///
    /// As for [`new`](Self::new).
    pub fn with_weights(self, weights: Vec<f64>) -> Result<Self> {
        Self::new(self.degree, self.points, self.knots, Some(weights))
    }

    /// Degree of the curve.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Control points.
    #[must_use]
    pub fn points(&self) -> &[P] {
        &self.points
    }

    /// Evaluates the curve at `fraction` of its parameter domain.
    #[must_use]
    pub fn eval(&self, fraction: f64) -> P {
        let p = self.degree;
        let (lo, hi) = (self.knots[p], self.knots[self.points.len()]);
        let u = lo + (hi - lo) * fraction.clamp(0.0, 1.0);
        let span = self.find_span(u);
        let basis = self.basis_funs(span, u);

        let first = span - p;
        let mut acc: Option<P> = None;
        let mut denom = 0.0;
        for (j, &b) in basis.iter().enumerate() {
            let w = self.weights.as_ref().map_or(1.0, |w| w[first + j]);
            let term = self.points[first + j] * (b * w);
            denom += b * w;
            acc = Some(match acc {
                Some(a) => a + term,
                None => term,
            });
        }
        let sum = acc.unwrap_or(self.points[first]);
        if self.weights.is_some() && denom > 0.0 {
            sum * (1.0 / denom)
        } else {
            sum
        }
    }

    /// Index `i` of the knot span `[u_i, u_{i+1})` holding `u`, with the
    /// end of the domain mapped into the last non-empty span.
    fn find_span(&self, u: f64) -> usize {
        let p = self.degree;
        let n = self.points.len() - 1;
        if u >= self.knots[n + 1] {
            return n;
        }
        if u <= self.knots[p] {
            return p;
        }
        let (mut low, mut high) = (p, n + 1);
        let mut mid = (low + high) / 2;
        while u < self.knots[mid] || u >= self.knots[mid + 1] {
            if u < self.knots[mid] {
                high = mid;
            } else {
                low = mid;
            }
            mid = (low + high) / 2;
        }
        mid
    }

    /// The `p + 1` basis functions that are nonzero on `span`.
    fn basis_funs(&self, span: usize, u: f64) -> Vec<f64> {
        let p = self.degree;
        let mut n = vec![0.0; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        n[0] = 1.0;
        for j in 1..=p {
            left[j] = u - self.knots[span + 1 - j];
            right[j] = self.knots[span + j] - u;
            let mut saved = 0.0;
            for r in 0..j {
                let denom = right[r + 1] + left[j - r];
                let temp = if denom == 0.0 { 0.0 } else { n[r] / denom };
                n[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            n[j] = saved;
        }
        n
    }
}

/// A curve-valued key table for one animated attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum Curve {
    /// A 2D motion path made of line, quadratic and cubic segments.
    Path(BezPath),
    /// A scalar NURBS, for `Float` / `Double` / `Time` fields.
    Scalar(Nurbs<f64>),
    /// A 2D NURBS.
    Vec2(Nurbs<Vec2>),
    /// A 3D NURBS.
    Vec3(Nurbs<Vec3>),
}

impl Curve {
    /// Scalar kind of the values this curve produces.
    #[must_use]
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Self::Path(_) | Self::Vec2(_) => ValueKind::Vec2,
            Self::Scalar(_) => ValueKind::Double,
            Self::Vec3(_) => ValueKind::Vec3,
        }
    }

    /// Evaluates the curve at `fraction`. Paths are traversed at constant
    /// speed when `paced` is set, otherwise one equal share of the fraction
    /// per segment. Returns `None` for an empty path.
    #[must_use]
    pub fn eval(&self, fraction: f64, paced: bool) -> Option<FieldValue> {
        let f = fraction.clamp(0.0, 1.0);
        Some(match self {
            Self::Path(path) => FieldValue::Vec2(eval_path(path, f, paced)?),
            Self::Scalar(c) => FieldValue::Double(c.eval(f)),
            Self::Vec2(c) => FieldValue::Vec2(c.eval(f)),
            Self::Vec3(c) => FieldValue::Vec3(c.eval(f)),
        })
    }
}

fn eval_path(path: &BezPath, f: f64, paced: bool) -> Option<Vec2> {
    let segs: Vec<PathSeg> = path.segments().collect();
    let last = segs.last()?;
    if f >= 1.0 {
        return Some(last.end().to_vec2());
    }
    if paced {
        let lengths: Vec<f64> = segs.iter().map(|s| s.arclen(ARCLEN_ACCURACY)).collect();
        let total: f64 = lengths.iter().sum();
        if total > 0.0 {
            let mut remaining = f * total;
            for (seg, &len) in segs.iter().zip(&lengths) {
                if remaining <= len {
                    let t = seg.inv_arclen(remaining, ARCLEN_ACCURACY);
                    return Some(seg.eval(t).to_vec2());
                }
                remaining -= len;
            }
            return Some(last.end().to_vec2());
        }
    }
    let scaled = f * segment_count(segs.len());
    let i = segment_index(scaled, segs.len());
    let t = scaled - segment_count(i);
    Some(segs[i].eval(t.clamp(0.0, 1.0)).to_vec2())
}

fn segment_count(n: usize) -> f64 {
    n as f64
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "clamped to the segment range first"
)]
fn segment_index(scaled: f64, n: usize) -> usize {
    scaled.floor().clamp(0.0, segment_count(n - 1)) as usize
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use kurbo::Point;

    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).hypot() < 1e-9
    }

    #[test]
    fn quadratic_bezier_as_nurbs() {
        let c = Nurbs::bezier(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 2.0),
            Vec2::new(2.0, 0.0),
        ])
        .unwrap();
        assert_eq!(c.degree(), 2);
        assert_eq!(c.eval(0.0), Vec2::new(0.0, 0.0));
        assert_eq!(c.eval(1.0), Vec2::new(2.0, 0.0));
        assert!(close(c.eval(0.5), Vec2::new(1.0, 1.0)), "got {:?}", c.eval(0.5));
    }

    #[test]
    fn matches_kurbo_cubic() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 3.0),
            Point::new(3.0, 3.0),
            Point::new(4.0, 0.0),
        ];
        let nurbs = Nurbs::bezier(pts.iter().map(|p| p.to_vec2()).collect()).unwrap();
        let cubic = kurbo::CubicBez::new(pts[0], pts[1], pts[2], pts[3]);
        for t in [0.1, 0.3, 0.7, 0.9] {
            assert!(close(nurbs.eval(t), cubic.eval(t).to_vec2()), "t = {t}");
        }
    }

    #[test]
    fn uniform_weights_change_nothing() {
        let pts = vec![1.0, 5.0, 2.0];
        let plain = Nurbs::bezier(pts.clone()).unwrap();
        let weighted = Nurbs::bezier(pts).unwrap().with_weights(vec![2.0; 3]).unwrap();
        assert!((plain.eval(0.4) - weighted.eval(0.4)).abs() < 1e-12);
    }

    #[test]
    fn weights_pull_towards_their_point() {
        let pts = vec![0.0, 1.0, 0.0];
        let plain = Nurbs::bezier(pts.clone()).unwrap();
        let heavy = Nurbs::bezier(pts).unwrap().with_weights(vec![1.0, 4.0, 1.0]).unwrap();
        assert!(heavy.eval(0.5) > plain.eval(0.5));
    }

    #[test]
    fn piecewise_linear_spans() {
        let c = Nurbs::new(1, vec![0.0, 10.0, 20.0], vec![0.0, 0.0, 0.5, 1.0, 1.0], None).unwrap();
        assert!((c.eval(0.25) - 5.0).abs() < 1e-12);
        assert!((c.eval(0.75) - 15.0).abs() < 1e-12);
        assert_eq!(c.eval(1.0), 20.0);
    }

    #[test]
    fn invalid_knots_are_rejected() {
        let decreasing = Nurbs::new(1, vec![0.0, 1.0], vec![0.0, 1.0, 0.5, 1.0], None);
        assert!(matches!(decreasing, Err(Error::InvalidCurve(_))));
        let short = Nurbs::new(2, vec![0.0, 1.0, 2.0], vec![0.0, 1.0], None);
        assert!(matches!(short, Err(Error::InvalidCurve(_))));
        let flat = Nurbs::new(1, vec![0.0, 1.0], vec![0.0, 0.0, 0.0, 0.0], None);
        assert!(matches!(flat, Err(Error::InvalidCurve(_))));
        let weights = Nurbs::bezier(vec![0.0, 1.0]).unwrap().with_weights(vec![1.0, -1.0]);
        assert!(matches!(weights, Err(Error::InvalidCurve(_))));
    }

    #[test]
    fn paced_path_covers_equal_lengths() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((1.0, 0.0));
        path.line_to((4.0, 0.0));
        let curve = Curve::Path(path);
        let Some(FieldValue::Vec2(even)) = curve.eval(0.5, false) else {
            panic!("expected a point");
        };
        assert!(close(even, Vec2::new(1.0, 0.0)), "segment-uniform: {even:?}");
        let Some(FieldValue::Vec2(paced)) = curve.eval(0.5, true) else {
            panic!("expected a point");
        };
        assert!((paced.x - 2.0).abs() < 1e-4, "paced: {paced:?}");
        assert_eq!(curve.eval(1.0, true), Some(FieldValue::Vec2(Vec2::new(4.0, 0.0))));
    }

    #[test]
    fn empty_path_has_no_value() {
        assert_eq!(Curve::Path(BezPath::new()).eval(0.5, false), None);
    }
}
