// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arithmetic on field values.

use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::Vec2;

use crate::field::{FieldType, ValueKind};
use crate::value::{Color, FieldValue, Vec3};

/// Values an animation can blend.
///
/// Every operation returns `None` when the operands do not fit together
/// (different variants, list lengths that differ, or a type with no
/// arithmetic).
pub trait Interpolate: Sized {
    /// `self + (other - self) * t`.
    fn lerp(&self, other: &Self, t: f64) -> Option<Self>;
    /// Component-wise sum, for additive and accumulating animation.
    fn sum(&self, other: &Self) -> Option<Self>;
    /// Component-wise scaling.
    fn scaled(&self, k: f64) -> Option<Self>;
    /// Euclidean distance, for paced animation.
    fn distance(&self, other: &Self) -> Option<f64>;
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "single-precision fields store single-precision results"
)]
fn narrow(v: f64) -> f32 {
    v as f32
}

fn lerp_f64(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(a: Color, b: Color, t: f64) -> Color {
    let c = |x: f32, y: f32| narrow(lerp_f64(f64::from(x), f64::from(y), t));
    Color::new(c(a.r, b.r), c(a.g, b.g), c(a.b, b.b))
}

fn color_sum(a: Color, b: Color) -> Color {
    Color::new(a.r + b.r, a.g + b.g, a.b + b.b)
}

fn color_scaled(a: Color, k: f64) -> Color {
    let c = |x: f32| narrow(f64::from(x) * k);
    Color::new(c(a.r), c(a.g), c(a.b))
}

fn color_distance(a: Color, b: Color) -> f64 {
    let d = |x: f32, y: f32| f64::from(x) - f64::from(y);
    let (r, g, bl) = (d(a.r, b.r), d(a.g, b.g), d(a.b, b.b));
    (r * r + g * g + bl * bl).sqrt()
}

/// Applies `f` pairwise over two equally long lists.
fn zip_with<T: Copy>(a: &[T], b: &[T], f: impl Fn(T, T) -> T) -> Option<Vec<T>> {
    (a.len() == b.len()).then(|| a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect())
}

fn zip_distance<T: Copy>(a: &[T], b: &[T], f: impl Fn(T, T) -> f64) -> Option<f64> {
    (a.len() == b.len()).then(|| {
        a.iter()
            .zip(b)
            .map(|(&x, &y)| {
                let d = f(x, y);
                d * d
            })
            .sum::<f64>()
            .sqrt()
    })
}

impl Interpolate for FieldValue {
    fn lerp(&self, other: &Self, t: f64) -> Option<Self> {
        use FieldValue as V;
        Some(match (self, other) {
            (V::Float(a), V::Float(b)) => V::Float(narrow(lerp_f64(f64::from(*a), f64::from(*b), t))),
            (V::Double(a), V::Double(b)) => V::Double(lerp_f64(*a, *b, t)),
            (V::Time(a), V::Time(b)) => V::Time(lerp_f64(*a, *b, t)),
            (V::Vec2(a), V::Vec2(b)) => V::Vec2(a.lerp(*b, t)),
            (V::Vec3(a), V::Vec3(b)) => V::Vec3(*a + (*b - *a) * t),
            (V::Color(a), V::Color(b)) => V::Color(lerp_color(*a, *b, t)),
            (V::Floats(a), V::Floats(b)) => V::Floats(zip_with(a, b, |x, y| {
                narrow(lerp_f64(f64::from(x), f64::from(y), t))
            })?),
            (V::Vec2s(a), V::Vec2s(b)) => V::Vec2s(zip_with(a, b, |x, y| x.lerp(y, t))?),
            (V::Vec3s(a), V::Vec3s(b)) => V::Vec3s(zip_with(a, b, |x, y| x + (y - x) * t)?),
            (V::Colors(a), V::Colors(b)) => V::Colors(zip_with(a, b, |x, y| lerp_color(x, y, t))?),
            _ => return None,
        })
    }

    fn sum(&self, other: &Self) -> Option<Self> {
        use FieldValue as V;
        Some(match (self, other) {
            (V::Float(a), V::Float(b)) => V::Float(a + b),
            (V::Double(a), V::Double(b)) => V::Double(a + b),
            (V::Time(a), V::Time(b)) => V::Time(a + b),
            (V::Int32(a), V::Int32(b)) => V::Int32(a.wrapping_add(*b)),
            (V::Vec2(a), V::Vec2(b)) => V::Vec2(*a + *b),
            (V::Vec3(a), V::Vec3(b)) => V::Vec3(*a + *b),
            (V::Color(a), V::Color(b)) => V::Color(color_sum(*a, *b)),
            (V::Floats(a), V::Floats(b)) => V::Floats(zip_with(a, b, |x, y| x + y)?),
            (V::Vec2s(a), V::Vec2s(b)) => V::Vec2s(zip_with(a, b, |x, y| x + y)?),
            (V::Vec3s(a), V::Vec3s(b)) => V::Vec3s(zip_with(a, b, |x, y| x + y)?),
            (V::Colors(a), V::Colors(b)) => V::Colors(zip_with(a, b, color_sum)?),
            _ => return None,
        })
    }

    fn scaled(&self, k: f64) -> Option<Self> {
        use FieldValue as V;
        Some(match self {
            V::Float(a) => V::Float(narrow(f64::from(*a) * k)),
            V::Double(a) => V::Double(a * k),
            V::Time(a) => V::Time(a * k),
            V::Vec2(a) => V::Vec2(*a * k),
            V::Vec3(a) => V::Vec3(*a * k),
            V::Color(a) => V::Color(color_scaled(*a, k)),
            V::Floats(a) => V::Floats(a.iter().map(|&x| narrow(f64::from(x) * k)).collect()),
            V::Vec2s(a) => V::Vec2s(a.iter().map(|&x| x * k).collect()),
            V::Vec3s(a) => V::Vec3s(a.iter().map(|&x| x * k).collect()),
            V::Colors(a) => V::Colors(a.iter().map(|&x| color_scaled(x, k)).collect()),
            _ => return None,
        })
    }

    fn distance(&self, other: &Self) -> Option<f64> {
        use FieldValue as V;
        match (self, other) {
            (V::Float(a), V::Float(b)) => Some((f64::from(*a) - f64::from(*b)).abs()),
            (V::Double(a), V::Double(b)) | (V::Time(a), V::Time(b)) => Some((a - b).abs()),
            (V::Vec2(a), V::Vec2(b)) => Some((*a - *b).hypot()),
            (V::Vec3(a), V::Vec3(b)) => Some((*a - *b).length_squared().sqrt()),
            (V::Color(a), V::Color(b)) => Some(color_distance(*a, *b)),
            (V::Floats(a), V::Floats(b)) => zip_distance(a, b, |x, y| f64::from(x) - f64::from(y)),
            (V::Vec2s(a), V::Vec2s(b)) => zip_distance(a, b, |x: Vec2, y| (x - y).hypot()),
            (V::Vec3s(a), V::Vec3s(b)) => {
                zip_distance(a, b, |x: Vec3, y| (x - y).length_squared().sqrt())
            }
            (V::Colors(a), V::Colors(b)) => zip_distance(a, b, color_distance),
            _ => None,
        }
    }
}

/// Converts `value` for storage in a field of type `ty`, also crossing
/// between the scalar number types.
pub(crate) fn coerce(value: FieldValue, ty: FieldType) -> Option<FieldValue> {
    if value.field_type() == ty {
        return Some(value);
    }
    if !ty.multi {
        if let Some(x) = value.as_f64() {
            match ty.kind {
                ValueKind::Float => return Some(FieldValue::Float(narrow(x))),
                ValueKind::Double => return Some(FieldValue::Double(x)),
                ValueKind::Time => return Some(FieldValue::Time(x)),
                _ => {}
            }
        }
    }
    value.convert_to(ty)
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn scalars_and_vectors_lerp() {
        assert_eq!(
            FieldValue::Float(0.0).lerp(&FieldValue::Float(10.0), 0.25),
            Some(FieldValue::Float(2.5))
        );
        assert_eq!(
            FieldValue::Vec2(Vec2::new(0.0, 0.0)).lerp(&FieldValue::Vec2(Vec2::new(2.0, 4.0)), 0.5),
            Some(FieldValue::Vec2(Vec2::new(1.0, 2.0)))
        );
    }

    #[test]
    fn mismatched_operands_are_rejected() {
        assert_eq!(FieldValue::Float(0.0).lerp(&FieldValue::Double(1.0), 0.5), None);
        assert_eq!(
            FieldValue::Floats(vec![1.0]).sum(&FieldValue::Floats(vec![1.0, 2.0])),
            None
        );
        assert_eq!(FieldValue::Bool(true).scaled(2.0), None);
    }

    #[test]
    fn vector_distance_is_euclidean() {
        let d = FieldValue::Vec2(Vec2::new(0.0, 0.0))
            .distance(&FieldValue::Vec2(Vec2::new(3.0, 4.0)))
            .unwrap();
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn coerce_crosses_number_types() {
        assert_eq!(
            coerce(FieldValue::Double(0.5), FieldType::single(ValueKind::Float)),
            Some(FieldValue::Float(0.5))
        );
        assert_eq!(
            coerce(FieldValue::Bool(true), FieldType::single(ValueKind::Float)),
            None
        );
    }
}
