// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed field values.
//!
//! [`FieldValue`] is the storage variant behind every node field. Single-value
//! ("SF") and multi-value ("MF") forms are separate variants so that a value
//! always carries its own [`FieldType`].

use alloc::string::String;
use alloc::vec::Vec;
use core::ops::{Add, Mul, Sub};

use kurbo::Vec2;

use crate::field::{FieldType, ValueKind};
use crate::node::NodeId;

/// A three-component vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a vector from components.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[inline]
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Squared Euclidean length.
    #[inline]
    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// An RGB colour with components nominally in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
}

impl Color {
    /// Creates a colour from components.
    #[inline]
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// An axis-angle rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rotation {
    /// Rotation axis (not necessarily normalized).
    pub axis: Vec3,
    /// Angle in radians.
    pub angle: f64,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            axis: Vec3::new(0.0, 0.0, 1.0),
            angle: 0.0,
        }
    }
}

/// The value stored in a node field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// `SFBool`.
    Bool(bool),
    /// `SFInt32`.
    Int32(i32),
    /// `SFFloat`.
    Float(f32),
    /// `SFDouble`.
    Double(f64),
    /// `SFTime`, in seconds.
    Time(f64),
    /// `SFString`.
    String(String),
    /// `SFVec2f`.
    Vec2(Vec2),
    /// `SFVec3f`.
    Vec3(Vec3),
    /// `SFColor`.
    Color(Color),
    /// `SFRotation`.
    Rotation(Rotation),
    /// `SFNode`; `None` is the `NULL` node.
    Node(Option<NodeId>),
    /// `MFInt32`.
    Int32s(Vec<i32>),
    /// `MFFloat`.
    Floats(Vec<f32>),
    /// `MFVec2f`.
    Vec2s(Vec<Vec2>),
    /// `MFVec3f`.
    Vec3s(Vec<Vec3>),
    /// `MFColor`.
    Colors(Vec<Color>),
    /// `MFString`.
    Strings(Vec<String>),
    /// `MFNode`.
    Nodes(Vec<NodeId>),
}

impl FieldValue {
    /// Returns the default (zero / empty) value for a field type.
    #[must_use]
    pub fn default_for(ty: FieldType) -> Self {
        match (ty.kind, ty.multi) {
            (ValueKind::Bool, _) => Self::Bool(false),
            (ValueKind::Int32, false) => Self::Int32(0),
            (ValueKind::Int32, true) => Self::Int32s(Vec::new()),
            (ValueKind::Float, false) => Self::Float(0.0),
            (ValueKind::Float, true) => Self::Floats(Vec::new()),
            (ValueKind::Double, _) => Self::Double(0.0),
            (ValueKind::Time, _) => Self::Time(0.0),
            (ValueKind::String, false) => Self::String(String::new()),
            (ValueKind::String, true) => Self::Strings(Vec::new()),
            (ValueKind::Vec2, false) => Self::Vec2(Vec2::ZERO),
            (ValueKind::Vec2, true) => Self::Vec2s(Vec::new()),
            (ValueKind::Vec3, false) => Self::Vec3(Vec3::ZERO),
            (ValueKind::Vec3, true) => Self::Vec3s(Vec::new()),
            (ValueKind::Color, false) => Self::Color(Color::default()),
            (ValueKind::Color, true) => Self::Colors(Vec::new()),
            (ValueKind::Rotation, _) => Self::Rotation(Rotation::default()),
            (ValueKind::Node, false) => Self::Node(None),
            (ValueKind::Node, true) => Self::Nodes(Vec::new()),
        }
    }

    /// Returns the type tag of this value.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Bool(_) => FieldType::single(ValueKind::Bool),
            Self::Int32(_) => FieldType::single(ValueKind::Int32),
            Self::Float(_) => FieldType::single(ValueKind::Float),
            Self::Double(_) => FieldType::single(ValueKind::Double),
            Self::Time(_) => FieldType::single(ValueKind::Time),
            Self::String(_) => FieldType::single(ValueKind::String),
            Self::Vec2(_) => FieldType::single(ValueKind::Vec2),
            Self::Vec3(_) => FieldType::single(ValueKind::Vec3),
            Self::Color(_) => FieldType::single(ValueKind::Color),
            Self::Rotation(_) => FieldType::single(ValueKind::Rotation),
            Self::Node(_) => FieldType::single(ValueKind::Node),
            Self::Int32s(_) => FieldType::multi(ValueKind::Int32),
            Self::Floats(_) => FieldType::multi(ValueKind::Float),
            Self::Vec2s(_) => FieldType::multi(ValueKind::Vec2),
            Self::Vec3s(_) => FieldType::multi(ValueKind::Vec3),
            Self::Colors(_) => FieldType::multi(ValueKind::Color),
            Self::Strings(_) => FieldType::multi(ValueKind::String),
            Self::Nodes(_) => FieldType::multi(ValueKind::Node),
        }
    }

    /// Converts this value so it can be stored in a field of type `to`.
    ///
    /// Identical types copy as-is. Node-valued types convert between the
    /// single and list forms (a single node wraps into a one-element list; a
    /// list yields its first element). Everything else is rejected.
    #[must_use]
    pub fn convert_to(&self, to: FieldType) -> Option<Self> {
        if self.field_type() == to {
            return Some(self.clone());
        }
        match (self, to.kind, to.multi) {
            (Self::Node(n), ValueKind::Node, true) => Some(Self::Nodes(n.iter().copied().collect())),
            (Self::Nodes(list), ValueKind::Node, false) => Some(Self::Node(list.first().copied())),
            _ => None,
        }
    }

    /// Returns the nodes referenced by a node-valued field.
    #[must_use]
    pub fn node_refs(&self) -> &[NodeId] {
        match self {
            Self::Node(Some(n)) => core::slice::from_ref(n),
            Self::Nodes(list) => list,
            _ => &[],
        }
    }

    /// Returns the value as an `f64` if it is a scalar number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(f64::from(v)),
            Self::Double(v) | Self::Time(v) => Some(v),
            Self::Int32(v) => Some(f64::from(v)),
            _ => None,
        }
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<Vec2> for FieldValue {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<Vec3> for FieldValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<Color> for FieldValue {
    fn from(v: Color) -> Self {
        Self::Color(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.into())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::node::NodeId;

    #[test]
    fn default_matches_type() {
        for ty in [
            FieldType::single(ValueKind::Float),
            FieldType::multi(ValueKind::Node),
            FieldType::single(ValueKind::Vec3),
            FieldType::multi(ValueKind::String),
        ] {
            assert_eq!(FieldValue::default_for(ty).field_type(), ty, "{ty:?}");
        }
    }

    #[test]
    fn node_values_convert_between_forms() {
        let n = NodeId::from_raw_parts(3, 0);
        let single = FieldValue::Node(Some(n));
        assert_eq!(
            single.convert_to(FieldType::multi(ValueKind::Node)),
            Some(FieldValue::Nodes(vec![n]))
        );
        let list = FieldValue::Nodes(vec![n, NodeId::from_raw_parts(4, 0)]);
        assert_eq!(
            list.convert_to(FieldType::single(ValueKind::Node)),
            Some(FieldValue::Node(Some(n)))
        );
    }

    #[test]
    fn scalar_types_do_not_convert() {
        let v = FieldValue::Float(1.0);
        assert!(v.convert_to(FieldType::single(ValueKind::Double)).is_none());
        assert!(v.convert_to(FieldType::single(ValueKind::Float)).is_some());
    }
}
