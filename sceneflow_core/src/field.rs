// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Field reflection.
//!
//! Every node exposes an ordered list of typed fields. A field is addressed
//! by its index, which is stable for a node kind (or proto interface) for the
//! lifetime of the graph. Lookup by name is a secondary, linear-time path.
//!
//! This module only describes fields; reading and writing go through
//! [`SceneGraph::field`](crate::graph::SceneGraph::field) and
//! [`SceneGraph::set_field`](crate::graph::SceneGraph::set_field).

use alloc::string::String;

use crate::value::FieldValue;

/// The scalar category of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Boolean.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// Time in seconds.
    Time,
    /// UTF-8 string.
    String,
    /// 2-D vector.
    Vec2,
    /// 3-D vector.
    Vec3,
    /// RGB colour.
    Color,
    /// Axis-angle rotation.
    Rotation,
    /// Node reference.
    Node,
}

impl ValueKind {
    /// Whether a list ("MF") form exists for this kind.
    #[must_use]
    pub const fn has_multi(self) -> bool {
        matches!(
            self,
            Self::Int32
                | Self::Float
                | Self::Vec2
                | Self::Vec3
                | Self::Color
                | Self::String
                | Self::Node
        )
    }

    /// Whether values of this kind can be numerically interpolated.
    #[must_use]
    pub const fn is_interpolable(self) -> bool {
        matches!(
            self,
            Self::Float | Self::Double | Self::Time | Self::Vec2 | Self::Vec3 | Self::Color
        )
    }
}

/// The full type of a field: scalar kind plus single/multi arity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldType {
    /// Scalar category.
    pub kind: ValueKind,
    /// Whether the field holds a list of values.
    pub multi: bool,
}

impl FieldType {
    /// Node-valued wildcard used for node and node-list routes.
    pub const ANY_NODE: Self = Self::multi(ValueKind::Node);

    /// A single-value field type.
    #[inline]
    #[must_use]
    pub const fn single(kind: ValueKind) -> Self {
        Self { kind, multi: false }
    }

    /// A multi-value field type.
    ///
    /// Kinds without a list form ([`ValueKind::has_multi`]) fall back to
    /// the single form.
    #[inline]
    #[must_use]
    pub const fn multi(kind: ValueKind) -> Self {
        Self {
            kind,
            multi: kind.has_multi(),
        }
    }

    /// Whether this is a node or node-list type.
    #[inline]
    #[must_use]
    pub const fn is_node(self) -> bool {
        matches!(self.kind, ValueKind::Node)
    }

    /// Whether a route may carry values from `from` into a field of this type.
    ///
    /// Types must match exactly, except that any node-valued type may feed
    /// any other node-valued type.
    #[must_use]
    pub fn accepts(self, from: Self) -> bool {
        self == from || (self.is_node() && from.is_node())
    }
}

/// How a field participates in event flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Plain stored field; not routable.
    #[default]
    None,
    /// Input only (`eventIn` / `inputOnly`).
    In,
    /// Output only (`eventOut` / `outputOnly`).
    Out,
    /// Both input and output (`exposedField` / `inputOutput`).
    Exposed,
}

impl EventKind {
    /// Whether a route may read from this field.
    #[inline]
    #[must_use]
    pub const fn can_emit(self) -> bool {
        matches!(self, Self::Out | Self::Exposed)
    }

    /// Whether a route may write into this field.
    #[inline]
    #[must_use]
    pub const fn can_receive(self) -> bool {
        matches!(self, Self::In | Self::Exposed)
    }
}

/// Declaration of one field in a node kind or proto interface.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: FieldType,
    /// Event participation.
    pub event: EventKind,
    /// Initial value for new nodes.
    pub default: FieldValue,
}

impl FieldDecl {
    /// Declares a field whose default is the type's zero value.
    #[must_use]
    pub fn new(name: &str, ty: FieldType, event: EventKind) -> Self {
        Self {
            name: name.into(),
            ty,
            event,
            default: FieldValue::default_for(ty),
        }
    }

    /// Declares an exposed field with an explicit default; the type is taken
    /// from the default value.
    #[must_use]
    pub fn exposed(name: &str, default: FieldValue) -> Self {
        Self {
            name: name.into(),
            ty: default.field_type(),
            event: EventKind::Exposed,
            default,
        }
    }

    /// Replaces the default value.
    #[must_use]
    pub fn with_default(mut self, default: FieldValue) -> Self {
        self.default = default;
        self
    }
}

/// A read-only view of one field of a live node.
#[derive(Clone, Copy, Debug)]
pub struct Field<'a> {
    /// Stable index within the node's field list.
    pub index: u32,
    /// Field name.
    pub name: &'a str,
    /// Field type.
    pub ty: FieldType,
    /// Event participation.
    pub event: EventKind,
    /// Current value.
    pub value: &'a FieldValue,
}

/// Finds a declaration by name and returns its index.
pub(crate) fn index_of(decls: &[FieldDecl], name: &str) -> Option<u32> {
    decls
        .iter()
        .position(|d| d.name == name)
        .and_then(|i| u32::try_from(i).ok())
}
