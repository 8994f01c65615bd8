// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy for scene-graph operations.
//!
//! Every error is local and recoverable: an operation that returns `Err`
//! leaves the graph exactly as it was before the call.

use alloc::string::String;

use crate::field::FieldType;
use crate::node::NodeId;
use crate::route::RouteId;

/// Errors returned by [`SceneGraph`](crate::graph::SceneGraph) operations.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// A field index or name does not exist on the node.
    #[error("field {field} not found on {node:?}")]
    FieldNotFound {
        /// The node that was queried.
        node: NodeId,
        /// The index or name that failed to resolve.
        field: FieldRef,
    },
    /// A node tag or kind name is not registered.
    #[error("unknown node tag {0}")]
    UnknownTag(String),
    /// Another live node already holds this numeric id.
    #[error("node id {id} is already held by {holder:?}")]
    DuplicateId {
        /// The contested id.
        id: u32,
        /// The node currently holding it.
        holder: NodeId,
    },
    /// Two field types cannot exchange values.
    #[error("type mismatch: {from:?} cannot feed {to:?}")]
    TypeMismatch {
        /// Source type.
        from: FieldType,
        /// Destination type.
        to: FieldType,
    },
    /// A proto declaration still has live instances.
    #[error("proto `{name}` still has {instances} live instance(s)")]
    ProtoInUse {
        /// Proto name.
        name: String,
        /// Live instance count.
        instances: usize,
    },
    /// A proto name or handle does not resolve.
    #[error("unknown proto `{0}`")]
    UnknownProto(String),
    /// A proto template refers to something that does not exist or does not
    /// fit (an unknown field, a child list on a node without one).
    #[error("invalid template for proto `{proto}`: {reason}")]
    InvalidTemplate {
        /// Proto name.
        proto: String,
        /// What is wrong.
        reason: String,
    },
    /// A proto template instantiates itself, directly or indirectly.
    #[error("proto `{0}` references itself through its template")]
    CyclicProtoReference(String),
    /// A begin/end attribute or timing value could not be parsed or resolved.
    #[error("invalid interval specification: {0}")]
    InvalidInterval(String),
    /// Key/value tables or knot vectors are malformed.
    #[error("invalid curve: {0}")]
    InvalidCurve(&'static str),
    /// The node handle refers to a destroyed node.
    #[error("stale node handle {0:?}")]
    StaleNode(NodeId),
    /// The route handle refers to a destroyed route.
    #[error("stale route handle {0:?}")]
    StaleRoute(RouteId),
    /// A node was unregistered more often than it was registered.
    #[error("unbalanced unregister of {node:?} (parent {parent:?})")]
    UnbalancedUnregister {
        /// The node being unregistered.
        node: NodeId,
        /// The parent edge that was expected.
        parent: Option<NodeId>,
    },
}

/// How a field was addressed when a lookup failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldRef {
    /// By positional index.
    Index(u32),
    /// By name.
    Name(String),
}

impl core::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Name(n) => write!(f, "`{n}`"),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;
