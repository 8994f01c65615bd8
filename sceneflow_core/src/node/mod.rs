// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node registry and lifecycle.
//!
//! Nodes live in an arena owned by the [`SceneGraph`](crate::graph::SceneGraph)
//! and are addressed by generational [`NodeId`] handles. A node may appear in
//! several places of the scene at once (DEF/USE): each placement increments
//! its instance count and records a parent edge. Parent edges are plain
//! handles used only to invalidate ancestors; they never keep a node alive.
//!
//! Lifecycle:
//!
//! ```text
//! new_node ──► (count 0, detached) ──register──► live (count > 0)
//!                                                   │
//!                       last unregister ◄───────────┘
//!                              │
//!                              ▼
//!         teardown: children unregistered, id released,
//!         routes queued for destruction, listeners dropped
//! ```
//!
//! The operations are methods on `SceneGraph`, split across
//! [`store`](self::store) (lifecycle, ids), [`fields`](self::fields) (field
//! reflection and writes) and [`dirty`](self::dirty) (invalidation).

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use crate::anim::Animator;
use crate::event::ListenerId;
use crate::id::{Handle, kinds};
use crate::kind::NodeTag;
use crate::proto::ProtoId;
use crate::route::RouteId;
use crate::smil::TimingRuntime;
use crate::value::FieldValue;

pub mod dirty;
pub mod fields;
pub mod store;

pub use dirty::DirtyFlags;

/// Handle to a node in a [`SceneGraph`](crate::graph::SceneGraph).
pub type NodeId = Handle<kinds::Node>;

/// Opaque per-node handle owned by an external renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderSlot(pub u64);

/// Renderer callback: `(node, render_context, is_destroy)`.
///
/// Called by [`SceneGraph::render_node`](crate::graph::SceneGraph::render_node)
/// during an externally driven traversal, and once more with
/// `is_destroy = true` when the node is torn down.
pub type RenderCallback = Box<dyn FnMut(NodeId, &mut dyn Any, bool)>;

/// Field-modified hook: `(node, field_index, new_value)`.
pub type FieldHook = Box<dyn FnMut(NodeId, u32, &FieldValue)>;

/// What defines a node's field layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeLayout {
    /// A registered node kind.
    Kind(NodeTag),
    /// An instance of a proto; the layout is the proto's interface.
    Proto(ProtoId),
}

pub(crate) struct NodeData {
    pub(crate) layout: NodeLayout,
    pub(crate) fields: Vec<FieldValue>,
    pub(crate) instance_count: u32,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) dirty: DirtyFlags,
    pub(crate) id: Option<u32>,
    pub(crate) name: Option<String>,
    /// Routes with this node at either end.
    pub(crate) routes: Vec<RouteId>,
    /// Listeners observing this node, in registration order.
    pub(crate) listeners: Vec<ListenerId>,
    pub(crate) render: Option<RenderCallback>,
    pub(crate) render_slot: Option<RenderSlot>,
    pub(crate) hook: Option<FieldHook>,
    /// Private sub-graph roots of a proto instance.
    pub(crate) inner: Vec<NodeId>,
    /// Extern proto instance still waiting for its library.
    pub(crate) stub: bool,
    pub(crate) timing: Option<Box<TimingRuntime>>,
    pub(crate) animator: Option<Animator>,
}

impl NodeData {
    pub(crate) fn new(layout: NodeLayout, fields: Vec<FieldValue>) -> Self {
        Self {
            layout,
            fields,
            instance_count: 0,
            parents: Vec::new(),
            dirty: DirtyFlags::empty(),
            id: None,
            name: None,
            routes: Vec::new(),
            listeners: Vec::new(),
            render: None,
            render_slot: None,
            hook: None,
            inner: Vec::new(),
            stub: false,
            timing: None,
            animator: None,
        }
    }
}

impl fmt::Debug for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeData")
            .field("layout", &self.layout)
            .field("instance_count", &self.instance_count)
            .field("parents", &self.parents)
            .field("dirty", &self.dirty)
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
