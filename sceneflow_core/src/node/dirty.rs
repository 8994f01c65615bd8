// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty flags and ancestor invalidation.
//!
//! # Propagation semantics
//!
//! [`mark_dirty`](SceneGraph::mark_dirty) sets bits on the node itself and,
//! when asked to propagate, walks the parent edges setting
//! [`DirtyFlags::CHILD`]. A branch stops ascending as soon as it reaches an
//! ancestor that is already child-dirty: everything above it was marked by an
//! earlier walk. A renderer that clears flags on only part of the tree must
//! therefore clear the ancestors too, or later changes below them will not
//! be reported.
//!
//! Reaching the root fires the graph-dirty callback.

use alloc::vec::Vec;

use crate::graph::SceneGraph;
use crate::node::NodeId;

bitflags::bitflags! {
    /// Per-node invalidation bits.
    ///
    /// The low byte is engine-defined. The remaining bits form an extended
    /// set for style-like properties that front ends may assign freely.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u32 {
        /// The node's own fields changed.
        const NODE = 1 << 0;
        /// A descendant changed.
        const CHILD = 1 << 1;
        /// Geometry-affecting property changed.
        const GEOMETRY = 1 << 8;
        /// Paint (fill / stroke) changed.
        const PAINT = 1 << 9;
        /// Transform changed.
        const TRANSFORM = 1 << 10;
        /// Opacity or visibility changed.
        const VISIBILITY = 1 << 11;
        /// Text content or font properties changed.
        const TEXT = 1 << 12;
        /// Mask of the extended, front-end defined bits.
        const EXTENDED = 0xFFFF_FF00;
    }
}

impl SceneGraph {
    /// Sets `flags` on `node`, optionally invalidating its ancestors.
    ///
    /// Stale handles are ignored.
    pub fn mark_dirty(&mut self, node: NodeId, flags: DirtyFlags, propagate_to_ancestors: bool) {
        let Some(data) = self.nodes.get_mut(node) else {
            return;
        };
        data.dirty |= flags;
        let mut reached_root = self.root == Some(node);
        if propagate_to_ancestors {
            let mut work: Vec<NodeId> = data.parents.clone();
            while let Some(p) = work.pop() {
                let Some(parent) = self.nodes.get_mut(p) else {
                    continue;
                };
                if parent.dirty.contains(DirtyFlags::CHILD) {
                    continue;
                }
                parent.dirty |= DirtyFlags::CHILD;
                if self.root == Some(p) {
                    reached_root = true;
                }
                work.extend_from_slice(&parent.parents);
            }
        }
        if reached_root {
            self.signal_graph_dirty();
        }
    }

    /// Clears `flags` on `node`.
    pub fn clear_dirty(&mut self, node: NodeId, flags: DirtyFlags) {
        if let Some(data) = self.nodes.get_mut(node) {
            data.dirty.remove(flags);
        }
    }

    /// Returns the dirty bits of `node` (empty for stale handles).
    #[must_use]
    pub fn dirty_bits(&self, node: NodeId) -> DirtyFlags {
        self.nodes
            .get(node)
            .map_or(DirtyFlags::empty(), |n| n.dirty)
    }

    /// Records that the graph needs redraw and notifies the host.
    pub(crate) fn signal_graph_dirty(&mut self) {
        self.graph_dirty = true;
        if let Some(cb) = self.on_dirty.as_mut() {
            cb();
        }
    }
}
