// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node allocation, instance counting, teardown and the id table.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::graph::SceneGraph;
use crate::kind::NodeTag;
use crate::node::{NodeData, NodeId, NodeLayout};

/// Numeric ids below this bound live in a dense table; larger ones spill into
/// a hash map.
const DENSE_ID_LIMIT: u32 = 1 << 16;

impl SceneGraph {
    // -- Allocation --

    /// Allocates a node of the given kind with default field values.
    ///
    /// The node starts with an instance count of zero and is not part of the
    /// scene until it is [registered](Self::register).
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTag`] if the kind is not registered.
    pub fn new_node(&mut self, tag: NodeTag) -> Result<NodeId> {
        let kind = self.kinds.get(tag)?;
        let fields = kind.fields().iter().map(|d| d.default.clone()).collect();
        Ok(self
            .nodes
            .insert(NodeData::new(NodeLayout::Kind(tag), fields)))
    }

    /// Allocates a node by kind name.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTag`] if no kind has this name.
    pub fn new_node_by_name(&mut self, kind: &str) -> Result<NodeId> {
        let tag = self.kinds.tag_by_name(kind)?;
        self.new_node(tag)
    }

    /// Whether `node` refers to an allocated node (registered or not).
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(node)
    }

    /// Whether `node` is allocated and has a positive instance count.
    #[must_use]
    pub fn is_live(&self, node: NodeId) -> bool {
        self.nodes.get(node).is_some_and(|n| n.instance_count > 0)
    }

    /// Returns the instance count, or `None` for stale handles.
    #[must_use]
    pub fn instance_count(&self, node: NodeId) -> Option<u32> {
        self.nodes.get(node).map(|n| n.instance_count)
    }

    /// Returns the parent edges of `node`, one per parented registration.
    #[must_use]
    pub fn parents(&self, node: NodeId) -> &[NodeId] {
        match self.nodes.get(node) {
            Some(n) => &n.parents,
            None => &[],
        }
    }

    /// Returns what defines the node's field layout.
    #[must_use]
    pub fn layout(&self, node: NodeId) -> Option<NodeLayout> {
        self.nodes.get(node).map(|n| n.layout)
    }

    /// Returns the node's kind tag, or `None` for proto instances and stale
    /// handles.
    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<NodeTag> {
        match self.layout(node)? {
            NodeLayout::Kind(tag) => Some(tag),
            NodeLayout::Proto(_) => None,
        }
    }

    /// Number of allocated nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // -- Registration --

    /// Adds one placement of `node`, optionally under `parent`.
    ///
    /// The first parentless registration while the graph has no root makes
    /// `node` the root.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] if either handle is stale.
    pub fn register(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<()> {
        if let Some(p) = parent {
            if !self.nodes.contains(p) {
                return Err(Error::StaleNode(p));
            }
        }
        let data = self.nodes.get_mut(node).ok_or(Error::StaleNode(node))?;
        data.instance_count += 1;
        match parent {
            Some(p) => data.parents.push(p),
            None => {
                if self.root.is_none() {
                    self.root = Some(node);
                }
            }
        }
        Ok(())
    }

    /// Removes one placement of `node` (and the matching parent edge).
    ///
    /// When the count reaches zero the node is torn down: node-valued fields
    /// and proto sub-graphs are unregistered from it, its id is released,
    /// its routes are queued for destruction and its listeners dropped.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] for a stale handle.
    /// [`Error::UnbalancedUnregister`] if there is no matching registration.
    /// This is also a debug assertion.
    pub fn unregister(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<()> {
        let data = self.nodes.get(node).ok_or(Error::StaleNode(node))?;
        let balanced = match parent {
            Some(p) => data.parents.contains(&p),
            None => data.instance_count as usize > data.parents.len(),
        };
        debug_assert!(
            balanced,
            "unbalanced unregister of {node:?} (parent {parent:?})"
        );
        if !balanced {
            log::error!("unbalanced unregister of {node:?} (parent {parent:?})");
            return Err(Error::UnbalancedUnregister { node, parent });
        }
        if self.release_edge(node, parent) {
            self.destroy_node(node);
        }
        Ok(())
    }

    /// Drops one registration without balance checks.
    ///
    /// Returns `true` when the count reached zero; the caller is responsible
    /// for tearing the node down.
    pub(crate) fn release_edge(&mut self, node: NodeId, parent: Option<NodeId>) -> bool {
        let Some(data) = self.nodes.get_mut(node) else {
            return false;
        };
        if let Some(p) = parent {
            if let Some(i) = data.parents.iter().position(|&q| q == p) {
                data.parents.remove(i);
            }
        }
        data.instance_count = data.instance_count.saturating_sub(1);
        data.instance_count == 0
    }

    /// Tears down `node` and everything that only it kept alive.
    ///
    /// Uses a worklist so deep or wide subtrees never recurse.
    pub(crate) fn destroy_node(&mut self, node: NodeId) {
        let mut work = vec![node];
        while let Some(n) = work.pop() {
            let Some(mut data) = self.nodes.remove(n) else {
                continue;
            };
            log::trace!("tearing down {n:?}");
            if let Some(cb) = data.render.as_mut() {
                cb(n, &mut (), true);
            }
            if let Some(id) = data.id {
                self.release_id(id, n);
            }
            if self.root == Some(n) {
                self.root = None;
            }
            for r in data.routes.drain(..) {
                self.destroy_route_quiet(r);
            }
            for l in data.listeners.drain(..) {
                if let Some(handler) = self.drop_listener(l) {
                    if self.release_edge(handler, None) {
                        work.push(handler);
                    }
                }
            }
            self.forget_timed(n, data.timing.take());
            if let NodeLayout::Proto(p) = data.layout {
                self.forget_instance(p, n);
            }
            let mut children: Vec<NodeId> = data
                .fields
                .iter()
                .flat_map(|v| v.node_refs().iter().copied())
                .collect();
            children.append(&mut data.inner);
            for c in children {
                if self.release_edge(c, Some(n)) {
                    work.push(c);
                }
            }
        }
    }

    // -- Identity --

    /// Assigns (or clears) the numeric id and name of `node`.
    ///
    /// Pending SMIL references are retried afterwards, since they may name
    /// this node.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] for a stale handle.
    /// [`Error::DuplicateId`] if another node already holds `id`. The node
    /// is left unchanged in both cases.
    pub fn set_id(&mut self, node: NodeId, id: Option<u32>, name: Option<&str>) -> Result<()> {
        if !self.nodes.contains(node) {
            return Err(Error::StaleNode(node));
        }
        if let Some(id) = id {
            if let Some(holder) = self.find_by_id(id) {
                if holder != node {
                    return Err(Error::DuplicateId { id, holder });
                }
            }
        }
        let Some(data) = self.nodes.get_mut(node) else {
            return Err(Error::StaleNode(node));
        };
        let old = core::mem::replace(&mut data.id, id);
        data.name = name.map(Into::into);
        if let Some(old) = old {
            self.release_id(old, node);
        }
        if let Some(id) = id {
            if id < DENSE_ID_LIMIT {
                let slot = id as usize;
                if self.ids.len() <= slot {
                    self.ids.resize(slot + 1, None);
                }
                self.ids[slot] = Some(node);
            } else {
                self.sparse_ids.insert(id, node);
            }
        }
        self.retry_pending_refs();
        Ok(())
    }

    fn release_id(&mut self, id: u32, node: NodeId) {
        if id < DENSE_ID_LIMIT {
            if let Some(slot) = self.ids.get_mut(id as usize) {
                if *slot == Some(node) {
                    *slot = None;
                }
            }
        } else if self.sparse_ids.get(&id) == Some(&node) {
            self.sparse_ids.remove(&id);
        }
    }

    /// Returns the numeric id of `node`.
    #[must_use]
    pub fn node_id(&self, node: NodeId) -> Option<u32> {
        self.nodes.get(node)?.id
    }

    /// Returns the name of `node`.
    #[must_use]
    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node)?.name.as_deref()
    }

    /// Looks up a node by numeric id.
    #[must_use]
    pub fn find_by_id(&self, id: u32) -> Option<NodeId> {
        if id < DENSE_ID_LIMIT {
            self.ids.get(id as usize).copied().flatten()
        } else {
            self.sparse_ids.get(&id).copied()
        }
    }

    /// Looks up a node by name (linear scan; first match in slot order).
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| n.name.as_deref() == Some(name))
            .map(|(h, _)| h)
    }

    /// Resolves a SMIL-style element reference: by name first, then as a
    /// numeric id.
    pub(crate) fn resolve_ref(&self, reference: &str) -> Option<NodeId> {
        self.find_by_name(reference).or_else(|| {
            reference
                .parse::<u32>()
                .ok()
                .and_then(|id| self.find_by_id(id))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::graph::SceneGraph;
    use crate::kind::NodeTag;

    #[test]
    fn node_is_reachable_iff_count_positive() {
        let mut g = SceneGraph::new();
        let root = g.new_node(NodeTag::GROUP).unwrap();
        let a = g.new_node(NodeTag::GROUP).unwrap();
        g.register(root, None).unwrap();
        g.set_id(a, Some(7), Some("a")).unwrap();

        // Two placements (DEF + USE).
        g.register(a, Some(root)).unwrap();
        g.register(a, Some(root)).unwrap();
        assert_eq!(g.instance_count(a), Some(2));
        assert_eq!(g.parents(a).len(), 2);

        g.unregister(a, Some(root)).unwrap();
        assert!(g.is_live(a));
        assert_eq!(g.find_by_id(7), Some(a));

        g.unregister(a, Some(root)).unwrap();
        assert!(!g.contains(a), "last unregister frees the node");
        assert_eq!(g.find_by_id(7), None);
        assert_eq!(g.find_by_name("a"), None);
    }

    #[test]
    fn teardown_releases_field_children() {
        let mut g = SceneGraph::new();
        let root = g.new_node(NodeTag::GROUP).unwrap();
        let mid = g.new_node(NodeTag::GROUP).unwrap();
        let shared = g.new_node(NodeTag::GROUP).unwrap();
        let other = g.new_node(NodeTag::GROUP).unwrap();
        g.register(root, None).unwrap();
        g.append_child(root, mid).unwrap();
        g.append_child(root, other).unwrap();
        g.append_child(mid, shared).unwrap();
        g.append_child(other, shared).unwrap();

        assert!(g.remove_child(root, mid).unwrap());
        assert!(!g.contains(mid));
        assert_eq!(g.instance_count(shared), Some(1), "still used by `other`");
        assert_eq!(g.parents(shared), &[other]);
    }

    #[test]
    fn duplicate_id_is_rejected_without_mutation() {
        let mut g = SceneGraph::new();
        let a = g.new_node(NodeTag::GROUP).unwrap();
        let b = g.new_node(NodeTag::GROUP).unwrap();
        g.set_id(a, Some(1), Some("a")).unwrap();
        g.set_id(b, Some(2), Some("b")).unwrap();
        assert_eq!(
            g.set_id(b, Some(1), Some("renamed")),
            Err(Error::DuplicateId { id: 1, holder: a })
        );
        assert_eq!(g.node_id(b), Some(2));
        assert_eq!(g.node_name(b), Some("b"));
        // Re-assigning a node its own id is fine.
        assert!(g.set_id(a, Some(1), None).is_ok());
    }

    #[test]
    fn large_ids_use_the_sparse_table() {
        let mut g = SceneGraph::new();
        let a = g.new_node(NodeTag::GROUP).unwrap();
        g.set_id(a, Some(4_000_000_000), None).unwrap();
        assert_eq!(g.find_by_id(4_000_000_000), Some(a));
        g.set_id(a, None, None).unwrap();
        assert_eq!(g.find_by_id(4_000_000_000), None);
    }

    #[test]
    fn first_parentless_registration_becomes_root() {
        let mut g = SceneGraph::new();
        let a = g.new_node(NodeTag::GROUP).unwrap();
        let b = g.new_node(NodeTag::GROUP).unwrap();
        g.register(a, None).unwrap();
        g.register(b, None).unwrap();
        assert_eq!(g.root(), Some(a));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut g = SceneGraph::new();
        assert!(matches!(
            g.new_node(NodeTag(1000)),
            Err(Error::UnknownTag(_))
        ));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unbalanced unregister")]
    fn unbalanced_unregister_asserts_in_debug() {
        let mut g = SceneGraph::new();
        let a = g.new_node(NodeTag::GROUP).unwrap();
        let _ = g.unregister(a, None);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn unbalanced_unregister_is_an_error_in_release() {
        let mut g = SceneGraph::new();
        let a = g.new_node(NodeTag::GROUP).unwrap();
        assert_eq!(
            g.unregister(a, None),
            Err(Error::UnbalancedUnregister { node: a, parent: None })
        );
    }
}
