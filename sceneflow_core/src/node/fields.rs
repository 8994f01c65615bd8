// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Field reflection, field writes and change notification.

use alloc::vec::Vec;
use core::any::Any;

use crate::error::{Error, FieldRef, Result};
use crate::field::{self, Field, FieldDecl, FieldType};
use crate::graph::SceneGraph;
use crate::node::{FieldHook, NodeId, NodeLayout, RenderCallback, RenderSlot};
use crate::value::FieldValue;

impl SceneGraph {
    /// Field declarations for a layout (empty if the kind or proto is gone).
    pub(crate) fn decls(&self, layout: NodeLayout) -> &[FieldDecl] {
        match layout {
            NodeLayout::Kind(tag) => match self.kinds.get(tag) {
                Ok(kind) => kind.fields(),
                Err(_) => &[],
            },
            NodeLayout::Proto(p) => match self.protos.get(p) {
                Some(decl) => decl.interface(),
                None => &[],
            },
        }
    }

    pub(crate) fn decl(&self, node: NodeId, index: u32) -> Result<&FieldDecl> {
        let data = self.nodes.get(node).ok_or(Error::StaleNode(node))?;
        self.decls(data.layout)
            .get(index as usize)
            .ok_or(Error::FieldNotFound {
                node,
                field: FieldRef::Index(index),
            })
    }

    // -- Reflection --

    /// Number of fields on `node`.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] for a stale handle.
    pub fn field_count(&self, node: NodeId) -> Result<usize> {
        let data = self.nodes.get(node).ok_or(Error::StaleNode(node))?;
        Ok(data.fields.len())
    }

    /// Describes field `index` of `node`.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] or [`Error::FieldNotFound`].
    pub fn field(&self, node: NodeId, index: u32) -> Result<Field<'_>> {
        let data = self.nodes.get(node).ok_or(Error::StaleNode(node))?;
        let decl = self.decl(node, index)?;
        let value = data.fields.get(index as usize).ok_or(Error::FieldNotFound {
            node,
            field: FieldRef::Index(index),
        })?;
        Ok(Field {
            index,
            name: &decl.name,
            ty: decl.ty,
            event: decl.event,
            value,
        })
    }

    /// Returns the index of the field called `name`.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] or [`Error::FieldNotFound`].
    pub fn field_index(&self, node: NodeId, name: &str) -> Result<u32> {
        let data = self.nodes.get(node).ok_or(Error::StaleNode(node))?;
        field::index_of(self.decls(data.layout), name).ok_or_else(|| Error::FieldNotFound {
            node,
            field: FieldRef::Name(name.into()),
        })
    }

    /// Describes the field called `name` (linear lookup).
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] or [`Error::FieldNotFound`].
    pub fn field_by_name(&self, node: NodeId, name: &str) -> Result<Field<'_>> {
        let index = self.field_index(node, name)?;
        self.field(node, index)
    }

    /// Shorthand for the current value of field `index`.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] or [`Error::FieldNotFound`].
    pub fn field_value(&self, node: NodeId, index: u32) -> Result<&FieldValue> {
        self.field(node, index).map(|f| f.value)
    }

    // -- Writes --

    /// Writes `value` into field `index` and notifies dependents.
    ///
    /// Node-valued fields re-parent their children: newly referenced nodes
    /// are registered under `node`, dropped ones unregistered.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`], [`Error::FieldNotFound`], or
    /// [`Error::TypeMismatch`] if the value does not fit the field. Nothing is
    /// written on error.
    pub fn set_field(&mut self, node: NodeId, index: u32, value: FieldValue) -> Result<()> {
        self.write_field(node, index, value)?;
        self.notify_field_changed(node, index)
    }

    /// [`set_field`](Self::set_field) addressed by field name.
    ///
    /// # Errors
    ///
    /// As for [`set_field`](Self::set_field).
    pub fn set_field_by_name(&mut self, node: NodeId, name: &str, value: FieldValue) -> Result<()> {
        let index = self.field_index(node, name)?;
        self.set_field(node, index, value)
    }

    /// Writes without notifying. Decoders use this while populating initial
    /// values, then call [`notify_field_changed`](Self::notify_field_changed)
    /// if anything downstream should react.
    ///
    /// # Errors
    ///
    /// As for [`set_field`](Self::set_field).
    pub fn set_field_silent(&mut self, node: NodeId, index: u32, value: FieldValue) -> Result<()> {
        self.write_field(node, index, value).map(|_| ())
    }

    /// Type-checks and stores a value. Returns whether the stored value
    /// changed.
    pub(crate) fn write_field(&mut self, node: NodeId, index: u32, value: FieldValue) -> Result<bool> {
        let ty = self.decl(node, index)?.ty;
        let value = value.convert_to(ty).ok_or(Error::TypeMismatch {
            from: value.field_type(),
            to: ty,
        })?;
        let new_refs: Vec<NodeId> = value.node_refs().to_vec();
        if let Some(&stale) = new_refs.iter().find(|&&c| !self.nodes.contains(c)) {
            return Err(Error::StaleNode(stale));
        }
        let Some(data) = self.nodes.get_mut(node) else {
            return Err(Error::StaleNode(node));
        };
        let Some(slot) = data.fields.get_mut(index as usize) else {
            return Err(Error::FieldNotFound {
                node,
                field: FieldRef::Index(index),
            });
        };
        if *slot == value {
            return Ok(false);
        }
        let old = core::mem::replace(slot, value);
        if ty.is_node() {
            // Register before releasing so a child kept across the write
            // never drops to zero.
            for c in new_refs {
                if let Err(e) = self.register(c, Some(node)) {
                    log::warn!("cannot register {c:?} under {node:?}: {e}");
                }
            }
            for &c in old.node_refs() {
                if self.release_edge(c, Some(node)) {
                    self.destroy_node(c);
                }
            }
        }
        Ok(true)
    }

    /// Runs the reactions to a field write: marks the node dirty up to the
    /// root, calls the node's field hook and queues routes leaving the
    /// field.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] or [`Error::FieldNotFound`].
    pub fn notify_field_changed(&mut self, node: NodeId, index: u32) -> Result<()> {
        self.decl(node, index)?;
        self.react_to_write(node, index, true);
        Ok(())
    }

    /// Installs a hook called after every notified write to `node`.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] for a stale handle.
    pub fn set_field_hook(&mut self, node: NodeId, hook: Option<FieldHook>) -> Result<()> {
        let data = self.nodes.get_mut(node).ok_or(Error::StaleNode(node))?;
        data.hook = hook;
        Ok(())
    }

    // -- Children --

    fn children_index(&self, node: NodeId) -> Result<u32> {
        let data = self.nodes.get(node).ok_or(Error::StaleNode(node))?;
        let index = match data.layout {
            NodeLayout::Kind(tag) => self.kinds.get(tag)?.children_field(),
            NodeLayout::Proto(_) => field::index_of(self.decls(data.layout), "children")
                .filter(|&i| data.fields[i as usize].field_type() == FieldType::ANY_NODE),
        };
        index.ok_or_else(|| Error::FieldNotFound {
            node,
            field: FieldRef::Name("children".into()),
        })
    }

    /// Returns the `children` list of `node` (empty if it has none).
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        let Ok(index) = self.children_index(node) else {
            return &[];
        };
        match self.nodes.get(node).and_then(|n| n.fields.get(index as usize)) {
            Some(value) => value.node_refs(),
            None => &[],
        }
    }

    /// Appends `child` to the `children` field of `parent`.
    ///
    /// # Errors
    ///
    /// [`Error::FieldNotFound`] if `parent` has no `children` list, or
    /// [`Error::StaleNode`].
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let index = self.children_index(parent)?;
        let mut list = self.children(parent).to_vec();
        list.push(child);
        self.set_field(parent, index, FieldValue::Nodes(list))
    }

    /// Removes the first occurrence of `child` from `parent`'s `children`.
    ///
    /// Returns `false` if `child` was not there.
    ///
    /// # Errors
    ///
    /// [`Error::FieldNotFound`] if `parent` has no `children` list, or
    /// [`Error::StaleNode`].
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        let index = self.children_index(parent)?;
        let mut list = self.children(parent).to_vec();
        let Some(pos) = list.iter().position(|&c| c == child) else {
            return Ok(false);
        };
        list.remove(pos);
        self.set_field(parent, index, FieldValue::Nodes(list))?;
        Ok(true)
    }

    /// Removes `node` from every node-valued field of every parent.
    ///
    /// Parentless registrations are kept; a node placed only under parents is
    /// torn down once the last edge goes.
    pub(crate) fn detach_from_parents(&mut self, node: NodeId) {
        let mut parents = self.parents(node).to_vec();
        parents.sort_unstable();
        parents.dedup();
        for p in parents {
            let Some(data) = self.nodes.get(p) else {
                continue;
            };
            let edits: Vec<(u32, FieldValue)> = data
                .fields
                .iter()
                .enumerate()
                .filter_map(|(i, v)| {
                    let stripped = match v {
                        FieldValue::Node(Some(n)) if *n == node => FieldValue::Node(None),
                        FieldValue::Nodes(list) if list.contains(&node) => {
                            FieldValue::Nodes(list.iter().copied().filter(|&c| c != node).collect())
                        }
                        _ => return None,
                    };
                    Some((u32::try_from(i).ok()?, stripped))
                })
                .collect();
            for (i, v) in edits {
                if let Err(e) = self.set_field(p, i, v) {
                    log::warn!("cannot detach {node:?} from {p:?}.{i}: {e}");
                }
            }
        }
    }

    // -- Renderer slots --

    /// Installs the renderer callback for `node`.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] for a stale handle.
    pub fn set_render_callback(&mut self, node: NodeId, cb: Option<RenderCallback>) -> Result<()> {
        let data = self.nodes.get_mut(node).ok_or(Error::StaleNode(node))?;
        data.render = cb;
        Ok(())
    }

    /// Invokes the renderer callback of `node` with `ctx`.
    ///
    /// Returns `false` if the node has no callback or the handle is stale.
    pub fn render_node(&mut self, node: NodeId, ctx: &mut dyn Any) -> bool {
        let Some(cb) = self.nodes.get_mut(node).and_then(|n| n.render.as_mut()) else {
            return false;
        };
        cb(node, ctx, false);
        true
    }

    /// Stores the renderer's opaque handle for `node`.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] for a stale handle.
    pub fn set_render_slot(&mut self, node: NodeId, slot: Option<RenderSlot>) -> Result<()> {
        let data = self.nodes.get_mut(node).ok_or(Error::StaleNode(node))?;
        data.render_slot = slot;
        Ok(())
    }

    /// Returns the renderer's opaque handle for `node`.
    #[must_use]
    pub fn render_slot(&self, node: NodeId) -> Option<RenderSlot> {
        self.nodes.get(node)?.render_slot
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::rc::Rc;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::any::Any;
    use core::cell::RefCell;

    use crate::error::{Error, FieldRef};
    use crate::field::{EventKind, FieldDecl, FieldType, ValueKind};
    use crate::graph::SceneGraph;
    use crate::kind::NodeTag;
    use crate::node::{DirtyFlags, NodeId};
    use crate::value::FieldValue;

    fn float_kind(g: &mut SceneGraph) -> NodeTag {
        g.kinds_mut().register(
            "Scalar",
            vec![
                FieldDecl::new("x", FieldType::single(ValueKind::Float), EventKind::Exposed),
                FieldDecl::new("label", FieldType::single(ValueKind::String), EventKind::None),
            ],
        )
    }

    #[test]
    fn lookup_by_index_and_name_agree() {
        let mut g = SceneGraph::new();
        let tag = float_kind(&mut g);
        let n = g.new_node(tag).unwrap();
        assert_eq!(g.field_count(n), Ok(2));
        let by_name = g.field_by_name(n, "label").unwrap();
        assert_eq!(by_name.index, 1);
        assert_eq!(g.field(n, 1).unwrap().name, "label");
        assert_eq!(
            g.field(n, 5).map(|f| f.index),
            Err(Error::FieldNotFound {
                node: n,
                field: FieldRef::Index(5)
            })
        );
        assert!(matches!(
            g.field_by_name(n, "nope"),
            Err(Error::FieldNotFound { .. })
        ));
    }

    #[test]
    fn type_mismatch_leaves_field_unchanged() {
        let mut g = SceneGraph::new();
        let tag = float_kind(&mut g);
        let n = g.new_node(tag).unwrap();
        g.set_field(n, 0, FieldValue::Float(2.0)).unwrap();
        assert!(matches!(
            g.set_field(n, 0, FieldValue::Bool(true)),
            Err(Error::TypeMismatch { .. })
        ));
        assert_eq!(g.field_value(n, 0), Ok(&FieldValue::Float(2.0)));
    }

    #[test]
    fn notify_runs_hook_and_marks_dirty() {
        let mut g = SceneGraph::new();
        let tag = float_kind(&mut g);
        let n = g.new_node(tag).unwrap();
        g.register(n, None).unwrap();
        let seen: Rc<RefCell<Vec<u32>>> = Rc::default();
        let sink = seen.clone();
        g.set_field_hook(
            n,
            Some(Box::new(move |_: NodeId, i: u32, _: &FieldValue| {
                sink.borrow_mut().push(i);
            })),
        )
        .unwrap();
        g.set_field_silent(n, 0, FieldValue::Float(1.0)).unwrap();
        assert!(seen.borrow().is_empty(), "silent writes skip the hook");
        assert!(g.dirty_bits(n).is_empty());
        g.set_field(n, 0, FieldValue::Float(2.0)).unwrap();
        assert_eq!(*seen.borrow(), vec![0]);
        assert!(g.dirty_bits(n).contains(DirtyFlags::NODE));
    }

    #[test]
    fn node_fields_reparent_children() {
        let mut g = SceneGraph::new();
        let root = g.new_node(NodeTag::GROUP).unwrap();
        let a = g.new_node(NodeTag::GROUP).unwrap();
        let b = g.new_node(NodeTag::GROUP).unwrap();
        g.register(root, None).unwrap();
        g.set_field(root, 0, FieldValue::Nodes(vec![a, b])).unwrap();
        assert_eq!(g.parents(a), &[root]);
        // Single node values convert into the list field.
        g.set_field(root, 0, FieldValue::Node(Some(b))).unwrap();
        assert!(!g.contains(a), "dropped child is released");
        assert_eq!(g.instance_count(b), Some(1), "kept child is not double counted");
        assert_eq!(g.children(root), &[b]);
    }

    #[test]
    fn render_callback_sees_destroy() {
        let mut g = SceneGraph::new();
        let root = g.new_node(NodeTag::GROUP).unwrap();
        let a = g.new_node(NodeTag::GROUP).unwrap();
        g.register(root, None).unwrap();
        g.append_child(root, a).unwrap();
        let calls: Rc<RefCell<Vec<bool>>> = Rc::default();
        let sink = calls.clone();
        g.set_render_callback(
            a,
            Some(Box::new(move |_: NodeId, ctx: &mut dyn Any, destroy: bool| {
                if let Some(count) = ctx.downcast_mut::<u32>() {
                    *count += 1;
                }
                sink.borrow_mut().push(destroy);
            })),
        )
        .unwrap();
        let mut painted = 0_u32;
        assert!(g.render_node(a, &mut painted));
        assert_eq!(painted, 1);
        g.remove_child(root, a).unwrap();
        assert_eq!(*calls.borrow(), vec![false, true]);
    }
}
