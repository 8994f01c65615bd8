// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Protos: parameterized sub-graph templates.
//!
//! A proto declaration pairs a field interface with a [`ProtoTemplate`].
//! [`instantiate`](SceneGraph::instantiate) creates a node whose fields are
//! the interface (private storage, one value per instance) and builds a fresh
//! copy of the template underneath it. `IS` bindings connect the interface to
//! fields of the inner nodes through ordinary routes:
//!
//! ```text
//!   in / dyn:   instance.field ──► inner.field
//!   out / dyn:  inner.field    ──► instance.field
//!   field:      value copied into inner.field once, at build time
//! ```
//!
//! Extern protos carry a library URL instead of a template. Their instances
//! start as stubs and are completed when the host's
//! [`LibraryResolver`](crate::host::LibraryResolver) produces the library.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::field::{self, EventKind, FieldDecl};
use crate::graph::SceneGraph;
use crate::id::{Handle, kinds};
use crate::kind::NodeTag;
use crate::node::{DirtyFlags, NodeData, NodeId, NodeLayout};
use crate::value::FieldValue;

/// Handle to a proto declaration.
pub type ProtoId = Handle<kinds::Proto>;

/// The kind of a template node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateKind {
    /// A registered kind, by tag.
    Tag(NodeTag),
    /// A registered kind, by name.
    Named(String),
    /// An instance of another proto, by name.
    Proto(String),
}

/// A template node kind, resolved when the template is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResolvedKind {
    Kind(NodeTag),
    Proto(ProtoId),
}

#[derive(Clone, Debug)]
struct TemplateNode {
    kind: TemplateKind,
    values: Vec<(String, FieldValue)>,
    children: Vec<usize>,
}

#[derive(Clone, Debug)]
struct TemplateRoute {
    from: usize,
    from_field: String,
    to: usize,
    to_field: String,
}

#[derive(Clone, Debug)]
struct IsBinding {
    interface: String,
    node: usize,
    field: String,
}

/// Description of the sub-graph a proto instance builds.
///
/// Nodes are addressed by the index returned from [`node`](Self::node).
/// Nodes that are nobody's child become roots, registered under the
/// instance.
#[derive(Clone, Debug, Default)]
pub struct ProtoTemplate {
    nodes: Vec<TemplateNode>,
    routes: Vec<TemplateRoute>,
    bindings: Vec<IsBinding>,
}

impl ProtoTemplate {
    /// Creates an empty template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its index.
    pub fn node(&mut self, kind: TemplateKind) -> usize {
        self.nodes.push(TemplateNode {
            kind,
            values: Vec::new(),
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Sets an initial field value on a template node.
    pub fn set(&mut self, node: usize, field: &str, value: FieldValue) -> &mut Self {
        if let Some(n) = self.nodes.get_mut(node) {
            n.values.push((field.into(), value));
        }
        self
    }

    /// Appends `child` to the `children` field of `parent`.
    pub fn child(&mut self, parent: usize, child: usize) -> &mut Self {
        if let Some(n) = self.nodes.get_mut(parent) {
            n.children.push(child);
        }
        self
    }

    /// Adds an internal route.
    pub fn route(&mut self, from: usize, from_field: &str, to: usize, to_field: &str) -> &mut Self {
        self.routes.push(TemplateRoute {
            from,
            from_field: from_field.into(),
            to,
            to_field: to_field.into(),
        });
        self
    }

    /// Binds interface field `interface` to `node.field` (`IS`).
    pub fn bind(&mut self, interface: &str, node: usize, field: &str) -> &mut Self {
        self.bindings.push(IsBinding {
            interface: interface.into(),
            node,
            field: field.into(),
        });
        self
    }

    fn proto_refs(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.iter().filter_map(|n| match &n.kind {
            TemplateKind::Proto(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// A set of proto templates delivered by a
/// [`LibraryResolver`](crate::host::LibraryResolver).
#[derive(Clone, Debug, Default)]
pub struct ProtoLibrary {
    protos: HashMap<String, ProtoTemplate>,
}

impl ProtoLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a template.
    pub fn insert(&mut self, name: &str, template: ProtoTemplate) {
        self.protos.insert(name.into(), template);
    }

    /// Looks up a template by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ProtoTemplate> {
        self.protos.get(name)
    }
}

/// A proto declaration.
#[derive(Clone, Debug)]
pub struct ProtoDecl {
    name: String,
    interface: Vec<FieldDecl>,
    template: Option<ProtoTemplate>,
    /// Kind of each template node, fixed at declaration (or resolution) so
    /// later redeclarations do not change existing protos.
    resolved: Vec<ResolvedKind>,
    extern_url: Option<String>,
    extern_failed: bool,
    instances: Vec<NodeId>,
}

impl ProtoDecl {
    /// Proto name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field interface.
    #[must_use]
    pub fn interface(&self) -> &[FieldDecl] {
        &self.interface
    }

    /// Library URL of an extern proto.
    #[must_use]
    pub fn extern_url(&self) -> Option<&str> {
        self.extern_url.as_deref()
    }

    /// Whether the template is available.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.template.is_some()
    }

    /// Live instances.
    #[must_use]
    pub fn instances(&self) -> &[NodeId] {
        &self.instances
    }
}

fn invalid(proto: &str, reason: String) -> Error {
    Error::InvalidTemplate {
        proto: proto.into(),
        reason,
    }
}

impl SceneGraph {
    /// Declares a proto with a local template.
    ///
    /// The template is checked against the interface and the registered
    /// kinds before anything is stored. Kind and proto names in the template
    /// are resolved here: redeclaring a proto or re-registering a kind later
    /// does not affect this one.
    ///
    /// # Errors
    ///
    /// [`Error::CyclicProtoReference`] if the template instantiates this
    /// proto, directly or through other protos. [`Error::UnknownProto`],
    /// [`Error::UnknownTag`], [`Error::InvalidTemplate`] or
    /// [`Error::TypeMismatch`] for templates that do not resolve.
    pub fn declare_proto(
        &mut self,
        name: &str,
        interface: Vec<FieldDecl>,
        template: ProtoTemplate,
    ) -> Result<ProtoId> {
        let resolved = self.check_template(name, &interface, &template)?;
        Ok(self.insert_proto(ProtoDecl {
            name: name.into(),
            interface,
            template: Some(template),
            resolved,
            extern_url: None,
            extern_failed: false,
            instances: Vec::new(),
        }))
    }

    /// Declares a proto whose template lives in an external library.
    ///
    /// A `#Name` fragment on `url` selects the template; without one the
    /// proto's own name is used.
    pub fn declare_extern_proto(&mut self, name: &str, interface: Vec<FieldDecl>, url: &str) -> ProtoId {
        self.insert_proto(ProtoDecl {
            name: name.into(),
            interface,
            template: None,
            resolved: Vec::new(),
            extern_url: Some(url.into()),
            extern_failed: false,
            instances: Vec::new(),
        })
    }

    fn insert_proto(&mut self, decl: ProtoDecl) -> ProtoId {
        let name = decl.name.clone();
        let id = self.protos.insert(decl);
        self.proto_names.insert(name, id);
        id
    }

    /// Looks up a declaration.
    #[must_use]
    pub fn proto(&self, proto: ProtoId) -> Option<&ProtoDecl> {
        self.protos.get(proto)
    }

    /// Looks up a proto by name (the most recent declaration wins).
    #[must_use]
    pub fn find_proto(&self, name: &str) -> Option<ProtoId> {
        self.proto_names.get(name).copied()
    }

    /// Removes a declaration.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownProto`] for a stale handle; [`Error::ProtoInUse`] while
    /// instances are live.
    pub fn remove_proto(&mut self, proto: ProtoId) -> Result<()> {
        let decl = self
            .protos
            .get(proto)
            .ok_or_else(|| Error::UnknownProto(format!("{proto:?}")))?;
        if !decl.instances.is_empty() {
            return Err(Error::ProtoInUse {
                name: decl.name.clone(),
                instances: decl.instances.len(),
            });
        }
        if let Some(decl) = self.protos.remove(proto) {
            if self.proto_names.get(&decl.name) == Some(&proto) {
                self.proto_names.remove(&decl.name);
            }
        }
        Ok(())
    }

    /// Creates an instance of `proto`.
    ///
    /// The instance starts with the interface defaults and, like any new
    /// node, an instance count of zero. Extern protos that are not resolved
    /// yet produce a stub that is completed by a later
    /// [`advance`](Self::advance).
    ///
    /// # Errors
    ///
    /// [`Error::UnknownProto`] if `proto` or a proto its template uses is
    /// gone. [`Error::StaleNode`] if a template value names a node that has
    /// been torn down since. Nothing is created on error.
    pub fn instantiate(&mut self, proto: ProtoId) -> Result<NodeId> {
        let decl = self
            .protos
            .get(proto)
            .ok_or_else(|| Error::UnknownProto(format!("{proto:?}")))?;
        let template = decl.template.clone();
        let resolved = decl.resolved.clone();
        if template.is_some() {
            self.check_instantiable(&resolved)?;
        }
        let fields = decl.interface.iter().map(|d| d.default.clone()).collect();
        let inst = self
            .nodes
            .insert(NodeData::new(NodeLayout::Proto(proto), fields));
        if let Some(decl) = self.protos.get_mut(proto) {
            decl.instances.push(inst);
        }
        match template {
            Some(t) => {
                if let Err(e) = self.build_instance(inst, proto, &t, &resolved) {
                    self.destroy_node(inst);
                    return Err(e);
                }
            }
            None => {
                if let Some(n) = self.nodes.get_mut(inst) {
                    n.stub = true;
                }
                self.stubs.push(inst);
            }
        }
        Ok(inst)
    }

    /// Instantiates a proto by name.
    ///
    /// # Errors
    ///
    /// As for [`instantiate`](Self::instantiate).
    pub fn instantiate_by_name(&mut self, name: &str) -> Result<NodeId> {
        let proto = self
            .find_proto(name)
            .ok_or_else(|| Error::UnknownProto(name.into()))?;
        self.instantiate(proto)
    }

    /// Roots of the private sub-graph of a proto instance.
    #[must_use]
    pub fn instance_roots(&self, node: NodeId) -> &[NodeId] {
        match self.nodes.get(node) {
            Some(n) => &n.inner,
            None => &[],
        }
    }

    /// Whether `node` is an extern proto instance still waiting for its
    /// library.
    #[must_use]
    pub fn is_stub(&self, node: NodeId) -> bool {
        self.nodes.get(node).is_some_and(|n| n.stub)
    }

    pub(crate) fn forget_instance(&mut self, proto: ProtoId, node: NodeId) {
        if let Some(decl) = self.protos.get_mut(proto) {
            decl.instances.retain(|&n| n != node);
        }
        self.stubs.retain(|&n| n != node);
    }

    /// Polls the library resolver for every proto that still has stubs,
    /// completes the stubs it can and marks the rest dirty so the host keeps
    /// ticking. Returns the number of protos resolved.
    pub fn poll_extern_protos(&mut self) -> u32 {
        if self.stubs.is_empty() {
            return 0;
        }
        let mut pending: Vec<ProtoId> = Vec::new();
        for &s in &self.stubs {
            if let Some(NodeLayout::Proto(p)) = self.nodes.get(s).map(|n| n.layout) {
                if !pending.contains(&p) {
                    pending.push(p);
                }
            }
        }
        let mut resolved = 0;
        if let Some(mut resolver) = self.resolver.take() {
            let mut fetched: HashMap<String, Option<ProtoLibrary>> = HashMap::new();
            for p in pending {
                let Some(decl) = self.protos.get(p) else {
                    continue;
                };
                let (Some(url), false) = (decl.extern_url.clone(), decl.extern_failed) else {
                    continue;
                };
                let (base, fragment) = match url.split_once('#') {
                    Some((base, fragment)) => (base.to_string(), fragment.to_string()),
                    None => (url.clone(), decl.name.clone()),
                };
                let library = fetched
                    .entry(base.clone())
                    .or_insert_with(|| resolver.resolve(&base));
                let Some(library) = library else {
                    continue;
                };
                let Some(template) = library.get(&fragment).cloned() else {
                    log::warn!("library `{base}` has no proto `{fragment}`");
                    if let Some(decl) = self.protos.get_mut(p) {
                        decl.extern_failed = true;
                    }
                    continue;
                };
                let name = decl.name.clone();
                let interface = decl.interface.clone();
                let kinds = match self.check_template(&name, &interface, &template) {
                    Ok(kinds) => kinds,
                    Err(e) => {
                        log::warn!("extern proto `{name}` from `{url}` rejected: {e}");
                        if let Some(decl) = self.protos.get_mut(p) {
                            decl.extern_failed = true;
                        }
                        continue;
                    }
                };
                if let Some(decl) = self.protos.get_mut(p) {
                    decl.template = Some(template);
                    decl.resolved = kinds;
                }
                resolved += 1;
            }
            self.resolver = Some(resolver);
        }

        for stub in core::mem::take(&mut self.stubs) {
            let Some(NodeLayout::Proto(p)) = self.nodes.get(stub).map(|n| n.layout) else {
                continue;
            };
            let Some((template, resolved)) = self
                .protos
                .get(p)
                .and_then(|d| Some((d.template.clone()?, d.resolved.clone())))
            else {
                self.stubs.push(stub);
                continue;
            };
            let built = match self
                .check_instantiable(&resolved)
                .and_then(|()| self.build_instance(stub, p, &template, &resolved))
            {
                Ok(()) => true,
                Err(e) => {
                    log::debug!("extern proto instance {stub:?} not built yet: {e}");
                    false
                }
            };
            if built {
                if let Some(n) = self.nodes.get_mut(stub) {
                    n.stub = false;
                }
                self.mark_dirty(stub, DirtyFlags::NODE, true);
            } else {
                self.stubs.push(stub);
            }
        }
        if !self.stubs.is_empty() {
            for stub in self.stubs.clone() {
                self.mark_dirty(stub, DirtyFlags::NODE, true);
            }
            self.signal_graph_dirty();
        }
        resolved
    }

    // -- Template checks --

    fn resolve_kind(&self, proto: &str, kind: &TemplateKind) -> Result<ResolvedKind> {
        match kind {
            TemplateKind::Tag(tag) => {
                self.kinds.get(*tag)?;
                Ok(ResolvedKind::Kind(*tag))
            }
            TemplateKind::Named(name) => Ok(ResolvedKind::Kind(self.kinds.tag_by_name(name)?)),
            TemplateKind::Proto(name) => {
                if name == proto {
                    return Err(Error::CyclicProtoReference(proto.into()));
                }
                self.find_proto(name)
                    .map(ResolvedKind::Proto)
                    .ok_or_else(|| Error::UnknownProto(name.clone()))
            }
        }
    }

    fn resolved_decls(&self, kind: ResolvedKind) -> Result<&[FieldDecl]> {
        match kind {
            ResolvedKind::Kind(tag) => Ok(self.kinds.get(tag)?.fields()),
            ResolvedKind::Proto(p) => self
                .protos
                .get(p)
                .map(ProtoDecl::interface)
                .ok_or_else(|| Error::UnknownProto(format!("{p:?}"))),
        }
    }

    /// Whether instantiating `name` would eventually instantiate `target`.
    fn reaches(&self, name: &str, target: &str) -> bool {
        let mut seen: Vec<String> = Vec::new();
        let mut work: Vec<String> = alloc::vec![name.into()];
        while let Some(n) = work.pop() {
            if n == target {
                return true;
            }
            if seen.contains(&n) {
                continue;
            }
            let template = self
                .find_proto(&n)
                .and_then(|p| self.protos.get(p))
                .and_then(|d| d.template.as_ref());
            if let Some(t) = template {
                work.extend(t.proto_refs().map(Into::into));
            }
            seen.push(n);
        }
        false
    }

    /// Validates a template and returns the resolved kind of each node.
    fn check_template(
        &self,
        name: &str,
        interface: &[FieldDecl],
        t: &ProtoTemplate,
    ) -> Result<Vec<ResolvedKind>> {
        for r in t.proto_refs() {
            if self.reaches(r, name) {
                return Err(Error::CyclicProtoReference(name.into()));
            }
        }
        let resolved = t
            .nodes
            .iter()
            .map(|n| self.resolve_kind(name, &n.kind))
            .collect::<Result<Vec<_>>>()?;
        let node_decls = resolved
            .iter()
            .map(|&k| self.resolved_decls(k))
            .collect::<Result<Vec<_>>>()?;
        let lookup = |node: usize, field: &str| lookup_decl(name, &node_decls, node, field);
        for (i, n) in t.nodes.iter().enumerate() {
            for (f, v) in &n.values {
                let decl = lookup(i, f)?;
                if v.convert_to(decl.ty).is_none() {
                    return Err(Error::TypeMismatch {
                        from: v.field_type(),
                        to: decl.ty,
                    });
                }
            }
            if !n.children.is_empty() {
                let decl = lookup(i, "children")?;
                if !decl.ty.is_node() {
                    return Err(invalid(name, format!("node #{i} cannot hold children")));
                }
                if let Some(&c) = n.children.iter().find(|&&c| c >= t.nodes.len() || c == i) {
                    return Err(invalid(name, format!("node #{i} has bad child #{c}")));
                }
            }
        }
        if template_has_child_cycle(t) {
            return Err(invalid(name, "child links form a cycle".into()));
        }
        for r in &t.routes {
            let from = lookup(r.from, &r.from_field)?.ty;
            let to = lookup(r.to, &r.to_field)?.ty;
            if !to.accepts(from) {
                return Err(Error::TypeMismatch { from, to });
            }
        }
        for b in &t.bindings {
            let iface = field::index_of(interface, &b.interface)
                .and_then(|i| interface.get(i as usize))
                .ok_or_else(|| invalid(name, format!("no interface field `{}`", b.interface)))?;
            let inner = lookup(b.node, &b.field)?;
            let forward = iface.event != EventKind::Out;
            let backward = matches!(iface.event, EventKind::Out | EventKind::Exposed);
            if (forward && !inner.ty.accepts(iface.ty)) || (backward && !iface.ty.accepts(inner.ty)) {
                return Err(Error::TypeMismatch {
                    from: iface.ty,
                    to: inner.ty,
                });
            }
        }
        Ok(resolved)
    }

    /// Checks that every proto a template (transitively) uses still exists.
    fn check_instantiable(&self, resolved: &[ResolvedKind]) -> Result<()> {
        let proto_refs = |kinds: &[ResolvedKind]| -> Vec<ProtoId> {
            kinds
                .iter()
                .filter_map(|k| match k {
                    ResolvedKind::Proto(p) => Some(*p),
                    ResolvedKind::Kind(_) => None,
                })
                .collect()
        };
        let mut work = proto_refs(resolved);
        let mut seen: Vec<ProtoId> = Vec::new();
        while let Some(p) = work.pop() {
            if seen.contains(&p) {
                continue;
            }
            let decl = self
                .protos
                .get(p)
                .ok_or_else(|| Error::UnknownProto(format!("{p:?}")))?;
            work.extend(proto_refs(decl.resolved.as_slice()));
            seen.push(p);
        }
        Ok(())
    }

    // -- Building --

    /// Builds the template under `inst`. On error, every node built so far
    /// is torn down again and `inst` is left as it was.
    fn build_instance(
        &mut self,
        inst: NodeId,
        proto: ProtoId,
        t: &ProtoTemplate,
        resolved: &[ResolvedKind],
    ) -> Result<()> {
        let mut made: Vec<NodeId> = Vec::with_capacity(t.nodes.len());
        let built = self.build_into(inst, proto, t, resolved, &mut made);
        if built.is_err() {
            if let Some(data) = self.nodes.get_mut(inst) {
                data.inner.retain(|n| !made.contains(n));
            }
            for &n in &made {
                self.destroy_node(n);
            }
        }
        built
    }

    fn build_into(
        &mut self,
        inst: NodeId,
        proto: ProtoId,
        t: &ProtoTemplate,
        resolved: &[ResolvedKind],
        made: &mut Vec<NodeId>,
    ) -> Result<()> {
        for &kind in resolved {
            let node = match kind {
                ResolvedKind::Kind(tag) => self.new_node(tag)?,
                ResolvedKind::Proto(p) => self.instantiate(p)?,
            };
            made.push(node);
        }
        let mut has_parent = alloc::vec![false; made.len()];
        for (i, n) in t.nodes.iter().enumerate() {
            for (f, v) in &n.values {
                let index = self.field_index(made[i], f)?;
                self.write_field(made[i], index, v.clone())?;
            }
            if !n.children.is_empty() {
                let list: Vec<NodeId> = n.children.iter().map(|&c| made[c]).collect();
                for &c in &n.children {
                    has_parent[c] = true;
                }
                let index = self.field_index(made[i], "children")?;
                self.write_field(made[i], index, FieldValue::Nodes(list))?;
            }
        }
        for (i, &node) in made.iter().enumerate() {
            if !has_parent[i] {
                self.register(node, Some(inst))?;
                if let Some(data) = self.nodes.get_mut(inst) {
                    data.inner.push(node);
                }
            }
        }
        for r in &t.routes {
            self.create_route_by_name(made[r.from], &r.from_field, made[r.to], &r.to_field)?;
        }
        let interface: Vec<FieldDecl> = self
            .protos
            .get(proto)
            .map(|d| d.interface.clone())
            .unwrap_or_default();
        for b in &t.bindings {
            let Some(iface) = field::index_of(&interface, &b.interface) else {
                continue;
            };
            let event = interface[iface as usize].event;
            let inner = made[b.node];
            let field = self.field_index(inner, &b.field)?;
            if event != EventKind::Out {
                let current = self.field_value(inst, iface)?.clone();
                self.write_field(inner, field, current)?;
            }
            if matches!(event, EventKind::In | EventKind::Exposed) {
                self.create_route(inst, iface, inner, field)?;
            }
            if matches!(event, EventKind::Out | EventKind::Exposed) {
                self.create_route(inner, field, inst, iface)?;
            }
        }
        Ok(())
    }
}

fn lookup_decl<'a>(
    proto: &str,
    node_decls: &[&'a [FieldDecl]],
    node: usize,
    field: &str,
) -> Result<&'a FieldDecl> {
    let decls = node_decls
        .get(node)
        .ok_or_else(|| invalid(proto, format!("no template node #{node}")))?;
    field::index_of(decls, field)
        .and_then(|i| decls.get(i as usize))
        .ok_or_else(|| invalid(proto, format!("node #{node} has no field `{field}`")))
}

fn template_has_child_cycle(t: &ProtoTemplate) -> bool {
    // 0 = unvisited, 1 = on stack, 2 = done.
    let mut state = alloc::vec![0_u8; t.nodes.len()];
    for start in 0..t.nodes.len() {
        if state[start] != 0 {
            continue;
        }
        let mut stack: Vec<(usize, usize)> = alloc::vec![(start, 0)];
        state[start] = 1;
        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            top.1 += 1;
            match t.nodes[node].children.get(next) {
                Some(&c) => match state.get(c) {
                    Some(1) => return true,
                    Some(0) => {
                        state[c] = 1;
                        stack.push((c, 0));
                    }
                    _ => {}
                },
                None => {
                    state[node] = 2;
                    stack.pop();
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::rc::Rc;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use super::*;
    use crate::config::GraphConfig;
    use crate::field::{FieldType, ValueKind};
    use crate::host::LibraryResolver;

    fn sized_kind(g: &mut SceneGraph) -> NodeTag {
        g.kinds_mut().register(
            "Box",
            vec![FieldDecl::new(
                "size",
                FieldType::single(ValueKind::Float),
                EventKind::Exposed,
            )],
        )
    }

    fn size_interface() -> Vec<FieldDecl> {
        vec![FieldDecl::exposed("size", FieldValue::Float(1.0))]
    }

    fn sized_template(tag: NodeTag) -> ProtoTemplate {
        let mut t = ProtoTemplate::new();
        let b = t.node(TemplateKind::Tag(tag));
        t.bind("size", b, "size");
        t
    }

    #[test]
    fn instances_have_private_storage() {
        let mut g = SceneGraph::new();
        let tag = sized_kind(&mut g);
        let p = g
            .declare_proto("P", size_interface(), sized_template(tag))
            .unwrap();
        let i1 = g.instantiate(p).unwrap();
        let i2 = g.instantiate(p).unwrap();
        g.register(i1, None).unwrap();
        g.register(i2, None).unwrap();
        g.set_field_by_name(i1, "size", FieldValue::Float(2.0)).unwrap();
        g.activate_all_queued(0.0);
        assert_eq!(g.field_by_name(i2, "size").unwrap().value, &FieldValue::Float(1.0));

        let inner1 = g.instance_roots(i1)[0];
        let inner2 = g.instance_roots(i2)[0];
        assert_eq!(g.field_value(inner1, 0), Ok(&FieldValue::Float(2.0)));
        assert_eq!(g.field_value(inner2, 0), Ok(&FieldValue::Float(1.0)));
    }

    #[test]
    fn exposed_binding_reports_inner_changes() {
        let mut g = SceneGraph::new();
        let tag = sized_kind(&mut g);
        let p = g
            .declare_proto("P", size_interface(), sized_template(tag))
            .unwrap();
        let inst = g.instantiate(p).unwrap();
        g.register(inst, None).unwrap();
        let inner = g.instance_roots(inst)[0];
        g.set_field(inner, 0, FieldValue::Float(4.0)).unwrap();
        g.activate_all_queued(0.0);
        assert_eq!(g.field_value(inst, 0), Ok(&FieldValue::Float(4.0)));
    }

    #[test]
    fn teardown_releases_inner_graph_and_allows_removal() {
        let mut g = SceneGraph::new();
        let tag = sized_kind(&mut g);
        let p = g
            .declare_proto("P", size_interface(), sized_template(tag))
            .unwrap();
        let inst = g.instantiate(p).unwrap();
        g.register(inst, None).unwrap();
        let inner = g.instance_roots(inst)[0];
        assert!(matches!(
            g.remove_proto(p),
            Err(Error::ProtoInUse { instances: 1, .. })
        ));
        g.unregister(inst, None).unwrap();
        assert!(!g.contains(inner));
        assert!(g.proto(p).is_some(), "declaration outlives its instances");
        g.remove_proto(p).unwrap();
        assert!(g.find_proto("P").is_none());
    }

    #[test]
    fn self_reference_is_cyclic() {
        let mut g = SceneGraph::new();
        let mut t = ProtoTemplate::new();
        t.node(TemplateKind::Proto("Loop".into()));
        assert_eq!(
            g.declare_proto("Loop", Vec::new(), t).map(|_| ()),
            Err(Error::CyclicProtoReference("Loop".into()))
        );
        assert!(g.find_proto("Loop").is_none());
    }

    #[test]
    fn indirect_reference_is_cyclic() {
        let mut g = SceneGraph::new();
        let mut a = ProtoTemplate::new();
        a.node(TemplateKind::Tag(NodeTag::GROUP));
        g.declare_proto("B", Vec::new(), a).unwrap();
        let mut a = ProtoTemplate::new();
        a.node(TemplateKind::Proto("B".into()));
        g.declare_proto("A", Vec::new(), a).unwrap();
        // Redeclaring B to use A closes the loop.
        let mut b = ProtoTemplate::new();
        b.node(TemplateKind::Proto("A".into()));
        assert_eq!(
            g.declare_proto("B", Vec::new(), b).map(|_| ()),
            Err(Error::CyclicProtoReference("B".into()))
        );
    }

    #[test]
    fn nested_protos_build_recursively() {
        let mut g = SceneGraph::new();
        let tag = sized_kind(&mut g);
        g.declare_proto("Inner", size_interface(), sized_template(tag))
            .unwrap();
        let mut outer = ProtoTemplate::new();
        let group = outer.node(TemplateKind::Tag(NodeTag::GROUP));
        let inner = outer.node(TemplateKind::Proto("Inner".into()));
        outer.child(group, inner).bind("size", inner, "size");
        let p = g.declare_proto("Outer", size_interface(), outer).unwrap();
        let inst = g.instantiate(p).unwrap();
        g.register(inst, None).unwrap();
        g.set_field(inst, 0, FieldValue::Float(3.0)).unwrap();
        g.activate_all_queued(0.0);
        let group = g.instance_roots(inst)[0];
        let nested = g.children(group)[0];
        let leaf = g.instance_roots(nested)[0];
        assert_eq!(g.field_value(leaf, 0), Ok(&FieldValue::Float(3.0)));
    }

    #[test]
    fn templates_keep_the_protos_they_were_declared_with() {
        let mut g = SceneGraph::new();
        let tag = sized_kind(&mut g);
        g.declare_proto("Inner", size_interface(), sized_template(tag))
            .unwrap();
        let mut outer = ProtoTemplate::new();
        let inner = outer.node(TemplateKind::Proto("Inner".into()));
        outer.bind("size", inner, "size");
        let p = g.declare_proto("Outer", size_interface(), outer).unwrap();

        // A new Inner without a `size` field would break the binding.
        let mut bare = ProtoTemplate::new();
        bare.node(TemplateKind::Tag(NodeTag::GROUP));
        g.declare_proto("Inner", Vec::new(), bare).unwrap();

        let inst = g.instantiate(p).unwrap();
        g.register(inst, None).unwrap();
        g.set_field(inst, 0, FieldValue::Float(3.0)).unwrap();
        g.activate_all_queued(0.0);
        let nested = g.instance_roots(inst)[0];
        assert_eq!(g.field_value(nested, 0), Ok(&FieldValue::Float(3.0)));
    }

    #[test]
    fn failed_build_leaves_nothing_behind() {
        let mut g = SceneGraph::new();
        let tag = sized_kind(&mut g);
        let outside = g.new_node(NodeTag::GROUP).unwrap();
        let mut t = ProtoTemplate::new();
        let b = t.node(TemplateKind::Tag(tag));
        let group = t.node(TemplateKind::Tag(NodeTag::GROUP));
        t.bind("size", b, "size");
        t.set(group, "children", FieldValue::Nodes(vec![outside]));
        let p = g.declare_proto("P", size_interface(), t).unwrap();
        // Tear the referenced node down after the template was accepted.
        g.register(outside, None).unwrap();
        g.unregister(outside, None).unwrap();

        let before = g.node_count();
        assert_eq!(g.instantiate(p), Err(Error::StaleNode(outside)));
        assert_eq!(g.node_count(), before, "partial build is rolled back");
        assert!(g.proto(p).unwrap().instances().is_empty());
        g.remove_proto(p).unwrap();
    }

    #[test]
    fn exposed_binding_settles_without_loop_breaking() {
        let mut g = SceneGraph::new();
        g.set_config(GraphConfig {
            loop_breaking: false,
            ..GraphConfig::new()
        });
        let tag = sized_kind(&mut g);
        let p = g
            .declare_proto("P", size_interface(), sized_template(tag))
            .unwrap();
        let inst = g.instantiate(p).unwrap();
        g.register(inst, None).unwrap();
        g.set_field(inst, 0, FieldValue::Float(2.0)).unwrap();
        // Instance to inner, then the echo back which changes nothing.
        assert_eq!(g.activate_all_queued(0.0), 2);
        assert_eq!(g.queued_route_count(), 0);
        let inner = g.instance_roots(inst)[0];
        assert_eq!(g.field_value(inner, 0), Ok(&FieldValue::Float(2.0)));
    }

    #[test]
    fn bad_template_field_is_rejected() {
        let mut g = SceneGraph::new();
        let mut t = ProtoTemplate::new();
        let n = t.node(TemplateKind::Tag(NodeTag::GROUP));
        t.set(n, "radius", FieldValue::Float(1.0));
        assert!(matches!(
            g.declare_proto("Bad", Vec::new(), t),
            Err(Error::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn template_child_cycle_is_rejected() {
        let mut g = SceneGraph::new();
        let mut t = ProtoTemplate::new();
        let a = t.node(TemplateKind::Tag(NodeTag::GROUP));
        let b = t.node(TemplateKind::Tag(NodeTag::GROUP));
        t.child(a, b).child(b, a);
        assert!(matches!(
            g.declare_proto("Ring", Vec::new(), t),
            Err(Error::InvalidTemplate { .. })
        ));
    }

    struct SharedResolver(Rc<RefCell<Option<ProtoLibrary>>>, Rc<RefCell<Vec<String>>>);

    impl LibraryResolver for SharedResolver {
        fn resolve(&mut self, url: &str) -> Option<ProtoLibrary> {
            self.1.borrow_mut().push(url.into());
            self.0.borrow().clone()
        }
    }

    #[test]
    fn extern_stub_resolves_when_library_arrives() {
        let mut g = SceneGraph::new();
        let tag = sized_kind(&mut g);
        let library: Rc<RefCell<Option<ProtoLibrary>>> = Rc::default();
        let urls: Rc<RefCell<Vec<String>>> = Rc::default();
        g.set_library_resolver(Some(Box::new(SharedResolver(library.clone(), urls.clone()))));
        let p = g.declare_extern_proto("Sized", size_interface(), "lib.wrl#Sized");
        let inst = g.instantiate(p).unwrap();
        g.register(inst, None).unwrap();
        assert!(g.is_stub(inst));
        g.take_graph_dirty();

        assert_eq!(g.poll_extern_protos(), 0);
        assert!(g.is_stub(inst));
        assert!(g.take_graph_dirty(), "pending stubs keep the graph dirty");
        assert_eq!(urls.borrow().as_slice(), ["lib.wrl"]);

        let mut lib = ProtoLibrary::new();
        lib.insert("Sized", sized_template(tag));
        *library.borrow_mut() = Some(lib);
        g.set_field(inst, 0, FieldValue::Float(5.0)).unwrap();
        assert_eq!(g.poll_extern_protos(), 1);
        assert!(!g.is_stub(inst));
        let inner = g.instance_roots(inst)[0];
        assert_eq!(
            g.field_value(inner, 0),
            Ok(&FieldValue::Float(5.0)),
            "built instance picks up the current interface value"
        );
    }
}
