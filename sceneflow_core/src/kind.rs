// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node kinds.
//!
//! A *kind* is a node type: a name plus an ordered field layout. Decoders
//! register the kinds of their content format once and then create nodes by
//! [`NodeTag`]. A handful of kinds that the engine itself relies on are
//! always present:
//!
//! - [`NodeTag::GROUP`]: a plain grouping node with a `children` list.
//! - [`NodeTag::SCRIPT`]: a handler node for scripted event listeners.
//! - [`NodeTag::ANIMATE`]: a timed element whose status is mirrored into
//!   routable `isActive` / `fraction_changed` / `cycleTime` outputs.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::error::{Error, Result};
use crate::field::{self, EventKind, FieldDecl, FieldType, ValueKind};

/// Identifies a registered node kind.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeTag(pub u32);

impl NodeTag {
    /// Built-in grouping node.
    pub const GROUP: Self = Self(0);
    /// Built-in script handler node.
    pub const SCRIPT: Self = Self(1);
    /// Built-in timed animation element.
    pub const ANIMATE: Self = Self(2);
}

impl fmt::Debug for NodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeTag({})", self.0)
    }
}

/// A registered node kind.
#[derive(Clone, Debug)]
pub struct NodeKind {
    name: String,
    fields: Vec<FieldDecl>,
    children: Option<u32>,
}

impl NodeKind {
    /// Kind name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field layout.
    #[must_use]
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    /// Index of the field named `children`, if it is a node list.
    #[must_use]
    pub const fn children_field(&self) -> Option<u32> {
        self.children
    }
}

/// Table of node kinds, indexed by [`NodeTag`].
#[derive(Clone, Debug)]
pub struct KindRegistry {
    kinds: Vec<NodeKind>,
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KindRegistry {
    /// Creates a registry holding only the built-in kinds.
    #[must_use]
    pub fn new() -> Self {
        let mut reg = Self { kinds: Vec::new() };
        reg.register(
            "Group",
            vec![FieldDecl::new(
                "children",
                FieldType::multi(ValueKind::Node),
                EventKind::Exposed,
            )],
        );
        reg.register(
            "Script",
            vec![
                FieldDecl::new("url", FieldType::multi(ValueKind::String), EventKind::Exposed),
                FieldDecl::new(
                    "directOutput",
                    FieldType::single(ValueKind::Bool),
                    EventKind::None,
                ),
            ],
        );
        reg.register(
            "Animate",
            vec![
                FieldDecl::new("isActive", FieldType::single(ValueKind::Bool), EventKind::Out),
                FieldDecl::new(
                    "fraction_changed",
                    FieldType::single(ValueKind::Float),
                    EventKind::Out,
                ),
                FieldDecl::new("cycleTime", FieldType::single(ValueKind::Time), EventKind::Out),
            ],
        );
        reg
    }

    /// Registers a kind and returns its tag.
    ///
    /// Registering an existing name again adds a new kind that shadows the
    /// old one for [`tag_by_name`](Self::tag_by_name); nodes of the old kind
    /// keep working.
    pub fn register(&mut self, name: &str, fields: Vec<FieldDecl>) -> NodeTag {
        let children = field::index_of(&fields, "children")
            .filter(|&i| fields[i as usize].ty == FieldType::multi(ValueKind::Node));
        let tag = NodeTag(u32::try_from(self.kinds.len()).unwrap_or(u32::MAX));
        self.kinds.push(NodeKind {
            name: name.into(),
            fields,
            children,
        });
        tag
    }

    /// Looks up a kind by tag.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTag`] if the tag was never registered.
    pub fn get(&self, tag: NodeTag) -> Result<&NodeKind> {
        self.kinds
            .get(tag.0 as usize)
            .ok_or_else(|| Error::UnknownTag(alloc::format!("{}", tag.0)))
    }

    /// Looks up the most recently registered kind with this name.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTag`] if no kind has this name.
    pub fn tag_by_name(&self, name: &str) -> Result<NodeTag> {
        self.kinds
            .iter()
            .rposition(|k| k.name == name)
            .and_then(|i| u32::try_from(i).ok())
            .map(NodeTag)
            .ok_or_else(|| Error::UnknownTag(name.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let reg = KindRegistry::new();
        assert_eq!(reg.get(NodeTag::GROUP).map(NodeKind::name), Ok("Group"));
        assert_eq!(reg.tag_by_name("Animate"), Ok(NodeTag::ANIMATE));
        assert_eq!(
            reg.get(NodeTag::GROUP).map(NodeKind::children_field),
            Ok(Some(0))
        );
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let reg = KindRegistry::new();
        assert!(matches!(reg.get(NodeTag(99)), Err(Error::UnknownTag(_))));
        assert!(matches!(reg.tag_by_name("Nope"), Err(Error::UnknownTag(_))));
    }

    #[test]
    fn later_registration_shadows_name() {
        let mut reg = KindRegistry::new();
        let a = reg.register("Box", Vec::new());
        let b = reg.register("Box", Vec::new());
        assert_ne!(a, b);
        assert_eq!(reg.tag_by_name("Box"), Ok(b));
        assert!(reg.get(a).is_ok());
    }
}
