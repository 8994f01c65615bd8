// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generational handles and the arena that issues them.
//!
//! Every graph object (node, route, listener, proto) is addressed by a
//! [`Handle`] carrying both a slot index and a generation counter, so that a
//! handle kept after its object was destroyed is detected instead of silently
//! aliasing whatever reused the slot.

use alloc::vec::Vec;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// Names the object type a [`Handle`] refers to (used in `Debug` output).
pub trait HandleKind {
    /// Short type name, e.g. `"NodeId"`.
    const NAME: &'static str;
}

/// Marker types naming each handle family.
pub mod kinds {
    use super::HandleKind;

    /// Marker for [`NodeId`](crate::node::NodeId).
    #[derive(Debug)]
    pub enum Node {}
    /// Marker for [`RouteId`](crate::route::RouteId).
    #[derive(Debug)]
    pub enum Route {}
    /// Marker for [`ListenerId`](crate::event::ListenerId).
    #[derive(Debug)]
    pub enum Listener {}
    /// Marker for [`ProtoId`](crate::proto::ProtoId).
    #[derive(Debug)]
    pub enum Proto {}

    impl HandleKind for Node {
        const NAME: &'static str = "NodeId";
    }
    impl HandleKind for Route {
        const NAME: &'static str = "RouteId";
    }
    impl HandleKind for Listener {
        const NAME: &'static str = "ListenerId";
    }
    impl HandleKind for Proto {
        const NAME: &'static str = "ProtoId";
    }
}

/// A generational handle into an arena of graph objects.
pub struct Handle<K> {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self {
            idx,
            generation,
            _kind: PhantomData,
        }
    }

    /// Builds a handle from its raw parts.
    ///
    /// Intended for diagnostics and tests; a forged handle is validated like
    /// any other on use.
    #[inline]
    #[must_use]
    pub const fn from_raw_parts(idx: u32, generation: u32) -> Self {
        Self::new(idx, generation)
    }

    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx && self.generation == other.generation
    }
}

impl<K> Eq for Handle<K> {}

impl<K> PartialOrd for Handle<K> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Handle<K> {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (self.idx, self.generation).cmp(&(other.idx, other.generation))
    }
}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.idx.hash(state);
        self.generation.hash(state);
    }
}

impl<K: HandleKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}@gen{})", K::NAME, self.idx, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with a free list and generation counters.
///
/// Freed slots are recycled; their generation is bumped on release so stale
/// handles fail lookup.
#[derive(Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn insert<K>(&mut self, value: T) -> Handle<K> {
        self.live += 1;
        if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot; its generation was bumped on removal.
            let slot = &mut self.slots[idx as usize];
            slot.value = Some(value);
            return Handle::new(idx, slot.generation);
        }
        let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle::new(idx, 0)
    }

    pub(crate) fn remove<K>(&mut self, h: Handle<K>) -> Option<T> {
        let slot = self.slots.get_mut(h.idx as usize)?;
        if slot.generation != h.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(h.idx);
        self.live -= 1;
        Some(value)
    }

    pub(crate) fn get<K>(&self, h: Handle<K>) -> Option<&T> {
        let slot = self.slots.get(h.idx as usize)?;
        if slot.generation != h.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub(crate) fn get_mut<K>(&mut self, h: Handle<K>) -> Option<&mut T> {
        let slot = self.slots.get_mut(h.idx as usize)?;
        if slot.generation != h.generation {
            return None;
        }
        slot.value.as_mut()
    }

    pub(crate) fn contains<K>(&self, h: Handle<K>) -> bool {
        self.get(h).is_some()
    }

    pub(crate) const fn len(&self) -> usize {
        self.live
    }

    /// Iterates live entries in slot order.
    pub(crate) fn iter<K>(&self) -> impl Iterator<Item = (Handle<K>, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let value = slot.value.as_ref()?;
            let idx = u32::try_from(i).ok()?;
            Some((Handle::new(idx, slot.generation), value))
        })
    }

    /// Collects the handles of all live entries in slot order.
    pub(crate) fn handles<K>(&self) -> Vec<Handle<K>> {
        self.iter().map(|(h, _)| h).collect()
    }
}
