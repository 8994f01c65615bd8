// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collaborator interfaces supplied by the host.
//!
//! The engine never reads a wall clock, downloads a library or runs a script
//! by itself. Each of those is injected into the
//! [`SceneGraph`](crate::graph::SceneGraph) through one of these traits.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;

use crate::event::DomEvent;
use crate::graph::SceneGraph;
use crate::node::NodeId;
use crate::proto::ProtoLibrary;

/// Source of scene time, in seconds.
///
/// Read once at the start of every
/// [`advance`](crate::graph::SceneGraph::advance).
pub trait TimeSource {
    /// Current scene time.
    fn scene_time(&self) -> f64;
}

impl<T: TimeSource + ?Sized> TimeSource for Rc<RefCell<T>> {
    fn scene_time(&self) -> f64 {
        self.borrow().scene_time()
    }
}

/// Resolves extern proto library URLs.
///
/// Called lazily and retried every tick until it returns `Some`.
pub trait LibraryResolver {
    /// Returns the library at `url`, or `None` if it is not available yet.
    ///
    /// `url` has any `#fragment` stripped.
    fn resolve(&mut self, url: &str) -> Option<ProtoLibrary>;
}

/// Executes scripted event handlers.
///
/// One runtime may serve several graphs; it is shared through `Rc`.
pub trait ScriptRuntime {
    /// Runs the handler described by `handler` for `event`.
    ///
    /// The runtime may mutate `graph` and may cancel the event.
    fn execute_handler(&mut self, graph: &mut SceneGraph, handler: NodeId, event: &mut DomEvent);
}

/// Shared handle to a [`ScriptRuntime`].
pub type SharedScriptRuntime = Rc<RefCell<dyn ScriptRuntime>>;

/// Callback fired when dirty propagation reaches the root.
pub type DirtyCallback = Box<dyn FnMut()>;
