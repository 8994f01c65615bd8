// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Routes: typed data-flow edges between node fields.
//!
//! A route copies the value of `from.field` into `to.field` whenever the
//! source field is notified. Propagation is two-phase:
//!
//! 1. Notifying a field [queues](SceneGraph::queue_route) every route
//!    leaving it. Queueing is idempotent, so a field written N times before
//!    activation fires its routes once.
//! 2. [`activate_all_queued`](SceneGraph::activate_all_queued) drains the
//!    queue in FIFO order. Writes made by a route queue further routes at
//!    the back of the same queue; nothing recurses.
//!
//! Destruction is deferred as well: [`destroy_route`](SceneGraph::destroy_route)
//! only marks the route, which stops it from firing, and
//! [`flush_destroyed_routes`](SceneGraph::flush_destroyed_routes) frees it.
//!
//! A route whose endpoint node died is dropped silently when it comes up.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::field::EventKind;
use crate::graph::SceneGraph;
use crate::id::{Handle, kinds};
use crate::node::{DirtyFlags, NodeId};
use crate::trace::{RouteDroppedEvent, RouteFiredEvent};

/// Handle to a route.
pub type RouteId = Handle<kinds::Route>;

/// Where a route is in its per-tick cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteState {
    /// Idle; will be queued by the next notification of its source.
    Declared,
    /// Waiting in the activation queue.
    Queued,
    /// Destroyed; freed by the next destroy pass.
    PendingDestroy,
}

/// A route between two node fields.
#[derive(Clone, Debug)]
pub struct Route {
    pub(crate) id: Option<u32>,
    pub(crate) name: Option<String>,
    pub(crate) from: NodeId,
    pub(crate) from_field: u32,
    pub(crate) to: NodeId,
    pub(crate) to_field: u32,
    pub(crate) state: RouteState,
    pub(crate) last_activation: Option<f64>,
    /// Activation pass that last fired this route; 0 for never.
    pub(crate) last_pass: u64,
}

impl Route {
    /// Source endpoint.
    #[must_use]
    pub const fn from(&self) -> (NodeId, u32) {
        (self.from, self.from_field)
    }

    /// Destination endpoint.
    #[must_use]
    pub const fn to(&self) -> (NodeId, u32) {
        (self.to, self.to_field)
    }

    /// Numeric id, if assigned.
    #[must_use]
    pub const fn id(&self) -> Option<u32> {
        self.id
    }

    /// Name, if assigned.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> RouteState {
        self.state
    }

    /// Scene time of the last activation.
    #[must_use]
    pub const fn last_activation(&self) -> Option<f64> {
        self.last_activation
    }
}

/// Result of trying to fire one route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Firing {
    Fired { changed: bool },
    Skipped,
    Dropped,
}

impl SceneGraph {
    /// Creates a route from `from.from_field` to `to.to_field`.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] or [`Error::FieldNotFound`] for bad endpoints.
    /// [`Error::TypeMismatch`] if the destination cannot accept the source
    /// type.
    pub fn create_route(
        &mut self,
        from: NodeId,
        from_field: u32,
        to: NodeId,
        to_field: u32,
    ) -> Result<RouteId> {
        let from_ty = self.field(from, from_field)?.ty;
        let to_ty = self.field(to, to_field)?.ty;
        if !to_ty.accepts(from_ty) {
            return Err(Error::TypeMismatch {
                from: from_ty,
                to: to_ty,
            });
        }
        let route: RouteId = self.routes.insert(Route {
            id: None,
            name: None,
            from,
            from_field,
            to,
            to_field,
            state: RouteState::Declared,
            last_activation: None,
            last_pass: 0,
        });
        if let Some(n) = self.nodes.get_mut(from) {
            n.routes.push(route);
        }
        if to != from {
            if let Some(n) = self.nodes.get_mut(to) {
                n.routes.push(route);
            }
        }
        Ok(route)
    }

    /// [`create_route`](Self::create_route) with endpoints addressed by
    /// field name.
    ///
    /// # Errors
    ///
    /// As for [`create_route`](Self::create_route).
    pub fn create_route_by_name(
        &mut self,
        from: NodeId,
        from_field: &str,
        to: NodeId,
        to_field: &str,
    ) -> Result<RouteId> {
        let ff = self.field_index(from, from_field)?;
        let tf = self.field_index(to, to_field)?;
        self.create_route(from, ff, to, tf)
    }

    /// Looks up a live route.
    #[must_use]
    pub fn route(&self, route: RouteId) -> Option<&Route> {
        self.routes.get(route)
    }

    /// Number of routes, including ones awaiting the destroy pass.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Assigns (or clears) the numeric id and name of a route.
    ///
    /// # Errors
    ///
    /// [`Error::StaleRoute`] for a stale handle; [`Error::DuplicateId`] if
    /// another route holds `id` (the holder is reported by its source node).
    pub fn set_route_id(&mut self, route: RouteId, id: Option<u32>, name: Option<&str>) -> Result<()> {
        if !self.routes.contains(route) {
            return Err(Error::StaleRoute(route));
        }
        if let Some(id) = id {
            let holder = self
                .find_route_by_id(id)
                .filter(|&other| other != route)
                .and_then(|other| self.routes.get(other))
                .map(|r| r.from);
            if let Some(holder) = holder {
                return Err(Error::DuplicateId { id, holder });
            }
        }
        let Some(r) = self.routes.get_mut(route) else {
            return Err(Error::StaleRoute(route));
        };
        r.id = id;
        r.name = name.map(Into::into);
        Ok(())
    }

    /// Finds a route by numeric id.
    #[must_use]
    pub fn find_route_by_id(&self, id: u32) -> Option<RouteId> {
        self.routes
            .iter()
            .find(|(_, r)| r.id == Some(id) && r.state != RouteState::PendingDestroy)
            .map(|(h, _)| h)
    }

    /// Finds a route by name.
    #[must_use]
    pub fn find_route_by_name(&self, name: &str) -> Option<RouteId> {
        self.routes
            .iter()
            .find(|(_, r)| r.name.as_deref() == Some(name) && r.state != RouteState::PendingDestroy)
            .map(|(h, _)| h)
    }

    /// Routes whose source is `node`, in creation order.
    #[must_use]
    pub fn routes_from(&self, node: NodeId) -> Vec<RouteId> {
        let Some(data) = self.nodes.get(node) else {
            return Vec::new();
        };
        data.routes
            .iter()
            .copied()
            .filter(|&r| self.routes.get(r).is_some_and(|r| r.from == node))
            .collect()
    }

    // -- Queueing --

    /// Queues a route for activation.
    ///
    /// Returns `false` if it was already queued or is being destroyed.
    ///
    /// # Errors
    ///
    /// [`Error::StaleRoute`] for a stale handle.
    pub fn queue_route(&mut self, route: RouteId) -> Result<bool> {
        let r = self.routes.get_mut(route).ok_or(Error::StaleRoute(route))?;
        if r.state != RouteState::Declared {
            return Ok(false);
        }
        r.state = RouteState::Queued;
        self.routes_to_activate.push_back(route);
        Ok(true)
    }

    /// Queues every route leaving `node.field`.
    pub(crate) fn queue_routes_from(&mut self, node: NodeId, field: u32) {
        let Some(data) = self.nodes.get(node) else {
            return;
        };
        let outgoing: Vec<RouteId> = data
            .routes
            .iter()
            .copied()
            .filter(|&r| {
                self.routes
                    .get(r)
                    .is_some_and(|r| r.from == node && r.from_field == field)
            })
            .collect();
        for r in outgoing {
            if let Err(e) = self.queue_route(r) {
                log::warn!("cannot queue {r:?} from {node:?}.{field}: {e}");
            }
        }
    }

    /// Number of routes waiting in the activation queue.
    #[must_use]
    pub fn queued_route_count(&self) -> usize {
        self.routes_to_activate.len()
    }

    // -- Activation --

    /// Fires every queued route in FIFO order, including routes queued by the
    /// cascade itself, up to the configured activation budget.
    ///
    /// Each call is one activation pass. With loop breaking on, a route fires
    /// at most once per pass; the next pass may fire it again even if scene
    /// time has not moved.
    ///
    /// Returns the number of routes that fired.
    pub fn activate_all_queued(&mut self, now: f64) -> usize {
        self.route_pass += 1;
        let budget = self.config.max_route_activations_per_tick;
        let mut fired = 0;
        while let Some(route) = self.routes_to_activate.pop_front() {
            if fired >= budget {
                log::warn!(
                    "route activation budget ({budget}) exhausted; {} route(s) carried over",
                    self.routes_to_activate.len() + 1
                );
                self.routes_to_activate.push_front(route);
                break;
            }
            if let Firing::Fired { .. } = self.fire_route(route, now) {
                fired += 1;
            }
        }
        fired
    }

    /// Fires a single route immediately, bypassing the queue. This counts as
    /// an activation pass of its own.
    ///
    /// Returns whether the destination value changed. A route with a dead
    /// endpoint reports `false`.
    ///
    /// # Errors
    ///
    /// [`Error::StaleRoute`] for a stale handle.
    pub fn activate_route(&mut self, route: RouteId, now: f64) -> Result<bool> {
        if !self.routes.contains(route) {
            return Err(Error::StaleRoute(route));
        }
        self.route_pass += 1;
        Ok(matches!(
            self.fire_route(route, now),
            Firing::Fired { changed: true }
        ))
    }

    fn fire_route(&mut self, route: RouteId, now: f64) -> Firing {
        let (loop_breaking, pass) = (self.config.loop_breaking, self.route_pass);
        let Some(r) = self.routes.get_mut(route) else {
            self.note_route_dropped(route);
            return Firing::Dropped;
        };
        if r.state == RouteState::PendingDestroy {
            return Firing::Skipped;
        }
        r.state = RouteState::Declared;
        if loop_breaking && r.last_pass == pass {
            return Firing::Skipped;
        }
        let (from, from_field, to, to_field) = (r.from, r.from_field, r.to, r.to_field);
        let value = self
            .nodes
            .get(from)
            .and_then(|n| n.fields.get(from_field as usize))
            .cloned();
        let Some(value) = value.filter(|_| self.nodes.contains(to)) else {
            log::debug!("dropping {route:?}: endpoint no longer exists");
            self.note_route_dropped(route);
            return Firing::Dropped;
        };
        if let Some(r) = self.routes.get_mut(route) {
            r.last_activation = Some(now);
            r.last_pass = pass;
        }
        let changed = match self.write_field(to, to_field, value) {
            Ok(changed) => changed,
            Err(e) => {
                log::debug!("dropping {route:?}: {e}");
                self.note_route_dropped(route);
                return Firing::Dropped;
            }
        };
        self.react_to_write(to, to_field, changed);
        self.stats.routes_fired += 1;
        let tick = self.tick;
        self.tracer.route_fired(&RouteFiredEvent {
            tick,
            route,
            from,
            to,
            changed,
        });
        Firing::Fired { changed }
    }

    /// Runs the field hook, then, if the value changed, marks the node dirty,
    /// queues dependent routes and records a new specified value for an
    /// animated attribute.
    ///
    /// An unchanged write into an output-only field still queues its routes.
    pub(crate) fn react_to_write(&mut self, node: NodeId, field: u32, changed: bool) {
        if let Some(data) = self.nodes.get_mut(node) {
            if let (Some(hook), Some(value)) = (data.hook.as_mut(), data.fields.get(field as usize)) {
                hook(node, field, value);
            }
        }
        if changed {
            self.mark_dirty(node, DirtyFlags::NODE, true);
            self.queue_routes_from(node, field);
            self.note_specified_value(node, field);
        } else if self
            .decl(node, field)
            .is_ok_and(|d| d.event == EventKind::Out)
        {
            self.queue_routes_from(node, field);
        }
    }

    fn note_route_dropped(&mut self, route: RouteId) {
        self.stats.routes_dropped += 1;
        let tick = self.tick;
        self.tracer.route_dropped(&RouteDroppedEvent { tick, route });
    }

    // -- Destruction --

    /// Marks a route for destruction. It stops firing at once and is freed
    /// by the next [`flush_destroyed_routes`](Self::flush_destroyed_routes).
    ///
    /// # Errors
    ///
    /// [`Error::StaleRoute`] for a stale handle.
    pub fn destroy_route(&mut self, route: RouteId) -> Result<()> {
        if !self.routes.contains(route) {
            return Err(Error::StaleRoute(route));
        }
        self.destroy_route_quiet(route);
        Ok(())
    }

    pub(crate) fn destroy_route_quiet(&mut self, route: RouteId) {
        let Some(r) = self.routes.get_mut(route) else {
            return;
        };
        if r.state != RouteState::PendingDestroy {
            r.state = RouteState::PendingDestroy;
            self.routes_to_destroy.push(route);
        }
    }

    /// Frees every route marked for destruction. Returns how many were freed.
    pub fn flush_destroyed_routes(&mut self) -> usize {
        let doomed = core::mem::take(&mut self.routes_to_destroy);
        let mut freed = 0;
        for route in doomed {
            let Some(r) = self.routes.remove(route) else {
                continue;
            };
            for n in [r.from, r.to] {
                if let Some(data) = self.nodes.get_mut(n) {
                    data.routes.retain(|&x| x != route);
                }
            }
            freed += 1;
        }
        if freed > 0 {
            let routes = &self.routes;
            self.routes_to_activate.retain(|&r| routes.contains(r));
        }
        freed
    }
}
