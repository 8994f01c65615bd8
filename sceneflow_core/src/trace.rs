// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the tick driver.
//!
//! This module provides a [`TraceSink`] trait with one method per engine
//! event. All method bodies default to no-ops, so implementing only the
//! events you care about is fine.
//!
//! Every [`SceneGraph`](crate::graph::SceneGraph) owns a [`Tracer`]. When the
//! `trace` feature is **off**, every `Tracer` method compiles to nothing. When
//! **on**, each method performs a single `Option` branch before dispatching
//! to the installed sink.
//!
//! To inspect a sink after handing it to the graph, install it as
//! `Rc<RefCell<S>>`, which implements `TraceSink` by forwarding.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;

use crate::event::EventType;
use crate::node::NodeId;
use crate::route::RouteId;
use crate::smil::TimingStatus;

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when [`advance`](crate::graph::SceneGraph::advance) starts.
#[derive(Clone, Copy, Debug)]
pub struct TickBeginEvent {
    /// Monotonic tick counter.
    pub tick: u64,
    /// Scene time read from the time source.
    pub scene_time: f64,
}

/// Emitted when [`advance`](crate::graph::SceneGraph::advance) finishes.
#[derive(Clone, Copy, Debug)]
pub struct TickEndEvent {
    /// Tick counter.
    pub tick: u64,
    /// Scene time of the tick.
    pub scene_time: f64,
}

/// Emitted for every route that fired.
#[derive(Clone, Copy, Debug)]
pub struct RouteFiredEvent {
    /// Tick counter.
    pub tick: u64,
    /// The route.
    pub route: RouteId,
    /// Source node.
    pub from: NodeId,
    /// Destination node.
    pub to: NodeId,
    /// Whether the destination value changed.
    pub changed: bool,
}

/// Emitted when a queued route is dropped because an endpoint died or the
/// value was rejected.
#[derive(Clone, Copy, Debug)]
pub struct RouteDroppedEvent {
    /// Tick counter.
    pub tick: u64,
    /// The route.
    pub route: RouteId,
}

/// Emitted when a timed element changes status.
#[derive(Clone, Copy, Debug)]
pub struct TimingTransitionEvent {
    /// Tick counter.
    pub tick: u64,
    /// The timed element.
    pub element: NodeId,
    /// Previous status.
    pub from: TimingStatus,
    /// New status.
    pub to: TimingStatus,
    /// Scene time of the transition.
    pub scene_time: f64,
}

/// Emitted after an event finished dispatching.
#[derive(Clone, Copy, Debug)]
pub struct EventDispatchedEvent {
    /// Tick counter.
    pub tick: u64,
    /// Event type.
    pub kind: EventType,
    /// Event target.
    pub target: NodeId,
    /// Number of listeners invoked.
    pub listeners: u32,
    /// Whether a listener canceled propagation.
    pub canceled: bool,
}

/// Per-tick counters produced at the end of
/// [`advance`](crate::graph::SceneGraph::advance).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickSummary {
    /// Tick counter.
    pub tick: u64,
    /// Scene time of the tick.
    pub scene_time: f64,
    /// Routes that fired.
    pub routes_fired: u32,
    /// Routes dropped.
    pub routes_dropped: u32,
    /// Routes freed by the destroy pass.
    pub routes_freed: u32,
    /// Timing status transitions.
    pub timing_transitions: u32,
    /// Events dispatched (host and synthetic).
    pub events_dispatched: u32,
    /// Attributes written by the animation sandwich.
    pub attributes_animated: u32,
    /// Extern protos resolved this tick.
    pub protos_resolved: u32,
    /// Whether dirty propagation reached the root.
    pub graph_dirty: bool,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the tick driver.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a tick starts.
    fn on_tick_begin(&mut self, e: &TickBeginEvent) {
        _ = e;
    }

    /// Called when a tick ends.
    fn on_tick_end(&mut self, e: &TickEndEvent) {
        _ = e;
    }

    /// Called when a route fires.
    fn on_route_fired(&mut self, e: &RouteFiredEvent) {
        _ = e;
    }

    /// Called when a route is dropped.
    fn on_route_dropped(&mut self, e: &RouteDroppedEvent) {
        _ = e;
    }

    /// Called when a timed element changes status.
    fn on_timing_transition(&mut self, e: &TimingTransitionEvent) {
        _ = e;
    }

    /// Called after an event dispatch.
    fn on_event_dispatched(&mut self, e: &EventDispatchedEvent) {
        _ = e;
    }

    /// Called with the per-tick summary.
    fn on_tick_summary(&mut self, s: &TickSummary) {
        _ = s;
    }
}

impl<T: TraceSink + ?Sized> TraceSink for Rc<RefCell<T>> {
    fn on_tick_begin(&mut self, e: &TickBeginEvent) {
        self.borrow_mut().on_tick_begin(e);
    }

    fn on_tick_end(&mut self, e: &TickEndEvent) {
        self.borrow_mut().on_tick_end(e);
    }

    fn on_route_fired(&mut self, e: &RouteFiredEvent) {
        self.borrow_mut().on_route_fired(e);
    }

    fn on_route_dropped(&mut self, e: &RouteDroppedEvent) {
        self.borrow_mut().on_route_dropped(e);
    }

    fn on_timing_transition(&mut self, e: &TimingTransitionEvent) {
        self.borrow_mut().on_timing_transition(e);
    }

    fn on_event_dispatched(&mut self, e: &EventDispatchedEvent) {
        self.borrow_mut().on_event_dispatched(e);
    }

    fn on_tick_summary(&mut self, s: &TickSummary) {
        self.borrow_mut().on_tick_summary(s);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Owning wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing and
/// installed sinks are dropped immediately.
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Box<dyn TraceSink>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::none()
    }
}

impl Tracer {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: Box<dyn TraceSink>) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {}
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {}
        }
    }

    /// Removes and returns the installed sink.
    pub fn take(&mut self) -> Option<Box<dyn TraceSink>> {
        #[cfg(feature = "trace")]
        {
            self.sink.take()
        }
        #[cfg(not(feature = "trace"))]
        {
            None
        }
    }

    /// Emits a [`TickBeginEvent`].
    #[inline]
    pub fn tick_begin(&mut self, e: &TickBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_tick_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TickEndEvent`].
    #[inline]
    pub fn tick_end(&mut self, e: &TickEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_tick_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`RouteFiredEvent`].
    #[inline]
    pub fn route_fired(&mut self, e: &RouteFiredEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_route_fired(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`RouteDroppedEvent`].
    #[inline]
    pub fn route_dropped(&mut self, e: &RouteDroppedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_route_dropped(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TimingTransitionEvent`].
    #[inline]
    pub fn timing_transition(&mut self, e: &TimingTransitionEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_timing_transition(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`EventDispatchedEvent`].
    #[inline]
    pub fn event_dispatched(&mut self, e: &EventDispatchedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_event_dispatched(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TickSummary`].
    #[inline]
    pub fn tick_summary(&mut self, s: &TickSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_tick_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }
}
