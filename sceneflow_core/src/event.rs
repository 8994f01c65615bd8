// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DOM-style event dispatch.
//!
//! Dispatch is target-then-bubble: listeners on the target run in
//! registration order, then (if the event bubbles and nobody canceled it) the
//! listeners of the first parent, and so on up to the root. There is no
//! capture phase; [`Phase::Capture`] exists only so that handler code ported
//! from a full DOM can match on it.
//!
//! Listener registration is deferred. A listener added while an event is
//! being delivered becomes visible at the next top-level
//! [`fire`](SceneGraph::fire) (or the next
//! [`advance`](SceneGraph::advance)), never during the dispatch that added
//! it.

use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;

use kurbo::Point;

use crate::error::{Error, Result};
use crate::graph::SceneGraph;
use crate::id::{Handle, kinds};
use crate::node::NodeId;
use crate::trace::EventDispatchedEvent;

/// Handle to a registered listener.
pub type ListenerId = Handle<kinds::Listener>;

/// Event types understood by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Content finished loading. One-shot.
    Load,
    /// Content is being unloaded.
    Unload,
    /// Pointer click.
    Click,
    /// Pointer button pressed.
    MouseDown,
    /// Pointer button released.
    MouseUp,
    /// Pointer entered the node.
    MouseOver,
    /// Pointer left the node.
    MouseOut,
    /// Pointer moved over the node.
    MouseMove,
    /// Node gained focus.
    FocusIn,
    /// Node lost focus.
    FocusOut,
    /// Node was activated (click or key).
    Activate,
    /// Key pressed; the parameter is the key code.
    KeyDown,
    /// Key released; the parameter is the key code.
    KeyUp,
    /// A timed element began an interval.
    BeginEvent,
    /// A timed element ended an interval.
    EndEvent,
    /// A timed element started a new repeat cycle; the parameter is the
    /// cycle number.
    RepeatEvent,
    /// Loading was aborted.
    Abort,
    /// Loading failed.
    Error,
    /// The viewport was resized.
    Resize,
    /// The viewport was scrolled.
    Scroll,
}

impl EventType {
    /// Parses a DOM / SMIL event name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "load" | "SVGLoad" => Self::Load,
            "unload" | "SVGUnload" => Self::Unload,
            "click" => Self::Click,
            "mousedown" => Self::MouseDown,
            "mouseup" => Self::MouseUp,
            "mouseover" => Self::MouseOver,
            "mouseout" => Self::MouseOut,
            "mousemove" => Self::MouseMove,
            "focusin" | "DOMFocusIn" => Self::FocusIn,
            "focusout" | "DOMFocusOut" => Self::FocusOut,
            "activate" | "DOMActivate" => Self::Activate,
            "keydown" => Self::KeyDown,
            "keyup" => Self::KeyUp,
            "beginEvent" => Self::BeginEvent,
            "endEvent" => Self::EndEvent,
            "repeatEvent" => Self::RepeatEvent,
            "abort" | "SVGAbort" => Self::Abort,
            "error" | "SVGError" => Self::Error,
            "resize" | "SVGResize" => Self::Resize,
            "scroll" | "SVGScroll" => Self::Scroll,
            _ => return None,
        })
    }

    /// Canonical DOM name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Unload => "unload",
            Self::Click => "click",
            Self::MouseDown => "mousedown",
            Self::MouseUp => "mouseup",
            Self::MouseOver => "mouseover",
            Self::MouseOut => "mouseout",
            Self::MouseMove => "mousemove",
            Self::FocusIn => "focusin",
            Self::FocusOut => "focusout",
            Self::Activate => "activate",
            Self::KeyDown => "keydown",
            Self::KeyUp => "keyup",
            Self::BeginEvent => "beginEvent",
            Self::EndEvent => "endEvent",
            Self::RepeatEvent => "repeatEvent",
            Self::Abort => "abort",
            Self::Error => "error",
            Self::Resize => "resize",
            Self::Scroll => "scroll",
        }
    }

    /// Whether listeners for this type are removed after their first call.
    #[must_use]
    pub const fn is_one_shot(self) -> bool {
        matches!(self, Self::Load)
    }

    /// Whether events of this type bubble by default.
    #[must_use]
    pub const fn bubbles(self) -> bool {
        matches!(
            self,
            Self::Click
                | Self::MouseDown
                | Self::MouseUp
                | Self::MouseOver
                | Self::MouseOut
                | Self::MouseMove
                | Self::FocusIn
                | Self::FocusOut
                | Self::Activate
                | Self::KeyDown
                | Self::KeyUp
                | Self::Scroll
        )
    }
}

/// Dispatch phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Never entered by this dispatcher.
    Capture,
    /// Delivering at the target.
    #[default]
    Target,
    /// Delivering at an ancestor.
    Bubble,
    /// A handler stopped propagation.
    Canceled,
}

/// Type-specific event payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum EventDetail {
    /// No payload.
    #[default]
    None,
    /// Pointer position in scene coordinates and button index.
    Pointer {
        /// Position.
        position: Point,
        /// Button index (0 = primary).
        button: u8,
    },
    /// Key code and, if printable, the character.
    Key {
        /// Key code.
        code: u32,
        /// Printable character.
        ch: Option<char>,
    },
    /// Repeat cycle number.
    Cycle(u32),
}

/// An event travelling through the graph.
#[derive(Clone, Debug, PartialEq)]
pub struct DomEvent {
    /// Event type.
    pub kind: EventType,
    /// Listener filter parameter (key code, repeat cycle).
    pub param: Option<u32>,
    /// Node the event was fired at (set by the dispatcher).
    pub target: Option<NodeId>,
    /// Node whose listeners are running (set by the dispatcher).
    pub current_target: Option<NodeId>,
    /// Current phase.
    pub phase: Phase,
    /// Whether the event continues to ancestors after the target.
    pub bubbles: bool,
    /// Scene time the event refers to; defaults to the graph's current time.
    pub time: Option<f64>,
    /// Payload.
    pub detail: EventDetail,
}

impl DomEvent {
    /// A new event with the type's default bubbling.
    #[must_use]
    pub fn new(kind: EventType) -> Self {
        Self {
            kind,
            param: None,
            target: None,
            current_target: None,
            phase: Phase::Target,
            bubbles: kind.bubbles(),
            time: None,
            detail: EventDetail::None,
        }
    }

    /// Sets the filter parameter.
    #[must_use]
    pub fn with_param(mut self, param: u32) -> Self {
        self.param = Some(param);
        self
    }

    /// Sets the event time.
    #[must_use]
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Stops propagation after the current listener.
    pub fn cancel(&mut self) {
        self.phase = Phase::Canceled;
    }

    /// Whether a handler canceled the event.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.phase == Phase::Canceled
    }
}

/// Native handler closure. Shared so the same closure can serve several
/// listeners.
pub type NativeHandler = Rc<RefCell<dyn FnMut(&mut SceneGraph, &mut DomEvent)>>;

/// What a listener runs.
#[derive(Clone)]
pub enum Handler {
    /// A Rust closure.
    Native(NativeHandler),
    /// A script handler node, executed by the graph's
    /// [`ScriptRuntime`](crate::host::ScriptRuntime). The listener holds one
    /// registration of the node.
    Script(NodeId),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(_) => f.write_str("Native(..)"),
            Self::Script(n) => f.debug_tuple("Script").field(n).finish(),
        }
    }
}

impl Handler {
    /// Wraps a closure.
    pub fn native(f: impl FnMut(&mut SceneGraph, &mut DomEvent) + 'static) -> Self {
        Self::Native(Rc::new(RefCell::new(f)))
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Action {
    Handler(Handler),
    /// Adds a begin or end instance time to a timed element.
    Timing {
        element: NodeId,
        begin: bool,
        offset: f64,
    },
}

#[derive(Debug)]
pub(crate) struct Listener {
    pub(crate) observed: NodeId,
    pub(crate) kind: EventType,
    pub(crate) param: Option<u32>,
    pub(crate) action: Action,
}

impl Listener {
    fn matches(&self, event: &DomEvent) -> bool {
        self.kind == event.kind && (self.param.is_none() || self.param == event.param)
    }
}

impl SceneGraph {
    /// Adds a listener on `node` for events of `kind`, optionally filtered by
    /// parameter.
    ///
    /// The listener becomes active at the next top-level dispatch. A
    /// [`Handler::Script`] node is registered (parentless) for as long as
    /// the listener exists.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] if `node` or the script node is stale.
    pub fn add_listener(
        &mut self,
        node: NodeId,
        kind: EventType,
        param: Option<u32>,
        handler: Handler,
    ) -> Result<ListenerId> {
        if !self.nodes.contains(node) {
            return Err(Error::StaleNode(node));
        }
        if let Handler::Script(h) = handler {
            self.register(h, None)?;
        }
        Ok(self.add_listener_action(node, kind, param, Action::Handler(handler)))
    }

    pub(crate) fn add_listener_action(
        &mut self,
        node: NodeId,
        kind: EventType,
        param: Option<u32>,
        action: Action,
    ) -> ListenerId {
        let id = self.listeners.insert(Listener {
            observed: node,
            kind,
            param,
            action,
        });
        self.listeners_to_add.push(id);
        id
    }

    /// Removes a listener and releases its script node.
    ///
    /// Returns `false` for an unknown listener.
    pub fn remove_listener(&mut self, listener: ListenerId) -> bool {
        let Some(observed) = self.listeners.get(listener).map(|l| l.observed) else {
            return false;
        };
        if let Some(data) = self.nodes.get_mut(observed) {
            data.listeners.retain(|&l| l != listener);
        }
        if let Some(handler) = self.drop_listener(listener) {
            if self.release_edge(handler, None) {
                self.destroy_node(handler);
            }
        }
        true
    }

    /// Forgets a listener; returns the script node whose registration the
    /// caller must release. Does not touch the observed node's list.
    pub(crate) fn drop_listener(&mut self, listener: ListenerId) -> Option<NodeId> {
        self.listeners_to_add.retain(|&l| l != listener);
        match self.listeners.remove(listener)?.action {
            Action::Handler(Handler::Script(h)) => Some(h),
            _ => None,
        }
    }

    /// Listeners currently active on `node`, in registration order.
    #[must_use]
    pub fn listeners_of(&self, node: NodeId) -> &[ListenerId] {
        match self.nodes.get(node) {
            Some(n) => &n.listeners,
            None => &[],
        }
    }

    /// Activates listeners added since the last flush.
    pub(crate) fn flush_listeners(&mut self) {
        for l in core::mem::take(&mut self.listeners_to_add) {
            let Some(observed) = self.listeners.get(l).map(|l| l.observed) else {
                continue;
            };
            match self.nodes.get_mut(observed) {
                Some(data) => data.listeners.push(l),
                None => {
                    if let Some(handler) = self.drop_listener(l) {
                        if self.release_edge(handler, None) {
                            self.destroy_node(handler);
                        }
                    }
                }
            }
        }
    }

    /// Dispatches `event` at `target`.
    ///
    /// Returns `false` if a handler canceled the event. The target is
    /// protected for the duration of each node's delivery: a handler that
    /// drops the last registration of the node does not destroy it until its
    /// listeners are done, and propagation stops there.
    ///
    /// Bubbling walks a single path: from a node with several parents (a
    /// node placed in more than one spot), it continues through the first
    /// parent it is still registered under.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] if `target` is stale.
    pub fn fire(&mut self, target: NodeId, event: &mut DomEvent) -> Result<bool> {
        if !self.nodes.contains(target) {
            return Err(Error::StaleNode(target));
        }
        if self.dispatch_depth == 0 {
            self.flush_listeners();
        }
        self.dispatch_depth += 1;
        event.target = Some(target);
        event.phase = Phase::Target;
        if event.time.is_none() {
            event.time = Some(self.now);
        }

        let mut invoked = 0_u32;
        let mut node = target;
        loop {
            event.current_target = Some(node);
            let Some(data) = self.nodes.get_mut(node) else {
                break;
            };
            let was_live = data.instance_count > 0;
            data.instance_count += 1;
            let ids = data.listeners.clone();

            for l in ids {
                let Some(listener) = self.listeners.get(l) else {
                    continue;
                };
                if !listener.matches(event) {
                    continue;
                }
                let action = listener.action.clone();
                let one_shot = listener.kind.is_one_shot();
                if one_shot {
                    if let Some(data) = self.nodes.get_mut(node) {
                        data.listeners.retain(|&x| x != l);
                    }
                    // The node stays registered until the call returns.
                    self.listeners.remove(l);
                }
                self.invoke(&action, event);
                invoked += 1;
                if one_shot {
                    if let Action::Handler(Handler::Script(h)) = action {
                        if self.release_edge(h, None) {
                            self.destroy_node(h);
                        }
                    }
                }
                if event.is_canceled() {
                    break;
                }
            }

            let hit_zero = self.release_edge(node, None);
            if hit_zero && was_live {
                self.destroy_node(node);
                break;
            }
            if event.is_canceled() || !event.bubbles {
                break;
            }
            let Some(&parent) = self.parents(node).first() else {
                break;
            };
            event.phase = Phase::Bubble;
            node = parent;
        }

        self.dispatch_depth -= 1;
        self.stats.events_dispatched += 1;
        let tick = self.tick;
        let canceled = event.is_canceled();
        self.tracer.event_dispatched(&EventDispatchedEvent {
            tick,
            kind: event.kind,
            target,
            listeners: invoked,
            canceled,
        });
        Ok(!canceled)
    }

    fn invoke(&mut self, action: &Action, event: &mut DomEvent) {
        match action {
            Action::Handler(Handler::Native(f)) => match f.try_borrow_mut() {
                Ok(mut f) => (*f)(self, event),
                Err(_) => log::warn!("{} handler re-entered itself; skipped", event.kind.name()),
            },
            Action::Handler(Handler::Script(h)) => {
                let Some(runtime) = self.scripts.clone() else {
                    log::warn!("no script runtime for handler {h:?}");
                    return;
                };
                match runtime.try_borrow_mut() {
                    Ok(mut rt) => rt.execute_handler(self, *h, event),
                    Err(_) => log::warn!("script runtime busy; handler {h:?} skipped"),
                };
            }
            Action::Timing {
                element,
                begin,
                offset,
            } => {
                let at = event.time.unwrap_or(self.now) + offset;
                self.add_instance_time(*element, *begin, at);
            }
        }
    }

    /// Queues an event for dispatch after the timing pass of the current
    /// tick.
    pub(crate) fn queue_event(&mut self, target: NodeId, event: DomEvent) {
        self.pending_events.push((target, event));
    }

    /// Dispatches queued synthetic events, including those queued while
    /// dispatching. Returns how many were delivered.
    pub(crate) fn dispatch_pending_events(&mut self) -> u32 {
        let mut delivered = 0;
        while !self.pending_events.is_empty() {
            for (target, mut event) in core::mem::take(&mut self.pending_events) {
                if self.fire(target, &mut event).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use super::*;
    use crate::host::ScriptRuntime;
    use crate::kind::NodeTag;

    type Log = Rc<RefCell<Vec<(&'static str, Phase)>>>;

    fn logger(log: &Log, tag: &'static str) -> Handler {
        let log = log.clone();
        Handler::native(move |_, ev: &mut DomEvent| log.borrow_mut().push((tag, ev.phase)))
    }

    fn tree() -> (SceneGraph, NodeId, NodeId) {
        let mut g = SceneGraph::new();
        let root = g.new_node(NodeTag::GROUP).unwrap();
        g.register(root, None).unwrap();
        let child = g.new_node(NodeTag::GROUP).unwrap();
        g.append_child(root, child).unwrap();
        (g, root, child)
    }

    #[test]
    fn target_then_bubble_in_registration_order() {
        let (mut g, root, child) = tree();
        let log: Log = Rc::default();
        g.add_listener(root, EventType::Click, None, logger(&log, "root"))
            .unwrap();
        g.add_listener(child, EventType::Click, None, logger(&log, "a"))
            .unwrap();
        g.add_listener(child, EventType::Click, None, logger(&log, "b"))
            .unwrap();
        assert!(g.fire(child, &mut DomEvent::new(EventType::Click)).unwrap());
        assert_eq!(
            log.borrow().as_slice(),
            [
                ("a", Phase::Target),
                ("b", Phase::Target),
                ("root", Phase::Bubble)
            ]
        );
    }

    #[test]
    fn shared_node_bubbles_through_its_first_parent() {
        let (mut g, root, child) = tree();
        let other = g.new_node(NodeTag::GROUP).unwrap();
        g.append_child(root, other).unwrap();
        let shared = g.new_node(NodeTag::GROUP).unwrap();
        g.append_child(child, shared).unwrap();
        g.append_child(other, shared).unwrap();
        let log: Log = Rc::default();
        g.add_listener(child, EventType::Click, None, logger(&log, "first"))
            .unwrap();
        g.add_listener(other, EventType::Click, None, logger(&log, "second"))
            .unwrap();
        g.fire(shared, &mut DomEvent::new(EventType::Click)).unwrap();
        assert_eq!(log.borrow().as_slice(), [("first", Phase::Bubble)]);
    }

    #[test]
    fn cancel_stops_after_current_listener() {
        let (mut g, root, child) = tree();
        let log: Log = Rc::default();
        g.add_listener(
            child,
            EventType::Click,
            None,
            Handler::native(|_, ev: &mut DomEvent| ev.cancel()),
        )
        .unwrap();
        g.add_listener(child, EventType::Click, None, logger(&log, "late"))
            .unwrap();
        g.add_listener(root, EventType::Click, None, logger(&log, "root"))
            .unwrap();
        assert!(!g.fire(child, &mut DomEvent::new(EventType::Click)).unwrap());
        assert!(log.borrow().is_empty(), "nothing runs after a cancel");
    }

    #[test]
    fn non_bubbling_events_stay_at_target() {
        let (mut g, root, child) = tree();
        let log: Log = Rc::default();
        g.add_listener(root, EventType::BeginEvent, None, logger(&log, "root"))
            .unwrap();
        g.fire(child, &mut DomEvent::new(EventType::BeginEvent))
            .unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn load_listener_fires_at_most_once() {
        let (mut g, _, child) = tree();
        let log: Log = Rc::default();
        g.add_listener(child, EventType::Load, None, logger(&log, "load"))
            .unwrap();
        for _ in 0..3 {
            g.fire(child, &mut DomEvent::new(EventType::Load)).unwrap();
        }
        assert_eq!(log.borrow().len(), 1);
        assert!(g.listeners_of(child).is_empty());
    }

    #[test]
    fn listeners_added_during_dispatch_wait_for_next_fire() {
        let (mut g, _, child) = tree();
        let log: Log = Rc::default();
        let inner = logger(&log, "added");
        g.add_listener(
            child,
            EventType::Click,
            None,
            Handler::native(move |g: &mut SceneGraph, ev: &mut DomEvent| {
                let target = ev.current_target.unwrap();
                g.add_listener(target, EventType::Click, None, inner.clone())
                    .unwrap();
            }),
        )
        .unwrap();
        g.fire(child, &mut DomEvent::new(EventType::Click)).unwrap();
        assert!(log.borrow().is_empty(), "not visible to the adding dispatch");
        g.fire(child, &mut DomEvent::new(EventType::Click)).unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn parameter_filters_listeners() {
        let (mut g, root, _) = tree();
        let log: Log = Rc::default();
        g.add_listener(root, EventType::KeyDown, Some(u32::from('a')), logger(&log, "a"))
            .unwrap();
        g.fire(root, &mut DomEvent::new(EventType::KeyDown).with_param(u32::from('b')))
            .unwrap();
        assert!(log.borrow().is_empty());
        g.fire(root, &mut DomEvent::new(EventType::KeyDown).with_param(u32::from('a')))
            .unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn handler_removing_target_stops_propagation() {
        let (mut g, root, child) = tree();
        let log: Log = Rc::default();
        g.add_listener(
            child,
            EventType::Click,
            None,
            Handler::native(move |g: &mut SceneGraph, ev: &mut DomEvent| {
                let target = ev.current_target.unwrap();
                assert!(g.remove_child(root, target).unwrap(), "child was attached");
                assert!(g.contains(target), "protected during delivery");
            }),
        )
        .unwrap();
        g.add_listener(root, EventType::Click, None, logger(&log, "root"))
            .unwrap();
        g.fire(child, &mut DomEvent::new(EventType::Click)).unwrap();
        assert!(!g.contains(child));
        assert!(log.borrow().is_empty(), "no bubbling from a destroyed node");
    }

    #[derive(Default)]
    struct CountingRuntime {
        calls: Vec<NodeId>,
    }

    impl ScriptRuntime for CountingRuntime {
        fn execute_handler(&mut self, _: &mut SceneGraph, handler: NodeId, _: &mut DomEvent) {
            self.calls.push(handler);
        }
    }

    #[test]
    fn script_handlers_run_through_the_runtime() {
        let (mut g, root, _) = tree();
        let runtime = Rc::new(RefCell::new(CountingRuntime::default()));
        g.set_script_runtime(Some(runtime.clone()));
        let script = g.new_node(NodeTag::SCRIPT).unwrap();
        let l = g
            .add_listener(root, EventType::Activate, None, Handler::Script(script))
            .unwrap();
        assert_eq!(g.instance_count(script), Some(1), "listener holds the script node");
        g.fire(root, &mut DomEvent::new(EventType::Activate)).unwrap();
        assert_eq!(runtime.borrow().calls, vec![script]);
        assert!(g.remove_listener(l));
        assert!(!g.contains(script), "released with the listener");
    }
}
