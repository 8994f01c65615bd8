// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! SMIL timing.
//!
//! Any node can become a timed element through
//! [`SceneGraph::set_timing`]. Each timed element owns a runtime holding a
//! begin-sorted list of [`Interval`]s and a small state machine
//! ([`TimingStatus`]). The timing pass of
//! [`advance`](SceneGraph::advance) evaluates every element against the
//! scene time (mapped through its [`SyncPolicy`]), queues `beginEvent`,
//! `endEvent` and `repeatEvent` for dispatch later in the same tick, and
//! mirrors the status into the element's `isActive`, `fraction_changed`
//! and `cycleTime` fields when its kind declares them.
//!
//! Event-based begin and end entries become internal listeners that add
//! instance times when the event fires. Entries naming an element that does
//! not exist yet stay pending and are retried whenever an id or name is
//! assigned.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::event::{Action, DomEvent, EventType};
use crate::graph::SceneGraph;
use crate::node::NodeId;
use crate::trace::TimingTransitionEvent;
use crate::value::FieldValue;

pub mod interval;
mod runtime;
pub mod spec;

pub use interval::Interval;
pub(crate) use runtime::TimingRuntime;
use runtime::{Evaluation, PendingRef};
pub use spec::{
    Fill, INDEFINITE, Restart, SimpleDuration, TimeSpec, TimingAttributes, parse_clock_value,
};

/// Status of a timed element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TimingStatus {
    /// No interval has begun yet, or the next one is still ahead.
    #[default]
    WaitingToBegin,
    /// Inside an interval.
    Active,
    /// Between intervals, waiting for an event-based begin.
    PostActive,
    /// After an interval with `fill="freeze"`, holding the last value.
    Frozen,
    /// Nothing left to play.
    Done,
}

/// Result of evaluating one element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvalOutcome {
    /// Nothing changed.
    #[default]
    NoOp,
    /// Active, with a new fraction (or a new interval begun).
    FractionChanged,
    /// An interval ended and the element is not active any more.
    IntervalEnded,
    /// The first interval began and the discard target was removed; the
    /// element's runtime is gone.
    Discarded,
}

/// Snapshot of a timed element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingState {
    /// Current status.
    pub status: TimingStatus,
    /// Progress through the current simple duration, in `[0, 1]`.
    pub fraction: f64,
    /// Repeat cycle, counted from 0.
    pub cycle: u32,
    /// The active interval, or the last one that ended.
    pub interval: Option<Interval>,
    /// Element-local time of the last evaluation.
    pub local_time: f64,
}

/// Maps scene time to an element's local time (SMIL `syncBehavior`).
pub trait SyncPolicy {
    /// Local time of `element` at `scene_time`.
    fn local_time(&mut self, element: NodeId, scene_time: f64) -> f64;
}

/// `syncBehavior="locked"`: local time is scene time.
#[derive(Clone, Copy, Debug, Default)]
pub struct Locked;

impl SyncPolicy for Locked {
    fn local_time(&mut self, _element: NodeId, scene_time: f64) -> f64 {
        scene_time
    }
}

/// Called after every evaluation of an element that did not end in
/// [`EvalOutcome::NoOp`].
pub type TimedBehavior = Box<dyn FnMut(&mut SceneGraph, NodeId, &TimingState)>;

impl SceneGraph {
    /// Makes `node` a timed element with `attrs`, replacing any previous
    /// timing. The behavior and sync policy of a previous runtime carry
    /// over.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] for a stale handle, [`Error::InvalidInterval`]
    /// for unusable attribute values. Nothing changes on error.
    pub fn set_timing(&mut self, node: NodeId, attrs: TimingAttributes) -> Result<()> {
        attrs.validate()?;
        let Some(data) = self.nodes.get_mut(node) else {
            return Err(Error::StaleNode(node));
        };
        let old = data.timing.take();
        let mut rt = Box::new(TimingRuntime::new(attrs));
        if let Some(mut old) = old {
            rt.behavior = old.behavior.take();
            core::mem::swap(&mut rt.policy, &mut old.policy);
            for l in old.listeners {
                self.remove_listener(l);
            }
        }

        let mut specs: Vec<PendingRef> = Vec::new();
        if rt.attrs.begin.is_empty() {
            specs.push(PendingRef {
                spec: TimeSpec::Offset(0.0),
                begin: true,
            });
        }
        specs.extend(rt.attrs.begin.iter().map(|s| PendingRef {
            spec: s.clone(),
            begin: true,
        }));
        specs.extend(rt.attrs.end.iter().map(|s| PendingRef {
            spec: s.clone(),
            begin: false,
        }));

        if let Some(data) = self.nodes.get_mut(node) {
            data.timing = Some(rt);
        }
        if !self.timed.contains(&node) {
            self.timed.push(node);
        }
        for p in specs {
            if !self.attach_spec(node, &p) {
                log::warn!("{node:?}: unresolved timing reference {:?}", p.spec);
                if let Some(rt) = self.runtime_mut(node) {
                    rt.pending.push(p);
                }
            }
        }
        Ok(())
    }

    /// Removes the timing of `node`. Returns whether it was timed.
    pub fn clear_timing(&mut self, node: NodeId) -> bool {
        let rt = self.nodes.get_mut(node).and_then(|d| d.timing.take());
        let was_timed = rt.is_some();
        self.forget_timed(node, rt);
        was_timed
    }

    /// Timed elements, in the order their timing was set.
    #[must_use]
    pub fn timed_elements(&self) -> &[NodeId] {
        &self.timed
    }

    /// Snapshot of a timed element.
    #[must_use]
    pub fn timing_state(&self, node: NodeId) -> Option<TimingState> {
        self.runtime(node).map(|rt| rt.state())
    }

    /// Status of a timed element.
    #[must_use]
    pub fn timing_status(&self, node: NodeId) -> Option<TimingStatus> {
        self.runtime(node).map(|rt| rt.status)
    }

    /// Intervals of a timed element, sorted by begin. Includes the most
    /// recently consumed ones.
    #[must_use]
    pub fn intervals(&self, node: NodeId) -> &[Interval] {
        match self.runtime(node) {
            Some(rt) => &rt.intervals,
            None => &[],
        }
    }

    /// Adds a begin instance time, as a DOM `beginElementAt` would.
    ///
    /// Returns whether an interval was created; the restart policy and the
    /// interval cap can refuse it.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] for a stale handle.
    pub fn add_begin_instance(&mut self, node: NodeId, time: f64) -> Result<bool> {
        if !self.nodes.contains(node) {
            return Err(Error::StaleNode(node));
        }
        let cap = self.config.max_intervals;
        Ok(self.runtime_mut(node).is_some_and(|rt| rt.add_begin(time, cap)))
    }

    /// Adds an end instance time, as a DOM `endElementAt` would.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] for a stale handle.
    pub fn add_end_instance(&mut self, node: NodeId, time: f64) -> Result<()> {
        if !self.nodes.contains(node) {
            return Err(Error::StaleNode(node));
        }
        if let Some(rt) = self.runtime_mut(node) {
            rt.add_end(time);
        }
        Ok(())
    }

    /// Resets `node` to [`TimingStatus::WaitingToBegin`] and rebuilds its
    /// intervals from the begin instance times at or after the current
    /// time.
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] for a stale handle.
    pub fn restart(&mut self, node: NodeId) -> Result<()> {
        if !self.nodes.contains(node) {
            return Err(Error::StaleNode(node));
        }
        let (now, cap) = (self.now, self.config.max_intervals);
        let mut out = Evaluation::default();
        let Some(rt) = self.runtime_mut(node) else {
            return Ok(());
        };
        rt.restart(now, cap, &mut out);
        self.record_transitions(node, &out);
        self.mirror_status(node, TimingStatus::WaitingToBegin, 0.0);
        Ok(())
    }

    /// Installs the callback run after each non-trivial evaluation of
    /// `node`. Returns `false` if `node` is not timed.
    pub fn set_timed_behavior(&mut self, node: NodeId, behavior: Option<TimedBehavior>) -> bool {
        match self.runtime_mut(node) {
            Some(rt) => {
                rt.behavior = behavior;
                true
            }
            None => false,
        }
    }

    /// Replaces the sync policy of `node`. Returns `false` if `node` is not
    /// timed.
    pub fn set_sync_policy(&mut self, node: NodeId, policy: Box<dyn SyncPolicy>) -> bool {
        match self.runtime_mut(node) {
            Some(rt) => {
                rt.policy = policy;
                true
            }
            None => false,
        }
    }

    /// Evaluates one timed element at `scene_time`.
    ///
    /// Synthetic events are queued, not dispatched; the tick driver
    /// dispatches them after the timing pass. An untimed node evaluates to
    /// [`EvalOutcome::NoOp`].
    ///
    /// # Errors
    ///
    /// [`Error::StaleNode`] for a stale handle.
    pub fn evaluate_timing(&mut self, node: NodeId, scene_time: f64) -> Result<EvalOutcome> {
        let Some(data) = self.nodes.get_mut(node) else {
            return Err(Error::StaleNode(node));
        };
        let Some(mut rt) = data.timing.take() else {
            return Ok(EvalOutcome::NoOp);
        };
        let local = rt.policy.local_time(node, scene_time);
        let mut out = Evaluation::default();
        rt.evaluate(local, &mut out);
        let state = rt.state();
        let discard = if out.first_begin { rt.attrs.discard } else { None };
        if let Some(data) = self.nodes.get_mut(node) {
            data.timing = Some(rt);
        }

        self.record_transitions(node, &out);
        for &(kind, param, at) in &out.events {
            let mut event = DomEvent::new(kind).with_time(at);
            if let Some(p) = param {
                event = event.with_param(p);
            }
            self.queue_event(node, event);
            if matches!(kind, EventType::BeginEvent | EventType::RepeatEvent) {
                self.mirror(node, "cycleTime", FieldValue::Time(at));
            }
        }
        if out.outcome != EvalOutcome::NoOp || !out.transitions.is_empty() {
            self.mirror_status(node, state.status, state.fraction);
        }
        if out.outcome != EvalOutcome::NoOp {
            self.run_behavior(node, &state);
        }

        if let Some(target) = discard {
            if self.nodes.contains(target) {
                log::debug!("{node:?} discards {target:?}");
                self.detach_from_parents(target);
            }
            let rt = self.nodes.get_mut(node).and_then(|d| d.timing.take());
            self.forget_timed(node, rt);
            return Ok(EvalOutcome::Discarded);
        }
        Ok(out.outcome)
    }

    /// Evaluates every timed element at the current scene time.
    pub(crate) fn run_timing_pass(&mut self) {
        let now = self.now;
        for node in self.timed.clone() {
            match self.evaluate_timing(node, now) {
                Ok(_) => {}
                // Torn down earlier in this pass, by a discard.
                Err(Error::StaleNode(_)) => log::debug!("{node:?} is gone; timing skipped"),
                Err(e) => log::warn!("timing of {node:?} failed: {e}"),
            }
        }
    }

    /// Adds an instance time coming from an event, sync base or access key.
    pub(crate) fn add_instance_time(&mut self, element: NodeId, begin: bool, time: f64) {
        let cap = self.config.max_intervals;
        let Some(rt) = self.runtime_mut(element) else {
            return;
        };
        if begin {
            rt.add_begin(time, cap);
        } else {
            rt.add_end(time);
        }
    }

    /// Retries the pending references of every timed element.
    pub(crate) fn retry_pending_refs(&mut self) {
        for node in self.timed.clone() {
            let pending = match self.runtime_mut(node) {
                Some(rt) if !rt.pending.is_empty() => core::mem::take(&mut rt.pending),
                _ => continue,
            };
            let mut left = Vec::new();
            for p in pending {
                if self.attach_spec(node, &p) {
                    log::debug!("{node:?}: resolved timing reference {:?}", p.spec);
                } else {
                    left.push(p);
                }
            }
            if let Some(rt) = self.runtime_mut(node) {
                rt.pending = left;
            }
        }
    }

    /// Drops the bookkeeping of a timed element whose runtime was taken out
    /// (or never existed).
    pub(crate) fn forget_timed(&mut self, node: NodeId, rt: Option<Box<TimingRuntime>>) {
        self.timed.retain(|&n| n != node);
        if let Some(rt) = rt {
            for l in rt.listeners {
                self.remove_listener(l);
            }
        }
    }

    pub(crate) fn runtime(&self, node: NodeId) -> Option<&TimingRuntime> {
        self.nodes.get(node)?.timing.as_deref()
    }

    fn runtime_mut(&mut self, node: NodeId) -> Option<&mut TimingRuntime> {
        self.nodes.get_mut(node)?.timing.as_deref_mut()
    }

    /// Turns one begin or end entry into instance times or an internal
    /// listener. Returns `false` while the entry's element is unknown.
    fn attach_spec(&mut self, element: NodeId, p: &PendingRef) -> bool {
        let begin = p.begin;
        let (observed, kind, param, offset) = match &p.spec {
            TimeSpec::Offset(t) => {
                self.add_instance_time(element, begin, *t);
                return true;
            }
            TimeSpec::Indefinite => return true,
            TimeSpec::Event { id, event, offset } => {
                let observed = match id {
                    Some(id) => self.resolve_ref(id),
                    None => Some(self.default_event_base(element)),
                };
                let Some(observed) = observed else {
                    return false;
                };
                (observed, *event, None, *offset)
            }
            TimeSpec::SyncBase { id, end, offset } => {
                let Some(observed) = self.resolve_ref(id) else {
                    return false;
                };
                // A sync base that already began contributes its current
                // interval right away.
                let current = self.runtime(observed).and_then(|rt| match rt.status {
                    TimingStatus::Active => rt.interval().copied(),
                    _ => None,
                });
                if let Some(iv) = current {
                    let t = if *end { iv.end } else { iv.begin };
                    if t.is_finite() {
                        self.add_instance_time(element, begin, t + offset);
                    }
                }
                let kind = if *end {
                    EventType::EndEvent
                } else {
                    EventType::BeginEvent
                };
                (observed, kind, None, *offset)
            }
            TimeSpec::Repeat {
                id,
                iteration,
                offset,
            } => {
                let Some(observed) = self.resolve_ref(id) else {
                    return false;
                };
                (observed, EventType::RepeatEvent, Some(*iteration), *offset)
            }
            TimeSpec::AccessKey { key, offset } => {
                let Some(root) = self.root else {
                    return false;
                };
                (root, EventType::KeyDown, Some(u32::from(*key)), *offset)
            }
        };
        let listener = self.add_listener_action(
            observed,
            kind,
            param,
            Action::Timing {
                element,
                begin,
                offset,
            },
        );
        if let Some(rt) = self.runtime_mut(element) {
            rt.listeners.push(listener);
        }
        true
    }

    /// Where an id-less event entry listens: the animation target, or the
    /// element itself.
    fn default_event_base(&self, element: NodeId) -> NodeId {
        self.nodes
            .get(element)
            .and_then(|d| d.animator.as_ref())
            .map_or(element, |a| a.target)
    }

    fn record_transitions(&mut self, node: NodeId, out: &Evaluation) {
        let (tick, scene_time) = (self.tick, self.now);
        for &(from, to) in &out.transitions {
            self.stats.timing_transitions += 1;
            self.tracer.timing_transition(&TimingTransitionEvent {
                tick,
                element: node,
                from,
                to,
                scene_time,
            });
        }
    }

    fn mirror_status(&mut self, node: NodeId, status: TimingStatus, fraction: f64) {
        self.mirror(node, "isActive", FieldValue::Bool(status == TimingStatus::Active));
        if matches!(status, TimingStatus::Active | TimingStatus::Frozen) {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "fraction_changed is a single-precision field"
            )]
            let fraction = fraction as f32;
            self.mirror(node, "fraction_changed", FieldValue::Float(fraction));
        }
    }

    /// Writes an output field if the node's kind declares it, notifying only
    /// on change.
    fn mirror(&mut self, node: NodeId, name: &str, value: FieldValue) {
        let Ok(index) = self.field_index(node, name) else {
            return;
        };
        if let Ok(true) = self.write_field(node, index, value) {
            self.react_to_write(node, index, true);
        }
    }

    fn run_behavior(&mut self, node: NodeId, state: &TimingState) {
        let Some(mut behavior) = self.runtime_mut(node).and_then(|rt| rt.behavior.take()) else {
            return;
        };
        behavior(self, node, state);
        if let Some(rt) = self.runtime_mut(node) {
            if rt.behavior.is_none() {
                rt.behavior = Some(behavior);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use super::*;
    use crate::clock::SceneClock;
    use crate::kind::NodeTag;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn attrs(begin: &str, dur: f64) -> TimingAttributes {
        TimingAttributes {
            begin: TimeSpec::parse_list(begin).unwrap(),
            dur: SimpleDuration::Value(dur),
            ..TimingAttributes::new()
        }
    }

    fn scene() -> (SceneGraph, NodeId, Rc<RefCell<SceneClock>>) {
        let mut g = SceneGraph::new();
        let root = g.new_node(NodeTag::GROUP).unwrap();
        g.register(root, None).unwrap();
        g.set_root(Some(root));
        let clock = Rc::new(RefCell::new(SceneClock::new()));
        g.set_time_source(Some(Box::new(clock.clone())));
        (g, root, clock)
    }

    fn animate_under(g: &mut SceneGraph, root: NodeId) -> NodeId {
        let n = g.new_node(NodeTag::ANIMATE).unwrap();
        g.append_child(root, n).unwrap();
        n
    }

    fn tick_at(g: &mut SceneGraph, clock: &Rc<RefCell<SceneClock>>, t: f64) {
        clock.borrow_mut().seek(t);
        g.advance();
    }

    #[test]
    fn begin_two_dur_three_through_the_graph() {
        let (mut g, root, clock) = scene();
        let a = animate_under(&mut g, root);
        g.set_timing(a, attrs("2s", 3.0)).unwrap();

        tick_at(&mut g, &clock, 1.0);
        assert_eq!(g.timing_status(a), Some(TimingStatus::WaitingToBegin));

        tick_at(&mut g, &clock, 2.5);
        let state = g.timing_state(a).unwrap();
        assert_eq!(state.status, TimingStatus::Active);
        assert!(close(state.fraction, 0.5 / 3.0), "fraction {}", state.fraction);
        assert_eq!(g.field_value(a, 0).ok(), Some(&FieldValue::Bool(true)));

        tick_at(&mut g, &clock, 5.1);
        assert_eq!(g.timing_status(a), Some(TimingStatus::Done));
        assert_eq!(g.field_value(a, 0).ok(), Some(&FieldValue::Bool(false)));
    }

    #[test]
    fn synthetic_events_reach_listeners() {
        let (mut g, root, clock) = scene();
        let a = animate_under(&mut g, root);
        g.set_timing(a, attrs("0s", 1.0)).unwrap();
        let seen: Rc<RefCell<Vec<(EventType, Option<f64>)>>> = Rc::default();
        for kind in [EventType::BeginEvent, EventType::EndEvent] {
            let seen = seen.clone();
            g.add_listener(
                a,
                kind,
                None,
                crate::event::Handler::native(move |_, ev: &mut DomEvent| {
                    seen.borrow_mut().push((ev.kind, ev.time));
                }),
            )
            .unwrap();
        }
        tick_at(&mut g, &clock, 0.5);
        tick_at(&mut g, &clock, 2.0);
        assert_eq!(
            *seen.borrow(),
            vec![
                (EventType::BeginEvent, Some(0.0)),
                (EventType::EndEvent, Some(1.0))
            ]
        );
    }

    #[test]
    fn click_begins_the_element() {
        let (mut g, root, clock) = scene();
        let button = g.new_node(NodeTag::GROUP).unwrap();
        g.append_child(root, button).unwrap();
        g.set_id(button, None, Some("button")).unwrap();
        let a = animate_under(&mut g, root);
        g.set_timing(a, attrs("button.click+1s", 2.0)).unwrap();

        tick_at(&mut g, &clock, 3.0);
        assert!(g.intervals(a).is_empty());
        g.fire(button, &mut DomEvent::new(EventType::Click)).unwrap();
        assert_eq!(g.intervals(a)[0].begin, 4.0);

        tick_at(&mut g, &clock, 4.5);
        assert_eq!(g.timing_status(a), Some(TimingStatus::Active));
        tick_at(&mut g, &clock, 7.0);
        assert_eq!(g.timing_status(a), Some(TimingStatus::PostActive));
    }

    #[test]
    fn forward_references_resolve_once_named() {
        let (mut g, root, clock) = scene();
        let a = animate_under(&mut g, root);
        g.set_timing(a, attrs("later.click", 1.0)).unwrap();
        let later = g.new_node(NodeTag::GROUP).unwrap();
        g.append_child(root, later).unwrap();
        g.set_id(later, Some(7), Some("later")).unwrap();

        tick_at(&mut g, &clock, 1.0);
        g.fire(later, &mut DomEvent::new(EventType::Click)).unwrap();
        assert_eq!(g.intervals(a).len(), 1);
    }

    #[test]
    fn sync_base_follows_the_end_of_another_element() {
        let (mut g, root, clock) = scene();
        let first = animate_under(&mut g, root);
        g.set_id(first, None, Some("first")).unwrap();
        g.set_timing(first, attrs("0s", 1.0)).unwrap();
        let second = animate_under(&mut g, root);
        g.set_timing(second, attrs("first.end+0.5s", 1.0)).unwrap();

        tick_at(&mut g, &clock, 0.5);
        tick_at(&mut g, &clock, 1.2);
        assert_eq!(g.intervals(second)[0].begin, 1.5);
        tick_at(&mut g, &clock, 1.6);
        assert_eq!(g.timing_status(second), Some(TimingStatus::Active));
    }

    #[test]
    fn repeat_spec_waits_for_the_given_iteration() {
        let (mut g, root, clock) = scene();
        let looping = animate_under(&mut g, root);
        g.set_id(looping, None, Some("loop")).unwrap();
        let mut looping_attrs = attrs("0s", 1.0);
        looping_attrs.repeat_count = Some(INDEFINITE);
        g.set_timing(looping, looping_attrs).unwrap();
        let follower = animate_under(&mut g, root);
        g.set_timing(follower, attrs("loop.repeat(2)", 1.0)).unwrap();

        tick_at(&mut g, &clock, 0.1);
        tick_at(&mut g, &clock, 1.5);
        assert!(g.intervals(follower).is_empty());
        tick_at(&mut g, &clock, 2.5);
        assert_eq!(g.intervals(follower)[0].begin, 2.0);
    }

    #[test]
    fn access_key_listens_on_the_root() {
        let (mut g, root, clock) = scene();
        let a = animate_under(&mut g, root);
        g.set_timing(a, attrs("accessKey(s)", 1.0)).unwrap();
        tick_at(&mut g, &clock, 2.0);
        g.fire(root, &mut DomEvent::new(EventType::KeyDown).with_param(u32::from('x')))
            .unwrap();
        assert!(g.intervals(a).is_empty());
        g.fire(root, &mut DomEvent::new(EventType::KeyDown).with_param(u32::from('s')))
            .unwrap();
        assert_eq!(g.intervals(a)[0].begin, 2.0);
    }

    #[test]
    fn discard_detaches_the_target() {
        let (mut g, root, clock) = scene();
        let doomed = g.new_node(NodeTag::GROUP).unwrap();
        g.append_child(root, doomed).unwrap();
        let d = animate_under(&mut g, root);
        let mut discard = attrs("1s", 0.0);
        discard.discard = Some(doomed);
        g.set_timing(d, discard).unwrap();

        tick_at(&mut g, &clock, 0.5);
        assert!(g.is_live(doomed));
        assert_eq!(g.evaluate_timing(d, 1.0), Ok(EvalOutcome::Discarded));
        assert!(!g.contains(doomed));
        assert_eq!(g.timing_state(d), None);
        assert!(!g.timed_elements().contains(&d));
    }

    #[test]
    fn restart_resets_to_waiting() {
        let (mut g, root, clock) = scene();
        let a = animate_under(&mut g, root);
        g.set_timing(a, attrs("0s;5s", 1.0)).unwrap();
        tick_at(&mut g, &clock, 0.5);
        g.restart(a).unwrap();
        assert_eq!(g.timing_status(a), Some(TimingStatus::WaitingToBegin));
        assert_eq!(g.intervals(a).len(), 1);
        assert_eq!(g.intervals(a)[0].begin, 5.0);
    }

    #[test]
    fn behavior_sees_each_change() {
        let (mut g, root, clock) = scene();
        let a = animate_under(&mut g, root);
        g.set_timing(a, attrs("0s", 2.0)).unwrap();
        let fractions: Rc<RefCell<Vec<f64>>> = Rc::default();
        let sink = fractions.clone();
        assert!(g.set_timed_behavior(
            a,
            Some(Box::new(move |_, _, state: &TimingState| {
                sink.borrow_mut().push(state.fraction);
            }))
        ));
        tick_at(&mut g, &clock, 0.5);
        tick_at(&mut g, &clock, 0.5);
        tick_at(&mut g, &clock, 1.0);
        assert_eq!(*fractions.borrow(), vec![0.25, 0.5]);
    }

    #[test]
    fn sync_policy_shifts_local_time() {
        struct Late(f64);
        impl SyncPolicy for Late {
            fn local_time(&mut self, _: NodeId, scene_time: f64) -> f64 {
                scene_time - self.0
            }
        }
        let (mut g, root, clock) = scene();
        let a = animate_under(&mut g, root);
        g.set_timing(a, attrs("0s", 4.0)).unwrap();
        assert!(g.set_sync_policy(a, Box::new(Late(1.0))));
        tick_at(&mut g, &clock, 3.0);
        assert!(close(g.timing_state(a).unwrap().fraction, 0.5));
    }

    #[test]
    fn destroying_an_element_forgets_it() {
        let (mut g, root, _clock) = scene();
        let a = animate_under(&mut g, root);
        g.set_timing(a, attrs("other.click", 1.0)).unwrap();
        g.remove_child(root, a).unwrap();
        assert!(g.timed_elements().is_empty());
    }
}
