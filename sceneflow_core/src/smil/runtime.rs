// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-element timing state machine.
//!
//! ```text
//!                      begin reached
//!   WaitingToBegin ─────────────────────► Active ◄─┐ repeat
//!         ▲                                 │ └────┘
//!         │ next interval         end reached│
//!         │                                  ▼
//!         └──────────────── fill=freeze? ── Frozen
//!                           no ─► more intervals? ─► WaitingToBegin
//!                                 event begins?    ─► PostActive
//!                                 otherwise        ─► Done
//! ```
//!
//! Frozen, PostActive and Done elements begin again when a later interval
//! becomes due.

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::interval::Interval;
use super::spec::{Fill, Restart, TimeSpec, TimingAttributes};
use super::{EvalOutcome, Locked, SyncPolicy, TimedBehavior, TimingState, TimingStatus};
use crate::event::{EventType, ListenerId};

/// Upper bound on `repeatEvent`s emitted for cycles skipped by one large
/// time step. Only the most recent cycles are reported.
const MAX_REPEAT_EVENTS: u32 = 32;

/// A begin/end entry whose element reference has not resolved yet.
#[derive(Clone, Debug)]
pub(crate) struct PendingRef {
    pub(crate) spec: TimeSpec,
    pub(crate) begin: bool,
}

/// Side effects of one evaluation, applied by the graph afterwards.
#[derive(Debug, Default)]
pub(crate) struct Evaluation {
    pub(crate) outcome: EvalOutcome,
    pub(crate) transitions: Vec<(TimingStatus, TimingStatus)>,
    /// `(type, param, time)` of synthetic events to dispatch.
    pub(crate) events: Vec<(EventType, Option<u32>, f64)>,
    /// The element began its first interval ever.
    pub(crate) first_begin: bool,
}

pub(crate) struct TimingRuntime {
    pub(crate) attrs: TimingAttributes,
    /// Sorted by begin. `..current` are consumed.
    pub(crate) intervals: Vec<Interval>,
    pub(crate) current: usize,
    pub(crate) status: TimingStatus,
    pub(crate) cycle: u32,
    pub(crate) fraction: f64,
    /// Resolved begin instance times, sorted.
    pub(crate) begins: Vec<f64>,
    /// Resolved end instance times, sorted.
    pub(crate) ends: Vec<f64>,
    pub(crate) has_begun: bool,
    pub(crate) pending: Vec<PendingRef>,
    /// Internal listeners feeding event-based instance times.
    pub(crate) listeners: Vec<ListenerId>,
    pub(crate) behavior: Option<TimedBehavior>,
    pub(crate) policy: Box<dyn SyncPolicy>,
    pub(crate) local_time: f64,
}

impl core::fmt::Debug for TimingRuntime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TimingRuntime")
            .field("status", &self.status)
            .field("intervals", &self.intervals)
            .field("current", &self.current)
            .field("cycle", &self.cycle)
            .field("fraction", &self.fraction)
            .finish_non_exhaustive()
    }
}

fn insert_sorted(list: &mut Vec<f64>, t: f64) -> bool {
    let pos = list.partition_point(|&x| x < t);
    if list.get(pos) == Some(&t) {
        return false;
    }
    list.insert(pos, t);
    true
}

impl TimingRuntime {
    pub(crate) fn new(attrs: TimingAttributes) -> Self {
        Self {
            attrs,
            intervals: Vec::new(),
            current: 0,
            status: TimingStatus::WaitingToBegin,
            cycle: 0,
            fraction: 0.0,
            begins: Vec::new(),
            ends: Vec::new(),
            has_begun: false,
            pending: Vec::new(),
            listeners: Vec::new(),
            behavior: None,
            policy: Box::new(Locked),
            local_time: 0.0,
        }
    }

    /// The interval the current status refers to: the active one, or the
    /// last one that ended.
    pub(crate) fn interval(&self) -> Option<&Interval> {
        match self.status {
            TimingStatus::Active => self.intervals.get(self.current),
            _ => self
                .current
                .checked_sub(1)
                .and_then(|i| self.intervals.get(i)),
        }
    }

    pub(crate) fn state(&self) -> TimingState {
        TimingState {
            status: self.status,
            fraction: self.fraction,
            cycle: self.cycle,
            interval: self.interval().copied(),
            local_time: self.local_time,
        }
    }

    /// Whether the element currently contributes a value (active, or frozen
    /// after its last interval).
    pub(crate) fn is_contributing(&self) -> bool {
        matches!(self.status, TimingStatus::Active | TimingStatus::Frozen)
    }

    fn set_status(&mut self, to: TimingStatus, out: &mut Evaluation) {
        if self.status != to {
            out.transitions.push((self.status, to));
            self.status = to;
        }
    }

    fn may_begin_again(&self) -> bool {
        self.attrs.restart != Restart::Never && self.attrs.has_event_begins()
    }

    // -- Instance times --

    /// Adds a begin instance time and the interval it creates.
    ///
    /// Returns `false` if the restart policy, a duplicate or the interval
    /// cap refused it.
    pub(crate) fn add_begin(&mut self, t: f64, cap: usize) -> bool {
        if !t.is_finite() || (self.attrs.restart == Restart::Never && self.has_begun) {
            return false;
        }
        insert_sorted(&mut self.begins, t);
        self.insert_interval(t, cap)
    }

    /// Adds an end instance time and re-resolves the pending intervals.
    pub(crate) fn add_end(&mut self, t: f64) {
        if insert_sorted(&mut self.ends, t) {
            self.recompute();
        }
    }

    fn insert_interval(&mut self, t: f64, cap: usize) -> bool {
        // Nothing may begin before what already happened.
        let mut floor = f64::NEG_INFINITY;
        if let Some(last) = self.current.checked_sub(1).and_then(|i| self.intervals.get(i)) {
            floor = last.end;
        }
        let active = self.intervals.get(self.current).filter(|_| self.status == TimingStatus::Active);
        if let Some(cur) = active {
            floor = floor.max(cur.begin);
            if t < cur.end && self.attrs.restart != Restart::Always {
                return false;
            }
        }
        let begin = t.max(floor);
        if self.intervals[self.current..].iter().any(|iv| iv.begin == begin) {
            return false;
        }
        if self.intervals.len() - self.current >= cap {
            self.prune_consumed();
            if self.intervals.len() - self.current >= cap {
                log::warn!("interval cap ({cap}) reached; begin at {t}s dropped");
                return false;
            }
        }
        let iv = Interval::resolve(begin, &self.attrs, &self.ends);
        let pos = self.current + self.intervals[self.current..].partition_point(|i| i.begin <= begin);
        self.intervals.insert(pos, iv);
        self.normalize();
        true
    }

    /// Drops consumed intervals except the most recent one, which frozen
    /// elements still refer to.
    fn prune_consumed(&mut self) {
        if self.current > 1 {
            let n = self.current - 1;
            self.intervals.drain(..n);
            self.current -= n;
        }
    }

    fn recompute(&mut self) {
        let (attrs, ends) = (&self.attrs, &self.ends);
        for iv in &mut self.intervals[self.current..] {
            *iv = Interval::resolve(iv.begin, attrs, ends);
        }
        self.normalize();
    }

    /// Resolves overlaps among unconsumed intervals: `restart="always"`
    /// truncates the earlier interval, otherwise the later one is dropped.
    fn normalize(&mut self) {
        let mut i = self.current;
        while i + 1 < self.intervals.len() {
            let next_begin = self.intervals[i + 1].begin;
            if self.intervals[i].end <= next_begin {
                i += 1;
                continue;
            }
            if self.attrs.restart == Restart::Always {
                let iv = &mut self.intervals[i];
                iv.end = next_begin;
                iv.active_duration = next_begin - iv.begin;
                i += 1;
            } else {
                self.intervals.remove(i + 1);
            }
        }
    }

    /// Back to `WaitingToBegin`, with intervals rebuilt from the begin
    /// instance times at or after `now`.
    pub(crate) fn restart(&mut self, now: f64, cap: usize, out: &mut Evaluation) {
        self.intervals.clear();
        self.current = 0;
        self.cycle = 0;
        self.fraction = 0.0;
        self.has_begun = false;
        self.set_status(TimingStatus::WaitingToBegin, out);
        let future: Vec<f64> = self.begins.iter().copied().filter(|&b| b >= now).collect();
        for b in future {
            self.insert_interval(b, cap);
        }
    }

    // -- Evaluation --

    /// Advances the state machine to local time `t`.
    pub(crate) fn evaluate(&mut self, t: f64, out: &mut Evaluation) {
        self.local_time = t;
        let before = (self.status, self.cycle, self.fraction);
        let mut ended = false;
        loop {
            if self.status == TimingStatus::Active {
                let Some(iv) = self.intervals.get(self.current).copied() else {
                    self.set_status(TimingStatus::Done, out);
                    break;
                };
                if t < iv.end {
                    let (cycle, fraction) = iv.position(t);
                    if cycle > self.cycle {
                        let first = (self.cycle + 1).max(cycle.saturating_sub(MAX_REPEAT_EVENTS - 1));
                        for c in first..=cycle {
                            let at = iv.begin + f64::from(c) * iv.simple_duration;
                            out.events.push((EventType::RepeatEvent, Some(c), at));
                        }
                    }
                    self.cycle = cycle;
                    self.fraction = fraction;
                    break;
                }
                out.events.push((EventType::EndEvent, None, iv.end));
                (self.cycle, self.fraction) = iv.end_position();
                self.current += 1;
                ended = true;
                let next = if self.attrs.fill == Fill::Freeze {
                    TimingStatus::Frozen
                } else if self.current < self.intervals.len() {
                    TimingStatus::WaitingToBegin
                } else if self.may_begin_again() {
                    TimingStatus::PostActive
                } else {
                    TimingStatus::Done
                };
                self.set_status(next, out);
                continue;
            }

            let Some(iv) = self.intervals.get(self.current).copied() else {
                break;
            };
            if t < iv.begin {
                break;
            }
            if !self.has_begun {
                out.first_begin = true;
            }
            self.has_begun = true;
            if self.attrs.restart == Restart::Never {
                self.intervals.truncate(self.current + 1);
            }
            self.cycle = 0;
            self.fraction = 0.0;
            out.events.push((EventType::BeginEvent, None, iv.begin));
            self.set_status(TimingStatus::Active, out);
        }

        let changed = before != (self.status, self.cycle, self.fraction);
        out.outcome = if ended && self.status != TimingStatus::Active {
            EvalOutcome::IntervalEnded
        } else if changed && self.status == TimingStatus::Active {
            EvalOutcome::FractionChanged
        } else {
            EvalOutcome::NoOp
        };
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;
    use crate::smil::spec::{INDEFINITE, SimpleDuration};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn runtime(dur: f64) -> TimingRuntime {
        TimingRuntime::new(TimingAttributes {
            dur: SimpleDuration::Value(dur),
            ..TimingAttributes::new()
        })
    }

    fn step(rt: &mut TimingRuntime, t: f64) -> Evaluation {
        let mut out = Evaluation::default();
        rt.evaluate(t, &mut out);
        out
    }

    #[test]
    fn begin_two_dur_three() {
        let mut rt = runtime(3.0);
        assert!(rt.add_begin(2.0, 8));
        assert_eq!(step(&mut rt, 1.0).outcome, EvalOutcome::NoOp);
        assert_eq!(rt.status, TimingStatus::WaitingToBegin);

        let out = step(&mut rt, 2.5);
        assert_eq!(out.outcome, EvalOutcome::FractionChanged);
        assert_eq!(rt.status, TimingStatus::Active);
        assert!(close(rt.fraction, 0.5 / 3.0), "fraction {}", rt.fraction);
        assert!(out.first_begin);
        assert_eq!(out.events, vec![(EventType::BeginEvent, None, 2.0)]);

        let out = step(&mut rt, 5.1);
        assert_eq!(out.outcome, EvalOutcome::IntervalEnded);
        assert_eq!(rt.status, TimingStatus::Done);
        assert_eq!(out.events, vec![(EventType::EndEvent, None, 5.0)]);
    }

    #[test]
    fn freeze_holds_final_fraction() {
        let mut rt = runtime(2.0);
        rt.attrs.fill = Fill::Freeze;
        rt.add_begin(0.0, 8);
        step(&mut rt, 1.0);
        step(&mut rt, 3.0);
        assert_eq!(rt.status, TimingStatus::Frozen);
        assert_eq!(rt.fraction, 1.0);
        assert!(rt.is_contributing());
    }

    #[test]
    fn event_based_begins_leave_the_element_post_active() {
        let mut rt = runtime(1.0);
        rt.attrs.begin = vec![TimeSpec::parse("a.click").unwrap()];
        rt.add_begin(0.0, 8);
        step(&mut rt, 0.5);
        step(&mut rt, 2.0);
        assert_eq!(rt.status, TimingStatus::PostActive);
    }

    #[test]
    fn repeat_events_carry_the_cycle() {
        let mut rt = runtime(1.0);
        rt.attrs.repeat_count = Some(INDEFINITE);
        rt.add_begin(0.0, 8);
        step(&mut rt, 0.1);
        let out = step(&mut rt, 2.5);
        let repeats: Vec<_> = out.events.iter().map(|e| e.1).collect();
        assert_eq!(repeats, vec![Some(1), Some(2)]);
        assert_eq!(rt.cycle, 2);
    }

    #[test]
    fn intervals_stay_sorted_whatever_the_arrival_order() {
        let mut rt = runtime(0.5);
        for b in [9.0, 3.0, 7.0, 1.0, 5.0] {
            assert!(rt.add_begin(b, 8));
        }
        let begins: Vec<f64> = rt.intervals.iter().map(|iv| iv.begin).collect();
        assert_eq!(begins, vec![1.0, 3.0, 5.0, 7.0, 9.0]);
        assert!(!rt.add_begin(5.0, 8), "duplicate begin");
    }

    #[test]
    fn restart_always_truncates_the_active_interval() {
        let mut rt = runtime(10.0);
        rt.add_begin(0.0, 8);
        step(&mut rt, 1.0);
        assert!(rt.add_begin(4.0, 8));
        assert_eq!(rt.intervals[0].end, 4.0);
        let out = step(&mut rt, 4.5);
        assert_eq!(rt.status, TimingStatus::Active);
        assert!(close(rt.fraction, 0.05));
        assert_eq!(
            out.events,
            vec![
                (EventType::EndEvent, None, 4.0),
                (EventType::BeginEvent, None, 4.0)
            ]
        );
    }

    #[test]
    fn restart_when_not_active_ignores_begins_while_active() {
        let mut rt = runtime(10.0);
        rt.attrs.restart = Restart::WhenNotActive;
        rt.add_begin(0.0, 8);
        step(&mut rt, 1.0);
        assert!(!rt.add_begin(4.0, 8));
        assert!(rt.add_begin(12.0, 8), "after the active interval is fine");
    }

    #[test]
    fn restart_never_plays_once() {
        let mut rt = runtime(1.0);
        rt.attrs.restart = Restart::Never;
        rt.add_begin(0.0, 8);
        rt.add_begin(5.0, 8);
        step(&mut rt, 0.5);
        assert_eq!(rt.intervals.len(), 1, "later intervals dropped at first begin");
        assert!(!rt.add_begin(8.0, 8));
        step(&mut rt, 10.0);
        assert_eq!(rt.status, TimingStatus::Done);
    }

    #[test]
    fn end_instance_shortens_the_active_interval() {
        let mut rt = TimingRuntime::new(TimingAttributes::new());
        rt.add_begin(0.0, 8);
        step(&mut rt, 1.0);
        assert_eq!(rt.intervals[0].end, INDEFINITE);
        rt.add_end(2.0);
        assert_eq!(rt.intervals[0].end, 2.0);
        step(&mut rt, 3.0);
        assert_ne!(rt.status, TimingStatus::Active);
    }

    #[test]
    fn cap_refuses_past_the_limit() {
        let mut rt = runtime(1.0);
        for b in 0..4 {
            assert!(rt.add_begin(f64::from(b * 10), 4));
        }
        assert!(!rt.add_begin(100.0, 4));
        step(&mut rt, 35.0);
        assert!(rt.add_begin(100.0, 4), "consumed intervals make room");
    }

    #[test]
    fn restart_rebuilds_from_future_instances() {
        let mut rt = runtime(1.0);
        rt.add_begin(0.0, 8);
        rt.add_begin(5.0, 8);
        step(&mut rt, 0.5);
        let mut out = Evaluation::default();
        rt.restart(2.0, 8, &mut out);
        assert_eq!(rt.status, TimingStatus::WaitingToBegin);
        assert_eq!(rt.intervals.len(), 1);
        assert_eq!(rt.intervals[0].begin, 5.0);
    }
}
