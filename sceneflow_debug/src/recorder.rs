// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as little-endian records. [`decode`] reads them back as an
//! iterator of [`RecordedEvent`].
//!
//! Event types are stored by name, so recordings survive reordering of
//! [`EventType`] variants.

use sceneflow_core::event::EventType;
use sceneflow_core::id::{Handle, HandleKind};
use sceneflow_core::smil::TimingStatus;
use sceneflow_core::trace::{
    EventDispatchedEvent, RouteDroppedEvent, RouteFiredEvent, TickBeginEvent, TickEndEvent,
    TickSummary, TimingTransitionEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_TICK_BEGIN: u8 = 1;
const TAG_TICK_END: u8 = 2;
const TAG_ROUTE_FIRED: u8 = 3;
const TAG_ROUTE_DROPPED: u8 = 4;
const TAG_TIMING_TRANSITION: u8 = 5;
const TAG_EVENT_DISPATCHED: u8 = 6;
const TAG_TICK_SUMMARY: u8 = 7;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_handle<K: HandleKind>(&mut self, h: Handle<K>) {
        self.write_u32(h.index());
        self.write_u32(h.generation());
    }

    fn write_status(&mut self, s: TimingStatus) {
        self.write_u8(match s {
            TimingStatus::WaitingToBegin => 0,
            TimingStatus::Active => 1,
            TimingStatus::PostActive => 2,
            TimingStatus::Frozen => 3,
            TimingStatus::Done => 4,
        });
    }

    fn write_event_type(&mut self, kind: EventType) {
        let name = kind.name().as_bytes();
        let len = u8::try_from(name.len()).unwrap_or(u8::MAX);
        self.write_u8(len);
        self.buf.extend_from_slice(&name[..usize::from(len)]);
    }
}

impl TraceSink for RecorderSink {
    fn on_tick_begin(&mut self, e: &TickBeginEvent) {
        self.write_u8(TAG_TICK_BEGIN);
        self.write_u64(e.tick);
        self.write_f64(e.scene_time);
    }

    fn on_tick_end(&mut self, e: &TickEndEvent) {
        self.write_u8(TAG_TICK_END);
        self.write_u64(e.tick);
        self.write_f64(e.scene_time);
    }

    fn on_route_fired(&mut self, e: &RouteFiredEvent) {
        self.write_u8(TAG_ROUTE_FIRED);
        self.write_u64(e.tick);
        self.write_handle(e.route);
        self.write_handle(e.from);
        self.write_handle(e.to);
        self.write_bool(e.changed);
    }

    fn on_route_dropped(&mut self, e: &RouteDroppedEvent) {
        self.write_u8(TAG_ROUTE_DROPPED);
        self.write_u64(e.tick);
        self.write_handle(e.route);
    }

    fn on_timing_transition(&mut self, e: &TimingTransitionEvent) {
        self.write_u8(TAG_TIMING_TRANSITION);
        self.write_u64(e.tick);
        self.write_handle(e.element);
        self.write_status(e.from);
        self.write_status(e.to);
        self.write_f64(e.scene_time);
    }

    fn on_event_dispatched(&mut self, e: &EventDispatchedEvent) {
        self.write_u8(TAG_EVENT_DISPATCHED);
        self.write_u64(e.tick);
        self.write_event_type(e.kind);
        self.write_handle(e.target);
        self.write_u32(e.listeners);
        self.write_bool(e.canceled);
    }

    fn on_tick_summary(&mut self, s: &TickSummary) {
        self.write_u8(TAG_TICK_SUMMARY);
        self.write_u64(s.tick);
        self.write_f64(s.scene_time);
        self.write_u32(s.routes_fired);
        self.write_u32(s.routes_dropped);
        self.write_u32(s.routes_freed);
        self.write_u32(s.timing_transitions);
        self.write_u32(s.events_dispatched);
        self.write_u32(s.attributes_animated);
        self.write_u32(s.protos_resolved);
        self.write_bool(s.graph_dirty);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`TickBeginEvent`].
    TickBegin(TickBeginEvent),
    /// A [`TickEndEvent`].
    TickEnd(TickEndEvent),
    /// A [`RouteFiredEvent`].
    RouteFired(RouteFiredEvent),
    /// A [`RouteDroppedEvent`].
    RouteDropped(RouteDroppedEvent),
    /// A [`TimingTransitionEvent`].
    TimingTransition(TimingTransitionEvent),
    /// An [`EventDispatchedEvent`].
    EventDispatched(EventDispatchedEvent),
    /// A [`TickSummary`].
    TickSummary(TickSummary),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn read_bytes(&mut self, n: usize) -> Option<&[u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    fn read_u32(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes(self.read_bytes(4)?.try_into().ok()?))
    }

    fn read_u64(&mut self) -> Option<u64> {
        Some(u64::from_le_bytes(self.read_bytes(8)?.try_into().ok()?))
    }

    fn read_f64(&mut self) -> Option<f64> {
        Some(f64::from_le_bytes(self.read_bytes(8)?.try_into().ok()?))
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_handle<K: HandleKind>(&mut self) -> Option<Handle<K>> {
        let idx = self.read_u32()?;
        let generation = self.read_u32()?;
        Some(Handle::from_raw_parts(idx, generation))
    }

    fn read_status(&mut self) -> Option<TimingStatus> {
        Some(match self.read_u8()? {
            0 => TimingStatus::WaitingToBegin,
            1 => TimingStatus::Active,
            2 => TimingStatus::PostActive,
            3 => TimingStatus::Frozen,
            _ => TimingStatus::Done,
        })
    }

    fn read_event_type(&mut self) -> Option<EventType> {
        let len = usize::from(self.read_u8()?);
        let name = core::str::from_utf8(self.read_bytes(len)?).ok()?;
        EventType::from_name(name)
    }

    fn decode_tick_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TickBegin(TickBeginEvent {
            tick: self.read_u64()?,
            scene_time: self.read_f64()?,
        }))
    }

    fn decode_tick_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TickEnd(TickEndEvent {
            tick: self.read_u64()?,
            scene_time: self.read_f64()?,
        }))
    }

    fn decode_route_fired(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::RouteFired(RouteFiredEvent {
            tick: self.read_u64()?,
            route: self.read_handle()?,
            from: self.read_handle()?,
            to: self.read_handle()?,
            changed: self.read_bool()?,
        }))
    }

    fn decode_route_dropped(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::RouteDropped(RouteDroppedEvent {
            tick: self.read_u64()?,
            route: self.read_handle()?,
        }))
    }

    fn decode_timing_transition(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TimingTransition(TimingTransitionEvent {
            tick: self.read_u64()?,
            element: self.read_handle()?,
            from: self.read_status()?,
            to: self.read_status()?,
            scene_time: self.read_f64()?,
        }))
    }

    fn decode_event_dispatched(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::EventDispatched(EventDispatchedEvent {
            tick: self.read_u64()?,
            kind: self.read_event_type()?,
            target: self.read_handle()?,
            listeners: self.read_u32()?,
            canceled: self.read_bool()?,
        }))
    }

    fn decode_tick_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TickSummary(TickSummary {
            tick: self.read_u64()?,
            scene_time: self.read_f64()?,
            routes_fired: self.read_u32()?,
            routes_dropped: self.read_u32()?,
            routes_freed: self.read_u32()?,
            timing_transitions: self.read_u32()?,
            events_dispatched: self.read_u32()?,
            attributes_animated: self.read_u32()?,
            protos_resolved: self.read_u32()?,
            graph_dirty: self.read_bool()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_TICK_BEGIN => self.decode_tick_begin(),
            TAG_TICK_END => self.decode_tick_end(),
            TAG_ROUTE_FIRED => self.decode_route_fired(),
            TAG_ROUTE_DROPPED => self.decode_route_dropped(),
            TAG_TIMING_TRANSITION => self.decode_timing_transition(),
            TAG_EVENT_DISPATCHED => self.decode_event_dispatched(),
            TAG_TICK_SUMMARY => self.decode_tick_summary(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
