// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Scene times
//! are printed in seconds.

use std::io::Write;

use sceneflow_core::smil::TimingStatus;
use sceneflow_core::trace::{
    EventDispatchedEvent, RouteDroppedEvent, RouteFiredEvent, TickBeginEvent, TickEndEvent,
    TickSummary, TimingTransitionEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    routes: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self {
            writer,
            routes: true,
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            routes: true,
        }
    }

    /// Whether individual route firings are printed. Busy scenes fire
    /// thousands of routes per tick; the summary line still counts them.
    #[must_use]
    pub fn with_routes(mut self, routes: bool) -> Self {
        self.routes = routes;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn status_name(status: TimingStatus) -> &'static str {
    match status {
        TimingStatus::WaitingToBegin => "waiting",
        TimingStatus::Active => "active",
        TimingStatus::PostActive => "post-active",
        TimingStatus::Frozen => "frozen",
        TimingStatus::Done => "done",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_tick_begin(&mut self, e: &TickBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[tick:begin] tick={} t={:.3}s",
            e.tick, e.scene_time,
        );
    }

    fn on_tick_end(&mut self, e: &TickEndEvent) {
        let _ = writeln!(self.writer, "[tick:end] tick={} t={:.3}s", e.tick, e.scene_time);
    }

    fn on_route_fired(&mut self, e: &RouteFiredEvent) {
        if !self.routes {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[route] tick={} {:?} {:?} -> {:?}{}",
            e.tick,
            e.route,
            e.from,
            e.to,
            if e.changed { "" } else { " (unchanged)" },
        );
    }

    fn on_route_dropped(&mut self, e: &RouteDroppedEvent) {
        let _ = writeln!(self.writer, "[route:dropped] tick={} {:?}", e.tick, e.route);
    }

    fn on_timing_transition(&mut self, e: &TimingTransitionEvent) {
        let _ = writeln!(
            self.writer,
            "[timing] tick={} {:?} {} -> {} at {:.3}s",
            e.tick,
            e.element,
            status_name(e.from),
            status_name(e.to),
            e.scene_time,
        );
    }

    fn on_event_dispatched(&mut self, e: &EventDispatchedEvent) {
        let canceled = if e.canceled { " CANCELED" } else { "" };
        let _ = writeln!(
            self.writer,
            "[event] tick={} {} at {:?} listeners={}{canceled}",
            e.tick,
            e.kind.name(),
            e.target,
            e.listeners,
        );
    }

    fn on_tick_summary(&mut self, s: &TickSummary) {
        let dirty = if s.graph_dirty { "dirty" } else { "clean" };
        let _ = writeln!(
            self.writer,
            "[summary] tick={} routes={} dropped={} freed={} transitions={} \
             events={} animated={} protos={} graph={dirty}",
            s.tick,
            s.routes_fired,
            s.routes_dropped,
            s.routes_freed,
            s.timing_transitions,
            s.events_dispatched,
            s.attributes_animated,
            s.protos_resolved,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneflow_core::NodeId;
    use sceneflow_core::route::RouteId;

    #[test]
    fn pretty_print_transition() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_timing_transition(&TimingTransitionEvent {
            tick: 3,
            element: NodeId::from_raw_parts(2, 0),
            from: TimingStatus::WaitingToBegin,
            to: TimingStatus::Active,
            scene_time: 2.0,
        });
        let output = String::from_utf8(sink.into_writer()).unwrap();
        assert!(output.contains("[timing]"), "got: {output}");
        assert!(output.contains("waiting -> active"), "got: {output}");
    }

    #[test]
    fn route_lines_can_be_silenced() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new()).with_routes(false);
        sink.on_route_fired(&RouteFiredEvent {
            tick: 1,
            route: RouteId::from_raw_parts(0, 0),
            from: NodeId::from_raw_parts(0, 0),
            to: NodeId::from_raw_parts(1, 0),
            changed: true,
        });
        assert!(sink.into_writer().is_empty(), "route line was printed");
    }
}
