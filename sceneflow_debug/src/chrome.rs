// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Ticks become duration slices on thread 0. Timing transitions are placed on
//! a thread per timed element, so each element's status reads as a lane.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Scene time is used as the timestamp, in microseconds. Events without a
/// time of their own take the time of the tick they belong to.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut tick_us = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::TickBegin(e) => {
                tick_us = seconds_to_us(e.scene_time);
                events.push(json!({
                    "ph": "B",
                    "name": "tick",
                    "cat": "Tick",
                    "ts": tick_us,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "tick": e.tick,
                    }
                }));
            }
            RecordedEvent::TickEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": "tick",
                    "cat": "Tick",
                    "ts": seconds_to_us(e.scene_time),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "tick": e.tick,
                    }
                }));
            }
            RecordedEvent::RouteFired(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "RouteFired",
                    "cat": "Route",
                    "ts": tick_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "tick": e.tick,
                        "route": format!("{:?}", e.route),
                        "from": format!("{:?}", e.from),
                        "to": format!("{:?}", e.to),
                        "changed": e.changed,
                    }
                }));
            }
            RecordedEvent::RouteDropped(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "RouteDropped",
                    "cat": "Route",
                    "ts": tick_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "tick": e.tick,
                        "route": format!("{:?}", e.route),
                    }
                }));
            }
            RecordedEvent::TimingTransition(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.to),
                    "cat": "Timing",
                    "ts": seconds_to_us(e.scene_time),
                    "pid": 0,
                    "tid": u64::from(e.element.index()) + 1,
                    "s": "t",
                    "args": {
                        "tick": e.tick,
                        "element": format!("{:?}", e.element),
                        "from": format!("{:?}", e.from),
                    }
                }));
            }
            RecordedEvent::EventDispatched(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": e.kind.name(),
                    "cat": "Event",
                    "ts": tick_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "tick": e.tick,
                        "target": format!("{:?}", e.target),
                        "listeners": e.listeners,
                        "canceled": e.canceled,
                    }
                }));
            }
            RecordedEvent::TickSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "TickSummary",
                    "cat": "Summary",
                    "ts": seconds_to_us(s.scene_time),
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "tick": s.tick,
                        "routes_fired": s.routes_fired,
                        "routes_dropped": s.routes_dropped,
                        "routes_freed": s.routes_freed,
                        "timing_transitions": s.timing_transitions,
                        "events_dispatched": s.events_dispatched,
                        "attributes_animated": s.attributes_animated,
                        "protos_resolved": s.protos_resolved,
                        "graph_dirty": s.graph_dirty,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn seconds_to_us(seconds: f64) -> f64 {
    seconds * 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use sceneflow_core::NodeId;
    use sceneflow_core::smil::TimingStatus;
    use sceneflow_core::trace::{TickBeginEvent, TickEndEvent, TimingTransitionEvent, TraceSink};

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_tick_begin(&TickBeginEvent {
            tick: 1,
            scene_time: 2.0,
        });
        rec.on_timing_transition(&TimingTransitionEvent {
            tick: 1,
            element: NodeId::from_raw_parts(3, 0),
            from: TimingStatus::WaitingToBegin,
            to: TimingStatus::Active,
            scene_time: 2.0,
        });
        rec.on_tick_end(&TickEndEvent {
            tick: 1,
            scene_time: 2.0,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["ts"], 2_000_000.0);

        assert_eq!(parsed[1]["name"], "Active");
        assert_eq!(parsed[1]["tid"], 4, "one lane per element");

        assert_eq!(parsed[2]["ph"], "E");
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
