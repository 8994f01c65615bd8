// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene-graph dataflow, SMIL timing and animation.
//!
//! `sceneflow_core` is the engine under a declarative 2D/3D scene player. It
//! is `no_std` compatible (with `alloc`), single-threaded, and stores nodes,
//! routes, protos and listeners in generational arenas addressed by handles.
//! Rendering, parsing, scripting and downloading are the host's business; the
//! engine only reaches them through the traits in [`host`].
//!
//! # Architecture
//!
//! The host drives the engine one tick at a time:
//!
//! ```text
//!   TimeSource (host clock)
//!       │
//!       ▼
//!   SceneGraph::advance() ──► timing pass ──► animation sandwich
//!                                                  │
//!                 ┌────────────────────────────────┘
//!                 ▼
//!   set_field ──► dirty propagation ──► route queue ──► activation
//!                                                  │
//!                 ┌────────────────────────────────┘
//!                 ▼
//!   synthetic events ──► listeners ──► TickReport
//! ```
//!
//! **[`node`]**: typed fields, instance counting, teardown and dirty
//! propagation. Node kinds are described at runtime by the [`kind`]
//! registry.
//!
//! **[`route`]**: typed edges from one field to another, fired through a FIFO
//! work queue with deferred destruction.
//!
//! **[`proto`]**: user-defined node types instantiated from templates, with
//! extern protos that resolve lazily through a
//! [`LibraryResolver`](host::LibraryResolver).
//!
//! **[`smil`]**: begin/end specs, interval lists and the per-element timing
//! state machine.
//!
//! **[`anim`]**: key/value tables, spline and curve interpolation, and the
//! per-attribute animation sandwich.
//!
//! **[`event`]**: DOM-style listeners with target and bubble phases.
//!
//! **[`graph`]**: the [`SceneGraph`](graph::SceneGraph) that owns all of the
//! above and runs the tick driver.
//!
//! **[`clock`]**: [`SceneClock`](clock::SceneClock), a pausable, seekable
//! time source.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! tick instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod anim;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod field;
pub mod graph;
pub mod host;
pub mod id;
pub mod kind;
pub mod node;
pub mod proto;
pub mod route;
pub mod smil;
pub mod trace;
pub mod value;

pub use error::{Error, Result};
pub use graph::{SceneGraph, TickReport};
pub use node::NodeId;
pub use value::FieldValue;
