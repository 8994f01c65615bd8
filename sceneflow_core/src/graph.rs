// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scene graph and its tick driver.
//!
//! [`SceneGraph`] owns every node, route, proto declaration, listener and
//! timed element of one scene. Its operations live next to the concern they
//! implement (`node`, `route`, `proto`, `event`, `smil`, `anim`); this module
//! holds the storage and [`advance`](SceneGraph::advance), which runs one
//! simulation tick:
//!
//! ```text
//!   TimeSource::scene_time()
//!       │
//!       ▼
//!   flush listeners ──► poll extern protos ──► timing pass
//!                                                  │
//!                 ┌────────────────────────────────┘
//!                 ▼
//!   animation sandwich ──► synthetic events ──► route activation
//!                                                  │
//!                 ┌────────────────────────────────┘
//!                 ▼
//!   route destroy pass ──► TickReport
//! ```

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use hashbrown::HashMap;

use crate::anim::AttributeStack;
use crate::config::GraphConfig;
use crate::event::{DomEvent, Listener, ListenerId};
use crate::host::{DirtyCallback, LibraryResolver, SharedScriptRuntime, TimeSource};
use crate::id::Arena;
use crate::kind::KindRegistry;
use crate::node::{NodeData, NodeId};
use crate::proto::{ProtoDecl, ProtoId};
use crate::route::{Route, RouteId};
use crate::smil::INDEFINITE;
use crate::trace::{TickBeginEvent, TickEndEvent, TickSummary, TraceSink, Tracer};

/// What happened during one [`advance`](SceneGraph::advance).
///
/// Counters are reset at the start of every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Tick counter, starting at 1 for the first tick.
    pub tick: u64,
    /// Scene time read from the time source.
    pub scene_time: f64,
    /// Routes that fired.
    pub routes_fired: u32,
    /// Routes dropped because an endpoint died or the value was rejected.
    pub routes_dropped: u32,
    /// Routes freed by the destroy pass.
    pub routes_freed: u32,
    /// Timing status transitions.
    pub timing_transitions: u32,
    /// Events dispatched, host and synthetic.
    pub events_dispatched: u32,
    /// Attributes written by the animation sandwich.
    pub attributes_animated: u32,
    /// Extern protos resolved.
    pub protos_resolved: u32,
    /// Whether dirty propagation has reached the root and the host has not
    /// yet [taken](SceneGraph::take_graph_dirty) the flag.
    pub graph_dirty: bool,
}

impl TickReport {
    /// Resets all counters for the next tick.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether the tick did any work.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.routes_fired == 0
            && self.routes_dropped == 0
            && self.routes_freed == 0
            && self.timing_transitions == 0
            && self.events_dispatched == 0
            && self.attributes_animated == 0
            && self.protos_resolved == 0
    }
}

impl From<&TickReport> for TickSummary {
    fn from(r: &TickReport) -> Self {
        Self {
            tick: r.tick,
            scene_time: r.scene_time,
            routes_fired: r.routes_fired,
            routes_dropped: r.routes_dropped,
            routes_freed: r.routes_freed,
            timing_transitions: r.timing_transitions,
            events_dispatched: r.events_dispatched,
            attributes_animated: r.attributes_animated,
            protos_resolved: r.protos_resolved,
            graph_dirty: r.graph_dirty,
        }
    }
}

/// A scene: nodes, routes, protos, listeners and timed elements, plus the
/// deferred queues that connect them.
pub struct SceneGraph {
    pub(crate) config: GraphConfig,
    pub(crate) kinds: KindRegistry,

    pub(crate) nodes: Arena<NodeData>,
    /// Dense id table, indexed by numeric id.
    pub(crate) ids: Vec<Option<NodeId>>,
    /// Ids past the dense table.
    pub(crate) sparse_ids: HashMap<u32, NodeId>,
    pub(crate) root: Option<NodeId>,

    pub(crate) routes: Arena<Route>,
    pub(crate) routes_to_activate: VecDeque<RouteId>,
    pub(crate) routes_to_destroy: Vec<RouteId>,
    /// Counter of route activation passes, for loop breaking.
    pub(crate) route_pass: u64,

    pub(crate) protos: Arena<ProtoDecl>,
    pub(crate) proto_names: HashMap<String, ProtoId>,
    /// Extern proto instances still waiting for their library.
    pub(crate) stubs: Vec<NodeId>,
    pub(crate) resolver: Option<Box<dyn LibraryResolver>>,

    /// Timed elements in registration order.
    pub(crate) timed: Vec<NodeId>,
    pub(crate) stacks: Vec<AttributeStack>,
    pub(crate) stack_index: HashMap<(NodeId, u32), usize>,
    pub(crate) next_animation_order: u64,
    /// Set while the sandwich writes presentation values, so those writes
    /// are not mistaken for new specified values.
    pub(crate) in_sandwich: bool,

    pub(crate) listeners: Arena<Listener>,
    pub(crate) listeners_to_add: Vec<ListenerId>,
    pub(crate) dispatch_depth: u32,
    pub(crate) pending_events: Vec<(NodeId, DomEvent)>,
    pub(crate) scripts: Option<SharedScriptRuntime>,

    /// Scene time of the current tick.
    pub(crate) now: f64,
    pub(crate) tick: u64,
    pub(crate) time_source: Option<Box<dyn TimeSource>>,
    pub(crate) on_dirty: Option<DirtyCallback>,
    pub(crate) graph_dirty: bool,
    pub(crate) parent_scene: Weak<RefCell<SceneGraph>>,

    pub(crate) tracer: Tracer,
    pub(crate) stats: TickReport,
}

impl fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneGraph")
            .field("nodes", &self.nodes.len())
            .field("routes", &self.routes.len())
            .field("protos", &self.protos.len())
            .field("timed", &self.timed.len())
            .field("root", &self.root)
            .field("now", &self.now)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Creates an empty scene with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GraphConfig::new())
    }

    /// Creates an empty scene.
    #[must_use]
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            config,
            kinds: KindRegistry::new(),
            nodes: Arena::new(),
            ids: Vec::new(),
            sparse_ids: HashMap::new(),
            root: None,
            routes: Arena::new(),
            routes_to_activate: VecDeque::new(),
            routes_to_destroy: Vec::new(),
            route_pass: 0,
            protos: Arena::new(),
            proto_names: HashMap::new(),
            stubs: Vec::new(),
            resolver: None,
            timed: Vec::new(),
            stacks: Vec::new(),
            stack_index: HashMap::new(),
            next_animation_order: 0,
            in_sandwich: false,
            listeners: Arena::new(),
            listeners_to_add: Vec::new(),
            dispatch_depth: 0,
            pending_events: Vec::new(),
            scripts: None,
            now: 0.0,
            tick: 0,
            time_source: None,
            on_dirty: None,
            graph_dirty: false,
            parent_scene: Weak::new(),
            tracer: Tracer::none(),
            stats: TickReport::default(),
        }
    }

    /// Creates an empty scene nested inside `parent`.
    ///
    /// The child keeps a weak link only; dropping the parent does not drop
    /// the child.
    #[must_use]
    pub fn new_child(parent: &Rc<RefCell<Self>>) -> Self {
        let config = parent.borrow().config;
        let mut g = Self::with_config(config);
        g.parent_scene = Rc::downgrade(parent);
        g
    }

    /// The enclosing scene, if this one is nested and the parent is alive.
    #[must_use]
    pub fn parent_scene(&self) -> Option<Rc<RefCell<Self>>> {
        self.parent_scene.upgrade()
    }

    /// The outermost live scene above this one, or `None` for a top-level
    /// scene.
    #[must_use]
    pub fn root_scene(&self) -> Option<Rc<RefCell<Self>>> {
        let mut current = self.parent_scene()?;
        loop {
            let next = current.borrow().parent_scene();
            match next {
                Some(p) => current = p,
                None => return Some(current),
            }
        }
    }

    // -- Configuration --

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Replaces the configuration. Takes effect from the next operation that
    /// reads it.
    pub fn set_config(&mut self, config: GraphConfig) {
        self.config = config;
    }

    /// Registered node kinds.
    #[must_use]
    pub const fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    /// Registered node kinds, for adding new ones.
    pub const fn kinds_mut(&mut self) -> &mut KindRegistry {
        &mut self.kinds
    }

    // -- Root --

    /// The root node, if any.
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Sets the root node. Access-key references waiting for a root are
    /// retried.
    pub fn set_root(&mut self, root: Option<NodeId>) {
        self.root = root;
        self.retry_pending_refs();
    }

    // -- Host hooks --

    /// Installs (or removes) the time source read by
    /// [`advance`](Self::advance). Without one, scene time stays put.
    pub fn set_time_source(&mut self, source: Option<Box<dyn TimeSource>>) {
        self.time_source = source;
    }

    /// Installs (or removes) the extern-proto library resolver.
    pub fn set_library_resolver(&mut self, resolver: Option<Box<dyn LibraryResolver>>) {
        self.resolver = resolver;
    }

    /// Installs (or removes) the runtime that executes script handlers.
    pub fn set_script_runtime(&mut self, runtime: Option<SharedScriptRuntime>) {
        self.scripts = runtime;
    }

    /// Installs (or removes) the callback fired when dirty propagation
    /// reaches the root.
    pub fn set_dirty_callback(&mut self, cb: Option<DirtyCallback>) {
        self.on_dirty = cb;
    }

    /// Returns and clears the graph-dirty flag.
    pub fn take_graph_dirty(&mut self) -> bool {
        core::mem::take(&mut self.graph_dirty)
    }

    /// Installs a trace sink, replacing any previous one.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.tracer = Tracer::new(sink);
    }

    /// Removes and returns the installed trace sink.
    pub fn take_trace_sink(&mut self) -> Option<Box<dyn TraceSink>> {
        self.tracer.take()
    }

    /// Scene time of the current tick.
    #[must_use]
    pub const fn now(&self) -> f64 {
        self.now
    }

    /// Number of ticks run so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    // -- Tick driver --

    /// Runs one simulation tick at the time source's current scene time.
    pub fn advance(&mut self) -> TickReport {
        if let Some(source) = &self.time_source {
            let t = source.scene_time();
            if t.is_finite() && t < INDEFINITE {
                self.now = t;
            } else {
                log::warn!("time source returned {t}; keeping scene time {}", self.now);
            }
        }
        self.tick += 1;
        self.stats.clear();
        let (tick, scene_time) = (self.tick, self.now);
        log::trace!("tick {tick} at {scene_time}");
        self.tracer.tick_begin(&TickBeginEvent { tick, scene_time });

        self.flush_listeners();
        if self.config.retry_extern_protos {
            self.stats.protos_resolved += self.poll_extern_protos();
        }
        self.run_timing_pass();
        self.run_sandwich();
        self.dispatch_pending_events();
        self.activate_all_queued(scene_time);
        let freed = self.flush_destroyed_routes();
        self.stats.routes_freed += u32::try_from(freed).unwrap_or(u32::MAX);

        self.stats.tick = tick;
        self.stats.scene_time = scene_time;
        self.stats.graph_dirty = self.graph_dirty;
        let report = self.stats;
        self.tracer.tick_summary(&TickSummary::from(&report));
        self.tracer.tick_end(&TickEndEvent { tick, scene_time });
        report
    }
}

impl Drop for SceneGraph {
    fn drop(&mut self) {
        self.routes_to_activate.clear();
        self.routes_to_destroy.clear();
        self.routes = Arena::new();
        self.stubs.clear();
        self.proto_names.clear();
        self.protos = Arena::new();
        let nodes: Vec<NodeId> = self.nodes.handles();
        for n in nodes {
            if let Some(mut data) = self.nodes.remove(n) {
                if let Some(cb) = data.render.as_mut() {
                    cb(n, &mut (), true);
                }
            }
        }
    }
}
