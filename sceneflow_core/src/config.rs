// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Graph configuration.

/// Tunables for a [`SceneGraph`](crate::graph::SceneGraph).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphConfig {
    /// Upper bound on route activations per
    /// [`activate_all_queued`](crate::graph::SceneGraph::activate_all_queued)
    /// call. Routes past the bound stay queued for the next call.
    pub max_route_activations_per_tick: usize,
    /// Skip a route that already fired in the current activation pass (the
    /// VRML loop-breaking rule, keyed on the pass rather than scene time so
    /// a paused or unclocked scene still propagates).
    pub loop_breaking: bool,
    /// Poll unresolved extern-proto stubs on every tick.
    pub retry_extern_protos: bool,
    /// Maximum number of intervals kept per timed element. Consumed
    /// intervals are pruned first; past the cap, new ones are refused.
    pub max_intervals: usize,
}

impl GraphConfig {
    /// Default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_route_activations_per_tick: 65_536,
            loop_breaking: true,
            retry_extern_protos: true,
            max_intervals: 64,
        }
    }

    /// Configuration for tests and tools that step the graph by hand: no
    /// activation budget, no extern polling.
    #[must_use]
    pub const fn manual() -> Self {
        Self {
            max_route_activations_per_tick: usize::MAX,
            loop_breaking: true,
            retry_extern_protos: false,
            max_intervals: 64,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::new()
    }
}
