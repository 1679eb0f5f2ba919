//! Reconciling the control plane's desired breakpoint set with the engine.

use indexmap::IndexSet;
use smol_str::SmolStr;
use tracing::debug;

use crate::engine::BreakpointEngine;
use crate::inspector::{NativeBreakpointId, PauseHandler, PausedFrames};
use crate::messages;
use crate::protocol::{Breakpoint, RefersTo, StatusMessage};

/// What one [`BreakpointSetCoordinator::reconcile`] call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Newly seen ids handed to the engine (accepted or rejected).
    pub added: Vec<SmolStr>,
    /// Active ids cleared because they are no longer desired.
    pub cleared: Vec<SmolStr>,
    /// Completed ids whose bookkeeping was dropped.
    pub forgotten: Vec<SmolStr>,
}

impl ReconcileSummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.cleared.is_empty() && self.forgotten.is_empty()
    }
}

#[derive(Debug)]
pub struct BreakpointSetCoordinator {
    engine: BreakpointEngine,
    allow_expressions: bool,
}

impl BreakpointSetCoordinator {
    #[must_use]
    pub fn new(engine: BreakpointEngine) -> Self {
        let allow_expressions = engine.config().allow_expressions;
        Self {
            engine,
            allow_expressions,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &BreakpointEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut BreakpointEngine {
        &mut self.engine
    }

    /// Bring the engine in line with `desired`. Reconciling the same set
    /// twice changes nothing the second time.
    pub fn reconcile(&mut self, desired: Vec<Breakpoint>) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let wanted: IndexSet<SmolStr> = desired.iter().map(|bp| bp.id.clone()).collect();

        for breakpoint in desired {
            let id = breakpoint.id.clone();
            if self.engine.is_active(&id) || self.engine.is_completed(&id) {
                continue;
            }
            if !self.allow_expressions && breakpoint.has_expressions() {
                self.engine.reject(
                    breakpoint,
                    StatusMessage::error(RefersTo::Unspecified, messages::EXPRESSIONS_NOT_ALLOWED),
                );
            } else {
                self.engine.set(breakpoint);
            }
            summary.added.push(id);
        }

        for id in self.engine.completed_ids() {
            if !wanted.contains(&id) && self.engine.forget_completed(&id) {
                summary.forgotten.push(id);
            }
        }
        for id in self.engine.active_ids() {
            if !wanted.contains(&id) && self.engine.clear(&id) {
                summary.cleared.push(id);
            }
        }
        if !summary.is_empty() {
            debug!(
                added = summary.added.len(),
                cleared = summary.cleared.len(),
                forgotten = summary.forgotten.len(),
                "reconciled breakpoints"
            );
        }
        summary
    }

    pub fn poll(&mut self) {
        self.engine.poll();
    }

    pub fn take_reports(&mut self) -> Vec<Breakpoint> {
        self.engine.take_reports()
    }

    pub fn requeue(&mut self, breakpoint: Breakpoint) {
        self.engine.requeue(breakpoint);
    }

    pub fn shutdown(&mut self) {
        self.engine.shutdown();
    }
}

impl PauseHandler for BreakpointSetCoordinator {
    fn on_pause(&mut self, hits: &[NativeBreakpointId], frames: &dyn PausedFrames) {
        self.engine.on_pause(hits, frames);
    }
}
