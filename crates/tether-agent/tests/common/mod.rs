//! Shared fixtures: an engine wired to a simulated interpreter.
#![allow(dead_code, unused_imports)]

use std::path::PathBuf;
use std::time::Duration;

pub use tether_agent::harness::{Frame, Heap, LogRecorder, SimulatedRuntime};
pub use tether_agent::inspector::RemoteValue;
pub use tether_agent::protocol::{Breakpoint, LogLevel, RefersTo, StatusMessage, Variable};
pub use tether_agent::timers::ManualClock;
pub use tether_agent::{messages, AgentConfig, BreakpointEngine, BreakpointSetCoordinator};

pub const CODE_JS: &str = "/app/build/test/code.js";
pub const UTIL_JS: &str = "/app/lib/util.js";

/// `/app` as work directory, expressions allowed.
pub fn config() -> AgentConfig {
    AgentConfig {
        work_dir: Some(PathBuf::from("/app")),
        allow_expressions: true,
        ..AgentConfig::default()
    }
}

pub struct Fixture {
    pub runtime: SimulatedRuntime,
    pub clock: ManualClock,
    pub logs: LogRecorder,
    pub heap: Heap,
    pub coordinator: BreakpointSetCoordinator,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: AgentConfig) -> Self {
        let runtime = SimulatedRuntime::new();
        runtime.add_script(CODE_JS, 20);
        runtime.add_script(UTIL_JS, 40);
        Self::build(runtime, config, |builder| builder)
    }

    pub fn build(
        runtime: SimulatedRuntime,
        config: AgentConfig,
        customize: impl FnOnce(tether_agent::EngineBuilder) -> tether_agent::EngineBuilder,
    ) -> Self {
        let clock = ManualClock::starting_at(Duration::from_secs(1_000));
        let logs = LogRecorder::new();
        let builder = BreakpointEngine::builder(config)
            .files(runtime.file_index())
            .clock(clock.clone())
            .log_sink(logs.clone());
        let engine = customize(builder).build(&runtime.slot()).unwrap();
        Self {
            runtime,
            clock,
            logs,
            heap: Heap::new(),
            coordinator: BreakpointSetCoordinator::new(engine),
        }
    }

    pub fn engine(&self) -> &BreakpointEngine {
        self.coordinator.engine()
    }

    pub fn engine_mut(&mut self) -> &mut BreakpointEngine {
        self.coordinator.engine_mut()
    }

    pub fn set(&mut self, breakpoint: Breakpoint) -> bool {
        self.coordinator.engine_mut().set(breakpoint)
    }

    /// Run the given stack; returns whether it paused.
    pub fn run(&mut self, frames: Vec<Frame>) -> bool {
        self.runtime
            .call(&mut self.coordinator, &mut self.heap, frames)
    }

    pub fn run_line(&mut self, script: &str, line: u32) -> bool {
        self.run(vec![Frame::new("handler", script, line)])
    }

    pub fn advance(&mut self, delta: Duration) {
        self.clock.advance(delta);
        self.coordinator.poll();
    }

    pub fn reports(&mut self) -> Vec<Breakpoint> {
        self.coordinator.take_reports()
    }

    /// The single report, panicking when there is not exactly one.
    pub fn only_report(&mut self) -> Breakpoint {
        let mut reports = self.reports();
        assert_eq!(reports.len(), 1, "expected one report, got {reports:?}");
        reports.remove(0)
    }
}

pub fn status_text(breakpoint: &Breakpoint) -> &str {
    breakpoint
        .status
        .as_ref()
        .map(StatusMessage::message)
        .unwrap_or_default()
}
