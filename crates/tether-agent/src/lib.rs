//! `tether-agent` - the breakpoint core of a runtime debug agent.
//!
//! A control plane hands the agent a set of breakpoints over source
//! locations. The agent resolves each one to a loaded script (directly, or
//! through source maps), installs a native breakpoint through an
//! [`inspector::InspectorSession`], and when execution pauses there either
//! captures a bounded snapshot of the stack or emits a rate-limited log line.
//! Finished breakpoints are reported back with their final status.
//!
//! The pieces, bottom-up:
//!
//! - [`paths`] and [`sourcemap`] resolve requested locations.
//! - [`expression`] compiles conditions and watch expressions through the
//!   `tether-syntax` validator.
//! - [`capture`] turns a paused stack into frames and a variable table.
//! - [`engine::BreakpointEngine`] owns the breakpoint lifecycle.
//! - [`coordinator::BreakpointSetCoordinator`] reconciles desired sets.
//! - [`agent::Agent`] drives registration and polling against a
//!   [`agent::ControlPlane`].

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod capture;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod expression;
pub mod files;
pub mod harness;
pub mod inspector;
pub mod logging;
pub mod messages;
pub mod paths;
pub mod protocol;
pub mod sourcemap;
pub mod timers;

pub use agent::{Agent, AgentHandle, ControlPlane};
pub use config::AgentConfig;
pub use coordinator::{BreakpointSetCoordinator, ReconcileSummary};
pub use engine::{BreakpointEngine, EngineBuilder, RuntimeVersion, SessionSlot};
pub use error::{AgentError, ConfigError, ControlPlaneError, SessionError};
pub use protocol::{Action, Breakpoint, Debuggee, LogLevel, SourceLocation, StatusMessage};
