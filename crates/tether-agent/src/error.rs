//! Agent errors.
//!
//! Breakpoint-level failures are not errors in this sense: they end up as a
//! [`StatusMessage`](crate::protocol::StatusMessage) on the breakpoint. The
//! types here cover configuration, collaborators and the few conditions that
//! stop the agent.

#![allow(missing_docs)]

use std::path::PathBuf;

use smol_str::SmolStr;
use thiserror::Error;

/// Invalid or unreadable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(SmolStr),
}

/// Failures while loading or querying source maps.
#[derive(Debug, Error)]
pub enum SourceMapError {
    #[error("failed to read source map {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed source map {path}: {message}")]
    Malformed { path: PathBuf, message: SmolStr },

    /// An input source maps to more than one generated file.
    #[error("source matches multiple generated files: {}", .0.join(", "))]
    MultiFileMatch(Vec<String>),
}

/// Failures while scanning the file tree.
#[derive(Debug, Error)]
pub enum FileIndexError {
    #[error("invalid scan pattern '{0}'")]
    Pattern(SmolStr),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported by the interpreter debugging session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("debugging session is disconnected")]
    Disconnected,

    #[error("debugging session is already held by another engine")]
    Busy,

    #[error("{0}")]
    Protocol(SmolStr),
}

/// Errors returned by the remote control plane.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlPlaneError {
    /// The debuggee is unknown to the server; the agent must register again.
    #[error("debuggee not found")]
    NotFound,

    #[error("control plane transport failed: {0}")]
    Transport(SmolStr),

    #[error("control plane rejected the request: {0}")]
    Rejected(SmolStr),
}

/// Conditions that stop the agent (never the host process).
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("unsupported runtime version '{0}'")]
    UnsupportedRuntime(SmolStr),

    #[error("debuggee is disabled by the server")]
    DisabledByServer,

    #[error("no usable working directory")]
    NoWorkingDirectory,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    FileIndex(#[from] FileIndexError),

    #[error(transparent)]
    SourceMap(#[from] SourceMapError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("failed to initialise logging: {0}")]
    Logging(SmolStr),
}
