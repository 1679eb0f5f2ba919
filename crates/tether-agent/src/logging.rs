//! Diagnostics setup and the logpoint output channel.

use std::str::FromStr;

use tracing::{error, info, warn, Level};

use crate::error::AgentError;
use crate::protocol::LogLevel;

/// Install the global `tracing` subscriber, writing to stderr.
///
/// `RUST_LOG` directives still apply on top of `level`. Returns `false` when
/// a subscriber was already installed by the host.
pub fn init(level: &str) -> Result<bool, AgentError> {
    let level = Level::from_str(level)
        .map_err(|err| AgentError::Logging(format!("log level '{level}': {err}").into()))?;
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();
    Ok(installed)
}

/// Destination of formatted logpoint messages.
pub trait LogSink {
    fn log(&mut self, level: LogLevel, message: &str);
}

/// Emits logpoint messages as `tracing` events on the `tether::logpoint` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => info!(target: "tether::logpoint", "{message}"),
            LogLevel::Warning => warn!(target: "tether::logpoint", "{message}"),
            LogLevel::Error => error!(target: "tether::logpoint", "{message}"),
        }
    }
}

impl<F> LogSink for F
where
    F: FnMut(LogLevel, &str),
{
    fn log(&mut self, level: LogLevel, message: &str) {
        self(level, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_are_rejected() {
        let err = init("loud").unwrap_err();
        assert!(err.to_string().contains("log level 'loud'"));
    }

    #[test]
    fn closures_are_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |level: LogLevel, message: &str| seen.push((level, message.to_string()));
            sink.log(LogLevel::Warning, "LOGPOINT: hi");
        }
        assert_eq!(seen, vec![(LogLevel::Warning, "LOGPOINT: hi".to_string())]);
    }
}
