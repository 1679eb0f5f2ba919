//! Interpreter version gating.

use std::fmt;
use std::str::FromStr;

use regex::escape;

use crate::error::AgentError;
use crate::inspector::{NativeTarget, ScriptTarget};

/// Length of the wrapper the module loader prepends to the first line of every
/// module on older runtimes.
pub const MODULE_WRAP_PREFIX_LENGTH: u32 = 62;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RuntimeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl RuntimeVersion {
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Line 1 columns are shifted by the module wrapper.
    #[must_use]
    pub fn wraps_modules(self) -> bool {
        self.major < 12
    }
}

impl Default for RuntimeVersion {
    fn default() -> Self {
        Self::new(18, 0, 0)
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for RuntimeVersion {
    type Err = AgentError;

    /// Accepts `v12.3.1`, `12.3.1`, `12.3` or `12`; pre-release suffixes are ignored.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || AgentError::UnsupportedRuntime(text.into());
        let trimmed = text.trim().trim_start_matches('v');
        let core = trimmed.split(['-', '+']).next().unwrap_or(trimmed);
        let mut parts = core.split('.');
        let mut next = |required: bool| -> Result<u32, AgentError> {
            match parts.next() {
                Some(part) => part.parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };
        let major = next(true)?;
        let minor = next(false)?;
        let patch = next(false)?;
        Ok(Self::new(major, minor, patch))
    }
}

/// The two ways of addressing scripts in a debugging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Event-based API: scripts are addressed by exact path.
    Legacy,
    /// Session-based API: scripts are addressed by an anchored URL regex.
    Inspector,
}

impl Backend {
    pub fn select(version: RuntimeVersion) -> Result<Self, AgentError> {
        match version.major {
            0..=3 => Err(AgentError::UnsupportedRuntime(version.to_string().into())),
            4..=7 => Ok(Self::Legacy),
            _ => Ok(Self::Inspector),
        }
    }

    #[must_use]
    pub fn target(self, path: &str, line: u32, column: u32) -> NativeTarget {
        let script = match self {
            Self::Legacy => ScriptTarget::Path(path.to_string()),
            Self::Inspector => ScriptTarget::UrlRegex(format!("^(file://)?{}$", escape(path))),
        };
        NativeTarget {
            script,
            line,
            column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_node_style_versions() {
        assert_eq!(
            "v12.3.1".parse::<RuntimeVersion>().unwrap(),
            RuntimeVersion::new(12, 3, 1)
        );
        assert_eq!(
            "8.0.0-pre".parse::<RuntimeVersion>().unwrap(),
            RuntimeVersion::new(8, 0, 0)
        );
        assert!("vnext".parse::<RuntimeVersion>().is_err());
    }

    #[test]
    fn backend_follows_major_version() {
        assert!(Backend::select(RuntimeVersion::new(3, 9, 0)).is_err());
        assert_eq!(Backend::select(RuntimeVersion::new(6, 0, 0)).unwrap(), Backend::Legacy);
        assert_eq!(Backend::select(RuntimeVersion::new(10, 0, 0)).unwrap(), Backend::Inspector);
    }

    #[test]
    fn inspector_targets_escape_the_path() {
        let target = Backend::Inspector.target("/app/a.b.js", 3, 1);
        assert_eq!(
            target.script,
            ScriptTarget::UrlRegex(r"^(file://)?/app/a\.b\.js$".to_string())
        );
        let target = Backend::Legacy.target("/app/a.js", 3, 1);
        assert_eq!(target.script, ScriptTarget::Path("/app/a.js".to_string()));
    }
}
