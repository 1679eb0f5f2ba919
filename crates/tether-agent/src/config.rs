//! Agent configuration.
//!
//! Every field has a default; a TOML file only needs to name what it changes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use smol_str::SmolStr;

use crate::error::ConfigError;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Root of the deployed file tree. Breakpoint paths resolve against it.
    pub work_dir: Option<PathBuf>,
    pub app_path_relative_to_repository: Option<PathBuf>,
    pub log_level: SmolStr,
    pub allow_expressions: bool,
    pub javascript_file_extensions: Vec<SmolStr>,
    pub breakpoint_expiration: Duration,
    pub breakpoint_update_interval: Duration,
    /// Logpoint hits after which the debugging session is recreated.
    pub reset_session_threshold: u32,
    pub service: ServiceContext,
    pub capture: CaptureLimits,
    pub log: LogConfig,
    pub internal: InternalConfig,
}

/// Identity reported when registering the debuggee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceContext {
    pub project_id: Option<SmolStr>,
    pub service: Option<SmolStr>,
    pub version: Option<SmolStr>,
    pub description: Option<SmolStr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimits {
    pub max_frames: usize,
    /// Frames (from the top) whose arguments and locals are resolved.
    pub max_expand_frames: usize,
    /// Members shown per object or array; 0 shows all.
    pub max_properties: usize,
    /// Approximate byte budget for the whole capture.
    pub max_data_size: usize,
    /// Characters kept per string; 0 keeps all.
    pub max_string_length: usize,
    pub include_node_modules: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    pub max_logs_per_second: u32,
    pub log_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalConfig {
    pub register_delay_on_fetcher_error: Duration,
    pub max_registration_retry_delay: Duration,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_frames: 20,
            max_expand_frames: 5,
            max_properties: 10,
            max_data_size: 20_000,
            max_string_length: 100,
            include_node_modules: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_logs_per_second: 50,
            log_delay: Duration::from_secs(1),
        }
    }
}

impl Default for InternalConfig {
    fn default() -> Self {
        Self {
            register_delay_on_fetcher_error: Duration::from_secs(300),
            max_registration_retry_delay: Duration::from_secs(40),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            app_path_relative_to_repository: None,
            log_level: SmolStr::new_static("info"),
            allow_expressions: false,
            javascript_file_extensions: vec![SmolStr::new_static(".js")],
            breakpoint_expiration: Duration::from_secs(60 * 60 * 24),
            breakpoint_update_interval: Duration::from_secs(10),
            reset_session_threshold: 30,
            service: ServiceContext::default(),
            capture: CaptureLimits::default(),
            log: LogConfig::default(),
            internal: InternalConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|err| ConfigError::Invalid(format!("agent.toml: {err}").into()))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: AgentToml = toml::from_str(text)
            .map_err(|err| ConfigError::Invalid(format!("agent.toml: {err}").into()))?;
        raw.into_config()
    }

    /// Whether `path` has one of the configured script extensions.
    #[must_use]
    pub fn is_script_path(&self, path: &str) -> bool {
        self.javascript_file_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentToml {
    agent: Option<AgentSection>,
    service: Option<ServiceSection>,
    capture: Option<CaptureSection>,
    log: Option<LogSection>,
    internal: Option<InternalSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentSection {
    work_dir: Option<PathBuf>,
    app_path_relative_to_repository: Option<PathBuf>,
    log_level: Option<String>,
    allow_expressions: Option<bool>,
    javascript_file_extensions: Option<Vec<String>>,
    breakpoint_expiration_sec: Option<u64>,
    breakpoint_update_interval_sec: Option<u64>,
    reset_session_threshold: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceSection {
    project_id: Option<String>,
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaptureSection {
    max_frames: Option<usize>,
    max_expand_frames: Option<usize>,
    max_properties: Option<usize>,
    max_data_size: Option<usize>,
    max_string_length: Option<usize>,
    include_node_modules: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogSection {
    max_logs_per_second: Option<u32>,
    log_delay_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct InternalSection {
    register_delay_on_fetcher_error_sec: Option<u64>,
    max_registration_retry_delay_sec: Option<u64>,
}

impl AgentToml {
    fn into_config(self) -> Result<AgentConfig, ConfigError> {
        let defaults = AgentConfig::default();
        let agent = self.agent.unwrap_or_default();
        let service = self.service.unwrap_or_default();
        let capture = self.capture.unwrap_or_default();
        let log = self.log.unwrap_or_default();
        let internal = self.internal.unwrap_or_default();

        let log_level = match agent.log_level {
            Some(level) => {
                let level = level.trim().to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(ConfigError::Invalid(
                        format!("invalid agent.log_level '{level}'").into(),
                    ));
                }
                SmolStr::new(level)
            }
            None => defaults.log_level,
        };

        let javascript_file_extensions = match agent.javascript_file_extensions {
            Some(exts) if exts.is_empty() => {
                return Err(ConfigError::Invalid(
                    "agent.javascript_file_extensions must not be empty".into(),
                ));
            }
            Some(exts) => exts
                .into_iter()
                .map(|ext| {
                    if ext.starts_with('.') {
                        SmolStr::new(ext)
                    } else {
                        SmolStr::new(format!(".{ext}"))
                    }
                })
                .collect(),
            None => defaults.javascript_file_extensions,
        };

        let max_logs_per_second = log
            .max_logs_per_second
            .unwrap_or(defaults.log.max_logs_per_second);
        if max_logs_per_second == 0 {
            return Err(ConfigError::Invalid(
                "log.max_logs_per_second must be at least 1".into(),
            ));
        }

        let max_frames = capture.max_frames.unwrap_or(defaults.capture.max_frames);
        if max_frames == 0 {
            return Err(ConfigError::Invalid(
                "capture.max_frames must be at least 1".into(),
            ));
        }

        let reset_session_threshold = agent
            .reset_session_threshold
            .unwrap_or(defaults.reset_session_threshold);
        if reset_session_threshold == 0 {
            return Err(ConfigError::Invalid(
                "agent.reset_session_threshold must be at least 1".into(),
            ));
        }

        Ok(AgentConfig {
            work_dir: agent.work_dir,
            app_path_relative_to_repository: agent.app_path_relative_to_repository,
            log_level,
            allow_expressions: agent.allow_expressions.unwrap_or(defaults.allow_expressions),
            javascript_file_extensions,
            breakpoint_expiration: agent
                .breakpoint_expiration_sec
                .map_or(defaults.breakpoint_expiration, Duration::from_secs),
            breakpoint_update_interval: agent
                .breakpoint_update_interval_sec
                .map_or(defaults.breakpoint_update_interval, Duration::from_secs),
            reset_session_threshold,
            service: ServiceContext {
                project_id: service.project_id.map(SmolStr::new),
                service: service.name.map(SmolStr::new),
                version: service.version.map(SmolStr::new),
                description: service.description.map(SmolStr::new),
            },
            capture: CaptureLimits {
                max_frames,
                max_expand_frames: capture
                    .max_expand_frames
                    .unwrap_or(defaults.capture.max_expand_frames),
                max_properties: capture
                    .max_properties
                    .unwrap_or(defaults.capture.max_properties),
                max_data_size: capture
                    .max_data_size
                    .unwrap_or(defaults.capture.max_data_size),
                max_string_length: capture
                    .max_string_length
                    .unwrap_or(defaults.capture.max_string_length),
                include_node_modules: capture
                    .include_node_modules
                    .unwrap_or(defaults.capture.include_node_modules),
            },
            log: LogConfig {
                max_logs_per_second,
                log_delay: log
                    .log_delay_seconds
                    .map_or(defaults.log.log_delay, Duration::from_secs),
            },
            internal: InternalConfig {
                register_delay_on_fetcher_error: internal
                    .register_delay_on_fetcher_error_sec
                    .map_or(
                        defaults.internal.register_delay_on_fetcher_error,
                        Duration::from_secs,
                    ),
                max_registration_retry_delay: internal
                    .max_registration_retry_delay_sec
                    .map_or(
                        defaults.internal.max_registration_retry_delay,
                        Duration::from_secs,
                    ),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = AgentConfig::from_toml_str("").unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.capture.max_data_size, 20_000);
        assert_eq!(config.log.max_logs_per_second, 50);
        assert!(!config.allow_expressions);
    }

    #[test]
    fn sections_override_individual_fields() {
        let config = AgentConfig::from_toml_str(
            r#"
[agent]
allow_expressions = true
javascript_file_extensions = ["js", ".mjs"]

[capture]
max_properties = 3

[log]
log_delay_seconds = 5
"#,
        )
        .unwrap();
        assert!(config.allow_expressions);
        assert_eq!(
            config.javascript_file_extensions,
            vec![SmolStr::new(".js"), SmolStr::new(".mjs")]
        );
        assert_eq!(config.capture.max_properties, 3);
        assert_eq!(config.capture.max_frames, 20);
        assert_eq!(config.log.log_delay, Duration::from_secs(5));
    }

    #[test]
    fn rejects_invalid_values() {
        let err = AgentConfig::from_toml_str("[log]\nmax_logs_per_second = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_logs_per_second"));
        let err = AgentConfig::from_toml_str("[agent]\nlog_level = \"loud\"\n").unwrap_err();
        assert!(err.to_string().contains("log_level"));
        let err = AgentConfig::from_toml_str("[capture]\nbogus = 1\n").unwrap_err();
        assert!(err.to_string().contains("agent.toml"));
    }

    #[test]
    fn script_extensions_match_suffix() {
        let config = AgentConfig::default();
        assert!(config.is_script_path("/app/index.js"));
        assert!(!config.is_script_path("/app/index.ts"));
    }
}
