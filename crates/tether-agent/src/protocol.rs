//! Wire types exchanged with the control plane.
//!
//! Field names follow the control plane's camelCase JSON. Empty collections
//! and absent optionals are omitted when serializing.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// What happens when a breakpoint fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    #[default]
    Capture,
    Log,
}

/// Severity of a logpoint message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
    Error,
}

/// The part of a breakpoint a status message is about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefersTo {
    #[default]
    Unspecified,
    BreakpointSourceLocation,
    BreakpointCondition,
    BreakpointExpression,
    BreakpointAge,
    VariableName,
    VariableValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatMessage {
    pub format: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    #[serde(default)]
    pub refers_to: RefersTo,
    pub description: FormatMessage,
    #[serde(default)]
    pub is_error: bool,
}

impl StatusMessage {
    #[must_use]
    pub fn error(refers_to: RefersTo, format: impl Into<String>) -> Self {
        Self {
            refers_to,
            description: FormatMessage {
                format: format.into(),
                parameters: Vec::new(),
            },
            is_error: true,
        }
    }

    #[must_use]
    pub fn info(refers_to: RefersTo, format: impl Into<String>) -> Self {
        Self {
            is_error: false,
            ..Self::error(refers_to, format)
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.description.format
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub path: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamp {
    pub seconds: i64,
    #[serde(default)]
    pub nanos: i32,
}

/// A captured value. Compound values point into the variable table or
/// carry their members inline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_table_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusMessage>,
}

impl Variable {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusMessage) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.as_ref().is_some_and(|status| status.is_error)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub function: String,
    pub location: SourceLocation,
    #[serde(default)]
    pub arguments: Vec<Variable>,
    #[serde(default)]
    pub locals: Vec<Variable>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    pub id: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<String>,
    #[serde(default)]
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_message_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
    #[serde(default)]
    pub is_final_state: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack_frames: Vec<StackFrame>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variable_table: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evaluated_expressions: Vec<Variable>,
}

impl Breakpoint {
    /// A capture breakpoint at `path:line`.
    #[must_use]
    pub fn at(id: impl Into<SmolStr>, path: impl Into<String>, line: u32) -> Self {
        Self {
            id: id.into(),
            location: Some(SourceLocation {
                path: path.into(),
                line,
                column: None,
            }),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    #[must_use]
    pub fn with_expressions<I, S>(mut self, expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expressions = expressions.into_iter().map(Into::into).collect();
        self
    }

    /// Turn this into a logpoint with the given message format.
    #[must_use]
    pub fn logpoint(mut self, format: impl Into<String>) -> Self {
        self.action = Action::Log;
        self.log_message_format = Some(format.into());
        self
    }

    #[must_use]
    pub fn has_expressions(&self) -> bool {
        self.condition
            .as_deref()
            .is_some_and(|condition| !condition.trim().is_empty())
            || !self.expressions.is_empty()
    }
}

/// The agent's self-description sent at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debuggee {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SmolStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<SmolStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniquifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub is_disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub debuggee: Debuggee,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBreakpointsResponse {
    #[serde(default)]
    pub breakpoints: Vec<Breakpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_wait_token: Option<String>,
    #[serde(default)]
    pub wait_expired: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoint_uses_camel_case_and_omits_empty_fields() {
        let mut breakpoint = Breakpoint::at("b1", "build/test/code.js", 5);
        breakpoint.is_final_state = true;
        breakpoint.status = Some(StatusMessage::error(
            RefersTo::BreakpointSourceLocation,
            "Invalid snapshot position: build/test/code.js:5",
        ));
        let json = serde_json::to_value(&breakpoint).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "b1",
                "location": {"path": "build/test/code.js", "line": 5},
                "action": "CAPTURE",
                "isFinalState": true,
                "status": {
                    "refersTo": "BREAKPOINT_SOURCE_LOCATION",
                    "description": {"format": "Invalid snapshot position: build/test/code.js:5"},
                    "isError": true
                }
            })
        );
    }

    #[test]
    fn incoming_breakpoint_tolerates_missing_fields() {
        let breakpoint: Breakpoint = serde_json::from_str(
            r#"{"id":"lp","location":{"path":"a.js","line":3},"action":"LOG","logMessageFormat":"x=$0","expressions":["x"]}"#,
        )
        .unwrap();
        assert_eq!(breakpoint.action, Action::Log);
        assert_eq!(breakpoint.expressions, vec!["x".to_string()]);
        assert!(breakpoint.has_expressions());
        assert!(!breakpoint.is_final_state);
    }
}
