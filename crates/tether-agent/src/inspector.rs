//! The seam to the interpreter's debugging session.
//!
//! Positions are 1-based throughout. A session installs native breakpoints;
//! when execution reaches one, the host calls [`PauseHandler::on_pause`] with
//! the hit native ids and a view of the paused stack. The handler runs to
//! completion before execution resumes.

#![allow(missing_docs)]

use std::fmt;

use smol_str::SmolStr;

use crate::error::SessionError;

/// Interpreter-side breakpoint handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeBreakpointId(pub SmolStr);

impl fmt::Display for NativeBreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a script is selected when installing a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScriptTarget {
    /// Exact script path.
    Path(String),
    /// Anchored regular expression over the script URL.
    UrlRegex(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeTarget {
    pub script: ScriptTarget,
    pub line: u32,
    pub column: u32,
}

/// Result of installing a native breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledLocation {
    pub id: NativeBreakpointId,
    /// The line the interpreter actually placed the breakpoint on, if known.
    pub actual_line: Option<u32>,
}

pub trait InspectorSession {
    fn set_breakpoint(&mut self, target: &NativeTarget) -> Result<InstalledLocation, SessionError>;

    fn remove_breakpoint(&mut self, id: &NativeBreakpointId) -> Result<(), SessionError>;

    /// Drop the session; native breakpoints it installed go with it.
    fn disconnect(&mut self);
}

/// Opens fresh sessions.
pub trait SessionFactory {
    fn connect(&mut self) -> Result<Box<dyn InspectorSession>, SessionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// A value as seen through the debugging session.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object {
        id: ObjectId,
        class_name: SmolStr,
        description: String,
    },
}

impl RemoteValue {
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0 && !value.is_nan(),
            Self::String(value) => !value.is_empty(),
            Self::Object { .. } => true,
        }
    }

    #[must_use]
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::Object { id, .. } => Some(*id),
            _ => None,
        }
    }
}

impl From<f64> for RemoteValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for RemoteValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for RemoteValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Number formatting as the interpreter prints it.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if value == value.trunc() && value.abs() < 1e21 {
        if value == 0.0 {
            "0".to_string()
        } else {
            format!("{value:.0}")
        }
    } else {
        format!("{value}")
    }
}

/// Property slot of an object.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Value(RemoteValue),
    /// Accessor property; not invoked during capture.
    Getter,
    /// Reading the property threw.
    Thrown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallFrame {
    pub function_name: String,
    /// Script URL or path.
    pub url: String,
    pub line: u32,
    pub column: u32,
    pub arguments: Vec<(String, RemoteValue)>,
    pub locals: Vec<(String, RemoteValue)>,
}

/// The paused stack, valid for the duration of one pause.
pub trait PausedFrames {
    /// Frames, innermost first.
    fn call_frames(&self) -> &[CallFrame];

    /// Evaluate `expression` in the scope of frame `frame`. Thrown errors are
    /// returned as their message.
    fn evaluate(&self, frame: usize, expression: &str) -> Result<RemoteValue, String>;

    fn properties(&self, object: ObjectId) -> Result<Vec<PropertyDescriptor>, String>;
}

/// Receives pause events.
pub trait PauseHandler {
    fn on_pause(&mut self, hits: &[NativeBreakpointId], frames: &dyn PausedFrames);
}
