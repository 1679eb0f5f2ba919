//! A simulated interpreter for driving the agent without a live runtime.
//!
//! [`SimulatedRuntime`] hands out debugging sessions, keeps the native
//! breakpoints they install and, on [`SimulatedRuntime::call`], pauses any
//! handler whose breakpoint sits on the top frame's line. Values live in a
//! [`Heap`]; expressions are evaluated by a small tree-walking evaluator over
//! the `tether-syntax` AST.

mod eval;
mod heap;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use regex::Regex;
use smol_str::format_smolstr;

pub use heap::{Heap, Slot};

use crate::engine::SessionSlot;
use crate::error::SessionError;
use crate::files::FileIndex;
use crate::inspector::{
    CallFrame, InspectorSession, InstalledLocation, NativeBreakpointId, NativeTarget, ObjectId,
    PauseHandler, PausedFrames, PropertyDescriptor, RemoteValue, ScriptTarget, SessionFactory,
};
use crate::logging::LogSink;
use crate::paths::normalize;
use crate::protocol::LogLevel;

#[derive(Debug)]
struct SimNative {
    session: u64,
    target: NativeTarget,
    line: u32,
}

#[derive(Debug, Default)]
struct SimState {
    files: FileIndex,
    connects: u64,
    next_native: u64,
    natives: IndexMap<NativeBreakpointId, SimNative>,
    /// `(script, requested line) -> placed line`.
    placements: Vec<(String, u32, u32)>,
    fail_next: bool,
}

/// Shared handle to one simulated interpreter.
#[derive(Debug, Clone, Default)]
pub struct SimulatedRuntime {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loaded script with `line_count` lines.
    pub fn add_script(&self, path: &str, line_count: u32) {
        self.state.borrow_mut().files.insert_lines(path, line_count);
    }

    #[must_use]
    pub fn file_index(&self) -> FileIndex {
        self.state.borrow().files.clone()
    }

    /// Sessions opened so far.
    #[must_use]
    pub fn connect_count(&self) -> u64 {
        self.state.borrow().connects
    }

    #[must_use]
    pub fn native_breakpoint_count(&self) -> usize {
        self.state.borrow().natives.len()
    }

    /// Make the next `set_breakpoint` call fail.
    pub fn fail_next_install(&self) {
        self.state.borrow_mut().fail_next = true;
    }

    /// Breakpoints requested on `requested` in `script` land on `actual`.
    pub fn place_on_line(&self, script: &str, requested: u32, actual: u32) {
        self.state
            .borrow_mut()
            .placements
            .push((normalize(script), requested, actual));
    }

    /// A session slot connected to this runtime.
    #[must_use]
    pub fn slot(&self) -> Rc<SessionSlot> {
        SessionSlot::new(self.clone())
    }

    /// Execute the top frame's line. Pauses `handler` if a native breakpoint
    /// is installed there and returns whether it did.
    pub fn call(&self, handler: &mut dyn PauseHandler, heap: &mut Heap, frames: Vec<Frame>) -> bool {
        let Some(top) = frames.first() else {
            return false;
        };
        let hits: Vec<NativeBreakpointId> = {
            let state = self.state.borrow();
            state
                .natives
                .iter()
                .filter(|(_, native)| native.line == top.line && script_matches(&native.target.script, &top.script))
                .map(|(id, _)| id.clone())
                .collect()
        };
        if hits.is_empty() {
            return false;
        }
        let pause = Pause {
            frames: frames.into_iter().map(Frame::into_call_frame).collect(),
            heap: RefCell::new(heap),
        };
        handler.on_pause(&hits, &pause);
        true
    }
}

fn script_matches(target: &ScriptTarget, script: &str) -> bool {
    let script = normalize(script);
    match target {
        ScriptTarget::Path(path) => normalize(path) == script,
        ScriptTarget::UrlRegex(pattern) => Regex::new(pattern)
            .is_ok_and(|regex| regex.is_match(&script) || regex.is_match(&format!("file://{script}"))),
    }
}

impl SessionFactory for SimulatedRuntime {
    fn connect(&mut self) -> Result<Box<dyn InspectorSession>, SessionError> {
        let mut state = self.state.borrow_mut();
        state.connects += 1;
        Ok(Box::new(SimSession {
            runtime: self.clone(),
            id: state.connects,
            connected: true,
        }))
    }
}

#[derive(Debug)]
struct SimSession {
    runtime: SimulatedRuntime,
    id: u64,
    connected: bool,
}

impl InspectorSession for SimSession {
    fn set_breakpoint(&mut self, target: &NativeTarget) -> Result<InstalledLocation, SessionError> {
        if !self.connected {
            return Err(SessionError::Disconnected);
        }
        let mut state = self.runtime.state.borrow_mut();
        if std::mem::take(&mut state.fail_next) {
            return Err(SessionError::Protocol("Could not resolve breakpoint".into()));
        }
        let line = state
            .placements
            .iter()
            .find(|(script, requested, _)| *requested == target.line && script_matches(&target.script, script))
            .map_or(target.line, |(_, _, actual)| *actual);
        state.next_native += 1;
        let id = NativeBreakpointId(format_smolstr!("native-{}", state.next_native));
        state.natives.insert(
            id.clone(),
            SimNative {
                session: self.id,
                target: target.clone(),
                line,
            },
        );
        Ok(InstalledLocation {
            id,
            actual_line: Some(line),
        })
    }

    fn remove_breakpoint(&mut self, id: &NativeBreakpointId) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::Disconnected);
        }
        let mut state = self.runtime.state.borrow_mut();
        match state.natives.get(id) {
            Some(native) if native.session == self.id => {
                state.natives.shift_remove(id);
                Ok(())
            }
            _ => Err(SessionError::Protocol(format_smolstr!("unknown breakpoint {id}"))),
        }
    }

    fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        let session = self.id;
        self.runtime
            .state
            .borrow_mut()
            .natives
            .retain(|_, native| native.session != session);
    }
}

/// One simulated stack frame.
#[derive(Debug, Clone)]
pub struct Frame {
    function: String,
    script: String,
    line: u32,
    column: u32,
    arguments: Vec<(String, RemoteValue)>,
    locals: Vec<(String, RemoteValue)>,
}

impl Frame {
    #[must_use]
    pub fn new(function: &str, script: &str, line: u32) -> Self {
        Self {
            function: function.to_string(),
            script: script.to_string(),
            line,
            column: 1,
            arguments: Vec::new(),
            locals: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, name: &str, value: impl Into<RemoteValue>) -> Self {
        self.arguments.push((name.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn local(mut self, name: &str, value: impl Into<RemoteValue>) -> Self {
        self.locals.push((name.to_string(), value.into()));
        self
    }

    fn into_call_frame(self) -> CallFrame {
        CallFrame {
            function_name: self.function,
            url: format!("file://{}", self.script),
            line: self.line,
            column: self.column,
            arguments: self.arguments,
            locals: self.locals,
        }
    }
}

struct Pause<'h> {
    frames: Vec<CallFrame>,
    heap: RefCell<&'h mut Heap>,
}

impl PausedFrames for Pause<'_> {
    fn call_frames(&self) -> &[CallFrame] {
        &self.frames
    }

    fn evaluate(&self, frame: usize, expression: &str) -> Result<RemoteValue, String> {
        let frame = self
            .frames
            .get(frame)
            .ok_or_else(|| format!("Error: no frame {frame}"))?;
        let bindings = frame
            .locals
            .iter()
            .chain(&frame.arguments)
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        let mut heap = self.heap.borrow_mut();
        let mut scope = eval::Scope {
            bindings,
            heap: &mut **heap,
        };
        eval::evaluate(expression, &mut scope)
    }

    fn properties(&self, object: ObjectId) -> Result<Vec<PropertyDescriptor>, String> {
        self.heap.borrow().properties(object)
    }
}

/// Sink that records logpoint output for later inspection.
#[derive(Debug, Clone, Default)]
pub struct LogRecorder {
    entries: Rc<RefCell<Vec<(LogLevel, String)>>>,
}

impl LogRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.borrow().clone()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl LogSink for LogRecorder {
    fn log(&mut self, level: LogLevel, message: &str) {
        self.entries.borrow_mut().push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Backend;

    #[derive(Default)]
    struct Recorder {
        hits: Vec<Vec<NativeBreakpointId>>,
        values: Vec<Result<RemoteValue, String>>,
    }

    impl PauseHandler for Recorder {
        fn on_pause(&mut self, hits: &[NativeBreakpointId], frames: &dyn PausedFrames) {
            self.hits.push(hits.to_vec());
            self.values.push(frames.evaluate(0, "x + 1"));
        }
    }

    #[test]
    fn pauses_only_on_installed_lines() {
        let runtime = SimulatedRuntime::new();
        runtime.add_script("/app/a.js", 10);
        let slot = runtime.slot();
        let lease = slot.acquire().unwrap();
        let installed = lease
            .set_breakpoint(&Backend::Inspector.target("/app/a.js", 3, 1))
            .unwrap();
        assert_eq!(installed.actual_line, Some(3));

        let mut heap = Heap::new();
        let mut recorder = Recorder::default();
        assert!(!runtime.call(&mut recorder, &mut heap, vec![Frame::new("f", "/app/a.js", 2)]));
        assert!(runtime.call(
            &mut recorder,
            &mut heap,
            vec![Frame::new("f", "/app/a.js", 3).local("x", 41.0)]
        ));
        assert_eq!(recorder.hits, vec![vec![installed.id]]);
        assert_eq!(recorder.values, vec![Ok(RemoteValue::Number(42.0))]);
    }

    #[test]
    fn disconnect_drops_the_sessions_natives() {
        let runtime = SimulatedRuntime::new();
        let mut factory = runtime.clone();
        let mut session = factory.connect().unwrap();
        session
            .set_breakpoint(&Backend::Legacy.target("/app/a.js", 1, 1))
            .unwrap();
        assert_eq!(runtime.native_breakpoint_count(), 1);
        session.disconnect();
        assert_eq!(runtime.native_breakpoint_count(), 0);
        assert_eq!(
            session.set_breakpoint(&Backend::Legacy.target("/app/a.js", 1, 1)),
            Err(SessionError::Disconnected)
        );
    }

    #[test]
    fn placements_move_the_native() {
        let runtime = SimulatedRuntime::new();
        runtime.place_on_line("/app/a.js", 4, 6);
        let mut factory = runtime.clone();
        let mut session = factory.connect().unwrap();
        let installed = session
            .set_breakpoint(&Backend::Inspector.target("/app/a.js", 4, 1))
            .unwrap();
        assert_eq!(installed.actual_line, Some(6));
    }
}
