//! The breakpoint engine.
//!
//! A logical breakpoint moves through
//! `requested -> resolving -> {rejected | installed}` and from `installed` to
//! `completed` (hit, expired, failed condition) or `cleared`. Rejected and
//! completed breakpoints carry their final status and wait in an outbox until
//! the driver reports them.
//!
//! The engine is single-threaded. Pause callbacks, timers and control-plane
//! updates all run on the thread that owns it, one at a time, so none of its
//! state is locked.

mod backend;
mod format;
mod installed;
mod slot;
mod throttle;

use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;
use tether_syntax::Disallowed;
use tracing::{debug, info, warn};

use crate::capture::{self, WatchExpression};
use crate::config::AgentConfig;
use crate::error::{AgentError, SourceMapError};
use crate::expression::{compile, CompileError, CompiledExpression, TranspilerRegistry};
use crate::files::FileIndex;
use crate::inspector::{NativeBreakpointId, PauseHandler, PausedFrames};
use crate::logging::{LogSink, TracingSink};
use crate::messages;
use crate::paths::{normalize, resolve_in, PathResolver, Resolution};
use crate::protocol::{Action, Breakpoint, LogLevel, RefersTo, StatusMessage, Timestamp};
use crate::sourcemap::SourceMapIndex;
use crate::timers::{Clock, StdClock, TimerId, TimerQueue};

pub use backend::{Backend, RuntimeVersion, MODULE_WRAP_PREFIX_LENGTH};
pub use slot::{SessionLease, SessionSlot};

use format::format_message;
use installed::InstalledBreakpoints;
use throttle::{Admission, LogThrottle};

const LOGPOINT_PREFIX: &str = "LOGPOINT: ";

#[derive(Debug, Clone, PartialEq, Eq)]
enum TimerEvent {
    Expire(SmolStr),
    ResumeLogpoint(SmolStr),
    ResetSession,
}

#[derive(Debug)]
struct LogpointState {
    throttle: LogThrottle,
    paused: bool,
    resume: Option<TimerId>,
}

#[derive(Debug)]
struct ActiveBreakpoint {
    breakpoint: Breakpoint,
    location_key: String,
    condition: Option<CompiledExpression>,
    expressions: Vec<WatchExpression>,
    expiry: TimerId,
    logpoint: Option<LogpointState>,
}

/// Where a requested location ended up.
struct ResolvedLocation {
    file: String,
    line: u32,
    column: u32,
    mapped: bool,
}

/// Configures and builds a [`BreakpointEngine`].
pub struct EngineBuilder {
    config: AgentConfig,
    version: RuntimeVersion,
    files: FileIndex,
    source_maps: SourceMapIndex,
    transpilers: TranspilerRegistry,
    path_resolver: Option<Box<dyn PathResolver>>,
    clock: Box<dyn Clock>,
    log_sink: Box<dyn LogSink>,
}

impl EngineBuilder {
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            version: RuntimeVersion::default(),
            files: FileIndex::new(),
            source_maps: SourceMapIndex::new(),
            transpilers: TranspilerRegistry::new(),
            path_resolver: None,
            clock: Box::new(StdClock),
            log_sink: Box::new(TracingSink),
        }
    }

    #[must_use]
    pub fn runtime_version(mut self, version: RuntimeVersion) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn files(mut self, files: FileIndex) -> Self {
        self.files = files;
        self
    }

    #[must_use]
    pub fn source_maps(mut self, source_maps: SourceMapIndex) -> Self {
        self.source_maps = source_maps;
        self
    }

    #[must_use]
    pub fn transpilers(mut self, transpilers: TranspilerRegistry) -> Self {
        self.transpilers = transpilers;
        self
    }

    #[must_use]
    pub fn path_resolver(mut self, resolver: impl PathResolver + 'static) -> Self {
        self.path_resolver = Some(Box::new(resolver));
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub fn log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.log_sink = Box::new(sink);
        self
    }

    /// Pick the backend for the runtime version and take the session.
    pub fn build(self, slot: &Rc<SessionSlot>) -> Result<BreakpointEngine, AgentError> {
        let backend = Backend::select(self.version)?;
        let session = slot.acquire()?;
        info!(version = %self.version, ?backend, files = self.files.len(), "breakpoint engine ready");
        Ok(BreakpointEngine {
            config: self.config,
            version: self.version,
            backend,
            files: self.files,
            source_maps: self.source_maps,
            transpilers: self.transpilers,
            path_resolver: self.path_resolver,
            session,
            clock: self.clock,
            log_sink: self.log_sink,
            active: IndexMap::new(),
            completed: IndexSet::new(),
            installed: InstalledBreakpoints::default(),
            timers: TimerQueue::new(),
            outbox: Vec::new(),
            hits_since_reset: 0,
            reset_pending: false,
        })
    }
}

pub struct BreakpointEngine {
    config: AgentConfig,
    version: RuntimeVersion,
    backend: Backend,
    files: FileIndex,
    source_maps: SourceMapIndex,
    transpilers: TranspilerRegistry,
    path_resolver: Option<Box<dyn PathResolver>>,
    session: SessionLease,
    clock: Box<dyn Clock>,
    log_sink: Box<dyn LogSink>,
    active: IndexMap<SmolStr, ActiveBreakpoint>,
    completed: IndexSet<SmolStr>,
    installed: InstalledBreakpoints,
    timers: TimerQueue<TimerEvent>,
    outbox: Vec<Breakpoint>,
    hits_since_reset: u32,
    reset_pending: bool,
}

impl std::fmt::Debug for BreakpointEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakpointEngine")
            .field("backend", &self.backend)
            .field("active", &self.active.keys().collect::<Vec<_>>())
            .field("completed", &self.completed)
            .field("natives", &self.installed.len())
            .finish_non_exhaustive()
    }
}

impl BreakpointEngine {
    #[must_use]
    pub fn builder(config: AgentConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Install `breakpoint`. Returns `false` when it was rejected; the
    /// rejection is queued for reporting like any other completion.
    pub fn set(&mut self, mut breakpoint: Breakpoint) -> bool {
        if self.active.contains_key(&breakpoint.id) || self.completed.contains(&breakpoint.id) {
            debug!(id = %breakpoint.id, "breakpoint already known");
            return true;
        }
        let Some(location) = breakpoint
            .location
            .clone()
            .filter(|location| !breakpoint.id.is_empty() && !location.path.is_empty() && location.line > 0)
        else {
            self.reject(
                breakpoint,
                StatusMessage::error(RefersTo::Unspecified, messages::INVALID_BREAKPOINT),
            );
            return false;
        };

        let resolved = match self.resolve_location(&location.path, location.line, location.column) {
            Ok(resolved) => resolved,
            Err(status) => {
                self.reject(breakpoint, status);
                return false;
            }
        };

        let input_path = normalize(&location.path);
        let compiled = breakpoint
            .condition
            .as_deref()
            .map(|source| compile(source, &input_path, &self.transpilers));
        let condition = match compiled {
            None | Some(Ok(None)) => None,
            Some(Ok(Some(compiled))) => Some(compiled),
            Some(Err(err)) => {
                self.reject(breakpoint, condition_status(&err));
                return false;
            }
        };
        let expressions = breakpoint
            .expressions
            .iter()
            .map(|text| WatchExpression {
                text: text.clone(),
                compiled: compile(text, &input_path, &self.transpilers)
                    .and_then(|compiled| compiled.ok_or(CompileError::Disallowed(Disallowed::Empty))),
            })
            .collect();

        let mut column = resolved.column;
        if resolved.line == 1 && self.version.wraps_modules() {
            column += MODULE_WRAP_PREFIX_LENGTH;
        }
        let key = format!("{}:{}:{column}", resolved.file, resolved.line);
        let actual_line = if self.installed.get(&key).is_some() {
            self.installed
                .attach(&key, breakpoint.id.clone())
                .and_then(|entry| entry.actual_line)
        } else {
            let target = self.backend.target(&resolved.file, resolved.line, column);
            match self.session.set_breakpoint(&target) {
                Ok(installed) => {
                    debug!(id = %breakpoint.id, native = %installed.id, key = %key, "installed native breakpoint");
                    self.installed.insert(
                        key.clone(),
                        target,
                        installed.id,
                        installed.actual_line,
                        breakpoint.id.clone(),
                    );
                    installed.actual_line
                }
                Err(err) => {
                    warn!(id = %breakpoint.id, %err, "{}", messages::V8_BREAKPOINT_ERROR);
                    self.reject(
                        breakpoint,
                        StatusMessage::error(
                            RefersTo::BreakpointSourceLocation,
                            messages::V8_BREAKPOINT_ERROR,
                        ),
                    );
                    return false;
                }
            }
        };
        if let (false, Some(actual), Some(location)) =
            (resolved.mapped, actual_line, breakpoint.location.as_mut())
        {
            if actual != location.line {
                debug!(id = %breakpoint.id, requested = location.line, actual, "breakpoint moved");
                location.line = actual;
            }
        }

        let now = self.clock.now();
        let expiration = self.config.breakpoint_expiration;
        let deadline = match breakpoint.create_time {
            Some(created) => timestamp_to_duration(created) + expiration,
            None => now + expiration,
        };
        let id = breakpoint.id.clone();
        let expiry = self.timers.schedule(deadline, TimerEvent::Expire(id.clone()));
        let logpoint = (breakpoint.action == Action::Log).then(|| LogpointState {
            throttle: LogThrottle::new(self.config.log.max_logs_per_second),
            paused: false,
            resume: None,
        });
        info!(id = %id, location = %key, action = ?breakpoint.action, "breakpoint set");
        self.active.insert(
            id,
            ActiveBreakpoint {
                breakpoint,
                location_key: key,
                condition,
                expressions,
                expiry,
                logpoint,
            },
        );
        true
    }

    /// Resolve the requested path to the loaded script and validate the line.
    fn resolve_location(
        &self,
        path: &str,
        line: u32,
        column: Option<u32>,
    ) -> Result<ResolvedLocation, StatusMessage> {
        let location_error =
            |message: String| StatusMessage::error(RefersTo::BreakpointSourceLocation, message);
        let requested = normalize(path);
        let work_dir = self.config.work_dir.as_deref();

        let mapped = self.lookup_source_map(&requested).map_err(|err| {
            warn!(path, %err, "{}", messages::SOURCE_FILE_AMBIGUOUS);
            location_error(messages::SOURCE_FILE_AMBIGUOUS.to_string())
        })?;
        let resolved = match mapped {
            Some(info) => {
                let position = self.source_maps.map_output(line, column.unwrap_or(1), &info);
                debug!(path, output = %position.file, line = position.line, "mapped through source map");
                ResolvedLocation {
                    file: position.file,
                    line: position.line,
                    column: position.column,
                    mapped: true,
                }
            }
            None if !self.config.is_script_path(&requested) => {
                return Err(location_error(messages::COULD_NOT_FIND_OUTPUT_FILE.to_string()));
            }
            None => {
                let known = self.files.paths();
                match resolve_in(&requested, &known, work_dir, self.path_resolver.as_deref()) {
                    Resolution::Unique(file) => ResolvedLocation {
                        file,
                        line,
                        column: column.unwrap_or(1).max(1),
                        mapped: false,
                    },
                    Resolution::NotFound => {
                        return Err(location_error(messages::SOURCE_FILE_NOT_FOUND.to_string()))
                    }
                    Resolution::Ambiguous(_) => {
                        return Err(location_error(messages::SOURCE_FILE_AMBIGUOUS.to_string()))
                    }
                }
            }
        };

        let Some(stats) = self.files.get(&resolved.file) else {
            return Err(location_error(messages::SOURCE_FILE_NOT_FOUND.to_string()));
        };
        if resolved.line > stats.line_count {
            return Err(location_error(messages::invalid_line(path, line)));
        }
        Ok(resolved)
    }

    fn lookup_source_map(
        &self,
        requested: &str,
    ) -> Result<Option<crate::sourcemap::MapInfo>, SourceMapError> {
        if self.source_maps.is_empty() {
            return Ok(None);
        }
        if let Some(work_dir) = &self.config.work_dir {
            let joined = normalize(&work_dir.join(requested).to_string_lossy());
            if let Some(info) = self.source_maps.map_input(&joined)? {
                return Ok(Some(info));
            }
        }
        self.source_maps.map_input(requested)
    }

    /// Finalize `breakpoint` with `status` without installing it.
    pub fn reject(&mut self, mut breakpoint: Breakpoint, status: StatusMessage) {
        info!(id = %breakpoint.id, status = status.message(), "breakpoint rejected");
        breakpoint.status = Some(status);
        self.finalize(breakpoint);
    }

    fn finalize(&mut self, mut breakpoint: Breakpoint) {
        breakpoint.is_final_state = true;
        self.completed.insert(breakpoint.id.clone());
        self.outbox.push(breakpoint);
    }

    /// Remove an active breakpoint. Returns `false` if it was not active.
    pub fn clear(&mut self, id: &str) -> bool {
        let Some(active) = self.active.shift_remove(id) else {
            return false;
        };
        self.release(&active);
        info!(id, "breakpoint cleared");
        true
    }

    /// Cancel the breakpoint's timers and drop its reference to the native
    /// handle, removing the handle when nothing else uses it.
    fn release(&mut self, active: &ActiveBreakpoint) {
        self.timers.cancel(active.expiry);
        if let Some(resume) = active.logpoint.as_ref().and_then(|state| state.resume) {
            self.timers.cancel(resume);
        }
        if let Some(entry) = self.installed.detach(&active.location_key, &active.breakpoint.id) {
            match self.session.remove_breakpoint(&entry.native) {
                Ok(()) => debug!(native = %entry.native, "removed native breakpoint"),
                Err(err) => warn!(native = %entry.native, %err, "{}", messages::V8_BREAKPOINT_CLEAR_ERROR),
            }
        }
    }

    fn complete(&mut self, id: &str, status: Option<StatusMessage>) {
        let Some(mut active) = self.active.shift_remove(id) else {
            return;
        };
        self.release(&active);
        if let Some(status) = status {
            active.breakpoint.status = Some(status);
        }
        info!(id, "breakpoint completed");
        self.finalize(active.breakpoint);
    }

    fn handle_hit(&mut self, id: &SmolStr, frames: &dyn PausedFrames, now: Duration) {
        let Some(active) = self.active.get(id) else {
            return;
        };
        if active.logpoint.as_ref().is_some_and(|state| state.paused) {
            return;
        }
        if let Some(condition) = &active.condition {
            match frames.evaluate(0, &condition.source) {
                Ok(value) if value.is_truthy() => {}
                Ok(_) => return,
                Err(message) => {
                    warn!(id = %id, %message, "condition failed");
                    let status = StatusMessage::error(
                        RefersTo::BreakpointCondition,
                        format!("{}{message}", messages::ERROR_EVALUATING_CONDITION),
                    );
                    self.complete(id, Some(status));
                    return;
                }
            }
        }
        let action = active.breakpoint.action;
        match action {
            Action::Capture => self.capture_hit(id, frames),
            Action::Log => self.log_hit(id, frames, now),
        }
    }

    fn capture_hit(&mut self, id: &SmolStr, frames: &dyn PausedFrames) {
        let Some(active) = self.active.get_mut(id) else {
            return;
        };
        if frames.call_frames().is_empty() {
            let status = StatusMessage::error(
                RefersTo::Unspecified,
                format!("{}no call frames", messages::CAPTURE_BREAKPOINT_DATA),
            );
            self.complete(id, Some(status));
            return;
        }
        let state = capture::capture(
            frames,
            &active.expressions,
            &self.config.capture,
            self.config.work_dir.as_deref(),
        );
        debug!(id = %id, frames = state.stack_frames.len(), variables = state.variable_table.len(), "captured snapshot");
        active.breakpoint.stack_frames = state.stack_frames;
        active.breakpoint.variable_table = state.variable_table;
        active.breakpoint.evaluated_expressions = state.evaluated_expressions;
        self.complete(id, None);
    }

    fn log_hit(&mut self, id: &SmolStr, frames: &dyn PausedFrames, now: Duration) {
        self.hits_since_reset += 1;
        if self.hits_since_reset >= self.config.reset_session_threshold && !self.reset_pending {
            self.reset_pending = true;
            self.timers.schedule(now, TimerEvent::ResetSession);
        }
        let log_delay = self.config.log.log_delay;
        let Some(active) = self.active.get_mut(id) else {
            return;
        };
        let Some(state) = active.logpoint.as_mut() else {
            return;
        };
        let admission = state.throttle.admit(now);
        if admission != Admission::Drop {
            let (values, table) =
                capture::evaluate_expressions(frames, &active.expressions, &self.config.capture);
            let format = active.breakpoint.log_message_format.as_deref().unwrap_or_default();
            let message = format!("{LOGPOINT_PREFIX}{}", format_message(format, &values, &table));
            let level = active.breakpoint.log_level.unwrap_or(LogLevel::Info);
            self.log_sink.log(level, &message);
        }
        if admission != Admission::Emit {
            state.paused = true;
            state.resume = Some(self.timers.schedule(now + log_delay, TimerEvent::ResumeLogpoint(id.clone())));
            info!(id = %id, delay = ?log_delay, "logpoint throttled");
        }
    }

    /// Fire every timer that is due.
    pub fn poll(&mut self) {
        let now = self.clock.now();
        for event in self.timers.pop_due(now) {
            match event {
                TimerEvent::Expire(id) => {
                    let Some(active) = self.active.get(&id) else {
                        continue;
                    };
                    let message = match active.breakpoint.action {
                        Action::Capture => messages::SNAPSHOT_EXPIRED,
                        Action::Log => messages::LOGPOINT_EXPIRED,
                    };
                    info!(id = %id, "breakpoint expired");
                    self.complete(&id, Some(StatusMessage::error(RefersTo::BreakpointAge, message)));
                }
                TimerEvent::ResumeLogpoint(id) => {
                    if let Some(state) = self
                        .active
                        .get_mut(&id)
                        .and_then(|active| active.logpoint.as_mut())
                    {
                        state.paused = false;
                        state.resume = None;
                        debug!(id = %id, "logpoint resumed");
                    }
                }
                TimerEvent::ResetSession => self.reset_session(),
            }
        }
    }

    /// Recreate the debugging session and re-install every native breakpoint.
    fn reset_session(&mut self) {
        self.reset_pending = false;
        self.hits_since_reset = 0;
        if let Err(err) = self.session.reset() {
            warn!(%err, "failed to reset debugging session");
            return;
        }
        let targets = self.installed.targets();
        let count = targets.len();
        for (key, target) in targets {
            match self.session.set_breakpoint(&target) {
                Ok(installed) => self.installed.rebind(&key, installed.id),
                Err(err) => {
                    warn!(key = %key, %err, "{}", messages::V8_BREAKPOINT_ERROR);
                    let Some(entry) = self.installed.remove(&key) else {
                        continue;
                    };
                    for id in entry.breakpoints {
                        self.complete(
                            &id,
                            Some(StatusMessage::error(
                                RefersTo::BreakpointSourceLocation,
                                messages::V8_BREAKPOINT_ERROR,
                            )),
                        );
                    }
                }
            }
        }
        info!(natives = count, "debugging session reset");
    }

    /// Earliest pending timer, as a [`Clock`] time.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Completed breakpoints waiting to be reported. Ids that were forgotten
    /// in the meantime are dropped.
    pub fn take_reports(&mut self) -> Vec<Breakpoint> {
        let completed = &self.completed;
        self.outbox
            .drain(..)
            .filter(|breakpoint| completed.contains(&breakpoint.id))
            .collect()
    }

    /// Put back a report that could not be delivered.
    pub fn requeue(&mut self, breakpoint: Breakpoint) {
        if self.completed.contains(&breakpoint.id) {
            self.outbox.push(breakpoint);
        }
    }

    /// Drop the bookkeeping of a completed breakpoint.
    pub fn forget_completed(&mut self, id: &str) -> bool {
        self.outbox.retain(|breakpoint| breakpoint.id != id);
        self.completed.shift_remove(id)
    }

    #[must_use]
    pub fn breakpoint(&self, id: &str) -> Option<&Breakpoint> {
        self.active.get(id).map(|active| &active.breakpoint)
    }

    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    #[must_use]
    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    #[must_use]
    pub fn active_ids(&self) -> Vec<SmolStr> {
        self.active.keys().cloned().collect()
    }

    #[must_use]
    pub fn completed_ids(&self) -> Vec<SmolStr> {
        self.completed.iter().cloned().collect()
    }

    /// Number of active logical breakpoints.
    #[must_use]
    pub fn num_breakpoints(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn num_native_breakpoints(&self) -> usize {
        self.installed.len()
    }

    /// Cancel all timers, remove every native breakpoint and disconnect.
    pub fn shutdown(&mut self) {
        self.timers.clear();
        for entry in self.installed.drain() {
            if let Err(err) = self.session.remove_breakpoint(&entry.native) {
                debug!(native = %entry.native, %err, "{}", messages::V8_BREAKPOINT_CLEAR_ERROR);
            }
        }
        let dropped = self.active.len();
        self.active.clear();
        self.session.disconnect();
        info!(dropped, "breakpoint engine shut down");
    }

    /// Work directory captured paths are made relative to.
    #[must_use]
    pub fn work_dir(&self) -> Option<&Path> {
        self.config.work_dir.as_deref()
    }
}

impl PauseHandler for BreakpointEngine {
    fn on_pause(&mut self, hits: &[NativeBreakpointId], frames: &dyn PausedFrames) {
        let now = self.clock.now();
        let ids: Vec<SmolStr> = hits
            .iter()
            .flat_map(|native| self.installed.breakpoints_for(native).iter().cloned())
            .collect();
        debug!(hits = hits.len(), breakpoints = ids.len(), "paused");
        for id in &ids {
            self.handle_hit(id, frames, now);
        }
    }
}

fn condition_status(err: &CompileError) -> StatusMessage {
    let message = match err {
        CompileError::Syntax(err) => format!("{}{err}", messages::SYNTAX_ERROR_IN_CONDITION),
        CompileError::Disallowed(_) => messages::DISALLOWED_EXPRESSION.to_string(),
        CompileError::Transpile(_) => messages::ERROR_COMPILING_CONDITION.to_string(),
    };
    StatusMessage::error(RefersTo::BreakpointCondition, message)
}

fn timestamp_to_duration(timestamp: Timestamp) -> Duration {
    let seconds = u64::try_from(timestamp.seconds).unwrap_or(0);
    let nanos = u32::try_from(timestamp.nanos).unwrap_or(0);
    Duration::new(seconds, nanos.min(999_999_999))
}
