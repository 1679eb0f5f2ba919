//! Snapshot capture of a paused stack.
//!
//! Objects are resolved breadth-first into a shared variable table, one entry
//! per object id, so shared and cyclic graphs are visited once. A running byte
//! count bounds the work: past `max_data_size` every value still to be
//! resolved becomes a "max data size reached" placeholder, but the traversal
//! still walks the structure so every frame and expression gets an entry.

use std::collections::VecDeque;
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::config::CaptureLimits;
use crate::expression::{CompileError, CompiledExpression};
use crate::inspector::{format_number, ObjectId, PausedFrames, PropertyValue, RemoteValue};
use crate::messages;
use crate::paths::normalize;
use crate::protocol::{RefersTo, SourceLocation, StackFrame, StatusMessage, Variable};

const ANONYMOUS_FUNCTION: &str = "(anonymous function)";

/// A watch expression together with its compile outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchExpression {
    pub text: String,
    pub compiled: Result<CompiledExpression, CompileError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedState {
    pub stack_frames: Vec<StackFrame>,
    pub variable_table: Vec<Variable>,
    pub evaluated_expressions: Vec<Variable>,
}

/// Capture the paused stack and evaluate `expressions` in the top frame.
#[must_use]
pub fn capture(
    frames: &dyn PausedFrames,
    expressions: &[WatchExpression],
    limits: &CaptureLimits,
    work_dir: Option<&Path>,
) -> CapturedState {
    let mut capture = Capture::new(frames, *limits);
    let evaluated_expressions = capture.expressions(expressions);
    let stack_frames = capture.frames(work_dir);
    capture.drain();
    CapturedState {
        stack_frames,
        variable_table: capture.table,
        evaluated_expressions,
    }
}

/// Evaluate `expressions` only; returns the values and the table they index.
#[must_use]
pub fn evaluate_expressions(
    frames: &dyn PausedFrames,
    expressions: &[WatchExpression],
    limits: &CaptureLimits,
) -> (Vec<Variable>, Vec<Variable>) {
    let mut capture = Capture::new(frames, *limits);
    let values = capture.expressions(expressions);
    capture.drain();
    (values, capture.table)
}

struct Pending {
    index: usize,
    id: ObjectId,
    truncate: bool,
}

struct Capture<'a> {
    frames: &'a dyn PausedFrames,
    limits: CaptureLimits,
    table: Vec<Variable>,
    seen: FxHashMap<ObjectId, usize>,
    pending: VecDeque<Pending>,
    bytes: usize,
}

impl<'a> Capture<'a> {
    fn new(frames: &'a dyn PausedFrames, limits: CaptureLimits) -> Self {
        Self {
            frames,
            limits,
            table: Vec::new(),
            seen: FxHashMap::default(),
            pending: VecDeque::new(),
            bytes: 0,
        }
    }

    fn over_budget(&self) -> bool {
        self.bytes > self.limits.max_data_size
    }

    fn charge(&mut self, variable: &Variable) {
        self.bytes += variable.name.as_ref().map_or(0, String::len)
            + variable.value.as_ref().map_or(0, String::len);
    }

    fn expressions(&mut self, expressions: &[WatchExpression]) -> Vec<Variable> {
        expressions
            .iter()
            .map(|expression| {
                let name = expression.text.clone();
                match &expression.compiled {
                    Err(CompileError::Disallowed(_)) => Variable::named(name).with_status(
                        StatusMessage::error(RefersTo::VariableName, messages::DISALLOWED_EXPRESSION),
                    ),
                    Err(_) => Variable::named(name).with_status(StatusMessage::error(
                        RefersTo::VariableName,
                        messages::ERROR_COMPILING_EXPRESSION,
                    )),
                    Ok(_) if self.over_budget() => buffer_full(Some(name)),
                    Ok(compiled) => match self.frames.evaluate(0, &compiled.source) {
                        Ok(value) => self.resolve(Some(name), &value, false),
                        Err(message) => Variable::named(name)
                            .with_status(StatusMessage::error(RefersTo::VariableValue, message)),
                    },
                }
            })
            .collect()
    }

    fn frames(&mut self, work_dir: Option<&Path>) -> Vec<StackFrame> {
        let frames = self.frames;
        let mut expanded = 0usize;
        let mut out = Vec::new();
        for frame in frames.call_frames().iter().take(self.limits.max_frames) {
            let counts = self.limits.include_node_modules || !frame.url.contains("node_modules");
            let expand = counts && expanded < self.limits.max_expand_frames;
            let (arguments, locals) = if expand {
                expanded += 1;
                let arguments = frame
                    .arguments
                    .iter()
                    .map(|(name, value)| self.resolve(Some(name.clone()), value, true))
                    .collect();
                let locals = frame
                    .locals
                    .iter()
                    .map(|(name, value)| self.resolve(Some(name.clone()), value, true))
                    .collect();
                (arguments, locals)
            } else {
                let placeholder = Variable::default().with_status(StatusMessage::error(
                    RefersTo::VariableValue,
                    messages::frame_limit(self.limits.max_expand_frames),
                ));
                (Vec::new(), vec![placeholder])
            };
            let function = if frame.function_name.is_empty() {
                ANONYMOUS_FUNCTION.to_string()
            } else {
                frame.function_name.clone()
            };
            out.push(StackFrame {
                function,
                location: SourceLocation {
                    path: relative_path(&frame.url, work_dir),
                    line: frame.line,
                    column: None,
                },
                arguments,
                locals,
            });
        }
        out
    }

    /// Resolve one value. `truncate` is false only for top-level watch
    /// expressions.
    fn resolve(&mut self, name: Option<String>, value: &RemoteValue, truncate: bool) -> Variable {
        if self.over_budget() {
            return buffer_full(name);
        }
        let variable = match value {
            RemoteValue::Object {
                id,
                class_name,
                description,
            } => {
                let index = self.table_index(*id, class_name, description, truncate);
                Variable {
                    name,
                    var_table_index: Some(index),
                    ..Variable::default()
                }
            }
            RemoteValue::String(text) => self.string_leaf(name, text, truncate),
            other => Variable {
                name,
                value: Some(primitive_text(other)),
                ..Variable::default()
            },
        };
        self.charge(&variable);
        variable
    }

    fn string_leaf(&self, name: Option<String>, text: &str, truncate: bool) -> Variable {
        let max = self.limits.max_string_length;
        let length = text.chars().count();
        if truncate && max > 0 && length > max {
            let head: String = text.chars().take(max).collect();
            return Variable {
                name,
                value: Some(format!("{}...", quote(&head))),
                status: Some(StatusMessage::info(
                    RefersTo::VariableValue,
                    messages::string_truncated(max, length),
                )),
                ..Variable::default()
            };
        }
        Variable {
            name,
            value: Some(quote(text)),
            ..Variable::default()
        }
    }

    fn table_index(
        &mut self,
        id: ObjectId,
        class_name: &str,
        description: &str,
        truncate: bool,
    ) -> usize {
        if let Some(index) = self.seen.get(&id) {
            return *index;
        }
        let index = self.table.len();
        let entry = Variable {
            value: Some(description.to_string()),
            type_name: Some(class_name.to_string()),
            ..Variable::default()
        };
        self.charge(&entry);
        self.table.push(entry);
        self.seen.insert(id, index);
        self.pending.push_back(Pending {
            index,
            id,
            truncate,
        });
        index
    }

    fn drain(&mut self) {
        while let Some(Pending {
            index,
            id,
            truncate,
        }) = self.pending.pop_front()
        {
            if self.over_budget() {
                self.table[index].status = Some(buffer_full_status());
                continue;
            }
            let properties = match self.frames.properties(id) {
                Ok(properties) => properties,
                Err(message) => {
                    self.table[index].status =
                        Some(StatusMessage::error(RefersTo::VariableValue, message));
                    continue;
                }
            };
            let limit = match self.limits.max_properties {
                max if truncate && max > 0 => max,
                _ => usize::MAX,
            };
            let mut members: Vec<Variable> = properties
                .iter()
                .take(limit)
                .map(|property| match &property.value {
                    PropertyValue::Value(value) => {
                        self.resolve(Some(property.name.clone()), value, true)
                    }
                    PropertyValue::Getter => Variable::named(property.name.clone()).with_status(
                        StatusMessage::info(RefersTo::VariableValue, messages::GETTER_UNSUPPORTED),
                    ),
                    PropertyValue::Thrown(message) => Variable::named(property.name.clone())
                        .with_status(StatusMessage::error(
                            RefersTo::VariableValue,
                            message.clone(),
                        )),
                })
                .collect();
            if properties.len() > limit {
                members.push(Variable::default().with_status(StatusMessage::info(
                    RefersTo::VariableValue,
                    messages::properties_truncated(limit),
                )));
            }
            self.table[index].members = members;
        }
    }
}

fn buffer_full_status() -> StatusMessage {
    StatusMessage::error(RefersTo::VariableValue, messages::BUFFER_FULL)
}

fn buffer_full(name: Option<String>) -> Variable {
    Variable {
        name,
        status: Some(buffer_full_status()),
        ..Variable::default()
    }
}

fn primitive_text(value: &RemoteValue) -> String {
    match value {
        RemoteValue::Undefined => "undefined".to_string(),
        RemoteValue::Null => "null".to_string(),
        RemoteValue::Bool(value) => value.to_string(),
        RemoteValue::Number(value) => format_number(*value),
        RemoteValue::String(text) => quote(text),
        RemoteValue::Object { description, .. } => description.clone(),
    }
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

fn relative_path(url: &str, work_dir: Option<&Path>) -> String {
    let path = normalize(url);
    let Some(base) = work_dir else {
        return path;
    };
    let base = normalize(&base.to_string_lossy());
    match path.strip_prefix(&base) {
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/').to_string(),
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use smol_str::SmolStr;

    use super::*;
    use crate::inspector::{CallFrame, PropertyDescriptor};

    struct Frames {
        frames: Vec<CallFrame>,
        objects: FxHashMap<ObjectId, Vec<PropertyDescriptor>>,
    }

    impl PausedFrames for Frames {
        fn call_frames(&self) -> &[CallFrame] {
            &self.frames
        }

        fn evaluate(&self, _frame: usize, expression: &str) -> Result<RemoteValue, String> {
            match expression {
                "big" => Ok(object(1)),
                "name" => Ok(RemoteValue::String("x".repeat(300))),
                _ => Err(format!("ReferenceError: {expression} is not defined")),
            }
        }

        fn properties(&self, object: ObjectId) -> Result<Vec<PropertyDescriptor>, String> {
            self.objects
                .get(&object)
                .cloned()
                .ok_or_else(|| "no such object".to_string())
        }
    }

    fn object(id: u64) -> RemoteValue {
        RemoteValue::Object {
            id: ObjectId(id),
            class_name: SmolStr::new("Object"),
            description: "Object".to_string(),
        }
    }

    fn frame(name: &str, url: &str, locals: Vec<(String, RemoteValue)>) -> CallFrame {
        CallFrame {
            function_name: name.to_string(),
            url: url.to_string(),
            line: 3,
            column: 1,
            arguments: Vec::new(),
            locals,
        }
    }

    fn wide_object(count: usize) -> Vec<PropertyDescriptor> {
        (0..count)
            .map(|idx| PropertyDescriptor {
                name: format!("p{idx}"),
                value: PropertyValue::Value(RemoteValue::Number(idx as f64)),
            })
            .collect()
    }

    fn watch(text: &str) -> WatchExpression {
        WatchExpression {
            text: text.to_string(),
            compiled: Ok(CompiledExpression {
                original: text.to_string(),
                source: text.to_string(),
            }),
        }
    }

    #[test]
    fn shared_objects_get_one_table_entry() {
        let mut objects = FxHashMap::default();
        objects.insert(ObjectId(1), wide_object(2));
        let frames = Frames {
            frames: vec![frame(
                "f",
                "file:///app/a.js",
                vec![("a".into(), object(1)), ("b".into(), object(1))],
            )],
            objects,
        };
        let state = capture(&frames, &[], &CaptureLimits::default(), Some(&PathBuf::from("/app")));
        assert_eq!(state.variable_table.len(), 1);
        let locals = &state.stack_frames[0].locals;
        assert_eq!(locals[0].var_table_index, Some(0));
        assert_eq!(locals[1].var_table_index, Some(0));
        assert_eq!(state.stack_frames[0].location.path, "a.js");
    }

    #[test]
    fn watch_expressions_skip_top_level_truncation() {
        let mut objects = FxHashMap::default();
        objects.insert(ObjectId(1), wide_object(30));
        let frames = Frames {
            frames: vec![frame("f", "/app/a.js", Vec::new())],
            objects,
        };
        let limits = CaptureLimits::default();
        let state = capture(&frames, &[watch("big"), watch("name"), watch("nope")], &limits, None);
        assert_eq!(state.variable_table[0].members.len(), 30);
        assert_eq!(
            state.evaluated_expressions[1].value.as_ref().map(String::len),
            Some(302)
        );
        let failed = &state.evaluated_expressions[2];
        assert!(failed.is_error());
        assert_eq!(
            failed.status.as_ref().unwrap().message(),
            "ReferenceError: nope is not defined"
        );
    }

    #[test]
    fn locals_are_truncated() {
        let mut objects = FxHashMap::default();
        objects.insert(ObjectId(1), wide_object(30));
        let frames = Frames {
            frames: vec![frame(
                "f",
                "/app/a.js",
                vec![
                    ("o".into(), object(1)),
                    ("s".into(), RemoteValue::String("y".repeat(150))),
                ],
            )],
            objects,
        };
        let state = capture(&frames, &[], &CaptureLimits::default(), None);
        let members = &state.variable_table[0].members;
        assert_eq!(members.len(), 11);
        assert_eq!(
            members[10].status.as_ref().unwrap().message(),
            messages::properties_truncated(10)
        );
        let s = &state.stack_frames[0].locals[1];
        assert_eq!(s.value.as_ref().unwrap().len(), 102 + 3);
        assert!(!s.is_error());
    }

    #[test]
    fn zero_limits_mean_unlimited() {
        let mut objects = FxHashMap::default();
        objects.insert(ObjectId(1), wide_object(30));
        let frames = Frames {
            frames: vec![frame(
                "f",
                "/app/a.js",
                vec![
                    ("o".into(), object(1)),
                    ("s".into(), RemoteValue::String("y".repeat(150))),
                ],
            )],
            objects,
        };
        let limits = CaptureLimits {
            max_properties: 0,
            max_string_length: 0,
            ..CaptureLimits::default()
        };
        let state = capture(&frames, &[], &limits, None);
        let members = &state.variable_table[0].members;
        assert_eq!(members.len(), 30);
        assert!(members.iter().all(|member| member.status.is_none()));
        let s = &state.stack_frames[0].locals[1];
        assert_eq!(s.value.as_ref().unwrap().len(), 152);
        assert_eq!(s.status, None);
    }

    #[test]
    fn frames_past_the_expand_limit_get_a_placeholder() {
        let frames = Frames {
            frames: vec![
                frame("top", "/app/a.js", vec![("x".into(), RemoteValue::Number(1.0))]),
                frame("lib", "/app/node_modules/l/i.js", vec![("y".into(), RemoteValue::Null)]),
                frame("", "/app/b.js", vec![("z".into(), RemoteValue::Bool(true))]),
            ],
            objects: FxHashMap::default(),
        };
        let limits = CaptureLimits {
            max_expand_frames: 1,
            ..CaptureLimits::default()
        };
        let state = capture(&frames, &[], &limits, None);
        assert_eq!(state.stack_frames[0].locals[0].value.as_deref(), Some("1"));
        assert!(state.stack_frames[1].locals[0].is_error());
        assert!(state.stack_frames[2].locals[0].is_error());
        assert_eq!(state.stack_frames[2].function, ANONYMOUS_FUNCTION);
    }
}
