//! User-visible status messages.

pub const INVALID_BREAKPOINT: &str = "invalid snapshot - id or location missing";
pub const SOURCE_FILE_NOT_FOUND: &str =
    "A script matching the source file was not found loaded on the debuggee";
pub const SOURCE_FILE_AMBIGUOUS: &str = "Multiple files match the path specified";
pub const INVALID_LINE_NUMBER: &str = "Invalid snapshot position: ";
pub const COULD_NOT_FIND_OUTPUT_FILE: &str =
    "Could not determine the output file associated with the transpiled input file";
pub const SOURCE_MAP_READ_ERROR: &str =
    "The source map could not be read or was incorrectly formatted";
pub const SYNTAX_ERROR_IN_CONDITION: &str = "Syntax error in condition: ";
pub const ERROR_EVALUATING_CONDITION: &str = "Error evaluating condition: ";
pub const ERROR_COMPILING_CONDITION: &str = "Error compiling condition.";
pub const ERROR_COMPILING_EXPRESSION: &str = "Error Compiling Expression";
pub const DISALLOWED_EXPRESSION: &str = "Expression not allowed";
pub const V8_BREAKPOINT_ERROR: &str = "Unable to set breakpoint in v8";
pub const V8_BREAKPOINT_CLEAR_ERROR: &str = "Unable to clear breakpoint in v8";
pub const CAPTURE_BREAKPOINT_DATA: &str = "Error trying to capture snapshot data: ";
pub const EXPRESSIONS_NOT_ALLOWED: &str =
    "Expressions and conditions are not allowed by default. Please set the allow_expressions configuration option to true. See the agent documentation for details.";
pub const SNAPSHOT_EXPIRED: &str = "The snapshot has expired";
pub const LOGPOINT_EXPIRED: &str = "The logpoint has expired";
pub const BUFFER_FULL: &str = "Max data size reached";
pub const GETTER_UNSUPPORTED: &str = "Properties with getters are not available";

#[must_use]
pub fn invalid_line(path: &str, line: u32) -> String {
    format!("{INVALID_LINE_NUMBER}{path}:{line}")
}

#[must_use]
pub fn frame_limit(max_expand_frames: usize) -> String {
    format!(
        "Locals and arguments are only displayed for the top `config.capture.maxExpandFrames={max_expand_frames}` stack frames."
    )
}

#[must_use]
pub fn properties_truncated(max_properties: usize) -> String {
    format!(
        "Only first `config.capture.maxProperties={max_properties}` properties were captured. Use in an expression to see all properties."
    )
}

#[must_use]
pub fn string_truncated(max_string_length: usize, length: usize) -> String {
    format!(
        "Only first `config.capture.maxStringLength={max_string_length}` chars were captured for string of length {length}. Use in an expression to see the full string."
    )
}
