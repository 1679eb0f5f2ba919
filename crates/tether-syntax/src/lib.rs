//! `tether-syntax` - parser and side-effect validator for watch and condition
//! expressions.
//!
//! The accepted language is the expression subset of JavaScript. Sources are
//! lexed with `logos`, parsed into a small AST and then checked against a
//! per-node allow-list before anything is handed to a running interpreter.
//!
//! ```
//! use tether_syntax::{check, CheckError};
//!
//! assert!(check("a.b > 3 ? 'big' : `small ${a.b}`").is_ok());
//! assert!(matches!(check("x = 1"), Err(CheckError::Disallowed(_))));
//! assert!(matches!(check("x ==="), Err(CheckError::Syntax(_))));
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod ast;
pub mod lexer;
mod parser;
mod validate;

use thiserror::Error;

pub use parser::{parse, parse_expression, ParseError, MAX_NESTING_DEPTH};
pub use validate::{validate, validate_expression, Disallowed};

/// Failure of [`check`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error(transparent)]
    Syntax(#[from] ParseError),
    #[error(transparent)]
    Disallowed(#[from] Disallowed),
}

/// Parse and validate `source` in one step.
pub fn check(source: &str) -> Result<ast::Program, CheckError> {
    let program = parse(source)?;
    validate(&program)?;
    Ok(program)
}
