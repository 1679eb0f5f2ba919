//! Shared helpers for parser and validator tests.
#![allow(dead_code, unused_imports)]

pub use tether_syntax::{check, parse, CheckError, Disallowed};

/// Render a parse result as S-expressions, or the error message.
pub fn snapshot_parse(source: &str) -> String {
    match parse(source) {
        Ok(program) => program.to_string(),
        Err(err) => format!("error: {err}"),
    }
}

/// The disallowed construct reported for `source`, panicking on syntax errors.
pub fn disallowed(source: &str) -> Disallowed {
    match check(source) {
        Err(CheckError::Disallowed(reason)) => reason,
        other => panic!("expected {source:?} to be disallowed, got {other:?}"),
    }
}
