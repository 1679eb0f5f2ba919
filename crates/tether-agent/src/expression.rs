//! Compiling conditions and watch expressions.
//!
//! Sources written in another language are first rewritten by the transpiler
//! registered for the file's extension. The (rewritten) source must then parse
//! and pass the side-effect allow-list before it is ever evaluated.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tether_syntax::{CheckError, Disallowed, ParseError};
use thiserror::Error;

/// A validated expression ready to be evaluated in a paused frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledExpression {
    /// The source as written in the breakpoint.
    pub original: String,
    /// The source that is evaluated (after transpiling).
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("{0}")]
    Syntax(ParseError),
    #[error("{0}")]
    Disallowed(Disallowed),
    #[error("{0}")]
    Transpile(SmolStr),
}

impl From<CheckError> for CompileError {
    fn from(err: CheckError) -> Self {
        match err {
            CheckError::Syntax(err) => Self::Syntax(err),
            CheckError::Disallowed(err) => Self::Disallowed(err),
        }
    }
}

/// Rewrites an expression from a source language into the base language.
pub trait ExpressionTranspiler {
    fn transpile(&self, source: &str) -> Result<String, String>;
}

impl<F> ExpressionTranspiler for F
where
    F: Fn(&str) -> Result<String, String>,
{
    fn transpile(&self, source: &str) -> Result<String, String> {
        self(source)
    }
}

/// Transpilers keyed by file extension (with the leading dot).
#[derive(Default)]
pub struct TranspilerRegistry {
    by_extension: FxHashMap<SmolStr, Box<dyn ExpressionTranspiler>>,
}

impl std::fmt::Debug for TranspilerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspilerRegistry")
            .field("extensions", &self.by_extension.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TranspilerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        extension: impl Into<SmolStr>,
        transpiler: impl ExpressionTranspiler + 'static,
    ) {
        self.by_extension
            .insert(extension.into(), Box::new(transpiler));
    }

    /// The transpiler for `path`, chosen by its extension.
    #[must_use]
    pub fn for_path(&self, path: &str) -> Option<&dyn ExpressionTranspiler> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let ext = name.rfind('.').map(|idx| &name[idx..])?;
        self.by_extension
            .get(ext)
            .map(|transpiler| &**transpiler)
    }
}

/// Compile `source` for a breakpoint in `path`.
///
/// Blank sources compile to `None` (no condition).
pub fn compile(
    source: &str,
    path: &str,
    transpilers: &TranspilerRegistry,
) -> Result<Option<CompiledExpression>, CompileError> {
    if source.trim().is_empty() {
        return Ok(None);
    }
    let rewritten = match transpilers.for_path(path) {
        Some(transpiler) => transpiler
            .transpile(source)
            .map_err(|err| CompileError::Transpile(err.into()))?,
        None => source.to_string(),
    };
    tether_syntax::check(&rewritten)?;
    Ok(Some(CompiledExpression {
        original: source.to_string(),
        source: rewritten,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_condition_is_absent() {
        let registry = TranspilerRegistry::new();
        assert_eq!(compile("  ", "a.js", &registry), Ok(None));
    }

    #[test]
    fn plain_expressions_compile_unchanged() {
        let registry = TranspilerRegistry::new();
        let compiled = compile("x === 5", "a.js", &registry).unwrap().unwrap();
        assert_eq!(compiled.source, "x === 5");
    }

    #[test]
    fn disallowed_and_syntax_errors_are_distinguished() {
        let registry = TranspilerRegistry::new();
        assert!(matches!(
            compile("x = 5", "a.js", &registry),
            Err(CompileError::Disallowed(Disallowed::Assignment))
        ));
        assert!(matches!(
            compile("x ===", "a.js", &registry),
            Err(CompileError::Syntax(_))
        ));
    }

    #[test]
    fn transpiler_runs_before_validation() {
        let mut registry = TranspilerRegistry::new();
        registry.register(".coffee", |source: &str| {
            Ok::<_, String>(source.replace(" is ", " === "))
        });
        registry.register(".bad", |_: &str| Err::<String, _>("unsupported".to_string()));

        let compiled = compile("x is 5", "src/a.coffee", &registry).unwrap().unwrap();
        assert_eq!(compiled.original, "x is 5");
        assert_eq!(compiled.source, "x === 5");
        assert_eq!(
            compile("x", "b.bad", &registry),
            Err(CompileError::Transpile("unsupported".into()))
        );
    }
}
