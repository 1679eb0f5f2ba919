//! Side-effect allow-list over the parsed tree.
//!
//! Every node kind is either accepted (and its children checked) or rejected
//! with the construct it names. Nothing is evaluated here.

use smol_str::SmolStr;
use thiserror::Error;

use crate::ast::{Expr, MemberProperty, Program, Property, PropertyKey, Statement, UnaryOp};

/// Built-in functions that may be called from a condition or watch expression.
const ALLOWED_CALLS: &[&str] = &[
    "String",
    "Number",
    "Boolean",
    "isNaN",
    "isFinite",
    "parseInt",
    "parseFloat",
    "JSON.stringify",
    "Object.keys",
    "Array.isArray",
    "Number.isNaN",
    "Number.isInteger",
    "Number.isFinite",
    "String.fromCharCode",
];

/// A construct that could have side effects in the target process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Disallowed {
    #[error("`{0}` statements are not allowed")]
    Statement(SmolStr),
    #[error("only a single expression is allowed")]
    MultipleStatements,
    #[error("expression is empty")]
    Empty,
    #[error("assignment is not allowed")]
    Assignment,
    #[error("increment and decrement are not allowed")]
    Update,
    #[error("`new` is not allowed")]
    New,
    #[error("function definitions are not allowed")]
    Function,
    #[error("class definitions are not allowed")]
    Class,
    #[error("`{0}` is not allowed")]
    Operator(&'static str),
    #[error("spread is not allowed")]
    Spread,
    #[error("tagged templates are not allowed")]
    TaggedTemplate,
    #[error("`super` is not allowed")]
    Super,
    #[error("call to `{0}` is not allowed")]
    Call(String),
}

/// Check that a program is a single side-effect-free expression.
pub fn validate(program: &Program) -> Result<(), Disallowed> {
    let mut found = None;
    for statement in &program.statements {
        match statement {
            Statement::Empty => {}
            Statement::Other { keyword, .. } => {
                return Err(Disallowed::Statement(keyword.clone()));
            }
            Statement::Expression(expr) => {
                if found.is_some() {
                    return Err(Disallowed::MultipleStatements);
                }
                found = Some(expr);
            }
        }
    }
    let expr = found.ok_or(Disallowed::Empty)?;
    validate_expression(expr)
}

/// Check a single expression node and everything below it.
pub fn validate_expression(expr: &Expr) -> Result<(), Disallowed> {
    match expr {
        Expr::Literal(_) | Expr::Ident(_) | Expr::This => Ok(()),
        Expr::Super => Err(Disallowed::Super),
        Expr::Template { exprs, .. } => exprs.iter().try_for_each(validate_expression),
        Expr::TaggedTemplate { .. } => Err(Disallowed::TaggedTemplate),
        Expr::Array(items) => items.iter().flatten().try_for_each(validate_expression),
        Expr::Object(props) => props.iter().try_for_each(|prop| match prop {
            Property::Spread(_) => Err(Disallowed::Spread),
            Property::KeyValue { key, value } => {
                if let PropertyKey::Computed(key) = key {
                    validate_expression(key)?;
                }
                validate_expression(value)
            }
        }),
        Expr::Spread(_) => Err(Disallowed::Spread),
        Expr::Member {
            object, property, ..
        } => {
            validate_expression(object)?;
            match property {
                MemberProperty::Name(_) => Ok(()),
                MemberProperty::Computed(key) => validate_expression(key),
            }
        }
        Expr::Call { callee, args, .. } => {
            let path = callee.dotted_path();
            match path {
                Some(path) if is_allowed_call(&path) => {
                    args.iter().try_for_each(validate_expression)
                }
                Some(path) => Err(Disallowed::Call(path)),
                None => Err(Disallowed::Call(callee.to_string())),
            }
        }
        Expr::New { .. } => Err(Disallowed::New),
        Expr::Unary { op, expr } => match op {
            UnaryOp::Delete | UnaryOp::Await => Err(Disallowed::Operator(op.as_str())),
            _ => validate_expression(expr),
        },
        Expr::Update { .. } => Err(Disallowed::Update),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            validate_expression(left)?;
            validate_expression(right)
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            validate_expression(test)?;
            validate_expression(consequent)?;
            validate_expression(alternate)
        }
        Expr::Assign { .. } => Err(Disallowed::Assignment),
        Expr::Sequence(items) => items.iter().try_for_each(validate_expression),
        Expr::Function => Err(Disallowed::Function),
        Expr::Class => Err(Disallowed::Class),
        Expr::Yield(_) => Err(Disallowed::Operator("yield")),
    }
}

fn is_allowed_call(path: &str) -> bool {
    if ALLOWED_CALLS.contains(&path) {
        return true;
    }
    path.strip_prefix("Math.")
        .is_some_and(|method| !method.is_empty() && !method.contains('.'))
}
