//! Tree-walking evaluator for the simulated interpreter.
//!
//! Covers the side-effect-free subset the validator admits, with the
//! interpreter's error messages for the common failure cases.

use tether_syntax::ast::{
    BinaryOp, Expr, Literal, LogicalOp, MemberProperty, Property, PropertyKey, Statement, UnaryOp,
};

use super::heap::{Heap, Slot};
use crate::inspector::{format_number, RemoteValue};

type EvalResult = Result<RemoteValue, String>;

pub(crate) struct Scope<'a> {
    pub(crate) bindings: Vec<(&'a str, &'a RemoteValue)>,
    pub(crate) heap: &'a mut Heap,
}

impl Scope<'_> {
    fn lookup(&self, name: &str) -> Option<RemoteValue> {
        self.bindings
            .iter()
            .find(|(binding, _)| *binding == name)
            .map(|(_, value)| (*value).clone())
    }
}

pub(crate) fn evaluate(source: &str, scope: &mut Scope<'_>) -> EvalResult {
    let program = tether_syntax::parse(source).map_err(|err| format!("SyntaxError: {err}"))?;
    let mut last = RemoteValue::Undefined;
    for statement in &program.statements {
        match statement {
            Statement::Expression(expr) => last = eval(expr, scope)?,
            Statement::Empty => {}
            Statement::Other { keyword, .. } => {
                return Err(format!("SyntaxError: Unexpected token '{keyword}'"));
            }
        }
    }
    Ok(last)
}

fn eval(expr: &Expr, scope: &mut Scope<'_>) -> EvalResult {
    match expr {
        Expr::Literal(literal) => Ok(match literal {
            Literal::Number(value) => RemoteValue::Number(*value),
            Literal::String(value) => RemoteValue::String(value.to_string()),
            Literal::Bool(value) => RemoteValue::Bool(*value),
            Literal::Null => RemoteValue::Null,
        }),
        Expr::Ident(name) => ident(name, scope),
        Expr::This => Ok(RemoteValue::Undefined),
        Expr::Template { quasis, exprs } => {
            let mut out = String::new();
            for (idx, quasi) in quasis.iter().enumerate() {
                out.push_str(quasi);
                if let Some(expr) = exprs.get(idx) {
                    let value = eval(expr, scope)?;
                    out.push_str(&to_string(&value, scope.heap));
                }
            }
            Ok(RemoteValue::String(out))
        }
        Expr::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(match item {
                    Some(item) => eval(item, scope)?,
                    None => RemoteValue::Undefined,
                });
            }
            Ok(scope.heap.array(values))
        }
        Expr::Object(props) => {
            let mut entries = Vec::with_capacity(props.len());
            for prop in props {
                let Property::KeyValue { key, value } = prop else {
                    return Err(unsupported());
                };
                let key = match key {
                    PropertyKey::Name(name) => name.to_string(),
                    PropertyKey::Computed(key) => {
                        let key = eval(key, scope)?;
                        to_string(&key, scope.heap)
                    }
                };
                entries.push((key, eval(value, scope)?));
            }
            let object = scope.heap.object();
            for (key, value) in entries {
                scope.heap.set(&object, &key, value);
            }
            Ok(object)
        }
        Expr::Member {
            object,
            property,
            optional,
        } => {
            let target = eval(object, scope)?;
            let key = match property {
                MemberProperty::Name(name) => name.to_string(),
                MemberProperty::Computed(key) => {
                    let key = eval(key, scope)?;
                    to_string(&key, scope.heap)
                }
            };
            if *optional && matches!(target, RemoteValue::Undefined | RemoteValue::Null) {
                return Ok(RemoteValue::Undefined);
            }
            member(&target, &key, scope.heap)
        }
        Expr::Call { callee, args, .. } => {
            let path = callee.dotted_path().ok_or_else(unsupported)?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, scope)?);
            }
            call(&path, &values, scope.heap)
        }
        Expr::Unary { op, expr } => {
            if *op == UnaryOp::Typeof {
                if let Expr::Ident(name) = &**expr {
                    if ident(name, scope).is_err() {
                        return Ok(RemoteValue::String("undefined".to_string()));
                    }
                }
            }
            let value = eval(expr, scope)?;
            unary(*op, &value, scope.heap)
        }
        Expr::Binary { op, left, right } => {
            let left = eval(left, scope)?;
            let right = eval(right, scope)?;
            binary(*op, &left, &right, scope.heap)
        }
        Expr::Logical { op, left, right } => {
            let left = eval(left, scope)?;
            let short_circuit = match op {
                LogicalOp::And => !left.is_truthy(),
                LogicalOp::Or => left.is_truthy(),
                LogicalOp::Nullish => !matches!(left, RemoteValue::Undefined | RemoteValue::Null),
            };
            if short_circuit {
                Ok(left)
            } else {
                eval(right, scope)
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if eval(test, scope)?.is_truthy() {
                eval(consequent, scope)
            } else {
                eval(alternate, scope)
            }
        }
        Expr::Sequence(items) => {
            let mut last = RemoteValue::Undefined;
            for item in items {
                last = eval(item, scope)?;
            }
            Ok(last)
        }
        _ => Err(unsupported()),
    }
}

fn unsupported() -> String {
    "EvalError: expression is not supported".to_string()
}

fn ident(name: &str, scope: &Scope<'_>) -> EvalResult {
    if let Some(value) = scope.lookup(name) {
        return Ok(value);
    }
    match name {
        "undefined" => Ok(RemoteValue::Undefined),
        "NaN" => Ok(RemoteValue::Number(f64::NAN)),
        "Infinity" => Ok(RemoteValue::Number(f64::INFINITY)),
        _ => Err(format!("ReferenceError: {name} is not defined")),
    }
}

fn member(target: &RemoteValue, key: &str, heap: &Heap) -> EvalResult {
    match target {
        RemoteValue::Undefined | RemoteValue::Null => {
            let kind = if matches!(target, RemoteValue::Null) {
                "null"
            } else {
                "undefined"
            };
            Err(format!(
                "TypeError: Cannot read properties of {kind} (reading '{key}')"
            ))
        }
        RemoteValue::String(text) => Ok(if key == "length" {
            RemoteValue::Number(text.chars().count() as f64)
        } else {
            key.parse::<usize>()
                .ok()
                .and_then(|idx| text.chars().nth(idx))
                .map_or(RemoteValue::Undefined, |ch| RemoteValue::String(ch.to_string()))
        }),
        RemoteValue::Object { id, .. } => match heap.slot(*id, key) {
            Some(Slot::Value(value)) => Ok(value.clone()),
            Some(Slot::Getter) => Ok(RemoteValue::Undefined),
            Some(Slot::Throws(message)) => Err(message.clone()),
            None if key == "length" && heap.is_array(*id) => {
                Ok(RemoteValue::Number(heap.keys(*id).len() as f64))
            }
            None => Ok(RemoteValue::Undefined),
        },
        RemoteValue::Bool(_) | RemoteValue::Number(_) => Ok(RemoteValue::Undefined),
    }
}

fn call(path: &str, args: &[RemoteValue], heap: &mut Heap) -> EvalResult {
    let arg = |idx: usize| args.get(idx).cloned().unwrap_or(RemoteValue::Undefined);
    let number = |idx: usize, heap: &Heap| to_number(&arg(idx), heap);
    let value = match path {
        "String" => RemoteValue::String(to_string(&arg(0), heap)),
        "Number" => RemoteValue::Number(number(0, heap)),
        "Boolean" => RemoteValue::Bool(arg(0).is_truthy()),
        "isNaN" => RemoteValue::Bool(number(0, heap).is_nan()),
        "isFinite" => RemoteValue::Bool(number(0, heap).is_finite()),
        "Number.isNaN" => RemoteValue::Bool(matches!(arg(0), RemoteValue::Number(n) if n.is_nan())),
        "Number.isInteger" => {
            RemoteValue::Bool(matches!(arg(0), RemoteValue::Number(n) if n.is_finite() && n.fract() == 0.0))
        }
        "Number.isFinite" => RemoteValue::Bool(matches!(arg(0), RemoteValue::Number(n) if n.is_finite())),
        "parseInt" => {
            let text = to_string(&arg(0), heap);
            let digits: String = text
                .trim()
                .chars()
                .enumerate()
                .take_while(|(idx, ch)| ch.is_ascii_digit() || (*idx == 0 && (*ch == '-' || *ch == '+')))
                .map(|(_, ch)| ch)
                .collect();
            RemoteValue::Number(digits.parse::<f64>().unwrap_or(f64::NAN))
        }
        "parseFloat" => {
            let text = to_string(&arg(0), heap);
            RemoteValue::Number(text.trim().parse::<f64>().unwrap_or(f64::NAN))
        }
        "JSON.stringify" => match arg(0) {
            RemoteValue::Undefined => RemoteValue::Undefined,
            value => RemoteValue::String(stringify(&value, heap, 0)),
        },
        "Object.keys" => {
            let keys = match arg(0) {
                RemoteValue::Object { id, .. } => heap.keys(id),
                _ => Vec::new(),
            };
            heap.array(keys.into_iter().map(RemoteValue::String).collect())
        }
        "Array.isArray" => RemoteValue::Bool(matches!(arg(0), RemoteValue::Object { id, .. } if heap.is_array(id))),
        "String.fromCharCode" => {
            let text: String = args
                .iter()
                .filter_map(|value| char::from_u32(to_number(value, heap) as u32))
                .collect();
            RemoteValue::String(text)
        }
        _ => match path.strip_prefix("Math.") {
            Some(method) => math(method, args, heap)?,
            None => return Err(format!("TypeError: {path} is not a function")),
        },
    };
    Ok(value)
}

fn math(method: &str, args: &[RemoteValue], heap: &Heap) -> EvalResult {
    let numbers: Vec<f64> = args.iter().map(|value| to_number(value, heap)).collect();
    let first = numbers.first().copied().unwrap_or(f64::NAN);
    let value = match method {
        "abs" => first.abs(),
        "floor" => first.floor(),
        "ceil" => first.ceil(),
        "round" => (first + 0.5).floor(),
        "sqrt" => first.sqrt(),
        "trunc" => first.trunc(),
        "sign" => {
            if first == 0.0 || first.is_nan() {
                first
            } else {
                first.signum()
            }
        }
        "pow" => first.powf(numbers.get(1).copied().unwrap_or(f64::NAN)),
        "max" => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "min" => numbers.iter().copied().fold(f64::INFINITY, f64::min),
        _ => return Err(format!("TypeError: Math.{method} is not a function")),
    };
    Ok(RemoteValue::Number(value))
}

fn unary(op: UnaryOp, value: &RemoteValue, heap: &Heap) -> EvalResult {
    Ok(match op {
        UnaryOp::Not => RemoteValue::Bool(!value.is_truthy()),
        UnaryOp::Neg => RemoteValue::Number(-to_number(value, heap)),
        UnaryOp::Plus => RemoteValue::Number(to_number(value, heap)),
        UnaryOp::BitNot => RemoteValue::Number(f64::from(!to_int32(to_number(value, heap)))),
        UnaryOp::Typeof => RemoteValue::String(
            match value {
                RemoteValue::Undefined => "undefined",
                RemoteValue::Null | RemoteValue::Object { .. } => "object",
                RemoteValue::Bool(_) => "boolean",
                RemoteValue::Number(_) => "number",
                RemoteValue::String(_) => "string",
            }
            .to_string(),
        ),
        UnaryOp::Void => RemoteValue::Undefined,
        UnaryOp::Delete | UnaryOp::Await => return Err(unsupported()),
    })
}

fn binary(op: BinaryOp, left: &RemoteValue, right: &RemoteValue, heap: &Heap) -> EvalResult {
    let num = |value: &RemoteValue| to_number(value, heap);
    let value = match op {
        BinaryOp::Add => {
            if matches!(left, RemoteValue::String(_) | RemoteValue::Object { .. })
                || matches!(right, RemoteValue::String(_) | RemoteValue::Object { .. })
            {
                RemoteValue::String(to_string(left, heap) + &to_string(right, heap))
            } else {
                RemoteValue::Number(num(left) + num(right))
            }
        }
        BinaryOp::Sub => RemoteValue::Number(num(left) - num(right)),
        BinaryOp::Mul => RemoteValue::Number(num(left) * num(right)),
        BinaryOp::Div => RemoteValue::Number(num(left) / num(right)),
        BinaryOp::Rem => RemoteValue::Number(num(left) % num(right)),
        BinaryOp::Exp => RemoteValue::Number(num(left).powf(num(right))),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
            let ordering = match (left, right) {
                (RemoteValue::String(a), RemoteValue::String(b)) => Some(a.cmp(b)),
                _ => num(left).partial_cmp(&num(right)),
            };
            RemoteValue::Bool(ordering.is_some_and(|ordering| match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::LtEq => ordering.is_le(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::StrictEq => RemoteValue::Bool(strict_equals(left, right)),
        BinaryOp::StrictNotEq => RemoteValue::Bool(!strict_equals(left, right)),
        BinaryOp::Eq => RemoteValue::Bool(loose_equals(left, right, heap)),
        BinaryOp::NotEq => RemoteValue::Bool(!loose_equals(left, right, heap)),
        BinaryOp::BitAnd => int_op(left, right, heap, |a, b| a & b),
        BinaryOp::BitOr => int_op(left, right, heap, |a, b| a | b),
        BinaryOp::BitXor => int_op(left, right, heap, |a, b| a ^ b),
        BinaryOp::Shl => int_op(left, right, heap, |a, b| a.wrapping_shl(b as u32 & 31)),
        BinaryOp::Shr => int_op(left, right, heap, |a, b| a.wrapping_shr(b as u32 & 31)),
        BinaryOp::UShr => {
            let shifted = (to_int32(num(left)) as u32) >> (to_int32(num(right)) as u32 & 31);
            RemoteValue::Number(f64::from(shifted))
        }
        BinaryOp::In | BinaryOp::Instanceof => return Err(unsupported()),
    };
    Ok(value)
}

fn int_op(left: &RemoteValue, right: &RemoteValue, heap: &Heap, op: impl Fn(i32, i32) -> i32) -> RemoteValue {
    let a = to_int32(to_number(left, heap));
    let b = to_int32(to_number(right, heap));
    RemoteValue::Number(f64::from(op(a, b)))
}

fn to_int32(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    (value.trunc() as i64 & 0xFFFF_FFFF) as u32 as i32
}

fn strict_equals(left: &RemoteValue, right: &RemoteValue) -> bool {
    match (left, right) {
        (RemoteValue::Undefined, RemoteValue::Undefined) | (RemoteValue::Null, RemoteValue::Null) => true,
        (RemoteValue::Bool(a), RemoteValue::Bool(b)) => a == b,
        (RemoteValue::Number(a), RemoteValue::Number(b)) => a == b,
        (RemoteValue::String(a), RemoteValue::String(b)) => a == b,
        (RemoteValue::Object { id: a, .. }, RemoteValue::Object { id: b, .. }) => a == b,
        _ => false,
    }
}

fn loose_equals(left: &RemoteValue, right: &RemoteValue, heap: &Heap) -> bool {
    let nullish = |value: &RemoteValue| matches!(value, RemoteValue::Undefined | RemoteValue::Null);
    if nullish(left) || nullish(right) {
        return nullish(left) && nullish(right);
    }
    match (left, right) {
        (RemoteValue::String(a), RemoteValue::String(b)) => a == b,
        (RemoteValue::Object { .. }, RemoteValue::Object { .. }) => strict_equals(left, right),
        _ => to_number(left, heap) == to_number(right, heap),
    }
}

pub(crate) fn to_number(value: &RemoteValue, heap: &Heap) -> f64 {
    match value {
        RemoteValue::Undefined => f64::NAN,
        RemoteValue::Null => 0.0,
        RemoteValue::Bool(value) => f64::from(u8::from(*value)),
        RemoteValue::Number(value) => *value,
        RemoteValue::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                0.0
            } else {
                text.parse().unwrap_or(f64::NAN)
            }
        }
        RemoteValue::Object { .. } => to_string(value, heap).parse().unwrap_or(f64::NAN),
    }
}

pub(crate) fn to_string(value: &RemoteValue, heap: &Heap) -> String {
    match value {
        RemoteValue::Undefined => "undefined".to_string(),
        RemoteValue::Null => "null".to_string(),
        RemoteValue::Bool(value) => value.to_string(),
        RemoteValue::Number(value) => format_number(*value),
        RemoteValue::String(text) => text.clone(),
        RemoteValue::Object { id, .. } if heap.is_array(*id) => heap
            .keys(*id)
            .iter()
            .map(|key| match heap.slot(*id, key) {
                Some(Slot::Value(RemoteValue::Undefined | RemoteValue::Null)) | None => String::new(),
                Some(Slot::Value(item)) => to_string(item, heap),
                Some(_) => String::new(),
            })
            .collect::<Vec<_>>()
            .join(","),
        RemoteValue::Object { .. } => "[object Object]".to_string(),
    }
}

fn stringify(value: &RemoteValue, heap: &Heap, depth: usize) -> String {
    match value {
        RemoteValue::Undefined | RemoteValue::Null => "null".to_string(),
        RemoteValue::Number(n) if !n.is_finite() => "null".to_string(),
        RemoteValue::String(text) => serde_json::to_string(text).unwrap_or_default(),
        RemoteValue::Object { id, .. } if depth < 8 => {
            let entries = heap.keys(*id).into_iter().filter_map(|key| match heap.slot(*id, &key) {
                Some(Slot::Value(item)) => Some((key, stringify(item, heap, depth + 1))),
                _ => None,
            });
            if heap.is_array(*id) {
                let items: Vec<String> = entries.map(|(_, item)| item).collect();
                format!("[{}]", items.join(","))
            } else {
                let items: Vec<String> = entries
                    .map(|(key, item)| format!("{}:{item}", serde_json::to_string(&key).unwrap_or_default()))
                    .collect();
                format!("{{{}}}", items.join(","))
            }
        }
        RemoteValue::Object { .. } => "null".to_string(),
        other => to_string(other, heap),
    }
}
