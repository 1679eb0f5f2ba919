//! Syntax tree for the expression language.
//!
//! The tree is deliberately wider than what the validator accepts: the parser
//! recognizes assignments, `new`, functions and friends so the validator can
//! reject them by name.

use std::fmt;

use smol_str::SmolStr;
use text_size::TextRange;

/// Parsed source: a sequence of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// Top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// An expression followed by an optional `;`.
    Expression(Expr),
    /// A lone `;`.
    Empty,
    /// A statement with no expression form (`while`, `throw`, `{ ... }` ...).
    ///
    /// The parser does not descend into these; the keyword and the range of
    /// the remaining input are enough to reject them.
    Other { keyword: SmolStr, range: TextRange },
}

/// Literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(SmolStr),
    Bool(bool),
    Null,
}

/// Prefix unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
    Typeof,
    Void,
    Delete,
    Await,
}

/// `++` / `--`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

/// Binary operators (arithmetic, comparison, bitwise, relational).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
    Instanceof,
}

/// Short-circuiting operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

/// Property key in an object literal.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Name(SmolStr),
    Computed(Box<Expr>),
}

/// Object literal entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    KeyValue { key: PropertyKey, value: Expr },
    Spread(Expr),
}

/// Member access target.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberProperty {
    Name(SmolStr),
    Computed(Box<Expr>),
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident(SmolStr),
    This,
    Super,
    Template {
        quasis: Vec<SmolStr>,
        exprs: Vec<Expr>,
    },
    TaggedTemplate {
        tag: Box<Expr>,
        quasi: Box<Expr>,
    },
    Array(Vec<Option<Expr>>),
    Object(Vec<Property>),
    Spread(Box<Expr>),
    Member {
        object: Box<Expr>,
        property: MemberProperty,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Sequence(Vec<Expr>),
    /// `function` expressions and arrow functions; bodies are not kept.
    Function,
    /// `class` expressions; bodies are not kept.
    Class,
    Yield(Option<Box<Expr>>),
}

impl Expr {
    /// Returns the dotted path of a plain member chain (`Math.max` → `Math.max`).
    #[must_use]
    pub fn dotted_path(&self) -> Option<String> {
        match self {
            Expr::Ident(name) => Some(name.to_string()),
            Expr::Member {
                object,
                property: MemberProperty::Name(name),
                optional: false,
            } => object.dotted_path().map(|base| format!("{base}.{name}")),
            _ => None,
        }
    }
}

impl UnaryOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::BitNot => "~",
            UnaryOp::Typeof => "typeof",
            UnaryOp::Void => "void",
            UnaryOp::Delete => "delete",
            UnaryOp::Await => "await",
        }
    }
}

impl BinaryOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Exp => "**",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::In => "in",
            BinaryOp::Instanceof => "instanceof",
        }
    }
}

impl LogicalOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
            LogicalOp::Nullish => "??",
        }
    }
}

// S-expression rendering, used by tests and debug logging.

fn write_list(f: &mut fmt::Formatter<'_>, head: &str, items: &[Expr]) -> fmt::Result {
    write!(f, "({head}")?;
    for item in items {
        write!(f, " {item}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(value) => write!(f, "{value}"),
            Literal::String(value) => write!(f, "{value:?}"),
            Literal::Bool(value) => write!(f, "{value}"),
            Literal::Null => write!(f, "null"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(literal) => write!(f, "{literal}"),
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::This => write!(f, "this"),
            Expr::Super => write!(f, "super"),
            Expr::Template { quasis, exprs } => {
                write!(f, "(template")?;
                for (idx, quasi) in quasis.iter().enumerate() {
                    write!(f, " {quasi:?}")?;
                    if let Some(expr) = exprs.get(idx) {
                        write!(f, " {expr}")?;
                    }
                }
                write!(f, ")")
            }
            Expr::TaggedTemplate { tag, quasi } => write!(f, "(tagged {tag} {quasi})"),
            Expr::Array(items) => {
                write!(f, "(array")?;
                for item in items {
                    match item {
                        Some(item) => write!(f, " {item}")?,
                        None => write!(f, " <hole>")?,
                    }
                }
                write!(f, ")")
            }
            Expr::Object(props) => {
                write!(f, "(object")?;
                for prop in props {
                    match prop {
                        Property::KeyValue {
                            key: PropertyKey::Name(name),
                            value,
                        } => write!(f, " ({name} {value})")?,
                        Property::KeyValue {
                            key: PropertyKey::Computed(key),
                            value,
                        } => write!(f, " ([{key}] {value})")?,
                        Property::Spread(expr) => write!(f, " (... {expr})")?,
                    }
                }
                write!(f, ")")
            }
            Expr::Spread(expr) => write!(f, "(... {expr})"),
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let head = if *optional { "?." } else { "." };
                match property {
                    MemberProperty::Name(name) => write!(f, "({head} {object} {name})"),
                    MemberProperty::Computed(expr) => write!(f, "({head} {object} [{expr}])"),
                }
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                write!(f, "({} {callee}", if *optional { "call?" } else { "call" })?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
            Expr::New { callee, args } => {
                write!(f, "(new {callee}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
            Expr::Unary { op, expr } => write!(f, "({} {expr})", op.as_str()),
            Expr::Update { op, prefix, expr } => {
                let op = match op {
                    UpdateOp::Increment => "++",
                    UpdateOp::Decrement => "--",
                };
                if *prefix {
                    write!(f, "({op}prefix {expr})")
                } else {
                    write!(f, "({op}postfix {expr})")
                }
            }
            Expr::Binary { op, left, right } => write!(f, "({} {left} {right})", op.as_str()),
            Expr::Logical { op, left, right } => write!(f, "({} {left} {right})", op.as_str()),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => write!(f, "(? {test} {consequent} {alternate})"),
            Expr::Assign { target, value } => write!(f, "(= {target} {value})"),
            Expr::Sequence(items) => write_list(f, ",", items),
            Expr::Function => write!(f, "(function)"),
            Expr::Class => write!(f, "(class)"),
            Expr::Yield(Some(expr)) => write!(f, "(yield {expr})"),
            Expr::Yield(None) => write!(f, "(yield)"),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, statement) in self.statements.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            match statement {
                Statement::Expression(expr) => write!(f, "{expr}")?,
                Statement::Empty => write!(f, "(empty)")?,
                Statement::Other { keyword, .. } => write!(f, "(statement {keyword})")?,
            }
        }
        Ok(())
    }
}
