//! Recursive-descent parser for the expression language.
//!
//! Binary operators use precedence climbing. Constructs that are parsed only
//! to be rejected (function bodies, class bodies, statements) are skipped by
//! bracket matching rather than parsed in full.

use smol_str::SmolStr;
use text_size::{TextRange, TextSize};
use thiserror::Error;

use crate::ast::{
    BinaryOp, Expr, Literal, LogicalOp, MemberProperty, Program, Property, PropertyKey, Statement,
    UnaryOp, UpdateOp,
};
use crate::lexer::{scan_substitution, Lexer, Token, TokenKind};

/// Syntax error with a 1-based line and 0-based column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({line}:{column})")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub range: TextRange,
}

/// Parse a full source (one or more statements).
pub fn parse(source: &str) -> Result<Program, ParseError> {
    Parser::new(source, 0, source.len()).program()
}

/// Parse a source that must consist of exactly one expression.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    Parser::new(source, 0, source.len()).whole_expression()
}

/// Nesting limit for recursive constructs; deeper sources are rejected.
pub const MAX_NESTING_DEPTH: u32 = 128;

enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    depth: u32,
}

impl<'src> Parser<'src> {
    /// Parser over `source[start..end]`; token ranges stay relative to `source`.
    fn new(source: &'src str, start: usize, end: usize) -> Self {
        let offset = TextSize::from(start as u32);
        let mut tokens: Vec<Token> = Lexer::new(&source[start..end])
            .filter(|token| !token.kind.is_trivia())
            .map(|token| Token::new(token.kind, token.range + offset))
            .collect();
        let eof = TextSize::from(end as u32);
        tokens.push(Token::new(TokenKind::Eof, TextRange::new(eof, eof)));
        Self {
            source,
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn peek_nth(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map_or(TokenKind::Eof, |token| token.kind)
    }

    fn current(&self) -> Token {
        self.tokens[self.pos]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos];
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(self.current()))
        }
    }

    fn text(&self, token: Token) -> &'src str {
        &self.source[usize::from(token.range.start())..usize::from(token.range.end())]
    }

    fn error_at(&self, range: TextRange, message: impl Into<String>) -> ParseError {
        let (line, column) = line_col(self.source, usize::from(range.start()));
        ParseError {
            message: message.into(),
            line,
            column,
            range,
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error_at(self.current().range, "Expression nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn unexpected(&self, token: Token) -> ParseError {
        let message = if token.kind == TokenKind::Error {
            match self.text(token).chars().next() {
                Some('"' | '\'') => "Unterminated string constant",
                Some('`') => "Unterminated template",
                Some('/') => "Unterminated comment",
                _ => "Unexpected character",
            }
        } else {
            "Unexpected token"
        };
        self.error_at(token.range, message)
    }

    fn program(mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        while !self.at(TokenKind::Eof) {
            let kind = self.peek();
            if kind == TokenKind::Semicolon {
                self.bump();
                statements.push(Statement::Empty);
                continue;
            }
            if kind.is_statement_keyword()
                || matches!(
                    kind,
                    TokenKind::LBrace | TokenKind::KwFunction | TokenKind::KwClass
                )
            {
                let token = self.bump();
                let keyword = match kind {
                    TokenKind::LBrace => SmolStr::new_static("block"),
                    _ => SmolStr::new(self.text(token)),
                };
                let end = self.tokens[self.tokens.len() - 1].range.end();
                statements.push(Statement::Other {
                    keyword,
                    range: TextRange::new(token.range.start(), end),
                });
                self.pos = self.tokens.len() - 1;
                break;
            }
            let expr = self.expression()?;
            statements.push(Statement::Expression(expr));
            if !self.eat(TokenKind::Semicolon) && !self.at(TokenKind::Eof) {
                return Err(self.unexpected(self.current()));
            }
        }
        Ok(Program { statements })
    }

    fn whole_expression(mut self) -> Result<Expr, ParseError> {
        if self.at(TokenKind::Eof) {
            return Err(self.unexpected(self.current()));
        }
        let expr = self.expression()?;
        if !self.at(TokenKind::Eof) {
            return Err(self.unexpected(self.current()));
        }
        Ok(expr)
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        let first = self.assignment()?;
        if !self.at(TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            items.push(self.assignment()?);
        }
        Ok(Expr::Sequence(items))
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::assignment_expr)
    }

    fn assignment_expr(&mut self) -> Result<Expr, ParseError> {
        if self.eat(TokenKind::KwYield) {
            if starts_expression(self.peek()) {
                let arg = self.assignment()?;
                return Ok(Expr::Yield(Some(Box::new(arg))));
            }
            return Ok(Expr::Yield(None));
        }
        let left = self.conditional()?;
        match self.peek() {
            TokenKind::Eq | TokenKind::CompoundAssign => {
                self.bump();
                let value = self.assignment()?;
                Ok(Expr::Assign {
                    target: Box::new(left),
                    value: Box::new(value),
                })
            }
            TokenKind::Arrow => {
                self.bump();
                if self.at(TokenKind::LBrace) {
                    self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace)?;
                } else {
                    self.assignment()?;
                }
                Ok(Expr::Function)
            }
            _ => Ok(left),
        }
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.binary(1)?;
        if !self.eat(TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect(TokenKind::Colon)?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let kind = self.peek();
            let Some((prec, infix)) = infix_operator(kind) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.bump();
            let next_min = if kind == TokenKind::StarStar {
                prec
            } else {
                prec + 1
            };
            let right = self.nested(|parser| parser.binary(next_min))?;
            left = match infix {
                Infix::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Infix::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::KwTypeof => UnaryOp::Typeof,
            TokenKind::KwVoid => UnaryOp::Void,
            TokenKind::KwDelete => UnaryOp::Delete,
            TokenKind::KwAwait => UnaryOp::Await,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if self.bump().kind == TokenKind::PlusPlus {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                let expr = self.nested(Self::unary)?;
                return Ok(Expr::Update {
                    op,
                    prefix: true,
                    expr: Box::new(expr),
                });
            }
            _ => return self.postfix(),
        };
        self.bump();
        let expr = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let expr = self.call_member()?;
        let op = match self.peek() {
            TokenKind::PlusPlus => UpdateOp::Increment,
            TokenKind::MinusMinus => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        self.bump();
        Ok(Expr::Update {
            op,
            prefix: false,
            expr: Box::new(expr),
        })
    }

    fn call_member(&mut self) -> Result<Expr, ParseError> {
        let mut expr = if self.at(TokenKind::KwNew) {
            self.new_expression()?
        } else {
            self.primary()?
        };
        loop {
            expr = match self.peek() {
                TokenKind::Dot => {
                    self.bump();
                    let name = self.property_name()?;
                    Expr::Member {
                        object: Box::new(expr),
                        property: MemberProperty::Name(name),
                        optional: false,
                    }
                }
                TokenKind::QuestionDot => {
                    self.bump();
                    match self.peek() {
                        TokenKind::LParen => Expr::Call {
                            callee: Box::new(expr),
                            args: self.arguments()?,
                            optional: true,
                        },
                        TokenKind::LBracket => {
                            let property = self.computed_member()?;
                            Expr::Member {
                                object: Box::new(expr),
                                property,
                                optional: true,
                            }
                        }
                        _ => {
                            let name = self.property_name()?;
                            Expr::Member {
                                object: Box::new(expr),
                                property: MemberProperty::Name(name),
                                optional: true,
                            }
                        }
                    }
                }
                TokenKind::LBracket => {
                    let property = self.computed_member()?;
                    Expr::Member {
                        object: Box::new(expr),
                        property,
                        optional: false,
                    }
                }
                TokenKind::LParen => Expr::Call {
                    callee: Box::new(expr),
                    args: self.arguments()?,
                    optional: false,
                },
                TokenKind::Template => {
                    let token = self.bump();
                    let quasi = self.template(token)?;
                    Expr::TaggedTemplate {
                        tag: Box::new(expr),
                        quasi: Box::new(quasi),
                    }
                }
                _ => break,
            };
        }
        Ok(expr)
    }

    fn new_expression(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::KwNew)?;
        let mut callee = if self.at(TokenKind::KwNew) {
            self.nested(Self::new_expression)?
        } else {
            self.primary()?
        };
        loop {
            callee = match self.peek() {
                TokenKind::Dot => {
                    self.bump();
                    let name = self.property_name()?;
                    Expr::Member {
                        object: Box::new(callee),
                        property: MemberProperty::Name(name),
                        optional: false,
                    }
                }
                TokenKind::LBracket => {
                    let property = self.computed_member()?;
                    Expr::Member {
                        object: Box::new(callee),
                        property,
                        optional: false,
                    }
                }
                _ => break,
            };
        }
        let args = if self.at(TokenKind::LParen) {
            self.arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn computed_member(&mut self) -> Result<MemberProperty, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let expr = self.expression()?;
        self.expect(TokenKind::RBracket)?;
        Ok(MemberProperty::Computed(Box::new(expr)))
    }

    fn property_name(&mut self) -> Result<SmolStr, ParseError> {
        let token = self.current();
        if token.kind == TokenKind::Ident || token.kind.is_keyword() {
            self.bump();
            Ok(SmolStr::new(self.text(token)))
        } else {
            Err(self.unexpected(token))
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.at(TokenKind::RParen) {
            if self.eat(TokenKind::Ellipsis) {
                let inner = self.assignment()?;
                args.push(Expr::Spread(Box::new(inner)));
            } else {
                args.push(self.assignment()?);
            }
            if !self.at(TokenKind::RParen) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.bump();
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current();
        let expr = match token.kind {
            TokenKind::Number => {
                self.bump();
                let text = self.text(token);
                let value =
                    parse_number(text).ok_or_else(|| self.error_at(token.range, "Invalid number"))?;
                Expr::Literal(Literal::Number(value))
            }
            TokenKind::String => {
                self.bump();
                let text = self.text(token);
                let inner = &text[1..text.len() - 1];
                let value = decode_escapes(inner).ok_or_else(|| {
                    self.error_at(token.range, "Bad character escape sequence")
                })?;
                Expr::Literal(Literal::String(SmolStr::new(value)))
            }
            TokenKind::Template => {
                self.bump();
                self.template(token)?
            }
            TokenKind::KwTrue => {
                self.bump();
                Expr::Literal(Literal::Bool(true))
            }
            TokenKind::KwFalse => {
                self.bump();
                Expr::Literal(Literal::Bool(false))
            }
            TokenKind::KwNull => {
                self.bump();
                Expr::Literal(Literal::Null)
            }
            TokenKind::KwThis => {
                self.bump();
                Expr::This
            }
            TokenKind::KwSuper => {
                self.bump();
                Expr::Super
            }
            TokenKind::Ident => {
                self.bump();
                Expr::Ident(SmolStr::new(self.text(token)))
            }
            TokenKind::LParen => {
                self.bump();
                if self.at(TokenKind::RParen) && self.peek_nth(1) == TokenKind::Arrow {
                    self.bump();
                    return Ok(Expr::Sequence(Vec::new()));
                }
                let expr = self.expression()?;
                self.expect(TokenKind::RParen)?;
                expr
            }
            TokenKind::LBracket => self.array_literal()?,
            TokenKind::LBrace => self.object_literal()?,
            TokenKind::KwFunction => {
                self.bump();
                self.eat(TokenKind::Star);
                self.eat(TokenKind::Ident);
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
                self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace)?;
                Expr::Function
            }
            TokenKind::KwClass => {
                self.bump();
                while !self.at(TokenKind::LBrace) {
                    if self.at(TokenKind::Eof) {
                        return Err(self.unexpected(self.current()));
                    }
                    self.bump();
                }
                self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace)?;
                Expr::Class
            }
            _ => return Err(self.unexpected(token)),
        };
        Ok(expr)
    }

    fn array_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let mut items = Vec::new();
        while !self.at(TokenKind::RBracket) {
            if self.eat(TokenKind::Comma) {
                items.push(None);
                continue;
            }
            let item = if self.eat(TokenKind::Ellipsis) {
                Expr::Spread(Box::new(self.assignment()?))
            } else {
                self.assignment()?
            };
            items.push(Some(item));
            if !self.at(TokenKind::RBracket) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.bump();
        Ok(Expr::Array(items))
    }

    fn object_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut props = Vec::new();
        while !self.at(TokenKind::RBrace) {
            if self.eat(TokenKind::Ellipsis) {
                props.push(Property::Spread(self.assignment()?));
            } else {
                let token = self.current();
                let key = match token.kind {
                    TokenKind::LBracket => {
                        self.bump();
                        let key = self.assignment()?;
                        self.expect(TokenKind::RBracket)?;
                        PropertyKey::Computed(Box::new(key))
                    }
                    TokenKind::String => {
                        self.bump();
                        let text = self.text(token);
                        let value = decode_escapes(&text[1..text.len() - 1]).ok_or_else(|| {
                            self.error_at(token.range, "Bad character escape sequence")
                        })?;
                        PropertyKey::Name(SmolStr::new(value))
                    }
                    TokenKind::Number => {
                        self.bump();
                        let value = parse_number(self.text(token))
                            .ok_or_else(|| self.error_at(token.range, "Invalid number"))?;
                        PropertyKey::Name(SmolStr::new(value.to_string()))
                    }
                    _ => PropertyKey::Name(self.property_name()?),
                };
                let value = match self.peek() {
                    TokenKind::Colon => {
                        self.bump();
                        self.assignment()?
                    }
                    TokenKind::LParen => {
                        self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
                        self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace)?;
                        Expr::Function
                    }
                    TokenKind::Comma | TokenKind::RBrace if token.kind == TokenKind::Ident => {
                        Expr::Ident(SmolStr::new(self.text(token)))
                    }
                    _ => return Err(self.unexpected(self.current())),
                };
                props.push(Property::KeyValue { key, value });
            }
            if !self.at(TokenKind::RBrace) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.bump();
        Ok(Expr::Object(props))
    }

    fn template(&self, token: Token) -> Result<Expr, ParseError> {
        let start = usize::from(token.range.start()) + 1;
        let end = usize::from(token.range.end()) - 1;
        let body = &self.source[start..end];
        let bytes = body.as_bytes();
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        let mut current = String::new();
        let mut i = 0usize;
        while i < bytes.len() {
            if bytes[i] == b'\\' {
                let (decoded, consumed) = decode_escape(&body[i + 1..])
                    .ok_or_else(|| self.error_at(token.range, "Bad escape sequence in template"))?;
                if let Some(ch) = decoded {
                    current.push(ch);
                }
                i += 1 + consumed;
            } else if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
                let close = scan_substitution(bytes, i + 2)
                    .ok_or_else(|| self.error_at(token.range, "Unterminated template"))?;
                let mut sub = Parser::new(self.source, start + i + 2, start + close - 1);
                sub.depth = self.depth + 1;
                exprs.push(sub.whole_expression()?);
                quasis.push(SmolStr::new(std::mem::take(&mut current)));
                i = close;
            } else {
                let ch = body[i..].chars().next().unwrap_or_default();
                current.push(ch);
                i += ch.len_utf8().max(1);
            }
        }
        quasis.push(SmolStr::new(current));
        Ok(Expr::Template { quasis, exprs })
    }

    fn skip_balanced(&mut self, open: TokenKind, close: TokenKind) -> Result<(), ParseError> {
        self.expect(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            let token = self.current();
            match token.kind {
                TokenKind::Eof => return Err(self.unexpected(token)),
                kind if kind == open => depth += 1,
                kind if kind == close => depth -= 1,
                _ => {}
            }
            self.bump();
        }
        Ok(())
    }
}

fn infix_operator(kind: TokenKind) -> Option<(u8, Infix)> {
    let entry = match kind {
        TokenKind::PipePipe => (1, Infix::Logical(LogicalOp::Or)),
        TokenKind::QuestionQuestion => (1, Infix::Logical(LogicalOp::Nullish)),
        TokenKind::AmpAmp => (2, Infix::Logical(LogicalOp::And)),
        TokenKind::Pipe => (3, Infix::Binary(BinaryOp::BitOr)),
        TokenKind::Caret => (4, Infix::Binary(BinaryOp::BitXor)),
        TokenKind::Amp => (5, Infix::Binary(BinaryOp::BitAnd)),
        TokenKind::EqEq => (6, Infix::Binary(BinaryOp::Eq)),
        TokenKind::NotEq => (6, Infix::Binary(BinaryOp::NotEq)),
        TokenKind::EqEqEq => (6, Infix::Binary(BinaryOp::StrictEq)),
        TokenKind::NotEqEq => (6, Infix::Binary(BinaryOp::StrictNotEq)),
        TokenKind::Lt => (7, Infix::Binary(BinaryOp::Lt)),
        TokenKind::Gt => (7, Infix::Binary(BinaryOp::Gt)),
        TokenKind::LtEq => (7, Infix::Binary(BinaryOp::LtEq)),
        TokenKind::GtEq => (7, Infix::Binary(BinaryOp::GtEq)),
        TokenKind::KwIn => (7, Infix::Binary(BinaryOp::In)),
        TokenKind::KwInstanceof => (7, Infix::Binary(BinaryOp::Instanceof)),
        TokenKind::Shl => (8, Infix::Binary(BinaryOp::Shl)),
        TokenKind::Shr => (8, Infix::Binary(BinaryOp::Shr)),
        TokenKind::UShr => (8, Infix::Binary(BinaryOp::UShr)),
        TokenKind::Plus => (9, Infix::Binary(BinaryOp::Add)),
        TokenKind::Minus => (9, Infix::Binary(BinaryOp::Sub)),
        TokenKind::Star => (10, Infix::Binary(BinaryOp::Mul)),
        TokenKind::Slash => (10, Infix::Binary(BinaryOp::Div)),
        TokenKind::Percent => (10, Infix::Binary(BinaryOp::Rem)),
        TokenKind::StarStar => (11, Infix::Binary(BinaryOp::Exp)),
        _ => return None,
    };
    Some(entry)
}

fn starts_expression(kind: TokenKind) -> bool {
    !matches!(
        kind,
        TokenKind::Eof
            | TokenKind::RParen
            | TokenKind::RBracket
            | TokenKind::RBrace
            | TokenKind::Comma
            | TokenKind::Semicolon
            | TokenKind::Colon
    )
}

fn parse_number(text: &str) -> Option<f64> {
    let radix = |prefixes: &[&str], base: u32| {
        prefixes
            .iter()
            .find_map(|prefix| text.strip_prefix(prefix))
            .map(|digits| u64::from_str_radix(digits, base).ok().map(|v| v as f64))
    };
    if let Some(value) = radix(&["0x", "0X"], 16) {
        return value;
    }
    if let Some(value) = radix(&["0o", "0O"], 8) {
        return value;
    }
    if let Some(value) = radix(&["0b", "0B"], 2) {
        return value;
    }
    text.parse::<f64>().ok()
}

/// Decode one escape sequence; `rest` starts right after the backslash.
///
/// Returns the decoded char (`None` for line continuations) and the number of
/// bytes consumed from `rest`.
fn decode_escape(rest: &str) -> Option<(Option<char>, usize)> {
    let mut chars = rest.chars();
    let ch = chars.next()?;
    let decoded = match ch {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'v' => '\u{b}',
        '0' => '\0',
        '\n' => return Some((None, 1)),
        '\r' => {
            let consumed = if rest[1..].starts_with('\n') { 2 } else { 1 };
            return Some((None, consumed));
        }
        'x' => {
            let hex = rest.get(1..3)?;
            let code = u32::from_str_radix(hex, 16).ok()?;
            return Some((Some(char::from_u32(code)?), 3));
        }
        'u' => {
            if rest[1..].starts_with('{') {
                let close = rest.find('}')?;
                let code = u32::from_str_radix(&rest[2..close], 16).ok()?;
                return Some((Some(char::from_u32(code)?), close + 1));
            }
            let hex = rest.get(1..5)?;
            let code = u32::from_str_radix(hex, 16).ok()?;
            return Some((Some(char::from_u32(code).unwrap_or('\u{fffd}')), 5));
        }
        other => other,
    };
    Some((Some(decoded), ch.len_utf8()))
}

fn decode_escapes(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut i = 0usize;
    while i < text.len() {
        let ch = text[i..].chars().next()?;
        if ch == '\\' {
            let (decoded, consumed) = decode_escape(&text[i + 1..])?;
            if let Some(decoded) = decoded {
                out.push(decoded);
            }
            i += 1 + consumed;
        } else {
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    Some(out)
}

fn line_col(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
    let column = before[line_start..].chars().count();
    (
        u32::try_from(line).unwrap_or(u32::MAX),
        u32::try_from(column).unwrap_or(u32::MAX),
    )
}
