//! Token definitions for the watch/condition expression language.
//!
//! The language is the expression subset of JavaScript. Statement keywords are
//! still tokenized so the validator can name the construct it rejects instead
//! of reporting a bare syntax error.

use logos::Logos;

fn lex_block_comment(lex: &mut logos::Lexer<TokenKind>) -> bool {
    let bytes = lex.remainder().as_bytes();
    let mut i = 0usize;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            lex.bump(i + 2);
            return true;
        }
        i += 1;
    }
    lex.bump(bytes.len());
    false
}

fn lex_template(lex: &mut logos::Lexer<TokenKind>) -> bool {
    let bytes = lex.remainder().as_bytes();
    match scan_template(bytes) {
        Some(len) => {
            lex.bump(len);
            true
        }
        None => {
            lex.bump(bytes.len());
            false
        }
    }
}

/// Templates nested deeper than this inside substitutions do not lex.
const MAX_TEMPLATE_NESTING: u32 = 128;

/// Scan a template body starting right after the opening backtick.
///
/// Returns the number of bytes up to and including the closing backtick.
pub(crate) fn scan_template(bytes: &[u8]) -> Option<usize> {
    scan_template_nested(bytes, 0)
}

/// Scan a `${ ... }` substitution body; returns the index after the closing brace.
pub(crate) fn scan_substitution(bytes: &[u8], start: usize) -> Option<usize> {
    scan_substitution_nested(bytes, start, 0)
}

fn scan_template_nested(bytes: &[u8], depth: u32) -> Option<usize> {
    if depth > MAX_TEMPLATE_NESTING {
        return None;
    }
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Some(i + 1),
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                i = scan_substitution_nested(bytes, i + 2, depth)?;
            }
            _ => i += 1,
        }
    }
    None
}

fn scan_substitution_nested(bytes: &[u8], start: usize, depth: u32) -> Option<usize> {
    let mut braces = 1usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => braces += 1,
            b'}' => {
                braces -= 1;
                if braces == 0 {
                    return Some(i + 1);
                }
            }
            b'\'' | b'"' => {
                i = scan_quoted(bytes, i)?;
                continue;
            }
            b'`' => {
                i = i + 1 + scan_template_nested(&bytes[i + 1..], depth + 1)?;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn scan_quoted(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            byte if byte == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// All token kinds of the expression language.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u16)]
pub enum TokenKind {
    // =========================================================================
    // TRIVIA
    // =========================================================================
    /// Whitespace (spaces, tabs, newlines)
    #[regex(r"[ \t\r\n\f\v]+")]
    Whitespace,

    /// `// ...`
    #[regex(r"//[^\r\n]*", allow_greedy = true)]
    LineComment,

    /// `/* ... */` (no nesting)
    #[token("/*", lex_block_comment)]
    BlockComment,

    // =========================================================================
    // PUNCTUATION
    // =========================================================================
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("?")]
    Question,
    #[token("?.")]
    QuestionDot,
    #[token("=>")]
    Arrow,

    // =========================================================================
    // OPERATORS
    // =========================================================================
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    StarStar,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("===")]
    EqEqEq,
    #[token("!==")]
    NotEqEq,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("??")]
    QuestionQuestion,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token(">>>")]
    UShr,

    /// `=`
    #[token("=")]
    Eq,
    /// Compound assignment (`+=`, `&&=`, ...). Never valid in a condition.
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("**=")]
    #[token("<<=")]
    #[token(">>=")]
    #[token(">>>=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token("&&=")]
    #[token("||=")]
    #[token("??=")]
    CompoundAssign,

    // =========================================================================
    // KEYWORDS
    // =========================================================================
    #[token("true")]
    KwTrue,
    #[token("false")]
    KwFalse,
    #[token("null")]
    KwNull,
    #[token("this")]
    KwThis,
    #[token("typeof")]
    KwTypeof,
    #[token("void")]
    KwVoid,
    #[token("delete")]
    KwDelete,
    #[token("new")]
    KwNew,
    #[token("in")]
    KwIn,
    #[token("instanceof")]
    KwInstanceof,
    #[token("function")]
    KwFunction,
    #[token("class")]
    KwClass,
    #[token("super")]
    KwSuper,
    #[token("await")]
    KwAwait,
    #[token("yield")]
    KwYield,
    #[token("var")]
    KwVar,
    #[token("let")]
    KwLet,
    #[token("const")]
    KwConst,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("for")]
    KwFor,
    #[token("while")]
    KwWhile,
    #[token("do")]
    KwDo,
    #[token("switch")]
    KwSwitch,
    #[token("case")]
    KwCase,
    #[token("return")]
    KwReturn,
    #[token("throw")]
    KwThrow,
    #[token("try")]
    KwTry,
    #[token("catch")]
    KwCatch,
    #[token("finally")]
    KwFinally,
    #[token("debugger")]
    KwDebugger,
    #[token("break")]
    KwBreak,
    #[token("continue")]
    KwContinue,
    #[token("with")]
    KwWith,
    #[token("import")]
    KwImport,
    #[token("export")]
    KwExport,

    // =========================================================================
    // LITERALS
    // =========================================================================
    /// Decimal, hex, octal or binary number.
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?")]
    #[regex(r"0[xX][0-9a-fA-F]+")]
    #[regex(r"0[oO][0-7]+")]
    #[regex(r"0[bB][01]+")]
    Number,

    /// Single or double quoted string.
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r"'([^'\\\n]|\\.)*'")]
    String,

    /// Full template literal including substitutions; split by the parser.
    #[token("`", lex_template)]
    Template,

    /// Identifier.
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*")]
    Ident,

    /// Unrecognized input.
    #[default]
    Error,

    /// End of input (synthesized by the parser).
    Eof,
}

impl TokenKind {
    /// Returns `true` for whitespace and comments.
    #[must_use]
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            Self::Whitespace | Self::LineComment | Self::BlockComment
        )
    }

    /// Returns `true` if the keyword starts a statement that has no expression form.
    #[must_use]
    pub fn is_statement_keyword(self) -> bool {
        matches!(
            self,
            Self::KwVar
                | Self::KwLet
                | Self::KwConst
                | Self::KwIf
                | Self::KwFor
                | Self::KwWhile
                | Self::KwDo
                | Self::KwSwitch
                | Self::KwReturn
                | Self::KwThrow
                | Self::KwTry
                | Self::KwDebugger
                | Self::KwBreak
                | Self::KwContinue
                | Self::KwWith
                | Self::KwImport
                | Self::KwExport
        )
    }

    /// Returns `true` for reserved words (usable as property names after `.`).
    #[must_use]
    pub fn is_keyword(self) -> bool {
        (self as u16) >= (Self::KwTrue as u16) && (self as u16) <= (Self::KwExport as u16)
    }
}
