//! Tokens and source positions.

use std::fmt;

/// A line/column position, 1-indexed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The kind of a token.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // === sections and keywords ===
    Module,
    Var,
    Const,
    Define,
    Init,
    Trans,
    Invar,
    Boolean,
    Unsigned,
    Signed,
    Int,
    Fxd,
    Next,
    Prev,
    True,
    False,
    XorKw,
    XnorKw,

    // === literals ===
    Ident(String),
    Number(u64),

    // === punctuation ===
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    ColonEq,
    Semi,
    Dot,
    Question,

    // === operators ===
    Bang,
    Amp,
    Pipe,
    Arrow,
    DArrow,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Eof,
}

impl TokenKind {
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        Some(match ident {
            "MODULE" => TokenKind::Module,
            "VAR" => TokenKind::Var,
            "CONST" => TokenKind::Const,
            "DEFINE" => TokenKind::Define,
            "INIT" => TokenKind::Init,
            "TRANS" => TokenKind::Trans,
            "INVAR" => TokenKind::Invar,
            "boolean" => TokenKind::Boolean,
            "unsigned" => TokenKind::Unsigned,
            "signed" => TokenKind::Signed,
            "int" => TokenKind::Int,
            "fxd" => TokenKind::Fxd,
            "next" => TokenKind::Next,
            "prev" => TokenKind::Prev,
            "TRUE" => TokenKind::True,
            "FALSE" => TokenKind::False,
            "xor" => TokenKind::XorKw,
            "xnor" => TokenKind::XnorKw,
            _ => return None,
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Ident(n) => return write!(f, "`{n}`"),
            TokenKind::Number(v) => return write!(f, "`{v}`"),
            TokenKind::Module => "MODULE",
            TokenKind::Var => "VAR",
            TokenKind::Const => "CONST",
            TokenKind::Define => "DEFINE",
            TokenKind::Init => "INIT",
            TokenKind::Trans => "TRANS",
            TokenKind::Invar => "INVAR",
            TokenKind::Boolean => "boolean",
            TokenKind::Unsigned => "unsigned",
            TokenKind::Signed => "signed",
            TokenKind::Int => "int",
            TokenKind::Fxd => "fxd",
            TokenKind::Next => "next",
            TokenKind::Prev => "prev",
            TokenKind::True => "TRUE",
            TokenKind::False => "FALSE",
            TokenKind::XorKw => "xor",
            TokenKind::XnorKw => "xnor",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::ColonEq => ":=",
            TokenKind::Semi => ";",
            TokenKind::Dot => ".",
            TokenKind::Question => "?",
            TokenKind::Bang => "!",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Arrow => "->",
            TokenKind::DArrow => "<->",
            TokenKind::Eq => "=",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Eof => "end of input",
        };
        write!(f, "`{s}`")
    }
}

/// A token with its source position.
#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}
