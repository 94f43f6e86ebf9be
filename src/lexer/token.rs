//! Token definitions for the Verve lexer.

use std::fmt;

use crate::span::Span;

/// All token types in Verve.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),
    Identifier(String),

    // Keywords
    Let,
    Fn,
    If,
    Else,
    Match,
    Enum,
    Interface,
    Implementation,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Bang,
    And,
    Or,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Semicolon,
    Arrow,
    FatArrow,

    Eof,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("let", TokenKind::Let),
    ("fn", TokenKind::Fn),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("match", TokenKind::Match),
    ("enum", TokenKind::Enum),
    ("interface", TokenKind::Interface),
    ("implementation", TokenKind::Implementation),
    ("true", TokenKind::BoolLiteral(true)),
    ("false", TokenKind::BoolLiteral(false)),
];

/// Operators and delimiters, two-character spellings first so that a scan
/// in table order finds the longest match.
pub const SYMBOLS: &[(&str, TokenKind)] = &[
    ("->", TokenKind::Arrow),
    ("=>", TokenKind::FatArrow),
    ("==", TokenKind::EqualEqual),
    ("!=", TokenKind::BangEqual),
    ("<=", TokenKind::LessEqual),
    (">=", TokenKind::GreaterEqual),
    ("&&", TokenKind::And),
    ("||", TokenKind::Or),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("=", TokenKind::Equal),
    ("<", TokenKind::Less),
    (">", TokenKind::Greater),
    ("!", TokenKind::Bang),
    ("(", TokenKind::LeftParen),
    (")", TokenKind::RightParen),
    ("{", TokenKind::LeftBrace),
    ("}", TokenKind::RightBrace),
    ("[", TokenKind::LeftBracket),
    ("]", TokenKind::RightBracket),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    (";", TokenKind::Semicolon),
];

impl TokenKind {
    /// The keyword (or boolean literal) spelled `ident`, if any.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        KEYWORDS
            .iter()
            .find(|(text, _)| *text == ident)
            .map(|(_, kind)| kind.clone())
    }

    /// Fixed spelling of a keyword, operator or delimiter.
    pub fn lexeme(&self) -> Option<&'static str> {
        KEYWORDS
            .iter()
            .chain(SYMBOLS)
            .find(|(_, kind)| kind == self)
            .map(|(text, _)| *text)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::IntLiteral(n) => write!(f, "{}", n),
            TokenKind::FloatLiteral(x) => write!(f, "{}", x),
            TokenKind::StringLiteral(s) => write!(f, "{:?}", s),
            TokenKind::Identifier(name) => f.write_str(name),
            TokenKind::Eof => f.write_str("EOF"),
            other => f.write_str(other.lexeme().unwrap_or("?")),
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(position: usize, line: usize, column: usize) -> Self {
        Self::new(TokenKind::Eof, Span::new(position, position, line, column))
    }
}
