//! Error types for all toolchain phases.

use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("Unterminated string at {0}")]
    UnterminatedString(Span),

    #[error("Invalid escape sequence '\\{0}' at {1}")]
    InvalidEscape(char, Span),

    #[error("Invalid number '{0}' at {1}")]
    InvalidNumber(String, Span),
}

impl LexerError {
    pub fn unexpected_char(c: char, span: Span) -> Self {
        Self::UnexpectedChar(c, span)
    }

    pub fn unterminated_string(span: Span) -> Self {
        Self::UnterminatedString(span)
    }

    pub fn invalid_escape(c: char, span: Span) -> Self {
        Self::InvalidEscape(c, span)
    }

    pub fn invalid_number(s: String, span: Span) -> Self {
        Self::InvalidNumber(s, span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
            Self::InvalidEscape(_, span) => *span,
            Self::InvalidNumber(_, span) => *span,
        }
    }
}

/// Parser errors.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Unexpected token '{found}', expected {expected} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unexpected end of file at {0}")]
    UnexpectedEof(Span),

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn unexpected_eof(span: Span) -> Self {
        Self::UnexpectedEof(span)
    }

    pub fn general(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::UnexpectedEof(span) => *span,
            Self::General { span, .. } => *span,
        }
    }
}

impl From<LexerError> for ParserError {
    fn from(err: LexerError) -> Self {
        Self::General {
            message: err.to_string(),
            span: err.span(),
        }
    }
}

/// Name and type resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Undefined variable '{0}' at {1}")]
    UndefinedVariable(String, Span),

    #[error("Undefined type '{0}' at {1}")]
    UndefinedType(String, Span),

    #[error("Unknown constructor '{0}' at {1}")]
    UnknownConstructor(String, Span),

    #[error("No implementation of '{interface}' for type '{type_name}' at {span}")]
    MissingImplementation {
        interface: String,
        type_name: String,
        span: Span,
    },

    #[error("Wrong number of arguments: expected {expected}, got {got} at {span}")]
    WrongArity {
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl ResolveError {
    pub fn general(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn missing_implementation(
        interface: impl Into<String>,
        type_name: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::MissingImplementation {
            interface: interface.into(),
            type_name: type_name.into(),
            span,
        }
    }

    pub fn wrong_arity(expected: usize, got: usize, span: Span) -> Self {
        Self::WrongArity {
            expected,
            got,
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UndefinedVariable(_, span) => *span,
            Self::UndefinedType(_, span) => *span,
            Self::UnknownConstructor(_, span) => *span,
            Self::MissingImplementation { span, .. } => *span,
            Self::WrongArity { span, .. } => *span,
            Self::General { span, .. } => *span,
        }
    }
}

/// Bytecode generation errors. Any of these aborts generation.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Unresolved identifier '{0}' at {1}")]
    Unresolved(String, Span),

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl GenerateError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Unresolved(_, span) => *span,
            Self::General { span, .. } => *span,
        }
    }
}

/// Violations of the serialized bytecode format. Offsets are byte offsets
/// into the stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unexpected end of stream at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("Expected section header at offset {offset}")]
    MissingHeader { offset: usize },

    #[error("Unknown opcode {word} at offset {offset}")]
    UnknownOpcode { word: i64, offset: usize },

    #[error("Unterminated string at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("Invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("String id {id} out of range at offset {offset}")]
    BadStringId { id: i64, offset: usize },

    #[error("Function id {id} out of range at offset {offset}")]
    BadFunctionId { id: i64, offset: usize },

    #[error("Invalid operand {value} at offset {offset}")]
    BadOperand { value: i64, offset: usize },

    #[error("Jump target {target} outside the stream at offset {offset}")]
    BadJumpTarget { target: i64, offset: usize },
}

impl FormatError {
    pub fn offset(&self) -> usize {
        match self {
            Self::UnexpectedEof { offset }
            | Self::MissingHeader { offset }
            | Self::UnknownOpcode { offset, .. }
            | Self::UnterminatedString { offset }
            | Self::InvalidUtf8 { offset }
            | Self::BadStringId { offset, .. }
            | Self::BadFunctionId { offset, .. }
            | Self::BadOperand { offset, .. }
            | Self::BadJumpTarget { offset, .. } => *offset,
        }
    }
}

/// Runtime faults. Execution halts on the first one; `ip` is the byte offset
/// of the faulting instruction.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Division by zero at ip {ip}")]
    DivisionByZero { ip: usize },

    #[error("Undefined name '{name}' at ip {ip}")]
    UndefinedName { name: String, ip: usize },

    #[error("Cannot call non-function value of type {found} at ip {ip}")]
    NotCallable { found: &'static str, ip: usize },

    #[error("Wrong number of arguments: expected {expected}, got {got} at ip {ip}")]
    WrongArity {
        expected: usize,
        got: usize,
        ip: usize,
    },

    #[error("Type error: expected {expected}, found {found} at ip {ip}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
        ip: usize,
    },

    #[error("Index out of bounds: {index} (length {length}) at ip {ip}")]
    IndexOutOfBounds {
        index: i64,
        length: usize,
        ip: usize,
    },

    #[error("Operand stack underflow at ip {ip}")]
    StackUnderflow { ip: usize },

    #[error("Operand stack overflow (limit {limit}) at ip {ip}")]
    StackOverflow { limit: usize, ip: usize },

    #[error("Call depth exceeded (limit {limit}) at ip {ip}")]
    FrameOverflow { limit: usize, ip: usize },

    #[error("Heap limit of {limit} objects exceeded at ip {ip}")]
    HeapExhausted { limit: usize, ip: usize },

    #[error("Stack slot {slot} out of bounds at ip {ip}")]
    SlotOutOfBounds { slot: i64, ip: usize },

    #[error("Invalid heap handle {handle} at ip {ip}")]
    BadHandle { handle: u32, ip: usize },

    #[error("Stack slots unbalanced on return: {leaked} slot(s) still allocated at ip {ip}")]
    UnbalancedSlots { leaked: usize, ip: usize },

    #[error("No case matched at ip {ip}")]
    MatchFailed { ip: usize },

    #[error("Malformed bytecode: {0}")]
    Format(#[from] FormatError),

    #[error("{message} at ip {ip}")]
    General { message: String, ip: usize },
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, ip: usize) -> Self {
        Self::General {
            message: message.into(),
            ip,
        }
    }

    pub fn type_mismatch(expected: &'static str, found: &'static str, ip: usize) -> Self {
        Self::TypeMismatch {
            expected,
            found,
            ip,
        }
    }

    pub fn wrong_arity(expected: usize, got: usize, ip: usize) -> Self {
        Self::WrongArity { expected, got, ip }
    }
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum VerveError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Generate error: {0}")]
    Generate(#[from] GenerateError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
