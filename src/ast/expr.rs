//! Expression AST nodes.

use crate::ast::stmt::{Block, FunctionDecl};
use crate::span::Span;

/// Identity of a parameter or local binding. Unique across a program,
/// including every specialized copy of a generic function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u32);

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// What an identifier refers to, filled in by the resolver.
///
/// `depth` counts the function boundaries between the reference and the
/// declaration: zero means the binding belongs to the function the
/// reference appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    Unresolved,
    Param {
        binding: BindingId,
        index: usize,
        depth: usize,
    },
    Local {
        binding: BindingId,
        depth: usize,
    },
    /// Top-level function, top-level let, implementation or instance.
    Global,
    Builtin,
}

/// A name reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub resolution: Resolution,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolution: Resolution::Unresolved,
        }
    }
}

/// Which family of arithmetic or comparison opcodes an operator lowers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericKind {
    #[default]
    Int,
    Float,
}

/// All expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal: 42
    IntLiteral(i64),
    /// Float literal: 3.14
    FloatLiteral(f64),
    /// String literal: "hello"
    StringLiteral(String),
    /// Boolean literal: true, false
    BoolLiteral(bool),
    /// Unit literal: ()
    Unit,

    /// Name reference: foo
    Identifier(Identifier),

    /// Binary operation: a + b
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
        numeric: NumericKind,
    },

    /// Unary operation: -x, !x
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
        numeric: NumericKind,
    },

    /// Logical and: a && b
    LogicalAnd { left: Box<Expr>, right: Box<Expr> },

    /// Logical or: a || b
    LogicalOr { left: Box<Expr>, right: Box<Expr> },

    /// Function call: foo(a, b)
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },

    /// Data constructor application. Produced by the resolver from a call or
    /// identifier naming an enum constructor.
    Constructor {
        name: String,
        arguments: Vec<Expr>,
        tag: u32,
        size: usize,
    },

    /// List literal: [1, 2, 3]
    List(Vec<Expr>),

    /// Conditional: if cond { a } else { b }
    If {
        condition: Box<Expr>,
        then_branch: Block,
        else_branch: Option<Box<Expr>>,
    },

    /// Pattern matching: match x { Some(y) => y, _ => 0 }
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
    },

    /// Anonymous function: fn (x: Int) -> Int { x }
    Function(Box<FunctionDecl>),

    /// Block expression: { statements }
    Block(Block),
}

/// A single arm of a match expression.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Expr,
    pub span: Span,
}

/// Match patterns.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// `_`: matches anything.
    Wildcard,
    /// `Name(a, b)`: tests the constructor tag and binds fields by position.
    Constructor {
        name: String,
        bindings: Vec<PatternBinding>,
        tag: u32,
        size: usize,
    },
}

impl Pattern {
    /// Field bindings in position order; none for a wildcard.
    pub fn bindings(&self) -> impl Iterator<Item = &PatternBinding> {
        let fields: &[PatternBinding] = match self {
            Pattern::Wildcard => &[],
            Pattern::Constructor { bindings, .. } => bindings,
        };
        fields.iter()
    }
}

/// A name bound to one field of a constructor pattern. `_` binds nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternBinding {
    pub name: String,
    pub binding: Option<BindingId>,
    pub span: Span,
}

impl PatternBinding {
    pub fn is_ignored(&self) -> bool {
        self.name == "_"
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
        )
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        };
        write!(f, "{}", symbol)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Negate => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}
