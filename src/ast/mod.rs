//! Abstract Syntax Tree for Verve.

pub mod expr;
pub mod printer;
pub mod stmt;
pub mod types;

pub use expr::{
    BinaryOp, BindingId, Expr, ExprKind, Identifier, MatchArm, NumericKind, Pattern,
    PatternBinding, Resolution, UnaryOp,
};
pub use printer::print_program;
pub use stmt::{
    Block, ConstructorDecl, EnumDecl, FunctionDecl, ImplementationDecl, InterfaceDecl, LetDecl,
    LetPatternDecl,
    Parameter, Program, Prototype, Stmt, StmtKind,
};
pub use types::{TypeAnnotation, TypeKind};
