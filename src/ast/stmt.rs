//! Statement and declaration AST nodes.

use crate::ast::expr::{BindingId, Expr, Pattern};
use crate::ast::types::TypeAnnotation;
use crate::span::Span;

/// A complete program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}

/// A statement in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// All statement variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression statement. Its value is the block's value when it comes last.
    Expression(Expr),
    /// let name: Type = value
    Let(LetDecl),
    /// let Name(a, b) = value
    LetPattern(LetPatternDecl),
    /// Named function declaration.
    Function(FunctionDecl),
    /// enum Name<T> { A(T), B }
    Enum(EnumDecl),
    /// interface Name<T> { ... }
    Interface(InterfaceDecl),
    /// implementation Name<Type> { ... }
    Implementation(ImplementationDecl),
}

/// A braced sequence of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    pub fn new(statements: Vec<Stmt>, span: Span) -> Self {
        Self { statements, span }
    }
}

/// Variable declaration. `binding` is `None` for top-level globals.
#[derive(Debug, Clone, PartialEq)]
pub struct LetDecl {
    pub name: String,
    pub type_annotation: Option<TypeAnnotation>,
    pub value: Expr,
    pub binding: Option<BindingId>,
}

/// Destructuring `let`: the value must be built by the pattern's
/// constructor, otherwise evaluation faults.
#[derive(Debug, Clone, PartialEq)]
pub struct LetPatternDecl {
    pub pattern: Pattern,
    pub value: Expr,
}

/// Function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_annotation: TypeAnnotation,
    pub span: Span,
    pub binding: Option<BindingId>,
}

/// Function declaration, also used for anonymous functions and for every
/// function unit handed to the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub generics: Vec<String>,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeAnnotation>,
    pub body: Block,
    pub span: Span,
    /// Set for functions declared inside another function body.
    pub binding: Option<BindingId>,
}

/// enum declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub generics: Vec<String>,
    pub constructors: Vec<ConstructorDecl>,
    pub span: Span,
}

/// One constructor of an enum.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDecl {
    pub name: String,
    pub fields: Vec<TypeAnnotation>,
    pub span: Span,
}

/// Interface function without a body.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: TypeAnnotation,
    pub span: Span,
}

/// interface declaration: virtual prototypes plus concrete default functions.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub type_param: String,
    pub prototypes: Vec<Prototype>,
    pub functions: Vec<FunctionDecl>,
    pub span: Span,
}

/// implementation of an interface for one concrete type.
#[derive(Debug, Clone, PartialEq)]
pub struct ImplementationDecl {
    pub interface: String,
    pub type_annotation: TypeAnnotation,
    pub functions: Vec<FunctionDecl>,
    pub span: Span,
}
