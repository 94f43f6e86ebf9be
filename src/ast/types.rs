//! Type annotation AST nodes.

use std::fmt;

use crate::span::Span;

/// A type annotation in the source code.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation {
    pub kind: TypeKind,
    pub span: Span,
}

impl TypeAnnotation {
    pub fn new(kind: TypeKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn named(name: impl Into<String>, span: Span) -> Self {
        Self::new(
            TypeKind::Named {
                name: name.into(),
                arguments: Vec::new(),
            },
            span,
        )
    }
}

/// The kinds of types that can be expressed in source.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// Builtin, enum or generic parameter name: Int, Option<Int>, T
    Named {
        name: String,
        arguments: Vec<TypeAnnotation>,
    },
    /// List type: [Int]
    List(Box<TypeAnnotation>),
    /// Function type: (A, B) -> C
    Function {
        params: Vec<TypeAnnotation>,
        return_type: Box<TypeAnnotation>,
    },
}

fn comma_separated(f: &mut fmt::Formatter<'_>, items: &[TypeAnnotation]) -> fmt::Result {
    let mut sep = "";
    for item in items {
        write!(f, "{}{}", sep, item)?;
        sep = ", ";
    }
    Ok(())
}

impl fmt::Display for TypeAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Named { name, arguments } if arguments.is_empty() => f.write_str(name),
            TypeKind::Named { name, arguments } => {
                write!(f, "{}<", name)?;
                comma_separated(f, arguments)?;
                f.write_str(">")
            }
            TypeKind::List(inner) => write!(f, "[{}]", inner),
            TypeKind::Function {
                params,
                return_type,
            } => {
                f.write_str("(")?;
                comma_separated(f, params)?;
                write!(f, ") -> {}", return_type)
            }
        }
    }
}
