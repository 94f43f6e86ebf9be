//! Block and statement resolution.

use crate::ast::*;
use crate::error::ResolveError;
use crate::types::type_repr::Type;

use super::{ResolveResult, Resolver};

impl Resolver {
    /// Resolve a block in its own lexical scope. Its type is the type of its
    /// trailing expression statement, or `Unit`.
    pub(crate) fn resolve_block(&mut self, block: &mut Block) -> ResolveResult<Type> {
        self.begin_block();
        let mut ty = Type::Unit;
        for stmt in &mut block.statements {
            ty = self.resolve_stmt(stmt)?;
        }
        self.end_block();
        Ok(ty)
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt) -> ResolveResult<Type> {
        match &mut stmt.kind {
            StmtKind::Expression(expr) => self.resolve_expr(expr),
            StmtKind::Let(decl) => {
                let ty = self.resolve_let_value(decl)?;
                decl.binding = Some(self.declare_local(&decl.name, None, ty));
                Ok(Type::Unit)
            }
            StmtKind::LetPattern(decl) => {
                let value_type = self.resolve_expr(&mut decl.value)?;
                let field_types =
                    self.resolve_pattern(&mut decl.pattern, &value_type, stmt.span)?;
                if let Pattern::Constructor { bindings, .. } = &mut decl.pattern {
                    for (binding, ty) in bindings.iter_mut().zip(field_types) {
                        if !binding.is_ignored() {
                            binding.binding = Some(self.declare_local(&binding.name, None, ty));
                        }
                    }
                }
                Ok(Type::Unit)
            }
            StmtKind::Function(decl) => {
                if !decl.generics.is_empty() {
                    return Err(ResolveError::general(
                        format!(
                            "generic function '{}' must be declared at top level",
                            decl.name
                        ),
                        decl.span,
                    ));
                }
                // Declared before the body so it can call itself.
                let provisional = self.provisional_type(decl)?;
                decl.binding = Some(self.declare_local(&decl.name, None, provisional));
                self.resolve_function_body(decl)?;
                Ok(Type::Unit)
            }
            StmtKind::Enum(_) | StmtKind::Interface(_) | StmtKind::Implementation(_) => {
                Err(ResolveError::general(
                    "type declarations are only allowed at top level",
                    stmt.span,
                ))
            }
        }
    }

    pub(crate) fn resolve_let_value(&mut self, decl: &mut LetDecl) -> ResolveResult<Type> {
        let value_type = self.resolve_expr(&mut decl.value)?;
        match &decl.type_annotation {
            Some(annotation) => self.resolve_annotation(annotation),
            None => Ok(value_type),
        }
    }

    fn provisional_type(&self, decl: &FunctionDecl) -> ResolveResult<Type> {
        let params = decl
            .params
            .iter()
            .map(|p| self.resolve_annotation(&p.type_annotation))
            .collect::<ResolveResult<Vec<_>>>()?;
        let return_type = match &decl.return_type {
            Some(annotation) => self.resolve_annotation(annotation)?,
            None => Type::Unknown,
        };
        Ok(Type::function(params, return_type))
    }
}
