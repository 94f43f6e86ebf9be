//! Name and type resolution.
//!
//! Turns a parsed program into the form the generator consumes: every
//! identifier resolved, constructors tagged, arithmetic annotated with its
//! operand kind, interface calls redirected to implementations and generic
//! calls redirected to memoized instances.

mod declarations;
mod expressions;
mod statements;

use std::collections::HashMap;

use ahash::AHashMap;

use crate::ast::*;
use crate::error::ResolveError;
use crate::types::environment::TypeEnvironment;
use crate::types::type_repr::Type;

pub(crate) type ResolveResult<T> = Result<T, ResolveError>;

/// Resolver output: the function units to lower plus the top-level code.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProgram {
    /// Top-level functions, implementation functions and generic instances,
    /// each named by the global name it is bound under.
    pub functions: Vec<FunctionDecl>,
    /// Top-level `let` and expression statements, in source order.
    pub body: Vec<Stmt>,
}

/// Resolve a parsed program.
pub fn resolve(program: Program) -> ResolveResult<ResolvedProgram> {
    Resolver::new().resolve_program(program)
}

#[derive(Debug, Clone)]
pub(crate) struct LocalInfo {
    pub binding: BindingId,
    pub param_index: Option<usize>,
    pub ty: Type,
}

/// Lexical scopes of one function body.
#[derive(Debug, Default)]
pub(crate) struct FunctionScope {
    blocks: Vec<HashMap<String, LocalInfo>>,
}

pub struct Resolver {
    pub(crate) env: TypeEnvironment,
    pub(crate) units: Vec<FunctionDecl>,
    pub(crate) instances: AHashMap<(String, Vec<Type>), String>,
    pub(crate) scopes: Vec<FunctionScope>,
    /// Type variables in scope: `Var` inside templates, concrete in instances.
    pub(crate) type_env: HashMap<String, Type>,
    next_binding: u32,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            env: TypeEnvironment::new(),
            units: Vec::new(),
            instances: AHashMap::new(),
            scopes: Vec::new(),
            type_env: HashMap::new(),
            next_binding: 0,
        }
    }

    pub fn resolve_program(mut self, program: Program) -> ResolveResult<ResolvedProgram> {
        self.declare_all(&program)?;

        // Top-level code runs in its own frame.
        self.scopes.push(FunctionScope::default());
        let mut body = Vec::new();
        for stmt in program.statements {
            match stmt.kind {
                StmtKind::Function(decl) => self.resolve_top_level_function(decl)?,
                StmtKind::Implementation(decl) => self.resolve_implementation(decl)?,
                StmtKind::Enum(_) | StmtKind::Interface(_) => {}
                StmtKind::Let(mut decl) => {
                    let ty = self.resolve_let_value(&mut decl)?;
                    self.env.globals.insert(decl.name.clone(), ty);
                    decl.binding = None;
                    body.push(Stmt::new(StmtKind::Let(decl), stmt.span));
                }
                StmtKind::LetPattern(mut decl) => {
                    let value_type = self.resolve_expr(&mut decl.value)?;
                    let field_types =
                        self.resolve_pattern(&mut decl.pattern, &value_type, stmt.span)?;
                    if let Pattern::Constructor { bindings, .. } = &mut decl.pattern {
                        for (binding, ty) in bindings.iter_mut().zip(field_types) {
                            if !binding.is_ignored() {
                                self.env.globals.insert(binding.name.clone(), ty);
                            }
                            binding.binding = None;
                        }
                    }
                    body.push(Stmt::new(StmtKind::LetPattern(decl), stmt.span));
                }
                StmtKind::Expression(mut expr) => {
                    self.resolve_expr(&mut expr)?;
                    body.push(Stmt::new(StmtKind::Expression(expr), stmt.span));
                }
            }
        }
        self.scopes.pop();

        tracing::debug!(
            units = self.units.len(),
            instances = self.instances.len(),
            "resolved program"
        );

        Ok(ResolvedProgram {
            functions: self.units,
            body,
        })
    }

    // ===== Scopes =====

    pub(crate) fn fresh_binding(&mut self) -> BindingId {
        let id = BindingId(self.next_binding);
        self.next_binding += 1;
        id
    }

    pub(crate) fn begin_block(&mut self) {
        if let Some(function) = self.scopes.last_mut() {
            function.blocks.push(HashMap::new());
        }
    }

    pub(crate) fn end_block(&mut self) {
        if let Some(function) = self.scopes.last_mut() {
            function.blocks.pop();
        }
    }

    /// Declare a name in the innermost block and return its fresh binding.
    pub(crate) fn declare_local(
        &mut self,
        name: &str,
        param_index: Option<usize>,
        ty: Type,
    ) -> BindingId {
        let binding = self.fresh_binding();
        if let Some(function) = self.scopes.last_mut() {
            if function.blocks.is_empty() {
                function.blocks.push(HashMap::new());
            }
            if let Some(block) = function.blocks.last_mut() {
                block.insert(
                    name.to_string(),
                    LocalInfo {
                        binding,
                        param_index,
                        ty,
                    },
                );
            }
        }
        binding
    }

    /// Find a local, returning how many function boundaries were crossed.
    pub(crate) fn lookup_local(&self, name: &str) -> Option<(LocalInfo, usize)> {
        for (depth, function) in self.scopes.iter().rev().enumerate() {
            for block in function.blocks.iter().rev() {
                if let Some(info) = block.get(name) {
                    return Some((info.clone(), depth));
                }
            }
        }
        None
    }

    // ===== Types =====

    pub(crate) fn resolve_annotation(&self, annotation: &TypeAnnotation) -> ResolveResult<Type> {
        match &annotation.kind {
            TypeKind::Named { name, arguments } => {
                if let Some(bound) = self.type_env.get(name) {
                    return Ok(bound.clone());
                }
                let simple = match name.as_str() {
                    "Int" => Some(Type::Int),
                    "Float" => Some(Type::Float),
                    "Bool" => Some(Type::Bool),
                    "String" => Some(Type::String),
                    "Unit" => Some(Type::Unit),
                    _ => None,
                };
                if let Some(ty) = simple {
                    return Ok(ty);
                }
                if self.env.enums.contains_key(name) {
                    let arguments = arguments
                        .iter()
                        .map(|a| self.resolve_annotation(a))
                        .collect::<ResolveResult<Vec<_>>>()?;
                    return Ok(Type::Data {
                        name: name.clone(),
                        arguments,
                    });
                }
                Err(ResolveError::UndefinedType(name.clone(), annotation.span))
            }
            TypeKind::List(inner) => Ok(Type::list(self.resolve_annotation(inner)?)),
            TypeKind::Function {
                params,
                return_type,
            } => Ok(Type::function(
                params
                    .iter()
                    .map(|p| self.resolve_annotation(p))
                    .collect::<ResolveResult<Vec<_>>>()?,
                self.resolve_annotation(return_type)?,
            )),
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
