//! Expression resolution and type inference.

use std::collections::HashMap;

use crate::ast::*;
use crate::error::ResolveError;
use crate::span::Span;
use crate::types::environment::GlobalFunction;
use crate::types::type_repr::Type;

use super::{ResolveResult, Resolver};

impl Resolver {
    pub(crate) fn resolve_expr(&mut self, expr: &mut Expr) -> ResolveResult<Type> {
        let span = expr.span;

        // Constructor references are rewritten in place.
        if let Some(name) = self.constructor_reference(expr) {
            return self.rewrite_constructor(expr, name);
        }

        match &mut expr.kind {
            ExprKind::IntLiteral(_) => Ok(Type::Int),
            ExprKind::FloatLiteral(_) => Ok(Type::Float),
            ExprKind::StringLiteral(_) => Ok(Type::String),
            ExprKind::BoolLiteral(_) => Ok(Type::Bool),
            ExprKind::Unit => Ok(Type::Unit),

            ExprKind::Identifier(ident) => self.resolve_identifier(ident, span),

            ExprKind::Binary {
                left,
                operator,
                right,
                numeric,
            } => {
                let left_type = self.resolve_expr(left)?;
                let right_type = self.resolve_expr(right)?;
                let is_float = left_type == Type::Float || right_type == Type::Float;
                *numeric = if is_float {
                    NumericKind::Float
                } else {
                    NumericKind::Int
                };
                if operator.is_comparison() {
                    Ok(Type::Bool)
                } else if is_float {
                    Ok(Type::Float)
                } else {
                    Ok(Type::Int)
                }
            }

            ExprKind::Unary {
                operator,
                operand,
                numeric,
            } => {
                let operand_type = self.resolve_expr(operand)?;
                match operator {
                    UnaryOp::Not => Ok(Type::Bool),
                    UnaryOp::Negate if operand_type == Type::Float => {
                        *numeric = NumericKind::Float;
                        Ok(Type::Float)
                    }
                    UnaryOp::Negate => {
                        *numeric = NumericKind::Int;
                        Ok(Type::Int)
                    }
                }
            }

            ExprKind::LogicalAnd { left, right } | ExprKind::LogicalOr { left, right } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
                Ok(Type::Bool)
            }

            ExprKind::Call { .. } => self.resolve_call(expr),

            ExprKind::Constructor { arguments, .. } => {
                // Already rewritten (e.g. a re-resolved instance body).
                for arg in arguments.iter_mut() {
                    self.resolve_expr(arg)?;
                }
                Ok(Type::Unknown)
            }

            ExprKind::List(items) => {
                let mut element = Type::Unknown;
                for item in items.iter_mut() {
                    let ty = self.resolve_expr(item)?;
                    if element == Type::Unknown {
                        element = ty;
                    }
                }
                Ok(Type::list(element))
            }

            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                let then_type = self.resolve_block(then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let else_type = self.resolve_expr(else_branch)?;
                        if then_type == Type::Unknown {
                            Ok(else_type)
                        } else {
                            Ok(then_type)
                        }
                    }
                    None => Ok(Type::Unit),
                }
            }

            ExprKind::Match { scrutinee, arms } => {
                let scrutinee_type = self.resolve_expr(scrutinee)?;
                let mut result = Type::Unknown;
                for arm in arms.iter_mut() {
                    let ty = self.resolve_arm(arm, &scrutinee_type)?;
                    if result == Type::Unknown {
                        result = ty;
                    }
                }
                Ok(result)
            }

            ExprKind::Function(decl) => {
                if !decl.generics.is_empty() {
                    return Err(ResolveError::general(
                        "anonymous functions cannot be generic",
                        decl.span,
                    ));
                }
                self.resolve_function_body(decl)
            }

            ExprKind::Block(block) => self.resolve_block(block),
        }
    }

    fn resolve_identifier(&mut self, ident: &mut Identifier, span: Span) -> ResolveResult<Type> {
        if let Some((info, depth)) = self.lookup_local(&ident.name) {
            ident.resolution = match info.param_index {
                Some(index) => Resolution::Param {
                    binding: info.binding,
                    index,
                    depth,
                },
                None => Resolution::Local {
                    binding: info.binding,
                    depth,
                },
            };
            return Ok(info.ty);
        }

        if let Some(global) = self.env.functions.get(&ident.name) {
            return match global {
                GlobalFunction::Plain(signature) => {
                    ident.resolution = Resolution::Global;
                    Ok(signature.as_type())
                }
                GlobalFunction::Generic { .. } | GlobalFunction::Virtual { .. } => {
                    Err(ResolveError::general(
                        format!("'{}' must be called directly", ident.name),
                        span,
                    ))
                }
            };
        }

        if let Some(ty) = self.env.globals.get(&ident.name) {
            ident.resolution = Resolution::Global;
            return Ok(ty.clone());
        }

        if let Some(signature) = self.env.builtin(&ident.name) {
            ident.resolution = Resolution::Builtin;
            return Ok(signature.as_type());
        }

        Err(ResolveError::UndefinedVariable(ident.name.clone(), span))
    }

    fn resolve_call(&mut self, expr: &mut Expr) -> ResolveResult<Type> {
        let span = expr.span;
        let ExprKind::Call { callee, arguments } = &mut expr.kind else {
            return Ok(Type::Unknown);
        };

        let mut arg_types = Vec::with_capacity(arguments.len());
        for arg in arguments.iter_mut() {
            arg_types.push(self.resolve_expr(arg)?);
        }

        if let ExprKind::Identifier(ident) = &mut callee.kind {
            if self.lookup_local(&ident.name).is_none() {
                match self.env.functions.get(&ident.name).cloned() {
                    Some(GlobalFunction::Generic {
                        signature,
                        template,
                    }) => {
                        check_arity(signature.params.len(), arg_types.len(), span)?;
                        let (instance, ty) = self.instantiate(
                            &ident.name,
                            &signature,
                            &template,
                            &arg_types,
                            span,
                        )?;
                        ident.name = instance;
                        ident.resolution = Resolution::Global;
                        return Ok(return_type_of(&ty));
                    }
                    Some(GlobalFunction::Virtual { interface }) => {
                        let (implementation, ty) =
                            self.dispatch(&interface, &ident.name, &arg_types, span)?;
                        ident.name = implementation;
                        ident.resolution = Resolution::Global;
                        return Ok(return_type_of(&ty));
                    }
                    Some(GlobalFunction::Plain(signature)) => {
                        check_arity(signature.params.len(), arg_types.len(), span)?;
                    }
                    None => {
                        if let Some(signature) = self.env.builtin(&ident.name).cloned() {
                            if self.env.globals.get(&ident.name).is_none() {
                                check_arity(signature.params.len(), arg_types.len(), span)?;
                                ident.resolution = Resolution::Builtin;
                                let mut bindings = HashMap::new();
                                for (param, arg) in signature.params.iter().zip(&arg_types) {
                                    param.bind_vars(arg, &mut bindings);
                                }
                                let ret = signature.return_type.substitute(&bindings);
                                return Ok(if ret.is_concrete() { ret } else { Type::Unknown });
                            }
                        }
                    }
                }
            }
        }

        let callee_type = self.resolve_expr(callee)?;
        Ok(return_type_of(&callee_type))
    }

    /// Name of the constructor `expr` refers to, if it is a bare or applied
    /// constructor name that is not shadowed by a local.
    fn constructor_reference(&self, expr: &Expr) -> Option<String> {
        let name = match &expr.kind {
            ExprKind::Identifier(ident) => &ident.name,
            ExprKind::Call { callee, .. } => match &callee.kind {
                ExprKind::Identifier(ident) => &ident.name,
                _ => return None,
            },
            _ => return None,
        };
        if self.env.constructors.contains_key(name) && self.lookup_local(name).is_none() {
            Some(name.clone())
        } else {
            None
        }
    }

    fn rewrite_constructor(&mut self, expr: &mut Expr, name: String) -> ResolveResult<Type> {
        let span = expr.span;
        let Some(info) = self.env.constructors.get(&name).cloned() else {
            return Err(ResolveError::UnknownConstructor(name, span));
        };

        let mut arguments = match std::mem::replace(&mut expr.kind, ExprKind::Unit) {
            ExprKind::Call { arguments, .. } => arguments,
            _ => Vec::new(),
        };
        check_arity(info.fields.len(), arguments.len(), span)?;

        let mut bindings = HashMap::new();
        for (field, arg) in info.fields.iter().zip(arguments.iter_mut()) {
            let ty = self.resolve_expr(arg)?;
            field.bind_vars(&ty, &mut bindings);
        }

        expr.kind = ExprKind::Constructor {
            name,
            arguments,
            tag: info.tag,
            size: info.fields.len(),
        };

        Ok(Type::Data {
            name: info.enum_name.clone(),
            arguments: info
                .enum_generics
                .iter()
                .map(|g| bindings.get(g).cloned().unwrap_or(Type::Unknown))
                .collect(),
        })
    }

    fn resolve_arm(&mut self, arm: &mut MatchArm, scrutinee_type: &Type) -> ResolveResult<Type> {
        self.begin_block();
        let field_types = self.resolve_pattern(&mut arm.pattern, scrutinee_type, arm.span)?;
        if let Pattern::Constructor { bindings, .. } = &mut arm.pattern {
            for (binding, ty) in bindings.iter_mut().zip(field_types) {
                if !binding.is_ignored() {
                    binding.binding = Some(self.declare_local(&binding.name, None, ty));
                }
            }
        }
        let ty = self.resolve_expr(&mut arm.body)?;
        self.end_block();
        Ok(ty)
    }

    /// Check a pattern against the scrutinee's type, fill in its tag and
    /// size, and return the type of each field position. Binds nothing.
    pub(crate) fn resolve_pattern(
        &mut self,
        pattern: &mut Pattern,
        scrutinee_type: &Type,
        span: Span,
    ) -> ResolveResult<Vec<Type>> {
        let Pattern::Constructor {
            name,
            bindings,
            tag,
            size,
        } = pattern
        else {
            return Ok(Vec::new());
        };
        let Some(info) = self.env.constructors.get(name.as_str()).cloned() else {
            return Err(ResolveError::UnknownConstructor(name.clone(), span));
        };
        if let Type::Data {
            name: enum_name, ..
        } = scrutinee_type
        {
            if *enum_name != info.enum_name {
                return Err(ResolveError::general(
                    format!("constructor '{}' does not belong to '{}'", name, enum_name),
                    span,
                ));
            }
        }
        check_arity(info.fields.len(), bindings.len(), span)?;
        *tag = info.tag;
        *size = info.fields.len();

        // Field types specialised to the scrutinee's type arguments.
        let mut type_args = HashMap::new();
        if let Type::Data { arguments, .. } = scrutinee_type {
            for (generic, arg) in info.enum_generics.iter().zip(arguments) {
                type_args.insert(generic.clone(), arg.clone());
            }
        }
        Ok(info
            .fields
            .iter()
            .map(|field| {
                let ty = field.substitute(&type_args);
                if ty.is_concrete() {
                    ty
                } else {
                    Type::Unknown
                }
            })
            .collect())
    }
}

fn check_arity(expected: usize, got: usize, span: Span) -> ResolveResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(ResolveError::wrong_arity(expected, got, span))
    }
}

fn return_type_of(ty: &Type) -> Type {
    match ty {
        Type::Function { return_type, .. } => (**return_type).clone(),
        _ => Type::Unknown,
    }
}
