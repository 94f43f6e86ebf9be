//! Expression lowering.

use crate::ast::*;
use crate::bytecode::instruction::OpCode;
use crate::bytecode::nanvalue::NaNValue;
use crate::error::GenerateError;
use crate::span::Span;

use super::{GenerateResult, Generator};

impl<'a> Generator<'a> {
    pub(crate) fn emit_expr(&mut self, expr: &'a Expr) -> GenerateResult<()> {
        match &expr.kind {
            ExprKind::IntLiteral(n) => {
                let immediate = NaNValue::from_int(*n).ok_or_else(|| {
                    GenerateError::new(
                        format!("integer literal {} does not fit in 48 bits", n),
                        expr.span,
                    )
                })?;
                self.emit_with(OpCode::Push, immediate.to_word());
            }
            ExprKind::FloatLiteral(x) => {
                self.emit_with(OpCode::Push, NaNValue::from_f64(*x).to_word());
            }
            ExprKind::BoolLiteral(b) => {
                self.emit_with(OpCode::Push, NaNValue::from_bool(*b).to_word());
            }
            ExprKind::Unit => self.emit_unit(),
            ExprKind::StringLiteral(text) => {
                let id = self.intern(text, expr.span)?;
                self.emit_with(OpCode::LoadString, id);
            }

            ExprKind::Identifier(ident) => self.emit_identifier(ident, expr.span)?,

            ExprKind::Binary {
                left,
                operator,
                right,
                numeric,
            } => {
                self.emit_expr(left)?;
                self.emit_expr(right)?;
                let op = binary_opcode(*operator, *numeric, expr.span)?;
                self.emit(op);
            }

            ExprKind::Unary {
                operator,
                operand,
                numeric,
            } => {
                self.emit_expr(operand)?;
                let op = match (operator, numeric) {
                    (UnaryOp::Negate, NumericKind::Int) => OpCode::Neg,
                    (UnaryOp::Negate, NumericKind::Float) => OpCode::FNeg,
                    (UnaryOp::Not, _) => OpCode::Not,
                };
                self.emit(op);
            }

            ExprKind::LogicalAnd { left, right } => {
                self.emit_expr(left)?;
                let short = self.emit_jump(OpCode::Jz);
                self.emit_expr(right)?;
                let end = self.emit_jump(OpCode::Jmp);
                self.patch_jump(short);
                self.emit_with(OpCode::Push, NaNValue::from_bool(false).to_word());
                self.patch_jump(end);
            }

            ExprKind::LogicalOr { left, right } => {
                self.emit_expr(left)?;
                let rhs = self.emit_jump(OpCode::Jz);
                self.emit_with(OpCode::Push, NaNValue::from_bool(true).to_word());
                let end = self.emit_jump(OpCode::Jmp);
                self.patch_jump(rhs);
                self.emit_expr(right)?;
                self.patch_jump(end);
            }

            ExprKind::Call { callee, arguments } => {
                self.emit_expr(callee)?;
                for arg in arguments {
                    self.emit_expr(arg)?;
                }
                self.emit_with(OpCode::Call, arguments.len() as i64);
            }

            ExprKind::Constructor {
                arguments,
                tag,
                size,
                ..
            } => {
                self.emit_with2(OpCode::AllocObj, *size as i64, *tag as i64);
                for (index, arg) in arguments.iter().enumerate() {
                    self.emit_expr(arg)?;
                    self.emit_with(OpCode::ObjStoreAt, index as i64);
                }
            }

            ExprKind::List(items) => {
                self.emit_with(OpCode::AllocList, items.len() as i64);
                for (index, item) in items.iter().enumerate() {
                    self.emit_expr(item)?;
                    self.emit_with(OpCode::ObjStoreAt, index as i64);
                }
            }

            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.emit_expr(condition)?;
                let else_jump = self.emit_jump(OpCode::Jz);
                self.emit_block(then_branch)?;
                let end_jump = self.emit_jump(OpCode::Jmp);
                self.patch_jump(else_jump);
                match else_branch {
                    Some(else_branch) => self.emit_expr(else_branch)?,
                    None => self.emit_unit(),
                }
                self.patch_jump(end_jump);
            }

            ExprKind::Match { scrutinee, arms } => self.emit_match(scrutinee, arms)?,

            ExprKind::Function(decl) => self.emit_closure(decl),

            ExprKind::Block(block) => self.emit_block(block)?,
        }
        Ok(())
    }

    fn emit_identifier(&mut self, ident: &Identifier, span: Span) -> GenerateResult<()> {
        match ident.resolution {
            Resolution::Unresolved => {
                return Err(GenerateError::Unresolved(ident.name.clone(), span));
            }
            Resolution::Param {
                index, depth: 0, ..
            } => {
                self.emit_with(OpCode::PushArg, index as i64);
            }
            Resolution::Local { binding, depth: 0 } if !self.captured.contains(&binding) => {
                let slot = self.slot_of(binding, &ident.name, span)?;
                self.emit_with(OpCode::StackLoad, slot);
            }
            Resolution::Local { binding, .. } => {
                let key = super::scope_key(&ident.name, Some(binding));
                let symbol = self.intern(&key, span)?;
                let cache_slot = self.fresh_cache_slot();
                self.emit_with2(OpCode::Lookup, symbol, cache_slot);
            }
            _ => {
                let symbol = self.intern(&ident.name, span)?;
                let cache_slot = self.fresh_cache_slot();
                self.emit_with2(OpCode::Lookup, symbol, cache_slot);
            }
        }
        Ok(())
    }

    /// Cases are tried in order against a scrutinee kept in a temporary
    /// slot. A wildcard ends the chain; without one, falling off the last
    /// case faults.
    fn emit_match(&mut self, scrutinee: &'a Expr, arms: &'a [MatchArm]) -> GenerateResult<()> {
        self.emit_expr(scrutinee)?;
        let subject = self.alloc_temp();
        self.emit_with(OpCode::StackStore, subject);

        let mut end_jumps = Vec::with_capacity(arms.len());
        let mut exhaustive = false;
        for arm in arms {
            match &arm.pattern {
                Pattern::Wildcard => {
                    self.emit_expr(&arm.body)?;
                    end_jumps.push(self.emit_jump(OpCode::Jmp));
                    exhaustive = true;
                    break;
                }
                Pattern::Constructor { tag, bindings, .. } => {
                    self.emit_with(OpCode::StackLoad, subject);
                    self.emit_with(OpCode::ObjTagTest, *tag as i64);
                    let next_case = self.emit_jump(OpCode::Jz);

                    let locals: Vec<BindingId> = bindings
                        .iter()
                        .filter_map(|b| b.binding)
                        .filter(|b| !self.captured.contains(b))
                        .collect();
                    self.alloc_slots(&locals);
                    for (offset, field) in bindings.iter().enumerate() {
                        if field.binding.is_none() {
                            continue;
                        }
                        self.emit_with(OpCode::StackLoad, subject);
                        self.emit_with(OpCode::ObjLoad, offset as i64);
                        self.emit_store(field.binding, &field.name, field.span)?;
                    }
                    self.emit_expr(&arm.body)?;
                    self.free_slots(&locals);

                    end_jumps.push(self.emit_jump(OpCode::Jmp));
                    self.patch_jump(next_case);
                }
            }
        }
        if !exhaustive {
            self.emit(OpCode::MatchFail);
        }

        for jump in end_jumps {
            self.patch_jump(jump);
        }
        self.free_temp();
        Ok(())
    }

    /// `let Name(a, b) = value`: a single-case match whose failure faults.
    /// The caller has already allocated slots for the pattern's locals.
    pub(crate) fn emit_let_pattern(
        &mut self,
        decl: &'a LetPatternDecl,
        span: Span,
    ) -> GenerateResult<()> {
        let Pattern::Constructor { tag, bindings, .. } = &decl.pattern else {
            return Err(GenerateError::new("wildcard pattern in let", span));
        };
        self.emit_expr(&decl.value)?;
        let subject = self.alloc_temp();
        self.emit_with(OpCode::StackStore, subject);

        self.emit_with(OpCode::StackLoad, subject);
        self.emit_with(OpCode::ObjTagTest, *tag as i64);
        let mismatch = self.emit_jump(OpCode::Jz);
        for (offset, field) in bindings.iter().enumerate() {
            if field.is_ignored() {
                continue;
            }
            self.emit_with(OpCode::StackLoad, subject);
            self.emit_with(OpCode::ObjLoad, offset as i64);
            self.emit_store(field.binding, &field.name, field.span)?;
        }
        let end = self.emit_jump(OpCode::Jmp);
        self.patch_jump(mismatch);
        self.emit(OpCode::MatchFail);
        self.patch_jump(end);

        self.free_temp();
        Ok(())
    }
}

fn binary_opcode(operator: BinaryOp, numeric: NumericKind, span: Span) -> GenerateResult<OpCode> {
    use NumericKind::{Float, Int};
    let op = match (operator, numeric) {
        (BinaryOp::Add, Int) => OpCode::Add,
        (BinaryOp::Add, Float) => OpCode::FAdd,
        (BinaryOp::Subtract, Int) => OpCode::Sub,
        (BinaryOp::Subtract, Float) => OpCode::FSub,
        (BinaryOp::Multiply, Int) => OpCode::Mul,
        (BinaryOp::Multiply, Float) => OpCode::FMul,
        (BinaryOp::Divide, Int) => OpCode::Div,
        (BinaryOp::Divide, Float) => OpCode::FDiv,
        (BinaryOp::Modulo, Int) => OpCode::Mod,
        (BinaryOp::Modulo, Float) => {
            return Err(GenerateError::new("'%' is not defined on Float", span))
        }
        (BinaryOp::Less, Int) => OpCode::Lt,
        (BinaryOp::Less, Float) => OpCode::FLt,
        (BinaryOp::Greater, Int) => OpCode::Gt,
        (BinaryOp::Greater, Float) => OpCode::FGt,
        (BinaryOp::LessEqual, Int) => OpCode::Lte,
        (BinaryOp::LessEqual, Float) => OpCode::FLte,
        (BinaryOp::GreaterEqual, Int) => OpCode::Gte,
        (BinaryOp::GreaterEqual, Float) => OpCode::FGte,
        (BinaryOp::Equal, _) => OpCode::Eq,
        (BinaryOp::NotEqual, _) => OpCode::Neq,
    };
    Ok(op)
}
