//! Bytecode generator: lowers a resolved program into the serialized format.
//!
//! Top-level code is emitted first into the Text section; every function
//! unit and every nested function value reached while emitting gets the next
//! function id and is queued, so the Functions section lists bodies in id
//! order. Strings are interned on first use.

mod captures;
mod expressions;

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;

use crate::ast::*;
use crate::bytecode::format::{
    Writer, FUNCTION_HEADER, HEADER, SECTION_FUNCTIONS, SECTION_STRINGS, SECTION_TEXT,
};
use crate::bytecode::instruction::OpCode;
use crate::error::GenerateError;
use crate::span::Span;
use crate::types::ResolvedProgram;

pub use captures::{captured_bindings, captures_scope};

/// Result type for generation.
pub type GenerateResult<T> = Result<T, GenerateError>;

/// Lower a resolved program to a byte stream.
pub fn generate(program: &ResolvedProgram) -> GenerateResult<Vec<u8>> {
    Generator::new(program).generate()
}

/// Emission state of the function (or top-level code) being generated.
#[derive(Debug, Default)]
struct FunctionState {
    code: Writer,
    /// Slot of every binding currently held on the locals stack.
    slots: HashMap<BindingId, i64>,
    next_slot: i64,
}

pub struct Generator<'a> {
    program: &'a ResolvedProgram,
    strings: IndexSet<String, ahash::RandomState>,
    functions: Writer,
    pending: VecDeque<(u32, &'a FunctionDecl)>,
    next_function: u32,
    next_cache_slot: i64,
    captured: HashSet<BindingId>,
    current: FunctionState,
}

impl<'a> Generator<'a> {
    pub fn new(program: &'a ResolvedProgram) -> Self {
        Self {
            program,
            strings: IndexSet::default(),
            functions: Writer::new(),
            pending: VecDeque::new(),
            next_function: 0,
            next_cache_slot: 0,
            captured: captured_bindings(program),
            current: FunctionState::default(),
        }
    }

    pub fn generate(mut self) -> GenerateResult<Vec<u8>> {
        let program = self.program;
        for unit in &program.functions {
            let id = self.next_function;
            self.next_function += 1;
            self.pending.push_back((id, unit));
        }

        // Units are bound globally before any top-level statement runs.
        for (id, unit) in program.functions.iter().enumerate() {
            let name = self.intern(&unit.name, unit.span)?;
            self.emit_with2(OpCode::CreateClosure, id as i64, 0);
            self.emit_with(OpCode::Bind, name);
        }
        self.emit_top_level(&program.body)?;
        let text = std::mem::take(&mut self.current).code;

        while let Some((id, decl)) = self.pending.pop_front() {
            self.emit_function(id, decl)?;
        }

        let mut out = Writer::new();
        if !self.strings.is_empty() {
            out.write_word(HEADER);
            out.write_word(SECTION_STRINGS);
            for string in &self.strings {
                out.write_string(string);
            }
        }
        if !self.functions.is_empty() {
            out.write_word(HEADER);
            out.write_word(SECTION_FUNCTIONS);
            out.append(&self.functions);
        }
        out.write_word(HEADER);
        out.write_word(SECTION_TEXT);
        out.write_word(self.next_cache_slot);
        out.append(&text);

        tracing::debug!(
            strings = self.strings.len(),
            functions = self.next_function,
            cache_slots = self.next_cache_slot,
            bytes = out.position(),
            "generated bytecode"
        );
        Ok(out.into_vec())
    }

    fn emit_function(&mut self, id: u32, decl: &'a FunctionDecl) -> GenerateResult<()> {
        tracing::trace!(id, name = %decl.name, "emitting function");
        let name = self.intern(&decl.name, decl.span)?;
        let params = decl
            .params
            .iter()
            .map(|p| self.intern(&p.name, p.span))
            .collect::<GenerateResult<Vec<_>>>()?;

        self.functions.write_word(FUNCTION_HEADER);
        self.functions.write_word(name);
        self.functions.write_word(params.len() as i64);
        for param in &params {
            self.functions.write_word(*param);
        }

        self.current = FunctionState::default();
        for (param, name) in decl.params.iter().zip(&params) {
            if self.is_captured(param.binding) {
                self.emit_with(OpCode::PutToScope, *name);
            }
        }
        self.emit_block(&decl.body)?;
        self.emit(OpCode::Ret);

        let state = std::mem::take(&mut self.current);
        self.functions.append(&state.code);
        Ok(())
    }

    /// Top-level statements: lets bind globals, every expression but the
    /// last is discarded.
    fn emit_top_level(&mut self, statements: &'a [Stmt]) -> GenerateResult<()> {
        for (i, stmt) in statements.iter().enumerate() {
            let is_last = i + 1 == statements.len();
            match &stmt.kind {
                StmtKind::Expression(expr) => {
                    self.emit_expr(expr)?;
                    if !is_last {
                        self.emit(OpCode::Pop);
                    }
                }
                StmtKind::Let(decl) => {
                    self.emit_expr(&decl.value)?;
                    self.emit_store(decl.binding, &decl.name, stmt.span)?;
                }
                StmtKind::LetPattern(decl) => self.emit_let_pattern(decl, stmt.span)?,
                _ => {
                    return Err(GenerateError::new(
                        "declaration left in top-level code",
                        stmt.span,
                    ))
                }
            }
        }
        Ok(())
    }

    /// Emit a block leaving exactly one value: its trailing expression, or
    /// unit.
    pub(crate) fn emit_block(&mut self, block: &'a Block) -> GenerateResult<()> {
        let locals: Vec<BindingId> = block
            .statements
            .iter()
            .flat_map(|stmt| match &stmt.kind {
                StmtKind::Let(decl) => vec![decl.binding],
                StmtKind::Function(decl) => vec![decl.binding],
                StmtKind::LetPattern(decl) => decl.pattern.bindings().map(|b| b.binding).collect(),
                _ => Vec::new(),
            })
            .flatten()
            .filter(|binding| !self.captured.contains(binding))
            .collect();
        self.alloc_slots(&locals);

        let mut produced = false;
        for (i, stmt) in block.statements.iter().enumerate() {
            let is_last = i + 1 == block.statements.len();
            match &stmt.kind {
                StmtKind::Expression(expr) => {
                    self.emit_expr(expr)?;
                    if is_last {
                        produced = true;
                    } else {
                        self.emit(OpCode::Pop);
                    }
                }
                StmtKind::Let(decl) => {
                    self.emit_expr(&decl.value)?;
                    self.emit_store(decl.binding, &decl.name, stmt.span)?;
                }
                StmtKind::LetPattern(decl) => self.emit_let_pattern(decl, stmt.span)?,
                StmtKind::Function(decl) => {
                    self.emit_closure(decl);
                    self.emit_store(decl.binding, &decl.name, stmt.span)?;
                }
                StmtKind::Enum(_) | StmtKind::Interface(_) | StmtKind::Implementation(_) => {
                    return Err(GenerateError::new(
                        "type declaration inside a block",
                        stmt.span,
                    ))
                }
            }
        }
        if !produced {
            self.emit_unit();
        }

        self.free_slots(&locals);
        Ok(())
    }

    /// Pop the top of stack into a binding's home: its slot, or the frame's
    /// scope when captured or global.
    pub(crate) fn emit_store(
        &mut self,
        binding: Option<BindingId>,
        name: &str,
        span: Span,
    ) -> GenerateResult<()> {
        match binding {
            Some(binding) if !self.captured.contains(&binding) => {
                let slot = self.slot_of(binding, name, span)?;
                self.emit_with(OpCode::StackStore, slot);
            }
            _ => {
                let key = self.intern(&scope_key(name, binding), span)?;
                self.emit_with(OpCode::Bind, key);
            }
        }
        Ok(())
    }

    pub(crate) fn emit_closure(&mut self, decl: &'a FunctionDecl) {
        let id = self.next_function;
        self.next_function += 1;
        self.pending.push_back((id, decl));
        let captures = captures_scope(decl);
        self.emit_with2(OpCode::CreateClosure, id as i64, captures as i64);
    }

    // ===== Slots =====

    pub(crate) fn alloc_slots(&mut self, bindings: &[BindingId]) {
        if bindings.is_empty() {
            return;
        }
        self.emit_with(OpCode::StackAlloc, bindings.len() as i64);
        for binding in bindings {
            let slot = self.current.next_slot;
            self.current.slots.insert(*binding, slot);
            self.current.next_slot += 1;
        }
    }

    pub(crate) fn free_slots(&mut self, bindings: &[BindingId]) {
        if bindings.is_empty() {
            return;
        }
        self.emit_with(OpCode::StackFree, bindings.len() as i64);
        for binding in bindings {
            self.current.slots.remove(binding);
        }
        self.current.next_slot -= bindings.len() as i64;
    }

    /// A slot not tied to any binding, such as a match scrutinee.
    pub(crate) fn alloc_temp(&mut self) -> i64 {
        self.emit_with(OpCode::StackAlloc, 1);
        let slot = self.current.next_slot;
        self.current.next_slot += 1;
        slot
    }

    pub(crate) fn free_temp(&mut self) {
        self.emit_with(OpCode::StackFree, 1);
        self.current.next_slot -= 1;
    }

    pub(crate) fn slot_of(&self, binding: BindingId, name: &str, span: Span) -> GenerateResult<i64> {
        self.current
            .slots
            .get(&binding)
            .copied()
            .ok_or_else(|| GenerateError::new(format!("no stack slot for '{}'", name), span))
    }

    pub(crate) fn is_captured(&self, binding: Option<BindingId>) -> bool {
        binding.is_some_and(|b| self.captured.contains(&b))
    }

    // ===== Emission =====

    pub(crate) fn intern(&mut self, text: &str, span: Span) -> GenerateResult<i64> {
        if text.contains('\0') {
            return Err(GenerateError::new("string contains a NUL byte", span));
        }
        if let Some(index) = self.strings.get_index_of(text) {
            return Ok(index as i64);
        }
        let (index, _) = self.strings.insert_full(text.to_string());
        Ok(index as i64)
    }

    pub(crate) fn fresh_cache_slot(&mut self) -> i64 {
        let slot = self.next_cache_slot;
        self.next_cache_slot += 1;
        slot
    }

    pub(crate) fn emit(&mut self, op: OpCode) {
        self.current.code.write_op(op);
    }

    pub(crate) fn emit_with(&mut self, op: OpCode, operand: i64) {
        self.current.code.write_op(op);
        self.current.code.write_word(operand);
    }

    pub(crate) fn emit_with2(&mut self, op: OpCode, first: i64, second: i64) {
        self.current.code.write_op(op);
        self.current.code.write_word(first);
        self.current.code.write_word(second);
    }

    pub(crate) fn emit_unit(&mut self) {
        self.emit_with(OpCode::Push, crate::bytecode::nanvalue::NaNValue::unit().to_word());
    }

    /// Emit a jump with a placeholder offset; returns where the offset word is.
    pub(crate) fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit(op);
        let at = self.current.code.position();
        self.current.code.write_word(0);
        at
    }

    /// Point the jump whose offset word is at `at` to the current position.
    pub(crate) fn patch_jump(&mut self, at: usize) {
        let target = self.current.code.position();
        self.current
            .code
            .patch_word(at, target as i64 - at as i64);
    }
}

/// Name a binding is stored under in a scope. Captured locals carry their
/// binding id so that two same-named locals of one frame, or a local and a
/// global, never share a key; `#` cannot appear in an identifier.
pub(crate) fn scope_key(name: &str, binding: Option<BindingId>) -> String {
    match binding {
        Some(binding) => format!("{}#{}", name, binding.0),
        None => name.to_string(),
    }
}
