//! Stack-based virtual machine for executing bytecode.
//!
//! The VM keeps three stacks: operands, locals (a window per frame grown and
//! shrunk by `stack_alloc` / `stack_free`) and call frames. Captured
//! bindings live in scopes on the heap.

use std::io::{self, Write};

use crate::bytecode::builtins;
use crate::bytecode::format::{self, Image, Reader, WORD_SIZE};
use crate::bytecode::heap::{Heap, HeapObject, ObjRef, ScopeRef, StrRef, GLOBAL_SCOPE, LIST_TAG};
use crate::bytecode::instruction::OpCode;
use crate::bytecode::nanvalue::NaNValue;
use crate::bytecode::value::{BuiltinId, Closure, Value};
use crate::config::VmConfig;
use crate::error::{FormatError, RuntimeError};

/// Result type for VM operations.
pub type VMResult<T> = Result<T, RuntimeError>;

/// A function body located in the code.
#[derive(Debug, Clone)]
struct FunctionInfo {
    name: u32,
    params: Vec<u32>,
    entry: usize,
    /// Creates its own scope on entry: it binds names that nested closures
    /// can see.
    needs_scope: bool,
}

/// A call frame representing a function invocation.
#[derive(Debug, Clone, Copy)]
struct CallFrame {
    /// `None` for top-level code.
    function: Option<u32>,
    return_ip: usize,
    /// Stack index of the callee; everything from here is dropped on return.
    callee_slot: usize,
    argc: usize,
    locals_base: usize,
    scope: ScopeRef,
}

impl CallFrame {
    fn args_base(&self) -> usize {
        self.callee_slot + 1
    }
}

/// A populated `lookup` site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum CacheEntry {
    #[default]
    Empty,
    /// Binding `index` of the scope `hops` links up from the frame's scope.
    Scope { hops: u32, index: u32 },
    Builtin(BuiltinId),
}

/// The virtual machine.
pub struct Vm {
    config: VmConfig,
    code: Vec<u8>,
    functions: Vec<FunctionInfo>,
    text_start: usize,
    text_end: usize,
    string_count: usize,
    heap: Heap,
    stack: Vec<Value>,
    locals: Vec<Value>,
    frames: Vec<CallFrame>,
    cache: Vec<CacheEntry>,
    ip: usize,
    /// Offset of the instruction being executed.
    op_ip: usize,
    output: Box<dyn Write>,
}

impl Vm {
    /// Load a byte stream. Section layout and instruction boundaries are
    /// checked up front; operands are checked as they execute.
    pub fn load(code: Vec<u8>, config: VmConfig) -> Result<Self, FormatError> {
        let image = format::decode(&code)?;
        let functions = function_table(&code, &image)?;
        let (text_start, text_end, lookup_slots) = match &image.text {
            Some(text) => (text.start, text.end, text.lookup_slots),
            None => (code.len(), code.len(), 0),
        };

        tracing::debug!(
            strings = image.strings.len(),
            functions = functions.len(),
            lookup_slots,
            "loaded bytecode"
        );

        Ok(Self {
            config,
            functions,
            text_start,
            text_end,
            string_count: image.strings.len(),
            heap: Heap::with_strings(image.strings),
            stack: Vec::with_capacity(256),
            locals: Vec::new(),
            frames: Vec::with_capacity(64),
            cache: vec![CacheEntry::Empty; lookup_slots],
            ip: 0,
            op_ip: 0,
            output: Box::new(io::stdout()),
            code,
        })
    }

    /// Redirect the output of `print`.
    pub fn set_output(&mut self, output: impl Write + 'static) {
        self.output = Box::new(output);
    }

    /// Run the top-level code. The result is the value left on top of the
    /// stack, or unit. Each run starts from the loaded state: globals,
    /// heap allocations and lookup caches of an earlier run are dropped.
    pub fn run(&mut self) -> VMResult<Value> {
        self.heap.reset(self.string_count);
        self.cache.fill(CacheEntry::Empty);
        self.stack.clear();
        self.locals.clear();
        self.frames.clear();
        self.frames.push(CallFrame {
            function: None,
            return_ip: self.text_end,
            callee_slot: 0,
            argc: 0,
            locals_base: 0,
            scope: GLOBAL_SCOPE,
        });
        self.ip = self.text_start;

        if let Err(error) = self.execute(0) {
            tracing::debug!(%error, ip = self.op_ip, "runtime fault");
            return Err(error);
        }

        if !self.locals.is_empty() {
            return Err(RuntimeError::UnbalancedSlots {
                leaked: self.locals.len(),
                ip: self.ip,
            });
        }
        Ok(self.stack.last().copied().unwrap_or(Value::Unit))
    }

    /// Call a function value with `args` and run it to completion.
    pub fn call_value(&mut self, callee: Value, args: &[Value]) -> VMResult<Value> {
        let depth = self.frames.len();
        self.push(callee)?;
        for arg in args {
            self.push(*arg)?;
        }
        self.call(args.len())?;
        if self.frames.len() > depth {
            self.execute(depth)?;
        }
        self.pop()
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Offset of the instruction being executed, for error reports.
    pub fn fault_ip(&self) -> usize {
        self.op_ip
    }

    /// Render a value including heap contents.
    pub fn display(&self, value: Value) -> String {
        match value {
            Value::Str(handle) => self.heap.string(handle).unwrap_or("<?>").to_string(),
            Value::List(handle) => {
                let items = self
                    .heap
                    .object(handle)
                    .map(|o| o.slots.iter().map(|v| self.display(*v)).collect::<Vec<_>>())
                    .unwrap_or_default();
                format!("[{}]", items.join(", "))
            }
            Value::Object(handle) => match self.heap.object(handle) {
                Some(object) if object.slots.is_empty() => format!("#{}", object.tag),
                Some(object) => {
                    let fields: Vec<String> =
                        object.slots.iter().map(|v| self.display(*v)).collect();
                    format!("#{}({})", object.tag, fields.join(", "))
                }
                None => value.to_string(),
            },
            Value::Closure(closure) => {
                let name = self
                    .functions
                    .get(closure.function as usize)
                    .and_then(|f| self.heap.string(StrRef(f.name)));
                format!("<fn {}>", name.unwrap_or("?"))
            }
            Value::Builtin(id) => match builtins::get(id) {
                Some(builtin) => format!("<builtin {}>", builtin.name),
                None => value.to_string(),
            },
            _ => value.to_string(),
        }
    }

    // ===== Helpers for builtins =====

    pub fn string_of(&self, value: Value) -> VMResult<&str> {
        match value {
            Value::Str(handle) => self.heap.string(handle).ok_or(RuntimeError::BadHandle {
                handle: handle.0,
                ip: self.op_ip,
            }),
            other => Err(RuntimeError::type_mismatch(
                "String",
                other.type_name(),
                self.op_ip,
            )),
        }
    }

    pub fn list_items(&self, value: Value) -> VMResult<Vec<Value>> {
        match value {
            Value::List(handle) => Ok(self.object(handle)?.slots.clone()),
            other => Err(RuntimeError::type_mismatch(
                "List",
                other.type_name(),
                self.op_ip,
            )),
        }
    }

    pub fn alloc_string(&mut self, text: String) -> VMResult<Value> {
        self.check_heap()?;
        Ok(Value::Str(self.heap.alloc_string(text)))
    }

    pub fn alloc_list(&mut self, items: Vec<Value>) -> VMResult<Value> {
        self.check_heap()?;
        Ok(Value::List(self.heap.alloc_list(items)))
    }

    pub fn write_line(&mut self, text: &str) -> VMResult<()> {
        writeln!(self.output, "{}", text)
            .map_err(|e| RuntimeError::new(format!("cannot write output: {}", e), self.op_ip))
    }

    /// Structural equality. Both sides must have the same type.
    pub fn values_equal(&self, a: Value, b: Value) -> VMResult<bool> {
        let equal = match (a, b) {
            (Value::Unit, Value::Unit) => true,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x == y,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Str(x), Value::Str(y)) => x == y || self.string_of(a)? == self.string_of(b)?,
            (Value::List(x), Value::List(y)) | (Value::Object(x), Value::Object(y)) => {
                if x == y {
                    return Ok(true);
                }
                let (left, right) = (self.object(x)?, self.object(y)?);
                if left.tag != right.tag || left.slots.len() != right.slots.len() {
                    return Ok(false);
                }
                for (l, r) in left.slots.iter().zip(&right.slots) {
                    if !self.values_equal(*l, *r)? {
                        return Ok(false);
                    }
                }
                true
            }
            (Value::Closure(x), Value::Closure(y)) => x == y,
            (Value::Builtin(x), Value::Builtin(y)) => x == y,
            _ => {
                return Err(RuntimeError::type_mismatch(
                    a.type_name(),
                    b.type_name(),
                    self.op_ip,
                ))
            }
        };
        Ok(equal)
    }

    // ===== Dispatch loop =====

    /// Execute until the frame stack drops back to `exit_depth`, or until
    /// top-level code reaches the end of the Text section.
    fn execute(&mut self, exit_depth: usize) -> VMResult<()> {
        loop {
            if self.frames.len() == 1 && self.ip >= self.text_end {
                return Ok(());
            }

            self.op_ip = self.ip;
            let word = self.read_word()?;
            let op = OpCode::from_word(word).ok_or(FormatError::UnknownOpcode {
                word,
                offset: self.op_ip,
            })?;

            match op {
                OpCode::Push => {
                    let offset = self.ip;
                    let word = self.read_word()?;
                    let value = NaNValue::from_word(word)
                        .to_value()
                        .ok_or(FormatError::BadOperand {
                            value: word,
                            offset,
                        })?;
                    self.push(value)?;
                }

                OpCode::Pop => {
                    self.pop()?;
                }

                OpCode::Call => {
                    let argc = self.read_index()?;
                    self.call(argc)?;
                }

                OpCode::Ret => {
                    self.return_from_frame()?;
                    if self.frames.len() <= exit_depth {
                        return Ok(());
                    }
                }

                OpCode::LoadString => {
                    let id = self.read_string_id()?;
                    self.push(Value::Str(StrRef(id)))?;
                }

                OpCode::Lookup => {
                    let symbol = self.read_string_id()?;
                    let slot = self.read_cache_slot()?;
                    let value = self.lookup(symbol, slot)?;
                    self.push(value)?;
                }

                OpCode::CreateClosure => {
                    let offset = self.ip;
                    let function = self.read_word()?;
                    if usize::try_from(function)
                        .ok()
                        .filter(|f| *f < self.functions.len())
                        .is_none()
                    {
                        return Err(FormatError::BadFunctionId {
                            id: function,
                            offset,
                        }
                        .into());
                    }
                    let captures = self.read_word()? != 0;
                    let scope = if captures {
                        self.frame()?.scope
                    } else {
                        GLOBAL_SCOPE
                    };
                    self.push(Value::Closure(Closure {
                        function: function as u32,
                        scope,
                    }))?;
                }

                OpCode::Jmp => {
                    self.ip = self.read_jump()?;
                }

                OpCode::Jz => {
                    let target = self.read_jump()?;
                    if self.pop()?.is_zero() {
                        self.ip = target;
                    }
                }

                OpCode::MatchFail => {
                    return Err(RuntimeError::MatchFailed { ip: self.op_ip });
                }

                OpCode::PushArg => {
                    let index = self.read_index()?;
                    let frame = *self.frame()?;
                    if index >= frame.argc {
                        return Err(RuntimeError::IndexOutOfBounds {
                            index: index as i64,
                            length: frame.argc,
                            ip: self.op_ip,
                        });
                    }
                    let value = self.stack[frame.args_base() + index];
                    self.push(value)?;
                }

                OpCode::PutToScope => {
                    let name = self.read_string_id()?;
                    let frame = *self.frame()?;
                    let index = frame
                        .function
                        .and_then(|f| self.functions.get(f as usize))
                        .and_then(|f| f.params.iter().position(|p| *p == name))
                        .ok_or_else(|| {
                            RuntimeError::new("put_to_scope names no parameter", self.op_ip)
                        })?;
                    let value = self.stack[frame.args_base() + index];
                    self.bind(frame.scope, name, value)?;
                }

                OpCode::Bind => {
                    let name = self.read_string_id()?;
                    let value = self.pop()?;
                    let scope = self.frame()?.scope;
                    self.bind(scope, name, value)?;
                }

                OpCode::AllocObj => {
                    let size = self.read_index()?;
                    let tag = self.read_tag()?;
                    self.check_heap()?;
                    let handle = self.heap.alloc_object(tag, size);
                    self.push(Value::Object(handle))?;
                }

                OpCode::AllocList => {
                    let size = self.read_index()?;
                    self.check_heap()?;
                    let handle = self.heap.alloc_object(LIST_TAG, size);
                    self.push(Value::List(handle))?;
                }

                OpCode::ObjStoreAt => {
                    let index = self.read_index()?;
                    let value = self.pop()?;
                    let handle = self.object_handle(*self.peek()?)?;
                    let ip = self.op_ip;
                    let object = self
                        .heap
                        .object_mut(handle)
                        .ok_or(RuntimeError::BadHandle {
                            handle: handle.0,
                            ip,
                        })?;
                    let length = object.slots.len();
                    let slot = object
                        .slots
                        .get_mut(index)
                        .ok_or(RuntimeError::IndexOutOfBounds {
                            index: index as i64,
                            length,
                            ip,
                        })?;
                    *slot = value;
                }

                OpCode::ObjTagTest => {
                    let tag = self.read_tag()?;
                    let value = self.pop()?;
                    let matches = match value {
                        Value::Object(handle) => self.object(handle)?.tag == tag,
                        other => {
                            return Err(RuntimeError::type_mismatch(
                                "Object",
                                other.type_name(),
                                self.op_ip,
                            ))
                        }
                    };
                    self.push(Value::Bool(matches))?;
                }

                OpCode::ObjLoad => {
                    let index = self.read_index()?;
                    let value = self.pop()?;
                    let object = self.object(self.object_handle(value)?)?;
                    let field = object.slots.get(index).copied().ok_or(
                        RuntimeError::IndexOutOfBounds {
                            index: index as i64,
                            length: object.slots.len(),
                            ip: self.op_ip,
                        },
                    )?;
                    self.push(field)?;
                }

                OpCode::StackAlloc => {
                    let size = self.read_index()?;
                    let new_len = self.locals.len() + size;
                    if new_len > self.config.max_stack {
                        return Err(RuntimeError::StackOverflow {
                            limit: self.config.max_stack,
                            ip: self.op_ip,
                        });
                    }
                    self.locals.resize(new_len, Value::Unit);
                }

                OpCode::StackStore => {
                    let index = self.local_index()?;
                    let value = self.pop()?;
                    self.locals[index] = value;
                }

                OpCode::StackLoad => {
                    let index = self.local_index()?;
                    let value = self.locals[index];
                    self.push(value)?;
                }

                OpCode::StackFree => {
                    let size = self.read_index()?;
                    let base = self.frame()?.locals_base;
                    let owned = self.locals.len() - base;
                    if size > owned {
                        return Err(RuntimeError::SlotOutOfBounds {
                            slot: size as i64,
                            ip: self.op_ip,
                        });
                    }
                    self.locals.truncate(self.locals.len() - size);
                }

                OpCode::Add => self.int_op(i64::wrapping_add)?,
                OpCode::Sub => self.int_op(i64::wrapping_sub)?,
                OpCode::Mul => self.int_op(i64::wrapping_mul)?,
                OpCode::Div => self.int_division(i64::wrapping_div)?,
                OpCode::Mod => self.int_division(i64::wrapping_rem)?,
                OpCode::Neg => {
                    let n = self.pop_int()?;
                    self.push(Value::Int(n.wrapping_neg()))?;
                }

                OpCode::FAdd => self.float_op(|a, b| a + b)?,
                OpCode::FSub => self.float_op(|a, b| a - b)?,
                OpCode::FMul => self.float_op(|a, b| a * b)?,
                OpCode::FDiv => self.float_op(|a, b| a / b)?,
                OpCode::FNeg => {
                    let x = self.pop_float()?;
                    self.push(Value::Float(-x))?;
                }

                OpCode::Lt => self.int_compare(|a, b| a < b)?,
                OpCode::Gt => self.int_compare(|a, b| a > b)?,
                OpCode::Lte => self.int_compare(|a, b| a <= b)?,
                OpCode::Gte => self.int_compare(|a, b| a >= b)?,
                OpCode::FLt => self.float_compare(|a, b| a < b)?,
                OpCode::FGt => self.float_compare(|a, b| a > b)?,
                OpCode::FLte => self.float_compare(|a, b| a <= b)?,
                OpCode::FGte => self.float_compare(|a, b| a >= b)?,

                OpCode::Eq | OpCode::Neq => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let equal = self.values_equal(a, b)?;
                    self.push(Value::Bool(if op == OpCode::Eq { equal } else { !equal }))?;
                }

                OpCode::Not => {
                    let value = self.pop()?;
                    let b = value.as_bool().ok_or_else(|| {
                        RuntimeError::type_mismatch("Bool", value.type_name(), self.op_ip)
                    })?;
                    self.push(Value::Bool(!b))?;
                }
            }
        }
    }

    // ===== Calls =====

    /// Call the value below the top `argc` operands. Builtins run to
    /// completion here; closures get a frame and continue in the loop.
    fn call(&mut self, argc: usize) -> VMResult<()> {
        let ip = self.op_ip;
        let callee_slot = self
            .stack
            .len()
            .checked_sub(argc + 1)
            .ok_or(RuntimeError::StackUnderflow { ip })?;

        match self.stack[callee_slot] {
            Value::Builtin(id) => {
                let builtin = builtins::get(id).ok_or(RuntimeError::BadHandle {
                    handle: id.0 as u32,
                    ip,
                })?;
                if builtin.arity != argc {
                    return Err(RuntimeError::wrong_arity(builtin.arity, argc, ip));
                }
                let args = self.stack.split_off(callee_slot + 1);
                self.stack.pop();
                let result = (builtin.function)(&args, self)?;
                // A nested call may have moved the recorded instruction.
                self.op_ip = ip;
                self.push(result)
            }
            Value::Closure(closure) => {
                let Some(function) = self.functions.get(closure.function as usize) else {
                    return Err(RuntimeError::BadHandle {
                        handle: closure.function,
                        ip,
                    });
                };
                if function.params.len() != argc {
                    return Err(RuntimeError::wrong_arity(function.params.len(), argc, ip));
                }
                if self.frames.len() >= self.config.max_frames {
                    return Err(RuntimeError::FrameOverflow {
                        limit: self.config.max_frames,
                        ip,
                    });
                }
                let entry = function.entry;
                let scope = if function.needs_scope {
                    self.heap.new_scope(closure.scope)
                } else {
                    closure.scope
                };
                tracing::trace!(function = closure.function, argc, "call");
                self.frames.push(CallFrame {
                    function: Some(closure.function),
                    return_ip: self.ip,
                    callee_slot,
                    argc,
                    locals_base: self.locals.len(),
                    scope,
                });
                self.ip = entry;
                Ok(())
            }
            other => Err(RuntimeError::NotCallable {
                found: other.type_name(),
                ip,
            }),
        }
    }

    fn return_from_frame(&mut self) -> VMResult<()> {
        let ip = self.op_ip;
        let result = self.pop()?;
        let frame = match self.frames.last() {
            Some(frame) if frame.function.is_some() => *frame,
            _ => return Err(RuntimeError::new("ret outside of a function", ip)),
        };
        if self.locals.len() != frame.locals_base {
            return Err(RuntimeError::UnbalancedSlots {
                leaked: self.locals.len().saturating_sub(frame.locals_base),
                ip,
            });
        }
        self.frames.pop();
        self.stack.truncate(frame.callee_slot);
        self.ip = frame.return_ip;
        self.push(result)
    }

    // ===== Names =====

    fn lookup(&mut self, symbol: u32, slot: usize) -> VMResult<Value> {
        let scope = self.frame()?.scope;
        match self.cache[slot] {
            CacheEntry::Builtin(id) => return Ok(Value::Builtin(id)),
            CacheEntry::Scope { hops, index } => {
                let cached = self
                    .heap
                    .ancestor(scope, hops as usize)
                    .and_then(|s| self.heap.scope(s))
                    .and_then(|s| s.bindings.get(index as usize))
                    .filter(|(name, _)| *name == symbol);
                if let Some((_, value)) = cached {
                    return Ok(*value);
                }
            }
            CacheEntry::Empty => {}
        }

        let name = self.heap.string(StrRef(symbol)).unwrap_or_default();
        let (entry, value) = match self.heap.resolve(scope, symbol) {
            Some((hops, index)) => {
                let value = self
                    .heap
                    .ancestor(scope, hops)
                    .and_then(|s| self.heap.scope(s))
                    .and_then(|s| s.bindings.get(index))
                    .map(|(_, v)| *v)
                    .unwrap_or_default();
                let entry = CacheEntry::Scope {
                    hops: hops as u32,
                    index: index as u32,
                };
                (entry, value)
            }
            None => match builtins::lookup(name) {
                Some(id) => (CacheEntry::Builtin(id), Value::Builtin(id)),
                None => {
                    return Err(RuntimeError::UndefinedName {
                        name: name.to_string(),
                        ip: self.op_ip,
                    })
                }
            },
        };
        tracing::trace!(slot, name, ?entry, "populated lookup cache");
        self.cache[slot] = entry;
        Ok(value)
    }

    fn bind(&mut self, scope: ScopeRef, name: u32, value: Value) -> VMResult<()> {
        self.heap
            .bind(scope, name, value)
            .map(|_| ())
            .ok_or(RuntimeError::BadHandle {
                handle: scope.0,
                ip: self.op_ip,
            })
    }

    // ===== Operand decoding =====

    fn read_word(&mut self) -> VMResult<i64> {
        let mut reader = Reader::at(&self.code, self.ip);
        let word = reader.read_word()?;
        self.ip += WORD_SIZE;
        Ok(word)
    }

    fn read_index(&mut self) -> VMResult<usize> {
        let mut reader = Reader::at(&self.code, self.ip);
        let index = reader.read_index()?;
        self.ip += WORD_SIZE;
        Ok(index)
    }

    fn read_string_id(&mut self) -> VMResult<u32> {
        let offset = self.ip;
        let id = self.read_word()?;
        if usize::try_from(id)
            .ok()
            .filter(|id| *id < self.string_count)
            .is_none()
        {
            return Err(FormatError::BadStringId { id, offset }.into());
        }
        Ok(id as u32)
    }

    fn read_cache_slot(&mut self) -> VMResult<usize> {
        let offset = self.ip;
        let slot = self.read_index()?;
        if slot >= self.cache.len() {
            return Err(FormatError::BadOperand {
                value: slot as i64,
                offset,
            }
            .into());
        }
        Ok(slot)
    }

    fn read_tag(&mut self) -> VMResult<u32> {
        let offset = self.ip;
        let value = self.read_word()?;
        u32::try_from(value).map_err(|_| FormatError::BadOperand { value, offset }.into())
    }

    fn read_jump(&mut self) -> VMResult<usize> {
        let offset = self.ip;
        let stored = self.read_word()?;
        format::jump_target(offset, stored)
            .filter(|target| *target <= self.code.len())
            .ok_or_else(|| {
                FormatError::BadJumpTarget {
                    target: (offset as i64).wrapping_add(stored),
                    offset,
                }
                .into()
            })
    }

    fn local_index(&mut self) -> VMResult<usize> {
        let slot = self.read_index()?;
        let index = self.frame()?.locals_base + slot;
        if index >= self.locals.len() {
            return Err(RuntimeError::SlotOutOfBounds {
                slot: slot as i64,
                ip: self.op_ip,
            });
        }
        Ok(index)
    }

    // ===== Stack =====

    fn frame(&self) -> VMResult<&CallFrame> {
        self.frames
            .last()
            .ok_or_else(|| RuntimeError::new("no active frame", self.op_ip))
    }

    fn push(&mut self, value: Value) -> VMResult<()> {
        if self.stack.len() >= self.config.max_stack {
            return Err(RuntimeError::StackOverflow {
                limit: self.config.max_stack,
                ip: self.op_ip,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> VMResult<Value> {
        self.stack
            .pop()
            .ok_or(RuntimeError::StackUnderflow { ip: self.op_ip })
    }

    fn peek(&self) -> VMResult<&Value> {
        self.stack
            .last()
            .ok_or(RuntimeError::StackUnderflow { ip: self.op_ip })
    }

    fn pop_int(&mut self) -> VMResult<i64> {
        let value = self.pop()?;
        value
            .as_int()
            .ok_or_else(|| RuntimeError::type_mismatch("Int", value.type_name(), self.op_ip))
    }

    fn pop_float(&mut self) -> VMResult<f64> {
        let value = self.pop()?;
        value
            .as_float()
            .ok_or_else(|| RuntimeError::type_mismatch("Float", value.type_name(), self.op_ip))
    }

    fn int_op<F>(&mut self, op: F) -> VMResult<()>
    where
        F: FnOnce(i64, i64) -> i64,
    {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        self.push(Value::Int(op(a, b)))
    }

    /// `div` / `mod`; `i64::MIN / -1` wraps.
    fn int_division<F>(&mut self, op: F) -> VMResult<()>
    where
        F: FnOnce(i64, i64) -> i64,
    {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        if b == 0 {
            return Err(RuntimeError::DivisionByZero { ip: self.op_ip });
        }
        self.push(Value::Int(op(a, b)))
    }

    fn float_op<F>(&mut self, op: F) -> VMResult<()>
    where
        F: FnOnce(f64, f64) -> f64,
    {
        let b = self.pop_float()?;
        let a = self.pop_float()?;
        self.push(Value::Float(op(a, b)))
    }

    fn int_compare<F>(&mut self, op: F) -> VMResult<()>
    where
        F: FnOnce(i64, i64) -> bool,
    {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        self.push(Value::Bool(op(a, b)))
    }

    fn float_compare<F>(&mut self, op: F) -> VMResult<()>
    where
        F: FnOnce(f64, f64) -> bool,
    {
        let b = self.pop_float()?;
        let a = self.pop_float()?;
        self.push(Value::Bool(op(a, b)))
    }

    // ===== Heap =====

    fn check_heap(&self) -> VMResult<()> {
        if self.heap.len() >= self.config.max_heap_objects {
            return Err(RuntimeError::HeapExhausted {
                limit: self.config.max_heap_objects,
                ip: self.op_ip,
            });
        }
        Ok(())
    }

    fn object(&self, handle: ObjRef) -> VMResult<&HeapObject> {
        self.heap.object(handle).ok_or(RuntimeError::BadHandle {
            handle: handle.0,
            ip: self.op_ip,
        })
    }

    fn object_handle(&self, value: Value) -> VMResult<ObjRef> {
        match value {
            Value::Object(handle) | Value::List(handle) => Ok(handle),
            other => Err(RuntimeError::type_mismatch(
                "Object",
                other.type_name(),
                self.op_ip,
            )),
        }
    }
}

/// Function table with each function's scope requirement, found by scanning
/// its body for instructions that bind names or capture the frame scope.
fn function_table(code: &[u8], image: &Image) -> Result<Vec<FunctionInfo>, FormatError> {
    image
        .functions
        .iter()
        .map(|entry| {
            let mut reader = Reader::at(code, entry.entry);
            let mut needs_scope = false;
            while reader.offset() < entry.end {
                let op = reader.read_opcode()?;
                let mut operands = [0i64; 2];
                for operand in operands.iter_mut().take(op.operand_count()) {
                    *operand = reader.read_word()?;
                }
                needs_scope |= match op {
                    OpCode::PutToScope | OpCode::Bind => true,
                    OpCode::CreateClosure => operands[1] != 0,
                    _ => false,
                };
            }
            Ok(FunctionInfo {
                name: entry.name,
                params: entry.params.clone(),
                entry: entry.entry,
                needs_scope,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests;
