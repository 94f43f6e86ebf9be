//! Runtime values.
//!
//! Values are small and `Copy`: anything larger than a word lives in the
//! [`Heap`](crate::bytecode::heap::Heap) and is referenced by handle.

use std::fmt;

use crate::bytecode::heap::{ObjRef, ScopeRef, StrRef};

/// Index into the builtin registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuiltinId(pub u16);

/// A function paired with the scope it was created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closure {
    pub function: u32,
    pub scope: ScopeRef,
}

/// A value on the operand stack, in a local slot, a scope or an object.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    #[default]
    Unit,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(StrRef),
    List(ObjRef),
    Object(ObjRef),
    Closure(Closure),
    Builtin(BuiltinId),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "Unit",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Object(_) => "Object",
            Value::Closure(_) | Value::Builtin(_) => "Function",
        }
    }

    /// `jz` takes the branch on exactly these two values.
    pub fn is_zero(&self) -> bool {
        matches!(self, Value::Int(0) | Value::Bool(false))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Handle-level rendering; [`Vm::display`](crate::bytecode::vm::Vm::display)
/// renders heap contents.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Int(n) => f.write_str(itoa::Buffer::new().format(*n)),
            Value::Float(x) => f.write_str(ryu::Buffer::new().format(*x)),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "<string {}>", s.0),
            Value::List(o) => write!(f, "<list {}>", o.0),
            Value::Object(o) => write!(f, "<object {}>", o.0),
            Value::Closure(c) => write!(f, "<fn {}>", c.function),
            Value::Builtin(b) => write!(f, "<builtin {}>", b.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_zero() {
        assert!(Value::Int(0).is_zero());
        assert!(Value::Bool(false).is_zero());
        assert!(!Value::Int(1).is_zero());
        assert!(!Value::Unit.is_zero());
        assert!(!Value::Float(0.0).is_zero());
    }

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Unit.to_string(), "()");
    }
}
