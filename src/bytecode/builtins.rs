//! Native functions reachable through `lookup`.
//!
//! A builtin receives its arguments and the VM, which it may call back into
//! (`map`, `filter`, `fold`).

use crate::bytecode::value::{BuiltinId, Value};
use crate::bytecode::vm::{VMResult, Vm};
use crate::error::RuntimeError;

pub type BuiltinFn = fn(&[Value], &mut Vm) -> VMResult<Value>;

pub struct Builtin {
    pub name: &'static str,
    pub arity: usize,
    pub function: BuiltinFn,
}

pub static BUILTINS: &[Builtin] = &[
    Builtin { name: "print", arity: 1, function: print },
    Builtin { name: "concat", arity: 2, function: concat },
    Builtin { name: "head", arity: 1, function: head },
    Builtin { name: "tail", arity: 1, function: tail },
    Builtin { name: "length", arity: 1, function: length },
    Builtin { name: "count", arity: 1, function: count },
    Builtin { name: "at", arity: 2, function: at },
    Builtin { name: "substr", arity: 3, function: substr },
    Builtin { name: "int_to_string", arity: 1, function: int_to_string },
    Builtin { name: "float_to_string", arity: 1, function: float_to_string },
    Builtin { name: "add", arity: 2, function: add },
    Builtin { name: "sub", arity: 2, function: sub },
    Builtin { name: "mul", arity: 2, function: mul },
    Builtin { name: "div", arity: 2, function: div },
    Builtin { name: "mod", arity: 2, function: modulo },
    Builtin { name: "lt", arity: 2, function: lt },
    Builtin { name: "gt", arity: 2, function: gt },
    Builtin { name: "lte", arity: 2, function: lte },
    Builtin { name: "gte", arity: 2, function: gte },
    Builtin { name: "equals", arity: 2, function: equals },
    Builtin { name: "not_equal", arity: 2, function: not_equal },
    Builtin { name: "and", arity: 2, function: and },
    Builtin { name: "or", arity: 2, function: or },
    Builtin { name: "not", arity: 1, function: not },
    Builtin { name: "minus", arity: 1, function: minus },
    Builtin { name: "heap_size", arity: 0, function: heap_size },
    Builtin { name: "map", arity: 2, function: map },
    Builtin { name: "filter", arity: 2, function: filter },
    Builtin { name: "fold", arity: 3, function: fold },
];

/// Registry id of the builtin called `name`.
pub fn lookup(name: &str) -> Option<BuiltinId> {
    BUILTINS
        .iter()
        .position(|b| b.name == name)
        .map(|index| BuiltinId(index as u16))
}

pub fn get(id: BuiltinId) -> Option<&'static Builtin> {
    BUILTINS.get(id.0 as usize)
}

// ============ Argument helpers ============

fn int_arg(vm: &Vm, value: Value) -> VMResult<i64> {
    value
        .as_int()
        .ok_or_else(|| RuntimeError::type_mismatch("Int", value.type_name(), vm.fault_ip()))
}

fn bool_arg(vm: &Vm, value: Value) -> VMResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| RuntimeError::type_mismatch("Bool", value.type_name(), vm.fault_ip()))
}

fn int_pair(args: &[Value], vm: &Vm) -> VMResult<(i64, i64)> {
    Ok((int_arg(vm, args[0])?, int_arg(vm, args[1])?))
}

// ============ Strings ============

fn print(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let text = vm.string_of(args[0])?.to_string();
    vm.write_line(&text)?;
    Ok(Value::Unit)
}

fn concat(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let mut text = vm.string_of(args[0])?.to_string();
    text.push_str(vm.string_of(args[1])?);
    vm.alloc_string(text)
}

fn count(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let length = vm.string_of(args[0])?.chars().count();
    Ok(Value::Int(length as i64))
}

/// `substr(s, start, length)` over characters; the length is clamped to the
/// end of the string.
fn substr(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let start = int_arg(vm, args[1])?;
    let length = int_arg(vm, args[2])?;
    let text = vm.string_of(args[0])?;
    let total = text.chars().count();
    if start < 0 || start as usize > total || length < 0 {
        return Err(RuntimeError::IndexOutOfBounds {
            index: start,
            length: total,
            ip: vm.fault_ip(),
        });
    }
    let piece: String = text
        .chars()
        .skip(start as usize)
        .take(length as usize)
        .collect();
    vm.alloc_string(piece)
}

fn int_to_string(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let n = int_arg(vm, args[0])?;
    vm.alloc_string(itoa::Buffer::new().format(n).to_string())
}

fn float_to_string(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let x = args[0]
        .as_float()
        .ok_or_else(|| RuntimeError::type_mismatch("Float", args[0].type_name(), vm.fault_ip()))?;
    vm.alloc_string(ryu::Buffer::new().format(x).to_string())
}

// ============ Lists ============

fn head(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let items = vm.list_items(args[0])?;
    items.first().copied().ok_or(RuntimeError::IndexOutOfBounds {
        index: 0,
        length: 0,
        ip: vm.fault_ip(),
    })
}

fn tail(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let items = vm.list_items(args[0])?;
    let rest = items.get(1..).unwrap_or_default().to_vec();
    vm.alloc_list(rest)
}

fn length(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    Ok(Value::Int(vm.list_items(args[0])?.len() as i64))
}

fn at(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let index = int_arg(vm, args[1])?;
    let items = vm.list_items(args[0])?;
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i).copied())
        .ok_or(RuntimeError::IndexOutOfBounds {
            index,
            length: items.len(),
            ip: vm.fault_ip(),
        })
}

fn map(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let items = vm.list_items(args[0])?;
    let mut mapped = Vec::with_capacity(items.len());
    for item in items {
        mapped.push(vm.call_value(args[1], &[item])?);
    }
    vm.alloc_list(mapped)
}

fn filter(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let items = vm.list_items(args[0])?;
    let mut kept = Vec::new();
    for item in items {
        let keep = vm.call_value(args[1], &[item])?;
        if bool_arg(vm, keep)? {
            kept.push(item);
        }
    }
    vm.alloc_list(kept)
}

fn fold(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let items = vm.list_items(args[0])?;
    let mut acc = args[1];
    for item in items {
        acc = vm.call_value(args[2], &[acc, item])?;
    }
    Ok(acc)
}

// ============ Arithmetic & Logic ============

fn add(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let (a, b) = int_pair(args, vm)?;
    Ok(Value::Int(a.wrapping_add(b)))
}

fn sub(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let (a, b) = int_pair(args, vm)?;
    Ok(Value::Int(a.wrapping_sub(b)))
}

fn mul(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let (a, b) = int_pair(args, vm)?;
    Ok(Value::Int(a.wrapping_mul(b)))
}

fn div(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let (a, b) = int_pair(args, vm)?;
    if b == 0 {
        return Err(RuntimeError::DivisionByZero { ip: vm.fault_ip() });
    }
    Ok(Value::Int(a.wrapping_div(b)))
}

fn modulo(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let (a, b) = int_pair(args, vm)?;
    if b == 0 {
        return Err(RuntimeError::DivisionByZero { ip: vm.fault_ip() });
    }
    Ok(Value::Int(a.wrapping_rem(b)))
}

fn lt(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let (a, b) = int_pair(args, vm)?;
    Ok(Value::Bool(a < b))
}

fn gt(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let (a, b) = int_pair(args, vm)?;
    Ok(Value::Bool(a > b))
}

fn lte(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let (a, b) = int_pair(args, vm)?;
    Ok(Value::Bool(a <= b))
}

fn gte(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    let (a, b) = int_pair(args, vm)?;
    Ok(Value::Bool(a >= b))
}

fn equals(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    Ok(Value::Bool(vm.values_equal(args[0], args[1])?))
}

fn not_equal(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    Ok(Value::Bool(!vm.values_equal(args[0], args[1])?))
}

fn and(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    Ok(Value::Bool(bool_arg(vm, args[0])? && bool_arg(vm, args[1])?))
}

fn or(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    Ok(Value::Bool(bool_arg(vm, args[0])? || bool_arg(vm, args[1])?))
}

fn not(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    Ok(Value::Bool(!bool_arg(vm, args[0])?))
}

fn minus(args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    Ok(Value::Int(int_arg(vm, args[0])?.wrapping_neg()))
}

fn heap_size(_args: &[Value], vm: &mut Vm) -> VMResult<Value> {
    Ok(Value::Int(vm.heap().len() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::environment::TypeEnvironment;

    #[test]
    fn test_registry_matches_static_signatures() {
        let env = TypeEnvironment::new();
        for name in env.builtin_names() {
            let id = lookup(name).unwrap_or_else(|| panic!("no runtime builtin '{}'", name));
            let builtin = get(id).unwrap();
            assert_eq!(
                builtin.arity,
                env.builtin(name).unwrap().params.len(),
                "arity of {}",
                name
            );
        }
        assert_eq!(env.builtin_names().count(), BUILTINS.len());
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(lookup("no_such_builtin").is_none());
    }
}
