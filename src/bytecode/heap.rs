//! Arena heap for strings, objects, lists and captured scopes.
//!
//! Everything is append-only for the lifetime of a VM; handles are plain
//! indices and stay valid until the heap is dropped.

use crate::bytecode::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeRef(pub u32);

/// Tag used for list objects.
pub const LIST_TAG: u32 = u32::MAX;

/// The scope holding top-level functions and `let` bindings.
pub const GLOBAL_SCOPE: ScopeRef = ScopeRef(0);

#[derive(Debug, Clone, PartialEq)]
pub struct HeapObject {
    pub tag: u32,
    pub slots: Vec<Value>,
}

/// A link in a scope chain. Bindings are keyed by string-table id; a later
/// binding of the same name shadows an earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub parent: Option<ScopeRef>,
    pub bindings: Vec<(u32, Value)>,
}

impl Scope {
    /// Index of the newest binding of `name`.
    pub fn position(&self, name: u32) -> Option<usize> {
        self.bindings.iter().rposition(|(n, _)| *n == name)
    }
}

#[derive(Debug, Clone)]
pub struct Heap {
    strings: Vec<String>,
    objects: Vec<HeapObject>,
    scopes: Vec<Scope>,
}

impl Heap {
    /// A heap whose first strings are `table`, so that string id `n`
    /// is `StrRef(n)`, and whose only scope is the global one.
    pub fn with_strings(table: Vec<String>) -> Self {
        Self {
            strings: table,
            objects: Vec::new(),
            scopes: vec![Scope::default()],
        }
    }

    /// Drop everything allocated after load: strings past the first
    /// `table_len`, every object and list, and every scope but an empty
    /// global one.
    pub fn reset(&mut self, table_len: usize) {
        self.strings.truncate(table_len);
        self.objects.clear();
        self.scopes.clear();
        self.scopes.push(Scope::default());
    }

    /// Strings, objects and lists allocated so far.
    pub fn len(&self) -> usize {
        self.strings.len() + self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn alloc_string(&mut self, text: String) -> StrRef {
        self.strings.push(text);
        StrRef(self.strings.len() as u32 - 1)
    }

    pub fn string(&self, handle: StrRef) -> Option<&str> {
        self.strings.get(handle.0 as usize).map(String::as_str)
    }

    pub fn alloc_object(&mut self, tag: u32, size: usize) -> ObjRef {
        self.objects.push(HeapObject {
            tag,
            slots: vec![Value::Unit; size],
        });
        ObjRef(self.objects.len() as u32 - 1)
    }

    /// A list object filled from `items`.
    pub fn alloc_list(&mut self, items: Vec<Value>) -> ObjRef {
        self.objects.push(HeapObject {
            tag: LIST_TAG,
            slots: items,
        });
        ObjRef(self.objects.len() as u32 - 1)
    }

    pub fn object(&self, handle: ObjRef) -> Option<&HeapObject> {
        self.objects.get(handle.0 as usize)
    }

    pub fn object_mut(&mut self, handle: ObjRef) -> Option<&mut HeapObject> {
        self.objects.get_mut(handle.0 as usize)
    }

    pub fn new_scope(&mut self, parent: ScopeRef) -> ScopeRef {
        self.scopes.push(Scope {
            parent: Some(parent),
            bindings: Vec::new(),
        });
        ScopeRef(self.scopes.len() as u32 - 1)
    }

    pub fn scope(&self, handle: ScopeRef) -> Option<&Scope> {
        self.scopes.get(handle.0 as usize)
    }

    /// Append a binding and return its index within the scope.
    pub fn bind(&mut self, scope: ScopeRef, name: u32, value: Value) -> Option<usize> {
        let scope = self.scopes.get_mut(scope.0 as usize)?;
        scope.bindings.push((name, value));
        Some(scope.bindings.len() - 1)
    }

    /// The scope `hops` links up the chain from `start`.
    pub fn ancestor(&self, start: ScopeRef, hops: usize) -> Option<ScopeRef> {
        let mut current = start;
        for _ in 0..hops {
            current = self.scope(current)?.parent?;
        }
        Some(current)
    }

    /// Walk the chain from `start`; returns the number of links crossed and
    /// the binding index of the first scope binding `name`.
    pub fn resolve(&self, start: ScopeRef, name: u32) -> Option<(usize, usize)> {
        let mut current = Some(start);
        let mut hops = 0;
        while let Some(handle) = current {
            let scope = self.scope(handle)?;
            if let Some(index) = scope.position(name) {
                return Some((hops, index));
            }
            current = scope.parent;
            hops += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_table_is_preinterned() {
        let mut heap = Heap::with_strings(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(heap.string(StrRef(1)), Some("b"));
        let s = heap.alloc_string("c".to_string());
        assert_eq!(s, StrRef(2));
        assert_eq!(heap.len(), 3);
    }

    #[test]
    fn test_scope_chain_resolution() {
        let mut heap = Heap::with_strings(Vec::new());
        heap.bind(GLOBAL_SCOPE, 1, Value::Int(10));
        let inner = heap.new_scope(GLOBAL_SCOPE);
        heap.bind(inner, 2, Value::Int(20));

        assert_eq!(heap.resolve(inner, 2), Some((0, 0)));
        assert_eq!(heap.resolve(inner, 1), Some((1, 0)));
        assert_eq!(heap.resolve(inner, 3), None);
        assert_eq!(heap.ancestor(inner, 1), Some(GLOBAL_SCOPE));
        assert_eq!(heap.ancestor(inner, 2), None);
    }

    #[test]
    fn test_shadowing_binding_wins() {
        let mut heap = Heap::with_strings(Vec::new());
        heap.bind(GLOBAL_SCOPE, 1, Value::Int(1));
        heap.bind(GLOBAL_SCOPE, 1, Value::Int(2));
        assert_eq!(heap.resolve(GLOBAL_SCOPE, 1), Some((0, 1)));
    }

    #[test]
    fn test_reset_keeps_string_table() {
        let mut heap = Heap::with_strings(vec!["a".to_string()]);
        heap.alloc_string("b".to_string());
        heap.alloc_object(0, 1);
        heap.bind(GLOBAL_SCOPE, 0, Value::Int(1));
        heap.new_scope(GLOBAL_SCOPE);

        heap.reset(1);
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.string(StrRef(0)), Some("a"));
        assert_eq!(heap.resolve(GLOBAL_SCOPE, 0), None);
        assert!(heap.scope(ScopeRef(1)).is_none());
    }

    #[test]
    fn test_objects() {
        let mut heap = Heap::with_strings(Vec::new());
        let obj = heap.alloc_object(3, 2);
        heap.object_mut(obj).unwrap().slots[1] = Value::Bool(true);
        let object = heap.object(obj).unwrap();
        assert_eq!(object.tag, 3);
        assert_eq!(object.slots, vec![Value::Unit, Value::Bool(true)]);
        assert!(heap.object(ObjRef(9)).is_none());
    }
}
