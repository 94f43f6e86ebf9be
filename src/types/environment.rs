//! Declaration tables consulted by the resolver.

use std::collections::HashMap;

use crate::ast::FunctionDecl;
use crate::types::type_repr::Type;

/// A function signature; `generics` name the type variables it quantifies.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub generics: Vec<String>,
    pub params: Vec<Type>,
    pub return_type: Type,
}

impl Signature {
    pub fn new(params: Vec<Type>, return_type: Type) -> Self {
        Self {
            generics: Vec::new(),
            params,
            return_type,
        }
    }

    pub fn generic(generics: &[&str], params: Vec<Type>, return_type: Type) -> Self {
        Self {
            generics: generics.iter().map(|g| g.to_string()).collect(),
            params,
            return_type,
        }
    }

    pub fn as_type(&self) -> Type {
        Type::function(self.params.clone(), self.return_type.clone())
    }
}

/// One constructor of a declared enum.
#[derive(Debug, Clone)]
pub struct ConstructorInfo {
    pub enum_name: String,
    pub enum_generics: Vec<String>,
    pub tag: u32,
    pub fields: Vec<Type>,
}

/// A declared interface.
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub name: String,
    pub type_param: String,
    /// Virtual functions, dispatched to an implementation.
    pub prototypes: HashMap<String, Signature>,
}

/// How a global function name is realised.
#[derive(Debug, Clone)]
pub enum GlobalFunction {
    /// Ordinary, non-generic function lowered as one unit.
    Plain(Signature),
    /// Generic template; lowered only through instances.
    Generic {
        signature: Signature,
        template: Box<FunctionDecl>,
    },
    /// Interface prototype; each call goes to an implementation.
    Virtual { interface: String },
}

/// Declarations visible program-wide.
#[derive(Debug, Default)]
pub struct TypeEnvironment {
    pub enums: HashMap<String, Vec<String>>,
    pub constructors: HashMap<String, ConstructorInfo>,
    pub interfaces: HashMap<String, InterfaceInfo>,
    /// (interface, type key, function name) -> mangled unit name and signature.
    pub implementations: HashMap<(String, String, String), (String, Signature)>,
    pub functions: HashMap<String, GlobalFunction>,
    /// Top-level `let` bindings.
    pub globals: HashMap<String, Type>,
    builtins: HashMap<&'static str, Signature>,
}

impl TypeEnvironment {
    pub fn new() -> Self {
        let mut env = Self::default();
        env.register_builtins();
        env
    }

    fn register_builtins(&mut self) {
        let t = || Type::var("T");
        let u = || Type::var("U");
        let int2 = || vec![Type::Int, Type::Int];

        let builtins = [
            ("print", Signature::new(vec![Type::String], Type::Unit)),
            (
                "concat",
                Signature::new(vec![Type::String, Type::String], Type::String),
            ),
            ("head", Signature::generic(&["T"], vec![Type::list(t())], t())),
            (
                "tail",
                Signature::generic(&["T"], vec![Type::list(t())], Type::list(t())),
            ),
            (
                "length",
                Signature::generic(&["T"], vec![Type::list(t())], Type::Int),
            ),
            ("count", Signature::new(vec![Type::String], Type::Int)),
            (
                "at",
                Signature::generic(&["T"], vec![Type::list(t()), Type::Int], t()),
            ),
            (
                "substr",
                Signature::new(vec![Type::String, Type::Int, Type::Int], Type::String),
            ),
            ("int_to_string", Signature::new(vec![Type::Int], Type::String)),
            (
                "float_to_string",
                Signature::new(vec![Type::Float], Type::String),
            ),
            ("add", Signature::new(int2(), Type::Int)),
            ("sub", Signature::new(int2(), Type::Int)),
            ("mul", Signature::new(int2(), Type::Int)),
            ("div", Signature::new(int2(), Type::Int)),
            ("mod", Signature::new(int2(), Type::Int)),
            ("lt", Signature::new(int2(), Type::Bool)),
            ("gt", Signature::new(int2(), Type::Bool)),
            ("lte", Signature::new(int2(), Type::Bool)),
            ("gte", Signature::new(int2(), Type::Bool)),
            (
                "equals",
                Signature::generic(&["T"], vec![t(), t()], Type::Bool),
            ),
            (
                "not_equal",
                Signature::generic(&["T"], vec![t(), t()], Type::Bool),
            ),
            ("and", Signature::new(vec![Type::Bool, Type::Bool], Type::Bool)),
            ("or", Signature::new(vec![Type::Bool, Type::Bool], Type::Bool)),
            ("not", Signature::new(vec![Type::Bool], Type::Bool)),
            ("minus", Signature::new(vec![Type::Int], Type::Int)),
            ("heap_size", Signature::new(vec![], Type::Int)),
            (
                "map",
                Signature::generic(
                    &["T", "U"],
                    vec![Type::list(t()), Type::function(vec![t()], u())],
                    Type::list(u()),
                ),
            ),
            (
                "filter",
                Signature::generic(
                    &["T"],
                    vec![Type::list(t()), Type::function(vec![t()], Type::Bool)],
                    Type::list(t()),
                ),
            ),
            (
                "fold",
                Signature::generic(
                    &["T", "U"],
                    vec![Type::list(t()), u(), Type::function(vec![u(), t()], u())],
                    u(),
                ),
            ),
        ];

        self.builtins.extend(builtins);
    }

    pub fn builtin(&self, name: &str) -> Option<&Signature> {
        self.builtins.get(name)
    }

    pub fn builtin_names(&self) -> impl Iterator<Item = &&'static str> {
        self.builtins.keys()
    }

    /// Resolve a `(interface, type, function)` triple to its implementation.
    pub fn implementation(
        &self,
        interface: &str,
        type_key: &str,
        function: &str,
    ) -> Option<&(String, Signature)> {
        self.implementations.get(&(
            interface.to_string(),
            type_key.to_string(),
            function.to_string(),
        ))
    }
}

/// Global name of the implementation of `function` for `type_key`.
pub fn implementation_name(function: &str, type_key: &str) -> String {
    format!("{}${}", function, type_key)
}

/// Global name of a generic instance.
pub fn instance_name(function: &str, type_args: &[Type]) -> String {
    let args: Vec<String> = type_args.iter().map(Type::key).collect();
    format!("{}${}", function, args.join(","))
}
