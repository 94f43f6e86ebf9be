//! Internal type representation used by the resolver.

use std::collections::HashMap;
use std::fmt;

/// Static types, as far as lowering needs them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    Unit,
    List(Box<Type>),
    /// An enum type, possibly applied to type arguments.
    Data {
        name: String,
        arguments: Vec<Type>,
    },
    Function {
        params: Vec<Type>,
        return_type: Box<Type>,
    },
    /// Generic type parameter, by name.
    Var(String),
    /// Not known statically.
    Unknown,
}

impl Type {
    pub fn function(params: Vec<Type>, return_type: Type) -> Type {
        Type::Function {
            params,
            return_type: Box::new(return_type),
        }
    }

    pub fn list(element: Type) -> Type {
        Type::List(Box::new(element))
    }

    pub fn var(name: &str) -> Type {
        Type::Var(name.to_string())
    }

    /// True when no type variable or unknown remains inside.
    pub fn is_concrete(&self) -> bool {
        match self {
            Type::Var(_) | Type::Unknown => false,
            Type::List(inner) => inner.is_concrete(),
            Type::Data { arguments, .. } => arguments.iter().all(Type::is_concrete),
            Type::Function {
                params,
                return_type,
            } => params.iter().all(Type::is_concrete) && return_type.is_concrete(),
            _ => true,
        }
    }

    /// Replace type variables bound in `bindings`.
    pub fn substitute(&self, bindings: &HashMap<String, Type>) -> Type {
        match self {
            Type::Var(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Type::List(inner) => Type::list(inner.substitute(bindings)),
            Type::Data { name, arguments } => Type::Data {
                name: name.clone(),
                arguments: arguments.iter().map(|a| a.substitute(bindings)).collect(),
            },
            Type::Function {
                params,
                return_type,
            } => Type::function(
                params.iter().map(|p| p.substitute(bindings)).collect(),
                return_type.substitute(bindings),
            ),
            _ => self.clone(),
        }
    }

    /// Match `self` (which may contain type variables) against an actual
    /// type, recording the first binding seen for each variable.
    pub fn bind_vars(&self, actual: &Type, bindings: &mut HashMap<String, Type>) {
        match (self, actual) {
            (_, Type::Unknown) => {}
            (Type::Var(name), _) => {
                bindings.entry(name.clone()).or_insert_with(|| actual.clone());
            }
            (Type::List(expected), Type::List(actual)) => expected.bind_vars(actual, bindings),
            (
                Type::Data {
                    name: expected_name,
                    arguments: expected,
                },
                Type::Data {
                    name: actual_name,
                    arguments: actual,
                },
            ) if expected_name == actual_name => {
                for (e, a) in expected.iter().zip(actual) {
                    e.bind_vars(a, bindings);
                }
            }
            (
                Type::Function {
                    params: expected_params,
                    return_type: expected_ret,
                },
                Type::Function {
                    params: actual_params,
                    return_type: actual_ret,
                },
            ) => {
                for (e, a) in expected_params.iter().zip(actual_params) {
                    e.bind_vars(a, bindings);
                }
                expected_ret.bind_vars(actual_ret, bindings);
            }
            _ => {}
        }
    }

    /// Name of the type for implementation lookup and instance mangling.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Bool => write!(f, "Bool"),
            Type::String => write!(f, "String"),
            Type::Unit => write!(f, "Unit"),
            Type::List(inner) => write!(f, "[{}]", inner),
            Type::Data { name, arguments } => {
                write!(f, "{}", name)?;
                if !arguments.is_empty() {
                    let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                    write!(f, "<{}>", args.join(", "))?;
                }
                Ok(())
            }
            Type::Function {
                params,
                return_type,
            } => {
                let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "({}) -> {}", params.join(", "), return_type)
            }
            Type::Var(name) => write!(f, "{}", name),
            Type::Unknown => write!(f, "?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_substitute() {
        let generic = Type::function(vec![Type::list(Type::var("T"))], Type::var("T"));
        let actual = Type::function(vec![Type::list(Type::Int)], Type::Unknown);
        let mut bindings = HashMap::new();
        generic.bind_vars(&actual, &mut bindings);
        assert_eq!(bindings.get("T"), Some(&Type::Int));
        assert_eq!(
            generic.substitute(&bindings),
            Type::function(vec![Type::list(Type::Int)], Type::Int)
        );
    }

    #[test]
    fn test_display_and_concreteness() {
        let option = Type::Data {
            name: "Option".to_string(),
            arguments: vec![Type::Int],
        };
        assert_eq!(option.to_string(), "Option<Int>");
        assert!(option.is_concrete());
        assert!(!Type::list(Type::var("T")).is_concrete());
    }
}
