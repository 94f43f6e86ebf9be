//! Declaration collection, function units and generic instantiation.

use std::collections::HashMap;

use crate::ast::*;
use crate::error::ResolveError;
use crate::span::Span;
use crate::types::environment::{
    implementation_name, instance_name, ConstructorInfo, GlobalFunction, InterfaceInfo, Signature,
};
use crate::types::type_repr::Type;

use super::{FunctionScope, ResolveResult, Resolver};

impl Resolver {
    /// First pass: record every top-level declaration so bodies can refer to
    /// names declared later in the file.
    pub(crate) fn declare_all(&mut self, program: &Program) -> ResolveResult<()> {
        for stmt in &program.statements {
            if let StmtKind::Enum(decl) = &stmt.kind {
                if self.env.enums.contains_key(&decl.name) {
                    return Err(ResolveError::general(
                        format!("enum '{}' declared twice", decl.name),
                        decl.span,
                    ));
                }
                self.env.enums.insert(decl.name.clone(), decl.generics.clone());
            }
        }

        for stmt in &program.statements {
            match &stmt.kind {
                StmtKind::Enum(decl) => self.declare_enum(decl)?,
                StmtKind::Interface(decl) => self.declare_interface(decl)?,
                StmtKind::Function(decl) => {
                    let signature = self.function_signature(decl, &[])?;
                    let global = if decl.generics.is_empty() {
                        GlobalFunction::Plain(signature)
                    } else {
                        GlobalFunction::Generic {
                            signature,
                            template: Box::new(decl.clone()),
                        }
                    };
                    self.env.functions.insert(decl.name.clone(), global);
                }
                StmtKind::Let(decl) => {
                    self.env.globals.insert(decl.name.clone(), Type::Unknown);
                }
                StmtKind::LetPattern(decl) => {
                    for binding in decl.pattern.bindings().filter(|b| !b.is_ignored()) {
                        self.env.globals.insert(binding.name.clone(), Type::Unknown);
                    }
                }
                _ => {}
            }
        }

        // Implementations last: they need interfaces and enums in place.
        for stmt in &program.statements {
            if let StmtKind::Implementation(decl) = &stmt.kind {
                self.declare_implementation(decl)?;
            }
        }

        Ok(())
    }

    fn declare_enum(&mut self, decl: &EnumDecl) -> ResolveResult<()> {
        let saved = self.with_type_vars(&decl.generics);
        for (tag, ctor) in decl.constructors.iter().enumerate() {
            if self.env.constructors.contains_key(&ctor.name) {
                return Err(ResolveError::general(
                    format!("constructor '{}' declared twice", ctor.name),
                    ctor.span,
                ));
            }
            let fields = ctor
                .fields
                .iter()
                .map(|f| self.resolve_annotation(f))
                .collect::<ResolveResult<Vec<_>>>()?;
            self.env.constructors.insert(
                ctor.name.clone(),
                ConstructorInfo {
                    enum_name: decl.name.clone(),
                    enum_generics: decl.generics.clone(),
                    tag: tag as u32,
                    fields,
                },
            );
        }
        self.type_env = saved;
        Ok(())
    }

    fn declare_interface(&mut self, decl: &InterfaceDecl) -> ResolveResult<()> {
        let type_params = vec![decl.type_param.clone()];
        let saved = self.with_type_vars(&type_params);

        let mut prototypes = HashMap::new();
        for proto in &decl.prototypes {
            let params = proto
                .params
                .iter()
                .map(|p| self.resolve_annotation(&p.type_annotation))
                .collect::<ResolveResult<Vec<_>>>()?;
            let return_type = self.resolve_annotation(&proto.return_type)?;
            prototypes.insert(
                proto.name.clone(),
                Signature {
                    generics: type_params.clone(),
                    params,
                    return_type,
                },
            );
            self.env.functions.insert(
                proto.name.clone(),
                GlobalFunction::Virtual {
                    interface: decl.name.clone(),
                },
            );
        }
        self.type_env = saved;

        // Default functions are generic over the interface's type parameter.
        for function in &decl.functions {
            let signature = self.function_signature(function, &type_params)?;
            let mut template = function.clone();
            template.generics = signature.generics.clone();
            self.env.functions.insert(
                function.name.clone(),
                GlobalFunction::Generic {
                    signature,
                    template: Box::new(template),
                },
            );
        }

        self.env.interfaces.insert(
            decl.name.clone(),
            InterfaceInfo {
                name: decl.name.clone(),
                type_param: decl.type_param.clone(),
                prototypes,
            },
        );
        Ok(())
    }

    fn declare_implementation(&mut self, decl: &ImplementationDecl) -> ResolveResult<()> {
        let Some(interface) = self.env.interfaces.get(&decl.interface).cloned() else {
            return Err(ResolveError::UndefinedType(decl.interface.clone(), decl.span));
        };
        let type_key = self.resolve_annotation(&decl.type_annotation)?.key();

        for function in &decl.functions {
            if !interface.prototypes.contains_key(&function.name) {
                return Err(ResolveError::general(
                    format!(
                        "'{}' is not a function of interface '{}'",
                        function.name, interface.name
                    ),
                    function.span,
                ));
            }
            let signature = self.function_signature(function, &[])?;
            let mangled = implementation_name(&function.name, &type_key);
            self.env.implementations.insert(
                (interface.name.clone(), type_key.clone(), function.name.clone()),
                (mangled, signature),
            );
        }
        Ok(())
    }

    /// Signature from annotations; an unannotated return type is `Unknown`
    /// until the body has been resolved.
    fn function_signature(
        &mut self,
        decl: &FunctionDecl,
        outer_generics: &[String],
    ) -> ResolveResult<Signature> {
        let mut generics: Vec<String> = outer_generics.to_vec();
        generics.extend(decl.generics.iter().cloned());
        let saved = self.with_type_vars(&generics);

        let params = decl
            .params
            .iter()
            .map(|p| self.resolve_annotation(&p.type_annotation))
            .collect::<ResolveResult<Vec<_>>>()?;
        let return_type = match &decl.return_type {
            Some(annotation) => self.resolve_annotation(annotation)?,
            None => Type::Unknown,
        };

        self.type_env = saved;
        Ok(Signature {
            generics,
            params,
            return_type,
        })
    }

    /// Bring type variables into scope as themselves; returns the previous
    /// environment for restoring.
    fn with_type_vars(&mut self, names: &[String]) -> HashMap<String, Type> {
        let saved = self.type_env.clone();
        for name in names {
            self.type_env.insert(name.clone(), Type::Var(name.clone()));
        }
        saved
    }

    // ===== Function units =====

    pub(crate) fn resolve_top_level_function(&mut self, decl: FunctionDecl) -> ResolveResult<()> {
        if !decl.generics.is_empty() {
            // Template only; instances are produced on demand.
            return Ok(());
        }
        let name = decl.name.clone();
        let ty = self.resolve_unit(decl, HashMap::new())?;
        if let (Some(GlobalFunction::Plain(signature)), Type::Function { return_type, .. }) =
            (self.env.functions.get_mut(&name), ty)
        {
            signature.return_type = *return_type;
        }
        Ok(())
    }

    pub(crate) fn resolve_implementation(&mut self, decl: ImplementationDecl) -> ResolveResult<()> {
        let type_key = self.resolve_annotation(&decl.type_annotation)?.key();
        for mut function in decl.functions {
            function.name = implementation_name(&function.name, &type_key);
            self.resolve_unit(function, HashMap::new())?;
        }
        Ok(())
    }

    /// Resolve a function that becomes its own unit, isolated from whatever
    /// is being resolved at the moment.
    fn resolve_unit(
        &mut self,
        mut decl: FunctionDecl,
        type_bindings: HashMap<String, Type>,
    ) -> ResolveResult<Type> {
        let saved_scopes = std::mem::take(&mut self.scopes);
        let saved_types = std::mem::replace(&mut self.type_env, type_bindings);

        let ty = self.resolve_function_body(&mut decl)?;

        self.scopes = saved_scopes;
        self.type_env = saved_types;
        tracing::trace!(name = %decl.name, ty = %ty, "resolved function unit");
        self.units.push(decl);
        Ok(ty)
    }

    /// Resolve parameters and body inside a fresh function scope. Returns the
    /// function's type.
    pub(crate) fn resolve_function_body(&mut self, decl: &mut FunctionDecl) -> ResolveResult<Type> {
        let mut param_types = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            param_types.push(self.resolve_annotation(&param.type_annotation)?);
        }
        let declared_return = match &decl.return_type {
            Some(annotation) => Some(self.resolve_annotation(annotation)?),
            None => None,
        };

        self.scopes.push(FunctionScope::default());
        for (index, (param, ty)) in decl.params.iter_mut().zip(&param_types).enumerate() {
            param.binding = Some(self.declare_local(&param.name, Some(index), ty.clone()));
        }
        let body_type = self.resolve_block(&mut decl.body)?;
        self.scopes.pop();

        Ok(Type::function(
            param_types,
            declared_return.unwrap_or(body_type),
        ))
    }

    /// Instance of a generic function for the given argument types.
    pub(crate) fn instantiate(
        &mut self,
        name: &str,
        signature: &Signature,
        template: &FunctionDecl,
        arg_types: &[Type],
        span: Span,
    ) -> ResolveResult<(String, Type)> {
        let mut bindings = HashMap::new();
        for (param, arg) in signature.params.iter().zip(arg_types) {
            param.bind_vars(arg, &mut bindings);
        }

        let mut type_args = Vec::with_capacity(signature.generics.len());
        for generic in &signature.generics {
            match bindings.get(generic) {
                Some(ty) if ty.is_concrete() => type_args.push(ty.clone()),
                _ => {
                    return Err(ResolveError::general(
                        format!("cannot infer type parameter '{}' of '{}'", generic, name),
                        span,
                    ))
                }
            }
        }

        let declared = signature.as_type().substitute(&bindings);
        let key = (name.to_string(), type_args);
        if let Some(instance) = self.instances.get(&key) {
            return Ok((instance.clone(), declared));
        }

        let instance = instance_name(name, &key.1);
        self.instances.insert(key, instance.clone());
        tracing::debug!(generic = name, instance = %instance, "instantiating generic function");

        let mut decl = template.clone();
        decl.name = instance.clone();
        decl.generics.clear();
        let ty = self.resolve_unit(decl, bindings)?;
        Ok((instance, ty))
    }

    /// Implementation chosen for a call of an interface prototype.
    pub(crate) fn dispatch(
        &self,
        interface: &str,
        function: &str,
        arg_types: &[Type],
        span: Span,
    ) -> ResolveResult<(String, Type)> {
        let Some(info) = self.env.interfaces.get(interface) else {
            return Err(ResolveError::UndefinedType(interface.to_string(), span));
        };
        let Some(prototype) = info.prototypes.get(function) else {
            return Err(ResolveError::UndefinedVariable(function.to_string(), span));
        };
        if prototype.params.len() != arg_types.len() {
            return Err(ResolveError::wrong_arity(
                prototype.params.len(),
                arg_types.len(),
                span,
            ));
        }

        let mut bindings = HashMap::new();
        for (param, arg) in prototype.params.iter().zip(arg_types) {
            param.bind_vars(arg, &mut bindings);
        }
        let Some(self_type) = bindings.get(&info.type_param).filter(|t| t.is_concrete()) else {
            return Err(ResolveError::general(
                format!("cannot determine which implementation of '{}' to call", interface),
                span,
            ));
        };

        let type_key = self_type.key();
        match self.env.implementation(interface, &type_key, function) {
            Some((mangled, signature)) => Ok((mangled.clone(), signature.as_type())),
            None => Err(ResolveError::missing_implementation(interface, type_key, span)),
        }
    }
}
