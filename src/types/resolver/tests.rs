use crate::ast::*;
use crate::error::ResolveError;
use crate::parser::parse_source;
use crate::types::resolver::{resolve, ResolvedProgram};

fn resolve_source(source: &str) -> ResolvedProgram {
    resolve(parse_source(source).unwrap()).unwrap()
}

fn resolve_err(source: &str) -> ResolveError {
    resolve(parse_source(source).unwrap()).unwrap_err()
}

fn unit<'a>(program: &'a ResolvedProgram, name: &str) -> &'a FunctionDecl {
    program
        .functions
        .iter()
        .find(|f| f.name == name)
        .unwrap_or_else(|| panic!("no unit named {}", name))
}

fn trailing_expr(block: &Block) -> &Expr {
    match &block.statements.last().unwrap().kind {
        StmtKind::Expression(expr) => expr,
        _ => panic!("Expected trailing expression"),
    }
}

#[test]
fn test_params_resolve_by_index() {
    let program = resolve_source("fn sub2(a: Int, b: Int) -> Int { a - b }");
    let body = trailing_expr(&unit(&program, "sub2").body);
    match &body.kind {
        ExprKind::Binary { left, right, .. } => {
            assert!(matches!(
                left.kind,
                ExprKind::Identifier(Identifier {
                    resolution: Resolution::Param { index: 0, depth: 0, .. },
                    ..
                })
            ));
            assert!(matches!(
                right.kind,
                ExprKind::Identifier(Identifier {
                    resolution: Resolution::Param { index: 1, depth: 0, .. },
                    ..
                })
            ));
        }
        _ => panic!("Expected binary"),
    }
}

#[test]
fn test_float_arithmetic_is_tagged() {
    let program = resolve_source("fn half(x: Float) -> Float { x / 2.0 }");
    let body = trailing_expr(&unit(&program, "half").body);
    assert!(matches!(
        body.kind,
        ExprKind::Binary {
            numeric: NumericKind::Float,
            ..
        }
    ));
}

#[test]
fn test_captured_param_has_depth() {
    let program =
        resolve_source("fn make_adder(n: Int) -> (Int) -> Int { fn (x: Int) -> Int { x + n } }");
    let lambda = match &trailing_expr(&unit(&program, "make_adder").body).kind {
        ExprKind::Function(decl) => decl.clone(),
        _ => panic!("Expected lambda"),
    };
    match &trailing_expr(&lambda.body).kind {
        ExprKind::Binary { right, .. } => assert!(matches!(
            right.kind,
            ExprKind::Identifier(Identifier {
                resolution: Resolution::Param { index: 0, depth: 1, .. },
                ..
            })
        )),
        _ => panic!("Expected binary"),
    }
}

#[test]
fn test_constructor_calls_are_rewritten_with_tags() {
    let program = resolve_source("enum Shape { Circle(Float), Rect(Float, Float), Dot }\nRect(1.0, 2.0)\nDot");
    match &program.body[0].kind {
        StmtKind::Expression(Expr {
            kind: ExprKind::Constructor { tag, size, .. },
            ..
        }) => {
            assert_eq!((*tag, *size), (1, 2));
        }
        other => panic!("Expected constructor, got {:?}", other),
    }
    match &program.body[1].kind {
        StmtKind::Expression(Expr {
            kind: ExprKind::Constructor { tag, size, .. },
            ..
        }) => assert_eq!((*tag, *size), (2, 0)),
        other => panic!("Expected constructor, got {:?}", other),
    }
}

#[test]
fn test_match_patterns_get_tags_and_bindings() {
    let program = resolve_source(
        "enum Shape { Circle(Float), Rect(Float, Float) }\nmatch Rect(1.0, 2.0) { Circle(r) => r, Rect(w, _) => w }",
    );
    match &program.body[0].kind {
        StmtKind::Expression(Expr {
            kind: ExprKind::Match { arms, .. },
            ..
        }) => match &arms[1].pattern {
            Pattern::Constructor { tag, bindings, .. } => {
                assert_eq!(*tag, 1);
                assert!(bindings[0].binding.is_some());
                assert!(bindings[1].binding.is_none());
            }
            _ => panic!("Expected constructor pattern"),
        },
        _ => panic!("Expected match"),
    }
}

#[test]
fn test_interface_call_resolves_to_implementation() {
    let program = resolve_source(
        r#"
        interface Show<T> { fn show(x: T) -> String }
        implementation Show<Int> { fn show(x: Int) -> String { int_to_string(x) } }
        implementation Show<Bool> { fn show(x: Bool) -> String { "bool" } }
        show(1)
        show(true)
        "#,
    );
    let names: Vec<String> = program
        .body
        .iter()
        .map(|stmt| match &stmt.kind {
            StmtKind::Expression(Expr {
                kind: ExprKind::Call { callee, .. },
                ..
            }) => match &callee.kind {
                ExprKind::Identifier(ident) => ident.name.clone(),
                _ => panic!("Expected identifier callee"),
            },
            _ => panic!("Expected call"),
        })
        .collect();
    assert_eq!(names, vec!["show$Int".to_string(), "show$Bool".to_string()]);
    unit(&program, "show$Int");
    unit(&program, "show$Bool");
}

#[test]
fn test_missing_implementation_is_reported() {
    let err = resolve_err(
        "interface Show<T> { fn show(x: T) -> String }\nimplementation Show<Int> { fn show(x: Int) -> String { \"i\" } }\nshow(1.5)",
    );
    match err {
        ResolveError::MissingImplementation { type_name, .. } => assert_eq!(type_name, "Float"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_generic_instances_are_memoized() {
    let program = resolve_source("fn id<T>(x: T) -> T { x }\nid(1)\nid(2)\nid(true)");
    let instances: Vec<&str> = program
        .functions
        .iter()
        .map(|f| f.name.as_str())
        .filter(|n| n.starts_with("id$"))
        .collect();
    assert_eq!(instances, vec!["id$Int", "id$Bool"]);
}

#[test]
fn test_interface_default_function_is_instantiated() {
    let program = resolve_source(
        r#"
        interface Show<T> {
            fn show(x: T) -> String
            fn shout(x: T) -> String { concat(show(x), "!") }
        }
        implementation Show<Int> { fn show(x: Int) -> String { int_to_string(x) } }
        shout(3)
        "#,
    );
    let shout = unit(&program, "shout$Int");
    match &trailing_expr(&shout.body).kind {
        ExprKind::Call { arguments, .. } => match &arguments[0].kind {
            ExprKind::Call { callee, .. } => match &callee.kind {
                ExprKind::Identifier(ident) => assert_eq!(ident.name, "show$Int"),
                _ => panic!("Expected identifier"),
            },
            _ => panic!("Expected inner call"),
        },
        _ => panic!("Expected call"),
    }
}

#[test]
fn test_undefined_variable() {
    assert!(matches!(
        resolve_err("fn f() -> Int { nope }"),
        ResolveError::UndefinedVariable(ref name, _) if name == "nope"
    ));
}

#[test]
fn test_builtins_and_globals() {
    let program = resolve_source("let x = 2\nadd(x, 1)");
    match &program.body[1].kind {
        StmtKind::Expression(Expr {
            kind: ExprKind::Call { callee, arguments },
            ..
        }) => {
            assert!(matches!(
                callee.kind,
                ExprKind::Identifier(Identifier {
                    resolution: Resolution::Builtin,
                    ..
                })
            ));
            assert!(matches!(
                arguments[0].kind,
                ExprKind::Identifier(Identifier {
                    resolution: Resolution::Global,
                    ..
                })
            ));
        }
        _ => panic!("Expected call"),
    }
}

#[test]
fn test_constructor_arity_is_checked() {
    assert!(matches!(
        resolve_err("enum Box { Full(Int) }\nFull(1, 2)"),
        ResolveError::WrongArity { expected: 1, got: 2, .. }
    ));
}

#[test]
fn test_destructuring_let_binds_fields() {
    let program = resolve_source(
        "enum Shape { Circle(Float), Rect(Float, Float) }\nfn width(s: Shape) -> Float { let Rect(w, _) = s; w }\nlet Rect(top, _) = Rect(1.0, 2.0)\ntop",
    );
    let width = unit(&program, "width");
    match &width.body.statements[0].kind {
        StmtKind::LetPattern(decl) => match &decl.pattern {
            Pattern::Constructor { tag, bindings, .. } => {
                assert_eq!(*tag, 1);
                assert!(bindings[0].binding.is_some());
                assert!(bindings[1].binding.is_none());
            }
            _ => panic!("Expected constructor pattern"),
        },
        _ => panic!("Expected destructuring let"),
    }
    assert!(matches!(
        trailing_expr(&width.body).kind,
        ExprKind::Identifier(Identifier {
            resolution: Resolution::Local { depth: 0, .. },
            ..
        })
    ));

    // Top-level fields become globals.
    match &program.body[1].kind {
        StmtKind::Expression(Expr {
            kind: ExprKind::Identifier(ident),
            ..
        }) => assert_eq!(ident.resolution, Resolution::Global),
        _ => panic!("Expected identifier"),
    }
}

#[test]
fn test_destructuring_let_checks_constructor() {
    assert!(matches!(
        resolve_err("enum Box { Full(Int) }\nfn f(b: Box) -> Int { let Empty(x) = b; x }"),
        ResolveError::UnknownConstructor(..)
    ));
    assert!(matches!(
        resolve_err("enum Box { Full(Int) }\nlet Full(a, b) = Full(1)"),
        ResolveError::WrongArity { expected: 1, got: 2, .. }
    ));
}
