//! Closure capture analysis.
//!
//! A binding is *captured* when some nested function refers to it; captured
//! bindings live in the runtime scope chain instead of stack slots. A
//! function *captures scope* when its body (or anything nested in it) refers
//! to a binding of an enclosing function.

use std::collections::HashSet;

use crate::ast::*;
use crate::types::ResolvedProgram;

/// Every parameter and local referenced from a nested function.
pub fn captured_bindings(program: &ResolvedProgram) -> HashSet<BindingId> {
    let mut captured = HashSet::new();
    let mut visit = |ident: &Identifier, _nesting: usize| match ident.resolution {
        Resolution::Param { binding, depth, .. } | Resolution::Local { binding, depth }
            if depth > 0 =>
        {
            captured.insert(binding);
        }
        _ => {}
    };
    for function in &program.functions {
        walk_block(&function.body, 0, &mut visit);
    }
    for stmt in &program.body {
        walk_stmt(stmt, 0, &mut visit);
    }
    captured
}

/// True when `decl` reaches outside itself for a non-global binding.
pub fn captures_scope(decl: &FunctionDecl) -> bool {
    let mut escapes = false;
    walk_block(&decl.body, 0, &mut |ident: &Identifier, nesting: usize| {
        if let Resolution::Param { depth, .. } | Resolution::Local { depth, .. } = ident.resolution
        {
            escapes |= depth > nesting;
        }
    });
    escapes
}

/// Visit every identifier with the number of function boundaries between
/// it and the walk's starting point.
fn walk_block<F>(block: &Block, nesting: usize, visit: &mut F)
where
    F: FnMut(&Identifier, usize),
{
    for stmt in &block.statements {
        walk_stmt(stmt, nesting, visit);
    }
}

fn walk_stmt<F>(stmt: &Stmt, nesting: usize, visit: &mut F)
where
    F: FnMut(&Identifier, usize),
{
    match &stmt.kind {
        StmtKind::Expression(expr) => walk_expr(expr, nesting, visit),
        StmtKind::Let(decl) => walk_expr(&decl.value, nesting, visit),
        StmtKind::LetPattern(decl) => walk_expr(&decl.value, nesting, visit),
        StmtKind::Function(decl) => walk_block(&decl.body, nesting + 1, visit),
        StmtKind::Enum(_) | StmtKind::Interface(_) | StmtKind::Implementation(_) => {}
    }
}

fn walk_expr<F>(expr: &Expr, nesting: usize, visit: &mut F)
where
    F: FnMut(&Identifier, usize),
{
    match &expr.kind {
        ExprKind::IntLiteral(_)
        | ExprKind::FloatLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::BoolLiteral(_)
        | ExprKind::Unit => {}
        ExprKind::Identifier(ident) => visit(ident, nesting),
        ExprKind::Binary { left, right, .. }
        | ExprKind::LogicalAnd { left, right }
        | ExprKind::LogicalOr { left, right } => {
            walk_expr(left, nesting, visit);
            walk_expr(right, nesting, visit);
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, nesting, visit),
        ExprKind::Call { callee, arguments } => {
            walk_expr(callee, nesting, visit);
            for arg in arguments {
                walk_expr(arg, nesting, visit);
            }
        }
        ExprKind::Constructor { arguments, .. } | ExprKind::List(arguments) => {
            for arg in arguments {
                walk_expr(arg, nesting, visit);
            }
        }
        ExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            walk_expr(condition, nesting, visit);
            walk_block(then_branch, nesting, visit);
            if let Some(else_branch) = else_branch {
                walk_expr(else_branch, nesting, visit);
            }
        }
        ExprKind::Match { scrutinee, arms } => {
            walk_expr(scrutinee, nesting, visit);
            for arm in arms {
                walk_expr(&arm.body, nesting, visit);
            }
        }
        ExprKind::Function(decl) => walk_block(&decl.body, nesting + 1, visit),
        ExprKind::Block(block) => walk_block(block, nesting, visit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::types::resolve;

    fn resolved(source: &str) -> ResolvedProgram {
        resolve(parse_source(source).unwrap()).unwrap()
    }

    fn first_lambda(block: &Block) -> &FunctionDecl {
        for stmt in &block.statements {
            if let StmtKind::Expression(Expr {
                kind: ExprKind::Function(decl),
                ..
            }) = &stmt.kind
            {
                return decl;
            }
        }
        panic!("no lambda in block");
    }

    #[test]
    fn test_captured_parameter() {
        let program = resolved(
            "fn make_adder(n: Int) -> (Int) -> Int { fn (x: Int) -> Int { x + n } }",
        );
        let outer = &program.functions[0];
        let captured = captured_bindings(&program);
        assert!(captured.contains(&outer.params[0].binding.unwrap()));
        assert!(captures_scope(first_lambda(&outer.body)));
        assert!(!captures_scope(outer));
    }

    #[test]
    fn test_globals_are_not_captures() {
        let program = resolved("let k = 3\nfn f() -> (Int) -> Int { fn (x: Int) -> Int { x + k } }");
        let outer = &program.functions[0];
        assert!(captured_bindings(&program).is_empty());
        assert!(!captures_scope(first_lambda(&outer.body)));
    }

    #[test]
    fn test_transitive_capture() {
        let program = resolved(
            "fn f(n: Int) -> () -> () -> Int { fn () -> () -> Int { fn () -> Int { n } } }",
        );
        let outer = &program.functions[0];
        let middle = first_lambda(&outer.body);
        assert!(captures_scope(middle));
        assert!(captures_scope(first_lambda(&middle.body)));
    }
}
