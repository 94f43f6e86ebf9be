//! Indented tree dump of a parsed program, used by `--print-ast`.

use std::fmt::Write;

use crate::ast::expr::{Expr, ExprKind, Pattern};
use crate::ast::stmt::{Block, FunctionDecl, Program, Stmt, StmtKind};

/// Render a program as an indented tree.
pub fn print_program(program: &Program) -> String {
    let mut printer = AstPrinter::default();
    printer.line("Program");
    printer.indented(|p| {
        for stmt in &program.statements {
            p.stmt(stmt);
        }
    });
    printer.out
}

#[derive(Default)]
struct AstPrinter {
    out: String,
    indent: usize,
}

impl AstPrinter {
    fn line(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.out, "{:width$}{}", "", text.as_ref(), width = self.indent * 2);
    }

    fn indented(&mut self, f: impl FnOnce(&mut Self)) {
        self.indent += 1;
        f(self);
        self.indent -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expression(expr) => self.expr(expr),
            StmtKind::Let(decl) => {
                match &decl.type_annotation {
                    Some(ty) => self.line(format!("Let {}: {}", decl.name, ty)),
                    None => self.line(format!("Let {}", decl.name)),
                }
                self.indented(|p| p.expr(&decl.value));
            }
            StmtKind::LetPattern(decl) => {
                self.line(format!("Let {}", pattern_text(&decl.pattern)));
                self.indented(|p| p.expr(&decl.value));
            }
            StmtKind::Function(decl) => self.function(decl),
            StmtKind::Enum(decl) => {
                self.line(format!("Enum {}", decl.name));
                self.indented(|p| {
                    for ctor in &decl.constructors {
                        let fields: Vec<String> = ctor.fields.iter().map(|f| f.to_string()).collect();
                        p.line(format!("Constructor {}({})", ctor.name, fields.join(", ")));
                    }
                });
            }
            StmtKind::Interface(decl) => {
                self.line(format!("Interface {}<{}>", decl.name, decl.type_param));
                self.indented(|p| {
                    for proto in &decl.prototypes {
                        p.line(format!("Prototype {} -> {}", proto.name, proto.return_type));
                    }
                    for function in &decl.functions {
                        p.function(function);
                    }
                });
            }
            StmtKind::Implementation(decl) => {
                self.line(format!(
                    "Implementation {}<{}>",
                    decl.interface, decl.type_annotation
                ));
                self.indented(|p| {
                    for function in &decl.functions {
                        p.function(function);
                    }
                });
            }
        }
    }

    fn function(&mut self, decl: &FunctionDecl) {
        let params: Vec<String> = decl
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.type_annotation))
            .collect();
        let generics = if decl.generics.is_empty() {
            String::new()
        } else {
            format!("<{}>", decl.generics.join(", "))
        };
        match &decl.return_type {
            Some(ret) => self.line(format!(
                "Function {}{}({}) -> {}",
                decl.name,
                generics,
                params.join(", "),
                ret
            )),
            None => self.line(format!("Function {}{}({})", decl.name, generics, params.join(", "))),
        }
        self.indented(|p| p.block(&decl.body));
    }

    fn block(&mut self, block: &Block) {
        self.line("Block");
        self.indented(|p| {
            for stmt in &block.statements {
                p.stmt(stmt);
            }
        });
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::IntLiteral(n) => self.line(format!("Int {}", n)),
            ExprKind::FloatLiteral(n) => self.line(format!("Float {}", n)),
            ExprKind::StringLiteral(s) => self.line(format!("String {:?}", s)),
            ExprKind::BoolLiteral(b) => self.line(format!("Bool {}", b)),
            ExprKind::Unit => self.line("Unit"),
            ExprKind::Identifier(ident) => self.line(format!("Identifier {}", ident.name)),
            ExprKind::Binary {
                left,
                operator,
                right,
                ..
            } => {
                self.line(format!("Binary {}", operator));
                self.indented(|p| {
                    p.expr(left);
                    p.expr(right);
                });
            }
            ExprKind::Unary {
                operator, operand, ..
            } => {
                self.line(format!("Unary {}", operator));
                self.indented(|p| p.expr(operand));
            }
            ExprKind::LogicalAnd { left, right } | ExprKind::LogicalOr { left, right } => {
                let op = if matches!(expr.kind, ExprKind::LogicalAnd { .. }) {
                    "&&"
                } else {
                    "||"
                };
                self.line(format!("Logical {}", op));
                self.indented(|p| {
                    p.expr(left);
                    p.expr(right);
                });
            }
            ExprKind::Call { callee, arguments } => {
                self.line("Call");
                self.indented(|p| {
                    p.expr(callee);
                    for arg in arguments {
                        p.expr(arg);
                    }
                });
            }
            ExprKind::Constructor {
                name, arguments, ..
            } => {
                self.line(format!("Constructor {}", name));
                self.indented(|p| {
                    for arg in arguments {
                        p.expr(arg);
                    }
                });
            }
            ExprKind::List(items) => {
                self.line("List");
                self.indented(|p| {
                    for item in items {
                        p.expr(item);
                    }
                });
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.line("If");
                self.indented(|p| {
                    p.expr(condition);
                    p.block(then_branch);
                    if let Some(else_branch) = else_branch {
                        p.line("Else");
                        p.indented(|p| p.expr(else_branch));
                    }
                });
            }
            ExprKind::Match { scrutinee, arms } => {
                self.line("Match");
                self.indented(|p| {
                    p.expr(scrutinee);
                    for arm in arms {
                        p.line(format!("Case {}", pattern_text(&arm.pattern)));
                        p.indented(|p| p.expr(&arm.body));
                    }
                });
            }
            ExprKind::Function(decl) => self.function(decl),
            ExprKind::Block(block) => self.block(block),
        }
    }
}

fn pattern_text(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Wildcard => "_".to_string(),
        Pattern::Constructor { name, bindings, .. } => {
            let names: Vec<&str> = bindings.iter().map(|b| b.name.as_str()).collect();
            format!("{}({})", name, names.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_print_function_and_call() {
        let tokens = Scanner::new("fn add(a: Int, b: Int) -> Int { a + b }\nadd(1, 2)")
            .scan_tokens()
            .unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        assert_eq!(
            print_program(&program),
            "Program\n  Function add(a: Int, b: Int) -> Int\n    Block\n      Binary +\n        Identifier a\n        Identifier b\n  Call\n    Identifier add\n    Int 1\n    Int 2\n"
        );
    }
}
