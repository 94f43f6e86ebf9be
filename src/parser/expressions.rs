//! Expression parsing using Pratt precedence.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::span::Span;

use super::core::{ParseResult, Parser};
use super::precedence::{infix_precedence, Precedence};

impl Parser {
    pub(crate) fn expression(&mut self) -> ParseResult<Expr> {
        self.parse_precedence(Precedence::Or)
    }

    pub(crate) fn parse_precedence(&mut self, min_precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_prefix()?;

        while !self.at_eof() {
            let precedence = infix_precedence(&self.lookahead(0).kind);
            if precedence == Precedence::None || precedence < min_precedence {
                break;
            }

            left = self.parse_infix(left, precedence)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        if self.at_eof() {
            return Err(self.unexpected("expression"));
        }
        let token = self.bump();
        let start = token.span;

        match &token.kind {
            TokenKind::IntLiteral(n) => Ok(Expr::new(ExprKind::IntLiteral(*n), start)),
            TokenKind::FloatLiteral(n) => Ok(Expr::new(ExprKind::FloatLiteral(*n), start)),
            TokenKind::StringLiteral(s) => {
                Ok(Expr::new(ExprKind::StringLiteral(s.clone()), start))
            }
            TokenKind::BoolLiteral(b) => Ok(Expr::new(ExprKind::BoolLiteral(*b), start)),

            TokenKind::Identifier(name) => Ok(Expr::new(
                ExprKind::Identifier(Identifier::new(name.clone())),
                start,
            )),

            TokenKind::LeftParen => {
                if self.eat(&TokenKind::RightParen) {
                    let span = start.merge(&self.last_span());
                    return Ok(Expr::new(ExprKind::Unit, span));
                }
                let expr = self.expression()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }

            TokenKind::LeftBracket => self.parse_list(start),
            TokenKind::LeftBrace => {
                let block = self.finish_block(start)?;
                let span = block.span;
                Ok(Expr::new(ExprKind::Block(block), span))
            }

            TokenKind::Minus => self.parse_unary(UnaryOp::Negate, start),
            TokenKind::Bang => self.parse_unary(UnaryOp::Not, start),

            TokenKind::If => self.parse_if(start),
            TokenKind::Match => self.parse_match(start),
            TokenKind::Fn => {
                let decl = self.function_rest("<lambda>".to_string(), start)?;
                let span = decl.span;
                Ok(Expr::new(ExprKind::Function(Box::new(decl)), span))
            }

            _ => Err(ParserError::unexpected_token(
                "expression",
                format!("{}", token.kind),
                token.span,
            )),
        }
    }

    fn parse_unary(&mut self, operator: UnaryOp, start: Span) -> ParseResult<Expr> {
        let operand = self.parse_precedence(Precedence::Unary)?;
        let span = start.merge(&operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                operator,
                operand: Box::new(operand),
                numeric: NumericKind::Int,
            },
            span,
        ))
    }

    fn parse_infix(&mut self, left: Expr, precedence: Precedence) -> ParseResult<Expr> {
        let token = self.bump();

        let operator = match token.kind {
            TokenKind::LeftParen => return self.finish_call(left),
            TokenKind::And | TokenKind::Or => {
                let right = self.parse_precedence(precedence.next())?;
                let span = left.span.merge(&right.span);
                let (left, right) = (Box::new(left), Box::new(right));
                let kind = if token.kind == TokenKind::And {
                    ExprKind::LogicalAnd { left, right }
                } else {
                    ExprKind::LogicalOr { left, right }
                };
                return Ok(Expr::new(kind, span));
            }
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Subtract,
            TokenKind::Star => BinaryOp::Multiply,
            TokenKind::Slash => BinaryOp::Divide,
            TokenKind::Percent => BinaryOp::Modulo,
            TokenKind::EqualEqual => BinaryOp::Equal,
            TokenKind::BangEqual => BinaryOp::NotEqual,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::LessEqual => BinaryOp::LessEqual,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
            _ => {
                return Err(ParserError::unexpected_token(
                    "operator",
                    format!("{}", token.kind),
                    token.span,
                ))
            }
        };

        let right = self.parse_precedence(precedence.next())?;
        let span = left.span.merge(&right.span);
        Ok(Expr::new(
            ExprKind::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                numeric: NumericKind::Int,
            },
            span,
        ))
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = Vec::new();
        if !self.at(&TokenKind::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen)?;
        let span = callee.span.merge(&self.last_span());
        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                arguments,
            },
            span,
        ))
    }

    fn parse_list(&mut self, start: Span) -> ParseResult<Expr> {
        let mut items = Vec::new();
        if !self.at(&TokenKind::RightBracket) {
            loop {
                items.push(self.expression()?);
                if !self.eat(&TokenKind::Comma) || self.at(&TokenKind::RightBracket) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightBracket)?;
        let span = start.merge(&self.last_span());
        Ok(Expr::new(ExprKind::List(items), span))
    }

    /// `if` has already been consumed.
    fn parse_if(&mut self, start: Span) -> ParseResult<Expr> {
        let condition = self.expression()?;
        let brace = self.expect(&TokenKind::LeftBrace)?;
        let then_branch = self.finish_block(brace.span)?;

        let else_branch = if self.eat(&TokenKind::Else) {
            let else_span = self.here();
            if self.eat(&TokenKind::If) {
                Some(Box::new(self.parse_if(else_span)?))
            } else {
                let brace = self.expect(&TokenKind::LeftBrace)?;
                let block = self.finish_block(brace.span)?;
                let span = block.span;
                Some(Box::new(Expr::new(ExprKind::Block(block), span)))
            }
        } else {
            None
        };

        let span = start.merge(&self.last_span());
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                then_branch,
                else_branch,
            },
            span,
        ))
    }

    /// `match` has already been consumed.
    fn parse_match(&mut self, start: Span) -> ParseResult<Expr> {
        let scrutinee = self.expression()?;
        self.expect(&TokenKind::LeftBrace)?;

        let mut arms = Vec::new();
        while !self.at(&TokenKind::RightBrace) && !self.at_eof() {
            let arm_start = self.here();
            let pattern = self.parse_pattern()?;
            self.expect(&TokenKind::FatArrow)?;
            let body = self.expression()?;
            let span = arm_start.merge(&body.span);
            arms.push(MatchArm {
                pattern,
                body,
                span,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace)?;

        if arms.is_empty() {
            return Err(ParserError::general(
                "match needs at least one arm",
                start,
            ));
        }

        let span = start.merge(&self.last_span());
        Ok(Expr::new(
            ExprKind::Match {
                scrutinee: Box::new(scrutinee),
                arms,
            },
            span,
        ))
    }

    pub(crate) fn parse_pattern(&mut self) -> ParseResult<Pattern> {
        let name = self.expect_name()?;
        if name == "_" {
            return Ok(Pattern::Wildcard);
        }

        let mut bindings = Vec::new();
        if self.eat(&TokenKind::LeftParen) {
            if !self.at(&TokenKind::RightParen) {
                loop {
                    let span = self.here();
                    let name = self.expect_name()?;
                    bindings.push(PatternBinding {
                        name,
                        binding: None,
                        span,
                    });
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RightParen)?;
        }

        Ok(Pattern::Constructor {
            name,
            bindings,
            tag: 0,
            size: 0,
        })
    }
}
