//! Statement parsing: let (plain or destructuring), expression statements
//! and blocks.

use crate::ast::*;
use crate::lexer::TokenKind;
use crate::span::Span;

use super::core::{ParseResult, Parser};

impl Parser {
    /// Any statement, including declarations.
    pub(crate) fn declaration(&mut self) -> ParseResult<Stmt> {
        let stmt = match &self.lookahead(0).kind {
            TokenKind::Fn if matches!(self.lookahead(1).kind, TokenKind::Identifier(_)) => {
                self.function_declaration()?
            }
            TokenKind::Enum => self.enum_declaration()?,
            TokenKind::Interface => self.interface_declaration()?,
            TokenKind::Implementation => self.implementation_declaration()?,
            TokenKind::Let => self.let_declaration()?,
            _ => self.expression_statement()?,
        };
        // Semicolons are optional separators.
        while self.eat(&TokenKind::Semicolon) {}
        Ok(stmt)
    }

    fn let_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.here();
        self.expect(&TokenKind::Let)?;
        if matches!(self.lookahead(0).kind, TokenKind::Identifier(_))
            && self.lookahead(1).kind == TokenKind::LeftParen
        {
            let pattern = self.parse_pattern()?;
            self.expect(&TokenKind::Equal)?;
            let value = self.expression()?;
            let span = start.merge(&value.span);
            return Ok(Stmt::new(
                StmtKind::LetPattern(LetPatternDecl { pattern, value }),
                span,
            ));
        }
        let name = self.expect_name()?;

        let type_annotation = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.expect(&TokenKind::Equal)?;
        let value = self.expression()?;
        let span = start.merge(&value.span);

        Ok(Stmt::new(
            StmtKind::Let(LetDecl {
                name,
                type_annotation,
                value,
                binding: None,
            }),
            span,
        ))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        let span = expr.span;
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }

    /// Parse statements up to the closing brace. The opening brace has
    /// already been consumed; `start` is its span.
    pub(crate) fn finish_block(&mut self, start: Span) -> ParseResult<Block> {
        let mut statements = Vec::new();
        while !self.at(&TokenKind::RightBrace) && !self.at_eof() {
            statements.push(self.declaration()?);
        }
        self.expect(&TokenKind::RightBrace)?;
        let span = start.merge(&self.last_span());
        Ok(Block::new(statements, span))
    }
}
