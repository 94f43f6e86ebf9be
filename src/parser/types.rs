//! Type annotation parsing.

use crate::ast::*;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};

impl Parser {
    pub(crate) fn parse_type(&mut self) -> ParseResult<TypeAnnotation> {
        let start = self.here();

        if self.eat(&TokenKind::LeftBracket) {
            let element = self.parse_type()?;
            self.expect(&TokenKind::RightBracket)?;
            let span = start.merge(&self.last_span());
            return Ok(TypeAnnotation::new(TypeKind::List(Box::new(element)), span));
        }

        if self.eat(&TokenKind::LeftParen) {
            let mut params = Vec::new();
            if !self.at(&TokenKind::RightParen) {
                loop {
                    params.push(self.parse_type()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RightParen)?;
            if !self.eat(&TokenKind::Arrow) {
                // `()` alone is the unit type.
                if params.is_empty() {
                    let span = start.merge(&self.last_span());
                    return Ok(TypeAnnotation::named("Unit", span));
                }
                return Err(self.unexpected("->"));
            }
            let return_type = self.parse_type()?;
            let span = start.merge(&return_type.span);
            return Ok(TypeAnnotation::new(
                TypeKind::Function {
                    params,
                    return_type: Box::new(return_type),
                },
                span,
            ));
        }

        let name = self.expect_name()?;
        let mut arguments = Vec::new();
        if self.eat(&TokenKind::Less) {
            loop {
                arguments.push(self.parse_type()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Greater)?;
        }
        let span = start.merge(&self.last_span());
        Ok(TypeAnnotation::new(TypeKind::Named { name, arguments }, span))
    }
}
