//! Declaration parsing: functions, enums, interfaces and implementations.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::span::Span;

use super::core::{ParseResult, Parser};

impl Parser {
    pub(crate) fn function_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.here();
        self.expect(&TokenKind::Fn)?;
        let name = self.expect_name()?;
        let decl = self.function_rest(name, start)?;
        let span = decl.span;
        Ok(Stmt::new(StmtKind::Function(decl), span))
    }

    /// Everything after `fn name`: generics, parameters, return type, body.
    pub(crate) fn function_rest(&mut self, name: String, start: Span) -> ParseResult<FunctionDecl> {
        let generics = self.parse_generic_params()?;
        let params = self.parse_parameters()?;
        let return_type = if self.eat(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let brace = self.expect(&TokenKind::LeftBrace)?;
        let body = self.finish_block(brace.span)?;
        let span = start.merge(&self.last_span());

        Ok(FunctionDecl {
            name,
            generics,
            params,
            return_type,
            body,
            span,
            binding: None,
        })
    }

    /// `<T, U>` or nothing.
    fn parse_generic_params(&mut self) -> ParseResult<Vec<String>> {
        let mut generics = Vec::new();
        if self.eat(&TokenKind::Less) {
            loop {
                generics.push(self.expect_name()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Greater)?;
        }
        Ok(generics)
    }

    fn parse_parameters(&mut self) -> ParseResult<Vec<Parameter>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RightParen) {
            loop {
                let span = self.here();
                let name = self.expect_name()?;
                self.expect(&TokenKind::Colon)?;
                let type_annotation = self.parse_type()?;
                params.push(Parameter {
                    name,
                    type_annotation,
                    span,
                    binding: None,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen)?;
        Ok(params)
    }

    pub(crate) fn enum_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.here();
        self.expect(&TokenKind::Enum)?;
        let name = self.expect_name()?;
        let generics = self.parse_generic_params()?;
        self.expect(&TokenKind::LeftBrace)?;

        let mut constructors = Vec::new();
        while !self.at(&TokenKind::RightBrace) && !self.at_eof() {
            let ctor_span = self.here();
            let ctor_name = self.expect_name()?;
            let mut fields = Vec::new();
            if self.eat(&TokenKind::LeftParen) {
                if !self.at(&TokenKind::RightParen) {
                    loop {
                        fields.push(self.parse_type()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RightParen)?;
            }
            constructors.push(ConstructorDecl {
                name: ctor_name,
                fields,
                span: ctor_span.merge(&self.last_span()),
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace)?;

        if constructors.is_empty() {
            return Err(ParserError::general(
                format!("enum '{}' declares no constructors", name),
                start,
            ));
        }

        let span = start.merge(&self.last_span());
        Ok(Stmt::new(
            StmtKind::Enum(EnumDecl {
                name,
                generics,
                constructors,
                span,
            }),
            span,
        ))
    }

    pub(crate) fn interface_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.here();
        self.expect(&TokenKind::Interface)?;
        let name = self.expect_name()?;
        self.expect(&TokenKind::Less)?;
        let type_param = self.expect_name()?;
        self.expect(&TokenKind::Greater)?;
        self.expect(&TokenKind::LeftBrace)?;

        let mut prototypes = Vec::new();
        let mut functions = Vec::new();
        while !self.at(&TokenKind::RightBrace) && !self.at_eof() {
            let fn_span = self.here();
            self.expect(&TokenKind::Fn)?;
            let fn_name = self.expect_name()?;

            // A prototype has no body: `fn name(params) -> Type`
            let checkpoint = self.pos;
            let params = self.parse_parameters()?;
            self.expect(&TokenKind::Arrow)?;
            let return_type = self.parse_type()?;
            if self.at(&TokenKind::LeftBrace) {
                self.pos = checkpoint;
                functions.push(self.function_rest(fn_name, fn_span)?);
            } else {
                prototypes.push(Prototype {
                    name: fn_name,
                    params,
                    return_type,
                    span: fn_span.merge(&self.last_span()),
                });
            }
            while self.eat(&TokenKind::Semicolon) {}
        }
        self.expect(&TokenKind::RightBrace)?;

        let span = start.merge(&self.last_span());
        Ok(Stmt::new(
            StmtKind::Interface(InterfaceDecl {
                name,
                type_param,
                prototypes,
                functions,
                span,
            }),
            span,
        ))
    }

    pub(crate) fn implementation_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.here();
        self.expect(&TokenKind::Implementation)?;
        let interface = self.expect_name()?;
        self.expect(&TokenKind::Less)?;
        let type_annotation = self.parse_type()?;
        self.expect(&TokenKind::Greater)?;
        self.expect(&TokenKind::LeftBrace)?;

        let mut functions = Vec::new();
        while !self.at(&TokenKind::RightBrace) && !self.at_eof() {
            let fn_span = self.here();
            self.expect(&TokenKind::Fn)?;
            let fn_name = self.expect_name()?;
            functions.push(self.function_rest(fn_name, fn_span)?);
            while self.eat(&TokenKind::Semicolon) {}
        }
        self.expect(&TokenKind::RightBrace)?;

        let span = start.merge(&self.last_span());
        Ok(Stmt::new(
            StmtKind::Implementation(ImplementationDecl {
                interface,
                type_annotation,
                functions,
                span,
            }),
            span,
        ))
    }
}
