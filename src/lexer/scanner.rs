//! Lexer/Scanner for Verve source code.

use crate::error::LexerError;
use crate::lexer::token::{Token, TokenKind, SYMBOLS};
use crate::span::Span;

/// Position in the source: byte offset plus 1-based line and column.
#[derive(Debug, Clone, Copy)]
struct Mark {
    offset: usize,
    line: usize,
    column: usize,
}

/// The lexer transforms source code into a stream of tokens.
pub struct Scanner<'a> {
    source: &'a str,
    at: Mark,
    start: Mark,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        let origin = Mark {
            offset: 0,
            line: 1,
            column: 1,
        };
        Self {
            source,
            at: origin,
            start: origin,
        }
    }

    /// Scan all tokens; the last one is always `Eof`.
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.scan_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Scan the next token.
    pub fn scan_token(&mut self) -> Result<Token, LexerError> {
        self.skip_trivia();
        self.start = self.at;

        let Some(c) = self.first() else {
            return Ok(Token::eof(self.at.offset, self.at.line, self.at.column));
        };

        if c == '"' {
            self.bump();
            return self.string();
        }
        if c.is_ascii_digit() {
            return self.number();
        }
        if c.is_alphabetic() || c == '_' {
            let word = self.take_while(|c| c.is_alphanumeric() || c == '_');
            let kind = TokenKind::keyword(word)
                .unwrap_or_else(|| TokenKind::Identifier(word.to_string()));
            return Ok(self.token(kind));
        }

        let rest = self.rest();
        match SYMBOLS.iter().find(|(text, _)| rest.starts_with(text)) {
            Some((text, kind)) => {
                for _ in 0..text.len() {
                    self.bump();
                }
                Ok(self.token(kind.clone()))
            }
            None => {
                self.bump();
                Err(LexerError::unexpected_char(c, self.span()))
            }
        }
    }

    /// Whitespace, `//` comments and nestable `/* */` comments.
    fn skip_trivia(&mut self) {
        loop {
            self.take_while(char::is_whitespace);
            if self.rest().starts_with("//") {
                self.take_while(|c| c != '\n');
            } else if self.rest().starts_with("/*") {
                self.block_comment();
            } else {
                return;
            }
        }
    }

    fn block_comment(&mut self) {
        let mut depth = 0usize;
        while !self.rest().is_empty() {
            if self.rest().starts_with("/*") {
                depth += 1;
                self.bump();
                self.bump();
            } else if self.rest().starts_with("*/") {
                self.bump();
                self.bump();
                depth -= 1;
                if depth == 0 {
                    return;
                }
            } else {
                self.bump();
            }
        }
    }

    /// Body of a string literal; the opening quote is already consumed.
    fn string(&mut self) -> Result<Token, LexerError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(LexerError::unterminated_string(self.span())),
                Some('"') => return Ok(self.token(TokenKind::StringLiteral(value))),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(other) => return Err(LexerError::invalid_escape(other, self.span())),
                        None => return Err(LexerError::unterminated_string(self.span())),
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
            }
        }
    }

    /// Integer or float literal. `_` separators are allowed and dropped; a
    /// `.` only starts a fraction when a digit follows it.
    fn number(&mut self) -> Result<Token, LexerError> {
        let mut text: String = self
            .take_while(|c| c.is_ascii_digit() || c == '_')
            .replace('_', "");
        let fraction = self.first() == Some('.')
            && self.rest()[1..].starts_with(|c: char| c.is_ascii_digit());

        let kind = if fraction {
            self.bump();
            text.push('.');
            text.push_str(&self.take_while(|c| c.is_ascii_digit() || c == '_').replace('_', ""));
            text.parse::<f64>().map(TokenKind::FloatLiteral).ok()
        } else {
            text.parse::<i64>().map(TokenKind::IntLiteral).ok()
        };
        match kind {
            Some(kind) => Ok(self.token(kind)),
            None => Err(LexerError::invalid_number(text, self.span())),
        }
    }

    // ===== Cursor =====

    fn rest(&self) -> &'a str {
        &self.source[self.at.offset..]
    }

    fn first(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.first()?;
        self.at.offset += c.len_utf8();
        if c == '\n' {
            self.at.line += 1;
            self.at.column = 1;
        } else {
            self.at.column += 1;
        }
        Some(c)
    }

    fn take_while(&mut self, mut keep: impl FnMut(char) -> bool) -> &'a str {
        let begin = self.at.offset;
        while self.first().is_some_and(&mut keep) {
            self.bump();
        }
        &self.source[begin..self.at.offset]
    }

    fn span(&self) -> Span {
        Span::new(
            self.start.offset,
            self.at.offset,
            self.start.line,
            self.start.column,
        )
    }

    fn token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.span())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(
            scan("(){}[]"),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            scan("42 3.5 1_000"),
            vec![
                TokenKind::IntLiteral(42),
                TokenKind::FloatLiteral(3.5),
                TokenKind::IntLiteral(1000),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_integer_overflow_is_invalid() {
        let err = Scanner::new("99999999999999999999").scan_tokens().unwrap_err();
        assert!(matches!(err, LexerError::InvalidNumber(..)));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            scan(r#""a\n\"b\"""#),
            vec![
                TokenKind::StringLiteral("a\n\"b\"".to_string()),
                TokenKind::Eof
            ]
        );
        let err = Scanner::new(r#""\q""#).scan_tokens().unwrap_err();
        assert!(matches!(err, LexerError::InvalidEscape('q', _)));
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            scan("let fn match enum interface implementation true letter"),
            vec![
                TokenKind::Let,
                TokenKind::Fn,
                TokenKind::Match,
                TokenKind::Enum,
                TokenKind::Interface,
                TokenKind::Implementation,
                TokenKind::BoolLiteral(true),
                TokenKind::Identifier("letter".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            scan("-> => == != <= >= && || ! - ="),
            vec![
                TokenKind::Arrow,
                TokenKind::FatArrow,
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Bang,
                TokenKind::Minus,
                TokenKind::Equal,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            scan("1 // line\n/* block /* nested */ */ 2"),
            vec![
                TokenKind::IntLiteral(1),
                TokenKind::IntLiteral(2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_spans_track_lines() {
        let tokens = Scanner::new("a\n  bc").scan_tokens().unwrap();
        assert_eq!((tokens[1].span.line, tokens[1].span.column), (2, 3));
        assert_eq!((tokens[1].span.start, tokens[1].span.end), (4, 6));
    }

    #[test]
    fn test_unterminated_string() {
        let err = Scanner::new("\"abc").scan_tokens().unwrap_err();
        assert!(matches!(err, LexerError::UnterminatedString(_)));
    }

    #[test]
    fn test_lone_pipe_is_rejected() {
        let err = Scanner::new("a | b").scan_tokens().unwrap_err();
        assert!(matches!(err, LexerError::UnexpectedChar('|', _)));
    }
}
