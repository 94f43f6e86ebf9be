//! Binding power of infix operators.

use crate::lexer::TokenKind;

/// Binding levels, loosest first. `None` marks a token that never continues
/// an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
}

const LADDER: [Precedence; 9] = [
    Precedence::None,
    Precedence::Or,
    Precedence::And,
    Precedence::Equality,
    Precedence::Comparison,
    Precedence::Term,
    Precedence::Factor,
    Precedence::Unary,
    Precedence::Call,
];

impl Precedence {
    /// One level tighter; used for the right operand of left-associative
    /// operators.
    pub fn next(self) -> Precedence {
        LADDER[(self as usize + 1).min(LADDER.len() - 1)]
    }
}

pub fn infix_precedence(kind: &TokenKind) -> Precedence {
    use TokenKind::*;
    match kind {
        Or => Precedence::Or,
        And => Precedence::And,
        EqualEqual | BangEqual => Precedence::Equality,
        Less | LessEqual | Greater | GreaterEqual => Precedence::Comparison,
        Plus | Minus => Precedence::Term,
        Star | Slash | Percent => Precedence::Factor,
        LeftParen => Precedence::Call,
        _ => Precedence::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_is_ordered() {
        assert!(LADDER.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(Precedence::Call.next(), Precedence::Call);
        assert_eq!(Precedence::Term.next(), Precedence::Factor);
    }
}
