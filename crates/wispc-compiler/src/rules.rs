//! The precedence table driving `parse_precedence` (spec.md §4.5).
//!
//! Grounded on `faxc-par`'s binding-power module (`expr.rs`'s `bp` constants
//! and `parse_expression_bp`), adapted from a numeric binding-power scale to
//! an explicit `Precedence` enum — the Source Language's operator set is
//! small and fixed, so a `match`-based rule table reads more directly than
//! a generic binding-power table would.

use wispc_lex::TokenKind;

use crate::compiler::Compiler;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * / %
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    #[must_use]
    pub fn one_higher(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

pub type ParseFn<'src, 'h> = fn(&mut Compiler<'src, 'h>, bool);

pub struct ParseRule<'src, 'h> {
    pub prefix: Option<ParseFn<'src, 'h>>,
    pub infix: Option<ParseFn<'src, 'h>>,
    pub precedence: Precedence,
}

fn rule<'src, 'h>(
    prefix: Option<ParseFn<'src, 'h>>,
    infix: Option<ParseFn<'src, 'h>>,
    precedence: Precedence,
) -> ParseRule<'src, 'h> {
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

/// Looks up the parse rule for `kind`.
///
/// Fixes the source's table bug the REDESIGN notes call out (spec.md §9):
/// the `and_` infix rule belongs to the `and` keyword token, at
/// `Precedence::And`, not to `NUMBER` — `NUMBER` has no infix behavior at
/// all.
pub fn get_rule<'src, 'h>(kind: TokenKind) -> ParseRule<'src, 'h> {
    use Compiler as C;
    match kind {
        TokenKind::LeftParen => rule(Some(C::grouping), Some(C::call), Precedence::Call),
        TokenKind::RightParen | TokenKind::LeftBrace | TokenKind::RightBrace | TokenKind::Comma | TokenKind::Semicolon => {
            rule(None, None, Precedence::None)
        }
        TokenKind::Dot => rule(None, Some(C::dot), Precedence::Call),
        TokenKind::Minus => rule(Some(C::unary), Some(C::binary), Precedence::Term),
        TokenKind::Plus => rule(None, Some(C::binary), Precedence::Term),
        TokenKind::Slash | TokenKind::Star | TokenKind::Percent => rule(None, Some(C::binary), Precedence::Factor),
        TokenKind::Bang => rule(Some(C::unary), None, Precedence::None),
        TokenKind::BangEqual => rule(None, Some(C::binary), Precedence::Equality),
        TokenKind::Equal => rule(None, None, Precedence::None),
        TokenKind::EqualEqual => rule(None, Some(C::binary), Precedence::Equality),
        TokenKind::Greater | TokenKind::GreaterEqual | TokenKind::Less | TokenKind::LessEqual => {
            rule(None, Some(C::binary), Precedence::Comparison)
        }
        TokenKind::Identifier => rule(Some(C::variable), None, Precedence::None),
        TokenKind::String => rule(Some(C::string), None, Precedence::None),
        TokenKind::Number => rule(Some(C::number), None, Precedence::None),
        TokenKind::And => rule(None, Some(C::and), Precedence::And),
        TokenKind::Or => rule(None, Some(C::or), Precedence::Or),
        TokenKind::False | TokenKind::True | TokenKind::Nil => rule(Some(C::literal), None, Precedence::None),
        TokenKind::This => rule(Some(C::this), None, Precedence::None),
        TokenKind::Super => rule(Some(C::super_), None, Precedence::None),
        TokenKind::Class
        | TokenKind::Else
        | TokenKind::For
        | TokenKind::Fun
        | TokenKind::If
        | TokenKind::Print
        | TokenKind::Return
        | TokenKind::Var
        | TokenKind::While
        | TokenKind::Error
        | TokenKind::Eof => rule(None, None, Precedence::None),
    }
}
