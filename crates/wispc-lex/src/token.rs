//! Token types produced by the scanner (spec.md §6).

/// The category of a scanned token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Single-character punctuation.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,
    Percent,

    // One or two character operators.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals.
    Identifier,
    String,
    Number,

    // Keywords.
    And,
    Class,
    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    /// A scanner-level error; `Token::lexeme` carries the message.
    Error,
    Eof,
}

/// A single scanned token: kind, the source lexeme it came from, and the
/// 1-based source line it starts on.
///
/// `lexeme` borrows directly from the scanned source (no copying); for
/// `TokenKind::Error` it instead holds the error message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub lexeme: &'src [u8],
    pub line: u32,
}

impl<'src> Token<'src> {
    #[must_use]
    pub fn lexeme_str(&self) -> &'src str {
        // The scanner only ever slices on ASCII byte boundaries (see
        // `Scanner::make_token`), so this is always valid UTF-8 even though
        // the language itself treats strings as opaque byte arrays.
        std::str::from_utf8(self.lexeme).unwrap_or("")
    }
}
