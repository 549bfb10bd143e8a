//! Panic-mode diagnostic collection for the compiler front end.
//!
//! spec.md §7: the compiler enters panic mode on the first error, keeps
//! parsing so it can report *additional* errors, but suppresses further
//! reports until the parser resynchronizes at a statement boundary — this
//! is what keeps a single bad token from producing a screen of cascading
//! nonsense errors. Reports are written immediately, in `[line N]
//! Error[ at '...']: message` form, to whatever writer the handler is
//! constructed with (normally stderr).

use std::cell::Cell;
use std::fmt;

use crate::Span;

/// Severity of a reported diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "Error"),
        }
    }
}

/// A single reported diagnostic, formatted per spec.md §7.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub span: Span,
    /// The offending lexeme, if the error point is a specific token
    /// (`None` for e.g. end-of-file errors, which omit the `at '...'` clause).
    pub at: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] {}", self.span.line(), self.level)?;
        match &self.at {
            Some(lexeme) if lexeme.is_empty() => write!(f, " at end")?,
            Some(lexeme) => write!(f, " at '{lexeme}'")?,
            None => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// Collects and reports compile-time diagnostics with panic-mode
/// suppression.
///
/// # Examples
///
/// ```
/// use wispc_util::{Handler, Span};
///
/// let mut handler = Handler::new();
/// handler.error_at(Span::new(1), Some("+"), "unexpected token");
/// assert!(handler.had_error());
/// ```
pub struct Handler {
    had_error: Cell<bool>,
    panic_mode: Cell<bool>,
    reported: Vec<Diagnostic>,
}

impl Handler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            had_error: Cell::new(false),
            panic_mode: Cell::new(false),
            reported: Vec::new(),
        }
    }

    /// Report an error at a specific token's lexeme. No-op while already in
    /// panic mode, so a cascade of follow-on errors from one bad token
    /// doesn't reach the user.
    pub fn error_at(&mut self, span: Span, lexeme: Option<&str>, message: impl Into<String>) {
        if self.panic_mode.get() {
            return;
        }
        self.panic_mode.set(true);
        self.had_error.set(true);
        let diagnostic = Diagnostic {
            level: Level::Error,
            span,
            at: lexeme.map(str::to_owned),
            message: message.into(),
        };
        eprintln!("{diagnostic}");
        self.reported.push(diagnostic);
    }

    /// Called by the compiler once it has resynchronized at a statement
    /// boundary (a semicolon or a statement-introducing keyword).
    pub fn synchronize(&mut self) {
        self.panic_mode.set(false);
    }

    #[must_use]
    pub fn had_error(&self) -> bool {
        self.had_error.get()
    }

    #[must_use]
    pub fn in_panic_mode(&self) -> bool {
        self.panic_mode.get()
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.reported
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_is_reported() {
        let mut handler = Handler::new();
        handler.error_at(Span::new(5), Some(";"), "expected expression");
        assert!(handler.had_error());
        assert_eq!(handler.diagnostics().len(), 1);
        assert_eq!(
            handler.diagnostics()[0].to_string(),
            "[line 5] Error at ';': expected expression"
        );
    }

    #[test]
    fn panic_mode_suppresses_cascading_errors() {
        let mut handler = Handler::new();
        handler.error_at(Span::new(1), Some("a"), "first");
        handler.error_at(Span::new(2), Some("b"), "second");
        assert_eq!(handler.diagnostics().len(), 1);
        handler.synchronize();
        handler.error_at(Span::new(3), Some("c"), "third");
        assert_eq!(handler.diagnostics().len(), 2);
    }

    #[test]
    fn eof_error_omits_lexeme() {
        let mut handler = Handler::new();
        handler.error_at(Span::new(9), Some(""), "expected '}' after block");
        assert_eq!(
            handler.diagnostics()[0].to_string(),
            "[line 9] Error at end: expected '}' after block"
        );
    }
}
