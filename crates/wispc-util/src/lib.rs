//! Shared infrastructure used across the Wisp toolchain.
//!
//! This crate has no Wisp-language-specific knowledge. It provides the
//! small pieces every other crate in the workspace needs: a source line
//! marker (`Span`), a panic-mode diagnostic collector (`Handler`), and the
//! shared error enum for misuse of either.

pub mod diagnostic;
mod error;
mod span;

pub use diagnostic::{Diagnostic, Handler, Level};
pub use error::WispUtilError;
pub use span::Span;
