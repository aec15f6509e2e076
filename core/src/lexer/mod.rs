//! Lexical analysis
//!
//! Turns script source into a flat token stream terminated by a single
//! `Eof`. Scanning never fails: malformed input produces diagnostics and a
//! best-effort token stream.

mod scanner;
mod token;


pub use scanner::Lexer;
pub use token::{Token, TokenKind};

use crate::diagnostics::Diagnostic;

/// Tokenize source text, discarding diagnostics (they are still logged)
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize().0
}

/// Tokenize source text and return the lexical diagnostics alongside
pub fn tokenize_with_diagnostics(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(source).tokenize()
}
