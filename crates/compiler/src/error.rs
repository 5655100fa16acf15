//! Compile-time diagnostics.
//!
//! A hand-rolled error enum, no `thiserror`/`anyhow`; a closed, small
//! error surface doesn't need either.

use std::fmt;

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub line: i32,
    /// Where in the token stream the error occurred, e.g. `" at end"`
    /// or `" at 'foo'"`; empty for scanner-originated errors, which
    /// carry their own message and no token to point at.
    pub context: String,
    pub message: String,
}

/// Accumulated panic-mode diagnostics from a single compile. `interpret`
/// maps this to exit code 65 (see spec §6).
#[derive(Debug, Clone, Default)]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.diagnostics {
            writeln!(f, "[line {}] Error{}: {}", d.line, d.context, d.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}
