//! Scanner and single-pass Pratt compiler: turns source text directly
//! into bytecode owned by a top-level script [`rlox_core::ObjFunction`],
//! with no intermediate AST.

mod compiler;
mod error;
mod scanner;

pub use compiler::compile;
pub use error::{CompileError, Diagnostic};
pub use scanner::{Scanner, Token, TokenKind};
