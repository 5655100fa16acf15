//! Runtime diagnostics. Same hand-rolled-enum shape as
//! `rlox_compiler::error`: no `thiserror`/`anyhow`, a small closed
//! surface.

use std::fmt;

use rlox_compiler::CompileError;

/// One line of a runtime stack trace: the function active when the
/// error was raised, innermost frame first.
#[derive(Debug, Clone)]
pub struct FrameTrace {
    pub line: i32,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub frames: Vec<FrameTrace>,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        for frame in &self.frames {
            writeln!(f, "[line {}] in {}", frame.line, frame.name)?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

#[derive(Debug)]
pub enum InterpretError {
    Compile(CompileError),
    Runtime(RuntimeError),
}

impl fmt::Display for InterpretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpretError::Compile(e) => write!(f, "{e}"),
            InterpretError::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for InterpretError {}

pub type InterpretResult = Result<(), InterpretError>;

/// Maps an `interpret()` outcome to the `sysexits.h`-style process exit
/// code from the external-interfaces contract.
pub fn exit_code(result: &InterpretResult) -> i32 {
    match result {
        Ok(()) => 0,
        Err(InterpretError::Compile(_)) => 65,
        Err(InterpretError::Runtime(_)) => 70,
    }
}
