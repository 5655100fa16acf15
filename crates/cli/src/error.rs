//! CLI-level errors: I/O failures and usage mistakes, mapped to
//! `sysexits.h`-style process exit codes. Same hand-rolled shape as
//! `rlox_compiler::CompileError`, no `anyhow`; the surface is small
//! and closed.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum CliError {
    Io { path: PathBuf, source: std::io::Error },
    Usage(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Io { .. } => 74,
            CliError::Usage(_) => 64,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io { path, source } => {
                write!(f, "couldn't read '{}': {source}", path.display())
            }
            CliError::Usage(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for CliError {}
