//! The bytecode VM: call-frame dispatch, native functions, and the
//! root-enumeration half of garbage collection (the mechanical
//! mark/trace/sweep primitives live in `rlox_core::Heap`).

mod config;
mod error;
mod natives;
mod vm;

pub use config::VmConfig;
pub use error::{exit_code, FrameTrace, InterpretError, InterpretResult, RuntimeError};
pub use vm::Vm;
