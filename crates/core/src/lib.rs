//! rlox core: the value, object, and chunk types shared by the compiler
//! and the VM, plus the allocator/garbage-collector primitives built
//! around them.
//!
//! # Modules
//!
//! - `value`: the tagged `Value` union (nil, bool, number, object ref).
//! - `object`: heap object kinds sharing a common header, and the
//!   intrusive all-objects list they are threaded onto.
//! - `table`: the open-addressed hash table used for globals, instance
//!   fields, class method tables, and the string intern table.
//! - `chunk`: a function's bytecode, parallel line map, and constant
//!   pool, plus a disassembler for inspecting compiled output.
//! - `heap`: the allocator. Owns the intern table and the all-objects
//!   list, and implements the tri-color mark-sweep collector; the
//!   owning VM supplies root enumeration.

pub mod chunk;
pub mod object;
pub mod table;
pub mod value;

mod heap;

pub use chunk::{Chunk, OpCode};
pub use heap::{GcStats, Heap, GC_HEAP_GROW_FACTOR};
pub use object::{
    NativeFn, Obj, ObjBoundMethod, ObjClass, ObjClosure, ObjData, ObjFunction, ObjInstance,
    ObjKind, ObjNative, ObjString, ObjUpvalue, ObjRef,
};
pub use table::Table;
pub use value::Value;
