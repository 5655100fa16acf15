//! Heap object kinds.
//!
//! Every heap object shares a header `{kind, marked, next}` (`next`
//! threads every allocated object into a single intrusive list so the
//! sweep phase can walk them all without a separate registry). The
//! payload lives in [`ObjData`].

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::chunk::Chunk;
use crate::table::Table;
use crate::value::Value;

/// Discriminant mirrored on the header so callers can check an
/// object's kind without matching on `ObjData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjKind {
    String,
    Function,
    Native,
    Closure,
    Upvalue,
    Class,
    Instance,
    BoundMethod,
}

pub type NativeFn = fn(argc: usize, args: &[Value]) -> Result<Value, String>;

pub struct ObjString {
    pub chars: Box<str>,
    pub hash: u32,
}

pub struct ObjFunction {
    pub arity: u8,
    pub upvalue_count: usize,
    pub chunk: Chunk,
    pub name: Option<ObjRef>,
}

impl ObjFunction {
    pub fn new() -> Self {
        Self {
            arity: 0,
            upvalue_count: 0,
            chunk: Chunk::new(),
            name: None,
        }
    }
}

pub struct ObjNative {
    pub function: NativeFn,
    pub arity: Option<u8>,
    pub name: &'static str,
}

pub struct ObjClosure {
    pub function: ObjRef,
    pub upvalues: Vec<ObjRef>,
}

/// Open: `location` points into the VM stack. Closed: `location` is
/// repointed at `closed` once the stack slot is popped.
pub struct ObjUpvalue {
    pub location: *mut Value,
    pub closed: Value,
    /// Next entry in the VM's sorted open-upvalue list. Unused once closed.
    pub next_open: Option<ObjRef>,
}

pub struct ObjClass {
    pub name: ObjRef,
    pub methods: Table,
}

pub struct ObjInstance {
    pub class: ObjRef,
    pub fields: Table,
}

pub struct ObjBoundMethod {
    pub receiver: Value,
    pub method: ObjRef,
}

pub enum ObjData {
    String(ObjString),
    Function(ObjFunction),
    Native(ObjNative),
    Closure(ObjClosure),
    Upvalue(ObjUpvalue),
    Class(ObjClass),
    Instance(ObjInstance),
    BoundMethod(ObjBoundMethod),
}

impl ObjData {
    pub fn kind(&self) -> ObjKind {
        match self {
            ObjData::String(_) => ObjKind::String,
            ObjData::Function(_) => ObjKind::Function,
            ObjData::Native(_) => ObjKind::Native,
            ObjData::Closure(_) => ObjKind::Closure,
            ObjData::Upvalue(_) => ObjKind::Upvalue,
            ObjData::Class(_) => ObjKind::Class,
            ObjData::Instance(_) => ObjKind::Instance,
            ObjData::BoundMethod(_) => ObjKind::BoundMethod,
        }
    }

    /// Approximate heap footprint, used for `bytes_allocated` accounting.
    pub fn deep_size(&self) -> usize {
        let base = std::mem::size_of::<Obj>();
        base + match self {
            ObjData::String(s) => s.chars.len(),
            ObjData::Function(f) => f.chunk.code.len() + f.chunk.lines.len() * 4,
            ObjData::Native(_) => 0,
            ObjData::Closure(c) => c.upvalues.len() * std::mem::size_of::<ObjRef>(),
            ObjData::Upvalue(_) => 0,
            ObjData::Class(c) => c.methods.capacity() * std::mem::size_of::<Value>(),
            ObjData::Instance(i) => i.fields.capacity() * std::mem::size_of::<Value>(),
            ObjData::BoundMethod(_) => 0,
        }
    }
}

/// The common object header plus payload. Objects are allocated with
/// `Box::new`, leaked into a raw pointer, and only ever freed again by
/// the collector's sweep phase (see `Heap::sweep_objects`) or VM
/// teardown.
pub struct Obj {
    pub marked: bool,
    pub next: Option<ObjRef>,
    pub data: ObjData,
}

/// A `Copy`able handle to a heap object. Equality and hashing are by
/// pointer identity: since strings are interned, two `ObjRef`s to
/// `String` objects are equal iff their contents were equal at intern
/// time (see `Heap::intern_str`).
#[derive(Clone, Copy)]
pub struct ObjRef(pub *mut Obj);

impl ObjRef {
    /// # Safety
    /// The pointee must be live: either still reachable from a root at
    /// the time of the call, or known not to have been swept yet.
    #[allow(clippy::should_implement_trait)]
    pub fn as_ref(&self) -> &Obj {
        unsafe { &*self.0 }
    }

    /// # Safety
    /// Same requirement as `as_ref`; additionally the caller must not
    /// alias this with another live `&mut Obj`.
    #[allow(clippy::mut_from_ref)]
    pub fn as_mut(&self) -> &mut Obj {
        unsafe { &mut *self.0 }
    }

    pub fn kind(&self) -> ObjKind {
        self.as_ref().data.kind()
    }

    pub fn is_string(&self) -> bool {
        matches!(self.as_ref().data, ObjData::String(_))
    }

    pub fn as_str(&self) -> &str {
        match &self.as_ref().data {
            ObjData::String(s) => &s.chars,
            _ => panic!("ObjRef::as_str on non-string object"),
        }
    }

    pub fn as_function(&self) -> &ObjFunction {
        match &self.as_ref().data {
            ObjData::Function(f) => f,
            _ => panic!("ObjRef::as_function on non-function object"),
        }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn as_function_mut(&self) -> &mut ObjFunction {
        match &mut self.as_mut().data {
            ObjData::Function(f) => f,
            _ => panic!("ObjRef::as_function_mut on non-function object"),
        }
    }

    pub fn as_native(&self) -> &ObjNative {
        match &self.as_ref().data {
            ObjData::Native(n) => n,
            _ => panic!("ObjRef::as_native on non-native object"),
        }
    }

    pub fn as_closure(&self) -> &ObjClosure {
        match &self.as_ref().data {
            ObjData::Closure(c) => c,
            _ => panic!("ObjRef::as_closure on non-closure object"),
        }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn as_upvalue_mut(&self) -> &mut ObjUpvalue {
        match &mut self.as_mut().data {
            ObjData::Upvalue(u) => u,
            _ => panic!("ObjRef::as_upvalue_mut on non-upvalue object"),
        }
    }

    pub fn as_class(&self) -> &ObjClass {
        match &self.as_ref().data {
            ObjData::Class(c) => c,
            _ => panic!("ObjRef::as_class on non-class object"),
        }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn as_class_mut(&self) -> &mut ObjClass {
        match &mut self.as_mut().data {
            ObjData::Class(c) => c,
            _ => panic!("ObjRef::as_class_mut on non-class object"),
        }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn as_instance_mut(&self) -> &mut ObjInstance {
        match &mut self.as_mut().data {
            ObjData::Instance(i) => i,
            _ => panic!("ObjRef::as_instance_mut on non-instance object"),
        }
    }

    pub fn as_bound_method(&self) -> &ObjBoundMethod {
        match &self.as_ref().data {
            ObjData::BoundMethod(b) => b,
            _ => panic!("ObjRef::as_bound_method on non-bound-method object"),
        }
    }
}

impl PartialEq for ObjRef {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}
impl Eq for ObjRef {}

impl Hash for ObjRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.0 as usize).hash(state);
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({:?} @ {:p})", self.kind(), self.0)
    }
}

/// FNV-1a 32-bit hash, used for both interned strings and table
/// bucket indexing.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}
