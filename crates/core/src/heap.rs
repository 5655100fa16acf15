//! The allocator: owns the intrusive all-objects list and the string
//! intern table, and implements the mechanical half of the tri-color
//! mark-sweep collector (marking, tracing, sweeping). Root enumeration
//! is the caller's job: `rlox-vm` knows about the VM stack, call
//! frames, globals, and open upvalues, and drives a collection by
//! marking those roots and then calling `trace_references`,
//! `sweep_strings`, and `sweep_objects` in that order.

use crate::object::{
    fnv1a, NativeFn, Obj, ObjBoundMethod, ObjClass, ObjClosure, ObjData, ObjFunction, ObjInstance,
    ObjNative, ObjRef, ObjString, ObjUpvalue,
};
use crate::table::Table;
use crate::value::Value;

/// `next_gc = bytes_allocated * GC_HEAP_GROW_FACTOR` after each collection.
pub const GC_HEAP_GROW_FACTOR: f64 = 2.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct GcStats {
    pub freed_objects: usize,
    pub freed_bytes: usize,
}

pub struct Heap {
    objects: Option<ObjRef>,
    strings: Table,
    gray: Vec<ObjRef>,
    pub bytes_allocated: usize,
    pub next_gc: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            objects: None,
            strings: Table::new(),
            gray: Vec::new(),
            bytes_allocated: 0,
            next_gc: 1024 * 1024,
        }
    }

    pub fn should_collect(&self) -> bool {
        self.bytes_allocated > self.next_gc
    }

    fn alloc_obj(&mut self, data: ObjData) -> ObjRef {
        let obj = Box::new(Obj {
            marked: false,
            next: self.objects,
            data,
        });
        let ptr = Box::into_raw(obj);
        let objref = ObjRef(ptr);
        self.bytes_allocated += objref.as_ref().data.deep_size();
        self.objects = Some(objref);
        objref
    }

    pub fn intern_str(&mut self, s: &str) -> ObjRef {
        let hash = fnv1a(s.as_bytes());
        if let Some(existing) = self.strings.find_string(s, hash) {
            return existing;
        }
        let objref = self.alloc_obj(ObjData::String(ObjString {
            chars: s.into(),
            hash,
        }));
        self.strings.set(objref, Value::Nil);
        objref
    }

    /// Takes ownership of an already-built `String` (e.g. the result
    /// of concatenation) instead of copying from a `&str`. If an equal
    /// string is already interned, the new buffer is simply dropped.
    pub fn take_string(&mut self, s: String) -> ObjRef {
        let hash = fnv1a(s.as_bytes());
        if let Some(existing) = self.strings.find_string(&s, hash) {
            return existing;
        }
        let objref = self.alloc_obj(ObjData::String(ObjString {
            chars: s.into_boxed_str(),
            hash,
        }));
        self.strings.set(objref, Value::Nil);
        objref
    }

    pub fn alloc_function(&mut self) -> ObjRef {
        self.alloc_obj(ObjData::Function(ObjFunction::new()))
    }

    pub fn alloc_native(&mut self, function: NativeFn, name: &'static str, arity: Option<u8>) -> ObjRef {
        self.alloc_obj(ObjData::Native(ObjNative {
            function,
            name,
            arity,
        }))
    }

    pub fn alloc_closure(&mut self, function: ObjRef, upvalues: Vec<ObjRef>) -> ObjRef {
        self.alloc_obj(ObjData::Closure(ObjClosure { function, upvalues }))
    }

    pub fn alloc_upvalue(&mut self, location: *mut Value) -> ObjRef {
        self.alloc_obj(ObjData::Upvalue(ObjUpvalue {
            location,
            closed: Value::Nil,
            next_open: None,
        }))
    }

    pub fn alloc_class(&mut self, name: ObjRef) -> ObjRef {
        self.alloc_obj(ObjData::Class(ObjClass {
            name,
            methods: Table::new(),
        }))
    }

    pub fn alloc_instance(&mut self, class: ObjRef) -> ObjRef {
        self.alloc_obj(ObjData::Instance(ObjInstance {
            class,
            fields: Table::new(),
        }))
    }

    pub fn alloc_bound_method(&mut self, receiver: Value, method: ObjRef) -> ObjRef {
        self.alloc_obj(ObjData::BoundMethod(ObjBoundMethod { receiver, method }))
    }

    // --- mark phase ---

    pub fn mark_value(&mut self, value: Value) {
        if let Value::Obj(o) = value {
            self.mark_object(o);
        }
    }

    pub fn mark_object(&mut self, obj: ObjRef) {
        if obj.as_ref().marked {
            return;
        }
        obj.as_mut().marked = true;
        self.gray.push(obj);
    }

    pub fn mark_table(&mut self, table: &Table) {
        let entries: Vec<_> = table.iter().collect();
        for (key, value) in entries {
            self.mark_object(key);
            self.mark_value(value);
        }
    }

    /// Pops gray objects and blackens each by marking its outgoing
    /// references, until none remain.
    pub fn trace_references(&mut self) {
        while let Some(obj) = self.gray.pop() {
            self.blacken(obj);
        }
    }

    fn blacken(&mut self, obj: ObjRef) {
        match &obj.as_ref().data {
            ObjData::Closure(c) => {
                let function = c.function;
                let upvalues = c.upvalues.clone();
                self.mark_object(function);
                for uv in upvalues {
                    self.mark_object(uv);
                }
            }
            ObjData::Function(f) => {
                if let Some(name) = f.name {
                    self.mark_object(name);
                }
                let constants = f.chunk.constants.clone();
                for c in constants {
                    self.mark_value(c);
                }
            }
            ObjData::Upvalue(u) => self.mark_value(u.closed),
            ObjData::Class(c) => {
                self.mark_object(c.name);
                let methods: Vec<_> = c.methods.iter().collect();
                for (key, value) in methods {
                    self.mark_object(key);
                    self.mark_value(value);
                }
            }
            ObjData::Instance(i) => {
                self.mark_object(i.class);
                let fields: Vec<_> = i.fields.iter().collect();
                for (key, value) in fields {
                    self.mark_object(key);
                    self.mark_value(value);
                }
            }
            ObjData::BoundMethod(b) => {
                self.mark_value(b.receiver);
                self.mark_object(b.method);
            }
            ObjData::String(_) | ObjData::Native(_) => {}
        }
    }

    /// Weak sweep: entries whose key is unmarked are removed, letting
    /// unreferenced interned strings be reclaimed by the object sweep.
    pub fn sweep_strings(&mut self) {
        self.strings.remove_unmarked_keys();
    }

    /// Walks the intrusive object list, freeing unmarked objects and
    /// clearing the mark bit on survivors.
    pub fn sweep_objects(&mut self) -> GcStats {
        let mut stats = GcStats::default();
        let mut previous: Option<ObjRef> = None;
        let mut current = self.objects;

        while let Some(obj) = current {
            let next = obj.as_ref().next;
            if obj.as_ref().marked {
                obj.as_mut().marked = false;
                previous = Some(obj);
                current = next;
            } else {
                match previous {
                    Some(p) => p.as_mut().next = next,
                    None => self.objects = next,
                }
                stats.freed_bytes += obj.as_ref().data.deep_size();
                stats.freed_objects += 1;
                // Safety: `obj` is not reachable from any root (it was
                // white at the end of the mark phase) and is being
                // unlinked from the only list that references it.
                unsafe {
                    drop(Box::from_raw(obj.0));
                }
                current = next;
            }
        }

        self.bytes_allocated = self.bytes_allocated.saturating_sub(stats.freed_bytes);
        stats
    }

    pub fn update_threshold(&mut self, grow_factor: f64) {
        self.next_gc = (self.bytes_allocated as f64 * grow_factor) as usize;
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        let mut current = self.objects;
        while let Some(obj) = current {
            let next = obj.as_ref().next;
            unsafe {
                drop(Box::from_raw(obj.0));
            }
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_content_twice_yields_the_same_object() {
        let mut heap = Heap::new();
        let a = heap.intern_str("hello");
        let b = heap.intern_str("hello");
        assert_eq!(a, b);
    }

    #[test]
    fn take_string_dedups_against_an_interned_copy() {
        let mut heap = Heap::new();
        let a = heap.intern_str("hello");
        let b = heap.take_string("hello".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_content_is_not_interned_together() {
        let mut heap = Heap::new();
        let a = heap.intern_str("hello");
        let b = heap.intern_str("world");
        assert_ne!(a, b);
    }

    #[test]
    fn sweep_frees_unmarked_objects() {
        let mut heap = Heap::new();
        let a = heap.alloc_function();
        heap.mark_object(a);
        let _unreachable = heap.alloc_function();
        heap.trace_references();
        heap.sweep_strings();
        let stats = heap.sweep_objects();
        assert_eq!(stats.freed_objects, 1);
        assert!(!a.as_ref().marked);
    }
}
