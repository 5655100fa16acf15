//! The bytecode dispatch loop, call-frame management, and GC root
//! enumeration. `rlox_core::Heap` implements the mechanical mark/trace/
//! sweep primitives; this module supplies the roots (stack, frames,
//! globals, open upvalues) and decides when a collection runs.

use rlox_core::{Chunk, Heap, ObjRef, OpCode, Value};

use crate::config::VmConfig;
use crate::error::{FrameTrace, InterpretError, InterpretResult, RuntimeError};
use crate::natives;

struct CallFrame {
    closure: ObjRef,
    ip: usize,
    slot_base: usize,
}

impl CallFrame {
    fn chunk(&self) -> &Chunk {
        &self.closure.as_closure().function.as_function().chunk
    }
}

/// A stack-based VM with a fixed-capacity value stack. The stack's
/// backing storage is allocated once at its maximum size and never
/// reallocated: open upvalues hold raw pointers into it, and a
/// reallocation would dangle them.
pub struct Vm {
    heap: Heap,
    stack: Vec<Value>,
    stack_top: usize,
    frames: Vec<CallFrame>,
    globals: rlox_core::Table,
    open_upvalues: Option<ObjRef>,
    init_string: ObjRef,
    config: VmConfig,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let mut heap = Heap::new();
        let init_string = heap.intern_str("init");
        let mut vm = Self {
            heap,
            stack: vec![Value::Nil; config.stack_max],
            stack_top: 0,
            frames: Vec::with_capacity(config.frames_max),
            globals: rlox_core::Table::new(),
            open_upvalues: None,
            init_string,
            config,
        };
        vm.define_native("clock", natives::clock_native, Some(0));
        vm
    }

    fn define_native(&mut self, name: &'static str, function: rlox_core::NativeFn, arity: Option<u8>) {
        self.collect_garbage_if_needed();
        let native = self.heap.alloc_native(function, name, arity);
        self.push_unchecked(Value::Obj(native));
        let name_ref = self.heap.intern_str(name);
        self.globals.set(name_ref, self.stack[self.stack_top - 1]);
        self.pop();
    }

    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let function = rlox_compiler::compile(source, &mut self.heap)
            .map_err(InterpretError::Compile)?;
        self.run_function(function).map_err(InterpretError::Runtime)
    }

    fn run_function(&mut self, function: ObjRef) -> Result<(), RuntimeError> {
        self.push_unchecked(Value::Obj(function));
        self.collect_garbage_if_needed();
        let closure = self.heap.alloc_closure(function, Vec::new());
        self.pop();
        self.push_unchecked(Value::Obj(closure));
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            slot_base: 0,
        });
        self.run()
    }

    // --- stack primitives ---

    fn push_unchecked(&mut self, value: Value) {
        self.stack[self.stack_top] = value;
        self.stack_top += 1;
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack_top >= self.stack.len() {
            return Err(self.runtime_error("Stack overflow."));
        }
        self.push_unchecked(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack_top -= 1;
        self.stack[self.stack_top]
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack_top - 1 - distance]
    }

    // --- frame & bytecode cursor ---

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("run() always has an active frame")
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("run() always has an active frame")
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.frame_mut();
        let byte = frame.chunk().code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let hi = self.read_byte() as u16;
        let lo = self.read_byte() as u16;
        (hi << 8) | lo
    }

    fn read_constant(&mut self) -> Value {
        let idx = self.read_byte();
        self.frame().chunk().constants[idx as usize]
    }

    fn read_string(&mut self) -> ObjRef {
        match self.read_constant() {
            Value::Obj(o) if o.is_string() => o,
            _ => unreachable!("compiler only ever emits string constants for name operands"),
        }
    }

    // --- errors ---

    fn runtime_error(&self, message: impl Into<String>) -> RuntimeError {
        let mut frames = Vec::with_capacity(self.frames.len());
        for frame in self.frames.iter().rev() {
            let function = frame.closure.as_closure().function;
            let line = if frame.ip > 0 {
                function.as_function().chunk.lines[frame.ip - 1]
            } else {
                0
            };
            let name = function
                .as_function()
                .name
                .map(|n| format!("{}()", n.as_str()))
                .unwrap_or_else(|| "script".to_string());
            frames.push(FrameTrace { line, name });
        }
        RuntimeError {
            message: message.into(),
            frames,
        }
    }

    // --- GC orchestration ---

    fn collect_garbage_if_needed(&mut self) {
        if self.config.stress_gc || self.heap.should_collect() {
            self.collect_garbage();
        }
    }

    fn collect_garbage(&mut self) {
        let before = self.heap.bytes_allocated;
        for value in &self.stack[..self.stack_top] {
            self.heap.mark_value(*value);
        }
        for frame in &self.frames {
            self.heap.mark_object(frame.closure);
        }
        let mut upvalue = self.open_upvalues;
        while let Some(uv) = upvalue {
            self.heap.mark_object(uv);
            upvalue = uv.as_upvalue_mut().next_open;
        }
        self.heap.mark_table(&self.globals);
        self.heap.mark_object(self.init_string);

        self.heap.trace_references();
        self.heap.sweep_strings();
        let stats = self.heap.sweep_objects();
        self.heap.update_threshold(self.config.gc_heap_grow_factor);

        tracing::debug!(
            before,
            after = self.heap.bytes_allocated,
            freed_objects = stats.freed_objects,
            freed_bytes = stats.freed_bytes,
            next_gc = self.heap.next_gc,
            "gc cycle"
        );
    }

    // --- upvalues ---

    fn capture_upvalue(&mut self, stack_index: usize) -> ObjRef {
        let location = &mut self.stack[stack_index] as *mut Value;
        let mut prev: Option<ObjRef> = None;
        let mut current = self.open_upvalues;
        while let Some(uv) = current {
            let loc = uv.as_upvalue_mut().location;
            if (loc as usize) <= (location as usize) {
                break;
            }
            prev = Some(uv);
            current = uv.as_upvalue_mut().next_open;
        }
        if let Some(uv) = current {
            if uv.as_upvalue_mut().location == location {
                return uv;
            }
        }
        self.collect_garbage_if_needed();
        let created = self.heap.alloc_upvalue(location);
        created.as_upvalue_mut().next_open = current;
        match prev {
            Some(p) => p.as_upvalue_mut().next_open = Some(created),
            None => self.open_upvalues = Some(created),
        }
        created
    }

    fn close_upvalues(&mut self, from_index: usize) {
        let boundary = &mut self.stack[from_index] as *mut Value;
        while let Some(uv) = self.open_upvalues {
            let data = uv.as_upvalue_mut();
            if (data.location as usize) < (boundary as usize) {
                break;
            }
            data.closed = unsafe { *data.location };
            data.location = &mut data.closed as *mut Value;
            self.open_upvalues = data.next_open;
        }
    }

    // --- calls ---

    fn call_value(&mut self, callee: Value, argc: u8) -> Result<(), RuntimeError> {
        if let Value::Obj(o) = callee {
            match o.kind() {
                rlox_core::ObjKind::Closure => return self.call_closure(o, argc),
                rlox_core::ObjKind::Native => return self.call_native(o, argc),
                rlox_core::ObjKind::Class => return self.call_class(o, argc),
                rlox_core::ObjKind::BoundMethod => {
                    let bound = o.as_bound_method();
                    let receiver = bound.receiver;
                    let method = bound.method;
                    self.stack[self.stack_top - 1 - argc as usize] = receiver;
                    return self.call_closure(method, argc);
                }
                _ => {}
            }
        }
        Err(self.runtime_error("Can only call functions and classes."))
    }

    fn call_closure(&mut self, closure: ObjRef, argc: u8) -> Result<(), RuntimeError> {
        let arity = closure.as_closure().function.as_function().arity;
        if argc != arity {
            return Err(self.runtime_error(format!(
                "Expected {arity} arguments but got {argc}."
            )));
        }
        if self.frames.len() >= self.config.frames_max {
            return Err(self.runtime_error("Stack overflow."));
        }
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            slot_base: self.stack_top - argc as usize - 1,
        });
        Ok(())
    }

    fn call_native(&mut self, native: ObjRef, argc: u8) -> Result<(), RuntimeError> {
        let native_data = native.as_native();
        if let Some(arity) = native_data.arity {
            if arity != argc {
                return Err(self.runtime_error(format!(
                    "Expected {arity} arguments but got {argc}."
                )));
            }
        }
        let args_start = self.stack_top - argc as usize;
        let result = (native_data.function)(argc as usize, &self.stack[args_start..self.stack_top]);
        match result {
            Ok(value) => {
                self.stack_top = args_start - 1;
                self.push_unchecked(value);
                Ok(())
            }
            Err(message) => Err(self.runtime_error(message)),
        }
    }

    fn call_class(&mut self, class: ObjRef, argc: u8) -> Result<(), RuntimeError> {
        self.collect_garbage_if_needed();
        let instance = self.heap.alloc_instance(class);
        self.stack[self.stack_top - 1 - argc as usize] = Value::Obj(instance);
        if let Some(initializer) = class.as_class().methods.get(self.init_string) {
            let Value::Obj(initializer) = initializer else {
                unreachable!("class methods are always closures");
            };
            return self.call_closure(initializer, argc);
        }
        if argc != 0 {
            return Err(self.runtime_error(format!("Expected 0 arguments but got {argc}.")));
        }
        Ok(())
    }

    fn bind_method(&mut self, class: ObjRef, name: ObjRef) -> Result<(), RuntimeError> {
        let Some(method) = class.as_class().methods.get(name) else {
            return Err(self.runtime_error(format!("Undefined property '{}'.", name.as_str())));
        };
        let Value::Obj(method) = method else {
            unreachable!("class methods are always closures");
        };
        self.collect_garbage_if_needed();
        let receiver = self.peek(0);
        let bound = self.heap.alloc_bound_method(receiver, method);
        self.pop();
        self.push_unchecked(Value::Obj(bound));
        Ok(())
    }

    fn invoke_from_class(&mut self, class: ObjRef, name: ObjRef, argc: u8) -> Result<(), RuntimeError> {
        let Some(method) = class.as_class().methods.get(name) else {
            return Err(self.runtime_error(format!("Undefined property '{}'.", name.as_str())));
        };
        let Value::Obj(method) = method else {
            unreachable!("class methods are always closures");
        };
        self.call_closure(method, argc)
    }

    fn invoke(&mut self, name: ObjRef, argc: u8) -> Result<(), RuntimeError> {
        let receiver = self.peek(argc as usize);
        let Value::Obj(receiver_obj) = receiver else {
            return Err(self.runtime_error("Only instances have methods."));
        };
        if receiver_obj.kind() != rlox_core::ObjKind::Instance {
            return Err(self.runtime_error("Only instances have methods."));
        }
        let instance = receiver_obj.as_instance_mut();
        if let Some(field) = instance.fields.get(name) {
            self.stack[self.stack_top - 1 - argc as usize] = field;
            return self.call_value(field, argc);
        }
        let class = instance.class;
        self.invoke_from_class(class, name, argc)
    }

    // --- the dispatch loop ---

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            #[cfg(feature = "trace-exec")]
            self.trace_instruction();

            let op = OpCode::from_u8(self.read_byte());
            match op {
                OpCode::Constant => {
                    let v = self.read_constant();
                    self.push(v)?;
                }
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().slot_base;
                    let v = self.stack[base + slot];
                    self.push(v)?;
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().slot_base;
                    self.stack[base + slot] = self.peek(0);
                }
                OpCode::GetGlobal => {
                    let name = self.read_string();
                    match self.globals.get(name) {
                        Some(v) => self.push(v)?,
                        None => {
                            return Err(self.runtime_error(format!(
                                "Undefined variable '{}'.",
                                name.as_str()
                            )))
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string();
                    let value = self.peek(0);
                    self.globals.set(name, value);
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let name = self.read_string();
                    let value = self.peek(0);
                    if self.globals.set(name, value) {
                        self.globals.delete(name);
                        return Err(self.runtime_error(format!(
                            "Undefined variable '{}'.",
                            name.as_str()
                        )));
                    }
                }
                OpCode::GetUpvalue => {
                    let idx = self.read_byte() as usize;
                    let closure = self.frame().closure;
                    let uv = closure.as_closure().upvalues[idx];
                    let value = unsafe { *uv.as_upvalue_mut().location };
                    self.push(value)?;
                }
                OpCode::SetUpvalue => {
                    let idx = self.read_byte() as usize;
                    let value = self.peek(0);
                    let closure = self.frame().closure;
                    let uv = closure.as_closure().upvalues[idx];
                    unsafe {
                        *uv.as_upvalue_mut().location = value;
                    }
                }
                OpCode::GetProperty => {
                    let name = self.read_string();
                    let Value::Obj(receiver) = self.peek(0) else {
                        return Err(self.runtime_error("Only instances have properties."));
                    };
                    if receiver.kind() != rlox_core::ObjKind::Instance {
                        return Err(self.runtime_error("Only instances have properties."));
                    }
                    let instance = receiver.as_instance_mut();
                    if let Some(value) = instance.fields.get(name) {
                        self.pop();
                        self.push(value)?;
                    } else {
                        let class = instance.class;
                        self.bind_method(class, name)?;
                    }
                }
                OpCode::SetProperty => {
                    let name = self.read_string();
                    let Value::Obj(receiver) = self.peek(1) else {
                        return Err(self.runtime_error("Only instances have fields."));
                    };
                    if receiver.kind() != rlox_core::ObjKind::Instance {
                        return Err(self.runtime_error("Only instances have fields."));
                    }
                    let value = self.peek(0);
                    receiver.as_instance_mut().fields.set(name, value);
                    self.pop();
                    self.pop();
                    self.push(value)?;
                }
                OpCode::GetSuper => {
                    let name = self.read_string();
                    let Value::Obj(superclass) = self.pop() else {
                        unreachable!("compiler only emits GetSuper with a class on the stack");
                    };
                    self.bind_method(superclass, name)?;
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(Value::values_equal(&a, &b)))?;
                }
                OpCode::NotEqual => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(!Value::values_equal(&a, &b)))?;
                }
                OpCode::Greater => self.binary_compare(|a, b| a > b)?,
                OpCode::Less => self.binary_compare(|a, b| a < b)?,
                OpCode::Add => self.add()?,
                OpCode::Subtract => self.binary_number(|a, b| a - b)?,
                OpCode::Multiply => self.binary_number(|a, b| a * b)?,
                OpCode::Divide => self.binary_number(|a, b| a / b)?,
                OpCode::Not => {
                    let v = self.pop();
                    self.push(Value::Bool(v.is_falsey()))?;
                }
                OpCode::Negate => {
                    let Value::Number(n) = self.peek(0) else {
                        return Err(self.runtime_error("Operand must be a number."));
                    };
                    self.pop();
                    self.push(Value::Number(-n))?;
                }
                OpCode::Print => {
                    let value = self.pop();
                    println!("{}", rlox_core::value::format_value(&value));
                }
                OpCode::Jump => {
                    let offset = self.read_u16();
                    self.frame_mut().ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16();
                    if self.peek(0).is_falsey() {
                        self.frame_mut().ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16();
                    self.frame_mut().ip -= offset as usize;
                }
                OpCode::Call => {
                    let argc = self.read_byte();
                    let callee = self.peek(argc as usize);
                    self.call_value(callee, argc)?;
                }
                OpCode::Invoke => {
                    let name = self.read_string();
                    let argc = self.read_byte();
                    self.invoke(name, argc)?;
                }
                OpCode::SuperInvoke => {
                    let name = self.read_string();
                    let argc = self.read_byte();
                    let Value::Obj(superclass) = self.pop() else {
                        unreachable!("compiler only emits SuperInvoke with a class on the stack");
                    };
                    self.invoke_from_class(superclass, name, argc)?;
                }
                OpCode::Closure => {
                    let idx = self.read_byte();
                    let Value::Obj(function) = self.frame().chunk().constants[idx as usize] else {
                        unreachable!("compiler only emits Closure with a function constant");
                    };
                    let upvalue_count = function.as_function().upvalue_count;
                    let mut upvalues = Vec::with_capacity(upvalue_count);
                    for _ in 0..upvalue_count {
                        let is_local = self.read_byte() != 0;
                        let index = self.read_byte() as usize;
                        if is_local {
                            let base = self.frame().slot_base;
                            upvalues.push(self.capture_upvalue(base + index));
                        } else {
                            let closure = self.frame().closure;
                            upvalues.push(closure.as_closure().upvalues[index]);
                        }
                    }
                    self.collect_garbage_if_needed();
                    let closure = self.heap.alloc_closure(function, upvalues);
                    self.push(Value::Obj(closure))?;
                }
                OpCode::CloseUpvalue => {
                    self.close_upvalues(self.stack_top - 1);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    let slot_base = self.frame().slot_base;
                    self.close_upvalues(slot_base);
                    self.frames.pop();
                    if self.frames.is_empty() {
                        self.pop();
                        return Ok(());
                    }
                    self.stack_top = slot_base;
                    self.push(result)?;
                }
                OpCode::Class => {
                    let name = self.read_string();
                    self.collect_garbage_if_needed();
                    let class = self.heap.alloc_class(name);
                    self.push(Value::Obj(class))?;
                }
                OpCode::Inherit => {
                    let Value::Obj(superclass) = self.peek(1) else {
                        return Err(self.runtime_error("Superclass must be a class."));
                    };
                    if superclass.kind() != rlox_core::ObjKind::Class {
                        return Err(self.runtime_error("Superclass must be a class."));
                    }
                    let Value::Obj(subclass) = self.peek(0) else {
                        unreachable!("compiler only emits Inherit with a class on the stack");
                    };
                    let methods: Vec<_> = superclass.as_class().methods.iter().collect();
                    for (name, method) in methods {
                        subclass.as_class_mut().methods.set(name, method);
                    }
                    self.pop();
                }
                OpCode::Method => {
                    let name = self.read_string();
                    let method = self.peek(0);
                    let Value::Obj(class) = self.peek(1) else {
                        unreachable!("compiler only emits Method inside a class body");
                    };
                    class.as_class_mut().methods.set(name, method);
                    self.pop();
                }
            }
        }
    }

    fn binary_number(&mut self, op: impl Fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let (Value::Number(b), Value::Number(a)) = (self.peek(0), self.peek(1)) else {
            return Err(self.runtime_error("Operands must be numbers."));
        };
        self.pop();
        self.pop();
        self.push(Value::Number(op(a, b)))
    }

    fn binary_compare(&mut self, op: impl Fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
        let (Value::Number(b), Value::Number(a)) = (self.peek(0), self.peek(1)) else {
            return Err(self.runtime_error("Operands must be numbers."));
        };
        self.pop();
        self.pop();
        self.push(Value::Bool(op(a, b)))
    }

    fn add(&mut self) -> Result<(), RuntimeError> {
        match (self.peek(1), self.peek(0)) {
            (Value::Number(a), Value::Number(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Number(a + b))
            }
            (Value::Obj(a), Value::Obj(b)) if a.is_string() && b.is_string() => {
                let concatenated = format!("{}{}", a.as_str(), b.as_str());
                self.collect_garbage_if_needed();
                let interned = self.heap.take_string(concatenated);
                self.pop();
                self.pop();
                self.push(Value::Obj(interned))
            }
            _ => Err(self.runtime_error("Operands must be two numbers or two strings.")),
        }
    }

    #[cfg(feature = "trace-exec")]
    fn trace_instruction(&self) {
        let mut out = String::new();
        out.push_str("          ");
        for i in 0..self.stack_top {
            out.push_str(&format!("[ {} ]", rlox_core::value::format_value(&self.stack[i])));
        }
        tracing::trace!("{out}");
        let frame = self.frame();
        let mut disasm = String::new();
        rlox_core::chunk::disassemble_instruction(frame.chunk(), frame.ip, &mut disasm);
        tracing::trace!("{}", disasm.trim_end());
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InterpretError;

    #[test]
    fn arithmetic_and_precedence() {
        let mut vm = Vm::new();
        assert!(vm.interpret("print 1 + 2 * 3;").is_ok());
    }

    #[test]
    fn string_concatenation_and_equality() {
        let mut vm = Vm::new();
        assert!(vm
            .interpret("var a = \"hi\"; var b = a + a; print b == \"hihi\";")
            .is_ok());
    }

    #[test]
    fn closures_capture_mutable_shared_state() {
        let mut vm = Vm::new();
        let source = "fun makeCounter() { \
             var n = 0; \
             fun c() { n = n + 1; return n; } \
             return c; \
         } \
         var k = makeCounter(); \
         print k(); print k(); print k();";
        assert!(vm.interpret(source).is_ok());
    }

    #[test]
    fn single_inheritance_dispatches_to_the_parent_method() {
        let mut vm = Vm::new();
        let source = "class P { greet() { print \"hi\"; } } \
         class C < P {} \
         C().greet();";
        assert!(vm.interpret(source).is_ok());
    }

    #[test]
    fn initializer_runs_and_returns_the_instance() {
        let mut vm = Vm::new();
        let source = "class Cl { init(x) { this.x = x; } } print Cl(42).x;";
        assert!(vm.interpret(source).is_ok());
    }

    #[test]
    fn invalid_assignment_target_is_a_compile_error() {
        let mut vm = Vm::new();
        let err = vm.interpret("var a = \"x\" = 1;").unwrap_err();
        assert!(matches!(err, InterpretError::Compile(_)));
        assert_eq!(crate::error::exit_code(&Err(err)), 65);
    }

    #[test]
    fn undefined_global_is_a_runtime_error() {
        let mut vm = Vm::new();
        let err = vm.interpret("print undefined_name;").unwrap_err();
        assert!(matches!(err, InterpretError::Runtime(_)));
        assert_eq!(crate::error::exit_code(&Err(err)), 70);
    }

    #[test]
    fn arithmetic_on_non_numbers_is_a_runtime_error() {
        let mut vm = Vm::new();
        let err = vm.interpret("print 1 + true;").unwrap_err();
        assert!(matches!(err, InterpretError::Runtime(_)));
    }

    #[test]
    fn deep_recursion_overflows_the_call_stack_cleanly() {
        let mut vm = Vm::with_config(VmConfig {
            frames_max: 8,
            ..VmConfig::default()
        });
        let source = "fun recurse(n) { return recurse(n + 1); } recurse(0);";
        let err = vm.interpret(source).unwrap_err();
        assert!(matches!(err, InterpretError::Runtime(_)));
    }

    #[test]
    fn the_repl_shares_global_state_across_successive_interprets() {
        let mut vm = Vm::new();
        assert!(vm.interpret("var counter = 0;").is_ok());
        assert!(vm.interpret("counter = counter + 1;").is_ok());
        assert!(vm.interpret("print counter;").is_ok());
    }

    #[test]
    fn falsey_values_are_only_nil_and_false() {
        let mut vm = Vm::new();
        let source = "if (0) { print \"zero is truthy\"; } else { print \"zero is falsey\"; }";
        assert!(vm.interpret(source).is_ok());
    }
}
