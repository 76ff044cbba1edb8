// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Stack-based virtual machine for executing Lox bytecode.

pub mod error;
pub mod frame;
pub mod stack;

use std::io::Write;

use crate::compiler::compile;
use crate::debug::disassemble_instruction;
use crate::heap::{Heap, HeapOptions, Obj};
use crate::object::{
    NativeFn, ObjBoundMethod, ObjClass, ObjClosure, ObjInstance, ObjKind, ObjNative, ObjUpvalue,
};
use crate::opcode::OpCode;
use crate::table::Table;
use crate::value::{format_value, Value};

pub use error::{RuntimeError, TraceLine, VmError};
pub use frame::CallFrame;
pub use stack::ValueStack;

/// Maximum call depth; exceeding it is the "Stack overflow." runtime error.
pub const FRAMES_MAX: usize = 64;

/// Value-stack working capacity: every frame can address 256 slots.
pub const STACK_MAX: usize = FRAMES_MAX * (u8::MAX as usize + 1);

/// Diagnostic switches for the VM.
#[derive(Debug, Clone, Copy, Default)]
pub struct VmOptions {
    /// Print the stack and each instruction before dispatching it.
    pub trace_execution: bool,
    /// Collect on every allocation.
    pub stress_gc: bool,
    /// Trace GC activity to stderr.
    pub log_gc: bool,
}

/// Result type for dispatch-internal operations.
type Result<T> = std::result::Result<T, RuntimeError>;

/// The Lox virtual machine.
///
/// A `Vm` owns its heap, globals, and intern set, so separate instances are
/// fully independent. Dropping the VM frees every object it allocated.
pub struct Vm {
    heap: Heap,
    stack: ValueStack,
    frames: Vec<CallFrame>,

    globals: Table,

    /// Upvalues still pointing into the stack, ordered by descending slot.
    open_upvalues: Vec<Obj>,

    options: VmOptions,
}

impl Vm {
    /// Create a VM with the `clock` native installed.
    pub fn new() -> Self {
        Self::with_options(VmOptions::default())
    }

    pub fn with_options(options: VmOptions) -> Self {
        let heap = Heap::with_options(HeapOptions {
            stress_gc: options.stress_gc,
            log_gc: options.log_gc,
        });

        let mut vm = Vm {
            heap,
            stack: ValueStack::new(STACK_MAX),
            frames: Vec::with_capacity(FRAMES_MAX),
            globals: Table::new(),
            open_upvalues: Vec::new(),
            options,
        };
        crate::natives::install(&mut vm);
        vm
    }

    /// Compile and run a piece of source. Program output goes to `out`;
    /// diagnostics come back as values for the embedder to report.
    pub fn interpret<W: Write>(
        &mut self,
        source: &str,
        out: &mut W,
    ) -> std::result::Result<(), VmError> {
        let function = match compile(source, &mut self.heap, &self.globals) {
            Ok(function) => function,
            Err(errors) => return Err(VmError::Compile(errors)),
        };

        // Keep the fresh script function rooted across the closure
        // allocation.
        self.stack.push(Value::Obj(function));
        let closure = self.alloc(ObjKind::Closure(ObjClosure {
            function,
            upvalues: Vec::new(),
        }));
        self.stack.pop();
        self.stack.push(Value::Obj(closure));

        if let Err(e) = self.call_closure(closure, 0) {
            self.reset_stack();
            return Err(VmError::Runtime(e));
        }

        match self.run(out) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.reset_stack();
                Err(VmError::Runtime(e))
            }
        }
    }

    /// Register a host function under a global name.
    pub fn define_native(&mut self, name: &str, arity: u8, function: NativeFn) {
        let name_obj = self.intern(name);
        // Root the name (and then the native) while allocating.
        self.stack.push(Value::Obj(name_obj));
        let native = self.alloc(ObjKind::Native(ObjNative {
            name: name_obj,
            arity,
            function,
        }));
        self.stack.push(Value::Obj(native));

        let hash = self.heap.str_hash(name_obj);
        self.globals.set(name_obj, hash, Value::Obj(native));

        self.stack.pop();
        self.stack.pop();
    }

    /// The VM's heap, for inspection by embedders and tests.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Current value-stack depth; zero between interpretations.
    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    // =========================================================================
    // Dispatch loop
    // =========================================================================

    fn run<W: Write>(&mut self, out: &mut W) -> Result<()> {
        loop {
            if self.options.trace_execution {
                self.trace_instruction();
            }

            let op = OpCode::try_from(self.read_byte()).expect("compiler emits valid opcodes");

            match op {
                OpCode::Constant => {
                    let constant = self.read_constant();
                    self.stack.push(constant);
                }
                OpCode::Nil => self.stack.push(Value::Nil),
                OpCode::True => self.stack.push(Value::Bool(true)),
                OpCode::False => self.stack.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.stack.pop();
                }

                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().base;
                    let value = self.stack.get(base + slot);
                    self.stack.push(value);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().base;
                    self.stack.set(base + slot, self.stack.peek(0));
                }

                OpCode::GetGlobal => {
                    let name = self.read_string();
                    let hash = self.heap.str_hash(name);
                    match self.globals.get(name, hash) {
                        Some(value) => self.stack.push(value),
                        None => return Err(self.undefined_variable(name)),
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string();
                    let hash = self.heap.str_hash(name);
                    let value = self.stack.peek(0);
                    self.globals.set(name, hash, value);
                    self.stack.pop();
                }
                OpCode::SetGlobal => {
                    let name = self.read_string();
                    let hash = self.heap.str_hash(name);
                    let value = self.stack.peek(0);
                    if self.globals.set(name, hash, value) {
                        // The write slipped in a key that was never defined.
                        self.globals.delete(name, hash);
                        return Err(self.undefined_variable(name));
                    }
                }

                OpCode::GetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let upvalue = self.current_upvalue(slot);
                    let value = match *self.heap.as_upvalue(upvalue) {
                        ObjUpvalue::Open(index) => self.stack.get(index),
                        ObjUpvalue::Closed(value) => value,
                    };
                    self.stack.push(value);
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let upvalue = self.current_upvalue(slot);
                    let value = self.stack.peek(0);
                    match *self.heap.as_upvalue(upvalue) {
                        ObjUpvalue::Open(index) => self.stack.set(index, value),
                        ObjUpvalue::Closed(_) => {
                            *self.heap.as_upvalue_mut(upvalue) = ObjUpvalue::Closed(value);
                        }
                    }
                }

                OpCode::GetProperty => {
                    let name = self.read_string();
                    let instance = match self.as_instance_obj(self.stack.peek(0)) {
                        Some(obj) => obj,
                        None => {
                            return Err(self.runtime_error("Only instances have properties."));
                        }
                    };

                    let hash = self.heap.str_hash(name);
                    let fields = &self.heap.as_instance(instance).fields;
                    if let Some(value) = fields.get(name, hash) {
                        self.stack.pop();
                        self.stack.push(value);
                    } else {
                        let class = self.heap.as_instance(instance).class;
                        self.bind_method(class, name)?;
                    }
                }
                OpCode::SetProperty => {
                    let name = self.read_string();
                    let instance = match self.as_instance_obj(self.stack.peek(1)) {
                        Some(obj) => obj,
                        None => return Err(self.runtime_error("Only instances have fields.")),
                    };

                    let hash = self.heap.str_hash(name);
                    let value = self.stack.peek(0);
                    self.heap
                        .as_instance_mut(instance)
                        .fields
                        .set(name, hash, value);

                    // Replace [instance, value] with the assigned value.
                    let value = self.stack.pop();
                    self.stack.pop();
                    self.stack.push(value);
                }
                OpCode::GetSuper => {
                    let name = self.read_string();
                    let superclass = self
                        .stack
                        .pop()
                        .as_obj()
                        .expect("compiler loads a class for 'super'");
                    self.bind_method(superclass, name)?;
                }

                OpCode::Equal => {
                    let b = self.stack.pop();
                    let a = self.stack.pop();
                    self.stack.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.binary_op(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.binary_op(|a, b| Value::Bool(a < b))?,
                OpCode::Add => self.add()?,
                OpCode::Subtract => self.binary_op(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.binary_op(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.binary_op(|a, b| Value::Number(a / b))?,
                OpCode::Not => {
                    let value = self.stack.pop();
                    self.stack.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => {
                    let Value::Number(n) = self.stack.peek(0) else {
                        return Err(self.runtime_error("Operand must be a number."));
                    };
                    self.stack.pop();
                    self.stack.push(Value::Number(-n));
                }

                OpCode::Print => {
                    let value = self.stack.pop();
                    writeln!(out, "{}", format_value(value, &self.heap))
                        .expect("failed to write program output");
                }

                OpCode::Jump => {
                    let offset = self.read_short() as usize;
                    self.frame_mut().ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_short() as usize;
                    if self.stack.peek(0).is_falsey() {
                        self.frame_mut().ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_short() as usize;
                    self.frame_mut().ip -= offset;
                }

                OpCode::Call => {
                    let arg_count = self.read_byte();
                    let callee = self.stack.peek(arg_count as usize);
                    self.call_value(callee, arg_count)?;
                }
                OpCode::Invoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    self.invoke(name, arg_count)?;
                }
                OpCode::SuperInvoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    let superclass = self
                        .stack
                        .pop()
                        .as_obj()
                        .expect("compiler loads a class for 'super'");
                    self.invoke_from_class(superclass, name, arg_count)?;
                }

                OpCode::Closure => {
                    let function = self
                        .read_constant()
                        .as_obj()
                        .expect("closure constant is a function");
                    let upvalue_count = self.heap.as_function(function).upvalue_count;

                    let closure = self.alloc(ObjKind::Closure(ObjClosure {
                        function,
                        upvalues: Vec::with_capacity(upvalue_count),
                    }));
                    // On the stack before the captures are read, so a
                    // collection mid-capture still sees it.
                    self.stack.push(Value::Obj(closure));

                    for _ in 0..upvalue_count {
                        let is_local = self.read_byte() == 1;
                        let index = self.read_byte() as usize;
                        let upvalue = if is_local {
                            let base = self.frame().base;
                            self.capture_upvalue(base + index)
                        } else {
                            self.current_upvalue(index)
                        };
                        self.heap.as_closure_mut(closure).upvalues.push(upvalue);
                    }
                }
                OpCode::CloseUpvalue => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues(top);
                    self.stack.pop();
                }

                OpCode::Return => {
                    let result = self.stack.pop();
                    let frame = self.frames.pop().expect("no active frame");
                    self.close_upvalues(frame.base);

                    if self.frames.is_empty() {
                        // Pop the script closure; the stack is now empty.
                        self.stack.pop();
                        return Ok(());
                    }

                    self.stack.truncate(frame.base);
                    self.stack.push(result);
                }

                OpCode::Class => {
                    let name = self.read_string();
                    let class = self.alloc(ObjKind::Class(ObjClass {
                        name,
                        methods: Table::new(),
                    }));
                    self.stack.push(Value::Obj(class));
                }
                OpCode::Inherit => {
                    let superclass = match self.stack.peek(1).as_obj() {
                        Some(obj) if matches!(self.heap.kind(obj), ObjKind::Class(_)) => obj,
                        _ => return Err(self.runtime_error("Superclass must be a class.")),
                    };
                    let subclass = self
                        .stack
                        .peek(0)
                        .as_obj()
                        .expect("compiler pushes the class being declared");

                    let methods: Vec<(Obj, Value)> =
                        self.heap.as_class(superclass).methods.iter().collect();
                    for (key, value) in methods {
                        let hash = self.heap.str_hash(key);
                        self.heap.as_class_mut(subclass).methods.set(key, hash, value);
                    }
                    self.stack.pop();
                }
                OpCode::Method => {
                    let name = self.read_string();
                    let method = self.stack.peek(0);
                    let class = self
                        .stack
                        .peek(1)
                        .as_obj()
                        .expect("compiler pushes the class below its methods");
                    let hash = self.heap.str_hash(name);
                    self.heap.as_class_mut(class).methods.set(name, hash, method);
                    self.stack.pop();
                }
            }
        }
    }

    // =========================================================================
    // Instruction stream access
    // =========================================================================

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("no active frame")
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("no active frame")
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("no active frame");
        let closure = self.heap.as_closure(frame.closure);
        let byte = self.heap.as_function(closure.function).chunk.code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_short(&mut self) -> u16 {
        let hi = self.read_byte();
        let lo = self.read_byte();
        u16::from_be_bytes([hi, lo])
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        let frame = self.frames.last().expect("no active frame");
        let closure = self.heap.as_closure(frame.closure);
        self.heap.as_function(closure.function).chunk.constants[index]
    }

    fn read_string(&mut self) -> Obj {
        self.read_constant()
            .as_obj()
            .expect("constant operand names an interned string")
    }

    /// The running closure's upvalue at `slot`.
    fn current_upvalue(&self, slot: usize) -> Obj {
        let frame = self.frame();
        self.heap.as_closure(frame.closure).upvalues[slot]
    }

    fn as_instance_obj(&self, value: Value) -> Option<Obj> {
        match value.as_obj() {
            Some(obj) if matches!(self.heap.kind(obj), ObjKind::Instance(_)) => Some(obj),
            _ => None,
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<()> {
        if let Some(obj) = callee.as_obj() {
            match self.heap.kind(obj) {
                ObjKind::Closure(_) => return self.call_closure(obj, arg_count),

                ObjKind::Native(native) => {
                    if native.arity != arg_count {
                        let message = format!(
                            "Expected {} arguments but got {}.",
                            native.arity, arg_count
                        );
                        return Err(self.runtime_error(message));
                    }
                    let function = native.function;
                    let start = self.stack.len() - arg_count as usize;
                    let result = function(&self.stack.as_slice()[start..]);
                    self.stack.truncate(start - 1);
                    self.stack.push(result);
                    return Ok(());
                }

                ObjKind::Class(_) => {
                    let instance = self.alloc(ObjKind::Instance(ObjInstance {
                        class: obj,
                        fields: Table::new(),
                    }));
                    let callee_slot = self.stack.len() - arg_count as usize - 1;
                    self.stack.set(callee_slot, Value::Obj(instance));

                    // The fresh instance is already rooted through the
                    // stack, so interning "init" may safely collect.
                    let init_string = self.intern("init");
                    let hash = self.heap.str_hash(init_string);
                    let initializer = self.heap.as_class(obj).methods.get(init_string, hash);
                    return match initializer {
                        Some(init) => {
                            let init = init.as_obj().expect("methods are closures");
                            self.call_closure(init, arg_count)
                        }
                        None if arg_count != 0 => {
                            let message = format!("Expected 0 arguments but got {}.", arg_count);
                            Err(self.runtime_error(message))
                        }
                        None => Ok(()),
                    };
                }

                ObjKind::BoundMethod(bound) => {
                    let receiver = bound.receiver;
                    let method = bound.method;
                    let callee_slot = self.stack.len() - arg_count as usize - 1;
                    self.stack.set(callee_slot, receiver);
                    return self.call_closure(method, arg_count);
                }

                _ => {}
            }
        }
        Err(self.runtime_error("Can only call functions and classes."))
    }

    fn call_closure(&mut self, closure: Obj, arg_count: u8) -> Result<()> {
        let arity = self.heap.as_function(self.heap.as_closure(closure).function).arity;
        if arity != arg_count {
            let message = format!("Expected {} arguments but got {}.", arity, arg_count);
            return Err(self.runtime_error(message));
        }

        if self.frames.len() == FRAMES_MAX {
            return Err(self.runtime_error("Stack overflow."));
        }

        let base = self.stack.len() - arg_count as usize - 1;
        self.frames.push(CallFrame::new(closure, base));
        Ok(())
    }

    fn invoke(&mut self, name: Obj, arg_count: u8) -> Result<()> {
        let receiver = self.stack.peek(arg_count as usize);
        let instance = match self.as_instance_obj(receiver) {
            Some(obj) => obj,
            None => return Err(self.runtime_error("Only instances have methods.")),
        };

        // A field holding a callable shadows any method of the same name.
        let hash = self.heap.str_hash(name);
        if let Some(field) = self.heap.as_instance(instance).fields.get(name, hash) {
            let callee_slot = self.stack.len() - arg_count as usize - 1;
            self.stack.set(callee_slot, field);
            return self.call_value(field, arg_count);
        }

        let class = self.heap.as_instance(instance).class;
        self.invoke_from_class(class, name, arg_count)
    }

    fn invoke_from_class(&mut self, class: Obj, name: Obj, arg_count: u8) -> Result<()> {
        let hash = self.heap.str_hash(name);
        match self.heap.as_class(class).methods.get(name, hash) {
            Some(method) => {
                let method = method.as_obj().expect("methods are closures");
                self.call_closure(method, arg_count)
            }
            None => Err(self.undefined_property(name)),
        }
    }

    /// Wrap a method in a bound method over the receiver at stack top.
    fn bind_method(&mut self, class: Obj, name: Obj) -> Result<()> {
        let hash = self.heap.str_hash(name);
        let method = match self.heap.as_class(class).methods.get(name, hash) {
            Some(method) => method.as_obj().expect("methods are closures"),
            None => return Err(self.undefined_property(name)),
        };

        let receiver = self.stack.peek(0);
        let bound = self.alloc(ObjKind::BoundMethod(ObjBoundMethod { receiver, method }));
        self.stack.pop();
        self.stack.push(Value::Obj(bound));
        Ok(())
    }

    // =========================================================================
    // Upvalues
    // =========================================================================

    /// Find or create the open upvalue for a stack slot. The open list is
    /// ordered by descending slot with at most one entry per slot.
    fn capture_upvalue(&mut self, slot: usize) -> Obj {
        let mut index = 0;
        while index < self.open_upvalues.len() && self.upvalue_slot(self.open_upvalues[index]) > slot
        {
            index += 1;
        }

        if index < self.open_upvalues.len()
            && self.upvalue_slot(self.open_upvalues[index]) == slot
        {
            return self.open_upvalues[index];
        }

        let upvalue = self.alloc(ObjKind::Upvalue(ObjUpvalue::Open(slot)));
        self.open_upvalues.insert(index, upvalue);
        upvalue
    }

    /// Close every open upvalue at or above `from_slot`: copy the stack
    /// value into the upvalue and drop it from the open list.
    fn close_upvalues(&mut self, from_slot: usize) {
        while let Some(&upvalue) = self.open_upvalues.first() {
            let slot = self.upvalue_slot(upvalue);
            if slot < from_slot {
                break;
            }
            let value = self.stack.get(slot);
            *self.heap.as_upvalue_mut(upvalue) = ObjUpvalue::Closed(value);
            self.open_upvalues.remove(0);
        }
    }

    fn upvalue_slot(&self, upvalue: Obj) -> usize {
        match *self.heap.as_upvalue(upvalue) {
            ObjUpvalue::Open(slot) => slot,
            ObjUpvalue::Closed(_) => panic!("closed upvalue on the open list"),
        }
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn binary_op(&mut self, op: fn(f64, f64) -> Value) -> Result<()> {
        let (Value::Number(b), Value::Number(a)) = (self.stack.peek(0), self.stack.peek(1)) else {
            return Err(self.runtime_error("Operands must be numbers."));
        };
        self.stack.pop();
        self.stack.pop();
        self.stack.push(op(a, b));
        Ok(())
    }

    /// `+` on two numbers adds; on two strings it concatenates and interns.
    /// The operands stay on the stack until the new string exists, so a
    /// collection triggered by the allocation cannot free them.
    fn add(&mut self) -> Result<()> {
        match (self.stack.peek(1), self.stack.peek(0)) {
            (Value::Number(a), Value::Number(b)) => {
                self.stack.pop();
                self.stack.pop();
                self.stack.push(Value::Number(a + b));
                Ok(())
            }
            (Value::Obj(a), Value::Obj(b)) if self.both_strings(a, b) => {
                let a_str = &self.heap.as_string(a).chars;
                let b_str = &self.heap.as_string(b).chars;
                let mut chars = String::with_capacity(a_str.len() + b_str.len());
                chars.push_str(a_str);
                chars.push_str(b_str);

                let result = self.take_string(chars);
                self.stack.pop();
                self.stack.pop();
                self.stack.push(Value::Obj(result));
                Ok(())
            }
            _ => Err(self.runtime_error("Operands must be two numbers or two strings.")),
        }
    }

    fn both_strings(&self, a: Obj, b: Obj) -> bool {
        matches!(self.heap.kind(a), ObjKind::String(_))
            && matches!(self.heap.kind(b), ObjKind::String(_))
    }

    // =========================================================================
    // Errors
    // =========================================================================

    /// Build a runtime error with the current call trace, youngest frame
    /// first.
    fn runtime_error(&self, message: impl Into<String>) -> RuntimeError {
        let mut trace = Vec::new();
        for frame in self.frames.iter().rev() {
            let closure = self.heap.as_closure(frame.closure);
            let function = self.heap.as_function(closure.function);
            trace.push(TraceLine {
                line: function.chunk.line_at(frame.ip.saturating_sub(1)),
                function: function
                    .name
                    .map(|name| self.heap.as_string(name).chars.clone()),
            });
        }
        RuntimeError {
            message: message.into(),
            trace,
        }
    }

    fn undefined_variable(&self, name: Obj) -> RuntimeError {
        self.runtime_error(format!(
            "Undefined variable '{}'.",
            self.heap.as_string(name).chars
        ))
    }

    fn undefined_property(&self, name: Obj) -> RuntimeError {
        self.runtime_error(format!(
            "Undefined property '{}'.",
            self.heap.as_string(name).chars
        ))
    }

    fn reset_stack(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();
    }

    // =========================================================================
    // Allocation & collection
    // =========================================================================

    fn alloc(&mut self, kind: ObjKind) -> Obj {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.heap.alloc(kind)
    }

    fn intern(&mut self, chars: &str) -> Obj {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.heap.intern(chars)
    }

    fn take_string(&mut self, chars: String) -> Obj {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.heap.take_string(chars)
    }

    /// Mark the VM's roots — stack, frames, open upvalues, and globals —
    /// then trace and sweep.
    fn collect_garbage(&mut self) {
        if self.options.log_gc {
            eprintln!("-- gc begin");
        }

        for &value in self.stack.as_slice() {
            self.heap.mark_value(value);
        }
        for frame in &self.frames {
            self.heap.mark_obj(frame.closure);
        }
        for &upvalue in &self.open_upvalues {
            self.heap.mark_obj(upvalue);
        }
        self.heap.mark_table(&self.globals);

        self.heap.trace();
        self.heap.sweep();
    }

    // =========================================================================
    // Tracing
    // =========================================================================

    fn trace_instruction(&self) {
        let mut line = String::from("          ");
        for &value in self.stack.as_slice() {
            line.push_str(&format!("[ {} ]", format_value(value, &self.heap)));
        }
        eprintln!("{}", line);

        let frame = self.frame();
        let closure = self.heap.as_closure(frame.closure);
        let chunk = &self.heap.as_function(closure.function).chunk;
        let (text, _) = disassemble_instruction(&self.heap, chunk, frame.ip);
        eprintln!("{}", text);
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
