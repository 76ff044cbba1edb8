// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The object heap and garbage collector.
//!
//! All heap objects live in one arena; a [`Obj`] handle is an index into it.
//! The arena is the sole owner of every object — values, tables, closures
//! and frames hold non-owning handles — and the sweep phase is the only
//! deleter. Collection is precise, tri-color mark-sweep: callers mark their
//! roots, then [`Heap::trace`] drains the gray worklist and
//! [`Heap::sweep`] frees what was never reached.
//!
//! The string intern set lives here too. It is weak: before sweeping, every
//! intern entry whose key is unmarked is removed so the table cannot
//! resurrect a dead string.

use crate::object::{
    hash_string, ObjClass, ObjClosure, ObjFunction, ObjInstance, ObjKind, ObjString, ObjUpvalue,
};
use crate::table::Table;
use crate::value::Value;

const GC_HEAP_GROW_FACTOR: usize = 2;
const FIRST_GC_THRESHOLD: usize = 1024 * 1024;

/// A handle to a heap object. Identity comparison of handles is Lox object
/// identity; for interned strings that coincides with content equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Obj(u32);

impl Obj {
    pub(crate) fn from_index(index: u32) -> Self {
        Obj(index)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Obj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Diagnostic switches for the collector.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapOptions {
    /// Collect on every allocation instead of waiting for the threshold.
    pub stress_gc: bool,
    /// Trace allocation, marking, and sweeping to stderr.
    pub log_gc: bool,
}

#[derive(Debug)]
struct Slot {
    marked: bool,
    /// Bytes charged to the allocation counter at birth.
    size: usize,
    kind: ObjKind,
}

/// The arena that owns every Lox object.
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Option<Slot>>,
    free: Vec<u32>,

    /// Canonical interned strings; weak (cleaned before each sweep).
    strings: Table,

    /// Marked-but-unscanned objects.
    gray: Vec<Obj>,

    bytes_allocated: usize,
    next_gc: usize,
    options: HeapOptions,
}

impl Heap {
    pub fn new() -> Self {
        Self::with_options(HeapOptions::default())
    }

    pub fn with_options(options: HeapOptions) -> Self {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
            strings: Table::new(),
            gray: Vec::new(),
            bytes_allocated: 0,
            next_gc: FIRST_GC_THRESHOLD,
            options,
        }
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate an object and return its handle.
    ///
    /// This never collects on its own: callers that can enumerate their
    /// roots check [`Heap::should_collect`] first and run a collection
    /// before handing the payload over.
    pub fn alloc(&mut self, kind: ObjKind) -> Obj {
        let size = object_size(&kind);
        self.bytes_allocated += size;

        let slot = Slot {
            marked: false,
            size,
            kind,
        };

        let obj = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(slot);
                Obj(index)
            }
            None => {
                self.slots.push(Some(slot));
                Obj((self.slots.len() - 1) as u32)
            }
        };

        if self.options.log_gc {
            eprintln!(
                "{} allocate {} for {}",
                obj,
                size,
                kind_name(&self.slots[obj.index()].as_ref().unwrap().kind)
            );
        }

        obj
    }

    /// True when the next allocation should be preceded by a collection.
    pub fn should_collect(&self) -> bool {
        self.options.stress_gc || self.bytes_allocated > self.next_gc
    }

    /// Intern a string, returning the canonical object for its content.
    pub fn intern(&mut self, chars: &str) -> Obj {
        let hash = hash_string(chars.as_bytes());

        let slots = &self.slots;
        let existing = self.strings.find_string(hash, |obj| {
            string_in(slots, obj).map(|s| s.chars == chars).unwrap_or(false)
        });
        if let Some(obj) = existing {
            return obj;
        }

        let obj = self.alloc(ObjKind::String(ObjString {
            chars: chars.to_string(),
            hash,
        }));
        self.strings.set(obj, hash, Value::Nil);
        obj
    }

    /// Intern an owned string, e.g. a freshly concatenated buffer. If the
    /// content already exists the buffer is dropped and the canonical
    /// object returned.
    pub fn take_string(&mut self, chars: String) -> Obj {
        let hash = hash_string(chars.as_bytes());

        let slots = &self.slots;
        let existing = self.strings.find_string(hash, |obj| {
            string_in(slots, obj).map(|s| s.chars == chars).unwrap_or(false)
        });
        if let Some(obj) = existing {
            return obj;
        }

        let obj = self.alloc(ObjKind::String(ObjString { chars, hash }));
        self.strings.set(obj, hash, Value::Nil);
        obj
    }

    // =========================================================================
    // Access
    // =========================================================================

    pub fn kind(&self, obj: Obj) -> &ObjKind {
        &self.slot(obj).kind
    }

    pub fn kind_mut(&mut self, obj: Obj) -> &mut ObjKind {
        &mut self.slot_mut(obj).kind
    }

    pub fn as_string(&self, obj: Obj) -> &ObjString {
        match self.kind(obj) {
            ObjKind::String(s) => s,
            other => panic!("expected string, found {}", kind_name(other)),
        }
    }

    pub fn as_function(&self, obj: Obj) -> &ObjFunction {
        match self.kind(obj) {
            ObjKind::Function(f) => f,
            other => panic!("expected function, found {}", kind_name(other)),
        }
    }

    pub fn as_closure(&self, obj: Obj) -> &ObjClosure {
        match self.kind(obj) {
            ObjKind::Closure(c) => c,
            other => panic!("expected closure, found {}", kind_name(other)),
        }
    }

    pub fn as_closure_mut(&mut self, obj: Obj) -> &mut ObjClosure {
        match self.kind_mut(obj) {
            ObjKind::Closure(c) => c,
            other => panic!("expected closure, found {}", kind_name(other)),
        }
    }

    pub fn as_upvalue(&self, obj: Obj) -> &ObjUpvalue {
        match self.kind(obj) {
            ObjKind::Upvalue(u) => u,
            other => panic!("expected upvalue, found {}", kind_name(other)),
        }
    }

    pub fn as_upvalue_mut(&mut self, obj: Obj) -> &mut ObjUpvalue {
        match self.kind_mut(obj) {
            ObjKind::Upvalue(u) => u,
            other => panic!("expected upvalue, found {}", kind_name(other)),
        }
    }

    pub fn as_class(&self, obj: Obj) -> &ObjClass {
        match self.kind(obj) {
            ObjKind::Class(c) => c,
            other => panic!("expected class, found {}", kind_name(other)),
        }
    }

    pub fn as_class_mut(&mut self, obj: Obj) -> &mut ObjClass {
        match self.kind_mut(obj) {
            ObjKind::Class(c) => c,
            other => panic!("expected class, found {}", kind_name(other)),
        }
    }

    pub fn as_instance(&self, obj: Obj) -> &ObjInstance {
        match self.kind(obj) {
            ObjKind::Instance(i) => i,
            other => panic!("expected instance, found {}", kind_name(other)),
        }
    }

    pub fn as_instance_mut(&mut self, obj: Obj) -> &mut ObjInstance {
        match self.kind_mut(obj) {
            ObjKind::Instance(i) => i,
            other => panic!("expected instance, found {}", kind_name(other)),
        }
    }

    /// Hash of an interned string, for table lookups.
    pub fn str_hash(&self, obj: Obj) -> u32 {
        self.as_string(obj).hash
    }

    /// True while the object has not been swept.
    pub fn is_live(&self, obj: Obj) -> bool {
        self.slots
            .get(obj.index())
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    /// Number of live objects, for tests and GC logging.
    pub fn object_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    fn slot(&self, obj: Obj) -> &Slot {
        self.slots[obj.index()].as_ref().expect("use of freed object")
    }

    fn slot_mut(&mut self, obj: Obj) -> &mut Slot {
        self.slots[obj.index()].as_mut().expect("use of freed object")
    }

    // =========================================================================
    // Collection
    // =========================================================================

    /// Mark an object gray: flag it reachable and queue it for scanning.
    pub fn mark_obj(&mut self, obj: Obj) {
        let log = self.options.log_gc;
        let slot = self.slot_mut(obj);
        if slot.marked {
            return;
        }
        slot.marked = true;
        if log {
            eprintln!("{} mark {}", obj, kind_name(&slot.kind));
        }
        self.gray.push(obj);
    }

    pub fn mark_value(&mut self, value: Value) {
        if let Value::Obj(obj) = value {
            self.mark_obj(obj);
        }
    }

    /// Mark every key and value of a table.
    pub fn mark_table(&mut self, table: &Table) {
        for (key, value) in table.iter() {
            self.mark_obj(key);
            self.mark_value(value);
        }
    }

    /// Drain the gray worklist, blackening each object by marking whatever
    /// it references.
    pub fn trace(&mut self) {
        while let Some(obj) = self.gray.pop() {
            if self.options.log_gc {
                eprintln!("{} blacken {}", obj, kind_name(self.kind(obj)));
            }
            let refs = self.outgoing_refs(obj);
            for value in refs {
                self.mark_value(value);
            }
        }
    }

    /// Everything `obj` points at, as values.
    fn outgoing_refs(&self, obj: Obj) -> Vec<Value> {
        let mut refs = Vec::new();
        match self.kind(obj) {
            ObjKind::String(_) => {}
            ObjKind::Native(n) => refs.push(Value::Obj(n.name)),
            ObjKind::Upvalue(u) => {
                if let ObjUpvalue::Closed(value) = u {
                    refs.push(*value);
                }
            }
            ObjKind::Function(f) => {
                if let Some(name) = f.name {
                    refs.push(Value::Obj(name));
                }
                refs.extend_from_slice(&f.chunk.constants);
            }
            ObjKind::Closure(c) => {
                refs.push(Value::Obj(c.function));
                refs.extend(c.upvalues.iter().map(|&u| Value::Obj(u)));
            }
            ObjKind::Class(c) => {
                refs.push(Value::Obj(c.name));
                for (key, value) in c.methods.iter() {
                    refs.push(Value::Obj(key));
                    refs.push(value);
                }
            }
            ObjKind::Instance(i) => {
                refs.push(Value::Obj(i.class));
                for (key, value) in i.fields.iter() {
                    refs.push(Value::Obj(key));
                    refs.push(value);
                }
            }
            ObjKind::BoundMethod(b) => {
                refs.push(b.receiver);
                refs.push(Value::Obj(b.method));
            }
        }
        refs
    }

    /// Free every unmarked object and reset the marks of the survivors.
    ///
    /// The intern set is cleaned first so it never holds a key that this
    /// sweep is about to free.
    pub fn sweep(&mut self) {
        let before = self.bytes_allocated;

        let slots = &self.slots;
        self.strings
            .remove_white(|obj| slots[obj.index()].as_ref().map_or(false, |s| s.marked));

        for (index, slot) in self.slots.iter_mut().enumerate() {
            match slot {
                Some(s) if s.marked => s.marked = false,
                Some(s) => {
                    if self.options.log_gc {
                        eprintln!("#{} free {}", index, kind_name(&s.kind));
                    }
                    self.bytes_allocated = self.bytes_allocated.saturating_sub(s.size);
                    *slot = None;
                    self.free.push(index as u32);
                }
                None => {}
            }
        }

        self.next_gc = self.bytes_allocated * GC_HEAP_GROW_FACTOR;

        if self.options.log_gc {
            eprintln!(
                "-- gc end: collected {} bytes (from {} to {}) next at {}",
                before - self.bytes_allocated,
                before,
                self.bytes_allocated,
                self.next_gc
            );
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

fn string_in<'a>(slots: &'a [Option<Slot>], obj: Obj) -> Option<&'a ObjString> {
    match slots.get(obj.index())?.as_ref()?.kind {
        ObjKind::String(ref s) => Some(s),
        _ => None,
    }
}

fn kind_name(kind: &ObjKind) -> &'static str {
    match kind {
        ObjKind::String(_) => "string",
        ObjKind::Function(_) => "function",
        ObjKind::Native(_) => "native",
        ObjKind::Closure(_) => "closure",
        ObjKind::Upvalue(_) => "upvalue",
        ObjKind::Class(_) => "class",
        ObjKind::Instance(_) => "instance",
        ObjKind::BoundMethod(_) => "bound method",
    }
}

/// Bytes charged for an object at allocation time: the slot itself plus the
/// payload's owned buffers.
fn object_size(kind: &ObjKind) -> usize {
    use std::mem::size_of;
    let payload = match kind {
        ObjKind::String(s) => s.chars.capacity(),
        ObjKind::Function(f) => {
            f.chunk.code.capacity()
                + f.chunk.lines.capacity() * size_of::<u32>()
                + f.chunk.constants.capacity() * size_of::<Value>()
        }
        ObjKind::Closure(c) => c.upvalues.capacity() * size_of::<Obj>(),
        ObjKind::Class(c) => c.methods.size_bytes(),
        ObjKind::Instance(i) => i.fields.size_bytes(),
        ObjKind::Native(_) | ObjKind::Upvalue(_) | ObjKind::BoundMethod(_) => 0,
    };
    size_of::<Slot>() + payload
}
