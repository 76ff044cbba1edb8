// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Per-function compilation state: locals, scopes, and upvalue resolution.

use crate::chunk::Chunk;
use crate::heap::Obj;

/// Locals and upvalues are addressed by one operand byte, so a function can
/// hold at most 256 of each.
const MAX_SLOTS: usize = u8::MAX as usize + 1;

/// What kind of function body is being compiled. Affects the reserved
/// slot-0 name, `return` checking, and the implicit initializer return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Top-level code, compiled into the nameless script function.
    Script,
    Function,
    Method,
    Initializer,
}

/// A local variable in scope during compilation. Its slot index is its
/// position in the compiler's `locals` vector.
#[derive(Debug)]
struct Local<'src> {
    name: &'src str,
    /// Scope depth at declaration; -1 while the initializer is still being
    /// compiled ("declared but uninitialized").
    depth: i32,
    /// Set when some nested function closes over this local, so scope exit
    /// hoists it instead of popping.
    is_captured: bool,
}

/// An upvalue recorded while compiling a function: where the enclosing
/// compiler finds the captured variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerUpvalue {
    /// Slot in the enclosing function's locals (`is_local`) or index into
    /// the enclosing function's own upvalues.
    pub index: u8,
    pub is_local: bool,
}

/// Compilation state for one function. Compilers form a spaghetti stack
/// through `enclosing`, one per function currently being compiled.
#[derive(Debug)]
pub struct FunctionCompiler<'src> {
    pub enclosing: Option<Box<FunctionCompiler<'src>>>,
    pub kind: FunctionKind,

    /// Interned function name; `None` for the script.
    pub name: Option<Obj>,
    pub arity: u8,

    /// The chunk being emitted into.
    pub chunk: Chunk,

    pub upvalues: Vec<CompilerUpvalue>,
    locals: Vec<Local<'src>>,
    scope_depth: i32,
}

impl<'src> FunctionCompiler<'src> {
    pub fn new(kind: FunctionKind, name: Option<Obj>) -> Self {
        // Slot 0 belongs to the callee: it holds the closure itself, or the
        // receiver inside methods and initializers.
        let slot_zero = Local {
            name: match kind {
                FunctionKind::Method | FunctionKind::Initializer => "this",
                _ => "",
            },
            depth: 0,
            is_captured: false,
        };

        FunctionCompiler {
            enclosing: None,
            kind,
            name,
            arity: 0,
            chunk: Chunk::new(),
            upvalues: Vec::new(),
            locals: vec![slot_zero],
            scope_depth: 0,
        }
    }

    pub fn scope_depth(&self) -> i32 {
        self.scope_depth
    }

    pub fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Leave a scope, returning for each departing local (innermost first)
    /// whether it was captured; the parser turns these into `Pop` or
    /// `CloseUpvalue` instructions.
    pub fn end_scope(&mut self) -> Vec<bool> {
        self.scope_depth -= 1;
        let mut captured = Vec::new();
        while self
            .locals
            .last()
            .map_or(false, |local| local.depth > self.scope_depth)
        {
            let local = self.locals.pop().expect("checked above");
            captured.push(local.is_captured);
        }
        captured
    }

    /// Declare a local in the current scope, still uninitialized.
    pub fn add_local(&mut self, name: &'src str) -> Result<(), &'static str> {
        if self.locals.len() == MAX_SLOTS {
            return Err("Too many local variables in function.");
        }
        self.locals.push(Local {
            name,
            depth: -1,
            is_captured: false,
        });
        Ok(())
    }

    /// True if `name` is already declared in the innermost scope; used to
    /// reject shadowing within a single scope.
    pub fn is_declared_in_scope(&self, name: &str) -> bool {
        self.locals
            .iter()
            .rev()
            .take_while(|local| local.depth == -1 || local.depth >= self.scope_depth)
            .any(|local| local.name == name)
    }

    /// Mark the most recent local as initialized at the current depth.
    pub fn mark_initialized(&mut self) {
        if self.scope_depth == 0 {
            return;
        }
        if let Some(local) = self.locals.last_mut() {
            local.depth = self.scope_depth;
        }
    }

    /// Resolve `name` against this function's locals. The slot of a local
    /// is its declaration position.
    pub fn resolve_local(&self, name: &str) -> Result<Option<u8>, &'static str> {
        for (slot, local) in self.locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == -1 {
                    return Err("Can't read local variable in its own initializer.");
                }
                return Ok(Some(slot as u8));
            }
        }
        Ok(None)
    }

    /// Resolve `name` as an upvalue by recursive ascent: a local of the
    /// enclosing function is captured directly; anything further out
    /// becomes an upvalue of the enclosing function first.
    pub fn resolve_upvalue(&mut self, name: &str) -> Result<Option<u8>, &'static str> {
        let Some(enclosing) = self.enclosing.as_deref_mut() else {
            return Ok(None);
        };

        if let Some(slot) = enclosing.resolve_local(name)? {
            enclosing.locals[slot as usize].is_captured = true;
            return self.add_upvalue(slot, true).map(Some);
        }

        if let Some(index) = enclosing.resolve_upvalue(name)? {
            return self.add_upvalue(index, false).map(Some);
        }

        Ok(None)
    }

    /// Record an upvalue, reusing an existing entry for the same capture.
    fn add_upvalue(&mut self, index: u8, is_local: bool) -> Result<u8, &'static str> {
        let upvalue = CompilerUpvalue { index, is_local };
        if let Some(existing) = self.upvalues.iter().position(|&u| u == upvalue) {
            return Ok(existing as u8);
        }
        if self.upvalues.len() == MAX_SLOTS {
            return Err("Too many closure variables in function.");
        }
        self.upvalues.push(upvalue);
        Ok((self.upvalues.len() - 1) as u8)
    }
}

/// Tracks class nesting during compilation, for `this`/`super` checking.
#[derive(Debug)]
pub struct ClassCompiler {
    pub enclosing: Option<Box<ClassCompiler>>,
    pub has_superclass: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_indices_follow_declaration_order() {
        let mut fc = FunctionCompiler::new(FunctionKind::Function, None);
        fc.begin_scope();
        fc.add_local("a").unwrap();
        fc.mark_initialized();
        fc.add_local("b").unwrap();
        fc.mark_initialized();
        assert_eq!(fc.resolve_local("a").unwrap(), Some(1));
        assert_eq!(fc.resolve_local("b").unwrap(), Some(2));
        assert_eq!(fc.resolve_local("c").unwrap(), None);
    }

    #[test]
    fn uninitialized_local_is_unreadable() {
        let mut fc = FunctionCompiler::new(FunctionKind::Function, None);
        fc.begin_scope();
        fc.add_local("a").unwrap();
        assert!(fc.resolve_local("a").is_err());
    }

    #[test]
    fn upvalues_deduplicate() {
        let mut outer = FunctionCompiler::new(FunctionKind::Function, None);
        outer.begin_scope();
        outer.add_local("x").unwrap();
        outer.mark_initialized();

        let mut inner = FunctionCompiler::new(FunctionKind::Function, None);
        inner.enclosing = Some(Box::new(outer));
        assert_eq!(inner.resolve_upvalue("x").unwrap(), Some(0));
        assert_eq!(inner.resolve_upvalue("x").unwrap(), Some(0));
        assert_eq!(inner.upvalues.len(), 1);
        assert!(inner.upvalues[0].is_local);
        // The real slot index is recorded, not a boolean.
        assert_eq!(inner.upvalues[0].index, 1);
    }

    #[test]
    fn transitive_capture_goes_through_the_middle_function() {
        let mut outer = FunctionCompiler::new(FunctionKind::Function, None);
        outer.begin_scope();
        outer.add_local("x").unwrap();
        outer.mark_initialized();

        let mut middle = FunctionCompiler::new(FunctionKind::Function, None);
        middle.enclosing = Some(Box::new(outer));

        let mut inner = FunctionCompiler::new(FunctionKind::Function, None);
        inner.enclosing = Some(Box::new(middle));

        assert_eq!(inner.resolve_upvalue("x").unwrap(), Some(0));
        assert!(!inner.upvalues[0].is_local);
        let middle = inner.enclosing.as_ref().unwrap();
        assert!(middle.upvalues[0].is_local);
    }

    #[test]
    fn scope_exit_reports_captured_locals() {
        let mut fc = FunctionCompiler::new(FunctionKind::Function, None);
        fc.begin_scope();
        fc.add_local("a").unwrap();
        fc.mark_initialized();
        fc.add_local("b").unwrap();
        fc.mark_initialized();

        let mut inner = FunctionCompiler::new(FunctionKind::Function, None);
        inner.enclosing = Some(Box::new(fc));
        inner.resolve_upvalue("b").unwrap();

        let mut fc = *inner.enclosing.unwrap();
        let captured = fc.end_scope();
        // Innermost first: b (captured), then a.
        assert_eq!(captured, vec![true, false]);
    }
}
