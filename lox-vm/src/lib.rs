// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler and stack-based virtual machine for Lox.
//!
//! Source is compiled in a single pass — a Pratt parser that emits bytecode
//! directly, with no AST — and executed by a stack VM with explicit call
//! frames. Reference-typed values live in a heap arena managed by a precise
//! mark-and-sweep collector whose roots are the VM's stack, frames, open
//! upvalues, globals, and any in-progress compilers.

pub mod chunk;
pub mod compiler;
pub mod debug;
pub mod heap;
pub mod natives;
pub mod object;
pub mod opcode;
pub mod table;
pub mod value;
pub mod vm;

pub use chunk::Chunk;
pub use compiler::{compile, CompileError};
pub use heap::{Heap, HeapOptions, Obj};
pub use opcode::OpCode;
pub use value::{format_value, Value};
pub use vm::{RuntimeError, Vm, VmError, VmOptions};
