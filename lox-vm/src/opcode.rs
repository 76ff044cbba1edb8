// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode instruction definitions.

/// Bytecode instructions for the Lox VM.
///
/// Instructions operate on a value stack and are encoded as a byte stream:
/// a one-byte opcode followed by its operands. Multi-byte operands (jump and
/// loop displacements) are big-endian. `Closure` is variable length: a
/// one-byte constant index followed by two bytes per captured upvalue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants & Stack
    // =========================================================================
    /// Push constant from the constant pool. Operand: pool index.
    Constant = 0,

    /// Push nil.
    Nil,

    /// Push true.
    True,

    /// Push false.
    False,

    /// Pop the top value from the stack.
    Pop,

    // =========================================================================
    // Variables
    // =========================================================================
    /// Load local: push frame slot n. Operand: slot.
    GetLocal,

    /// Store local: frame slot n = peek(0). Leaves the value on the stack.
    SetLocal,

    /// Load global named by constants[n]. Operand: name index.
    GetGlobal,

    /// Define global named by constants[n] with pop().
    DefineGlobal,

    /// Store to an existing global; runtime error if unbound.
    SetGlobal,

    /// Load through the current closure's upvalue n.
    GetUpvalue,

    /// Store through the current closure's upvalue n. Leaves the value.
    SetUpvalue,

    /// Read a field or bind a method on an instance. Operand: name index.
    GetProperty,

    /// Write a field on an instance. Operand: name index.
    SetProperty,

    /// Bind a superclass method with `this` as receiver. Operand: name index.
    GetSuper,

    // =========================================================================
    // Operators
    // =========================================================================
    /// Push pop() == pop(), by Lox value equality.
    Equal,

    /// Push a > b where b = pop(), a = pop(). Numbers only.
    Greater,

    /// Push a < b where b = pop(), a = pop(). Numbers only.
    Less,

    /// Numeric addition or string concatenation.
    Add,

    /// Push a - b. Numbers only.
    Subtract,

    /// Push a * b. Numbers only.
    Multiply,

    /// Push a / b. Numbers only.
    Divide,

    /// Logical not: push is_falsey(pop()).
    Not,

    /// Arithmetic negation. Number only.
    Negate,

    // =========================================================================
    // Statements & Control Flow
    // =========================================================================
    /// Pop and print with a trailing newline.
    Print,

    /// Unconditional forward jump. Operand: big-endian u16 displacement.
    Jump,

    /// Forward jump if peek(0) is falsey. Does not pop.
    JumpIfFalse,

    /// Backward jump. Operand: big-endian u16 displacement.
    Loop,

    // =========================================================================
    // Functions & Closures
    // =========================================================================
    /// Call the value at stack depth n. Operand: argument count.
    Call,

    /// Optimised property access + call. Operands: name index, argument count.
    Invoke,

    /// Optimised superclass method call. Operands: name index, argument count.
    SuperInvoke,

    /// Materialise a closure over constants[n], then read
    /// `upvalue_count` pairs of `{is_local, index}` capture bytes.
    Closure,

    /// Hoist the stack-top local into its upvalue, then pop it.
    CloseUpvalue,

    /// Pop the result and unwind one call frame.
    Return,

    // =========================================================================
    // Classes
    // =========================================================================
    /// Push a new class named by constants[n]. Operand: name index.
    Class,

    /// Copy methods from the superclass (peek 1) into the subclass (peek 0),
    /// then pop the subclass, leaving the superclass bound as a local.
    Inherit,

    /// Bind the stack-top closure as a method on the class below it.
    Method,
}

impl OpCode {
    /// Number of operand bytes that follow the opcode.
    ///
    /// `Closure` reports only its fixed part (the constant index); the two
    /// capture bytes per upvalue depend on the function being closed over,
    /// so decoders handle them by consulting the constant.
    pub fn operand_len(self) -> usize {
        match self {
            OpCode::Nil
            | OpCode::True
            | OpCode::False
            | OpCode::Pop
            | OpCode::Equal
            | OpCode::Greater
            | OpCode::Less
            | OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Not
            | OpCode::Negate
            | OpCode::Print
            | OpCode::CloseUpvalue
            | OpCode::Return
            | OpCode::Inherit => 0,

            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetGlobal
            | OpCode::DefineGlobal
            | OpCode::SetGlobal
            | OpCode::GetUpvalue
            | OpCode::SetUpvalue
            | OpCode::GetProperty
            | OpCode::SetProperty
            | OpCode::GetSuper
            | OpCode::Call
            | OpCode::Closure
            | OpCode::Class
            | OpCode::Method => 1,

            OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::Loop
            | OpCode::Invoke
            | OpCode::SuperInvoke => 2,
        }
    }
}

/// Error for bytes that do not encode an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownOpCode(pub u8);

impl std::fmt::Display for UnknownOpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown opcode {}", self.0)
    }
}

impl std::error::Error for UnknownOpCode {}

impl TryFrom<u8> for OpCode {
    type Error = UnknownOpCode;

    fn try_from(byte: u8) -> Result<Self, UnknownOpCode> {
        Ok(match byte {
            0 => OpCode::Constant,
            1 => OpCode::Nil,
            2 => OpCode::True,
            3 => OpCode::False,
            4 => OpCode::Pop,
            5 => OpCode::GetLocal,
            6 => OpCode::SetLocal,
            7 => OpCode::GetGlobal,
            8 => OpCode::DefineGlobal,
            9 => OpCode::SetGlobal,
            10 => OpCode::GetUpvalue,
            11 => OpCode::SetUpvalue,
            12 => OpCode::GetProperty,
            13 => OpCode::SetProperty,
            14 => OpCode::GetSuper,
            15 => OpCode::Equal,
            16 => OpCode::Greater,
            17 => OpCode::Less,
            18 => OpCode::Add,
            19 => OpCode::Subtract,
            20 => OpCode::Multiply,
            21 => OpCode::Divide,
            22 => OpCode::Not,
            23 => OpCode::Negate,
            24 => OpCode::Print,
            25 => OpCode::Jump,
            26 => OpCode::JumpIfFalse,
            27 => OpCode::Loop,
            28 => OpCode::Call,
            29 => OpCode::Invoke,
            30 => OpCode::SuperInvoke,
            31 => OpCode::Closure,
            32 => OpCode::CloseUpvalue,
            33 => OpCode::Return,
            34 => OpCode::Class,
            35 => OpCode::Inherit,
            36 => OpCode::Method,
            _ => return Err(UnknownOpCode(byte)),
        })
    }
}
