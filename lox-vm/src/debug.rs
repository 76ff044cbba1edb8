// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Chunk disassembler.
//!
//! Instruction boundaries are fully determined by each opcode's operand
//! width (plus, for `Closure`, the upvalue count of the function constant),
//! so walking a chunk with [`disassemble_instruction`] visits exactly the
//! offsets the compiler emitted.

use std::fmt::Write;

use crate::chunk::Chunk;
use crate::heap::Heap;
use crate::opcode::OpCode;
use crate::value::format_value;

/// Disassemble a whole chunk under a header.
pub fn disassemble_chunk(heap: &Heap, chunk: &Chunk, name: &str) -> String {
    let mut out = format!("== {} ==\n", name);
    let mut offset = 0;
    while offset < chunk.code.len() {
        let (text, next) = disassemble_instruction(heap, chunk, offset);
        out.push_str(&text);
        out.push('\n');
        offset = next;
    }
    out
}

/// Disassemble the instruction at `offset`; returns its rendering and the
/// offset of the next instruction.
pub fn disassemble_instruction(heap: &Heap, chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut text = format!("{:04} ", offset);
    if offset > 0 && chunk.line_at(offset) == chunk.line_at(offset - 1) {
        text.push_str("   | ");
    } else {
        let _ = write!(text, "{:4} ", chunk.line_at(offset));
    }

    let op = match OpCode::try_from(chunk.code[offset]) {
        Ok(op) => op,
        Err(unknown) => {
            let _ = write!(text, "Unknown opcode {}", unknown.0);
            return (text, offset + 1);
        }
    };

    match op {
        OpCode::Constant
        | OpCode::GetGlobal
        | OpCode::DefineGlobal
        | OpCode::SetGlobal
        | OpCode::GetProperty
        | OpCode::SetProperty
        | OpCode::GetSuper
        | OpCode::Class
        | OpCode::Method => {
            let idx = chunk.code[offset + 1];
            let _ = write!(
                text,
                "{:<16} {:4} '{}'",
                name_of(op),
                idx,
                format_value(chunk.constants[idx as usize], heap)
            );
            (text, offset + 2)
        }

        OpCode::GetLocal | OpCode::SetLocal | OpCode::GetUpvalue | OpCode::SetUpvalue
        | OpCode::Call => {
            let operand = chunk.code[offset + 1];
            let _ = write!(text, "{:<16} {:4}", name_of(op), operand);
            (text, offset + 2)
        }

        OpCode::Jump | OpCode::JumpIfFalse => {
            let jump = u16::from_be_bytes([chunk.code[offset + 1], chunk.code[offset + 2]]);
            let _ = write!(
                text,
                "{:<16} {:4} -> {}",
                name_of(op),
                offset,
                offset + 3 + jump as usize
            );
            (text, offset + 3)
        }

        OpCode::Loop => {
            let jump = u16::from_be_bytes([chunk.code[offset + 1], chunk.code[offset + 2]]);
            let _ = write!(
                text,
                "{:<16} {:4} -> {}",
                name_of(op),
                offset,
                offset + 3 - jump as usize
            );
            (text, offset + 3)
        }

        OpCode::Invoke | OpCode::SuperInvoke => {
            let idx = chunk.code[offset + 1];
            let argc = chunk.code[offset + 2];
            let _ = write!(
                text,
                "{:<16} ({} args) {:4} '{}'",
                name_of(op),
                argc,
                idx,
                format_value(chunk.constants[idx as usize], heap)
            );
            (text, offset + 3)
        }

        OpCode::Closure => {
            let idx = chunk.code[offset + 1];
            let function = chunk.constants[idx as usize];
            let _ = write!(
                text,
                "{:<16} {:4} {}",
                name_of(op),
                idx,
                format_value(function, heap)
            );

            let upvalue_count = match function {
                crate::value::Value::Obj(obj) => heap.as_function(obj).upvalue_count,
                _ => 0,
            };
            let mut next = offset + 2;
            for _ in 0..upvalue_count {
                let is_local = chunk.code[next];
                let index = chunk.code[next + 1];
                let _ = write!(
                    text,
                    "\n{:04}    |                     {} {}",
                    next,
                    if is_local == 1 { "local" } else { "upvalue" },
                    index
                );
                next += 2;
            }
            (text, next)
        }

        // Zero-operand instructions
        _ => {
            text.push_str(name_of(op));
            (text, offset + 1)
        }
    }
}

fn name_of(op: OpCode) -> &'static str {
    match op {
        OpCode::Constant => "CONSTANT",
        OpCode::Nil => "NIL",
        OpCode::True => "TRUE",
        OpCode::False => "FALSE",
        OpCode::Pop => "POP",
        OpCode::GetLocal => "GET_LOCAL",
        OpCode::SetLocal => "SET_LOCAL",
        OpCode::GetGlobal => "GET_GLOBAL",
        OpCode::DefineGlobal => "DEFINE_GLOBAL",
        OpCode::SetGlobal => "SET_GLOBAL",
        OpCode::GetUpvalue => "GET_UPVALUE",
        OpCode::SetUpvalue => "SET_UPVALUE",
        OpCode::GetProperty => "GET_PROPERTY",
        OpCode::SetProperty => "SET_PROPERTY",
        OpCode::GetSuper => "GET_SUPER",
        OpCode::Equal => "EQUAL",
        OpCode::Greater => "GREATER",
        OpCode::Less => "LESS",
        OpCode::Add => "ADD",
        OpCode::Subtract => "SUBTRACT",
        OpCode::Multiply => "MULTIPLY",
        OpCode::Divide => "DIVIDE",
        OpCode::Not => "NOT",
        OpCode::Negate => "NEGATE",
        OpCode::Print => "PRINT",
        OpCode::Jump => "JUMP",
        OpCode::JumpIfFalse => "JUMP_IF_FALSE",
        OpCode::Loop => "LOOP",
        OpCode::Call => "CALL",
        OpCode::Invoke => "INVOKE",
        OpCode::SuperInvoke => "SUPER_INVOKE",
        OpCode::Closure => "CLOSURE",
        OpCode::CloseUpvalue => "CLOSE_UPVALUE",
        OpCode::Return => "RETURN",
        OpCode::Class => "CLASS",
        OpCode::Inherit => "INHERIT",
        OpCode::Method => "METHOD",
    }
}
