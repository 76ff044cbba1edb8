// lox-vm - Compiler tests: emitted bytecode and diagnostics
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use lox_vm::compiler::{compile, CompileError};
use lox_vm::heap::Heap;
use lox_vm::object::ObjKind;
use lox_vm::opcode::OpCode;
use lox_vm::table::Table;
use lox_vm::value::Value;

fn compile_ok(source: &str) -> (Heap, lox_vm::heap::Obj) {
    let mut heap = Heap::new();
    let globals = Table::new();
    let function = compile(source, &mut heap, &globals).expect("source compiles");
    (heap, function)
}

fn compile_errors(source: &str) -> Vec<CompileError> {
    let mut heap = Heap::new();
    let globals = Table::new();
    compile(source, &mut heap, &globals).expect_err("source must not compile")
}

fn first_message(source: &str) -> String {
    compile_errors(source)[0].message.clone()
}

/// Decode the opcodes of a chunk, skipping operands.
fn opcodes(heap: &Heap, function: lox_vm::heap::Obj) -> Vec<OpCode> {
    let chunk = &heap.as_function(function).chunk;
    let mut ops = Vec::new();
    let mut offset = 0;
    while offset < chunk.code.len() {
        let op = OpCode::try_from(chunk.code[offset]).expect("valid opcode");
        ops.push(op);
        offset += 1 + op.operand_len();
        if op == OpCode::Closure {
            let idx = chunk.code[offset - 1] as usize;
            if let Value::Obj(f) = chunk.constants[idx] {
                offset += 2 * heap.as_function(f).upvalue_count;
            }
        }
    }
    ops
}

// =============================================================================
// Bytecode shapes
// =============================================================================

#[test]
fn expression_statement_bytecode() {
    let (heap, function) = compile_ok("1 + 2 * 3;");
    let chunk = &heap.as_function(function).chunk;
    assert_eq!(
        chunk.code,
        vec![
            OpCode::Constant as u8,
            0,
            OpCode::Constant as u8,
            1,
            OpCode::Constant as u8,
            2,
            OpCode::Multiply as u8,
            OpCode::Add as u8,
            OpCode::Pop as u8,
            OpCode::Nil as u8,
            OpCode::Return as u8,
        ]
    );
    assert_eq!(chunk.constants.len(), 3);
    assert_eq!(chunk.code.len(), chunk.lines.len());
}

#[test]
fn local_variables_use_slots_not_names() {
    let (heap, function) = compile_ok("{ var a = 1; print a; }");
    let chunk = &heap.as_function(function).chunk;
    assert_eq!(
        chunk.code,
        vec![
            OpCode::Constant as u8,
            0,
            OpCode::GetLocal as u8,
            1,
            OpCode::Print as u8,
            OpCode::Pop as u8,
            OpCode::Nil as u8,
            OpCode::Return as u8,
        ]
    );
    // Only the literal lands in the pool; the local's name does not.
    assert_eq!(chunk.constants.len(), 1);
}

#[test]
fn not_equal_lowers_to_equal_then_not() {
    let (heap, function) = compile_ok("1 != 2;");
    let ops = opcodes(&heap, function);
    assert_eq!(
        ops,
        vec![
            OpCode::Constant,
            OpCode::Constant,
            OpCode::Equal,
            OpCode::Not,
            OpCode::Pop,
            OpCode::Nil,
            OpCode::Return,
        ]
    );
}

#[test]
fn comparison_lowering() {
    let (heap, function) = compile_ok("1 >= 2; 1 <= 2;");
    let ops = opcodes(&heap, function);
    assert_eq!(
        ops,
        vec![
            OpCode::Constant,
            OpCode::Constant,
            OpCode::Less,
            OpCode::Not,
            OpCode::Pop,
            OpCode::Constant,
            OpCode::Constant,
            OpCode::Greater,
            OpCode::Not,
            OpCode::Pop,
            OpCode::Nil,
            OpCode::Return,
        ]
    );
}

#[test]
fn if_else_emits_two_jumps_with_pops() {
    let (heap, function) = compile_ok("if (true) print 1; else print 2;");
    let ops = opcodes(&heap, function);
    assert_eq!(
        ops,
        vec![
            OpCode::True,
            OpCode::JumpIfFalse,
            OpCode::Pop,
            OpCode::Constant,
            OpCode::Print,
            OpCode::Jump,
            OpCode::Pop,
            OpCode::Constant,
            OpCode::Print,
            OpCode::Nil,
            OpCode::Return,
        ]
    );
}

#[test]
fn jump_operands_are_big_endian_and_patched() {
    let (heap, function) = compile_ok("if (true) print 1; else print 2;");
    let chunk = &heap.as_function(function).chunk;
    // JUMP_IF_FALSE sits at offset 1; its operand starts at offset 2.
    assert_eq!(chunk.code[1], OpCode::JumpIfFalse as u8);
    let jump = u16::from_be_bytes([chunk.code[2], chunk.code[3]]) as usize;
    // The jump lands on the else-path POP.
    assert_eq!(chunk.code[4 + jump], OpCode::Pop as u8);
}

#[test]
fn while_loop_jumps_backwards() {
    let (heap, function) = compile_ok("while (true) print 1;");
    let ops = opcodes(&heap, function);
    assert_eq!(
        ops,
        vec![
            OpCode::True,
            OpCode::JumpIfFalse,
            OpCode::Pop,
            OpCode::Constant,
            OpCode::Print,
            OpCode::Loop,
            OpCode::Pop,
            OpCode::Nil,
            OpCode::Return,
        ]
    );
    let chunk = &heap.as_function(function).chunk;
    // The LOOP displacement leads back to the condition at offset 0.
    let loop_operand_at = chunk
        .code
        .iter()
        .position(|&b| b == OpCode::Loop as u8)
        .unwrap()
        + 1;
    let offset = u16::from_be_bytes([chunk.code[loop_operand_at], chunk.code[loop_operand_at + 1]]);
    assert_eq!(loop_operand_at + 2 - offset as usize, 0);
}

#[test]
fn function_declaration_emits_closure() {
    let (heap, function) = compile_ok("fun f(a, b) { return a + b; }");
    let ops = opcodes(&heap, function);
    assert_eq!(
        ops,
        vec![
            OpCode::Closure,
            OpCode::DefineGlobal,
            OpCode::Nil,
            OpCode::Return,
        ]
    );

    // The nested function records its arity and name.
    let chunk = &heap.as_function(function).chunk;
    let nested = chunk
        .constants
        .iter()
        .find_map(|&c| match c {
            Value::Obj(obj) => match heap.kind(obj) {
                ObjKind::Function(_) => Some(obj),
                _ => None,
            },
            _ => None,
        })
        .expect("function constant in pool");
    let nested_fn = heap.as_function(nested);
    assert_eq!(nested_fn.arity, 2);
    assert_eq!(nested_fn.upvalue_count, 0);
    let name = nested_fn.name.expect("named function");
    assert_eq!(heap.as_string(name).chars, "f");
}

#[test]
fn closure_capture_operands_record_real_slot_indices() {
    let (heap, function) = compile_ok(
        "fun outer() { var ignored = 0; var x = 1; fun inner() { return x; } }",
    );
    // Find outer in the script's constant pool.
    let script_chunk = &heap.as_function(function).chunk;
    let outer = script_chunk
        .constants
        .iter()
        .find_map(|&c| match c {
            Value::Obj(obj) => match heap.kind(obj) {
                ObjKind::Function(f) if f.upvalue_count == 0 => Some(obj),
                _ => None,
            },
            _ => None,
        })
        .expect("outer function in pool");

    let outer_chunk = &heap.as_function(outer).chunk;
    let closure_at = outer_chunk
        .code
        .iter()
        .position(|&b| b == OpCode::Closure as u8)
        .expect("inner closure emission");
    // Operands: constant index, then {is_local, index} pairs.
    let is_local = outer_chunk.code[closure_at + 2];
    let index = outer_chunk.code[closure_at + 3];
    assert_eq!(is_local, 1);
    // `x` sits at slot 2: slot 0 is reserved, `ignored` takes slot 1. The
    // operand must be the slot, not the is-local flag collapsed into it.
    assert_eq!(index, 2);
}

#[test]
fn initializer_returns_receiver_slot() {
    let (heap, function) = compile_ok("class C { init() {} }");
    let script_chunk = &heap.as_function(function).chunk;
    let init = script_chunk
        .constants
        .iter()
        .find_map(|&c| match c {
            Value::Obj(obj) => match heap.kind(obj) {
                ObjKind::Function(_) => Some(obj),
                _ => None,
            },
            _ => None,
        })
        .expect("init function in pool");
    let chunk = &heap.as_function(init).chunk;
    // Implicit return: GET_LOCAL 0, RETURN.
    assert_eq!(
        chunk.code,
        vec![OpCode::GetLocal as u8, 0, OpCode::Return as u8]
    );
}

// =============================================================================
// Diagnostics
// =============================================================================

#[test]
fn expect_expression() {
    assert_eq!(first_message("print ;"), "Expect expression.");
}

#[test]
fn invalid_assignment_target() {
    assert_eq!(first_message("1 = 2;"), "Invalid assignment target.");
    assert_eq!(first_message("var a; var b; a + b = 1;"), "Invalid assignment target.");
}

#[test]
fn return_outside_function() {
    assert_eq!(first_message("return 1;"), "Can't return from top-level code.");
}

#[test]
fn return_value_from_initializer() {
    assert_eq!(
        first_message("class C { init() { return 1; } }"),
        "Can't return a value from an initializer."
    );
}

#[test]
fn shadowing_in_same_scope() {
    assert_eq!(
        first_message("{ var a = 1; var a = 2; }"),
        "Already a variable with this name in this scope."
    );
}

#[test]
fn reading_local_in_its_own_initializer() {
    assert_eq!(
        first_message("{ var a = 1; { var a = a; } }"),
        "Can't read local variable in its own initializer."
    );
}

#[test]
fn this_outside_class() {
    assert_eq!(first_message("print this;"), "Can't use 'this' outside of a class.");
    assert_eq!(
        first_message("fun f() { return this; }"),
        "Can't use 'this' outside of a class."
    );
}

#[test]
fn super_misuse() {
    assert_eq!(
        first_message("print super.x;"),
        "Can't use 'super' outside of a class."
    );
    assert_eq!(
        first_message("class A { m() { super.m(); } }"),
        "Can't use 'super' in a class with no superclass."
    );
}

#[test]
fn self_inheritance() {
    assert_eq!(first_message("class A < A {}"), "Class cannot inherit from itself.");
}

#[test]
fn unterminated_string_reports_scanner_message() {
    let errors = compile_errors("print \"oops;");
    assert_eq!(errors[0].message, "Unterminated string literal.");
}

#[test]
fn missing_semicolon_at_eof_points_at_end() {
    let errors = compile_errors("print 1");
    assert_eq!(errors[0].message, "Expect ';' after value.");
    assert_eq!(errors[0].to_string(), "[line 1] Error at end: Expect ';' after value.");
}

#[test]
fn error_rendering_includes_lexeme() {
    let errors = compile_errors("var 1 = 2;");
    assert_eq!(
        errors[0].to_string(),
        "[line 1] Error at '1': Expect variable name."
    );
}

#[test]
fn panic_mode_synchronizes_at_statement_boundaries() {
    // Two independent bad statements produce two diagnostics, not a
    // cascade from the first.
    let errors = compile_errors("print ;\nprint ;\n");
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].line, 1);
    assert_eq!(errors[1].line, 2);
}

#[test]
fn cascading_errors_are_suppressed_until_sync() {
    let errors = compile_errors("var = = 1;\n");
    assert_eq!(errors.len(), 1);
}

// =============================================================================
// Limits
// =============================================================================

#[test]
fn too_many_constants_in_one_chunk() {
    let mut source = String::new();
    for i in 0..300 {
        source.push_str(&format!("{};\n", i));
    }
    let messages: Vec<String> = compile_errors(&source)
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert!(messages.contains(&"Too many constants in one chunk.".to_string()));
}

#[test]
fn too_many_locals() {
    let mut source = String::from("{\n");
    for i in 0..256 {
        source.push_str(&format!("var v{} = 0;\n", i));
    }
    source.push_str("}\n");
    let messages: Vec<String> = compile_errors(&source)
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert!(messages.contains(&"Too many local variables in function.".to_string()));
}

#[test]
fn jump_too_far() {
    let mut source = String::from("if (true) {\n");
    for _ in 0..33000 {
        source.push_str("true;\n");
    }
    source.push_str("}\n");
    let messages: Vec<String> = compile_errors(&source)
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert!(messages.contains(&"Too much code to jump over.".to_string()));
}

#[test]
fn loop_body_too_large() {
    let mut source = String::from("while (true) {\n");
    for _ in 0..33000 {
        source.push_str("true;\n");
    }
    source.push_str("}\n");
    let messages: Vec<String> = compile_errors(&source)
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert!(messages.contains(&"Loop body too large.".to_string()));
}

/// A call with `count` arguments; `true` emits no constants, so the
/// argument limit is the only one in play.
fn call_with_args(count: usize) -> String {
    let args = vec!["true"; count].join(", ");
    format!("fun f() {{}}\nf({});\n", args)
}

#[test]
fn too_many_arguments() {
    let messages: Vec<String> = compile_errors(&call_with_args(255))
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert!(messages.contains(&"Can't have more than 254 arguments.".to_string()));
}

#[test]
fn argument_limit_boundary_compiles() {
    // 254 arguments is the cap, not an error. (The arity mismatch against
    // `f` is a runtime concern, not the compiler's.)
    compile_ok(&call_with_args(254));
}

fn function_with_params(count: usize) -> String {
    let params: Vec<String> = (0..count).map(|i| format!("p{}", i)).collect();
    format!("fun f({}) {{}}\n", params.join(", "))
}

#[test]
fn too_many_parameters() {
    let messages: Vec<String> = compile_errors(&function_with_params(255))
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert!(messages.contains(&"Can't have more than 254 parameters.".to_string()));
}

#[test]
fn parameter_limit_boundary_compiles() {
    compile_ok(&function_with_params(254));
}

#[test]
fn too_many_closure_variables() {
    // A doubly nested function referencing 200 locals of each enclosing
    // function needs 400 upvalues, blowing the 256-per-function limit.
    // The captures routed through the middle function stay under it.
    let mut source = String::from("fun outer() {\n");
    for i in 0..200 {
        source.push_str(&format!("var a{} = 0;\n", i));
    }
    source.push_str("fun middle() {\n");
    for i in 0..200 {
        source.push_str(&format!("var b{} = 0;\n", i));
    }
    source.push_str("fun inner() {\n");
    for i in 0..200 {
        source.push_str(&format!("a{}; b{};\n", i, i));
    }
    source.push_str("}\n}\n}\n");

    let messages: Vec<String> = compile_errors(&source)
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert!(messages.contains(&"Too many closure variables in function.".to_string()));
}

#[test]
fn closure_variable_limit_boundary_compiles() {
    // Exactly 256 upvalues — 130 transitive plus 126 direct — is the cap,
    // not an error.
    let mut source = String::from("fun outer() {\n");
    for i in 0..130 {
        source.push_str(&format!("var a{} = 0;\n", i));
    }
    source.push_str("fun middle() {\n");
    for i in 0..126 {
        source.push_str(&format!("var b{} = 0;\n", i));
    }
    source.push_str("fun inner() {\n");
    for i in 0..130 {
        source.push_str(&format!("a{};\n", i));
    }
    for i in 0..126 {
        source.push_str(&format!("b{};\n", i));
    }
    source.push_str("}\n}\n}\n");
    compile_ok(&source);
}
