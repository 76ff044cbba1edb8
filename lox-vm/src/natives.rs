// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Built-in native functions.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::value::Value;
use crate::vm::Vm;

/// `clock()`: seconds since the Unix epoch, as a Lox number.
pub fn clock(_args: &[Value]) -> Value {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Value::Number(elapsed)
}

/// Install the standard natives into a VM.
pub(crate) fn install(vm: &mut Vm) {
    vm.define_native("clock", 0, clock);
}
