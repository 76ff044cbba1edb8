// lox - A Lox bytecode interpreter written in Rust
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;

use lox_vm::{Vm, VmError, VmOptions};

// Exit codes follow the BSD sysexits convention: EX_DATAERR for compile
// errors, EX_SOFTWARE for runtime errors, EX_IOERR for unreadable input.
const EXIT_USAGE: i32 = 64;
const EXIT_COMPILE_ERROR: i32 = 65;
const EXIT_RUNTIME_ERROR: i32 = 70;
const EXIT_IO_ERROR: i32 = 74;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() == 2 && (args[1] == "--version" || args[1] == "-v") {
        println!("Lox v{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let options = VmOptions {
        trace_execution: env::var_os("LOX_TRACE").is_some(),
        stress_gc: env::var_os("LOX_STRESS_GC").is_some(),
        log_gc: env::var_os("LOX_LOG_GC").is_some(),
    };
    let mut vm = Vm::with_options(options);

    match args.len() {
        1 => run_repl(&mut vm),
        2 => run_file(&mut vm, &args[1]),
        _ => {
            eprintln!("Usage: lox [path]");
            process::exit(EXIT_USAGE);
        }
    }
}

/// Run a script file, mapping interpreter failures to exit codes.
fn run_file(vm: &mut Vm, path: &str) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading '{}': {}", path, e);
            process::exit(EXIT_IO_ERROR);
        }
    };

    let mut stdout = io::stdout();
    if let Err(e) = vm.interpret(&source, &mut stdout) {
        eprintln!("{}", e);
        let code = match e {
            VmError::Compile(_) => EXIT_COMPILE_ERROR,
            VmError::Runtime(_) => EXIT_RUNTIME_ERROR,
        };
        process::exit(code);
    }
}

/// Read lines until EOF, feeding each to the interpreter. Errors are
/// reported and the session continues; globals persist between lines.
fn run_repl(vm: &mut Vm) {
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush().expect("failed to flush prompt");

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(e) = vm.interpret(line, &mut stdout) {
                    eprintln!("{}", e);
                }
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }
}
