// lox-vm - Closure and upvalue tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use lox_vm::Vm;

fn run(source: &str) -> String {
    let mut vm = Vm::new();
    let mut out = Vec::new();
    match vm.interpret(source, &mut out) {
        Ok(()) => String::from_utf8(out).expect("program output is UTF-8"),
        Err(e) => panic!("unexpected interpreter error: {}", e),
    }
}

#[test]
fn counter_keeps_state_between_calls() {
    let source = "\
fun makeCounter() {
    var i = 0;
    fun c() {
        i = i + 1;
        return i;
    }
    return c;
}
var k = makeCounter();
print k();
print k();
print k();
";
    assert_eq!(run(source), "1\n2\n3\n");
}

#[test]
fn independent_counters_do_not_share_state() {
    let source = "\
fun makeCounter() {
    var i = 0;
    fun c() {
        i = i + 1;
        return i;
    }
    return c;
}
var a = makeCounter();
var b = makeCounter();
print a();
print a();
print b();
";
    assert_eq!(run(source), "1\n2\n1\n");
}

#[test]
fn closures_capture_by_reference() {
    let source = "\
var globalSet;
var globalGet;

fun main() {
    var a = \"initial\";

    fun set() { a = \"updated\"; }
    fun get() { print a; }

    globalSet = set;
    globalGet = get;
}

main();
globalSet();
globalGet();
";
    assert_eq!(run(source), "updated\n");
}

#[test]
fn upvalue_reads_latest_value_before_scope_exit() {
    let source = "\
var f;
{
    var x = 1;
    fun show() { print x; }
    f = show;
    x = 2;
    f();
}
f();
";
    assert_eq!(run(source), "2\n2\n");
}

#[test]
fn closed_upvalue_survives_scope_exit() {
    let source = "\
fun outer() {
    var x = \"outside\";
    fun inner() {
        print x;
    }
    return inner;
}
outer()();
";
    assert_eq!(run(source), "outside\n");
}

#[test]
fn transitive_capture_through_middle_function() {
    let source = "\
fun outer() {
    var x = \"x\";
    fun middle() {
        fun inner() {
            print x;
        }
        return inner;
    }
    return middle;
}
outer()()();
";
    assert_eq!(run(source), "x\n");
}

#[test]
fn two_closures_share_one_upvalue() {
    let source = "\
fun make() {
    var shared = 0;
    fun bump() { shared = shared + 1; }
    fun read() { return shared; }
    bump();
    bump();
    print read();
}
make();
";
    assert_eq!(run(source), "2\n");
}

#[test]
fn block_locals_close_at_block_exit() {
    let source = "\
var fns = nil;
fun remember(f) { fns = f; }
{
    var a = \"a\";
    fun get() { return a; }
    remember(get);
}
print fns();
";
    assert_eq!(run(source), "a\n");
}

#[test]
fn loop_iterations_capture_distinct_variables() {
    let source = "\
var first;
var second;
for (var i = 0; i < 2; i = i + 1) {
    var captured = i;
    fun get() { return captured; }
    if (i == 0) first = get;
    if (i == 1) second = get;
}
print first();
print second();
";
    assert_eq!(run(source), "0\n1\n");
}
