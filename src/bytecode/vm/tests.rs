use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use super::*;
use crate::bytecode::format::{Writer, FUNCTION_HEADER, HEADER, SECTION_FUNCTIONS, SECTION_STRINGS, SECTION_TEXT};
use crate::compile_source;

/// A `print` sink the test can read back after the VM is done.
#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn load(source: &str, config: VmConfig) -> Vm {
    let bytes = compile_source(source).unwrap();
    Vm::load(bytes, config).unwrap()
}

fn run(source: &str) -> Value {
    load(source, VmConfig::default()).run().unwrap()
}

/// Run and render the result, for heap values.
fn run_display(source: &str) -> String {
    let mut vm = load(source, VmConfig::default());
    let value = vm.run().unwrap();
    vm.display(value)
}

fn run_err(source: &str, config: VmConfig) -> RuntimeError {
    load(source, config).run().unwrap_err()
}

fn run_bytes(bytes: Vec<u8>) -> VMResult<Value> {
    Vm::load(bytes, VmConfig::default()).unwrap().run()
}

fn text_stream(build: impl FnOnce(&mut Writer)) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_word(HEADER);
    w.write_word(SECTION_TEXT);
    w.write_word(0);
    build(&mut w);
    w.into_vec()
}

// ===== Core semantics =====

#[test]
fn test_builtin_call() {
    assert_eq!(run("add(1, 2)"), Value::Int(3));
}

#[test]
fn test_if_else() {
    assert_eq!(run("if (false) { 1 } else { 2 }"), Value::Int(2));
    assert_eq!(run("if (1 < 2) { 1 } else { 2 }"), Value::Int(1));
    assert_eq!(run("if (false) { 1 }"), Value::Unit);
}

#[test]
fn test_last_top_level_expression_is_the_result() {
    assert_eq!(run("1\n2\n3"), Value::Int(3));
    assert_eq!(run(""), Value::Unit);
    assert_eq!(run("let x = 4"), Value::Unit);
}

#[test]
fn test_arithmetic() {
    assert_eq!(run("2 + 3 * 4 - 10 / 5"), Value::Int(12));
    assert_eq!(run("-7 % 3"), Value::Int(-1));
    assert_eq!(run("1.5 + 2.25"), Value::Float(3.75));
    assert_eq!(run("-(2.0 * 3.0)"), Value::Float(-6.0));
    assert_eq!(run("!(3 >= 4)"), Value::Bool(true));
}

#[test]
fn test_short_circuit() {
    assert_eq!(run("false && 1 / 0 == 1"), Value::Bool(false));
    assert_eq!(run("true || 1 / 0 == 1"), Value::Bool(true));
    assert_eq!(run("true && false || true"), Value::Bool(true));
}

#[test]
fn test_structural_equality() {
    assert_eq!(run("[1, 2] == [1, 2]"), Value::Bool(true));
    assert_eq!(run("[1, 2] != [2, 1]"), Value::Bool(true));
    assert_eq!(run(r#"concat("a", "b") == "ab""#), Value::Bool(true));
    assert_eq!(
        run("enum Opt { Some(Int), None }\nSome(1) == Some(1)"),
        Value::Bool(true)
    );
}

#[test]
fn test_recursion() {
    let source = "fn fib(n: Int) -> Int { if (n < 2) { n } else { fib(n - 1) + fib(n - 2) } }\nfib(15)";
    assert_eq!(run(source), Value::Int(610));
}

#[test]
fn test_globals_are_visible_in_functions() {
    assert_eq!(run("let x = 2\nfn f() -> Int { x * 3 }\nf()"), Value::Int(6));
}

// ===== Pattern matching =====

const SHAPES: &str = r#"
    enum Shape { Circle(Int), Square(Int) }
    fn area(s: Shape) -> Int {
        match s {
            Circle(r) => 3 * r * r,
            Square(w) => w * w,
        }
    }
"#;

#[test]
fn test_match_dispatches_on_constructor() {
    assert_eq!(run(&format!("{}\narea(Square(4))", SHAPES)), Value::Int(16));
    assert_eq!(run(&format!("{}\narea(Circle(2))", SHAPES)), Value::Int(12));
}

#[test]
fn test_first_matching_case_wins() {
    let source = "enum Box { Full(Int), Empty }\nmatch Full(7) { Full(x) => x, Full(y) => 0, _ => 1 }";
    assert_eq!(run(source), Value::Int(7));
    let source = "enum Box { Full(Int), Empty }\nmatch Empty { _ => 1, Empty => 2 }";
    assert_eq!(run(source), Value::Int(1));
}

#[test]
fn test_constructor_fields_keep_declaration_order() {
    let source = "enum T { T3(Int, Int, Int) }\nmatch T3(1, 2, 3) { T3(a, b, c) => a * 100 + b * 10 + c }";
    assert_eq!(run(source), Value::Int(123));
}

#[test]
fn test_ignored_fields() {
    let source = "enum T { T2(Int, Int) }\nmatch T2(5, 9) { T2(_, b) => b }";
    assert_eq!(run(source), Value::Int(9));
}

#[test]
fn test_recursive_data() {
    let source = r#"
        enum Tree { Leaf, Node(Tree, Int, Tree) }
        fn sum(t: Tree) -> Int {
            match t { Leaf => 0, Node(l, v, r) => sum(l) + v + sum(r) }
        }
        sum(Node(Node(Leaf, 1, Leaf), 2, Node(Leaf, 3, Leaf)))
    "#;
    assert_eq!(run(source), Value::Int(6));
}

#[test]
fn test_unmatched_value_faults() {
    let err = run_err(
        "enum Bit { Zero, One }\nmatch One { Zero => 1 }",
        VmConfig::default(),
    );
    assert!(matches!(err, RuntimeError::MatchFailed { .. }));
}

#[test]
fn test_destructuring_let() {
    let source = r#"
        enum Couple { Pair(Int, Int) }
        fn swap_diff(p: Couple) -> Int { let Pair(a, b) = p; b - a }
        let Pair(x, _) = Pair(40, 0)
        swap_diff(Pair(3, 10)) + x
    "#;
    assert_eq!(run(source), Value::Int(47));
}

#[test]
fn test_destructuring_let_captured_field() {
    let source = r#"
        enum Couple { Pair(Int, Int) }
        fn f(p: Couple) -> Int { let Pair(a, b) = p; let g = fn () -> Int { a * b }; g() }
        f(Pair(6, 7))
    "#;
    assert_eq!(run(source), Value::Int(42));
}

#[test]
fn test_destructuring_let_wrong_constructor_faults() {
    let err = run_err(
        "enum Bit { Zero, One(Int) }
let One(n) = Zero
n",
        VmConfig::default(),
    );
    assert!(matches!(err, RuntimeError::MatchFailed { .. }));
}

// ===== Closures =====

const MAKE_ADDER: &str = "fn make_adder(n: Int) -> (Int) -> Int { fn (x: Int) -> Int { x + n } }";

#[test]
fn test_closure_outlives_defining_frame() {
    assert_eq!(run(&format!("{}\nmake_adder(10)(5)", MAKE_ADDER)), Value::Int(15));
}

#[test]
fn test_closures_keep_separate_scopes() {
    let source = format!(
        "{}\nlet add10 = make_adder(10)\nlet add1 = make_adder(1)\nadd10(1) * 100 + add1(1)",
        MAKE_ADDER
    );
    assert_eq!(run(&source), Value::Int(1102));
}

#[test]
fn test_captured_block_local() {
    let source = "fn f(a: Int) -> Int { let b = a + 1\n let g = fn () -> Int { b * 2 }\n g() }\nf(4)";
    assert_eq!(run(source), Value::Int(10));
}

#[test]
fn test_same_named_captured_locals_stay_apart() {
    let source = r#"
        fn f() -> Int {
            let a = { let x = 1; fn () -> Int { x } };
            let b = { let x = 2; fn () -> Int { x } };
            a()
        }
        f()
    "#;
    assert_eq!(run(source), Value::Int(1));
}

#[test]
fn test_captured_top_level_block_local_leaves_global_alone() {
    let source = r#"
        let x = 1;
        fn get() -> Int { x };
        let h = { let x = 2; fn () -> Int { x } };
        get()
    "#;
    assert_eq!(run(source), Value::Int(1));
}

#[test]
fn test_transitive_capture() {
    let source = "fn f(n: Int) -> () -> () -> Int { fn () -> () -> Int { fn () -> Int { n } } }\nf(9)()()";
    assert_eq!(run(source), Value::Int(9));
}

#[test]
fn test_functions_as_values() {
    let source = "fn twice(f: (Int) -> Int, x: Int) -> Int { f(f(x)) }\ntwice(fn (x: Int) -> Int { x * 3 }, 2)";
    assert_eq!(run(source), Value::Int(18));
}

// ===== Interfaces and generics =====

#[test]
fn test_interface_dispatch() {
    let source = r#"
        interface Show<T> { fn show(x: T) -> String }
        implementation Show<Int> { fn show(x: Int) -> String { int_to_string(x) } }
        implementation Show<Bool> { fn show(x: Bool) -> String { if (x) { "yes" } else { "no" } } }
        concat(show(7), show(true))
    "#;
    assert_eq!(run_display(source), "7yes");
}

#[test]
fn test_generic_instances() {
    assert_eq!(
        run("fn id<T>(x: T) -> T { x }\nif (id(true)) { id(5) } else { 0 }"),
        Value::Int(5)
    );
}

// ===== Builtins =====

#[test]
fn test_print_writes_lines() {
    let buffer = SharedBuffer::default();
    let mut vm = load(
        r#"print("hi")
print(concat("a", int_to_string(1)))"#,
        VmConfig::default(),
    );
    vm.set_output(buffer.clone());
    assert_eq!(vm.run().unwrap(), Value::Unit);
    assert_eq!(buffer.contents(), "hi\na1\n");
}

#[test]
fn test_list_builtins() {
    let source = r#"
        let xs = [1, 2, 3, 4, 5, 6]
        let evens = filter(xs, fn (x: Int) -> Bool { x % 2 == 0 })
        let squares = map(evens, fn (x: Int) -> Int { x * x })
        fold(squares, 0, fn (acc: Int, x: Int) -> Int { acc + x })
    "#;
    assert_eq!(run(source), Value::Int(56));
    assert_eq!(run("head(tail([4, 5, 6]))"), Value::Int(5));
    assert_eq!(run("length([4, 5, 6])"), Value::Int(3));
    assert_eq!(run("at([4, 5, 6], 2)"), Value::Int(6));
    assert_eq!(run_display("map([1, 2], fn (x: Int) -> Int { x + 1 })"), "[2, 3]");
}

#[test]
fn test_string_builtins() {
    assert_eq!(run_display(r#"substr("hello", 1, 3)"#), "ell");
    assert_eq!(run_display(r#"substr("hello", 3, 10)"#), "lo");
    assert_eq!(run(r#"count("héllo")"#), Value::Int(5));
    assert_eq!(run_display("float_to_string(2.5)"), "2.5");
}

#[test]
fn test_builtin_index_errors() {
    assert!(matches!(
        run_err("at([1], 3)", VmConfig::default()),
        RuntimeError::IndexOutOfBounds { index: 3, length: 1, .. }
    ));
}

#[test]
fn test_heap_size_counts_strings() {
    // The only string in the table is "heap_size" itself.
    assert_eq!(run("heap_size()"), Value::Int(1));
}

// ===== Faults =====

#[test]
fn test_division_by_zero() {
    assert!(matches!(
        run_err("1 / 0", VmConfig::default()),
        RuntimeError::DivisionByZero { .. }
    ));
    assert!(matches!(
        run_err("mod(1, 0)", VmConfig::default()),
        RuntimeError::DivisionByZero { .. }
    ));
}

#[test]
fn test_frame_limit() {
    let config = VmConfig {
        max_frames: 64,
        ..VmConfig::default()
    };
    let err = run_err("fn spin(n: Int) -> Int { spin(n + 1) }\nspin(0)", config);
    assert!(matches!(err, RuntimeError::FrameOverflow { limit: 64, .. }));
}

#[test]
fn test_heap_limit() {
    let config = VmConfig {
        max_heap_objects: 1,
        ..VmConfig::default()
    };
    let err = run_err("[[1]]", config);
    assert!(matches!(err, RuntimeError::HeapExhausted { limit: 1, .. }));
}

#[test]
fn test_type_mismatch_at_opcode() {
    let bytes = text_stream(|w| {
        w.write_op(OpCode::Push);
        w.write_word(NaNValue::from_bool(true).to_word());
        w.write_op(OpCode::Push);
        w.write_word(NaNValue::from_int(1).unwrap().to_word());
        w.write_op(OpCode::Add);
    });
    match run_bytes(bytes) {
        Err(RuntimeError::TypeMismatch { expected, found, ip }) => {
            assert_eq!((expected, found, ip), ("Int", "Bool", 56));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_jump_outside_stream() {
    let bytes = text_stream(|w| {
        w.write_op(OpCode::Jmp);
        w.write_word(1000);
    });
    assert!(matches!(
        run_bytes(bytes),
        Err(RuntimeError::Format(FormatError::BadJumpTarget { offset: 32, .. }))
    ));
}

#[test]
fn test_unbalanced_slots_on_return() {
    let mut w = Writer::new();
    w.write_word(HEADER);
    w.write_word(SECTION_STRINGS);
    w.write_string("leaky");
    w.write_word(HEADER);
    w.write_word(SECTION_FUNCTIONS);
    w.write_word(FUNCTION_HEADER);
    w.write_word(0);
    w.write_word(0);
    w.write_op(OpCode::StackAlloc);
    w.write_word(1);
    w.write_op(OpCode::Push);
    w.write_word(NaNValue::unit().to_word());
    w.write_op(OpCode::Ret);
    w.write_word(HEADER);
    w.write_word(SECTION_TEXT);
    w.write_word(0);
    w.write_op(OpCode::CreateClosure);
    w.write_word(0);
    w.write_word(0);
    w.write_op(OpCode::Call);
    w.write_word(0);

    assert!(matches!(
        run_bytes(w.into_vec()),
        Err(RuntimeError::UnbalancedSlots { leaked: 1, .. })
    ));
}

#[test]
fn test_undefined_name() {
    let mut w = Writer::new();
    w.write_word(HEADER);
    w.write_word(SECTION_STRINGS);
    w.write_string("nowhere");
    w.write_word(HEADER);
    w.write_word(SECTION_TEXT);
    w.write_word(1);
    w.write_op(OpCode::Lookup);
    w.write_word(0);
    w.write_word(0);

    match run_bytes(w.into_vec()) {
        Err(RuntimeError::UndefinedName { name, .. }) => assert_eq!(name, "nowhere"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_calling_a_non_function() {
    let bytes = text_stream(|w| {
        w.write_op(OpCode::Push);
        w.write_word(NaNValue::from_int(3).unwrap().to_word());
        w.write_op(OpCode::Call);
        w.write_word(0);
    });
    assert!(matches!(
        run_bytes(bytes),
        Err(RuntimeError::NotCallable { found: "Int", .. })
    ));
}

#[test]
fn test_stream_without_text_runs_to_unit() {
    let mut w = Writer::new();
    w.write_word(HEADER);
    w.write_word(SECTION_STRINGS);
    w.write_string("unused");
    assert_eq!(run_bytes(w.into_vec()).unwrap(), Value::Unit);
}

// ===== Persistence =====

#[test]
fn test_compiled_file_round_trip() {
    let source = format!("{}\narea(Circle(3))", SHAPES);
    let bytes = compile_source(&source).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shapes.vvb");
    std::fs::write(&path, &bytes).unwrap();
    let loaded = std::fs::read(&path).unwrap();

    assert_eq!(loaded, bytes);
    assert_eq!(run_bytes(loaded).unwrap(), Value::Int(27));
}

#[test]
fn test_vm_can_run_twice() {
    let mut vm = load("fn sq(x: Int) -> Int { x * x }\nsq(4)", VmConfig::default());
    assert_eq!(vm.run().unwrap(), Value::Int(16));
    assert_eq!(vm.run().unwrap(), Value::Int(16));
}

#[test]
fn test_second_run_starts_from_loaded_state() {
    let source = r#"
        let xs = [1, 2, 3]
        let label = concat("n", int_to_string(length(xs)))
        let before = heap_size()
        let n = 4
        fn get() -> Int { n }
        before * 10 + get()
    "#;
    let mut vm = load(source, VmConfig::default());
    let first = vm.run().unwrap();
    let heap_after_first = vm.heap().len();
    assert_eq!(vm.run().unwrap(), first);
    assert_eq!(vm.heap().len(), heap_after_first);
    assert_eq!(first.as_int().map(|n| n % 10), Some(4));
}
