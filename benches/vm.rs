//! Benchmarks for the bytecode pipeline: generation and VM execution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use verve::{compile_source, run_bytecode, VmConfig};

fn fib_source(n: u32) -> String {
    format!(
        r#"
fn fib(n: Int) -> Int {{
    if (n <= 1) {{ n }} else {{ fib(n - 1) + fib(n - 2) }}
}}
fib({})
"#,
        n
    )
}

const LIST_PIPELINE: &str = r#"
let xs = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]
let evens = filter(xs, fn (x: Int) -> Bool { x % 2 == 0 })
fold(map(evens, fn (x: Int) -> Int { x * x }), 0, fn (acc: Int, x: Int) -> Int { acc + x })
"#;

const CLOSURES: &str = r#"
fn make_adder(n: Int) -> (Int) -> Int { fn (x: Int) -> Int { x + n } }
fn apply(f: (Int) -> Int, times: Int, acc: Int) -> Int {
    if (times == 0) { acc } else { apply(f, times - 1, f(acc)) }
}
apply(make_adder(3), 500, 0)
"#;

fn fib_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("fib_recursive");

    for n in [10, 15, 20] {
        let bytes = compile_source(&fib_source(n)).expect("compile error");
        group.bench_with_input(BenchmarkId::new("vm", n), &bytes, |b, bytes| {
            b.iter(|| run_bytecode(black_box(bytes.clone()), VmConfig::default()).unwrap())
        });
    }

    group.finish();
}

fn builtins_and_closures(c: &mut Criterion) {
    let mut group = c.benchmark_group("execution");

    let pipeline = compile_source(LIST_PIPELINE).expect("compile error");
    group.bench_function("list_pipeline", |b| {
        b.iter(|| run_bytecode(black_box(pipeline.clone()), VmConfig::default()).unwrap())
    });

    let closures = compile_source(CLOSURES).expect("compile error");
    group.bench_function("closures", |b| {
        b.iter(|| run_bytecode(black_box(closures.clone()), VmConfig::default()).unwrap())
    });

    group.finish();
}

/// Benchmark generation time alone (not execution).
fn generation_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation_overhead");

    let source = fib_source(20);
    group.bench_function("compile_fib", |b| {
        b.iter(|| compile_source(black_box(&source)).unwrap())
    });
    group.bench_function("compile_closures", |b| {
        b.iter(|| compile_source(black_box(CLOSURES)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, fib_scaling, builtins_and_closures, generation_overhead);

criterion_main!(benches);
