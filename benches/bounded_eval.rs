// Bounded evaluation benchmarks
//
// Measures the cost of running expansion and interpretation on the trampoline:
//
// 1. Long list literals: expansion + interpretation of `(length (list ...))`
// 2. Bounce limit sweep: the same workload at different direct-nesting limits
// 3. Closure calls: repeated application of a capturing function

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use metatag::backend::{Runtime, RuntimeConfig, Value};
use metatag::{sx, SExpr};

// =============================================================================
// Helpers
// =============================================================================

fn length_of_literal(n: usize) -> SExpr {
    let literal = SExpr::list(std::iter::once(SExpr::atom("list")).chain((0..n).map(|_| SExpr::atom("zero"))));
    SExpr::list([SExpr::atom("length"), literal])
}

fn runtime_with_limit(limit: usize) -> Runtime {
    let config = RuntimeConfig::with_bounce_limit(limit).expect("valid limit");
    Runtime::with_config(config).expect("bootstrap")
}

// =============================================================================
// Benchmark 1: Long list literals
// =============================================================================

fn bench_list_literals(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_literal");
    group.sample_size(30);
    let runtime = Runtime::new().expect("bootstrap");

    for n in [100, 1_000, 10_000].iter() {
        let expr = length_of_literal(*n);
        group.throughput(Throughput::Elements(*n as u64));
        group.bench_with_input(BenchmarkId::new("eval_length", n), n, |b, _| {
            b.iter(|| runtime.eval(black_box(&expr)).expect("no fatal error"));
        });
    }

    group.finish();
}

// =============================================================================
// Benchmark 2: Bounce limit sweep
// =============================================================================

fn bench_bounce_limits(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounce_limit");
    group.sample_size(30);
    let list = Value::list((0..5_000).map(|_| Value::nat(0)));

    for limit in [1, 16, 256].iter() {
        let runtime = runtime_with_limit(*limit);
        group.bench_with_input(BenchmarkId::new("dispatch_length", limit), limit, |b, _| {
            b.iter(|| runtime.dispatch("length", vec![black_box(list.clone())]).expect("no fatal error"));
        });
    }

    group.finish();
}

// =============================================================================
// Benchmark 3: Closure calls
// =============================================================================

fn bench_closure_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("closure_call");
    let runtime = Runtime::new().expect("bootstrap");
    let adder = runtime
        .eval(&sx!((fn x (fn y (plus x y)))))
        .expect("no fatal error");
    let add_three = runtime.call(&adder, vec![Value::nat(3)]).expect("no fatal error");

    group.bench_function("captured_plus", |b| {
        b.iter(|| runtime.call(&add_three, vec![black_box(Value::nat(4))]).expect("no fatal error"));
    });

    group.finish();
}

criterion_group!(
    name = bounded_eval;
    config = Criterion::default()
        .noise_threshold(0.03)
        .warm_up_time(Duration::from_secs(2));
    targets =
        bench_list_literals,
        bench_bounce_limits,
        bench_closure_calls
);

criterion_main!(bounded_eval);
