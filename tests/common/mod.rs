//! Shared helpers for integration tests
#![allow(dead_code)]

use metatag::backend::{ErrorKind, Runtime, RuntimeConfig, Value};
use metatag::SExpr;

/// Install a fmt subscriber writing through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

pub fn runtime() -> Runtime {
    init_tracing();
    Runtime::new().expect("bootstrap")
}

pub fn runtime_with_limit(limit: usize) -> Runtime {
    init_tracing();
    let config = RuntimeConfig::with_bounce_limit(limit).expect("valid limit");
    Runtime::with_config(config).expect("bootstrap")
}

pub fn eval(runtime: &Runtime, expr: SExpr) -> Value {
    runtime.eval(&expr).expect("no fatal error")
}

pub fn kind(value: &Value) -> Option<ErrorKind> {
    value.fault().map(|fault| fault.kind)
}

/// `(head a a ... a)` with `count` copies of `a`
pub fn flat_call(head: &str, a: &str, count: usize) -> SExpr {
    SExpr::list(std::iter::once(SExpr::atom(head)).chain((0..count).map(|_| SExpr::atom(a))))
}

/// `(succ (succ ... (zero)))` with `depth` applications of `succ`
pub fn nested_succ(depth: usize) -> SExpr {
    (0..depth).fold(SExpr::list([SExpr::atom("zero")]), |inner, _| {
        SExpr::list([SExpr::atom("succ"), inner])
    })
}

/// `(fn a0 (fn a1 ... (fn a{depth-1} a0)))`: the innermost body names the outermost parameter
pub fn nested_fn(depth: usize) -> SExpr {
    (0..depth).rev().fold(SExpr::atom("a0"), |body, level| {
        SExpr::list([SExpr::atom("fn"), SExpr::atom(format!("a{}", level)), body])
    })
}
