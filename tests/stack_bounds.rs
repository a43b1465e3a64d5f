//! Inputs of length or nesting depth 10,000 must complete under any bounce limit
//! without growing the native stack, and a cancelled rider must stop a run with an
//! error however much work is pending.

mod common;

use std::cell::Cell;

use common::{eval, flat_call, kind, nested_fn, nested_succ, runtime, runtime_with_limit};
use metatag::backend::{
    map_bounded, CancelFlag, Cont, DirectImpl, ErrorKind, Registry, Rider, RuntimeError, Step, Value, Yoke,
};
use metatag::SExpr;

const N: usize = 10_000;

/// Requests cancellation after a fixed number of bounces
struct CancelAfter(Cell<usize>);

impl Rider for CancelAfter {
    fn cancelled(&self) -> bool {
        let left = self.0.get();
        if left == 0 {
            return true;
        }
        self.0.set(left - 1);
        false
    }
}

#[test]
fn test_length_of_long_list_at_every_limit() {
    for limit in [1, 2, 7, 256] {
        let runtime = runtime_with_limit(limit);
        let list = Value::list((0..N).map(|_| Value::nat(0)));
        let length = runtime.dispatch("length", vec![list]).unwrap();
        assert_eq!(length.nat_count(), Some(N as u64), "limit {}", limit);
    }
}

#[test]
fn test_expanding_and_interpreting_long_list_literal() {
    for limit in [1, 256] {
        let runtime = runtime_with_limit(limit);
        let literal = flat_call("list", "zero", N);
        let expr = SExpr::list([SExpr::atom("length"), literal]);
        assert_eq!(eval(&runtime, expr).nat_count(), Some(N as u64), "limit {}", limit);
    }
}

#[test]
fn test_long_list_literal_inside_function() {
    let runtime = runtime_with_limit(1);
    let body = flat_call("list", "x", N);
    let function = eval(&runtime, SExpr::list([SExpr::atom("fn"), SExpr::atom("x"), body]));
    let list = runtime.call(&function, vec![Value::nat(1)]).unwrap();
    let items = list.list_items().unwrap();
    assert_eq!(items.len(), N);
    assert!(items.iter().all(|item| *item == Value::nat(1)));
}

#[test]
fn test_variadic_method_with_many_arguments() {
    let runtime = runtime_with_limit(1);
    runtime.define_tag("unit", &[]).unwrap();
    runtime.define_value("u", runtime.construct("unit", Vec::new())).unwrap();
    runtime.define_variadic_method("tally", &["first"]).unwrap();
    runtime
        .set_implementation(
            "tally",
            "unit",
            DirectImpl::new(|_: &Registry, args: &[Value]| Value::nat(args.len() as u64)),
        )
        .unwrap();

    let value = eval(&runtime, flat_call("tally", "u", N));
    assert_eq!(value.nat_count(), Some(N as u64));
}

#[test]
fn test_append_and_plus_on_long_inputs() {
    let runtime = runtime_with_limit(1);
    let left = Value::list((0..N).map(|_| Value::nat(1)));
    let right = Value::list((0..N).map(|_| Value::nat(2)));
    let joined = runtime.dispatch("append", vec![left, right]).unwrap();
    let length = runtime.dispatch("length", vec![joined]).unwrap();
    assert_eq!(length.nat_count(), Some(2 * N as u64));

    let sum = runtime
        .dispatch("plus", vec![Value::nat(N as u64), Value::nat(N as u64)])
        .unwrap();
    assert_eq!(sum.nat_count(), Some(2 * N as u64));
}

#[test]
fn test_map_bounded_over_long_input() {
    let runtime = runtime_with_limit(1);
    let registry = runtime.registry().clone();
    let values: Vec<Value> = (0..N).map(|_| Value::list([])).collect();
    let lengths = runtime
        .run_bounded(move |yoke: &mut Yoke, finish: Cont<Vec<Value>>| {
            let step: Step<Value, Value> = std::rc::Rc::new(move |yoke: &mut Yoke, value: Value, k: Cont<Value>| {
                registry.dispatch_in(yoke, "length", vec![value], k)
            });
            map_bounded(yoke, values, step, finish)
        })
        .unwrap();
    assert_eq!(lengths.len(), N);
    assert!(lengths.iter().all(|length| *length == Value::nat(0)));
}

#[test]
fn test_cancelled_flag_stops_eval() {
    let runtime = runtime();
    let flag = CancelFlag::new();
    flag.cancel();
    let result = runtime.eval_with(flag, &flat_call("list", "zero", 10));
    assert_eq!(result, Err(RuntimeError::Cancelled));
}

#[test]
fn test_cancellation_mid_run() {
    let runtime = runtime_with_limit(4);
    let expr = SExpr::list([SExpr::atom("length"), flat_call("list", "zero", 100)]);
    let result = runtime.eval_with(CancelAfter(Cell::new(50)), &expr);
    assert_eq!(result, Err(RuntimeError::Cancelled));

    // Enough budget lets the same expression finish
    let value = runtime.eval_with(CancelAfter(Cell::new(1_000_000)), &expr).unwrap();
    assert_eq!(value.nat_count(), Some(100));
}

#[test]
fn test_long_improper_list_is_wrong_shape() {
    let runtime = runtime_with_limit(1);
    let items: Vec<Value> = (0..N).map(|_| Value::nat(0)).collect();
    let improper = items.into_iter().rev().fold(Value::nat(0), |tail, head| {
        runtime.construct("cons", vec![head, tail])
    });
    let value = runtime.dispatch("length", vec![improper]).unwrap();
    assert_eq!(kind(&value), Some(ErrorKind::WrongShape));
}

#[test]
fn test_deeply_nested_call_forms() {
    for limit in [1, 256] {
        let runtime = runtime_with_limit(limit);
        let expr = nested_succ(N);

        let value = eval(&runtime, expr.clone());
        assert_eq!(value.nat_count(), Some(N as u64), "limit {}", limit);

        let binding = runtime.expand_to_binding(&expr).unwrap().unwrap();
        let value = runtime.interpret(&binding).unwrap();
        assert_eq!(value.nat_count(), Some(N as u64), "limit {}", limit);
    }
}

#[test]
fn test_deeply_nested_function_literals() {
    for limit in [1, 256] {
        let runtime = runtime_with_limit(limit);
        let expr = nested_fn(N);
        let binding = runtime.expand_to_binding(&expr).unwrap();
        assert!(binding.is_ok(), "limit {}", limit);

        let mut value = eval(&runtime, expr);
        let first = Value::string("first");
        for level in 0..N {
            let arg = if level == 0 { first.clone() } else { Value::nat(0) };
            value = runtime.call(&value, vec![arg]).unwrap();
        }
        assert_eq!(value, first, "limit {}", limit);
    }
}

#[test]
fn test_cancellation_with_deep_pending_work() {
    for limit in [1, 256] {
        let runtime = runtime_with_limit(limit);
        let expr = nested_succ(N);
        let result = runtime.eval_with(CancelAfter(Cell::new(2 * N)), &expr);
        assert_eq!(result, Err(RuntimeError::Cancelled), "limit {}", limit);

        let result = runtime.eval_with(CancelAfter(Cell::new(2 * N)), &nested_fn(N));
        assert_eq!(result, Err(RuntimeError::Cancelled), "limit {}", limit);
    }
}
