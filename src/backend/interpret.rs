//! Interpretation of closed bindings
//!
//! A binding is evaluated against an immutable captured list. `Main` reads the
//! registry, `Param` reads the captured list, `Call` evaluates its parts left to right
//! and dispatches `call`, and `Fn` evaluates its `Some` captures into a [`Closure`].
//! An error value in operator position is the result of the call. Error-valued
//! arguments are too, unless the callee accepts errors (a method implemented for
//! the `error` tag).

use std::iter;
use std::rc::Rc;
use std::sync::Arc;

use tracing::trace;

use super::errors::{Fault, RuntimeError};
use super::models::{Binding, Callable, Value, CALL};
use super::registry::Registry;
use super::trampoline::{map_bounded, Cont, Outcome, Step, Yoke};

/// Evaluate `binding` against `captured` and deliver the value to `k`.
pub fn interpret_in(
    registry: &Registry,
    yoke: &mut Yoke,
    binding: Arc<Binding>,
    captured: Arc<[Value]>,
    k: Cont<Value>,
) -> Outcome {
    let registry = registry.clone();
    yoke.bounce(move |yoke: &mut Yoke| match &*binding {
        Binding::Main(name) => {
            let value = registry
                .lookup_value(name.as_str())
                .unwrap_or_else(Fault::into_value);
            yoke.resume(k, value)
        }
        Binding::Param(index) => match captured.get(*index) {
            Some(value) => yoke.resume(k, value.clone()),
            None => Err(RuntimeError::CaptureIndexOutOfRange {
                index: *index,
                len: captured.len(),
            }),
        },
        Binding::Call { op, args } => {
            let parts: Vec<Arc<Binding>> = iter::once(Arc::clone(op)).chain(args.iter().cloned()).collect();
            let step = interpret_step(&registry, captured);
            map_bounded(
                yoke,
                parts,
                step,
                Cont::new(move |yoke: &mut Yoke, values: Vec<Value>| {
                    if let Some(error) = short_circuit(&registry, &values) {
                        trace!(target: "metatag::backend::interpret", error = %error, "call short-circuited");
                        return yoke.resume(k, error);
                    }
                    registry.dispatch_in(yoke, CALL, values, k)
                }),
            )
        }
        Binding::Fn { captures, body } => {
            let body = Arc::clone(body);
            let step: Step<Option<Arc<Binding>>, Option<Value>> = {
                let registry = registry.clone();
                Rc::new(
                    move |yoke: &mut Yoke, slot: Option<Arc<Binding>>, k: Cont<Option<Value>>| match slot {
                        None => k.call(yoke, None),
                        Some(binding) => interpret_in(
                            &registry,
                            yoke,
                            binding,
                            Arc::clone(&captured),
                            Cont::new(move |yoke: &mut Yoke, value: Value| k.call(yoke, Some(value))),
                        ),
                    },
                )
            };
            map_bounded(
                yoke,
                captures.clone(),
                step,
                Cont::new(move |yoke: &mut Yoke, slots: Vec<Option<Value>>| {
                    let closure = Value::callable(Arc::new(Closure { slots, body }));
                    yoke.resume(k, closure)
                }),
            )
        }
    })
}

/// The error value a call with these evaluated parts yields without dispatching
fn short_circuit(registry: &Registry, parts: &[Value]) -> Option<Value> {
    let (op, args) = parts.split_first()?;
    if op.is_error() {
        return Some(op.clone());
    }
    if op.as_callable().is_some_and(|callee| callee.accepts_errors(registry)) {
        return None;
    }
    args.iter().find(|arg| arg.is_error()).cloned()
}

fn interpret_step(registry: &Registry, captured: Arc<[Value]>) -> Step<Arc<Binding>, Value> {
    let registry = registry.clone();
    Rc::new(move |yoke: &mut Yoke, binding: Arc<Binding>, k: Cont<Value>| {
        interpret_in(&registry, yoke, binding, Arc::clone(&captured), k)
    })
}

/// A function value produced by a `Fn` binding.
///
/// `None` slots are filled with the argument on each call.
pub struct Closure {
    slots: Vec<Option<Value>>,
    body: Arc<Binding>,
}

impl Callable for Closure {
    fn name(&self) -> &str {
        "closure"
    }

    fn invoke(&self, registry: &Registry, yoke: &mut Yoke, args: Vec<Value>, k: Cont<Value>) -> Outcome {
        let argc = args.len();
        let Ok([arg]) = <[Value; 1]>::try_from(args) else {
            return yoke.resume(k, Fault::arity("closure", 1, argc).into_value());
        };
        // Fresh list per call; the closure's own slots are never touched
        let captured: Arc<[Value]> = self
            .slots
            .iter()
            .map(|slot| slot.clone().unwrap_or_else(|| arg.clone()))
            .collect();
        trace!(target: "metatag::backend::interpret", captured = captured.len(), "closure call");
        interpret_in(registry, yoke, Arc::clone(&self.body), captured, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::bootstrap::bootstrap;
    use crate::backend::errors::ErrorKind;
    use crate::backend::registry::DirectImpl;
    use crate::backend::trampoline::run_bounded;

    fn run(registry: &Registry, binding: Arc<Binding>, captured: Vec<Value>) -> Result<Value, RuntimeError> {
        let registry = registry.clone();
        run_bounded((), 8, move |yoke: &mut Yoke, finish: Cont<Value>| {
            interpret_in(&registry, yoke, binding, captured.into(), finish)
        })
    }

    fn core() -> Registry {
        let registry = Registry::new();
        bootstrap(&registry).unwrap();
        registry
    }

    #[test]
    fn test_main_and_param() {
        let registry = core();
        registry.define_value("answer", Value::nat(2)).unwrap();
        assert_eq!(run(&registry, Binding::main("answer"), Vec::new()).unwrap(), Value::nat(2));
        assert_eq!(
            run(&registry, Binding::param(1), vec![Value::nat(0), Value::nat(1)]).unwrap(),
            Value::nat(1)
        );
    }

    #[test]
    fn test_unbound_main_is_error_value() {
        let value = run(&core(), Binding::main("ghost"), Vec::new()).unwrap();
        assert_eq!(value.fault().map(|f| f.kind), Some(ErrorKind::UnboundName));
    }

    #[test]
    fn test_param_out_of_range_is_fatal() {
        let result = run(&core(), Binding::param(2), vec![Value::nat(0)]);
        assert_eq!(result, Err(RuntimeError::CaptureIndexOutOfRange { index: 2, len: 1 }));
    }

    #[test]
    fn test_call_constructs_through_tag_constructor() {
        let binding = Binding::call(Binding::main("succ"), vec![Binding::call(Binding::main("zero"), Vec::new())]);
        assert_eq!(run(&core(), binding, Vec::new()).unwrap(), Value::nat(1));
    }

    #[test]
    fn test_call_propagates_first_error() {
        let binding = Binding::call(
            Binding::main("succ"),
            vec![Binding::main("ghost"), Binding::main("phantom")],
        );
        let value = run(&core(), binding, Vec::new()).unwrap();
        assert!(value.fault().unwrap().message.contains("ghost"));
    }

    #[test]
    fn test_error_arguments_reach_methods_implemented_for_error() {
        let registry = core();
        registry.define_method("recover", &["value"]).unwrap();
        registry
            .set_implementation(
                "recover",
                "error",
                DirectImpl::new(|_: &Registry, args: &[Value]| match args[0].fault() {
                    Some(fault) => Value::string(fault.kind.as_str()),
                    None => Value::string("fine"),
                }),
            )
            .unwrap();

        let binding = Binding::call(Binding::main("recover"), vec![Binding::main("ghost")]);
        assert_eq!(run(&registry, binding, Vec::new()).unwrap(), Value::string("UnboundName"));

        // Constructors and closures still propagate the error unchanged
        let binding = Binding::call(Binding::main("succ"), vec![Binding::main("ghost")]);
        let value = run(&registry, binding, Vec::new()).unwrap();
        assert_eq!(value.fault().map(|f| f.kind), Some(ErrorKind::UnboundName));

        // An error in operator position is the result
        let binding = Binding::call(Binding::main("ghost"), vec![Binding::main("zero")]);
        let value = run(&registry, binding, Vec::new()).unwrap();
        assert!(value.fault().unwrap().message.contains("ghost"));
    }

    #[test]
    fn test_fn_fills_parameter_slots() {
        // (fn x (cons x captured)) with the captured value taken from the outer list
        let body = Binding::call(Binding::main("cons"), vec![Binding::param(0), Binding::param(1)]);
        let literal = Binding::function(vec![None, Some(Binding::param(0))], body);
        let closure = run(&core(), literal, vec![Value::list([])]).unwrap();
        let callable = Arc::clone(closure.as_callable().unwrap());

        let registry = core();
        let result = run_bounded((), 8, move |yoke: &mut Yoke, finish: Cont<Value>| {
            callable.invoke(&registry, yoke, vec![Value::nat(3)], finish)
        })
        .unwrap();
        assert_eq!(result, Value::list([Value::nat(3)]));
    }

    #[test]
    fn test_closure_arity() {
        let literal = Binding::function(vec![None], Binding::param(0));
        let registry = core();
        let closure = run(&registry, literal, Vec::new()).unwrap();
        let via_call = registry
            .dispatch(CALL, vec![closure.clone(), Value::nat(1), Value::nat(2)])
            .unwrap();
        assert_eq!(via_call.fault().map(|f| f.kind), Some(ErrorKind::ArityMismatch));
        let ok = registry.dispatch(CALL, vec![closure, Value::nat(5)]).unwrap();
        assert_eq!(ok, Value::nat(5));
    }
}
