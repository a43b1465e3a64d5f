//! Core definitions installed into a fresh registry.
//!
//! - primitive tags `string`, `fn`, `error`
//! - constructor tags `nil`, `cons [head tail]`, `zero`, `succ [pred]`
//! - variadic `call`, implemented for `fn`: the method every call form dispatches
//! - `length` over lists, `append` of two lists, `plus` of two Peano numerals
//! - macros `fn`, `let`, `list`, `do`
//!
//! `fn` is both a tag and a macro.

use std::sync::Arc;

use tracing::debug;

use super::errors::{ErrorKind, Fault, RuntimeError};
use super::expand::{DoMacro, FnMacro, LetMacro, ListMacro};
use super::models::{tags, Payload, Value, CALL};
use super::registry::{MethodImpl, Registry};
use super::trampoline::{Cont, Outcome, Yoke};

/// Install the core definitions. Fails if any of them already exists.
pub fn bootstrap(registry: &Registry) -> Result<(), RuntimeError> {
    for tag in [tags::STRING, tags::FN, tags::ERROR] {
        registry.define_primitive_tag(tag)?;
    }
    registry.define_tag(tags::NIL, &[])?;
    registry.define_tag(tags::CONS, &["head", "tail"])?;
    registry.define_tag(tags::ZERO, &[])?;
    registry.define_tag(tags::SUCC, &["pred"])?;

    registry.define_variadic_method(CALL, &["callee"])?;
    registry.set_implementation(CALL, tags::FN, Arc::new(CallFn))?;

    registry.define_method("length", &["list"])?;
    registry.define_method("append", &["left", "right"])?;
    registry.define_method("plus", &["left", "right"])?;
    for tag in [tags::NIL, tags::CONS] {
        registry.set_implementation("length", tag, Arc::new(Length))?;
        registry.set_implementation("append", tag, Arc::new(Append))?;
    }
    for tag in [tags::ZERO, tags::SUCC] {
        registry.set_implementation("plus", tag, Arc::new(Plus))?;
    }

    registry.define_macro(tags::FN, Arc::new(FnMacro))?;
    registry.define_macro("let", Arc::new(LetMacro))?;
    registry.define_macro("list", Arc::new(ListMacro))?;
    registry.define_macro("do", Arc::new(DoMacro))?;

    debug!(target: "metatag::backend::bootstrap", names = registry.names().len(), "core definitions installed");
    Ok(())
}

/// `call` for `fn` values: apply the callee's payload to the remaining arguments
struct CallFn;

impl MethodImpl for CallFn {
    fn invoke(&self, registry: &Registry, yoke: &mut Yoke, args: Vec<Value>, k: Cont<Value>) -> Outcome {
        let mut args = args.into_iter();
        let callee = args
            .next()
            .ok_or_else(|| RuntimeError::UnexpectedShape("call without a callee".to_string()))?;
        let callable = callee
            .as_callable()
            .cloned()
            .ok_or_else(|| RuntimeError::UnexpectedShape(format!("`fn` value without a callable: {}", callee)))?;
        callable.invoke(registry, yoke, args.collect(), k)
    }
}

/// Layout of a recursive chain such as `cons`/`nil` or `succ`/`zero`
struct ChainShape {
    link: &'static str,
    end: &'static str,
    /// Field holding the rest of the chain
    next: usize,
    /// Field holding the element carried by each link, if any
    item: Option<usize>,
}

const LIST: ChainShape = ChainShape {
    link: tags::CONS,
    end: tags::NIL,
    next: 1,
    item: Some(0),
};

const NAT: ChainShape = ChainShape {
    link: tags::SUCC,
    end: tags::ZERO,
    next: 0,
    item: None,
};

#[derive(Default)]
struct Unrolled {
    links: usize,
    items: Vec<Value>,
}

/// Walk a chain one link per bounce
fn unroll(yoke: &mut Yoke, start: Value, shape: &'static ChainShape, k: Cont<Result<Unrolled, Fault>>) -> Outcome {
    unroll_from(yoke, start, shape, Unrolled::default(), k)
}

fn unroll_from(
    yoke: &mut Yoke,
    cursor: Value,
    shape: &'static ChainShape,
    mut acc: Unrolled,
    k: Cont<Result<Unrolled, Fault>>,
) -> Outcome {
    yoke.bounce(move |yoke: &mut Yoke| {
        if *cursor.tag() == shape.end && cursor.fields().is_empty() {
            return k.call(yoke, Ok(acc));
        }
        if *cursor.tag() == shape.link {
            if let Some(item) = shape.item {
                acc.items.push(cursor.nth(item)?);
            }
            acc.links += 1;
            let next = cursor.nth(shape.next)?;
            return unroll_from(yoke, next, shape, acc, k);
        }
        k.call(
            yoke,
            Err(Fault::new(
                ErrorKind::WrongShape,
                format!(
                    "expected `{}` or `{}`, found `{}`",
                    shape.link,
                    shape.end,
                    cursor.tag()
                ),
            )),
        )
    })
}

/// Take the first argument of a fixed-arity method
fn first(args: &[Value]) -> Result<Value, RuntimeError> {
    args.first()
        .cloned()
        .ok_or_else(|| RuntimeError::UnexpectedShape("method called without arguments".to_string()))
}

struct Length;

impl MethodImpl for Length {
    fn invoke(&self, _registry: &Registry, yoke: &mut Yoke, args: Vec<Value>, k: Cont<Value>) -> Outcome {
        let list = first(&args)?;
        unroll(
            yoke,
            list,
            &LIST,
            Cont::new(move |yoke: &mut Yoke, unrolled: Result<Unrolled, Fault>| {
                let value = match unrolled {
                    Ok(unrolled) => Value::nat(unrolled.links as u64),
                    Err(fault) => fault.into_value(),
                };
                yoke.resume(k, value)
            }),
        )
    }
}

struct Append;

impl MethodImpl for Append {
    fn invoke(&self, _registry: &Registry, yoke: &mut Yoke, args: Vec<Value>, k: Cont<Value>) -> Outcome {
        let right = args.get(1).cloned().ok_or_else(|| {
            RuntimeError::UnexpectedShape("append called without a right operand".to_string())
        })?;
        unroll(
            yoke,
            first(&args)?,
            &LIST,
            Cont::new(move |yoke: &mut Yoke, unrolled: Result<Unrolled, Fault>| {
                let value = match unrolled {
                    Ok(unrolled) => unrolled
                        .items
                        .into_iter()
                        .rev()
                        .fold(right, |tail, head| Value::new(tags::CONS, [head, tail], Payload::None)),
                    Err(fault) => fault.into_value(),
                };
                yoke.resume(k, value)
            }),
        )
    }
}

struct Plus;

impl MethodImpl for Plus {
    fn invoke(&self, _registry: &Registry, yoke: &mut Yoke, args: Vec<Value>, k: Cont<Value>) -> Outcome {
        let right = args.get(1).cloned().ok_or_else(|| {
            RuntimeError::UnexpectedShape("plus called without a right operand".to_string())
        })?;
        unroll(
            yoke,
            first(&args)?,
            &NAT,
            Cont::new(move |yoke: &mut Yoke, unrolled: Result<Unrolled, Fault>| {
                let value = match unrolled {
                    Ok(unrolled) => (0..unrolled.links)
                        .fold(right, |pred, _| Value::new(tags::SUCC, [pred], Payload::None)),
                    Err(fault) => fault.into_value(),
                };
                yoke.resume(k, value)
            }),
        )
    }
}
