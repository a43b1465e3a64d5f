//! Core macros: `fn`, `let`, `list`, `do`

use std::rc::Rc;

use super::{expand_seq, expand_to_binding, ExpandResult, ExpandedSeq, Expansion, FnScope, Macro, Resolver};
use crate::backend::errors::Fault;
use crate::backend::models::{tags, Binding};
use crate::backend::trampoline::{Cont, Outcome, Yoke};
use crate::sexpr::SExpr;

/// `(fn x body)`: a one-parameter function literal
pub struct FnMacro;

impl Macro for FnMacro {
    fn name(&self) -> &str {
        tags::FN
    }

    fn expand(
        &self,
        yoke: &mut Yoke,
        resolver: Rc<dyn Resolver>,
        capture_count: usize,
        args: Vec<SExpr>,
        k: Cont<ExpandResult>,
    ) -> Outcome {
        let (param, body) = match <[SExpr; 2]>::try_from(args) {
            Ok([param, body]) => match param.as_atom() {
                Some(param) => (param.to_string(), body),
                None => return yoke.resume(k, Err(Fault::malformed("fn parameter must be a name"))),
            },
            Err(args) => {
                return yoke.resume(
                    k,
                    Err(Fault::malformed(format!(
                        "fn expects a parameter and a body, got {} form{}",
                        args.len(),
                        if args.len() == 1 { "" } else { "s" }
                    ))),
                )
            }
        };

        let scope: Rc<dyn Resolver> = Rc::new(FnScope::new(param, resolver, capture_count));
        expand_to_binding(
            yoke,
            body,
            scope,
            0,
            Cont::new(move |yoke: &mut Yoke, result: ExpandResult| {
                let body = match result {
                    Ok(body) => body,
                    Err(fault) => return yoke.resume(k, Err(fault)),
                };
                let mut captures = Vec::with_capacity(body.captures.len());
                let mut outer = Vec::new();
                for mut frame in body.captures {
                    captures.push(frame.local.take());
                    outer.append(&mut frame.outer);
                }
                yoke.resume(
                    k,
                    Ok(Expansion {
                        binding: Binding::function(captures, body.binding),
                        captures: outer,
                        expander: None,
                    }),
                )
            }),
        )
    }
}

/// `(let x value body)` as `((fn x body) value)`
pub struct LetMacro;

impl Macro for LetMacro {
    fn name(&self) -> &str {
        "let"
    }

    fn expand(
        &self,
        yoke: &mut Yoke,
        resolver: Rc<dyn Resolver>,
        capture_count: usize,
        args: Vec<SExpr>,
        k: Cont<ExpandResult>,
    ) -> Outcome {
        match <[SExpr; 3]>::try_from(args) {
            Ok([name @ SExpr::Atom(_), value, body]) => {
                let form = SExpr::List(vec![
                    SExpr::List(vec![SExpr::atom(tags::FN), name, body]),
                    value,
                ]);
                expand_to_binding(yoke, form, resolver, capture_count, k)
            }
            Ok(_) => yoke.resume(k, Err(Fault::malformed("let binds a name"))),
            Err(_) => yoke.resume(k, Err(Fault::malformed("let expects a name, a value and a body"))),
        }
    }
}

/// `(list a b ...)` as `(cons a (cons b ... (nil)))`
///
/// Elements are expanded once, left to right; the `cons` and `nil` references follow
/// them and are shared by every cell.
pub struct ListMacro;

impl Macro for ListMacro {
    fn name(&self) -> &str {
        "list"
    }

    fn expand(
        &self,
        yoke: &mut Yoke,
        resolver: Rc<dyn Resolver>,
        capture_count: usize,
        args: Vec<SExpr>,
        k: Cont<ExpandResult>,
    ) -> Outcome {
        let mut heads = vec![SExpr::atom(tags::NIL)];
        if !args.is_empty() {
            heads.push(SExpr::atom(tags::CONS));
        }
        let element_count = args.len();
        let mut exprs = args;
        exprs.extend(heads);

        expand_seq(
            yoke,
            exprs,
            resolver,
            capture_count,
            Cont::new(move |yoke: &mut Yoke, seq: Result<ExpandedSeq, Fault>| {
                let result = seq.map(|mut seq| {
                    let cons = if element_count > 0 { seq.bindings.pop() } else { None };
                    let nil = seq.bindings.pop();
                    let mut tail = Binding::call(nil.unwrap_or_else(|| Binding::main(tags::NIL)), Vec::new());
                    if let Some(cons) = cons {
                        for head in seq.bindings.into_iter().rev() {
                            tail = Binding::call(cons.clone(), vec![head, tail]);
                        }
                    }
                    Expansion {
                        binding: tail,
                        captures: seq.captures,
                        expander: None,
                    }
                });
                yoke.resume(k, result)
            }),
        )
    }
}

/// `(do e1 ... en)`: evaluate in order, yield the last
pub struct DoMacro;

/// Binder for discarded `do` results; a reader never produces an atom containing parentheses
const DISCARDED: &str = "(do)";

impl Macro for DoMacro {
    fn name(&self) -> &str {
        "do"
    }

    fn expand(
        &self,
        yoke: &mut Yoke,
        resolver: Rc<dyn Resolver>,
        capture_count: usize,
        args: Vec<SExpr>,
        k: Cont<ExpandResult>,
    ) -> Outcome {
        let mut rest = args.into_iter();
        let form = match (rest.next(), rest.len()) {
            (None, _) => return yoke.resume(k, Err(Fault::malformed("do expects at least one form"))),
            (Some(last), 0) => last,
            // One level per step; the inner `do` expands when the body does
            (Some(first), _) => {
                let mut inner = vec![SExpr::atom("do")];
                inner.extend(rest);
                SExpr::List(vec![SExpr::atom("let"), SExpr::atom(DISCARDED), first, SExpr::List(inner)])
            }
        };
        expand_to_binding(yoke, form, resolver, capture_count, k)
    }
}
