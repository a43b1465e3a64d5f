//! Macro expansion from surface expressions to closed bindings
//!
//! Expansion walks an [`SExpr`] under the trampoline and produces an [`Expansion`]:
//! the core [`Binding`], the capture frames it introduced, and the macro the
//! expression names (if any). Names are resolved through a [`Resolver`]; each `fn`
//! literal installs its own resolver that turns every name reference in its body into
//! a positional `Param` and records a capture frame for it. `capture_count` is threaded
//! left to right and always equals the number of frames accumulated so far in the
//! current function literal.

mod macros;
mod resolver;

use std::rc::Rc;
use std::sync::Arc;

use tracing::trace;

use crate::backend::errors::{ErrorKind, Fault};
use crate::backend::models::{Binding, CaptureFrame};
use crate::backend::registry::Registry;
use crate::backend::trampoline::{fold_bounded, Cont, FoldStep, Outcome, Yoke};
use crate::sexpr::SExpr;

pub use macros::{DoMacro, FnMacro, LetMacro, ListMacro};
pub use resolver::{FnScope, RegistryResolver};

/// Result of expanding one expression
#[derive(Clone)]
pub struct Expansion {
    pub binding: Arc<Binding>,
    /// Frames introduced in the current function literal, in reference order
    pub captures: Vec<CaptureFrame>,
    /// Set when the expression names a macro
    pub expander: Option<Arc<dyn Macro>>,
}

impl Expansion {
    /// An expansion that introduced no frames and names no macro
    pub fn closed(binding: Arc<Binding>) -> Self {
        Expansion {
            binding,
            captures: Vec::new(),
            expander: None,
        }
    }
}

pub type ExpandResult = Result<Expansion, Fault>;

/// Bindings of a sequence of expressions together with all the frames they introduced
#[derive(Clone, Default)]
pub struct ExpandedSeq {
    pub bindings: Vec<Arc<Binding>>,
    pub captures: Vec<CaptureFrame>,
}

/// Resolves names during expansion
pub trait Resolver {
    /// Resolve `name` as referenced when `capture_count` frames already exist
    fn resolve(&self, yoke: &mut Yoke, name: &str, capture_count: usize, k: Cont<ExpandResult>) -> Outcome;
}

/// A macro expander.
///
/// Receives the resolver in effect at the call form, the capture count after the
/// operator was expanded, and the unexpanded argument expressions. The frames it
/// returns must be exactly those its output introduced, in order.
pub trait Macro: Send + Sync {
    fn name(&self) -> &str;

    fn expand(
        &self,
        yoke: &mut Yoke,
        resolver: Rc<dyn Resolver>,
        capture_count: usize,
        args: Vec<SExpr>,
        k: Cont<ExpandResult>,
    ) -> Outcome;
}

/// Expand `expr` under `resolver`.
pub fn expand_to_binding(
    yoke: &mut Yoke,
    expr: SExpr,
    resolver: Rc<dyn Resolver>,
    capture_count: usize,
    k: Cont<ExpandResult>,
) -> Outcome {
    yoke.bounce(move |yoke: &mut Yoke| match expr.into_items() {
        Err(atom) => resolver.resolve(yoke, atom.as_atom().unwrap_or_default(), capture_count, k),
        Ok(items) => {
            let mut items = items.into_iter();
            let Some(op) = items.next() else {
                return yoke.resume(k, Err(Fault::malformed("empty call form")));
            };
            let args: Vec<SExpr> = items.collect();
            let scope = Rc::clone(&resolver);
            expand_to_binding(
                yoke,
                op,
                resolver,
                capture_count,
                Cont::new(move |yoke: &mut Yoke, op: ExpandResult| {
                    let op = match op {
                        Ok(op) => op,
                        Err(fault) => return yoke.resume(k, Err(fault)),
                    };
                    let count = capture_count + op.captures.len();
                    match op.expander {
                        Some(expander) => {
                            trace!(target: "metatag::backend::expand", name = expander.name(), capture_count = count, "expanding macro");
                            let op_frames = op.captures;
                            expander.expand(
                                yoke,
                                scope,
                                count,
                                args,
                                Cont::new(move |yoke: &mut Yoke, result: ExpandResult| {
                                    let result = result.map(|mut expansion| {
                                        let mut frames = op_frames;
                                        frames.append(&mut expansion.captures);
                                        expansion.captures = frames;
                                        expansion
                                    });
                                    yoke.resume(k, result)
                                }),
                            )
                        }
                        None => {
                            let op_binding = op.binding;
                            let mut frames = op.captures;
                            expand_seq(
                                yoke,
                                args,
                                scope,
                                count,
                                Cont::new(move |yoke: &mut Yoke, seq: Result<ExpandedSeq, Fault>| {
                                    let result = seq.map(|mut seq| {
                                        frames.append(&mut seq.captures);
                                        Expansion {
                                            binding: Binding::call(op_binding, seq.bindings),
                                            captures: frames,
                                            expander: None,
                                        }
                                    });
                                    yoke.resume(k, result)
                                }),
                            )
                        }
                    }
                }),
            )
        }
    })
}

/// Expand `exprs` left to right, threading the capture count.
///
/// Stops at the first fault.
pub fn expand_seq(
    yoke: &mut Yoke,
    exprs: Vec<SExpr>,
    resolver: Rc<dyn Resolver>,
    capture_count: usize,
    k: Cont<Result<ExpandedSeq, Fault>>,
) -> Outcome {
    let step: FoldStep<Result<ExpandedSeq, Fault>, SExpr> = Rc::new(
        move |yoke: &mut Yoke, state: Result<ExpandedSeq, Fault>, expr: SExpr, k: Cont<Result<ExpandedSeq, Fault>>| {
            let mut seq = match state {
                Ok(seq) => seq,
                Err(fault) => return k.call(yoke, Err(fault)),
            };
            let count = capture_count + seq.captures.len();
            expand_to_binding(
                yoke,
                expr,
                Rc::clone(&resolver),
                count,
                Cont::new(move |yoke: &mut Yoke, result: ExpandResult| match result {
                    Ok(mut expansion) => {
                        seq.bindings.push(expansion.binding);
                        seq.captures.append(&mut expansion.captures);
                        k.call(yoke, Ok(seq))
                    }
                    Err(fault) => k.call(yoke, Err(fault)),
                }),
            )
        },
    );
    let init = ExpandedSeq {
        bindings: Vec::with_capacity(exprs.len()),
        captures: Vec::new(),
    };
    fold_bounded(yoke, exprs, Ok(init), step, k)
}

/// Expand a top-level expression against the registry.
///
/// The result must be closed: any frame left over is an `UnexpectedCaptures` fault.
pub fn expand_top(registry: &Registry, yoke: &mut Yoke, expr: SExpr, k: Cont<Result<Arc<Binding>, Fault>>) -> Outcome {
    let resolver: Rc<dyn Resolver> = Rc::new(RegistryResolver::new(registry.clone()));
    expand_to_binding(
        yoke,
        expr,
        resolver,
        0,
        Cont::new(move |yoke: &mut Yoke, result: ExpandResult| {
            let result = result.and_then(|expansion| {
                if expansion.captures.is_empty() {
                    Ok(expansion.binding)
                } else {
                    Err(Fault::new(
                        ErrorKind::UnexpectedCaptures,
                        format!(
                            "top-level expansion left {} unresolved capture{}",
                            expansion.captures.len(),
                            if expansion.captures.len() == 1 { "" } else { "s" }
                        ),
                    ))
                }
            });
            yoke.resume(k, result)
        }),
    )
}
