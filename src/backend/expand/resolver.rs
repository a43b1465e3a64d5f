//! Name resolvers: the registry at top level, one [`FnScope`] per function literal.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use super::{ExpandResult, Expansion, Resolver};
use crate::backend::errors::RuntimeError;
use crate::backend::models::{Binding, CaptureFrame};
use crate::backend::registry::Registry;
use crate::backend::trampoline::{release, Cont, Outcome, Yoke};

/// Top-level resolver: every defined name is `Main(name)` with no frames
pub struct RegistryResolver {
    registry: Registry,
}

impl RegistryResolver {
    pub fn new(registry: Registry) -> Self {
        RegistryResolver { registry }
    }
}

impl Resolver for RegistryResolver {
    fn resolve(&self, yoke: &mut Yoke, name: &str, _capture_count: usize, k: Cont<ExpandResult>) -> Outcome {
        let result = self.registry.lookup_macro(name).map(|expander| Expansion {
            binding: Binding::main(name),
            captures: Vec::new(),
            expander,
        });
        yoke.resume(k, result)
    }
}

/// Resolver for the body of one function literal.
///
/// Every reference becomes `Param(count)` plus one frame: `(None, [])` for the
/// parameter, `(Some(outer binding), outer frames)` for anything else. Names that
/// resolve to a macro without captures pass through untouched.
pub struct FnScope {
    param: String,
    /// Always set until the scope is dropped
    outer: Option<Rc<dyn Resolver>>,
    /// Capture count of the enclosing scope when this literal started
    base: usize,
    /// Outer frames contributed by each local frame so far
    ledger: Rc<RefCell<Vec<usize>>>,
    /// Macro names already seen to pass through from the enclosing scope
    macros: Rc<RefCell<HashMap<String, Expansion>>>,
}

impl FnScope {
    pub fn new(param: impl Into<String>, outer: Rc<dyn Resolver>, base: usize) -> Self {
        FnScope {
            param: param.into(),
            outer: Some(outer),
            base,
            ledger: Rc::new(RefCell::new(Vec::new())),
            macros: Rc::new(RefCell::new(HashMap::new())),
        }
    }
}

impl Resolver for FnScope {
    fn resolve(&self, yoke: &mut Yoke, name: &str, capture_count: usize, k: Cont<ExpandResult>) -> Outcome {
        {
            let mut ledger = self.ledger.borrow_mut();
            if ledger.len() < capture_count {
                return Err(RuntimeError::CaptureLedger {
                    expected: capture_count,
                    found: ledger.len(),
                });
            }
            // Frames past the count belong to an abandoned expansion
            ledger.truncate(capture_count);
            if name == self.param {
                ledger.push(0);
            }
        }

        if name == self.param {
            trace!(target: "metatag::backend::expand", name, index = capture_count, "parameter reference");
            return yoke.resume(
                k,
                Ok(Expansion {
                    binding: Binding::param(capture_count),
                    captures: vec![CaptureFrame::parameter()],
                    expander: None,
                }),
            );
        }

        let cached = self.macros.borrow().get(name).cloned();
        if let Some(expansion) = cached {
            return yoke.resume(k, Ok(expansion));
        }

        let Some(outer) = self.outer.as_ref().map(Rc::clone) else {
            return Err(RuntimeError::UnexpectedShape("function scope without an enclosing resolver".to_string()));
        };
        let outer_count = self.base + self.ledger.borrow().iter().sum::<usize>();
        let ledger = Rc::clone(&self.ledger);
        let macros = Rc::clone(&self.macros);
        let name = name.to_string();
        // Deeply nested literals chain their resolvers
        yoke.bounce(move |yoke: &mut Yoke| {
            let lookup = name.clone();
            outer.resolve(
                yoke,
                &lookup,
                outer_count,
                Cont::new(move |yoke: &mut Yoke, result: ExpandResult| {
                    let outer = match result {
                        Ok(outer) => outer,
                        Err(fault) => return yoke.resume(k, Err(fault)),
                    };
                    if outer.expander.is_some() && outer.captures.is_empty() {
                        macros.borrow_mut().insert(name, outer.clone());
                        return yoke.resume(k, Ok(outer));
                    }
                    ledger.borrow_mut().push(outer.captures.len());
                    trace!(target: "metatag::backend::expand", name = %name, index = capture_count, outer_frames = outer.captures.len(), "captured reference");
                    yoke.resume(
                        k,
                        Ok(Expansion {
                            binding: Binding::param(capture_count),
                            captures: vec![CaptureFrame::captured(outer.binding, outer.captures)],
                            expander: None,
                        }),
                    )
                }),
            )
        })
    }
}

impl Drop for FnScope {
    // Nested function literals chain their scopes
    fn drop(&mut self) {
        if let Some(outer) = self.outer.take() {
            release(outer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::errors::ErrorKind;
    use crate::backend::models::tags;
    use crate::backend::trampoline::run_bounded;

    fn resolve_with(
        resolver: Rc<dyn Resolver>,
        requests: Vec<(&'static str, usize)>,
    ) -> Result<Vec<ExpandResult>, RuntimeError> {
        run_bounded((), 4, move |yoke: &mut Yoke, finish: Cont<Vec<ExpandResult>>| {
            fn next(
                yoke: &mut Yoke,
                resolver: Rc<dyn Resolver>,
                mut rest: std::vec::IntoIter<(&'static str, usize)>,
                mut out: Vec<ExpandResult>,
                k: Cont<Vec<ExpandResult>>,
            ) -> Outcome {
                match rest.next() {
                    None => k.call(yoke, out),
                    Some((name, count)) => {
                        let again = Rc::clone(&resolver);
                        resolver.resolve(
                            yoke,
                            name,
                            count,
                            Cont::new(move |yoke: &mut Yoke, result: ExpandResult| {
                                out.push(result);
                                next(yoke, again, rest, out, k)
                            }),
                        )
                    }
                }
            }
            next(yoke, resolver, requests.into_iter(), Vec::new(), finish)
        })
    }

    fn registry() -> Registry {
        let registry = Registry::new();
        registry.define_tag(tags::NIL, &[]).unwrap();
        registry
    }

    #[test]
    fn test_registry_resolver() {
        let resolver: Rc<dyn Resolver> = Rc::new(RegistryResolver::new(registry()));
        let results = resolve_with(resolver, vec![("nil", 0), ("ghost", 0)]).unwrap();
        let nil = results[0].as_ref().unwrap();
        assert_eq!(*nil.binding, Binding::Main("nil".into()));
        assert!(nil.captures.is_empty());
        assert!(nil.expander.is_none());
        assert_eq!(results[1].as_ref().map(|_| ()).map_err(|f| f.kind), Err(ErrorKind::UnboundName));
    }

    #[test]
    fn test_fn_scope_frames() {
        let top: Rc<dyn Resolver> = Rc::new(RegistryResolver::new(registry()));
        let scope: Rc<dyn Resolver> = Rc::new(FnScope::new("x", top, 0));
        let results = resolve_with(scope, vec![("x", 0), ("nil", 1), ("x", 2)]).unwrap();

        let first = results[0].as_ref().unwrap();
        assert_eq!(*first.binding, Binding::Param(0));
        assert_eq!(first.captures, vec![CaptureFrame::parameter()]);

        let second = results[1].as_ref().unwrap();
        assert_eq!(*second.binding, Binding::Param(1));
        assert_eq!(
            second.captures,
            vec![CaptureFrame::captured(Binding::main("nil"), Vec::new())]
        );

        let third = results[2].as_ref().unwrap();
        assert_eq!(*third.binding, Binding::Param(2));
    }

    #[test]
    fn test_fn_scope_rejects_unreached_count() {
        let top: Rc<dyn Resolver> = Rc::new(RegistryResolver::new(registry()));
        let scope: Rc<dyn Resolver> = Rc::new(FnScope::new("x", top, 0));
        let result = resolve_with(scope, vec![("x", 3)]);
        assert!(matches!(
            result,
            Err(RuntimeError::CaptureLedger { expected: 3, found: 0 })
        ));
    }
}
