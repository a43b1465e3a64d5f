//! Runtime facade
//!
//! [`Runtime`] owns a bootstrapped [`Registry`] and a [`RuntimeConfig`] and runs every
//! entry point in its own bounded trampoline run.

use std::iter;
use std::sync::Arc;

use tracing::debug;

use super::bootstrap::bootstrap;
use super::config::RuntimeConfig;
use super::errors::{Fault, RuntimeError};
use super::expand::{expand_top, Macro};
use super::interpret::interpret_in;
use super::models::{Binding, Value, CALL};
use super::registry::{MethodImpl, Registry};
use super::trampoline::{run_bounded, Cont, Outcome, Rider, Yoke};
use crate::sexpr::SExpr;

/// A registry with the core definitions, plus its configuration
#[derive(Debug, Clone)]
pub struct Runtime {
    registry: Registry,
    config: RuntimeConfig,
}

impl Runtime {
    /// Fresh runtime with default configuration
    pub fn new() -> Result<Self, RuntimeError> {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let registry = Registry::new();
        bootstrap(&registry)?;
        debug!(target: "metatag::backend::runtime", bounce_limit = config.bounce_limit, "runtime created");
        Ok(Runtime { registry, config })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run `program` under this runtime's bounce limit
    pub fn run_bounded<T, P>(&self, program: P) -> Result<T, RuntimeError>
    where
        T: 'static,
        P: FnOnce(&mut Yoke, Cont<T>) -> Outcome + 'static,
    {
        run_bounded((), self.config.bounce_limit, program)
    }

    /// Like [`Runtime::run_bounded`] with a caller-supplied rider
    pub fn run_bounded_with<T, R, P>(&self, rider: R, program: P) -> Result<T, RuntimeError>
    where
        T: 'static,
        R: Rider + 'static,
        P: FnOnce(&mut Yoke, Cont<T>) -> Outcome + 'static,
    {
        run_bounded(rider, self.config.bounce_limit, program)
    }

    pub fn define_value(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        self.registry.define_value(name, value)
    }

    pub fn define_method(&self, name: &str, params: &[&str]) -> Result<(), RuntimeError> {
        self.registry.define_method(name, params)
    }

    pub fn define_variadic_method(&self, name: &str, params: &[&str]) -> Result<(), RuntimeError> {
        self.registry.define_variadic_method(name, params)
    }

    pub fn define_tag(&self, name: &str, fields: &[&str]) -> Result<(), RuntimeError> {
        self.registry.define_tag(name, fields)
    }

    pub fn define_primitive_tag(&self, name: &str) -> Result<(), RuntimeError> {
        self.registry.define_primitive_tag(name)
    }

    pub fn define_macro(&self, name: &str, expander: Arc<dyn Macro>) -> Result<(), RuntimeError> {
        self.registry.define_macro(name, expander)
    }

    pub fn set_implementation(
        &self,
        method: &str,
        tag: &str,
        implementation: Arc<dyn MethodImpl>,
    ) -> Result<(), RuntimeError> {
        self.registry.set_implementation(method, tag, implementation)
    }

    pub fn construct(&self, tag: &str, fields: Vec<Value>) -> Value {
        self.registry.construct(tag, fields)
    }

    pub fn lookup_value(&self, name: &str) -> Result<Value, Fault> {
        self.registry.lookup_value(name)
    }

    pub fn dispatch(&self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let registry = self.registry.clone();
        let method = method.to_string();
        self.run_bounded(move |yoke: &mut Yoke, finish: Cont<Value>| {
            registry.dispatch_in(yoke, &method, args, finish)
        })
    }

    /// Expand a top-level expression into a closed binding
    pub fn expand_to_binding(&self, expr: &SExpr) -> Result<Result<Arc<Binding>, Fault>, RuntimeError> {
        debug!(target: "metatag::backend::runtime", expr = %expr, "expand");
        let registry = self.registry.clone();
        let expr = expr.clone();
        self.run_bounded(move |yoke: &mut Yoke, finish: Cont<Result<Arc<Binding>, Fault>>| {
            expand_top(&registry, yoke, expr, finish)
        })
    }

    /// Interpret a closed binding with an empty captured list
    pub fn interpret(&self, binding: &Arc<Binding>) -> Result<Value, RuntimeError> {
        self.interpret_with(binding, Vec::new())
    }

    pub fn interpret_with(&self, binding: &Arc<Binding>, captured: Vec<Value>) -> Result<Value, RuntimeError> {
        let registry = self.registry.clone();
        let binding = Arc::clone(binding);
        self.run_bounded(move |yoke: &mut Yoke, finish: Cont<Value>| {
            interpret_in(&registry, yoke, binding, captured.into(), finish)
        })
    }

    /// Expand then interpret in one bounded run. Expansion faults become error values.
    pub fn eval(&self, expr: &SExpr) -> Result<Value, RuntimeError> {
        self.eval_with((), expr)
    }

    pub fn eval_with<R: Rider + 'static>(&self, rider: R, expr: &SExpr) -> Result<Value, RuntimeError> {
        debug!(target: "metatag::backend::runtime", expr = %expr, "eval");
        let registry = self.registry.clone();
        let expr = expr.clone();
        self.run_bounded_with(rider, move |yoke: &mut Yoke, finish: Cont<Value>| {
            let interpreter = registry.clone();
            expand_top(
                &registry,
                yoke,
                expr,
                Cont::new(move |yoke: &mut Yoke, expanded: Result<Arc<Binding>, Fault>| match expanded {
                    Ok(binding) => interpret_in(&interpreter, yoke, binding, Arc::from(Vec::new()), finish),
                    Err(fault) => yoke.resume(finish, fault.into_value()),
                }),
            )
        })
    }

    /// Apply a function value to `args` through the `call` method
    pub fn call(&self, function: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let args: Vec<Value> = iter::once(function.clone()).chain(args).collect();
        self.dispatch(CALL, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::errors::ErrorKind;
    use crate::sx;

    #[test]
    fn test_eval_constructs_values() {
        let runtime = Runtime::new().unwrap();
        let value = runtime.eval(&sx!((succ (succ (zero))))).unwrap();
        assert_eq!(value, Value::nat(2));
    }

    #[test]
    fn test_eval_expansion_fault_becomes_error_value() {
        let runtime = Runtime::new().unwrap();
        let value = runtime.eval(&sx!((succ ghost))).unwrap();
        assert_eq!(value.fault().map(|f| f.kind), Some(ErrorKind::UnboundName));
    }

    #[test]
    fn test_expand_then_interpret() {
        let runtime = Runtime::new().unwrap();
        let binding = runtime.expand_to_binding(&sx!((length (list zero zero)))).unwrap().unwrap();
        assert_eq!(runtime.interpret(&binding).unwrap(), Value::nat(2));
    }

    #[test]
    fn test_call_function_value() {
        let runtime = Runtime::new().unwrap();
        let inc = runtime.eval(&sx!((fn n (succ n)))).unwrap();
        assert_eq!(runtime.call(&inc, vec![Value::nat(4)]).unwrap(), Value::nat(5));
    }

    #[test]
    fn test_config_limit_is_used() {
        let runtime = Runtime::with_config(RuntimeConfig::with_bounce_limit(1).unwrap()).unwrap();
        let depth = runtime
            .run_bounded(|yoke: &mut Yoke, finish: Cont<usize>| yoke.bounce(move |yoke: &mut Yoke| {
                let limit = yoke.limit();
                finish.call(yoke, limit)
            }))
            .unwrap();
        assert_eq!(depth, 1);
    }
}
