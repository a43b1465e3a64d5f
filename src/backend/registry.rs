//! Definition registry and multimethod dispatch.
//!
//! A [`Registry`] maps names to definition records. One name may carry any
//! combination of:
//!
//! - a **tag** definition (a constructor with a fixed field list, or a primitive tag
//!   whose values carry a payload instead),
//! - a **term** definition, which is either a plain value or a method,
//! - a **macro** definition, used only during expansion.
//!
//! A method holds one implementation per tag and dispatches on the tag of its first
//! argument. Implementations are [`MethodImpl`] trait objects written in
//! continuation-passing style so they can recurse under the trampoline.
//!
//! The table lives behind an `Arc<RwLock<..>>`; clones share it. No lock is held
//! while an implementation runs, so implementations may consult or extend the
//! registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::errors::{ErrorKind, Fault, RuntimeError};
use super::expand::Macro;
use super::models::{tags, Callable, Payload, Value};
use super::symbol::Symbol;
use super::trampoline::{run_bounded, Cont, Outcome, Yoke, DEFAULT_BOUNCE_LIMIT};

/// Implementation of a method for one tag.
///
/// Must deliver exactly one value to `k`. Recoverable failures are delivered as error
/// values; only internal invariant violations are returned as `Err`.
pub trait MethodImpl: Send + Sync {
    fn invoke(&self, registry: &Registry, yoke: &mut Yoke, args: Vec<Value>, k: Cont<Value>) -> Outcome;
}

/// Implementation computing its result directly from the arguments
pub struct DirectImpl<F>(F);

impl<F> DirectImpl<F>
where
    F: Fn(&Registry, &[Value]) -> Value + Send + Sync + 'static,
{
    pub fn new(f: F) -> Arc<Self> {
        Arc::new(DirectImpl(f))
    }
}

impl<F> MethodImpl for DirectImpl<F>
where
    F: Fn(&Registry, &[Value]) -> Value + Send + Sync,
{
    fn invoke(&self, registry: &Registry, yoke: &mut Yoke, args: Vec<Value>, k: Cont<Value>) -> Outcome {
        let result = (self.0)(registry, &args);
        yoke.resume(k, result)
    }
}

/// Implementation written as a continuation-passing closure
pub struct StepImpl<F>(F);

impl<F> StepImpl<F>
where
    F: Fn(&Registry, &mut Yoke, Vec<Value>, Cont<Value>) -> Outcome + Send + Sync + 'static,
{
    pub fn new(f: F) -> Arc<Self> {
        Arc::new(StepImpl(f))
    }
}

impl<F> MethodImpl for StepImpl<F>
where
    F: Fn(&Registry, &mut Yoke, Vec<Value>, Cont<Value>) -> Outcome + Send + Sync,
{
    fn invoke(&self, registry: &Registry, yoke: &mut Yoke, args: Vec<Value>, k: Cont<Value>) -> Outcome {
        (self.0)(registry, yoke, args, k)
    }
}

#[derive(Clone)]
enum TagDef {
    /// Field names, plus the `fn` value that constructs this tag
    Constructor { fields: Vec<Symbol>, constructor: Value },
    Primitive,
}

#[derive(Clone)]
struct MethodDef {
    params: Vec<Symbol>,
    variadic: bool,
    impls: HashMap<Symbol, Arc<dyn MethodImpl>>,
    /// The `fn` value that dispatches this method
    reference: Value,
}

#[derive(Clone)]
enum Term {
    Value(Value),
    Method(MethodDef),
}

#[derive(Clone, Default)]
struct Entry {
    tag: Option<TagDef>,
    term: Option<Term>,
    expander: Option<Arc<dyn Macro>>,
}

/// Callable that dispatches a named method
struct MethodRef {
    name: Symbol,
}

impl Callable for MethodRef {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn invoke(&self, registry: &Registry, yoke: &mut Yoke, args: Vec<Value>, k: Cont<Value>) -> Outcome {
        registry.dispatch_in(yoke, self.name.as_str(), args, k)
    }

    /// Methods with an implementation for `error` handle error values themselves
    fn accepts_errors(&self, registry: &Registry) -> bool {
        registry.implements(self.name.as_str(), tags::ERROR)
    }
}

/// Callable that constructs a tag from its arguments
struct Constructor {
    tag: Symbol,
}

impl Callable for Constructor {
    fn name(&self) -> &str {
        self.tag.as_str()
    }

    fn invoke(&self, registry: &Registry, yoke: &mut Yoke, args: Vec<Value>, k: Cont<Value>) -> Outcome {
        let value = registry.construct(self.tag.as_str(), args);
        yoke.resume(k, value)
    }
}

/// Shared table of tags, values, methods and macros
#[derive(Clone, Default)]
pub struct Registry {
    entries: Arc<RwLock<HashMap<Symbol, Entry>>>,
}

impl Registry {
    /// An empty registry; see [`crate::backend::bootstrap`] for the core definitions
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_value(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let mut entries = self.entries.write();
        let entry = entries.entry(Symbol::new(name)).or_default();
        if entry.term.is_some() {
            return Err(redefinition(name, "value"));
        }
        debug!(target: "metatag::backend::registry", name, value = %value, "define value");
        entry.term = Some(Term::Value(value));
        Ok(())
    }

    /// Define a method taking exactly `params.len()` arguments
    pub fn define_method(&self, name: &str, params: &[&str]) -> Result<(), RuntimeError> {
        self.insert_method(name, params, false)
    }

    /// Define a method taking `params.len()` or more arguments
    pub fn define_variadic_method(&self, name: &str, params: &[&str]) -> Result<(), RuntimeError> {
        self.insert_method(name, params, true)
    }

    fn insert_method(&self, name: &str, params: &[&str], variadic: bool) -> Result<(), RuntimeError> {
        let symbol = Symbol::new(name);
        let reference = Value::callable(Arc::new(MethodRef {
            name: symbol.clone(),
        }));

        let mut entries = self.entries.write();
        let entry = entries.entry(symbol).or_default();
        if entry.term.is_some() {
            return Err(redefinition(name, "method"));
        }
        debug!(target: "metatag::backend::registry", name, ?params, variadic, "define method");
        entry.term = Some(Term::Method(MethodDef {
            params: params.iter().map(|p| Symbol::new(p)).collect(),
            variadic,
            impls: HashMap::new(),
            reference,
        }));
        Ok(())
    }

    /// Define a constructor tag with the given field names
    pub fn define_tag(&self, name: &str, fields: &[&str]) -> Result<(), RuntimeError> {
        let symbol = Symbol::new(name);
        let constructor = Value::callable(Arc::new(Constructor { tag: symbol.clone() }));
        self.insert_tag(
            symbol,
            TagDef::Constructor {
                fields: fields.iter().map(|f| Symbol::new(f)).collect(),
                constructor,
            },
        )
    }

    /// Define a tag whose values carry a payload and cannot be constructed
    pub fn define_primitive_tag(&self, name: &str) -> Result<(), RuntimeError> {
        self.insert_tag(Symbol::new(name), TagDef::Primitive)
    }

    fn insert_tag(&self, name: Symbol, def: TagDef) -> Result<(), RuntimeError> {
        let mut entries = self.entries.write();
        if entries.get(&name).is_some_and(|entry| entry.tag.is_some()) {
            return Err(redefinition(name.as_str(), "tag"));
        }
        debug!(target: "metatag::backend::registry", name = %name, "define tag");
        entries.entry(name).or_default().tag = Some(def);
        Ok(())
    }

    pub fn define_macro(&self, name: &str, expander: Arc<dyn Macro>) -> Result<(), RuntimeError> {
        let mut entries = self.entries.write();
        let entry = entries.entry(Symbol::new(name)).or_default();
        if entry.expander.is_some() {
            return Err(redefinition(name, "macro"));
        }
        debug!(target: "metatag::backend::registry", name, expander = expander.name(), "define macro");
        entry.expander = Some(expander);
        Ok(())
    }

    /// Install the implementation of `method` for values tagged `tag`.
    ///
    /// A later call for the same pair replaces the earlier implementation.
    pub fn set_implementation(
        &self,
        method: &str,
        tag: &str,
        implementation: Arc<dyn MethodImpl>,
    ) -> Result<(), RuntimeError> {
        let mut entries = self.entries.write();
        let tag = Symbol::new(tag);
        if !entries.get(&tag).is_some_and(|entry| entry.tag.is_some()) {
            return Err(RuntimeError::NotATag(tag.to_string()));
        }
        match entries.get_mut(&Symbol::new(method)).and_then(|entry| entry.term.as_mut()) {
            Some(Term::Method(def)) => {
                debug!(target: "metatag::backend::registry", method, tag = %tag, "set implementation");
                def.impls.insert(tag, implementation);
                Ok(())
            }
            _ => Err(RuntimeError::NotAMethod(method.to_string())),
        }
    }

    /// Dispatch `method` on `args` under the caller's yoke.
    ///
    /// Every recoverable outcome (unknown method, arity mismatch, missing
    /// implementation) is delivered to `k` as an error value.
    pub fn dispatch_in(&self, yoke: &mut Yoke, method: &str, args: Vec<Value>, k: Cont<Value>) -> Outcome {
        let selected = self.select_implementation(method, &args);
        match selected {
            Ok(implementation) => {
                trace!(target: "metatag::backend::registry", method, tag = %args[0].tag(), argc = args.len(), "dispatch");
                implementation.invoke(self, yoke, args, k)
            }
            Err(fault) => {
                trace!(target: "metatag::backend::registry", method, %fault, "dispatch failed");
                yoke.resume(k, fault.into_value())
            }
        }
    }

    fn select_implementation(&self, method: &str, args: &[Value]) -> Result<Arc<dyn MethodImpl>, Fault> {
        let entries = self.entries.read();
        let def = match entries.get(&Symbol::new(method)).and_then(|entry| entry.term.as_ref()) {
            Some(Term::Method(def)) => def,
            Some(Term::Value(_)) => {
                return Err(Fault::new(
                    ErrorKind::NoImplementation,
                    format!("`{}` is a value, not a method", method),
                ))
            }
            None => return Err(Fault::unbound(method)),
        };

        let expected = def.params.len();
        let arity_ok = if def.variadic {
            args.len() >= expected
        } else {
            args.len() == expected
        };
        let Some(first) = args.first().filter(|_| arity_ok) else {
            return Err(Fault::arity(method, expected.max(1), args.len()));
        };

        def.impls
            .get(first.tag())
            .cloned()
            .ok_or_else(|| Fault::no_implementation(method, first.tag().as_str()))
    }

    /// Dispatch `method` to completion in a fresh bounded run
    pub fn dispatch(&self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let registry = self.clone();
        let method = method.to_string();
        run_bounded((), DEFAULT_BOUNCE_LIMIT, move |yoke: &mut Yoke, finish: Cont<Value>| {
            registry.dispatch_in(yoke, &method, args, finish)
        })
    }

    /// Build a value of a constructor tag, checking the field count.
    pub fn construct(&self, tag: &str, fields: Vec<Value>) -> Value {
        let entries = self.entries.read();
        let Some((name, entry)) = entries.get_key_value(&Symbol::new(tag)) else {
            return Fault::unbound(tag).into_value();
        };
        match &entry.tag {
            Some(TagDef::Constructor { fields: names, .. }) if names.len() == fields.len() => {
                Value::new(name.clone(), fields, Payload::None)
            }
            Some(TagDef::Constructor { fields: names, .. }) => {
                Fault::arity(tag, names.len(), fields.len()).into_value()
            }
            Some(TagDef::Primitive) => Fault::new(
                ErrorKind::WrongShape,
                format!("primitive tag `{}` has no constructor", tag),
            )
            .into_value(),
            None => Fault::new(ErrorKind::UnboundName, format!("`{}` is not a tag", tag)).into_value(),
        }
    }

    /// Value of a name: a value definition, else the method, else the tag constructor.
    pub fn lookup_value(&self, name: &str) -> Result<Value, Fault> {
        let entries = self.entries.read();
        let entry = entries.get(&Symbol::new(name)).ok_or_else(|| Fault::unbound(name))?;
        match (&entry.term, &entry.tag) {
            (Some(Term::Value(value)), _) => Ok(value.clone()),
            (Some(Term::Method(def)), _) => Ok(def.reference.clone()),
            (None, Some(TagDef::Constructor { constructor, .. })) => Ok(constructor.clone()),
            _ => Err(Fault::new(
                ErrorKind::UnboundName,
                format!("`{}` has no value", name),
            )),
        }
    }

    /// `Some(macro)` for a macro name, `None` for any other defined name.
    pub fn lookup_macro(&self, name: &str) -> Result<Option<Arc<dyn Macro>>, Fault> {
        let entries = self.entries.read();
        entries
            .get(&Symbol::new(name))
            .map(|entry| entry.expander.clone())
            .ok_or_else(|| Fault::unbound(name))
    }

    /// Whether `method` is a method with an implementation for `tag`
    pub fn implements(&self, method: &str, tag: &str) -> bool {
        match self.entries.read().get(&Symbol::new(method)).and_then(|entry| entry.term.as_ref()) {
            Some(Term::Method(def)) => def.impls.contains_key(&Symbol::new(tag)),
            _ => false,
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.entries.read().contains_key(&Symbol::new(name))
    }

    /// Field names of a constructor tag
    pub fn tag_fields(&self, name: &str) -> Option<Vec<Symbol>> {
        match self.entries.read().get(&Symbol::new(name))?.tag.as_ref()? {
            TagDef::Constructor { fields, .. } => Some(fields.clone()),
            TagDef::Primitive => Some(Vec::new()),
        }
    }

    /// All defined names, sorted
    pub fn names(&self) -> Vec<Symbol> {
        self.entries
            .read()
            .keys()
            .cloned()
            .sorted_by(|a, b| a.as_str().cmp(b.as_str()))
            .collect()
    }
}

fn redefinition(name: &str, kind: &'static str) -> RuntimeError {
    RuntimeError::Redefinition {
        name: name.to_string(),
        kind,
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}
