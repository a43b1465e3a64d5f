//! Tagged values
//!
//! A [`Value`] is an immutable `(tag, fields, payload)` triple behind an `Arc`, so
//! clones are O(1) and values are freely shared between captured lists, registry
//! entries and results. Constructor tags carry fields; primitive tags (`string`,
//! `fn`, `error`) carry a payload instead.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use super::tags;
use crate::backend::errors::{Fault, RuntimeError};
use crate::backend::registry::Registry;
use crate::backend::symbol::Symbol;
use crate::backend::trampoline::{Cont, Outcome, Yoke};

/// Field storage; most tags have at most two fields
pub type Fields = SmallVec<[Value; 2]>;

/// Something that can be applied to arguments under the trampoline.
///
/// Closures produced by the interpreter, method references and tag constructors all
/// implement this and travel inside `fn`-tagged values.
pub trait Callable: Send + Sync {
    /// Name used when the value is displayed
    fn name(&self) -> &str;

    /// Apply to `args` and deliver exactly one result to `k`
    fn invoke(&self, registry: &Registry, yoke: &mut Yoke, args: Vec<Value>, k: Cont<Value>) -> Outcome;

    /// Whether error values among the arguments are passed in rather than returned
    /// in place of the call
    fn accepts_errors(&self, _registry: &Registry) -> bool {
        false
    }
}

/// Opaque data attached to primitive-tagged values
#[derive(Clone)]
pub enum Payload {
    None,
    Text(Arc<str>),
    Callable(Arc<dyn Callable>),
    Error(Fault),
}

impl Payload {
    fn same_as(&self, other: &Payload) -> bool {
        match (self, other) {
            (Payload::None, Payload::None) => true,
            (Payload::Text(a), Payload::Text(b)) => a == b,
            // Callables have identity, not structure
            (Payload::Callable(a), Payload::Callable(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Payload::Error(a), Payload::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::None => write!(f, "None"),
            Payload::Text(text) => write!(f, "Text({:?})", text),
            Payload::Callable(c) => write!(f, "Callable({})", c.name()),
            Payload::Error(fault) => write!(f, "Error({:?})", fault),
        }
    }
}

struct ValueData {
    tag: Symbol,
    fields: Fields,
    payload: Payload,
}

impl Drop for ValueData {
    // Long cons and succ chains would otherwise drop one native frame per link
    fn drop(&mut self) {
        if self.fields.is_empty() {
            return;
        }
        let mut stack: Vec<Value> = self.fields.drain(..).collect();
        while let Some(value) = stack.pop() {
            if let Ok(mut data) = Arc::try_unwrap(value.0) {
                stack.extend(data.fields.drain(..));
            }
        }
    }
}

/// An immutable tagged value
#[derive(Clone)]
pub struct Value(Arc<ValueData>);

impl Value {
    /// Build a value without consulting the registry.
    ///
    /// Only for primitive tags and trusted internal callers; user-facing construction
    /// goes through [`Registry::construct`], which checks the field count.
    pub fn new(tag: impl Into<Symbol>, fields: impl IntoIterator<Item = Value>, payload: Payload) -> Self {
        Value(Arc::new(ValueData {
            tag: tag.into(),
            fields: fields.into_iter().collect(),
            payload,
        }))
    }

    pub fn string(text: impl Into<Arc<str>>) -> Self {
        Value::new(tags::STRING, [], Payload::Text(text.into()))
    }

    pub fn error(fault: Fault) -> Self {
        Value::new(tags::ERROR, [], Payload::Error(fault))
    }

    pub fn callable(callable: Arc<dyn Callable>) -> Self {
        Value::new(tags::FN, [], Payload::Callable(callable))
    }

    #[inline]
    pub fn tag(&self) -> &Symbol {
        &self.0.tag
    }

    #[inline]
    pub fn fields(&self) -> &[Value] {
        &self.0.fields
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.0.payload
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.0.payload, Payload::Error(_))
    }

    pub fn fault(&self) -> Option<&Fault> {
        match &self.0.payload {
            Payload::Error(fault) => Some(fault),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.0.payload {
            Payload::Text(text) => Some(text.as_ref()),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Arc<dyn Callable>> {
        match &self.0.payload {
            Payload::Callable(c) => Some(c),
            _ => None,
        }
    }

    /// The `index`-th field
    pub fn nth(&self, index: usize) -> Result<Value, RuntimeError> {
        self.0
            .fields
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::FieldIndexOutOfRange {
                tag: self.0.tag.to_string(),
                index,
                len: self.0.fields.len(),
            })
    }

    /// True when both handles share one allocation
    #[inline]
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Build a `cons`/`nil` chain holding `items` in order
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        let items: Vec<Value> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(Value::new(tags::NIL, [], Payload::None), |tail, head| {
                Value::new(tags::CONS, [head, tail], Payload::None)
            })
    }

    /// Elements of a proper `cons`/`nil` chain, or `None` for anything else
    pub fn list_items(&self) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        let mut cursor = self;
        loop {
            match cursor.0.tag.as_str() {
                tags::NIL if cursor.0.fields.is_empty() => return Some(items),
                tags::CONS if cursor.0.fields.len() == 2 => {
                    items.push(cursor.0.fields[0].clone());
                    cursor = &cursor.0.fields[1];
                }
                _ => return None,
            }
        }
    }

    /// Peano numeral: `n` applications of `succ` to `zero`
    pub fn nat(n: u64) -> Self {
        (0..n).fold(Value::new(tags::ZERO, [], Payload::None), |pred, _| {
            Value::new(tags::SUCC, [pred], Payload::None)
        })
    }

    /// Count of a well-formed `succ`/`zero` chain
    pub fn nat_count(&self) -> Option<u64> {
        let mut count = 0;
        let mut cursor = self;
        loop {
            match cursor.0.tag.as_str() {
                tags::ZERO if cursor.0.fields.is_empty() => return Some(count),
                tags::SUCC if cursor.0.fields.len() == 1 => {
                    count += 1;
                    cursor = &cursor.0.fields[0];
                }
                _ => return None,
            }
        }
    }
}

/// Free-function form of [`Value::nth`]
pub fn nth(value: &Value, index: usize) -> Result<Value, RuntimeError> {
    value.nth(index)
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if a.ptr_eq(b) {
                continue;
            }
            if a.0.tag != b.0.tag
                || a.0.fields.len() != b.0.fields.len()
                || !a.0.payload.same_as(&b.0.payload)
            {
                return false;
            }
            pending.extend(a.0.fields.iter().zip(b.0.fields.iter()));
        }
        true
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.payload {
            Payload::Text(text) => return write!(f, "{:?}", text),
            Payload::Callable(c) => return write!(f, "<fn {}>", c.name()),
            Payload::Error(fault) => return write!(f, "(error {} {:?})", fault.kind, fault.message),
            Payload::None => {}
        }

        if self.0.tag == tags::CONS {
            if let Some(items) = self.list_items() {
                f.write_str("(list")?;
                for item in &items {
                    write!(f, " {}", item)?;
                }
                return f.write_str(")");
            }
        }
        if self.0.tag == tags::SUCC {
            if let Some(n) = self.nat_count() {
                return write!(f, "(nat {})", n);
            }
        }

        if self.0.fields.is_empty() {
            return write!(f, "{}", self.0.tag);
        }
        write!(f, "({}", self.0.tag)?;
        for field in &self.0.fields {
            write!(f, " {}", field)?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
