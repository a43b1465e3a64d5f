//! Core bindings produced by macro expansion
//!
//! A [`Binding`] is closed: every free name inside a function literal has been turned
//! into a positional `Param` read from the closure's captured list, so interpretation
//! never consults a lexical environment.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::backend::symbol::Symbol;

/// Closed core expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Top-level registry name
    Main(Symbol),
    /// Apply `op` to `args` through the `call` method
    Call {
        op: Arc<Binding>,
        args: Vec<Arc<Binding>>,
    },
    /// Read position `index` of the captured list
    Param(usize),
    /// Function literal. Each `Some` capture is evaluated when the literal is; each
    /// `None` slot is filled with the argument at call time.
    Fn {
        captures: Vec<Option<Arc<Binding>>>,
        body: Arc<Binding>,
    },
}

impl Binding {
    pub fn main(name: impl Into<Symbol>) -> Arc<Binding> {
        Arc::new(Binding::Main(name.into()))
    }

    pub fn param(index: usize) -> Arc<Binding> {
        Arc::new(Binding::Param(index))
    }

    pub fn call(op: Arc<Binding>, args: Vec<Arc<Binding>>) -> Arc<Binding> {
        Arc::new(Binding::Call { op, args })
    }

    pub fn function(captures: Vec<Option<Arc<Binding>>>, body: Arc<Binding>) -> Arc<Binding> {
        Arc::new(Binding::Fn { captures, body })
    }

    /// Move every child into `out`, leaving a shared placeholder behind.
    fn detach_children(&mut self, out: &mut Vec<Arc<Binding>>) {
        match self {
            Binding::Main(_) | Binding::Param(_) => {}
            Binding::Call { op, args } => {
                out.push(std::mem::replace(op, placeholder()));
                out.append(args);
            }
            Binding::Fn { captures, body } => {
                out.push(std::mem::replace(body, placeholder()));
                out.extend(captures.drain(..).flatten());
            }
        }
    }
}

fn placeholder() -> Arc<Binding> {
    static PLACEHOLDER: OnceLock<Arc<Binding>> = OnceLock::new();
    Arc::clone(PLACEHOLDER.get_or_init(|| Arc::new(Binding::Param(0))))
}

impl Drop for Binding {
    // `list` over thousands of elements nests `Call` that deep
    fn drop(&mut self) {
        let mut stack = Vec::new();
        self.detach_children(&mut stack);
        while let Some(child) = stack.pop() {
            if let Ok(mut binding) = Arc::try_unwrap(child) {
                binding.detach_children(&mut stack);
            }
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Main(name) => write!(f, "{}", name),
            Binding::Param(index) => write!(f, "${}", index),
            Binding::Call { op, args } => {
                write!(f, "({}", op)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                f.write_str(")")
            }
            Binding::Fn { captures, body } => {
                f.write_str("(fn [")?;
                for (i, capture) in captures.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    match capture {
                        Some(binding) => write!(f, "{}", binding)?,
                        None => f.write_str("_")?,
                    }
                }
                write!(f, "] {})", body)
            }
        }
    }
}

/// One name reference resolved inside a function literal.
///
/// `local` is `None` when the reference is the function's own parameter and
/// `Some(binding)` when it was resolved in the enclosing scope; `outer` holds the frames
/// that resolution produced in the enclosing scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFrame {
    pub local: Option<Arc<Binding>>,
    pub outer: Vec<CaptureFrame>,
}

impl CaptureFrame {
    /// Frame for a reference to the function's own parameter
    pub fn parameter() -> Self {
        CaptureFrame {
            local: None,
            outer: Vec::new(),
        }
    }

    /// Frame for a name resolved to `binding` in the enclosing scope
    pub fn captured(binding: Arc<Binding>, outer: Vec<CaptureFrame>) -> Self {
        CaptureFrame {
            local: Some(binding),
            outer,
        }
    }
}

impl Drop for CaptureFrame {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.outer);
        while let Some(mut frame) = stack.pop() {
            stack.append(&mut frame.outer);
        }
    }
}
