//! metatag - Tagged-Value Runtime
//!
//! This library provides a small, extensible runtime of dynamically tagged values
//! with user-defined tags, per-tag method dispatch, and macro expansion.
//!
//! # Architecture
//!
//! Evaluation has two phases:
//!
//! 1. **Expansion** (`backend::expand`)
//!    - Consumes `SExpr` surface trees (`sexpr` module)
//!    - Runs macros (`fn`, `let`, `list`, `do`, and user macros)
//!    - Produces closed `Binding`s: every free name inside a function literal is
//!      replaced by a positional capture
//!
//! 2. **Interpretation** (`backend::interpret`)
//!    - Evaluates a binding against an immutable captured list
//!    - Dispatches every call form through the variadic `call` method
//!
//! Both phases, and every built-in method, are written in continuation-passing style
//! on a trampoline (`backend::trampoline`) so the native stack stays bounded however
//! deep the input nests.
//!
//! # Example
//!
//! ```rust
//! use metatag::backend::{Runtime, Value};
//! use metatag::sx;
//!
//! let runtime = Runtime::new().unwrap();
//! let value = runtime
//!     .eval(&sx!((let two (succ (succ (zero))) (plus two two))))
//!     .unwrap();
//! assert_eq!(value, Value::nat(4));
//! ```

pub mod backend;
pub mod sexpr;

pub use backend::{Binding, Fault, Registry, Runtime, RuntimeConfig, RuntimeError, Value};
pub use sexpr::SExpr;
