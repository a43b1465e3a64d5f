// Backend for the tagged-value runtime
//
// This module provides the two-phase pipeline:
// - `expand`: SExpr → closed Binding, threading capture frames through `fn` literals
// - `interpret`: Binding → Value, dispatching every call form through the `call` method
// Both phases run in continuation-passing style on the `trampoline`.

pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod expand;
pub mod interpret;
pub mod models;
pub mod registry;
pub mod runtime;
pub mod symbol;
pub mod trampoline;

pub use bootstrap::bootstrap;
pub use config::{ConfigError, RuntimeConfig, BOUNCE_LIMIT_ENV};
pub use errors::{ErrorKind, Fault, RuntimeError};
pub use expand::{expand_seq, expand_to_binding, expand_top, ExpandResult, ExpandedSeq, Expansion, Macro, Resolver};
pub use interpret::{interpret_in, Closure};
pub use models::*;
pub use registry::{DirectImpl, MethodImpl, Registry, StepImpl};
pub use runtime::Runtime;
pub use symbol::Symbol;
pub use trampoline::{
    fold_bounded, map_bounded, run_bounded, CancelFlag, Cont, FoldStep, Outcome, Rider, Step, Yoke, YokeStats,
    DEFAULT_BOUNCE_LIMIT,
};
