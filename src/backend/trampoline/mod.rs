//! Trampoline for stack-bounded continuation-passing evaluation
//!
//! Module structure:
//! - `types`: Yoke, Rider, continuation aliases
//! - `engine`: bounce, resume and the `run_bounded` driver loop
//! - `sequence`: bounded map and fold over vectors
//! - `release`: iterative dropping of abandoned continuation chains

mod engine;
mod release;
mod sequence;
mod types;

pub use engine::run_bounded;
pub(crate) use release::release;
pub use sequence::{fold_bounded, map_bounded, FoldStep, Step};
pub use types::{CancelFlag, Cont, Outcome, Rider, Thunk, Yoke, YokeStats, DEFAULT_BOUNCE_LIMIT};
