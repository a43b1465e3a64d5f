//! Trampoline Types for Bounded Evaluation
//!
//! Every recursive routine in the runtime is written in continuation-passing style
//! against these types: a step receives the [`Yoke`] and a [`Cont`] to deliver its
//! result to, and returns an [`Outcome`] that only reports fatal errors.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::errors::RuntimeError;

use super::release::release;

/// Nested bounces allowed on the native stack before work is deferred.
/// Small enough to leave a wide margin under a 2 MiB thread stack in debug builds.
pub const DEFAULT_BOUNCE_LIMIT: usize = 256;

/// Result of one trampoline step; `Ok` means "continue", results travel through continuations
pub type Outcome = Result<(), RuntimeError>;

/// Deferred work waiting in the yoke's queue
pub type Thunk = Box<dyn FnOnce(&mut Yoke) -> Outcome>;

/// Continuation receiving a result of type `T`.
///
/// Called at most once through [`Cont::call`]. A continuation dropped without being
/// called goes through the release stack, so abandoning a long chain is iterative.
pub struct Cont<T: 'static>(Option<Box<dyn FnOnce(&mut Yoke, T) -> Outcome>>);

impl<T: 'static> Cont<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&mut Yoke, T) -> Outcome + 'static,
    {
        Cont(Some(Box::new(f)))
    }

    /// Run the continuation on the current stack
    pub fn call(mut self, yoke: &mut Yoke, value: T) -> Outcome {
        match self.0.take() {
            Some(f) => f(yoke, value),
            None => Err(RuntimeError::UnexpectedShape("continuation already consumed".to_string())),
        }
    }
}

impl<T: 'static> Drop for Cont<T> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            release(f);
        }
    }
}

/// Caller-owned state riding along with a bounded run.
///
/// The only hook is cancellation, polled at every bounce.
pub trait Rider {
    fn cancelled(&self) -> bool {
        false
    }
}

impl Rider for () {}

/// Shareable cancellation flag usable as a rider
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Rider for CancelFlag {
    fn cancelled(&self) -> bool {
        self.is_cancelled()
    }
}

/// Counters describing how a bounded run used the stack and the queue
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct YokeStats {
    /// Total bounce calls
    pub bounces: u64,
    /// Bounces that were deferred to the driver loop
    pub deferrals: u64,
    /// Deepest direct nesting observed
    pub max_depth: usize,
}

/// The execution token threaded through every bounded routine
pub struct Yoke {
    pub(super) rider: Box<dyn Rider>,
    pub(super) depth: usize,
    pub(super) limit: usize,
    pub(super) pending: VecDeque<Thunk>,
    pub(super) stats: YokeStats,
}
