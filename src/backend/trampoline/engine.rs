//! Trampoline Engine - Bounded Execution
//!
//! `bounce` runs a continuation directly while the yoke is shallow and defers it to a
//! FIFO queue once `limit` bounces are nested. `run_bounded` drains that queue one
//! thunk at a time with the depth reset to zero, so native stack usage stays bounded
//! no matter how deep the logical recursion goes.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::backend::errors::RuntimeError;

use super::types::{Cont, Outcome, Rider, Yoke, YokeStats};

impl Yoke {
    pub(crate) fn new(rider: Box<dyn Rider>, limit: usize) -> Self {
        Yoke {
            rider,
            depth: 0,
            // A zero limit would defer every step forever without progress on the stack
            limit: limit.max(1),
            pending: VecDeque::new(),
            stats: YokeStats::default(),
        }
    }

    /// Current direct nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn stats(&self) -> YokeStats {
        self.stats
    }

    pub fn rider(&self) -> &dyn Rider {
        self.rider.as_ref()
    }

    /// Run `then` now if the yoke is below its limit, otherwise queue it for the driver.
    ///
    /// Callers must treat the bounce as their last action: after a deferral control
    /// returns here immediately and the work happens later.
    pub fn bounce<F>(&mut self, then: F) -> Outcome
    where
        F: FnOnce(&mut Yoke) -> Outcome + 'static,
    {
        if self.rider.cancelled() {
            warn!(target: "metatag::backend::trampoline", bounces = self.stats.bounces, "bounded run cancelled");
            return Err(RuntimeError::Cancelled);
        }

        self.stats.bounces += 1;
        if self.depth < self.limit {
            self.depth += 1;
            self.stats.max_depth = self.stats.max_depth.max(self.depth);
            let outcome = then(self);
            self.depth -= 1;
            outcome
        } else {
            self.stats.deferrals += 1;
            trace!(target: "metatag::backend::trampoline", depth = self.depth, queued = self.pending.len() + 1, "deferring continuation");
            self.pending.push_back(Box::new(then));
            Ok(())
        }
    }

    /// Deliver `value` to `k` through a bounce.
    ///
    /// Results flowing back up a long chain of continuations would otherwise nest one
    /// native frame per link.
    pub fn resume<T: 'static>(&mut self, k: Cont<T>, value: T) -> Outcome {
        self.bounce(move |yoke: &mut Yoke| k.call(yoke, value))
    }
}

/// Run `program` to completion under a fresh yoke.
///
/// `program` receives the yoke and a `finish` continuation that must be called exactly
/// once with the final result. Draining the queue without a result is
/// [`RuntimeError::NoFinalResult`]; a second result is
/// [`RuntimeError::MultipleFinalResults`]. Any fatal error from a step aborts the run.
pub fn run_bounded<T, R, P>(rider: R, limit: usize, program: P) -> Result<T, RuntimeError>
where
    T: 'static,
    R: Rider + 'static,
    P: FnOnce(&mut Yoke, Cont<T>) -> Outcome + 'static,
{
    let slot: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    let finish: Cont<T> = Cont::new(move |_yoke: &mut Yoke, value: T| {
        let mut sink = sink.borrow_mut();
        if sink.is_some() {
            return Err(RuntimeError::MultipleFinalResults);
        }
        *sink = Some(value);
        Ok(())
    });

    let mut yoke = Yoke::new(Box::new(rider), limit);
    yoke.pending
        .push_back(Box::new(move |yoke: &mut Yoke| program(yoke, finish)));

    // Main driver loop
    while let Some(thunk) = yoke.pending.pop_front() {
        yoke.depth = 0;
        thunk(&mut yoke)?;
    }

    trace!(target: "metatag::backend::trampoline", stats = ?yoke.stats, "bounded run drained");
    let result = slot.borrow_mut().take();
    result.ok_or(RuntimeError::NoFinalResult)
}
