//! Iterative release of nested continuation state
//!
//! A continuation owns the continuation it resumes, so a pending computation is a
//! chain of boxed closures as long as the logical recursion. Dropping such a chain
//! without running it (cancellation, a fatal error, an abandoned branch) would
//! recurse once per link. Instead, every [`Cont`](super::Cont) and every other owner
//! of chain links hands its contents to [`release`], which keeps a per-thread stack
//! and drops one entry at a time: anything released while an entry is being dropped
//! is pushed onto the stack instead of dropped in place.

use std::any::Any;
use std::cell::RefCell;

#[derive(Default)]
struct ReleaseStack {
    draining: bool,
    pending: Vec<Box<dyn Any>>,
}

thread_local! {
    static RELEASE: RefCell<ReleaseStack> = RefCell::new(ReleaseStack::default());
}

/// Drop `value` without letting nested releases grow the native stack.
pub(crate) fn release<T: 'static>(value: T) {
    let mut value: Option<Box<dyn Any>> = Some(Box::new(value));
    let outermost = RELEASE.try_with(|cell| {
        let mut stack = cell.borrow_mut();
        if stack.draining {
            stack.pending.extend(value.take());
            false
        } else {
            stack.draining = true;
            true
        }
    });
    match outermost {
        Ok(true) => {}
        // Either an outer call is draining and now owns the value, or the thread is
        // shutting down and the value is dropped in place
        Ok(false) | Err(_) => return,
    }

    drop(value);
    loop {
        let next = RELEASE.with(|cell| cell.borrow_mut().pending.pop());
        match next {
            Some(entry) => drop(entry),
            None => break,
        }
    }
    RELEASE.with(|cell| cell.borrow_mut().draining = false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    /// A linked chain whose links release their successor
    struct Link {
        next: Option<Box<Link>>,
        dropped: Rc<RefCell<usize>>,
    }

    impl Drop for Link {
        fn drop(&mut self) {
            *self.dropped.borrow_mut() += 1;
            if let Some(next) = self.next.take() {
                release(next);
            }
        }
    }

    #[test]
    fn test_release_long_chain() {
        let dropped = Rc::new(RefCell::new(0));
        let mut chain: Option<Box<Link>> = None;
        for _ in 0..200_000 {
            chain = Some(Box::new(Link {
                next: chain.take(),
                dropped: Rc::clone(&dropped),
            }));
        }
        release(chain);
        assert_eq!(*dropped.borrow(), 200_000);
        assert!(RELEASE.with(|cell| !cell.borrow().draining));
    }
}
