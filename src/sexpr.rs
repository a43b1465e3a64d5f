//! Surface expressions
//!
//! The reader that produces these trees lives outside this crate; expansion consumes
//! them as plain atoms and lists. The [`sx!`](crate::sx) macro builds them from
//! Rust tokens for tests and embedding.

use std::fmt;
use std::mem;
use std::slice;

/// An atom or an ordered list of expressions.
///
/// Cloning, comparing, displaying and dropping walk the tree with an explicit stack,
/// so nesting depth is limited by memory rather than the native stack.
#[derive(Debug)]
pub enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
}

impl SExpr {
    pub fn atom(name: impl Into<String>) -> Self {
        SExpr::Atom(name.into())
    }

    pub fn list(items: impl IntoIterator<Item = SExpr>) -> Self {
        SExpr::List(items.into_iter().collect())
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(name) => Some(name),
            SExpr::List(_) => None,
        }
    }

    /// Take the items of a list; an atom comes back unchanged as `Err`
    pub fn into_items(mut self) -> Result<Vec<SExpr>, SExpr> {
        if let SExpr::List(items) = &mut self {
            return Ok(mem::take(items));
        }
        Err(self)
    }
}

impl Clone for SExpr {
    fn clone(&self) -> Self {
        let items = match self {
            SExpr::Atom(name) => return SExpr::Atom(name.clone()),
            SExpr::List(items) => items,
        };
        // One entry per list being copied: its remaining source items and the copies so far
        let mut stack: Vec<(slice::Iter<'_, SExpr>, Vec<SExpr>)> = vec![(items.iter(), Vec::with_capacity(items.len()))];
        let mut copy = SExpr::List(Vec::new());
        while let Some((rest, copied)) = stack.last_mut() {
            match rest.next() {
                Some(SExpr::Atom(name)) => copied.push(SExpr::Atom(name.clone())),
                Some(SExpr::List(inner)) => stack.push((inner.iter(), Vec::with_capacity(inner.len()))),
                None => {
                    let done = SExpr::List(mem::take(copied));
                    stack.pop();
                    match stack.last_mut() {
                        Some((_, parent)) => parent.push(done),
                        None => copy = done,
                    }
                }
            }
        }
        copy
    }
}

impl Drop for SExpr {
    fn drop(&mut self) {
        let SExpr::List(items) = self else {
            return;
        };
        if items.iter().all(|item| item.as_atom().is_some()) {
            return;
        }
        let mut stack = mem::take(items);
        while let Some(mut expr) = stack.pop() {
            if let SExpr::List(inner) = &mut expr {
                stack.append(inner);
            }
        }
    }
}

impl PartialEq for SExpr {
    fn eq(&self, other: &SExpr) -> bool {
        let mut pending = vec![(self, other)];
        while let Some(pair) = pending.pop() {
            match pair {
                (SExpr::Atom(a), SExpr::Atom(b)) if a == b => {}
                (SExpr::List(a), SExpr::List(b)) if a.len() == b.len() => {
                    pending.extend(a.iter().zip(b.iter()));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for SExpr {}

impl From<&str> for SExpr {
    fn from(name: &str) -> Self {
        SExpr::Atom(name.to_string())
    }
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Open lists with their remaining items and whether a separator is due
        let mut open: Vec<(slice::Iter<'_, SExpr>, bool)> = Vec::new();
        let mut next = Some(self);
        loop {
            match next.take() {
                Some(SExpr::Atom(name)) => f.write_str(name)?,
                Some(SExpr::List(items)) => {
                    f.write_str("(")?;
                    open.push((items.iter(), false));
                }
                None => {}
            }
            let Some((rest, separate)) = open.last_mut() else {
                return Ok(());
            };
            match rest.next() {
                Some(item) => {
                    if *separate {
                        f.write_str(" ")?;
                    }
                    *separate = true;
                    next = Some(item);
                }
                None => {
                    f.write_str(")")?;
                    open.pop();
                }
            }
        }
    }
}

/// Build an [`SExpr`] from Rust tokens: `sx!((let x (nil) (length x)))`.
///
/// Each token tree becomes an atom via `stringify!`, each parenthesized group a list.
#[macro_export]
macro_rules! sx {
    (( $($inner:tt)* )) => {
        $crate::sexpr::SExpr::List(vec![$($crate::sx!($inner)),*])
    };
    ($atom:tt) => {
        $crate::sexpr::SExpr::Atom(stringify!($atom).to_string())
    };
}
