//! Names for tags, definitions and bindings
//!
//! With the `symbol-interning` feature a `Symbol` is a lasso `Spur` resolved through a
//! process-wide `ThreadedRodeo`, so equality and hashing are integer operations. Without it a
//! `Symbol` owns an `Arc<str>`, which keeps cloning cheap for the values and bindings that
//! carry names around.

use std::fmt;
#[cfg(not(feature = "symbol-interning"))]
use std::sync::Arc;

#[cfg(feature = "symbol-interning")]
fn interner() -> &'static lasso::ThreadedRodeo {
    use std::sync::OnceLock;

    static INTERNER: OnceLock<lasso::ThreadedRodeo> = OnceLock::new();
    INTERNER.get_or_init(lasso::ThreadedRodeo::new)
}

#[cfg(feature = "symbol-interning")]
type Repr = lasso::Spur;

#[cfg(not(feature = "symbol-interning"))]
type Repr = Arc<str>;

/// A registry name or tag name
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Symbol(Repr);

impl Symbol {
    #[cfg(feature = "symbol-interning")]
    #[inline]
    pub fn new(name: &str) -> Self {
        Symbol(interner().get_or_intern(name))
    }

    #[cfg(not(feature = "symbol-interning"))]
    #[inline]
    pub fn new(name: &str) -> Self {
        Symbol(Arc::from(name))
    }

    #[cfg(feature = "symbol-interning")]
    #[inline]
    pub fn as_str(&self) -> &str {
        interner().resolve(&self.0)
    }

    #[cfg(not(feature = "symbol-interning"))]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Symbol {
    #[inline]
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

impl From<String> for Symbol {
    #[inline]
    fn from(name: String) -> Self {
        Symbol::new(&name)
    }
}

impl From<&Symbol> for Symbol {
    #[inline]
    fn from(name: &Symbol) -> Self {
        name.clone()
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
