//! Error types for expansion and interpretation.
//!
//! Errors come in two tiers:
//!
//! - [`Fault`]: an expected condition (unbound name, arity mismatch, missing
//!   implementation, malformed macro input). Faults become `error`-tagged values so
//!   guest code can inspect them and the interpreter keeps running.
//! - [`RuntimeError`]: an internal invariant violation. It is returned as `Err` from
//!   every trampoline step and aborts the surrounding `run_bounded`.

use std::fmt;

use super::models::Value;

/// Classification of recoverable faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A name with no definition of the requested kind
    UnboundName,
    /// Wrong number of fields for a tag or arguments for a method or function
    ArityMismatch,
    /// A method has no implementation for the tag of its first argument
    NoImplementation,
    /// A macro was given input it cannot expand
    MalformedInput,
    /// A value or expansion does not have the shape an operation expects
    WrongShape,
    /// A top-level expansion left free-variable captures unresolved
    UnexpectedCaptures,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnboundName => "UnboundName",
            ErrorKind::ArityMismatch => "ArityMismatch",
            ErrorKind::NoImplementation => "NoImplementation",
            ErrorKind::MalformedInput => "MalformedInput",
            ErrorKind::WrongShape => "WrongShape",
            ErrorKind::UnexpectedCaptures => "UnexpectedCaptures",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable fault: a kind plus a human-readable message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: ErrorKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Fault {
            kind,
            message: message.into(),
        }
    }

    pub fn unbound(name: &str) -> Self {
        Fault::new(ErrorKind::UnboundName, format!("unbound name `{}`", name))
    }

    pub fn arity(what: &str, expected: usize, got: usize) -> Self {
        Fault::new(
            ErrorKind::ArityMismatch,
            format!(
                "{} expects {} argument{}, got {}",
                what,
                expected,
                if expected == 1 { "" } else { "s" },
                got
            ),
        )
    }

    pub fn no_implementation(method: &str, tag: &str) -> Self {
        Fault::new(
            ErrorKind::NoImplementation,
            format!("method `{}` has no implementation for tag `{}`", method, tag),
        )
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Fault::new(ErrorKind::MalformedInput, message)
    }

    /// Wrap this fault as an `error`-tagged value
    pub fn into_value(self) -> Value {
        Value::error(self)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Fault {}

/// Fatal runtime errors: definition-table invariants, malformed bindings, and
/// trampoline protocol violations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A name already holds a definition of this kind (or a conflicting one)
    Redefinition { name: String, kind: &'static str },
    /// `set_implementation` on a name that is not a method
    NotAMethod(String),
    /// `set_implementation` for a name that is not a tag
    NotATag(String),
    /// A `Param` binding read past the end of the supplied capture list
    CaptureIndexOutOfRange { index: usize, len: usize },
    /// `nth` past the end of a value's fields
    FieldIndexOutOfRange { tag: String, index: usize, len: usize },
    /// The trampoline queue drained without a final result
    NoFinalResult,
    /// A second final result was delivered to a bounded run
    MultipleFinalResults,
    /// Internal plumbing received a value of the wrong shape
    UnexpectedShape(String),
    /// A resolver was asked to resolve at a capture count it never reached
    CaptureLedger { expected: usize, found: usize },
    /// The rider requested cancellation
    Cancelled,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Redefinition { name, kind } => {
                write!(f, "`{}` cannot be redefined as a {}", name, kind)
            }
            RuntimeError::NotAMethod(name) => write!(f, "`{}` is not a method", name),
            RuntimeError::NotATag(name) => write!(f, "`{}` is not a tag", name),
            RuntimeError::CaptureIndexOutOfRange { index, len } => write!(
                f,
                "capture index {} out of range for {} captured value{}",
                index,
                len,
                if *len == 1 { "" } else { "s" }
            ),
            RuntimeError::FieldIndexOutOfRange { tag, index, len } => write!(
                f,
                "field index {} out of range for `{}` with {} field{}",
                index,
                tag,
                len,
                if *len == 1 { "" } else { "s" }
            ),
            RuntimeError::NoFinalResult => write!(f, "trampoline finished without a result"),
            RuntimeError::MultipleFinalResults => {
                write!(f, "trampoline produced more than one result")
            }
            RuntimeError::UnexpectedShape(msg) => write!(f, "unexpected value shape: {}", msg),
            RuntimeError::CaptureLedger { expected, found } => write!(
                f,
                "capture count {} requested but only {} captures recorded",
                expected, found
            ),
            RuntimeError::Cancelled => write!(f, "evaluation cancelled"),
        }
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display() {
        let fault = Fault::arity("pair", 2, 3);
        assert_eq!(fault.kind, ErrorKind::ArityMismatch);
        assert_eq!(fault.to_string(), "ArityMismatch: pair expects 2 arguments, got 3");

        let fault = Fault::arity("closure", 1, 0);
        assert_eq!(fault.message, "closure expects 1 argument, got 0");
    }

    #[test]
    fn test_fault_into_value() {
        let value = Fault::unbound("nope").into_value();
        assert!(value.is_error());
        assert_eq!(value.fault().map(|f| f.kind), Some(ErrorKind::UnboundName));
    }

    #[test]
    fn test_runtime_error_display() {
        let err = RuntimeError::CaptureIndexOutOfRange { index: 3, len: 1 };
        assert_eq!(err.to_string(), "capture index 3 out of range for 1 captured value");

        let err = RuntimeError::Redefinition {
            name: "pair".to_string(),
            kind: "tag",
        };
        assert_eq!(err.to_string(), "`pair` cannot be redefined as a tag");
    }
}
