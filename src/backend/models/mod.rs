pub mod binding;
pub mod value;

pub use binding::{Binding, CaptureFrame};
pub use value::{nth, Callable, Fields, Payload, Value};

/// Names of the tags created by bootstrap
pub mod tags {
    pub const NIL: &str = "nil";
    pub const CONS: &str = "cons";
    pub const ZERO: &str = "zero";
    pub const SUCC: &str = "succ";
    pub const STRING: &str = "string";
    pub const FN: &str = "fn";
    pub const ERROR: &str = "error";
}

/// Name of the method the interpreter dispatches every call form through
pub const CALL: &str = "call";
