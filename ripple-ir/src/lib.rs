//! In-memory representation of the low register-transfer IR consumed by the
//! Verilog back end.
//!
//! Circuits arrive here already normalized by the front half of the
//! pipeline: ports carry ground types only, aggregates have been lowered,
//! readwrite memory ports are split, and memory latencies are fixed at
//! read 0 / write 1. The types in this crate are plain sum types;
//! exhaustive matching is the intended dispatch.

mod circuit;
mod expression;
mod printer;
mod statement;
mod types;

pub use circuit::{Circuit, Module};
pub use expression::{Expr, PrimOp, RefKind};
pub use printer::{Printer, escape_string};
pub use ripple_utils::{GetName, Id};
pub use statement::{Memory, Stmt};
pub use types::{Direction, Param, ParamValue, Port, Type};
