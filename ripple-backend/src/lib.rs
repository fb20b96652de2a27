//! Backends for the ripple compiler.
mod artifact;
mod lir;
mod traits;
mod verilog;

pub use artifact::{Artifact, ArtifactKind, EmitRequest};
pub use lir::LirBackend;
pub use traits::Backend;
pub use verilog::VerilogBackend;
