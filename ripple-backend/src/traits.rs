//! Interface for a ripple backend.
use crate::{Artifact, EmitRequest};
use ripple_ir::Circuit;
use ripple_utils::{OutputFile, RippleResult};

/// A backend for the compiler.
pub trait Backend {
    /// The name of this backend.
    fn name(&self) -> &'static str;
    /// Validate this circuit for emitting using this backend. Returns an
    /// Err(..) if the circuit has unexpected constructs.
    fn validate(circuit: &Circuit) -> RippleResult<()>;
    /// Transforms the circuit into a formatted string and writes it to
    /// `file`.
    fn emit(circuit: &Circuit, file: &OutputFile) -> RippleResult<()>;
    /// Produce the artifacts named by `requests`, in request order.
    fn artifacts(
        circuit: &Circuit,
        requests: &[EmitRequest],
    ) -> RippleResult<Vec<Artifact>>;
    /// Convenience function to validate and emit the circuit.
    fn run(&self, circuit: &Circuit, file: OutputFile) -> RippleResult<()> {
        Self::validate(circuit)?;
        Self::emit(circuit, &file)
    }
}
