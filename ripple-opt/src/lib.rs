//! Normalization passes that put a circuit into the form the Verilog
//! emitter consumes.
pub mod passes;
pub mod traversal;

pub use traversal::{Named, Pass};

use passes::{ModulusCleanup, Prep, RenameKeywords, WidthWrap};
use ripple_ir::Circuit;
use ripple_utils::RippleResult;

/// Run the lowering pipeline in its required order. Cleanup and wrap can
/// create nested primitive applications, so prep runs last to lift them.
pub fn prepare(circuit: Circuit) -> RippleResult<Circuit> {
    let circuit = run_pass::<ModulusCleanup>(circuit)?;
    let circuit = run_pass::<WidthWrap>(circuit)?;
    let circuit = run_pass::<RenameKeywords>(circuit)?;
    run_pass::<Prep>(circuit)
}

fn run_pass<P: Pass + Default>(circuit: Circuit) -> RippleResult<Circuit> {
    log::debug!("running pass `{}`", P::name());
    P::default().run(circuit)
}
