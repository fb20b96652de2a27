//! Traits implemented by every normalization pass.
use ripple_ir::Circuit;
use ripple_utils::RippleResult;

/// Gives passes a name and a one-line description for logging and
/// diagnostics.
pub trait Named {
    fn name() -> &'static str;
    fn description() -> &'static str;
}

/// A circuit-to-circuit rewrite.
pub trait Pass: Named {
    fn run(&mut self, circuit: Circuit) -> RippleResult<Circuit>;
}
