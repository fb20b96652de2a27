//! Passes that normalize circuits ahead of Verilog emission.
mod modulus_cleanup;
mod prep;
mod rename_keywords;
mod width_wrap;

pub use modulus_cleanup::ModulusCleanup;
pub use prep::Prep;
pub use rename_keywords::RenameKeywords;
pub use width_wrap::WidthWrap;
