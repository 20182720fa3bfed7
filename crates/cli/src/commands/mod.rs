//! Command implementations.

mod run;
mod validate;

pub use run::run_capture;
pub use validate::run_validate;
