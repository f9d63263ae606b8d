//! Command implementations.

mod metadata;
mod run;
mod sensor;
mod validate;

pub use metadata::run_metadata;
pub use run::run_driver;
pub use validate::run_validate;
