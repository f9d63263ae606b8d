//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the driver.
//! Business crates depend on this crate only, never on each other in reverse.
//!
//! ## Time Model
//! - Sensor timestamps are nanoseconds (u64) on the sensor clock
//! - Published messages carry the same instant split into `{sec, nanosec}`
//! - `Header::seq` is the driver's frame counter, used for ordering/diagnostics

mod error;
mod metadata;
mod parameters;
mod sensor;
mod sensor_source;
mod sink;

pub use error::*;
pub use metadata::*;
pub use parameters::*;
pub use sensor::*;
pub use sensor_source::{BoxFuture, SensorInterface, SourceStats};
pub use sink::*;
