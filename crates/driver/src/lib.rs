//! # Driver
//!
//! Lifecycle-managed OS-1 driver.
//!
//! Responsibilities:
//! - Guard configure / activate / deactivate / cleanup / shutdown with a
//!   transition table, parking failures in ErrorProcessing
//! - Run the periodic cycle (poll → assemble → process → publish) while Active
//! - Serve `reset` and `get_metadata` concurrently with the cycle
//!
//! ## Usage Example
//!
//! ```ignore
//! use driver::LifecycleController;
//!
//! let mut controller = LifecycleController::builder(parameters)
//!     .sinks(blueprint.sinks)
//!     .build();
//! controller.configure().await?;
//! controller.activate().await?;
//!
//! let services = controller.services();
//! services.reset().await?;
//! let metadata = services.get_metadata();
//! ```

mod controller;
mod cycle;
mod error;
mod metrics;
mod pipeline;
mod services;
mod state;

pub use controller::{
    DispatcherFactory, DriverOptions, LifecycleController, LifecycleControllerBuilder,
    SensorFactory,
};
pub use error::{DriverError, Result};
pub use metrics::{CycleStats, DriverMetrics, DriverStats};
pub use services::ServiceHandle;
pub use state::{LifecycleState, Transition};
