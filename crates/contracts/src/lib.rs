//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the capture tool.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Frame Model
//! - The simulator owns the frame clock; `frame` on a [`SensorPacket`] is the
//!   simulator-assigned frame index and is never renumbered
//! - `timestamp` is CARLA simulation time (seconds, f64), kept for diagnostics

mod blueprint;
mod error;
mod runtime;
mod sensor;
mod sensor_source;

pub use blueprint::*;
pub use error::*;
pub use runtime::*;
pub use sensor::*;
pub use sensor_source::{SensorDataCallback, SensorSource};
