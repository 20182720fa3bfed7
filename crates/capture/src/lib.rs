//! # Capture
//!
//! Lifecycle controller for one capture run.
//!
//! Responsibilities:
//! - Prepare output directories and connect
//! - Spawn the rig, start both sensors, enable autopilot
//! - Poll the simulator frame counter until the target frame or an interrupt
//! - Drain: stop sensors, disable autopilot, flush writers, destroy actors
//!
//! ## Phases
//!
//! `SETUP -> LISTENING -> DRAINING -> DONE`, see [`CapturePhase`].

pub mod config;
pub mod controller;
pub mod error;
pub mod phase;
pub mod stats;

pub use config::CaptureConfig;
pub use controller::CaptureController;
pub use error::{CaptureError, Result};
pub use phase::CapturePhase;
pub use stats::{CaptureOutcome, CaptureStats};
