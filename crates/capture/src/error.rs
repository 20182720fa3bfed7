//! Capture error types

use actor_factory::ActorFactoryError;
use contracts::{ActorId, ActorRole};
use dispatcher::DispatcherError;
use thiserror::Error;

use crate::phase::CapturePhase;

/// Capture-specific errors
///
/// Interruption is not an error: an interrupted run returns `Ok` with an
/// `Interrupted` outcome.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Output root not configured
    #[error("no output directory configured (set --out or [capture].output_dir)")]
    MissingOutputDir,

    /// Output directories or writers
    #[error(transparent)]
    Output(#[from] DispatcherError),

    /// Simulator connection, spawn or query errors
    #[error(transparent)]
    Simulator(#[from] ActorFactoryError),

    /// Setup reported success but an actor is missing from the registry
    #[error("capture rig incomplete: no {role} registered")]
    MissingActor { role: ActorRole },

    /// Vehicle died between spawn and listen
    #[error("vehicle {actor_id} is no longer alive, sensors not started")]
    VehicleNotAlive { actor_id: ActorId },

    /// Lifecycle transition not allowed
    #[error("invalid capture phase transition {from} -> {to}")]
    InvalidTransition { from: CapturePhase, to: CapturePhase },
}

/// Result alias
pub type Result<T> = std::result::Result<T, CaptureError>;
