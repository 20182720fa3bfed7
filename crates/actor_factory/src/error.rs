//! Actor Factory error types

use contracts::{ActorId, ContractError, SensorKind};
use thiserror::Error;

/// Actor Factory specific error
#[derive(Debug, Error)]
pub enum ActorFactoryError {
    /// CARLA connection error (unreachable or timed out)
    #[error("failed to connect to CARLA at {host}:{port}: {message}")]
    ConnectionFailed {
        host: String,
        port: u16,
        message: String,
    },

    /// Operation attempted before `connect`
    #[error("not connected to CARLA server")]
    NotConnected,

    /// Blueprint lookup returned nothing
    #[error("template not found: '{blueprint}'")]
    TemplateNotFound { blueprint: String },

    /// Map has no spawn points
    #[error("map provides no spawn points")]
    NoSpawnPoints,

    /// Non-fatal spawn returned no actor
    #[error("failed to spawn ego vehicle '{blueprint}' (spawn point occupied?)")]
    SpawnPointOccupied { blueprint: String },

    /// Vehicle spawn error
    #[error("failed to spawn vehicle '{blueprint}': {message}")]
    VehicleSpawnFailed { blueprint: String, message: String },

    /// Sensor spawn/attach error
    #[error("failed to attach sensor '{blueprint}' to vehicle {parent_id}: {message}")]
    SensorSpawnFailed {
        blueprint: String,
        parent_id: ActorId,
        message: String,
    },

    /// Actor handle unknown to the client
    #[error("actor {actor_id} not found")]
    ActorNotFound { actor_id: ActorId },

    /// Destroy error
    #[error("failed to destroy actor {actor_id}: {message}")]
    DestroyFailed { actor_id: ActorId, message: String },

    /// No data source for a registered sensor actor
    #[error("sensor source unavailable for {kind} actor {actor_id}")]
    SensorSourceUnavailable { kind: SensorKind, actor_id: ActorId },

    /// Frame counter query error
    #[error("failed to read world snapshot: {message}")]
    Snapshot { message: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl ActorFactoryError {
    /// Create connection error
    pub fn connection(host: impl Into<String>, port: u16, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            host: host.into(),
            port,
            message: message.into(),
        }
    }

    /// Create template-not-found error
    pub fn template_not_found(blueprint: impl Into<String>) -> Self {
        Self::TemplateNotFound {
            blueprint: blueprint.into(),
        }
    }

    /// Create sensor spawn error
    pub fn sensor_spawn(
        blueprint: impl Into<String>,
        parent_id: ActorId,
        message: impl Into<String>,
    ) -> Self {
        Self::SensorSpawnFailed {
            blueprint: blueprint.into(),
            parent_id,
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, ActorFactoryError>;
