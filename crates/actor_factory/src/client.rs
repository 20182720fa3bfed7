//! CARLA client abstraction
//!
//! Defines traits for interacting with CARLA, supporting real implementation and mock testing.
//! The surface mirrors the subset of the CARLA Python/C++ client the capture tool consumes:
//! catalog lookup, spawn points, spawn/attach, autopilot, liveness, destroy and the
//! world snapshot frame counter.

use std::future::Future;
use std::time::Duration;

use contracts::{ActorId, ActorTemplate, SensorKind, SensorSource, Transform};

use crate::error::Result;

/// CARLA client trait
///
/// Abstracts CARLA core operations for testing and future implementation replacement.
/// Supports unified interface for real CARLA client and Mock client.
pub trait CarlaClient: Send + Sync {
    /// Connect to CARLA server and bind the current world
    ///
    /// Fails with `ConnectionFailed` if the server does not answer within `timeout`.
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Catalog filter, e.g. "vehicle.tesla.model3"
    ///
    /// Returns matching blueprints in catalog order.
    fn filter_blueprints(
        &self,
        pattern: &str,
    ) -> impl Future<Output = Result<Vec<ActorTemplate>>> + Send;

    /// Exact catalog lookup
    fn find_blueprint(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ActorTemplate>>> + Send;

    /// Map spawn points, in the map's fixed order
    fn spawn_points(&self) -> impl Future<Output = Result<Vec<Transform>>> + Send;

    /// Non-fatal spawn
    ///
    /// Returns `Ok(None)` when the simulator refuses the spawn (e.g. collision at
    /// the spawn point) instead of raising.
    fn try_spawn_actor(
        &self,
        template: &ActorTemplate,
        transform: Transform,
    ) -> impl Future<Output = Result<Option<ActorId>>> + Send;

    /// Spawn an actor attached to `parent`
    ///
    /// # Arguments
    /// * `template` - Blueprint with attributes already set
    /// * `transform` - Pose relative to parent actor
    /// * `parent_id` - Parent actor ID
    fn spawn_attached(
        &self,
        template: &ActorTemplate,
        transform: Transform,
        parent_id: ActorId,
    ) -> impl Future<Output = Result<ActorId>> + Send;

    /// Toggle the traffic manager autopilot on a vehicle
    fn set_autopilot(
        &self,
        actor_id: ActorId,
        enabled: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Liveness flag; `false` for actors destroyed or despawned by the simulator
    fn is_alive(&self, actor_id: ActorId) -> impl Future<Output = Result<bool>> + Send;

    /// Destroy actor
    fn destroy_actor(&self, actor_id: ActorId) -> impl Future<Output = Result<()>> + Send;

    /// Current simulator frame counter (world snapshot)
    fn current_frame(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Get sensor data source
    ///
    /// Returns an object implementing `SensorSource`, None if actor doesn't exist
    /// or is not a sensor.
    fn sensor_source(&self, actor_id: ActorId, kind: SensorKind) -> Option<Box<dyn SensorSource>>;
}
