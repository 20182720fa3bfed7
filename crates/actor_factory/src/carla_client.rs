//! Real CARLA client implementation
//!
//! Connects to CARLA server using carla-rust crate.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use carla::client::{Actor, ActorBase, Client, Sensor, Vehicle, World};
use carla::geom::{Location, Rotation, Transform as CarlaTransform};
use contracts::{ActorId, ActorTemplate, SensorKind, SensorSource, Transform};
use tracing::{debug, info, instrument, warn};

use crate::carla_sensor_source::CarlaSensorSource;
use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};

/// Real CARLA client
///
/// Wraps carla-rust's Client, implements CarlaClient trait.
/// Uses Mutex for interior mutability, allowing `&self` methods to modify World.
#[derive(Default, Clone)]
pub struct RealCarlaClient {
    /// CARLA client
    client: Arc<Mutex<Option<Client>>>,
    /// World reference (uses Mutex for interior mutability)
    world: Arc<Mutex<Option<World>>>,
    /// Actors spawned through this client
    actors: Arc<Mutex<HashMap<ActorId, ActorType>>>,
}

/// Actor type enumeration
#[derive(Clone)]
enum ActorType {
    Vehicle(Vehicle),
    Sensor(Sensor),
}

impl ActorType {
    fn is_alive(&self) -> bool {
        match self {
            ActorType::Vehicle(v) => v.is_alive(),
            ActorType::Sensor(s) => s.is_alive(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RealCarlaClient {
    /// Create new client (disconnected state)
    pub fn new() -> Self {
        Self::default()
    }

    /// Access World with mutable reference, ensuring connected
    fn with_world_mut<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut World) -> Result<R>,
    {
        let mut world_guard = lock(&self.world);
        let world = world_guard.as_mut().ok_or(ActorFactoryError::NotConnected)?;
        f(world)
    }

    /// Save actor to registry
    fn store_actor(&self, actor_id: ActorId, actor: ActorType) {
        lock(&self.actors).insert(actor_id, actor);
    }

    /// Resolve a blueprint and apply template attributes
    fn configured_blueprint(
        world: &mut World,
        template: &ActorTemplate,
    ) -> Result<carla::client::ActorBlueprint> {
        let mut blueprint = world
            .blueprint_library()
            .find(&template.id)
            .ok_or_else(|| ActorFactoryError::template_not_found(&template.id))?;

        for (key, value) in &template.attributes {
            if !blueprint.set_attribute(key, value) {
                warn!(key, value, blueprint = %template.id, "failed to set attribute");
            }
        }
        Ok(blueprint)
    }

    fn parent_vehicle(&self, template: &ActorTemplate, parent_id: ActorId) -> Result<Vehicle> {
        match lock(&self.actors).get(&parent_id) {
            Some(ActorType::Vehicle(v)) => Ok(v.clone()),
            _ => Err(ActorFactoryError::sensor_spawn(
                &template.id,
                parent_id,
                "parent vehicle not found",
            )),
        }
    }

    /// Convert internal Transform to CARLA Transform
    fn to_carla_transform(transform: Transform) -> CarlaTransform {
        let location = Location {
            x: transform.location.x as f32,
            y: transform.location.y as f32,
            z: transform.location.z as f32,
        };
        let rotation = Rotation {
            pitch: transform.rotation.pitch as f32,
            yaw: transform.rotation.yaw as f32,
            roll: transform.rotation.roll as f32,
        };
        CarlaTransform { location, rotation }
    }

    fn from_carla_transform(transform: &CarlaTransform) -> Transform {
        let mut out = Transform::at(
            transform.location.x as f64,
            transform.location.y as f64,
            transform.location.z as f64,
        );
        out.rotation.pitch = transform.rotation.pitch as f64;
        out.rotation.yaw = transform.rotation.yaw as f64;
        out.rotation.roll = transform.rotation.roll as f64;
        out
    }

    /// Get underlying CARLA Sensor object
    pub fn get_sensor(&self, actor_id: ActorId) -> Option<Sensor> {
        match lock(&self.actors).get(&actor_id) {
            Some(ActorType::Sensor(sensor)) => Some(sensor.clone()),
            _ => None,
        }
    }
}

impl CarlaClient for RealCarlaClient {
    #[instrument(name = "real_carla_connect", skip(self), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        // libcarla reports an unreachable server by panicking out of the RPC layer
        let connected = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut client = Client::connect(host, port, None);
            client.set_timeout(timeout);
            let world = client.world();
            (client, world)
        }));
        let (client, world) = connected.map_err(|_| {
            ActorFactoryError::connection(host, port, format!("no response within {timeout:?}"))
        })?;

        info!(map = %world.map().name(), "connected to CARLA server");

        *lock(&self.client) = Some(client);
        *lock(&self.world) = Some(world);
        Ok(())
    }

    async fn filter_blueprints(&self, pattern: &str) -> Result<Vec<ActorTemplate>> {
        self.with_world_mut(|world| {
            Ok(world
                .blueprint_library()
                .filter(pattern)
                .iter()
                .map(|bp| ActorTemplate::new(bp.id()))
                .collect())
        })
    }

    async fn find_blueprint(&self, id: &str) -> Result<Option<ActorTemplate>> {
        self.with_world_mut(|world| {
            Ok(world
                .blueprint_library()
                .find(id)
                .map(|bp| ActorTemplate::new(bp.id())))
        })
    }

    async fn spawn_points(&self) -> Result<Vec<Transform>> {
        self.with_world_mut(|world| {
            Ok(world
                .map()
                .recommended_spawn_points()
                .iter()
                .map(Self::from_carla_transform)
                .collect())
        })
    }

    #[instrument(
        name = "real_carla_try_spawn",
        skip(self, template, transform),
        fields(blueprint = %template.id)
    )]
    async fn try_spawn_actor(
        &self,
        template: &ActorTemplate,
        transform: Transform,
    ) -> Result<Option<ActorId>> {
        let spawned = self.with_world_mut(|world| {
            let blueprint = Self::configured_blueprint(world, template)?;
            let carla_transform = Self::to_carla_transform(transform);
            Ok(world.spawn_actor(&blueprint, &carla_transform).ok())
        })?;

        let Some(actor) = spawned else {
            debug!("simulator refused spawn");
            return Ok(None);
        };

        let actor_id = actor.id();
        let vehicle = Vehicle::try_from(actor).map_err(|_| {
            ActorFactoryError::VehicleSpawnFailed {
                blueprint: template.id.clone(),
                message: "spawned actor is not a vehicle".to_string(),
            }
        })?;
        debug!(actor_id, "vehicle spawned");
        self.store_actor(actor_id, ActorType::Vehicle(vehicle));
        Ok(Some(actor_id))
    }

    #[instrument(
        name = "real_carla_spawn_attached",
        skip(self, template, transform),
        fields(blueprint = %template.id, parent_id)
    )]
    async fn spawn_attached(
        &self,
        template: &ActorTemplate,
        transform: Transform,
        parent_id: ActorId,
    ) -> Result<ActorId> {
        let parent = self.parent_vehicle(template, parent_id)?;
        let actor: Actor = self.with_world_mut(|world| {
            let blueprint = Self::configured_blueprint(world, template)?;
            let carla_transform = Self::to_carla_transform(transform);
            world
                .spawn_actor_attached(&blueprint, &carla_transform, &parent, None)
                .map_err(|e| ActorFactoryError::sensor_spawn(&template.id, parent_id, e.to_string()))
        })?;

        let actor_id = actor.id();
        let sensor = Sensor::try_from(actor).map_err(|_| {
            ActorFactoryError::sensor_spawn(&template.id, parent_id, "spawned actor is not a sensor")
        })?;
        debug!(actor_id, parent_id, "sensor spawned and attached");
        self.store_actor(actor_id, ActorType::Sensor(sensor));
        Ok(actor_id)
    }

    async fn set_autopilot(&self, actor_id: ActorId, enabled: bool) -> Result<()> {
        match lock(&self.actors).get(&actor_id) {
            Some(ActorType::Vehicle(vehicle)) => {
                vehicle.set_autopilot(enabled);
                info!(actor_id, enabled, "autopilot toggled");
                Ok(())
            }
            _ => Err(ActorFactoryError::ActorNotFound { actor_id }),
        }
    }

    async fn is_alive(&self, actor_id: ActorId) -> Result<bool> {
        Ok(lock(&self.actors)
            .get(&actor_id)
            .is_some_and(ActorType::is_alive))
    }

    #[instrument(name = "real_carla_destroy_actor", skip(self), fields(actor_id))]
    async fn destroy_actor(&self, actor_id: ActorId) -> Result<()> {
        let actor = lock(&self.actors)
            .remove(&actor_id)
            .ok_or(ActorFactoryError::ActorNotFound { actor_id })?;

        let destroyed = match actor {
            ActorType::Vehicle(v) => v.destroy(),
            ActorType::Sensor(s) => s.destroy(),
        };
        if !destroyed {
            return Err(ActorFactoryError::DestroyFailed {
                actor_id,
                message: "simulator returned false".into(),
            });
        }
        debug!(actor_id, "actor destroyed");
        Ok(())
    }

    async fn current_frame(&self) -> Result<u64> {
        self.with_world_mut(|world| {
            panic::catch_unwind(AssertUnwindSafe(|| world.snapshot().frame() as u64)).map_err(
                |_| ActorFactoryError::Snapshot {
                    message: "world snapshot unavailable".into(),
                },
            )
        })
    }

    fn sensor_source(&self, actor_id: ActorId, kind: SensorKind) -> Option<Box<dyn SensorSource>> {
        let sensor = self.get_sensor(actor_id)?;
        Some(Box::new(CarlaSensorSource::new(actor_id, kind, sensor)))
    }
}
