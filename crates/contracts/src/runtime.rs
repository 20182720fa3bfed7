//! ActorRegistry - Actor Factory output
//!
//! Runtime actor handles of the capture rig.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SensorKind;

/// CARLA actor handle type
pub type ActorId = u32;

/// Resolved blueprint (template) with its configured attributes
///
/// Attributes are string-typed key/value pairs; CARLA freezes them at spawn time,
/// so every `set_attribute` call must happen before the template is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorTemplate {
    /// Blueprint id, e.g. "sensor.lidar.ray_cast"
    pub id: String,

    /// Attribute overrides applied at spawn
    pub attributes: BTreeMap<String, String>,
}

impl ActorTemplate {
    /// Template without attribute overrides
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set a string attribute
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Attribute value
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Role an actor plays in the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Vehicle,
    Sensor(SensorKind),
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Vehicle => f.write_str("vehicle"),
            ActorRole::Sensor(kind) => write!(f, "{kind}"),
        }
    }
}

/// Registry of actors created so far
///
/// Populated incrementally during setup, so a partially completed setup still
/// lists exactly the actors that exist. Teardown drains it, which makes a second
/// teardown a no-op.
#[derive(Debug, Clone, Default)]
pub struct ActorRegistry {
    vehicle: Option<ActorId>,
    lidar: Option<ActorId>,
    camera: Option<ActorId>,
}

impl ActorRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the ego vehicle
    pub fn register_vehicle(&mut self, actor_id: ActorId) {
        self.vehicle = Some(actor_id);
    }

    /// Register an attached sensor
    pub fn register_sensor(&mut self, kind: SensorKind, actor_id: ActorId) {
        *self.sensor_slot(kind) = Some(actor_id);
    }

    /// Ego vehicle handle
    pub fn vehicle(&self) -> Option<ActorId> {
        self.vehicle
    }

    /// Sensor handle
    pub fn sensor(&self, kind: SensorKind) -> Option<ActorId> {
        match kind {
            SensorKind::Lidar => self.lidar,
            SensorKind::Camera => self.camera,
        }
    }

    /// Registered actors in teardown order: scanner, camera, vehicle
    pub fn teardown_order(&self) -> Vec<(ActorRole, ActorId)> {
        let sensors = SensorKind::ALL
            .into_iter()
            .filter_map(|kind| self.sensor(kind).map(|id| (ActorRole::Sensor(kind), id)));
        sensors
            .chain(self.vehicle.map(|id| (ActorRole::Vehicle, id)))
            .collect()
    }

    /// Remove an actor from the registry
    pub fn release(&mut self, role: ActorRole) -> Option<ActorId> {
        match role {
            ActorRole::Vehicle => self.vehicle.take(),
            ActorRole::Sensor(kind) => self.sensor_slot(kind).take(),
        }
    }

    /// Number of registered actors
    pub fn len(&self) -> usize {
        [self.vehicle, self.lidar, self.camera]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sensor_slot(&mut self, kind: SensorKind) -> &mut Option<ActorId> {
        match kind {
            SensorKind::Lidar => &mut self.lidar,
            SensorKind::Camera => &mut self.camera,
        }
    }
}
