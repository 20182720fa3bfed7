//! # Actor Factory
//!
//! CARLA asset factory module.
//!
//! Responsibilities:
//! - Resolve blueprints and spawn the ego vehicle with its LiDAR and camera
//! - Record created actors in an `ActorRegistry` as they appear
//! - Guarded teardown (liveness-checked, idempotent)
//! - Provide unified `SensorSource` abstraction over real and mock sensors
//!
//! ## Feature Flags
//!
//! - `real-carla`: Enable real CARLA client (requires carla crate)

pub mod client;
pub mod error;
pub mod factory;
pub mod mock_client;
pub mod mock_sensor;

#[cfg(feature = "real-carla")]
pub mod carla_client;
#[cfg(feature = "real-carla")]
pub mod carla_sensor_source;
#[cfg(feature = "real-carla")]
pub mod sensor_data_converter;

pub use client::CarlaClient;
pub use contracts::{ActorId, ActorRegistry, CaptureBlueprint, SensorSource};
pub use error::{ActorFactoryError, Result};
pub use factory::{ActorFactory, TeardownReport};
pub use mock_client::{MockCarlaClient, MockConfig, SimCall};
pub use mock_sensor::MockSensor;

#[cfg(feature = "real-carla")]
pub use carla_client::RealCarlaClient;
#[cfg(feature = "real-carla")]
pub use carla_sensor_source::CarlaSensorSource;
