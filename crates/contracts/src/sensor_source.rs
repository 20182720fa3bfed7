//! SensorSource trait - Sensor data source abstraction
//!
//! Defines a unified interface for sensors that push data through callbacks,
//! so the capture controller handles real CARLA sensors and mock sensors alike.

use std::sync::Arc;

use crate::{SensorKind, SensorPacket};

/// Sensor data callback type
///
/// Invoked by the sensor's own delivery thread, once per frame. Invocations
/// for one sensor never overlap; invocations for different sensors may.
pub type SensorDataCallback = Arc<dyn Fn(SensorPacket) + Send + Sync>;

/// Sensor data source trait
///
/// # Example
///
/// ```ignore
/// let sensor: Box<dyn SensorSource> = client.sensor_source(actor_id, SensorKind::Lidar)?;
/// sensor.listen(Arc::new(|packet| {
///     println!("frame {}", packet.frame);
/// }));
/// // ... capture ...
/// sensor.stop();
/// ```
pub trait SensorSource: Send + Sync {
    /// Sensor kind
    fn sensor_kind(&self) -> SensorKind;

    /// Register data callback
    ///
    /// Repeated calls are idempotent: only the first callback is registered.
    fn listen(&self, callback: SensorDataCallback);

    /// Stop listening
    ///
    /// Once this returns, no further callback invocation starts.
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
