//! CARLA Sensor SensorSource wrapper
//!
//! Wraps CARLA native Sensor as a type implementing `SensorSource` trait.
//! Only compiled when `real-carla` feature is enabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use carla::client::Sensor;
use contracts::{ActorId, SensorDataCallback, SensorKind, SensorSource};
use tracing::{debug, trace, warn};

use crate::sensor_data_converter::convert_sensor_data;

/// CARLA Sensor wrapper
///
/// Wraps CARLA native `Sensor` as `SensorSource`,
/// allowing the capture controller to handle real sensors and Mock sensors uniformly.
pub struct CarlaSensorSource {
    actor_id: ActorId,
    kind: SensorKind,
    sensor: Sensor,
    listening: Arc<AtomicBool>,
}

impl CarlaSensorSource {
    /// Create new CARLA sensor source
    pub fn new(actor_id: ActorId, kind: SensorKind, sensor: Sensor) -> Self {
        Self {
            actor_id,
            kind,
            listening: Arc::new(AtomicBool::new(sensor.is_listening())),
            sensor,
        }
    }
}

impl SensorSource for CarlaSensorSource {
    fn sensor_kind(&self) -> SensorKind {
        self.kind
    }

    fn listen(&self, callback: SensorDataCallback) {
        // Idempotent: if already listening, don't register again
        if self.listening.swap(true, Ordering::SeqCst) {
            warn!(actor_id = self.actor_id, sensor = %self.kind, "sensor already listening");
            return;
        }

        let actor_id = self.actor_id;
        let kind = self.kind;
        let listening = Arc::clone(&self.listening);

        debug!(actor_id, sensor = %kind, "starting CARLA sensor");

        self.sensor.listen(move |sensor_data| {
            if !listening.load(Ordering::Relaxed) {
                return;
            }

            match convert_sensor_data(kind, &sensor_data) {
                Some(packet) => {
                    trace!(actor_id, frame = packet.frame, "CARLA sensor data received");
                    callback(packet);
                }
                None => {
                    trace!(actor_id, "failed to convert sensor data");
                }
            }
        });
    }

    fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(actor_id = self.actor_id, sensor = %self.kind, "stopping CARLA sensor");
            self.sensor.stop();
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}
