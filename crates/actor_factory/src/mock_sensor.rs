//! Mock sensor implementation
//!
//! Implements `SensorSource` over the mock world. Each listening sensor gets its
//! own delivery thread that follows the frame clock and pushes one packet per
//! observed frame, consistent with real CARLA sensor behavior.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{ActorId, SensorDataCallback, SensorKind, SensorSource};
use tracing::{debug, trace, warn};

use crate::mock_client::{lock, MockWorld, SimCall};

/// How often the delivery thread samples the frame clock
const DELIVERY_POLL: Duration = Duration::from_millis(1);

/// Mock sensor
///
/// Handles obtained for the same actor share listening state, so a second
/// `listen` through any handle is ignored.
pub struct MockSensor {
    actor_id: ActorId,
    kind: SensorKind,
    world: Arc<MockWorld>,
    listening: Arc<AtomicBool>,
    delivery: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl MockSensor {
    /// Create handle for an existing sensor actor
    pub(crate) fn new(actor_id: ActorId, kind: SensorKind, world: Arc<MockWorld>) -> Option<Self> {
        let (listening, delivery) = world.listen_handles(actor_id)?;
        Some(Self {
            actor_id,
            kind,
            world,
            listening,
            delivery,
        })
    }
}

impl SensorSource for MockSensor {
    fn sensor_kind(&self) -> SensorKind {
        self.kind
    }

    fn listen(&self, callback: SensorDataCallback) {
        // Idempotent: if already listening, don't start again
        if self.listening.swap(true, Ordering::SeqCst) {
            warn!(actor_id = self.actor_id, sensor = %self.kind, "sensor already listening");
            return;
        }
        self.world.record(SimCall::Listen(self.actor_id));

        let actor_id = self.actor_id;
        let kind = self.kind;
        let world = Arc::clone(&self.world);
        let listening = Arc::clone(&self.listening);

        let spawned = thread::Builder::new()
            .name(format!("mock-{kind}-{actor_id}"))
            .spawn(move || {
                debug!(actor_id, sensor = %kind, "mock sensor started");
                let mut last_frame = None;

                while listening.load(Ordering::Acquire) {
                    let frame = world.frame();
                    if last_frame != Some(frame) {
                        last_frame = Some(frame);
                        if let Some(packet) = world.packet_for(actor_id, frame) {
                            callback(packet);
                            trace!(actor_id, frame, "mock packet sent");
                        }
                    }
                    thread::sleep(DELIVERY_POLL);
                }

                debug!(actor_id, sensor = %kind, "mock sensor stopped");
            });

        match spawned {
            Ok(handle) => *lock(&self.delivery) = Some(handle),
            Err(e) => {
                warn!(actor_id, error = %e, "failed to start mock delivery thread");
                self.listening.store(false, Ordering::SeqCst);
            }
        }
    }

    fn stop(&self) {
        self.world.record(SimCall::Stop(self.actor_id));
        self.listening.store(false, Ordering::SeqCst);

        // Join so that no callback is in flight once stop returns
        let handle = lock(&self.delivery).take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!(actor_id = self.actor_id, "mock delivery thread panicked");
            }
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }
}
