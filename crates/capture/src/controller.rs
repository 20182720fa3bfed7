//! Capture controller - coordinates setup, capture loop and teardown.
//!
//! Teardown always runs once actors may exist: a setup error, a simulator
//! error during the loop or an interruption all end in the same drain.

use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actor_factory::{ActorFactory, ActorFactoryError, CarlaClient, TeardownReport};
use contracts::{ActorRegistry, ActorRole, SensorKind, SensorSource};
use dispatcher::{prepare_output_dirs, writer_for, FrameWindow, WriterHandle, WriterSnapshot};
use observability::TeardownCounts;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use crate::phase::CapturePhase;
use crate::stats::{CaptureOutcome, CaptureStats};

/// Operator-facing progress lines on stdout
#[derive(Debug, Clone, Copy)]
struct Narrator {
    enabled: bool,
}

impl Narrator {
    fn say(&self, message: impl Display) {
        if self.enabled {
            println!("{message}");
        }
    }
}

/// Drives one capture run
pub struct CaptureController<C: CarlaClient> {
    client: C,
    config: CaptureConfig,
}

impl<C: CarlaClient> CaptureController<C> {
    /// Create a controller over an unconnected client
    pub fn new(client: C, config: CaptureConfig) -> Self {
        Self { client, config }
    }

    /// Run configuration
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Run to completion
    ///
    /// `shutdown` carries the interrupt flag; it is checked after setup and at
    /// every poll, so latency is bounded by the poll interval. Returns the run
    /// statistics for completed and interrupted runs; setup and simulator
    /// errors are returned after teardown has finished.
    #[instrument(
        name = "capture_run",
        skip_all,
        fields(frames = self.config.frames(), out = %self.config.output_root.display())
    )]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<CaptureStats> {
        let started = Instant::now();
        let Self { mut client, config } = self;
        let narrator = Narrator {
            enabled: config.narrate,
        };

        // 目录必须在任何回调之前存在
        prepare_output_dirs(&config.output_root)?;

        let carla = &config.blueprint.carla;
        let timeout = carla.timeout().map_err(ActorFactoryError::from)?;
        info!(host = %carla.host, port = carla.port, "connecting to CARLA server");
        client.connect(&carla.host, carla.port, timeout).await?;
        info!("connected to CARLA server");

        let factory = ActorFactory::new(client);
        let mut session = Session::new();

        let captured = session
            .capture(&factory, &config, &narrator, &mut shutdown)
            .await;
        if let Err(e) = &captured {
            error!(error = %e, phase = %session.phase, "capture aborted");
        }

        session.drain(&factory, &narrator).await;

        let outcome = captured?;
        Ok(session.into_stats(outcome, started.elapsed()))
    }
}

/// Mutable state of a run, owned by the control flow only
struct Session {
    phase: CapturePhase,
    phases: Vec<CapturePhase>,
    registry: ActorRegistry,
    sensors: Vec<Box<dyn SensorSource>>,
    writers: Vec<WriterHandle>,
    snapshots: Vec<(SensorKind, WriterSnapshot)>,
    window: Arc<FrameWindow>,
    autopilot: bool,
    baseline: Option<u64>,
    target: Option<u64>,
    last_polled: Option<u64>,
    teardown: TeardownReport,
}

impl Session {
    fn new() -> Self {
        Self {
            phase: CapturePhase::Setup,
            phases: vec![CapturePhase::Setup],
            registry: ActorRegistry::new(),
            sensors: Vec::new(),
            writers: Vec::new(),
            snapshots: Vec::new(),
            window: Arc::new(FrameWindow::new()),
            autopilot: false,
            baseline: None,
            target: None,
            last_polled: None,
            teardown: TeardownReport::default(),
        }
    }

    fn enter(&mut self, next: CapturePhase) -> Result<()> {
        self.phase = self.phase.transition(next)?;
        self.phases.push(next);
        debug!(phase = %next, "capture phase changed");
        Ok(())
    }

    /// SETUP and LISTENING
    async fn capture<C: CarlaClient>(
        &mut self,
        factory: &ActorFactory<C>,
        config: &CaptureConfig,
        narrator: &Narrator,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<CaptureOutcome> {
        let blueprint = &config.blueprint;
        let client = factory.client();

        factory.spawn_rig(blueprint, &mut self.registry).await?;
        if *shutdown.borrow() {
            info!("interrupted during setup, sensors not started");
            return Ok(CaptureOutcome::Interrupted);
        }

        let vehicle = self.registry.vehicle().ok_or(CaptureError::MissingActor {
            role: ActorRole::Vehicle,
        })?;
        if !client.is_alive(vehicle).await? {
            return Err(CaptureError::VehicleNotAlive { actor_id: vehicle });
        }

        for kind in SensorKind::ALL {
            let actor_id = self.registry.sensor(kind).ok_or(CaptureError::MissingActor {
                role: ActorRole::Sensor(kind),
            })?;
            let source = client
                .sensor_source(actor_id, kind)
                .ok_or(ActorFactoryError::SensorSourceUnavailable { kind, actor_id })?;

            let writer = WriterHandle::spawn(
                writer_for(kind, &config.output_root),
                blueprint.capture.queue_capacity,
                Arc::clone(&self.window),
            );
            source.listen(writer.callback());
            info!(sensor = %kind, actor_id, "sensor listening");

            self.sensors.push(source);
            self.writers.push(writer);
        }

        client.set_autopilot(vehicle, true).await?;
        self.autopilot = true;

        let baseline = client.current_frame().await?;
        let target = self.window.open(baseline, config.frames());
        self.baseline = Some(baseline);
        self.target = Some(target);
        self.enter(CapturePhase::Listening)?;

        narrator.say(format_args!(
            "Capturing {} frames ... (Ctrl-C to abort)",
            config.frames()
        ));
        info!(baseline, target, "capture window open");

        let poll_interval = blueprint.capture.poll_interval();
        loop {
            let frame = client.current_frame().await?;
            self.last_polled = Some(frame);
            self.publish_progress(frame, target);

            if frame >= target {
                info!(frame, target, "target frame reached");
                return Ok(CaptureOutcome::Completed);
            }
            if interrupted_within(shutdown, poll_interval).await {
                info!(frame, target, "capture interrupted");
                return Ok(CaptureOutcome::Interrupted);
            }
        }
    }

    /// DRAINING and DONE: stop sensors, autopilot off, flush writers, destroy actors
    #[instrument(name = "capture_drain", skip_all, fields(actors = self.registry.len()))]
    async fn drain<C: CarlaClient>(&mut self, factory: &ActorFactory<C>, narrator: &Narrator) {
        if let Err(e) = self.enter(CapturePhase::Draining) {
            error!(error = %e, "unexpected phase at drain");
        }
        let client = factory.client();

        narrator.say("Stopping sensors ...");
        for sensor in &self.sensors {
            sensor.stop();
            debug!(sensor = %sensor.sensor_kind(), "sensor stopped");
        }

        if self.autopilot {
            if let Some(vehicle) = self.registry.vehicle() {
                match client.is_alive(vehicle).await {
                    Ok(true) => match client.set_autopilot(vehicle, false).await {
                        Ok(()) => self.autopilot = false,
                        Err(e) => warn!(actor_id = vehicle, error = %e, "failed to disable autopilot"),
                    },
                    Ok(false) => debug!(actor_id = vehicle, "vehicle gone, autopilot left as is"),
                    Err(e) => warn!(actor_id = vehicle, error = %e, "liveness check failed"),
                }
            }
        }

        for writer in self.writers.drain(..) {
            let kind = writer.sensor_kind();
            let snapshot = writer.shutdown().await;
            observability::record_writer_progress(kind, &snapshot);
            info!(
                sensor = %kind,
                written = snapshot.written,
                failed = snapshot.failed,
                skipped = snapshot.skipped,
                "writer drained"
            );
            self.snapshots.push((kind, snapshot));
        }

        narrator.say("Destroying actors ...");
        self.teardown = factory.teardown(&mut self.registry).await;
        observability::record_teardown(TeardownCounts {
            destroyed: self.teardown.destroyed.len(),
            skipped: self.teardown.skipped.len(),
            failed: self.teardown.failed.len(),
        });

        if let Err(e) = self.enter(CapturePhase::Done) {
            error!(error = %e, "unexpected phase at teardown end");
        }
        narrator.say("Done.");
    }

    fn publish_progress(&self, frame: u64, target: u64) {
        observability::record_capture_progress(frame, target);
        for writer in &self.writers {
            observability::record_writer_progress(writer.sensor_kind(), &writer.metrics().snapshot());
        }
    }

    fn into_stats(self, outcome: CaptureOutcome, duration: Duration) -> CaptureStats {
        CaptureStats {
            outcome,
            baseline: self.baseline,
            target: self.target,
            last_polled_frame: self.last_polled,
            sensors: self.snapshots,
            actors_destroyed: self.teardown.destroyed.len(),
            actors_skipped: self.teardown.skipped.len(),
            actors_failed: self.teardown.failed.len(),
            phases: self.phases,
            duration,
        }
    }
}

/// Sleep one poll interval; true if interrupted meanwhile
async fn interrupted_within(shutdown: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(interval) => false,
        changed = shutdown.changed() => match changed {
            Ok(()) => *shutdown.borrow(),
            // Sender gone: no interrupt can arrive any more
            Err(_) => {
                tokio::time::sleep(interval).await;
                false
            }
        },
    }
}
