//! Capture run statistics.

use std::time::Duration;

use contracts::SensorKind;
use dispatcher::WriterSnapshot;

use crate::phase::CapturePhase;

/// How the capture loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Frame counter reached the target
    Completed,
    /// Shutdown signal received
    Interrupted,
}

/// Statistics from a capture run
#[derive(Debug, Clone)]
pub struct CaptureStats {
    /// How the run ended
    pub outcome: CaptureOutcome,

    /// Frame counter when capture started (None if setup never finished)
    pub baseline: Option<u64>,

    /// Exclusive end of the frame window
    pub target: Option<u64>,

    /// Last polled simulator frame
    pub last_polled_frame: Option<u64>,

    /// Per-sensor writer results
    pub sensors: Vec<(SensorKind, WriterSnapshot)>,

    /// Actors destroyed at teardown
    pub actors_destroyed: usize,

    /// Actors already gone at teardown
    pub actors_skipped: usize,

    /// Actors whose destroy failed
    pub actors_failed: usize,

    /// Phases visited, in order
    pub phases: Vec<CapturePhase>,

    /// Total duration of the run
    pub duration: Duration,
}

impl CaptureStats {
    /// Writer result for one sensor
    pub fn sensor(&self, kind: SensorKind) -> WriterSnapshot {
        self.sensors
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, snapshot)| *snapshot)
            .unwrap_or_default()
    }

    /// Files written across both sensors
    pub fn frames_written(&self) -> u64 {
        self.sensors.iter().map(|(_, s)| s.written).sum()
    }

    /// Calculate written frames per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_written() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════╗");
        println!("║              Capture Statistics              ║");
        println!("╚══════════════════════════════════════════════╝\n");

        let window = match (self.baseline, self.target) {
            (Some(start), Some(end)) => format!("[{start}, {end})"),
            _ => "not started".to_string(),
        };
        println!("Overview");
        println!("   ├─ Outcome: {:?}", self.outcome);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Frame window: {window}");
        if let Some(frame) = self.last_polled_frame {
            println!("   ├─ Last simulator frame: {frame}");
        }
        println!("   └─ Files/s: {:.2}", self.fps());

        println!("\nSensors");
        for (kind, s) in &self.sensors {
            let last = s
                .last_frame
                .map_or_else(|| "-".to_string(), |f| format!("{f:06}"));
            println!(
                "   ├─ {:<7} written={} failed={} skipped={} last={}",
                kind.as_str(),
                s.written,
                s.failed,
                s.skipped,
                last
            );
        }

        println!("\nTeardown");
        println!("   ├─ Destroyed: {}", self.actors_destroyed);
        println!("   ├─ Already gone: {}", self.actors_skipped);
        println!("   └─ Failed: {}", self.actors_failed);
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> CaptureStats {
        CaptureStats {
            outcome: CaptureOutcome::Completed,
            baseline: Some(100),
            target: Some(110),
            last_polled_frame: Some(110),
            sensors: vec![
                (
                    SensorKind::Lidar,
                    WriterSnapshot {
                        written: 10,
                        ..Default::default()
                    },
                ),
                (
                    SensorKind::Camera,
                    WriterSnapshot {
                        written: 9,
                        failed: 1,
                        ..Default::default()
                    },
                ),
            ],
            actors_destroyed: 3,
            actors_skipped: 0,
            actors_failed: 0,
            phases: vec![],
            duration: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_frames_written_and_fps() {
        let stats = stats();
        assert_eq!(stats.frames_written(), 19);
        assert!((stats.fps() - 9.5).abs() < 1e-9);
        assert_eq!(stats.sensor(SensorKind::Camera).failed, 1);
    }

    #[test]
    fn test_zero_duration_fps() {
        let stats = CaptureStats {
            duration: Duration::ZERO,
            ..stats()
        };
        assert_eq!(stats.fps(), 0.0);
    }
}
