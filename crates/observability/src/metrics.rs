//! 采集指标记录
//!
//! 写入计数由各 writer 的原子计数维护，这里按快照发布为 Prometheus 指标，
//! 因此可以在每次轮询时重复调用。

use contracts::SensorKind;
use dispatcher::WriterSnapshot;
use metrics::{counter, gauge};

/// 发布某个传感器的写入进度
pub fn record_writer_progress(kind: SensorKind, snapshot: &WriterSnapshot) {
    let sensor = kind.as_str();
    counter!("carla_capture_frames_written_total", "sensor" => sensor).absolute(snapshot.written);
    counter!("carla_capture_frames_failed_total", "sensor" => sensor).absolute(snapshot.failed);
    counter!("carla_capture_frames_skipped_total", "sensor" => sensor).absolute(snapshot.skipped);

    if let Some(frame) = snapshot.last_frame {
        gauge!("carla_capture_last_frame", "sensor" => sensor).set(frame as f64);
    }
}

/// 记录模拟器帧计数与目标帧
pub fn record_capture_progress(current: u64, target: u64) {
    gauge!("carla_capture_simulator_frame").set(current as f64);
    gauge!("carla_capture_target_frame").set(target as f64);
}

/// Teardown 计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownCounts {
    pub destroyed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 记录 teardown 结果
pub fn record_teardown(counts: TeardownCounts) {
    counter!("carla_capture_actors_destroyed_total").increment(counts.destroyed as u64);
    counter!("carla_capture_actors_skipped_total").increment(counts.skipped as u64);
    counter!("carla_capture_actors_destroy_failed_total").increment(counts.failed as u64);
}
