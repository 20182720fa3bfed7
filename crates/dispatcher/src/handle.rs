//! WriterHandle - manages a frame writer with isolated queue and worker task

use std::sync::Arc;

use contracts::{SensorDataCallback, SensorKind, SensorPacket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use crate::metrics::{WriterMetrics, WriterSnapshot};
use crate::window::FrameWindow;
use crate::writer::FrameWriter;

/// Message to a writer worker
#[derive(Debug)]
pub enum WriterCommand {
    /// Persist one frame
    Frame(SensorPacket),
    /// Finish everything queued before this command, then exit
    Shutdown,
}

/// Handle to a running writer worker
pub struct WriterHandle {
    /// Sensor kind
    kind: SensorKind,
    /// Channel to send frames to worker
    tx: mpsc::Sender<WriterCommand>,
    /// Frame gate shared with the controller
    window: Arc<FrameWindow>,
    /// Shared metrics
    metrics: Arc<WriterMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl WriterHandle {
    /// Create a new WriterHandle and spawn the worker task
    ///
    /// File I/O and PNG encoding are synchronous, so the worker runs on the
    /// blocking pool. Must be called from within a tokio runtime.
    pub fn spawn<W: FrameWriter>(writer: W, queue_capacity: usize, window: Arc<FrameWindow>) -> Self {
        let kind = writer.sensor_kind();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(WriterMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_handle =
            tokio::task::spawn_blocking(move || writer_worker(writer, rx, worker_metrics));

        Self {
            kind,
            tx,
            window,
            metrics,
            worker_handle,
        }
    }

    /// Get sensor kind
    pub fn sensor_kind(&self) -> SensorKind {
        self.kind
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<WriterMetrics> {
        &self.metrics
    }

    /// Sensor callback feeding this writer
    ///
    /// Runs on the sensor's delivery thread: frames outside the window are
    /// discarded there, the rest are queued. A full queue blocks the delivery
    /// thread until the writer catches up, so no in-window frame is dropped.
    pub fn callback(&self) -> SensorDataCallback {
        let kind = self.kind;
        let tx = self.tx.clone();
        let window = Arc::clone(&self.window);
        let metrics = Arc::clone(&self.metrics);

        Arc::new(move |packet: SensorPacket| {
            if !window.contains(packet.frame) {
                metrics.inc_skipped();
                trace!(sensor = %kind, frame = packet.frame, "frame outside capture window");
                return;
            }
            let frame = packet.frame;
            if tx.blocking_send(WriterCommand::Frame(packet)).is_err() {
                metrics.inc_skipped();
                debug!(sensor = %kind, frame, "writer already shut down, frame dropped");
            }
        })
    }

    /// Drain the queue and stop the worker
    ///
    /// Frames queued before this call are written; frames arriving afterwards
    /// are dropped. Returns the final metrics.
    #[instrument(name = "writer_handle_shutdown", skip(self), fields(sensor = %self.kind))]
    pub async fn shutdown(self) -> WriterSnapshot {
        if self.tx.send(WriterCommand::Shutdown).await.is_err() {
            warn!(sensor = %self.kind, "writer worker exited early");
        }
        drop(self.tx);

        // Wait for worker to finish
        if let Err(e) = self.worker_handle.await {
            error!(sensor = %self.kind, error = ?e, "writer task panicked");
        }
        let snapshot = self.metrics.snapshot();
        debug!(sensor = %self.kind, written = snapshot.written, "WriterHandle shutdown complete");
        snapshot
    }
}

/// Worker loop that consumes frames and writes them
///
/// Write failures are logged and counted, and the loop continues.
#[instrument(
    name = "writer_worker_loop",
    skip(writer, rx, metrics),
    fields(sensor = %writer.sensor_kind())
)]
fn writer_worker<W: FrameWriter>(
    mut writer: W,
    mut rx: mpsc::Receiver<WriterCommand>,
    metrics: Arc<WriterMetrics>,
) {
    let kind = writer.sensor_kind();
    debug!(dir = %writer.output_dir().display(), "writer worker started");
    let mut last_written: Option<u64> = None;

    while let Some(command) = rx.blocking_recv() {
        let packet = match command {
            WriterCommand::Frame(packet) => packet,
            WriterCommand::Shutdown => break,
        };

        // 文件只写一次，帧号严格递增
        if let Some(last) = last_written.filter(|&last| packet.frame <= last) {
            metrics.inc_skipped();
            warn!(frame = packet.frame, last, "stale frame rejected");
            continue;
        }

        match writer.write_frame(&packet) {
            Ok(path) => {
                last_written = Some(packet.frame);
                metrics.record_written(packet.frame);
                trace!(sensor = %kind, path = %path.display(), "frame written");
            }
            Err(e) => {
                metrics.inc_failed();
                error!(frame = packet.frame, error = %e, "write failed");
            }
        }
    }

    // 停止接收，排在 Shutdown 之后的帧计为跳过
    rx.close();
    while let Ok(command) = rx.try_recv() {
        if let WriterCommand::Frame(packet) = command {
            metrics.inc_skipped();
            debug!(frame = packet.frame, "frame queued after shutdown dropped");
        }
    }

    debug!(written = metrics.written(), "writer worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::thread;

    use bytes::Bytes;
    use contracts::{PointCloudData, SensorPayload};
    use tempfile::tempdir;

    use crate::error::DispatcherError;
    use crate::sinks::LidarBinWriter;

    /// Records frames, optionally failing some of them
    struct RecordingWriter {
        frames: Arc<Mutex<Vec<u64>>>,
        fail_frames: Vec<u64>,
        dir: PathBuf,
    }

    impl FrameWriter for RecordingWriter {
        fn sensor_kind(&self) -> SensorKind {
            SensorKind::Lidar
        }

        fn output_dir(&self) -> &Path {
            &self.dir
        }

        fn write_frame(&mut self, packet: &SensorPacket) -> Result<PathBuf, DispatcherError> {
            if self.fail_frames.contains(&packet.frame) {
                return Err(DispatcherError::encode(&self.dir, "mock failure"));
            }
            self.frames.lock().unwrap().push(packet.frame);
            Ok(self.dir.join(packet.frame.to_string()))
        }
    }

    fn packet(frame: u64) -> SensorPacket {
        SensorPacket {
            sensor_kind: SensorKind::Lidar,
            timestamp: frame as f64 * 0.05,
            frame,
            payload: SensorPayload::PointCloud(PointCloudData::from_raw(Bytes::from(vec![0u8; 32]))),
        }
    }

    fn recording(fail_frames: Vec<u64>) -> (RecordingWriter, Arc<Mutex<Vec<u64>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let writer = RecordingWriter {
            frames: Arc::clone(&frames),
            fail_frames,
            dir: PathBuf::from("/unused"),
        };
        (writer, frames)
    }

    /// Deliver packets from a non-runtime thread, like a sensor would
    fn deliver(callback: SensorDataCallback, frames: Vec<u64>) {
        thread::spawn(move || {
            for frame in frames {
                callback(packet(frame));
            }
        })
        .join()
        .unwrap();
    }

    #[tokio::test]
    async fn test_window_gates_frames() {
        let (writer, written) = recording(vec![]);
        let window = Arc::new(FrameWindow::new());
        let handle = WriterHandle::spawn(writer, 8, Arc::clone(&window));

        // Before the window opens everything is discarded
        deliver(handle.callback(), vec![98, 99]);
        window.open(100, 3);
        deliver(handle.callback(), vec![100, 101, 102, 103]);

        let snapshot = handle.shutdown().await;
        assert_eq!(*written.lock().unwrap(), vec![100, 101, 102]);
        assert_eq!(snapshot.written, 3);
        assert_eq!(snapshot.skipped, 3);
        assert_eq!(snapshot.last_frame, Some(102));
    }

    #[tokio::test]
    async fn test_stale_frames_rejected() {
        let (writer, written) = recording(vec![]);
        let window = Arc::new(FrameWindow::new());
        window.open(0, 100);
        let handle = WriterHandle::spawn(writer, 8, window);

        deliver(handle.callback(), vec![5, 5, 3, 6]);

        let snapshot = handle.shutdown().await;
        assert_eq!(*written.lock().unwrap(), vec![5, 6]);
        assert_eq!(snapshot.skipped, 2);
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        let (writer, written) = recording(vec![11]);
        let window = Arc::new(FrameWindow::new());
        window.open(10, 5);
        let handle = WriterHandle::spawn(writer, 8, window);

        deliver(handle.callback(), vec![10, 11, 12]);

        let snapshot = handle.shutdown().await;
        assert_eq!(*written.lock().unwrap(), vec![10, 12]);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.written, 2);
    }

    #[tokio::test]
    async fn test_shutdown_drains_small_queue() {
        let (writer, written) = recording(vec![]);
        let window = Arc::new(FrameWindow::new());
        window.open(0, 1000);
        // Capacity 1: delivery blocks until the worker catches up
        let handle = WriterHandle::spawn(writer, 1, window);

        deliver(handle.callback(), (0..50).collect());

        let snapshot = handle.shutdown().await;
        assert_eq!(snapshot.written, 50);
        assert_eq!(written.lock().unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_callback_after_shutdown_is_dropped() {
        let (writer, _written) = recording(vec![]);
        let window = Arc::new(FrameWindow::new());
        window.open(0, 10);
        let handle = WriterHandle::spawn(writer, 4, window);
        let callback = handle.callback();
        let metrics = Arc::clone(handle.metrics());

        handle.shutdown().await;
        deliver(callback, vec![1]);

        assert_eq!(metrics.written(), 0);
        assert_eq!(metrics.skipped(), 1);
    }

    #[test]
    fn test_frames_behind_shutdown_counted_as_skipped() {
        let (writer, written) = recording(vec![]);
        let metrics = Arc::new(WriterMetrics::new());
        let (tx, rx) = mpsc::channel(8);

        tx.try_send(WriterCommand::Frame(packet(1))).unwrap();
        tx.try_send(WriterCommand::Shutdown).unwrap();
        tx.try_send(WriterCommand::Frame(packet(2))).unwrap();
        tx.try_send(WriterCommand::Frame(packet(3))).unwrap();

        writer_worker(writer, rx, Arc::clone(&metrics));

        assert_eq!(*written.lock().unwrap(), vec![1]);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.written, 1);
        assert_eq!(snapshot.skipped, 2);
        // Channel closed by the worker
        assert!(tx.try_send(WriterCommand::Shutdown).is_err());
    }

    #[tokio::test]
    async fn test_lidar_files_on_disk() {
        let dir = tempdir().unwrap();
        let window = Arc::new(FrameWindow::new());
        window.open(1000, 2);
        let handle = WriterHandle::spawn(LidarBinWriter::new(dir.path()), 4, window);

        deliver(handle.callback(), vec![1000, 1001, 1002]);
        handle.shutdown().await;

        let mut names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["001000.bin", "001001.bin"]);
    }
}
