//! FrameWriter - per-sensor "write one frame" capability

use std::fs;
use std::path::{Path, PathBuf};

use contracts::{SensorKind, SensorPacket};

use crate::error::DispatcherError;
use crate::sinks::{LidarBinWriter, PngImageWriter};

/// Writes one sensor's frames into its output directory
///
/// Called from a single writer task, so implementations need no locking.
pub trait FrameWriter: Send + 'static {
    /// Sensor kind this writer accepts
    fn sensor_kind(&self) -> SensorKind;

    /// Directory files are written to
    fn output_dir(&self) -> &Path;

    /// Persist one packet as `{frame:06}.{ext}`; returns the written path
    fn write_frame(&mut self, packet: &SensorPacket) -> Result<PathBuf, DispatcherError>;
}

impl<W: FrameWriter + ?Sized> FrameWriter for Box<W> {
    fn sensor_kind(&self) -> SensorKind {
        (**self).sensor_kind()
    }

    fn output_dir(&self) -> &Path {
        (**self).output_dir()
    }

    fn write_frame(&mut self, packet: &SensorPacket) -> Result<PathBuf, DispatcherError> {
        (**self).write_frame(packet)
    }
}

/// Output directory of a sensor under the capture root
pub fn sensor_dir(root: &Path, kind: SensorKind) -> PathBuf {
    root.join(kind.output_dir_name())
}

/// Create `velodyne/` and `images/` under `root`
pub fn prepare_output_dirs(root: &Path) -> Result<Vec<PathBuf>, DispatcherError> {
    SensorKind::ALL
        .into_iter()
        .map(|kind| {
            let dir = sensor_dir(root, kind);
            fs::create_dir_all(&dir).map_err(|source| DispatcherError::OutputDir {
                path: dir.clone(),
                source,
            })?;
            Ok(dir)
        })
        .collect()
}

/// Writer for `kind` rooted at `root`
pub fn writer_for(kind: SensorKind, root: &Path) -> Box<dyn FrameWriter> {
    let dir = sensor_dir(root, kind);
    match kind {
        SensorKind::Lidar => Box::new(LidarBinWriter::new(dir)),
        SensorKind::Camera => Box::new(PngImageWriter::new(dir)),
    }
}

pub(crate) fn ensure_kind(writer: SensorKind, packet: &SensorPacket) -> Result<(), DispatcherError> {
    if packet.sensor_kind == writer {
        Ok(())
    } else {
        Err(DispatcherError::WrongSensor {
            writer,
            received: packet.sensor_kind,
            frame: packet.frame,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_prepare_output_dirs() {
        let root = tempdir().unwrap();
        let dirs = prepare_output_dirs(root.path()).unwrap();

        assert_eq!(dirs.len(), 2);
        assert!(root.path().join("velodyne").is_dir());
        assert!(root.path().join("images").is_dir());

        // 幂等
        prepare_output_dirs(root.path()).unwrap();
    }

    #[test]
    fn test_writer_for_kind() {
        let root = tempdir().unwrap();
        let lidar = writer_for(SensorKind::Lidar, root.path());
        let camera = writer_for(SensorKind::Camera, root.path());

        assert_eq!(lidar.sensor_kind(), SensorKind::Lidar);
        assert_eq!(lidar.output_dir(), root.path().join("velodyne"));
        assert_eq!(camera.output_dir(), root.path().join("images"));
    }
}
