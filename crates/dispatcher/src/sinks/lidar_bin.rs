//! LidarBinWriter - raw point cloud dump, KITTI velodyne layout

use std::fs;
use std::path::{Path, PathBuf};

use contracts::{ContractError, PointCloudData, SensorKind, SensorPacket, SensorPayload};
use tracing::{instrument, trace};

use crate::error::DispatcherError;
use crate::writer::{ensure_kind, FrameWriter};

/// Writes point clouds verbatim as `{frame:06}.bin`
///
/// No header: consecutive little-endian f32 (x, y, z, intensity) tuples.
pub struct LidarBinWriter {
    dir: PathBuf,
}

impl LidarBinWriter {
    /// Create a writer for an existing directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn check_layout(frame: u64, cloud: &PointCloudData) -> Result<(), ContractError> {
        let stride = PointCloudData::POINT_STRIDE as usize;
        if cloud.point_stride != PointCloudData::POINT_STRIDE || cloud.data.len() % stride != 0 {
            return Err(ContractError::payload_layout(
                SensorKind::Lidar.as_str(),
                frame,
                format!(
                    "{} bytes with stride {} is not a sequence of {stride}-byte points",
                    cloud.data.len(),
                    cloud.point_stride
                ),
            ));
        }
        Ok(())
    }
}

impl FrameWriter for LidarBinWriter {
    fn sensor_kind(&self) -> SensorKind {
        SensorKind::Lidar
    }

    fn output_dir(&self) -> &Path {
        &self.dir
    }

    #[instrument(
        name = "lidar_bin_write",
        skip(self, packet),
        fields(frame = packet.frame)
    )]
    fn write_frame(&mut self, packet: &SensorPacket) -> Result<PathBuf, DispatcherError> {
        ensure_kind(SensorKind::Lidar, packet)?;
        let SensorPayload::PointCloud(cloud) = &packet.payload else {
            return Err(ContractError::payload_layout("lidar", packet.frame, "expected point cloud").into());
        };
        Self::check_layout(packet.frame, cloud)?;

        let path = self.dir.join(SensorKind::Lidar.frame_file_name(packet.frame));
        fs::write(&path, &cloud.data).map_err(|source| DispatcherError::Write {
            path: path.clone(),
            source,
        })?;

        trace!(points = cloud.num_points, path = %path.display(), "point cloud written");
        Ok(path)
    }
}
