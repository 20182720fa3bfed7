//! SensorPacket - sensor callback payload
//!
//! Raw per-frame sensor data as delivered by the simulator.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Sensor kind
///
/// The capture rig carries exactly one sensor of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Rotating ray-cast range scanner
    Lidar,
    /// Forward RGB camera
    Camera,
}

impl SensorKind {
    /// Both kinds, in teardown order
    pub const ALL: [SensorKind; 2] = [SensorKind::Lidar, SensorKind::Camera];

    /// Short name used in logs and metric labels
    pub fn as_str(self) -> &'static str {
        match self {
            SensorKind::Lidar => "lidar",
            SensorKind::Camera => "camera",
        }
    }

    /// Output subdirectory under the capture root (KITTI layout)
    pub fn output_dir_name(self) -> &'static str {
        match self {
            SensorKind::Lidar => "velodyne",
            SensorKind::Camera => "images",
        }
    }

    /// File suffix of per-frame artifacts
    pub fn file_extension(self) -> &'static str {
        match self {
            SensorKind::Lidar => "bin",
            SensorKind::Camera => "png",
        }
    }

    /// Default CARLA blueprint id
    pub fn default_blueprint(self) -> &'static str {
        match self {
            SensorKind::Lidar => "sensor.lidar.ray_cast",
            SensorKind::Camera => "sensor.camera.rgb",
        }
    }

    /// Artifact file name for a frame index, zero-padded to 6 digits
    pub fn frame_file_name(self, frame: u64) -> String {
        format!("{:06}.{}", frame, self.file_extension())
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensor data packet
///
/// One packet per sensor callback invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorPacket {
    /// Producing sensor
    pub sensor_kind: SensorKind,

    /// CARLA simulation timestamp (seconds)
    pub timestamp: f64,

    /// Simulator frame index at production time
    pub frame: u64,

    /// Data payload
    pub payload: SensorPayload,
}

/// Sensor data payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SensorPayload {
    /// Camera image
    Image(ImageData),

    /// LiDAR point cloud
    PointCloud(PointCloudData),
}

/// Camera image
///
/// `data` is row-major BGRA8, exactly as CARLA's `sensor.camera.rgb` emits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    /// Image width
    pub width: u32,

    /// Image height
    pub height: u32,

    /// Raw BGRA pixels
    pub data: Bytes,
}

impl ImageData {
    /// Bytes per BGRA pixel
    pub const CHANNELS: usize = 4;

    /// Byte length `data` must have for the declared resolution
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * Self::CHANNELS
    }
}

/// LiDAR point cloud
///
/// `data` is a contiguous sequence of little-endian `f32` (x, y, z, intensity) tuples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloudData {
    /// Point count
    pub num_points: u32,

    /// Bytes per point (16 for x, y, z, intensity)
    pub point_stride: u32,

    /// Point data
    pub data: Bytes,
}

impl PointCloudData {
    /// Stride of one (x, y, z, intensity) point
    pub const POINT_STRIDE: u32 = 16;

    /// Build from raw bytes, deriving the point count from the length
    pub fn from_raw(data: Bytes) -> Self {
        Self {
            num_points: (data.len() / Self::POINT_STRIDE as usize) as u32,
            point_stride: Self::POINT_STRIDE,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_file_name_padding() {
        assert_eq!(SensorKind::Lidar.frame_file_name(42), "000042.bin");
        assert_eq!(SensorKind::Camera.frame_file_name(123456), "123456.png");
        assert_eq!(SensorKind::Camera.frame_file_name(0), "000000.png");
    }

    #[test]
    fn test_output_dir_names() {
        assert_eq!(SensorKind::Lidar.output_dir_name(), "velodyne");
        assert_eq!(SensorKind::Camera.output_dir_name(), "images");
    }

    #[test]
    fn test_point_cloud_from_raw() {
        let pc = PointCloudData::from_raw(Bytes::from(vec![0u8; 16 * 5]));
        assert_eq!(pc.num_points, 5);
        assert_eq!(pc.point_stride, 16);
    }

    #[test]
    fn test_sensor_kind_serde() {
        let json = serde_json::to_string(&SensorKind::Lidar).unwrap();
        assert_eq!(json, "\"lidar\"");
        let kind: SensorKind = serde_json::from_str("\"camera\"").unwrap();
        assert_eq!(kind, SensorKind::Camera);
    }
}
