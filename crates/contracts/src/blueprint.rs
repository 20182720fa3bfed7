//! CaptureBlueprint - Config Loader output
//!
//! Describes the whole capture run: server address, frame budget, the ego
//! vehicle and its two sensors. Every field defaults to the stock rig, so an
//! empty configuration file is valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use validator::Validate;

/// Complete capture configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CaptureBlueprint {
    /// CARLA server connection
    #[validate(nested)]
    pub carla: CarlaConfig,

    /// Capture loop settings
    #[validate(nested)]
    pub capture: CaptureSettings,

    /// Ego vehicle
    #[validate(nested)]
    pub vehicle: VehicleConfig,

    /// Roof-mounted range scanner
    #[validate(nested)]
    pub lidar: LidarConfig,

    /// Forward camera
    #[validate(nested)]
    pub camera: CameraConfig,
}

/// CARLA server connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CarlaConfig {
    /// Server host
    #[validate(length(min = 1))]
    pub host: String,

    /// Server RPC port
    #[validate(range(min = 1))]
    pub port: u16,

    /// Connect timeout (seconds)
    #[validate(range(min = 0.1, max = 600.0))]
    pub timeout_sec: f64,
}

impl CarlaConfig {
    /// Connect timeout as `Duration`
    ///
    /// Fails for negative, NaN or overflowing values.
    pub fn timeout(&self) -> Result<Duration, ContractError> {
        Duration::try_from_secs_f64(self.timeout_sec).map_err(|e| {
            ContractError::config_validation(
                "carla.timeout_sec",
                format!("invalid timeout {}: {e}", self.timeout_sec),
            )
        })
    }
}

impl Default for CarlaConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2000,
            timeout_sec: 5.0,
        }
    }
}

/// Capture loop settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CaptureSettings {
    /// Frame budget: simulator frames to capture after the baseline
    #[validate(range(min = 1))]
    pub frames: u64,

    /// Output root; `velodyne/` and `images/` are created beneath it
    pub output_dir: Option<PathBuf>,

    /// Frame counter polling interval (milliseconds)
    #[validate(range(min = 1, max = 10000))]
    pub poll_interval_ms: u64,

    /// Per-sensor writer queue capacity (frames)
    #[validate(range(min = 1, max = 4096))]
    pub queue_capacity: usize,
}

impl CaptureSettings {
    /// Polling interval as `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            frames: 600,
            output_dir: None,
            poll_interval_ms: 50,
            queue_capacity: 64,
        }
    }
}

/// Ego vehicle configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct VehicleConfig {
    /// Blueprint name, matched exactly against the first catalog filter result
    #[validate(length(min = 1))]
    pub blueprint: String,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            blueprint: "vehicle.tesla.model3".to_string(),
        }
    }
}

/// Ray-cast LiDAR configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LidarConfig {
    /// Blueprint id
    #[validate(length(min = 1))]
    pub blueprint: String,

    /// Laser channel count
    #[validate(range(min = 1, max = 256))]
    pub channels: u32,

    /// Rotation frequency (Hz)
    #[validate(range(min = 0.1, max = 100.0))]
    pub rotation_frequency: f64,

    /// Points generated per second, all channels
    #[validate(range(min = 1))]
    pub points_per_second: u32,

    /// Upper field of view limit (degrees); simulator default when unset
    #[validate(range(min = -90.0, max = 90.0))]
    pub upper_fov: Option<f64>,

    /// Lower field of view limit (degrees); simulator default when unset
    #[validate(range(min = -90.0, max = 90.0))]
    pub lower_fov: Option<f64>,

    /// Mount pose relative to the vehicle
    pub mount: Transform,
}

impl LidarConfig {
    /// String attributes applied to the blueprint before spawn
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            ("channels", self.channels.to_string()),
            ("rotation_frequency", self.rotation_frequency.to_string()),
            ("points_per_second", self.points_per_second.to_string()),
        ];
        if let Some(upper) = self.upper_fov {
            attrs.push(("upper_fov", upper.to_string()));
        }
        if let Some(lower) = self.lower_fov {
            attrs.push(("lower_fov", lower.to_string()));
        }
        attrs
    }
}

impl Default for LidarConfig {
    fn default() -> Self {
        Self {
            blueprint: "sensor.lidar.ray_cast".to_string(),
            channels: 64,
            rotation_frequency: 10.0,
            points_per_second: 1_300_000,
            upper_fov: None,
            lower_fov: None,
            mount: Transform::at(0.0, 0.0, 1.8),
        }
    }
}

/// RGB camera configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CameraConfig {
    /// Blueprint id
    #[validate(length(min = 1))]
    pub blueprint: String,

    /// Image width (pixels)
    #[validate(range(min = 1, max = 8192))]
    pub image_size_x: u32,

    /// Image height (pixels)
    #[validate(range(min = 1, max = 8192))]
    pub image_size_y: u32,

    /// Horizontal field of view (degrees)
    #[validate(range(min = 1.0, max = 179.0))]
    pub fov: f64,

    /// Mount pose relative to the vehicle
    pub mount: Transform,
}

impl CameraConfig {
    /// String attributes applied to the blueprint before spawn
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("image_size_x", self.image_size_x.to_string()),
            ("image_size_y", self.image_size_y.to_string()),
            ("fov", self.fov.to_string()),
        ]
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            blueprint: "sensor.camera.rgb".to_string(),
            image_size_x: 1280,
            image_size_y: 720,
            fov: 90.0,
            mount: Transform::at(1.2, 0.0, 1.5),
        }
    }
}

/// 3D pose
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// Position (x, y, z), meters
    pub location: Location,

    /// Orientation (pitch, yaw, roll), degrees
    pub rotation: Rotation,
}

impl Transform {
    /// Pure translation
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            location: Location { x, y, z },
            rotation: Rotation::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}
