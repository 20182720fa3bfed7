//! FrameWriter implementations
//!
//! Contains LidarBinWriter and PngImageWriter.

mod lidar_bin;
mod png_image;

pub use self::lidar_bin::LidarBinWriter;
pub use self::png_image::PngImageWriter;
