//! CARLA 传感器数据转换
//!
//! 将 CARLA 原生传感器数据转换为 `SensorPacket`。
//! 仅在 `real-carla` feature 启用时编译。

use bytes::Bytes;
use carla::sensor::data::{Image, LidarMeasurement};
use carla::sensor::{SensorData, SensorDataBase};
use contracts::{ImageData, PointCloudData, SensorKind, SensorPacket, SensorPayload};

/// 将 POD 切片转换为 bytes::Bytes
///
/// # Safety
/// 调用者必须确保 T 是 POD 类型
#[inline]
unsafe fn pod_slice_to_bytes_unchecked<T>(slice: &[T]) -> Bytes {
    let ptr = slice.as_ptr() as *const u8;
    let len = std::mem::size_of_val(slice);
    Bytes::copy_from_slice(std::slice::from_raw_parts(ptr, len))
}

/// 将 CARLA Image (BGRA8) 转换为 SensorPayload
fn image_to_payload(image: &Image) -> SensorPayload {
    let data = Bytes::copy_from_slice(image.as_raw_bytes());
    SensorPayload::Image(ImageData {
        width: image.width() as u32,
        height: image.height() as u32,
        data,
    })
}

/// 将 CARLA LidarMeasurement 转换为 SensorPayload
fn lidar_to_payload(lidar: &LidarMeasurement) -> SensorPayload {
    let points = lidar.as_slice();
    // LidarDetection 为 4 个 f32 (x, y, z, intensity)
    let data = unsafe { pod_slice_to_bytes_unchecked(points) };
    SensorPayload::PointCloud(PointCloudData {
        num_points: points.len() as u32,
        point_stride: PointCloudData::POINT_STRIDE,
        data,
    })
}

/// 将 CARLA 传感器数据转换为 SensorPacket
///
/// 如果数据类型与传感器类型不匹配，返回 None。
pub fn convert_sensor_data(kind: SensorKind, data: &SensorData) -> Option<SensorPacket> {
    let timestamp = data.timestamp();
    let frame = data.frame() as u64;

    let payload = match kind {
        SensorKind::Camera => {
            let image = Image::try_from(data.clone()).ok()?;
            image_to_payload(&image)
        }
        SensorKind::Lidar => {
            let lidar = LidarMeasurement::try_from(data.clone()).ok()?;
            lidar_to_payload(&lidar)
        }
    };

    Some(SensorPacket {
        sensor_kind: kind,
        timestamp,
        frame,
        payload,
    })
}
