//! PngImageWriter - camera frames as 3-channel PNG

use std::path::{Path, PathBuf};

use contracts::{ContractError, ImageData, SensorKind, SensorPacket, SensorPayload};
use tracing::{instrument, trace};

use crate::error::DispatcherError;
use crate::writer::{ensure_kind, FrameWriter};

/// Encodes BGRA camera frames as RGB `{frame:06}.png`
pub struct PngImageWriter {
    dir: PathBuf,
}

impl PngImageWriter {
    /// Create a writer for an existing directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Drop alpha and reorder BGRA to RGB
fn bgra_to_rgb(bgra: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(bgra.len() / ImageData::CHANNELS * 3);
    for px in bgra.chunks_exact(ImageData::CHANNELS) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    rgb
}

impl FrameWriter for PngImageWriter {
    fn sensor_kind(&self) -> SensorKind {
        SensorKind::Camera
    }

    fn output_dir(&self) -> &Path {
        &self.dir
    }

    #[instrument(
        name = "png_image_write",
        skip(self, packet),
        fields(frame = packet.frame)
    )]
    fn write_frame(&mut self, packet: &SensorPacket) -> Result<PathBuf, DispatcherError> {
        ensure_kind(SensorKind::Camera, packet)?;
        let SensorPayload::Image(image) = &packet.payload else {
            return Err(ContractError::payload_layout("camera", packet.frame, "expected image").into());
        };
        if image.data.len() != image.expected_len() {
            return Err(ContractError::payload_layout(
                "camera",
                packet.frame,
                format!(
                    "{} bytes for {}x{} BGRA, expected {}",
                    image.data.len(),
                    image.width,
                    image.height,
                    image.expected_len()
                ),
            )
            .into());
        }

        let path = self.dir.join(SensorKind::Camera.frame_file_name(packet.frame));
        let rgb = bgra_to_rgb(&image.data);
        image::save_buffer(&path, &rgb, image.width, image.height, image::ColorType::Rgb8)
            .map_err(|e| DispatcherError::encode(path.clone(), e.to_string()))?;

        trace!(width = image.width, height = image.height, path = %path.display(), "image written");
        Ok(path)
    }
}
