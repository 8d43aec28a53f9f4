use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recognition::domain::face_filter::AdmittedFace;
use crate::shared::bounding_box::CropBounds;
use crate::shared::constants::{ARCFACE_INPUT_SIZE, ARCFACE_MEAN, ARCFACE_STD};
use crate::shared::frame::Frame;

/// Normalized face image in the extractor's input layout, batch size 1.
pub type FaceTensor = Array4<f32>;

/// Axis order of the tensor handed to the embedding model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    /// `[1, 3, H, W]`
    Nchw,
    /// `[1, H, W, 3]`
    Nhwc,
}

/// Pixel normalization applied after resizing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Normalization {
    /// `(x - mean) / std` with constants fixed by the model.
    Fixed { mean: f32, std: f32 },
    /// Per-channel mean-centering and unit scaling; the standard deviation is
    /// floored at `1 / sqrt(pixels)` so flat crops stay finite.
    Standardize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorConfig {
    pub input_size: u32,
    pub layout: ChannelLayout,
    pub normalization: Normalization,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            input_size: ARCFACE_INPUT_SIZE,
            layout: ChannelLayout::Nchw,
            normalization: Normalization::Fixed {
                mean: ARCFACE_MEAN,
                std: ARCFACE_STD,
            },
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessError {
    #[error("face crop {crop:?} has zero area after clamping to the frame")]
    EmptyCrop { crop: CropBounds },
    #[error("expected a 3-channel frame, got {0} channels")]
    UnsupportedChannels(u8),
    #[error("input size must be positive")]
    ZeroInputSize,
}

/// Crops an admitted face, resizes it bicubically to a square of
/// `input_size`, and normalizes it. Deterministic: the same crop always
/// yields the same tensor.
#[derive(Clone, Copy, Debug, Default)]
pub struct FacePreprocessor {
    config: PreprocessorConfig,
}

impl FacePreprocessor {
    pub fn new(config: PreprocessorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessorConfig {
        &self.config
    }

    pub fn prepare(&self, frame: &Frame, face: &AdmittedFace) -> Result<FaceTensor, PreprocessError> {
        if frame.channels() != 3 {
            return Err(PreprocessError::UnsupportedChannels(frame.channels()));
        }
        if self.config.input_size == 0 {
            return Err(PreprocessError::ZeroInputSize);
        }
        let c = face.crop;
        let crop = frame
            .crop(c.left, c.top, c.right, c.bottom)
            .ok_or(PreprocessError::EmptyCrop { crop: c })?;

        let size = self.config.input_size;
        let image = RgbImage::from_raw(crop.width(), crop.height(), crop.into_data())
            .ok_or(PreprocessError::EmptyCrop { crop: c })?;
        let resized = imageops::resize(&image, size, size, FilterType::CatmullRom);

        let (mean, std) = match self.config.normalization {
            Normalization::Fixed { mean, std } => ([mean; 3], [std; 3]),
            Normalization::Standardize => channel_statistics(&resized),
        };

        let s = size as usize;
        let shape = match self.config.layout {
            ChannelLayout::Nchw => (1, 3, s, s),
            ChannelLayout::Nhwc => (1, s, s, 3),
        };
        let mut tensor = Array4::<f32>::zeros(shape);
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let v = (pixel.0[c] as f32 - mean[c]) / std[c];
                match self.config.layout {
                    ChannelLayout::Nchw => tensor[[0, c, y, x]] = v,
                    ChannelLayout::Nhwc => tensor[[0, y, x, c]] = v,
                }
            }
        }
        Ok(tensor)
    }
}

fn channel_statistics(image: &RgbImage) -> ([f32; 3], [f32; 3]) {
    let n = (image.width() as f64) * (image.height() as f64);
    let mut sum = [0.0f64; 3];
    let mut sum_sq = [0.0f64; 3];
    for pixel in image.pixels() {
        for c in 0..3 {
            let v = pixel.0[c] as f64;
            sum[c] += v;
            sum_sq[c] += v * v;
        }
    }

    let floor = 1.0 / n.sqrt();
    let mut mean = [0.0f32; 3];
    let mut std = [0.0f32; 3];
    for c in 0..3 {
        let m = sum[c] / n;
        let var = (sum_sq[c] / n - m * m).max(0.0);
        mean[c] = m as f32;
        std[c] = var.sqrt().max(floor) as f32;
    }
    (mean, std)
}
