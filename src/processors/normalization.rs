//! Image normalization and batching.
//!
//! Converts decoded images into the channels-last `(batch, height, width,
//! channels)` tensors a classifier expects, applying the pixel scaling its
//! pretrained weights were trained with.

use candle_core::{Device, Tensor};
use image::DynamicImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::core::{ArchError, ArchResult, InputShape};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
/// Caffe means in BGR order, on the 0..255 scale.
const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

/// Pixel normalization convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreprocessMode {
    /// Scale to `[-1, 1]`: `x / 127.5 - 1`.
    Tf,
    /// Scale to `[0, 1]`, then subtract the ImageNet mean and divide by its std.
    Torch,
    /// Reorder RGB to BGR and subtract the ImageNet mean on the 0..255 scale.
    Caffe,
}

impl PreprocessMode {
    /// Normalizes one pixel value of channel `channel`, where `channel` indexes
    /// the output layout (already reordered for `Caffe`).
    fn normalize(&self, value: u8, channel: usize) -> f32 {
        let value = f32::from(value);
        let c = channel.min(2);
        match self {
            PreprocessMode::Tf => value / 127.5 - 1.0,
            PreprocessMode::Torch => (value / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c],
            PreprocessMode::Caffe => value - CAFFE_MEAN_BGR[c],
        }
    }
}

/// Resizes and normalizes images into a classifier input batch.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    input: InputShape,
    mode: PreprocessMode,
    filter: FilterType,
}

impl ImagePreprocessor {
    /// Creates a preprocessor for `input` using `mode`.
    pub fn new(input: InputShape, mode: PreprocessMode) -> Self {
        Self {
            input,
            mode,
            filter: FilterType::Triangle,
        }
    }

    /// Sets the resampling filter.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn mode(&self) -> PreprocessMode {
        self.mode
    }

    pub fn input_shape(&self) -> InputShape {
        self.input
    }

    /// Converts one image to channels-last normalized values.
    ///
    /// One-channel inputs use the luma of the image; three-channel inputs use
    /// RGB, or BGR in `Caffe` mode.
    pub fn normalize_image(&self, image: &DynamicImage) -> ArchResult<Vec<f32>> {
        let (h, w) = (self.input.height as u32, self.input.width as u32);
        let resized = image.resize_exact(w, h, self.filter);
        match self.input.channels {
            1 => Ok(resized
                .to_luma8()
                .into_raw()
                .into_iter()
                .map(|v| self.mode.normalize(v, 0))
                .collect()),
            3 => {
                let rgb = resized.to_rgb8();
                let mut data = Vec::with_capacity(rgb.as_raw().len());
                for pixel in rgb.pixels() {
                    let [r, g, b] = pixel.0;
                    let ordered = if self.mode == PreprocessMode::Caffe {
                        [b, g, r]
                    } else {
                        [r, g, b]
                    };
                    for (c, value) in ordered.into_iter().enumerate() {
                        data.push(self.mode.normalize(value, c));
                    }
                }
                Ok(data)
            }
            other => Err(ArchError::invalid_input(format!(
                "images can only be converted to 1 or 3 channels, model expects {other}"
            ))),
        }
    }

    /// Builds a `(batch, height, width, channels)` f32 tensor from `images`.
    pub fn preprocess(&self, images: &[DynamicImage], device: &Device) -> ArchResult<Tensor> {
        if images.is_empty() {
            return Err(ArchError::invalid_input("cannot preprocess an empty batch"));
        }
        let mut data = Vec::with_capacity(
            images.len() * self.input.height * self.input.width * self.input.channels,
        );
        for image in images {
            data.extend(self.normalize_image(image)?);
        }
        Ok(Tensor::from_vec(
            data,
            self.input.batch_nhwc(images.len()),
            device,
        )?)
    }
}
