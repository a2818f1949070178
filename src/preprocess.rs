//! Turning a decoded RGB image into the model's input tensor.
//!
//! The settings come from the `preprocessor_config.json` shipped alongside
//! the model. Missing keys fall back to the values a pretrained vision
//! transformer artifact uses: 224×224 bilinear resize, 1/255 rescale and
//! per-channel normalization with mean and std of 0.5.

use std::fs;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use serde::Deserialize;

use crate::inference::ModelError;

const DEFAULT_SIZE: u32 = 224;

/// `size` / `crop_size` as they appear in preprocessor configs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    HeightWidth { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
    Square(u32),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessorConfig {
    #[serde(default = "enabled")]
    pub do_resize: bool,
    #[serde(default)]
    pub size: Option<SizeSpec>,
    /// PIL resampling code.
    #[serde(default = "default_resample")]
    pub resample: u8,
    #[serde(default)]
    pub do_center_crop: bool,
    #[serde(default)]
    pub crop_size: Option<SizeSpec>,
    #[serde(default = "enabled")]
    pub do_rescale: bool,
    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f32,
    #[serde(default = "enabled")]
    pub do_normalize: bool,
    #[serde(default = "default_mean_std")]
    pub image_mean: Vec<f32>,
    #[serde(default = "default_mean_std")]
    pub image_std: Vec<f32>,
}

fn enabled() -> bool {
    true
}

fn default_resample() -> u8 {
    2
}

fn default_rescale_factor() -> f32 {
    1.0 / 255.0
}

fn default_mean_std() -> Vec<f32> {
    vec![0.5, 0.5, 0.5]
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Resize {
    Exact { width: u32, height: u32 },
    ShortestEdge(u32),
}

/// A validated preprocessing pipeline with a fixed output size.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    resize: Option<Resize>,
    crop: Option<(u32, u32)>,
    filter: FilterType,
    scale: Option<f32>,
    normalize: Option<([f32; 3], [f32; 3])>,
    width: u32,
    height: u32,
}

impl Preprocessor {
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PreprocessorConfig =
            serde_json::from_str(&raw).map_err(|source| ModelError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(&config)
    }

    pub fn new(config: &PreprocessorConfig) -> Result<Self, ModelError> {
        let resize = if config.do_resize {
            Some(match config.size.unwrap_or(SizeSpec::Square(DEFAULT_SIZE)) {
                SizeSpec::HeightWidth { height, width } => Resize::Exact { width, height },
                SizeSpec::Square(side) => Resize::Exact {
                    width: side,
                    height: side,
                },
                SizeSpec::ShortestEdge { shortest_edge } => Resize::ShortestEdge(shortest_edge),
            })
        } else {
            None
        };

        let crop = if config.do_center_crop {
            match config.crop_size {
                Some(SizeSpec::HeightWidth { height, width }) => Some((width, height)),
                Some(SizeSpec::Square(side)) => Some((side, side)),
                Some(SizeSpec::ShortestEdge { .. }) => {
                    return Err(ModelError::InvalidPreprocessor(
                        "crop_size must give an exact size".to_string(),
                    ))
                }
                None => Some((DEFAULT_SIZE, DEFAULT_SIZE)),
            }
        } else {
            None
        };

        let (width, height) = match (crop, resize) {
            (Some(dims), _) => dims,
            (None, Some(Resize::Exact { width, height })) => (width, height),
            (None, Some(Resize::ShortestEdge(_))) | (None, None) => {
                return Err(ModelError::InvalidPreprocessor(
                    "input size is not fixed: set an exact size or enable center crop".to_string(),
                ))
            }
        };
        let empty_resize = match resize {
            Some(Resize::Exact { width, height }) => width == 0 || height == 0,
            Some(Resize::ShortestEdge(edge)) => edge == 0,
            None => false,
        };
        if width == 0 || height == 0 || empty_resize {
            return Err(ModelError::InvalidPreprocessor(format!(
                "input size {width}x{height} is empty"
            )));
        }

        let normalize = if config.do_normalize {
            let mean = per_channel(&config.image_mean, "image_mean")?;
            let std = per_channel(&config.image_std, "image_std")?;
            if std.iter().any(|s| *s == 0.0) {
                return Err(ModelError::InvalidPreprocessor(
                    "image_std contains zero".to_string(),
                ));
            }
            Some((mean, std))
        } else {
            None
        };

        Ok(Self {
            resize,
            crop,
            filter: filter_for(config.resample)?,
            scale: config.do_rescale.then_some(config.rescale_factor),
            normalize,
            width,
            height,
        })
    }

    /// `(height, width)` of the tensor this preprocessor produces.
    pub fn output_size(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    /// Produces a `(1, 3, H, W)` NCHW tensor.
    pub fn to_tensor(&self, image: &RgbImage) -> Array4<f32> {
        let image = self.resize_and_crop(image);
        let (width, height) = (self.width as usize, self.height as usize);

        let mut tensor = Array4::zeros((1, 3, height, width));
        for (x, y, pixel) in image.enumerate_pixels() {
            for c in 0..3 {
                let mut value = pixel[c] as f32;
                if let Some(scale) = self.scale {
                    value *= scale;
                }
                if let Some((mean, std)) = &self.normalize {
                    value = (value - mean[c]) / std[c];
                }
                tensor[[0, c, y as usize, x as usize]] = value;
            }
        }
        tensor
    }

    fn resize_and_crop(&self, image: &RgbImage) -> RgbImage {
        let resized = match self.resize {
            Some(Resize::Exact { width, height }) => {
                imageops::resize(image, width, height, self.filter)
            }
            Some(Resize::ShortestEdge(edge)) => {
                let (w, h) = shortest_edge_dims(image.width(), image.height(), edge);
                imageops::resize(image, w, h, self.filter)
            }
            None => image.clone(),
        };

        let (target_w, target_h) = (self.width, self.height);
        if resized.width() < target_w || resized.height() < target_h || self.crop.is_none() {
            if resized.dimensions() == (target_w, target_h) {
                return resized;
            }
            return imageops::resize(&resized, target_w, target_h, self.filter);
        }

        let left = (resized.width() - target_w) / 2;
        let top = (resized.height() - target_h) / 2;
        imageops::crop_imm(&resized, left, top, target_w, target_h).to_image()
    }
}

fn per_channel(values: &[f32], name: &str) -> Result<[f32; 3], ModelError> {
    match values {
        [v] => Ok([*v; 3]),
        [r, g, b] => Ok([*r, *g, *b]),
        _ => Err(ModelError::InvalidPreprocessor(format!(
            "{name} must have 1 or 3 values, got {}",
            values.len()
        ))),
    }
}

/// Maps PIL resampling codes onto `image` filters. Box (4) and hamming (5)
/// have no equivalent and are refused rather than approximated.
fn filter_for(resample: u8) -> Result<FilterType, ModelError> {
    match resample {
        0 => Ok(FilterType::Nearest),
        1 => Ok(FilterType::Lanczos3),
        2 => Ok(FilterType::Triangle),
        3 => Ok(FilterType::CatmullRom),
        other => Err(ModelError::InvalidPreprocessor(format!(
            "unsupported resample filter {other}"
        ))),
    }
}

/// Scales so the shorter side equals `edge`, truncating the longer side.
fn shortest_edge_dims(width: u32, height: u32, edge: u32) -> (u32, u32) {
    let edge = edge as u64;
    let (w, h) = (width.max(1) as u64, height.max(1) as u64);
    if w <= h {
        (edge as u32, (edge * h / w).max(1) as u32)
    } else {
        ((edge * w / h).max(1) as u32, edge as u32)
    }
}
