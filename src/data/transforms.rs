//! Image preprocessing for inference on arbitrary files.
//!
//! Mirrors what the training data looks like: RGB, resized to the network's
//! input side, channel-major, pixel values normalized to [0, 1].

use std::path::Path;

use candle_core::{Device, Tensor};
use image::imageops::FilterType;
use image::DynamicImage;

use crate::data::error::DataError;
use crate::error::Result;

/// Resizes to `side × side` and flattens as R plane, G plane, B plane,
/// normalized to [0, 1].
///
/// Returns a flat `Vec<f32>` of length `3 * side * side`.
pub fn to_chw_unit(img: &DynamicImage, side: u32) -> Vec<f32> {
    let rgb = img.resize_exact(side, side, FilterType::Triangle).to_rgb8();
    let plane = (side * side) as usize;
    let mut out = vec![0.0f32; 3 * plane];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            out[c * plane + i] = pixel.0[c] as f32 / 255.0;
        }
    }
    out
}

/// Decodes image bytes (PNG/JPEG/BMP/GIF) into a `[1, 3, side, side]` tensor.
pub fn image_bytes_to_tensor(bytes: &[u8], side: u32, device: &Device) -> Result<Tensor> {
    let img = image::load_from_memory(bytes).map_err(DataError::from)?;
    let data = to_chw_unit(&img, side);
    let side = side as usize;
    Ok(Tensor::from_vec(data, (1, 3, side, side), device)?)
}

/// Reads an image file into a `[1, 3, side, side]` tensor.
pub fn image_file_to_tensor(path: &Path, side: u32, device: &Device) -> Result<Tensor> {
    if !path.is_file() {
        return Err(DataError::FileNotFound(path.to_path_buf()).into());
    }
    let bytes = std::fs::read(path).map_err(DataError::from)?;
    image_bytes_to_tensor(&bytes, side, device)
}
