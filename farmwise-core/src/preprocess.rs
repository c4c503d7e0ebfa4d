//! Image preparation matching the classifier's training pipeline

use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use ndarray::Array4;

use crate::error::{Error, Result};

/// Contrast and sharpness boost applied before resizing.
const ENHANCE_FACTOR: f32 = 1.3;
/// Fraction of each edge removed by the center crop.
const CROP_MARGIN: f64 = 0.10;

const SMOOTH_KERNEL: [[u32; 3]; 3] = [[1, 1, 1], [1, 5, 1], [1, 1, 1]];
const SMOOTH_DIVISOR: f32 = 13.0;

/// Decode an uploaded photo and shape it for the classifier.
///
/// The arithmetic follows Pillow step for step (integer luma, extrapolating
/// enhancement blends, border-copying smooth filter) because the model was
/// trained on tensors produced that way. Channel values stay in the raw
/// 0..=255 range; the exported graph expects unscaled input.
pub fn preprocess(bytes: &[u8], target_w: u32, target_h: u32) -> Result<Array4<f32>> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| Error::ImageDecode(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    let cropped = center_crop(&rgb)?;
    let contrasted = enhance_contrast(&cropped, ENHANCE_FACTOR);
    let sharpened = enhance_sharpness(&contrasted, ENHANCE_FACTOR);
    let resized = image::imageops::resize(&sharpened, target_w, target_h, FilterType::Lanczos3);
    Ok(to_tensor(&resized))
}

/// Trim a tenth of the width and height from each edge.
fn center_crop(img: &RgbImage) -> Result<RgbImage> {
    let (w, h) = img.dimensions();
    let margin_w = (w as f64 * CROP_MARGIN) as u32;
    let margin_h = (h as f64 * CROP_MARGIN) as u32;
    let cropped_w = w.saturating_sub(margin_w * 2);
    let cropped_h = h.saturating_sub(margin_h * 2);
    if cropped_w == 0 || cropped_h == 0 {
        return Err(Error::ImageDecode(
            "image is empty after margin crop".to_string(),
        ));
    }
    Ok(image::imageops::crop_imm(img, margin_w, margin_h, cropped_w, cropped_h).to_image())
}

/// ITU-R 601-2 luma of one pixel, in integer arithmetic.
fn luma(px: &Rgb<u8>) -> u64 {
    let [r, g, b] = px.0;
    (299 * r as u64 + 587 * g as u64 + 114 * b as u64) / 1000
}

/// Push every channel away from the mean luma level.
fn enhance_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let mut luma_sum: u64 = 0;
    for px in img.pixels() {
        luma_sum += luma(px);
    }
    let count = (img.width() as u64 * img.height() as u64).max(1);
    let gray = (luma_sum as f64 / count as f64 + 0.5) as u8;
    let mut out = img.clone();
    for px in out.pixels_mut() {
        for c in px.0.iter_mut() {
            *c = extrapolate(gray, *c, factor);
        }
    }
    out
}

/// Push every channel away from its smoothed value.
fn enhance_sharpness(img: &RgbImage, factor: f32) -> RgbImage {
    let mut out = smooth(img);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let orig = img.get_pixel(x, y);
        for c in 0..3 {
            px.0[c] = extrapolate(px.0[c], orig.0[c], factor);
        }
    }
    out
}

/// 3x3 smoothing kernel over interior pixels; border pixels are copied.
fn smooth(img: &RgbImage) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut out = img.clone();
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0u32; 3];
            for (ky, row) in SMOOTH_KERNEL.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    let px = img.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1);
                    for c in 0..3 {
                        acc[c] += weight * px.0[c] as u32;
                    }
                }
            }
            let mut filtered = [0u8; 3];
            for c in 0..3 {
                let ss = acc[c] as f32 / SMOOTH_DIVISOR + 0.5;
                filtered[c] = ss.clamp(0.0, 255.0) as u8;
            }
            out.put_pixel(x, y, Rgb(filtered));
        }
    }
    out
}

/// Pillow blend in the extrapolation regime: clamp to [0, 255], otherwise
/// truncate toward zero.
fn extrapolate(base: u8, value: u8, factor: f32) -> u8 {
    let temp = base as f32 + factor * (value as f32 - base as f32);
    if temp <= 0.0 {
        0
    } else if temp >= 255.0 {
        255
    } else {
        temp as u8
    }
}

/// Lay pixels out as a batch-of-one NHWC float tensor.
fn to_tensor(img: &RgbImage) -> Array4<f32> {
    let (w, h) = img.dimensions();
    Array4::from_shape_fn((1, h as usize, w as usize, 3), |(_, y, x, c)| {
        img.get_pixel(x as u32, y as u32).0[c] as f32
    })
}
