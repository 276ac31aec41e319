use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use fxlab_contracts::ImageTensor;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use ndarray::Array4;

use crate::error::DecodeError;

pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";
const JPEG_QUALITY: u8 = 90;

/// JPEG-encodes the first image of the batch and returns it as a data URI.
pub fn encode_for_upload(tensor: &ImageTensor) -> Result<String> {
    let rgb = frame_to_rgb(tensor, 0)?;
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .context("JPEG encoding failed")?;
    Ok(format!("{JPEG_DATA_URI_PREFIX}{}", BASE64.encode(bytes)))
}

/// Accepts raw base64 or a data URI, and yields a one-image batch.
pub fn decode_from_response(encoded: &str) -> Result<ImageTensor, DecodeError> {
    let payload: String = strip_data_uri(encoded)
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }
    let bytes = BASE64.decode(payload.as_bytes())?;
    let image = image::load_from_memory(&bytes)?;
    rgb_to_tensor(&image.to_rgb8()).ok_or(DecodeError::NoPixels)
}

/// Everything after the first comma, or the input unchanged when there is none.
pub fn strip_data_uri(encoded: &str) -> &str {
    match encoded.split_once(',') {
        Some((_, data)) => data,
        None => encoded,
    }
}

pub fn frame_to_rgb(tensor: &ImageTensor, index: usize) -> Result<RgbImage> {
    let frame = tensor
        .frame(index)
        .with_context(|| format!("image batch has no frame {index}"))?;
    let (height, width, _) = frame.dim();
    let width = u32::try_from(width).context("image too wide")?;
    let height = u32::try_from(height).context("image too tall")?;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let (row, col) = (y as usize, x as usize);
        Rgb([
            channel_to_u8(frame[[row, col, 0]]),
            channel_to_u8(frame[[row, col, 1]]),
            channel_to_u8(frame[[row, col, 2]]),
        ])
    }))
}

pub fn rgb_to_tensor(image: &RgbImage) -> Option<ImageTensor> {
    let (width, height) = image.dimensions();
    let data = Array4::from_shape_fn(
        (1, height as usize, width as usize, 3),
        |(_, row, col, channel)| {
            f32::from(image.get_pixel(col as u32, row as u32)[channel]) / 255.0
        },
    );
    ImageTensor::new(data).ok()
}

pub fn load_image_file(path: &Path) -> Result<ImageTensor> {
    let image = image::open(path)
        .with_context(|| format!("failed to read image {}", path.display()))?;
    rgb_to_tensor(&image.to_rgb8())
        .with_context(|| format!("image {} has no pixels", path.display()))
}

/// Writes every frame as `<stem>-NN.png` and returns the paths in batch order.
pub fn save_batch_png(tensor: &ImageTensor, dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let mut paths = Vec::new();
    for index in 0..tensor.batch() {
        let path = dir.join(format!("{stem}-{index:02}.png"));
        frame_to_rgb(tensor, index)?
            .save(&path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        paths.push(path);
    }
    Ok(paths)
}

fn channel_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
