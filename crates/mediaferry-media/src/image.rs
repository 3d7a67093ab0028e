// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image preparation: decode, downscale, re-encode within a byte budget.
//!
//! The pipeline decodes the source bytes, scales the longest edge down to
//! `max_dimension`, and re-encodes in the source format. When the result
//! still exceeds `max_bytes` it falls back to PNG and walks a greedy
//! compression ladder starting at `png_start_level`.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use mediaferry_core::FerryError;

/// Size and budget limits applied during preparation.
#[derive(Debug, Clone, Copy)]
pub struct ImageLimits {
    /// Longest allowed edge in pixels; 0 disables scaling.
    pub max_dimension: u32,
    /// Byte budget before the PNG fallback kicks in.
    pub max_bytes: usize,
    /// Starting rung of the PNG compression ladder (0-9).
    pub png_start_level: u8,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_dimension: 2000,
            max_bytes: 5 * 1024 * 1024,
            png_start_level: 8,
        }
    }
}

/// The re-encoded payload and its (possibly re-suffixed) filename.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub data: Vec<u8>,
    pub filename: String,
}

/// PNG compression rungs, weakest first. The 0-9 configuration scale
/// maps onto these three encoder tiers.
const PNG_LADDER: &[CompressionType] = &[
    CompressionType::Fast,
    CompressionType::Default,
    CompressionType::Best,
];

fn ladder_rung(level: u8) -> usize {
    match level {
        0..=3 => 0,
        4..=7 => 1,
        _ => 2,
    }
}

/// Prepares image bytes for upload.
pub fn prepare(
    data: &[u8],
    filename: &str,
    limits: &ImageLimits,
) -> Result<PreparedImage, FerryError> {
    let format = image::guess_format(data).ok();
    let img = image::load_from_memory(data).map_err(|e| FerryError::Media {
        message: format!("cannot decode {filename}"),
        source: Some(Box::new(e)),
    })?;

    let img = resize_if_needed(img, limits.max_dimension);

    let (encoded, out_name) = encode_original(&img, format, filename)?;
    if encoded.len() <= limits.max_bytes {
        return Ok(PreparedImage {
            data: encoded,
            filename: out_name,
        });
    }

    let data = compress_png_greedy(&img, limits.max_bytes, limits.png_start_level)?;
    Ok(PreparedImage {
        data,
        filename: replace_ext(filename, ".png"),
    })
}

fn resize_if_needed(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    if max_dimension == 0 {
        return img;
    }
    let longest = img.width().max(img.height());
    if longest <= max_dimension {
        return img;
    }
    // resize preserves aspect ratio and fits within the given bounds.
    img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

fn encode_original(
    img: &DynamicImage,
    format: Option<ImageFormat>,
    filename: &str,
) -> Result<(Vec<u8>, String), FerryError> {
    let lower = filename.to_lowercase();
    match format {
        Some(ImageFormat::Jpeg) => Ok((encode_jpeg(img, filename)?, filename.to_string())),
        Some(ImageFormat::Png) => Ok((
            encode_png(img, CompressionType::Default)?,
            ensure_ext(filename, ".png"),
        )),
        Some(ImageFormat::Gif) => Ok((encode_gif(img, filename)?, ensure_ext(filename, ".gif"))),
        _ if lower.ends_with(".jpg") || lower.ends_with(".jpeg") => {
            Ok((encode_jpeg(img, filename)?, filename.to_string()))
        }
        _ => Ok((
            encode_png(img, CompressionType::Default)?,
            ensure_ext(filename, ".png"),
        )),
    }
}

fn encode_jpeg(img: &DynamicImage, filename: &str) -> Result<Vec<u8>, FerryError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, 90);
    // JPEG has no alpha channel.
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| FerryError::Media {
            message: format!("cannot encode {filename} as JPEG"),
            source: Some(Box::new(e)),
        })?;
    Ok(buffer)
}

fn encode_png(img: &DynamicImage, compression: CompressionType) -> Result<Vec<u8>, FerryError> {
    let mut buffer = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buffer, compression, PngFilterType::Adaptive);
    img.write_with_encoder(encoder).map_err(|e| FerryError::Media {
        message: "cannot encode as PNG".into(),
        source: Some(Box::new(e)),
    })?;
    Ok(buffer)
}

fn encode_gif(img: &DynamicImage, filename: &str) -> Result<Vec<u8>, FerryError> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Gif)
        .map_err(|e| FerryError::Media {
            message: format!("cannot encode {filename} as GIF"),
            source: Some(Box::new(e)),
        })?;
    Ok(buffer.into_inner())
}

/// Walks the PNG ladder greedily: step toward stronger compression while
/// over budget, toward weaker while under. Returns the best attempt even
/// when nothing fits the budget.
fn compress_png_greedy(
    img: &DynamicImage,
    max_bytes: usize,
    start_level: u8,
) -> Result<Vec<u8>, FerryError> {
    let start = ladder_rung(start_level.min(9));
    let mut best = encode_png(img, PNG_LADDER[start])?;

    if best.len() > max_bytes {
        for compression in PNG_LADDER.iter().skip(start + 1) {
            let data = encode_png(img, *compression)?;
            best = data;
            if best.len() <= max_bytes {
                return Ok(best);
            }
        }
        return Ok(best);
    }

    for rung in (0..start).rev() {
        let data = encode_png(img, PNG_LADDER[rung])?;
        if data.len() <= max_bytes {
            best = data;
        } else {
            break;
        }
    }
    Ok(best)
}

fn ensure_ext(filename: &str, ext: &str) -> String {
    if filename.to_lowercase().ends_with(ext) {
        filename.to_string()
    } else {
        replace_ext(filename, ext)
    }
}

fn replace_ext(filename: &str, ext: &str) -> String {
    match filename.rfind('.') {
        Some(idx) => format!("{}{ext}", &filename[..idx]),
        None => format!("{filename}{ext}"),
    }
}
