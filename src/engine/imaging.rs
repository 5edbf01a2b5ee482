//! Image upload pipeline: decode, fit to a footprint, re-encode as a data URI.
//!
//! There is no size cap on the input; very large sources are slow but accepted.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::path::Path;

use crate::config::ImageConfig;
use crate::engine::editor::ImageRole;

lazy_static! {
    static ref DATA_URI_PATTERN: Regex = Regex::new(r"^data:([\w/+.-]+);base64,(.*)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Footprint {
    /// Exactly `size`×`size` (at least 1); the image is fitted inside and
    /// centered on transparent padding.
    Icon { size: u32 },
    /// Longest side at most `max_dimension`. Never upscaled.
    Banner { max_dimension: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Png,
    Jpeg { quality: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpec {
    pub footprint: Footprint,
    pub encoding: Encoding,
    /// Nearest-neighbour scaling, keeps pixel-art edges sharp.
    pub pixel_art: bool,
}

impl ImageSpec {
    pub fn icon(size: u32) -> Self {
        Self { footprint: Footprint::Icon { size }, encoding: Encoding::Png, pixel_art: false }
    }

    pub fn banner(max_dimension: u32, quality: u8) -> Self {
        Self { footprint: Footprint::Banner { max_dimension }, encoding: Encoding::Jpeg { quality }, pixel_art: false }
    }

    pub fn pixel_art(mut self, enabled: bool) -> Self {
        self.pixel_art = enabled;
        self
    }

    pub fn for_role(role: ImageRole, config: &ImageConfig) -> Self {
        match role {
            ImageRole::Icon => Self::icon(config.icon_size).pixel_art(config.pixel_art),
            ImageRole::Banner => Self::banner(config.banner_max_dimension, config.jpeg_quality),
        }
    }

    fn filter(&self) -> FilterType {
        if self.pixel_art { FilterType::Nearest } else { FilterType::Lanczos3 }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

/// Largest size with the source aspect ratio that fits in `max_w`×`max_h`.
/// Each side is at least one pixel.
pub fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (max_w.max(1), max_h.max(1));
    }
    let scale = f64::min(max_w as f64 / width as f64, max_h as f64 / height as f64);
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_h.max(1));
    (w, h)
}

pub fn process(bytes: &[u8], spec: &ImageSpec) -> Result<ProcessedImage> {
    let source = image::load_from_memory(bytes).context("unsupported or corrupt image")?;
    let fitted = fit(source, spec);
    let (width, height) = (fitted.width(), fitted.height());
    let (mime, encoded) = encode(&fitted, spec.encoding)?;
    debug!("Encoded {}x{} {} ({} bytes)", width, height, mime, encoded.len());

    Ok(ProcessedImage {
        data_uri: format!("data:{};base64,{}", mime, STANDARD.encode(encoded)),
        width,
        height,
    })
}

pub fn process_file<P: AsRef<Path>>(path: P, spec: &ImageSpec) -> Result<ProcessedImage> {
    let bytes = std::fs::read(path.as_ref()).with_context(|| format!("cannot read {}", path.as_ref().display()))?;
    process(&bytes, spec)
}

/// Splits a data URI into its MIME type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let caps = DATA_URI_PATTERN.captures(uri).ok_or_else(|| anyhow!("not a base64 data URI"))?;
    let mime = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
    let payload = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    Ok((mime, STANDARD.decode(payload)?))
}

fn fit(source: DynamicImage, spec: &ImageSpec) -> DynamicImage {
    let filter = spec.filter();
    match spec.footprint {
        Footprint::Icon { size } => {
            let size = size.max(1);
            let (w, h) = fit_within(source.width(), source.height(), size, size);
            let scaled = source.resize_exact(w, h, filter).to_rgba8();
            let mut canvas = RgbaImage::new(size, size);
            let x = size.saturating_sub(w) / 2;
            let y = size.saturating_sub(h) / 2;
            imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);
            DynamicImage::ImageRgba8(canvas)
        }
        Footprint::Banner { max_dimension } => {
            if source.width() <= max_dimension && source.height() <= max_dimension {
                return source;
            }
            let (w, h) = fit_within(source.width(), source.height(), max_dimension, max_dimension);
            source.resize_exact(w, h, filter)
        }
    }
}

fn encode(img: &DynamicImage, encoding: Encoding) -> Result<(&'static str, Vec<u8>)> {
    let mut buf = Vec::new();
    match encoding {
        Encoding::Png => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(PngEncoder::new(&mut buf))?;
            Ok(("image/png", buf))
        }
        Encoding::Jpeg { quality } => {
            // JPEG has no alpha channel
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
            Ok(("image/jpeg", buf))
        }
    }
}
