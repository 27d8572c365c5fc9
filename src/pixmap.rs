// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Premultiplied RGBA8 pixel buffers and the raster codecs used by the
//! archive.

use crate::{Error, Result};

/// A pixmap of premultiplied RGBA8 values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pixmap {
    width: u32,
    height: u32,
    /// Premultiplied RGBA8, row-major, `width * height * 4` bytes.
    data: Vec<u8>,
}

impl Pixmap {
    /// Wraps existing premultiplied data.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not exactly `width * height * 4` bytes.
    pub fn from_premultiplied(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize * 4,
            "expected data of length width * height * 4"
        );
        Self {
            width,
            height,
            data,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The premultiplied bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the pixmap, returning the premultiplied bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Decodes a PNG payload, premultiplying its alpha.
    pub fn from_png(label: &str, bytes: &[u8]) -> Result<Self> {
        let mut decoder = png::Decoder::new(bytes);
        decoder.set_transformations(
            png::Transformations::normalize_to_color8() | png::Transformations::ALPHA,
        );
        let mut reader = decoder
            .read_info()
            .map_err(|e| Error::invalid(label, "raster decode", e.to_string()))?;
        let (width, height) = {
            let info = reader.info();
            (info.width, info.height)
        };
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let frame = reader
            .next_frame(&mut buf)
            .map_err(|e| Error::invalid(label, "raster decode", e.to_string()))?;
        buf.truncate(frame.buffer_size());

        let (color_type, _) = reader.output_color_type();
        let mut data = match color_type {
            png::ColorType::Rgba => buf,
            png::ColorType::GrayscaleAlpha => {
                let mut rgba = Vec::with_capacity(buf.len() * 2);
                for px in buf.chunks_exact(2) {
                    rgba.extend_from_slice(&[px[0], px[0], px[0], px[1]]);
                }
                rgba
            }
            _ => {
                return Err(Error::invalid(
                    label,
                    "raster decode",
                    format!("unexpected png colour type {color_type:?}"),
                ))
            }
        };
        premultiply(&mut data);
        Ok(Self::from_premultiplied(width, height, data))
    }

    /// Decodes a WEBP payload, premultiplying its alpha.
    pub fn from_webp(label: &str, bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::WebP)
            .map_err(|e| Error::invalid(label, "raster decode", e.to_string()))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut data = rgba.into_raw();
        premultiply(&mut data);
        Ok(Self::from_premultiplied(width, height, data))
    }

    /// Interprets a raw `.rgba` payload of declared dimensions; the bytes are
    /// already premultiplied.
    pub fn from_raw(label: &str, width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if bytes.len() != expected {
            return Err(Error::invalid(
                label,
                "raster decode",
                format!("raw payload is {} bytes, expected {expected}", bytes.len()),
            ));
        }
        Ok(Self::from_premultiplied(width, height, bytes.to_vec()))
    }

    /// Encodes the pixmap as a straight-alpha PNG.
    ///
    /// Premultiplication is undone with a rounding that makes decode(encode)
    /// reproduce the premultiplied bytes exactly.
    pub fn into_png(self, label: &str) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut straight = self.data;
        unpremultiply(&mut straight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| Error::invalid(label, "raster encode", e.to_string()))?;
        writer
            .write_image_data(&straight)
            .map_err(|e| Error::invalid(label, "raster encode", e.to_string()))?;
        writer
            .finish()
            .map_err(|e| Error::invalid(label, "raster encode", e.to_string()))?;
        Ok(out)
    }
}

/// Straight alpha to premultiplied.
fn premultiply(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 255 {
            continue;
        }
        px[0] = ((px[0] as u32 * a) / 255) as u8;
        px[1] = ((px[1] as u32 * a) / 255) as u8;
        px[2] = ((px[2] as u32 * a) / 255) as u8;
    }
}

/// Premultiplied to straight alpha.
///
/// Uses a ceiling division so that re-premultiplying reproduces the input
/// byte for byte (given the `component <= alpha` invariant).
fn unpremultiply(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 255 {
            continue;
        }
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u32 * 255).div_ceil(a)).min(255) as u8;
        px[1] = ((px[1] as u32 * 255).div_ceil(a)).min(255) as u8;
        px[2] = ((px[2] as u32 * 255).div_ceil(a)).min(255) as u8;
    }
}
