// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The parsed-scene archive: a named-file container holding `manifest.json`
//! plus one binary payload per packed texture and per raster layer.

mod container;
mod manifest;

use std::collections::HashMap;

use crate::math::Bounds;
use crate::pixmap::Pixmap;
use crate::scene::{PackedTexture, RasterLayer, SceneCounts, VectorScene};
use crate::{Error, Result};

pub use container::EntryCompression;
use container::{read_entries, ContainerWriter};
use manifest::{Manifest, RasterManifest, SceneManifest, TextureManifest, FORMAT_VERSION};

const MANIFEST_NAME: &str = "manifest.json";
/// Margin baked into stroke primitive bounds, mirrored when deriving them.
const BOUNDS_MARGIN: f32 = crate::pack::BOUNDS_MARGIN;

/// Archive writer configuration.
#[derive(Clone, Debug)]
pub struct ArchiveWriteOptions {
    /// Encode raster layers as PNG instead of raw `.rgba`.
    pub encode_raster_images: bool,
    /// Per-entry compression.
    pub compression: EntryCompression,
    /// Deflate level, `0..=9`.
    pub deflate_level: u32,
    /// Embed the original operator-stream document under this name.
    pub source_document: Option<(String, Vec<u8>)>,
}

impl Default for ArchiveWriteOptions {
    fn default() -> Self {
        Self {
            encode_raster_images: true,
            compression: EntryCompression::Deflate,
            deflate_level: 6,
            source_document: None,
        }
    }
}

/// The scene's texture set, in manifest order.
fn texture_list(scene: &VectorScene) -> [(&'static str, &PackedTexture); 16] {
    [
        ("stroke-primitives-a", &scene.stroke_primitives_a),
        ("stroke-primitives-b", &scene.stroke_primitives_b),
        ("stroke-styles", &scene.stroke_styles),
        ("stroke-primitive-bounds", &scene.stroke_primitive_bounds),
        ("fill-paths-a", &scene.fill_paths_a),
        ("fill-paths-b", &scene.fill_paths_b),
        ("fill-paths-c", &scene.fill_paths_c),
        ("fill-segments-a", &scene.fill_segments_a),
        ("fill-segments-b", &scene.fill_segments_b),
        ("text-instances-a", &scene.text_instances_a),
        ("text-instances-b", &scene.text_instances_b),
        ("text-instances-c", &scene.text_instances_c),
        ("glyphs-a", &scene.glyphs_a),
        ("glyphs-b", &scene.glyphs_b),
        ("glyph-segments-a", &scene.glyph_segments_a),
        ("glyph-segments-b", &scene.glyph_segments_b),
    ]
}

/// Writes a scene into an in-memory archive.
pub fn write_scene(scene: &VectorScene, options: &ArchiveWriteOptions) -> Result<Vec<u8>> {
    let mut writer = ContainerWriter::new();
    let compression = options.compression;
    let level = options.deflate_level;

    let mut textures = Vec::new();
    for (name, tex) in texture_list(scene) {
        if tex.logical_count == 0 {
            continue;
        }
        let file = format!("{name}.f32");
        let mut payload = Vec::with_capacity(tex.data.len() * 4);
        for value in &tex.data {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        writer.add(&file, &payload, compression, level)?;
        textures.push(TextureManifest {
            name: name.to_owned(),
            file,
            width: tex.width,
            height: tex.height,
            channels: 4,
            component_type: "float32".to_owned(),
            layout: "interleaved".to_owned(),
            logical_item_count: tex.logical_count,
            logical_float_count: tex.logical_count * 4,
            padded_float_count: tex.data.len() as u32,
        });
    }

    let mut raster_layers = Vec::new();
    for (i, raster) in scene.raster_layers.iter().enumerate() {
        let (file, encoding, payload) = if options.encode_raster_images {
            let pixmap =
                Pixmap::from_premultiplied(raster.width, raster.height, raster.pixels.clone());
            let file = format!("raster-{i}.png");
            let payload = pixmap.into_png(&file)?;
            (file, "png", payload)
        } else {
            (format!("raster-{i}.rgba"), "rgba", raster.pixels.clone())
        };
        writer.add(&file, &payload, compression, level)?;
        raster_layers.push(RasterManifest {
            width: raster.width,
            height: raster.height,
            matrix: raster.matrix,
            file,
            encoding: encoding.to_owned(),
        });
    }

    let source_pdf_file = if let Some((name, bytes)) = &options.source_document {
        writer.add(name, bytes, compression, level)?;
        Some(name.clone())
    } else {
        None
    };

    let c = &scene.counts;
    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        scene: SceneManifest {
            stroke_count: c.strokes,
            fill_path_count: c.fill_paths,
            fill_segment_count: c.fill_segments,
            text_instance_count: c.text_instances,
            glyph_count: c.glyphs,
            glyph_segment_count: c.glyph_segments,
            raster_layer_count: c.raster_layers,
            source_segment_count: c.source_segments,
            merged_segment_count: c.merged_segments,
            discarded_transparent: c.discarded_transparent,
            discarded_degenerate: c.discarded_degenerate,
            discarded_duplicate: c.discarded_duplicate,
            discarded_contained: c.discarded_contained,
            malformed_path_count: c.malformed_paths,
            bounds: bounds_to_array(scene.bounds),
            page_bounds: bounds_to_array(scene.page_bounds),
            page_rects: scene
                .page_rects
                .iter()
                .flat_map(|r| bounds_to_array(*r))
                .collect(),
            page_count: scene.page_count,
            pages_per_row: scene.pages_per_row,
            max_half_width: scene.max_half_width,
            raster_layers,
        },
        textures,
        source_pdf_file,
    };
    let manifest_json = serde_json::to_vec(&manifest)
        .map_err(|e| Error::invalid(MANIFEST_NAME, "archive write", e.to_string()))?;
    writer.add(MANIFEST_NAME, &manifest_json, compression, level)?;
    Ok(writer.finish())
}

/// Reads a scene back from archive bytes.
///
/// Logical counts from the manifest are authoritative; shorter payloads are a
/// truncation error. Missing `stroke-primitives-b`, `stroke-primitive-bounds`
/// and the segment B tiles are derived; a legacy archive (every
/// `primitive_meta.w` zero) gets its colour tiles migrated.
pub fn read_scene(label: &str, bytes: &[u8]) -> Result<VectorScene> {
    let invalid = |reason: String| Error::invalid(label, "archive read", reason);

    let entries = read_entries(label, bytes)?;
    let mut files: HashMap<String, Vec<u8>> = entries
        .into_iter()
        .map(|e| (e.name, e.data))
        .collect();

    let manifest_bytes = files
        .remove(MANIFEST_NAME)
        .ok_or_else(|| invalid("missing manifest.json".to_owned()))?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| invalid(format!("bad manifest: {e}")))?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(invalid(format!(
            "unsupported format version {}",
            manifest.format_version
        )));
    }
    let m = &manifest.scene;

    let mut textures: HashMap<String, PackedTexture> = HashMap::new();
    for t in &manifest.textures {
        let payload = files
            .get(&t.file)
            .ok_or_else(|| invalid(format!("texture file `{}` is missing", t.file)))?;
        let mut floats: Vec<f32> = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if floats.len() < t.logical_float_count as usize {
            return Err(Error::TruncatedTexture {
                name: t.name.clone(),
                expected: t.logical_float_count as usize,
                actual: floats.len(),
            });
        }
        let padded = (t.width as usize) * (t.height as usize) * 4;
        match t.layout.as_str() {
            "interleaved" => {}
            "channel-major" => {
                let plane = t.padded_float_count as usize / 4;
                if floats.len() < plane * 4 {
                    return Err(Error::TruncatedTexture {
                        name: t.name.clone(),
                        expected: plane * 4,
                        actual: floats.len(),
                    });
                }
                let mut interleaved = vec![0.0f32; plane * 4];
                for i in 0..plane {
                    for channel in 0..4 {
                        interleaved[i * 4 + channel] = floats[channel * plane + i];
                    }
                }
                floats = interleaved;
            }
            other => return Err(invalid(format!("unknown texture layout `{other}`"))),
        }
        floats.resize(padded, 0.0);
        textures.insert(
            t.name.clone(),
            PackedTexture {
                width: t.width,
                height: t.height,
                logical_count: t.logical_item_count,
                data: floats,
            },
        );
    }

    let mut take = |name: &str, count: u32, family: &str| -> Result<Option<PackedTexture>> {
        match textures.remove(name) {
            Some(tex) => {
                if tex.logical_count != count {
                    Err(invalid(format!(
                        "texture `{name}` holds {} records, {family} count is {count}",
                        tex.logical_count
                    )))
                } else {
                    Ok(Some(tex))
                }
            }
            None if count == 0 => Ok(Some(PackedTexture::default())),
            None => Ok(None),
        }
    };

    // Stroke tiles. A and the styles are required; B and the bounds derive.
    let stroke_a = take("stroke-primitives-a", m.stroke_count, "stroke")?
        .ok_or_else(|| invalid("missing stroke-primitives-a".to_owned()))?;
    let mut stroke_styles = take("stroke-styles", m.stroke_count, "stroke")?
        .ok_or_else(|| invalid("missing stroke-styles".to_owned()))?;
    let mut stroke_b = match take("stroke-primitives-b", m.stroke_count, "stroke")? {
        Some(tex) => tex,
        None => derive_records(&stroke_a, |a| [a[2], a[3], 0.0, 0.0]),
    };

    // Legacy archives carry mono-luma styles and a zeroed meta channel.
    let legacy = m.stroke_count > 0 && stroke_b.records().iter().all(|r| r[3] == 0.0);
    if legacy {
        let styles = stroke_styles.records().to_vec();
        let endpoints = stroke_a.records().to_vec();
        let mut meta = Vec::with_capacity(styles.len());
        let mut modern_styles = Vec::with_capacity(styles.len());
        for (style, a) in styles.iter().zip(&endpoints) {
            let [half_width, luma, alpha, flags] = *style;
            let packed = alpha + if flags != 0.0 { 2.0 } else { 0.0 };
            meta.push([a[2], a[3], luma, packed]);
            modern_styles.push([half_width, luma, luma, luma]);
        }
        stroke_b = replace_records(&stroke_b, &meta);
        stroke_styles = replace_records(&stroke_styles, &modern_styles);
    }

    let stroke_bounds = match take("stroke-primitive-bounds", m.stroke_count, "stroke")? {
        Some(tex) => tex,
        None => {
            let styles = stroke_styles.records().to_vec();
            let mut i = 0;
            derive_records(&stroke_a, |a| {
                let margin = styles[i][0] + BOUNDS_MARGIN;
                i += 1;
                let b = Bounds::from_points(a[0], a[1], a[2], a[3]).expand(margin);
                [b.min_x, b.min_y, b.max_x, b.max_y]
            })
        }
    };

    // Fill tiles. The colour tile migrates from the legacy mono-luma slot.
    let fill_a = take("fill-paths-a", m.fill_path_count, "fill path")?
        .ok_or_else(|| invalid("missing fill-paths-a".to_owned()))?;
    let fill_b = take("fill-paths-b", m.fill_path_count, "fill path")?
        .ok_or_else(|| invalid("missing fill-paths-b".to_owned()))?;
    let fill_c = match take("fill-paths-c", m.fill_path_count, "fill path")? {
        Some(tex) => tex,
        None => derive_records(&fill_b, |b| [b[3], b[3], b[3], 1.0]),
    };
    let fill_seg_a = take("fill-segments-a", m.fill_segment_count, "fill segment")?
        .ok_or_else(|| invalid("missing fill-segments-a".to_owned()))?;
    let fill_seg_b = match take("fill-segments-b", m.fill_segment_count, "fill segment")? {
        Some(tex) => tex,
        None => derive_records(&fill_seg_a, |a| [a[2], a[3], 0.0, 0.0]),
    };

    // Text tiles.
    let text_a = take("text-instances-a", m.text_instance_count, "text")?
        .ok_or_else(|| invalid("missing text-instances-a".to_owned()))?;
    let text_b = take("text-instances-b", m.text_instance_count, "text")?
        .ok_or_else(|| invalid("missing text-instances-b".to_owned()))?;
    let text_c = take("text-instances-c", m.text_instance_count, "text")?
        .ok_or_else(|| invalid("missing text-instances-c".to_owned()))?;
    let glyphs_a = take("glyphs-a", m.glyph_count, "glyph")?
        .ok_or_else(|| invalid("missing glyphs-a".to_owned()))?;
    let glyphs_b = take("glyphs-b", m.glyph_count, "glyph")?
        .ok_or_else(|| invalid("missing glyphs-b".to_owned()))?;
    let glyph_seg_a = take("glyph-segments-a", m.glyph_segment_count, "glyph segment")?
        .ok_or_else(|| invalid("missing glyph-segments-a".to_owned()))?;
    let glyph_seg_b = match take("glyph-segments-b", m.glyph_segment_count, "glyph segment")? {
        Some(tex) => tex,
        None => derive_records(&glyph_seg_a, |a| [a[2], a[3], 0.0, 0.0]),
    };

    // No record may reference segments beyond the declared counts.
    for rec in fill_b.records() {
        if rec[0] + rec[1] > m.fill_segment_count as f32 {
            return Err(invalid("fill path references out-of-range segments".to_owned()));
        }
    }
    for rec in text_b.records() {
        if rec[2] + rec[3] > m.glyph_count as f32 {
            return Err(invalid("text instance references out-of-range glyphs".to_owned()));
        }
    }
    for rec in glyphs_a.records() {
        if rec[0] + rec[1] > m.glyph_segment_count as f32 {
            return Err(invalid("glyph references out-of-range segments".to_owned()));
        }
    }

    if m.page_rects.len() != 4 * m.page_count as usize {
        return Err(invalid(format!(
            "pageRects holds {} floats for {} pages",
            m.page_rects.len(),
            m.page_count
        )));
    }
    if m.raster_layers.len() != m.raster_layer_count as usize {
        return Err(invalid("rasterLayers count mismatch".to_owned()));
    }

    let mut raster_layers = Vec::with_capacity(m.raster_layers.len());
    for raster in &m.raster_layers {
        let payload = files
            .get(&raster.file)
            .ok_or_else(|| invalid(format!("raster file `{}` is missing", raster.file)))?;
        let pixmap = if raster.file.ends_with(".png") {
            Pixmap::from_png(&raster.file, payload)?
        } else if raster.file.ends_with(".webp") {
            Pixmap::from_webp(&raster.file, payload)?
        } else {
            Pixmap::from_raw(&raster.file, raster.width, raster.height, payload)?
        };
        if pixmap.width() != raster.width || pixmap.height() != raster.height {
            return Err(invalid(format!(
                "raster `{}` is {}x{}, manifest says {}x{}",
                raster.file,
                pixmap.width(),
                pixmap.height(),
                raster.width,
                raster.height
            )));
        }
        raster_layers.push(RasterLayer {
            width: raster.width,
            height: raster.height,
            pixels: pixmap.into_data(),
            matrix: raster.matrix,
        });
    }

    if let Some(source) = &manifest.source_pdf_file {
        if !files.contains_key(source) {
            return Err(invalid(format!("source document `{source}` is missing")));
        }
    }

    Ok(VectorScene {
        counts: SceneCounts {
            strokes: m.stroke_count,
            fill_paths: m.fill_path_count,
            fill_segments: m.fill_segment_count,
            text_instances: m.text_instance_count,
            glyphs: m.glyph_count,
            glyph_segments: m.glyph_segment_count,
            raster_layers: m.raster_layer_count,
            source_segments: m.source_segment_count,
            merged_segments: m.merged_segment_count,
            discarded_transparent: m.discarded_transparent,
            discarded_degenerate: m.discarded_degenerate,
            discarded_duplicate: m.discarded_duplicate,
            discarded_contained: m.discarded_contained,
            malformed_paths: m.malformed_path_count,
        },
        stroke_primitives_a: stroke_a,
        stroke_primitives_b: stroke_b,
        stroke_styles,
        stroke_primitive_bounds: stroke_bounds,
        fill_paths_a: fill_a,
        fill_paths_b: fill_b,
        fill_paths_c: fill_c,
        fill_segments_a: fill_seg_a,
        fill_segments_b: fill_seg_b,
        text_instances_a: text_a,
        text_instances_b: text_b,
        text_instances_c: text_c,
        glyphs_a,
        glyphs_b,
        glyph_segments_a: glyph_seg_a,
        glyph_segments_b: glyph_seg_b,
        raster_layers,
        bounds: bounds_from_array(m.bounds),
        page_bounds: bounds_from_array(m.page_bounds),
        page_rects: m
            .page_rects
            .chunks_exact(4)
            .map(|r| Bounds::new(r[0], r[1], r[2], r[3]))
            .collect(),
        page_count: m.page_count,
        pages_per_row: m.pages_per_row.max(1),
        max_half_width: m.max_half_width,
    })
}

/// The embedded source document, if the archive carries one.
pub fn read_source_document(label: &str, bytes: &[u8]) -> Result<Option<(String, Vec<u8>)>> {
    let entries = read_entries(label, bytes)?;
    let manifest_bytes = entries
        .iter()
        .find(|e| e.name == MANIFEST_NAME)
        .ok_or_else(|| Error::invalid(label, "archive read", "missing manifest.json"))?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes.data)
        .map_err(|e| Error::invalid(label, "archive read", format!("bad manifest: {e}")))?;
    let Some(name) = manifest.source_pdf_file else {
        return Ok(None);
    };
    let entry = entries
        .into_iter()
        .find(|e| e.name == name)
        .ok_or_else(|| {
            Error::invalid(label, "archive read", format!("source document `{name}` is missing"))
        })?;
    Ok(Some((name, entry.data)))
}

/// Builds a same-shape texture by mapping each logical record.
fn derive_records(src: &PackedTexture, mut f: impl FnMut(&[f32; 4]) -> [f32; 4]) -> PackedTexture {
    let records: Vec<[f32; 4]> = src.records().iter().map(|r| f(r)).collect();
    replace_records(src, &records)
}

/// Copies a texture's shape with new logical records.
fn replace_records(shape: &PackedTexture, records: &[[f32; 4]]) -> PackedTexture {
    let mut data = vec![0.0f32; shape.data.len()];
    data[..records.len() * 4].copy_from_slice(bytemuck::cast_slice(records));
    PackedTexture {
        width: shape.width,
        height: shape.height,
        logical_count: shape.logical_count,
        data,
    }
}

fn bounds_to_array(b: Bounds) -> [f32; 4] {
    [b.min_x, b.min_y, b.max_x, b.max_y]
}

fn bounds_from_array(a: [f32; 4]) -> Bounds {
    Bounds::new(a[0], a[1], a[2], a[3])
}
