// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The immutable, GPU-ready scene produced by extraction.

use crate::cull::CullStats;
use crate::math::Bounds;

/// Record counts and provenance tallies for a scene.
///
/// Logical array lengths are always `count * 4` floats; the packed textures
/// may be padded beyond that, and the padding is zero-filled and meaningless.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneCounts {
    /// Stroke primitives that survived the cull.
    pub strokes: u32,
    /// Filled paths.
    pub fill_paths: u32,
    /// Line segments referenced by filled paths.
    pub fill_segments: u32,
    /// Placed text instances.
    pub text_instances: u32,
    /// Glyph outline records.
    pub glyphs: u32,
    /// Line segments referenced by glyph outlines.
    pub glyph_segments: u32,
    /// Raster layers.
    pub raster_layers: u32,
    /// Stroke segments emitted by the flattener, before merging.
    pub source_segments: u32,
    /// Stroke segments after collinear merging, before the cull.
    pub merged_segments: u32,
    /// Strokes discarded as transparent.
    pub discarded_transparent: u32,
    /// Strokes discarded as degenerate.
    pub discarded_degenerate: u32,
    /// Strokes discarded as duplicates.
    pub discarded_duplicate: u32,
    /// Strokes discarded as covered by an opaque collinear stroke.
    pub discarded_contained: u32,
    /// Path records truncated or operators dropped for malformed data.
    pub malformed_paths: u32,
}

impl SceneCounts {
    pub(crate) fn absorb_cull(&mut self, stats: &CullStats) {
        self.discarded_transparent += stats.transparent;
        self.discarded_degenerate += stats.degenerate;
        self.discarded_duplicate += stats.duplicate;
        self.discarded_contained += stats.contained;
    }
}

/// One packed RGBA32F texture: a logical prefix of records inside a
/// zero-padded 2D layout.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackedTexture {
    /// Texture width in texels.
    pub width: u32,
    /// Texture height in texels.
    pub height: u32,
    /// Number of meaningful records (texels).
    pub logical_count: u32,
    /// `width * height * 4` floats; the tail beyond `logical_count * 4` is
    /// zero.
    pub data: Vec<f32>,
}

impl PackedTexture {
    /// The logical prefix as 4-float records.
    pub fn records(&self) -> &[[f32; 4]] {
        let logical = self.logical_count as usize;
        &bytemuck::cast_slice(&self.data)[..logical]
    }

    /// The logical prefix as a flat float slice.
    pub fn floats(&self) -> &[f32] {
        &self.data[..self.logical_count as usize * 4]
    }
}

/// A filled path: a span of fill segments plus colour and winding rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FillPath {
    /// Axis-aligned bounds of the path outline.
    pub bounds: Bounds,
    /// First referenced record in the fill segment arrays.
    pub seg_offset: u32,
    /// Number of referenced segments.
    pub seg_count: u32,
    /// Straight-alpha RGBA colour.
    pub color: [f32; 4],
    /// Even-odd winding when true, non-zero otherwise.
    pub even_odd: bool,
}

/// A placed text instance referencing a span of glyph records.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextInstance {
    /// Affine placement `(a, b, c, d, e, f)`.
    pub transform: [f32; 6],
    /// First referenced glyph record.
    pub glyph_offset: u32,
    /// Number of referenced glyph records.
    pub glyph_count: u32,
    /// Straight-alpha RGBA colour.
    pub color: [f32; 4],
}

/// A glyph outline: a span of glyph segments in em space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphOutline {
    /// First referenced record in the glyph segment arrays.
    pub seg_offset: u32,
    /// Number of referenced segments.
    pub seg_count: u32,
    /// Outline bounds in em space.
    pub bounds: Bounds,
}

/// A raster layer: premultiplied RGBA8 pixels with an affine placement.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterLayer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8, row-major, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
    /// Placement `(a, b, c, d, e, f)` mapping the unit square to page space.
    pub matrix: [f32; 6],
}

impl RasterLayer {
    /// Page-space bounds of the placed unit square.
    pub fn placed_bounds(&self) -> Bounds {
        let m = self.matrix;
        let mut b = Bounds::EMPTY;
        for (x, y) in [(0.0f32, 0.0f32), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
            b.add_point(m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5]);
        }
        b
    }
}

/// The immutable output of the extraction pipeline.
///
/// All packed arrays are laid out one RGBA32F texel per record; the renderer
/// uploads them verbatim and must ignore texels at or beyond each texture's
/// `logical_count`. Stroke order equals emission order in the source stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VectorScene {
    /// Record counts and tallies.
    pub counts: SceneCounts,

    /// `{x0, y0, x1, y1}` per stroke.
    pub stroke_primitives_a: PackedTexture,
    /// `{x1, y1, luma, alpha + flags*2}` per stroke.
    pub stroke_primitives_b: PackedTexture,
    /// `{half_width, r, g, b}` per stroke.
    pub stroke_styles: PackedTexture,
    /// `{min_x, min_y, max_x, max_y}` per stroke, expanded by
    /// `half_width + 0.35`.
    pub stroke_primitive_bounds: PackedTexture,

    /// `{min_x, min_y, max_x, max_y}` per fill path.
    pub fill_paths_a: PackedTexture,
    /// `{seg_offset, seg_count, winding_and_flags, 0}` per fill path.
    pub fill_paths_b: PackedTexture,
    /// `{r, g, b, alpha}` per fill path.
    pub fill_paths_c: PackedTexture,
    /// `{x0, y0, x1, y1}` per fill segment.
    pub fill_segments_a: PackedTexture,
    /// `{x1, y1, 0, 0}` per fill segment.
    pub fill_segments_b: PackedTexture,

    /// `{m00, m01, m10, m11}` per text instance.
    pub text_instances_a: PackedTexture,
    /// `{tx, ty, glyph_offset, glyph_count}` per text instance.
    pub text_instances_b: PackedTexture,
    /// `{r, g, b, alpha}` per text instance.
    pub text_instances_c: PackedTexture,
    /// `{seg_offset, seg_count, 0, 0}` per glyph.
    pub glyphs_a: PackedTexture,
    /// `{min_x, min_y, max_x, max_y}` per glyph, em space.
    pub glyphs_b: PackedTexture,
    /// `{x0, y0, x1, y1}` per glyph segment.
    pub glyph_segments_a: PackedTexture,
    /// `{x1, y1, 0, 0}` per glyph segment.
    pub glyph_segments_b: PackedTexture,

    /// Raster layers in emission order.
    pub raster_layers: Vec<RasterLayer>,

    /// Union of all primitive bounds.
    pub bounds: Bounds,
    /// Union of composed page view rectangles.
    pub page_bounds: Bounds,
    /// Composed view rectangle per page.
    pub page_rects: Vec<Bounds>,
    /// Number of composed pages.
    pub page_count: u32,
    /// Pages per composition row.
    pub pages_per_row: u32,
    /// Largest stroke half-width in the scene.
    pub max_half_width: f32,
}

impl VectorScene {
    /// Per-stroke margin-expanded bounds, used by the grid and the per-frame
    /// cull.
    pub fn stroke_bounds(&self) -> &[Bounds] {
        bytemuck::cast_slice(self.stroke_primitive_bounds.records())
    }

    /// Whether the scene holds nothing at all.
    pub fn is_empty(&self) -> bool {
        let c = &self.counts;
        c.strokes == 0
            && c.fill_paths == 0
            && c.text_instances == 0
            && c.raster_layers == 0
    }
}
