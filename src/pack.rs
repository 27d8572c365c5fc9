// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Packing culled primitives into fixed-channel float textures and composing
//! pages onto the scene grid.

use crate::cull::CullStats;
use crate::interp::PageBuild;
use crate::math::{Bounds, Transform};
use crate::scene::{PackedTexture, SceneCounts, VectorScene};
use crate::{Error, Result};

/// Margin added around stroke endpoint bounds, matching the per-frame cull.
pub(crate) const BOUNDS_MARGIN: f32 = 0.35;

/// World-space gap between composed pages.
const PAGE_GAP: f32 = 32.0;

/// One page's primitives plus provenance, ready for composition.
pub(crate) struct PageInput {
    pub build: PageBuild,
    /// Page view rectangle in page space.
    pub view: Bounds,
    /// Stroke segments after merging, before the cull.
    pub merged_segments: u32,
    pub cull: CullStats,
}

/// Lays out `n` records as a square-ish RGBA32F texture.
fn pack_records(name: &'static str, records: &[[f32; 4]], max_side: u32) -> Result<PackedTexture> {
    let n = records.len();
    if n == 0 {
        return Ok(PackedTexture::default());
    }
    let width = (n as f64).sqrt().ceil() as u32;
    let height = (n as u32).div_ceil(width);
    let side = width.max(height);
    if side > max_side {
        return Err(Error::TextureLimit {
            name,
            side,
            max: max_side,
        });
    }
    let mut data = vec![0.0f32; width as usize * height as usize * 4];
    data[..n * 4].copy_from_slice(bytemuck::cast_slice(records));
    Ok(PackedTexture {
        width,
        height,
        logical_count: n as u32,
        data,
    })
}

fn finite_or_zero(b: Bounds) -> Bounds {
    if b.is_empty() {
        Bounds::new(0.0, 0.0, 0.0, 0.0)
    } else {
        b
    }
}

/// Composes culled pages into the final scene, translating each page onto a
/// row-major grid and concatenating all primitive arrays with rebased index
/// spans.
pub(crate) fn compose(
    pages: Vec<PageInput>,
    pages_per_row: u32,
    max_side: u32,
) -> Result<VectorScene> {
    let per_row = pages_per_row.max(1) as usize;

    // Per-row strides: widest and tallest page in the row, plus the gap.
    let mut row_strides = Vec::new();
    for row in pages.chunks(per_row) {
        let w = row
            .iter()
            .map(|p| finite_or_zero(p.view).width())
            .fold(0.0f32, f32::max);
        let h = row
            .iter()
            .map(|p| finite_or_zero(p.view).height())
            .fold(0.0f32, f32::max);
        row_strides.push((w + PAGE_GAP, h + PAGE_GAP));
    }

    let mut counts = SceneCounts::default();
    let mut endpoints = Vec::new();
    let mut meta = Vec::new();
    let mut styles = Vec::new();
    let mut stroke_bounds = Vec::new();
    let mut fill_a = Vec::new();
    let mut fill_b = Vec::new();
    let mut fill_c = Vec::new();
    let mut fill_seg_a = Vec::new();
    let mut fill_seg_b = Vec::new();
    let mut text_a = Vec::new();
    let mut text_b = Vec::new();
    let mut text_c = Vec::new();
    let mut glyph_a = Vec::new();
    let mut glyph_b = Vec::new();
    let mut glyph_seg_a = Vec::new();
    let mut glyph_seg_b = Vec::new();
    let mut rasters = Vec::new();
    let mut page_rects = Vec::new();
    let mut bounds = Bounds::EMPTY;
    let mut page_bounds = Bounds::EMPTY;
    let mut max_half_width = 0.0f32;

    let mut origin_y = 0.0f32;
    for (row_idx, row) in pages.chunks(per_row).enumerate() {
        let (stride_x, stride_y) = row_strides[row_idx];
        for (col, page) in row.iter().enumerate() {
            let view = finite_or_zero(page.view);
            let origin_x = col as f32 * stride_x;
            let dx = origin_x - view.min_x;
            let dy = origin_y - view.min_y;

            let page_rect = Bounds::new(
                origin_x,
                origin_y,
                origin_x + view.width(),
                origin_y + view.height(),
            );
            page_rects.push(page_rect);
            page_bounds = page_bounds.union(&page_rect);

            counts.source_segments += page.build.source_segments;
            counts.merged_segments += page.merged_segments;
            counts.malformed_paths += page.build.malformed;
            counts.absorb_cull(&page.cull);

            for seg in &page.build.strokes {
                let (x0, y0) = (seg.x0 + dx, seg.y0 + dy);
                let (x1, y1) = (seg.x1 + dx, seg.y1 + dy);
                let packed = seg.alpha + if seg.flags != 0 { 2.0 } else { 0.0 };
                endpoints.push([x0, y0, x1, y1]);
                meta.push([x1, y1, seg.luma, packed]);
                styles.push([seg.half_width, seg.luma, seg.luma, seg.luma]);
                let b = Bounds::from_points(x0, y0, x1, y1).expand(seg.half_width + BOUNDS_MARGIN);
                stroke_bounds.push([b.min_x, b.min_y, b.max_x, b.max_y]);
                bounds = bounds.union(&b);
                max_half_width = max_half_width.max(seg.half_width);
            }
            counts.strokes += page.build.strokes.len() as u32;

            let fill_seg_base = fill_seg_a.len() as u32;
            for seg in &page.build.fill_segments {
                let moved = [seg[0] + dx, seg[1] + dy, seg[2] + dx, seg[3] + dy];
                fill_seg_a.push(moved);
                fill_seg_b.push([moved[2], moved[3], 0.0, 0.0]);
            }
            for fill in &page.build.fills {
                let fb = fill.bounds.translate(dx, dy);
                bounds = bounds.union(&fb);
                fill_a.push([fb.min_x, fb.min_y, fb.max_x, fb.max_y]);
                fill_b.push([
                    (fill.seg_offset + fill_seg_base) as f32,
                    fill.seg_count as f32,
                    if fill.even_odd { 1.0 } else { 0.0 },
                    0.0,
                ]);
                let [r, g, b, a] = fill.color;
                fill_c.push([r * a, g * a, b * a, a]);
            }
            counts.fill_paths += page.build.fills.len() as u32;
            counts.fill_segments += page.build.fill_segments.len() as u32;

            let glyph_base = glyph_a.len() as u32;
            let glyph_seg_base = glyph_seg_a.len() as u32;
            for glyph in &page.build.glyphs {
                glyph_a.push([
                    (glyph.seg_offset + glyph_seg_base) as f32,
                    glyph.seg_count as f32,
                    0.0,
                    0.0,
                ]);
                let gb = finite_or_zero(glyph.bounds);
                glyph_b.push([gb.min_x, gb.min_y, gb.max_x, gb.max_y]);
            }
            for seg in &page.build.glyph_segments {
                glyph_seg_a.push(*seg);
                glyph_seg_b.push([seg[2], seg[3], 0.0, 0.0]);
            }
            for text in &page.build.texts {
                let mut m = text.transform;
                m[4] += dx;
                m[5] += dy;
                text_a.push([m[0], m[1], m[2], m[3]]);
                text_b.push([
                    m[4],
                    m[5],
                    (text.glyph_offset + glyph_base) as f32,
                    text.glyph_count as f32,
                ]);
                let [r, g, b, a] = text.color;
                text_c.push([r * a, g * a, b * a, a]);
                // Placed outline bounds contribute to the scene bounds.
                let placement = Transform::from_coeffs(m);
                for gi in text.glyph_offset..text.glyph_offset + text.glyph_count {
                    if let Some(glyph) = page.build.glyphs.get(gi as usize) {
                        let gb = glyph.bounds;
                        if gb.is_empty() {
                            continue;
                        }
                        for (cx, cy) in [
                            (gb.min_x, gb.min_y),
                            (gb.max_x, gb.min_y),
                            (gb.min_x, gb.max_y),
                            (gb.max_x, gb.max_y),
                        ] {
                            let (px, py) = placement.apply(cx, cy);
                            bounds.add_point(px, py);
                        }
                    }
                }
            }
            counts.text_instances += page.build.texts.len() as u32;
            counts.glyphs += page.build.glyphs.len() as u32;
            counts.glyph_segments += page.build.glyph_segments.len() as u32;

            for raster in &page.build.rasters {
                let mut moved = raster.clone();
                moved.matrix[4] += dx;
                moved.matrix[5] += dy;
                bounds = bounds.union(&moved.placed_bounds());
                rasters.push(moved);
            }
            counts.raster_layers += page.build.rasters.len() as u32;
        }
        origin_y += stride_y;
    }

    let page_count = pages.len() as u32;
    log::debug!(
        "pack: {} strokes, {} fills, {} texts, {} rasters over {} pages",
        counts.strokes,
        counts.fill_paths,
        counts.text_instances,
        counts.raster_layers,
        page_count
    );

    Ok(VectorScene {
        counts,
        stroke_primitives_a: pack_records("stroke-primitives-a", &endpoints, max_side)?,
        stroke_primitives_b: pack_records("stroke-primitives-b", &meta, max_side)?,
        stroke_styles: pack_records("stroke-styles", &styles, max_side)?,
        stroke_primitive_bounds: pack_records("stroke-primitive-bounds", &stroke_bounds, max_side)?,
        fill_paths_a: pack_records("fill-paths-a", &fill_a, max_side)?,
        fill_paths_b: pack_records("fill-paths-b", &fill_b, max_side)?,
        fill_paths_c: pack_records("fill-paths-c", &fill_c, max_side)?,
        fill_segments_a: pack_records("fill-segments-a", &fill_seg_a, max_side)?,
        fill_segments_b: pack_records("fill-segments-b", &fill_seg_b, max_side)?,
        text_instances_a: pack_records("text-instances-a", &text_a, max_side)?,
        text_instances_b: pack_records("text-instances-b", &text_b, max_side)?,
        text_instances_c: pack_records("text-instances-c", &text_c, max_side)?,
        glyphs_a: pack_records("glyphs-a", &glyph_a, max_side)?,
        glyphs_b: pack_records("glyphs-b", &glyph_b, max_side)?,
        glyph_segments_a: pack_records("glyph-segments-a", &glyph_seg_a, max_side)?,
        glyph_segments_b: pack_records("glyph-segments-b", &glyph_seg_b, max_side)?,
        raster_layers: rasters,
        bounds: finite_or_zero(bounds),
        page_bounds: finite_or_zero(page_bounds),
        page_rects,
        page_count,
        pages_per_row: per_row as u32,
        max_half_width,
    })
}
