// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Uniform-grid broad-phase index over the scene bounds.

use crate::math::Bounds;
use crate::scene::VectorScene;

/// Strokes per cell the grid sizing aims for.
const STROKES_PER_CELL: f32 = 8.0;
/// Clamp range for the target cell count.
const MIN_CELLS: f32 = 30_000.0;
const MAX_CELLS: f32 = 220_000.0;
/// Clamp range for each grid dimension.
const MIN_DIM: f32 = 64.0;
const MAX_DIM: f32 = 1024.0;

/// A uniform grid over a scene's bounds with CSR cell membership.
///
/// Derived deterministically from a [`VectorScene`]; read-only for that
/// scene's lifetime. Cell `(col, row)` holds the index of every stroke whose
/// margin-expanded bounds intersect the cell's world rectangle.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    cols: u32,
    rows: u32,
    bounds: Bounds,
    cell_w: f32,
    cell_h: f32,
    /// `cols * rows + 1` prefix sums into `indices`.
    offsets: Vec<u32>,
    /// Stroke indices, cell-major.
    indices: Vec<u32>,
    max_cell_population: u32,
}

impl SpatialGrid {
    /// Builds the index from a scene's per-stroke bounds.
    pub fn build(scene: &VectorScene) -> Self {
        let stroke_bounds = scene.stroke_bounds();
        let n = stroke_bounds.len();
        let bounds = scene.bounds;
        let width = bounds.width().max(1e-6);
        let height = bounds.height().max(1e-6);

        let target = (n as f32 / STROKES_PER_CELL)
            .round()
            .clamp(MIN_CELLS, MAX_CELLS);
        let aspect = width / height;
        let cols = (target * aspect).sqrt().round().clamp(MIN_DIM, MAX_DIM) as u32;
        let rows = (target / cols as f32).round().clamp(MIN_DIM, MAX_DIM) as u32;
        let cell_w = width / cols as f32;
        let cell_h = height / rows as f32;

        let cells = cols as usize * rows as usize;
        let mut counts = vec![0u32; cells];
        // Low edges sitting exactly on a cell boundary also touch the cell
        // below, so membership stays the exact mirror of rect intersection.
        let axis_span = |lo: f32, hi: f32, origin: f32, cell: f32, dims: u32| -> (u32, u32) {
            let f0 = (lo - origin) / cell;
            let mut a = f0.floor();
            if f0 == a {
                a -= 1.0;
            }
            let a = (a as i64).clamp(0, dims as i64 - 1) as u32;
            let b = (((hi - origin) / cell).floor() as i64).clamp(a as i64, dims as i64 - 1) as u32;
            (a, b)
        };
        let cell_span = |b: &Bounds| -> (u32, u32, u32, u32) {
            let (c0, c1) = axis_span(b.min_x, b.max_x, bounds.min_x, cell_w, cols);
            let (r0, r1) = axis_span(b.min_y, b.max_y, bounds.min_y, cell_h, rows);
            (c0, c1, r0, r1)
        };

        for b in stroke_bounds {
            let (c0, c1, r0, r1) = cell_span(b);
            for row in r0..=r1 {
                for col in c0..=c1 {
                    counts[(row * cols + col) as usize] += 1;
                }
            }
        }

        let mut offsets = vec![0u32; cells + 1];
        let mut total = 0u32;
        for (cell, count) in counts.iter().enumerate() {
            offsets[cell] = total;
            total += count;
        }
        offsets[cells] = total;

        let mut cursor = offsets[..cells].to_vec();
        let mut indices = vec![0u32; total as usize];
        for (i, b) in stroke_bounds.iter().enumerate() {
            let (c0, c1, r0, r1) = cell_span(b);
            for row in r0..=r1 {
                for col in c0..=c1 {
                    let cell = (row * cols + col) as usize;
                    indices[cursor[cell] as usize] = i as u32;
                    cursor[cell] += 1;
                }
            }
        }

        let max_cell_population = counts.iter().copied().max().unwrap_or(0);
        log::debug!(
            "grid: {cols}x{rows} cells, {} memberships, max cell {}",
            indices.len(),
            max_cell_population
        );
        Self {
            cols,
            rows,
            bounds,
            cell_w,
            cell_h,
            offsets,
            indices,
            max_cell_population,
        }
    }

    /// Grid width in cells.
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Grid height in cells.
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Largest number of strokes recorded in a single cell.
    pub fn max_cell_population(&self) -> u32 {
        self.max_cell_population
    }

    /// Total stroke-cell memberships.
    pub fn membership_count(&self) -> usize {
        self.indices.len()
    }

    /// The stroke indices recorded for one cell.
    pub fn cell_members(&self, col: u32, row: u32) -> &[u32] {
        let cell = (row * self.cols + col) as usize;
        let start = self.offsets[cell] as usize;
        let end = self.offsets[cell + 1] as usize;
        &self.indices[start..end]
    }

    /// World rectangle of one cell.
    pub fn cell_rect(&self, col: u32, row: u32) -> Bounds {
        Bounds::new(
            self.bounds.min_x + col as f32 * self.cell_w,
            self.bounds.min_y + row as f32 * self.cell_h,
            self.bounds.min_x + (col + 1) as f32 * self.cell_w,
            self.bounds.min_y + (row + 1) as f32 * self.cell_h,
        )
    }

    /// The inclusive cell range covered by a world rectangle, clamped to the
    /// grid extents.
    pub fn cell_range(&self, rect: &Bounds) -> (u32, u32, u32, u32) {
        let clamp_col = |x: f32| {
            (((x - self.bounds.min_x) / self.cell_w).floor() as i64)
                .clamp(0, self.cols as i64 - 1) as u32
        };
        let clamp_row = |y: f32| {
            (((y - self.bounds.min_y) / self.cell_h).floor() as i64)
                .clamp(0, self.rows as i64 - 1) as u32
        };
        (
            clamp_col(rect.min_x),
            clamp_col(rect.max_x),
            clamp_row(rect.min_y),
            clamp_row(rect.max_y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::SpatialGrid;
    use crate::cull::CullStats;
    use crate::interp::PageBuild;
    use crate::math::Bounds;
    use crate::merge::StrokeSeg;
    use crate::pack::{compose, PageInput};
    use crate::scene::VectorScene;

    fn scene_with_strokes(strokes: Vec<StrokeSeg>, view: Bounds) -> VectorScene {
        let merged = strokes.len() as u32;
        let mut build = PageBuild::default();
        build.source_segments = merged;
        build.strokes = strokes;
        compose(
            vec![PageInput {
                build,
                view,
                merged_segments: merged,
                cull: CullStats::default(),
            }],
            1,
            16384,
        )
        .unwrap()
    }

    fn seg(x0: f32, y0: f32, x1: f32, y1: f32) -> StrokeSeg {
        StrokeSeg {
            x0,
            y0,
            x1,
            y1,
            half_width: 0.5,
            luma: 0.0,
            alpha: 1.0,
            flags: 0,
        }
    }

    fn dense_scene(n: usize) -> VectorScene {
        let mut strokes = Vec::with_capacity(n);
        for i in 0..n {
            let x = (i % 100) as f32;
            let y = (i / 100) as f32;
            strokes.push(seg(x, y, x + 0.5, y + 0.5));
        }
        scene_with_strokes(strokes, Bounds::new(0.0, 0.0, 100.0, 100.0))
    }

    #[test]
    fn dimensions_stay_in_range() {
        let grid = SpatialGrid::build(&dense_scene(10_000));
        assert!(grid.cols() >= 64 && grid.cols() <= 1024);
        assert!(grid.rows() >= 64 && grid.rows() <= 1024);
        assert!(grid.membership_count() >= 10_000);
        assert!(grid.max_cell_population() <= 10_000);
    }

    #[test]
    fn offsets_are_consistent() {
        let grid = SpatialGrid::build(&dense_scene(1_000));
        assert_eq!(
            *grid.offsets.last().unwrap() as usize,
            grid.indices.len()
        );
        assert!(grid.indices.iter().all(|i| (*i as usize) < 1_000));
    }

    #[test]
    fn membership_matches_intersection() {
        let scene = dense_scene(500);
        let grid = SpatialGrid::build(&scene);
        let stroke_bounds = scene.stroke_bounds();
        // Spot-check a band of cells: membership iff rect intersection.
        for row in 0..grid.rows().min(8) {
            for col in 0..grid.cols().min(8) {
                let rect = grid.cell_rect(col, row);
                let members = grid.cell_members(col, row);
                for (i, b) in stroke_bounds.iter().enumerate() {
                    let listed = members.contains(&(i as u32));
                    assert_eq!(listed, rect.intersects(b), "cell ({col},{row}) stroke {i}");
                }
            }
        }
    }

    #[test]
    fn empty_scene_builds_empty_grid() {
        let scene = VectorScene::default();
        let grid = SpatialGrid::build(&scene);
        assert_eq!(grid.membership_count(), 0);
        assert_eq!(grid.max_cell_population(), 0);
    }
}
