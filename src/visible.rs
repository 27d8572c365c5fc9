// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame visible-set construction with epoch-marked dedup.

use crate::grid::SpatialGrid;
use crate::math::Bounds;
use crate::scene::VectorScene;

/// Fraction of grid cells a view must cover before the whole scene is drawn
/// without per-cell work.
const FULL_VIEW_COVERAGE: f32 = 0.92;
/// Extra world-space margin, in pixels at the current zoom.
const MARGIN_PIXELS: f32 = 16.0;

/// The camera for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Camera centre in world space.
    pub center_x: f32,
    pub center_y: f32,
    /// World-to-pixel zoom factor.
    pub zoom: f32,
    /// Viewport size in pixels.
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    /// The margin-expanded world rectangle this camera sees.
    fn world_rect(&self, max_half_width: f32) -> Bounds {
        let margin = (MARGIN_PIXELS / self.zoom).max(max_half_width * 2.0);
        let half_w = self.width / (2.0 * self.zoom);
        let half_h = self.height / (2.0 * self.zoom);
        Bounds::new(
            self.center_x - half_w - margin,
            self.center_y - half_h - margin,
            self.center_x + half_w + margin,
            self.center_y + half_h + margin,
        )
    }
}

/// The outcome of a visible-set query.
#[derive(Debug, PartialEq, Eq)]
pub enum Visibility<'a> {
    /// Every stroke is visible; the renderer draws the identity prefix.
    All,
    /// The visible stroke indices, in cell-scan order, without duplicates.
    Indices(&'a [u32]),
}

/// Renderer-owned scratch state for visible-set queries.
///
/// The mark array carries a monotonically increasing epoch token so dedup
/// costs O(1) per candidate with no per-frame clear; the output buffer is
/// overwritten each frame and never exceeds the stroke count.
#[derive(Debug)]
pub struct VisibleSet {
    marks: Vec<u32>,
    epoch: u32,
    out: Vec<u32>,
}

impl VisibleSet {
    /// Allocates scratch for a scene; call once at scene install.
    pub fn new(scene: &VectorScene) -> Self {
        let n = scene.counts.strokes as usize;
        Self {
            marks: vec![0; n],
            epoch: 0,
            out: Vec::with_capacity(n),
        }
    }

    /// Builds the visible set for one frame.
    ///
    /// `interacting` suppresses the whole-scene fast path while a gesture is
    /// in flight, keeping frame cost bounded by the view.
    pub fn compute(
        &mut self,
        scene: &VectorScene,
        grid: &SpatialGrid,
        viewport: &Viewport,
        interacting: bool,
    ) -> Visibility<'_> {
        let view = viewport.world_rect(scene.max_half_width);
        let (c0, c1, r0, r1) = grid.cell_range(&view);
        let covered = (c1 - c0 + 1) as f32 * (r1 - r0 + 1) as f32;
        let total = grid.cols() as f32 * grid.rows() as f32;
        if covered >= FULL_VIEW_COVERAGE * total && !interacting {
            return Visibility::All;
        }

        if self.epoch == u32::MAX {
            self.marks.fill(0);
            self.epoch = 1;
        } else {
            self.epoch += 1;
        }
        let epoch = self.epoch;

        self.out.clear();
        let stroke_bounds = scene.stroke_bounds();
        for row in r0..=r1 {
            for col in c0..=c1 {
                for &i in grid.cell_members(col, row) {
                    let mark = &mut self.marks[i as usize];
                    if *mark == epoch {
                        continue;
                    }
                    *mark = epoch;
                    if stroke_bounds[i as usize].intersects(&view) {
                        self.out.push(i);
                    }
                }
            }
        }
        Visibility::Indices(&self.out)
    }
}
