// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Utility functions shared across different tests.

#![allow(dead_code)]

use veduta::provider::{path_op, Op, PaintOp, RecordedPages};
use veduta::{extract_pages, Bounds, CancelToken, ExtractOptions, VectorScene};

/// Packed path data for a polyline: `MoveTo` first point, `LineTo` the rest.
pub fn polyline(points: &[(f32, f32)]) -> Vec<f32> {
    let mut data = Vec::with_capacity(points.len() * 3);
    for (i, (x, y)) in points.iter().enumerate() {
        data.push(if i == 0 {
            path_op::MOVE_TO
        } else {
            path_op::LINE_TO
        });
        data.push(*x);
        data.push(*y);
    }
    data
}

/// A stroked polyline operator.
pub fn stroke(points: &[(f32, f32)]) -> Op {
    Op::ConstructPath {
        paint: PaintOp::Stroke,
        data: polyline(points),
    }
}

/// A filled polygon operator (implicitly closed).
pub fn fill(points: &[(f32, f32)]) -> Op {
    Op::ConstructPath {
        paint: PaintOp::Fill,
        data: polyline(points),
    }
}

/// Builds a one-page scene with default options.
pub fn build(ops: Vec<Op>) -> VectorScene {
    build_with(ops, &ExtractOptions::default())
}

/// Builds a one-page scene with explicit options.
pub fn build_with(ops: Vec<Op>, options: &ExtractOptions) -> VectorScene {
    let mut provider = RecordedPages::new("test");
    provider.push_page(Bounds::new(0.0, 0.0, 100.0, 100.0), ops);
    *extract_pages(&mut provider, options, &CancelToken::new())
        .expect("extraction failed")
        .scene()
        .expect("extraction was cancelled")
}

/// Builds a multi-page scene, one operator list per page.
pub fn build_pages(pages: Vec<Vec<Op>>, view: Bounds, options: &ExtractOptions) -> VectorScene {
    let mut provider = RecordedPages::new("test");
    for ops in pages {
        provider.push_page(view, ops);
    }
    *extract_pages(&mut provider, options, &CancelToken::new())
        .expect("extraction failed")
        .scene()
        .expect("extraction was cancelled")
}

/// A square glyph outline in em space with the given advance.
pub fn square_glyph(id: u32, advance: f32) -> Op {
    Op::DefineGlyph {
        id,
        advance,
        data: polyline(&[(0.0, 0.0), (0.8, 0.0), (0.8, 1.0), (0.0, 1.0)]),
    }
}

/// A tiny 2x1 image with one translucent pixel.
pub fn tiny_image() -> Op {
    Op::DrawImage {
        width: 2,
        height: 1,
        pixels: vec![255, 0, 0, 255, 0, 255, 0, 128],
        matrix: [2.0, 0.0, 0.0, 1.0, 10.0, 10.0],
    }
}

pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "{actual} is not close to {expected}"
    );
}
