// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The operator interpreter: graphics state, path construction, and
//! per-primitive emission into the flatten/merge pipeline.

use std::collections::HashMap;

use crate::flatten::{flatten_cubic, Cubic, Point};
use crate::math::{Bounds, Transform};
use crate::merge::{SegmentMerger, StrokeSeg};
use crate::provider::{path_op, ColourSpec, Op, PaintOp};
use crate::scene::{FillPath, GlyphOutline, RasterLayer, TextInstance};

/// Smallest stored half-width.
const MIN_HALF_WIDTH: f32 = 0.2;
/// Half-width used when the line width is exactly zero.
const HAIRLINE_HALF_WIDTH: f32 = 0.35;
/// Alpha at or below which fills and text are invisible.
const TRANSPARENT_ALPHA: f32 = 1e-3;

/// Stacked graphics state.
#[derive(Clone, Copy, Debug)]
struct GState {
    ctm: Transform,
    line_width: f32,
    stroke_luma: f32,
    stroke_alpha: f32,
    fill_rgb: [f32; 3],
    fill_alpha: f32,
    dashed: bool,
}

impl GState {
    fn new(ctm: Transform) -> Self {
        Self {
            ctm,
            line_width: 1.0,
            stroke_luma: 0.0,
            stroke_alpha: 1.0,
            fill_rgb: [0.0; 3],
            fill_alpha: 1.0,
            dashed: false,
        }
    }
}

/// Raw primitives accumulated for one page, before the cull and the packer.
#[derive(Debug, Default)]
pub(crate) struct PageBuild {
    /// Merged stroke segments in emission order.
    pub strokes: Vec<StrokeSeg>,
    /// Segments fed into the merger.
    pub source_segments: u32,
    pub fills: Vec<FillPath>,
    pub fill_segments: Vec<[f32; 4]>,
    pub texts: Vec<TextInstance>,
    pub glyphs: Vec<GlyphOutline>,
    pub glyph_segments: Vec<[f32; 4]>,
    pub rasters: Vec<RasterLayer>,
    /// Paths truncated and operators dropped for malformed data.
    pub malformed: u32,
}

#[derive(Clone, Copy)]
struct CachedGlyph {
    index: u32,
    advance: f32,
    seg_count: u32,
}

/// Interprets one page's operator list.
///
/// The interpreter owns the graphics-state stack and survives across operator
/// chunks; [`finish`](Self::finish) yields the accumulated primitives.
pub(crate) struct Interpreter {
    flatness: f32,
    max_depth: u32,
    merge_enabled: bool,
    cull_enabled: bool,
    state: GState,
    stack: Vec<GState>,
    glyph_cache: HashMap<u32, CachedGlyph>,
    out: PageBuild,
}

impl Interpreter {
    pub(crate) fn new(
        base: Transform,
        flatness: f32,
        max_depth: u32,
        merge_enabled: bool,
        cull_enabled: bool,
    ) -> Self {
        Self {
            flatness,
            max_depth,
            merge_enabled,
            cull_enabled,
            state: GState::new(base),
            stack: Vec::new(),
            glyph_cache: HashMap::new(),
            out: PageBuild::default(),
        }
    }

    /// Processes a chunk of operators in stream order.
    pub(crate) fn run(&mut self, ops: &[Op]) {
        for op in ops {
            self.op(op);
        }
    }

    /// Finishes the page.
    pub(crate) fn finish(self) -> PageBuild {
        self.out
    }

    fn anomaly(&mut self, what: &str) {
        self.out.malformed += 1;
        log::warn!("operator anomaly: {what}");
    }

    fn op(&mut self, op: &Op) {
        match op {
            Op::Save => self.stack.push(self.state),
            Op::Restore => {
                if let Some(prev) = self.stack.pop() {
                    self.state = prev;
                }
            }
            Op::Transform(coeffs) => {
                let m = Transform::from_coeffs(*coeffs);
                if m.is_finite() {
                    self.state.ctm = self.state.ctm * m;
                } else {
                    self.anomaly("non-finite transform");
                }
            }
            Op::SetLineWidth(w) => {
                if w.is_finite() {
                    self.state.line_width = w.max(0.0);
                } else {
                    self.anomaly("non-finite line width");
                }
            }
            Op::SetStrokeColour(spec) => {
                if let Some(rgb) = resolve_colour(spec) {
                    self.state.stroke_luma = luma(rgb);
                }
            }
            Op::SetFillColour(spec) => {
                if let Some(rgb) = resolve_colour(spec) {
                    self.state.fill_rgb = rgb;
                }
            }
            Op::SetDash { array, .. } => {
                self.state.dashed = array.iter().any(|d| *d > 0.0);
            }
            Op::SetGState(entries) => {
                for (key, value) in entries {
                    if !value.is_finite() {
                        self.anomaly("non-finite gstate value");
                        continue;
                    }
                    match key.as_str() {
                        "CA" => self.state.stroke_alpha = value.clamp(0.0, 1.0),
                        "LW" => self.state.line_width = value.max(0.0),
                        _ => {}
                    }
                }
            }
            Op::ConstructPath { paint, data } => self.construct_path(*paint, data),
            Op::DefineGlyph { id, advance, data } => self.define_glyph(*id, *advance, data),
            Op::ShowText { glyphs } => self.show_text(glyphs),
            Op::DrawImage {
                width,
                height,
                pixels,
                matrix,
            } => self.draw_image(*width, *height, pixels, *matrix),
        }
    }

    /// Stroke half-width for the current state, in page space.
    fn half_width(&self) -> f32 {
        if self.state.line_width == 0.0 {
            return HAIRLINE_HALF_WIDTH;
        }
        (self.state.line_width * self.state.ctm.scale() * 0.5).max(MIN_HALF_WIDTH)
    }

    fn construct_path(&mut self, paint: PaintOp, data: &[f32]) {
        let (cmds, truncated) = decode_path(data);
        if truncated {
            self.anomaly("malformed path record, path truncated");
        }
        if cmds.is_empty() || paint == PaintOp::None {
            return;
        }
        if paint.strokes() {
            self.stroke_path(&cmds, paint.closes());
        }
        if paint.fills() {
            self.fill_path(&cmds, paint.even_odd());
        }
    }

    fn stroke_path(&mut self, cmds: &[PathCmd], close_final: bool) {
        let ctm = self.state.ctm;
        let template = StrokeSeg {
            x0: 0.0,
            y0: 0.0,
            x1: 0.0,
            y1: 0.0,
            half_width: self.half_width(),
            luma: self.state.stroke_luma,
            alpha: self.state.stroke_alpha,
            flags: u32::from(self.state.dashed),
        };
        let out = &mut self.out.strokes;
        let mut source = 0u32;
        let mut dropped = 0u32;
        let mut merger = SegmentMerger::new(self.merge_enabled);
        let mut cur: Option<(f32, f32)> = None;
        let mut start: Option<(f32, f32)> = None;

        let mut push = |merger: &mut SegmentMerger,
                        out: &mut Vec<StrokeSeg>,
                        from: (f32, f32),
                        to: (f32, f32),
                        allow_merge: bool| {
            source += 1;
            let seg = StrokeSeg {
                x0: from.0,
                y0: from.1,
                x1: to.0,
                y1: to.1,
                ..template
            };
            merger.push(seg, allow_merge, out);
        };

        for cmd in cmds {
            match *cmd {
                PathCmd::MoveTo(x, y) => {
                    merger.flush(out);
                    let p = ctm.apply(x, y);
                    cur = Some(p);
                    start = Some(p);
                }
                PathCmd::LineTo(x, y) => {
                    if let Some(from) = cur {
                        let to = ctm.apply(x, y);
                        push(&mut merger, out, from, to, true);
                        cur = Some(to);
                    }
                }
                PathCmd::CurveTo(c) => {
                    if let Some(from) = cur {
                        let p1 = ctm.apply(c[0], c[1]);
                        let p2 = ctm.apply(c[2], c[3]);
                        let p3 = ctm.apply(c[4], c[5]);
                        let cubic = Cubic::new(
                            Point::new(from.0, from.1),
                            Point::new(p1.0, p1.1),
                            Point::new(p2.0, p2.1),
                            Point::new(p3.0, p3.1),
                        );
                        let ok = flatten_cubic(cubic, self.flatness, self.max_depth, &mut |a, b| {
                            push(&mut merger, out, (a.x, a.y), (b.x, b.y), false);
                        });
                        if !ok {
                            dropped += 1;
                        }
                        cur = Some(p3);
                    }
                }
                PathCmd::QuadTo(q) => {
                    if let Some(from) = cur {
                        let p1 = ctm.apply(q[0], q[1]);
                        let p2 = ctm.apply(q[2], q[3]);
                        let cubic = Cubic::from_quad(
                            Point::new(from.0, from.1),
                            Point::new(p1.0, p1.1),
                            Point::new(p2.0, p2.1),
                        );
                        let ok = flatten_cubic(cubic, self.flatness, self.max_depth, &mut |a, b| {
                            push(&mut merger, out, (a.x, a.y), (b.x, b.y), false);
                        });
                        if !ok {
                            dropped += 1;
                        }
                        cur = Some(p2);
                    }
                }
                PathCmd::Close => {
                    if let (Some(from), Some(to)) = (cur, start) {
                        if from != to {
                            push(&mut merger, out, from, to, true);
                        }
                        cur = Some(to);
                    }
                }
            }
        }
        if close_final {
            if let (Some(from), Some(to)) = (cur, start) {
                if from != to {
                    push(&mut merger, out, from, to, true);
                }
            }
        }
        merger.flush(out);
        self.out.source_segments += source;
        for _ in 0..dropped {
            self.anomaly("non-finite curve dropped");
        }
    }

    fn fill_path(&mut self, cmds: &[PathCmd], even_odd: bool) {
        let alpha = self.state.fill_alpha;
        if self.cull_enabled && alpha <= TRANSPARENT_ALPHA {
            return;
        }
        let ctm = self.state.ctm;
        let seg_offset = self.out.fill_segments.len() as u32;
        let mut bounds = Bounds::EMPTY;
        let flatness = self.flatness;
        let max_depth = self.max_depth;
        let mut dropped = 0u32;
        walk_outline(
            cmds,
            &ctm,
            flatness,
            max_depth,
            &mut |from, to| {
                bounds.add_point(from.0, from.1);
                bounds.add_point(to.0, to.1);
                self.out.fill_segments.push([from.0, from.1, to.0, to.1]);
            },
            &mut dropped,
        );
        let seg_count = self.out.fill_segments.len() as u32 - seg_offset;
        for _ in 0..dropped {
            self.anomaly("non-finite curve dropped");
        }
        if self.cull_enabled && (seg_count == 0 || bounds.width() * bounds.height() == 0.0) {
            self.out.fill_segments.truncate(seg_offset as usize);
            return;
        }
        if seg_count == 0 {
            return;
        }
        let [r, g, b] = self.state.fill_rgb;
        self.out.fills.push(FillPath {
            bounds,
            seg_offset,
            seg_count,
            color: [r, g, b, alpha],
            even_odd,
        });
    }

    fn define_glyph(&mut self, id: u32, advance: f32, data: &[f32]) {
        if !advance.is_finite() {
            self.anomaly("non-finite glyph advance");
            return;
        }
        let (cmds, truncated) = decode_path(data);
        if truncated {
            self.anomaly("malformed glyph outline, truncated");
        }
        let seg_offset = self.out.glyph_segments.len() as u32;
        let mut bounds = Bounds::EMPTY;
        let mut dropped = 0u32;
        walk_outline(
            &cmds,
            &Transform::IDENTITY,
            self.flatness,
            self.max_depth,
            &mut |from, to| {
                bounds.add_point(from.0, from.1);
                bounds.add_point(to.0, to.1);
                self.out.glyph_segments.push([from.0, from.1, to.0, to.1]);
            },
            &mut dropped,
        );
        for _ in 0..dropped {
            self.anomaly("non-finite curve dropped");
        }
        let seg_count = self.out.glyph_segments.len() as u32 - seg_offset;
        let index = self.out.glyphs.len() as u32;
        self.out.glyphs.push(GlyphOutline {
            seg_offset,
            seg_count,
            bounds,
        });
        self.glyph_cache.insert(
            id,
            CachedGlyph {
                index,
                advance,
                seg_count,
            },
        );
    }

    fn show_text(&mut self, glyphs: &[u32]) {
        let alpha = self.state.fill_alpha;
        if self.cull_enabled && alpha <= TRANSPARENT_ALPHA {
            return;
        }
        let [r, g, b] = self.state.fill_rgb;
        let color = [r, g, b, alpha];
        let mut pen = 0.0f32;
        for id in glyphs {
            let Some(glyph) = self.glyph_cache.get(id).copied() else {
                self.anomaly("unknown glyph id");
                continue;
            };
            let placement = self.state.ctm * Transform::translation(pen, 0.0);
            pen += glyph.advance;
            if self.cull_enabled && glyph.seg_count == 0 {
                continue;
            }
            self.out.texts.push(TextInstance {
                transform: placement.to_coeffs(),
                glyph_offset: glyph.index,
                glyph_count: 1,
                color,
            });
        }
    }

    fn draw_image(&mut self, width: u32, height: u32, pixels: &[u8], matrix: [f32; 6]) {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            self.anomaly("raster size mismatch");
            return;
        }
        let m = Transform::from_coeffs(matrix);
        if !m.is_finite() {
            self.anomaly("non-finite raster matrix");
            return;
        }
        let placement = self.state.ctm * m;
        let mut premul = pixels.to_vec();
        for px in premul.chunks_exact_mut(4) {
            let a = px[3] as u32;
            if a != 255 {
                px[0] = ((px[0] as u32 * a) / 255) as u8;
                px[1] = ((px[1] as u32 * a) / 255) as u8;
                px[2] = ((px[2] as u32 * a) / 255) as u8;
            }
        }
        self.out.rasters.push(RasterLayer {
            width,
            height,
            pixels: premul,
            matrix: placement.to_coeffs(),
        });
    }
}

/// A decoded path subcommand, still in path space.
#[derive(Clone, Copy, Debug, PartialEq)]
enum PathCmd {
    MoveTo(f32, f32),
    LineTo(f32, f32),
    CurveTo([f32; 6]),
    QuadTo([f32; 4]),
    Close,
}

/// Decodes packed path data, truncating at the first invalid record.
///
/// Returns the decoded prefix and whether truncation happened.
fn decode_path(data: &[f32]) -> (Vec<PathCmd>, bool) {
    let mut cmds = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let opcode = data[i];
        i += 1;
        let argc = if opcode == path_op::MOVE_TO || opcode == path_op::LINE_TO {
            2
        } else if opcode == path_op::CURVE_TO {
            6
        } else if opcode == path_op::QUAD_TO {
            4
        } else if opcode == path_op::CLOSE {
            0
        } else {
            return (cmds, true);
        };
        if i + argc > data.len() {
            return (cmds, true);
        }
        let args = &data[i..i + argc];
        if args.iter().any(|a| !a.is_finite()) {
            return (cmds, true);
        }
        i += argc;
        let cmd = if opcode == path_op::MOVE_TO {
            PathCmd::MoveTo(args[0], args[1])
        } else if opcode == path_op::LINE_TO {
            PathCmd::LineTo(args[0], args[1])
        } else if opcode == path_op::CURVE_TO {
            PathCmd::CurveTo([args[0], args[1], args[2], args[3], args[4], args[5]])
        } else if opcode == path_op::QUAD_TO {
            PathCmd::QuadTo([args[0], args[1], args[2], args[3]])
        } else {
            PathCmd::Close
        };
        cmds.push(cmd);
    }
    (cmds, false)
}

/// Walks a path as a closed outline, emitting transformed line segments.
///
/// Every subpath is implicitly closed, as fills and glyph outlines require.
fn walk_outline(
    cmds: &[PathCmd],
    ctm: &Transform,
    flatness: f32,
    max_depth: u32,
    emit: &mut impl FnMut((f32, f32), (f32, f32)),
    dropped: &mut u32,
) {
    fn close(
        cur: &mut Option<(f32, f32)>,
        start: Option<(f32, f32)>,
        emit: &mut impl FnMut((f32, f32), (f32, f32)),
    ) {
        if let (Some(from), Some(to)) = (*cur, start) {
            if from != to {
                emit(from, to);
            }
            *cur = Some(to);
        }
    }
    let mut cur: Option<(f32, f32)> = None;
    let mut start: Option<(f32, f32)> = None;
    for cmd in cmds {
        match *cmd {
            PathCmd::MoveTo(x, y) => {
                close(&mut cur, start, emit);
                let p = ctm.apply(x, y);
                cur = Some(p);
                start = Some(p);
            }
            PathCmd::LineTo(x, y) => {
                if let Some(from) = cur {
                    let to = ctm.apply(x, y);
                    if from != to {
                        emit(from, to);
                    }
                    cur = Some(to);
                }
            }
            PathCmd::CurveTo(c) => {
                if let Some(from) = cur {
                    let p1 = ctm.apply(c[0], c[1]);
                    let p2 = ctm.apply(c[2], c[3]);
                    let p3 = ctm.apply(c[4], c[5]);
                    let cubic = Cubic::new(
                        Point::new(from.0, from.1),
                        Point::new(p1.0, p1.1),
                        Point::new(p2.0, p2.1),
                        Point::new(p3.0, p3.1),
                    );
                    if !flatten_cubic(cubic, flatness, max_depth, &mut |a, b| {
                        emit((a.x, a.y), (b.x, b.y));
                    }) {
                        *dropped += 1;
                    }
                    cur = Some(p3);
                }
            }
            PathCmd::QuadTo(q) => {
                if let Some(from) = cur {
                    let p1 = ctm.apply(q[0], q[1]);
                    let p2 = ctm.apply(q[2], q[3]);
                    let cubic = Cubic::from_quad(
                        Point::new(from.0, from.1),
                        Point::new(p1.0, p1.1),
                        Point::new(p2.0, p2.1),
                    );
                    if !flatten_cubic(cubic, flatness, max_depth, &mut |a, b| {
                        emit((a.x, a.y), (b.x, b.y));
                    }) {
                        *dropped += 1;
                    }
                    cur = Some(p2);
                }
            }
            PathCmd::Close => close(&mut cur, start, emit),
        }
    }
    close(&mut cur, start, emit);
}

/// Rec. 709 luma of a normalised RGB triple.
fn luma([r, g, b]: [f32; 3]) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// Resolves a colour spec to normalised RGB; `None` keeps the previous
/// colour.
fn resolve_colour(spec: &ColourSpec) -> Option<[f32; 3]> {
    match spec {
        ColourSpec::Gray(g) => {
            let g = norm(*g)?;
            Some([g, g, g])
        }
        ColourSpec::Rgb(r, g, b) => Some([norm(*r)?, norm(*g)?, norm(*b)?]),
        ColourSpec::Cmyk(c, m, y, k) => {
            let k = norm(*k)?;
            Some([
                (1.0 - norm(*c)?) * (1.0 - k),
                (1.0 - norm(*m)?) * (1.0 - k),
                (1.0 - norm(*y)?) * (1.0 - k),
            ])
        }
        ColourSpec::Hex(s) => parse_hex(s),
    }
}

fn norm(v: f32) -> Option<f32> {
    v.is_finite().then(|| v.clamp(0.0, 1.0))
}

fn parse_hex(s: &str) -> Option<[f32; 3]> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    let nibble = |c: char| c.to_digit(16);
    let mut digits = hex.chars().map(nibble);
    match hex.len() {
        6 => {
            let mut channels = [0.0f32; 3];
            for channel in &mut channels {
                let hi = digits.next().flatten()?;
                let lo = digits.next().flatten()?;
                *channel = (hi * 16 + lo) as f32 / 255.0;
            }
            Some(channels)
        }
        3 => {
            let mut channels = [0.0f32; 3];
            for channel in &mut channels {
                let d = digits.next().flatten()?;
                *channel = (d * 17) as f32 / 255.0;
            }
            Some(channels)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::path_op::*;

    fn interp() -> Interpreter {
        Interpreter::new(Transform::IDENTITY, 0.35, 9, true, true)
    }

    fn stroke_ops(data: Vec<f32>) -> Op {
        Op::ConstructPath {
            paint: PaintOp::Stroke,
            data,
        }
    }

    #[test]
    fn simple_stroke_uses_half_line_width() {
        let mut it = interp();
        it.run(&[
            Op::SetLineWidth(2.0),
            stroke_ops(vec![MOVE_TO, 0.0, 0.0, LINE_TO, 10.0, 0.0]),
        ]);
        let page = it.finish();
        assert_eq!(page.strokes.len(), 1);
        let s = &page.strokes[0];
        assert_eq!((s.x0, s.y0, s.x1, s.y1), (0.0, 0.0, 10.0, 0.0));
        assert_eq!(s.half_width, 1.0);
        assert_eq!(s.luma, 0.0);
        assert_eq!(s.alpha, 1.0);
    }

    #[test]
    fn zero_line_width_is_hairline() {
        let mut it = interp();
        it.run(&[
            Op::SetLineWidth(0.0),
            stroke_ops(vec![MOVE_TO, 0.0, 0.0, LINE_TO, 1.0, 0.0]),
        ]);
        assert_eq!(it.finish().strokes[0].half_width, 0.35);
    }

    #[test]
    fn ctm_scales_width_and_points() {
        let mut it = interp();
        it.run(&[
            Op::Transform([2.0, 0.0, 0.0, 2.0, 5.0, 0.0]),
            Op::SetLineWidth(1.0),
            stroke_ops(vec![MOVE_TO, 0.0, 0.0, LINE_TO, 10.0, 0.0]),
        ]);
        let page = it.finish();
        let s = &page.strokes[0];
        assert_eq!((s.x0, s.x1), (5.0, 25.0));
        assert_eq!(s.half_width, 1.0);
    }

    #[test]
    fn save_restore_rewinds_state() {
        let mut it = interp();
        it.run(&[
            Op::SetLineWidth(4.0),
            Op::Save,
            Op::SetLineWidth(10.0),
            Op::Restore,
            stroke_ops(vec![MOVE_TO, 0.0, 0.0, LINE_TO, 1.0, 0.0]),
        ]);
        assert_eq!(it.finish().strokes[0].half_width, 2.0);
    }

    #[test]
    fn restore_on_empty_stack_is_noop() {
        let mut it = interp();
        it.run(&[
            Op::Restore,
            stroke_ops(vec![MOVE_TO, 0.0, 0.0, LINE_TO, 1.0, 0.0]),
        ]);
        assert_eq!(it.finish().strokes.len(), 1);
    }

    #[test]
    fn collinear_lines_merge() {
        let mut it = interp();
        it.run(&[stroke_ops(vec![
            MOVE_TO, 0.0, 0.0, LINE_TO, 10.0, 0.0, LINE_TO, 20.0, 0.0, LINE_TO, 30.0, 0.0,
        ])]);
        let page = it.finish();
        assert_eq!(page.source_segments, 3);
        assert_eq!(page.strokes.len(), 1);
        assert_eq!(page.strokes[0].x1, 30.0);
    }

    #[test]
    fn gstate_ca_sets_stroke_alpha() {
        let mut it = interp();
        it.run(&[
            Op::SetGState(vec![("CA".into(), 0.5), ("XX".into(), 9.0)]),
            stroke_ops(vec![MOVE_TO, 0.0, 0.0, LINE_TO, 1.0, 0.0]),
        ]);
        assert_eq!(it.finish().strokes[0].alpha, 0.5);
    }

    #[test]
    fn malformed_path_truncates_but_keeps_prefix() {
        let mut it = interp();
        it.run(&[stroke_ops(vec![
            MOVE_TO, 0.0, 0.0, LINE_TO, 10.0, 0.0, 99.0, 1.0, 2.0,
        ])]);
        let page = it.finish();
        assert_eq!(page.strokes.len(), 1);
        assert_eq!(page.malformed, 1);
    }

    #[test]
    fn non_finite_coordinate_truncates() {
        let mut it = interp();
        it.run(&[stroke_ops(vec![
            MOVE_TO, 0.0, 0.0, LINE_TO, f32::NAN, 0.0, LINE_TO, 5.0, 5.0,
        ])]);
        let page = it.finish();
        assert!(page.strokes.is_empty());
        assert_eq!(page.malformed, 1);
    }

    #[test]
    fn close_emits_segment_back_to_start() {
        let mut it = interp();
        it.run(&[stroke_ops(vec![
            MOVE_TO, 0.0, 0.0, LINE_TO, 10.0, 0.0, LINE_TO, 10.0, 10.0, CLOSE,
        ])]);
        let page = it.finish();
        assert_eq!(page.source_segments, 3);
    }

    #[test]
    fn curve_chords_do_not_merge_but_lines_do() {
        let mut it = interp();
        it.run(&[stroke_ops(vec![
            MOVE_TO, 0.0, 0.0, CURVE_TO, 10.0, 10.0, 20.0, 10.0, 30.0, 0.0,
        ])]);
        let page = it.finish();
        assert!(page.strokes.len() >= 2);
        assert_eq!(page.source_segments, page.strokes.len() as u32);
    }

    #[test]
    fn fill_collects_closed_outline() {
        let mut it = interp();
        it.run(&[
            Op::SetFillColour(ColourSpec::Rgb(1.0, 0.0, 0.0)),
            Op::ConstructPath {
                paint: PaintOp::Fill,
                data: vec![
                    MOVE_TO, 0.0, 0.0, LINE_TO, 10.0, 0.0, LINE_TO, 10.0, 10.0, LINE_TO, 0.0,
                    10.0,
                ],
            },
        ]);
        let page = it.finish();
        assert_eq!(page.fills.len(), 1);
        let fill = &page.fills[0];
        // Implicit close adds the fourth edge.
        assert_eq!(fill.seg_count, 4);
        assert_eq!(fill.color, [1.0, 0.0, 0.0, 1.0]);
        assert!(!fill.even_odd);
        assert_eq!(fill.bounds, Bounds::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn fill_stroke_feeds_both_pipelines() {
        let mut it = interp();
        it.run(&[Op::ConstructPath {
            paint: PaintOp::FillStroke,
            data: vec![MOVE_TO, 0.0, 0.0, LINE_TO, 10.0, 0.0, LINE_TO, 5.0, 5.0],
        }]);
        let page = it.finish();
        assert_eq!(page.fills.len(), 1);
        assert!(!page.strokes.is_empty());
    }

    #[test]
    fn text_places_instances_with_advances() {
        let mut it = interp();
        let bar = vec![
            MOVE_TO, 0.0, 0.0, LINE_TO, 0.4, 0.0, LINE_TO, 0.4, 1.0, LINE_TO, 0.0, 1.0,
        ];
        it.run(&[
            Op::DefineGlyph {
                id: 7,
                advance: 0.6,
                data: bar,
            },
            Op::Transform([10.0, 0.0, 0.0, 10.0, 100.0, 50.0]),
            Op::ShowText {
                glyphs: vec![7, 7],
            },
        ]);
        let page = it.finish();
        assert_eq!(page.glyphs.len(), 1);
        assert_eq!(page.texts.len(), 2);
        assert_eq!(page.texts[0].transform[4], 100.0);
        // Second instance advances by 0.6 em under a 10x scale.
        assert_eq!(page.texts[1].transform[4], 106.0);
        assert_eq!(page.texts[0].glyph_offset, 0);
        assert_eq!(page.texts[0].glyph_count, 1);
    }

    #[test]
    fn unknown_glyph_is_skipped_and_tallied() {
        let mut it = interp();
        it.run(&[Op::ShowText { glyphs: vec![3] }]);
        let page = it.finish();
        assert!(page.texts.is_empty());
        assert_eq!(page.malformed, 1);
    }

    #[test]
    fn image_is_premultiplied_and_placed() {
        let mut it = interp();
        it.run(&[
            Op::Transform([1.0, 0.0, 0.0, 1.0, 4.0, 4.0]),
            Op::DrawImage {
                width: 1,
                height: 1,
                pixels: vec![200, 100, 50, 128],
                matrix: [8.0, 0.0, 0.0, 8.0, 0.0, 0.0],
            },
        ]);
        let page = it.finish();
        assert_eq!(page.rasters.len(), 1);
        let raster = &page.rasters[0];
        assert_eq!(raster.matrix, [8.0, 0.0, 0.0, 8.0, 4.0, 4.0]);
        assert_eq!(raster.pixels, vec![100, 50, 25, 128]);
    }

    #[test]
    fn colour_specs_collapse_to_luma() {
        let mut it = interp();
        it.run(&[
            Op::SetStrokeColour(ColourSpec::Rgb(1.0, 1.0, 1.0)),
            stroke_ops(vec![MOVE_TO, 0.0, 0.0, LINE_TO, 1.0, 0.0]),
            Op::SetStrokeColour(ColourSpec::Hex("not-a-colour".into())),
            stroke_ops(vec![MOVE_TO, 0.0, 1.0, LINE_TO, 1.0, 1.0]),
            Op::SetStrokeColour(ColourSpec::Cmyk(0.0, 0.0, 0.0, 1.0)),
            stroke_ops(vec![MOVE_TO, 0.0, 2.0, LINE_TO, 1.0, 2.0]),
        ]);
        let page = it.finish();
        assert!((page.strokes[0].luma - 1.0).abs() < 1e-6);
        // Unparseable hex keeps the previous luma.
        assert!((page.strokes[1].luma - 1.0).abs() < 1e-6);
        assert_eq!(page.strokes[2].luma, 0.0);
    }

    #[test]
    fn hex_colours_parse_both_forms() {
        assert_eq!(parse_hex("#ffffff"), Some([1.0, 1.0, 1.0]));
        assert_eq!(parse_hex("fff"), Some([1.0, 1.0, 1.0]));
        assert_eq!(parse_hex("#0f0"), Some([0.0, 1.0, 0.0]));
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(parse_hex("zzzzzz"), None);
    }

    #[test]
    fn out_of_range_components_renormalise() {
        let mut it = interp();
        it.run(&[
            Op::SetStrokeColour(ColourSpec::Rgb(2.0, -1.0, 0.5)),
            stroke_ops(vec![MOVE_TO, 0.0, 0.0, LINE_TO, 1.0, 0.0]),
        ]);
        let luma = it.finish().strokes[0].luma;
        assert!((luma - (0.2126 + 0.0722 * 0.5)).abs() < 1e-6);
    }
}
