// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The operator-stream provider surface.
//!
//! A provider hands the extractor one finite operator list per page. Real
//! providers wrap a PDF parser; the crate ships [`RecordedPages`], an
//! in-memory provider used by tests and archive round-trips.

use crate::math::Bounds;
use crate::Result;

/// Path subcommand opcodes inside packed path data.
pub mod path_op {
    pub const MOVE_TO: f32 = 0.0;
    pub const LINE_TO: f32 = 1.0;
    pub const CURVE_TO: f32 = 2.0;
    pub const QUAD_TO: f32 = 3.0;
    pub const CLOSE: f32 = 4.0;
}

/// How a constructed path is painted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintOp {
    /// Construct only; nothing is emitted.
    None,
    Stroke,
    CloseStroke,
    Fill,
    EoFill,
    FillStroke,
    EoFillStroke,
    CloseFillStroke,
    CloseEoFillStroke,
}

impl PaintOp {
    /// Whether the stroke subpipeline receives the path.
    pub fn strokes(self) -> bool {
        matches!(
            self,
            Self::Stroke
                | Self::CloseStroke
                | Self::FillStroke
                | Self::EoFillStroke
                | Self::CloseFillStroke
                | Self::CloseEoFillStroke
        )
    }

    /// Whether the fill subpipeline receives the path.
    pub fn fills(self) -> bool {
        matches!(
            self,
            Self::Fill
                | Self::EoFill
                | Self::FillStroke
                | Self::EoFillStroke
                | Self::CloseFillStroke
                | Self::CloseEoFillStroke
        )
    }

    /// Whether the final subpath is implicitly closed before stroking.
    pub fn closes(self) -> bool {
        matches!(
            self,
            Self::CloseStroke | Self::CloseFillStroke | Self::CloseEoFillStroke
        )
    }

    /// Whether fills use the even-odd winding rule.
    pub fn even_odd(self) -> bool {
        matches!(
            self,
            Self::EoFill | Self::EoFillStroke | Self::CloseEoFillStroke
        )
    }
}

/// A colour argument, as loosely typed as page-description streams deliver it.
#[derive(Clone, Debug, PartialEq)]
pub enum ColourSpec {
    /// Single gray component.
    Gray(f32),
    /// Red, green, blue.
    Rgb(f32, f32, f32),
    /// Cyan, magenta, yellow, key.
    Cmyk(f32, f32, f32, f32),
    /// `#rrggbb` or `#rgb`, with or without the hash.
    Hex(String),
}

/// One drawing operator.
///
/// Unknown source opcodes never reach this enum; providers skip them.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Push a copy of the graphics state.
    Save,
    /// Pop the graphics state; no-op on an empty stack.
    Restore,
    /// Right-multiply the CTM by the given affine.
    Transform([f32; 6]),
    /// Set the line width (clamped to non-negative).
    SetLineWidth(f32),
    /// Set the stroke colour; non-parseable input keeps the previous value.
    SetStrokeColour(ColourSpec),
    /// Set the fill colour; non-parseable input keeps the previous value.
    SetFillColour(ColourSpec),
    /// Set the dash pattern; a non-empty array marks strokes as dashed.
    SetDash {
        array: Vec<f32>,
        phase: f32,
    },
    /// Apply graphics-state parameter entries; only `CA` and `LW` have
    /// effect.
    SetGState(Vec<(String, f32)>),
    /// Construct a path from packed subcommand data and paint it.
    ConstructPath {
        paint: PaintOp,
        data: Vec<f32>,
    },
    /// Register a glyph outline in em space with its advance width.
    DefineGlyph {
        id: u32,
        advance: f32,
        data: Vec<f32>,
    },
    /// Place a run of previously defined glyphs at the CTM, pen advancing
    /// along the x axis.
    ShowText {
        glyphs: Vec<u32>,
    },
    /// Place an RGBA8 image; `matrix` maps the unit square, composed with
    /// the CTM.
    DrawImage {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        matrix: [f32; 6],
    },
}

/// A finite, single-consumption source of per-page operator lists.
///
/// `page_operators` is the pipeline's only suspension point; it may block on
/// I/O. All other methods are cheap metadata queries.
pub trait PageProvider {
    /// Number of pages in the source.
    fn page_count(&self) -> usize;

    /// The operator list for one page. Each page is consumed at most once.
    fn page_operators(&mut self, page: usize) -> Result<Vec<Op>>;

    /// The page's view rectangle in page space.
    fn page_view(&self, page: usize) -> Bounds;

    /// The page's rotation in degrees, a multiple of 90.
    fn page_rotation(&self, _page: usize) -> u16 {
        0
    }

    /// Base transform placing page content inside the view for a rotation of
    /// 0, 90, 180 or 270 degrees.
    ///
    /// Quarter and half turns land the content in an origin-based view, with
    /// width and height swapped for the quarter turns; a rotation of 0 leaves
    /// page coordinates untouched.
    fn page_view_transform(&self, page: usize, rotation: u16) -> [f32; 6] {
        let view = self.page_view(page);
        let (w, h) = (view.width(), view.height());
        let (x0, y0) = (view.min_x, view.min_y);
        match rotation % 360 {
            90 => [0.0, 1.0, -1.0, 0.0, h + y0, -x0],
            180 => [-1.0, 0.0, 0.0, -1.0, w + x0, h + y0],
            270 => [0.0, -1.0, 1.0, 0.0, -y0, w + x0],
            _ => [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        }
    }

    /// Label used in diagnostics.
    fn source_label(&self) -> &str;
}

/// One recorded page: a view rectangle, its rotation, and its operator list.
#[derive(Clone, Debug)]
pub struct RecordedPage {
    /// View rectangle in page space.
    pub view: Bounds,
    /// Rotation in degrees, a multiple of 90.
    pub rotation: u16,
    /// Operators in stream order.
    pub ops: Vec<Op>,
}

/// An in-memory provider over pre-recorded operator lists.
#[derive(Clone, Debug, Default)]
pub struct RecordedPages {
    label: String,
    pages: Vec<RecordedPage>,
}

impl RecordedPages {
    /// Creates an empty recording with a diagnostic label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pages: Vec::new(),
        }
    }

    /// Appends an upright page.
    pub fn push_page(&mut self, view: Bounds, ops: Vec<Op>) -> &mut Self {
        self.push_page_rotated(view, 0, ops)
    }

    /// Appends a page with a rotation of 0, 90, 180 or 270 degrees.
    pub fn push_page_rotated(&mut self, view: Bounds, rotation: u16, ops: Vec<Op>) -> &mut Self {
        self.pages.push(RecordedPage {
            view,
            rotation,
            ops,
        });
        self
    }
}

impl PageProvider for RecordedPages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_operators(&mut self, page: usize) -> Result<Vec<Op>> {
        Ok(self.pages.get(page).map(|p| p.ops.clone()).unwrap_or_default())
    }

    fn page_view(&self, page: usize) -> Bounds {
        self.pages.get(page).map(|p| p.view).unwrap_or(Bounds::EMPTY)
    }

    fn page_rotation(&self, page: usize) -> u16 {
        self.pages.get(page).map(|p| p.rotation).unwrap_or(0)
    }

    fn source_label(&self) -> &str {
        &self.label
    }
}
