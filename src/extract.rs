// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The build driver: runs the per-page pipeline and composes the scene.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cull::cull_strokes;
use crate::interp::Interpreter;
use crate::math::{Bounds, Transform};
use crate::pack::{compose, PageInput};
use crate::provider::PageProvider;
use crate::scene::VectorScene;
use crate::{archive, Error, Result};

/// Operators processed between cancellation checks.
const CANCEL_CHUNK: usize = 4096;

/// What kind of source a byte payload is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceKind {
    /// Sniff the payload: a parsed-scene archive is recognised by its magic
    /// bytes, anything else is an operator-stream document.
    #[default]
    Auto,
    /// An operator-stream document, to be opened by a host provider.
    OperatorStream,
    /// A parsed-scene archive written by [`archive::write_scene`].
    ParsedArchive,
}

/// Extraction configuration.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    /// Join collinear segment runs (§ segment merger).
    pub enable_segment_merge: bool,
    /// Run the visibility cull.
    pub enable_invisible_cull: bool,
    /// Hard limit on extracted pages.
    pub max_pages: Option<usize>,
    /// Pages per composition row, `1..=100`; defaults to
    /// `ceil(sqrt(page_count))`.
    pub pages_per_row: Option<u32>,
    /// Maximum perpendicular deviation of flattened curves, world units.
    pub curve_flatness: f32,
    /// Hard recursion depth for curve subdivision.
    pub max_curve_split_depth: u32,
    /// How to interpret byte payloads handed to [`load_scene`].
    pub source_kind: SourceKind,
    /// Largest texture side the packer may produce.
    pub max_texture_side: u32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            enable_segment_merge: true,
            enable_invisible_cull: true,
            max_pages: None,
            pages_per_row: None,
            curve_flatness: 0.35,
            max_curve_split_depth: 9,
            source_kind: SourceKind::Auto,
            max_texture_side: 16384,
        }
    }
}

/// Cooperative cancellation signal, checked between pages and between
/// operator chunks.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that never fires unless [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; the in-flight build returns
    /// [`Extraction::Cancelled`] at its next check.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The outcome of a build: a scene, or a clean cancellation.
///
/// Cancellation is not an error; partially accumulated arrays are discarded
/// and never observable.
#[derive(Debug)]
pub enum Extraction {
    Scene(Box<VectorScene>),
    Cancelled,
}

impl Extraction {
    /// The scene, unless the build was cancelled.
    pub fn scene(self) -> Option<Box<VectorScene>> {
        match self {
            Self::Scene(scene) => Some(scene),
            Self::Cancelled => None,
        }
    }
}

/// Extracts every page of a provider into one composed scene.
pub fn extract_pages(
    provider: &mut dyn PageProvider,
    options: &ExtractOptions,
    cancel: &CancelToken,
) -> Result<Extraction> {
    let mut page_count = provider.page_count();
    if let Some(max) = options.max_pages {
        page_count = page_count.min(max);
    }
    let pages_per_row = options
        .pages_per_row
        .map(|p| p.clamp(1, 100))
        .unwrap_or_else(|| (page_count as f64).sqrt().ceil().max(1.0) as u32);

    let mut pages = Vec::with_capacity(page_count);
    for page in 0..page_count {
        if cancel.is_cancelled() {
            return Ok(Extraction::Cancelled);
        }
        match run_page(provider, page, options, cancel)? {
            Some(input) => pages.push(input),
            None => return Ok(Extraction::Cancelled),
        }
    }
    let scene = compose(pages, pages_per_row, options.max_texture_side)?;
    Ok(Extraction::Scene(Box::new(scene)))
}

/// Extracts a single page into a one-page scene.
pub fn extract_single_page(
    provider: &mut dyn PageProvider,
    page: usize,
    options: &ExtractOptions,
    cancel: &CancelToken,
) -> Result<Extraction> {
    match run_page(provider, page, options, cancel)? {
        Some(input) => {
            let scene = compose(vec![input], 1, options.max_texture_side)?;
            Ok(Extraction::Scene(Box::new(scene)))
        }
        None => Ok(Extraction::Cancelled),
    }
}

fn run_page(
    provider: &mut dyn PageProvider,
    page: usize,
    options: &ExtractOptions,
    cancel: &CancelToken,
) -> Result<Option<PageInput>> {
    // The only suspension point: fetching the page's operator list.
    let ops = provider.page_operators(page)?;
    let rotation = provider.page_rotation(page);
    let base = Transform::from_coeffs(provider.page_view_transform(page, rotation));
    let mut interp = Interpreter::new(
        base,
        options.curve_flatness,
        options.max_curve_split_depth,
        options.enable_segment_merge,
        options.enable_invisible_cull,
    );
    for chunk in ops.chunks(CANCEL_CHUNK) {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        interp.run(chunk);
    }
    let mut build = interp.finish();
    let merged_segments = build.strokes.len() as u32;
    let (survivors, cull) =
        cull_strokes(std::mem::take(&mut build.strokes), options.enable_invisible_cull);
    build.strokes = survivors;
    log::debug!(
        "page {page}: {} source, {merged_segments} merged, {} kept",
        build.source_segments,
        build.strokes.len()
    );
    // Rotated content lands in an origin-based view, sides swapped for the
    // quarter turns.
    let view = provider.page_view(page);
    let view = match rotation % 360 {
        90 | 270 => Bounds::new(0.0, 0.0, view.height(), view.width()),
        180 => Bounds::new(0.0, 0.0, view.width(), view.height()),
        _ => view,
    };
    Ok(Some(PageInput {
        build,
        view,
        merged_segments,
        cull,
    }))
}

/// Loads a scene from a byte payload according to the configured
/// [`SourceKind`].
///
/// Operator-stream payloads need a host provider to parse them and are
/// rejected here; `Auto` recognises parsed-scene archives by their magic
/// bytes.
pub fn load_scene(label: &str, bytes: &[u8], options: &ExtractOptions) -> Result<VectorScene> {
    let looks_like_archive = bytes.starts_with(b"PK");
    match options.source_kind {
        SourceKind::ParsedArchive => archive::read_scene(label, bytes),
        SourceKind::Auto if looks_like_archive => archive::read_scene(label, bytes),
        SourceKind::Auto | SourceKind::OperatorStream => Err(Error::invalid(
            label,
            "open",
            "operator-stream sources must be opened through a page provider",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_pages, CancelToken, ExtractOptions, Extraction};
    use crate::math::Bounds;
    use crate::provider::path_op::*;
    use crate::provider::{Op, PaintOp, RecordedPages};

    fn one_stroke_page() -> RecordedPages {
        let mut pages = RecordedPages::new("test");
        pages.push_page(
            Bounds::new(0.0, 0.0, 100.0, 100.0),
            vec![
                Op::SetLineWidth(2.0),
                Op::ConstructPath {
                    paint: PaintOp::Stroke,
                    data: vec![MOVE_TO, 0.0, 0.0, LINE_TO, 10.0, 0.0],
                },
            ],
        );
        pages
    }

    #[test]
    fn pre_cancelled_build_returns_cancelled() {
        let mut provider = one_stroke_page();
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = extract_pages(&mut provider, &ExtractOptions::default(), &cancel).unwrap();
        assert!(matches!(outcome, Extraction::Cancelled));
    }

    #[test]
    fn default_pages_per_row_is_sqrt() {
        let mut provider = RecordedPages::new("test");
        for _ in 0..5 {
            provider.push_page(Bounds::new(0.0, 0.0, 10.0, 10.0), Vec::new());
        }
        let scene = extract_pages(&mut provider, &ExtractOptions::default(), &CancelToken::new())
            .unwrap()
            .scene()
            .unwrap();
        assert_eq!(scene.pages_per_row, 3);
        assert_eq!(scene.page_count, 5);
    }

    #[test]
    fn max_pages_limits_extraction() {
        let mut provider = RecordedPages::new("test");
        for _ in 0..4 {
            provider.push_page(Bounds::new(0.0, 0.0, 10.0, 10.0), Vec::new());
        }
        let options = ExtractOptions {
            max_pages: Some(2),
            ..Default::default()
        };
        let scene = extract_pages(&mut provider, &options, &CancelToken::new())
            .unwrap()
            .scene()
            .unwrap();
        assert_eq!(scene.page_count, 2);
    }

    #[test]
    fn counts_balance() {
        let mut provider = one_stroke_page();
        let scene = extract_pages(&mut provider, &ExtractOptions::default(), &CancelToken::new())
            .unwrap()
            .scene()
            .unwrap();
        let c = &scene.counts;
        assert_eq!(
            c.discarded_transparent
                + c.discarded_degenerate
                + c.discarded_duplicate
                + c.discarded_contained
                + c.strokes,
            c.merged_segments
        );
        assert!(c.merged_segments <= c.source_segments);
    }
}
