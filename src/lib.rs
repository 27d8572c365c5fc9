// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Veduta turns a PDF-like vector operator stream into a compact, GPU-ready
//! [`VectorScene`] suitable for interactive viewing of very large engineering
//! drawings, and builds the spatial index the renderer uses to assemble a
//! per-frame visible set.
//!
//! The pipeline is: operator stream → interpreter → curve flattener →
//! collinear segment merger → visibility culler → scene packer. The packed
//! scene can be written to and read back from a named-file archive
//! (`manifest.json` plus one binary payload per texture).
//!
//! The GPU backend itself is out of scope: the scene is handed to a renderer
//! as plain float arrays with texture dimensions attached.

#![warn(clippy::doc_markdown, clippy::semicolon_if_nothing_returned)]

mod cull;
mod extract;
mod flatten;
mod grid;
mod interp;
mod merge;
mod pack;
mod scene;
mod visible;

pub mod archive;
pub mod math;
pub mod pixmap;
pub mod provider;

/// Styling and composition primitives.
pub use peniko;
/// 2D geometry, with a focus on curves.
pub use peniko::kurbo;

pub use cull::CullStats;
pub use extract::{
    extract_pages, extract_single_page, load_scene, CancelToken, ExtractOptions, Extraction,
    SourceKind,
};
pub use grid::SpatialGrid;
pub use math::{Bounds, Transform};
pub use scene::{
    FillPath, GlyphOutline, PackedTexture, RasterLayer, SceneCounts, TextInstance, VectorScene,
};
pub use visible::{Viewport, Visibility, VisibleSet};

use thiserror::Error;

/// Errors that can abort a scene build or an archive round-trip.
///
/// Operator anomalies (malformed path records, non-finite numerics) are not
/// errors: they are tallied on the scene and logged. Cancellation is likewise
/// not an error; see [`Extraction::Cancelled`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The source cannot be interpreted at all: unreadable container, bad
    /// magic bytes, missing or malformed manifest, a referenced file that is
    /// absent from the archive.
    #[error("invalid source `{source_label}` in {stage}: {reason}")]
    InvalidSource {
        /// File or source label the failure belongs to.
        source_label: String,
        /// Pipeline stage that rejected the source.
        stage: &'static str,
        /// One-line diagnostic.
        reason: String,
    },
    /// A texture payload holds fewer floats than the manifest's logical count.
    #[error("truncated texture `{name}`: expected {expected} floats, got {actual}")]
    TruncatedTexture {
        /// Texture name from the manifest.
        name: String,
        /// Logical float count the manifest promises.
        expected: usize,
        /// Floats actually present.
        actual: usize,
    },
    /// Packing a primitive family would exceed the configured GPU texture
    /// side limit.
    #[error("texture `{name}` side {side} exceeds the configured limit {max}")]
    TextureLimit {
        /// Texture name.
        name: &'static str,
        /// Side the layout would need.
        side: u32,
        /// Configured maximum side.
        max: u32,
    },
}

impl Error {
    pub(crate) fn invalid(source_label: impl Into<String>, stage: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            source_label: source_label.into(),
            stage,
            reason: reason.into(),
        }
    }
}

/// Specialization of `Result` for veduta's error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
