// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The archive manifest: counts, geometry, and texture descriptors.

use serde::{Deserialize, Serialize};

/// Current manifest format version.
pub const FORMAT_VERSION: u32 = 3;

/// Top-level `manifest.json` document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub format_version: u32,
    pub scene: SceneManifest,
    pub textures: Vec<TextureManifest>,
    /// Relative path of the original operator-stream document, if archived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_pdf_file: Option<String>,
}

/// Scene-level counts and geometry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneManifest {
    pub stroke_count: u32,
    pub fill_path_count: u32,
    pub fill_segment_count: u32,
    pub text_instance_count: u32,
    pub glyph_count: u32,
    pub glyph_segment_count: u32,
    pub raster_layer_count: u32,
    pub source_segment_count: u32,
    pub merged_segment_count: u32,
    pub discarded_transparent: u32,
    pub discarded_degenerate: u32,
    pub discarded_duplicate: u32,
    pub discarded_contained: u32,
    #[serde(default)]
    pub malformed_path_count: u32,
    /// `[min_x, min_y, max_x, max_y]`.
    pub bounds: [f32; 4],
    /// `[min_x, min_y, max_x, max_y]`.
    pub page_bounds: [f32; 4],
    /// Four floats per page.
    pub page_rects: Vec<f32>,
    pub page_count: u32,
    pub pages_per_row: u32,
    pub max_half_width: f32,
    #[serde(default)]
    pub raster_layers: Vec<RasterManifest>,
}

/// One raster layer's file reference and placement.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterManifest {
    pub width: u32,
    pub height: u32,
    /// Placement `(a, b, c, d, e, f)`.
    pub matrix: [f32; 6],
    /// Entry name inside the archive.
    pub file: String,
    /// `"png"`, `"webp"` or `"rgba"`; the file extension is authoritative.
    pub encoding: String,
}

/// One packed texture's file reference and layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureManifest {
    pub name: String,
    pub file: String,
    pub width: u32,
    pub height: u32,
    /// Always 4.
    pub channels: u32,
    /// Always `"float32"`.
    pub component_type: String,
    /// `"interleaved"` or `"channel-major"`.
    pub layout: String,
    pub logical_item_count: u32,
    pub logical_float_count: u32,
    pub padded_float_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_camel_case() {
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            scene: SceneManifest {
                stroke_count: 1,
                fill_path_count: 0,
                fill_segment_count: 0,
                text_instance_count: 0,
                glyph_count: 0,
                glyph_segment_count: 0,
                raster_layer_count: 0,
                source_segment_count: 1,
                merged_segment_count: 1,
                discarded_transparent: 0,
                discarded_degenerate: 0,
                discarded_duplicate: 0,
                discarded_contained: 0,
                malformed_path_count: 0,
                bounds: [0.0; 4],
                page_bounds: [0.0; 4],
                page_rects: vec![0.0; 4],
                page_count: 1,
                pages_per_row: 1,
                max_half_width: 1.0,
                raster_layers: Vec::new(),
            },
            textures: Vec::new(),
            source_pdf_file: None,
        };
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"formatVersion\":3"));
        assert!(json.contains("\"strokeCount\""));
        assert!(json.contains("\"maxHalfWidth\""));
        assert!(!json.contains("sourcePdfFile"));
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.format_version, 3);
        assert_eq!(back.scene.stroke_count, 1);
    }

    #[test]
    fn absent_and_null_optionals_are_interchangeable() {
        let json = r#"{
            "formatVersion": 3,
            "scene": {
                "strokeCount": 0, "fillPathCount": 0, "fillSegmentCount": 0,
                "textInstanceCount": 0, "glyphCount": 0, "glyphSegmentCount": 0,
                "rasterLayerCount": 0, "sourceSegmentCount": 0,
                "mergedSegmentCount": 0, "discardedTransparent": 0,
                "discardedDegenerate": 0, "discardedDuplicate": 0,
                "discardedContained": 0, "bounds": [0,0,0,0],
                "pageBounds": [0,0,0,0], "pageRects": [], "pageCount": 0,
                "pagesPerRow": 1, "maxHalfWidth": 0
            },
            "textures": [],
            "sourcePdfFile": null
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert!(manifest.source_pdf_file.is_none());
        assert!(manifest.scene.raster_layers.is_empty());
    }
}
