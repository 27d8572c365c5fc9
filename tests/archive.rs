// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Archive round-trip tests.

mod util;

use util::{fill, stroke};
use veduta::archive::{read_scene, read_source_document, write_scene, ArchiveWriteOptions, EntryCompression};
use veduta::provider::{ColourSpec, Op};
use veduta::{ExtractOptions, SourceKind, SpatialGrid};

fn rich_scene() -> veduta::VectorScene {
    util::build(vec![
        Op::SetLineWidth(2.0),
        Op::SetStrokeColour(ColourSpec::Gray(0.25)),
        stroke(&[(0.0, 0.0), (10.0, 0.0), (20.0, 7.0)]),
        Op::SetDash {
            array: vec![4.0, 2.0],
            phase: 0.0,
        },
        stroke(&[(0.0, 20.0), (30.0, 20.0)]),
        Op::SetFillColour(ColourSpec::Rgb(0.2, 0.4, 0.8)),
        fill(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
        util::square_glyph(1, 0.6),
        Op::ShowText {
            glyphs: vec![1, 1],
        },
        util::tiny_image(),
    ])
}

#[test]
fn round_trip_reproduces_the_scene() {
    let scene = rich_scene();
    let bytes = write_scene(&scene, &ArchiveWriteOptions::default()).unwrap();
    let back = read_scene("archive", &bytes).unwrap();
    assert_eq!(back, scene);
}

#[test]
fn store_and_raw_rasters_round_trip() {
    let scene = rich_scene();
    let options = ArchiveWriteOptions {
        encode_raster_images: false,
        compression: EntryCompression::Store,
        deflate_level: 0,
        source_document: None,
    };
    let bytes = write_scene(&scene, &options).unwrap();
    let back = read_scene("archive", &bytes).unwrap();
    assert_eq!(back, scene);
}

#[test]
fn deflate_levels_change_size_not_content() {
    let scene = rich_scene();
    let fast = write_scene(
        &scene,
        &ArchiveWriteOptions {
            deflate_level: 1,
            ..Default::default()
        },
    )
    .unwrap();
    let best = write_scene(
        &scene,
        &ArchiveWriteOptions {
            deflate_level: 9,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(read_scene("a", &fast).unwrap(), read_scene("b", &best).unwrap());
}

#[test]
fn archive_writing_is_deterministic() {
    let scene = rich_scene();
    let a = write_scene(&scene, &ArchiveWriteOptions::default()).unwrap();
    let b = write_scene(&scene, &ArchiveWriteOptions::default()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn grid_rebuilds_identically_after_round_trip() {
    let scene = rich_scene();
    let bytes = write_scene(&scene, &ArchiveWriteOptions::default()).unwrap();
    let back = read_scene("archive", &bytes).unwrap();
    let grid_a = SpatialGrid::build(&scene);
    let grid_b = SpatialGrid::build(&back);
    assert_eq!(grid_a.cols(), grid_b.cols());
    assert_eq!(grid_a.rows(), grid_b.rows());
    assert_eq!(grid_a.membership_count(), grid_b.membership_count());
    assert_eq!(grid_a.max_cell_population(), grid_b.max_cell_population());
    for row in 0..grid_a.rows().min(4) {
        for col in 0..grid_a.cols().min(4) {
            assert_eq!(grid_a.cell_members(col, row), grid_b.cell_members(col, row));
        }
    }
}

#[test]
fn source_document_is_embedded_and_read_back() {
    let scene = rich_scene();
    let options = ArchiveWriteOptions {
        source_document: Some(("drawing.pdf".to_owned(), b"%PDF-1.7 fake".to_vec())),
        ..Default::default()
    };
    let bytes = write_scene(&scene, &options).unwrap();
    let (name, data) = read_source_document("archive", &bytes).unwrap().unwrap();
    assert_eq!(name, "drawing.pdf");
    assert_eq!(data, b"%PDF-1.7 fake");

    let plain = write_scene(&scene, &ArchiveWriteOptions::default()).unwrap();
    assert!(read_source_document("archive", &plain).unwrap().is_none());
}

#[test]
fn empty_scene_round_trips() {
    let scene = util::build(Vec::new());
    let bytes = write_scene(&scene, &ArchiveWriteOptions::default()).unwrap();
    let back = read_scene("archive", &bytes).unwrap();
    assert_eq!(back, scene);
    assert!(back.is_empty());
}

#[test]
fn load_scene_dispatches_on_source_kind() {
    let scene = rich_scene();
    let bytes = write_scene(&scene, &ArchiveWriteOptions::default()).unwrap();

    let auto = ExtractOptions::default();
    assert_eq!(veduta::load_scene("a", &bytes, &auto).unwrap(), scene);

    let forced = ExtractOptions {
        source_kind: SourceKind::ParsedArchive,
        ..Default::default()
    };
    assert_eq!(veduta::load_scene("a", &bytes, &forced).unwrap(), scene);

    // Operator streams need a provider.
    let stream = ExtractOptions {
        source_kind: SourceKind::OperatorStream,
        ..Default::default()
    };
    assert!(veduta::load_scene("a", &bytes, &stream).is_err());
    assert!(veduta::load_scene("a", b"%PDF-1.7", &auto).is_err());
}

#[test]
fn garbage_bytes_are_an_invalid_source() {
    let err = read_scene("garbage", b"not an archive at all").unwrap_err();
    assert!(matches!(err, veduta::Error::InvalidSource { .. }));
}
