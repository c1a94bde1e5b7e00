//! Integration tests for stratus-pack.

use stratus_geometry::DomainGeometry;
use stratus_pack::{pack, SourceLayout, StagingBuffer};
use stratus_types::{GridVec, StratusError};

/// Value stored at padded coordinate `p`, component `c`.
fn tag(p: &[i64], c: usize) -> f64 {
    let mut v = c as f64;
    for (d, x) in p.iter().enumerate() {
        v += (*x as f64) * 10f64.powi(d as i32 + 1);
    }
    v
}

/// Padded buffer whose every element encodes its own position.
fn tagged_buffer(layout: &SourceLayout) -> Vec<f64> {
    let p = layout.padded;
    let mut out = Vec::with_capacity(layout.element_count());
    let nz = if p.dims() == 3 { p[2] } else { 1 };
    for z in 0..nz {
        for y in 0..p[1] {
            for x in 0..p[0] {
                let coord: Vec<i64> = if p.dims() == 3 { vec![x, y, z] } else { vec![x, y] };
                for c in 0..layout.components {
                    out.push(tag(&coord, c));
                }
            }
        }
    }
    out
}

/// Scatters packed data back to padded coordinates and checks each cell.
fn assert_unpacks(packed: &[f64], layout: &SourceLayout, geometry: &DomainGeometry, c: usize) {
    let size = geometry.local_size();
    let start = layout.guard + geometry.local_offset();
    let nz = if size.dims() == 3 { size[2] } else { 1 };
    let mut i = 0;
    for z in 0..nz {
        for y in 0..size[1] {
            for x in 0..size[0] {
                let coord: Vec<i64> = if size.dims() == 3 {
                    vec![start[0] + x, start[1] + y, start[2] + z]
                } else {
                    vec![start[0] + x, start[1] + y]
                };
                assert_eq!(packed[i], tag(&coord, c), "cell {i} at {coord:?}");
                i += 1;
            }
        }
    }
    assert_eq!(i, size.cell_count());
}

fn interior_geometry(size: GridVec) -> DomainGeometry {
    let zeros = GridVec::zeros(size.dims());
    DomainGeometry::new(zeros, size, zeros, size, zeros).unwrap()
}

// ─── Layout Tests ────────────────────────────────────────────

#[test]
fn layout_with_guard() {
    let layout = SourceLayout::with_guard(GridVec::new3(4, 5, 6), 2, 3).unwrap();
    assert_eq!(layout.padded, GridVec::new3(8, 9, 10));
    assert_eq!(layout.interior(), GridVec::new3(4, 5, 6));
    assert_eq!(layout.element_count(), 8 * 9 * 10 * 3);
}

#[test]
fn layout_rejects_bad_inputs() {
    assert!(SourceLayout::new(GridVec::new2(4, 4), GridVec::new2(3, 1), 1).is_err());
    assert!(SourceLayout::new(GridVec::new2(4, 4), GridVec::new2(1, 1), 0).is_err());
    assert!(SourceLayout::new(GridVec::new2(4, 4), GridVec::new2(-1, 1), 1).is_err());
    assert!(SourceLayout::new(GridVec::new2(4, 4), GridVec::new3(1, 1, 1), 1).is_err());
}

// ─── Packing Tests ───────────────────────────────────────────

#[test]
fn pack_3d_guard_two_even_and_odd_sizes() {
    for interior in [GridVec::new3(4, 6, 2), GridVec::new3(5, 3, 7)] {
        for components in [1, 3] {
            let layout = SourceLayout::with_guard(interior, 2, components).unwrap();
            let src = tagged_buffer(&layout);
            let geometry = interior_geometry(interior);
            let mut dest = vec![0.0; interior.cell_count()];

            for c in 0..components {
                let n = pack(&src, &layout, &geometry, c, &mut dest).unwrap();
                assert_eq!(n, interior.cell_count());
                assert_unpacks(&dest, &layout, &geometry, c);
            }
        }
    }
}

#[test]
fn pack_2d_with_guard_one() {
    let interior = GridVec::new2(50, 100);
    let layout = SourceLayout::with_guard(interior, 1, 1).unwrap();
    let src = tagged_buffer(&layout);
    let geometry = interior_geometry(interior);
    let mut dest = vec![0.0; 5000];

    assert_eq!(pack(&src, &layout, &geometry, 0, &mut dest).unwrap(), 5000);
    assert_unpacks(&dest, &layout, &geometry, 0);
}

#[test]
fn pack_honours_local_offset() {
    // Trailing part of the sliding axis, as packed for a ghost segment.
    let interior = GridVec::new3(3, 8, 2);
    let layout = SourceLayout::with_guard(interior, 1, 2).unwrap();
    let src = tagged_buffer(&layout);
    let geometry = DomainGeometry::new(
        GridVec::new3(0, 5, 0),
        GridVec::new3(3, 3, 2),
        GridVec::new3(0, 0, 0),
        GridVec::new3(3, 8, 2),
        GridVec::new3(0, 0, 0),
    )
    .unwrap();
    let mut dest = vec![0.0; 18];

    pack(&src, &layout, &geometry, 1, &mut dest).unwrap();
    assert_unpacks(&dest, &layout, &geometry, 1);
}

#[test]
fn empty_region_packs_nothing() {
    let layout = SourceLayout::with_guard(GridVec::new2(4, 4), 1, 1).unwrap();
    let src = tagged_buffer(&layout);
    let geometry = interior_geometry(GridVec::new2(4, 0));
    let mut dest: Vec<f64> = Vec::new();
    assert_eq!(pack(&src, &layout, &geometry, 0, &mut dest).unwrap(), 0);
}

#[test]
fn oversized_region_is_a_precondition_error() {
    let layout = SourceLayout::with_guard(GridVec::new2(4, 4), 1, 1).unwrap();
    let src = tagged_buffer(&layout);
    let geometry = interior_geometry(GridVec::new2(5, 4));
    let mut dest = vec![0.0; 20];

    let err = pack(&src, &layout, &geometry, 0, &mut dest).unwrap_err();
    assert!(matches!(err, StratusError::Precondition(_)));
}

#[test]
fn bad_component_or_buffers_are_rejected() {
    let layout = SourceLayout::with_guard(GridVec::new2(4, 4), 1, 3).unwrap();
    let src = tagged_buffer(&layout);
    let geometry = interior_geometry(GridVec::new2(4, 4));

    let mut dest = vec![0.0; 16];
    assert!(pack(&src, &layout, &geometry, 3, &mut dest).is_err());
    assert!(pack(&src[1..], &layout, &geometry, 0, &mut dest).is_err());

    let mut short = vec![0.0; 15];
    assert!(pack(&src, &layout, &geometry, 0, &mut short).is_err());
}

#[test]
fn dimension_mismatch_is_rejected() {
    let layout = SourceLayout::with_guard(GridVec::new2(4, 4), 1, 1).unwrap();
    let src = tagged_buffer(&layout);
    let geometry = interior_geometry(GridVec::new3(4, 4, 1));
    let mut dest = vec![0.0; 16];
    assert!(pack(&src, &layout, &geometry, 0, &mut dest).is_err());
}

// ─── Staging Tests ───────────────────────────────────────────

#[test]
fn staging_grows_and_views() {
    let mut staging = StagingBuffer::with_capacity(3, 4);
    assert_eq!(staging.capacity_bytes(), 16);

    staging.ensure(5, 8);
    assert_eq!(staging.capacity_bytes(), 40);
    staging.ensure(1, 4);
    assert_eq!(staging.capacity_bytes(), 40);

    let view = staging.slice_mut::<f32>(3).unwrap();
    view.copy_from_slice(&[1.0, 2.0, 3.0]);
    let bytes = staging.bytes::<f32>(3).unwrap();
    assert_eq!(bytes.len(), 12);
    assert_eq!(&bytes[4..8], &2.0f32.to_ne_bytes());
}

#[test]
fn staging_rejects_oversized_views() {
    let mut staging = StagingBuffer::with_capacity(2, 8);
    assert!(staging.slice_mut::<f64>(3).is_err());
    assert!(staging.bytes::<f64>(3).is_err());
    assert!(staging.slice_mut::<f64>(0).unwrap().is_empty());
}

#[test]
fn packing_into_staging_view() {
    let interior = GridVec::new3(2, 3, 4);
    let layout = SourceLayout::with_guard(interior, 2, 1).unwrap();
    let src: Vec<f32> = (0..layout.element_count()).map(|i| i as f32).collect();
    let geometry = interior_geometry(interior);

    let mut staging = StagingBuffer::with_capacity(interior.cell_count(), 4);
    let view = staging.slice_mut::<f32>(interior.cell_count()).unwrap();
    pack(&src, &layout, &geometry, 0, view).unwrap();

    // First interior cell sits at padded (2, 2, 2) in a 6 x 7 x 8 box.
    assert_eq!(view[0], (2 + 2 * 6 + 2 * 6 * 7) as f32);
    assert_eq!(view[1], (3 + 2 * 6 + 2 * 6 * 7) as f32);
}

#[test]
fn layout_serializes() {
    let layout = SourceLayout::with_guard(GridVec::new2(4, 4), 1, 2).unwrap();
    let json = serde_json::to_string(&layout).unwrap();
    let back: SourceLayout = serde_json::from_str(&json).unwrap();
    assert_eq!(back, layout);
}
