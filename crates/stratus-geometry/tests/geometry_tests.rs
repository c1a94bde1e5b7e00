//! Integration tests for stratus-geometry.

use stratus_geometry::{
    decompose, resolve_ghost, resolve_primary, validate_window, DomainGeometry, SlidingWindow,
    StaticWindow, WindowSource, WindowState,
};
use stratus_types::GridVec;

fn window_2d(local: GridVec, global: GridVec) -> WindowState {
    WindowState {
        iteration: 0,
        local_offset: GridVec::zeros(2),
        local_size: local,
        local_full_size: local,
        global_window_size: global,
        global_simulation_offset: GridVec::zeros(2),
        global_simulation_size: global,
        slides: 0,
        sliding_active: false,
        is_bottom: false,
    }
}

// ─── Primary Geometry Tests ───────────────────────────────────

#[test]
fn primary_fits_global_for_valid_windows() {
    for global_y in [1i64, 7, 64] {
        for local_y in 0..=global_y.min(9) {
            for offset_y in 0..=(global_y - local_y).min(5) {
                let mut window = window_2d(GridVec::new2(4, local_y), GridVec::new2(8, global_y));
                window.local_offset = GridVec::new2(0, offset_y);
                window.local_full_size = GridVec::new2(4, local_y + offset_y);

                let geometry = resolve_primary(&window, GridVec::new2(4, 0)).unwrap();
                assert!(geometry.fits_global());
                for d in 0..2 {
                    assert!(
                        geometry.local_offset()[d] + geometry.local_size()[d]
                            <= geometry.global_size()[d]
                    );
                }
            }
        }
    }
}

#[test]
fn primary_rejects_oversized_local_region() {
    let mut window = window_2d(GridVec::new2(10, 10), GridVec::new2(8, 8));
    window.global_simulation_size = GridVec::new2(10, 10);
    assert!(resolve_primary(&window, GridVec::zeros(2)).is_err());
}

#[test]
fn primary_copies_window_extents() {
    let window = window_2d(GridVec::new2(50, 100), GridVec::new2(100, 100));
    let geometry = resolve_primary(&window, GridVec::new2(50, 0)).unwrap();
    assert_eq!(geometry.local_size(), GridVec::new2(50, 100));
    assert_eq!(geometry.global_size(), GridVec::new2(100, 100));
    assert_eq!(geometry.local_offset(), GridVec::new2(0, 0));
    assert_eq!(geometry.domain_offset(), GridVec::new2(50, 0));
}

// ─── Sliding Axis Clamp Tests ─────────────────────────────────

fn clamp_geometry(rank_y: i64, sim_offset_y: i64) -> DomainGeometry {
    DomainGeometry::new(
        GridVec::new3(0, 0, 0),
        GridVec::new3(4, 4, 4),
        GridVec::new3(0, sim_offset_y, 0),
        GridVec::new3(8, 64, 8),
        GridVec::new3(3, rank_y, 2),
    )
    .unwrap()
}

#[test]
fn sliding_axis_offset_is_relative_to_window() {
    let geometry = clamp_geometry(20, 10);
    assert_eq!(geometry.written_offset()[1], 10);
}

#[test]
fn sliding_axis_offset_clamps_at_zero() {
    let geometry = clamp_geometry(5, 10);
    assert_eq!(geometry.written_offset()[1], 0);

    let negative = clamp_geometry(-5, 10);
    assert_eq!(negative.written_offset()[1], 0);
}

#[test]
fn other_axes_pass_through() {
    let geometry = clamp_geometry(20, 10);
    let written = geometry.written_offset();
    assert_eq!(written[0], 3);
    assert_eq!(written[2], 2);
}

// ─── Ghost Geometry Tests ─────────────────────────────────────

fn sliding_state(is_bottom: bool, visible_y: i64) -> WindowState {
    WindowState {
        iteration: 4,
        local_offset: GridVec::zeros(2),
        local_size: GridVec::new2(32, visible_y),
        local_full_size: GridVec::new2(32, 48),
        global_window_size: GridVec::new2(32, 96),
        global_simulation_offset: GridVec::zeros(2),
        global_simulation_size: GridVec::new2(32, 144),
        slides: 2,
        sliding_active: true,
        is_bottom,
    }
}

#[test]
fn no_ghost_without_sliding() {
    let window = window_2d(GridVec::new2(8, 8), GridVec::new2(8, 8));
    let primary = resolve_primary(&window, GridVec::zeros(2)).unwrap();
    assert!(resolve_ghost(&window, &primary).unwrap().is_none());
}

#[test]
fn ghost_on_bottom_rank_covers_hidden_cells() {
    let window = sliding_state(true, 20);
    let primary = resolve_primary(&window, GridVec::new2(0, 76)).unwrap();
    let ghost = resolve_ghost(&window, &primary).unwrap().unwrap();

    assert_eq!(ghost.local_size()[1], 48 - 20);
    assert!(ghost.local_size()[1] > 0);
    assert_eq!(ghost.local_size()[0], 32);
    assert_eq!(ghost.local_offset(), GridVec::new2(0, 20));
    assert_eq!(ghost.global_offset()[1], 96);
    assert_eq!(ghost.global_size()[1], 144 - 96);
    assert_eq!(ghost.domain_offset()[1], 96);
}

#[test]
fn ghost_on_other_ranks_is_empty_but_present() {
    let window = sliding_state(false, 48);
    let primary = resolve_primary(&window, GridVec::new2(0, 0)).unwrap();
    let ghost = resolve_ghost(&window, &primary).unwrap();

    let ghost = ghost.expect("non-bottom ranks still take part in the ghost pass");
    assert_eq!(ghost.local_size()[1], 0);
    assert_eq!(ghost.local_cell_count(), 0);
}

// ─── Dimensionality Tests ─────────────────────────────────────

#[test]
fn two_dimensional_geometry_has_two_axes() {
    let window = window_2d(GridVec::new2(16, 16), GridVec::new2(32, 16));
    let geometry = resolve_primary(&window, GridVec::new2(16, 0)).unwrap();
    assert_eq!(geometry.dims(), 2);
    assert_eq!(geometry.written_offset().as_slice(), &[16, 0]);
}

#[test]
fn mixed_dimensionality_rejected() {
    let mut window = window_2d(GridVec::new2(4, 4), GridVec::new2(4, 4));
    window.global_window_size = GridVec::new3(4, 4, 4);
    assert!(validate_window(&window).is_err());
}

#[test]
fn negative_sizes_rejected() {
    let result = DomainGeometry::new(
        GridVec::zeros(2),
        GridVec::new2(4, -1),
        GridVec::zeros(2),
        GridVec::new2(4, 4),
        GridVec::zeros(2),
    );
    assert!(result.is_err());
}

// ─── Decomposition Tests ──────────────────────────────────────

#[test]
fn decompose_two_ranks_along_x() {
    let domains = decompose(GridVec::new2(100, 100), GridVec::new2(2, 1)).unwrap();
    assert_eq!(domains.len(), 2);
    assert_eq!(domains[0].grid_position, GridVec::new2(0, 0));
    assert_eq!(domains[1].grid_position, GridVec::new2(50, 0));
    assert_eq!(domains[1].local_size, GridVec::new2(50, 100));
    assert!(domains.iter().all(|d| d.is_bottom));
}

#[test]
fn decompose_distributes_remainder() {
    let domains = decompose(GridVec::new3(10, 7, 4), GridVec::new3(1, 3, 1)).unwrap();
    let sizes: Vec<i64> = domains.iter().map(|d| d.local_size[1]).collect();
    assert_eq!(sizes, vec![3, 2, 2]);
    assert_eq!(domains[2].grid_position[1], 5);
    assert!(domains[2].is_bottom);
    assert!(!domains[0].is_bottom);
}

#[test]
fn decompose_rejects_too_many_ranks() {
    assert!(decompose(GridVec::new2(4, 4), GridVec::new2(5, 1)).is_err());
    assert!(decompose(GridVec::new2(4, 4), GridVec::new2(0, 1)).is_err());
}

// ─── Window Source Tests ──────────────────────────────────────

#[test]
fn static_window_is_never_sliding() {
    let domains = decompose(GridVec::new2(64, 64), GridVec::new2(2, 2)).unwrap();
    let source = StaticWindow::new(domains[3], GridVec::new2(64, 64));
    let window = source.window(7);
    assert_eq!(window.iteration, 7);
    assert!(!window.sliding_active);
    assert!(window.is_bottom);
    assert_eq!(source.rank_offset(), GridVec::new2(32, 32));
}

#[test]
fn sliding_window_hides_bottom_row() {
    let global = GridVec::new2(32, 96);
    let domains = decompose(global, GridVec::new2(1, 3)).unwrap();

    let top = SlidingWindow::new(domains[0], global, 32, 10).window(25);
    assert_eq!(top.local_size, GridVec::new2(32, 32));
    assert_eq!(top.global_window_size, GridVec::new2(32, 64));
    assert_eq!(top.slides, 2);

    let bottom = SlidingWindow::new(domains[2], global, 32, 10).window(25);
    assert_eq!(bottom.local_size[1], 0);
    assert_eq!(bottom.local_full_size[1], 32);
    assert!(validate_window(&bottom).is_ok());

    let primary = resolve_primary(&bottom, domains[2].grid_position).unwrap();
    let ghost = resolve_ghost(&bottom, &primary).unwrap().unwrap();
    assert_eq!(ghost.local_size(), GridVec::new2(32, 32));
    assert_eq!(ghost.global_offset(), GridVec::new2(0, 64));
}

#[test]
fn window_state_is_serializable() {
    let window = sliding_state(true, 10);
    let json = serde_json::to_string(&window).unwrap();
    let back: WindowState = serde_json::from_str(&json).unwrap();
    assert_eq!(window, back);
}
