// tests/transform_tests.rs

use macroquad::math::vec2;
use macroquad_tiled_runtime::{
    coordinate_to_point, coordinate_to_point_with_offset, point_to_coordinate, point_to_coordinate_with_offset,
    Anchor, GridGeometry, MapOrientation, StaggerAxis, StaggerIndex, TileCoordinate, TileOffset, TileSize,
};

fn orientations() -> Vec<(MapOrientation, TileSize)> {
    let mut out = vec![
        (MapOrientation::Orthogonal, TileSize::new(32, 32)),
        (MapOrientation::Isometric, TileSize::new(64, 32)),
    ];
    for stagger_axis in [StaggerAxis::X, StaggerAxis::Y] {
        for stagger_index in [StaggerIndex::Odd, StaggerIndex::Even] {
            out.push((
                MapOrientation::Hexagonal {
                    stagger_axis,
                    stagger_index,
                    side_length: 14,
                },
                TileSize::new(32, 28),
            ));
            out.push((
                MapOrientation::Staggered {
                    stagger_axis,
                    stagger_index,
                },
                TileSize::new(64, 32),
            ));
        }
    }
    out
}

/// Coordinates across ±10,000: the corners, the axes and a coarse lattice.
fn sample_coords() -> Vec<TileCoordinate> {
    let mut axis: Vec<i32> = (-10_000..=10_000).step_by(769).collect();
    axis.extend([-10_000, -1, 0, 1, 9_999, 10_000]);
    let mut out = Vec::new();
    for &y in &axis {
        for &x in &axis {
            out.push(TileCoordinate::new(x, y));
        }
    }
    out
}

#[test]
fn scenario_orthogonal_32_at_3_4() {
    let p = coordinate_to_point(TileCoordinate::new(3, 4), MapOrientation::Orthogonal, TileSize::new(32, 32));
    assert_eq!(p, vec2(96.0, -128.0));
}

#[test]
fn round_trip_every_orientation() {
    let coords = sample_coords();
    for (orientation, size) in orientations() {
        for &c in &coords {
            let p = coordinate_to_point(c, orientation, size);
            assert_eq!(point_to_coordinate(p, orientation, size), c, "{orientation:?} at {c:?} via {p:?}");
        }
    }
}

#[test]
fn dense_round_trip_near_origin() {
    for (orientation, size) in orientations() {
        for y in -40..40 {
            for x in -40..40 {
                let c = TileCoordinate::new(x, y);
                let p = coordinate_to_point(c, orientation, size);
                assert_eq!(point_to_coordinate(p, orientation, size), c, "{orientation:?}");
            }
        }
    }
}

#[test]
fn layer_offset_round_trip() {
    let layer_offset = vec2(37.0, -11.5);
    for (orientation, size) in orientations() {
        let geometry = GridGeometry::new(orientation, size);
        for &c in sample_coords().iter().step_by(7) {
            let p = coordinate_to_point_with_offset(c, &geometry, layer_offset, TileOffset::Anchor(Anchor::Center));
            assert_eq!(point_to_coordinate_with_offset(p, &geometry, layer_offset), c, "{orientation:?}");
        }
    }
}

#[test]
fn out_of_extent_coordinates_still_convert() {
    let p = coordinate_to_point(TileCoordinate::new(-5, -5), MapOrientation::Orthogonal, TileSize::new(16, 16));
    assert_eq!(p, vec2(-80.0, 80.0));
}

#[test]
fn anchors_stay_inside_tile_bounds() {
    for (orientation, size) in orientations() {
        let geometry = GridGeometry::new(orientation, size);
        let c = TileCoordinate::new(7, -3);
        let b = geometry.tile_bounds(c);
        for anchor in Anchor::ALL {
            let p = coordinate_to_point_with_offset(c, &geometry, vec2(0.0, 0.0), TileOffset::Anchor(anchor));
            assert!(p.x >= b.x && p.x <= b.x + b.w, "{orientation:?} {anchor:?}");
            assert!(p.y >= b.y && p.y <= b.y + b.h, "{orientation:?} {anchor:?}");
        }
    }
}

#[test]
fn conversions_are_thread_safe() {
    let coords = sample_coords();
    std::thread::scope(|s| {
        for (orientation, size) in orientations() {
            let coords = &coords;
            s.spawn(move || {
                for &c in coords.iter().step_by(3) {
                    let p = coordinate_to_point(c, orientation, size);
                    assert_eq!(point_to_coordinate(p, orientation, size), c);
                }
            });
        }
    });
}
