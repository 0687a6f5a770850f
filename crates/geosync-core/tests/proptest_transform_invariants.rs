//! Property-based invariant tests for transforms and snapshot comparison.
//!
//! **Transforms:**
//! 1. Same-projection transform is the exact identity for every kind.
//! 2. A round trip through another projection returns the input within
//!    tolerance.
//! 3. Nesting (kind and per-level lengths) is preserved.
//!
//! **Comparator:**
//! 4. A snapshot always equals itself and its clone.
//! 5. `snapshots_equal` agrees with structural equality of coordinates.
//! 6. Snapshots with different extents are never equal.

use geosync_core::{
    Coordinates, GeometryKind, Position, Projection, Snapshot, TransformTable, snapshots_equal,
};
use proptest::prelude::*;

// ── Strategies ────────────────────────────────────────────────────────────

/// Geographic positions away from the poles and the UTM zone edge.
fn position_strategy() -> impl Strategy<Value = Position> {
    (-20.0f64..=20.0, -70.0f64..=70.0).prop_map(|(lon, lat)| [lon, lat])
}

fn line_strategy() -> impl Strategy<Value = Vec<Position>> {
    proptest::collection::vec(position_strategy(), 1..=12)
}

fn coordinates_strategy() -> impl Strategy<Value = Coordinates> {
    prop_oneof![
        position_strategy().prop_map(Coordinates::Point),
        line_strategy().prop_map(Coordinates::LineString),
        line_strategy().prop_map(Coordinates::MultiPoint),
        proptest::collection::vec(line_strategy(), 1..=3).prop_map(Coordinates::Polygon),
        proptest::collection::vec(line_strategy(), 1..=3).prop_map(Coordinates::MultiLineString),
        proptest::collection::vec(proptest::collection::vec(line_strategy(), 1..=2), 1..=3)
            .prop_map(Coordinates::MultiPolygon),
    ]
}

fn projection_strategy() -> impl Strategy<Value = Projection> {
    prop_oneof![
        Just(Projection::web_mercator()),
        Just(Projection::utm(31, true).unwrap()),
        Just(Projection::utm(32, false).unwrap()),
    ]
}

fn shape(coords: &Coordinates) -> Vec<usize> {
    match coords {
        Coordinates::Point(_) => vec![],
        Coordinates::LineString(l) | Coordinates::MultiPoint(l) => vec![l.len()],
        Coordinates::Polygon(r) | Coordinates::MultiLineString(r) => {
            r.iter().map(Vec::len).collect()
        }
        Coordinates::MultiPolygon(p) => p.iter().flatten().map(Vec::len).collect(),
    }
}

fn positions(coords: &Coordinates) -> Vec<Position> {
    let mut out = Vec::new();
    coords.for_each_position(|p| out.push(*p));
    out
}

proptest! {
    #[test]
    fn identity_transform_is_exact(coords in coordinates_strategy(), proj in projection_strategy()) {
        let t = TransformTable::standard().resolve(coords.kind()).unwrap();
        prop_assert_eq!(t.apply(&coords, &proj, &proj).unwrap(), coords);
    }

    #[test]
    fn round_trip_within_tolerance(coords in coordinates_strategy(), proj in projection_strategy()) {
        let wgs = Projection::wgs84();
        let t = TransformTable::standard().resolve(coords.kind()).unwrap();
        let there = t.apply(&coords, &wgs, &proj).unwrap();
        let back = t.apply(&there, &proj, &wgs).unwrap();
        for (a, b) in positions(&coords).iter().zip(positions(&back).iter()) {
            prop_assert!((a[0] - b[0]).abs() < 1e-7, "lon {} vs {}", a[0], b[0]);
            prop_assert!((a[1] - b[1]).abs() < 1e-7, "lat {} vs {}", a[1], b[1]);
        }
    }

    #[test]
    fn nesting_is_preserved(coords in coordinates_strategy(), proj in projection_strategy()) {
        let t = TransformTable::standard().resolve(coords.kind()).unwrap();
        let out = t.apply(&coords, &Projection::wgs84(), &proj).unwrap();
        prop_assert_eq!(out.kind(), coords.kind());
        prop_assert_eq!(shape(&out), shape(&coords));
        prop_assert_eq!(out.kind().depth(), coords.kind().depth());
    }

    #[test]
    fn snapshot_equals_itself(coords in coordinates_strategy()) {
        let a = Snapshot::new(coords);
        let b = a.clone();
        prop_assert!(snapshots_equal(&a, &a));
        prop_assert!(snapshots_equal(&a, &b));
    }

    #[test]
    fn comparator_agrees_with_structural_equality(
        a in coordinates_strategy(),
        b in coordinates_strategy(),
    ) {
        let expected = a == b;
        prop_assert_eq!(snapshots_equal(&Snapshot::new(a), &Snapshot::new(b)), expected);
    }

    #[test]
    fn different_extent_never_equal(coords in coordinates_strategy(), dx in 0.5f64..10.0) {
        let shifted = shift(&coords, dx);
        let a = Snapshot::new(coords);
        let b = Snapshot::new(shifted);
        prop_assert_ne!(a.extent, b.extent);
        prop_assert!(!snapshots_equal(&a, &b));
    }
}

fn shift(coords: &Coordinates, dx: f64) -> Coordinates {
    let mv = |p: &Position| [p[0] + dx, p[1]];
    match coords {
        Coordinates::Point(p) => Coordinates::Point(mv(p)),
        Coordinates::LineString(l) => Coordinates::LineString(l.iter().map(mv).collect()),
        Coordinates::MultiPoint(l) => Coordinates::MultiPoint(l.iter().map(mv).collect()),
        Coordinates::Polygon(r) => {
            Coordinates::Polygon(r.iter().map(|l| l.iter().map(mv).collect::<Vec<_>>()).collect())
        }
        Coordinates::MultiLineString(r) => {
            Coordinates::MultiLineString(r.iter().map(|l| l.iter().map(mv).collect::<Vec<_>>()).collect())
        }
        Coordinates::MultiPolygon(p) => Coordinates::MultiPolygon(
            p.iter()
                .map(|r| r.iter().map(|l| l.iter().map(mv).collect::<Vec<_>>()).collect::<Vec<_>>())
                .collect(),
        ),
    }
}

#[test]
fn every_kind_has_a_strategy_shape() {
    // Guard against a new kind being added without transform coverage above.
    for kind in GeometryKind::ALL {
        assert!(TransformTable::standard().supports(kind));
    }
}
