// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Routing algebra properties and the basic two-brush scenarios

use nalgebra::Matrix4;
use polyframe_csg::routing::{RoutingLookup, RowFold};
use polyframe_csg::{
    BrushMeshId, Category, CsgHierarchy, NodeHandle, OperationKind, RoutingRow, RoutingTable,
    TableFamily, TreeEvaluator,
};
use Category::*;

const VALID: [Category; 4] = Category::ALL;

#[test]
fn test_table_totality() {
    for family in TableFamily::ALL {
        for op in OperationKind::ALL {
            for left in VALID {
                for right in VALID {
                    let result = family.apply(op, left, right);
                    assert!(result.is_valid(), "{} {} {} {} -> {}", family, op, left, right, result);
                }
            }
        }
        for row in family.reserved() {
            assert!(row.iter().all(|c| *c == Invalid));
        }
    }
}

#[test]
fn test_literal_regular_tables() {
    let regular = TableFamily::Regular;
    assert_eq!(regular.table(OperationKind::Additive)[Outside.index()], [Inside, Aligned, ReverseAligned, Outside]);
    assert_eq!(regular.table(OperationKind::Subtractive)[Inside.index()], [Outside, ReverseAligned, Aligned, Inside]);
    assert_eq!(regular.table(OperationKind::Intersecting)[Inside.index()], [Inside, Aligned, ReverseAligned, Outside]);

    let overlap = TableFamily::OverlapRemoval;
    assert_eq!(overlap.table(OperationKind::Additive)[Aligned.index()], [Inside, Inside, Inside, Aligned]);
    assert_eq!(overlap.table(OperationKind::Intersecting)[ReverseAligned.index()], [ReverseAligned, Outside, Outside, Outside]);
}

#[test]
fn test_composition_closure_for_random_rows() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let row = RoutingRow::from_array([(); 4].map(|_| VALID[rng.gen_range(0..4)]));
        let op = OperationKind::ALL[rng.gen_range(0..3)];
        let family = TableFamily::ALL[rng.gen_range(0..2)];
        for left in VALID {
            assert!(RoutingRow::compose(family, op, left, &row).is_closed());
        }
    }
}

#[test]
fn test_single_child_fold_is_identity() {
    let child = RoutingRow::new(Outside, ReverseAligned, Inside, Aligned);
    for family in TableFamily::ALL {
        for op in OperationKind::ALL {
            let mut fold = RowFold::new(family);
            fold.push(op, &child);
            assert_eq!(fold.finish(), child);
        }
    }
}

#[test]
fn test_fold_is_order_sensitive() {
    let rows = [
        RoutingRow::new(Inside, Inside, Outside, Outside),
        RoutingRow::new(Inside, Outside, Inside, Outside),
        RoutingRow::new(Outside, Outside, Outside, Inside),
    ];
    let ops = [OperationKind::Additive, OperationKind::Subtractive, OperationKind::Additive];

    let mut forward = RowFold::new(TableFamily::Regular);
    for (op, row) in ops.iter().zip(rows.iter()) {
        forward.push(*op, row);
    }
    let mut reversed = RowFold::new(TableFamily::Regular);
    for (op, row) in ops.iter().zip(rows.iter().rev()) {
        reversed.push(*op, row);
    }
    assert_ne!(forward.finish(), reversed.finish());
}

#[test]
fn test_lookup_fallback_never_fails() {
    let mut table = RoutingTable::new();
    let slot = table.push_node(NodeHandle::new(0, 0), &[RoutingRow::IDENTITY, RoutingRow::uniform(Inside)]);
    let empty = table.push_empty(NodeHandle::new(1, 0));

    for c in [ReverseAligned, Outside] {
        assert_eq!(table.route(slot, c), RoutingRow::identity_seeded(c));
    }
    for c in VALID {
        let row = table.route(empty, c);
        assert_eq!(row, RoutingRow::identity_seeded(c));
        assert!(row.is_closed());
    }
    let detached = RoutingLookup::new(100, 104);
    for c in VALID {
        assert_eq!(detached.route(&table, c), RoutingRow::identity_seeded(c));
    }
}

/// Tree `[a, b]` with `b` using `op`; returns the routed category of a
/// fragment of `b` classified `left` against `a` and `right` against `b`
fn route_pair(op: OperationKind, left: Category, right: Category) -> Category {
    let mut h = CsgHierarchy::new();
    let tree = h.create_tree();
    let a = h.create_brush(OperationKind::Additive, Some(BrushMeshId(1)), Matrix4::identity());
    let b = h.create_brush(op, Some(BrushMeshId(2)), Matrix4::identity());
    h.set_children(tree, vec![a, b]).unwrap();

    let routing = TreeEvaluator::new().evaluate(&h, tree).unwrap();
    let provider = |brush: NodeHandle| if brush == a { left } else { right };
    routing.categorize(b, &provider).unwrap()
}

#[test]
fn test_union_of_disjoint_brushes() {
    assert_eq!(TableFamily::Regular.apply(OperationKind::Additive, Outside, Inside), Inside);
    assert_eq!(route_pair(OperationKind::Additive, Outside, Inside), Inside);
}

#[test]
fn test_subtraction_carves_hole() {
    assert_eq!(TableFamily::Regular.apply(OperationKind::Subtractive, Inside, Inside), Outside);
    assert_eq!(route_pair(OperationKind::Subtractive, Inside, Inside), Outside);
}

#[test]
fn test_intersection_keeps_overlap() {
    assert_eq!(TableFamily::Regular.apply(OperationKind::Intersecting, Inside, Inside), Inside);
    assert_eq!(route_pair(OperationKind::Intersecting, Inside, Inside), Inside);
}

#[test]
fn test_pair_matches_table_everywhere() {
    for op in OperationKind::ALL {
        for left in VALID {
            for right in VALID {
                assert_eq!(
                    route_pair(op, left, right),
                    TableFamily::Regular.apply(op, left, right),
                    "{} {} {}",
                    op,
                    left,
                    right
                );
            }
        }
    }
}

#[test]
fn test_emission_of_final_categories() {
    use polyframe_csg::routing::Emission;
    assert_eq!(Aligned.emission(), Emission::Emit);
    assert_eq!(ReverseAligned.emission(), Emission::EmitFlipped);
    assert_eq!(Inside.emission(), Emission::Discard);
    assert_eq!(Outside.emission(), Emission::Discard);
}
