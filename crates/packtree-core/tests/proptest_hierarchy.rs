//! Property tests: arbitrary reparent sequences never leave the package
//! forest in an invalid state, and rejected moves change nothing.

use packtree_core::config::WarehouseConfig;
use packtree_core::hierarchy::PackageStore;
use packtree_core::model::{LocationId, PackageId, ProductId, QuantDraft};
use proptest::prelude::*;
use std::collections::BTreeSet;

const PACKAGES: u64 = 8;

#[derive(Debug, Clone)]
struct Move {
    package: u64,
    parent: Option<u64>,
}

fn arb_move() -> impl Strategy<Value = Move> {
    (1..=PACKAGES, prop::option::weighted(0.8, 1..=PACKAGES))
        .prop_map(|(package, parent)| Move { package, parent })
}

/// Eight root packages; the first two hold stock at different locations.
fn store(max_depth: u32) -> PackageStore {
    let mut store = PackageStore::new(WarehouseConfig::with_max_depth(max_depth));
    let l1 = store.add_location("L1").expect("location");
    let l2 = store.add_location("L2").expect("location");
    for _ in 0..PACKAGES {
        store.create_package(None).expect("package");
    }
    store
        .add_quant(QuantDraft::new(ProductId::new("apple"), 1.0, l1).in_package(PackageId(1)))
        .expect("stock in 1");
    store
        .add_quant(QuantDraft::new(ProductId::new("pear"), 1.0, l2).in_package(PackageId(2)))
        .expect("stock in 2");
    store
}

fn assert_forest_valid(store: &PackageStore) -> Result<(), TestCaseError> {
    let max = store.config().max_package_depth;
    for pkg in store.packages() {
        let id = pkg.id();
        let ancestors = store.ancestors(id);
        let unique: BTreeSet<PackageId> = ancestors.iter().copied().collect();
        prop_assert_eq!(unique.len(), ancestors.len(), "repeated ancestor of {}", id);
        prop_assert!(!unique.contains(&id), "{} is its own ancestor", id);

        prop_assert_eq!(pkg.depth() == 1, pkg.is_leaf(), "leaf/depth mismatch at {}", id);
        for child in pkg.children() {
            prop_assert_eq!(store.parent_of(*child), Some(id));
            prop_assert!(pkg.depth() > store.depth(*child));
        }

        if pkg.is_root() {
            prop_assert!(pkg.depth() <= max, "{} depth {} > {}", id, pkg.depth(), max);
            prop_assert!(store.locations_of(id).len() <= 1, "{} spans locations", id);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn reparent_sequences_keep_forest_valid(
        max_depth in 1_u32..=4,
        moves in prop::collection::vec(arb_move(), 1..40),
    ) {
        let mut store = store(max_depth);
        for mv in moves {
            let before = store.clone();
            let result = store.set_parent(PackageId(mv.package), mv.parent.map(PackageId));
            if result.is_err() {
                prop_assert_eq!(&store, &before, "failed move left changes behind");
            }
            assert_forest_valid(&store)?;
        }
    }

    #[test]
    fn unparenting_always_succeeds(
        moves in prop::collection::vec(arb_move(), 1..20),
        victim in 1..=PACKAGES,
    ) {
        let mut store = store(3);
        for mv in moves {
            let _ = store.set_parent(PackageId(mv.package), mv.parent.map(PackageId));
        }
        prop_assert!(store.set_parent(PackageId(victim), None).is_ok());
        prop_assert!(store.parent_of(PackageId(victim)).is_none());
        assert_forest_valid(&store)?;
    }
}

#[test]
fn stock_locations_are_distinct_in_fixture() {
    let store = store(2);
    assert_eq!(store.location_of(PackageId(1)), Some(LocationId(1)));
    assert_eq!(store.location_of(PackageId(2)), Some(LocationId(2)));
}
