mod common;

use neighbors::neighbor::{Item, Neighbor, NeighborError, NeighborStore, NeighborKey};

#[test]
fn family_zero_is_rejected_and_nothing_is_written() {
    let tmp = tempfile::tempdir().unwrap();
    let store = common::store_in(&tmp, Some(7));
    let mut neighbor = Neighbor::new(&store, 42);

    let err = neighbor.set_family(0).unwrap_err();
    assert!(matches!(err, NeighborError::InvalidState(_)), "got {err:?}");
    assert_eq!(store.relational().count().unwrap(), 0);
    assert_eq!(neighbor.key().family, None);
}

#[test]
fn level_is_read_only() {
    let tmp = tempfile::tempdir().unwrap();
    let store = common::store_in(&tmp, Some(7));
    let neighbor = Neighbor::new(&store, 42);
    neighbor.set_xp(700).unwrap();

    let err = neighbor.set_level(10).unwrap_err();
    assert!(matches!(err, NeighborError::UnsupportedOperation(_)));
    assert_eq!(neighbor.xp().unwrap(), 700);
    assert_eq!(neighbor.level().unwrap(), 3);
}

#[test]
fn first_write_without_family_fails_when_no_default_is_configured() {
    let tmp = tempfile::tempdir().unwrap();
    let store = common::store_in(&tmp, None);
    let neighbor = Neighbor::new(&store, 42);

    assert_eq!(neighbor.xp().unwrap(), 0);
    assert!(matches!(
        neighbor.set_xp(10),
        Err(NeighborError::InvalidState(_))
    ));

    let placed = Neighbor::in_family(&store, 42, 5);
    placed.set_xp(10).unwrap();
    assert_eq!(placed.family().unwrap(), 5);
}

#[test]
fn moving_family_follows_the_neighbor() {
    let tmp = tempfile::tempdir().unwrap();
    let store = common::store_in(&tmp, Some(7));
    common::write_legacy(&tmp, 7, "42;7;450;0;\n");

    let mut neighbor = Neighbor::new(&store, 42);
    neighbor.set_family(9).unwrap();

    assert_eq!(neighbor.family().unwrap(), 9);
    assert_eq!(neighbor.xp().unwrap(), 450);
    let fresh_handle = Neighbor::in_family(&store, 42, 9);
    assert_eq!(fresh_handle.xp().unwrap(), 450);
    let remaining = std::fs::read_to_string(common::legacy_path(&tmp, 7)).unwrap();
    assert!(remaining.trim().is_empty());
}

#[test]
fn item_attribute_typos_suggest_close_names() {
    let tmp = tempfile::tempdir().unwrap();
    let store = common::store_in(&tmp, Some(7));
    let neighbor = Neighbor::new(&store, 1);
    neighbor
        .give_item(
            Item::never_expires("Sword", "weapon")
                .with_value("damage", "12")
                .with_value("durability", "80"),
        )
        .unwrap();

    let inventory = neighbor.inventory().unwrap();
    let err = inventory[0].get_value("damge").unwrap_err();
    match err {
        NeighborError::NotFound { suggestions, .. } => {
            assert!(suggestions.contains(&"damage".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn concurrent_reads_of_distinct_neighbors_are_independent() {
    let tmp = tempfile::tempdir().unwrap();
    let store = common::store_in(&tmp, Some(7));
    Neighbor::new(&store, 1).set_xp(100).unwrap();
    common::write_legacy(&tmp, 7, "2;7;2000;0;\n");

    std::thread::scope(|scope| {
        let first = scope.spawn(|| {
            (0..20)
                .map(|_| store.get_xp(&NeighborKey::new(1)).unwrap())
                .collect::<Vec<_>>()
        });
        let second = scope.spawn(|| {
            (0..20)
                .map(|_| store.get_xp(&NeighborKey::new(2)).unwrap())
                .collect::<Vec<_>>()
        });
        assert!(first.join().unwrap().iter().all(|xp| *xp == 100));
        assert!(second.join().unwrap().iter().all(|xp| *xp == 2000));
    });
}
