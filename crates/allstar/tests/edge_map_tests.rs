//! Tests for the density-tiered edge maps

use allstar::dfa::{EdgeMap, EdgeMapTier};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Put(i32, u32),
    Remove(i32),
}

fn op(min: i32, max: i32) -> impl Strategy<Value = Op> {
    // keys slightly outside the range exercise the ignore path
    let keys = (min - 2)..=(max + 2);
    prop_oneof![
        3 => (keys.clone(), any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        1 => keys.prop_map(Op::Remove),
    ]
}

fn apply(map: &Arc<EdgeMap<u32>>, op: &Op) -> Arc<EdgeMap<u32>> {
    match *op {
        Op::Put(key, value) => map.put(key, Arc::new(value)),
        Op::Remove(key) => map.remove(key),
    }
}

fn snapshot(map: &EdgeMap<u32>) -> Vec<(i32, u32)> {
    map.entries().into_iter().map(|(k, v)| (k, *v)).collect()
}

#[test]
fn test_sixth_key_grows_a_full_sparse_map() {
    // small key space: the doubled capacity would cover half of it
    let mut small = EdgeMap::new_sparse(0, 15, 5);
    for key in 0..6 {
        small = small.put(key, Arc::new(key as u32 * 10));
    }
    assert_eq!(small.tier(), EdgeMapTier::Array);

    // large key space: the sparse map doubles instead
    let mut large = EdgeMap::new_sparse(0, 1000, 5);
    for key in 0..6 {
        large = large.put(key * 100, Arc::new(key as u32));
    }
    assert_eq!(large.tier(), EdgeMapTier::Sparse);

    for key in 0..6 {
        assert_eq!(small.get(key).as_deref(), Some(&(key as u32 * 10)));
        assert_eq!(large.get(key * 100).as_deref(), Some(&(key as u32)));
    }
    assert_eq!(small.len(), 6);
    assert_eq!(large.len(), 6);
}

#[test]
fn test_tiers_promote_in_order() {
    let empty = EdgeMap::new(-1, 100);
    assert_eq!(empty.tier(), EdgeMapTier::Empty);
    let one = empty.put(3, Arc::new(1u32));
    assert_eq!(one.tier(), EdgeMapTier::Singleton);
    let two = one.put(9, Arc::new(2));
    assert_eq!(two.tier(), EdgeMapTier::Sparse);

    // copy-on-write tiers leave the old map untouched
    assert!(empty.is_empty());
    assert_eq!(one.len(), 1);
    assert!(!one.contains_key(9));
}

#[test]
fn test_empty_map_is_returned_unchanged() {
    let empty: Arc<EdgeMap<u32>> = EdgeMap::new(0, 10);
    assert!(Arc::ptr_eq(&empty.remove(4), &empty));
    assert!(Arc::ptr_eq(&empty.clear(), &empty));
    assert!(Arc::ptr_eq(&empty.put(11, Arc::new(1)), &empty));
}

#[test]
fn test_array_updates_in_place() {
    let array = EdgeMap::new_array(0, 9);
    let same = array.put(2, Arc::new(7u32));
    assert!(Arc::ptr_eq(&array, &same));
    assert_eq!(array.get(2).as_deref(), Some(&7));
    let emptied = array.remove(2);
    assert_eq!(emptied.tier(), EdgeMapTier::Empty);
}

proptest! {
    #[test]
    fn prop_maps_match_model(ops in prop::collection::vec(op(-1, 20), 0..80)) {
        let mut map = EdgeMap::new(-1, 20);
        let mut model = BTreeMap::new();
        for op in &ops {
            map = apply(&map, op);
            match *op {
                Op::Put(key, value) if (-1..=20).contains(&key) => {
                    model.insert(key, value);
                }
                Op::Remove(key) => {
                    model.remove(&key);
                }
                Op::Put(..) => {}
            }
        }
        let expected: Vec<(i32, u32)> = model.into_iter().collect();
        prop_assert_eq!(snapshot(&map), expected.clone());
        prop_assert_eq!(map.len(), expected.len());
        for key in -3..=22 {
            prop_assert_eq!(
                map.contains_key(key),
                expected.iter().any(|&(k, _)| k == key)
            );
        }
    }

    #[test]
    fn prop_tiers_are_equivalent(ops in prop::collection::vec(op(0, 40), 0..120)) {
        let mut starts = [
            EdgeMap::new(0, 40),
            EdgeMap::new_sparse(0, 40, 2),
            EdgeMap::new_array(0, 40),
        ];
        for op in &ops {
            for map in &mut starts {
                *map = apply(map, op);
            }
        }
        let reference = snapshot(&starts[0]);
        for map in &starts[1..] {
            prop_assert_eq!(snapshot(map), reference.clone());
            for key in -2..=42 {
                prop_assert_eq!(map.contains_key(key), starts[0].contains_key(key));
                prop_assert_eq!(
                    map.get(key).map(|v| *v),
                    starts[0].get(key).map(|v| *v)
                );
            }
        }
    }
}
