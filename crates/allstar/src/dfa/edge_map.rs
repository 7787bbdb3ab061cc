//! # Edge Maps
//!
//! Symbol-to-target tables for DFA states, specialized by density.
//!
//! ## Overview
//!
//! Most DFA states have one or two outgoing edges; a few (lexer states
//! over an ASCII alphabet, parser states after a common prefix) have
//! dozens. An [`EdgeMap`] starts in the cheapest tier and promotes itself
//! as keys are added:
//!
//! | Tier | Storage | Lookup |
//! |------|---------|--------|
//! | Empty | bounds only | constant |
//! | Singleton | one key and value | compare |
//! | Sparse | sorted keys, parallel values, bounded capacity | binary search |
//! | Array | one slot per key in `min_index..=max_index` | index |
//!
//! Maps are held in an `Arc`. [`put`](EdgeMap::put) and
//! [`remove`](EdgeMap::remove) return the map to use from now on, which
//! may be a new allocation. The first three tiers are copy-on-write; the
//! array tier updates in place, one lock per slot, so two threads writing
//! different symbols never contend.
//!
//! A sparse map that is full doubles its capacity. Whenever the capacity a
//! sparse map needs reaches half of the key space, it becomes an array
//! instead.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Default capacity of a freshly promoted sparse map
pub const DEFAULT_SPARSE_CAPACITY: usize = 5;

/// Key range and growth policy shared by every tier of one map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeBounds {
    min_index: i32,
    max_index: i32,
    sparse_capacity: usize,
}

impl EdgeBounds {
    const fn in_range(self, key: i32) -> bool {
        key >= self.min_index && key <= self.max_index
    }

    fn space(self) -> usize {
        usize::try_from(i64::from(self.max_index) - i64::from(self.min_index) + 1).unwrap_or(0)
    }

    fn slot(self, key: i32) -> usize {
        usize::try_from(i64::from(key) - i64::from(self.min_index)).unwrap_or(usize::MAX)
    }
}

/// Which storage strategy a map currently uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeMapTier {
    Empty,
    Singleton,
    Sparse,
    Array,
}

#[derive(Debug)]
pub struct SparseEdgeMap<T> {
    capacity: usize,
    keys: Vec<i32>,
    values: Vec<Arc<T>>,
}

#[derive(Debug)]
pub struct ArrayEdgeMap<T> {
    slots: Box<[RwLock<Option<Arc<T>>>]>,
    size: AtomicUsize,
}

impl<T> ArrayEdgeMap<T> {
    fn with_entries(bounds: EdgeBounds, entries: impl IntoIterator<Item = (i32, Arc<T>)>) -> Self {
        let slots: Box<[RwLock<Option<Arc<T>>>]> =
            (0..bounds.space()).map(|_| RwLock::new(None)).collect();
        let mut size = 0;
        for (key, value) in entries {
            let slot = &slots[bounds.slot(key)];
            if slot
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .replace(value)
                .is_none()
            {
                size += 1;
            }
        }
        Self {
            slots,
            size: AtomicUsize::new(size),
        }
    }

    fn get(&self, index: usize) -> Option<Arc<T>> {
        self.slots[index]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug)]
pub enum EdgeMap<T> {
    Empty(EdgeBounds),
    Singleton {
        bounds: EdgeBounds,
        key: i32,
        value: Arc<T>,
    },
    Sparse(EdgeBounds, SparseEdgeMap<T>),
    Array(EdgeBounds, ArrayEdgeMap<T>),
}

impl<T> EdgeMap<T> {
    /// An empty map over `min_index..=max_index`
    #[must_use]
    pub fn new(min_index: i32, max_index: i32) -> Arc<Self> {
        Self::with_sparse_capacity(min_index, max_index, DEFAULT_SPARSE_CAPACITY)
    }

    /// An empty map whose sparse tier starts at `sparse_capacity`
    #[must_use]
    pub fn with_sparse_capacity(min_index: i32, max_index: i32, sparse_capacity: usize) -> Arc<Self> {
        Arc::new(Self::Empty(EdgeBounds {
            min_index,
            max_index,
            sparse_capacity: sparse_capacity.max(1),
        }))
    }

    /// An empty map already in the sparse tier
    #[must_use]
    pub fn new_sparse(min_index: i32, max_index: i32, capacity: usize) -> Arc<Self> {
        let bounds = EdgeBounds {
            min_index,
            max_index,
            sparse_capacity: capacity.max(1),
        };
        Arc::new(Self::Sparse(
            bounds,
            SparseEdgeMap {
                capacity: capacity.max(1),
                keys: Vec::new(),
                values: Vec::new(),
            },
        ))
    }

    /// An empty map already in the array tier
    #[must_use]
    pub fn new_array(min_index: i32, max_index: i32) -> Arc<Self> {
        let bounds = EdgeBounds {
            min_index,
            max_index,
            sparse_capacity: DEFAULT_SPARSE_CAPACITY,
        };
        Arc::new(Self::Array(bounds, ArrayEdgeMap::with_entries(bounds, [])))
    }

    const fn bounds(&self) -> EdgeBounds {
        match self {
            Self::Empty(bounds)
            | Self::Singleton { bounds, .. }
            | Self::Sparse(bounds, _)
            | Self::Array(bounds, _) => *bounds,
        }
    }

    #[must_use]
    pub const fn min_index(&self) -> i32 {
        self.bounds().min_index
    }

    #[must_use]
    pub const fn max_index(&self) -> i32 {
        self.bounds().max_index
    }

    #[must_use]
    pub const fn tier(&self) -> EdgeMapTier {
        match self {
            Self::Empty(_) => EdgeMapTier::Empty,
            Self::Singleton { .. } => EdgeMapTier::Singleton,
            Self::Sparse(..) => EdgeMapTier::Sparse,
            Self::Array(..) => EdgeMapTier::Array,
        }
    }

    /// Number of keys with a target
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Empty(_) => 0,
            Self::Singleton { .. } => 1,
            Self::Sparse(_, sparse) => sparse.keys.len(),
            Self::Array(_, array) => array.size.load(Ordering::Acquire),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains_key(&self, key: i32) -> bool {
        self.get(key).is_some()
    }

    /// The target stored for `key`; `None` when there is none yet or
    /// `key` is out of range
    #[must_use]
    pub fn get(&self, key: i32) -> Option<Arc<T>> {
        let bounds = self.bounds();
        if !bounds.in_range(key) {
            return None;
        }
        match self {
            Self::Empty(_) => None,
            Self::Singleton {
                key: own, value, ..
            } => (*own == key).then(|| value.clone()),
            Self::Sparse(_, sparse) => sparse
                .keys
                .binary_search(&key)
                .ok()
                .map(|index| sparse.values[index].clone()),
            Self::Array(_, array) => array.get(bounds.slot(key)),
        }
    }

    /// Store `value` for `key`, returning the map to use from now on.
    ///
    /// Keys outside `min_index..=max_index` are ignored.
    #[must_use]
    pub fn put(self: &Arc<Self>, key: i32, value: Arc<T>) -> Arc<Self> {
        let bounds = self.bounds();
        if !bounds.in_range(key) {
            return self.clone();
        }
        match &**self {
            Self::Empty(_) => Arc::new(Self::Singleton { bounds, key, value }),
            Self::Singleton {
                key: own,
                value: own_value,
                ..
            } => {
                if *own == key {
                    return Arc::new(Self::Singleton { bounds, key, value });
                }
                let sparse = SparseEdgeMap {
                    capacity: bounds.sparse_capacity,
                    keys: vec![*own],
                    values: vec![own_value.clone()],
                };
                sparse_put(bounds, &sparse, key, value)
            }
            Self::Sparse(_, sparse) => sparse_put(bounds, sparse, key, value),
            Self::Array(_, array) => {
                let previous = array.slots[bounds.slot(key)]
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .replace(value);
                if previous.is_none() {
                    array.size.fetch_add(1, Ordering::AcqRel);
                }
                self.clone()
            }
        }
    }

    /// Drop the target for `key`, returning the map to use from now on
    #[must_use]
    pub fn remove(self: &Arc<Self>, key: i32) -> Arc<Self> {
        let bounds = self.bounds();
        if !bounds.in_range(key) {
            return self.clone();
        }
        match &**self {
            Self::Empty(_) => self.clone(),
            Self::Singleton { key: own, .. } => {
                if *own == key {
                    Arc::new(Self::Empty(bounds))
                } else {
                    self.clone()
                }
            }
            Self::Sparse(_, sparse) => {
                let Ok(index) = sparse.keys.binary_search(&key) else {
                    return self.clone();
                };
                if sparse.keys.len() == 1 {
                    return Arc::new(Self::Empty(bounds));
                }
                let mut keys = sparse.keys.clone();
                let mut values = sparse.values.clone();
                keys.remove(index);
                values.remove(index);
                Arc::new(Self::Sparse(
                    bounds,
                    SparseEdgeMap {
                        capacity: sparse.capacity,
                        keys,
                        values,
                    },
                ))
            }
            Self::Array(_, array) => {
                let removed = array.slots[bounds.slot(key)]
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if removed.is_some() && array.size.fetch_sub(1, Ordering::AcqRel) == 1 {
                    return Arc::new(Self::Empty(bounds));
                }
                self.clone()
            }
        }
    }

    /// Store every entry of `other`
    #[must_use]
    pub fn put_all(self: &Arc<Self>, other: &Self) -> Arc<Self> {
        other
            .entries()
            .into_iter()
            .fold(self.clone(), |map, (key, value)| map.put(key, value))
    }

    /// An empty map with the same bounds
    #[must_use]
    pub fn clear(self: &Arc<Self>) -> Arc<Self> {
        match &**self {
            Self::Empty(_) => self.clone(),
            _ => Arc::new(Self::Empty(self.bounds())),
        }
    }

    /// Every `(key, target)` pair in ascending key order
    #[must_use]
    pub fn entries(&self) -> Vec<(i32, Arc<T>)> {
        match self {
            Self::Empty(_) => Vec::new(),
            Self::Singleton { key, value, .. } => vec![(*key, value.clone())],
            Self::Sparse(_, sparse) => sparse
                .keys
                .iter()
                .copied()
                .zip(sparse.values.iter().cloned())
                .collect(),
            Self::Array(bounds, array) => (bounds.min_index..=bounds.max_index)
                .zip(0..array.slots.len())
                .filter_map(|(key, slot)| array.get(slot).map(|value| (key, value)))
                .collect(),
        }
    }

    #[must_use]
    pub fn to_map(&self) -> BTreeMap<i32, Arc<T>> {
        self.entries().into_iter().collect()
    }
}

fn sparse_put<T>(
    bounds: EdgeBounds,
    sparse: &SparseEdgeMap<T>,
    key: i32,
    value: Arc<T>,
) -> Arc<EdgeMap<T>> {
    let mut keys = sparse.keys.clone();
    let mut values = sparse.values.clone();
    let capacity = match keys.binary_search(&key) {
        Ok(index) => {
            values[index] = value;
            sparse.capacity
        }
        Err(index) => {
            let full = keys.len() >= sparse.capacity;
            let capacity = if full {
                sparse.capacity * 2
            } else {
                sparse.capacity
            };
            if capacity >= bounds.space() / 2 {
                log::trace!(
                    "edge map over {}..={} promoted to array tier at {} entries",
                    bounds.min_index,
                    bounds.max_index,
                    keys.len() + 1
                );
                let entries = keys
                    .into_iter()
                    .zip(values)
                    .chain(std::iter::once((key, value)));
                return Arc::new(EdgeMap::Array(
                    bounds,
                    ArrayEdgeMap::with_entries(bounds, entries),
                ));
            }
            keys.insert(index, key);
            values.insert(index, value);
            capacity
        }
    };
    Arc::new(EdgeMap::Sparse(
        bounds,
        SparseEdgeMap {
            capacity,
            keys,
            values,
        },
    ))
}
