//! Hashing helpers shared by the interning tables

use std::hash::Hash;
use std::sync::OnceLock;

pub(crate) type FastMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
pub(crate) type FastSet<K> = hashbrown::HashSet<K, ahash::RandomState>;

/// Hasher with fixed seeds, used for content hashes that are cached inside
/// values and therefore must agree across every table in the process
fn content_hasher() -> &'static ahash::RandomState {
    static HASHER: OnceLock<ahash::RandomState> = OnceLock::new();
    HASHER.get_or_init(|| {
        ahash::RandomState::with_seeds(
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
            0x082e_fa98_ec4e_6c89,
        )
    })
}

pub(crate) fn content_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    content_hasher().hash_one(value)
}
