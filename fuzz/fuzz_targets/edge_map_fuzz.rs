#![no_main]
use allstar::dfa::EdgeMap;
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeMap;
use std::sync::Arc;

const MIN: i32 = -1;
const MAX: i32 = 63;

// Each input byte pair is one operation: the high bit of the first byte
// selects remove, the rest picks the key.
fuzz_target!(|data: &[u8]| {
    let mut map: Arc<EdgeMap<u8>> = EdgeMap::new(MIN, MAX);
    let mut model = BTreeMap::new();

    for chunk in data.chunks_exact(2) {
        let key = i32::from(chunk[0] & 0x7f) - 2;
        if chunk[0] & 0x80 != 0 {
            map = map.remove(key);
            model.remove(&key);
        } else {
            map = map.put(key, Arc::new(chunk[1]));
            if (MIN..=MAX).contains(&key) {
                model.insert(key, chunk[1]);
            }
        }
    }

    let entries: Vec<(i32, u8)> = map.entries().into_iter().map(|(k, v)| (k, *v)).collect();
    let expected: Vec<(i32, u8)> = model.into_iter().collect();
    assert_eq!(entries, expected);
    assert_eq!(map.len(), expected.len());
});
