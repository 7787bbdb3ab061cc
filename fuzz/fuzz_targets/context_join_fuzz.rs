#![no_main]
use allstar::context::{PredictionContext, PredictionContextCache};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

/// Decode a context: each byte pushes a frame, zero bytes start a new
/// path that is joined into the result
fn decode(bytes: &[u8], cache: &mut PredictionContextCache) -> Arc<PredictionContext> {
    let mut joined: Option<Arc<PredictionContext>> = None;
    for path in bytes.split(|&b| b == 0) {
        let mut context = PredictionContext::empty_full().clone();
        for &frame in path {
            context = context.child(i32::from(frame));
        }
        joined = Some(match joined {
            Some(acc) => PredictionContext::join(&acc, &context, cache),
            None => context,
        });
    }
    joined.unwrap_or_else(|| PredictionContext::empty_full().clone())
}

fuzz_target!(|data: &[u8]| {
    let Some(split) = data.iter().position(|&b| b == 0xff) else {
        return;
    };
    let mut cache = PredictionContextCache::new();
    let left = decode(&data[..split], &mut cache);
    let right = decode(&data[split + 1..], &mut cache);

    let ab = PredictionContext::join(&left, &right, &mut cache);
    let ba = PredictionContext::join(&right, &left, &mut cache);
    assert_eq!(ab, ba);
    assert!(Arc::ptr_eq(&PredictionContext::join(&ab, &ab, &mut cache), &ab));

    // every top-level return state of either side survives the join
    for side in [&left, &right] {
        for i in 0..side.len() {
            assert!(ab.find_return_state(side.return_state(i)).is_some());
        }
    }
});
