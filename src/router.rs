//! Per-request variant selection.
//!
//! Routing is not a security boundary: any uniform generator will do,
//! and the generator is always injected so selection can be replayed
//! deterministically in tests.

use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::variant::{VariantSet, TOTAL_WEIGHT};

/// Picks the variant index for one redirect request.
///
/// Draws a uniform value in `[0, 100)` and walks the cumulative weight
/// boundaries `[0, w0), [w0, w0+w1), …` — O(n) in variant count, and
/// never out of range because weights sum to exactly 100.
pub fn route<R: Rng + ?Sized>(set: &VariantSet, rng: &mut R) -> usize {
    pick(set, rng.gen_range(0..TOTAL_WEIGHT))
}

/// Deterministic assignment for a stable visitor key.
///
/// Hashes `key` together with the test id and buckets the result into
/// `[0, 100)`, so the same visitor sees the same destination for the
/// lifetime of the test without any session cache. Changing either the
/// key or the test id re-buckets independently. Callers that want
/// cookie-based stickiness instead should cache the index from
/// [`route`] themselves.
pub fn route_by_key(set: &VariantSet, test_id: &Uuid, key: &str) -> usize {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(test_id.as_bytes());
    let hash = hasher.finalize();
    let bucket = (u32::from(hash[0]) * 256 + u32::from(hash[1])) % TOTAL_WEIGHT;
    pick(set, bucket)
}

fn pick(set: &VariantSet, draw: u32) -> usize {
    let mut cumulative = 0;
    for (index, variant) in set.variants().iter().enumerate() {
        cumulative += variant.weight;
        if draw < cumulative {
            return index;
        }
    }
    // Unreachable while the sum-100 invariant holds.
    set.len() - 1
}
