//! Stable content fingerprints
//!
//! Uses xxHash64 with a fixed seed so identical compiler output always yields
//! the same value within a build. Callers use it to detect that a freshly
//! compiled ruleset is identical to the one already registered.

use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

// Golden ratio
const FINGERPRINT_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Fingerprint any hashable value.
#[inline]
pub fn fingerprint<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = XxHash64::with_seed(FINGERPRINT_SEED);
    value.hash(&mut hasher);
    hasher.finish()
}
