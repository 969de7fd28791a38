//! Structural fingerprinting of resume snapshots.
//!
//! A fingerprint is an FNV-1a 64-bit hash over the snapshot's canonical JSON
//! bytes. Struct serialization order is fixed, so identical content (including
//! section order and formatting) always produces the same digest. The hash is
//! deliberately non-cryptographic: it only gates preview dedup and cache
//! lookups, and any collision is bounded by the cache freshness window.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::ResumeSnapshot;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Identity of one snapshot's full content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Computes the fingerprint of a snapshot. Pure and total: serializing a
/// plain struct tree cannot fail, so callers never see an error path.
pub fn fingerprint(snapshot: &ResumeSnapshot) -> Fingerprint {
    let bytes =
        serde_json::to_vec(snapshot).expect("snapshot serialization is infallible");
    Fingerprint(fnv1a(&bytes))
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
