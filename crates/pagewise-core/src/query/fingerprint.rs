//! Deterministic filter fingerprinting for log fields and metrics labels.

use crate::query::FilterSpec;
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

///
/// FilterFingerprint
///
/// Stable 64-bit fingerprint of a normalized filter.
/// Equal specs hash equal across processes; the value is never persisted.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FilterFingerprint(u64);

impl FilterFingerprint {
    #[must_use]
    pub fn of(spec: &FilterSpec) -> Self {
        let mut hasher = Xxh3::new();
        hasher.update(b"filterfp:v1");

        // serialization of a FilterSpec cannot fail: all keys are strings
        match serde_json::to_vec(spec) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(b"unserializable"),
        }

        Self(hasher.digest())
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FilterFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

///
/// TESTS
///
