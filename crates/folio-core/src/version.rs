//! Revision tokens
//!
//! Every successful commit on a key produces a new versionstamp. The token is
//! opaque to callers: equality is the only exposed semantic, and it is the
//! sole basis for optimistic concurrency (compare-and-swap on write).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, monotonically assigned per-key revision token
///
/// Produced by the backend from its commit sequence. The encoding
/// (zero-padded hex) keeps lexicographic order aligned with allocation
/// order, but callers must not parse or compare tokens beyond equality.
/// A document's `_rev` is this token verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Versionstamp(String);

impl Versionstamp {
    /// Wrap a raw token (e.g. a `_rev` echoed back by a caller)
    pub fn new(raw: impl Into<String>) -> Self {
        Versionstamp(raw.into())
    }

    /// Token for the given commit sequence number
    pub fn from_sequence(seq: u64) -> Self {
        Versionstamp(format!("{seq:016x}"))
    }

    /// The token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Versionstamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_tokens_are_lexicographically_monotonic() {
        let a = Versionstamp::from_sequence(1);
        let b = Versionstamp::from_sequence(2);
        let c = Versionstamp::from_sequence(0x1_0000);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_round_trip_through_string() {
        let stamp = Versionstamp::from_sequence(42);
        let echoed = Versionstamp::new(stamp.as_str());
        assert_eq!(stamp, echoed);
    }

    #[test]
    fn test_serde_is_transparent() {
        let stamp = Versionstamp::from_sequence(7);
        let json = serde_json::to_string(&stamp).unwrap();
        assert_eq!(json, format!("\"{}\"", stamp.as_str()));
    }
}
