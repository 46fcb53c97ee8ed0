use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash arbitrary bytes with BLAKE3, returning the hex digest.
///
/// BLAKE3 gives stable, collision-resistant hashes across builds and platforms,
/// which is what makes run fingerprints comparable between machines.
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Hash any serializable value via its canonical JSON form.
///
/// Callers must ensure deterministic serialization (`BTreeMap`, not `HashMap`,
/// for any map-valued fields) so the digest is reproducible.
pub fn hash_canonical<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_string(value).expect("fingerprinted value must serialize");
    hash_bytes(json.as_bytes())
}

/// Deterministic hash of a tree description (structure + chains + instrument specs).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeHash(pub String);

impl TreeHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hash_bytes(bytes))
    }
}

impl fmt::Display for TreeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic content hash of a data feed (prices + auxiliary series).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hash_bytes(bytes))
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic digest of a run's outputs (trade log + snapshots).
///
/// Two runs with identical tree description, feed, and date sequence must
/// produce equal digests — this is the handle the determinism tests grab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportDigest(pub String);

impl fmt::Display for ReportDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
