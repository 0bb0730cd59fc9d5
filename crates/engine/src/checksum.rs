//! Content checksums for drift detection
//!
//! A checksum is a SHA-256 digest of a script's resolved source. Two
//! checksums compare equal iff the underlying bytes were identical. It is
//! recomputed on every load and never cached, so any edit to a script is
//! observable as drift against the ledger. Checksums are never used as
//! identity; the Location is the join key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 digest of a script's resolved content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Digest raw content bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Checksum(out)
    }

    /// Digest a string's UTF-8 bytes.
    pub fn of_str(content: &str) -> Self {
        Self::of_bytes(content.as_bytes())
    }

    /// Lowercase hex rendering, the persisted form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

// Plain-string parse errors, like the policy and status keywords; the
// call site wraps them in whichever error class fits its context.
impl FromStr for Checksum {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| format!("invalid checksum '{}': {}", s, e))?;
        let mut out = [0u8; 32];
        if bytes.len() != out.len() {
            return Err(format!(
                "invalid checksum '{}': expected {} bytes, got {}",
                s,
                out.len(),
                bytes.len()
            ));
        }
        out.copy_from_slice(&bytes);
        Ok(Checksum(out))
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.to_hex()
    }
}

impl TryFrom<String> for Checksum {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
