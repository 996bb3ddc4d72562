//! Hash value types and content hashing

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::HashParseError;

/// Width in bytes of every digest produced by this crate.
pub const DIGEST_LEN: usize = 20;

/// Decode a lowercase/uppercase hex string into a fixed-width digest.
fn parse_hex(s: &str) -> Result<[u8; DIGEST_LEN], HashParseError> {
    if s.len() != DIGEST_LEN * 2 {
        return Err(HashParseError::InvalidLength {
            expected: DIGEST_LEN * 2,
            actual: s.len(),
        });
    }
    let decoded = hex::decode(s).map_err(|_| HashParseError::InvalidHex)?;
    let mut bytes = [0u8; DIGEST_LEN];
    bytes.copy_from_slice(&decoded);
    Ok(bytes)
}

/// A 160-bit rule key identifying a cacheable rule output.
///
/// The key is opaque: equality and ordering are byte-wise, and the textual
/// form is the lowercase hexadecimal of the digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleKey([u8; DIGEST_LEN]);

impl RuleKey {
    /// Wrap a raw digest.
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        RuleKey(bytes)
    }

    /// Parse the lowercase-hex textual form.
    pub fn parse(s: &str) -> Result<Self, HashParseError> {
        parse_hex(s).map(RuleKey)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// The lowercase-hex textual form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A 160-bit content digest of a file or archive member.
///
/// Distinct from [`RuleKey`] so that a file's content identity can never be
/// confused with a rule's computed key, even though both are 20 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sha1HashCode([u8; DIGEST_LEN]);

impl Sha1HashCode {
    /// Wrap a raw digest.
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Sha1HashCode(bytes)
    }

    /// Parse the lowercase-hex textual form.
    pub fn parse(s: &str) -> Result<Self, HashParseError> {
        parse_hex(s).map(Sha1HashCode)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// The lowercase-hex textual form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Sha1HashCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Compute the content digest of a byte slice.
pub fn hash_bytes(data: &[u8]) -> Sha1HashCode {
    let mut hasher = Sha1::new();
    hasher.update(data);
    Sha1HashCode(hasher.finalize().into())
}

/// Compute the content digest of everything a reader yields.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<Sha1HashCode> {
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(Sha1HashCode(hasher.finalize().into()))
}

/// Compute the content digest of a file on disk.
pub fn hash_file(path: &Path) -> io::Result<Sha1HashCode> {
    let file = File::open(path)?;
    hash_reader(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_hash_bytes() {
        let hash = hash_bytes(b"hello world");
        assert_eq!(hash.to_hex(), "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
    }

    #[test]
    fn test_hash_file() -> io::Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"hello world")?;
        file.flush()?;

        let hash = hash_file(file.path())?;
        assert_eq!(hash.to_hex(), "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
        Ok(())
    }

    #[test]
    fn parse_roundtrip() {
        let hash = hash_bytes(b"roundtrip");
        let parsed = Sha1HashCode::parse(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);

        let key = RuleKey::from_bytes(*hash.as_bytes());
        assert_eq!(RuleKey::parse(&key.to_hex()).unwrap(), key);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!(
            RuleKey::parse("abc"),
            Err(HashParseError::InvalidLength {
                expected: 40,
                actual: 3
            })
        );
    }

    #[test]
    fn parse_rejects_non_hex() {
        let err = Sha1HashCode::parse("zz".repeat(20).as_str());
        assert_eq!(err, Err(HashParseError::InvalidHex));
    }

    #[test]
    fn display_is_lowercase_hex() {
        let hash = hash_bytes(b"");
        assert_eq!(format!("{}", hash), hash.to_hex());
        assert!(hash.to_hex().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
