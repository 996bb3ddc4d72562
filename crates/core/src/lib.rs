//! rulekey-core: digest primitives for rule-key computation
//!
//! This crate provides the low-level pieces the rule-key engine is built on:
//! - [`DigestSink`]: a streaming 160-bit hasher with field separators
//! - [`RuleKey`]: the opaque digest identifying a cacheable rule output
//! - [`Sha1HashCode`]: the content digest of a file or archive member
//!
//! The types are engine-agnostic; the `rulekey-lib` crate layers the value
//! model, path resolution, and the builder on top of them.

mod digest;
mod error;
mod hash;

pub use digest::DigestSink;
pub use error::HashParseError;
pub use hash::{DIGEST_LEN, RuleKey, Sha1HashCode, hash_bytes, hash_file, hash_reader};
