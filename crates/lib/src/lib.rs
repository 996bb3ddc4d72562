//! rulekey-lib: deterministic rule-key computation
//!
//! A rule key is a 160-bit fingerprint identifying a build rule's cacheable
//! output. This crate reduces a heterogeneous rule description (strings,
//! numbers, collections, source paths, nested rules, hashed file content)
//! into that fingerprint, deterministically across machines and processes:
//!
//! - [`value::Value`]: the closed union of everything a rule may declare
//! - [`builder::RuleKeyBuilder`]: keyed `(field, value)` absorption with
//!   deferred field-name emission
//! - [`resolver::SourcePathResolver`]: source-path handles to workspace
//!   locations and owning rules
//! - [`oracle::FileHashOracle`]: the authority on file content identity
//! - [`builder::RuleKeyFactory`]: per-build collaborators (oracle, memoized
//!   rule keys, observer), created at build start and dropped at build end
//!
//! Bare filesystem paths are refused outright: a path's identity cannot be
//! disambiguated, so callers must present one of the
//! [`source::SourcePath`] variants instead.

pub mod builder;
pub mod cache;
pub mod error;
pub mod logger;
pub mod oracle;
pub mod resolver;
pub mod rule;
pub mod source;
pub mod target;
pub mod value;

// Re-export the digest primitives for convenience.
pub use rulekey_core::{DigestSink, RuleKey, Sha1HashCode};
