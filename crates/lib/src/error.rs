//! Error types for rule-key computation.

use std::path::PathBuf;

use thiserror::Error;

use crate::target::BuildTarget;

/// Errors that can occur while computing a rule key.
///
/// None of these are recovered locally: a rule that fails to produce a key
/// is not cacheable, and the surrounding executor decides whether to rebuild
/// unconditionally or surface the failure to the user.
#[derive(Debug, Error)]
pub enum RuleKeyError {
  /// A bare filesystem path was offered as a value.
  #[error(
    "it's not possible to reliably disambiguate the bare path {0:?}; present it as a source path"
  )]
  AmbiguousPath(PathBuf),

  /// The file-hash oracle has no content digest for a required path.
  #[error("no content digest available for {0}")]
  MissingFileHash(String),

  /// A well-formed value that is inadmissible in the hashing encoder.
  #[error("unsupported value: {0}")]
  UnsupportedValue(String),

  /// An unordered map or set was admitted in strict mode.
  #[error("unordered {kind} under field '{field}' would make the digest unstable")]
  UnorderedCollection { field: String, kind: &'static str },

  /// The absolute/relative invariants on an archive-member path were violated.
  #[error("invalid archive member paths: {0}")]
  InvalidArchiveMemberPaths(String),

  /// A rule referenced itself, directly or transitively, during resolution.
  #[error("cycle detected while resolving the rule key for {0}")]
  CyclicRuleGraph(BuildTarget),

  /// A rule-output source path names a target the rule lookup does not know.
  #[error("no rule found for target {0}")]
  UnknownRule(BuildTarget),

  /// An earlier `set` failed; the builder can no longer produce a key.
  #[error("rule key builder poisoned by an earlier failure")]
  BuilderPoisoned,

  /// I/O error surfaced by a collaborator.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
