//! Observation of rule-key derivation.
//!
//! The observer exists for diagnosis: it sees every event the classifier
//! produces but must never influence the digest. The default observer
//! ignores everything; [`VerboseRuleKeyLogger`] forwards each event to
//! `tracing` at debug level.

use std::fmt;
use std::path::Path;

use rulekey_core::{RuleKey, Sha1HashCode};
use tracing::debug;

use crate::source::ArchiveMemberPath;

/// Observer of rule-key derivation events. All methods default to no-ops.
pub trait RuleKeyLogger: Send + Sync {
  fn push_key(&self, _name: &str) {}

  /// Close the most recently opened scope (key, map, map entry component,
  /// source-with-flags).
  fn pop_scope(&self) {}

  fn added_value(&self, _value: &dyn fmt::Display) {}

  fn null_value(&self) {}

  fn added_path(&self, _path: &Path, _digest: &Sha1HashCode) {}

  fn added_non_hashing_path(&self, _path: &str) {}

  fn added_archive_member(&self, _member: &ArchiveMemberPath, _digest: &Sha1HashCode) {}

  fn push_map(&self) {}

  fn push_map_key(&self) {}

  fn push_map_value(&self) {}

  fn push_source_with_flags(&self) {}

  fn registered_rule_key(&self, _key: &RuleKey) {}
}

/// The default observer: ignores everything.
pub struct NullRuleKeyLogger;

impl RuleKeyLogger for NullRuleKeyLogger {}

/// Forwards every event to `tracing` at debug level.
pub struct VerboseRuleKeyLogger;

impl RuleKeyLogger for VerboseRuleKeyLogger {
  fn push_key(&self, name: &str) {
    debug!(key = name, "push-key");
  }

  fn pop_scope(&self) {
    debug!("pop-scope");
  }

  fn added_value(&self, value: &dyn fmt::Display) {
    debug!(value = %value, "added-value");
  }

  fn null_value(&self) {
    debug!("null-value");
  }

  fn added_path(&self, path: &Path, digest: &Sha1HashCode) {
    debug!(path = %path.display(), digest = %digest, "added-path");
  }

  fn added_non_hashing_path(&self, path: &str) {
    debug!(path, "added-non-hashing-path");
  }

  fn added_archive_member(&self, member: &ArchiveMemberPath, digest: &Sha1HashCode) {
    debug!(member = %member, digest = %digest, "added-archive-member");
  }

  fn push_map(&self) {
    debug!("push-map");
  }

  fn push_map_key(&self) {
    debug!("push-map-key");
  }

  fn push_map_value(&self) {
    debug!("push-map-value");
  }

  fn push_source_with_flags(&self) {
    debug!("push-source-with-flags");
  }

  fn registered_rule_key(&self, key: &RuleKey) {
    debug!(rule_key = %key, "registered-rule-key");
  }
}
