//! Memoized rule keys and appendable sub-keys.
//!
//! Shared for the lifetime of a build, internally synchronized, write-once
//! per entry. Concurrent requesters of the same target may compute the key
//! independently; they agree because computation is deterministic, and the
//! first stored result wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rulekey_core::RuleKey;

use crate::rule::RuleKeyAppendable;
use crate::target::BuildTarget;

/// The data-pointer address of an appendable, valid while the `Arc` lives.
/// The cache retains a clone of the `Arc` so the address cannot be reused.
fn appendable_addr(appendable: &Arc<dyn RuleKeyAppendable>) -> usize {
  Arc::as_ptr(appendable) as *const () as usize
}

#[derive(Default)]
pub struct RuleKeyCache {
  rules: Mutex<HashMap<BuildTarget, RuleKey>>,
  appendables: Mutex<HashMap<usize, (Arc<dyn RuleKeyAppendable>, RuleKey)>>,
}

impl RuleKeyCache {
  pub fn new() -> Self {
    RuleKeyCache::default()
  }

  /// The memoized key for a target, if already computed.
  pub fn rule_key(&self, target: &BuildTarget) -> Option<RuleKey> {
    self.rules.lock().unwrap().get(target).copied()
  }

  pub(crate) fn store_rule_key(&self, target: BuildTarget, key: RuleKey) {
    self.rules.lock().unwrap().entry(target).or_insert(key);
  }

  pub(crate) fn appendable_key(&self, appendable: &Arc<dyn RuleKeyAppendable>) -> Option<RuleKey> {
    self
      .appendables
      .lock()
      .unwrap()
      .get(&appendable_addr(appendable))
      .map(|(_, key)| *key)
  }

  pub(crate) fn store_appendable_key(
    &self,
    appendable: Arc<dyn RuleKeyAppendable>,
    key: RuleKey,
  ) {
    let addr = appendable_addr(&appendable);
    self
      .appendables
      .lock()
      .unwrap()
      .entry(addr)
      .or_insert((appendable, key));
  }

  /// Number of memoized rule keys.
  pub fn len(&self) -> usize {
    self.rules.lock().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.lock().unwrap().is_empty()
  }
}
