//! The rule-graph seam.
//!
//! The rule graph itself lives outside this crate; these traits are the
//! contract it implements so the engine can resolve transitive rule
//! identity. Rules form a DAG — a cycle is detected during resolution and
//! reported as [`CyclicRuleGraph`](crate::error::RuleKeyError::CyclicRuleGraph).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::builder::RuleKeyBuilder;
use crate::error::RuleKeyError;
use crate::target::BuildTarget;

/// A sub-structure that contributes its own sub-key rather than inlining
/// its fields into the enclosing rule key.
pub trait RuleKeyAppendable: Send + Sync {
  /// Drive a fresh builder with this structure's contribution.
  fn append_to(&self, builder: &mut RuleKeyBuilder<'_>) -> Result<(), RuleKeyError>;
}

/// A build rule whose declared inputs determine its rule key.
pub trait BuildRule: Send + Sync {
  fn target(&self) -> &BuildTarget;

  /// The rule type name (e.g. `strip`, `javadoc_jar`, `kotlin_library`).
  fn rule_type(&self) -> &str;

  /// The workspace-relative path this rule writes its primary output to,
  /// if it produces one.
  fn output(&self) -> Option<PathBuf> {
    None
  }

  /// Contribute the declared inputs to a builder. The rule's key depends on
  /// these calls, and on the keys of rules they transitively reference, and
  /// on nothing else.
  fn append_inputs(&self, builder: &mut RuleKeyBuilder<'_>) -> Result<(), RuleKeyError>;

  /// A rule that is also appendable contributes a derived sub-key in
  /// addition to its own rule key.
  fn as_appendable(&self) -> Option<&dyn RuleKeyAppendable> {
    None
  }
}

/// Lookup from a build target to the rule producing it.
pub trait RuleLookup: Send + Sync {
  fn rule(&self, target: &BuildTarget) -> Option<Arc<dyn BuildRule>>;
}

/// Map-backed [`RuleLookup`] for small builds and tests.
#[derive(Default)]
pub struct RuleIndex {
  rules: HashMap<BuildTarget, Arc<dyn BuildRule>>,
}

impl RuleIndex {
  pub fn new() -> Self {
    RuleIndex::default()
  }

  pub fn insert(&mut self, rule: Arc<dyn BuildRule>) {
    self.rules.insert(rule.target().clone(), rule);
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }
}

impl RuleLookup for RuleIndex {
  fn rule(&self, target: &BuildTarget) -> Option<Arc<dyn BuildRule>> {
    self.rules.get(target).cloned()
  }
}
