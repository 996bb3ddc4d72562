//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use rulekey_core::DigestSink;
use rulekey_lib::RuleKey;
use rulekey_lib::builder::{RuleKeyBuilder, RuleKeyFactory};
use rulekey_lib::error::RuleKeyError;
use rulekey_lib::oracle::FileHashCache;
use rulekey_lib::resolver::SourcePathResolver;
use rulekey_lib::rule::{BuildRule, RuleIndex};
use rulekey_lib::target::BuildTarget;
use rulekey_lib::value::Value;

pub const WORKSPACE: &str = "/ws";

/// A rule whose declared inputs are a literal list of `(field, value)` pairs.
pub struct TestRule {
  pub target: BuildTarget,
  pub rule_type: &'static str,
  pub output: Option<PathBuf>,
  pub inputs: Vec<(&'static str, Value)>,
}

impl TestRule {
  pub fn new(target: BuildTarget, inputs: Vec<(&'static str, Value)>) -> Self {
    TestRule {
      target,
      rule_type: "test_rule",
      output: None,
      inputs,
    }
  }

  pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
    self.output = Some(output.into());
    self
  }
}

impl BuildRule for TestRule {
  fn target(&self) -> &BuildTarget {
    &self.target
  }

  fn rule_type(&self) -> &str {
    self.rule_type
  }

  fn output(&self) -> Option<PathBuf> {
    self.output.clone()
  }

  fn append_inputs(&self, builder: &mut RuleKeyBuilder<'_>) -> Result<(), RuleKeyError> {
    for (name, value) in &self.inputs {
      builder.set_reflectively(name, value)?;
    }
    Ok(())
  }
}

/// A factory over an empty workspace with no rules.
pub fn factory() -> RuleKeyFactory {
  factory_with(Arc::new(FileHashCache::new()), RuleIndex::new())
}

pub fn factory_with(oracle: Arc<FileHashCache>, rules: RuleIndex) -> RuleKeyFactory {
  let resolver = SourcePathResolver::new(WORKSPACE, Arc::new(rules));
  RuleKeyFactory::new(resolver, oracle)
}

/// The digest of a hand-assembled byte stream.
pub fn expect_stream(assemble: impl FnOnce(&mut DigestSink)) -> RuleKey {
  let mut sink = DigestSink::new();
  assemble(&mut sink);
  sink.finalize()
}

/// Absorb a string atom followed by the separator.
pub fn feed(sink: &mut DigestSink, s: &str) {
  sink.absorb_str(s);
  sink.absorb_separator();
}
