//! Build target identity.
//!
//! A [`BuildTarget`] is the canonicalized fully-qualified name of a build
//! rule: a namespace, a name, and an ordered flavor set. Identity is the
//! fully-qualified string, which is also exactly what the classifier absorbs
//! when a target participates in a rule key.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing the textual form of a build target.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetParseError {
  #[error("target '{0}' has no ':' separating namespace and name")]
  MissingSeparator(String),

  #[error("target '{0}' has an empty name")]
  EmptyName(String),

  #[error("target '{0}' has an empty flavor")]
  EmptyFlavor(String),
}

/// A canonicalized fully-qualified rule name.
///
/// The textual form is `{namespace}:{name}` with `#flavor,flavor` appended
/// when flavors are present. Flavors are kept in a [`BTreeSet`] so the
/// rendering is independent of declaration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildTarget {
  namespace: String,
  name: String,
  flavors: BTreeSet<String>,
}

impl BuildTarget {
  pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
    BuildTarget {
      namespace: namespace.into(),
      name: name.into(),
      flavors: BTreeSet::new(),
    }
  }

  /// Add flavors, keeping the set ordered regardless of insertion order.
  pub fn with_flavors<I, S>(mut self, flavors: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.flavors.extend(flavors.into_iter().map(Into::into));
    self
  }

  /// Parse the `{namespace}:{name}#{flavors}` textual form.
  pub fn parse(s: &str) -> Result<Self, TargetParseError> {
    let (body, flavor_part) = match s.split_once('#') {
      Some((body, flavors)) => (body, Some(flavors)),
      None => (s, None),
    };

    let (namespace, name) = body
      .split_once(':')
      .ok_or_else(|| TargetParseError::MissingSeparator(s.to_string()))?;
    if name.is_empty() {
      return Err(TargetParseError::EmptyName(s.to_string()));
    }

    let mut target = BuildTarget::new(namespace, name);
    if let Some(flavor_part) = flavor_part {
      for flavor in flavor_part.split(',') {
        if flavor.is_empty() {
          return Err(TargetParseError::EmptyFlavor(s.to_string()));
        }
        target.flavors.insert(flavor.to_string());
      }
    }
    Ok(target)
  }

  pub fn namespace(&self) -> &str {
    &self.namespace
  }

  pub fn short_name(&self) -> &str {
    &self.name
  }

  pub fn flavors(&self) -> impl Iterator<Item = &str> {
    self.flavors.iter().map(String::as_str)
  }

  /// The canonical identity string.
  pub fn fully_qualified_name(&self) -> String {
    let mut fqn = format!("{}:{}", self.namespace, self.name);
    if !self.flavors.is_empty() {
      fqn.push('#');
      let flavors: Vec<&str> = self.flavors.iter().map(String::as_str).collect();
      fqn.push_str(&flavors.join(","));
    }
    fqn
  }
}

impl fmt::Display for BuildTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.fully_qualified_name())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fully_qualified_name_without_flavors() {
    let target = BuildTarget::new("//native/strip", "liba");
    assert_eq!(target.fully_qualified_name(), "//native/strip:liba");
  }

  #[test]
  fn flavors_render_sorted() {
    let target = BuildTarget::new("//jvm", "docs").with_flavors(["zip", "archive"]);
    assert_eq!(target.fully_qualified_name(), "//jvm:docs#archive,zip");
  }

  #[test]
  fn flavor_order_does_not_change_identity() {
    let a = BuildTarget::new("//jvm", "docs").with_flavors(["a", "b"]);
    let b = BuildTarget::new("//jvm", "docs").with_flavors(["b", "a"]);
    assert_eq!(a, b);
    assert_eq!(a.fully_qualified_name(), b.fully_qualified_name());
  }

  #[test]
  fn parse_roundtrip() {
    let target = BuildTarget::parse("//jvm:docs#archive,zip").unwrap();
    assert_eq!(target.namespace(), "//jvm");
    assert_eq!(target.short_name(), "docs");
    assert_eq!(target.flavors().collect::<Vec<_>>(), vec!["archive", "zip"]);
    assert_eq!(target.fully_qualified_name(), "//jvm:docs#archive,zip");
  }

  #[test]
  fn parse_rejects_missing_separator() {
    assert_eq!(
      BuildTarget::parse("no-colon"),
      Err(TargetParseError::MissingSeparator("no-colon".to_string()))
    );
  }

  #[test]
  fn parse_rejects_empty_name_and_flavor() {
    assert!(matches!(
      BuildTarget::parse("//jvm:"),
      Err(TargetParseError::EmptyName(_))
    ));
    assert!(matches!(
      BuildTarget::parse("//jvm:docs#a,,b"),
      Err(TargetParseError::EmptyFlavor(_))
    ));
  }
}
