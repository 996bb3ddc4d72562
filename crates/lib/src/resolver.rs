//! Source-path resolution.
//!
//! Maps symbolic [`SourcePath`] handles to concrete locations: an absolute
//! filesystem path for the oracle, a workspace-relative path for the key,
//! and (for rule-output paths) the originating rule. Immutable after
//! construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::RuleKeyError;
use crate::rule::{BuildRule, RuleLookup};
use crate::source::{ArchiveMemberPath, SourcePath};
use crate::target::BuildTarget;

pub struct SourcePathResolver {
  workspace_root: PathBuf,
  rules: Arc<dyn RuleLookup>,
}

impl SourcePathResolver {
  pub fn new(workspace_root: impl Into<PathBuf>, rules: Arc<dyn RuleLookup>) -> Self {
    SourcePathResolver {
      workspace_root: workspace_root.into(),
      rules,
    }
  }

  pub fn workspace_root(&self) -> &Path {
    &self.workspace_root
  }

  fn rule_for(&self, target: &BuildTarget) -> Result<Arc<dyn BuildRule>, RuleKeyError> {
    self
      .rules
      .rule(target)
      .ok_or_else(|| RuleKeyError::UnknownRule(target.clone()))
  }

  /// Resolve to an absolute filesystem path.
  pub fn absolute_path(&self, source: &SourcePath) -> Result<PathBuf, RuleKeyError> {
    match source {
      SourcePath::Filesystem(path) => {
        if path.is_absolute() {
          Ok(path.clone())
        } else {
          Ok(self.workspace_root.join(path))
        }
      }
      SourcePath::RuleOutput(target) => {
        let rule = self.rule_for(target)?;
        let output = rule.output().ok_or_else(|| {
          RuleKeyError::UnsupportedValue(format!("rule {target} declares no output path"))
        })?;
        Ok(self.workspace_root.join(output))
      }
      SourcePath::ArchiveMember { archive, .. } => self.absolute_path(archive),
      SourcePath::Resource(identifier) => Err(RuleKeyError::UnsupportedValue(format!(
        "resource '{identifier}' has no filesystem location"
      ))),
    }
  }

  /// Resolve to a workspace-relative path, or `None` when the location
  /// escapes the workspace root (the caller then falls back to the file
  /// name, so that tool locations do not bleed into keys).
  pub fn relative_path(&self, source: &SourcePath) -> Result<Option<PathBuf>, RuleKeyError> {
    match source {
      SourcePath::Filesystem(path) => {
        if path.is_relative() {
          Ok(Some(path.clone()))
        } else {
          Ok(
            path
              .strip_prefix(&self.workspace_root)
              .ok()
              .map(Path::to_path_buf),
          )
        }
      }
      SourcePath::RuleOutput(target) => Ok(self.rule_for(target)?.output()),
      SourcePath::ArchiveMember { archive, .. } => self.relative_path(archive),
      SourcePath::Resource(_) => Ok(None),
    }
  }

  /// The rule producing a rule-output source path.
  pub fn owning_rule(&self, source: &SourcePath) -> Option<Arc<dyn BuildRule>> {
    match source {
      SourcePath::RuleOutput(target) => self.rules.rule(target),
      _ => None,
    }
  }

  /// Resolve an archive member to its absolute and workspace-relative
  /// forms. An archive that cannot be made workspace-relative has no valid
  /// relative form, which is a programmer error.
  pub fn archive_member_paths(
    &self,
    archive: &SourcePath,
    member: &Path,
  ) -> Result<(ArchiveMemberPath, ArchiveMemberPath), RuleKeyError> {
    let absolute = ArchiveMemberPath::new(self.absolute_path(archive)?, member);
    let relative_archive = self.relative_path(archive)?.ok_or_else(|| {
      RuleKeyError::InvalidArchiveMemberPaths(format!(
        "archive {} cannot be made workspace-relative",
        absolute.archive.display()
      ))
    })?;
    Ok((absolute, ArchiveMemberPath::new(relative_archive, member)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builder::RuleKeyBuilder;
  use crate::rule::RuleIndex;

  struct FixtureRule {
    target: BuildTarget,
    output: PathBuf,
  }

  impl BuildRule for FixtureRule {
    fn target(&self) -> &BuildTarget {
      &self.target
    }

    fn rule_type(&self) -> &str {
      "fixture"
    }

    fn output(&self) -> Option<PathBuf> {
      Some(self.output.clone())
    }

    fn append_inputs(&self, _builder: &mut RuleKeyBuilder<'_>) -> Result<(), RuleKeyError> {
      Ok(())
    }
  }

  fn resolver_with_rule() -> (SourcePathResolver, BuildTarget) {
    let target = BuildTarget::new("//jvm", "docs");
    let mut index = RuleIndex::new();
    index.insert(Arc::new(FixtureRule {
      target: target.clone(),
      output: PathBuf::from("out/jvm/docs.jar"),
    }));
    (SourcePathResolver::new("/ws", Arc::new(index)), target)
  }

  #[test]
  fn relative_filesystem_path_joins_workspace_root() {
    let (resolver, _) = resolver_with_rule();
    let sp = SourcePath::filesystem("src/Foo.java");

    assert_eq!(
      resolver.absolute_path(&sp).unwrap(),
      PathBuf::from("/ws/src/Foo.java")
    );
    assert_eq!(
      resolver.relative_path(&sp).unwrap(),
      Some(PathBuf::from("src/Foo.java"))
    );
  }

  #[test]
  fn absolute_path_inside_workspace_relativizes() {
    let (resolver, _) = resolver_with_rule();
    let sp = SourcePath::filesystem("/ws/src/Foo.java");

    assert_eq!(
      resolver.relative_path(&sp).unwrap(),
      Some(PathBuf::from("src/Foo.java"))
    );
  }

  #[test]
  fn path_outside_workspace_has_no_relative_form() {
    let (resolver, _) = resolver_with_rule();
    let sp = SourcePath::filesystem("/usr/bin/strip");

    assert_eq!(resolver.relative_path(&sp).unwrap(), None);
    assert_eq!(
      resolver.absolute_path(&sp).unwrap(),
      PathBuf::from("/usr/bin/strip")
    );
  }

  #[test]
  fn rule_output_resolves_through_the_rule() {
    let (resolver, target) = resolver_with_rule();
    let sp = SourcePath::rule_output(target);

    assert_eq!(
      resolver.absolute_path(&sp).unwrap(),
      PathBuf::from("/ws/out/jvm/docs.jar")
    );
    assert_eq!(
      resolver.relative_path(&sp).unwrap(),
      Some(PathBuf::from("out/jvm/docs.jar"))
    );
    assert!(resolver.owning_rule(&sp).is_some());
  }

  #[test]
  fn unknown_rule_output_is_an_error() {
    let (resolver, _) = resolver_with_rule();
    let sp = SourcePath::rule_output(BuildTarget::new("//jvm", "missing"));

    assert!(matches!(
      resolver.absolute_path(&sp),
      Err(RuleKeyError::UnknownRule(_))
    ));
  }

  #[test]
  fn archive_member_paths_resolve_both_forms() {
    let (resolver, _) = resolver_with_rule();
    let archive = SourcePath::filesystem("lib/rt.jar");
    let (absolute, relative) = resolver
      .archive_member_paths(&archive, Path::new("Object.class"))
      .unwrap();

    assert!(absolute.is_absolute());
    assert_eq!(absolute.archive, PathBuf::from("/ws/lib/rt.jar"));
    assert!(!relative.is_absolute());
    assert_eq!(relative.archive, PathBuf::from("lib/rt.jar"));
  }

  #[test]
  fn archive_outside_workspace_is_invalid() {
    let (resolver, _) = resolver_with_rule();
    let archive = SourcePath::filesystem("/opt/jdk/rt.jar");

    assert!(matches!(
      resolver.archive_member_paths(&archive, Path::new("Object.class")),
      Err(RuleKeyError::InvalidArchiveMemberPaths(_))
    ));
  }

  #[test]
  fn resource_has_no_location() {
    let (resolver, _) = resolver_with_rule();
    let sp = SourcePath::resource("generated:icons");

    assert!(matches!(
      resolver.absolute_path(&sp),
      Err(RuleKeyError::UnsupportedValue(_))
    ));
    assert_eq!(resolver.relative_path(&sp).unwrap(), None);
  }
}
