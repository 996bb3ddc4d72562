//! Source path handles.
//!
//! A [`SourcePath`] is a *typed* handle to a file input. The four variants
//! disambiguate what a bare filesystem path cannot: whether the file sits in
//! the workspace, is produced by another rule, lives inside an archive, or
//! is an opaque resource. The classifier refuses bare paths precisely
//! because this distinction changes what a rule key must contain.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::target::BuildTarget;

/// A typed handle to a file input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourcePath {
  /// A plain filesystem location, absolute or workspace-relative.
  Filesystem(PathBuf),
  /// The primary output of the rule building `target`.
  RuleOutput(BuildTarget),
  /// A member inside an archive, which is itself a source path.
  ArchiveMember {
    archive: Box<SourcePath>,
    member: PathBuf,
  },
  /// An opaque resource identifier. Participates in identity only, never in
  /// content hashing.
  Resource(String),
}

impl SourcePath {
  pub fn filesystem(path: impl Into<PathBuf>) -> Self {
    SourcePath::Filesystem(path.into())
  }

  pub fn rule_output(target: BuildTarget) -> Self {
    SourcePath::RuleOutput(target)
  }

  pub fn archive_member(archive: SourcePath, member: impl Into<PathBuf>) -> Self {
    SourcePath::ArchiveMember {
      archive: Box::new(archive),
      member: member.into(),
    }
  }

  pub fn resource(identifier: impl Into<String>) -> Self {
    SourcePath::Resource(identifier.into())
  }
}

impl fmt::Display for SourcePath {
  /// The textual identity the classifier absorbs for this handle.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SourcePath::Filesystem(path) => write!(f, "{}", path.display()),
      SourcePath::RuleOutput(target) => write!(f, "{}", target),
      SourcePath::ArchiveMember { archive, member } => {
        write!(f, "{}!/{}", archive, member.display())
      }
      SourcePath::Resource(identifier) => write!(f, "{}", identifier),
    }
  }
}

/// An archive location paired with the member inside it.
///
/// Produced by the resolver in absolute and workspace-relative form; the
/// relative form is what a rule key absorbs, the absolute form is what the
/// file-hash oracle reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveMemberPath {
  pub archive: PathBuf,
  pub member: PathBuf,
}

impl ArchiveMemberPath {
  pub fn new(archive: impl Into<PathBuf>, member: impl Into<PathBuf>) -> Self {
    ArchiveMemberPath {
      archive: archive.into(),
      member: member.into(),
    }
  }

  pub fn is_absolute(&self) -> bool {
    self.archive.is_absolute()
  }
}

impl fmt::Display for ArchiveMemberPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}!/{}", self.archive.display(), self.member.display())
  }
}

/// A source path paired with the ordered flag strings that apply to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceWithFlags {
  source: SourcePath,
  flags: Vec<String>,
}

impl SourceWithFlags {
  pub fn new<I, S>(source: SourcePath, flags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    SourceWithFlags {
      source,
      flags: flags.into_iter().map(Into::into).collect(),
    }
  }

  pub fn source(&self) -> &SourcePath {
    &self.source
  }

  pub fn flags(&self) -> &[String] {
    &self.flags
  }
}

/// A named root directory for source lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRoot(String);

impl SourceRoot {
  pub fn new(name: impl Into<String>) -> Self {
    SourceRoot(name.into())
  }

  pub fn name(&self) -> &str {
    &self.0
  }
}

impl AsRef<Path> for SourceRoot {
  fn as_ref(&self) -> &Path {
    Path::new(&self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn filesystem_identity_is_the_path() {
    let sp = SourcePath::filesystem("src/lib/Foo.java");
    assert_eq!(sp.to_string(), "src/lib/Foo.java");
  }

  #[test]
  fn rule_output_identity_is_the_target() {
    let sp = SourcePath::rule_output(BuildTarget::new("//jvm", "docs"));
    assert_eq!(sp.to_string(), "//jvm:docs");
  }

  #[test]
  fn archive_member_identity_nests() {
    let sp = SourcePath::archive_member(
      SourcePath::filesystem("lib/rt.jar"),
      "java/lang/Object.class",
    );
    assert_eq!(sp.to_string(), "lib/rt.jar!/java/lang/Object.class");
  }

  #[test]
  fn archive_member_path_display_and_absoluteness() {
    let relative = ArchiveMemberPath::new("lib/rt.jar", "Object.class");
    assert!(!relative.is_absolute());
    assert_eq!(relative.to_string(), "lib/rt.jar!/Object.class");

    let absolute = ArchiveMemberPath::new("/ws/lib/rt.jar", "Object.class");
    assert!(absolute.is_absolute());
  }

  #[test]
  fn source_with_flags_preserves_flag_order() {
    let swf = SourceWithFlags::new(SourcePath::filesystem("a.c"), ["-O2", "-g"]);
    assert_eq!(swf.flags(), &["-O2".to_string(), "-g".to_string()]);
  }
}
