//! The file-hash oracle.
//!
//! The oracle is the sole authority on file content identity for the
//! duration of a build: once it has answered for an (absolute path, content)
//! pair, the answer never changes. A missing answer is fatal upstream
//! ([`MissingFileHash`](crate::error::RuleKeyError::MissingFileHash)).

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rulekey_core::{Sha1HashCode, hash_file, hash_reader};
use tracing::debug;

use crate::source::ArchiveMemberPath;

/// Authority mapping absolute paths (and archive members) to content
/// digests.
pub trait FileHashOracle: Send + Sync {
  /// The content digest of the file at an absolute path, if known.
  fn file_digest(&self, path: &Path) -> Option<Sha1HashCode>;

  /// The content digest of a member inside an archive, if known.
  fn archive_member_digest(&self, path: &ArchiveMemberPath) -> Option<Sha1HashCode>;
}

/// Thread-safe compute-once cache over on-disk content.
///
/// Digests are computed on first request by streaming the file (or the
/// archive member, through the zip reader) and are then immutable for the
/// lifetime of the cache. Known digests can be seeded with
/// [`preload`](FileHashCache::preload) so a build can reuse an external
/// hash store without touching the disk.
#[derive(Default)]
pub struct FileHashCache {
  files: Mutex<HashMap<PathBuf, Sha1HashCode>>,
  members: Mutex<HashMap<(PathBuf, PathBuf), Sha1HashCode>>,
}

impl FileHashCache {
  pub fn new() -> Self {
    FileHashCache::default()
  }

  /// Seed a precomputed file digest.
  pub fn preload(&self, path: impl Into<PathBuf>, digest: Sha1HashCode) {
    self.files.lock().unwrap().insert(path.into(), digest);
  }

  /// Seed a precomputed archive-member digest.
  pub fn preload_member(
    &self,
    archive: impl Into<PathBuf>,
    member: impl Into<PathBuf>,
    digest: Sha1HashCode,
  ) {
    self
      .members
      .lock()
      .unwrap()
      .insert((archive.into(), member.into()), digest);
  }

  fn compute_member_digest(&self, path: &ArchiveMemberPath) -> Option<Sha1HashCode> {
    let file = match File::open(&path.archive) {
      Ok(file) => file,
      Err(err) => {
        debug!(archive = %path.archive.display(), %err, "failed to open archive");
        return None;
      }
    };
    let mut archive = match zip::ZipArchive::new(file) {
      Ok(archive) => archive,
      Err(err) => {
        debug!(archive = %path.archive.display(), %err, "failed to read archive");
        return None;
      }
    };
    // Zip member names always use forward slashes.
    let member_name = path.member.to_string_lossy().replace('\\', "/");
    let entry = match archive.by_name(&member_name) {
      Ok(entry) => entry,
      Err(err) => {
        debug!(member = %member_name, %err, "archive member not found");
        return None;
      }
    };
    match hash_reader(entry) {
      Ok(digest) => Some(digest),
      Err(err) => {
        debug!(member = %member_name, %err, "failed to hash archive member");
        None
      }
    }
  }
}

impl FileHashOracle for FileHashCache {
  fn file_digest(&self, path: &Path) -> Option<Sha1HashCode> {
    if let Some(digest) = self.files.lock().unwrap().get(path) {
      return Some(*digest);
    }
    let digest = match hash_file(path) {
      Ok(digest) => digest,
      Err(err) => {
        debug!(path = %path.display(), %err, "failed to hash file");
        return None;
      }
    };
    self.files.lock().unwrap().insert(path.to_path_buf(), digest);
    Some(digest)
  }

  fn archive_member_digest(&self, path: &ArchiveMemberPath) -> Option<Sha1HashCode> {
    let key = (path.archive.clone(), path.member.clone());
    if let Some(digest) = self.members.lock().unwrap().get(&key) {
      return Some(*digest);
    }
    let digest = self.compute_member_digest(path)?;
    self.members.lock().unwrap().insert(key, digest);
    Some(digest)
  }
}
