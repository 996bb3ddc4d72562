//! The rule-key builder.
//!
//! [`RuleKeyFactory`] holds the per-build collaborators (path resolver,
//! file-hash oracle, memoized keys, observer) and hands out single-use
//! [`RuleKeyBuilder`]s. A builder accepts a keyed stream of
//! `(field name, value)` pairs, routes each value through its canonical
//! encoding, and finalizes into a [`RuleKey`].
//!
//! Field names are emitted lazily through the key-context stack: a name is
//! absorbed once, immediately before the first primitive it qualifies.
//! Values set consecutively under the same name share that one emission, so
//! a sequence hashes identically to its elements set one by one, and an
//! empty collection contributes nothing at all. Map entries deliberately
//! re-open the shared name per component so that `{a -> 1}` and `{1 -> a}`
//! cannot collide.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rulekey_core::{DigestSink, RuleKey, Sha1HashCode};
use tracing::warn;

use crate::cache::RuleKeyCache;
use crate::error::RuleKeyError;
use crate::logger::{NullRuleKeyLogger, RuleKeyLogger};
use crate::oracle::FileHashOracle;
use crate::resolver::SourcePathResolver;
use crate::rule::{BuildRule, RuleKeyAppendable};
use crate::source::SourcePath;
use crate::target::BuildTarget;
use crate::value::{EitherValue, Value};

/// Configuration for rule-key computation.
#[derive(Debug, Clone)]
pub struct FactoryConfig {
  /// Fail with `UnorderedCollection` when an unordered map or set is
  /// admitted, instead of hashing it in iteration order. Disabling this is
  /// a compatibility escape hatch; the warning is emitted either way.
  pub strict_collections: bool,
}

impl Default for FactoryConfig {
  fn default() -> Self {
    FactoryConfig {
      strict_collections: true,
    }
  }
}

/// Shared collaborators for rule-key computation within one build.
///
/// Created at build start, dropped at build end. The factory is `Sync`;
/// builders are not shared across threads.
pub struct RuleKeyFactory {
  resolver: SourcePathResolver,
  oracle: Arc<dyn FileHashOracle>,
  cache: RuleKeyCache,
  logger: Arc<dyn RuleKeyLogger>,
  config: FactoryConfig,
}

impl RuleKeyFactory {
  pub fn new(resolver: SourcePathResolver, oracle: Arc<dyn FileHashOracle>) -> Self {
    RuleKeyFactory {
      resolver,
      oracle,
      cache: RuleKeyCache::new(),
      logger: Arc::new(NullRuleKeyLogger),
      config: FactoryConfig::default(),
    }
  }

  pub fn with_logger(mut self, logger: Arc<dyn RuleKeyLogger>) -> Self {
    self.logger = logger;
    self
  }

  pub fn with_config(mut self, config: FactoryConfig) -> Self {
    self.config = config;
    self
  }

  pub fn resolver(&self) -> &SourcePathResolver {
    &self.resolver
  }

  pub fn cache(&self) -> &RuleKeyCache {
    &self.cache
  }

  /// A fresh builder for one keying request.
  pub fn builder(&self) -> RuleKeyBuilder<'_> {
    RuleKeyBuilder::new(self)
  }

  /// The memoized rule key for `rule`, computing it (and the keys of rules
  /// it transitively references) if needed.
  pub fn rule_key(&self, rule: &dyn BuildRule) -> Result<RuleKey, RuleKeyError> {
    let mut scratch = self.builder();
    scratch.resolve_rule_key(rule)
  }
}

/// Deferred emission of field-name qualifiers.
///
/// `stack[..emitted]` has been absorbed, `stack[emitted..depth]` is pending,
/// and anything past `depth` is a stale entry from an exited scope. Stale
/// emitted entries are what make a sibling re-push of the same name free:
/// the name was already absorbed and is not absorbed again.
struct KeyContext {
  stack: Vec<String>,
  emitted: usize,
  depth: usize,
}

impl KeyContext {
  fn new() -> Self {
    KeyContext {
      stack: Vec::new(),
      emitted: 0,
      depth: 0,
    }
  }

  fn push(&mut self, name: &str) {
    if self.depth < self.stack.len() && self.emitted > self.depth && self.stack[self.depth] == name
    {
      // The same name was already emitted at this depth.
      self.depth += 1;
      return;
    }
    self.stack.truncate(self.depth);
    self.emitted = self.emitted.min(self.depth);
    self.stack.push(name.to_string());
    self.depth += 1;
  }

  fn pop(&mut self) {
    self.depth -= 1;
  }

  /// Pop and forget the entry, so the next push of the same name is
  /// absorbed again. Map entry components use this.
  fn pop_reset(&mut self) {
    self.depth -= 1;
    self.stack.truncate(self.depth);
    self.emitted = self.emitted.min(self.depth);
  }

  /// Absorb the pending names, most recently pushed first, each followed by
  /// a separator. Nothing is pending when every entry up to the current
  /// depth has been emitted already (stale entries from exited scopes sit
  /// past the depth and are never re-absorbed).
  fn drain(&mut self, sink: &mut DigestSink) {
    if self.emitted >= self.depth {
      return;
    }
    for name in self.stack[self.emitted..self.depth].iter().rev() {
      sink.absorb_str(name);
      sink.absorb_separator();
    }
    self.emitted = self.depth;
  }
}

/// Token returned by [`RuleKeyBuilder::push_field`]; hand it back to
/// [`RuleKeyBuilder::pop_field`] to restore the prior context.
#[must_use]
pub struct KeyScope {
  depth: usize,
}

/// Single-use builder of one rule key.
///
/// Fed in a single-threaded fashion and finalized exactly once. A failed
/// `set` poisons the builder: the partial digest can never be observed.
pub struct RuleKeyBuilder<'a> {
  factory: &'a RuleKeyFactory,
  sink: DigestSink,
  ctx: KeyContext,
  in_flight: HashSet<BuildTarget>,
  poisoned: bool,
}

impl<'a> std::fmt::Debug for RuleKeyBuilder<'a> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RuleKeyBuilder")
      .field("poisoned", &self.poisoned)
      .finish_non_exhaustive()
  }
}

impl<'a> RuleKeyBuilder<'a> {
  fn new(factory: &'a RuleKeyFactory) -> Self {
    RuleKeyBuilder {
      factory,
      sink: DigestSink::new(),
      ctx: KeyContext::new(),
      in_flight: HashSet::new(),
      poisoned: false,
    }
  }

  /// Push a field name onto the key context.
  pub fn push_field(&mut self, name: &str) -> KeyScope {
    let scope = KeyScope {
      depth: self.ctx.depth,
    };
    self.factory.logger.push_key(name);
    self.ctx.push(name);
    scope
  }

  /// Pop back to the context recorded by [`push_field`](Self::push_field).
  pub fn pop_field(&mut self, scope: KeyScope) {
    while self.ctx.depth > scope.depth {
      self.ctx.pop();
      self.factory.logger.pop_scope();
    }
  }

  /// Set a field. Alias for [`set_reflectively`](Self::set_reflectively).
  pub fn set(&mut self, name: &str, value: &Value) -> Result<&mut Self, RuleKeyError> {
    self.set_reflectively(name, value)
  }

  /// The public entry point: dispatch `value` to its canonical encoding
  /// under the field `name`.
  pub fn set_reflectively(
    &mut self,
    name: &str,
    value: &Value,
  ) -> Result<&mut Self, RuleKeyError> {
    if self.poisoned {
      return Err(RuleKeyError::BuilderPoisoned);
    }
    match self.set_inner(name, value, false) {
      Ok(()) => Ok(self),
      Err(err) => {
        self.poisoned = true;
        Err(err)
      }
    }
  }

  /// Consume the builder and produce the rule key.
  pub fn finalize(mut self) -> Result<RuleKey, RuleKeyError> {
    if self.poisoned {
      return Err(RuleKeyError::BuilderPoisoned);
    }
    // Balanced set calls leave nothing pending; this is a no-op then.
    self.ctx.drain(&mut self.sink);
    let key = self.sink.finalize();
    self.factory.logger.registered_rule_key(&key);
    Ok(key)
  }

  fn set_inner(
    &mut self,
    name: &str,
    value: &Value,
    reset_scope: bool,
  ) -> Result<(), RuleKeyError> {
    match value {
      // Appendables contribute a derived sub-key instead of their fields.
      Value::Appendable(appendable) => {
        let sub_key = self.appendable_sub_key(appendable)?;
        return self.set_inner(
          &format!("{name}.appendableSubKey"),
          &Value::Key(sub_key),
          reset_scope,
        );
      }
      // A rule that is also appendable contributes both; fall through so
      // its own rule key is absorbed as well.
      Value::Rule(rule) => {
        if let Some(facet) = rule.as_appendable() {
          let sub_key = self.sub_key(|sub| facet.append_to(sub))?;
          self.set_inner(
            &format!("{name}.appendableSubKey"),
            &Value::Key(sub_key),
            reset_scope,
          )?;
        }
      }
      // Options unwrap before any context is opened.
      Value::Opt(inner) => {
        return match inner {
          Some(value) => self.set_inner(name, value, reset_scope),
          None => self.set_inner(name, &Value::Null, reset_scope),
        };
      }
      _ => {}
    }

    self.factory.logger.push_key(name);
    self.ctx.push(name);
    let result = self.classify(name, value);
    if reset_scope {
      self.ctx.pop_reset();
    } else {
      self.ctx.pop();
    }
    self.factory.logger.pop_scope();
    result
  }

  /// Encode one collection element under the shared field name, inheriting
  /// the enclosing scope instead of opening a new one.
  fn element(&mut self, name: &str, value: &Value) -> Result<(), RuleKeyError> {
    match value {
      Value::Appendable(appendable) => {
        let sub_key = self.appendable_sub_key(appendable)?;
        self.set_appendable_sibling(name, sub_key)
      }
      Value::Rule(rule) => {
        if let Some(facet) = rule.as_appendable() {
          let sub_key = self.sub_key(|sub| facet.append_to(sub))?;
          self.set_appendable_sibling(name, sub_key)?;
        }
        self.classify(name, value)
      }
      Value::Opt(Some(inner)) => self.element(name, inner),
      Value::Opt(None) => self.element(name, &Value::Null),
      _ => self.classify(name, value),
    }
  }

  /// Contribute an element's appendable sub-key under its derived sibling
  /// name. The enclosing field's pending scope is suspended for the
  /// duration, so the element produces the same byte stream as the
  /// appendable set as a sibling field: the collection's own name must not
  /// qualify the sub-key, and must still be emitted for a later element.
  fn set_appendable_sibling(&mut self, name: &str, sub_key: RuleKey) -> Result<(), RuleKeyError> {
    self.ctx.pop();
    let result = self.set_inner(
      &format!("{name}.appendableSubKey"),
      &Value::Key(sub_key),
      false,
    );
    self.ctx.push(name);
    result
  }

  /// Route a value to its canonical encoding.
  fn classify(&mut self, name: &str, value: &Value) -> Result<(), RuleKeyError> {
    match value {
      Value::Null => {
        self.factory.logger.null_value();
        self.feed_bytes(&[]);
        Ok(())
      }
      Value::Bool(v) => {
        self.factory.logger.added_value(v);
        self.feed_str(if *v { "t" } else { "f" });
        Ok(())
      }
      Value::I8(v) => {
        let v = *v;
        self.factory.logger.added_value(&v);
        self.feed_with(|sink| sink.absorb_i8(v));
        Ok(())
      }
      Value::I16(v) => {
        let v = *v;
        self.factory.logger.added_value(&v);
        self.feed_with(|sink| sink.absorb_i16(v));
        Ok(())
      }
      Value::I32(v) => {
        let v = *v;
        self.factory.logger.added_value(&v);
        self.feed_with(|sink| sink.absorb_i32(v));
        Ok(())
      }
      Value::I64(v) => {
        let v = *v;
        self.factory.logger.added_value(&v);
        self.feed_with(|sink| sink.absorb_i64(v));
        Ok(())
      }
      Value::F32(v) => {
        let v = *v;
        self.factory.logger.added_value(&v);
        self.feed_with(|sink| sink.absorb_f32(v));
        Ok(())
      }
      Value::F64(v) => {
        let v = *v;
        self.factory.logger.added_value(&v);
        self.feed_with(|sink| sink.absorb_f64(v));
        Ok(())
      }
      Value::Str(v) => {
        self.factory.logger.added_value(v);
        self.feed_str(v);
        Ok(())
      }
      Value::Regex(v) => {
        let source = v.as_str();
        self.factory.logger.added_value(&source);
        self.feed_str(source);
        Ok(())
      }
      Value::Bytes(v) => {
        self.factory.logger.added_value(&format!("{} bytes", v.len()));
        self.feed_bytes(v);
        Ok(())
      }
      Value::Enum(label) => {
        self.factory.logger.added_value(label);
        self.feed_str(label);
        Ok(())
      }
      Value::Target(target) => {
        self.factory.logger.added_value(target);
        self.feed_str(&target.fully_qualified_name());
        Ok(())
      }
      Value::RuleType(rule_type) => {
        self.factory.logger.added_value(rule_type);
        self.feed_str(rule_type);
        Ok(())
      }
      Value::Key(key) => {
        self.factory.logger.added_value(key);
        self.feed_str(&key.to_hex());
        Ok(())
      }
      Value::ContentHash(digest) => {
        self.factory.logger.added_value(digest);
        self.feed_bytes(digest.as_bytes());
        Ok(())
      }
      Value::SourceRoot(root) => {
        self.factory.logger.added_value(&root.name());
        self.feed_str(root.name());
        Ok(())
      }
      Value::Path(path) => Err(RuleKeyError::AmbiguousPath(path.clone())),
      Value::Source(source) => self.set_source_path(source),
      Value::NonHashingSource(source) => self.set_non_hashing_source_path(source),
      Value::SourceWithFlags(swf) => {
        self.factory.logger.push_source_with_flags();
        self.set_source_path(swf.source())?;
        self.feed_str("[");
        for flag in swf.flags() {
          self.factory.logger.added_value(flag);
          self.feed_str(flag);
          self.feed_str(",");
        }
        self.feed_str("]");
        self.factory.logger.pop_scope();
        Ok(())
      }
      Value::Rule(rule) => self.set_build_rule(rule.as_ref()),
      Value::Appendable(appendable) => {
        // Normally intercepted by `set_inner`/`element`; encode the bare
        // sub-key when reached directly.
        let sub_key = self.appendable_sub_key(appendable)?;
        self.feed_str(&sub_key.to_hex());
        Ok(())
      }
      Value::Seq(elems) => {
        for elem in elems {
          self.element(name, elem)?;
        }
        Ok(())
      }
      Value::Set { elems, sorted } => {
        self.check_ordered(name, "set", *sorted)?;
        for elem in elems {
          self.element(name, elem)?;
        }
        Ok(())
      }
      Value::Map { entries, sorted } => {
        self.check_ordered(name, "map", *sorted)?;
        self.set_map(name, entries)
      }
      Value::Lazy(thunk) => {
        let forced = thunk();
        self.element(name, &forced)
      }
      Value::Either(EitherValue::Left(inner) | EitherValue::Right(inner)) => {
        self.element(name, inner)
      }
      Value::Opt(Some(inner)) => self.element(name, inner),
      Value::Opt(None) => self.element(name, &Value::Null),
    }
  }

  fn check_ordered(
    &self,
    name: &str,
    kind: &'static str,
    sorted: bool,
  ) -> Result<(), RuleKeyError> {
    if sorted {
      return Ok(());
    }
    warn!(
      field = name,
      kind, "hashing an unordered {kind}; expect unstable ordering and cache misses"
    );
    if self.factory.config.strict_collections {
      return Err(RuleKeyError::UnorderedCollection {
        field: name.to_string(),
        kind,
      });
    }
    Ok(())
  }

  fn set_map(&mut self, name: &str, entries: &[(Value, Value)]) -> Result<(), RuleKeyError> {
    self.factory.logger.push_map();
    self.feed_str("{");
    for (key, value) in entries {
      self.factory.logger.push_map_key();
      self.set_inner(name, key, true)?;
      self.factory.logger.pop_scope();
      self.feed_str(" -> ");
      self.factory.logger.push_map_value();
      self.set_inner(name, value, true)?;
      self.factory.logger.pop_scope();
    }
    self.feed_str("}");
    self.factory.logger.pop_scope();
    Ok(())
  }

  fn set_source_path(&mut self, source: &SourcePath) -> Result<(), RuleKeyError> {
    match source {
      SourcePath::ArchiveMember { archive, member } => self.set_archive_member(archive, member),
      SourcePath::RuleOutput(target) => {
        let rule = self
          .factory
          .resolver
          .owning_rule(source)
          .ok_or_else(|| RuleKeyError::UnknownRule(target.clone()))?;
        self.feed_str(&source.to_string());
        self.set_build_rule(rule.as_ref())
      }
      _ => {
        let absolute = self.factory.resolver.absolute_path(source)?;
        let ideally_relative = self.factory.resolver.relative_path(source)?;
        let digest = self
          .factory
          .oracle
          .file_digest(&absolute)
          .ok_or_else(|| RuleKeyError::MissingFileHash(absolute.display().to_string()))?;
        self.set_path(&absolute, ideally_relative.as_deref(), digest)
      }
    }
  }

  // A path contributes its workspace-relative form plus its content digest.
  // When relativization failed we keep only the file name, so the location
  // of an out-of-workspace tool does not bleed into the key. Renaming such
  // a tool without changing its contents therefore misses the cache.
  fn set_path(
    &mut self,
    absolute: &Path,
    ideally_relative: Option<&Path>,
    digest: Sha1HashCode,
  ) -> Result<(), RuleKeyError> {
    let add_to_key = match ideally_relative {
      Some(relative) => relative.to_path_buf(),
      None => {
        warn!(
          path = %absolute.display(),
          "adding an absolute path to a rule key; only using the file name"
        );
        match absolute.file_name() {
          Some(file_name) => PathBuf::from(file_name),
          None => {
            return Err(RuleKeyError::UnsupportedValue(format!(
              "path {} has no file name",
              absolute.display()
            )));
          }
        }
      }
    };

    self.factory.logger.added_path(&add_to_key, &digest);
    self.feed_str(&add_to_key.display().to_string());
    self.feed_str(&digest.to_hex());
    Ok(())
  }

  fn set_non_hashing_source_path(&mut self, source: &SourcePath) -> Result<(), RuleKeyError> {
    let path_for_key = match source {
      SourcePath::Resource(identifier) => identifier.clone(),
      _ => match self.factory.resolver.relative_path(source)? {
        Some(relative) => relative.display().to_string(),
        None => {
          let absolute = self.factory.resolver.absolute_path(source)?;
          match absolute.file_name() {
            Some(file_name) => file_name.to_string_lossy().into_owned(),
            None => {
              return Err(RuleKeyError::UnsupportedValue(format!(
                "path {} has no file name",
                absolute.display()
              )));
            }
          }
        }
      },
    };

    self.factory.logger.added_non_hashing_path(&path_for_key);
    self.feed_str(&path_for_key);
    Ok(())
  }

  fn set_archive_member(
    &mut self,
    archive: &SourcePath,
    member: &Path,
  ) -> Result<(), RuleKeyError> {
    let (absolute, relative) = self.factory.resolver.archive_member_paths(archive, member)?;
    if !absolute.is_absolute() {
      return Err(RuleKeyError::InvalidArchiveMemberPaths(format!(
        "expected an absolute archive path, got {absolute}"
      )));
    }
    if relative.is_absolute() {
      return Err(RuleKeyError::InvalidArchiveMemberPaths(format!(
        "expected a relative archive path, got {relative}"
      )));
    }

    let digest = self
      .factory
      .oracle
      .archive_member_digest(&absolute)
      .ok_or_else(|| RuleKeyError::MissingFileHash(absolute.to_string()))?;

    self.factory.logger.added_archive_member(&relative, &digest);
    self.feed_str(&relative.to_string());
    self.feed_str(&digest.to_hex());
    Ok(())
  }

  // The rule's identity is absorbed immediately before its computed key so
  // two rules with identical inputs but different targets stay distinct.
  fn set_build_rule(&mut self, rule: &dyn BuildRule) -> Result<(), RuleKeyError> {
    let key = self.resolve_rule_key(rule)?;
    self.factory.logger.added_value(&key);
    self.feed_str(&rule.target().fully_qualified_name());
    self.feed_str(&key.to_hex());
    Ok(())
  }

  /// The memoized key for `rule`, computed through a fresh sub-builder on a
  /// miss. Rule graphs are DAGs; re-entering an in-flight target is a cycle.
  fn resolve_rule_key(&mut self, rule: &dyn BuildRule) -> Result<RuleKey, RuleKeyError> {
    let target = rule.target();
    if let Some(key) = self.factory.cache.rule_key(target) {
      return Ok(key);
    }
    if !self.in_flight.insert(target.clone()) {
      return Err(RuleKeyError::CyclicRuleGraph(target.clone()));
    }

    let computed = self.sub_key(|sub| rule.append_inputs(sub));
    self.in_flight.remove(target);
    let key = computed?;
    self.factory.cache.store_rule_key(target.clone(), key);
    Ok(key)
  }

  fn appendable_sub_key(
    &mut self,
    appendable: &Arc<dyn RuleKeyAppendable>,
  ) -> Result<RuleKey, RuleKeyError> {
    if let Some(key) = self.factory.cache.appendable_key(appendable) {
      return Ok(key);
    }
    let key = self.sub_key(|sub| appendable.append_to(sub))?;
    self.factory.cache.store_appendable_key(appendable.clone(), key);
    Ok(key)
  }

  /// Run `fill` against a fresh builder sharing this builder's in-flight
  /// set, and finalize it into a sub-key.
  fn sub_key(
    &mut self,
    fill: impl FnOnce(&mut RuleKeyBuilder<'_>) -> Result<(), RuleKeyError>,
  ) -> Result<RuleKey, RuleKeyError> {
    let mut sub = RuleKeyBuilder::new(self.factory);
    sub.in_flight = std::mem::take(&mut self.in_flight);
    let filled = fill(&mut sub);
    self.in_flight = std::mem::take(&mut sub.in_flight);
    filled?;
    sub.finalize()
  }

  fn feed_with(&mut self, absorb: impl FnOnce(&mut DigestSink)) {
    self.ctx.drain(&mut self.sink);
    absorb(&mut self.sink);
    self.sink.absorb_separator();
  }

  fn feed_str(&mut self, s: &str) {
    self.feed_with(|sink| sink.absorb_str(s));
  }

  fn feed_bytes(&mut self, bytes: &[u8]) {
    self.feed_with(|sink| sink.absorb_bytes(bytes));
  }
}
