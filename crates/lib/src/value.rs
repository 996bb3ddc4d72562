//! The value model accepted by the classifier.
//!
//! [`Value`] is the closed union of everything a build rule may declare as
//! an input. The original open-world dispatch becomes plain pattern matching
//! here: unknown shapes cannot be constructed, so the classifier never meets
//! one.
//!
//! Collections carry their ordering guarantee with them. Constructing a map
//! or set through [`Value::from_btree_map`], [`Value::from_btree_set`], or
//! the `ordered_*` constructors *declares* a total order; the `unordered_*`
//! constructors do not, and such collections are rejected (or, in
//! compatibility mode, warned about) at hashing time.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;
use rulekey_core::{RuleKey, Sha1HashCode};

use crate::rule::{BuildRule, RuleKeyAppendable};
use crate::source::{SourcePath, SourceRoot, SourceWithFlags};
use crate::target::BuildTarget;

/// A lazily produced value.
pub type Thunk = Arc<dyn Fn() -> Value + Send + Sync>;

/// One of two values; only the inhabited side contributes to the key.
#[derive(Clone)]
pub enum EitherValue {
  Left(Box<Value>),
  Right(Box<Value>),
}

/// A runtime-typed value admitted into a rule key.
#[derive(Clone)]
pub enum Value {
  Null,
  Bool(bool),
  I8(i8),
  I16(i16),
  I32(i32),
  I64(i64),
  F32(f32),
  F64(f64),
  Str(String),
  /// A regex pattern; contributes its source text.
  Regex(Regex),
  Bytes(Vec<u8>),
  /// An enumeration label; contributes the enumerator's textual name.
  Enum(String),
  /// An ordered sequence, encoded element-wise under the shared field name.
  Seq(Vec<Value>),
  /// A set; `sorted` records whether a total order was declared.
  Set { elems: Vec<Value>, sorted: bool },
  /// A mapping; `sorted` records whether a key order was declared.
  Map {
    entries: Vec<(Value, Value)>,
    sorted: bool,
  },
  /// A lazy thunk, forced at hashing time.
  Lazy(Thunk),
  /// Present/absent; transparent to the digest (absent hashes as null).
  Opt(Option<Box<Value>>),
  Either(EitherValue),
  /// A bare filesystem path. Admitted into the union solely so the
  /// classifier can reject it with a user-visible error.
  Path(PathBuf),
  Source(SourcePath),
  /// A source path contributing identity but no content digest.
  NonHashingSource(SourcePath),
  SourceWithFlags(SourceWithFlags),
  SourceRoot(SourceRoot),
  Target(BuildTarget),
  /// A rule type name (e.g. `strip`, `javadoc`).
  RuleType(String),
  Rule(Arc<dyn BuildRule>),
  Appendable(Arc<dyn RuleKeyAppendable>),
  /// An already-computed rule key.
  Key(RuleKey),
  /// An already-computed file content digest.
  ContentHash(Sha1HashCode),
}

impl Value {
  pub fn seq(elems: impl IntoIterator<Item = Value>) -> Self {
    Value::Seq(elems.into_iter().collect())
  }

  /// A set whose total order the caller has declared (e.g. already sorted).
  pub fn ordered_set(elems: impl IntoIterator<Item = Value>) -> Self {
    Value::Set {
      elems: elems.into_iter().collect(),
      sorted: true,
    }
  }

  /// A set with no ordering guarantee. Rejected in strict mode.
  pub fn unordered_set(elems: impl IntoIterator<Item = Value>) -> Self {
    Value::Set {
      elems: elems.into_iter().collect(),
      sorted: false,
    }
  }

  /// A map whose key order the caller has declared.
  pub fn ordered_map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
    Value::Map {
      entries: entries.into_iter().collect(),
      sorted: true,
    }
  }

  /// A map with no key-ordering guarantee. Rejected in strict mode.
  pub fn unordered_map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
    Value::Map {
      entries: entries.into_iter().collect(),
      sorted: false,
    }
  }

  /// An ordered map from a `BTreeMap`, whose iteration order is its
  /// declared order.
  pub fn from_btree_map<K: Into<Value> + Ord>(map: BTreeMap<K, Value>) -> Self {
    Value::Map {
      entries: map.into_iter().map(|(k, v)| (k.into(), v)).collect(),
      sorted: true,
    }
  }

  /// An ordered set from a `BTreeSet`.
  pub fn from_btree_set<T: Into<Value> + Ord>(set: BTreeSet<T>) -> Self {
    Value::Set {
      elems: set.into_iter().map(Into::into).collect(),
      sorted: true,
    }
  }

  pub fn some(value: Value) -> Self {
    Value::Opt(Some(Box::new(value)))
  }

  pub fn none() -> Self {
    Value::Opt(None)
  }

  pub fn left(value: Value) -> Self {
    Value::Either(EitherValue::Left(Box::new(value)))
  }

  pub fn right(value: Value) -> Self {
    Value::Either(EitherValue::Right(Box::new(value)))
  }

  pub fn lazy(thunk: impl Fn() -> Value + Send + Sync + 'static) -> Self {
    Value::Lazy(Arc::new(thunk))
  }

  pub fn rule(rule: Arc<dyn BuildRule>) -> Self {
    Value::Rule(rule)
  }

  pub fn appendable(appendable: Arc<dyn RuleKeyAppendable>) -> Self {
    Value::Appendable(appendable)
  }

  /// The variant name, for diagnostics.
  fn variant(&self) -> &'static str {
    match self {
      Value::Null => "Null",
      Value::Bool(_) => "Bool",
      Value::I8(_) => "I8",
      Value::I16(_) => "I16",
      Value::I32(_) => "I32",
      Value::I64(_) => "I64",
      Value::F32(_) => "F32",
      Value::F64(_) => "F64",
      Value::Str(_) => "Str",
      Value::Regex(_) => "Regex",
      Value::Bytes(_) => "Bytes",
      Value::Enum(_) => "Enum",
      Value::Seq(_) => "Seq",
      Value::Set { .. } => "Set",
      Value::Map { .. } => "Map",
      Value::Lazy(_) => "Lazy",
      Value::Opt(_) => "Opt",
      Value::Either(_) => "Either",
      Value::Path(_) => "Path",
      Value::Source(_) => "Source",
      Value::NonHashingSource(_) => "NonHashingSource",
      Value::SourceWithFlags(_) => "SourceWithFlags",
      Value::SourceRoot(_) => "SourceRoot",
      Value::Target(_) => "Target",
      Value::RuleType(_) => "RuleType",
      Value::Rule(_) => "Rule",
      Value::Appendable(_) => "Appendable",
      Value::Key(_) => "Key",
      Value::ContentHash(_) => "ContentHash",
    }
  }
}

impl fmt::Debug for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Bool(v) => write!(f, "Bool({v})"),
      Value::I8(v) => write!(f, "I8({v})"),
      Value::I16(v) => write!(f, "I16({v})"),
      Value::I32(v) => write!(f, "I32({v})"),
      Value::I64(v) => write!(f, "I64({v})"),
      Value::F32(v) => write!(f, "F32({v})"),
      Value::F64(v) => write!(f, "F64({v})"),
      Value::Str(v) => write!(f, "Str({v:?})"),
      Value::Regex(v) => write!(f, "Regex({:?})", v.as_str()),
      Value::Bytes(v) => write!(f, "Bytes({} bytes)", v.len()),
      Value::Enum(v) => write!(f, "Enum({v})"),
      Value::Seq(v) => f.debug_tuple("Seq").field(v).finish(),
      Value::Set { elems, sorted } => {
        f.debug_struct("Set").field("elems", elems).field("sorted", sorted).finish()
      }
      Value::Map { entries, sorted } => {
        f.debug_struct("Map").field("entries", entries).field("sorted", sorted).finish()
      }
      Value::Opt(v) => f.debug_tuple("Opt").field(v).finish(),
      Value::Either(EitherValue::Left(v)) => f.debug_tuple("Left").field(v).finish(),
      Value::Either(EitherValue::Right(v)) => f.debug_tuple("Right").field(v).finish(),
      Value::Path(v) => write!(f, "Path({})", v.display()),
      Value::Source(v) => write!(f, "Source({v})"),
      Value::NonHashingSource(v) => write!(f, "NonHashingSource({v})"),
      Value::SourceWithFlags(v) => write!(f, "SourceWithFlags({})", v.source()),
      Value::SourceRoot(v) => write!(f, "SourceRoot({})", v.name()),
      Value::Target(v) => write!(f, "Target({v})"),
      Value::RuleType(v) => write!(f, "RuleType({v})"),
      Value::Rule(v) => write!(f, "Rule({})", v.target()),
      Value::Key(v) => write!(f, "Key({v})"),
      Value::ContentHash(v) => write!(f, "ContentHash({v})"),
      other => write!(f, "{}", other.variant()),
    }
  }
}

impl From<bool> for Value {
  fn from(v: bool) -> Self {
    Value::Bool(v)
  }
}

impl From<i8> for Value {
  fn from(v: i8) -> Self {
    Value::I8(v)
  }
}

impl From<i16> for Value {
  fn from(v: i16) -> Self {
    Value::I16(v)
  }
}

impl From<i32> for Value {
  fn from(v: i32) -> Self {
    Value::I32(v)
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self {
    Value::I64(v)
  }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self {
    Value::Str(v.to_string())
  }
}

impl From<String> for Value {
  fn from(v: String) -> Self {
    Value::Str(v)
  }
}

impl From<Vec<Value>> for Value {
  fn from(v: Vec<Value>) -> Self {
    Value::Seq(v)
  }
}

impl From<SourcePath> for Value {
  fn from(v: SourcePath) -> Self {
    Value::Source(v)
  }
}

impl From<SourceWithFlags> for Value {
  fn from(v: SourceWithFlags) -> Self {
    Value::SourceWithFlags(v)
  }
}

impl From<BuildTarget> for Value {
  fn from(v: BuildTarget) -> Self {
    Value::Target(v)
  }
}

impl From<RuleKey> for Value {
  fn from(v: RuleKey) -> Self {
    Value::Key(v)
  }
}

impl From<Sha1HashCode> for Value {
  fn from(v: Sha1HashCode) -> Self {
    Value::ContentHash(v)
  }
}
