//! Collection and index declarations
//!
//! Key directions follow the MongoDB key-pattern convention:
//! - `1`: ascending
//! - `-1`: descending
//! - any string (`"text"`, `"2dsphere"`, ...): special index type, only ever
//!   observed on a live deployment, never declared by a manifest

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Direction of a single key in an index key pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `1`
    Ascending,
    /// `-1`
    Descending,
    /// Non-ordered index type such as `"text"` or `"hashed"`
    Special(String),
}

impl Direction {
    /// Returns the numeric direction, if this is an ordered key
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Direction::Ascending => Some(1),
            Direction::Descending => Some(-1),
            Direction::Special(_) => None,
        }
    }

    /// Parses a numeric direction. Any positive value is ascending and any
    /// negative value descending, the way the server reads key patterns.
    pub fn from_number(n: f64) -> Option<Self> {
        if n > 0.0 {
            Some(Direction::Ascending)
        } else if n < 0.0 {
            Some(Direction::Descending)
        } else {
            None
        }
    }

    /// Returns the opposite direction. Special keys have no opposite.
    pub fn reversed(&self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
            Direction::Special(kind) => Direction::Special(kind.clone()),
        }
    }

    /// Whether the key is ordered (usable for range scans and sorts)
    pub fn is_ordered(&self) -> bool {
        !matches!(self, Direction::Special(_))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ascending => write!(f, "1"),
            Direction::Descending => write!(f, "-1"),
            Direction::Special(kind) => write!(f, "{}", kind),
        }
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Direction::Ascending => serializer.serialize_i32(1),
            Direction::Descending => serializer.serialize_i32(-1),
            Direction::Special(kind) => serializer.serialize_str(kind),
        }
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Kind(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Direction::from_number(n)
                .ok_or_else(|| de::Error::custom("index direction must be non-zero")),
            Raw::Kind(kind) => Ok(Direction::Special(kind)),
        }
    }
}

/// One `(field, direction)` pair of a key pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexField {
    pub field: String,
    pub direction: Direction,
}

impl IndexField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

impl fmt::Display for IndexField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.field, self.direction)
    }
}

/// Index options that take part in conflict detection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexOptions {
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub sparse: bool,
}

/// A declared index. The target collection is the enclosing [`CollectionSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Ordered key pattern
    pub keys: Vec<IndexField>,
    /// Uniqueness and sparsity
    #[serde(default)]
    pub options: IndexOptions,
}

impl IndexSpec {
    /// Starts an empty key pattern; chain [`asc`](Self::asc) / [`desc`](Self::desc)
    pub fn keys() -> Self {
        Self {
            keys: Vec::new(),
            options: IndexOptions::default(),
        }
    }

    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.keys.push(IndexField::asc(field));
        self
    }

    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.keys.push(IndexField::desc(field));
        self
    }

    pub fn unique(mut self) -> Self {
        self.options.unique = true;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.options.sparse = true;
        self
    }

    /// Server-default index name, e.g. `user_id_1_timestamp_-1`
    pub fn name(&self) -> String {
        default_index_name(&self.keys)
    }

    /// The definition this spec produces once applied
    pub fn definition(&self) -> IndexDefinition {
        IndexDefinition {
            name: self.name(),
            keys: self.keys.clone(),
            options: self.options,
            extra: BTreeMap::new(),
        }
    }
}

/// An index as it exists (or would exist) on a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub keys: Vec<IndexField>,
    #[serde(default)]
    pub options: IndexOptions,
    /// Server options a manifest never declares, such as
    /// `partialFilterExpression`, `collation` or `expireAfterSeconds`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl IndexDefinition {
    /// Whether both definitions index the same key pattern, in the same order
    pub fn same_keys(&self, other: &IndexDefinition) -> bool {
        self.keys == other.keys
    }

    /// Whether both definitions admit the same documents under the same rules
    pub fn same_options(&self, other: &IndexDefinition) -> bool {
        self.options == other.options && self.extra == other.extra
    }

    /// Key pattern rendered as `{ field: dir, ... }`
    pub fn key_pattern(&self) -> String {
        let parts: Vec<String> = self
            .keys
            .iter()
            .map(|k| format!("{}: {}", k.field, k.direction))
            .collect();
        format!("{{ {} }}", parts.join(", "))
    }
}

impl fmt::Display for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.key_pattern())?;
        if self.options.unique {
            write!(f, " unique")?;
        }
        if self.options.sparse {
            write!(f, " sparse")?;
        }
        for (option, value) in &self.extra {
            write!(f, " {}: {}", option, value)?;
        }
        Ok(())
    }
}

/// Builds the name the server assigns when none is given.
pub fn default_index_name(keys: &[IndexField]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join("_")
}

/// A declared collection and the indexes it must carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    pub fn index(mut self, spec: IndexSpec) -> Self {
        self.indexes.push(spec);
        self
    }
}
