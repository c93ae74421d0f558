//! BTreeMap-based index structures
//!
//! An [`IndexTree`] maps compound keys to document ids, ordered the way the
//! server orders index entries: BSON type order first, then value, with
//! descending key parts compared in reverse.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use mongodb::bson::{Bson, Document};

use super::errors::{IndexError, IndexResult};
use crate::manifest::{Direction, IndexDefinition};

/// Internal document id within one collection
pub type DocId = u64;

/// Lower bound of the doubles too large for an `i64`, `2^63`
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// A numeric index value. Integers compare exactly; a double compares with
/// an integer by value. Integral doubles within `i64` range are stored as
/// [`Number::Int`], so `7`, `7i64` and `7.0` are one key and `-0.0` equals
/// `0`. NaN sorts below every other number.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Double(f64),
}

impl Number {
    pub fn from_f64(v: f64) -> Self {
        if v.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&v) {
            Number::Int(v as i64)
        } else {
            Number::Double(v)
        }
    }
}

/// Orders an integer against a double that is non-integral, out of `i64`
/// range, or NaN
fn cmp_int_double(i: i64, d: f64) -> Ordering {
    if d.is_nan() {
        Ordering::Greater
    } else if d >= I64_BOUND {
        Ordering::Less
    } else if d < -I64_BOUND {
        Ordering::Greater
    } else {
        (i as f64).partial_cmp(&d).unwrap_or(Ordering::Equal)
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (*self, *other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            (Number::Int(a), Number::Double(b)) => cmp_int_double(a, b),
            (Number::Double(a), Number::Int(b)) => cmp_int_double(b, a).reverse(),
            (Number::Double(a), Number::Double(b)) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            },
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let normalized = match *self {
            Number::Double(d) => Number::from_f64(d),
            int => int,
        };
        match normalized {
            Number::Int(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            Number::Double(d) if d.is_nan() => 1u8.hash(state),
            Number::Double(d) => {
                2u8.hash(state);
                d.to_bits().hash(state);
            }
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Double(d) => write!(f, "{}", d),
        }
    }
}

/// A single indexed value.
///
/// Variant order is the server's cross-type sort order:
/// Null < Number < String < Object/Array < ObjectId < Bool < Date.
/// A missing field indexes as `Null`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    /// Null or missing
    Null,
    /// Any numeric type
    Number(Number),
    /// UTF-8 string
    String(String),
    /// Embedded document or array, compared by canonical text
    Other(String),
    /// ObjectId bytes
    ObjectId([u8; 12]),
    /// Boolean (false < true)
    Bool(bool),
    /// UTC datetime in milliseconds
    DateTime(i64),
}

impl IndexKey {
    /// Create a key from a float
    pub fn from_number(v: f64) -> Self {
        IndexKey::Number(Number::from_f64(v))
    }

    /// Create a key from a possibly missing BSON value
    pub fn from_bson(value: Option<&Bson>) -> Self {
        match value {
            None | Some(Bson::Null) | Some(Bson::Undefined) => IndexKey::Null,
            Some(Bson::Int32(i)) => IndexKey::Number(Number::Int(i64::from(*i))),
            Some(Bson::Int64(i)) => IndexKey::Number(Number::Int(*i)),
            Some(Bson::Double(f)) => IndexKey::from_number(*f),
            Some(Bson::String(s)) => IndexKey::String(s.clone()),
            Some(Bson::ObjectId(oid)) => IndexKey::ObjectId(oid.bytes()),
            Some(Bson::Boolean(b)) => IndexKey::Bool(*b),
            Some(Bson::DateTime(dt)) => IndexKey::DateTime(dt.timestamp_millis()),
            Some(other) => IndexKey::Other(other.to_string()),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Null => write!(f, "null"),
            IndexKey::Number(n) => write!(f, "{}", n),
            IndexKey::String(s) => write!(f, "{:?}", s),
            IndexKey::Other(s) => write!(f, "{}", s),
            IndexKey::ObjectId(bytes) => {
                write!(f, "ObjectId(\"")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                write!(f, "\")")
            }
            IndexKey::Bool(b) => write!(f, "{}", b),
            IndexKey::DateTime(ms) => write!(f, "Date({})", ms),
        }
    }
}

/// Resolves a possibly dotted field path inside a document.
pub fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = doc.get(first)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

/// One component of a compound key, carrying its sort direction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPart {
    pub key: IndexKey,
    pub descending: bool,
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        let ord = self.key.cmp(&other.key);
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compound key of one index entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey(pub Vec<KeyPart>);

impl EntryKey {
    /// Whether the first `values.len()` parts equal `values`
    pub fn starts_with(&self, values: &[IndexKey]) -> bool {
        values.len() <= self.0.len() && self.0.iter().zip(values).all(|(part, v)| &part.key == v)
    }
}

/// A single collection index using BTreeMap for deterministic ordering.
#[derive(Debug)]
pub struct IndexTree {
    definition: IndexDefinition,
    /// Maps compound keys to sorted lists of document ids
    tree: BTreeMap<EntryKey, Vec<DocId>>,
}

impl IndexTree {
    /// Creates a new empty index for the given definition
    pub fn new(definition: IndexDefinition) -> Self {
        Self {
            definition,
            tree: BTreeMap::new(),
        }
    }

    /// The definition this tree maintains
    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Computes the entry key for a document.
    ///
    /// Returns `None` when the index is sparse and the document lacks every
    /// indexed field.
    pub fn entry_key(&self, doc: &Document) -> Option<EntryKey> {
        let values: Vec<Option<&Bson>> = self
            .definition
            .keys
            .iter()
            .map(|k| lookup_path(doc, &k.field))
            .collect();

        if self.definition.options.sparse && values.iter().all(Option::is_none) {
            return None;
        }

        let parts = self
            .definition
            .keys
            .iter()
            .zip(values)
            .map(|(k, v)| KeyPart {
                key: IndexKey::from_bson(v),
                descending: k.direction == Direction::Descending,
            })
            .collect();

        Some(EntryKey(parts))
    }

    /// Fails if inserting `doc` would violate uniqueness.
    pub fn check(&self, doc: &Document) -> IndexResult<()> {
        if !self.definition.options.unique {
            return Ok(());
        }
        let Some(key) = self.entry_key(doc) else {
            return Ok(());
        };
        if self.tree.contains_key(&key) {
            return Err(IndexError::duplicate(&self.definition, &key));
        }
        Ok(())
    }

    /// Insert a document id.
    ///
    /// Maintains sorted ascending order within a key. Uniqueness is checked
    /// first; nothing is inserted on violation.
    pub fn insert(&mut self, doc: &Document, id: DocId) -> IndexResult<()> {
        self.check(doc)?;
        if let Some(key) = self.entry_key(doc) {
            let ids = self.tree.entry(key).or_default();
            if let Err(pos) = ids.binary_search(&id) {
                ids.insert(pos, id);
            }
        }
        Ok(())
    }

    /// Walks the index in key order (or reverse), returning ids whose key
    /// starts with `prefix`.
    pub fn scan_prefix(&self, prefix: &[IndexKey], reverse: bool) -> Vec<DocId> {
        let matching = |(key, ids): (&EntryKey, &Vec<DocId>)| {
            if key.starts_with(prefix) {
                Some(ids.clone())
            } else {
                None
            }
        };

        if reverse {
            self.tree.iter().rev().filter_map(matching).flatten().collect()
        } else {
            self.tree.iter().filter_map(matching).flatten().collect()
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::IndexSpec;
    use mongodb::bson::doc;

    fn tree(spec: IndexSpec) -> IndexTree {
        IndexTree::new(spec.definition())
    }

    #[test]
    fn test_key_ordering() {
        let keys = vec![
            IndexKey::Null,
            IndexKey::from_number(-100.0),
            IndexKey::from_number(0.0),
            IndexKey::from_number(2.5),
            IndexKey::from_number(100.0),
            IndexKey::String("aaa".into()),
            IndexKey::String("zzz".into()),
            IndexKey::Bool(false),
            IndexKey::Bool(true),
        ];

        for i in 1..keys.len() {
            assert!(keys[i - 1] < keys[i], "Keys should be ordered");
        }
    }

    #[test]
    fn test_numbers_compare_across_types() {
        assert_eq!(
            IndexKey::from_bson(Some(&Bson::Int32(7))),
            IndexKey::from_bson(Some(&Bson::Double(7.0)))
        );
        assert_eq!(
            IndexKey::from_bson(Some(&Bson::Int64(7))),
            IndexKey::from_bson(Some(&Bson::Double(7.0)))
        );
        assert_eq!(IndexKey::from_number(-3.5).to_string(), "-3.5");
    }

    #[test]
    fn test_large_integers_stay_distinct() {
        let below = IndexKey::from_bson(Some(&Bson::Int64(9_007_199_254_740_992)));
        let above = IndexKey::from_bson(Some(&Bson::Int64(9_007_199_254_740_993)));
        assert_ne!(below, above);
        assert!(below < above);
        assert!(IndexKey::from_bson(Some(&Bson::Int64(i64::MAX))) < IndexKey::from_number(I64_BOUND));

        let mut t = tree(IndexSpec::keys().asc("employee_id").unique().sparse());
        t.insert(&doc! { "employee_id": 9_007_199_254_740_992i64 }, 1).unwrap();
        t.insert(&doc! { "employee_id": 9_007_199_254_740_993i64 }, 2).unwrap();
    }

    #[test]
    fn test_negative_zero_equals_zero() {
        assert_eq!(IndexKey::from_number(-0.0), IndexKey::from_number(0.0));
        assert_eq!(IndexKey::from_number(-0.0).to_string(), "0");

        let mut t = tree(IndexSpec::keys().asc("score").unique());
        t.insert(&doc! { "score": 0.0 }, 1).unwrap();
        assert!(t.insert(&doc! { "score": -0.0 }, 2).is_err());
    }

    #[test]
    fn test_mixed_numbers_order_by_value() {
        let keys = vec![
            IndexKey::from_number(f64::NAN),
            IndexKey::from_number(f64::NEG_INFINITY),
            IndexKey::from_bson(Some(&Bson::Int64(-5))),
            IndexKey::from_number(-4.5),
            IndexKey::from_bson(Some(&Bson::Int32(0))),
            IndexKey::from_number(0.5),
            IndexKey::from_bson(Some(&Bson::Int64(1))),
            IndexKey::from_number(1e30),
            IndexKey::from_number(f64::INFINITY),
        ];
        for i in 1..keys.len() {
            assert!(keys[i - 1] < keys[i], "{} should sort below {}", keys[i - 1], keys[i]);
        }
    }

    #[test]
    fn test_missing_indexes_as_null() {
        assert_eq!(IndexKey::from_bson(None), IndexKey::Null);
        assert_eq!(IndexKey::from_bson(Some(&Bson::Null)), IndexKey::Null);
    }

    #[test]
    fn test_lookup_path_dotted() {
        let d = doc! { "location": { "site": "hq" }, "flat": 1 };
        assert_eq!(lookup_path(&d, "location.site"), Some(&Bson::String("hq".into())));
        assert_eq!(lookup_path(&d, "flat"), Some(&Bson::Int32(1)));
        assert_eq!(lookup_path(&d, "flat.inner"), None);
        assert_eq!(lookup_path(&d, "absent"), None);
    }

    #[test]
    fn test_unique_rejects_duplicate() {
        let mut t = tree(IndexSpec::keys().asc("username").unique());
        t.insert(&doc! { "username": "alice" }, 1).unwrap();

        let err = t.insert(&doc! { "username": "alice" }, 2).unwrap_err();
        assert!(err.to_string().contains("username_1"));
        assert_eq!(t.scan_prefix(&[], false), vec![1]);
    }

    #[test]
    fn test_unique_missing_fields_collide() {
        let mut t = tree(IndexSpec::keys().asc("email").unique());
        t.insert(&doc! { "username": "a" }, 1).unwrap();
        assert!(t.insert(&doc! { "username": "b" }, 2).is_err());
    }

    #[test]
    fn test_sparse_skips_missing_fields() {
        let mut t = tree(IndexSpec::keys().asc("employee_id").unique().sparse());
        t.insert(&doc! { "username": "a" }, 1).unwrap();
        t.insert(&doc! { "username": "b" }, 2).unwrap();
        assert!(t.scan_prefix(&[], false).is_empty());

        t.insert(&doc! { "employee_id": "E1" }, 3).unwrap();
        assert!(t.insert(&doc! { "employee_id": "E1" }, 4).is_err());
    }

    #[test]
    fn test_non_unique_allows_duplicates() {
        let mut t = tree(IndexSpec::keys().asc("department_id"));
        t.insert(&doc! { "department_id": "d1" }, 2).unwrap();
        t.insert(&doc! { "department_id": "d1" }, 1).unwrap();
        assert_eq!(t.scan_prefix(&[IndexKey::String("d1".into())], false), vec![1, 2]);
    }

    #[test]
    fn test_descending_part_orders_newest_first() {
        let mut t = tree(IndexSpec::keys().asc("user_id").desc("timestamp"));
        t.insert(&doc! { "user_id": "u1", "timestamp": 10 }, 1).unwrap();
        t.insert(&doc! { "user_id": "u1", "timestamp": 30 }, 2).unwrap();
        t.insert(&doc! { "user_id": "u2", "timestamp": 20 }, 3).unwrap();
        t.insert(&doc! { "user_id": "u1", "timestamp": 20 }, 4).unwrap();

        let u1 = t.scan_prefix(&[IndexKey::String("u1".into())], false);
        assert_eq!(u1, vec![2, 4, 1]);

        let u1_oldest_first = t.scan_prefix(&[IndexKey::String("u1".into())], true);
        assert_eq!(u1_oldest_first, vec![1, 4, 2]);
    }
}
