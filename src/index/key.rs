//! Ordered index keys and BTree-backed index entries
//!
//! Index entries are ordered by (column values, primary key). Every scan over
//! an index or over the records of a type observes this order, which is what
//! the planner relies on when it reasons about plan ordering.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Bound;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single orderable scalar.
///
/// Ordering is deterministic: Null < Bool < Number < String. Integers and
/// floats share one numeric rank and compare by value, so `2` and `2.0` are
/// the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKey {
    /// Absent or JSON null
    Null,
    /// Boolean value (false < true)
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Bits of a float with no exact `i64` form
    Float(u64),
    /// String value
    String(String),
}

/// 2^63 as a float; the first value above every `i64`
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

impl IndexKey {
    /// Create a key from an integer
    pub fn from_int(v: i64) -> Self {
        IndexKey::Int(v)
    }

    /// Create a key from a float.
    ///
    /// Integral values that fit an `i64` become `Int`, so equal numbers have
    /// one representation.
    pub fn from_float(v: f64) -> Self {
        if v.fract() == 0.0 && v >= -I64_UPPER && v < I64_UPPER {
            IndexKey::Int(v as i64)
        } else {
            IndexKey::Float(v.to_bits())
        }
    }

    /// Create a key from a string
    pub fn from_string(v: impl Into<String>) -> Self {
        IndexKey::String(v.into())
    }

    /// Create a key from a JSON scalar.
    ///
    /// Arrays and objects are not orderable and yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(IndexKey::Null),
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(IndexKey::from_int(i))
                } else {
                    n.as_f64().map(IndexKey::from_float)
                }
            }
            Value::String(s) => Some(IndexKey::from_string(s)),
            _ => None,
        }
    }

    /// Key for an optional JSON value; absent values order as null.
    pub fn from_optional(value: Option<&Value>) -> Option<Self> {
        match value {
            Some(v) => IndexKey::from_json(v),
            None => Some(IndexKey::Null),
        }
    }

    /// Returns true for the null key
    pub fn is_null(&self) -> bool {
        matches!(self, IndexKey::Null)
    }

    fn rank(&self) -> u8 {
        match self {
            IndexKey::Null => 0,
            IndexKey::Bool(_) => 1,
            IndexKey::Int(_) | IndexKey::Float(_) => 2,
            IndexKey::String(_) => 3,
        }
    }
}

/// Exact order of an integer against a float that has no `i64` form.
///
/// Such a float is NaN, infinite, beyond the `i64` range or non-integral.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        // total_cmp puts positive NaN above every number and negative NaN below
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= I64_UPPER {
        return Ordering::Less;
    }
    if f < -I64_UPPER {
        return Ordering::Greater;
    }
    // |f| < 2^63 and f is not integral, so floor(f) < f < floor(f) + 1
    if i <= f.floor() as i64 {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexKey::Bool(a), IndexKey::Bool(b)) => a.cmp(b),
            (IndexKey::Int(a), IndexKey::Int(b)) => a.cmp(b),
            (IndexKey::Float(a), IndexKey::Float(b)) => {
                f64::from_bits(*a).total_cmp(&f64::from_bits(*b))
            }
            (IndexKey::Int(a), IndexKey::Float(b)) => cmp_int_float(*a, f64::from_bits(*b)),
            (IndexKey::Float(a), IndexKey::Int(b)) => {
                cmp_int_float(*b, f64::from_bits(*a)).reverse()
            }
            (IndexKey::String(a), IndexKey::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Null => write!(f, "null"),
            IndexKey::Bool(b) => write!(f, "{}", b),
            IndexKey::Int(i) => write!(f, "{}", i),
            IndexKey::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            IndexKey::String(s) => write!(f, "{}", s),
        }
    }
}

/// Total order over JSON values, consistent with `IndexKey` ordering.
///
/// Values that have no key (arrays, objects) sort after every scalar and
/// compare equal among themselves.
pub fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (IndexKey::from_json(a), IndexKey::from_json(b)) {
        (Some(ka), Some(kb)) => ka.cmp(&kb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// One entry of an index: column values followed by the primary key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Column values in index column order
    pub key: Vec<IndexKey>,
    /// Primary key of the indexed record
    pub primary_key: IndexKey,
}

impl IndexEntry {
    /// Creates a new entry
    pub fn new(key: Vec<IndexKey>, primary_key: IndexKey) -> Self {
        Self { key, primary_key }
    }
}

/// A range over index entries: an equality prefix plus optional bounds on the
/// column directly after the prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleRange {
    /// Values the leading columns must equal
    pub prefix: Vec<IndexKey>,
    /// Lower bound on the column after the prefix
    pub low: Bound<IndexKey>,
    /// Upper bound on the column after the prefix
    pub high: Bound<IndexKey>,
}

impl TupleRange {
    /// Every entry
    pub fn all() -> Self {
        Self::prefix(Vec::new())
    }

    /// Entries whose leading columns equal `prefix`
    pub fn prefix(prefix: Vec<IndexKey>) -> Self {
        Self {
            prefix,
            low: Bound::Unbounded,
            high: Bound::Unbounded,
        }
    }

    /// Sets the bounds on the column after the prefix
    pub fn with_bounds(mut self, low: Bound<IndexKey>, high: Bound<IndexKey>) -> Self {
        self.low = low;
        self.high = high;
        self
    }

    /// Returns true if the entry key lies inside this range
    pub fn contains(&self, key: &[IndexKey]) -> bool {
        if !key.starts_with(&self.prefix) {
            return false;
        }
        let next = match key.get(self.prefix.len()) {
            Some(k) => k,
            None => return self.is_prefix_only(),
        };
        let above_low = match &self.low {
            Bound::Included(l) => next >= l,
            Bound::Excluded(l) => next > l,
            Bound::Unbounded => true,
        };
        let below_high = match &self.high {
            Bound::Included(h) => next <= h,
            Bound::Excluded(h) => next < h,
            Bound::Unbounded => true,
        };
        above_low && below_high
    }

    /// Returns true if the entry key is past the end of this range
    fn is_past_end(&self, key: &[IndexKey]) -> bool {
        if !key.starts_with(&self.prefix) {
            return true;
        }
        match (key.get(self.prefix.len()), &self.high) {
            (Some(next), Bound::Included(h)) => next > h,
            (Some(next), Bound::Excluded(h)) => next >= h,
            _ => false,
        }
    }

    fn is_prefix_only(&self) -> bool {
        matches!(
            (&self.low, &self.high),
            (Bound::Unbounded, Bound::Unbounded)
        )
    }
}

impl fmt::Display for TupleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: Vec<String> = self.prefix.iter().map(|k| k.to_string()).collect();
        write!(f, "[{}]", prefix.join(", "))?;
        match &self.low {
            Bound::Included(k) => write!(f, " >= {}", k)?,
            Bound::Excluded(k) => write!(f, " > {}", k)?,
            Bound::Unbounded => {}
        }
        match &self.high {
            Bound::Included(k) => write!(f, " <= {}", k)?,
            Bound::Excluded(k) => write!(f, " < {}", k)?,
            Bound::Unbounded => {}
        }
        Ok(())
    }
}

/// A single index using a BTreeSet for deterministic ordering.
#[derive(Debug, Default)]
pub struct IndexTree {
    entries: BTreeSet<IndexEntry>,
}

impl IndexTree {
    /// Creates a new empty index tree
    pub fn new() -> Self {
        Self {
            entries: BTreeSet::new(),
        }
    }

    /// Insert an entry; inserting an existing entry is a no-op.
    pub fn insert(&mut self, entry: IndexEntry) {
        self.entries.insert(entry);
    }

    /// Remove an entry if present.
    pub fn remove(&mut self, entry: &IndexEntry) {
        self.entries.remove(entry);
    }

    /// Lazily scans entries inside `range`, in index order, strictly after
    /// `after` when given.
    pub fn scan(
        &self,
        range: TupleRange,
        after: Option<&IndexEntry>,
    ) -> impl Iterator<Item = &IndexEntry> + '_ {
        let start = IndexEntry::new(range.prefix.clone(), IndexKey::Null);
        let lower = match after {
            Some(a) if *a >= start => Bound::Excluded(a.clone()),
            _ => Bound::Included(start),
        };
        let end = range.clone();
        self.entries
            .range((lower, Bound::Unbounded))
            .take_while(move |e| !end.is_past_end(&e.key))
            .filter(move |e| range.contains(&e.key))
    }

    /// Returns the total number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(values: &[i64], pk: i64) -> IndexEntry {
        IndexEntry::new(
            values.iter().map(|v| IndexKey::from_int(*v)).collect(),
            IndexKey::from_int(pk),
        )
    }

    #[test]
    fn test_key_ordering() {
        let keys = vec![
            IndexKey::Null,
            IndexKey::Bool(false),
            IndexKey::Bool(true),
            IndexKey::from_int(-100),
            IndexKey::from_int(0),
            IndexKey::from_int(100),
            IndexKey::from_string("aaa"),
            IndexKey::from_string("zzz"),
        ];

        for i in 1..keys.len() {
            assert!(keys[i - 1] < keys[i], "Keys should be ordered");
        }
    }

    #[test]
    fn test_float_ordering() {
        assert!(IndexKey::from_float(-2.5) < IndexKey::from_float(-1.0));
        assert!(IndexKey::from_float(-1.0) < IndexKey::from_float(0.5));
        assert_eq!(IndexKey::from_float(1.5).to_string(), "1.5");
    }

    #[test]
    fn test_numbers_share_one_rank() {
        assert_eq!(IndexKey::from_float(2.0), IndexKey::from_int(2));
        assert_eq!(IndexKey::from_float(-0.0), IndexKey::from_int(0));
        assert!(IndexKey::from_float(1.5) < IndexKey::from_int(2));
        assert!(IndexKey::from_int(1) < IndexKey::from_float(1.5));
        assert!(IndexKey::from_float(-1.5) < IndexKey::from_int(-1));
        assert!(IndexKey::from_int(-2) < IndexKey::from_float(-1.5));
        assert!(IndexKey::Bool(true) < IndexKey::from_float(f64::NEG_INFINITY));
        assert!(IndexKey::from_float(f64::INFINITY) < IndexKey::from_string(""));
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        // 2^53 + 1 has no f64 form; the nearest float is 2^53
        let big = IndexKey::from_int((1 << 53) + 1);
        assert!(IndexKey::from_float(9_007_199_254_740_992.0) < big);
        assert!(IndexKey::from_int(i64::MAX) < IndexKey::from_float(1e19));
        assert!(IndexKey::from_float(-1e19) < IndexKey::from_int(i64::MIN));
        assert_eq!(
            IndexKey::from_float(-9_223_372_036_854_775_808.0),
            IndexKey::from_int(i64::MIN)
        );
        assert!(IndexKey::from_int(i64::MAX) < IndexKey::from_float(f64::NAN));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(IndexKey::from_json(&json!(true)), Some(IndexKey::Bool(true)));
        assert_eq!(IndexKey::from_json(&json!(42)), Some(IndexKey::Int(42)));
        assert_eq!(
            IndexKey::from_json(&json!("hello")),
            Some(IndexKey::String("hello".to_string()))
        );
        assert_eq!(IndexKey::from_json(&json!(null)), Some(IndexKey::Null));
        assert_eq!(IndexKey::from_json(&json!([1, 2, 3])), None);
    }

    #[test]
    fn test_compare_json() {
        assert_eq!(compare_json(&json!(1), &json!(2)), Ordering::Less);
        assert_eq!(compare_json(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_json(&json!(null), &json!(0)), Ordering::Less);
        assert_eq!(compare_json(&json!(2), &json!(2.0)), Ordering::Equal);
        assert_eq!(compare_json(&json!(2), &json!(1.5)), Ordering::Greater);
    }

    #[test]
    fn test_prefix_scan() {
        let mut tree = IndexTree::new();
        tree.insert(entry(&[1, 10], 3));
        tree.insert(entry(&[1, 5], 7));
        tree.insert(entry(&[2, 1], 1));
        tree.insert(entry(&[0, 9], 2));

        let range = TupleRange::prefix(vec![IndexKey::from_int(1)]);
        let found: Vec<_> = tree.scan(range, None).cloned().collect();
        assert_eq!(found, vec![entry(&[1, 5], 7), entry(&[1, 10], 3)]);
    }

    #[test]
    fn test_bounded_scan() {
        let mut tree = IndexTree::new();
        for v in 0..10 {
            tree.insert(entry(&[v], v));
        }

        let range = TupleRange::all().with_bounds(
            Bound::Excluded(IndexKey::from_int(3)),
            Bound::Included(IndexKey::from_int(6)),
        );
        let found: Vec<_> = tree.scan(range, None).map(|e| e.key[0].clone()).collect();
        assert_eq!(
            found,
            vec![
                IndexKey::from_int(4),
                IndexKey::from_int(5),
                IndexKey::from_int(6)
            ]
        );
    }

    #[test]
    fn test_scan_resumes_after_entry() {
        let mut tree = IndexTree::new();
        for pk in 0..5 {
            tree.insert(entry(&[1], pk));
        }

        let range = TupleRange::prefix(vec![IndexKey::from_int(1)]);
        let after = entry(&[1], 2);
        let found: Vec<_> = tree
            .scan(range, Some(&after))
            .map(|e| e.primary_key.clone())
            .collect();
        assert_eq!(found, vec![IndexKey::from_int(3), IndexKey::from_int(4)]);
    }

    #[test]
    fn test_remove() {
        let mut tree = IndexTree::new();
        tree.insert(entry(&[1], 1));
        tree.insert(entry(&[1], 1));
        assert_eq!(tree.len(), 1);

        tree.remove(&entry(&[1], 1));
        assert!(tree.is_empty());
    }
}
