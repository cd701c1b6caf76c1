//! Ordered tuple indexes.
//!
//! An index stores every tuple permuted into its [`LexOrder`], so a bound
//! prefix of the order is a contiguous range of the underlying `BTreeSet`.
//! The set sits behind an `Arc`: a snapshot is a pointer copy, and an insert
//! while a snapshot is alive copies the set first. Scans therefore never see
//! tuples inserted after they started. The copy is linear in the size of the
//! index and happens once per snapshot, on the first write after it.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;

use ram_ir::{LexOrder, RamDomain, SearchSignature};

/// A relation row in natural column order.
pub type Tuple = Vec<RamDomain>;

/// Per-column probe values; `None` is unbound.
pub type RangePattern = [Option<RamDomain>];

type Key = Vec<RamDomain>;

/// One lexicographic index of a relation.
#[derive(Debug, Clone)]
pub struct OrderedIndex {
    order: LexOrder,
    keys: Arc<BTreeSet<Key>>,
}

impl OrderedIndex {
    pub fn new(order: LexOrder) -> Self {
        OrderedIndex {
            order,
            keys: Arc::default(),
        }
    }

    pub fn order(&self) -> &LexOrder {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn insert(&mut self, tuple: &[RamDomain]) -> bool {
        let key = encode(&self.order, tuple);
        Arc::make_mut(&mut self.keys).insert(key)
    }

    pub fn remove(&mut self, tuple: &[RamDomain]) -> bool {
        let key = encode(&self.order, tuple);
        Arc::make_mut(&mut self.keys).remove(&key)
    }

    pub fn contains(&self, tuple: &[RamDomain]) -> bool {
        self.keys.contains(&encode(&self.order, tuple))
    }

    pub fn clear(&mut self) {
        self.keys = Arc::default();
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            order: self.order.clone(),
            keys: Arc::clone(&self.keys),
        }
    }
}

/// Immutable view of an index at one point in time.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    order: LexOrder,
    keys: Arc<BTreeSet<Key>>,
}

impl IndexSnapshot {
    pub fn order(&self) -> &LexOrder {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, tuple: &[RamDomain]) -> bool {
        self.keys.contains(&encode(&self.order, tuple))
    }

    /// All tuples in index order.
    pub fn iter(&self) -> impl Iterator<Item = Tuple> + '_ {
        self.keys.iter().map(|key| decode(&self.order, key))
    }

    /// Tuples matching `pattern`.
    ///
    /// The bound prefix of this order narrows the range; bound columns
    /// outside the prefix are checked per tuple.
    pub fn range<'a>(&'a self, pattern: &'a RangePattern) -> impl Iterator<Item = Tuple> + 'a {
        let (lower, upper) = self.bounds(pattern);
        let keys: Box<dyn Iterator<Item = &'a Key> + 'a> = if is_empty_range(&lower, &upper) {
            Box::new(std::iter::empty())
        } else {
            Box::new(self.keys.range((lower, upper)))
        };
        keys.map(|key| decode(&self.order, key))
            .filter(move |tuple| matches(pattern, tuple))
    }

    /// Split the tuples matching `pattern` into at most `parts` disjoint
    /// ranges of roughly equal size.
    pub fn partition(&self, pattern: &RangePattern, parts: usize) -> Vec<IndexPartition> {
        let (lower, upper) = self.bounds(pattern);
        let residual: Vec<Option<RamDomain>> = pattern.to_vec();
        let make = |lower, upper| IndexPartition {
            order: self.order.clone(),
            keys: Arc::clone(&self.keys),
            cursor: lower,
            upper,
            pattern: residual.clone(),
        };
        if parts <= 1 || is_empty_range(&lower, &upper) {
            return vec![make(lower, upper)];
        }

        let total = self.keys.range((lower.clone(), upper.clone())).count();
        let chunk = total.div_ceil(parts).max(1);
        let splits: Vec<Key> = self
            .keys
            .range((lower.clone(), upper.clone()))
            .step_by(chunk)
            .skip(1)
            .cloned()
            .collect();

        let mut partitions = Vec::with_capacity(splits.len() + 1);
        let mut start = lower;
        for split in splits {
            partitions.push(make(start, Bound::Excluded(split.clone())));
            start = Bound::Included(split);
        }
        partitions.push(make(start, upper));
        partitions
    }

    fn bounds(&self, pattern: &RangePattern) -> (Bound<Key>, Bound<Key>) {
        let signature = SearchSignature::from_columns(
            pattern
                .iter()
                .enumerate()
                .filter_map(|(c, v)| v.map(|_| c)),
        );
        let prefix = self.order.bound_prefix(signature);
        if prefix == 0 {
            return (Bound::Unbounded, Bound::Unbounded);
        }
        let columns = self.order.columns();
        let mut lower = Vec::with_capacity(columns.len());
        let mut upper = Vec::with_capacity(columns.len());
        for (position, &column) in columns.iter().enumerate() {
            match pattern[column] {
                Some(value) if position < prefix => {
                    lower.push(value);
                    upper.push(value);
                }
                _ => {
                    lower.push(RamDomain::MIN);
                    upper.push(RamDomain::MAX);
                }
            }
        }
        (Bound::Included(lower), Bound::Included(upper))
    }
}

/// A read-only slice of an index snapshot.
///
/// Iterating consumes the partition; re-partition the relation to scan again.
#[derive(Debug, Clone)]
pub struct IndexPartition {
    order: LexOrder,
    keys: Arc<BTreeSet<Key>>,
    cursor: Bound<Key>,
    upper: Bound<Key>,
    pattern: Vec<Option<RamDomain>>,
}

impl Iterator for IndexPartition {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        loop {
            if is_empty_range(&self.cursor, &self.upper) {
                return None;
            }
            let key = self
                .keys
                .range((self.cursor.clone(), self.upper.clone()))
                .next()?
                .clone();
            let tuple = decode(&self.order, &key);
            self.cursor = Bound::Excluded(key);
            if matches(&self.pattern, &tuple) {
                return Some(tuple);
            }
        }
    }
}

/// Does `tuple` agree with every bound column of `pattern`?
pub fn matches(pattern: &RangePattern, tuple: &[RamDomain]) -> bool {
    pattern
        .iter()
        .zip(tuple)
        .all(|(p, v)| p.is_none_or(|p| p == *v))
}

fn encode(order: &LexOrder, tuple: &[RamDomain]) -> Key {
    order.columns().iter().map(|&c| tuple[c]).collect()
}

fn decode(order: &LexOrder, key: &[RamDomain]) -> Tuple {
    let mut tuple = vec![0; key.len()];
    for (position, &column) in order.columns().iter().enumerate() {
        tuple[column] = key[position];
    }
    tuple
}

/// `BTreeSet::range` panics on inverted bounds; treat them as empty.
fn is_empty_range(lower: &Bound<Key>, upper: &Bound<Key>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}
