//! Relations: one or more indexes kept in step behind a lock.

use std::sync::Arc;

use parking_lot::RwLock;
use ram_ir::{
    LexOrder, RamDomain, RelationDecl, Representation, SearchSignature, TypeAttribute, fatal,
};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::eqrel::EquivalenceRelation;
use crate::error::{Result, StoreError};
use crate::forall::ForallIndex;
use crate::index::{IndexPartition, IndexSnapshot, OrderedIndex, RangePattern, Tuple, matches};
use crate::symbols::SymbolTable;

/// What a re-insert of a known key does to its auxiliary columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxPolicy {
    /// Keep the lexicographically smaller auxiliary values.
    KeepSmaller,
    /// Replace with the newest auxiliary values.
    Overwrite,
}

#[derive(Debug, Clone)]
struct AuxKeys {
    key_arity: usize,
    policy: AuxPolicy,
    by_key: FxHashMap<Tuple, Tuple>,
}

#[derive(Debug, Clone)]
struct Indexed {
    indexes: Vec<OrderedIndex>,
    aux: Option<AuxKeys>,
}

impl Indexed {
    fn insert(&mut self, tuple: &[RamDomain]) -> bool {
        let Some(aux) = &mut self.aux else {
            return self.put(tuple);
        };
        let (key, values) = tuple.split_at(aux.key_arity);
        let old = match aux.by_key.get(key) {
            None => None,
            Some(old) if old.as_slice() == values => return false,
            Some(old) if aux.policy == AuxPolicy::KeepSmaller && old.as_slice() < values => {
                return false;
            }
            Some(old) => Some(old.clone()),
        };
        aux.by_key.insert(key.to_vec(), values.to_vec());
        if let Some(old) = old {
            let mut previous = key.to_vec();
            previous.extend(old);
            for index in &mut self.indexes {
                index.remove(&previous);
            }
        }
        self.put(tuple)
    }

    fn put(&mut self, tuple: &[RamDomain]) -> bool {
        let mut indexes = self.indexes.iter_mut();
        let fresh = indexes.next().is_some_and(|primary| primary.insert(tuple));
        if fresh {
            for index in indexes {
                index.insert(tuple);
            }
        }
        fresh
    }

    fn clear(&mut self) {
        for index in &mut self.indexes {
            index.clear();
        }
        if let Some(aux) = &mut self.aux {
            aux.by_key.clear();
        }
    }
}

#[derive(Debug, Clone)]
enum Contents {
    Indexed(Indexed),
    Equivalence(Arc<EquivalenceRelation>),
}

/// A named set of fixed-width tuples.
///
/// Every mutation happens under the write lock, so all indexes agree by the
/// time an insert returns and readers never see a half-applied update.
/// Scans work on [`Snapshot`]s and are unaffected by concurrent inserts.
#[derive(Debug)]
pub struct Relation {
    decl: RelationDecl,
    contents: RwLock<Contents>,
    forall: Option<ForallIndex<Tuple, Tuple>>,
}

impl Relation {
    /// A relation stored in `orders`; the first order is primary.
    ///
    /// With no orders the natural one is used. Equivalence relations always
    /// use a single canonical index.
    pub fn new(decl: RelationDecl, orders: Vec<LexOrder>) -> Self {
        if let Some(bad) = orders.iter().find(|o| o.arity() != decl.arity) {
            fatal!(
                "index {bad} does not match arity {} of `{}`",
                decl.arity,
                decl.name
            );
        }
        let contents = if decl.representation == Representation::Equivalence {
            if decl.arity != 2 {
                fatal!("equivalence relation `{}` must have arity 2", decl.name);
            }
            Contents::Equivalence(Arc::default())
        } else {
            let orders = if orders.is_empty() {
                vec![LexOrder::natural(decl.arity)]
            } else {
                orders
            };
            let aux = (decl.aux_arity > 0).then(|| AuxKeys {
                key_arity: decl.key_arity(),
                policy: match decl.representation {
                    Representation::Incremental => AuxPolicy::Overwrite,
                    _ => AuxPolicy::KeepSmaller,
                },
                by_key: FxHashMap::default(),
            });
            Contents::Indexed(Indexed {
                indexes: orders.into_iter().map(OrderedIndex::new).collect(),
                aux,
            })
        };
        let forall = (decl.representation == Representation::Incremental).then(ForallIndex::new);
        let relation = Relation {
            decl,
            contents: RwLock::new(contents),
            forall,
        };
        debug!(
            relation = %relation.decl.name,
            indexes = %relation.describe_indexes(),
            "created relation"
        );
        relation
    }

    pub fn decl(&self) -> &RelationDecl {
        &self.decl
    }

    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn arity(&self) -> usize {
        self.decl.arity
    }

    /// The orders of this relation's indexes, primary first.
    pub fn orders(&self) -> Vec<LexOrder> {
        match &*self.contents.read() {
            Contents::Indexed(indexed) => {
                indexed.indexes.iter().map(|i| i.order().clone()).collect()
            }
            Contents::Equivalence(_) => vec![LexOrder::natural(2)],
        }
    }

    /// Insert a tuple; true if the relation changed.
    ///
    /// The first insert while a snapshot is alive copies every index, so a
    /// query projecting into a relation it also scans pays one copy of that
    /// relation per query.
    ///
    /// Panics if the tuple width differs from the arity.
    pub fn insert(&self, tuple: &[RamDomain]) -> bool {
        if tuple.len() != self.decl.arity {
            fatal!(
                "tuple of width {} inserted into `{}` of arity {}",
                tuple.len(),
                self.decl.name,
                self.decl.arity
            );
        }
        match &mut *self.contents.write() {
            Contents::Indexed(indexed) => indexed.insert(tuple),
            Contents::Equivalence(eq) => Arc::make_mut(eq).insert(tuple[0], tuple[1]),
        }
    }

    pub fn contains(&self, tuple: &[RamDomain]) -> bool {
        if tuple.len() != self.decl.arity {
            return false;
        }
        match &*self.contents.read() {
            Contents::Indexed(indexed) => indexed.indexes[0].contains(tuple),
            Contents::Equivalence(eq) => eq.contains(tuple[0], tuple[1]),
        }
    }

    /// Does any tuple match `pattern`?
    pub fn exists(&self, pattern: &RangePattern) -> bool {
        if pattern.iter().all(Option::is_some) {
            let tuple: Tuple = pattern.iter().flatten().copied().collect();
            return self.contains(&tuple);
        }
        self.snapshot().range(pattern).next().is_some()
    }

    /// Existence over the key columns of `pattern`, requiring the stored
    /// first auxiliary column to be no greater than the probe's when the
    /// probe binds it.
    pub fn exists_with_provenance(&self, pattern: &RangePattern) -> bool {
        let key_arity = self.decl.key_arity();
        let mut key_pattern = pattern.to_vec();
        for entry in key_pattern.iter_mut().skip(key_arity) {
            *entry = None;
        }
        let limit = pattern.get(key_arity).copied().flatten();
        let snapshot = self.snapshot();
        let mut found = snapshot.range(&key_pattern);
        match limit {
            Some(limit) if key_arity < self.decl.arity => found.any(|t| t[key_arity] <= limit),
            _ => found.next().is_some(),
        }
    }

    pub fn len(&self) -> usize {
        match &*self.contents.read() {
            Contents::Indexed(indexed) => indexed.indexes[0].len(),
            Contents::Equivalence(eq) => eq.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every tuple.
    pub fn purge(&self) {
        match &mut *self.contents.write() {
            Contents::Indexed(indexed) => indexed.clear(),
            Contents::Equivalence(eq) => *eq = Arc::default(),
        }
        if let Some(forall) = &self.forall {
            forall.clear();
        }
    }

    /// A read-only view of the current contents.
    pub fn snapshot(&self) -> Snapshot {
        match &*self.contents.read() {
            Contents::Indexed(indexed) => {
                Snapshot::Indexed(indexed.indexes.iter().map(OrderedIndex::snapshot).collect())
            }
            Contents::Equivalence(eq) => Snapshot::Equivalence(Arc::clone(eq)),
        }
    }

    /// Exchange contents with `other` without copying.
    pub fn swap_contents(&self, other: &Relation) -> Result<()> {
        if std::ptr::eq(self, other) {
            return Ok(());
        }
        let (a, b) = (&self.decl, &other.decl);
        if a.arity != b.arity
            || a.aux_arity != b.aux_arity
            || a.representation != b.representation
        {
            return Err(StoreError::IncompatibleSwap(a.name.clone(), b.name.clone()));
        }
        // lock in address order so opposite swaps cannot deadlock
        let (first, second) = if (self as *const Relation) < (other as *const Relation) {
            (self, other)
        } else {
            (other, self)
        };
        let mut x = first.contents.write();
        let mut y = second.contents.write();
        std::mem::swap(&mut *x, &mut *y);
        Ok(())
    }

    /// Insert every tuple of `source`; returns how many were new.
    pub fn merge_from(&self, source: &Relation) -> usize {
        let snapshot = source.snapshot();
        snapshot.iter().filter(|t| self.insert(t)).count()
    }

    /// Close this equivalence relation under the classes of `other` it
    /// touches; true if it grew.
    ///
    /// Panics unless both relations are equivalence relations.
    pub fn extend_from(&self, other: &Relation) -> bool {
        let Snapshot::Equivalence(classes) = other.snapshot() else {
            fatal!(
                "cannot extend `{}` with `{}`: `{}` is not an equivalence relation",
                self.decl.name,
                other.decl.name,
                other.decl.name
            );
        };
        match &mut *self.contents.write() {
            Contents::Equivalence(eq) => Arc::make_mut(eq).extend(&classes),
            Contents::Indexed(_) => fatal!(
                "cannot extend `{}` with `{}`: `{}` is not an equivalence relation",
                self.decl.name,
                other.decl.name,
                self.decl.name
            ),
        }
    }

    /// The forall index of an incremental relation.
    ///
    /// The engine never writes to it. It is an accessor for callers that keep
    /// their own per-key bookkeeping next to the relation, and it is emptied
    /// by [`Relation::purge`].
    pub fn forall(&self) -> Option<&ForallIndex<Tuple, Tuple>> {
        self.forall.as_ref()
    }

    fn describe_indexes(&self) -> String {
        self.orders()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Contents of a relation at one point in time.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Indexed(Vec<IndexSnapshot>),
    Equivalence(Arc<EquivalenceRelation>),
}

impl Snapshot {
    pub fn len(&self) -> usize {
        match self {
            Snapshot::Indexed(indexes) => indexes[0].len(),
            Snapshot::Equivalence(eq) => eq.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every tuple, in primary index order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = Tuple> + '_> {
        match self {
            Snapshot::Indexed(indexes) => Box::new(indexes[0].iter()),
            Snapshot::Equivalence(eq) => Box::new(eq.pairs().into_iter()),
        }
    }

    /// Tuples matching `pattern`, answered by the index whose order has the
    /// longest bound prefix.
    pub fn range<'a>(&'a self, pattern: &'a RangePattern) -> Box<dyn Iterator<Item = Tuple> + 'a> {
        match self {
            Snapshot::Indexed(indexes) => Box::new(best_index(indexes, pattern).range(pattern)),
            Snapshot::Equivalence(eq) => Box::new(eq.range(pattern).into_iter()),
        }
    }

    /// Split the tuples matching `pattern` into at most `parts` disjoint,
    /// consumable partitions.
    pub fn partition(&self, pattern: &RangePattern, parts: usize) -> Vec<Partition> {
        match self {
            Snapshot::Indexed(indexes) => best_index(indexes, pattern)
                .partition(pattern, parts)
                .into_iter()
                .map(Partition::Index)
                .collect(),
            Snapshot::Equivalence(eq) => {
                let mut tuples = eq.range(pattern);
                let chunk = tuples.len().div_ceil(parts.max(1)).max(1);
                let mut out = Vec::new();
                while !tuples.is_empty() {
                    let rest = tuples.split_off(chunk.min(tuples.len()));
                    out.push(Partition::Tuples(tuples.into_iter()));
                    tuples = rest;
                }
                if out.is_empty() {
                    out.push(Partition::Tuples(Vec::new().into_iter()));
                }
                out
            }
        }
    }
}

fn best_index<'a>(indexes: &'a [IndexSnapshot], pattern: &RangePattern) -> &'a IndexSnapshot {
    let signature = SearchSignature::from_columns(
        pattern
            .iter()
            .enumerate()
            .filter_map(|(c, v)| v.map(|_| c)),
    );
    let mut best = &indexes[0];
    let mut best_prefix = best.order().bound_prefix(signature);
    for index in &indexes[1..] {
        let prefix = index.order().bound_prefix(signature);
        if prefix > best_prefix {
            best = index;
            best_prefix = prefix;
        }
    }
    best
}

/// An owned, single-use slice of a relation's tuples.
#[derive(Debug, Clone)]
pub enum Partition {
    Index(IndexPartition),
    Tuples(std::vec::IntoIter<Tuple>),
}

impl Iterator for Partition {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        match self {
            Partition::Index(p) => p.next(),
            Partition::Tuples(t) => t.next(),
        }
    }
}

/// The contract external printers, readers and bindings rely on.
pub trait RelationInterface: Send + Sync {
    fn name(&self) -> &str;

    fn arity(&self) -> usize;

    fn aux_arity(&self) -> usize;

    fn attributes(&self) -> &[TypeAttribute];

    /// Owned iteration over the current contents.
    fn iter(&self) -> Partition;

    fn contains(&self, tuple: &[RamDomain]) -> bool;

    fn insert(&self, tuple: &[RamDomain]) -> Result<bool>;

    fn size(&self) -> usize;

    fn purge(&self);

    /// Read a tuple from its textual fields, interning symbols.
    fn parse(&self, fields: &[&str], symbols: &SymbolTable) -> Result<Tuple> {
        if fields.len() != self.arity() {
            return Err(StoreError::ArityMismatch {
                relation: self.name().to_string(),
                expected: self.arity(),
                found: fields.len(),
            });
        }
        let attributes = self.attributes();
        fields
            .iter()
            .enumerate()
            .map(|(column, field)| {
                let attribute = attributes
                    .get(column)
                    .copied()
                    .unwrap_or(TypeAttribute::Signed);
                parse_field(field, attribute).ok_or_else(|| StoreError::TypeMismatch {
                    relation: self.name().to_string(),
                    column,
                    expected: attribute,
                    value: field.to_string(),
                })
            })
            .map(|parsed| {
                parsed.map(|value| match value {
                    Field::Value(v) => v,
                    Field::Symbol(s) => symbols.intern(s),
                })
            })
            .collect()
    }
}

enum Field<'a> {
    Value(RamDomain),
    Symbol(&'a str),
}

fn parse_field(field: &str, attribute: TypeAttribute) -> Option<Field<'_>> {
    let field = match attribute {
        TypeAttribute::Symbol => return Some(Field::Symbol(field)),
        _ => field.trim(),
    };
    let value = match attribute {
        TypeAttribute::Signed | TypeAttribute::Record => field.parse::<i32>().ok()?,
        TypeAttribute::Unsigned => ram_ir::types::from_unsigned(field.parse().ok()?),
        TypeAttribute::Float => ram_ir::types::from_float(field.parse().ok()?),
        TypeAttribute::Symbol => return None,
    };
    Some(Field::Value(value))
}

impl RelationInterface for Relation {
    fn name(&self) -> &str {
        &self.decl.name
    }

    fn arity(&self) -> usize {
        self.decl.arity
    }

    fn aux_arity(&self) -> usize {
        self.decl.aux_arity
    }

    fn attributes(&self) -> &[TypeAttribute] {
        &self.decl.attributes
    }

    fn iter(&self) -> Partition {
        let snapshot = self.snapshot();
        let everything = vec![None; self.decl.arity];
        match snapshot.partition(&everything, 1).into_iter().next() {
            Some(partition) => partition,
            None => Partition::Tuples(Vec::new().into_iter()),
        }
    }

    fn contains(&self, tuple: &[RamDomain]) -> bool {
        Relation::contains(self, tuple)
    }

    fn insert(&self, tuple: &[RamDomain]) -> Result<bool> {
        if tuple.len() != self.decl.arity {
            return Err(StoreError::ArityMismatch {
                relation: self.decl.name.clone(),
                expected: self.decl.arity,
                found: tuple.len(),
            });
        }
        Ok(Relation::insert(self, tuple))
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn purge(&self) {
        Relation::purge(self)
    }
}
