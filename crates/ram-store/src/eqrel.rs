//! Binary relations closed under equivalence.

use std::collections::BTreeSet;

use ram_ir::RamDomain;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::index::{RangePattern, Tuple};

/// Union-find over domain values, each class remembering its members.
///
/// Inserting `(a, b)` merges the classes of `a` and `b`. The relation holds
/// the pair `(x, y)` whenever `x` and `y` share a class, so a class of `k`
/// members contributes `k²` tuples.
#[derive(Debug, Clone, Default)]
pub struct EquivalenceRelation {
    parent: FxHashMap<RamDomain, RamDomain>,
    members: FxHashMap<RamDomain, BTreeSet<RamDomain>>,
}

impl EquivalenceRelation {
    pub fn new() -> Self {
        EquivalenceRelation::default()
    }

    /// Returns true if the closure grew.
    pub fn insert(&mut self, a: RamDomain, b: RamDomain) -> bool {
        let fresh = self.add(a) | self.add(b);
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return fresh;
        }
        // merge the smaller class into the larger
        let (keep, gone) = if self.class_size(ra) >= self.class_size(rb) {
            (ra, rb)
        } else {
            (rb, ra)
        };
        let moved = self.members.remove(&gone).unwrap_or_default();
        self.parent.insert(gone, keep);
        self.members.entry(keep).or_default().extend(moved);
        true
    }

    /// Merge into this relation every class of `other` that shares a member
    /// with it. Returns true if the closure grew.
    ///
    /// This is what turns a delta of fresh pairs into the delta of the
    /// closure: `(1, 2)` against classes `{0, 1}` and `{2, 3}` becomes the
    /// single class `{0, 1, 2, 3}`.
    pub fn extend(&mut self, other: &EquivalenceRelation) -> bool {
        let known: Vec<RamDomain> = self.parent.keys().copied().collect();
        let mut visited = FxHashSet::default();
        let mut grew = false;
        for value in known {
            let Some(root) = other.root(value) else {
                continue;
            };
            if !visited.insert(root) {
                continue;
            }
            if let Some(class) = other.members.get(&root) {
                for &member in class {
                    grew |= self.insert(value, member);
                }
            }
        }
        grew
    }

    pub fn contains(&self, a: RamDomain, b: RamDomain) -> bool {
        match (self.root(a), self.root(b)) {
            (Some(ra), Some(rb)) => ra == rb,
            _ => false,
        }
    }

    /// Number of pairs in the closure.
    pub fn len(&self) -> usize {
        self.members.values().map(|m| m.len() * m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn clear(&mut self) {
        self.parent.clear();
        self.members.clear();
    }

    /// Members of the class of `value`, empty if unknown.
    pub fn class_of(&self, value: RamDomain) -> Vec<RamDomain> {
        self.root(value)
            .and_then(|r| self.members.get(&r))
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every pair of the closure, sorted.
    ///
    /// Materialized: a class of `k` members costs `k²` tuples per call.
    pub fn pairs(&self) -> Vec<Tuple> {
        let mut out = Vec::with_capacity(self.len());
        for class in self.members.values() {
            for &x in class {
                for &y in class {
                    out.push(vec![x, y]);
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// Pairs matching a two-column pattern, sorted.
    pub fn range(&self, pattern: &RangePattern) -> Vec<Tuple> {
        match (pattern.first().copied().flatten(), pattern.get(1).copied().flatten()) {
            (None, None) => self.pairs(),
            (Some(a), Some(b)) => {
                if self.contains(a, b) {
                    vec![vec![a, b]]
                } else {
                    Vec::new()
                }
            }
            (Some(a), None) => self.class_of(a).into_iter().map(|y| vec![a, y]).collect(),
            (None, Some(b)) => self.class_of(b).into_iter().map(|x| vec![x, b]).collect(),
        }
    }

    fn add(&mut self, value: RamDomain) -> bool {
        if self.parent.contains_key(&value) {
            return false;
        }
        self.parent.insert(value, value);
        self.members.insert(value, BTreeSet::from([value]));
        true
    }

    fn class_size(&self, root: RamDomain) -> usize {
        self.members.get(&root).map_or(0, BTreeSet::len)
    }

    fn find(&mut self, value: RamDomain) -> RamDomain {
        let mut root = value;
        while let Some(&p) = self.parent.get(&root)
            && p != root
        {
            root = p;
        }
        // path compression
        let mut current = value;
        while current != root {
            let next = self.parent.insert(current, root).unwrap_or(root);
            current = next;
        }
        root
    }

    fn root(&self, value: RamDomain) -> Option<RamDomain> {
        let mut current = *self.parent.get(&value)?;
        loop {
            let parent = *self.parent.get(&current)?;
            if parent == current {
                return Some(current);
            }
            current = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_transitive_and_symmetric() {
        let mut eq = EquivalenceRelation::new();
        assert!(eq.insert(1, 2));
        assert!(eq.insert(2, 3));
        assert!(eq.contains(1, 3));
        assert!(eq.contains(3, 1));
        assert!(eq.contains(2, 2));
        assert!(!eq.insert(3, 1));
        assert_eq!(eq.len(), 9);
    }

    #[test]
    fn test_reflexive_pair_is_new() {
        let mut eq = EquivalenceRelation::new();
        assert!(eq.insert(7, 7));
        assert!(!eq.insert(7, 7));
        assert_eq!(eq.pairs(), vec![vec![7, 7]]);
    }

    #[test]
    fn test_disjoint_classes() {
        let mut eq = EquivalenceRelation::new();
        eq.insert(1, 2);
        eq.insert(5, 6);
        assert!(!eq.contains(1, 5));
        assert_eq!(eq.len(), 8);
        assert_eq!(eq.range(&[Some(5), None]), vec![vec![5, 5], vec![5, 6]]);
        assert_eq!(eq.range(&[None, Some(1)]), vec![vec![1, 1], vec![2, 1]]);
        assert!(eq.range(&[Some(1), Some(6)]).is_empty());
    }

    #[test]
    fn test_merging_classes() {
        let mut eq = EquivalenceRelation::new();
        eq.insert(1, 2);
        eq.insert(3, 4);
        eq.insert(2, 3);
        assert_eq!(eq.class_of(4), vec![1, 2, 3, 4]);
        assert_eq!(eq.len(), 16);
    }

    #[test]
    fn test_extend_pulls_in_touched_classes() {
        let mut full = EquivalenceRelation::new();
        full.insert(0, 1);
        full.insert(2, 3);
        full.insert(8, 9);

        let mut delta = EquivalenceRelation::new();
        delta.insert(1, 2);
        assert!(delta.extend(&full));
        assert_eq!(delta.class_of(1), vec![0, 1, 2, 3]);
        assert!(delta.contains(0, 3));
        assert!(!delta.contains(8, 8));
        assert!(!delta.extend(&full));
    }

    #[test]
    fn test_extend_with_disjoint_relation() {
        let mut full = EquivalenceRelation::new();
        full.insert(5, 6);
        let mut delta = EquivalenceRelation::new();
        delta.insert(1, 1);
        assert!(!delta.extend(&full));
        assert_eq!(delta.pairs(), vec![vec![1, 1]]);
    }
}
