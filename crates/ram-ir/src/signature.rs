//! Search signatures and lexicographic index orders.

use std::fmt;

use crate::fatal;
use crate::types::MAX_ARITY;

/// Set of columns constrained by equality at one access site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SearchSignature(u64);

impl SearchSignature {
    /// The signature of an unconstrained scan.
    pub const EMPTY: SearchSignature = SearchSignature(0);

    /// Signature constraining every column of a relation of `arity`.
    pub fn full(arity: usize) -> Self {
        check_arity(arity);
        if arity == MAX_ARITY {
            SearchSignature(u64::MAX)
        } else {
            SearchSignature((1u64 << arity) - 1)
        }
    }

    pub fn from_columns(columns: impl IntoIterator<Item = usize>) -> Self {
        let mut bits = 0u64;
        for column in columns {
            check_arity(column + 1);
            bits |= 1u64 << column;
        }
        SearchSignature(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn contains(self, column: usize) -> bool {
        column < MAX_ARITY && self.0 & (1u64 << column) != 0
    }

    /// Number of constrained columns.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_subset_of(self, other: SearchSignature) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn union(self, other: SearchSignature) -> SearchSignature {
        SearchSignature(self.0 | other.0)
    }

    pub fn difference(self, other: SearchSignature) -> SearchSignature {
        SearchSignature(self.0 & !other.0)
    }

    /// Constrained columns in ascending order.
    pub fn columns(self) -> impl Iterator<Item = usize> {
        (0..MAX_ARITY).filter(move |&c| self.contains(c))
    }
}

impl fmt::Display for SearchSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, column) in self.columns().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{column}")?;
        }
        write!(f, "}}")
    }
}

/// Column permutation defining the ordering of one index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LexOrder(Vec<usize>);

impl LexOrder {
    /// Build an order from a column permutation.
    ///
    /// Panics if `columns` is not a permutation of `0..columns.len()`.
    pub fn new(columns: Vec<usize>) -> Self {
        check_arity(columns.len());
        let mut seen = vec![false; columns.len()];
        for &column in &columns {
            if column >= columns.len() || seen[column] {
                fatal!("lex order {columns:?} is not a permutation of its columns");
            }
            seen[column] = true;
        }
        LexOrder(columns)
    }

    /// The identity order `0, 1, .., arity - 1`.
    pub fn natural(arity: usize) -> Self {
        LexOrder((0..arity).collect())
    }

    /// Order that lists the columns of `signature` first, then the rest,
    /// each group ascending.
    pub fn for_signature(signature: SearchSignature, arity: usize) -> Self {
        let mut columns: Vec<usize> = signature.columns().filter(|&c| c < arity).collect();
        columns.extend((0..arity).filter(|&c| !signature.contains(c)));
        LexOrder::new(columns)
    }

    pub fn columns(&self) -> &[usize] {
        &self.0
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// True when every column of `signature` sits among the first
    /// `signature.len()` positions of this order.
    pub fn covers(&self, signature: SearchSignature) -> bool {
        let k = signature.len();
        k <= self.0.len() && self.0[..k].iter().all(|&c| signature.contains(c))
    }

    /// Length of the longest prefix of this order made of bound columns.
    pub fn bound_prefix(&self, signature: SearchSignature) -> usize {
        self.0
            .iter()
            .take_while(|&&c| signature.contains(c))
            .count()
    }

    pub fn is_natural(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &c)| i == c)
    }
}

impl fmt::Display for LexOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, column) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{column}")?;
        }
        write!(f, "]")
    }
}

fn check_arity(arity: usize) {
    if arity > MAX_ARITY {
        fatal!("arity {arity} exceeds the supported maximum of {MAX_ARITY} columns");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_columns() {
        let sig = SearchSignature::from_columns([2, 0]);
        assert_eq!(sig.columns().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(sig.len(), 2);
        assert!(sig.is_subset_of(SearchSignature::full(3)));
        assert!(!SearchSignature::full(3).is_subset_of(sig));
    }

    #[test]
    fn test_order_for_signature() {
        let order = LexOrder::for_signature(SearchSignature::from_columns([1, 3]), 4);
        assert_eq!(order.columns(), &[1, 3, 0, 2]);
        assert!(order.covers(SearchSignature::from_columns([1])));
        assert!(order.covers(SearchSignature::from_columns([1, 3])));
        assert!(order.covers(SearchSignature::from_columns([0, 1, 3])));
        assert!(!order.covers(SearchSignature::from_columns([3])));
        assert!(!order.covers(SearchSignature::from_columns([0])));
        assert!(order.covers(SearchSignature::EMPTY));
    }

    #[test]
    fn test_bound_prefix() {
        let order = LexOrder::new(vec![2, 0, 1]);
        assert_eq!(order.bound_prefix(SearchSignature::from_columns([2, 1])), 1);
        assert_eq!(order.bound_prefix(SearchSignature::from_columns([0])), 0);
        assert_eq!(order.bound_prefix(SearchSignature::full(3)), 3);
    }

    #[test]
    #[should_panic(expected = "not a permutation")]
    fn test_invalid_order_is_fatal() {
        LexOrder::new(vec![0, 0]);
    }

    #[test]
    fn test_full_signature_at_max_arity() {
        assert_eq!(SearchSignature::full(MAX_ARITY).len(), MAX_ARITY);
    }
}
