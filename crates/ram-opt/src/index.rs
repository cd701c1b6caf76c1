//! Index selection analysis.
//!
//! Collects the search signatures each relation is probed with and chooses a
//! set of lexicographic orders so that every signature is answered by a
//! prefix range query on some order.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::maximum_matching;
use petgraph::graph::{NodeIndex, UnGraph};
use ram_ir::{
    Condition, LexOrder, Operation, Program, RelationDecl, Representation, SearchSignature,
    Statement, fatal,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How signatures are clustered into orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStrategy {
    /// Cover signatures in increasing size, adding an order whenever no
    /// existing one covers the signature.
    #[default]
    Greedy,
    /// Minimum chain cover of the subset lattice via maximum matching.
    ChainCover,
}

/// The orders chosen for one relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCluster {
    orders: Vec<LexOrder>,
    searches: BTreeSet<SearchSignature>,
}

impl IndexCluster {
    /// A cluster over explicit orders; the first is primary.
    ///
    /// Panics if `orders` is empty or mixes arities.
    pub fn new(orders: Vec<LexOrder>, searches: BTreeSet<SearchSignature>) -> Self {
        let Some(first) = orders.first() else {
            fatal!("an index cluster needs at least one order");
        };
        let arity = first.arity();
        if let Some(bad) = orders.iter().find(|o| o.arity() != arity) {
            fatal!("index order {bad} does not match relation arity {arity}");
        }
        IndexCluster { orders, searches }
    }

    /// A single natural-order index.
    pub fn natural(arity: usize) -> Self {
        IndexCluster::new(vec![LexOrder::natural(arity)], BTreeSet::new())
    }

    pub fn orders(&self) -> &[LexOrder] {
        &self.orders
    }

    /// Order used for full scans, emptiness and size queries.
    pub fn primary(&self) -> &LexOrder {
        &self.orders[0]
    }

    /// Signatures this cluster was built for.
    pub fn searches(&self) -> &BTreeSet<SearchSignature> {
        &self.searches
    }

    /// Position of the first order covering `signature`.
    pub fn covering(&self, signature: SearchSignature) -> Option<usize> {
        self.orders.iter().position(|o| o.covers(signature))
    }
}

/// Per-relation index clusters for a whole program.
#[derive(Debug, Clone, Default)]
pub struct IndexAnalysis {
    clusters: BTreeMap<String, IndexCluster>,
}

impl IndexAnalysis {
    /// Analyse `program` with the given strategy.
    pub fn run(program: &Program, strategy: IndexStrategy) -> Self {
        let searches = collect_searches(program);
        let mut clusters = BTreeMap::new();
        for decl in &program.relations {
            let demanded = searches.get(&decl.name).cloned().unwrap_or_default();
            let cluster = select(decl, demanded, strategy);
            debug!(
                relation = %decl.name,
                indexes = cluster.orders().len(),
                searches = cluster.searches().len(),
                "selected indexes"
            );
            clusters.insert(decl.name.clone(), cluster);
        }
        IndexAnalysis { clusters }
    }

    pub fn cluster(&self, relation: &str) -> Option<&IndexCluster> {
        self.clusters.get(relation)
    }

    pub fn clusters(&self) -> impl Iterator<Item = (&str, &IndexCluster)> {
        self.clusters.iter().map(|(n, c)| (n.as_str(), c))
    }
}

/// Signatures demanded per relation, with swapped relations sharing one set.
pub fn collect_searches(program: &Program) -> BTreeMap<String, BTreeSet<SearchSignature>> {
    let mut searches: BTreeMap<String, BTreeSet<SearchSignature>> = BTreeMap::new();
    let mut record = |relation: &str, signature: SearchSignature| {
        if !signature.is_empty() {
            searches
                .entry(relation.to_string())
                .or_default()
                .insert(signature);
        }
    };

    program.for_each_query(&mut |root| {
        root.walk(&mut |op| {
            if let (Some(relation), Some(pattern)) = (op.relation(), op.pattern()) {
                record(relation, pattern.signature());
            }
        });
    });
    program.for_each_condition(&mut |condition| {
        condition.walk(&mut |c| match c {
            Condition::ExistenceCheck { relation, pattern } => {
                record(relation, pattern.signature())
            }
            Condition::ProvenanceExistenceCheck { relation, pattern } => {
                let key_arity = program
                    .relation(relation)
                    .map_or(pattern.arity(), RelationDecl::key_arity);
                let key = SearchSignature::from_columns(
                    pattern.signature().columns().filter(|&col| col < key_arity),
                );
                record(relation, key)
            }
            _ => {}
        });
    });

    // Relations exchanged by a swap must be laid out identically.
    let mut groups = SwapGroups::default();
    for statement in program.statements() {
        statement.walk(&mut |s| {
            if let Statement::Swap(a, b) = s {
                groups.union(a, b);
            }
        });
    }
    for members in groups.classes() {
        let shared: BTreeSet<SearchSignature> = members
            .iter()
            .filter_map(|m| searches.get(m))
            .flatten()
            .copied()
            .collect();
        for member in members {
            searches.insert(member, shared.clone());
        }
    }
    searches
}

fn select(
    decl: &RelationDecl,
    searches: BTreeSet<SearchSignature>,
    strategy: IndexStrategy,
) -> IndexCluster {
    if decl.arity == 0 || decl.representation == Representation::Equivalence {
        return IndexCluster::natural(decl.arity);
    }
    if let Some(bad) = searches
        .iter()
        .find(|s| !s.is_subset_of(SearchSignature::full(decl.arity)))
    {
        fatal!(
            "search {bad} on `{}` exceeds its arity {}",
            decl.name,
            decl.arity
        );
    }

    let mut ordered: Vec<SearchSignature> = searches.iter().copied().collect();
    ordered.sort_by_key(|s| (s.len(), s.bits()));

    let mut orders = match strategy {
        IndexStrategy::Greedy => greedy_cover(&ordered, decl.arity),
        IndexStrategy::ChainCover => chain_cover(&ordered, decl.arity),
    };
    if orders.is_empty() {
        orders.push(LexOrder::natural(decl.arity));
    }

    for signature in &ordered {
        if !orders.iter().any(|o| o.covers(*signature)) {
            fatal!(
                "index selection left search {signature} on `{}` uncovered",
                decl.name
            );
        }
    }
    IndexCluster::new(orders, searches)
}

fn greedy_cover(signatures: &[SearchSignature], arity: usize) -> Vec<LexOrder> {
    let mut orders: Vec<LexOrder> = Vec::new();
    for &signature in signatures {
        if !orders.iter().any(|o| o.covers(signature)) {
            orders.push(LexOrder::for_signature(signature, arity));
        }
    }
    orders
}

/// Dilworth-style cover: every matched edge `s ⊂ t` links two signatures into
/// one chain, and each chain becomes one order.
fn chain_cover(signatures: &[SearchSignature], arity: usize) -> Vec<LexOrder> {
    let mut graph: UnGraph<SearchSignature, ()> = UnGraph::new_undirected();
    let left: Vec<NodeIndex> = signatures.iter().map(|&s| graph.add_node(s)).collect();
    let right: Vec<NodeIndex> = signatures.iter().map(|&s| graph.add_node(s)).collect();
    for (i, &s) in signatures.iter().enumerate() {
        for (j, &t) in signatures.iter().enumerate() {
            if s != t && s.is_subset_of(t) {
                graph.add_edge(left[i], right[j], ());
            }
        }
    }

    let matching = maximum_matching(&graph);
    let position: FxHashMap<NodeIndex, usize> =
        right.iter().enumerate().map(|(j, &n)| (n, j)).collect();
    let successor = |i: usize| -> Option<usize> {
        matching
            .mate(left[i])
            .and_then(|mate| position.get(&mate).copied())
    };

    let mut orders = Vec::new();
    for start in 0..signatures.len() {
        // A chain starts at a signature nothing smaller is matched into.
        if matching.mate(right[start]).is_some() {
            continue;
        }
        let mut columns: Vec<usize> = Vec::with_capacity(arity);
        let mut covered = SearchSignature::EMPTY;
        let mut current = Some(start);
        while let Some(i) = current {
            let delta = signatures[i].difference(covered);
            columns.extend(delta.columns());
            covered = covered.union(signatures[i]);
            current = successor(i);
        }
        columns.extend((0..arity).filter(|&c| !covered.contains(c)));
        orders.push(LexOrder::new(columns));
    }
    orders
}

/// Union-find over relation names.
#[derive(Debug, Default)]
struct SwapGroups {
    parent: BTreeMap<String, String>,
}

impl SwapGroups {
    fn find(&mut self, name: &str) -> String {
        let parent = self
            .parent
            .entry(name.to_string())
            .or_insert_with(|| name.to_string())
            .clone();
        if parent == name {
            return parent;
        }
        let root = self.find(&parent);
        self.parent.insert(name.to_string(), root.clone());
        root
    }

    fn union(&mut self, a: &str, b: &str) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent.insert(rb, ra);
        }
    }

    fn classes(&mut self) -> Vec<Vec<String>> {
        let names: Vec<String> = self.parent.keys().cloned().collect();
        let mut classes: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in names {
            let root = self.find(&name);
            classes.entry(root).or_default().push(name);
        }
        classes.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ram_ir::{Expression, Pattern};

    fn sig(columns: &[usize]) -> SearchSignature {
        SearchSignature::from_columns(columns.iter().copied())
    }

    fn demands(list: &[&[usize]]) -> BTreeSet<SearchSignature> {
        list.iter().map(|c| sig(c)).collect()
    }

    fn assert_covered(cluster: &IndexCluster, searches: &BTreeSet<SearchSignature>) {
        for s in searches {
            assert!(cluster.covering(*s).is_some(), "{s} not covered");
        }
    }

    #[test]
    fn test_greedy_reuses_covering_order() {
        let decl = RelationDecl::new("r", 3);
        let searches = demands(&[&[0], &[0, 1]]);
        let cluster = select(&decl, searches.clone(), IndexStrategy::Greedy);
        assert_eq!(cluster.orders(), &[LexOrder::new(vec![0, 1, 2])]);
        assert_covered(&cluster, &searches);
    }

    #[test]
    fn test_greedy_adds_order_for_incomparable_search() {
        let decl = RelationDecl::new("r", 3);
        let searches = demands(&[&[0], &[1]]);
        let cluster = select(&decl, searches.clone(), IndexStrategy::Greedy);
        assert_eq!(
            cluster.orders(),
            &[LexOrder::new(vec![0, 1, 2]), LexOrder::new(vec![1, 0, 2])]
        );
        assert_covered(&cluster, &searches);
    }

    #[test]
    fn test_chain_cover_merges_nested_searches() {
        let decl = RelationDecl::new("r", 3);
        let searches = demands(&[&[0], &[0, 2], &[1]]);
        let greedy = select(&decl, searches.clone(), IndexStrategy::Greedy);
        let chains = select(&decl, searches.clone(), IndexStrategy::ChainCover);
        assert_eq!(greedy.orders().len(), 3);
        assert_eq!(chains.orders().len(), 2);
        assert_covered(&chains, &searches);
    }

    #[test]
    fn test_unsearched_relation_gets_natural_order() {
        let decl = RelationDecl::new("r", 2);
        let cluster = select(&decl, BTreeSet::new(), IndexStrategy::Greedy);
        assert_eq!(cluster.primary(), &LexOrder::natural(2));
    }

    #[test]
    fn test_swapped_relations_share_searches() {
        let probe = Operation::index_scan(
            "@delta_p",
            0,
            Pattern(vec![None, Some(Expression::constant(1))]),
            Operation::project("p", vec![Expression::element(0, 0), Expression::element(0, 1)]),
        );
        let program = Program::new(
            vec![
                RelationDecl::new("p", 2),
                RelationDecl::new("@delta_p", 2),
                RelationDecl::new("@new_p", 2),
            ],
            Statement::Sequence(vec![
                Statement::query(probe),
                Statement::swap("@delta_p", "@new_p"),
            ]),
        );
        let analysis = IndexAnalysis::run(&program, IndexStrategy::Greedy);
        let delta = analysis.cluster("@delta_p").map(IndexCluster::orders);
        let new = analysis.cluster("@new_p").map(IndexCluster::orders);
        assert_eq!(delta, new);
        assert_eq!(delta, Some(&[LexOrder::new(vec![1, 0])][..]));
    }
}
