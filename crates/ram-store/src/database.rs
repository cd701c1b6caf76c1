//! The set of relations a program runs against.

use std::collections::BTreeMap;
use std::sync::Arc;

use ram_ir::{LexOrder, RelationDecl};
use tracing::trace;

use crate::error::{Result, StoreError};
use crate::relation::Relation;

/// Relations by name.
#[derive(Debug, Default)]
pub struct Database {
    relations: BTreeMap<String, Arc<Relation>>,
}

impl Database {
    pub fn new() -> Self {
        Database::default()
    }

    /// Create a relation stored in `orders`, replacing any of the same name.
    pub fn add(&mut self, decl: RelationDecl, orders: Vec<LexOrder>) -> Arc<Relation> {
        let relation = Arc::new(Relation::new(decl, orders));
        self.relations
            .insert(relation.name().to_string(), Arc::clone(&relation));
        relation
    }

    pub fn get(&self, name: &str) -> Result<&Arc<Relation>> {
        self.relations
            .get(name)
            .ok_or_else(|| StoreError::UnknownRelation(name.to_string()))
    }

    pub fn relation(&self, name: &str) -> Option<&Arc<Relation>> {
        self.relations.get(name)
    }

    /// Exchange the contents of two relations.
    pub fn swap(&self, a: &str, b: &str) -> Result<()> {
        trace!(a, b, "swap");
        self.get(a)?.swap_contents(self.get(b)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Relation>)> {
        self.relations.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}
