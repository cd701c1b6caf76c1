//! RAM programs and relation declarations.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::condition::Condition;
use crate::expression::Expression;
use crate::fatal;
use crate::operation::Operation;
use crate::statement::Statement;
use crate::types::{MAX_ARITY, TypeAttribute};

/// Name prefix of the semi-naive delta buffer of a relation.
pub const DELTA_PREFIX: &str = "@delta_";
/// Name prefix of the semi-naive new buffer of a relation.
pub const NEW_PREFIX: &str = "@new_";

/// `@delta_<name>`.
pub fn delta_name(base: &str) -> String {
    format!("{DELTA_PREFIX}{base}")
}

/// `@new_<name>`.
pub fn new_name(base: &str) -> String {
    format!("{NEW_PREFIX}{base}")
}

/// The base relation of a delta buffer name.
pub fn delta_base(name: &str) -> Option<&str> {
    name.strip_prefix(DELTA_PREFIX)
}

/// Storage strategy of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Representation {
    #[default]
    Default,
    Btree,
    /// Binary relation closed under reflexivity, symmetry and transitivity.
    Equivalence,
    /// Auxiliary columns are bookkeeping that a re-insert overwrites.
    Incremental,
    /// Auxiliary columns keep the smallest value seen for a key.
    Provenance,
}

/// Static description of one relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationDecl {
    pub name: String,
    pub arity: usize,
    /// Trailing columns excluded from key uniqueness.
    pub aux_arity: usize,
    pub attributes: Vec<TypeAttribute>,
    pub representation: Representation,
}

impl RelationDecl {
    /// A relation of signed columns with default representation.
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        RelationDecl {
            name: name.into(),
            arity,
            aux_arity: 0,
            attributes: vec![TypeAttribute::Signed; arity],
            representation: Representation::Default,
        }
    }

    pub fn with_attributes(mut self, attributes: Vec<TypeAttribute>) -> Self {
        self.arity = attributes.len();
        self.attributes = attributes;
        self
    }

    pub fn with_aux_arity(mut self, aux_arity: usize) -> Self {
        self.aux_arity = aux_arity;
        self
    }

    pub fn with_representation(mut self, representation: Representation) -> Self {
        self.representation = representation;
        self
    }

    /// Number of leading columns that form the uniqueness key.
    pub fn key_arity(&self) -> usize {
        self.arity - self.aux_arity
    }

    /// The same declaration under another name, for delta and new buffers.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        RelationDecl {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// A complete RAM program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    pub relations: Vec<RelationDecl>,
    pub main: Statement,
    pub subroutines: BTreeMap<String, Statement>,
}

impl Default for Statement {
    fn default() -> Self {
        Statement::Sequence(Vec::new())
    }
}

impl Program {
    pub fn new(relations: Vec<RelationDecl>, main: Statement) -> Self {
        Program {
            relations,
            main,
            subroutines: BTreeMap::new(),
        }
    }

    pub fn with_subroutine(mut self, name: impl Into<String>, body: Statement) -> Self {
        self.subroutines.insert(name.into(), body);
        self
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDecl> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Main body followed by every subroutine body.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        std::iter::once(&self.main).chain(self.subroutines.values())
    }

    /// Visit the root operation of every query, in the main body and in
    /// subroutines.
    pub fn for_each_query<'a>(&'a self, f: &mut impl FnMut(&'a Operation)) {
        for statement in self.statements() {
            statement.for_each_query(f);
        }
    }

    pub fn for_each_condition<'a>(&'a self, f: &mut impl FnMut(&'a Condition)) {
        for statement in self.statements() {
            statement.for_each_condition(f);
        }
    }

    /// Rebuild every query operation through `f`.
    pub fn map_queries(self, mut f: impl FnMut(Operation) -> Operation) -> Program {
        let Program {
            relations,
            main,
            subroutines,
        } = self;
        Program {
            relations,
            main: main.map_queries(&mut f),
            subroutines: subroutines
                .into_iter()
                .map(|(name, body)| (name, body.map_queries(&mut f)))
                .collect(),
        }
    }

    /// Check the structural invariants a translator must establish.
    ///
    /// Violations are malformed programs and abort with a diagnostic.
    pub fn validate(&self) {
        let mut decls: FxHashMap<&str, &RelationDecl> = FxHashMap::default();
        for decl in &self.relations {
            if decls.insert(&decl.name, decl).is_some() {
                fatal!("relation `{}` is declared twice", decl.name);
            }
            if decl.arity > MAX_ARITY {
                fatal!(
                    "relation `{}` has arity {}, the supported maximum is {MAX_ARITY}",
                    decl.name,
                    decl.arity
                );
            }
            if decl.attributes.len() != decl.arity {
                fatal!(
                    "relation `{}` declares {} attribute types for arity {}",
                    decl.name,
                    decl.attributes.len(),
                    decl.arity
                );
            }
            if decl.aux_arity > decl.arity {
                fatal!(
                    "relation `{}` has auxiliary arity {} above its arity {}",
                    decl.name,
                    decl.aux_arity,
                    decl.arity
                );
            }
            if decl.representation == Representation::Equivalence && decl.arity != 2 {
                fatal!(
                    "equivalence relation `{}` must have arity 2, found {}",
                    decl.name,
                    decl.arity
                );
            }
        }

        let lookup = |name: &str| declared(&decls, name);
        let check_width = |name: &str, width: usize, what: &str| {
            let decl = declared(&decls, name);
            if decl.arity != width {
                fatal!(
                    "{what} on `{name}` has {width} columns, relation arity is {}",
                    decl.arity
                );
            }
        };

        for statement in self.statements() {
            statement.walk(&mut |s| match s {
                Statement::Swap(a, b) => {
                    let (da, db) = (lookup(a), lookup(b));
                    if da.arity != db.arity || da.representation != db.representation {
                        fatal!("cannot swap `{a}` and `{b}`: declarations differ");
                    }
                }
                Statement::Merge { source, target } => {
                    if lookup(source).arity != lookup(target).arity {
                        fatal!("cannot merge `{source}` into `{target}`: arities differ");
                    }
                }
                Statement::Extend { source, target } => {
                    for name in [source, target] {
                        if lookup(name).representation != Representation::Equivalence {
                            fatal!(
                                "cannot extend `{target}` with `{source}`: \
                                 `{name}` is not an equivalence relation"
                            );
                        }
                    }
                }
                Statement::Clear(r)
                | Statement::LogRelationTimer { relation: r, .. }
                | Statement::LogSize { relation: r, .. } => {
                    lookup(r);
                }
                Statement::Call(name) if !self.subroutines.contains_key(name) => {
                    fatal!("call of unknown subroutine `{name}`");
                }
                _ => {}
            });
        }

        self.for_each_query(&mut |root| {
            root.walk(&mut |op| {
                match op {
                    Operation::Project { relation, values } => {
                        check_width(relation, values.len(), "projection")
                    }
                    _ => {
                        if let Some(relation) = op.relation() {
                            lookup(relation);
                        }
                        if let (Some(relation), Some(pattern)) = (op.relation(), op.pattern()) {
                            check_width(relation, pattern.arity(), "range pattern");
                        }
                    }
                }
                op.for_each_own_expression(&mut |e| {
                    if let Expression::RelationSize(r) = e {
                        lookup(r);
                    }
                });
            });
        });

        self.for_each_condition(&mut |condition| {
            condition.walk(&mut |c| match c {
                Condition::ExistenceCheck { relation, pattern }
                | Condition::ProvenanceExistenceCheck { relation, pattern } => {
                    check_width(relation, pattern.arity(), "existence check")
                }
                Condition::EmptinessCheck(relation) => {
                    lookup(relation);
                }
                _ => {}
            });
        });
    }
}

fn declared<'d>(decls: &FxHashMap<&str, &'d RelationDecl>, name: &str) -> &'d RelationDecl {
    match decls.get(name) {
        Some(decl) => decl,
        None => fatal!("relation `{name}` is used but not declared"),
    }
}
