//! RAM statements: the control layer around queries.

use crate::condition::Condition;
use crate::operation::Operation;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Statement {
    /// Run children in order; stops early when a child signals exit.
    Sequence(Vec<Statement>),
    /// Run children as independent tasks and join.
    Parallel(Vec<Statement>),
    /// Repeat the body until an [`Statement::Exit`] inside it fires.
    Loop(Box<Statement>),
    /// Leave the innermost loop when the condition holds.
    Exit(Condition),
    /// Evaluate a loop nest.
    Query(Operation),
    /// Exchange the contents of two relations.
    Swap(String, String),
    /// Insert every tuple of `source` into `target`.
    Merge { source: String, target: String },
    /// Close the equivalence relation `source` under the classes of
    /// `target` it touches, then insert it into `target`.
    Extend { source: String, target: String },
    /// Remove all tuples of a relation.
    Clear(String),
    /// Run a named subroutine of the program.
    Call(String),
    /// Time the inner statement.
    LogTimer {
        message: String,
        statement: Box<Statement>,
    },
    /// Time the inner statement and report the size of `relation` after it.
    LogRelationTimer {
        message: String,
        relation: String,
        statement: Box<Statement>,
    },
    /// Report the size of `relation`.
    LogSize { message: String, relation: String },
    /// Attach a message to the inner statement for tracing.
    DebugInfo {
        message: String,
        statement: Box<Statement>,
    },
}

impl Statement {
    pub fn query(operation: Operation) -> Self {
        Statement::Query(operation)
    }

    pub fn merge(source: impl Into<String>, target: impl Into<String>) -> Self {
        Statement::Merge {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn extend(source: impl Into<String>, target: impl Into<String>) -> Self {
        Statement::Extend {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn log_size(message: impl Into<String>, relation: impl Into<String>) -> Self {
        Statement::LogSize {
            message: message.into(),
            relation: relation.into(),
        }
    }

    pub fn swap(a: impl Into<String>, b: impl Into<String>) -> Self {
        Statement::Swap(a.into(), b.into())
    }

    pub fn clear(relation: impl Into<String>) -> Self {
        Statement::Clear(relation.into())
    }

    pub fn exit_when(condition: Condition) -> Self {
        Statement::Exit(condition)
    }

    pub fn looped(body: Vec<Statement>) -> Self {
        Statement::Loop(Box::new(Statement::Sequence(body)))
    }

    /// Direct child statements.
    pub fn children(&self) -> Vec<&Statement> {
        match self {
            Statement::Sequence(children) | Statement::Parallel(children) => {
                children.iter().collect()
            }
            Statement::Loop(body) => vec![&**body],
            Statement::LogTimer { statement, .. }
            | Statement::LogRelationTimer { statement, .. }
            | Statement::DebugInfo { statement, .. } => vec![&**statement],
            Statement::Exit(_)
            | Statement::Query(_)
            | Statement::Swap(..)
            | Statement::Merge { .. }
            | Statement::Extend { .. }
            | Statement::LogSize { .. }
            | Statement::Clear(_)
            | Statement::Call(_) => Vec::new(),
        }
    }

    /// Visit this statement and all descendants, parents first.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Statement)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Visit the root operation of every query in the subtree.
    pub fn for_each_query<'a>(&'a self, f: &mut impl FnMut(&'a Operation)) {
        self.walk(&mut |s| {
            if let Statement::Query(op) = s {
                f(op);
            }
        });
    }

    /// Visit every condition held by `Exit` statements and by query
    /// operations in the subtree.
    pub fn for_each_condition<'a>(&'a self, f: &mut impl FnMut(&'a Condition)) {
        self.walk(&mut |s| match s {
            Statement::Exit(condition) => f(condition),
            Statement::Query(op) => op.walk(&mut |o| {
                for condition in o.own_conditions() {
                    f(condition);
                }
            }),
            _ => {}
        });
    }

    /// Rebuild every query's operation through `f`, leaving the statement
    /// structure intact.
    pub fn map_queries(self, f: &mut impl FnMut(Operation) -> Operation) -> Statement {
        match self {
            Statement::Query(op) => Statement::Query(f(op)),
            Statement::Sequence(children) => {
                Statement::Sequence(children.into_iter().map(|c| c.map_queries(f)).collect())
            }
            Statement::Parallel(children) => {
                Statement::Parallel(children.into_iter().map(|c| c.map_queries(f)).collect())
            }
            Statement::Loop(body) => Statement::Loop(Box::new(body.map_queries(f))),
            Statement::LogTimer { message, statement } => Statement::LogTimer {
                message,
                statement: Box::new(statement.map_queries(f)),
            },
            Statement::LogRelationTimer {
                message,
                relation,
                statement,
            } => Statement::LogRelationTimer {
                message,
                relation,
                statement: Box::new(statement.map_queries(f)),
            },
            Statement::DebugInfo { message, statement } => Statement::DebugInfo {
                message,
                statement: Box::new(statement.map_queries(f)),
            },
            leaf => leaf,
        }
    }
}
