//! Per-query evaluation state.

use ram_ir::{RamDomain, fatal};
use ram_store::Tuple;

/// Tuples bound by the enclosing loops of a query, the running subroutine's
/// arguments, and the rows it has returned so far.
#[derive(Debug, Clone, Default)]
pub struct Context<'a> {
    tuples: Vec<Option<Tuple>>,
    args: &'a [RamDomain],
    returns: Vec<RamDomain>,
}

impl<'a> Context<'a> {
    pub fn new(args: &'a [RamDomain]) -> Self {
        Context {
            tuples: Vec::new(),
            args,
            returns: Vec::new(),
        }
    }

    /// A context with the same arguments and no bindings or results, for a
    /// worker that evaluates one partition of a scan.
    pub fn fork(&self) -> Context<'a> {
        Context::new(self.args)
    }

    pub fn bind(&mut self, tuple_id: usize, tuple: Tuple) {
        if self.tuples.len() <= tuple_id {
            self.tuples.resize(tuple_id + 1, None);
        }
        self.tuples[tuple_id] = Some(tuple);
    }

    pub fn element(&self, tuple_id: usize, element: usize) -> RamDomain {
        let Some(tuple) = self.tuples.get(tuple_id).and_then(Option::as_ref) else {
            fatal!("t{tuple_id} is read before it is bound");
        };
        match tuple.get(element) {
            Some(value) => *value,
            None => fatal!(
                "t{tuple_id} has {} columns, column {element} was read",
                tuple.len()
            ),
        }
    }

    pub fn argument(&self, index: usize) -> RamDomain {
        match self.args.get(index) {
            Some(value) => *value,
            None => fatal!(
                "subroutine argument {index} requested, {} were passed",
                self.args.len()
            ),
        }
    }

    pub fn emit(&mut self, value: RamDomain) {
        self.returns.push(value);
    }

    pub fn absorb(&mut self, returns: Vec<RamDomain>) {
        self.returns.extend(returns);
    }

    pub fn into_returns(self) -> Vec<RamDomain> {
        self.returns
    }
}
