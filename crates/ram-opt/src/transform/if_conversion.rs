//! Replace index scans that only test for a match by existence checks.

use ram_ir::{Condition, Operation, Program};

use super::{Transformed, Transformer, draws_counter, rewrite_operations};

/// `IndexScan(R, t, p){op}` with `t` unused in `op` becomes
/// `Filter(ExistenceCheck(R, p)){op}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfConversion;

impl Transformer for IfConversion {
    fn name(&self) -> &'static str {
        "if_conversion"
    }

    fn transform(&self, program: Program) -> Transformed {
        rewrite_operations(program, |op| match op {
            Operation::IndexScan(scan)
                if !scan.nested.references_tuple(scan.tuple_id) && !draws_counter(&scan.nested) =>
            {
                Ok(Operation::Filter {
                    condition: Condition::exists(scan.relation, scan.pattern),
                    nested: scan.nested,
                })
            }
            other => Err(other),
        })
    }
}
