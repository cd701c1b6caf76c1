//! Ready-made RAM programs in the shape a Datalog translator emits.

use ram_ir::{
    Condition, Expression, Operation, Pattern, Program, RelationDecl, Statement, delta_name,
    new_name,
};

/// Semi-naive transitive closure over a binary `edge` relation:
///
/// ```text
/// path(x, y) :- edge(x, y).
/// path(x, z) :- path(x, y), edge(y, z).
/// ```
///
/// Joins are written as scans guarded by equality filters, the way they
/// look before index selection.
pub fn transitive_closure() -> Program {
    let delta = delta_name("path");
    let new = new_name("path");

    let base = Operation::scan(
        "edge",
        0,
        Operation::project(
            "path",
            vec![Expression::element(0, 0), Expression::element(0, 1)],
        ),
    );
    let step = Operation::scan(
        delta.clone(),
        0,
        Operation::scan(
            "edge",
            1,
            Operation::filter(
                Condition::and(
                    Condition::equal(Expression::element(0, 1), Expression::element(1, 0)),
                    Condition::negate(Condition::exists(
                        "path",
                        Pattern::total(vec![Expression::element(0, 0), Expression::element(1, 1)]),
                    )),
                ),
                Operation::project(
                    new.clone(),
                    vec![Expression::element(0, 0), Expression::element(1, 1)],
                ),
            ),
        ),
    );

    let relations = vec![
        RelationDecl::new("edge", 2),
        RelationDecl::new("path", 2),
        RelationDecl::new(delta.clone(), 2),
        RelationDecl::new(new.clone(), 2),
    ];
    let main = Statement::Sequence(vec![
        Statement::query(base),
        Statement::merge("path", delta.clone()),
        Statement::LogTimer {
            message: "path fixpoint".into(),
            statement: Box::new(Statement::looped(vec![
                Statement::query(step),
                Statement::exit_when(Condition::empty(new.clone())),
                Statement::merge(new.clone(), "path"),
                Statement::swap(delta, new.clone()),
                Statement::clear(new),
            ])),
        },
    ]);
    Program::new(relations, main)
}

/// Edges of the chain `0 → 1 → … → n`.
pub fn chain(n: i32) -> impl Iterator<Item = [i32; 2]> {
    (0..n).map(|i| [i, i + 1])
}
