//! Rewrites must not change what a program computes.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use ram_interpreter::ram_opt::transform::{
    CollapseFilters, ConvertExistenceChecks, CreateIndices, ExpandFilter, HoistAggregate,
    IfConversion, ReorderDelta,
};
use ram_interpreter::ram_opt::{PassName, Pipeline, PipelineConfig, Transformer};
use ram_interpreter::ram_ir::{
    AggregateOp, Condition, ConstraintOp, Expression, Operation, Pattern, Program, RamDomain,
    RelationDecl, Statement, delta_name, new_name,
};
use ram_interpreter::{Engine, EngineConfig, programs};

type Facts = Vec<(&'static str, Vec<RamDomain>)>;
type Contents = BTreeMap<String, BTreeSet<Vec<RamDomain>>>;

// --- Programs ---

/// `path(x, z) :- path(x, y), path(y, z).` in semi-naive form, with one
/// join per side of the delta.
fn self_join_closure() -> Program {
    let delta = delta_name("path");
    let new = new_name("path");
    let join = |outer: &str, inner: &str| {
        Operation::scan(
            outer,
            0,
            Operation::scan(
                inner,
                1,
                Operation::filter(
                    Condition::and(
                        Condition::equal(Expression::element(1, 0), Expression::element(0, 1)),
                        Condition::negate(Condition::exists(
                            "path",
                            Pattern::total(vec![
                                Expression::element(0, 0),
                                Expression::element(1, 1),
                            ]),
                        )),
                    ),
                    Operation::project(
                        new_name("path"),
                        vec![Expression::element(0, 0), Expression::element(1, 1)],
                    ),
                ),
            ),
        )
    };
    let copy = Operation::scan(
        "edge",
        0,
        Operation::project(
            "path",
            vec![Expression::element(0, 0), Expression::element(0, 1)],
        ),
    );
    Program::new(
        vec![
            RelationDecl::new("edge", 2),
            RelationDecl::new("path", 2),
            RelationDecl::new(delta.clone(), 2),
            RelationDecl::new(new.clone(), 2),
        ],
        Statement::Sequence(vec![
            Statement::query(copy),
            Statement::merge("path", delta.clone()),
            Statement::looped(vec![
                Statement::query(join(delta.as_str(), "path")),
                Statement::query(join("path", delta.as_str())),
                Statement::exit_when(Condition::empty(new.clone())),
                Statement::merge(new.clone(), "path"),
                Statement::swap(delta, new.clone()),
                Statement::clear(new),
            ]),
        ]),
    )
}

/// `linked(x) :- node(x), edge(x, _).` plus a per-node edge count and a
/// global maximum that does not depend on the outer node.
fn aggregates_and_semi_joins() -> Program {
    let linked = Operation::scan(
        "node",
        0,
        Operation::scan(
            "edge",
            1,
            Operation::filter(
                Condition::equal(Expression::element(1, 0), Expression::element(0, 0)),
                Operation::project("linked", vec![Expression::element(0, 0)]),
            ),
        ),
    );
    let degree = Operation::scan(
        "node",
        0,
        Operation::aggregate(
            "edge",
            1,
            AggregateOp::Count,
            Expression::UndefValue,
            Condition::equal(Expression::element(1, 0), Expression::element(0, 0)),
            Operation::project(
                "degree",
                vec![Expression::element(0, 0), Expression::element(1, 0)],
            ),
        ),
    );
    let widest = Operation::scan(
        "node",
        0,
        Operation::filter(
            Condition::constraint(
                ConstraintOp::Gt,
                Expression::element(0, 0),
                Expression::constant(1),
            ),
            Operation::aggregate(
                "edge",
                1,
                AggregateOp::Max,
                Expression::element(1, 1),
                Condition::True,
                Operation::project(
                    "widest",
                    vec![Expression::element(0, 0), Expression::element(1, 0)],
                ),
            ),
        ),
    );
    Program::new(
        vec![
            RelationDecl::new("node", 1),
            RelationDecl::new("edge", 2),
            RelationDecl::new("linked", 1),
            RelationDecl::new("degree", 2),
            RelationDecl::new("widest", 2),
        ],
        Statement::Sequence(vec![
            Statement::query(linked),
            Statement::query(degree),
            Statement::query(widest),
        ]),
    )
}

fn edge_facts(edges: &[(RamDomain, RamDomain)]) -> Facts {
    let mut facts: Facts = edges.iter().map(|&(x, y)| ("edge", vec![x, y])).collect();
    let nodes: BTreeSet<RamDomain> = edges.iter().flat_map(|&(x, y)| [x, y]).collect();
    facts.extend(nodes.into_iter().map(|n| ("node", vec![n])));
    facts
}

fn sample_facts() -> Facts {
    edge_facts(&[(1, 2), (2, 3), (3, 4), (2, 5), (5, 2), (6, 6)])
}

fn cases() -> Vec<(&'static str, Program)> {
    vec![
        ("transitive_closure", programs::transitive_closure()),
        ("self_join_closure", self_join_closure()),
        ("aggregates_and_semi_joins", aggregates_and_semi_joins()),
    ]
}

// --- Harness ---

/// Contents of every relation that is not a semi-naive buffer, plus the
/// number of loop rounds.
fn evaluate(program: &Program, facts: &Facts) -> (Contents, usize) {
    let engine = Engine::new(program, EngineConfig::default());
    for (relation, tuple) in facts {
        if engine.relation(relation).is_some() {
            engine.insert(relation, tuple).unwrap();
        }
    }
    engine.run();
    let contents = engine
        .database()
        .iter()
        .filter(|(name, _)| !name.starts_with('@'))
        .map(|(name, relation)| (name.to_string(), relation.snapshot().iter().collect()))
        .collect();
    (contents, engine.stats().loop_iterations)
}

fn passes() -> Vec<Box<dyn Transformer>> {
    vec![
        Box::new(ExpandFilter),
        Box::new(CreateIndices::new()),
        Box::new(CollapseFilters),
        Box::new(HoistAggregate::new()),
        Box::new(ReorderDelta),
        Box::new(IfConversion),
        Box::new(ConvertExistenceChecks),
    ]
}

// --- Single passes ---

#[test]
fn every_pass_preserves_results() {
    let facts = sample_facts();
    for (name, program) in cases() {
        let expected = evaluate(&program, &facts);
        for pass in passes() {
            let rewritten = pass.transform(program.clone()).program;
            rewritten.validate();
            assert_eq!(
                evaluate(&rewritten, &facts),
                expected,
                "{} changed the results of {name}",
                pass.name()
            );
        }
    }
}

#[test]
fn every_pipeline_prefix_preserves_results() {
    let facts = sample_facts();
    let order = PipelineConfig::default().passes;
    for (name, program) in cases() {
        let expected = evaluate(&program, &facts);
        for end in 1..=order.len() {
            let config = PipelineConfig::default().with_passes(order[..end].to_vec());
            let rewritten = Pipeline::from_config(&config).run(program.clone()).program;
            assert_eq!(
                evaluate(&rewritten, &facts),
                expected,
                "pipeline up to {:?} changed the results of {name}",
                order[end - 1]
            );
        }
    }
}

#[test]
fn default_pipeline_rewrites_every_case() {
    for (name, program) in cases() {
        let optimized = Pipeline::default().run(program.clone());
        assert!(optimized.changed, "{name} was left untouched");
        assert_ne!(optimized.program, program);
    }
}

#[test]
fn delta_reordering_puts_delta_outermost() {
    let program = self_join_closure();
    assert!(program.to_string().contains("FOR t0 IN path"));
    let listing = Pipeline::default().run(program).program.to_string();
    assert!(!listing.contains("FOR t0 IN path"), "{listing}");
}

#[test]
fn semi_join_becomes_existence_test() {
    let config = PipelineConfig::default().with_trace(true);
    let optimized = Pipeline::from_config(&config).run(aggregates_and_semi_joins());
    assert!(!optimized.trace.is_empty());
    let listing = optimized.program.to_string();
    assert!(!listing.contains("FOR t1 IN edge"), "{listing}");
}

// --- Idempotence ---

#[test]
fn filter_passes_are_idempotent() {
    for (_, program) in cases() {
        let collapsed = CollapseFilters.transform(program.clone()).program;
        let again = CollapseFilters.transform(collapsed.clone());
        assert!(!again.changed);
        assert_eq!(again.program, collapsed);

        let expanded = ExpandFilter.transform(program).program;
        let again = ExpandFilter.transform(expanded.clone());
        assert!(!again.changed);
        assert_eq!(again.program, expanded);
    }
}

#[test]
fn fixpoint_passes_stop_reporting_changes() {
    for (_, program) in cases() {
        let config = PipelineConfig::empty().with_passes(vec![
            PassName::ExpandFilter,
            PassName::CreateIndices,
            PassName::HoistAggregate,
        ]);
        let once = Pipeline::from_config(&config).run(program).program;
        let twice = Pipeline::from_config(&config).run(once.clone());
        assert!(!twice.changed);
        assert_eq!(twice.program, once);
    }
}

// --- Random inputs ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn optimized_programs_agree_on_random_graphs(
        edges in proptest::collection::vec((0..6i32, 0..6i32), 0..20)
    ) {
        let facts = edge_facts(&edges);
        for (name, program) in cases() {
            let optimized = Pipeline::default().run(program.clone()).program;
            prop_assert_eq!(
                evaluate(&optimized, &facts),
                evaluate(&program, &facts),
                "{}", name
            );
        }
    }
}
