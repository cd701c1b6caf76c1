//! Property tests for level and index analyses.

use proptest::prelude::*;

use ram_ir::{
    Condition, Expression, IntrinsicOp, Operation, Pattern, Program, RelationDecl, Statement,
};
use ram_opt::{IndexAnalysis, IndexStrategy, LevelAnalysis, collect_searches};

// --- Generators ---

fn arb_constant_expression() -> impl Strategy<Value = Expression> {
    let leaf = prop_oneof![
        (-100..100i32).prop_map(Expression::constant),
        Just(Expression::AutoIncrement),
        Just(Expression::UndefValue),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 2..=2)
                .prop_map(|args| Expression::intrinsic(IntrinsicOp::Add, args)),
            proptest::collection::vec(inner, 1..3).prop_map(Expression::PackRecord),
        ]
    })
}

fn arb_expression() -> impl Strategy<Value = Expression> {
    prop_oneof![
        arb_constant_expression(),
        (0..5usize, 0..3usize).prop_map(|(t, e)| Expression::element(t, e)),
    ]
}

fn arb_pattern(arity: usize) -> impl Strategy<Value = Pattern> {
    proptest::collection::vec(
        proptest::option::of((0..3usize).prop_map(|t| Expression::element(t, 0))),
        arity..=arity,
    )
    .prop_map(Pattern)
}

fn program_searching(patterns: Vec<Pattern>) -> Program {
    let queries = patterns
        .into_iter()
        .enumerate()
        .map(|(i, pattern)| {
            Statement::query(Operation::filter(
                Condition::exists("r", pattern),
                Operation::project("out", vec![Expression::constant(i as i32)]),
            ))
        })
        .collect();
    Program::new(
        vec![RelationDecl::new("r", 4), RelationDecl::new("out", 1)],
        Statement::Sequence(queries),
    )
}

// --- Level analysis ---

proptest! {
    #[test]
    fn constant_expressions_have_no_level(expr in arb_constant_expression()) {
        prop_assert_eq!(LevelAnalysis::new().expression(&expr), None);
    }

    #[test]
    fn constraint_level_is_max_of_sides(lhs in arb_expression(), rhs in arb_expression()) {
        let la = LevelAnalysis::new();
        let condition = Condition::equal(lhs.clone(), rhs.clone());
        prop_assert_eq!(la.condition(&condition), la.expression(&lhs).max(la.expression(&rhs)));
    }

    #[test]
    fn conjunction_level_is_max(lhs in arb_expression(), rhs in arb_expression()) {
        let la = LevelAnalysis::new();
        let a = Condition::equal(lhs, Expression::constant(0));
        let b = Condition::equal(rhs, Expression::constant(0));
        let both = Condition::and(a.clone(), b.clone());
        prop_assert_eq!(la.condition(&both), la.condition(&a).max(la.condition(&b)));
    }
}

#[test]
fn tuple_element_level_is_its_tuple() {
    let la = LevelAnalysis::new();
    for t in 0..6 {
        assert_eq!(la.expression(&Expression::element(t, 2)), Some(t));
    }
}

// --- Index selection ---

proptest! {
    #[test]
    fn every_search_is_covered(
        patterns in proptest::collection::vec(arb_pattern(4), 1..8),
        chain in any::<bool>(),
    ) {
        let program = program_searching(patterns);
        let strategy = if chain { IndexStrategy::ChainCover } else { IndexStrategy::Greedy };
        let analysis = IndexAnalysis::run(&program, strategy);
        let searches = collect_searches(&program);
        for (relation, demanded) in &searches {
            let cluster = analysis.cluster(relation).expect("declared relation has a cluster");
            for signature in demanded {
                prop_assert!(cluster.covering(*signature).is_some());
            }
        }
    }

    #[test]
    fn chain_cover_is_never_larger(patterns in proptest::collection::vec(arb_pattern(4), 1..8)) {
        let program = program_searching(patterns);
        let greedy = IndexAnalysis::run(&program, IndexStrategy::Greedy);
        let chain = IndexAnalysis::run(&program, IndexStrategy::ChainCover);
        let size = |a: &IndexAnalysis| a.cluster("r").map_or(0, |c| c.orders().len());
        prop_assert!(size(&chain) <= size(&greedy));
    }
}
