//! The RAM interpreter.
//!
//! Statements run against a [`Database`] built from the program's relation
//! declarations, with one physical index per order the index analysis
//! selected. Queries are nested loops over relation snapshots, so tuples a
//! query inserts are never seen by its own scans.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::time::Instant;

use ram_ir::{
    AggregateOp, Condition, Expression, NumericKind, Operation, Pattern, Program, RamDomain,
    Statement, fatal,
};
use ram_opt::IndexAnalysis;
use ram_store::{
    Database, RecordTable, Relation, RelationInterface, StoreError, SymbolTable, Tuple,
};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, info_span, trace, warn};

use crate::aggregators::apply_aggregator;
use crate::config::EngineConfig;
use crate::context::Context;
use crate::expr::{self, RegexCache};

/// Partitions handed to the pool per worker for a parallel scan.
const PARTITIONS_PER_THREAD: usize = 4;

/// Counters accumulated over every run of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    /// Executions of loop bodies, including the final one that exits.
    pub loop_iterations: usize,
    /// Tuples that were new to the relation they were projected into.
    pub tuples_inserted: usize,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} loop iterations, {} tuples inserted",
            self.loop_iterations, self.tuples_inserted
        )
    }
}

/// The evaluation engine state.
#[derive(Debug)]
pub struct Engine {
    program: Program,
    /// Storage for each relation.
    database: Database,
    symbols: Arc<SymbolTable>,
    records: Arc<RecordTable>,
    config: EngineConfig,
    /// Workers for partitioned scans and parallel statements.
    pool: Option<ThreadPool>,
    /// Next value handed out by `autoinc()`.
    counter: AtomicI32,
    regexes: RegexCache,
    loop_iterations: AtomicUsize,
    tuples_inserted: AtomicUsize,
}

/// The parts of an aggregate that drive its fold.
struct Fold<'op> {
    tuple_id: usize,
    function: AggregateOp,
    kind: NumericKind,
    expression: &'op Expression,
    condition: &'op Condition,
    nested: &'op Operation,
}

impl Engine {
    /// Create an engine for `program` with empty relations.
    ///
    /// Panics if the program is malformed.
    pub fn new(program: &Program, config: EngineConfig) -> Self {
        program.validate();
        let analysis = IndexAnalysis::run(program, config.index_strategy);
        let mut database = Database::new();
        for decl in &program.relations {
            let orders = analysis
                .cluster(&decl.name)
                .map(|cluster| cluster.orders().to_vec())
                .unwrap_or_default();
            database.add(decl.clone(), orders);
        }
        let pool = build_pool(&config);
        Engine {
            program: program.clone(),
            database,
            symbols: Arc::new(SymbolTable::new()),
            records: Arc::new(RecordTable::new()),
            config,
            pool,
            counter: AtomicI32::new(0),
            regexes: RegexCache::new(),
            loop_iterations: AtomicUsize::new(0),
            tuples_inserted: AtomicUsize::new(0),
        }
    }

    /// Share symbol and record tables with other engines or with the code
    /// that loads facts.
    pub fn with_tables(mut self, symbols: Arc<SymbolTable>, records: Arc<RecordTable>) -> Self {
        self.symbols = symbols;
        self.records = records;
        self
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    pub fn records(&self) -> &Arc<RecordTable> {
        &self.records
    }

    /// Get a relation by name.
    pub fn relation(&self, name: &str) -> Option<&Arc<Relation>> {
        self.database.relation(name)
    }

    /// Insert a fact into a relation. Returns true if it was new.
    pub fn insert(&self, relation: &str, tuple: &[RamDomain]) -> Result<bool, StoreError> {
        let relation = self.database.get(relation)?;
        RelationInterface::insert(&**relation, tuple)
    }

    /// Run the main program.
    pub fn run(&self) {
        info!(relations = self.database.len(), "running program");
        let start = Instant::now();
        let mut returns = Vec::new();
        self.execute(&self.program.main, &[], &mut returns);
        info!(elapsed = ?start.elapsed(), stats = %self.stats(), "program finished");
    }

    /// Run subroutine `name` with `args` and collect the values it returns.
    ///
    /// Panics if no such subroutine exists.
    pub fn execute_subroutine(&self, name: &str, args: &[RamDomain]) -> Vec<RamDomain> {
        let body = self.subroutine(name);
        debug!(subroutine = name, ?args, "executing subroutine");
        let mut returns = Vec::new();
        self.execute(body, args, &mut returns);
        returns
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            loop_iterations: self.loop_iterations.load(Ordering::Relaxed),
            tuples_inserted: self.tuples_inserted.load(Ordering::Relaxed),
        }
    }

    fn subroutine(&self, name: &str) -> &Statement {
        match self.program.subroutines.get(name) {
            Some(body) => body,
            None => fatal!("unknown subroutine `{name}`"),
        }
    }

    fn relation_of(&self, name: &str) -> &Arc<Relation> {
        match self.database.get(name) {
            Ok(relation) => relation,
            Err(error) => fatal!("{error}"),
        }
    }

    /// Execute a statement. False stops the enclosing sequence or loop.
    fn execute(
        &self,
        statement: &Statement,
        args: &[RamDomain],
        returns: &mut Vec<RamDomain>,
    ) -> bool {
        match statement {
            Statement::Sequence(children) => {
                children.iter().all(|child| self.execute(child, args, returns))
            }
            Statement::Parallel(children) => self.execute_parallel(children, args, returns),
            Statement::Loop(body) => {
                let mut iterations = 0usize;
                loop {
                    iterations += 1;
                    self.loop_iterations.fetch_add(1, Ordering::Relaxed);
                    trace!(iteration = iterations, "loop round");
                    if !self.execute(body, args, returns) {
                        break;
                    }
                }
                debug!(iterations, "loop reached fixpoint");
                true
            }
            Statement::Exit(condition) => !self.holds(condition, &Context::new(args)),
            Statement::Query(root) => {
                returns.extend(self.execute_query(root, args));
                true
            }
            Statement::Swap(a, b) => {
                if let Err(error) = self.database.swap(a, b) {
                    fatal!("{error}");
                }
                true
            }
            Statement::Merge { source, target } => {
                let added = self
                    .relation_of(target)
                    .merge_from(self.relation_of(source));
                trace!(source = %source, target = %target, added, "merge");
                true
            }
            Statement::Extend { source, target } => {
                let source_rel = self.relation_of(source);
                let target_rel = self.relation_of(target);
                source_rel.extend_from(target_rel);
                let added = target_rel.merge_from(source_rel);
                trace!(source = %source, target = %target, added, "extend");
                true
            }
            Statement::Clear(relation) => {
                self.relation_of(relation).purge();
                true
            }
            Statement::Call(name) => self.execute(self.subroutine(name), args, returns),
            Statement::LogTimer { message, statement } => {
                self.timed(message, None, || self.execute(statement, args, returns))
            }
            Statement::LogRelationTimer {
                message,
                relation,
                statement,
            } => self.timed(message, Some(relation.as_str()), || {
                self.execute(statement, args, returns)
            }),
            Statement::LogSize { message, relation } => {
                let size = self.relation_of(relation).len();
                let round = self.loop_iterations.load(Ordering::Relaxed);
                info!(message = %message, relation = %relation, size, round, "relation size");
                true
            }
            Statement::DebugInfo { message, statement } => {
                debug!(message = %message, "debug info");
                self.execute(statement, args, returns)
            }
        }
    }

    /// Run every child, on the pool if there is one. Results are joined in
    /// child order.
    fn execute_parallel(
        &self,
        children: &[Statement],
        args: &[RamDomain],
        returns: &mut Vec<RamDomain>,
    ) -> bool {
        let run = |child: &Statement| {
            let mut local = Vec::new();
            let ok = self.execute(child, args, &mut local);
            (ok, local)
        };
        let results: Vec<(bool, Vec<RamDomain>)> = match &self.pool {
            Some(pool) => pool.install(|| children.par_iter().map(run).collect()),
            None => children.iter().map(run).collect(),
        };
        let mut all_ok = true;
        for (ok, local) in results {
            all_ok &= ok;
            returns.extend(local);
        }
        all_ok
    }

    fn timed(&self, message: &str, relation: Option<&str>, run: impl FnOnce() -> bool) -> bool {
        let span = info_span!("timer", message);
        let _entered = span.enter();
        let start = Instant::now();
        let result = run();
        let elapsed = start.elapsed();
        let size = relation.map(|r| self.relation_of(r).len());
        if self.config.profile {
            info!(message, ?elapsed, ?size, "timer");
        } else {
            debug!(message, ?elapsed, ?size, "timer");
        }
        result
    }

    fn execute_query(&self, root: &Operation, args: &[RamDomain]) -> Vec<RamDomain> {
        let mut ctx = Context::new(args);
        let partitioned = match &self.pool {
            Some(pool) => self.execute_partitioned(pool, root, &mut ctx),
            None => false,
        };
        if !partitioned {
            self.execute_operation(root, &mut ctx);
        }
        ctx.into_returns()
    }

    /// Split an outermost scan over the pool. False if the query is not a
    /// plain scan, a `Break` can stop it, or its relation is too small, and
    /// nothing ran.
    fn execute_partitioned(
        &self,
        pool: &ThreadPool,
        root: &Operation,
        ctx: &mut Context<'_>,
    ) -> bool {
        let (relation, tuple_id, pattern, nested) = match root {
            Operation::Scan(scan) if !scan.pure_existence => {
                (&scan.relation, scan.tuple_id, None, &*scan.nested)
            }
            Operation::IndexScan(scan) if !scan.pure_existence => (
                &scan.relation,
                scan.tuple_id,
                Some(&scan.pattern),
                &*scan.nested,
            ),
            _ => return false,
        };
        if breaks_enclosing_scan(nested) {
            return false;
        }
        let source = self.relation_of(relation);
        let snapshot = source.snapshot();
        if snapshot.len() < self.config.parallel_threshold {
            return false;
        }
        let pattern = match pattern {
            Some(pattern) => self.range_pattern(pattern, ctx),
            None => vec![None; source.arity()],
        };
        let partitions =
            snapshot.partition(&pattern, self.config.num_threads * PARTITIONS_PER_THREAD);
        trace!(relation = %relation, partitions = partitions.len(), "partitioned scan");
        let template = ctx.fork();
        let returns: Vec<Vec<RamDomain>> = pool.install(|| {
            partitions
                .into_par_iter()
                .map(|partition| {
                    let mut local = template.fork();
                    self.scan_tuples(partition, tuple_id, nested, false, &mut local);
                    local.into_returns()
                })
                .collect()
        });
        for local in returns {
            ctx.absorb(local);
        }
        true
    }

    /// Execute an operation. False means a `Break` fired and the enclosing
    /// loop must stop.
    fn execute_operation(&self, op: &Operation, ctx: &mut Context<'_>) -> bool {
        match op {
            Operation::Scan(scan) => {
                let snapshot = self.relation_of(&scan.relation).snapshot();
                self.scan_tuples(
                    snapshot.iter(),
                    scan.tuple_id,
                    &scan.nested,
                    scan.pure_existence,
                    ctx,
                )
            }
            Operation::IndexScan(scan) => {
                let pattern = self.range_pattern(&scan.pattern, ctx);
                let snapshot = self.relation_of(&scan.relation).snapshot();
                self.scan_tuples(
                    snapshot.range(&pattern),
                    scan.tuple_id,
                    &scan.nested,
                    scan.pure_existence,
                    ctx,
                )
            }
            Operation::Choice(choice) => {
                let snapshot = self.relation_of(&choice.relation).snapshot();
                self.choose(
                    snapshot.iter(),
                    choice.tuple_id,
                    &choice.condition,
                    &choice.nested,
                    ctx,
                )
            }
            Operation::IndexChoice(choice) => {
                let pattern = self.range_pattern(&choice.pattern, ctx);
                let snapshot = self.relation_of(&choice.relation).snapshot();
                self.choose(
                    snapshot.range(&pattern),
                    choice.tuple_id,
                    &choice.condition,
                    &choice.nested,
                    ctx,
                )
            }
            Operation::Aggregate(agg) => {
                let snapshot = self.relation_of(&agg.relation).snapshot();
                let fold = Fold {
                    tuple_id: agg.tuple_id,
                    function: agg.function,
                    kind: agg.kind,
                    expression: &agg.expression,
                    condition: &agg.condition,
                    nested: &agg.nested,
                };
                self.aggregate(snapshot.iter(), &fold, ctx)
            }
            Operation::IndexAggregate(agg) => {
                let pattern = self.range_pattern(&agg.pattern, ctx);
                let snapshot = self.relation_of(&agg.relation).snapshot();
                let fold = Fold {
                    tuple_id: agg.tuple_id,
                    function: agg.function,
                    kind: agg.kind,
                    expression: &agg.expression,
                    condition: &agg.condition,
                    nested: &agg.nested,
                };
                self.aggregate(snapshot.range(&pattern), &fold, ctx)
            }
            Operation::UnpackRecord(unpack) => {
                let id = self.eval(&unpack.expression, ctx);
                match self.records.unpack(id, unpack.arity) {
                    Some(fields) => {
                        ctx.bind(unpack.tuple_id, fields.to_vec());
                        self.execute_operation(&unpack.nested, ctx)
                    }
                    None => true,
                }
            }
            Operation::Filter { condition, nested } => {
                if self.holds(condition, ctx) {
                    self.execute_operation(nested, ctx)
                } else {
                    true
                }
            }
            Operation::Break { condition, nested } => {
                if self.holds(condition, ctx) {
                    false
                } else {
                    self.execute_operation(nested, ctx)
                }
            }
            Operation::Project { relation, values } => {
                let tuple: Tuple = values.iter().map(|v| self.eval(v, ctx)).collect();
                if self.relation_of(relation).insert(&tuple) {
                    self.tuples_inserted.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
            Operation::SubroutineReturn(values) => {
                for value in values {
                    let value = match value {
                        Expression::UndefValue => 0,
                        other => self.eval(other, ctx),
                    };
                    ctx.emit(value);
                }
                true
            }
        }
    }

    fn scan_tuples(
        &self,
        tuples: impl Iterator<Item = Tuple>,
        tuple_id: usize,
        nested: &Operation,
        pure_existence: bool,
        ctx: &mut Context<'_>,
    ) -> bool {
        for tuple in tuples {
            ctx.bind(tuple_id, tuple);
            if !self.execute_operation(nested, ctx) || pure_existence {
                break;
            }
        }
        true
    }

    /// Bind the first tuple satisfying `condition` and run `nested` once.
    fn choose(
        &self,
        tuples: impl Iterator<Item = Tuple>,
        tuple_id: usize,
        condition: &Condition,
        nested: &Operation,
        ctx: &mut Context<'_>,
    ) -> bool {
        for tuple in tuples {
            ctx.bind(tuple_id, tuple);
            if self.holds(condition, ctx) {
                self.execute_operation(nested, ctx);
                break;
            }
        }
        true
    }

    fn aggregate(
        &self,
        tuples: impl Iterator<Item = Tuple>,
        fold: &Fold<'_>,
        ctx: &mut Context<'_>,
    ) -> bool {
        let mut values = Vec::new();
        for tuple in tuples {
            ctx.bind(fold.tuple_id, tuple);
            if !self.holds(fold.condition, ctx) {
                continue;
            }
            values.push(match fold.function {
                AggregateOp::Count => 0,
                _ => self.eval(fold.expression, ctx),
            });
        }
        match apply_aggregator(fold.function, fold.kind, &values) {
            Some(result) => {
                ctx.bind(fold.tuple_id, vec![result]);
                self.execute_operation(fold.nested, ctx)
            }
            None => true,
        }
    }

    fn range_pattern(&self, pattern: &Pattern, ctx: &Context<'_>) -> Vec<Option<RamDomain>> {
        pattern
            .0
            .iter()
            .map(|entry| entry.as_ref().map(|e| self.eval(e, ctx)))
            .collect()
    }

    fn holds(&self, condition: &Condition, ctx: &Context<'_>) -> bool {
        match condition {
            Condition::True => true,
            Condition::False => false,
            Condition::Conjunction(lhs, rhs) => self.holds(lhs, ctx) && self.holds(rhs, ctx),
            Condition::Negation(inner) => !self.holds(inner, ctx),
            Condition::Constraint { op, kind, lhs, rhs } => {
                let lhs = self.eval(lhs, ctx);
                let rhs = self.eval(rhs, ctx);
                expr::compare(*op, *kind, lhs, rhs, &self.symbols, &self.regexes)
            }
            Condition::ExistenceCheck { relation, pattern } => self
                .relation_of(relation)
                .exists(&self.range_pattern(pattern, ctx)),
            Condition::ProvenanceExistenceCheck { relation, pattern } => self
                .relation_of(relation)
                .exists_with_provenance(&self.range_pattern(pattern, ctx)),
            Condition::EmptinessCheck(relation) => self.relation_of(relation).is_empty(),
        }
    }

    fn eval(&self, expression: &Expression, ctx: &Context<'_>) -> RamDomain {
        match expression {
            Expression::Constant(value) => *value,
            Expression::StringConstant(text) => self.symbols.intern(text),
            Expression::TupleElement { tuple_id, element } => ctx.element(*tuple_id, *element),
            Expression::AutoIncrement => self.counter.fetch_add(1, Ordering::Relaxed),
            Expression::UndefValue => fatal!("undefined value evaluated outside a return"),
            Expression::Intrinsic { op, kind, args } => {
                let values: Vec<RamDomain> = args.iter().map(|a| self.eval(a, ctx)).collect();
                expr::intrinsic(*op, *kind, &values, &self.symbols)
            }
            Expression::PackRecord(args) => {
                let values: Vec<RamDomain> = args.iter().map(|a| self.eval(a, ctx)).collect();
                self.records.pack(&values)
            }
            Expression::SubroutineArgument(index) => ctx.argument(*index),
            Expression::RelationSize(relation) => self.relation_of(relation).len() as RamDomain,
        }
    }
}

/// Whether a `Break` in `op` can stop the scan that directly encloses it.
///
/// A break stops only the innermost scan, so nested scans and choices hide
/// the breaks below them.
fn breaks_enclosing_scan(op: &Operation) -> bool {
    match op {
        Operation::Break { .. } => true,
        Operation::Filter { nested, .. } => breaks_enclosing_scan(nested),
        Operation::UnpackRecord(unpack) => breaks_enclosing_scan(&unpack.nested),
        Operation::Aggregate(agg) => breaks_enclosing_scan(&agg.nested),
        Operation::IndexAggregate(agg) => breaks_enclosing_scan(&agg.nested),
        Operation::Scan(_)
        | Operation::IndexScan(_)
        | Operation::Choice(_)
        | Operation::IndexChoice(_)
        | Operation::Project { .. }
        | Operation::SubroutineReturn(_) => false,
    }
}

fn build_pool(config: &EngineConfig) -> Option<ThreadPool> {
    if !config.is_parallel() {
        return None;
    }
    match ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .thread_name(|i| format!("ram-worker-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(error) => {
            warn!(%error, "could not start worker pool, running sequentially");
            None
        }
    }
}
