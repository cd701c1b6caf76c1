//! Textual RAM listings.

use std::fmt::{self, Display, Formatter};

use crate::condition::Condition;
use crate::expression::{Expression, Pattern};
use crate::operation::Operation;
use crate::program::Program;
use crate::statement::Statement;

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(v) => write!(f, "number({v})"),
            Expression::StringConstant(s) => write!(f, "{s:?}"),
            Expression::TupleElement { tuple_id, element } => write!(f, "t{tuple_id}.{element}"),
            Expression::AutoIncrement => write!(f, "autoinc()"),
            Expression::UndefValue => write!(f, "⊥"),
            Expression::Intrinsic { op, kind, args } => {
                if op.is_infix() && args.len() == 2 {
                    write!(f, "({} {}{} {})", args[0], op.symbol(), kind.suffix(), args[1])
                } else {
                    write!(f, "{}{}(", op.symbol(), kind.suffix())?;
                    write_list(f, args)?;
                    write!(f, ")")
                }
            }
            Expression::PackRecord(args) => {
                write!(f, "[")?;
                write_list(f, args)?;
                write!(f, "]")
            }
            Expression::SubroutineArgument(i) => write!(f, "arg({i})"),
            Expression::RelationSize(r) => write!(f, "size({r})"),
        }
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match entry {
                Some(e) => write!(f, "{e}")?,
                None => write!(f, "_")?,
            }
        }
        write!(f, ")")
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Condition::True => write!(f, "true"),
            Condition::False => write!(f, "false"),
            Condition::Conjunction(lhs, rhs) => write!(f, "{lhs} AND {rhs}"),
            Condition::Negation(inner) => write!(f, "(NOT {inner})"),
            Condition::Constraint { op, kind, lhs, rhs } => {
                write!(f, "({lhs} {}{} {rhs})", op.symbol(), kind.suffix())
            }
            Condition::ExistenceCheck { relation, pattern } => write!(f, "{pattern} IN {relation}"),
            Condition::ProvenanceExistenceCheck { relation, pattern } => {
                write!(f, "{pattern} PROV IN {relation}")
            }
            Condition::EmptinessCheck(relation) => write!(f, "(ISEMPTY {relation})"),
        }
    }
}

fn write_list(f: &mut Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn pad(f: &mut Formatter<'_>, depth: usize) -> fmt::Result {
    write!(f, "{:width$}", "", width = depth * 2)
}

fn write_operation(f: &mut Formatter<'_>, op: &Operation, depth: usize) -> fmt::Result {
    pad(f, depth)?;
    match op {
        Operation::Scan(s) => {
            let mode = if s.pure_existence { "IF EXISTS " } else { "" };
            writeln!(f, "{mode}FOR t{} IN {}", s.tuple_id, s.relation)?;
        }
        Operation::IndexScan(s) => {
            let mode = if s.pure_existence { "IF EXISTS " } else { "" };
            writeln!(
                f,
                "{mode}FOR t{} IN {} ON INDEX {}",
                s.tuple_id, s.relation, s.pattern
            )?;
        }
        Operation::Choice(c) => {
            writeln!(f, "CHOICE t{} IN {} WHERE {}", c.tuple_id, c.relation, c.condition)?;
        }
        Operation::IndexChoice(c) => writeln!(
            f,
            "CHOICE t{} IN {} ON INDEX {} WHERE {}",
            c.tuple_id, c.relation, c.pattern, c.condition
        )?,
        Operation::Aggregate(a) => writeln!(
            f,
            "t{} = {}{} {} FOR ALL t{} IN {} WHERE {}",
            a.tuple_id,
            a.function.name(),
            a.kind.suffix(),
            a.expression,
            a.tuple_id,
            a.relation,
            a.condition
        )?,
        Operation::IndexAggregate(a) => writeln!(
            f,
            "t{} = {}{} {} FOR ALL t{} IN {} ON INDEX {} WHERE {}",
            a.tuple_id,
            a.function.name(),
            a.kind.suffix(),
            a.expression,
            a.tuple_id,
            a.relation,
            a.pattern,
            a.condition
        )?,
        Operation::UnpackRecord(u) => writeln!(
            f,
            "UNPACK t{} ARITY {} FROM {}",
            u.tuple_id, u.arity, u.expression
        )?,
        Operation::Filter { condition, .. } => writeln!(f, "IF {condition}")?,
        Operation::Break { condition, .. } => writeln!(f, "IF {condition} BREAK")?,
        Operation::Project { relation, values } => {
            write!(f, "INSERT (")?;
            write_list(f, values)?;
            writeln!(f, ") INTO {relation}")?;
        }
        Operation::SubroutineReturn(values) => {
            write!(f, "RETURN (")?;
            write_list(f, values)?;
            writeln!(f, ")")?;
        }
    }
    match op.nested() {
        Some(nested) => write_operation(f, nested, depth + 1),
        None => Ok(()),
    }
}

fn write_statement(f: &mut Formatter<'_>, stmt: &Statement, depth: usize) -> fmt::Result {
    match stmt {
        Statement::Sequence(children) => {
            for child in children {
                write_statement(f, child, depth)?;
            }
            Ok(())
        }
        Statement::Parallel(children) => {
            pad(f, depth)?;
            writeln!(f, "PARALLEL")?;
            for child in children {
                write_statement(f, child, depth + 1)?;
            }
            pad(f, depth)?;
            writeln!(f, "END PARALLEL")
        }
        Statement::Loop(body) => {
            pad(f, depth)?;
            writeln!(f, "LOOP")?;
            write_statement(f, body, depth + 1)?;
            pad(f, depth)?;
            writeln!(f, "END LOOP")
        }
        Statement::Exit(condition) => {
            pad(f, depth)?;
            writeln!(f, "EXIT {condition}")
        }
        Statement::Query(op) => {
            pad(f, depth)?;
            writeln!(f, "QUERY")?;
            write_operation(f, op, depth + 1)
        }
        Statement::Swap(a, b) => {
            pad(f, depth)?;
            writeln!(f, "SWAP ({a}, {b})")
        }
        Statement::Merge { source, target } => {
            pad(f, depth)?;
            writeln!(f, "MERGE {source} INTO {target}")
        }
        Statement::Extend { source, target } => {
            pad(f, depth)?;
            writeln!(f, "EXTEND {target} WITH {source}")
        }
        Statement::LogSize { message, relation } => {
            pad(f, depth)?;
            writeln!(f, "LOGSIZE {relation} TEXT {message:?}")
        }
        Statement::Clear(relation) => {
            pad(f, depth)?;
            writeln!(f, "CLEAR {relation}")
        }
        Statement::Call(name) => {
            pad(f, depth)?;
            writeln!(f, "CALL {name}")
        }
        Statement::LogTimer { message, statement }
        | Statement::DebugInfo { message, statement } => {
            pad(f, depth)?;
            writeln!(f, "BEGIN {message:?}")?;
            write_statement(f, statement, depth + 1)?;
            pad(f, depth)?;
            writeln!(f, "END")
        }
        Statement::LogRelationTimer {
            message,
            relation,
            statement,
        } => {
            pad(f, depth)?;
            writeln!(f, "BEGIN {message:?} ON {relation}")?;
            write_statement(f, statement, depth + 1)?;
            pad(f, depth)?;
            writeln!(f, "END")
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_operation(f, self, 0)
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_statement(f, self, 0)
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "PROGRAM")?;
        for decl in &self.relations {
            write!(f, "  DECLARE {}(", decl.name)?;
            for (i, attr) in decl.attributes.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{attr}")?;
            }
            writeln!(f, ") {:?}", decl.representation)?;
        }
        for (name, body) in &self.subroutines {
            writeln!(f, "SUBROUTINE {name}")?;
            write_statement(f, body, 1)?;
            writeln!(f, "END SUBROUTINE")?;
        }
        writeln!(f, "BEGIN MAIN")?;
        write_statement(f, &self.main, 1)?;
        writeln!(f, "END MAIN")
    }
}
