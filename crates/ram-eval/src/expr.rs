//! Built-in operators over domain values.
//!
//! Operands arrive already evaluated. The operator's [`NumericKind`] says
//! how to read their bits; string operators resolve symbol ids through the
//! [`SymbolTable`] and intern their results.

use std::sync::Arc;

use parking_lot::Mutex;
use ram_ir::types::{from_float, from_unsigned, to_float, to_unsigned};
use ram_ir::{
    ConstraintOp, IntrinsicOp as Op, NumericKind, RamDomain, RamFloat, RamSigned, fatal,
};
use ram_store::SymbolTable;
use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::warn;

/// Evaluate an intrinsic operator.
pub fn intrinsic(
    op: Op,
    kind: NumericKind,
    args: &[RamDomain],
    symbols: &SymbolTable,
) -> RamDomain {
    if let Some(arity) = op.arity()
        && args.len() != arity
    {
        fatal!(
            "{} takes {arity} arguments, {} were given",
            op.symbol(),
            args.len()
        );
    }
    match op {
        Op::Neg => match kind {
            NumericKind::Signed => args[0].wrapping_neg(),
            NumericKind::Unsigned => from_unsigned(to_unsigned(args[0]).wrapping_neg()),
            NumericKind::Float => from_float(-to_float(args[0])),
        },
        Op::BNot => !args[0],
        Op::LNot => RamDomain::from(args[0] == 0),
        Op::Ord => args[0],
        Op::StrLen => resolve(symbols, args[0]).len() as RamDomain,
        Op::ToNumber => {
            let text = resolve(symbols, args[0]);
            match text.trim().parse::<RamSigned>() {
                Ok(value) => value,
                Err(_) => fatal!("to_number: `{text}` is not a number"),
            }
        }
        Op::ToString => {
            let text = match kind {
                NumericKind::Signed => args[0].to_string(),
                NumericKind::Unsigned => to_unsigned(args[0]).to_string(),
                NumericKind::Float => to_float(args[0]).to_string(),
            };
            symbols.intern(&text)
        }
        Op::ToFloat => match kind {
            NumericKind::Signed => from_float(args[0] as RamFloat),
            NumericKind::Unsigned => from_float(to_unsigned(args[0]) as RamFloat),
            NumericKind::Float => args[0],
        },
        Op::ToSigned => match kind {
            NumericKind::Signed | NumericKind::Unsigned => args[0],
            NumericKind::Float => to_float(args[0]) as RamSigned,
        },
        Op::ToUnsigned => match kind {
            NumericKind::Signed | NumericKind::Unsigned => args[0],
            NumericKind::Float => from_unsigned(to_float(args[0]) as u32),
        },
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Exp => {
            arithmetic(op, kind, args[0], args[1])
        }
        Op::BAnd => integral(op, kind, args[0] & args[1]),
        Op::BOr => integral(op, kind, args[0] | args[1]),
        Op::BXor => integral(op, kind, args[0] ^ args[1]),
        Op::BShiftL => integral(
            op,
            kind,
            from_unsigned(to_unsigned(args[0]).wrapping_shl(to_unsigned(args[1]))),
        ),
        Op::BShiftR => match kind {
            NumericKind::Unsigned => {
                from_unsigned(to_unsigned(args[0]).wrapping_shr(to_unsigned(args[1])))
            }
            _ => integral(op, kind, args[0].wrapping_shr(to_unsigned(args[1]))),
        },
        Op::LAnd => RamDomain::from(args[0] != 0 && args[1] != 0),
        Op::LOr => RamDomain::from(args[0] != 0 || args[1] != 0),
        Op::Max | Op::Min => {
            let Some((&first, rest)) = args.split_first() else {
                fatal!("{} needs at least one argument", op.symbol());
            };
            rest.iter().fold(first, |acc, &value| {
                let keep_acc = match compare_values(kind, acc, value) {
                    std::cmp::Ordering::Less => op == Op::Min,
                    std::cmp::Ordering::Greater => op == Op::Max,
                    std::cmp::Ordering::Equal => true,
                };
                if keep_acc { acc } else { value }
            })
        }
        Op::Cat => {
            let mut out = String::new();
            for &arg in args {
                out.push_str(&resolve(symbols, arg));
            }
            symbols.intern(&out)
        }
        Op::SubStr => {
            let text = resolve(symbols, args[0]);
            symbols.intern(substring(&text, args[1], args[2]))
        }
    }
}

fn arithmetic(op: Op, kind: NumericKind, a: RamDomain, b: RamDomain) -> RamDomain {
    match kind {
        NumericKind::Signed => match op {
            Op::Add => a.wrapping_add(b),
            Op::Sub => a.wrapping_sub(b),
            Op::Mul => a.wrapping_mul(b),
            Op::Div | Op::Mod if b == 0 => {
                fatal!("division by zero in {a} {} {b}", op.symbol())
            }
            Op::Div => a.wrapping_div(b),
            Op::Mod => a.wrapping_rem(b),
            Op::Exp => (a as f64).powf(b as f64) as RamSigned,
            _ => fatal!("{} is not an arithmetic operator", op.symbol()),
        },
        NumericKind::Unsigned => {
            let (a, b) = (to_unsigned(a), to_unsigned(b));
            from_unsigned(match op {
                Op::Add => a.wrapping_add(b),
                Op::Sub => a.wrapping_sub(b),
                Op::Mul => a.wrapping_mul(b),
                Op::Div | Op::Mod if b == 0 => {
                    fatal!("division by zero in {a} {}u {b}", op.symbol())
                }
                Op::Div => a / b,
                Op::Mod => a % b,
                Op::Exp => (a as f64).powf(b as f64) as u32,
                _ => fatal!("{} is not an arithmetic operator", op.symbol()),
            })
        }
        NumericKind::Float => {
            let (a, b) = (to_float(a), to_float(b));
            from_float(match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                Op::Div if b == 0.0 => fatal!("division by zero in {a} /f {b}"),
                Op::Div => a / b,
                Op::Mod => fatal!("% is not defined on floats"),
                Op::Exp => a.powf(b),
                _ => fatal!("{} is not an arithmetic operator", op.symbol()),
            })
        }
    }
}

/// Bitwise results are kind-independent, but floats have no bitwise ops.
fn integral(op: Op, kind: NumericKind, value: RamDomain) -> RamDomain {
    if kind == NumericKind::Float {
        fatal!("{} is not defined on floats", op.symbol());
    }
    value
}

/// `len` bytes of `text` from byte offset `start`, clamped to the end.
/// Out-of-range or mid-character offsets give the empty string.
fn substring(text: &str, start: RamDomain, len: RamDomain) -> &str {
    let Ok(start) = usize::try_from(start) else {
        warn!(text, start, len, "substr start is negative");
        return "";
    };
    let end = match usize::try_from(len) {
        Ok(len) => start.saturating_add(len).min(text.len()),
        Err(_) => text.len(),
    };
    match text.get(start..end.max(start)) {
        Some(sub) => sub,
        None => {
            warn!(text, start, len, "substr range is outside the string");
            ""
        }
    }
}

fn resolve(symbols: &SymbolTable, id: RamDomain) -> Arc<str> {
    match symbols.resolve(id) {
        Some(text) => text,
        None => fatal!("symbol id {id} is not interned"),
    }
}

/// Order two values under `kind`. NaN compares equal to everything.
pub fn compare_values(kind: NumericKind, a: RamDomain, b: RamDomain) -> std::cmp::Ordering {
    match kind {
        NumericKind::Signed => a.cmp(&b),
        NumericKind::Unsigned => to_unsigned(a).cmp(&to_unsigned(b)),
        NumericKind::Float => to_float(a)
            .partial_cmp(&to_float(b))
            .unwrap_or(std::cmp::Ordering::Equal),
    }
}

/// Compiled regular expressions by source pattern.
///
/// Patterns that fail to compile are remembered as `None` and never match.
#[derive(Debug, Default)]
pub struct RegexCache {
    compiled: Mutex<FxHashMap<Arc<str>, Option<Regex>>>,
}

impl RegexCache {
    pub fn new() -> Self {
        RegexCache::default()
    }

    /// Does the whole of `text` match `pattern`?
    pub fn is_match(&self, pattern: &Arc<str>, text: &str) -> bool {
        let mut compiled = self.compiled.lock();
        let regex = compiled.entry(Arc::clone(pattern)).or_insert_with(|| {
            match Regex::new(&format!("^(?:{pattern})$")) {
                Ok(regex) => Some(regex),
                Err(error) => {
                    warn!(pattern = %pattern, %error, "invalid regular expression");
                    None
                }
            }
        });
        regex.as_ref().is_some_and(|r| r.is_match(text))
    }

    pub fn len(&self) -> usize {
        self.compiled.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evaluate a binary constraint.
pub fn compare(
    op: ConstraintOp,
    kind: NumericKind,
    lhs: RamDomain,
    rhs: RamDomain,
    symbols: &SymbolTable,
    regexes: &RegexCache,
) -> bool {
    use std::cmp::Ordering::*;
    match op {
        ConstraintOp::Eq => match kind {
            NumericKind::Float => to_float(lhs) == to_float(rhs),
            _ => lhs == rhs,
        },
        ConstraintOp::Ne => match kind {
            NumericKind::Float => to_float(lhs) != to_float(rhs),
            _ => lhs != rhs,
        },
        ConstraintOp::Lt => ordered(kind, lhs, rhs, |o| o == Less),
        ConstraintOp::Le => ordered(kind, lhs, rhs, |o| o != Greater),
        ConstraintOp::Gt => ordered(kind, lhs, rhs, |o| o == Greater),
        ConstraintOp::Ge => ordered(kind, lhs, rhs, |o| o != Less),
        ConstraintOp::Match | ConstraintOp::NotMatch => {
            let pattern = resolve(symbols, lhs);
            let text = resolve(symbols, rhs);
            regexes.is_match(&pattern, &text) == (op == ConstraintOp::Match)
        }
        ConstraintOp::Contains | ConstraintOp::NotContains => {
            let needle = resolve(symbols, lhs);
            let haystack = resolve(symbols, rhs);
            haystack.contains(&*needle) == (op == ConstraintOp::Contains)
        }
    }
}

/// Float comparisons involving NaN are false.
fn ordered(
    kind: NumericKind,
    lhs: RamDomain,
    rhs: RamDomain,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    match kind {
        NumericKind::Float => to_float(lhs)
            .partial_cmp(&to_float(rhs))
            .is_some_and(accept),
        _ => accept(compare_values(kind, lhs, rhs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ram_ir::IntrinsicOp;

    fn signed(op: IntrinsicOp, args: &[RamDomain]) -> RamDomain {
        intrinsic(op, NumericKind::Signed, args, &SymbolTable::new())
    }

    #[test]
    fn test_signed_arithmetic_wraps() {
        assert_eq!(signed(IntrinsicOp::Add, &[RamDomain::MAX, 1]), RamDomain::MIN);
        assert_eq!(signed(IntrinsicOp::Div, &[-7, 2]), -3);
        assert_eq!(signed(IntrinsicOp::Mod, &[-7, 2]), -1);
        assert_eq!(signed(IntrinsicOp::Exp, &[2, 10]), 1024);
    }

    #[test]
    fn test_unsigned_division() {
        let symbols = SymbolTable::new();
        let a = from_unsigned(u32::MAX);
        let q = intrinsic(IntrinsicOp::Div, NumericKind::Unsigned, &[a, 2], &symbols);
        assert_eq!(to_unsigned(q), u32::MAX / 2);
    }

    #[test]
    #[should_panic(expected = "division by zero")]
    fn test_division_by_zero_is_fatal() {
        signed(IntrinsicOp::Div, &[1, 0]);
    }

    #[test]
    fn test_float_ops() {
        let symbols = SymbolTable::new();
        let sum = intrinsic(
            IntrinsicOp::Add,
            NumericKind::Float,
            &[from_float(1.5), from_float(2.25)],
            &symbols,
        );
        assert_eq!(to_float(sum), 3.75);
        let converted = intrinsic(IntrinsicOp::ToFloat, NumericKind::Signed, &[3], &symbols);
        assert_eq!(to_float(converted), 3.0);
        let back = intrinsic(IntrinsicOp::ToSigned, NumericKind::Float, &[from_float(2.9)], &symbols);
        assert_eq!(back, 2);
    }

    #[test]
    fn test_shifts() {
        assert_eq!(signed(IntrinsicOp::BShiftL, &[1, 4]), 16);
        assert_eq!(signed(IntrinsicOp::BShiftR, &[-16, 2]), -4);
        let symbols = SymbolTable::new();
        let logical = intrinsic(IntrinsicOp::BShiftR, NumericKind::Unsigned, &[-16, 2], &symbols);
        assert_eq!(to_unsigned(logical), (-16i32 as u32) >> 2);
    }

    #[test]
    fn test_variadic_min_max() {
        assert_eq!(signed(IntrinsicOp::Max, &[3, 9, -1]), 9);
        assert_eq!(signed(IntrinsicOp::Min, &[3, 9, -1]), -1);
        let symbols = SymbolTable::new();
        let big = from_unsigned(u32::MAX);
        assert_eq!(
            intrinsic(IntrinsicOp::Max, NumericKind::Unsigned, &[1, big], &symbols),
            big
        );
    }

    #[test]
    fn test_string_ops() {
        let symbols = SymbolTable::new();
        let hello = symbols.intern("hello");
        let world = symbols.intern(" world");
        let cat = intrinsic(IntrinsicOp::Cat, NumericKind::Signed, &[hello, world], &symbols);
        assert_eq!(&*symbols.resolve(cat).unwrap(), "hello world");
        let len = intrinsic(IntrinsicOp::StrLen, NumericKind::Signed, &[cat], &symbols);
        assert_eq!(len, 11);
        let sub = intrinsic(IntrinsicOp::SubStr, NumericKind::Signed, &[cat, 6, 100], &symbols);
        assert_eq!(&*symbols.resolve(sub).unwrap(), "world");
        let past_end = intrinsic(IntrinsicOp::SubStr, NumericKind::Signed, &[cat, 50, 1], &symbols);
        assert_eq!(&*symbols.resolve(past_end).unwrap(), "");
    }

    #[test]
    fn test_number_string_conversion() {
        let symbols = SymbolTable::new();
        let text = intrinsic(IntrinsicOp::ToString, NumericKind::Signed, &[-42], &symbols);
        assert_eq!(&*symbols.resolve(text).unwrap(), "-42");
        let number = intrinsic(IntrinsicOp::ToNumber, NumericKind::Signed, &[text], &symbols);
        assert_eq!(number, -42);
    }

    #[test]
    fn test_float_comparison_is_numeric() {
        let symbols = SymbolTable::new();
        let regexes = RegexCache::new();
        let lt = compare(
            ConstraintOp::Lt,
            NumericKind::Float,
            from_float(-1.0),
            from_float(0.5),
            &symbols,
            &regexes,
        );
        assert!(lt);
        let zeros = compare(
            ConstraintOp::Eq,
            NumericKind::Float,
            from_float(-0.0),
            from_float(0.0),
            &symbols,
            &regexes,
        );
        assert!(zeros);
    }

    #[test]
    fn test_match_is_anchored_and_cached() {
        let symbols = SymbolTable::new();
        let regexes = RegexCache::new();
        let pattern = symbols.intern("a+b");
        let whole = symbols.intern("aaab");
        let partial = symbols.intern("xaab");
        let kind = NumericKind::Signed;
        assert!(compare(ConstraintOp::Match, kind, pattern, whole, &symbols, &regexes));
        assert!(!compare(ConstraintOp::Match, kind, pattern, partial, &symbols, &regexes));
        assert!(compare(ConstraintOp::NotMatch, kind, pattern, partial, &symbols, &regexes));
        assert_eq!(regexes.len(), 1);
    }

    #[test]
    fn test_invalid_regex_never_matches() {
        let symbols = SymbolTable::new();
        let regexes = RegexCache::new();
        let pattern = symbols.intern("(");
        let text = symbols.intern("(");
        let kind = NumericKind::Signed;
        assert!(!compare(ConstraintOp::Match, kind, pattern, text, &symbols, &regexes));
    }

    #[test]
    fn test_contains() {
        let symbols = SymbolTable::new();
        let regexes = RegexCache::new();
        let needle = symbols.intern("ell");
        let haystack = symbols.intern("hello");
        let kind = NumericKind::Signed;
        assert!(compare(ConstraintOp::Contains, kind, needle, haystack, &symbols, &regexes));
        assert!(!compare(ConstraintOp::Contains, kind, haystack, needle, &symbols, &regexes));
    }
}
