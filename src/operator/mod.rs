//! Operator singletons and the catalogue (spec §4.5/§4.6).
//!
//! Every operator is a process-wide, stateless singleton (spec §3.3:
//! "operators are process-wide singletons; the pointer is a weak/borrow
//! reference"). Rather than a bare `&'static` obtained through `unsafe`
//! leaking, each `instance()` accessor hands out an `Rc` clone of a
//! `thread_local!`-built value, the same idiom `constant.rs` uses for
//! interned constants: allocated exactly once, shared everywhere, freed
//! only at program exit.

pub mod arithmetic;
pub mod array_ops;
pub mod boolean;
pub mod comparison;
pub mod conversion;
pub mod known;
pub mod registry;
pub mod string_ops;

use crate::expression::ExprRef;
use crate::value::{Value, ValueType};
use std::fmt::Debug;

/// Numeric kind an arithmetic/comparison operator has been specialized
/// for at allocate time (spec §9 resolution 3: one Rust type
/// parameterized over this enum, in place of one monomorphized operator
/// type per numeric type).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NumericKind {
    Integer,
    Real,
}

impl NumericKind {
    pub fn value_type(self) -> ValueType {
        match self {
            NumericKind::Integer => ValueType::Integer,
            NumericKind::Real => ValueType::Real,
        }
    }

    /// Common-type promotion rule (spec §4.6): any Real/Date/Duration
    /// operand selects Real; an all-Integer operand list selects
    /// Integer; anything else (no concrete numeric type observed, e.g.
    /// every operand still `Unknown`) defaults to Real (spec §9
    /// resolution 6).
    pub fn common_of(types: &[ValueType]) -> NumericKind {
        if types
            .iter()
            .any(|t| matches!(t, ValueType::Real | ValueType::Date | ValueType::Duration))
        {
            NumericKind::Real
        } else if !types.is_empty() && types.iter().all(|t| *t == ValueType::Integer) {
            NumericKind::Integer
        } else {
            NumericKind::Real
        }
    }
}

/// A computation process performed on zero or more expressions,
/// returning a value (spec §4.5). `call` dispatches over boxed `Value`s
/// rather than the source's per-return-type overload set (`calc(bool&,
/// ...)`, `calc(Integer&, ...)`, ...): Rust trait objects can't carry a
/// generic method, so reading each argument through
/// `Expression::to_value()`/`ExpressionExt` and returning one `Value`
/// plays that role uniformly.
pub trait Operator: Debug {
    fn name(&self) -> &'static str;

    /// True only for the small allow-list of operators whose value can
    /// change independently of their operands (spec §4.1) — none of the
    /// catalogue in §4.6 qualifies, so the default suffices everywhere
    /// in this crate.
    fn is_propagation_source(&self) -> bool {
        false
    }

    fn check_arg_count(&self, count: usize) -> bool;

    /// Default accepts anything; operators that care (SQRT, the
    /// conversions, comparisons) override it.
    fn check_arg_types(&self, _types: &[ValueType]) -> bool {
        true
    }

    /// The result type for a call over operands of these types. Called
    /// once at `Function` build time (invariant 1: `value_type` is then
    /// stable for the node's lifetime).
    fn value_type(&self, arg_types: &[ValueType]) -> ValueType;

    /// Evaluate. Strict operators (the default throughout §4.6 except
    /// `OR`/`AND`/`XOR`/`IsKnown`) must return `Value::Unknown` the
    /// moment any argument read fails, without partially applying the
    /// operation.
    fn call(&self, args: &[ExprRef]) -> Value;
}

/// Reads `arg` under `kind`'s promotion rule: an Integer-kind read
/// requires an exact Integer value; a Real-kind read accepts Real (and,
/// via `Value::as_f64`, an Integer promoted to Real). Shared by every
/// arithmetic/comparison operator so the promotion rule lives in one
/// place.
pub(crate) fn read_numeric(arg: &ExprRef, kind: NumericKind) -> Option<Num> {
    match kind {
        NumericKind::Integer => arg.to_value().as_i32().map(Num::Int),
        NumericKind::Real => arg.to_value().as_f64().map(Num::Real),
    }
}

/// A numeric operand already resolved to its operator's working kind.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Num {
    Int(i32),
    Real(f64),
}

impl Num {
    pub(crate) fn to_value(self) -> Value {
        match self {
            Num::Int(i) => Value::Integer(i),
            Num::Real(r) => Value::Real(r),
        }
    }
}
