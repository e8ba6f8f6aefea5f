//! `CEIL`, `FLOOR`, `ROUND`, `TRUNC`, `REAL_TO_INT` (spec §4.6), grounded
//! on `ConversionOperators.cc`: each first computes a Real result, then
//! (for the Integer-typed variant) narrows it through the same
//! range/exactness check the source's `RealToInt` helper performs.

use super::Operator;
use crate::expression::ExprRef;
use crate::value::{Value, ValueType};
use std::rc::Rc;
use std::thread_local;

/// Narrows `real` to `i32`, mirroring the source's `RealToInt`: unknown
/// if out of `i32` range, or if `real` is not exactly integral (no
/// epsilon tolerance — the source's own TODO leaves it exact).
fn real_to_int(real: f64) -> Option<i32> {
    if real < i32::MIN as f64 || real > i32::MAX as f64 {
        return None;
    }
    let truncated = real as i32;
    if (real - truncated as f64) != 0.0 {
        return None;
    }
    Some(truncated)
}

#[derive(Copy, Clone, Debug)]
enum Rounding {
    Ceil,
    Floor,
    Round,
    Trunc,
}

impl Rounding {
    fn apply(self, real: f64) -> f64 {
        match self {
            Rounding::Ceil => real.ceil(),
            Rounding::Floor => real.floor(),
            Rounding::Round => real.round(),
            Rounding::Trunc => real.trunc(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Rounding::Ceil => "CEIL",
            Rounding::Floor => "FLOOR",
            Rounding::Round => "ROUND",
            Rounding::Trunc => "TRUNC",
        }
    }
}

/// `CEIL`/`FLOOR`/`ROUND`/`TRUNC`, parameterized by result type the same
/// way arithmetic operators are by [super::NumericKind]: the check pass
/// picks whichever singleton matches the context's desired type (spec
/// §4.10 `desired_type`).
#[derive(Debug)]
pub struct Conversion {
    rounding: Rounding,
    result_type: ValueType,
}

impl Operator for Conversion {
    fn name(&self) -> &'static str {
        self.rounding.name()
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count == 1
    }

    fn check_arg_types(&self, types: &[ValueType]) -> bool {
        types.len() == 1 && (types[0].is_numeric() || types[0] == ValueType::Unknown)
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        self.result_type
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let Some(real) = args[0].to_value().as_f64() else {
            return Value::Unknown(self.result_type);
        };
        let rounded = self.rounding.apply(real);
        match self.result_type {
            ValueType::Integer => match real_to_int(rounded) {
                Some(i) => Value::Integer(i),
                None => Value::Unknown(ValueType::Integer),
            },
            _ => Value::Real(rounded),
        }
    }
}

/// `REAL_TO_INT`: same range/exactness check as the conversions above,
/// but with no rounding step first — the operand must already be
/// integral.
#[derive(Debug)]
pub struct RealToInt;

impl Operator for RealToInt {
    fn name(&self) -> &'static str {
        "REAL_TO_INT"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count == 1
    }

    fn check_arg_types(&self, types: &[ValueType]) -> bool {
        types.len() == 1 && (types[0].is_numeric() || types[0] == ValueType::Unknown)
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Integer
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        match args[0].to_value().as_f64().and_then(real_to_int) {
            Some(i) => Value::Integer(i),
            None => Value::Unknown(ValueType::Integer),
        }
    }
}

macro_rules! conversion_singletons {
    ($ctor:ident, $integer_cell:ident, $real_cell:ident, $rounding:expr) => {
        thread_local! {
            static $integer_cell: Rc<Conversion> = Rc::new(Conversion { rounding: $rounding, result_type: ValueType::Integer });
            static $real_cell: Rc<Conversion> = Rc::new(Conversion { rounding: $rounding, result_type: ValueType::Real });
        }

        pub fn $ctor(result_type: ValueType) -> Rc<dyn Operator> {
            match result_type {
                ValueType::Integer => $integer_cell.with(|c| Rc::clone(c) as Rc<dyn Operator>),
                _ => $real_cell.with(|c| Rc::clone(c) as Rc<dyn Operator>),
            }
        }
    };
}

conversion_singletons!(ceil_instance, CEIL_INTEGER, CEIL_REAL, Rounding::Ceil);
conversion_singletons!(floor_instance, FLOOR_INTEGER, FLOOR_REAL, Rounding::Floor);
conversion_singletons!(round_instance, ROUND_INTEGER, ROUND_REAL, Rounding::Round);
conversion_singletons!(trunc_instance, TRUNC_INTEGER, TRUNC_REAL, Rounding::Trunc);

thread_local! {
    static REAL_TO_INT_INSTANCE: Rc<RealToInt> = Rc::new(RealToInt);
}

pub fn real_to_int_instance() -> Rc<dyn Operator> {
    REAL_TO_INT_INSTANCE.with(|c| Rc::clone(c) as Rc<dyn Operator>)
}
