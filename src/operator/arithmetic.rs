//! `ADD`, `SUB`, `MUL`, `DIV`, `MOD`, `MIN`, `MAX`, `ABS`, `SQRT` (spec
//! §4.6), grounded on `ArithmeticOperators.cc`: strict in every operand,
//! type-polymorphic over Integer/Real via [NumericKind] except `SQRT`
//! which the source only ever instantiates for `Real`.

use super::{read_numeric, Num, NumericKind, Operator};
use crate::expression::ExprRef;
use crate::value::{Value, ValueType};
use std::cell::RefCell;
use std::num::Wrapping;
use std::rc::Rc;
use std::thread_local;

fn fold_numeric(args: &[ExprRef], kind: NumericKind) -> Option<Vec<Num>> {
    args.iter().map(|a| read_numeric(a, kind)).collect()
}

#[derive(Debug)]
pub struct Add {
    kind: NumericKind,
}

impl Operator for Add {
    fn name(&self) -> &'static str {
        "ADD"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count >= 1
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        self.kind.value_type()
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let Some(operands) = fold_numeric(args, self.kind) else {
            return Value::Unknown(self.kind.value_type());
        };
        match self.kind {
            NumericKind::Integer => {
                let mut total = Wrapping(0i32);
                for op in &operands {
                    let Num::Int(i) = op else { unreachable!() };
                    total += Wrapping(*i);
                }
                Value::Integer(total.0)
            }
            NumericKind::Real => {
                let mut total = 0.0f64;
                for op in &operands {
                    let Num::Real(r) = op else { unreachable!() };
                    total += r;
                }
                Value::Real(total)
            }
        }
    }
}

#[derive(Debug)]
pub struct Sub {
    kind: NumericKind,
}

impl Operator for Sub {
    fn name(&self) -> &'static str {
        "SUB"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count >= 1
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        self.kind.value_type()
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let Some(operands) = fold_numeric(args, self.kind) else {
            return Value::Unknown(self.kind.value_type());
        };
        match self.kind {
            NumericKind::Integer => {
                let mut iter = operands.into_iter().map(|n| match n {
                    Num::Int(i) => Wrapping(i),
                    _ => unreachable!(),
                });
                let first = iter.next().unwrap();
                let result = if let Some(second) = iter.next() {
                    std::iter::once(second).chain(iter).fold(first, |acc, x| acc - x)
                } else {
                    -first
                };
                Value::Integer(result.0)
            }
            NumericKind::Real => {
                let mut iter = operands.into_iter().map(|n| match n {
                    Num::Real(r) => r,
                    _ => unreachable!(),
                });
                let first = iter.next().unwrap();
                let result = if let Some(second) = iter.next() {
                    std::iter::once(second).chain(iter).fold(first, |acc, x| acc - x)
                } else {
                    -first
                };
                Value::Real(result)
            }
        }
    }
}

#[derive(Debug)]
pub struct Mul {
    kind: NumericKind,
}

impl Operator for Mul {
    fn name(&self) -> &'static str {
        "MUL"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count >= 1
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        self.kind.value_type()
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let Some(operands) = fold_numeric(args, self.kind) else {
            return Value::Unknown(self.kind.value_type());
        };
        match self.kind {
            NumericKind::Integer => {
                let result = operands.into_iter().fold(Wrapping(1i32), |acc, n| match n {
                    Num::Int(i) => acc * Wrapping(i),
                    _ => unreachable!(),
                });
                Value::Integer(result.0)
            }
            NumericKind::Real => {
                let result = operands.into_iter().fold(1.0f64, |acc, n| match n {
                    Num::Real(r) => acc * r,
                    _ => unreachable!(),
                });
                Value::Real(result)
            }
        }
    }
}

#[derive(Debug)]
pub struct Div {
    kind: NumericKind,
}

impl Operator for Div {
    fn name(&self) -> &'static str {
        "DIV"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count == 2
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        self.kind.value_type()
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let ty = self.kind.value_type();
        let (Some(a), Some(b)) = (read_numeric(&args[0], self.kind), read_numeric(&args[1], self.kind)) else {
            return Value::Unknown(ty);
        };
        match (a, b) {
            (Num::Int(_), Num::Int(0)) => Value::Unknown(ty),
            (Num::Int(x), Num::Int(y)) => Value::Integer(x / y),
            (Num::Real(_), Num::Real(y)) if y == 0.0 => Value::Unknown(ty),
            (Num::Real(x), Num::Real(y)) => Value::Real(x / y),
            _ => Value::Unknown(ty),
        }
    }
}

/// `MOD` (spec §4.6): Integer uses Rust's truncating `%`; Real uses
/// `f64::rem_euclid`'s non-Euclidean sibling — plain `%`, which like C's
/// `fmod` takes the sign of the dividend (spec §9 resolution 5).
#[derive(Debug)]
pub struct Mod {
    kind: NumericKind,
}

impl Operator for Mod {
    fn name(&self) -> &'static str {
        "MOD"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count == 2
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        self.kind.value_type()
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let ty = self.kind.value_type();
        let (Some(a), Some(b)) = (read_numeric(&args[0], self.kind), read_numeric(&args[1], self.kind)) else {
            return Value::Unknown(ty);
        };
        match (a, b) {
            (Num::Int(_), Num::Int(0)) => Value::Unknown(ty),
            (Num::Int(x), Num::Int(y)) => Value::Integer(x % y),
            (Num::Real(_), Num::Real(y)) if y == 0.0 => Value::Unknown(ty),
            (Num::Real(x), Num::Real(y)) => Value::Real(x % y),
            _ => Value::Unknown(ty),
        }
    }
}

#[derive(Debug)]
pub struct Min {
    kind: NumericKind,
}

impl Operator for Min {
    fn name(&self) -> &'static str {
        "MIN"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count >= 1
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        self.kind.value_type()
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let Some(operands) = fold_numeric(args, self.kind) else {
            return Value::Unknown(self.kind.value_type());
        };
        match self.kind {
            NumericKind::Integer => {
                let result = operands
                    .into_iter()
                    .map(|n| match n {
                        Num::Int(i) => i,
                        _ => unreachable!(),
                    })
                    .min()
                    .unwrap();
                Value::Integer(result)
            }
            NumericKind::Real => {
                let result = operands
                    .into_iter()
                    .map(|n| match n {
                        Num::Real(r) => r,
                        _ => unreachable!(),
                    })
                    .fold(f64::INFINITY, f64::min);
                Value::Real(result)
            }
        }
    }
}

#[derive(Debug)]
pub struct Max {
    kind: NumericKind,
}

impl Operator for Max {
    fn name(&self) -> &'static str {
        "MAX"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count >= 1
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        self.kind.value_type()
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let Some(operands) = fold_numeric(args, self.kind) else {
            return Value::Unknown(self.kind.value_type());
        };
        match self.kind {
            NumericKind::Integer => {
                let result = operands
                    .into_iter()
                    .map(|n| match n {
                        Num::Int(i) => i,
                        _ => unreachable!(),
                    })
                    .max()
                    .unwrap();
                Value::Integer(result)
            }
            NumericKind::Real => {
                let result = operands
                    .into_iter()
                    .map(|n| match n {
                        Num::Real(r) => r,
                        _ => unreachable!(),
                    })
                    .fold(f64::NEG_INFINITY, f64::max);
                Value::Real(result)
            }
        }
    }
}

#[derive(Debug)]
pub struct Abs {
    kind: NumericKind,
}

impl Operator for Abs {
    fn name(&self) -> &'static str {
        "ABS"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count == 1
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        self.kind.value_type()
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let ty = self.kind.value_type();
        match read_numeric(&args[0], self.kind) {
            Some(Num::Int(i)) => Value::Integer(i.abs()),
            Some(Num::Real(r)) => Value::Real(r.abs()),
            None => Value::Unknown(ty),
        }
    }
}

/// `SQRT` (spec §4.6): the source only instantiates `SquareRoot<Real>`,
/// so this operator is unconditionally Real-typed regardless of how its
/// single operand was declared; an Integer operand still reads fine via
/// promotion.
#[derive(Debug)]
pub struct Sqrt;

impl Operator for Sqrt {
    fn name(&self) -> &'static str {
        "SQRT"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count == 1
    }

    fn check_arg_types(&self, types: &[ValueType]) -> bool {
        types.len() == 1 && (types[0].is_numeric() || types[0] == ValueType::Unknown)
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Real
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        match args[0].to_value().as_f64() {
            Some(r) if r >= 0.0 => Value::Real(r.sqrt()),
            _ => Value::Unknown(ValueType::Real),
        }
    }
}

macro_rules! numeric_singletons {
    ($ctor:ident, $integer_cell:ident, $real_cell:ident, $ty:ident) => {
        thread_local! {
            static $integer_cell: RefCell<Option<Rc<$ty>>> = RefCell::new(None);
            static $real_cell: RefCell<Option<Rc<$ty>>> = RefCell::new(None);
        }

        pub fn $ctor(kind: NumericKind) -> Rc<dyn Operator> {
            let cell = match kind {
                NumericKind::Integer => &$integer_cell,
                NumericKind::Real => &$real_cell,
            };
            cell.with(|slot| {
                let mut slot = slot.borrow_mut();
                if slot.is_none() {
                    *slot = Some(Rc::new($ty { kind }));
                }
                Rc::clone(slot.as_ref().unwrap()) as Rc<dyn Operator>
            })
        }
    };
}

numeric_singletons!(add_instance, ADD_INTEGER, ADD_REAL, Add);
numeric_singletons!(sub_instance, SUB_INTEGER, SUB_REAL, Sub);
numeric_singletons!(mul_instance, MUL_INTEGER, MUL_REAL, Mul);
numeric_singletons!(div_instance, DIV_INTEGER, DIV_REAL, Div);
numeric_singletons!(mod_instance, MOD_INTEGER, MOD_REAL, Mod);
numeric_singletons!(min_instance, MIN_INTEGER, MIN_REAL, Min);
numeric_singletons!(max_instance, MAX_INTEGER, MAX_REAL, Max);
numeric_singletons!(abs_instance, ABS_INTEGER, ABS_REAL, Abs);

thread_local! {
    static SQRT_INSTANCE: Rc<Sqrt> = Rc::new(Sqrt);
}

pub fn sqrt_instance() -> Rc<dyn Operator> {
    SQRT_INSTANCE.with(|s| Rc::clone(s) as Rc<dyn Operator>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;

    fn int(v: i32) -> ExprRef {
        let c = Constant::new(Value::Integer(v));
        c.activate();
        c as ExprRef
    }

    fn real(v: f64) -> ExprRef {
        let c = Constant::new(Value::Real(v));
        c.activate();
        c as ExprRef
    }

    #[test]
    fn add_integers() {
        let op = add_instance(NumericKind::Integer);
        assert_eq!(op.call(&[int(1), int(3)]), Value::Integer(4));
    }

    #[test]
    fn div_by_zero_is_unknown() {
        let op = div_instance(NumericKind::Real);
        assert_eq!(op.call(&[real(4.0), real(0.0)]), Value::Unknown(ValueType::Real));
    }

    #[test]
    fn div_real() {
        let op = div_instance(NumericKind::Real);
        assert_eq!(op.call(&[real(4.0), real(2.5)]), Value::Real(1.6));
    }

    #[test]
    fn mod_integer_truncates_toward_zero() {
        let op = mod_instance(NumericKind::Integer);
        assert_eq!(op.call(&[int(9), int(5)]), Value::Integer(4));
        assert_eq!(op.call(&[int(-9), int(5)]), Value::Integer(-4));
    }

    #[test]
    fn mod_real_takes_dividend_sign() {
        let op = mod_instance(NumericKind::Real);
        assert_eq!(op.call(&[real(-9.0), real(5.0)]), Value::Real(-4.0));
    }

    #[test]
    fn sub_unary_negates() {
        let op = sub_instance(NumericKind::Integer);
        assert_eq!(op.call(&[int(5)]), Value::Integer(-5));
    }

    #[test]
    fn sqrt_negative_is_unknown() {
        let op = sqrt_instance();
        assert_eq!(op.call(&[real(-1.0)]), Value::Unknown(ValueType::Real));
        assert_eq!(op.call(&[real(4.0)]), Value::Real(2.0));
    }

    #[test]
    fn operator_instance_is_interned() {
        let a = add_instance(NumericKind::Integer);
        let b = add_instance(NumericKind::Integer);
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn add_wraps_instead_of_panicking_on_overflow() {
        let op = add_instance(NumericKind::Integer);
        assert_eq!(op.call(&[int(i32::MAX), int(1)]), Value::Integer(i32::MIN));
    }

    #[test]
    fn sub_wraps_instead_of_panicking_on_overflow() {
        let op = sub_instance(NumericKind::Integer);
        assert_eq!(op.call(&[int(i32::MIN), int(1)]), Value::Integer(i32::MAX));
        assert_eq!(op.call(&[int(i32::MIN)]), Value::Integer(i32::MIN));
    }

    #[test]
    fn mul_wraps_instead_of_panicking_on_overflow() {
        let op = mul_instance(NumericKind::Integer);
        assert_eq!(op.call(&[int(i32::MAX), int(2)]), Value::Integer(-2));
    }
}
