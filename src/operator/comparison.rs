//! `EQ`, `NE`, `LT`, `LE`, `GT`, `GE` (spec §4.6): strict binary, type-
//! selected over `{Integer, Real, String}` with Integer→Real promotion,
//! plus equality over the remaining scalar/array/internal types for
//! `EQ`/`NE` (the source's `EQUALITY`/`INEQUALITY` templates cover every
//! `ValueType`, not just the numeric ones `LT`/`LE`/`GT`/`GE` restrict
//! themselves to).

use super::Operator;
use crate::expression::ExprRef;
use crate::value::{Value, ValueType};
use std::cmp::Ordering;
use std::rc::Rc;
use std::thread_local;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    fn name(self) -> &'static str {
        match self {
            Relation::Eq => "EQ",
            Relation::Ne => "NE",
            Relation::Lt => "LT",
            Relation::Le => "LE",
            Relation::Gt => "GT",
            Relation::Ge => "GE",
        }
    }

    fn from_ordering(self, ordering: Ordering) -> bool {
        match self {
            Relation::Eq => ordering == Ordering::Equal,
            Relation::Ne => ordering != Ordering::Equal,
            Relation::Lt => ordering == Ordering::Less,
            Relation::Le => ordering != Ordering::Greater,
            Relation::Gt => ordering == Ordering::Greater,
            Relation::Ge => ordering != Ordering::Less,
        }
    }
}

/// Numeric/string comparison (`LT`/`LE`/`GT`/`GE`, and the numeric/
/// string cases of `EQ`/`NE`). Integer operands compare as Real whenever
/// the other side is Real, matching invariant 3's promotion rule.
#[derive(Debug)]
pub struct Comparison {
    relation: Relation,
}

impl Operator for Comparison {
    fn name(&self) -> &'static str {
        self.relation.name()
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count == 2
    }

    fn check_arg_types(&self, types: &[ValueType]) -> bool {
        types.len() == 2
            && types.iter().all(|t| {
                t.is_numeric() || *t == ValueType::String || *t == ValueType::Unknown
            })
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Boolean
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let a = args[0].to_value();
        let b = args[1].to_value();
        if !a.is_known() || !b.is_known() {
            return Value::Unknown(ValueType::Boolean);
        }
        let ordering = match (&a, &b) {
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => match x.partial_cmp(&y) {
                    Some(o) => o,
                    None => return Value::Unknown(ValueType::Boolean),
                },
                _ => return Value::Unknown(ValueType::Boolean),
            },
        };
        Value::Boolean(self.relation.from_ordering(ordering))
    }
}

/// `EQ`/`NE` over non-numeric, non-string types (Boolean, Date,
/// Duration, arrays, the internal enums): plain structural equality,
/// since the source's `Equal<T>` template instantiates for every
/// `ValueType`.
#[derive(Debug)]
pub struct GenericEquality {
    negate: bool,
}

impl Operator for GenericEquality {
    fn name(&self) -> &'static str {
        if self.negate {
            "NE"
        } else {
            "EQ"
        }
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count == 2
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Boolean
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let a = args[0].to_value();
        let b = args[1].to_value();
        if !a.is_known() || !b.is_known() {
            return Value::Unknown(ValueType::Boolean);
        }
        Value::Boolean((a == b) != self.negate)
    }
}

macro_rules! comparison_singleton {
    ($ctor:ident, $cell:ident, $relation:expr) => {
        thread_local! {
            static $cell: Rc<Comparison> = Rc::new(Comparison { relation: $relation });
        }

        pub fn $ctor() -> Rc<dyn Operator> {
            $cell.with(|c| Rc::clone(c) as Rc<dyn Operator>)
        }
    };
}

comparison_singleton!(lt_instance, LT_INSTANCE, Relation::Lt);
comparison_singleton!(le_instance, LE_INSTANCE, Relation::Le);
comparison_singleton!(gt_instance, GT_INSTANCE, Relation::Gt);
comparison_singleton!(ge_instance, GE_INSTANCE, Relation::Ge);
comparison_singleton!(eq_numeric_instance, EQ_NUMERIC_INSTANCE, Relation::Eq);
comparison_singleton!(ne_numeric_instance, NE_NUMERIC_INSTANCE, Relation::Ne);

thread_local! {
    static EQ_GENERIC_INSTANCE: Rc<GenericEquality> = Rc::new(GenericEquality { negate: false });
    static NE_GENERIC_INSTANCE: Rc<GenericEquality> = Rc::new(GenericEquality { negate: true });
}

pub fn eq_generic_instance() -> Rc<dyn Operator> {
    EQ_GENERIC_INSTANCE.with(|c| Rc::clone(c) as Rc<dyn Operator>)
}

pub fn ne_generic_instance() -> Rc<dyn Operator> {
    NE_GENERIC_INSTANCE.with(|c| Rc::clone(c) as Rc<dyn Operator>)
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
    fn lt_promotes_integer_to_real() {
        let op = lt_instance();
        assert_eq!(op.call(&[int(1), real(1.5)]), Value::Boolean(true));
    }

    #[test]
    fn unknown_operand_is_unknown() {
        let unknown = Constant::unknown(ValueType::Integer) as ExprRef;
        unknown.activate();
        let op = eq_numeric_instance();
        assert_eq!(op.call(&[int(1), unknown]), Value::Unknown(ValueType::Boolean));
    }

    #[test]
    fn generic_equality_over_booleans() {
        let t = Constant::new(Value::Boolean(true));
        t.activate();
        let t = t as ExprRef;
        let op = eq_generic_instance();
        assert_eq!(op.call(&[Rc::clone(&t), t]), Value::Boolean(true));
    }
}
