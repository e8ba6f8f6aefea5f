//! `NOT`, `AND`, `OR`, `XOR` (spec §4.6): three-valued logic, the only
//! non-strict operators in the arithmetic/boolean family besides
//! `IsKnown` (see `known.rs`).

use super::Operator;
use crate::expression::ExprRef;
use crate::value::{Value, ValueType};
use std::rc::Rc;
use std::thread_local;

#[derive(Debug)]
pub struct Not;

impl Operator for Not {
    fn name(&self) -> &'static str {
        "NOT"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count == 1
    }

    fn check_arg_types(&self, types: &[ValueType]) -> bool {
        types.len() == 1 && (types[0] == ValueType::Boolean || types[0] == ValueType::Unknown)
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Boolean
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        match args[0].to_value().as_bool() {
            Some(b) => Value::Boolean(!b),
            None => Value::Unknown(ValueType::Boolean),
        }
    }
}

/// `AND`/`OR`/`XOR` share one struct (spec §4.6): `AND`/`OR` fold with
/// three-valued short-circuiting; `XOR` is unknown if any operand is
/// unknown, else a parity fold over the rest.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Kind {
    And,
    Or,
    Xor,
}

#[derive(Debug)]
pub struct BooleanFold {
    kind: Kind,
}

impl Operator for BooleanFold {
    fn name(&self) -> &'static str {
        match self.kind {
            Kind::And => "AND",
            Kind::Or => "OR",
            Kind::Xor => "XOR",
        }
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count >= 1
    }

    fn check_arg_types(&self, types: &[ValueType]) -> bool {
        types.iter().all(|t| *t == ValueType::Boolean || *t == ValueType::Unknown)
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Boolean
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        match self.kind {
            Kind::And => {
                let mut any_unknown = false;
                for arg in args {
                    match arg.to_value().as_bool() {
                        Some(false) => return Value::Boolean(false),
                        Some(true) => {}
                        None => any_unknown = true,
                    }
                }
                if any_unknown {
                    Value::Unknown(ValueType::Boolean)
                } else {
                    Value::Boolean(true)
                }
            }
            Kind::Or => {
                let mut any_unknown = false;
                for arg in args {
                    match arg.to_value().as_bool() {
                        Some(true) => return Value::Boolean(true),
                        Some(false) => {}
                        None => any_unknown = true,
                    }
                }
                if any_unknown {
                    Value::Unknown(ValueType::Boolean)
                } else {
                    Value::Boolean(false)
                }
            }
            Kind::Xor => {
                let mut parity = false;
                for arg in args {
                    match arg.to_value().as_bool() {
                        Some(b) => parity ^= b,
                        None => return Value::Unknown(ValueType::Boolean),
                    }
                }
                Value::Boolean(parity)
            }
        }
    }
}

thread_local! {
    static NOT_INSTANCE: Rc<Not> = Rc::new(Not);
    static AND_INSTANCE: Rc<BooleanFold> = Rc::new(BooleanFold { kind: Kind::And });
    static OR_INSTANCE: Rc<BooleanFold> = Rc::new(BooleanFold { kind: Kind::Or });
    static XOR_INSTANCE: Rc<BooleanFold> = Rc::new(BooleanFold { kind: Kind::Xor });
}

pub fn not_instance() -> Rc<dyn Operator> {
    NOT_INSTANCE.with(|c| Rc::clone(c) as Rc<dyn Operator>)
}

pub fn and_instance() -> Rc<dyn Operator> {
    AND_INSTANCE.with(|c| Rc::clone(c) as Rc<dyn Operator>)
}

pub fn or_instance() -> Rc<dyn Operator> {
    OR_INSTANCE.with(|c| Rc::clone(c) as Rc<dyn Operator>)
}

pub fn xor_instance() -> Rc<dyn Operator> {
    XOR_INSTANCE.with(|c| Rc::clone(c) as Rc<dyn Operator>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;

    fn b(v: bool) -> ExprRef {
        let c = Constant::new(Value::Boolean(v));
        c.activate();
        c as ExprRef
    }

    fn unknown() -> ExprRef {
        let c = Constant::unknown(ValueType::Boolean);
        c.activate();
        c as ExprRef
    }

    #[test]
    fn and_short_circuits_on_false() {
        let op = and_instance();
        assert_eq!(op.call(&[b(false), unknown()]), Value::Boolean(false));
    }

    #[test]
    fn or_short_circuits_on_true() {
        let op = or_instance();
        assert_eq!(op.call(&[b(true), unknown()]), Value::Boolean(true));
    }

    #[test]
    fn and_with_unknown_and_no_false_is_unknown() {
        let op = and_instance();
        assert_eq!(op.call(&[b(true), unknown()]), Value::Unknown(ValueType::Boolean));
    }

    #[test]
    fn not_unknown_is_unknown() {
        let op = not_instance();
        assert_eq!(op.call(&[unknown()]), Value::Unknown(ValueType::Boolean));
    }

    #[test]
    fn xor_is_unknown_if_any_operand_unknown() {
        let op = xor_instance();
        assert_eq!(op.call(&[b(true), unknown()]), Value::Unknown(ValueType::Boolean));
        assert_eq!(op.call(&[b(true), b(false)]), Value::Boolean(true));
    }
}
