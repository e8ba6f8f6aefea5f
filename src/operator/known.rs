//! `IsKnown` (spec §4.6): the one unary operator that is non-strict —
//! it reports its operand's known state and is itself never unknown
//! while active.

use super::Operator;
use crate::expression::ExprRef;
use crate::value::{Value, ValueType};
use std::rc::Rc;
use std::thread_local;

#[derive(Debug)]
pub struct IsKnown;

impl Operator for IsKnown {
    fn name(&self) -> &'static str {
        "IsKnown"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count == 1
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Boolean
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        Value::Boolean(args[0].is_known())
    }
}

thread_local! {
    static IS_KNOWN_INSTANCE: Rc<IsKnown> = Rc::new(IsKnown);
}

pub fn is_known_instance() -> Rc<dyn Operator> {
    IS_KNOWN_INSTANCE.with(|c| Rc::clone(c) as Rc<dyn Operator>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;

    #[test]
    fn is_known_reports_operand_state() {
        let op = is_known_instance();
        let known = Constant::new(Value::Integer(1));
        known.activate();
        assert_eq!(op.call(&[known as ExprRef]), Value::Boolean(true));

        let unknown = Constant::unknown(ValueType::Integer);
        unknown.activate();
        assert_eq!(op.call(&[unknown as ExprRef]), Value::Boolean(false));
    }
}
