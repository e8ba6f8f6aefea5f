//! `Concat`, `STRLEN` (spec §4.6).

use super::Operator;
use crate::expression::ExprRef;
use crate::value::{Value, ValueType};
use std::rc::Rc;
use std::thread_local;

#[derive(Debug)]
pub struct Concat;

impl Operator for Concat {
    fn name(&self) -> &'static str {
        "Concat"
    }

    fn check_arg_count(&self, _count: usize) -> bool {
        true
    }

    fn check_arg_types(&self, types: &[ValueType]) -> bool {
        types.iter().all(|t| *t == ValueType::String || *t == ValueType::Unknown)
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::String
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let mut result = String::new();
        for arg in args {
            match arg.to_value().as_str() {
                Some(s) => result.push_str(s),
                None => return Value::Unknown(ValueType::String),
            }
        }
        Value::String(result)
    }
}

#[derive(Debug)]
pub struct Strlen;

impl Operator for Strlen {
    fn name(&self) -> &'static str {
        "STRLEN"
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count == 1
    }

    fn check_arg_types(&self, types: &[ValueType]) -> bool {
        types.len() == 1 && (types[0] == ValueType::String || types[0] == ValueType::Unknown)
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Integer
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        match args[0].to_value().as_str() {
            Some(s) => Value::Integer(s.chars().count() as i32),
            None => Value::Unknown(ValueType::Integer),
        }
    }
}

thread_local! {
    static CONCAT_INSTANCE: Rc<Concat> = Rc::new(Concat);
    static STRLEN_INSTANCE: Rc<Strlen> = Rc::new(Strlen);
}

pub fn concat_instance() -> Rc<dyn Operator> {
    CONCAT_INSTANCE.with(|c| Rc::clone(c) as Rc<dyn Operator>)
}

pub fn strlen_instance() -> Rc<dyn Operator> {
    STRLEN_INSTANCE.with(|c| Rc::clone(c) as Rc<dyn Operator>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;

    fn s(v: &str) -> ExprRef {
        let c = Constant::new(Value::String(v.to_string()));
        c.activate();
        c as ExprRef
    }

    #[test]
    fn concat_joins_operands() {
        let op = concat_instance();
        assert_eq!(op.call(&[s("foo"), s("bar")]), Value::String("foobar".into()));
    }

    #[test]
    fn concat_of_zero_args_is_empty_string() {
        let op = concat_instance();
        assert_eq!(op.call(&[]), Value::String(String::new()));
    }

    #[test]
    fn strlen_counts_characters() {
        let op = strlen_instance();
        assert_eq!(op.call(&[s("hello")]), Value::Integer(5));
    }
}
