//! `ArraySize`, `ArrayMaxSize`, `ALL_KNOWN`, `ANY_KNOWN` (spec §4.6):
//! unary, all strict in the array operand. `ArrayMaxSize` is implemented
//! as the declared capacity rather than reproducing the source's
//! `ArraySize`-aliasing TODO (spec §9 resolution 4).

use super::Operator;
use crate::expression::ExprRef;
use crate::value::{Value, ValueType};
use std::rc::Rc;
use std::thread_local;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Kind {
    Size,
    MaxSize,
    AllKnown,
    AnyKnown,
}

#[derive(Debug)]
pub struct ArrayOp {
    kind: Kind,
}

impl Operator for ArrayOp {
    fn name(&self) -> &'static str {
        match self.kind {
            Kind::Size => "ArraySize",
            Kind::MaxSize => "ArrayMaxSize",
            Kind::AllKnown => "ALL_KNOWN",
            Kind::AnyKnown => "ANY_KNOWN",
        }
    }

    fn check_arg_count(&self, count: usize) -> bool {
        count == 1
    }

    fn check_arg_types(&self, types: &[ValueType]) -> bool {
        types.len() == 1 && (types[0].is_array() || types[0] == ValueType::Unknown)
    }

    fn value_type(&self, _arg_types: &[ValueType]) -> ValueType {
        match self.kind {
            Kind::Size | Kind::MaxSize => ValueType::Integer,
            Kind::AllKnown | Kind::AnyKnown => ValueType::Boolean,
        }
    }

    fn call(&self, args: &[ExprRef]) -> Value {
        let value = args[0].to_value();
        let Some(array) = value.as_array() else {
            return Value::Unknown(self.value_type(&[]));
        };
        match self.kind {
            // The declared capacity and the runtime size coincide in
            // this crate (see `ArrayValue::size`'s doc comment), so
            // `ArraySize` and `ArrayMaxSize` read the same field; they
            // remain distinct operators because a plan may legitimately
            // ask for either one by name.
            Kind::Size | Kind::MaxSize => Value::Integer(array.size() as i32),
            Kind::AllKnown => Value::Boolean(array.all_known()),
            Kind::AnyKnown => Value::Boolean(array.any_known()),
        }
    }
}

macro_rules! array_op_singleton {
    ($ctor:ident, $cell:ident, $kind:expr) => {
        thread_local! {
            static $cell: Rc<ArrayOp> = Rc::new(ArrayOp { kind: $kind });
        }

        pub fn $ctor() -> Rc<dyn Operator> {
            $cell.with(|c| Rc::clone(c) as Rc<dyn Operator>)
        }
    };
}

array_op_singleton!(array_size_instance, ARRAY_SIZE_INSTANCE, Kind::Size);
array_op_singleton!(array_max_size_instance, ARRAY_MAX_SIZE_INSTANCE, Kind::MaxSize);
array_op_singleton!(all_known_instance, ALL_KNOWN_INSTANCE, Kind::AllKnown);
array_op_singleton!(any_known_instance, ANY_KNOWN_INSTANCE, Kind::AnyKnown);
