//! Name → operator resolution (spec §4.10): given an XML element name
//! and the already-`check`ed types of its operands, hand back the
//! singleton `Operator` instance the parser's build pass should bind a
//! `Function` to. Polymorphic operators (arithmetic, the conversions,
//! `EQ`/`NE`) re-inspect `operand_types` here exactly as the spec's
//! factory registry describes; everything else ignores it.

use super::{arithmetic, array_ops, boolean, comparison, conversion, known, string_ops, NumericKind, Operator};
use crate::value::ValueType;
use std::rc::Rc;

/// Resolves an operator by its canonical XML element name (spec §6.1).
/// Returns `None` for names the catalogue doesn't recognize; the
/// caller (the parser's check pass) turns that into a `ParseError`.
pub fn resolve(name: &str, operand_types: &[ValueType]) -> Option<Rc<dyn Operator>> {
    let numeric_kind = || NumericKind::common_of(operand_types);

    Some(match name {
        "ADD" => arithmetic::add_instance(numeric_kind()),
        "SUB" => arithmetic::sub_instance(numeric_kind()),
        "MUL" => arithmetic::mul_instance(numeric_kind()),
        "DIV" => arithmetic::div_instance(numeric_kind()),
        "MOD" => arithmetic::mod_instance(numeric_kind()),
        "MIN" => arithmetic::min_instance(numeric_kind()),
        "MAX" => arithmetic::max_instance(numeric_kind()),
        "ABS" => arithmetic::abs_instance(numeric_kind()),
        "SQRT" => arithmetic::sqrt_instance(),

        "CEIL" => conversion::ceil_instance(ValueType::Integer),
        "CEIL_TO_REAL" => conversion::ceil_instance(ValueType::Real),
        "FLOOR" => conversion::floor_instance(ValueType::Integer),
        "FLOOR_TO_REAL" => conversion::floor_instance(ValueType::Real),
        "ROUND" => conversion::round_instance(ValueType::Integer),
        "ROUND_TO_REAL" => conversion::round_instance(ValueType::Real),
        "TRUNC" => conversion::trunc_instance(ValueType::Integer),
        "TRUNC_TO_REAL" => conversion::trunc_instance(ValueType::Real),
        "REAL_TO_INT" => conversion::real_to_int_instance(),

        "LT" => comparison::lt_instance(),
        "LE" | "LEQ" => comparison::le_instance(),
        "GT" => comparison::gt_instance(),
        "GE" | "GEQ" => comparison::ge_instance(),
        "EQNumeric" => comparison::eq_numeric_instance(),
        "NENumeric" => comparison::ne_numeric_instance(),
        "EQ" | "EQBoolean" | "EQString" | "EQArray" | "EQInternal" => {
            comparison::eq_generic_instance()
        }
        "NE" | "NEBoolean" | "NEString" | "NEArray" | "NEInternal" => {
            comparison::ne_generic_instance()
        }

        "NOT" => boolean::not_instance(),
        "AND" => boolean::and_instance(),
        "OR" => boolean::or_instance(),
        "XOR" => boolean::xor_instance(),

        "Concat" => string_ops::concat_instance(),
        "STRLEN" => string_ops::strlen_instance(),

        "ArraySize" => array_ops::array_size_instance(),
        "ArrayMaxSize" => array_ops::array_max_size_instance(),
        "ALL_KNOWN" => array_ops::all_known_instance(),
        "ANY_KNOWN" => array_ops::any_known_instance(),

        "IsKnown" => known::is_known_instance(),

        _ => return None,
    })
}

/// True for every canonical operator name the registry recognizes; used
/// by the check pass to distinguish "not an operator call" from
/// "operator call with bad arity/types" before it tries `resolve`.
pub fn is_operator_name(name: &str) -> bool {
    matches!(
        name,
        "ADD" | "SUB" | "MUL" | "DIV" | "MOD" | "MIN" | "MAX" | "ABS" | "SQRT"
            | "CEIL" | "CEIL_TO_REAL" | "FLOOR" | "FLOOR_TO_REAL" | "ROUND" | "ROUND_TO_REAL"
            | "TRUNC" | "TRUNC_TO_REAL" | "REAL_TO_INT"
            | "LT" | "LE" | "LEQ" | "GT" | "GE" | "GEQ"
            | "EQNumeric" | "NENumeric" | "EQ" | "EQBoolean" | "EQString" | "EQArray" | "EQInternal"
            | "NE" | "NEBoolean" | "NEString" | "NEArray" | "NEInternal"
            | "NOT" | "AND" | "OR" | "XOR"
            | "Concat" | "STRLEN"
            | "ArraySize" | "ArrayMaxSize" | "ALL_KNOWN" | "ANY_KNOWN"
            | "IsKnown"
    )
}
