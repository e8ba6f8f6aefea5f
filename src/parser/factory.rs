//! Name → construct classification (spec §4.10). Distinct from
//! `operator::registry`, which only resolves operator element names to
//! an `Operator` singleton: this table covers every expression-relevant
//! tag in spec §6.1, so `check.rs`/`build.rs` share one place that knows
//! "what kind of thing is a `<BooleanVariable>`" instead of duplicating
//! the match arms in both passes.

use crate::value::ValueType;

/// What an element's tag name tells us about how to check/build it,
/// before looking at its children or attributes at all.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Literal(ValueType),
    ArrayLiteral,
    ScalarVariableRef,
    ArrayVariableRef,
    ArrayElement,
    Operator,
    LookupNow,
    LookupOnChange,
    Assignment,
    DeclareVariable,
    DeclareArray,
    VariableDeclarations,
    NodeStateVariable,
    NodeOutcomeVariable,
    NodeCommandHandleVariable,
    NodeFailureVariable,
    Update,
}

/// Classifies a tag name, or `None` if it isn't one this crate builds
/// expressions for directly (e.g. a node-action tag that only ever
/// appears as a parent of one of these).
pub fn classify(name: &str) -> Option<ElementKind> {
    use ElementKind::*;
    Some(match name {
        "BooleanValue" => Literal(ValueType::Boolean),
        "IntegerValue" => Literal(ValueType::Integer),
        "RealValue" => Literal(ValueType::Real),
        "StringValue" => Literal(ValueType::String),
        "DateValue" => Literal(ValueType::Date),
        "DurationValue" => Literal(ValueType::Duration),
        "ArrayValue" => ArrayLiteral,

        "NodeStateValue" => Literal(ValueType::NodeState),
        "NodeOutcomeValue" => Literal(ValueType::NodeOutcome),
        "NodeFailureValue" => Literal(ValueType::FailureType),
        "NodeCommandHandleValue" => Literal(ValueType::CommandHandle),

        "BooleanVariable" | "IntegerVariable" | "RealVariable" | "StringVariable" => ScalarVariableRef,
        "ArrayVariable" => ArrayVariableRef,
        "ArrayElement" => ArrayElement,

        "LookupNow" => LookupNow,
        "LookupOnChange" => LookupOnChange,

        "Assignment" => Assignment,

        "DeclareVariable" => DeclareVariable,
        "DeclareArray" => DeclareArray,
        "VariableDeclarations" => VariableDeclarations,

        "NodeStateVariable" => NodeStateVariable,
        "NodeOutcomeVariable" => NodeOutcomeVariable,
        "NodeCommandHandleVariable" => NodeCommandHandleVariable,
        "NodeFailureVariable" => NodeFailureVariable,

        "Update" => Update,

        other if crate::operator::registry::is_operator_name(other) => Operator,

        _ => return None,
    })
}

/// The scalar `ValueType` a `DeclareVariable`/`<Type>` text names, or a
/// variable-reference tag implies — shared by the check and build
/// passes so the string-to-type mapping lives in one place.
pub fn scalar_type_by_name(name: &str) -> Option<ValueType> {
    Some(match name {
        "Boolean" | "BooleanVariable" => ValueType::Boolean,
        "Integer" | "IntegerVariable" => ValueType::Integer,
        "Real" | "RealVariable" => ValueType::Real,
        "String" | "StringVariable" => ValueType::String,
        "Date" => ValueType::Date,
        "Duration" => ValueType::Duration,
        _ => return None,
    })
}
