//! Two error kinds (spec §7): [ParseError] raised from the check pass —
//! always carrying a source [Span], never caught inside the core — and
//! [PlanError] raised at runtime for operations a plan asked for but
//! cannot complete.
//!
//! Evaluation failures with a defensible three-valued reading (division
//! or modulo by zero, `SQRT` of a negative operand, an out-of-range or
//! non-integral `REAL_TO_INT`/`CEIL`/... conversion) are deliberately
//! NOT represented here: those resolve to `Value::Unknown` locally
//! inside the operator that hit them and never reach this module (spec
//! §7 design rule). Internal-consistency failures (a null operator
//! singleton, an activation-counter underflow) are `debug_assert!`s next
//! to the code they'd guard, not variants here — they indicate a bug in
//! this crate, not in a plan.

use crate::util::Span;
use crate::value::ValueType;
use thiserror::Error;

/// A check-pass failure, anchored to the XML source location that
/// caused it (spec §6.1: `FileName`/`LineNo`/`ColNo`).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{span}: {kind}")]
pub struct ParseError {
    pub span: Span,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(span: Span, kind: ParseErrorKind) -> Self {
        Self { span, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("unrecognized plan element `<{0}>`")]
    UnknownElement(String),

    #[error("unrecognized operator `{0}`")]
    UnknownOperator(String),

    #[error("`{name}` expects {expected} argument(s), found {actual}")]
    ArityMismatch {
        name: String,
        expected: &'static str,
        actual: usize,
    },

    #[error("`{name}` does not accept {actual} argument(s)")]
    ArgCountInvalid { name: String, actual: usize },

    #[error("`{name}` does not accept operands of the given type(s)")]
    ArgTypesInvalid { name: String },

    #[error("expected a value of type {expected}, found {actual}")]
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },

    #[error("reference to undeclared variable `{0}`")]
    UndeclaredVariable(String),

    #[error("`{0}` is declared more than once in this scope")]
    DuplicateDeclaration(String),

    #[error("`{0}` would introduce a cycle in the expression graph")]
    Cycle(String),

    #[error("malformed {0} literal `{1}`")]
    MalformedLiteral(ValueType, String),

    #[error("missing required child element `<{0}>`")]
    MissingChild(String),

    #[error("`<NodeRef>`/`<NodeId>` `{0}` does not resolve to a known node")]
    UnresolvedNodeRef(String),

    #[error("`{0}` is not an assignable expression")]
    NotAssignable(String),

    #[error("a non-assignable array expression cannot be indexed for write")]
    NonAssignableArray,

    #[error("malformed XML: {0}")]
    Xml(String),
}

/// A runtime failure: legal syntax, illegal at execution time (spec §7).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("cannot assign a value of type {actual} to a destination declared {expected}")]
    AssignmentTypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },

    /// The destination refused the write: either it is currently
    /// inactive/unresolved (an unknown array or index backing a
    /// `MutableArrayReference`) or, for element writes, the resolved
    /// index fell outside the array's capacity.
    #[error("assignment destination refused the write (inactive or out of range)")]
    AssignmentFailed,

    #[error("array index {index} out of bounds (capacity {capacity})")]
    ArrayIndexOutOfBounds { index: i64, capacity: usize },

    #[error("array growth to size {requested} exceeds declared capacity {capacity}")]
    ArrayCapacityExceeded { capacity: usize, requested: usize },

    #[error("Lookup of undeclared state `{0}`")]
    UndeclaredLookup(String),
}

impl From<crate::array_value::ArrayBoundsError> for PlanError {
    fn from(e: crate::array_value::ArrayBoundsError) -> Self {
        PlanError::ArrayIndexOutOfBounds {
            index: e.index as i64,
            capacity: e.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_displays_span_and_kind() {
        let err = ParseError::new(
            Span::new("plan.plx", 3, 7),
            ParseErrorKind::UndeclaredVariable("x".into()),
        );
        assert_eq!(
            err.to_string(),
            "plan.plx:3:7: reference to undeclared variable `x`"
        );
    }

    #[test]
    fn plan_error_from_array_bounds() {
        let bounds = crate::array_value::ArrayBoundsError {
            index: 5,
            capacity: 3,
        };
        let plan_err: PlanError = bounds.into();
        assert_eq!(
            plan_err,
            PlanError::ArrayIndexOutOfBounds {
                index: 5,
                capacity: 3
            }
        );
    }
}
