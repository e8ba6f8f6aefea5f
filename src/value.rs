//! The type lattice and tagged-union value that every expression node
//! produces (spec §3.1).

use crate::array_value::ArrayValue;
use std::fmt::{self, Display, Formatter};

/// The closed enumeration of every value type an expression can carry.
/// `Unknown` is a second axis, not a user type: it means "type not yet
/// determined", distinct from a known-type expression whose current
/// value happens to be unknown (see [Value]).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Unknown,

    // Scalar user types
    Boolean,
    Integer,
    Real,
    String,
    Date,
    Duration,

    // Array user types, one per scalar element type
    BooleanArray,
    IntegerArray,
    RealArray,
    StringArray,

    // Internal (enumeration) types
    NodeState,
    NodeOutcome,
    FailureType,
    CommandHandle,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueType::Integer | ValueType::Real | ValueType::Date | ValueType::Duration
        )
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            ValueType::BooleanArray
                | ValueType::IntegerArray
                | ValueType::RealArray
                | ValueType::StringArray
        )
    }

    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            ValueType::Boolean
                | ValueType::Integer
                | ValueType::Real
                | ValueType::String
                | ValueType::Date
                | ValueType::Duration
        )
    }

    pub fn is_internal(self) -> bool {
        matches!(
            self,
            ValueType::NodeState
                | ValueType::NodeOutcome
                | ValueType::FailureType
                | ValueType::CommandHandle
        )
    }

    /// The scalar element type of an array type, if this is one.
    pub fn array_element_type(self) -> Option<ValueType> {
        match self {
            ValueType::BooleanArray => Some(ValueType::Boolean),
            ValueType::IntegerArray => Some(ValueType::Integer),
            ValueType::RealArray => Some(ValueType::Real),
            ValueType::StringArray => Some(ValueType::String),
            _ => None,
        }
    }

    /// The array type whose elements are this scalar type, if any.
    pub fn array_type(self) -> Option<ValueType> {
        match self {
            ValueType::Boolean => Some(ValueType::BooleanArray),
            ValueType::Integer => Some(ValueType::IntegerArray),
            ValueType::Real => Some(ValueType::RealArray),
            ValueType::String => Some(ValueType::StringArray),
            _ => None,
        }
    }

    /// Reflexive type compatibility check used throughout the check
    /// pass: `Integer` widens to `Real`, `Date`/`Duration` are
    /// `Real`-compatible, and `Unknown` is compatible with anything.
    pub fn are_compatible(expected: ValueType, actual: ValueType) -> bool {
        if expected == actual || expected == ValueType::Unknown || actual == ValueType::Unknown {
            return true;
        }
        match (expected, actual) {
            (ValueType::Real, ValueType::Integer) => true,
            (ValueType::Real, ValueType::Date) | (ValueType::Real, ValueType::Duration) => true,
            (ValueType::Date, ValueType::Real) | (ValueType::Duration, ValueType::Real) => true,
            _ => false,
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Unknown => "Unknown",
            ValueType::Boolean => "Boolean",
            ValueType::Integer => "Integer",
            ValueType::Real => "Real",
            ValueType::String => "String",
            ValueType::Date => "Date",
            ValueType::Duration => "Duration",
            ValueType::BooleanArray => "BooleanArray",
            ValueType::IntegerArray => "IntegerArray",
            ValueType::RealArray => "RealArray",
            ValueType::StringArray => "StringArray",
            ValueType::NodeState => "NodeState",
            ValueType::NodeOutcome => "NodeOutcome",
            ValueType::FailureType => "FailureType",
            ValueType::CommandHandle => "CommandHandle",
        };
        write!(f, "{}", name)
    }
}

/// The node-internal enumerations (spec §3.1, §4.9). Spellings match the
/// canonical strings used in debug printing (spec §6.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeState {
    Inactive,
    Waiting,
    Executing,
    Finishing,
    Finished,
    Failing,
    IterationEnded,
}

impl Display for NodeState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Inactive => "INACTIVE",
            NodeState::Waiting => "WAITING",
            NodeState::Executing => "EXECUTING",
            NodeState::Finishing => "FINISHING",
            NodeState::Finished => "FINISHED",
            NodeState::Failing => "FAILING",
            NodeState::IterationEnded => "ITERATION_ENDED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeOutcome {
    Success,
    Failure,
    Skipped,
    Interrupted,
}

impl Display for NodeOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeOutcome::Success => "SUCCESS",
            NodeOutcome::Failure => "FAILURE",
            NodeOutcome::Skipped => "SKIPPED",
            NodeOutcome::Interrupted => "INTERRUPTED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FailureType {
    PreConditionFailed,
    PostConditionFailed,
    InvariantConditionFailed,
    ParentFailed,
    ExitedWithFailure,
}

impl Display for FailureType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureType::PreConditionFailed => "PRE_CONDITION_FAILED",
            FailureType::PostConditionFailed => "POST_CONDITION_FAILED",
            FailureType::InvariantConditionFailed => "INVARIANT_CONDITION_FAILED",
            FailureType::ParentFailed => "PARENT_FAILED",
            FailureType::ExitedWithFailure => "EXITED_WITH_FAILURE",
        };
        write!(f, "{}", s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandHandle {
    CommandSentToSystem,
    CommandAccepted,
    CommandRejected,
    CommandSuccess,
    CommandFailed,
    CommandDenied,
}

impl Display for CommandHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandHandle::CommandSentToSystem => "COMMAND_SENT_TO_SYSTEM",
            CommandHandle::CommandAccepted => "COMMAND_ACCEPTED",
            CommandHandle::CommandRejected => "COMMAND_REJECTED",
            CommandHandle::CommandSuccess => "COMMAND_SUCCESS",
            CommandHandle::CommandFailed => "COMMAND_FAILED",
            CommandHandle::CommandDenied => "COMMAND_DENIED",
        };
        write!(f, "{}", s)
    }
}

/// A boxed, dynamically-typed value, used for unknown-typed or
/// reflective access (`to_value()`). `Unknown(ty)` carries the declared
/// type even though no payload is present.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Unknown(ValueType),
    Boolean(bool),
    Integer(i32),
    Real(f64),
    String(String),
    Date(f64),
    Duration(f64),
    Array(ArrayValue),
    NodeState(NodeState),
    NodeOutcome(NodeOutcome),
    FailureType(FailureType),
    CommandHandle(CommandHandle),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Unknown(ty) => *ty,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Real(_) => ValueType::Real,
            Value::String(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
            Value::Duration(_) => ValueType::Duration,
            Value::Array(a) => a.value_type(),
            Value::NodeState(_) => ValueType::NodeState,
            Value::NodeOutcome(_) => ValueType::NodeOutcome,
            Value::FailureType(_) => ValueType::FailureType,
            Value::CommandHandle(_) => ValueType::CommandHandle,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Value::Unknown(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric read with Integer→Real promotion (spec §3.2, invariant
    /// that Integer nodes also satisfy Real reads).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(r) | Value::Date(r) | Value::Duration(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unknown(_) => write!(f, "UNKNOWN"),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) | Value::Date(r) | Value::Duration(r) => write!(f, "{:?}", r),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Array(a) => write!(f, "{}", a),
            Value::NodeState(s) => write!(f, "{}", s),
            Value::NodeOutcome(o) => write!(f, "{}", o),
            Value::FailureType(ft) => write!(f, "{}", ft),
            Value::CommandHandle(ch) => write!(f, "{}", ch),
        }
    }
}

/// Invariant 4 (spec §3.4): a value is re-published iff the known flag
/// toggled, or both old and new are known and the payload differs.
/// Shared by every node that caches its last-published value to decide
/// whether to call `publish_change` (Variables, ArrayReferences,
/// Functions acting as Propagators).
pub fn publishes_change(old: &Value, new: &Value) -> bool {
    match (old.is_known(), new.is_known()) {
        (false, false) => false,
        (old_known, new_known) if old_known != new_known => true,
        _ => old != new,
    }
}

/// Parse a literal for the given scalar type from its XML text content
/// (spec §6.1 `<…Value>` elements). Returns `None` if the literal is
/// malformed; the caller turns that into a `ParseError` with its own
/// source span.
pub fn parse_scalar(ty: ValueType, text: &str) -> Option<Value> {
    let text = text.trim();
    match ty {
        ValueType::Boolean => match text {
            "true" | "1" | "TRUE" => Some(Value::Boolean(true)),
            "false" | "0" | "FALSE" => Some(Value::Boolean(false)),
            _ => None,
        },
        ValueType::Integer => text.parse::<i32>().ok().map(Value::Integer),
        ValueType::Real => text.parse::<f64>().ok().map(Value::Real),
        ValueType::Date => text.parse::<f64>().ok().map(Value::Date),
        ValueType::Duration => text.parse::<f64>().ok().map(Value::Duration),
        ValueType::String => Some(Value::String(text.to_string())),
        ValueType::NodeState => parse_node_state(text).map(Value::NodeState),
        ValueType::NodeOutcome => parse_node_outcome(text).map(Value::NodeOutcome),
        ValueType::FailureType => parse_failure_type(text).map(Value::FailureType),
        ValueType::CommandHandle => parse_command_handle(text).map(Value::CommandHandle),
        _ => None,
    }
}

/// Inverse of `NodeState`'s `Display` (spec §6.3's canonical spellings),
/// used to parse a `<NodeStateValue>` literal.
pub fn parse_node_state(text: &str) -> Option<NodeState> {
    Some(match text {
        "INACTIVE" => NodeState::Inactive,
        "WAITING" => NodeState::Waiting,
        "EXECUTING" => NodeState::Executing,
        "FINISHING" => NodeState::Finishing,
        "FINISHED" => NodeState::Finished,
        "FAILING" => NodeState::Failing,
        "ITERATION_ENDED" => NodeState::IterationEnded,
        _ => return None,
    })
}

/// Inverse of `NodeOutcome`'s `Display`.
pub fn parse_node_outcome(text: &str) -> Option<NodeOutcome> {
    Some(match text {
        "SUCCESS" => NodeOutcome::Success,
        "FAILURE" => NodeOutcome::Failure,
        "SKIPPED" => NodeOutcome::Skipped,
        "INTERRUPTED" => NodeOutcome::Interrupted,
        _ => return None,
    })
}

/// Inverse of `FailureType`'s `Display`.
pub fn parse_failure_type(text: &str) -> Option<FailureType> {
    Some(match text {
        "PRE_CONDITION_FAILED" => FailureType::PreConditionFailed,
        "POST_CONDITION_FAILED" => FailureType::PostConditionFailed,
        "INVARIANT_CONDITION_FAILED" => FailureType::InvariantConditionFailed,
        "PARENT_FAILED" => FailureType::ParentFailed,
        "EXITED_WITH_FAILURE" => FailureType::ExitedWithFailure,
        _ => return None,
    })
}

/// Inverse of `CommandHandle`'s `Display`.
pub fn parse_command_handle(text: &str) -> Option<CommandHandle> {
    Some(match text {
        "COMMAND_SENT_TO_SYSTEM" => CommandHandle::CommandSentToSystem,
        "COMMAND_ACCEPTED" => CommandHandle::CommandAccepted,
        "COMMAND_REJECTED" => CommandHandle::CommandRejected,
        "COMMAND_SUCCESS" => CommandHandle::CommandSuccess,
        "COMMAND_FAILED" => CommandHandle::CommandFailed,
        "COMMAND_DENIED" => CommandHandle::CommandDenied,
        _ => return None,
    })
}

/// Storage coercion for an `Assignment` whose right-hand side value
/// already passed `ValueType::are_compatible(declared, value.value_type())`
/// in the check pass: an `Integer` literal/result assigned to a `Real`
/// (or `Date`/`Duration`) destination is widened to the destination's
/// representation so the stored payload matches `declared` exactly,
/// rather than leaving a narrower variant behind `publishes_change`
/// comparisons would otherwise have to special-case.
pub fn coerce_for_assignment(declared: ValueType, value: Value) -> Value {
    match (declared, value) {
        (ValueType::Real, Value::Integer(i)) => Value::Real(i as f64),
        (ValueType::Date, Value::Integer(i)) => Value::Date(i as f64),
        (ValueType::Date, Value::Real(r)) => Value::Date(r),
        (ValueType::Duration, Value::Integer(i)) => Value::Duration(i as f64),
        (ValueType::Duration, Value::Real(r)) => Value::Duration(r),
        (_, value) => value,
    }
}
