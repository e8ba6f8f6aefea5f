//! Immutable leaves (spec §4.2). Constants never propagate — no
//! listeners are ever needed — and the factory interns the handful of
//! well-known singletons instead of allocating fresh nodes for them.

use crate::expression::{ExprRef, Expression};
use crate::listener::{Listenable, NodeId, Listener};
use crate::value::{CommandHandle, FailureType, NodeOutcome, NodeState, Value, ValueType};
use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::thread_local;

/// An immutable leaf carrying either `(type, known payload)` or
/// `(type, unknown)`.
///
/// Constants are exempt from the usual active/inactive lifecycle
/// (invariant 2 normally says an inactive node reads as unknown): since
/// a constant has no initializer to run and nothing about it can change,
/// there is no distinct "built but not yet activated" state worth
/// tracking, and singleton constants are shared across unrelated parts
/// of the graph that would otherwise race to activate/deactivate a
/// value they don't individually own. A `Constant` therefore always
/// reads as known (iff its payload is known) regardless of
/// `activate`/`deactivate`, matching the source's `Constant` which never
/// overrides the base class's trivial activation bookkeeping.
#[derive(Debug)]
pub struct Constant {
    value: Value,
}

impl Constant {
    pub fn new(value: Value) -> Rc<Self> {
        Rc::new(Self { value })
    }

    pub fn unknown(ty: ValueType) -> Rc<Self> {
        Self::new(Value::Unknown(ty))
    }
}

impl Listenable for Constant {
    fn add_listener(&self, _id: NodeId, _listener: Weak<dyn Listener>) {
        // No-op: a constant's value never changes, so it never needs to
        // notify anyone.
    }

    fn remove_listener(&self, _id: NodeId) {}

    fn is_propagation_source(&self) -> bool {
        false
    }
}

impl Expression for Constant {
    fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    fn is_known(&self) -> bool {
        self.value.is_known()
    }

    fn to_value(&self) -> Value {
        self.value.clone()
    }

    fn is_active(&self) -> bool {
        true
    }

    fn activate(&self) {}

    fn deactivate(&self) {}

    fn is_constant(&self) -> bool {
        true
    }
}

thread_local! {
    static TRUE: Rc<Constant> = Constant::new(Value::Boolean(true));
    static FALSE: Rc<Constant> = Constant::new(Value::Boolean(false));
    static BOOL_UNKNOWN: Rc<Constant> = Constant::unknown(ValueType::Boolean);

    static INT_ZERO: Rc<Constant> = Constant::new(Value::Integer(0));
    static INT_ONE: Rc<Constant> = Constant::new(Value::Integer(1));
    static INT_NEG_ONE: Rc<Constant> = Constant::new(Value::Integer(-1));

    static REAL_ZERO: Rc<Constant> = Constant::new(Value::Real(0.0));
    static REAL_ONE: Rc<Constant> = Constant::new(Value::Real(1.0));
    static REAL_NEG_ONE: Rc<Constant> = Constant::new(Value::Real(-1.0));

    static NODE_STATE_SINGLETONS: [Rc<Constant>; 7] = [
        Constant::new(Value::NodeState(NodeState::Inactive)),
        Constant::new(Value::NodeState(NodeState::Waiting)),
        Constant::new(Value::NodeState(NodeState::Executing)),
        Constant::new(Value::NodeState(NodeState::Finishing)),
        Constant::new(Value::NodeState(NodeState::Finished)),
        Constant::new(Value::NodeState(NodeState::Failing)),
        Constant::new(Value::NodeState(NodeState::IterationEnded)),
    ];

    static NODE_OUTCOME_SINGLETONS: [Rc<Constant>; 4] = [
        Constant::new(Value::NodeOutcome(NodeOutcome::Success)),
        Constant::new(Value::NodeOutcome(NodeOutcome::Failure)),
        Constant::new(Value::NodeOutcome(NodeOutcome::Skipped)),
        Constant::new(Value::NodeOutcome(NodeOutcome::Interrupted)),
    ];

    static FAILURE_TYPE_SINGLETONS: [Rc<Constant>; 5] = [
        Constant::new(Value::FailureType(FailureType::PreConditionFailed)),
        Constant::new(Value::FailureType(FailureType::PostConditionFailed)),
        Constant::new(Value::FailureType(FailureType::InvariantConditionFailed)),
        Constant::new(Value::FailureType(FailureType::ParentFailed)),
        Constant::new(Value::FailureType(FailureType::ExitedWithFailure)),
    ];

    static COMMAND_HANDLE_SINGLETONS: [Rc<Constant>; 6] = [
        Constant::new(Value::CommandHandle(CommandHandle::CommandSentToSystem)),
        Constant::new(Value::CommandHandle(CommandHandle::CommandAccepted)),
        Constant::new(Value::CommandHandle(CommandHandle::CommandRejected)),
        Constant::new(Value::CommandHandle(CommandHandle::CommandSuccess)),
        Constant::new(Value::CommandHandle(CommandHandle::CommandFailed)),
        Constant::new(Value::CommandHandle(CommandHandle::CommandDenied)),
    ];
}

/// Factory for constants. Returns `(expr, created)` so callers (the
/// parser's `allocate()`) know whether a fresh heap object was produced,
/// per spec §4.10; interned singletons report `created = false`.
///
/// Nothing here needs to activate the returned node: a `Constant` reads
/// as known (or not) the same way whether or not anyone has called
/// `activate` on it, so the lifecycle's Built/Activated distinction is
/// simply moot for this node type.
pub fn make_constant(value: Value) -> (ExprRef, bool) {
    macro_rules! intern {
        ($cell:expr) => {{
            let c = $cell.with(|c| Rc::clone(c));
            (c as ExprRef, false)
        }};
    }
    match &value {
        Value::Boolean(true) => intern!(TRUE),
        Value::Boolean(false) => intern!(FALSE),
        Value::Unknown(ValueType::Boolean) => intern!(BOOL_UNKNOWN),
        Value::Integer(0) => intern!(INT_ZERO),
        Value::Integer(1) => intern!(INT_ONE),
        Value::Integer(-1) => intern!(INT_NEG_ONE),
        Value::Real(r) if *r == 0.0 => intern!(REAL_ZERO),
        Value::Real(r) if *r == 1.0 => intern!(REAL_ONE),
        Value::Real(r) if *r == -1.0 => intern!(REAL_NEG_ONE),
        Value::NodeState(s) => (node_state_constant(*s), false),
        Value::NodeOutcome(o) => (node_outcome_constant(*o), false),
        Value::FailureType(f) => (failure_type_constant(*f), false),
        Value::CommandHandle(h) => (command_handle_constant(*h), false),
        _ => (Constant::new(value) as ExprRef, true),
    }
}

/// Named-constant tables for the four internal enums (spec §3.1, §3.3,
/// §4.2): one singleton per member, returned instead of ever allocating
/// a fresh `Constant` — the same interning discipline `make_constant`
/// applies to the well-known Boolean/Integer/Real values above. Plan
/// literals for these types (`<NodeStateValue>`, …) go through
/// `make_constant`, which dispatches straight here; `node_ref.rs`'s
/// comparison helpers call these directly when building an `EQInternal`
/// comparison against a node-internal reference.
pub fn node_state_constant(state: NodeState) -> ExprRef {
    NODE_STATE_SINGLETONS.with(|table| Rc::clone(&table[state as usize]) as ExprRef)
}

pub fn node_outcome_constant(outcome: NodeOutcome) -> ExprRef {
    NODE_OUTCOME_SINGLETONS.with(|table| Rc::clone(&table[outcome as usize]) as ExprRef)
}

pub fn failure_type_constant(failure: FailureType) -> ExprRef {
    FAILURE_TYPE_SINGLETONS.with(|table| Rc::clone(&table[failure as usize]) as ExprRef)
}

pub fn command_handle_constant(handle: CommandHandle) -> ExprRef {
    COMMAND_HANDLE_SINGLETONS.with(|table| Rc::clone(&table[handle as usize]) as ExprRef)
}
