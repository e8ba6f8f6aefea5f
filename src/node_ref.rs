//! Node-internal references (spec §4.9): `NodeStateVariable`,
//! `NodeOutcomeVariable`, `NodeCommandHandleVariable`, and
//! `NodeFailureVariable` are read-only views on another plan node's
//! scheduling state. That state lives in the node scheduler, outside
//! this crate's scope (spec §1) — [NodeStateSource] is the narrow
//! boundary through which each view reads its current value and relays
//! listener registration, the same shape `ExternalInterface` gives
//! `Lookup`.

use crate::constant::{command_handle_constant, failure_type_constant, node_outcome_constant, node_state_constant};
use crate::expression::{ExprRef, Expression};
use crate::function::Function;
use crate::listener::{Listenable, Listener, NodeId};
use crate::operator::comparison::eq_generic_instance;
use crate::value::{CommandHandle, FailureType, NodeOutcome, NodeState, Value, ValueType};
use std::cell::Cell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

/// The scheduler-side handle a node-internal reference reads through.
/// `None` from any getter means "not yet known" (e.g. a `NodeOutcome`
/// query against a node still `EXECUTING`), not "node unreachable" —
/// an unreachable `NodeRef` is a build-time `ParseError`, never a
/// runtime unknown.
pub trait NodeStateSource: Debug {
    fn current_state(&self) -> Option<NodeState>;
    fn current_outcome(&self) -> Option<NodeOutcome>;
    fn current_failure_type(&self) -> Option<FailureType>;
    fn current_command_handle(&self) -> Option<CommandHandle>;

    /// Registers/removes interest in this node's scheduling state
    /// changing. The four views below all relay straight through to
    /// these rather than keeping a `Notifier` of their own — exactly
    /// the forwarding shape `Alias` uses for its base expression, since
    /// the actual change-publication machinery for node state lives on
    /// the scheduler side of this boundary.
    fn add_listener(&self, id: NodeId, listener: Weak<dyn Listener>);
    fn remove_listener(&self, id: NodeId);
}

macro_rules! node_ref_view {
    ($name:ident, $value_type:expr, $getter:ident, $variant:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug)]
        pub struct $name {
            source: Rc<dyn NodeStateSource>,
            activations: Cell<u32>,
        }

        impl $name {
            pub fn new(source: Rc<dyn NodeStateSource>) -> Self {
                Self {
                    source,
                    activations: Cell::new(0),
                }
            }
        }

        impl Listenable for $name {
            fn add_listener(&self, id: NodeId, listener: Weak<dyn Listener>) {
                self.source.add_listener(id, listener);
            }

            fn remove_listener(&self, id: NodeId) {
                self.source.remove_listener(id);
            }

            /// Always a propagation source (spec §4.9): the node it
            /// observes can change scheduling state with no subexpression
            /// of this crate's graph changing at all.
            fn is_propagation_source(&self) -> bool {
                true
            }
        }

        impl Expression for $name {
            fn value_type(&self) -> ValueType {
                $value_type
            }

            fn is_known(&self) -> bool {
                self.is_active() && self.source.$getter().is_some()
            }

            fn to_value(&self) -> Value {
                if self.is_active() {
                    match self.source.$getter() {
                        Some(v) => Value::$variant(v),
                        None => Value::Unknown($value_type),
                    }
                } else {
                    Value::Unknown($value_type)
                }
            }

            fn is_active(&self) -> bool {
                self.activations.get() > 0
            }

            fn activate(&self) {
                self.activations.set(self.activations.get() + 1);
            }

            fn deactivate(&self) {
                let count = self.activations.get();
                debug_assert!(count > 0, concat!("activation counter underflow on ", stringify!($name)));
                self.activations.set(count.saturating_sub(1));
            }
        }
    };
}

node_ref_view!(
    NodeStateVariable,
    ValueType::NodeState,
    current_state,
    NodeState,
    "Read-only view of a referenced node's current `NodeState` (spec §6.1 `<NodeStateVariable>`)."
);
node_ref_view!(
    NodeOutcomeVariable,
    ValueType::NodeOutcome,
    current_outcome,
    NodeOutcome,
    "Read-only view of a referenced node's `NodeOutcome`, known only once the node has finished."
);
node_ref_view!(
    NodeFailureVariable,
    ValueType::FailureType,
    current_failure_type,
    FailureType,
    "Read-only view of a referenced node's `FailureType`, known only if the node actually failed."
);
node_ref_view!(
    NodeCommandHandleVariable,
    ValueType::CommandHandle,
    current_command_handle,
    CommandHandle,
    "Read-only view of the `CommandHandle` for a command node this reference names."
);

/// Builds the `EQInternal`-shaped comparison a plan uses to test a
/// node-internal reference against a named enum member (e.g.
/// `NodeStateVariable == FINISHED`), the same `EQ`-operator-over-two-args
/// shape the parser's `build_operator` constructs for any other binary
/// comparison (spec §4.9, §6.1). The comparison operand is always one of
/// the interned enum singletons, never a fresh `Constant`.
pub fn state_equals(view: ExprRef, state: NodeState) -> ExprRef {
    let rhs = node_state_constant(state);
    Function::new(eq_generic_instance(), vec![view, rhs], &[ValueType::NodeState, ValueType::NodeState]) as ExprRef
}

pub fn outcome_equals(view: ExprRef, outcome: NodeOutcome) -> ExprRef {
    let rhs = node_outcome_constant(outcome);
    Function::new(eq_generic_instance(), vec![view, rhs], &[ValueType::NodeOutcome, ValueType::NodeOutcome]) as ExprRef
}

pub fn failure_equals(view: ExprRef, failure: FailureType) -> ExprRef {
    let rhs = failure_type_constant(failure);
    Function::new(eq_generic_instance(), vec![view, rhs], &[ValueType::FailureType, ValueType::FailureType]) as ExprRef
}

pub fn command_handle_equals(view: ExprRef, handle: CommandHandle) -> ExprRef {
    let rhs = command_handle_constant(handle);
    Function::new(eq_generic_instance(), vec![view, rhs], &[ValueType::CommandHandle, ValueType::CommandHandle]) as ExprRef
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Default)]
    struct FakeSource {
        state: RefCell<Option<NodeState>>,
        listener_count: Cell<usize>,
    }

    impl NodeStateSource for FakeSource {
        fn current_state(&self) -> Option<NodeState> {
            *self.state.borrow()
        }
        fn current_outcome(&self) -> Option<NodeOutcome> {
            None
        }
        fn current_failure_type(&self) -> Option<FailureType> {
            None
        }
        fn current_command_handle(&self) -> Option<CommandHandle> {
            None
        }
        fn add_listener(&self, _id: NodeId, _listener: Weak<dyn Listener>) {
            self.listener_count.set(self.listener_count.get() + 1);
        }
        fn remove_listener(&self, _id: NodeId) {
            self.listener_count.set(self.listener_count.get().saturating_sub(1));
        }
    }

    #[test]
    fn inactive_node_state_reference_reads_unknown() {
        let source = Rc::new(FakeSource::default());
        *source.state.borrow_mut() = Some(NodeState::Executing);
        let view = NodeStateVariable::new(source);
        assert_eq!(view.to_value(), Value::Unknown(ValueType::NodeState));
    }

    #[test]
    fn active_node_state_reference_reflects_source() {
        let source = Rc::new(FakeSource::default());
        *source.state.borrow_mut() = Some(NodeState::Executing);
        let view = NodeStateVariable::new(source.clone());
        view.activate();
        assert_eq!(view.to_value(), Value::NodeState(NodeState::Executing));

        *source.state.borrow_mut() = Some(NodeState::Finished);
        assert_eq!(view.to_value(), Value::NodeState(NodeState::Finished));
    }

    #[test]
    fn add_listener_relays_to_source() {
        let source = Rc::new(FakeSource::default());
        let view = NodeStateVariable::new(source.clone());
        struct Counter;
        impl Debug for Counter {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "Counter")
            }
        }
        impl Listener for Counter {
            fn notify(&self) {}
        }
        let listener: Rc<dyn Listener> = Rc::new(Counter);
        let id = NodeId::next();
        view.add_listener(id, Rc::downgrade(&listener));
        assert_eq!(source.listener_count.get(), 1);
        view.remove_listener(id);
        assert_eq!(source.listener_count.get(), 0);
    }

    #[test]
    fn node_outcome_reference_is_unknown_until_source_reports_one() {
        let source = Rc::new(FakeSource::default());
        let view = NodeOutcomeVariable::new(source);
        view.activate();
        assert!(!view.is_known());
    }

    #[test]
    fn state_equals_compares_against_interned_constant() {
        let source = Rc::new(FakeSource::default());
        *source.state.borrow_mut() = Some(NodeState::Finished);
        let view = Rc::new(NodeStateVariable::new(source)) as ExprRef;
        view.activate();

        let matches = state_equals(view.clone(), NodeState::Finished);
        matches.activate();
        assert_eq!(matches.to_value(), Value::Boolean(true));

        let no_match = state_equals(view, NodeState::Executing);
        no_match.activate();
        assert_eq!(no_match.to_value(), Value::Boolean(false));
    }
}
