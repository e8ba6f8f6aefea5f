//! Scoped name indirection (spec §4.9): `Alias` binds a local name, used
//! inside a library node, to a caller-supplied expression across the
//! call boundary. It forwards value, known-state, and notifications
//! transparently and is never itself assignable — writes to an aliased
//! formal parameter go straight through the base expression the parser
//! bound it to, never through the `Alias` wrapper.

use crate::expression::{ExprRef, Expression};
use crate::listener::{Listenable, Listener, NodeId};
use crate::value::{Value, ValueType};
use std::cell::Cell;
use std::rc::Weak;

/// One-argument transparent Propagator (spec §4.9). Unlike `Function`,
/// an `Alias` has no operator and no cached last-published value of its
/// own: forwarding is total, so there is nothing for it to compute or
/// compare.
#[derive(Debug)]
pub struct Alias {
    id: NodeId,
    base: ExprRef,
    activations: Cell<u32>,
}

impl Alias {
    pub fn new(base: ExprRef) -> Self {
        Self {
            id: NodeId::next(),
            base,
            activations: Cell::new(0),
        }
    }
}

impl Listenable for Alias {
    /// Delegates straight to the base expression rather than maintaining
    /// its own `Notifier`: an `Alias` never suppresses or transforms a
    /// notification, so there is no distinct listener list to dedupe
    /// against — registering under this `Alias`'s id on the base is
    /// exactly equivalent to the base publishing to the caller directly.
    fn add_listener(&self, id: NodeId, listener: Weak<dyn Listener>) {
        self.base.add_listener(id, listener);
    }

    fn remove_listener(&self, id: NodeId) {
        self.base.remove_listener(id);
    }

    fn is_propagation_source(&self) -> bool {
        self.base.is_propagation_source()
    }
}

impl Expression for Alias {
    fn value_type(&self) -> ValueType {
        self.base.value_type()
    }

    fn is_known(&self) -> bool {
        self.is_active() && self.base.is_known()
    }

    fn to_value(&self) -> Value {
        if self.is_active() {
            self.base.to_value()
        } else {
            Value::Unknown(self.base.value_type())
        }
    }

    fn is_active(&self) -> bool {
        self.activations.get() > 0
    }

    fn activate(&self) {
        let count = self.activations.get();
        self.activations.set(count + 1);
        if count == 0 {
            self.base.activate();
        }
    }

    fn deactivate(&self) {
        let count = self.activations.get();
        debug_assert!(count > 0, "activation counter underflow on Alias");
        let count = count.saturating_sub(1);
        self.activations.set(count);
        if count == 0 {
            self.base.deactivate();
        }
    }

    fn is_constant(&self) -> bool {
        self.base.is_constant()
    }

    /// Delegates to the base's own `get_base_expression` (recursing past
    /// it, not returning it) so that an `Alias`-of-an-`Alias` still
    /// reduces in one step for cycle detection and constant folding
    /// (spec §4.9): `None` here means "the base itself is not further
    /// reducible", matching the base's own answer, not `Some(self.base)`.
    fn get_base_expression(&self) -> Option<ExprRef> {
        self.base.get_base_expression().or_else(|| Some(self.base.clone()))
    }
}
