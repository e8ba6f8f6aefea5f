//! The change-propagation mesh: [Listenable], [Notifier], and the
//! `Propagator` behavior interior expression nodes compose on top of it
//! (spec §4.1).
//!
//! Ownership of graph edges collapses to `Rc`/`Weak` here (see
//! SPEC_FULL.md §3/§9): a listener is reached through a `Weak<dyn
//! Listener>` so that the listener mesh never keeps a node alive past
//! its last real owner.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counter backing [NodeId]. Single-threaded executive, but
/// an atomic is the simplest way to hand out unique ids without `unsafe`.
static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity for a node in the listener mesh, used to de-duplicate
/// (source, listener) pairs (invariant 5) and to remove a listener again
/// on `deactivate`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Something that can be notified of an upstream change. Interior nodes
/// (`Function`, `Lookup`, ...) implement this on themselves so they can
/// be registered as a listener of their own operands.
pub trait Listener: Debug {
    /// Called synchronously by the source's `publish_change`. Must not
    /// panic, and must tolerate being called re-entrantly (a listener's
    /// own `notify` may itself trigger more `publish_change` calls
    /// further up the graph).
    fn notify(&self);
}

/// The minimum surface every expression node exposes to the listener
/// mesh (spec §4.1). Constants implement this with no-ops; Variables,
/// Lookups, and Propagators back it with a real [Notifier].
pub trait Listenable {
    fn add_listener(&self, id: NodeId, listener: Weak<dyn Listener>);
    fn remove_listener(&self, id: NodeId);

    /// True iff this node's value may change independently of any
    /// subexpression (Variables, Lookups, and the small allow-list of
    /// propagation-source operators such as random number generators).
    fn is_propagation_source(&self) -> bool {
        false
    }
}

/// Reusable listener-list implementation. Embedded by value in any node
/// that needs to publish change notifications; the node's own
/// `Listenable` impl delegates straight through.
#[derive(Debug, Default)]
pub struct Notifier {
    listeners: RefCell<Vec<(NodeId, Weak<dyn Listener>)>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, id: NodeId, listener: Weak<dyn Listener>) {
        let mut listeners = self.listeners.borrow_mut();
        // Invariant 5: no duplicate (source, listener) pair.
        if !listeners.iter().any(|(existing, _)| *existing == id) {
            listeners.push((id, listener));
        }
    }

    pub fn remove_listener(&self, id: NodeId) {
        self.listeners.borrow_mut().retain(|(existing, _)| *existing != id);
    }

    /// Fan out to every current listener exactly once. Listeners that
    /// have already been dropped (their `Weak` fails to upgrade) are
    /// silently skipped and swept out on the next mutation.
    ///
    /// The listener list is snapshotted (cloned) before iterating, so a
    /// listener that mutates this very list during its own `notify` (a
    /// re-entrant `activate`/`deactivate`) cannot invalidate the
    /// in-progress iteration.
    pub fn publish_change(&self) {
        let snapshot: Vec<(NodeId, Weak<dyn Listener>)> =
            self.listeners.borrow().clone();
        for (_, weak) in snapshot {
            if let Some(listener) = weak.upgrade() {
                listener.notify();
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}
