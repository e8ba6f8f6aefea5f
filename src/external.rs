//! The one boundary the expression subsystem crosses to reach the rest
//! of the executive (spec §6.2): `Lookup`, `Assignment` targeting a
//! command, and `Update` all talk to the outside world exclusively
//! through an `Rc<dyn ExternalInterface>` handed to them at construction
//! time. Nothing in this crate blocks on I/O — `subscribe`'s callback
//! fires synchronously from whatever code the implementor's event loop
//! runs on, the same cooperative single-threaded model as the rest of
//! the graph (spec §5).

use crate::value::Value;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque token returned by `subscribe`, handed back unchanged to
/// `unsubscribe`. Carries no interpretation of its own; the external
/// interface implementation is free to use it as an index, a map key,
/// or to ignore its value entirely.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The handle-shaped world the executive serves to `Lookup`, `Command`,
/// and `Update` (spec §6.2). Implemented outside this crate by whatever
/// actually talks to hardware, a simulator, or a test harness; the
/// expression subsystem only ever sees this trait object.
pub trait ExternalInterface: Debug {
    /// One-shot resolution of `name(args)`. Returns `Value::Unknown` of
    /// the caller's declared type if the state cannot currently be
    /// resolved; never panics, never blocks.
    fn lookup_now(&self, name: &str, args: &[Value]) -> Value;

    /// Registers interest in `name(args)`, with an optional numeric
    /// tolerance the interface may (but need not) use to throttle how
    /// often `callback` fires. `callback` is invoked with each delivered
    /// value, known or unknown, at the interface's discretion — the
    /// tolerance-band republish decision itself lives in
    /// `LookupOnChange`, not here.
    fn subscribe(
        &self,
        name: &str,
        args: &[Value],
        tolerance: Option<f64>,
        callback: Rc<dyn Fn(Value)>,
    ) -> SubscriptionHandle;

    /// Cancels a prior `subscribe`. Idempotent: unsubscribing a handle
    /// more than once, or one the interface never issued, is a no-op.
    fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Dispatches a command by name with its resolved argument values.
    /// Fire-and-forget from this crate's perspective: command handle and
    /// return-value tracking live in the node state machine, not here.
    fn send_command(&self, name: &str, args: &[Value]);

    /// Publishes a named-pair collection atomically (spec §4.9 `Update`).
    fn send_update(&self, name: &str, pairs: &[(String, Value)]);
}
