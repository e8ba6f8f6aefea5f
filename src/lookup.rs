//! External state observation (spec §4.7): `LookupNow` resolves once per
//! read with no background subscription; `LookupOnChange` holds a live
//! subscription and republishes only once a delivered value clears its
//! tolerance band. Both are Propagators (spec §4.1) over `state_name`
//! and the argument vector: a rename of the looked-up state or a change
//! to any argument re-resolves the lookup exactly the way a `Function`
//! re-resolves its operator call when an operand changes.

use crate::expression::{ExprRef, Expression};
use crate::external::{ExternalInterface, SubscriptionHandle};
use crate::listener::{Listenable, Listener, NodeId, Notifier};
use crate::value::{publishes_change, Value, ValueType};
use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug, Formatter};
use std::rc::{Rc, Weak};

/// `None` if the state name or any argument is currently unknown (spec
/// §4.7 resolution edge case); both `LookupNow` and `LookupOnChange`
/// treat that the same way — the lookup itself reads as unknown and, for
/// `LookupOnChange`, carries no subscription.
fn resolve_name_and_args(state_name: &ExprRef, args: &[ExprRef]) -> Option<(String, Vec<Value>)> {
    if !state_name.is_known() {
        return None;
    }
    let name = state_name.to_value().as_str()?.to_string();
    let mut resolved = Vec::with_capacity(args.len());
    for arg in args {
        if !arg.is_known() {
            return None;
        }
        resolved.push(arg.to_value());
    }
    Some((name, resolved))
}

/// One-shot lookup (spec §4.7): every read re-resolves `state_name` and
/// `args` and calls straight through to `external.lookup_now`. No
/// subscription is ever registered.
#[derive(Debug)]
pub struct LookupNow {
    id: NodeId,
    state_name: ExprRef,
    args: Vec<ExprRef>,
    return_type: ValueType,
    external: Rc<dyn ExternalInterface>,
    notifier: Notifier,
    activations: Cell<u32>,
    last_published: RefCell<Value>,
    self_weak: Weak<LookupNow>,
}

impl LookupNow {
    pub fn new(
        state_name: ExprRef,
        args: Vec<ExprRef>,
        return_type: ValueType,
        external: Rc<dyn ExternalInterface>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            id: NodeId::next(),
            state_name,
            args,
            return_type,
            external,
            notifier: Notifier::new(),
            activations: Cell::new(0),
            last_published: RefCell::new(Value::Unknown(return_type)),
            self_weak: weak.clone(),
        })
    }

    fn current(&self) -> Value {
        if !self.is_active() {
            return Value::Unknown(self.return_type);
        }
        match resolve_name_and_args(&self.state_name, &self.args) {
            Some((name, args)) => self.external.lookup_now(&name, &args),
            None => Value::Unknown(self.return_type),
        }
    }

    fn weak_self_as_listener(&self) -> Weak<dyn Listener> {
        self.self_weak.clone()
    }
}

impl Listenable for LookupNow {
    fn add_listener(&self, id: NodeId, listener: Weak<dyn Listener>) {
        self.notifier.add_listener(id, listener);
    }

    fn remove_listener(&self, id: NodeId) {
        self.notifier.remove_listener(id);
    }

    fn is_propagation_source(&self) -> bool {
        true
    }
}

impl Listener for LookupNow {
    fn notify(&self) {
        let new_value = self.current();
        let mut last = self.last_published.borrow_mut();
        if publishes_change(&last, &new_value) {
            *last = new_value;
            drop(last);
            self.notifier.publish_change();
        }
    }
}

impl Expression for LookupNow {
    fn value_type(&self) -> ValueType {
        self.return_type
    }

    fn is_known(&self) -> bool {
        self.is_active() && self.current().is_known()
    }

    fn to_value(&self) -> Value {
        self.current()
    }

    fn is_active(&self) -> bool {
        self.activations.get() > 0
    }

    fn activate(&self) {
        let count = self.activations.get();
        self.activations.set(count + 1);
        if count > 0 {
            return;
        }
        self.state_name.activate();
        self.state_name.add_listener(self.id, self.weak_self_as_listener());
        for arg in &self.args {
            arg.activate();
            arg.add_listener(self.id, self.weak_self_as_listener());
        }
        let new_value = self.current();
        *self.last_published.borrow_mut() = new_value;
        self.notifier.publish_change();
    }

    fn deactivate(&self) {
        let count = self.activations.get();
        debug_assert!(count > 0, "activation counter underflow on LookupNow");
        let count = count.saturating_sub(1);
        self.activations.set(count);
        if count > 0 {
            return;
        }
        self.state_name.remove_listener(self.id);
        self.state_name.deactivate();
        for arg in &self.args {
            arg.remove_listener(self.id);
            arg.deactivate();
        }
        *self.last_published.borrow_mut() = Value::Unknown(self.return_type);
    }

    fn operands(&self) -> Vec<ExprRef> {
        let mut ops = Vec::with_capacity(1 + self.args.len());
        ops.push(self.state_name.clone());
        ops.extend(self.args.iter().cloned());
        ops
    }
}

/// Subscribed lookup (spec §4.7). Holds a live `SubscriptionHandle`
/// while active; `tolerance`, if present, bounds how far a delivered
/// numeric value may drift from the last *published* value before it
/// republishes (spec §8 property 6). A non-numeric value republishes on
/// any change, matching `publishes_change`'s general payload-inequality
/// rule.
pub struct LookupOnChange {
    id: NodeId,
    state_name: ExprRef,
    args: Vec<ExprRef>,
    tolerance: Option<ExprRef>,
    return_type: ValueType,
    external: Rc<dyn ExternalInterface>,
    notifier: Notifier,
    activations: Cell<u32>,
    cached: RefCell<Value>,
    subscription: RefCell<Option<SubscriptionHandle>>,
    self_weak: Weak<LookupOnChange>,
}

impl Debug for LookupOnChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupOnChange")
            .field("id", &self.id)
            .field("return_type", &self.return_type)
            .field("cached", &self.cached)
            .finish()
    }
}

impl LookupOnChange {
    pub fn new(
        state_name: ExprRef,
        args: Vec<ExprRef>,
        tolerance: Option<ExprRef>,
        return_type: ValueType,
        external: Rc<dyn ExternalInterface>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            id: NodeId::next(),
            state_name,
            args,
            tolerance,
            return_type,
            external,
            notifier: Notifier::new(),
            activations: Cell::new(0),
            cached: RefCell::new(Value::Unknown(return_type)),
            subscription: RefCell::new(None),
            self_weak: weak.clone(),
        })
    }

    fn weak_self_as_listener(&self) -> Weak<dyn Listener> {
        self.self_weak.clone()
    }

    /// Whether a freshly-delivered value clears the tolerance band
    /// against the last *published* value (spec §4.7, §8 property 6).
    fn should_republish(old: &Value, new: &Value, tolerance: Option<f64>) -> bool {
        match (old.is_known(), new.is_known()) {
            (false, false) => false,
            (old_known, new_known) if old_known != new_known => true,
            _ => match (old.as_f64(), new.as_f64()) {
                (Some(a), Some(b)) => (b - a).abs() > tolerance.unwrap_or(0.0),
                _ => old != new,
            },
        }
    }

    /// Invoked from the subscription callback (and directly, when the
    /// lookup itself becomes unresolvable). Updates the cache and
    /// publishes iff the tolerance band was cleared.
    fn receive(&self, new_value: Value) {
        let mut cached = self.cached.borrow_mut();
        let tolerance = self
            .tolerance
            .as_ref()
            .filter(|t| t.is_known())
            .and_then(|t| t.to_value().as_f64());
        if Self::should_republish(&cached, &new_value, tolerance) {
            *cached = new_value;
            drop(cached);
            self.notifier.publish_change();
        }
    }

    /// Tears down any live subscription and, if `state_name`/`args` are
    /// currently resolvable, registers a fresh one; otherwise publishes
    /// unknown (spec §4.7: "if the name becomes known or an argument
    /// changes, the subscription is torn down and re-registered").
    fn resubscribe(&self) {
        if let Some(handle) = self.subscription.borrow_mut().take() {
            self.external.unsubscribe(handle);
        }
        match resolve_name_and_args(&self.state_name, &self.args) {
            Some((name, args)) => {
                let tolerance = self
                    .tolerance
                    .as_ref()
                    .filter(|t| t.is_known())
                    .and_then(|t| t.to_value().as_f64());
                let weak = self.self_weak.clone();
                let callback: Rc<dyn Fn(Value)> = Rc::new(move |value: Value| {
                    if let Some(this) = weak.upgrade() {
                        this.receive(value);
                    }
                });
                let handle = self.external.subscribe(&name, &args, tolerance, callback);
                *self.subscription.borrow_mut() = Some(handle);
            }
            None => self.receive(Value::Unknown(self.return_type)),
        }
    }
}

impl Listenable for LookupOnChange {
    fn add_listener(&self, id: NodeId, listener: Weak<dyn Listener>) {
        self.notifier.add_listener(id, listener);
    }

    fn remove_listener(&self, id: NodeId) {
        self.notifier.remove_listener(id);
    }

    fn is_propagation_source(&self) -> bool {
        true
    }
}

impl Listener for LookupOnChange {
    /// A change in `state_name` or an argument re-resolves the
    /// subscription; it never, by itself, delivers a new lookup value.
    fn notify(&self) {
        self.resubscribe();
    }
}

impl Expression for LookupOnChange {
    fn value_type(&self) -> ValueType {
        self.return_type
    }

    fn is_known(&self) -> bool {
        self.is_active() && self.cached.borrow().is_known()
    }

    fn to_value(&self) -> Value {
        if self.is_active() {
            self.cached.borrow().clone()
        } else {
            Value::Unknown(self.return_type)
        }
    }

    fn is_active(&self) -> bool {
        self.activations.get() > 0
    }

    fn activate(&self) {
        let count = self.activations.get();
        self.activations.set(count + 1);
        if count > 0 {
            return;
        }
        self.state_name.activate();
        self.state_name.add_listener(self.id, self.weak_self_as_listener());
        for arg in &self.args {
            arg.activate();
            arg.add_listener(self.id, self.weak_self_as_listener());
        }
        if let Some(tolerance) = &self.tolerance {
            tolerance.activate();
        }
        *self.cached.borrow_mut() = Value::Unknown(self.return_type);
        self.resubscribe();
    }

    fn deactivate(&self) {
        let count = self.activations.get();
        debug_assert!(count > 0, "activation counter underflow on LookupOnChange");
        let count = count.saturating_sub(1);
        self.activations.set(count);
        if count > 0 {
            return;
        }
        if let Some(handle) = self.subscription.borrow_mut().take() {
            self.external.unsubscribe(handle);
        }
        self.state_name.remove_listener(self.id);
        self.state_name.deactivate();
        for arg in &self.args {
            arg.remove_listener(self.id);
            arg.deactivate();
        }
        if let Some(tolerance) = &self.tolerance {
            tolerance.deactivate();
        }
        *self.cached.borrow_mut() = Value::Unknown(self.return_type);
    }

    fn operands(&self) -> Vec<ExprRef> {
        let mut ops = Vec::with_capacity(2 + self.args.len());
        ops.push(self.state_name.clone());
        ops.extend(self.args.iter().cloned());
        ops.extend(self.tolerance.iter().cloned());
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;
    use std::cell::RefCell as StdRefCell;

    #[derive(Debug)]
    struct FixedInterface {
        value: Value,
    }

    impl ExternalInterface for FixedInterface {
        fn lookup_now(&self, _name: &str, _args: &[Value]) -> Value {
            self.value.clone()
        }

        fn subscribe(
            &self,
            _name: &str,
            _args: &[Value],
            _tolerance: Option<f64>,
            callback: Rc<dyn Fn(Value)>,
        ) -> SubscriptionHandle {
            callback(self.value.clone());
            SubscriptionHandle::next()
        }

        fn unsubscribe(&self, _handle: SubscriptionHandle) {}

        fn send_command(&self, _name: &str, _args: &[Value]) {}

        fn send_update(&self, _name: &str, _pairs: &[(String, Value)]) {}
    }

    #[derive(Debug, Default)]
    struct ScriptedInterface {
        deliveries: StdRefCell<Vec<Rc<dyn Fn(Value)>>>,
    }

    impl ExternalInterface for ScriptedInterface {
        fn lookup_now(&self, _name: &str, _args: &[Value]) -> Value {
            Value::Unknown(ValueType::Real)
        }

        fn subscribe(
            &self,
            _name: &str,
            _args: &[Value],
            _tolerance: Option<f64>,
            callback: Rc<dyn Fn(Value)>,
        ) -> SubscriptionHandle {
            self.deliveries.borrow_mut().push(callback);
            SubscriptionHandle::next()
        }

        fn unsubscribe(&self, _handle: SubscriptionHandle) {}
        fn send_command(&self, _name: &str, _args: &[Value]) {}
        fn send_update(&self, _name: &str, _pairs: &[(String, Value)]) {}
    }

    impl ScriptedInterface {
        fn deliver(&self, v: Value) {
            for cb in self.deliveries.borrow().iter() {
                cb(v.clone());
            }
        }
    }

    fn name_const(s: &str) -> ExprRef {
        Constant::new(Value::String(s.to_string())) as ExprRef
    }

    #[test]
    fn lookup_now_resolves_via_external_interface() {
        let external = Rc::new(FixedInterface { value: Value::Integer(42) });
        let lookup = LookupNow::new(name_const("altitude"), vec![], ValueType::Integer, external);
        lookup.activate();
        assert_eq!(lookup.to_value(), Value::Integer(42));
    }

    #[test]
    fn lookup_now_unresolvable_name_is_unknown() {
        let external = Rc::new(FixedInterface { value: Value::Integer(42) });
        let unknown_name = Constant::unknown(ValueType::String) as ExprRef;
        let lookup = LookupNow::new(unknown_name, vec![], ValueType::Integer, external);
        lookup.activate();
        assert_eq!(lookup.to_value(), Value::Unknown(ValueType::Integer));
    }

    #[test]
    fn tolerance_band_suppresses_small_deltas() {
        let external = Rc::new(ScriptedInterface::default());
        let tolerance = Constant::new(Value::Real(1.0)) as ExprRef;
        let lookup = LookupOnChange::new(
            name_const("altitude"),
            vec![],
            Some(tolerance),
            ValueType::Real,
            external.clone(),
        );

        let mut published = Vec::new();
        lookup.activate();
        external.deliver(Value::Real(10.0));
        published.push(lookup.to_value());
        external.deliver(Value::Real(10.4));
        published.push(lookup.to_value());
        external.deliver(Value::Real(11.5));
        published.push(lookup.to_value());
        external.deliver(Value::Unknown(ValueType::Real));
        published.push(lookup.to_value());
        external.deliver(Value::Real(11.5));
        published.push(lookup.to_value());

        assert_eq!(
            published,
            vec![
                Value::Real(10.0),
                Value::Real(10.0),
                Value::Real(11.5),
                Value::Unknown(ValueType::Real),
                Value::Real(11.5),
            ]
        );
    }

    #[test]
    fn deactivate_unsubscribes_exactly_once() {
        #[derive(Debug, Default)]
        struct CountingInterface {
            unsubscribes: StdRefCell<u32>,
        }
        impl ExternalInterface for CountingInterface {
            fn lookup_now(&self, _name: &str, _args: &[Value]) -> Value {
                Value::Unknown(ValueType::Integer)
            }
            fn subscribe(
                &self,
                _name: &str,
                _args: &[Value],
                _tolerance: Option<f64>,
                _callback: Rc<dyn Fn(Value)>,
            ) -> SubscriptionHandle {
                SubscriptionHandle::next()
            }
            fn unsubscribe(&self, _handle: SubscriptionHandle) {
                *self.unsubscribes.borrow_mut() += 1;
            }
            fn send_command(&self, _name: &str, _args: &[Value]) {}
            fn send_update(&self, _name: &str, _pairs: &[(String, Value)]) {}
        }

        let external = Rc::new(CountingInterface::default());
        let lookup = LookupOnChange::new(
            name_const("altitude"),
            vec![],
            None,
            ValueType::Integer,
            external.clone(),
        );
        lookup.activate();
        lookup.deactivate();
        assert_eq!(*external.unsubscribes.borrow(), 1);
        assert!(!lookup.is_known());
    }
}
