//! Assignable leaves: scalar [Variable] and [ArrayVariable] (spec §4.3).

use crate::array_value::ArrayValue;
use crate::error::PlanError;
use crate::expression::{Assignable, AssignableArray, ExprRef, Expression};
use crate::listener::{Listenable, Listener, NodeId, Notifier};
use crate::value::{publishes_change, Value, ValueType};
use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

/// Scalar assignable leaf (spec §4.3). Holds its own current/saved state
/// directly rather than delegating to `Value`'s `Unknown` variant for
/// "no payload", so that `set_unknown`/`save_current_value` don't need
/// to fabricate a placeholder payload.
#[derive(Debug)]
pub struct Variable {
    id: NodeId,
    name: Option<String>,
    declared_type: ValueType,
    current: RefCell<Value>,
    saved: RefCell<Option<Value>>,
    initializer: Option<ExprRef>,
    notifier: Notifier,
    activations: Cell<u32>,
}

impl Variable {
    pub fn new(declared_type: ValueType, name: Option<String>, initializer: Option<ExprRef>) -> Rc<Self> {
        Rc::new(Self {
            id: NodeId::next(),
            name,
            declared_type,
            current: RefCell::new(Value::Unknown(declared_type)),
            saved: RefCell::new(None),
            initializer,
            notifier: Notifier::new(),
            activations: Cell::new(0),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn publish_if_changed(&self, old: &Value, new: &Value) {
        if publishes_change(old, new) {
            self.notifier.publish_change();
        }
    }

    /// `set_value` (spec §4.3): stores the payload, sets the known
    /// flag, and publishes iff the (known, payload) pair actually moved.
    /// Does nothing while inactive, matching invariant 2 (an inactive
    /// node's reads are always unknown, so a write to one would be
    /// silently overwritten on the next `activate` anyway).
    pub fn set_value(&self, value: Value) {
        if !self.is_active() {
            return;
        }
        let old = self.current.replace(value.clone());
        self.publish_if_changed(&old, &value);
    }

    pub fn set_unknown(&self) {
        if !self.is_active() {
            return;
        }
        let new = Value::Unknown(self.declared_type);
        let old = self.current.replace(new.clone());
        self.publish_if_changed(&old, &new);
    }

    /// At most one saved value exists at a time (invariant 7); a second
    /// `save_current_value` before a `restore` simply overwrites the
    /// first.
    pub fn save_current_value(&self) {
        *self.saved.borrow_mut() = Some(self.current.borrow().clone());
    }

    pub fn restore_saved_value(&self) {
        let Some(saved) = self.saved.borrow_mut().take() else {
            return;
        };
        let old = self.current.replace(saved.clone());
        self.publish_if_changed(&old, &saved);
    }

    pub fn get_saved_value(&self) -> Option<Value> {
        self.saved.borrow().clone()
    }

    #[cfg(test)]
    pub fn listener_count_for_test(&self) -> usize {
        self.notifier.listener_count()
    }
}

impl Listenable for Variable {
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

impl Expression for Variable {
    fn value_type(&self) -> ValueType {
        self.declared_type
    }

    fn is_known(&self) -> bool {
        self.is_active() && self.current.borrow().is_known()
    }

    fn to_value(&self) -> Value {
        if self.is_active() {
            self.current.borrow().clone()
        } else {
            Value::Unknown(self.declared_type)
        }
    }

    fn is_active(&self) -> bool {
        self.activations.get() > 0
    }

    /// Activation adopts the initializer's value (if any) and unsets
    /// saved state, per the Built→Activated transition (spec §3.5,
    /// §4.11): re-activating an already-active variable just bumps the
    /// counter.
    fn activate(&self) {
        let count = self.activations.get();
        self.activations.set(count + 1);
        if count > 0 {
            return;
        }
        *self.saved.borrow_mut() = None;
        let initial = match &self.initializer {
            Some(init) => {
                init.activate();
                if init.is_known() {
                    init.to_value()
                } else {
                    Value::Unknown(self.declared_type)
                }
            }
            None => Value::Unknown(self.declared_type),
        };
        let old = self.current.replace(initial.clone());
        self.publish_if_changed(&old, &initial);
    }

    fn deactivate(&self) {
        let count = self.activations.get();
        debug_assert!(count > 0, "activation counter underflow on Variable");
        let count = count.saturating_sub(1);
        self.activations.set(count);
        if count > 0 {
            return;
        }
        if let Some(init) = &self.initializer {
            init.deactivate();
        }
        *self.current.borrow_mut() = Value::Unknown(self.declared_type);
        *self.saved.borrow_mut() = None;
    }

    fn operands(&self) -> Vec<ExprRef> {
        self.initializer.iter().cloned().collect()
    }

    fn is_assignable(&self) -> bool {
        true
    }

    fn as_assignable(&self) -> Option<&dyn Assignable> {
        Some(self)
    }
}

impl Assignable for Variable {
    fn set_value(&self, value: Value) -> Result<(), PlanError> {
        Variable::set_value(self, value);
        Ok(())
    }

    fn set_unknown(&self) -> Result<(), PlanError> {
        Variable::set_unknown(self);
        Ok(())
    }

    fn save_current_value(&self) {
        Variable::save_current_value(self);
    }

    fn restore_saved_value(&self) {
        Variable::restore_saved_value(self);
    }

    fn get_saved_value(&self) -> Option<Value> {
        Variable::get_saved_value(self)
    }
}

/// Array-valued assignable leaf (spec §4.3). The backing `ArrayValue`'s
/// capacity is fixed at activation time from `max_size` (or, absent one,
/// from the literal initializer's own length); growing past it is a
/// fatal plan error surfaced by the caller as `PlanError::ArrayCapacityExceeded`.
#[derive(Debug)]
pub struct ArrayVariable {
    id: NodeId,
    name: Option<String>,
    element_type: ValueType,
    max_size: Option<ExprRef>,
    initializer: Option<ExprRef>,
    current: RefCell<Option<ArrayValue>>,
    saved: RefCell<Option<Option<ArrayValue>>>,
    notifier: Notifier,
    activations: Cell<u32>,
}

impl ArrayVariable {
    pub fn new(
        element_type: ValueType,
        name: Option<String>,
        max_size: Option<ExprRef>,
        initializer: Option<ExprRef>,
    ) -> Rc<Self> {
        Rc::new(Self {
            id: NodeId::next(),
            name,
            element_type,
            max_size,
            initializer,
            current: RefCell::new(None),
            saved: RefCell::new(None),
            notifier: Notifier::new(),
            activations: Cell::new(0),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.current.borrow().as_ref().map(|a| a.capacity())
    }

    /// Whole-array write (spec §4.8: an `Assignment` may target an
    /// `ArrayVariable` directly, not just one of its elements). Silently
    /// does nothing while inactive, matching `Variable::set_value`; the
    /// element type must match exactly (`Assignment::execute` only calls
    /// this after checking `ValueType::are_compatible`, which for array
    /// types means an exact match — there is no Integer/Real promotion
    /// between array variants).
    pub fn set_array_value(&self, value: ArrayValue) {
        if !self.is_active() {
            return;
        }
        let new = Some(value);
        let old = self.current.replace(new.clone());
        self.publish_if_changed(&old, &new);
    }

    pub fn set_array_unknown(&self) {
        if !self.is_active() {
            return;
        }
        let old = self.current.replace(None);
        self.publish_if_changed(&old, &None);
    }

    pub fn save_current_array_value(&self) {
        *self.saved.borrow_mut() = Some(self.current.borrow().clone());
    }

    pub fn restore_saved_array_value(&self) {
        let Some(saved) = self.saved.borrow_mut().take() else {
            return;
        };
        let old = self.current.replace(saved.clone());
        self.publish_if_changed(&old, &saved);
    }

    pub fn get_saved_array_value(&self) -> Option<Value> {
        self.saved
            .borrow()
            .as_ref()
            .map(|array| Self::as_value(array, self.element_type))
    }

    fn as_value(array: &Option<ArrayValue>, element_type: ValueType) -> Value {
        match array {
            Some(a) => Value::Array(a.clone()),
            None => Value::Unknown(element_type.array_type().unwrap_or(element_type)),
        }
    }

    fn publish_if_changed(&self, old: &Option<ArrayValue>, new: &Option<ArrayValue>) {
        let old_value = Self::as_value(old, self.element_type);
        let new_value = Self::as_value(new, self.element_type);
        if publishes_change(&old_value, &new_value) {
            self.notifier.publish_change();
        }
    }

    /// Resolves the declared capacity at activation time: the
    /// `MaxSize` expression's value if present, else the initializer
    /// array literal's own length, else zero.
    fn resolve_capacity(&self) -> usize {
        if let Some(max_size) = &self.max_size {
            max_size.activate();
            let cap = max_size.to_value().as_i32();
            max_size.deactivate();
            if let Some(cap) = cap {
                return cap.max(0) as usize;
            }
        }
        if let Some(init) = &self.initializer {
            init.activate();
            let len = init.to_value().as_array().map(|a| a.size());
            init.deactivate();
            if let Some(len) = len {
                return len;
            }
        }
        0
    }
}

impl Listenable for ArrayVariable {
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

impl Expression for ArrayVariable {
    fn value_type(&self) -> ValueType {
        self.element_type.array_type().unwrap_or(self.element_type)
    }

    fn is_known(&self) -> bool {
        self.is_active() && self.current.borrow().is_some()
    }

    fn to_value(&self) -> Value {
        if self.is_active() {
            Self::as_value(&self.current.borrow(), self.element_type)
        } else {
            Value::Unknown(self.value_type())
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
        *self.saved.borrow_mut() = None;
        let capacity = self.resolve_capacity();
        let mut array = ArrayValue::with_capacity(self.element_type, capacity);
        if let (Some(init), Some(array)) = (&self.initializer, array.as_mut()) {
            init.activate();
            if let Some(literal) = init.to_value().as_array() {
                for i in 0..literal.size().min(array.size()) {
                    if let Some(Some(v)) = literal.get_element(i) {
                        let _ = array.set_element(i, v);
                    }
                }
            }
            init.deactivate();
        }
        let old = self.current.replace(array.clone());
        self.publish_if_changed(&old, &array);
    }

    fn deactivate(&self) {
        let count = self.activations.get();
        debug_assert!(count > 0, "activation counter underflow on ArrayVariable");
        let count = count.saturating_sub(1);
        self.activations.set(count);
        if count > 0 {
            return;
        }
        if let Some(init) = &self.initializer {
            init.deactivate();
        }
        *self.current.borrow_mut() = None;
        *self.saved.borrow_mut() = None;
    }

    fn operands(&self) -> Vec<ExprRef> {
        self.initializer.iter().cloned().chain(self.max_size.iter().cloned()).collect()
    }

    fn is_assignable(&self) -> bool {
        true
    }

    fn as_assignable(&self) -> Option<&dyn Assignable> {
        Some(self)
    }

    fn as_assignable_array(&self) -> Option<&dyn AssignableArray> {
        Some(self)
    }
}

impl Assignable for ArrayVariable {
    fn set_value(&self, value: Value) -> Result<(), PlanError> {
        match value {
            Value::Array(array) if array.element_type() == self.element_type => {
                self.set_array_value(array);
                Ok(())
            }
            Value::Unknown(_) => {
                self.set_array_unknown();
                Ok(())
            }
            other => Err(PlanError::AssignmentTypeMismatch {
                expected: self.value_type(),
                actual: other.value_type(),
            }),
        }
    }

    fn set_unknown(&self) -> Result<(), PlanError> {
        self.set_array_unknown();
        Ok(())
    }

    fn save_current_value(&self) {
        self.save_current_array_value();
    }

    fn restore_saved_value(&self) {
        self.restore_saved_array_value();
    }

    fn get_saved_value(&self) -> Option<Value> {
        self.get_saved_array_value()
    }
}

impl AssignableArray for ArrayVariable {
    fn set_element(&self, index: usize, value: Value) -> bool {
        let old = self.current.borrow().clone();
        let mut current = self.current.borrow_mut();
        let Some(array) = current.as_mut() else {
            return false;
        };
        if array.set_element(index, value).is_err() {
            return false;
        }
        let new = current.clone();
        drop(current);
        self.publish_if_changed(&old, &new);
        true
    }

    fn set_element_unknown(&self, index: usize) -> bool {
        let old = self.current.borrow().clone();
        let mut current = self.current.borrow_mut();
        let Some(array) = current.as_mut() else {
            return false;
        };
        if array.set_element_unknown(index).is_err() {
            return false;
        }
        let new = current.clone();
        drop(current);
        self.publish_if_changed(&old, &new);
        true
    }
}
