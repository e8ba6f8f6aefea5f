//! Index-mediated array access (spec §4.4): `ArrayReference` (read) and
//! `MutableArrayReference` (read + write through to the backing array).

use crate::error::PlanError;
use crate::expression::{Assignable, ExprRef, Expression};
use crate::listener::{Listenable, Listener, NodeId, Notifier};
use crate::value::{publishes_change, Value, ValueType};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Resolves `array[index]` against the current values of both operand
/// expressions. Shared by both reference variants since the read side is
/// identical; only `MutableArrayReference` additionally allows writes.
fn resolve(array: &ExprRef, index: &ExprRef, element_type: ValueType) -> Value {
    let index = match index.to_value().as_i32() {
        Some(i) if i >= 0 => i as usize,
        _ => return Value::Unknown(element_type),
    };
    let array_value = array.to_value();
    let array_value = match array_value.as_array() {
        Some(a) => a,
        None => return Value::Unknown(element_type),
    };
    match array_value.get_element(index) {
        Some(Some(v)) => v,
        _ => Value::Unknown(element_type),
    }
}

/// A read-only Propagator over `array[index]` (spec §4.4). Listens to
/// both operands; republishes only when its own resolved value changes,
/// per the general Propagator contract (spec §5).
#[derive(Debug)]
pub struct ArrayReference {
    id: NodeId,
    array: ExprRef,
    index: ExprRef,
    element_type: ValueType,
    notifier: Notifier,
    activations: Cell<u32>,
    last_published: RefCell<Value>,
    self_weak: Weak<ArrayReference>,
}

impl ArrayReference {
    /// Built via `Rc::new_cyclic` so `activate`/`deactivate` can register
    /// itself as a listener on `array`/`index` without a separate
    /// two-phase setup step, mirroring `Function::new`.
    pub fn new(array: ExprRef, index: ExprRef, element_type: ValueType) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            id: NodeId::next(),
            array,
            index,
            element_type,
            notifier: Notifier::new(),
            activations: Cell::new(0),
            last_published: RefCell::new(Value::Unknown(element_type)),
            self_weak: weak.clone(),
        })
    }

    fn current(&self) -> Value {
        if !self.is_active() {
            return Value::Unknown(self.element_type);
        }
        resolve(&self.array, &self.index, self.element_type)
    }

    fn weak_self_as_listener(&self) -> Weak<dyn Listener> {
        self.self_weak.clone()
    }
}

impl Listenable for ArrayReference {
    fn add_listener(&self, id: NodeId, listener: Weak<dyn Listener>) {
        self.notifier.add_listener(id, listener);
    }

    fn remove_listener(&self, id: NodeId) {
        self.notifier.remove_listener(id);
    }
}

impl Listener for ArrayReference {
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

impl Expression for ArrayReference {
    fn value_type(&self) -> ValueType {
        self.element_type
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
        if count == 0 {
            self.array.activate();
            self.array.add_listener(self.id, self.weak_self_as_listener());
            self.index.activate();
            self.index.add_listener(self.id, self.weak_self_as_listener());
            let new_value = self.current();
            let old = self.last_published.replace(new_value.clone());
            if publishes_change(&old, &new_value) {
                self.notifier.publish_change();
            }
        }
    }

    fn deactivate(&self) {
        let count = self.activations.get();
        debug_assert!(count > 0, "activation counter underflow on ArrayReference");
        let count = count.saturating_sub(1);
        self.activations.set(count);
        if count == 0 {
            self.array.remove_listener(self.id);
            self.array.deactivate();
            self.index.remove_listener(self.id);
            self.index.deactivate();
            *self.last_published.borrow_mut() = Value::Unknown(self.element_type);
        }
    }

    fn operands(&self) -> Vec<ExprRef> {
        vec![self.array.clone(), self.index.clone()]
    }
}

/// Read/write variant (spec §4.4). The backing `array` expression must be
/// assignable; the parser's check pass rejects a non-assignable array
/// operand before this type is ever constructed.
#[derive(Debug)]
pub struct MutableArrayReference {
    inner: Rc<ArrayReference>,
    saved: RefCell<Option<Value>>,
}

impl MutableArrayReference {
    /// `array` must satisfy `is_assignable()`; the caller (the build-pass
    /// factory) is responsible for having checked this already.
    pub fn new(array: ExprRef, index: ExprRef, element_type: ValueType) -> Rc<Self> {
        debug_assert!(
            array.is_assignable(),
            "MutableArrayReference built over a non-assignable array expression"
        );
        Rc::new(Self {
            inner: ArrayReference::new(array, index, element_type),
            saved: RefCell::new(None),
        })
    }

    fn index_usize(&self) -> Option<usize> {
        match self.inner.index.to_value().as_i32() {
            Some(i) if i >= 0 => Some(i as usize),
            _ => None,
        }
    }

    /// Writes the element if the reference resolves to a valid, in-range
    /// slot; fails if the array or index is currently unknown, or if the
    /// index is out of the array's declared capacity.
    pub fn write_element(&self, value: Value) -> Result<(), PlanError> {
        let index = self.index_usize().ok_or(PlanError::AssignmentFailed)?;
        let array_expr = self
            .inner
            .array
            .as_assignable_array()
            .ok_or(PlanError::AssignmentFailed)?;
        if !array_expr.set_element(index, value) {
            return Err(PlanError::AssignmentFailed);
        }
        self.inner.notify();
        Ok(())
    }

    pub fn write_element_unknown(&self) -> Result<(), PlanError> {
        let index = self.index_usize().ok_or(PlanError::AssignmentFailed)?;
        let array_expr = self
            .inner
            .array
            .as_assignable_array()
            .ok_or(PlanError::AssignmentFailed)?;
        if !array_expr.set_element_unknown(index) {
            return Err(PlanError::AssignmentFailed);
        }
        self.inner.notify();
        Ok(())
    }
}

impl Listenable for MutableArrayReference {
    fn add_listener(&self, id: NodeId, listener: Weak<dyn Listener>) {
        self.inner.add_listener(id, listener);
    }

    fn remove_listener(&self, id: NodeId) {
        self.inner.remove_listener(id);
    }
}

impl Expression for MutableArrayReference {
    fn value_type(&self) -> ValueType {
        self.inner.value_type()
    }

    fn is_known(&self) -> bool {
        self.inner.is_known()
    }

    fn to_value(&self) -> Value {
        self.inner.to_value()
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    fn activate(&self) {
        self.inner.activate();
    }

    fn deactivate(&self) {
        self.inner.deactivate();
    }

    fn operands(&self) -> Vec<ExprRef> {
        self.inner.operands()
    }

    fn is_assignable(&self) -> bool {
        true
    }

    fn as_assignable(&self) -> Option<&dyn Assignable> {
        Some(self)
    }
}

impl Assignable for MutableArrayReference {
    fn set_value(&self, value: Value) -> Result<(), PlanError> {
        self.write_element(value)
    }

    fn set_unknown(&self) -> Result<(), PlanError> {
        self.write_element_unknown()
    }

    /// Snapshots the currently-resolved element value rather than the
    /// index, so `restore_saved_value` writes back the element that was
    /// saved even if the index expression's value has since changed
    /// (spec §3.2, invariant 7).
    fn save_current_value(&self) {
        *self.saved.borrow_mut() = Some(self.to_value());
    }

    fn restore_saved_value(&self) {
        let Some(saved) = self.saved.borrow_mut().take() else {
            return;
        };
        let _ = if saved.is_known() {
            self.write_element(saved)
        } else {
            self.write_element_unknown()
        };
    }

    fn get_saved_value(&self) -> Option<Value> {
        self.saved.borrow().clone()
    }
}
