//! `Function`/`CachedFunction`: an operator bound to a fixed argument
//! vector (spec §4.5). A `Function` is a Propagator (spec §4.1): it
//! subscribes to every argument on `activate` and forwards upstream
//! notifications only when its own computed value actually changes.

use crate::expression::{ExprRef, Expression};
use crate::listener::{Listenable, Listener, NodeId, Notifier};
use crate::operator::Operator;
use crate::value::{publishes_change, Value, ValueType};
use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug, Formatter};
use std::rc::{Rc, Weak};

/// Three storage shapes for the argument vector (spec §4.5): nullary,
/// fixed-arity up to 4 (the overwhelming majority of operator calls in
/// a plan), and n-ary for `ADD`/`Concat`/etc. called with more operands.
/// `as_slice` gives every caller a uniform view regardless of shape.
enum Args {
    Nullary,
    Fixed1([ExprRef; 1]),
    Fixed2([ExprRef; 2]),
    Fixed3([ExprRef; 3]),
    Fixed4([ExprRef; 4]),
    NAry(Vec<ExprRef>),
}

impl Args {
    fn from_vec(mut args: Vec<ExprRef>) -> Self {
        match args.len() {
            0 => Args::Nullary,
            1 => Args::Fixed1([args.remove(0)]),
            2 => {
                let b = args.remove(1);
                let a = args.remove(0);
                Args::Fixed2([a, b])
            }
            3 => {
                let c = args.remove(2);
                let b = args.remove(1);
                let a = args.remove(0);
                Args::Fixed3([a, b, c])
            }
            4 => {
                let d = args.remove(3);
                let c = args.remove(2);
                let b = args.remove(1);
                let a = args.remove(0);
                Args::Fixed4([a, b, c, d])
            }
            _ => Args::NAry(args),
        }
    }

    fn as_slice(&self) -> &[ExprRef] {
        match self {
            Args::Nullary => &[],
            Args::Fixed1(a) => a,
            Args::Fixed2(a) => a,
            Args::Fixed3(a) => a,
            Args::Fixed4(a) => a,
            Args::NAry(v) => v,
        }
    }
}

impl Debug for Args {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice().iter()).finish()
    }
}

/// An operator plus its bound arguments (spec §4.5). Built via
/// [Function::new], which wires the Propagator's self-listener using
/// `Rc::new_cyclic` so `activate`/`deactivate` can register/unregister
/// itself as a listener on each argument without a separate two-phase
/// setup step.
#[derive(Debug)]
pub struct Function {
    id: NodeId,
    operator: Rc<dyn Operator>,
    args: Args,
    value_type: ValueType,
    notifier: Notifier,
    activations: Cell<u32>,
    last_published: RefCell<Value>,
    self_weak: Weak<Function>,
}

impl Function {
    /// `arg_types` must already have passed `operator.check_arg_types`;
    /// the parser's check pass is the only caller responsible for that.
    pub fn new(operator: Rc<dyn Operator>, args: Vec<ExprRef>, arg_types: &[ValueType]) -> Rc<Self> {
        let value_type = operator.value_type(arg_types);
        Rc::new_cyclic(|weak| Self {
            id: NodeId::next(),
            args: Args::from_vec(args),
            value_type,
            notifier: Notifier::new(),
            activations: Cell::new(0),
            last_published: RefCell::new(Value::Unknown(value_type)),
            self_weak: weak.clone(),
            operator,
        })
    }

    fn current(&self) -> Value {
        if !self.is_active() {
            return Value::Unknown(self.value_type);
        }
        self.operator.call(self.args.as_slice())
    }

    fn weak_self_as_listener(&self) -> Weak<dyn Listener> {
        self.self_weak.clone()
    }
}

impl Listenable for Function {
    fn add_listener(&self, id: NodeId, listener: Weak<dyn Listener>) {
        self.notifier.add_listener(id, listener);
    }

    fn remove_listener(&self, id: NodeId) {
        self.notifier.remove_listener(id);
    }

    fn is_propagation_source(&self) -> bool {
        self.operator.is_propagation_source()
    }
}

impl Listener for Function {
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

impl Expression for Function {
    fn value_type(&self) -> ValueType {
        self.value_type
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
        for arg in self.args.as_slice() {
            arg.activate();
            arg.add_listener(self.id, self.weak_self_as_listener());
        }
        let new_value = self.current();
        *self.last_published.borrow_mut() = new_value;
        self.notifier.publish_change();
    }

    fn deactivate(&self) {
        let count = self.activations.get();
        debug_assert!(count > 0, "activation counter underflow on Function");
        let count = count.saturating_sub(1);
        self.activations.set(count);
        if count > 0 {
            return;
        }
        for arg in self.args.as_slice() {
            arg.remove_listener(self.id);
            arg.deactivate();
        }
        *self.last_published.borrow_mut() = Value::Unknown(self.value_type);
    }

    fn operands(&self) -> Vec<ExprRef> {
        self.args.as_slice().to_vec()
    }
}

/// Adds a persistent cache of the last computed value (spec §4.5): for
/// String/Array-returning operators, callers that want a stable
/// reference across multiple reads (rather than a fresh clone per call)
/// use [CachedFunction::value_ref] instead of `to_value()`. Non-cached
/// `Function` recomputes from scratch on every `to_value()` call, which
/// is the right default for cheap scalar operators.
#[derive(Debug)]
pub struct CachedFunction {
    inner: Rc<Function>,
    cache: RefCell<Value>,
}

impl CachedFunction {
    pub fn new(operator: Rc<dyn Operator>, args: Vec<ExprRef>, arg_types: &[ValueType]) -> Rc<Self> {
        let inner = Function::new(operator, args, arg_types);
        let value_type = inner.value_type();
        Rc::new(Self {
            inner,
            cache: RefCell::new(Value::Unknown(value_type)),
        })
    }

    /// Refreshes the cache from the current operand state and returns a
    /// borrow of it; the borrow is only valid until the next call that
    /// mutates the cache (activate/deactivate/value recompute), mirroring
    /// the lifetime note on `get_value_pointer` (spec §3.2).
    pub fn value_ref(&self) -> std::cell::Ref<'_, Value> {
        let fresh = self.inner.to_value();
        *self.cache.borrow_mut() = fresh;
        self.cache.borrow()
    }
}

impl Listenable for CachedFunction {
    fn add_listener(&self, id: NodeId, listener: Weak<dyn Listener>) {
        self.inner.add_listener(id, listener);
    }

    fn remove_listener(&self, id: NodeId) {
        self.inner.remove_listener(id);
    }

    fn is_propagation_source(&self) -> bool {
        self.inner.is_propagation_source()
    }
}

impl Expression for CachedFunction {
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
}
