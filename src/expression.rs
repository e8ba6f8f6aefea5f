//! The uniform query surface every node in the graph exposes (spec §3.2).

use crate::error::PlanError;
use crate::listener::Listenable;
use crate::value::{Value, ValueType};
use std::fmt::Debug;
use std::rc::Rc;

/// Element-write surface for an assignable array-typed node (spec §4.4:
/// `MutableArrayReference` proxies writes onto the array it indexes).
/// Kept as its own trait, separate from [Expression], since writing an
/// element is meaningless for most node types and Rust trait objects
/// can't expose it only conditionally any other way.
pub trait AssignableArray {
    /// Returns `false` (writing nothing) if `index` is outside the
    /// array's declared capacity; the caller turns that into a
    /// `PlanError::ArrayIndexOutOfBounds`.
    fn set_element(&self, index: usize, value: Value) -> bool;
    fn set_element_unknown(&self, index: usize) -> bool;
}

/// Shared handle to any node in the expression graph. Per SPEC_FULL.md
/// §3/§9, this one type replaces the source's owned/weak split: a node
/// is dropped exactly when its last `Rc` clone is, whether that clone
/// lives in a `Function`'s argument vector, a `Variable`'s initializer
/// slot, or the parser's symbol table.
pub type ExprRef = Rc<dyn Expression>;

/// Every expression node implements this. Mirrors `Expression.hh`
/// (`value_type`, `is_known`, `get_value`/`to_value`, `is_assignable`,
/// `is_constant`/`get_base_expression`, activation).
pub trait Expression: Listenable + Debug {
    /// Stable for the node's lifetime once built (invariant 1).
    fn value_type(&self) -> ValueType;

    /// False if inactive or if the node's current state is the unknown
    /// marker (invariant 2).
    fn is_known(&self) -> bool;

    /// Boxed/reflective value read. `Value::Unknown(value_type())` when
    /// `!is_known()`.
    fn to_value(&self) -> Value;

    fn is_active(&self) -> bool;

    /// Activate this node. Calling `activate` while already active just
    /// bumps the activation counter (spec §4.11).
    fn activate(&self);

    /// Deactivate this node. The node becomes unknown once its
    /// activation counter reaches zero.
    fn deactivate(&self);

    /// True for nodes that can never change value once built (spec
    /// §4.2). Constant-folding and alias-unwrapping consult this.
    fn is_constant(&self) -> bool {
        false
    }

    /// For aliases and node-internal references: the expression this
    /// one transparently forwards to, used by cycle detection and
    /// constant folding to see through indirection (spec §4.9).
    fn get_base_expression(&self) -> Option<ExprRef> {
        None
    }

    /// Every subexpression this node directly owns or borrows — a
    /// `Function`'s argument vector, a `Lookup`'s state name/args/
    /// tolerance, a `Variable`'s initializer, an `ArrayReference`'s
    /// array/index pair. Empty for leaves (`Constant`, node-internal
    /// references terminate through [Expression::get_base_expression]
    /// instead). The build pass's cycle check (spec §3.4 invariant 6,
    /// §9) walks this alongside `get_base_expression` to find back-edges;
    /// nothing else in the crate depends on it.
    fn operands(&self) -> Vec<ExprRef> {
        Vec::new()
    }

    fn is_assignable(&self) -> bool {
        false
    }

    /// `Some` only for writable leaves (`Variable`, `ArrayVariable`,
    /// `MutableArrayReference`); lets `Assignment` write/save/restore
    /// through an `ExprRef` it only knows as `dyn Expression`, without
    /// downcasting to a concrete node type (spec §3.2: `as_assignable`).
    fn as_assignable(&self) -> Option<&dyn Assignable> {
        None
    }

    /// `Some` only for assignable array-typed nodes (`ArrayVariable`);
    /// lets `MutableArrayReference` write through an `ExprRef` it only
    /// knows as `dyn Expression` without downcasting.
    fn as_assignable_array(&self) -> Option<&dyn AssignableArray> {
        None
    }
}

/// The write/save/restore surface of an assignable leaf (spec §3.2,
/// invariant 7). Implemented by `Variable` (whole scalar), `ArrayVariable`
/// (whole array), and `MutableArrayReference` (a single element reached
/// through an index). `set_value`/`set_unknown` can fail — for a
/// `MutableArrayReference` whose array or index is not currently
/// resolvable, or whose index falls outside the array's capacity — so
/// both return a `Result` the caller (`Assignment::execute`) turns into
/// a `PlanError` for the plan author; `Variable`/`ArrayVariable` never
/// fail this way and always return `Ok`.
pub trait Assignable: Expression {
    fn set_value(&self, value: Value) -> Result<(), PlanError>;
    fn set_unknown(&self) -> Result<(), PlanError>;

    /// At most one saved value exists at a time (invariant 7).
    fn save_current_value(&self);
    fn restore_saved_value(&self);
    fn get_saved_value(&self) -> Option<Value>;
}

/// Typed read: `true` iff known and representable as `T`, without
/// mutating `out` on failure. Implemented per concrete node type rather
/// than as a method on the `Expression` trait object, since Rust trait
/// objects cannot carry a generic method — this plays the role of the
/// original's overloaded `getValue(T&)` family.
pub trait TypedRead<T> {
    fn get_value(&self) -> Option<T>;
}

/// Extension trait bundling the convenience typed reads implemented in
/// terms of `to_value()`; any `Expression` gets these for free, with
/// Integer→Real promotion on the `f64` read (spec §3.2).
pub trait ExpressionExt: Expression {
    fn get_bool(&self) -> Option<bool> {
        self.to_value().as_bool()
    }

    fn get_i32(&self) -> Option<i32> {
        self.to_value().as_i32()
    }

    fn get_f64(&self) -> Option<f64> {
        self.to_value().as_f64()
    }

    fn get_string(&self) -> Option<String> {
        self.to_value().as_str().map(|s| s.to_string())
    }
}

impl<T: Expression + ?Sized> ExpressionExt for T {}
