//! Write-side binding from a value-producing expression to a writable
//! destination (spec §4.8). `execute`/`retract` each publish at most
//! once, through the destination's own change-notification path —
//! `Assignment` holds no notifier of its own.

use crate::error::PlanError;
use crate::expression::{ExprRef, Expression};
use crate::value::coerce_for_assignment;

/// Binds `rhs` to `destination` (spec §4.8: a `Variable`, `ArrayVariable`,
/// or `MutableArrayReference` — anything `as_assignable()` returns
/// `Some` for). Holding `destination` as a plain [ExprRef] rather than
/// the narrower `Rc<dyn Assignable>` lets the build pass hand over
/// whatever it already produced for the target expression (a scope
/// lookup, a freshly built `MutableArrayReference`, ...) without also
/// keeping a second, separately-coerced handle to the same node around.
/// The parser's check pass is responsible for having verified both that
/// the target is assignable and that `rhs`'s declared type is compatible
/// with it, before this type is ever built.
#[derive(Debug)]
pub struct Assignment {
    destination: ExprRef,
    rhs: ExprRef,
}

impl Assignment {
    pub fn new(destination: ExprRef, rhs: ExprRef) -> Self {
        debug_assert!(
            destination.is_assignable(),
            "Assignment built over a non-assignable destination"
        );
        Self { destination, rhs }
    }

    /// Reads `rhs` once and writes it to the destination, coercing an
    /// Integer payload up to the destination's declared Real/Date/
    /// Duration representation where the check pass allowed the widening
    /// (spec §3.1). Both the expression's activation and the
    /// destination's own lifecycle are the caller's responsibility —
    /// `execute` neither activates nor deactivates either side.
    pub fn execute(&self) -> Result<(), PlanError> {
        let destination = self
            .destination
            .as_assignable()
            .expect("Assignment destination is always assignable");
        let value = self.rhs.to_value();
        if !value.is_known() {
            return destination.set_unknown();
        }
        let coerced = coerce_for_assignment(destination.value_type(), value);
        destination.set_value(coerced)
    }

    /// Restores whatever the destination last saved (spec §3.4 invariant
    /// 7); a no-op if nothing was saved.
    pub fn retract(&self) {
        if let Some(destination) = self.destination.as_assignable() {
            destination.restore_saved_value();
        }
    }
}
