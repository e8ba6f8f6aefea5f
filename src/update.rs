//! Named-pair collection published atomically to the external interface
//! on node completion (spec §4.9). Slots are reserved at build time
//! (the name/expression pairs); each value expression is evaluated only
//! when the update is actually published.

use crate::expression::ExprRef;
use crate::external::ExternalInterface;
use std::rc::Rc;

/// One `(name, value-expression)` slot of an `Update` (spec §6.1
/// `<Pair>`/`<Name>`/`<...Value>`).
#[derive(Debug, Clone)]
pub struct UpdatePair {
    pub name: String,
    pub value: ExprRef,
}

/// Built at parse time with its full slot list; `publish` activates
/// nothing itself — the node scheduler is responsible for activating
/// each pair's value expression before an `Update` fires and
/// deactivating them afterward, the same division of responsibility
/// `Assignment::execute` has with its destination.
#[derive(Debug)]
pub struct Update {
    name: String,
    pairs: Vec<UpdatePair>,
    external: Rc<dyn ExternalInterface>,
}

impl Update {
    pub fn new(name: String, pairs: Vec<UpdatePair>, external: Rc<dyn ExternalInterface>) -> Self {
        Self { name, pairs, external }
    }

    /// Evaluates every pair's value expression and hands the whole
    /// collection to the external interface in one call, matching the
    /// "published atomically" requirement: a partially-evaluated update
    /// never crosses the boundary.
    pub fn publish(&self) {
        let resolved: Vec<(String, crate::value::Value)> = self
            .pairs
            .iter()
            .map(|pair| (pair.name.clone(), pair.value.to_value()))
            .collect();
        self.external.send_update(&self.name, &resolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;
    use crate::expression::Expression;
    use crate::value::Value;
    use std::cell::RefCell;

    #[derive(Debug, Default)]
    struct RecordingInterface {
        published: RefCell<Vec<(String, Vec<(String, Value)>)>>,
    }

    impl ExternalInterface for RecordingInterface {
        fn lookup_now(&self, _name: &str, _args: &[Value]) -> Value {
            Value::Unknown(crate::value::ValueType::Integer)
        }
        fn subscribe(
            &self,
            _name: &str,
            _args: &[Value],
            _tolerance: Option<f64>,
            _callback: Rc<dyn Fn(Value)>,
        ) -> crate::external::SubscriptionHandle {
            crate::external::SubscriptionHandle::next()
        }
        fn unsubscribe(&self, _handle: crate::external::SubscriptionHandle) {}
        fn send_command(&self, _name: &str, _args: &[Value]) {}
        fn send_update(&self, name: &str, pairs: &[(String, Value)]) {
            self.published.borrow_mut().push((name.to_string(), pairs.to_vec()));
        }
    }

    #[test]
    fn publish_evaluates_every_pair_and_sends_once() {
        let external = Rc::new(RecordingInterface::default());
        let status = Constant::new(Value::Boolean(true)) as ExprRef;
        status.activate();
        let count = Constant::new(Value::Integer(3)) as ExprRef;
        count.activate();
        let update = Update::new(
            "robot_status".to_string(),
            vec![
                UpdatePair { name: "ok".to_string(), value: status },
                UpdatePair { name: "count".to_string(), value: count },
            ],
            external.clone(),
        );

        update.publish();

        let published = external.published.borrow();
        assert_eq!(published.len(), 1);
        let (name, pairs) = &published[0];
        assert_eq!(name, "robot_status");
        assert_eq!(
            pairs.as_slice(),
            [
                ("ok".to_string(), Value::Boolean(true)),
                ("count".to_string(), Value::Integer(3)),
            ]
        );
    }
}
