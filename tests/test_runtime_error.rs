//! Black-box runtime-error coverage: every program here compiles
//! cleanly (passes check and build) but fails when the resulting
//! `Assignment` is actually executed, driven entirely through the
//! crate's public `Compiler<T>` pipeline plus `Assignment::execute`.

use plexil_expr::error::PlanError;
use plexil_expr::expression::Expression;
use plexil_expr::external::{ExternalInterface, SubscriptionHandle};
use plexil_expr::node_ref::NodeStateSource;
use plexil_expr::parser::{Compiler, NodeRefResolver, NodeRefSpec, ParserConfig, Scope};
use plexil_expr::value::{Value, ValueType};
use std::rc::Rc;

#[derive(Debug, Default)]
struct NullExternal;

impl ExternalInterface for NullExternal {
    fn lookup_now(&self, _name: &str, _args: &[Value]) -> Value {
        Value::Unknown(ValueType::Unknown)
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
    fn unsubscribe(&self, _handle: SubscriptionHandle) {}
    fn send_command(&self, _name: &str, _args: &[Value]) {}
    fn send_update(&self, _name: &str, _pairs: &[(String, Value)]) {}
}

#[derive(Debug, Default)]
struct NoNodes;

impl NodeRefResolver for NoNodes {
    fn resolve(&self, _spec: &NodeRefSpec) -> Option<Rc<dyn NodeStateSource>> {
        None
    }
}

fn harness() -> (Rc<dyn ExternalInterface>, Rc<dyn NodeRefResolver>) {
    (Rc::new(NullExternal), Rc::new(NoNodes))
}

fn declare(scope: &Rc<Scope>, xml: &str) -> plexil_expr::expression::ExprRef {
    let (external, node_refs) = harness();
    Compiler::new("plan.plx", ParserConfig::default(), external, node_refs)
        .parse(xml)
        .unwrap()
        .check(scope, ValueType::Unknown)
        .unwrap()
        .build_declarations(scope)
        .unwrap()
        .remove(0)
}

fn assign(scope: &Rc<Scope>, xml: &str) -> plexil_expr::assignment::Assignment {
    let (external, node_refs) = harness();
    Compiler::new("plan.plx", ParserConfig::default(), external, node_refs)
        .parse(xml)
        .unwrap()
        .check(scope, ValueType::Unknown)
        .unwrap()
        .build_assignment(scope)
        .unwrap()
}

#[test]
fn assignment_past_declared_capacity_fails() {
    let scope = Scope::root();
    let array = declare(
        &scope,
        "<VariableDeclarations><DeclareArray><Name>a</Name><Type>Integer</Type><MaxSize><IntegerValue>2</IntegerValue></MaxSize></DeclareArray></VariableDeclarations>",
    );
    array.activate();

    let assignment = assign(
        &scope,
        "<Assignment><ArrayElement><ArrayVariable>a</ArrayVariable><Index><IntegerValue>5</IntegerValue></Index></ArrayElement><IntegerRHS><IntegerValue>1</IntegerValue></IntegerRHS></Assignment>",
    );
    let err = assignment.execute().unwrap_err();
    assert_eq!(err, PlanError::AssignmentFailed);
}

#[test]
fn assignment_with_a_negative_index_fails() {
    let scope = Scope::root();
    let array = declare(
        &scope,
        "<VariableDeclarations><DeclareArray><Name>a</Name><Type>Integer</Type><MaxSize><IntegerValue>3</IntegerValue></MaxSize></DeclareArray></VariableDeclarations>",
    );
    array.activate();

    let assignment = assign(
        &scope,
        "<Assignment><ArrayElement><ArrayVariable>a</ArrayVariable><Index><IntegerValue>-1</IntegerValue></Index></ArrayElement><IntegerRHS><IntegerValue>1</IntegerValue></IntegerRHS></Assignment>",
    );
    let err = assignment.execute().unwrap_err();
    assert_eq!(err, PlanError::AssignmentFailed);
}

/// Writing an element of an array that was never activated (so it still
/// has no backing `ArrayValue` at all) fails the same way a resolved but
/// out-of-range write does — the destination is simply not there to
/// write into yet.
#[test]
fn assignment_to_an_inactive_array_fails() {
    let scope = Scope::root();
    let array = declare(
        &scope,
        "<VariableDeclarations><DeclareArray><Name>a</Name><Type>Integer</Type><MaxSize><IntegerValue>3</IntegerValue></MaxSize></DeclareArray></VariableDeclarations>",
    );
    assert!(!array.is_known());

    let assignment = assign(
        &scope,
        "<Assignment><ArrayElement><ArrayVariable>a</ArrayVariable><Index><IntegerValue>0</IntegerValue></Index></ArrayElement><IntegerRHS><IntegerValue>1</IntegerValue></IntegerRHS></Assignment>",
    );
    let err = assignment.execute().unwrap_err();
    assert_eq!(err, PlanError::AssignmentFailed);
}

/// Sanity control mirroring the teacher's `test_execute_after_error`:
/// confirms the harness above actually succeeds for an in-range index,
/// so the failures asserted elsewhere in this file are about the index
/// and not a harness mistake.
#[test]
fn assignment_within_capacity_succeeds() {
    let scope = Scope::root();
    let array = declare(
        &scope,
        "<VariableDeclarations><DeclareArray><Name>a</Name><Type>Integer</Type><MaxSize><IntegerValue>2</IntegerValue></MaxSize></DeclareArray></VariableDeclarations>",
    );
    array.activate();

    let assignment = assign(
        &scope,
        "<Assignment><ArrayElement><ArrayVariable>a</ArrayVariable><Index><IntegerValue>1</IntegerValue></Index></ArrayElement><IntegerRHS><IntegerValue>42</IntegerValue></IntegerRHS></Assignment>",
    );
    assignment.execute().unwrap();

    let (external, node_refs) = harness();
    let reference = Compiler::new("plan.plx", ParserConfig::default(), external, node_refs)
        .parse("<ArrayElement><ArrayVariable>a</ArrayVariable><Index><IntegerValue>1</IntegerValue></Index></ArrayElement>")
        .unwrap()
        .check(&scope, ValueType::Unknown)
        .unwrap()
        .build(&scope)
        .unwrap();
    reference.activate();
    assert_eq!(reference.to_value(), Value::Integer(42));
}
