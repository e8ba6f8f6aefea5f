//! Black-box compile-error coverage: every program here is expected to
//! fail during the check pass (or, for `<NodeRef>` resolution, the build
//! pass — the one check the parser cannot perform itself), driven
//! entirely through the crate's public `Compiler<T>` pipeline rather
//! than any internal `parser::check`/`parser::build` function.

use plexil_expr::error::ParseErrorKind;
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

/// Parses and checks `$xml` against a fresh root scope, expecting the
/// check pass to reject it. Asserts on the error kind's own message
/// rather than the full `file:line:col` span, since the span depends on
/// `roxmltree`'s byte-offset-to-line/col table rather than anything this
/// crate controls.
macro_rules! assert_check_error {
    ($xml:expr, $expected:expr) => {{
        let (external, node_refs) = harness();
        let scope = Scope::root();
        let err = Compiler::new("plan.plx", ParserConfig::default(), external, node_refs)
            .parse($xml)
            .unwrap()
            .check(&scope, ValueType::Unknown)
            .unwrap_err();
        assert_eq!(err.kind.to_string(), $expected);
    }};
}

#[test]
fn unknown_element_is_rejected() {
    assert_check_error!(
        "<NotARealPlanElement/>",
        "unrecognized plan element `<NotARealPlanElement>`"
    );
}

#[test]
fn unknown_operator_is_rejected() {
    assert_check_error!(
        "<NOT_A_REAL_OPERATOR><IntegerValue>1</IntegerValue></NOT_A_REAL_OPERATOR>",
        "unrecognized operator `NOT_A_REAL_OPERATOR`"
    );
}

#[test]
fn undeclared_variable_reference_is_rejected() {
    assert_check_error!(
        "<IntegerVariable>altitude</IntegerVariable>",
        "reference to undeclared variable `altitude`"
    );
}

#[test]
fn operator_arg_count_mismatch_is_rejected() {
    assert_check_error!(
        "<NOT><BooleanValue>true</BooleanValue><BooleanValue>false</BooleanValue></NOT>",
        "`NOT` does not accept 2 argument(s)"
    );
}

#[test]
fn malformed_integer_literal_is_rejected() {
    assert_check_error!(
        "<IntegerValue>not-a-number</IntegerValue>",
        "malformed Integer literal `not-a-number`"
    );
}

#[test]
fn assignment_to_a_non_assignable_target_is_rejected() {
    assert_check_error!(
        "<Assignment><IntegerValue>1</IntegerValue><IntegerRHS><IntegerValue>2</IntegerValue></IntegerRHS></Assignment>",
        "`IntegerValue` is not an assignable expression"
    );
}

#[test]
fn lookup_missing_name_is_rejected() {
    assert_check_error!(
        r#"<LookupNow Type="Real"></LookupNow>"#,
        "missing required child element `<Name>`"
    );
}

#[test]
fn duplicate_declaration_in_the_same_scope_is_rejected() {
    let (external, node_refs) = harness();
    let scope = Scope::root();
    Compiler::new("plan.plx", ParserConfig::default(), Rc::clone(&external), Rc::clone(&node_refs))
        .parse("<DeclareVariable><Name>x</Name><Type>Integer</Type></DeclareVariable>")
        .unwrap()
        .check(&scope, ValueType::Unknown)
        .unwrap();

    let err = Compiler::new("plan.plx", ParserConfig::default(), external, node_refs)
        .parse("<DeclareVariable><Name>x</Name><Type>Real</Type></DeclareVariable>")
        .unwrap()
        .check(&scope, ValueType::Unknown)
        .unwrap_err();
    assert_eq!(err.kind.to_string(), "`x` is declared more than once in this scope");
}

#[test]
fn desired_type_mismatch_is_rejected() {
    let (external, node_refs) = harness();
    let scope = Scope::root();
    let err = Compiler::new("plan.plx", ParserConfig::default(), external, node_refs)
        .parse("<BooleanValue>true</BooleanValue>")
        .unwrap()
        .check(&scope, ValueType::Integer)
        .unwrap_err();
    assert_eq!(err.kind.to_string(), "expected a value of type Integer, found Boolean");
}

/// `<NodeRef>` resolution can't be ruled out by the check pass — it
/// depends on the plan's own node tree, outside this crate's scope — so
/// an unresolvable reference surfaces only once the build pass actually
/// asks the [NodeRefResolver] for it.
#[test]
fn unresolved_node_ref_surfaces_at_build_time() {
    let (external, node_refs) = harness();
    let scope = Scope::root();
    let err = Compiler::new("plan.plx", ParserConfig::default(), external, node_refs)
        .parse(r#"<NodeStateVariable><NodeRef dir="self"/></NodeStateVariable>"#)
        .unwrap()
        .check(&scope, ValueType::Unknown)
        .unwrap()
        .build(&scope)
        .unwrap_err();
    assert!(matches!(err.kind, ParseErrorKind::UnresolvedNodeRef(_)));
    assert_eq!(err.kind.to_string(), "`<NodeRef>`/`<NodeId>` `self` does not resolve to a known node");
}
