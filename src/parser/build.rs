//! The build pass (spec §4.10, §6.1): walks a checked element tree a
//! second time and allocates the actual expression graph. Never
//! re-validates anything the check pass already confirmed — an operator
//! resolution failure or a malformed literal here would mean the check
//! pass missed something, not that the plan is bad, so both paths use
//! the same error variants but in practice should never be reached
//! through this module. The one exception is node-reference resolution
//! (spec §4.9): whether `<NodeRef>` names a real node depends on the
//! plan's node tree, which lives outside this crate, so the check pass
//! cannot have ruled it out in advance.
//!
//! Every node type's `value_type()` is derived locally rather than
//! threaded down from the check pass's inferred type: a literal's tag
//! names its type, a variable reference's scope entry carries its
//! declared type, an operator's result type is recomputed from its
//! already-built operands, and so on. This keeps the build pass a pure
//! function of the checked tree plus the scope it builds into, with no
//! second desired-type parameter to keep in sync with `check.rs`.

use super::factory::{classify, scalar_type_by_name, ElementKind};
use super::{Checked, NodeRefResolver, NodeRefSpec, RawElement, Scope};
use crate::array_ref::{ArrayReference, MutableArrayReference};
use crate::array_value::ArrayValue;
use crate::assignment::Assignment;
use crate::constant::make_constant;
use crate::error::{ParseError, ParseErrorKind};
use crate::expression::{ExprRef, Expression};
use crate::external::ExternalInterface;
use crate::function::{CachedFunction, Function};
use crate::lookup::{LookupNow, LookupOnChange};
use crate::node_ref::{NodeCommandHandleVariable, NodeFailureVariable, NodeOutcomeVariable, NodeStateVariable};
use crate::operator::registry;
use crate::update::{Update, UpdatePair};
use crate::value::{parse_scalar, Value, ValueType};
use crate::variable::{ArrayVariable, Variable};
use std::collections::HashSet;
use std::rc::Rc;

fn err(element: &RawElement, kind: ParseErrorKind) -> ParseError {
    ParseError::new(element.span.clone(), kind)
}

/// Identity key for cycle detection: the data pointer behind an `ExprRef`,
/// shared by every `Rc` clone of the same node. Two different nodes of the
/// same concrete type never collide here even though their vtables match,
/// since the data address is what actually differs.
fn node_identity(expr: &ExprRef) -> *const () {
    Rc::as_ptr(expr) as *const ()
}

/// Build-pass cycle check (spec §3.4 invariant 6, §9): walks `operands()`
/// and `get_base_expression()` from `root`, looking for a back-edge onto
/// the current DFS path. Sharing (the same subexpression reachable from
/// two different parents, e.g. a variable read in two operator calls) is
/// not a cycle and is memoized away via `done` so it is only walked once.
fn check_acyclic(root: &ExprRef, element: &RawElement) -> Result<(), ParseError> {
    let mut on_stack = HashSet::new();
    let mut done = HashSet::new();
    walk_acyclic(root, &mut on_stack, &mut done, element)
}

fn walk_acyclic(
    expr: &ExprRef,
    on_stack: &mut HashSet<*const ()>,
    done: &mut HashSet<*const ()>,
    element: &RawElement,
) -> Result<(), ParseError> {
    let id = node_identity(expr);
    if done.contains(&id) {
        return Ok(());
    }
    if !on_stack.insert(id) {
        return Err(err(element, ParseErrorKind::Cycle(element.name.clone())));
    }

    let mut children = expr.operands();
    children.extend(expr.get_base_expression());
    for child in &children {
        walk_acyclic(child, on_stack, done, element)?;
    }

    on_stack.remove(&id);
    done.insert(id);
    Ok(())
}

fn required_child<'a>(element: &'a RawElement, tag: &str) -> Result<&'a RawElement, ParseError> {
    element
        .child(tag)
        .ok_or_else(|| err(element, ParseErrorKind::MissingChild(tag.to_string())))
}

fn unwrap_single(wrapper: &RawElement) -> Result<&RawElement, ParseError> {
    wrapper
        .children
        .first()
        .ok_or_else(|| err(wrapper, ParseErrorKind::MissingChild("expression".to_string())))
}

/// Entry point for a document whose root is a value expression (spec
/// §4.10's `build`). `scope` is the build pass's own symbol table,
/// distinct from whatever scope the check pass declared placeholders
/// into — it is populated with the real nodes as `<DeclareVariable>`/
/// `<DeclareArray>` elements are actually built.
pub fn build_element(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    checked: &Checked,
    scope: &Rc<Scope>,
) -> Result<ExprRef, ParseError> {
    let expr = build_value(external, node_refs, &checked.element, scope)?;
    check_acyclic(&expr, &checked.element)?;
    Ok(expr)
}

fn build_value(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
) -> Result<ExprRef, ParseError> {
    if element.name.ends_with("RHS") && element.name != "RHS" {
        return build_value(external, node_refs, unwrap_single(element)?, scope);
    }

    let kind = classify(&element.name)
        .ok_or_else(|| err(element, ParseErrorKind::UnknownElement(element.name.clone())))?;

    match kind {
        ElementKind::Literal(ty) => build_literal(element, ty),
        ElementKind::ArrayLiteral => build_array_literal(external, node_refs, element, scope),
        ElementKind::ScalarVariableRef | ElementKind::ArrayVariableRef => build_variable_ref(element, scope),
        ElementKind::ArrayElement => build_array_element(external, node_refs, element, scope, false),
        ElementKind::Operator => build_operator(external, node_refs, element, scope),
        ElementKind::LookupNow => build_lookup_now(external, node_refs, element, scope),
        ElementKind::LookupOnChange => build_lookup_on_change(external, node_refs, element, scope),
        ElementKind::NodeStateVariable => build_node_state(node_refs, element),
        ElementKind::NodeOutcomeVariable => build_node_outcome(node_refs, element),
        ElementKind::NodeCommandHandleVariable => build_node_command_handle(node_refs, element),
        ElementKind::NodeFailureVariable => build_node_failure(node_refs, element),
        ElementKind::Assignment
        | ElementKind::DeclareVariable
        | ElementKind::DeclareArray
        | ElementKind::VariableDeclarations
        | ElementKind::Update => Err(err(element, ParseErrorKind::UnknownElement(element.name.clone()))),
    }
}

fn build_literal(element: &RawElement, ty: ValueType) -> Result<ExprRef, ParseError> {
    let value = parse_scalar(ty, element.text_trimmed())
        .ok_or_else(|| err(element, ParseErrorKind::MalformedLiteral(ty, element.text_trimmed().to_string())))?;
    let (expr, _created) = make_constant(value);
    Ok(expr)
}

fn build_array_literal(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
) -> Result<ExprRef, ParseError> {
    let type_attr = required_child_attr(element, "Type")?;
    let element_type = scalar_type_by_name(type_attr)
        .ok_or_else(|| err(element, ParseErrorKind::MalformedLiteral(ValueType::Unknown, type_attr.to_string())))?;
    let mut array = ArrayValue::with_capacity(element_type, element.children.len())
        .ok_or_else(|| err(element, ParseErrorKind::MalformedLiteral(element_type, type_attr.to_string())))?;
    for (i, child) in element.children.iter().enumerate() {
        let expr = build_value(external, node_refs, child, scope)?;
        let value = expr.to_value();
        if value.is_known() {
            let _ = array.set_element(i, value);
        }
    }
    let (expr, _created) = make_constant(Value::Array(array));
    Ok(expr)
}

fn required_child_attr<'a>(element: &'a RawElement, attr: &str) -> Result<&'a str, ParseError> {
    element
        .attrs
        .get(attr)
        .map(|s| s.as_str())
        .ok_or_else(|| err(element, ParseErrorKind::MissingChild(attr.to_string())))
}

fn build_variable_ref(element: &RawElement, scope: &Rc<Scope>) -> Result<ExprRef, ParseError> {
    let name = element.text_trimmed();
    let (_, expr) = scope
        .lookup(name)
        .ok_or_else(|| err(element, ParseErrorKind::UndeclaredVariable(name.to_string())))?;
    Ok(expr)
}

/// Builds `array[index]`. `mutable` selects whether the caller gets a
/// read-only [ArrayReference] or a write-through [MutableArrayReference]
/// — only an `Assignment` target needs the latter.
fn build_array_element(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
    mutable: bool,
) -> Result<ExprRef, ParseError> {
    let array_child = element
        .children
        .iter()
        .find(|c| c.name != "Index")
        .ok_or_else(|| err(element, ParseErrorKind::MissingChild("array expression".to_string())))?;
    let array_expr = build_value(external, node_refs, array_child, scope)?;

    let index_wrapper = required_child(element, "Index")?;
    let index_expr = build_value(external, node_refs, unwrap_single(index_wrapper)?, scope)?;

    let element_type = array_expr.value_type().array_element_type().unwrap_or(ValueType::Unknown);
    if mutable {
        Ok(MutableArrayReference::new(array_expr, index_expr, element_type) as ExprRef)
    } else {
        Ok(ArrayReference::new(array_expr, index_expr, element_type) as ExprRef)
    }
}

/// Operators whose result is a `String` or array type keep a persistent
/// cache (spec §4.5's note on `CachedFunction`) so a caller taking
/// `value_ref()` gets a stable borrow across reads instead of a fresh
/// clone every time; every other operator builds a plain `Function`.
fn build_operator(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
) -> Result<ExprRef, ParseError> {
    let mut args = Vec::with_capacity(element.children.len());
    for child in &element.children {
        args.push(build_value(external, node_refs, child, scope)?);
    }
    let arg_types: Vec<ValueType> = args.iter().map(|a| a.value_type()).collect();
    let operator = registry::resolve(&element.name, &arg_types)
        .ok_or_else(|| err(element, ParseErrorKind::UnknownOperator(element.name.clone())))?;
    let result_type = operator.value_type(&arg_types);
    if result_type == ValueType::String || result_type.is_array() {
        Ok(CachedFunction::new(operator, args, &arg_types) as ExprRef)
    } else {
        Ok(Function::new(operator, args, &arg_types) as ExprRef)
    }
}

struct LookupParts {
    state_name: ExprRef,
    args: Vec<ExprRef>,
    return_type: ValueType,
}

fn build_lookup_parts(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
) -> Result<LookupParts, ParseError> {
    let name_wrapper = required_child(element, "Name")?;
    let state_name = build_value(external, node_refs, unwrap_single(name_wrapper)?, scope)?;

    let mut args = Vec::new();
    if let Some(arguments) = element.child("Arguments") {
        for arg in &arguments.children {
            args.push(build_value(external, node_refs, arg, scope)?);
        }
    }

    let return_type = element
        .attrs
        .get("Type")
        .and_then(|t| scalar_type_by_name(t))
        .unwrap_or(ValueType::Unknown);

    Ok(LookupParts { state_name, args, return_type })
}

fn build_lookup_now(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
) -> Result<ExprRef, ParseError> {
    let parts = build_lookup_parts(external, node_refs, element, scope)?;
    Ok(LookupNow::new(parts.state_name, parts.args, parts.return_type, Rc::clone(external)) as ExprRef)
}

fn build_lookup_on_change(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
) -> Result<ExprRef, ParseError> {
    let parts = build_lookup_parts(external, node_refs, element, scope)?;
    let tolerance = match element.child("Tolerance") {
        Some(wrapper) => Some(build_value(external, node_refs, unwrap_single(wrapper)?, scope)?),
        None => None,
    };
    Ok(LookupOnChange::new(parts.state_name, parts.args, tolerance, parts.return_type, Rc::clone(external)) as ExprRef)
}

/// How a `<NodeRef>`/`<NodeId>` child names its target, independent of
/// which of the four node-internal reference tags it appears under.
fn node_ref_spec(element: &RawElement) -> Result<NodeRefSpec, ParseError> {
    if let Some(node_ref) = element.child("NodeRef") {
        let dir = node_ref.attrs.get("dir").map(|s| s.as_str()).unwrap_or("self");
        return Ok(match dir {
            "self" => NodeRefSpec::SelfRef,
            "parent" => NodeRefSpec::ParentRef,
            "child" => NodeRefSpec::ChildRef(node_ref.text_trimmed().to_string()),
            "sibling" => NodeRefSpec::SiblingRef(node_ref.text_trimmed().to_string()),
            _ => NodeRefSpec::Named(node_ref.text_trimmed().to_string()),
        });
    }
    if let Some(node_id) = element.child("NodeId") {
        return Ok(NodeRefSpec::Named(node_id.text_trimmed().to_string()));
    }
    Err(err(element, ParseErrorKind::MissingChild("NodeRef".to_string())))
}

fn node_ref_label(spec: &NodeRefSpec) -> String {
    match spec {
        NodeRefSpec::SelfRef => "self".to_string(),
        NodeRefSpec::ParentRef => "parent".to_string(),
        NodeRefSpec::ChildRef(name) | NodeRefSpec::SiblingRef(name) | NodeRefSpec::Named(name) => name.clone(),
    }
}

fn resolve_node_ref(node_refs: &Rc<dyn NodeRefResolver>, element: &RawElement) -> Result<Rc<dyn crate::node_ref::NodeStateSource>, ParseError> {
    let spec = node_ref_spec(element)?;
    node_refs
        .resolve(&spec)
        .ok_or_else(|| err(element, ParseErrorKind::UnresolvedNodeRef(node_ref_label(&spec))))
}

fn build_node_state(node_refs: &Rc<dyn NodeRefResolver>, element: &RawElement) -> Result<ExprRef, ParseError> {
    let source = resolve_node_ref(node_refs, element)?;
    Ok(Rc::new(NodeStateVariable::new(source)) as ExprRef)
}

fn build_node_outcome(node_refs: &Rc<dyn NodeRefResolver>, element: &RawElement) -> Result<ExprRef, ParseError> {
    let source = resolve_node_ref(node_refs, element)?;
    Ok(Rc::new(NodeOutcomeVariable::new(source)) as ExprRef)
}

fn build_node_command_handle(node_refs: &Rc<dyn NodeRefResolver>, element: &RawElement) -> Result<ExprRef, ParseError> {
    let source = resolve_node_ref(node_refs, element)?;
    Ok(Rc::new(NodeCommandHandleVariable::new(source)) as ExprRef)
}

fn build_node_failure(node_refs: &Rc<dyn NodeRefResolver>, element: &RawElement) -> Result<ExprRef, ParseError> {
    let source = resolve_node_ref(node_refs, element)?;
    Ok(Rc::new(NodeFailureVariable::new(source)) as ExprRef)
}

/// Builds an `<Assignment>` (spec §4.8). The target is resolved
/// separately from the general `build_value` dispatch since an
/// `<ArrayElement>` target needs the write-through `MutableArrayReference`
/// variant, not the read-only one every other context wants.
pub fn build_assignment(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
) -> Result<Assignment, ParseError> {
    let target = element
        .children
        .first()
        .ok_or_else(|| err(element, ParseErrorKind::MissingChild("assignment target".to_string())))?;
    let destination = build_assignment_target(external, node_refs, target, scope)?;

    let rhs = element
        .children
        .get(1)
        .ok_or_else(|| err(element, ParseErrorKind::MissingChild("RHS".to_string())))?;
    let rhs_expr = build_value(external, node_refs, rhs, scope)?;
    check_acyclic(&rhs_expr, rhs)?;
    check_acyclic(&destination, target)?;

    Ok(Assignment::new(destination, rhs_expr))
}

fn build_assignment_target(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
) -> Result<ExprRef, ParseError> {
    match classify(&element.name) {
        Some(ElementKind::ScalarVariableRef) | Some(ElementKind::ArrayVariableRef) => {
            build_variable_ref(element, scope)
        }
        Some(ElementKind::ArrayElement) => build_array_element(external, node_refs, element, scope, true),
        _ => Err(err(element, ParseErrorKind::NotAssignable(element.name.clone()))),
    }
}

/// Builds an `<Update>` (spec §4.9): every pair's value expression is
/// built eagerly, the same way its operands are, even though none of
/// them are read until `Update::publish` actually runs.
pub fn build_update(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
) -> Result<Update, ParseError> {
    let name = required_child(element, "Name")?.text_trimmed().to_string();
    let mut pairs = Vec::new();
    for pair in element.children.iter().filter(|c| c.name == "Pair") {
        let pair_name = required_child(pair, "Name")?.text_trimmed().to_string();
        let value_element = pair
            .children
            .iter()
            .find(|c| c.name != "Name")
            .ok_or_else(|| err(pair, ParseErrorKind::MissingChild("value".to_string())))?;
        let value = build_value(external, node_refs, value_element, scope)?;
        check_acyclic(&value, value_element)?;
        pairs.push(UpdatePair { name: pair_name, value });
    }
    Ok(Update::new(name, pairs, Rc::clone(external)))
}

/// Builds every `<DeclareVariable>`/`<DeclareArray>` under a
/// `<VariableDeclarations>` block, declaring each into `scope` as it
/// goes so a later declaration's `InitialValue` can already reference an
/// earlier one.
pub fn build_variable_declarations(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
) -> Result<Vec<ExprRef>, ParseError> {
    let mut declared = Vec::with_capacity(element.children.len());
    for child in &element.children {
        match classify(&child.name) {
            Some(ElementKind::DeclareVariable) => {
                declared.push(build_declare_variable(external, node_refs, child, scope)?);
            }
            Some(ElementKind::DeclareArray) => {
                declared.push(build_declare_array(external, node_refs, child, scope)?);
            }
            _ => return Err(err(child, ParseErrorKind::UnknownElement(child.name.clone()))),
        }
    }
    Ok(declared)
}

fn build_declare_variable(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
) -> Result<ExprRef, ParseError> {
    let name = required_child(element, "Name")?.text_trimmed().to_string();
    let type_name = required_child(element, "Type")?.text_trimmed();
    let declared_type = scalar_type_by_name(type_name)
        .ok_or_else(|| err(element, ParseErrorKind::MalformedLiteral(ValueType::Unknown, type_name.to_string())))?;

    let initializer = match element.child("InitialValue") {
        Some(init) => Some(build_value(external, node_refs, unwrap_single(init)?, scope)?),
        None => None,
    };

    let expr = Variable::new(declared_type, Some(name.clone()), initializer) as ExprRef;
    check_acyclic(&expr, element)?;
    scope.declare(name, declared_type, Rc::clone(&expr));
    Ok(expr)
}

fn build_declare_array(
    external: &Rc<dyn ExternalInterface>,
    node_refs: &Rc<dyn NodeRefResolver>,
    element: &RawElement,
    scope: &Rc<Scope>,
) -> Result<ExprRef, ParseError> {
    let name = required_child(element, "Name")?.text_trimmed().to_string();
    let type_name = required_child(element, "Type")?.text_trimmed();
    let element_type = scalar_type_by_name(type_name)
        .ok_or_else(|| err(element, ParseErrorKind::MalformedLiteral(ValueType::Unknown, type_name.to_string())))?;

    let max_size = match element.child("MaxSize") {
        Some(wrapper) => Some(build_value(external, node_refs, unwrap_single(wrapper)?, scope)?),
        None => None,
    };
    let initializer = match element.child("InitialValue") {
        Some(init) => Some(build_value(external, node_refs, unwrap_single(init)?, scope)?),
        None => None,
    };

    let array_type = element_type.array_type().unwrap();
    let expr = ArrayVariable::new(element_type, Some(name.clone()), max_size, initializer) as ExprRef;
    check_acyclic(&expr, element)?;
    scope.declare(name, array_type, Rc::clone(&expr));
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{Listenable, Listener, NodeId};
    use crate::parser::parse_document;
    use crate::value::Value;
    use std::rc::Weak;

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
            callback: Rc<dyn Fn(Value)>,
        ) -> crate::external::SubscriptionHandle {
            callback(Value::Unknown(ValueType::Unknown));
            crate::external::SubscriptionHandle::next()
        }
        fn unsubscribe(&self, _handle: crate::external::SubscriptionHandle) {}
        fn send_command(&self, _name: &str, _args: &[Value]) {}
        fn send_update(&self, _name: &str, _pairs: &[(String, Value)]) {}
    }

    #[derive(Debug, Default)]
    struct NoNodes;

    impl NodeRefResolver for NoNodes {
        fn resolve(&self, _spec: &NodeRefSpec) -> Option<Rc<dyn crate::node_ref::NodeStateSource>> {
            None
        }
    }

    fn harness() -> (Rc<dyn ExternalInterface>, Rc<dyn NodeRefResolver>) {
        (Rc::new(NullExternal), Rc::new(NoNodes))
    }

    fn build(xml: &str, scope: &Rc<Scope>) -> Result<ExprRef, ParseError> {
        let (external, node_refs) = harness();
        let element = parse_document("plan.plx", xml).unwrap();
        build_value(&external, &node_refs, &element, scope)
    }

    #[test]
    fn builds_integer_literal() {
        let scope = Scope::root();
        let expr = build("<IntegerValue>4</IntegerValue>", &scope).unwrap();
        expr.activate();
        assert_eq!(expr.to_value(), Value::Integer(4));
    }

    #[test]
    fn builds_node_state_literal() {
        let scope = Scope::root();
        let expr = build("<NodeStateValue>FINISHED</NodeStateValue>", &scope).unwrap();
        expr.activate();
        assert_eq!(expr.to_value(), Value::NodeState(crate::value::NodeState::Finished));
    }

    #[test]
    fn builds_array_literal_with_known_elements() {
        let scope = Scope::root();
        let expr = build(
            r#"<ArrayValue Type="Integer"><IntegerValue>1</IntegerValue><IntegerValue>2</IntegerValue></ArrayValue>"#,
            &scope,
        )
        .unwrap();
        expr.activate();
        let array = expr.to_value();
        let array = array.as_array().unwrap();
        assert_eq!(array.get_element(0), Some(Some(Value::Integer(1))));
        assert_eq!(array.get_element(1), Some(Some(Value::Integer(2))));
    }

    #[test]
    fn builds_add_operator_as_function() {
        let scope = Scope::root();
        let expr = build(
            "<ADD><IntegerValue>2</IntegerValue><IntegerValue>3</IntegerValue></ADD>",
            &scope,
        )
        .unwrap();
        expr.activate();
        assert_eq!(expr.to_value(), Value::Integer(5));
    }

    #[test]
    fn builds_concat_as_cached_function() {
        let scope = Scope::root();
        let expr = build(
            "<Concat><StringValue>foo</StringValue><StringValue>bar</StringValue></Concat>",
            &scope,
        )
        .unwrap();
        expr.activate();
        assert_eq!(expr.to_value(), Value::String("foobar".to_string()));
    }

    #[test]
    fn declares_and_references_a_variable() {
        let (external, node_refs) = harness();
        let scope = Scope::root();
        let decl = parse_document(
            "plan.plx",
            "<DeclareVariable><Name>x</Name><Type>Integer</Type><InitialValue><IntegerValue>9</IntegerValue></InitialValue></DeclareVariable>",
        )
        .unwrap();
        let var = build_declare_variable(&external, &node_refs, &decl, &scope).unwrap();
        var.activate();
        assert_eq!(var.to_value(), Value::Integer(9));

        let reference = parse_document("plan.plx", "<IntegerVariable>x</IntegerVariable>").unwrap();
        let read = build_value(&external, &node_refs, &reference, &scope).unwrap();
        assert!(Rc::ptr_eq(&var, &read));
    }

    #[test]
    fn builds_array_element_reference() {
        let (external, node_refs) = harness();
        let scope = Scope::root();
        let decl = parse_document(
            "plan.plx",
            "<DeclareArray><Name>a</Name><Type>Integer</Type><MaxSize><IntegerValue>3</IntegerValue></MaxSize><InitialValue><ArrayValue Type=\"Integer\"><IntegerValue>10</IntegerValue><IntegerValue>20</IntegerValue><IntegerValue>30</IntegerValue></ArrayValue></InitialValue></DeclareArray>",
        )
        .unwrap();
        build_declare_array(&external, &node_refs, &decl, &scope).unwrap();

        let reference = parse_document(
            "plan.plx",
            "<ArrayElement><ArrayVariable>a</ArrayVariable><Index><IntegerValue>1</IntegerValue></Index></ArrayElement>",
        )
        .unwrap();
        let expr = build_value(&external, &node_refs, &reference, &scope).unwrap();
        expr.activate();
        assert_eq!(expr.to_value(), Value::Integer(20));
    }

    #[test]
    fn assignment_writes_through_to_destination() {
        let (external, node_refs) = harness();
        let scope = Scope::root();
        let decl = parse_document(
            "plan.plx",
            "<DeclareVariable><Name>x</Name><Type>Integer</Type></DeclareVariable>",
        )
        .unwrap();
        let var = build_declare_variable(&external, &node_refs, &decl, &scope).unwrap();
        var.activate();

        let assignment_xml = parse_document(
            "plan.plx",
            "<Assignment><IntegerVariable>x</IntegerVariable><IntegerRHS><IntegerValue>7</IntegerValue></IntegerRHS></Assignment>",
        )
        .unwrap();
        let assignment = build_assignment(&external, &node_refs, &assignment_xml, &scope).unwrap();
        assignment.execute().unwrap();
        assert_eq!(var.to_value(), Value::Integer(7));
    }

    #[test]
    fn assignment_to_array_element_writes_through_mutable_reference() {
        let (external, node_refs) = harness();
        let scope = Scope::root();
        let decl = parse_document(
            "plan.plx",
            "<DeclareArray><Name>a</Name><Type>Integer</Type><MaxSize><IntegerValue>2</IntegerValue></MaxSize></DeclareArray>",
        )
        .unwrap();
        let array = build_declare_array(&external, &node_refs, &decl, &scope).unwrap();
        array.activate();

        let assignment_xml = parse_document(
            "plan.plx",
            "<Assignment><ArrayElement><ArrayVariable>a</ArrayVariable><Index><IntegerValue>0</IntegerValue></Index></ArrayElement><IntegerRHS><IntegerValue>42</IntegerValue></IntegerRHS></Assignment>",
        )
        .unwrap();
        let assignment = build_assignment(&external, &node_refs, &assignment_xml, &scope).unwrap();
        assignment.execute().unwrap();

        let reference = parse_document(
            "plan.plx",
            "<ArrayElement><ArrayVariable>a</ArrayVariable><Index><IntegerValue>0</IntegerValue></Index></ArrayElement>",
        )
        .unwrap();
        let read = build_value(&external, &node_refs, &reference, &scope).unwrap();
        read.activate();
        assert_eq!(read.to_value(), Value::Integer(42));
    }

    #[test]
    fn builds_update_with_resolved_pairs() {
        let (external, node_refs) = harness();
        let scope = Scope::root();
        let update_xml = parse_document(
            "plan.plx",
            "<Update><Name>robot_status</Name><Pair><Name>ok</Name><BooleanValue>true</BooleanValue></Pair></Update>",
        )
        .unwrap();
        let update = build_update(&external, &node_refs, &update_xml, &scope).unwrap();
        update.publish();
    }

    #[test]
    fn unresolved_node_ref_is_a_parse_error() {
        let (_external, node_refs) = harness();
        let element = parse_document(
            "plan.plx",
            "<NodeStateVariable><NodeRef dir=\"self\"/></NodeStateVariable>",
        )
        .unwrap();
        let err = build_node_state(&node_refs, &element).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnresolvedNodeRef(_)));
    }

    #[test]
    fn variable_declarations_block_declares_every_entry() {
        let (external, node_refs) = harness();
        let scope = Scope::root();
        let element = parse_document(
            "plan.plx",
            "<VariableDeclarations><DeclareVariable><Name>x</Name><Type>Integer</Type></DeclareVariable><DeclareVariable><Name>y</Name><Type>Real</Type></DeclareVariable></VariableDeclarations>",
        )
        .unwrap();
        let declared = build_variable_declarations(&external, &node_refs, &element, &scope).unwrap();
        assert_eq!(declared.len(), 2);
        assert!(scope.declared_locally("x"));
        assert!(scope.declared_locally("y"));
    }

    /// Minimal test-only node with mutable operands, used only to force a
    /// back-edge onto the DFS path (spec §9) — no real node type in this
    /// crate exposes a way to rewire an operand after construction, so the
    /// parser itself cannot build a cyclic graph; this exercises the guard
    /// directly rather than through XML.
    #[derive(Debug, Default)]
    struct CyclicTestNode {
        deps: std::cell::RefCell<Vec<ExprRef>>,
    }

    impl Listenable for CyclicTestNode {
        fn add_listener(&self, _id: NodeId, _listener: Weak<dyn Listener>) {}
        fn remove_listener(&self, _id: NodeId) {}
    }

    impl Expression for CyclicTestNode {
        fn value_type(&self) -> ValueType {
            ValueType::Unknown
        }
        fn is_known(&self) -> bool {
            false
        }
        fn to_value(&self) -> Value {
            Value::Unknown(ValueType::Unknown)
        }
        fn is_active(&self) -> bool {
            false
        }
        fn activate(&self) {}
        fn deactivate(&self) {}
        fn operands(&self) -> Vec<ExprRef> {
            self.deps.borrow().clone()
        }
    }

    #[test]
    fn check_acyclic_rejects_a_back_edge() {
        let a = Rc::new(CyclicTestNode::default());
        let b = Rc::new(CyclicTestNode::default());
        a.deps.borrow_mut().push(b.clone() as ExprRef);
        b.deps.borrow_mut().push(a.clone() as ExprRef);

        let element = parse_document("plan.plx", "<IntegerValue>0</IntegerValue>").unwrap();
        let err = check_acyclic(&(a as ExprRef), &element).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Cycle(_)));
    }

    #[test]
    fn check_acyclic_allows_a_shared_diamond() {
        // The same variable reached twice (ADD(x, x)) is legitimate
        // sharing, not a cycle; `done` must memoize it so the second
        // visit doesn't false-positive against `on_stack`.
        let (external, node_refs) = harness();
        let scope = Scope::root();
        let decl = parse_document(
            "plan.plx",
            "<DeclareVariable><Name>x</Name><Type>Integer</Type><InitialValue><IntegerValue>3</IntegerValue></InitialValue></DeclareVariable>",
        )
        .unwrap();
        build_declare_variable(&external, &node_refs, &decl, &scope).unwrap();

        let add_xml = parse_document(
            "plan.plx",
            "<ADD><IntegerVariable>x</IntegerVariable><IntegerVariable>x</IntegerVariable></ADD>",
        )
        .unwrap();
        let expr = build_value(&external, &node_refs, &add_xml, &scope).unwrap();
        check_acyclic(&expr, &add_xml).unwrap();
    }
}
