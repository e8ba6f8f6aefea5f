//! The check pass (spec §4.10, §6.1): walks a [RawElement] tree, verifies
//! tags, arities, and type compatibility, and returns the [ValueType]
//! the element will produce once built. Allocates nothing — this module
//! never touches `Expression`, `Operator::call`, or any node constructor;
//! that is entirely the build pass's job (`build.rs`).
//!
//! Declarations (`DeclareVariable`/`DeclareArray`) are the one place this
//! pass writes anything: it records `(name, declared_type)` into the
//! current [Scope] so later variable references in the same or a nested
//! scope resolve, pairing each declaration with a throwaway `Unknown`
//! constant (scope entries always carry an `ExprRef`; the build pass
//! declares its own scope afresh with the real nodes, so the check
//! pass's placeholder is never read by anything that matters).

use super::factory::{classify, scalar_type_by_name, ElementKind};
use super::{ParserConfig, RawElement, Scope};
use crate::constant::Constant;
use crate::error::{ParseError, ParseErrorKind};
use crate::operator::registry;
use crate::value::{parse_scalar, ValueType};
use std::rc::Rc;

fn err(element: &RawElement, kind: ParseErrorKind) -> ParseError {
    ParseError::new(element.span.clone(), kind)
}

fn require_compatible(element: &RawElement, expected: ValueType, actual: ValueType) -> Result<(), ParseError> {
    if ValueType::are_compatible(expected, actual) {
        Ok(())
    } else {
        Err(err(element, ParseErrorKind::TypeMismatch { expected, actual }))
    }
}

/// Unwraps a `<FooRHS>` wrapper (spec §6.1 `<Assignment>`'s second
/// child) down to the single expression it carries.
fn required_child<'a>(element: &'a RawElement, tag: &str) -> Result<&'a RawElement, ParseError> {
    element
        .child(tag)
        .ok_or_else(|| err(element, ParseErrorKind::MissingChild(tag.to_string())))
}

/// `<Index>` (and `<FooRHS>`) are one-element wrappers: the tag exists
/// only to name the role its single child plays, not as a construct of
/// its own.
fn unwrap_single(wrapper: &RawElement) -> Result<&RawElement, ParseError> {
    wrapper
        .children
        .first()
        .ok_or_else(|| err(wrapper, ParseErrorKind::MissingChild("expression".to_string())))
}

pub fn check_element(
    config: &ParserConfig,
    element: &RawElement,
    scope: &Rc<Scope>,
    desired_type: ValueType,
) -> Result<ValueType, ParseError> {
    if element.name.ends_with("RHS") && element.name != "RHS" {
        let inner = unwrap_single(element)?;
        return check_element(config, inner, scope, desired_type);
    }

    let kind = classify(&element.name)
        .ok_or_else(|| err(element, ParseErrorKind::UnknownElement(element.name.clone())))?;

    match kind {
        ElementKind::Literal(ty) => check_literal(element, ty, desired_type),
        ElementKind::ArrayLiteral => check_array_literal(config, element, scope, desired_type),
        ElementKind::ScalarVariableRef => check_variable_ref(element, scope, desired_type),
        ElementKind::ArrayVariableRef => check_variable_ref(element, scope, desired_type),
        ElementKind::ArrayElement => check_array_element(config, element, scope, desired_type),
        ElementKind::Operator => check_operator(config, element, scope, desired_type),
        ElementKind::LookupNow | ElementKind::LookupOnChange => {
            check_lookup(config, element, scope, desired_type)
        }
        ElementKind::Assignment => check_assignment(config, element, scope),
        ElementKind::DeclareVariable => check_declare_variable(config, element, scope),
        ElementKind::DeclareArray => check_declare_array(config, element, scope),
        ElementKind::VariableDeclarations => check_variable_declarations(config, element, scope),
        ElementKind::NodeStateVariable => check_node_ref(element, ValueType::NodeState, desired_type),
        ElementKind::NodeOutcomeVariable => check_node_ref(element, ValueType::NodeOutcome, desired_type),
        ElementKind::NodeCommandHandleVariable => {
            check_node_ref(element, ValueType::CommandHandle, desired_type)
        }
        ElementKind::NodeFailureVariable => check_node_ref(element, ValueType::FailureType, desired_type),
        ElementKind::Update => check_update(config, element, scope),
    }
}

fn check_literal(element: &RawElement, ty: ValueType, desired_type: ValueType) -> Result<ValueType, ParseError> {
    parse_scalar(ty, element.text_trimmed())
        .ok_or_else(|| err(element, ParseErrorKind::MalformedLiteral(ty, element.text_trimmed().to_string())))?;
    require_compatible(element, desired_type, ty)?;
    Ok(ty)
}

fn check_array_literal(
    config: &ParserConfig,
    element: &RawElement,
    scope: &Rc<Scope>,
    desired_type: ValueType,
) -> Result<ValueType, ParseError> {
    let type_attr = element
        .attrs
        .get("Type")
        .ok_or_else(|| err(element, ParseErrorKind::MissingChild("Type".to_string())))?;
    let element_type = scalar_type_by_name(type_attr)
        .ok_or_else(|| err(element, ParseErrorKind::TypeMismatch { expected: ValueType::Unknown, actual: ValueType::Unknown }))?;
    for child in &element.children {
        check_element(config, child, scope, element_type)?;
    }
    let array_type = element_type.array_type().unwrap();
    require_compatible(element, desired_type, array_type)?;
    Ok(array_type)
}

fn check_variable_ref(element: &RawElement, scope: &Rc<Scope>, desired_type: ValueType) -> Result<ValueType, ParseError> {
    let name = element.text_trimmed();
    let (declared_type, _) = scope
        .lookup(name)
        .ok_or_else(|| err(element, ParseErrorKind::UndeclaredVariable(name.to_string())))?;
    require_compatible(element, desired_type, declared_type)?;
    Ok(declared_type)
}

fn check_array_element(
    config: &ParserConfig,
    element: &RawElement,
    scope: &Rc<Scope>,
    desired_type: ValueType,
) -> Result<ValueType, ParseError> {
    let array_child = element
        .children
        .iter()
        .find(|c| c.name != "Index")
        .ok_or_else(|| err(element, ParseErrorKind::MissingChild("array expression".to_string())))?;
    let array_type = check_element(config, array_child, scope, ValueType::Unknown)?;
    if !array_type.is_array() && array_type != ValueType::Unknown {
        return Err(err(element, ParseErrorKind::TypeMismatch { expected: ValueType::Unknown, actual: array_type }));
    }

    let index_wrapper = required_child(element, "Index")?;
    let index_expr = unwrap_single(index_wrapper)?;
    check_element(config, index_expr, scope, ValueType::Integer)?;

    let element_type = array_type.array_element_type().unwrap_or(ValueType::Unknown);
    require_compatible(element, desired_type, element_type)?;
    Ok(element_type)
}

fn check_operator(
    config: &ParserConfig,
    element: &RawElement,
    scope: &Rc<Scope>,
    desired_type: ValueType,
) -> Result<ValueType, ParseError> {
    let mut arg_types = Vec::with_capacity(element.children.len());
    for child in &element.children {
        arg_types.push(check_element(config, child, scope, ValueType::Unknown)?);
    }
    let operator = registry::resolve(&element.name, &arg_types)
        .ok_or_else(|| err(element, ParseErrorKind::UnknownOperator(element.name.clone())))?;
    if !operator.check_arg_count(arg_types.len()) {
        return Err(err(
            element,
            ParseErrorKind::ArgCountInvalid { name: element.name.clone(), actual: arg_types.len() },
        ));
    }
    if !operator.check_arg_types(&arg_types) {
        return Err(err(element, ParseErrorKind::ArgTypesInvalid { name: element.name.clone() }));
    }
    let result_type = operator.value_type(&arg_types);
    require_compatible(element, desired_type, result_type)?;
    Ok(result_type)
}

fn check_lookup(
    config: &ParserConfig,
    element: &RawElement,
    scope: &Rc<Scope>,
    desired_type: ValueType,
) -> Result<ValueType, ParseError> {
    let name_wrapper = required_child(element, "Name")?;
    let name_element = unwrap_single(name_wrapper)?;
    check_element(config, name_element, scope, ValueType::String)?;

    if let Some(args) = element.child("Arguments") {
        for arg in &args.children {
            check_element(config, arg, scope, ValueType::Unknown)?;
        }
    }

    if let Some(tolerance) = element.child("Tolerance") {
        let tolerance_expr = unwrap_single(tolerance)?;
        check_element(config, tolerance_expr, scope, ValueType::Real)?;
    }

    // A fully resolved plan carries a symbol table of declared Lookup
    // names/return types (spec §4.10); that table lives on the
    // scheduler side of this crate's boundary (spec §1), so
    // `config.undeclared_lookup_is_error` has nothing to check against
    // yet and is accepted here without effect. It is threaded through
    // regardless so a caller that does wire up such a table later has
    // the knob already in place.
    let _ = config.undeclared_lookup_is_error;

    let return_type = element
        .attrs
        .get("Type")
        .and_then(|t| scalar_type_by_name(t))
        .unwrap_or(desired_type);
    require_compatible(element, desired_type, return_type)?;
    Ok(return_type)
}

fn check_assignment(config: &ParserConfig, element: &RawElement, scope: &Rc<Scope>) -> Result<ValueType, ParseError> {
    let target = element
        .children
        .first()
        .ok_or_else(|| err(element, ParseErrorKind::MissingChild("assignment target".to_string())))?;
    let target_kind = classify(&target.name);
    if !matches!(
        target_kind,
        Some(ElementKind::ScalarVariableRef) | Some(ElementKind::ArrayVariableRef) | Some(ElementKind::ArrayElement)
    ) {
        return Err(err(target, ParseErrorKind::NotAssignable(target.name.clone())));
    }
    let target_type = check_element(config, target, scope, ValueType::Unknown)?;

    let rhs = element
        .children
        .get(1)
        .ok_or_else(|| err(element, ParseErrorKind::MissingChild("RHS".to_string())))?;
    check_element(config, rhs, scope, target_type)?;
    Ok(ValueType::Unknown)
}

fn declare(scope: &Rc<Scope>, element: &RawElement, name: &str, declared_type: ValueType) -> Result<(), ParseError> {
    if scope.declared_locally(name) {
        return Err(err(element, ParseErrorKind::DuplicateDeclaration(name.to_string())));
    }
    let placeholder = Constant::unknown(declared_type) as crate::expression::ExprRef;
    scope.declare(name, declared_type, placeholder);
    Ok(())
}

fn check_declare_variable(config: &ParserConfig, element: &RawElement, scope: &Rc<Scope>) -> Result<ValueType, ParseError> {
    let name = required_child(element, "Name")?.text_trimmed().to_string();
    let type_name = required_child(element, "Type")?.text_trimmed();
    let declared_type = scalar_type_by_name(type_name)
        .ok_or_else(|| err(element, ParseErrorKind::MalformedLiteral(ValueType::Unknown, type_name.to_string())))?;

    if let Some(init) = element.child("InitialValue") {
        let init_expr = unwrap_single(init)?;
        check_element(config, init_expr, scope, declared_type)?;
    }

    declare(scope, element, &name, declared_type)?;
    Ok(ValueType::Unknown)
}

fn check_declare_array(config: &ParserConfig, element: &RawElement, scope: &Rc<Scope>) -> Result<ValueType, ParseError> {
    let name = required_child(element, "Name")?.text_trimmed().to_string();
    let type_name = required_child(element, "Type")?.text_trimmed();
    let element_type = scalar_type_by_name(type_name)
        .ok_or_else(|| err(element, ParseErrorKind::MalformedLiteral(ValueType::Unknown, type_name.to_string())))?;
    let array_type = element_type.array_type().unwrap();

    if let Some(max_size) = element.child("MaxSize") {
        let max_size_expr = unwrap_single(max_size)?;
        check_element(config, max_size_expr, scope, ValueType::Integer)?;
    }

    if let Some(init) = element.child("InitialValue") {
        let init_expr = unwrap_single(init)?;
        check_element(config, init_expr, scope, array_type)?;
    }

    declare(scope, element, &name, array_type)?;
    Ok(ValueType::Unknown)
}

fn check_variable_declarations(config: &ParserConfig, element: &RawElement, scope: &Rc<Scope>) -> Result<ValueType, ParseError> {
    for child in &element.children {
        match classify(&child.name) {
            Some(ElementKind::DeclareVariable) => {
                check_declare_variable(config, child, scope)?;
            }
            Some(ElementKind::DeclareArray) => {
                check_declare_array(config, child, scope)?;
            }
            _ => return Err(err(child, ParseErrorKind::UnknownElement(child.name.clone()))),
        }
    }
    Ok(ValueType::Unknown)
}

fn check_node_ref(element: &RawElement, ty: ValueType, desired_type: ValueType) -> Result<ValueType, ParseError> {
    if element.child("NodeRef").is_none() && element.child("NodeId").is_none() {
        return Err(err(element, ParseErrorKind::MissingChild("NodeRef".to_string())));
    }
    require_compatible(element, desired_type, ty)?;
    Ok(ty)
}

fn check_update(config: &ParserConfig, element: &RawElement, scope: &Rc<Scope>) -> Result<ValueType, ParseError> {
    required_child(element, "Name")?;
    for pair in element.children.iter().filter(|c| c.name == "Pair") {
        required_child(pair, "Name")?;
        let value = pair
            .children
            .iter()
            .find(|c| c.name != "Name")
            .ok_or_else(|| err(pair, ParseErrorKind::MissingChild("value".to_string())))?;
        check_element(config, value, scope, ValueType::Unknown)?;
    }
    Ok(ValueType::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn check(xml: &str, scope: &Rc<Scope>, desired: ValueType) -> Result<ValueType, ParseError> {
        let element = parse_document("plan.plx", xml).unwrap();
        check_element(&ParserConfig::default(), &element, scope, desired)
    }

    #[test]
    fn integer_literal_checks_as_integer() {
        let scope = Scope::root();
        let ty = check("<IntegerValue>4</IntegerValue>", &scope, ValueType::Unknown).unwrap();
        assert_eq!(ty, ValueType::Integer);
    }

    #[test]
    fn integer_literal_satisfies_real_desired_type() {
        let scope = Scope::root();
        assert!(check("<IntegerValue>4</IntegerValue>", &scope, ValueType::Real).is_ok());
    }

    #[test]
    fn malformed_literal_is_a_parse_error() {
        let scope = Scope::root();
        let err = check("<IntegerValue>not a number</IntegerValue>", &scope, ValueType::Unknown).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MalformedLiteral(..)));
    }

    #[test]
    fn node_state_literal_checks_as_node_state() {
        let scope = Scope::root();
        let ty = check("<NodeStateValue>EXECUTING</NodeStateValue>", &scope, ValueType::Unknown).unwrap();
        assert_eq!(ty, ValueType::NodeState);
    }

    #[test]
    fn malformed_node_state_literal_is_a_parse_error() {
        let scope = Scope::root();
        let err = check("<NodeStateValue>NOT_A_STATE</NodeStateValue>", &scope, ValueType::Unknown).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MalformedLiteral(..)));
    }

    #[test]
    fn undeclared_variable_reference_errors() {
        let scope = Scope::root();
        let err = check("<IntegerVariable>x</IntegerVariable>", &scope, ValueType::Unknown).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UndeclaredVariable(_)));
    }

    #[test]
    fn declare_variable_then_reference_succeeds() {
        let scope = Scope::root();
        check(
            "<DeclareVariable><Name>x</Name><Type>Integer</Type></DeclareVariable>",
            &scope,
            ValueType::Unknown,
        )
        .unwrap();
        let ty = check("<IntegerVariable>x</IntegerVariable>", &scope, ValueType::Unknown).unwrap();
        assert_eq!(ty, ValueType::Integer);
    }

    #[test]
    fn duplicate_declaration_in_same_scope_errors() {
        let scope = Scope::root();
        check(
            "<DeclareVariable><Name>x</Name><Type>Integer</Type></DeclareVariable>",
            &scope,
            ValueType::Unknown,
        )
        .unwrap();
        let err = check(
            "<DeclareVariable><Name>x</Name><Type>Real</Type></DeclareVariable>",
            &scope,
            ValueType::Unknown,
        )
        .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::DuplicateDeclaration(_)));
    }

    #[test]
    fn add_operator_checks_arg_types() {
        let scope = Scope::root();
        let ty = check(
            "<ADD><IntegerValue>1</IntegerValue><IntegerValue>2</IntegerValue></ADD>",
            &scope,
            ValueType::Unknown,
        )
        .unwrap();
        assert_eq!(ty, ValueType::Integer);
    }

    #[test]
    fn not_with_wrong_arg_count_errors() {
        let scope = Scope::root();
        let err = check(
            "<NOT><BooleanValue>true</BooleanValue><BooleanValue>false</BooleanValue></NOT>",
            &scope,
            ValueType::Unknown,
        )
        .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::ArgCountInvalid { .. }));
    }

    #[test]
    fn unknown_operator_name_errors() {
        let scope = Scope::root();
        let err = check("<NOT_A_REAL_OP><IntegerValue>1</IntegerValue></NOT_A_REAL_OP>", &scope, ValueType::Unknown)
            .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnknownOperator(_)));
    }

    #[test]
    fn array_element_resolves_through_declared_array() {
        let scope = Scope::root();
        check(
            "<DeclareArray><Name>a</Name><Type>Integer</Type><MaxSize><IntegerValue>4</IntegerValue></MaxSize></DeclareArray>",
            &scope,
            ValueType::Unknown,
        )
        .unwrap();
        let ty = check(
            "<ArrayElement><ArrayVariable>a</ArrayVariable><Index><IntegerValue>0</IntegerValue></Index></ArrayElement>",
            &scope,
            ValueType::Unknown,
        )
        .unwrap();
        assert_eq!(ty, ValueType::Integer);
    }

    #[test]
    fn assignment_requires_an_assignable_target() {
        let scope = Scope::root();
        let element = parse_document(
            "plan.plx",
            "<Assignment><IntegerValue>1</IntegerValue><IntegerRHS><IntegerValue>2</IntegerValue></IntegerRHS></Assignment>",
        )
        .unwrap();
        let err = check_element(&ParserConfig::default(), &element, &scope, ValueType::Unknown).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::NotAssignable(_)));
    }

    #[test]
    fn assignment_to_declared_variable_succeeds() {
        let scope = Scope::root();
        check(
            "<DeclareVariable><Name>x</Name><Type>Integer</Type></DeclareVariable>",
            &scope,
            ValueType::Unknown,
        )
        .unwrap();
        let element = parse_document(
            "plan.plx",
            "<Assignment><IntegerVariable>x</IntegerVariable><IntegerRHS><IntegerValue>2</IntegerValue></IntegerRHS></Assignment>",
        )
        .unwrap();
        check_element(&ParserConfig::default(), &element, &scope, ValueType::Unknown).unwrap();
    }

    #[test]
    fn lookup_now_checks_its_arguments() {
        let scope = Scope::root();
        let ty = check(
            r#"<LookupNow Type="Real"><Name><StringValue>altitude</StringValue></Name></LookupNow>"#,
            &scope,
            ValueType::Unknown,
        )
        .unwrap();
        assert_eq!(ty, ValueType::Real);
    }
}
