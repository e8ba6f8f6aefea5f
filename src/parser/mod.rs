//! Two-pass XML→graph translation (spec §4.10, §6.1). The outer pipeline
//! mirrors the teacher's `Compiler<T>` phantom-state machine: a document
//! is parsed into an owned, `Span`-tagged tree once, checked once
//! (producing the type each subtree will yield), then built once (the
//! only stage that actually allocates `Expression` nodes). Each stage
//! consumes the previous one — there is no going back, and a `Checked`
//! document can be built at most once.
//!
//! Unlike `nom`/`nom_locate`, `roxmltree` hands back borrowed nodes tied
//! to the `Document`'s lifetime; [RawElement] detaches from that by
//! copying out names, attributes, text, and a [Span] up front, the same
//! way the teacher's own parser produces an owned `SpanNode` tree
//! decoupled from the original source slice.

pub mod build;
pub mod check;
pub mod factory;

use crate::error::{ParseError, ParseErrorKind};
use crate::expression::ExprRef;
use crate::external::ExternalInterface;
use crate::node_ref::NodeStateSource;
use crate::util::Span;
use crate::value::ValueType;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::rc::Rc;

/// Static parameters the check pass consults that aren't themselves part
/// of the plan XML (spec §1 ambient-stack note): currently just whether
/// a `Lookup` naming an undeclared state is an error or a warning (spec
/// §7 default: warn, i.e. `false`).
#[derive(Clone, Debug)]
pub struct ParserConfig {
    pub undeclared_lookup_is_error: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            undeclared_lookup_is_error: false,
        }
    }
}

/// How a `<NodeRef>` names its target, relative to the node the
/// reference appears in (spec §6.1). `dir="self"` is the common case for
/// a node testing its own state; the others require the node scheduler
/// (outside this crate) to walk its own tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeRefSpec {
    SelfRef,
    ParentRef,
    ChildRef(String),
    SiblingRef(String),
    /// A bare `<NodeId>name</NodeId>`.
    Named(String),
}

/// The boundary through which the build pass resolves a `<NodeRef>`/
/// `<NodeId>` to the scheduler-side handle a node-internal reference
/// reads through (spec §4.9). Mirrors [ExternalInterface]'s role for
/// `Lookup`: the actual node tree lives outside this crate's scope.
pub trait NodeRefResolver: Debug {
    fn resolve(&self, spec: &NodeRefSpec) -> Option<Rc<dyn NodeStateSource>>;
}

/// Lexical scope for variable declarations (spec §4.10: "variable
/// references look up the declaring scope via enclosing-node walk").
/// Scopes form a parent chain mirroring plan node nesting; a lookup
/// walks outward from the innermost scope until a name resolves.
#[derive(Debug)]
pub struct Scope {
    parent: Option<Rc<Scope>>,
    vars: RefCell<HashMap<String, (ValueType, ExprRef)>>,
}

impl Scope {
    pub fn root() -> Rc<Self> {
        Rc::new(Self {
            parent: None,
            vars: RefCell::new(HashMap::new()),
        })
    }

    pub fn child(parent: &Rc<Self>) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(Rc::clone(parent)),
            vars: RefCell::new(HashMap::new()),
        })
    }

    /// `true` if `name` is already declared in *this* scope (not an
    /// enclosing one) — duplicate-declaration checking only cares about
    /// the immediate scope, per the spec's "no shadowing across node
    /// boundaries is an error, shadowing an outer scope is not" reading
    /// of `DeclareVariable`.
    pub fn declared_locally(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
    }

    pub fn declare(&self, name: impl Into<String>, value_type: ValueType, expr: ExprRef) {
        self.vars.borrow_mut().insert(name.into(), (value_type, expr));
    }

    pub fn lookup(&self, name: &str) -> Option<(ValueType, ExprRef)> {
        if let Some(found) = self.vars.borrow().get(name) {
            return Some(found.clone());
        }
        self.parent.as_ref()?.lookup(name)
    }
}

/// An owned, detached XML element: name, attributes, direct text
/// content, children, and the source [Span] it started at. Built once
/// from a `roxmltree::Document` by [parse_document] and never touches
/// `roxmltree` again afterward.
#[derive(Clone, Debug)]
pub struct RawElement {
    pub name: String,
    pub span: Span,
    pub attrs: HashMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<RawElement>,
}

impl RawElement {
    pub fn child(&self, name: &str) -> Option<&RawElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn text_trimmed(&self) -> &str {
        self.text.as_deref().unwrap_or("").trim()
    }
}

fn convert(file_name: &str, doc: &roxmltree::Document, node: roxmltree::Node) -> RawElement {
    let span = Span::from_xml_node(file_name, doc, &node);
    let mut attrs = HashMap::new();
    for attr in node.attributes() {
        attrs.insert(attr.name().to_string(), attr.value().to_string());
    }
    let mut text = None;
    let mut children = Vec::new();
    for child in node.children() {
        if child.is_element() {
            children.push(convert(file_name, doc, child));
        } else if child.is_text() {
            let chunk = child.text().unwrap_or("");
            if !chunk.trim().is_empty() {
                text = Some(text.map_or_else(|| chunk.to_string(), |existing: String| existing + chunk));
            }
        }
    }
    RawElement {
        name: node.tag_name().name().to_string(),
        span,
        attrs,
        text,
        children,
    }
}

/// Parses a whole XML document (a single expression, or a
/// `<VariableDeclarations>` block — anything rooted at one element) into
/// an owned [RawElement] tree.
pub fn parse_document(file_name: &str, source: &str) -> Result<RawElement, ParseError> {
    let doc = roxmltree::Document::parse(source).map_err(|e| {
        ParseError::new(Span::new(file_name, 0, 0), ParseErrorKind::Xml(e.to_string()))
    })?;
    Ok(convert(file_name, &doc, doc.root_element()))
}

/// Marker for the unparsed stage of [Compiler]'s phantom state machine.
#[derive(Debug)]
pub struct Unparsed;

/// A checked element paired with the [ValueType] the check pass inferred
/// for it (spec §4.10: `check` "returns the type this expression will
/// produce").
#[derive(Clone, Debug)]
pub struct Checked {
    pub element: RawElement,
    pub value_type: ValueType,
}

/// Drives one document through the check/build pipeline (spec §2, §9
/// resolution note on the `Compiler<T>` shape borrowed from the
/// teacher). `T` tracks which stage `self.ast` is in; each stage method
/// consumes `self` and returns the next one, so a document can't be
/// built without having been checked first, and can't be checked twice.
#[derive(Debug)]
pub struct Compiler<T: Debug> {
    file_name: String,
    config: ParserConfig,
    external: Rc<dyn ExternalInterface>,
    node_refs: Rc<dyn NodeRefResolver>,
    ast: T,
}

impl Compiler<Unparsed> {
    pub fn new(
        file_name: impl Into<String>,
        config: ParserConfig,
        external: Rc<dyn ExternalInterface>,
        node_refs: Rc<dyn NodeRefResolver>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            config,
            external,
            node_refs,
            ast: Unparsed,
        }
    }

    fn debug(self) -> Self {
        crate::debug!(eprintln!("plexil-expr: parsed {}", self.file_name));
        self
    }

    pub fn parse(self, source: &str) -> Result<Compiler<RawElement>, ParseError> {
        let element = parse_document(&self.file_name, source)?;
        Ok(Compiler {
            file_name: self.file_name,
            config: self.config,
            external: self.external,
            node_refs: self.node_refs,
            ast: element,
        }
        .debug())
    }
}

impl Compiler<RawElement> {
    fn debug(self) -> Self {
        crate::debug!(eprintln!("plexil-expr: checking <{}>", self.ast.name));
        self
    }

    /// Runs the check pass against `scope`, expecting a value compatible
    /// with `desired_type` (`ValueType::Unknown` to accept anything).
    pub fn check(self, scope: &Rc<Scope>, desired_type: ValueType) -> Result<Compiler<Checked>, ParseError> {
        let value_type = check::check_element(&self.config, &self.ast, scope, desired_type)?;
        Ok(Compiler {
            file_name: self.file_name,
            config: self.config,
            external: self.external,
            node_refs: self.node_refs,
            ast: Checked {
                element: self.ast,
                value_type,
            },
        }
        .debug())
    }
}

impl Compiler<Checked> {
    fn debug(self) -> Self {
        crate::debug!(eprintln!(
            "plexil-expr: checked <{}> : {}",
            self.ast.element.name, self.ast.value_type
        ));
        self
    }

    /// Runs the build pass, producing the actual expression graph. This
    /// is the only stage that allocates `Expression` nodes; nothing
    /// about it can fail in a way the check pass should have already
    /// caught, save for node-reference resolution, which depends on the
    /// scheduler-side tree this crate doesn't own.
    pub fn build(self, scope: &Rc<Scope>) -> Result<ExprRef, ParseError> {
        self.debug_build_entry();
        build::build_element(&self.external, &self.node_refs, &self.ast, scope)
    }

    /// Builds a checked `<Assignment>` (spec §4.8) into the executable
    /// node the node scheduler calls `execute`/`retract` on.
    pub fn build_assignment(self, scope: &Rc<Scope>) -> Result<crate::assignment::Assignment, ParseError> {
        self.debug_build_entry();
        build::build_assignment(&self.external, &self.node_refs, &self.ast.element, scope)
    }

    /// Builds a checked `<Update>` (spec §4.9) into the publishable node.
    pub fn build_update(self, scope: &Rc<Scope>) -> Result<crate::update::Update, ParseError> {
        self.debug_build_entry();
        build::build_update(&self.external, &self.node_refs, &self.ast.element, scope)
    }

    /// Builds a checked `<VariableDeclarations>` block, declaring every
    /// entry into `scope` and returning the declared expressions in
    /// document order.
    pub fn build_declarations(self, scope: &Rc<Scope>) -> Result<Vec<ExprRef>, ParseError> {
        self.debug_build_entry();
        build::build_variable_declarations(&self.external, &self.node_refs, &self.ast.element, scope)
    }

    fn debug_build_entry(&self) {
        crate::debug!(eprintln!("plexil-expr: building <{}>", self.ast.element.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_document_detaches_from_roxmltree() {
        let el = parse_document("plan.plx", "<IntegerValue>4</IntegerValue>").unwrap();
        assert_eq!(el.name, "IntegerValue");
        assert_eq!(el.text_trimmed(), "4");
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let err = parse_document("plan.plx", "<Unclosed>").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Xml(_)));
    }

    #[test]
    fn scope_lookup_walks_parent_chain() {
        use crate::constant::Constant;
        use crate::value::Value;

        let root = Scope::root();
        root.declare("x", ValueType::Integer, Constant::new(Value::Integer(1)) as ExprRef);
        let child = Scope::child(&root);
        assert!(child.lookup("x").is_some());
        assert!(child.lookup("y").is_none());
        assert!(!child.declared_locally("x"));
    }
}
