//! Small helpers shared across the crate: debug tracing and source
//! position tracking for error messages.

use std::fmt::{self, Display, Formatter};

/// Macro that can wrap any body, and only executes the body if we are
/// running in debug mode. Debug mode is enabled by setting the
/// environment variable `PLEXIL_DEBUG=true`. This compiles away to
/// nothing when `--release` is used.
///
/// ```
/// use plexil_expr::debug;
/// debug!(println!("Hello!"));
/// ```
#[macro_export]
macro_rules! debug {
    ($arg:expr) => {
        #[cfg(debug_assertions)]
        {
            if let Ok(debug_val) = std::env::var("PLEXIL_DEBUG") {
                if debug_val.to_lowercase().as_str() == "true" {
                    $arg;
                }
            }
        }
    };
}

/// A location in a plan's XML source, preserved through error messages
/// per the `FileName`/`LineNo`/`ColNo` attributes the parser carries
/// along (spec §6.1).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl Display for SourcePos {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A span of source text, paired with the file it came from. Nodes
/// allocated by the parser carry one of these so that later errors (and
/// the check pass itself) can report a precise location, the same way
/// the teacher's `Span` threaded `nom_locate` positions through
/// `SourceErrorWrapper`.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Span {
    pub file_name: String,
    pub start: SourcePos,
}

impl Span {
    pub fn new(file_name: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file_name: file_name.into(),
            start: SourcePos::new(line, column),
        }
    }

    /// Build a [Span] from a `roxmltree` node, resolving its text
    /// position via the document's text-position lookup.
    pub fn from_xml_node(
        file_name: &str,
        doc: &roxmltree::Document,
        node: &roxmltree::Node,
    ) -> Self {
        let pos = doc.text_pos_at(node.range().start);
        Self::new(file_name, pos.row, pos.col)
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_name, self.start)
    }
}
