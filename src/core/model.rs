//! Canonical graph model shared by the extractors, the resolver and the projector

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a declaration node.
///
/// The enum is the union of both language vocabularies; each extractor only
/// emits the kinds that belong to its language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Function,
    Struct,
    Enum,
    Trait,
    Impl,
    Module,
    Constant,
    Macro,
    Use,
    Class,
    Method,
    Import,
    Variable,
    Decorator,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Function => "function",
            NodeKind::Struct => "struct",
            NodeKind::Enum => "enum",
            NodeKind::Trait => "trait",
            NodeKind::Impl => "impl",
            NodeKind::Module => "module",
            NodeKind::Constant => "constant",
            NodeKind::Macro => "macro",
            NodeKind::Use => "use",
            NodeKind::Class => "class",
            NodeKind::Method => "method",
            NodeKind::Import => "import",
            NodeKind::Variable => "variable",
            NodeKind::Decorator => "decorator",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Calls,
    Implements,
    Uses,
    Contains,
    Extends,
    Imports,
    Inherits,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Calls => "calls",
            EdgeKind::Implements => "implements",
            EdgeKind::Uses => "uses",
            EdgeKind::Contains => "contains",
            EdgeKind::Extends => "extends",
            EdgeKind::Imports => "imports",
            EdgeKind::Inherits => "inherits",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rust item visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// `pub`
    Public,
    /// No modifier
    Private,
    /// `pub(crate)`
    Crate,
    /// `pub(super)` / `pub(self)`
    Super,
    /// `pub(in some::path)`
    Restricted,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Crate => "crate",
            Visibility::Super => "super",
            Visibility::Restricted => "restricted",
        }
    }
}

/// Build the stable id of a node from its identifying triple.
pub fn node_id(kind: &str, qualified_path: &str, name: &str) -> String {
    format!("{}:{}:{}", kind, qualified_path, name)
}

/// A code construct discovered in a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    /// Enclosing scope path, without the node's own name
    pub qualified_path: String,
    pub source_file: String,
    /// 1-based header line
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
}

impl DeclarationNode {
    pub fn new(
        kind: NodeKind,
        name: impl Into<String>,
        qualified_path: impl Into<String>,
        source_file: impl Into<String>,
        line: usize,
    ) -> Self {
        let name = name.into();
        let qualified_path = qualified_path.into();
        Self {
            id: node_id(kind.as_str(), &qualified_path, &name),
            kind,
            name,
            qualified_path,
            source_file: source_file.into(),
            line,
            signature: None,
            visibility: None,
            docstring: None,
            decorators: Vec::new(),
        }
    }

    pub fn with_signature(mut self, signature: Option<String>) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }
}

/// A directed, typed relationship between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: String,
    /// May name a node that is not part of the project
    pub target: String,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

/// Symbolic, not yet resolved reference to a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRef {
    /// Bare name to look up
    pub name: String,
    /// Exact qualified path the target must live at, when the extractor knows it
    pub path: Option<String>,
    /// Node kinds that may satisfy the reference; empty accepts any kind
    pub accepted: Vec<NodeKind>,
    /// Scope used for the synthetic id when nothing matches
    pub scope: String,
    /// Kind label used for the synthetic id when nothing matches
    pub fallback: &'static str,
}

impl SymbolRef {
    pub fn new(name: impl Into<String>, scope: impl Into<String>, fallback: &'static str) -> Self {
        Self {
            name: name.into(),
            path: None,
            accepted: Vec::new(),
            scope: scope.into(),
            fallback,
        }
    }

    pub fn accepting(mut self, kinds: &[NodeKind]) -> Self {
        self.accepted = kinds.to_vec();
        self
    }

    /// Require an exact qualified path match before falling back to bare names.
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn accepts(&self, kind: NodeKind) -> bool {
        self.accepted.is_empty() || self.accepted.contains(&kind)
    }

    /// The id used when the reference cannot be matched to a declaration.
    pub fn synthetic_id(&self) -> String {
        node_id(self.fallback, &self.scope, &self.name)
    }
}

/// One end of a raw edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Already a node id
    Node(String),
    /// A symbol that still needs resolving
    Symbol(SymbolRef),
}

/// An edge as extracted from one file, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEdge {
    pub source: Endpoint,
    pub target: Endpoint,
    pub kind: EdgeKind,
    /// File the reference was found in, used to prefer local matches
    pub file: String,
}

impl RawEdge {
    /// Edge from a known node to a symbol that still needs resolving.
    pub fn to_symbol(source: &DeclarationNode, target: SymbolRef, kind: EdgeKind) -> Self {
        Self {
            source: Endpoint::Node(source.id.clone()),
            target: Endpoint::Symbol(target),
            kind,
            file: source.source_file.clone(),
        }
    }

    /// Edge whose two ends both still need resolving.
    pub fn symbolic(source: SymbolRef, target: SymbolRef, kind: EdgeKind, file: impl Into<String>) -> Self {
        Self {
            source: Endpoint::Symbol(source),
            target: Endpoint::Symbol(target),
            kind,
            file: file.into(),
        }
    }

    /// Edge between two nodes that are both known at extraction time.
    pub fn between(source: &DeclarationNode, target: &DeclarationNode, kind: EdgeKind) -> Self {
        Self {
            source: Endpoint::Node(source.id.clone()),
            target: Endpoint::Node(target.id.clone()),
            kind,
            file: source.source_file.clone(),
        }
    }
}

/// Everything extracted from a single file.
#[derive(Debug, Clone, Default)]
pub struct FileExtraction {
    pub nodes: Vec<DeclarationNode>,
    pub edges: Vec<RawEdge>,
}

impl FileExtraction {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Assembled result of one parse run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub root_path: String,
    pub language: String,
    pub nodes: Vec<DeclarationNode>,
    pub edges: Vec<DependencyEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_is_derived_from_kind_path_and_name() {
        let node = DeclarationNode::new(NodeKind::Function, "run", "app::cli", "src/app/cli.rs", 3);
        assert_eq!(node.id, "function:app::cli:run");
    }

    #[test]
    fn test_declaration_node_json_uses_camel_case() {
        let node = DeclarationNode::new(NodeKind::Class, "Foo", "pkg", "pkg/foo.py", 1);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["qualifiedPath"], "pkg");
        assert_eq!(json["sourceFile"], "pkg/foo.py");
        assert_eq!(json["kind"], "class");
        assert!(json.get("visibility").is_none());
        assert!(json.get("decorators").is_none());
    }

    #[test]
    fn test_synthetic_id_follows_kind_scope_name() {
        let symbol = SymbolRef::new("helper", "mod_a", "function");
        assert_eq!(symbol.synthetic_id(), "function:mod_a:helper");
    }
}
