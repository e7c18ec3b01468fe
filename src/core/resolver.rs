//! Reference resolution: turns raw, symbolic edges into id-to-id edges

use std::collections::HashMap;

use tracing::debug;

use crate::core::model::{DeclarationNode, DependencyEdge, Endpoint, RawEdge, SymbolRef};

/// Resolves symbolic references against the final node set of a project.
///
/// Lookup order for a symbol found in file `F`:
/// 1. exact qualified path (when the extractor supplied one),
/// 2. bare name declared in `F`,
/// 3. bare name declared at the symbol's scope,
/// 4. bare name declared anywhere in the project.
///
/// Within a tier the lowest id wins, so results never depend on file order.
/// References that match nothing resolve to [`SymbolRef::synthetic_id`]; the
/// edge is kept either way.
pub struct ReferenceResolver<'a> {
    nodes: &'a [DeclarationNode],
    by_name: HashMap<&'a str, Vec<usize>>,
}

/// Counters reported after a resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub resolved: usize,
    pub unresolved: usize,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(nodes: &'a [DeclarationNode]) -> Self {
        let mut by_name: HashMap<&'a str, Vec<usize>> = HashMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            by_name.entry(node.name.as_str()).or_default().push(idx);
        }
        Self { nodes, by_name }
    }

    /// Resolve every raw edge, preserving input order.
    pub fn resolve(&self, raw_edges: Vec<RawEdge>) -> (Vec<DependencyEdge>, ResolutionStats) {
        let mut stats = ResolutionStats::default();
        let mut edges = Vec::with_capacity(raw_edges.len());

        for raw in raw_edges {
            let source = self.resolve_endpoint(&raw.source, &raw.file, &mut stats);
            let target = self.resolve_endpoint(&raw.target, &raw.file, &mut stats);
            edges.push(DependencyEdge {
                source,
                target,
                kind: raw.kind,
                weight: None,
            });
        }

        debug!(
            "Resolved {} symbolic references, {} left as synthetic targets",
            stats.resolved, stats.unresolved
        );
        (edges, stats)
    }

    fn resolve_endpoint(&self, endpoint: &Endpoint, file: &str, stats: &mut ResolutionStats) -> String {
        match endpoint {
            Endpoint::Node(id) => id.clone(),
            Endpoint::Symbol(symbol) => match self.lookup(symbol, file) {
                Some(node) => {
                    stats.resolved += 1;
                    node.id.clone()
                }
                None => {
                    stats.unresolved += 1;
                    symbol.synthetic_id()
                }
            },
        }
    }

    /// Find the declaration a symbol refers to, if any.
    pub fn lookup(&self, symbol: &SymbolRef, file: &str) -> Option<&'a DeclarationNode> {
        let candidates: Vec<&'a DeclarationNode> = self
            .by_name
            .get(symbol.name.as_str())?
            .iter()
            .map(|&idx| &self.nodes[idx])
            .filter(|node| symbol.accepts(node.kind))
            .collect();

        if candidates.is_empty() {
            return None;
        }

        if let Some(path) = &symbol.path {
            if let Some(node) = lowest_id(candidates.iter().filter(|n| &n.qualified_path == path)) {
                return Some(node);
            }
        }

        lowest_id(candidates.iter().filter(|n| n.source_file == file))
            .or_else(|| lowest_id(candidates.iter().filter(|n| n.qualified_path == symbol.scope)))
            .or_else(|| lowest_id(candidates.iter()))
    }
}

fn lowest_id<'a, 'b>(
    nodes: impl Iterator<Item = &'b &'a DeclarationNode>,
) -> Option<&'a DeclarationNode>
where
    'a: 'b,
{
    nodes.copied().min_by(|a, b| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{EdgeKind, NodeKind};

    fn function(name: &str, path: &str, file: &str) -> DeclarationNode {
        DeclarationNode::new(NodeKind::Function, name, path, file, 1)
    }

    #[test]
    fn test_prefers_declaration_in_same_file() {
        let caller = function("main", "app", "app/main.rs");
        let nodes = vec![
            caller.clone(),
            function("helper", "lib", "lib/util.rs"),
            function("helper", "app", "app/main.rs"),
        ];
        let resolver = ReferenceResolver::new(&nodes);

        let raw = RawEdge::to_symbol(
            &caller,
            SymbolRef::new("helper", "app", "function").accepting(&[NodeKind::Function]),
            EdgeKind::Calls,
        );
        let (edges, stats) = resolver.resolve(vec![raw]);

        assert_eq!(edges[0].target, "function:app:helper");
        assert_eq!(stats.resolved, 1);
    }

    #[test]
    fn test_falls_back_to_bare_name_across_files() {
        let caller = function("main", "app", "app/main.rs");
        let nodes = vec![caller.clone(), function("helper", "lib", "lib/util.rs")];
        let resolver = ReferenceResolver::new(&nodes);

        let raw = RawEdge::to_symbol(
            &caller,
            SymbolRef::new("helper", "app", "function").accepting(&[NodeKind::Function]),
            EdgeKind::Calls,
        );
        let (edges, _) = resolver.resolve(vec![raw]);

        assert_eq!(edges[0].target, "function:lib:helper");
    }

    #[test]
    fn test_unresolved_reference_keeps_synthetic_target() {
        let caller = function("main", "app", "app/main.rs");
        let nodes = vec![caller.clone()];
        let resolver = ReferenceResolver::new(&nodes);

        let raw = RawEdge::to_symbol(
            &caller,
            SymbolRef::new("missing", "app", "function").accepting(&[NodeKind::Function]),
            EdgeKind::Calls,
        );
        let (edges, stats) = resolver.resolve(vec![raw]);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "function:app:main");
        assert_eq!(edges[0].target, "function:app:missing");
        assert_eq!(stats.unresolved, 1);
    }

    #[test]
    fn test_kind_filter_excludes_other_declarations() {
        let caller = function("main", "app", "app/main.rs");
        let strukt = DeclarationNode::new(NodeKind::Struct, "Config", "app", "app/main.rs", 4);
        let nodes = vec![caller.clone(), strukt];
        let resolver = ReferenceResolver::new(&nodes);

        let raw = RawEdge::to_symbol(
            &caller,
            SymbolRef::new("Config", "app", "trait").accepting(&[NodeKind::Trait]),
            EdgeKind::Implements,
        );
        let (edges, _) = resolver.resolve(vec![raw]);

        assert_eq!(edges[0].target, "trait:app:Config");
    }

    #[test]
    fn test_exact_path_wins_over_same_file() {
        let module = DeclarationNode::new(NodeKind::Module, "main", "", "main.py", 1);
        let nodes = vec![
            module.clone(),
            DeclarationNode::new(NodeKind::Module, "util", "pkg", "pkg/util.py", 1),
            DeclarationNode::new(NodeKind::Module, "util", "other", "other/util.py", 1),
        ];
        let resolver = ReferenceResolver::new(&nodes);

        let raw = RawEdge::to_symbol(
            &module,
            SymbolRef::new("util", "other", "module")
                .at_path("other")
                .accepting(&[NodeKind::Module]),
            EdgeKind::Imports,
        );
        let (edges, _) = resolver.resolve(vec![raw]);

        assert_eq!(edges[0].target, "module:other:util");
    }
}
