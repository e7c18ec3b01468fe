//! Graph projector: derived views over an assembled project
//!
//! Every function here is a pure transform. Calling one twice on the same
//! input yields identical output, which the artifact cache relies on.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::core::model::{NodeKind, Project, Visibility};

/// Label of the root tree node and of nodes outside any module.
pub const ROOT: &str = "root";

/// Link type used by the module-dependency view.
pub const DEPENDS_ON: &str = "depends_on";

/// Flat node/link form for force-directed rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Size hint
    pub val: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub link_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
}

/// Single-root module tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalView {
    pub name: String,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    pub children: Vec<TreeNode>,
}

/// The derived views a project can be rendered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Graph,
    Hierarchy,
    Modules,
    Calls,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [ViewKind::Graph, ViewKind::Hierarchy, ViewKind::Modules, ViewKind::Calls];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Graph => "graph",
            ViewKind::Hierarchy => "hierarchy",
            ViewKind::Modules => "modules",
            ViewKind::Calls => "calls",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow!("Unknown view '{}' (expected graph, hierarchy, modules or calls)", s))
    }
}

/// Output of [`project_view`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectedView {
    Graph(GraphView),
    Tree(HierarchicalView),
}

/// Render `project` as the requested view.
pub fn project_view(project: &Project, kind: ViewKind) -> ProjectedView {
    match kind {
        ViewKind::Graph => ProjectedView::Graph(project_to_flat_view(project)),
        ViewKind::Hierarchy => ProjectedView::Tree(project_to_hierarchical(project)),
        ViewKind::Modules => ProjectedView::Graph(filter_module_dependencies(&project_to_flat_view(project))),
        ViewKind::Calls => ProjectedView::Graph(filter_call_graph(&project_to_flat_view(project))),
    }
}

/// Size and color assigned to a node type.
fn style(node_type: &str) -> (u32, Option<&'static str>) {
    match node_type {
        "module" => (10, Some("#4e79a7")),
        "struct" | "class" => (7, Some("#f28e2b")),
        "enum" => (6, Some("#edc948")),
        "trait" => (6, Some("#b07aa1")),
        "impl" => (5, Some("#76b7b2")),
        "function" => (4, Some("#59a14f")),
        "method" => (4, Some("#8cd17d")),
        "constant" => (3, Some("#e15759")),
        "macro" => (3, Some("#9c755f")),
        "variable" => (2, Some("#ff9da7")),
        "use" | "import" => (2, Some("#bab0ac")),
        "decorator" => (2, Some("#d4a6c8")),
        _ => (1, None),
    }
}

/// Top-level module a node belongs to: the first segment of its path.
fn top_level_module(node_type: &str, name: &str, path: &str) -> String {
    let separator = if path.contains("::") { "::" } else { "." };
    match path.split(separator).find(|s| !s.is_empty()) {
        Some(first) => first.to_string(),
        None if node_type == NodeKind::Module.as_str() => name.to_string(),
        None => ROOT.to_string(),
    }
}

/// Direct node and edge mapping with presentation hints.
pub fn project_to_flat_view(project: &Project) -> GraphView {
    let nodes = project
        .nodes
        .iter()
        .map(|node| {
            let node_type = node.kind.as_str();
            let (val, color) = style(node_type);
            GraphNode {
                id: node.id.clone(),
                name: node.name.clone(),
                node_type: node_type.to_string(),
                val,
                color: color.map(str::to_string),
                group: Some(top_level_module(node_type, &node.name, &node.qualified_path)),
                path: (!node.qualified_path.is_empty()).then(|| node.qualified_path.clone()),
                file: Some(node.source_file.clone()),
                signature: node.signature.clone(),
            }
        })
        .collect();

    let links = project
        .edges
        .iter()
        .map(|edge| GraphLink {
            source: edge.source.clone(),
            target: edge.target.clone(),
            link_type: edge.kind.as_str().to_string(),
            value: edge.weight,
        })
        .collect();

    GraphView { nodes, links }
}

/// A node on its way into the tree.
struct TreeEntry {
    id: String,
    name: String,
    node_type: String,
    path: String,
    file: Option<String>,
    signature: Option<String>,
    visibility: Option<Visibility>,
}

impl TreeEntry {
    fn into_tree_node(self) -> TreeNode {
        TreeNode {
            id: self.id,
            name: self.name,
            node_type: self.node_type,
            path: (!self.path.is_empty()).then_some(self.path),
            file: self.file,
            signature: self.signature,
            visibility: self.visibility,
            children: Vec::new(),
        }
    }
}

/// Tree built from a flat view. Carries no visibility.
pub fn flat_view_to_hierarchical(view: &GraphView) -> HierarchicalView {
    let entries = view
        .nodes
        .iter()
        .map(|node| TreeEntry {
            id: node.id.clone(),
            name: node.name.clone(),
            node_type: node.node_type.clone(),
            path: node.path.clone().unwrap_or_default(),
            file: node.file.clone(),
            signature: node.signature.clone(),
            visibility: None,
        })
        .collect();
    build_tree(ROOT, entries)
}

/// Tree built straight from a project, keeping visibility.
pub fn project_to_hierarchical(project: &Project) -> HierarchicalView {
    let entries = project
        .nodes
        .iter()
        .map(|node| TreeEntry {
            id: node.id.clone(),
            name: node.name.clone(),
            node_type: node.kind.as_str().to_string(),
            path: node.qualified_path.clone(),
            file: Some(node.source_file.clone()),
            signature: node.signature.clone(),
            visibility: node.visibility,
        })
        .collect();
    build_tree(&project.name, entries)
}

/// Module node of the arena, keyed by its full path.
struct ModuleSlot {
    node: TreeNode,
    /// Key of the enclosing module, `None` at the root
    parent: Option<String>,
}

fn build_tree(name: &str, entries: Vec<TreeEntry>) -> HierarchicalView {
    let separator = if entries.iter().any(|e| e.path.contains("::")) { "::" } else { "." };
    let segments_of = |path: &str| -> Vec<String> {
        path.split(separator).filter(|s| !s.is_empty()).map(str::to_string).collect()
    };

    let mut modules: BTreeMap<String, ModuleSlot> = BTreeMap::new();
    let mut leaves: Vec<TreeEntry> = Vec::new();

    // Implicit modules for every path prefix
    for entry in &entries {
        let segments = segments_of(&entry.path);
        for depth in 1..=segments.len() {
            let key = segments[..depth].join(separator);
            modules.entry(key).or_insert_with(|| ModuleSlot {
                node: synthetic_module(&segments[..depth], separator),
                parent: (depth > 1).then(|| segments[..depth - 1].join(separator)),
            });
        }
    }

    // Declared modules replace the implicit node at their own key
    for entry in entries {
        if entry.node_type != NodeKind::Module.as_str() {
            leaves.push(entry);
            continue;
        }
        let parent = segments_of(&entry.path).join(separator);
        let key = if parent.is_empty() {
            entry.name.clone()
        } else {
            format!("{}{}{}", parent, separator, entry.name)
        };
        modules.insert(
            key,
            ModuleSlot {
                node: entry.into_tree_node(),
                parent: (!parent.is_empty()).then_some(parent),
            },
        );
    }

    let mut leaf_children: HashMap<String, Vec<TreeNode>> = HashMap::new();
    let mut root_leaves: Vec<TreeNode> = Vec::new();
    for leaf in leaves {
        let key = segments_of(&leaf.path).join(separator);
        let node = leaf.into_tree_node();
        if key.is_empty() {
            root_leaves.push(node);
        } else {
            leaf_children.entry(key).or_default().push(node);
        }
    }

    let mut module_children: BTreeMap<Option<String>, BTreeSet<String>> = BTreeMap::new();
    for (key, slot) in &modules {
        module_children.entry(slot.parent.clone()).or_default().insert(key.clone());
    }

    let mut children = Vec::new();
    for key in module_children.get(&None).into_iter().flatten() {
        if let Some(subtree) = assemble_module(key, &mut modules, &module_children, &mut leaf_children) {
            children.push(subtree);
        }
    }
    children.extend(root_leaves);

    HierarchicalView {
        name: name.to_string(),
        children,
    }
}

fn synthetic_module(segments: &[String], separator: &str) -> TreeNode {
    let name = segments.last().cloned().unwrap_or_default();
    let path = segments[..segments.len().saturating_sub(1)].join(separator);
    TreeNode {
        id: format!("module:{}:{}", path, name),
        name,
        node_type: NodeKind::Module.as_str().to_string(),
        path: (!path.is_empty()).then_some(path),
        file: None,
        signature: None,
        visibility: None,
        children: Vec::new(),
    }
}

/// Detach the module at `key` from the arena with its subtree filled in:
/// nested modules first (sorted by path), then declarations in input order.
fn assemble_module(
    key: &str,
    modules: &mut BTreeMap<String, ModuleSlot>,
    module_children: &BTreeMap<Option<String>, BTreeSet<String>>,
    leaf_children: &mut HashMap<String, Vec<TreeNode>>,
) -> Option<TreeNode> {
    let mut node = modules.remove(key)?.node;
    if let Some(keys) = module_children.get(&Some(key.to_string())) {
        for child in keys {
            if let Some(subtree) = assemble_module(child, modules, module_children, leaf_children) {
                node.children.push(subtree);
            }
        }
    }
    if let Some(leaves) = leaf_children.remove(key) {
        node.children.extend(leaves);
    }
    Some(node)
}

/// Collapse nodes to their top-level module and aggregate the edges between
/// distinct modules.
pub fn filter_module_dependencies(view: &GraphView) -> GraphView {
    let mut module_of: HashMap<&str, String> = HashMap::new();
    let mut members: BTreeMap<String, u32> = BTreeMap::new();
    for node in &view.nodes {
        let module = top_level_module(&node.node_type, &node.name, node.path.as_deref().unwrap_or_default());
        *members.entry(module.clone()).or_default() += 1;
        module_of.insert(node.id.as_str(), module);
    }

    let mut counts: BTreeMap<(String, String), u32> = BTreeMap::new();
    for link in &view.links {
        let (Some(source), Some(target)) = (module_of.get(link.source.as_str()), module_of.get(link.target.as_str()))
        else {
            continue;
        };
        if source == target {
            continue;
        }
        *counts.entry((source.clone(), target.clone())).or_default() += 1;
    }

    let (_, color) = style(NodeKind::Module.as_str());
    let nodes = members
        .into_iter()
        .map(|(module, count)| GraphNode {
            id: module.clone(),
            name: module.clone(),
            node_type: NodeKind::Module.as_str().to_string(),
            val: count,
            color: color.map(str::to_string),
            group: Some(module),
            path: None,
            file: None,
            signature: None,
        })
        .collect();

    let links = counts
        .into_iter()
        .map(|((source, target), value)| GraphLink {
            source,
            target,
            link_type: DEPENDS_ON.to_string(),
            value: Some(value),
        })
        .collect();

    GraphView { nodes, links }
}

/// Keep `function` nodes and `calls` links. Links are not checked against the
/// remaining nodes.
pub fn filter_call_graph(view: &GraphView) -> GraphView {
    GraphView {
        nodes: view
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeKind::Function.as_str())
            .cloned()
            .collect(),
        links: view
            .links
            .iter()
            .filter(|l| l.link_type == "calls")
            .cloned()
            .collect(),
    }
}
