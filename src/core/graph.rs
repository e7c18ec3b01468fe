//! Graph builder for assembling per-file extractions into a project

use std::path::Path;

use indexmap::IndexMap;
use tracing::debug;

use crate::core::model::{DeclarationNode, FileExtraction, Project};
use crate::core::resolver::ReferenceResolver;

/// Builder for constructing the project graph of one language
pub struct GraphBuilder {
    name: String,
    root_path: String,
    language: String,
}

impl GraphBuilder {
    /// Create a builder named after the root's final path component
    pub fn new(root: &Path, language: &str) -> Self {
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();
        Self {
            name,
            root_path: root.to_string_lossy().into_owned(),
            language: language.to_string(),
        }
    }

    /// Override the project name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Merge extractions in order and resolve their references.
    ///
    /// Nodes sharing an id collapse to one entry at the position of the first
    /// occurrence, holding the data of the last.
    pub fn assemble(&self, extractions: Vec<FileExtraction>) -> Project {
        let mut nodes: IndexMap<String, DeclarationNode> = IndexMap::new();
        let mut raw_edges = Vec::new();
        let mut duplicates = 0usize;

        for extraction in extractions {
            for node in extraction.nodes {
                if nodes.insert(node.id.clone(), node).is_some() {
                    duplicates += 1;
                }
            }
            raw_edges.extend(extraction.edges);
        }

        let nodes: Vec<DeclarationNode> = nodes.into_values().collect();
        let (edges, stats) = ReferenceResolver::new(&nodes).resolve(raw_edges);

        debug!(
            "Assembled {}: {} nodes ({} duplicate ids merged), {} edges, {} unresolved",
            self.name,
            nodes.len(),
            duplicates,
            edges.len(),
            stats.unresolved
        );

        Project {
            name: self.name.clone(),
            root_path: self.root_path.clone(),
            language: self.language.clone(),
            nodes,
            edges,
        }
    }
}
