//! CodeViz - code graph extraction library
//!
//! This library discovers Rust and Python sources, extracts their
//! declarations and references lexically, assembles a resolved project
//! graph and projects it into visualization views.

pub mod core;
pub mod languages;
pub mod server;
pub mod storage;

pub use crate::core::config::Config;
pub use crate::core::graph::GraphBuilder;
pub use crate::core::model::{DeclarationNode, DependencyEdge, EdgeKind, NodeKind, Project};
pub use crate::core::parser::CodeParser;
pub use crate::core::projector::{
    filter_call_graph, filter_module_dependencies, flat_view_to_hierarchical, project_to_flat_view,
    project_to_hierarchical, project_view, GraphView, HierarchicalView, ProjectedView, ViewKind,
};
pub use crate::core::{parse_project, parse_project_with};
pub use crate::languages::LanguageRegistry;
pub use crate::storage::{Database, ProjectStore};
