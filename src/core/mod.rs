//! Core engine for code graph extraction and projection

pub mod config;
pub mod discovery;
pub mod graph;
pub mod model;
pub mod parser;
pub mod projector;
pub mod resolver;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::core::config::Config;
use crate::core::model::Project;
use crate::languages::{LanguageRegistry, LanguageSupport};

/// Parse a project with one language strategy and assemble its graph
pub fn parse_project(root: &Path, language: Arc<dyn LanguageSupport>, config: &Config) -> Project {
    let language_id = language.language_id().to_string();
    let parser = parser::CodeParser::new(language).with_parallel(config.discovery.parallel);

    let files = parser.collect_files(root, &config.discovery.exclusions());
    info!("Found {} {} files under {:?}", files.len(), language_id, root);

    let extractions = parser.parse_files(root, &files);
    let project = graph::GraphBuilder::new(root, &language_id).assemble(extractions);

    info!(
        "Project '{}' parsed: {} nodes, {} edges",
        project.name,
        project.nodes.len(),
        project.edges.len()
    );
    project
}

/// Parse a project, looking the language up by tag or detecting it from the
/// files under `root` when no tag is given
pub fn parse_project_with(
    registry: &LanguageRegistry,
    root: &Path,
    language: Option<&str>,
    config: &Config,
) -> Result<Project> {
    let language = match language {
        Some(tag) => registry
            .get(tag)
            .cloned()
            .with_context(|| format!("Unsupported language: {}", tag))?,
        None => detect_language(registry, root, config)
            .with_context(|| format!("No supported source files found under {:?}", root))?,
    };
    Ok(parse_project(root, language, config))
}

/// The registered language with the most source files under `root`
pub fn detect_language(
    registry: &LanguageRegistry,
    root: &Path,
    config: &Config,
) -> Option<Arc<dyn LanguageSupport>> {
    let extensions: Vec<&str> = registry
        .list_languages()
        .iter()
        .flat_map(|l| l.file_extensions().iter().copied())
        .collect();
    let files = discovery::discover(root, &extensions, &config.discovery.exclusions());
    registry.detect(files.iter().map(|f| f.as_path())).cloned()
}
