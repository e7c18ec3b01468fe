//! Parse driver: discovery plus per-file extraction

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::core::discovery;
use crate::core::model::FileExtraction;
use crate::languages::LanguageSupport;

/// Code parser that runs one language strategy over a project tree
pub struct CodeParser {
    language: Arc<dyn LanguageSupport>,
    parallel: bool,
}

impl CodeParser {
    /// Create a new parser for the given language
    pub fn new(language: Arc<dyn LanguageSupport>) -> Self {
        Self {
            language,
            parallel: true,
        }
    }

    /// Toggle extraction on the rayon thread pool
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Collect all files of this parser's language under `root`
    pub fn collect_files(&self, root: &Path, exclude_dirs: &[String]) -> Vec<PathBuf> {
        discovery::discover(root, self.language.file_extensions(), exclude_dirs)
    }

    /// Parse a single file and extract graph data
    pub fn parse_file(&self, root: &Path, path: &Path) -> Result<FileExtraction> {
        // Read file as bytes first to handle non-UTF8 encodings
        let bytes = fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
        let content = String::from_utf8_lossy(&bytes);

        let relative = path.strip_prefix(root).unwrap_or(path);
        let extraction = self
            .language
            .extract_file(relative, &content)
            .with_context(|| format!("Failed to extract {:?}", relative))?;

        debug!(
            "Parsed {:?}: {} nodes, {} raw edges",
            relative,
            extraction.nodes.len(),
            extraction.edges.len()
        );
        Ok(extraction)
    }

    /// Parse every file, keeping input order. Failures yield an empty
    /// extraction for that file.
    pub fn parse_files(&self, root: &Path, files: &[PathBuf]) -> Vec<FileExtraction> {
        let parse = |path: &PathBuf| match self.parse_file(root, path) {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("Failed to parse {:?}: {:#}", path, e);
                FileExtraction::default()
            }
        };

        if self.parallel {
            files.par_iter().map(parse).collect()
        } else {
            files.iter().map(parse).collect()
        }
    }
}
