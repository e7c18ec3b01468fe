//! Language support for code parsing
//!
//! This module provides the trait for language strategies and the
//! implementations for the supported languages (Rust and Python). The two
//! extractors share nothing beyond the node and edge shapes of
//! [`crate::core::model`].

pub mod python;
pub mod rust;
pub mod text;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::core::model::FileExtraction;

/// Trait for language support plugins
pub trait LanguageSupport: Send + Sync {
    /// Get the language identifier (e.g., "rust", "python")
    fn language_id(&self) -> &str;

    /// Get supported file extensions (e.g., [".rs"], [".py"])
    fn file_extensions(&self) -> &[&str];

    /// Module path derived from a file's location relative to the project root
    fn module_path(&self, relative_path: &Path) -> String;

    /// Extract declarations and raw references from one file's text
    fn extract_file(&self, relative_path: &Path, source: &str) -> Result<FileExtraction>;
}

/// Project-relative path rendered with `/` separators on every platform.
pub fn relative_file_name(relative_path: &Path) -> String {
    relative_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Registry for managing language support plugins
pub struct LanguageRegistry {
    languages: Vec<Arc<dyn LanguageSupport>>,
}

impl LanguageRegistry {
    /// Create a new registry with default language support
    pub fn new() -> Self {
        let mut registry = Self::empty();

        // Register built-in languages
        registry.register(Arc::new(rust::RustLanguage::new()));
        registry.register(Arc::new(python::PythonLanguage::new()));

        registry
    }

    /// Create a registry without any languages
    pub fn empty() -> Self {
        Self {
            languages: Vec::new(),
        }
    }

    /// Register a language support plugin
    pub fn register(&mut self, language: Arc<dyn LanguageSupport>) {
        self.languages.push(language);
    }

    /// Get language support by ID
    pub fn get(&self, language_id: &str) -> Option<&Arc<dyn LanguageSupport>> {
        self.languages
            .iter()
            .find(|l| l.language_id().eq_ignore_ascii_case(language_id))
    }

    /// Get language support by file extension
    pub fn get_by_extension(&self, extension: &str) -> Option<&Arc<dyn LanguageSupport>> {
        let ext = if extension.starts_with('.') {
            extension.to_string()
        } else {
            format!(".{}", extension)
        };

        self.languages
            .iter()
            .find(|l| l.file_extensions().contains(&ext.as_str()))
    }

    /// List all supported languages
    pub fn list_languages(&self) -> &[Arc<dyn LanguageSupport>] {
        &self.languages
    }

    /// Pick the language with the most matching files among `files`.
    ///
    /// Ties go to the language registered first.
    pub fn detect<'p>(&self, files: impl IntoIterator<Item = &'p Path>) -> Option<&Arc<dyn LanguageSupport>> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for file in files {
            let Some(ext) = file.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if let Some(language) = self.get_by_extension(ext) {
                *counts.entry(language.language_id()).or_default() += 1;
            }
        }

        let mut best: Option<(&Arc<dyn LanguageSupport>, usize)> = None;
        for language in &self.languages {
            let count = counts.get(language.language_id()).copied().unwrap_or(0);
            if count > 0 && best.map_or(true, |(_, top)| count > top) {
                best = Some((language, count));
            }
        }
        best.map(|(language, _)| language)
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_empty_registry() {
        let registry = LanguageRegistry::empty();
        assert!(registry.list_languages().is_empty());
        assert!(registry.get("rust").is_none());
    }

    #[test]
    fn test_lookup_by_id_and_extension() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.get("Python").map(|l| l.language_id()), Some("python"));
        assert_eq!(registry.get_by_extension("rs").map(|l| l.language_id()), Some("rust"));
        assert_eq!(registry.get_by_extension(".py").map(|l| l.language_id()), Some("python"));
        assert!(registry.get_by_extension("java").is_none());
    }

    #[test]
    fn test_detect_majority_language() {
        let registry = LanguageRegistry::new();
        let files: Vec<PathBuf> = ["a.py", "b.py", "c.rs", "README.md"].iter().map(PathBuf::from).collect();
        let detected = registry.detect(files.iter().map(PathBuf::as_path));
        assert_eq!(detected.map(|l| l.language_id()), Some("python"));

        let none: Vec<PathBuf> = vec![PathBuf::from("notes.txt")];
        assert!(registry.detect(none.iter().map(PathBuf::as_path)).is_none());
    }

    #[test]
    fn test_relative_file_name_uses_forward_slashes() {
        let path: PathBuf = ["pkg", "sub", "mod.py"].iter().collect();
        assert_eq!(relative_file_name(&path), "pkg/sub/mod.py");
    }
}
