//! JSON artifact cache, one directory per project

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::StorageError;
use crate::core::projector::ViewKind;

/// The assembled project
pub const PROJECT_FILE: &str = "project-data.json";

/// Cache file of a rendered view
pub fn view_file(kind: ViewKind) -> String {
    format!("{}-data.json", kind)
}

/// Flat graph of one language's parse
pub fn language_graph_file(language: &str) -> String {
    format!("graph-data-{}.json", language)
}

/// Artifact files stored under `<data_dir>/<project id>/`
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn project_dir(&self, project_id: &str) -> PathBuf {
        self.root.join(project_id)
    }

    pub fn exists(&self, project_id: &str, file_name: &str) -> bool {
        self.project_dir(project_id).join(file_name).is_file()
    }

    /// Serialize `value` to `<project>/<file_name>`
    pub fn write_json<T: Serialize>(&self, project_id: &str, file_name: &str, value: &T) -> Result<PathBuf> {
        let dir = self.project_dir(project_id);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create artifact directory {:?}", dir))?;

        let path = dir.join(file_name);
        let content = serde_json::to_vec(value)?;
        fs::write(&path, content).with_context(|| format!("Failed to write artifact {:?}", path))?;
        debug!("Wrote artifact {:?}", path);
        Ok(path)
    }

    /// Read `<project>/<file_name>`, failing with [`StorageError::ArtifactNotFound`]
    /// when it is absent
    pub fn read_json<T: DeserializeOwned>(&self, project_id: &str, file_name: &str) -> Result<T> {
        let path = self.project_dir(project_id).join(file_name);
        if !path.is_file() {
            return Err(StorageError::ArtifactNotFound(format!("{}/{}", project_id, file_name)).into());
        }
        let content = fs::read(&path).with_context(|| format!("Failed to read artifact {:?}", path))?;
        let value = serde_json::from_slice(&content).with_context(|| format!("Corrupt artifact {:?}", path))?;
        Ok(value)
    }

    /// Remove every artifact of a project
    pub fn remove_project(&self, project_id: &str) -> Result<()> {
        let dir = self.project_dir(project_id);
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("Failed to remove {:?}", dir))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_names() {
        assert_eq!(view_file(ViewKind::Graph), "graph-data.json");
        assert_eq!(view_file(ViewKind::Modules), "modules-data.json");
        assert_eq!(language_graph_file("rust"), "graph-data-rust.json");
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        store.write_json("p1", "numbers.json", &vec![1, 2, 3]).unwrap();
        assert!(store.exists("p1", "numbers.json"));
        let numbers: Vec<u32> = store.read_json("p1", "numbers.json").unwrap();
        assert_eq!(numbers, vec![1, 2, 3]);

        store.remove_project("p1").unwrap();
        assert!(!store.project_dir("p1").exists());
    }

    #[test]
    fn test_missing_artifact_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let err = store.read_json::<Vec<u32>>("p1", "numbers.json").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::ArtifactNotFound(_))
        ));
    }
}
