//! Persistence: SQLite project registry plus the JSON artifact cache

pub mod artifacts;
pub mod models;
pub mod sqlite;

use std::fs;

use anyhow::{Context, Result};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub use self::artifacts::ArtifactStore;
pub use self::models::{ProjectRecord, ProjectType};
pub use self::sqlite::Database;

use crate::core::config::StorageConfig;
use crate::core::model::Project;
use crate::core::projector::{self, ProjectedView, ViewKind};

/// Not-found and validation conditions callers need to tell apart
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("invalid project type '{0}' (expected local, upload or git)")]
    InvalidProjectType(String),
}

/// Project metadata and artifacts behind one handle
pub struct ProjectStore {
    db: Database,
    artifacts: ArtifactStore,
}

impl ProjectStore {
    /// Open the store described by `config`, creating what is missing
    pub fn open(config: &StorageConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", config.data_dir))?;
        if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let db = Database::open(&config.database)?;
        db.init_schema()?;
        Ok(Self::new(db, ArtifactStore::new(&config.data_dir)))
    }

    pub fn new(db: Database, artifacts: ArtifactStore) -> Self {
        Self { db, artifacts }
    }

    /// Record a freshly parsed project and write its base artifacts
    pub fn register(&self, project: &Project, project_type: ProjectType) -> Result<ProjectRecord> {
        let record = ProjectRecord {
            id: Uuid::new_v4().to_string(),
            name: project.name.clone(),
            path: project.root_path.clone(),
            project_type,
            timestamp: Utc::now(),
            language: project.language.clone(),
        };

        let graph = projector::project_to_flat_view(project);
        self.artifacts.write_json(&record.id, artifacts::PROJECT_FILE, project)?;
        self.artifacts
            .write_json(&record.id, &artifacts::view_file(ViewKind::Graph), &graph)?;
        self.artifacts
            .write_json(&record.id, &artifacts::language_graph_file(&project.language), &graph)?;
        self.db.insert_project(&record)?;

        info!("Registered project '{}' as {}", record.name, record.id);
        Ok(record)
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectRecord>> {
        self.db.list_projects()
    }

    pub fn get_project(&self, id: &str) -> Result<ProjectRecord> {
        self.db
            .get_project(id)?
            .ok_or_else(|| StorageError::ProjectNotFound(id.to_string()).into())
    }

    /// The assembled project as stored at registration
    pub fn load_project(&self, id: &str) -> Result<Project> {
        self.get_project(id)?;
        self.artifacts.read_json(id, artifacts::PROJECT_FILE)
    }

    /// A view of the project, rendered on first request and cached after
    pub fn load_view(&self, id: &str, kind: ViewKind) -> Result<ProjectedView> {
        self.get_project(id)?;
        let file_name = artifacts::view_file(kind);
        if self.artifacts.exists(id, &file_name) {
            debug!("Serving cached {} view for {}", kind, id);
            return self.artifacts.read_json(id, &file_name);
        }

        let project: Project = self.artifacts.read_json(id, artifacts::PROJECT_FILE)?;
        let view = projector::project_view(&project, kind);
        self.artifacts.write_json(id, &file_name, &view)?;
        Ok(view)
    }

    pub fn delete_project(&self, id: &str) -> Result<()> {
        if !self.db.delete_project(id)? {
            return Err(StorageError::ProjectNotFound(id.to_string()).into());
        }
        self.artifacts.remove_project(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{DeclarationNode, NodeKind};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ProjectStore {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();
        ProjectStore::new(db, ArtifactStore::new(dir.path()))
    }

    fn sample_project() -> Project {
        Project {
            name: "demo".to_string(),
            root_path: "/work/demo".to_string(),
            language: "python".to_string(),
            nodes: vec![
                DeclarationNode::new(NodeKind::Module, "app", "", "app.py", 1),
                DeclarationNode::new(NodeKind::Function, "main", "app", "app.py", 3),
            ],
            edges: Vec::new(),
        }
    }

    #[test]
    fn test_register_writes_base_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let record = store.register(&sample_project(), ProjectType::Local).unwrap();
        assert_eq!(record.language, "python");
        assert!(Uuid::parse_str(&record.id).is_ok());

        let project_dir = dir.path().join(&record.id);
        assert!(project_dir.join("project-data.json").is_file());
        assert!(project_dir.join("graph-data.json").is_file());
        assert!(project_dir.join("graph-data-python.json").is_file());

        assert_eq!(store.load_project(&record.id).unwrap(), sample_project());
        assert_eq!(store.list_projects().unwrap(), vec![record]);
    }

    #[test]
    fn test_views_are_cached_on_first_request() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let record = store.register(&sample_project(), ProjectType::Upload).unwrap();

        let first = store.load_view(&record.id, ViewKind::Hierarchy).unwrap();
        assert!(dir.path().join(&record.id).join("hierarchy-data.json").is_file());
        let second = store.load_view(&record.id, ViewKind::Hierarchy).unwrap();
        assert_eq!(first, second);

        match store.load_view(&record.id, ViewKind::Modules).unwrap() {
            ProjectedView::Graph(view) => assert_eq!(view.nodes.len(), 1),
            ProjectedView::Tree(_) => panic!("modules view should be a graph"),
        }
    }

    #[test]
    fn test_unknown_project_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let err = store.load_view("nope", ViewKind::Graph).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::ProjectNotFound(_))
        ));
        assert!(store.delete_project("nope").is_err());
    }

    #[test]
    fn test_delete_removes_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let record = store.register(&sample_project(), ProjectType::Git).unwrap();

        store.delete_project(&record.id).unwrap();
        assert!(!dir.path().join(&record.id).exists());
        assert!(store.get_project(&record.id).is_err());
    }
}
