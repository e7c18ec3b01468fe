//! SQLite database implementation

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{ProjectRecord, ProjectType};

/// SQLite database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("Failed to open database: {:?}", path))?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Initialize the database schema
    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                path TEXT NOT NULL,
                type TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                language TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_projects_timestamp ON projects(timestamp);
            "#,
        )?;

        Ok(())
    }

    /// Insert a new project
    pub fn insert_project(&self, project: &ProjectRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO projects (id, name, path, type, timestamp, language) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    project.id,
                    project.name,
                    project.path,
                    project.project_type.as_str(),
                    project.timestamp.to_rfc3339(),
                    project.language
                ],
            )
            .with_context(|| format!("Failed to insert project {}", project.id))?;
        Ok(())
    }

    /// Get a project by id
    pub fn get_project(&self, id: &str) -> Result<Option<ProjectRecord>> {
        self.conn
            .query_row(
                "SELECT id, name, path, type, timestamp, language FROM projects WHERE id = ?1",
                params![id],
                row_to_project,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all projects, newest first
    pub fn list_projects(&self) -> Result<Vec<ProjectRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, path, type, timestamp, language FROM projects ORDER BY timestamp DESC, id",
        )?;
        let projects = stmt
            .query_map([], row_to_project)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    /// Delete a project, returning whether it existed
    pub fn delete_project(&self, id: &str) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<ProjectRecord> {
    let project_type: String = row.get(3)?;
    let timestamp: String = row.get(4)?;
    Ok(ProjectRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        project_type: project_type
            .parse::<ProjectType>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?
            .with_timezone(&Utc),
        language: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, minutes_ago: i64) -> ProjectRecord {
        ProjectRecord {
            id: id.to_string(),
            name: format!("project-{}", id),
            path: format!("/work/{}", id),
            project_type: ProjectType::Local,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            language: "python".to_string(),
        }
    }

    #[test]
    fn test_insert_and_get_project() {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();

        let project = record("a", 0);
        db.insert_project(&project).unwrap();

        let loaded = db.get_project("a").unwrap().unwrap();
        assert_eq!(loaded.name, "project-a");
        assert_eq!(loaded.project_type, ProjectType::Local);
        assert_eq!(loaded.timestamp.timestamp(), project.timestamp.timestamp());
        assert!(db.get_project("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_projects_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();
        db.insert_project(&record("old", 30)).unwrap();
        db.insert_project(&record("new", 1)).unwrap();

        let ids: Vec<String> = db.list_projects().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_delete_project() {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();
        db.insert_project(&record("a", 0)).unwrap();

        assert!(db.delete_project("a").unwrap());
        assert!(!db.delete_project("a").unwrap());
        assert!(db.list_projects().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();
        db.insert_project(&record("a", 0)).unwrap();
        assert!(db.insert_project(&record("a", 0)).is_err());
    }
}
