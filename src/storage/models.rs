//! Data models for the project metadata store

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StorageError;

/// How a project's source tree reached the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Local,
    Upload,
    Git,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Local => "local",
            ProjectType::Upload => "upload",
            ProjectType::Git => "git",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(ProjectType::Local),
            "upload" => Ok(ProjectType::Upload),
            "git" => Ok(ProjectType::Git),
            other => Err(StorageError::InvalidProjectType(other.to_string())),
        }
    }
}

/// Project record in the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// UUID v4
    pub id: String,
    pub name: String,
    /// Root directory the graph was built from
    pub path: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub timestamp: DateTime<Utc>,
    pub language: String,
}
