//! HTTP request handlers

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use crate::core;
use crate::core::model::Project;
use crate::core::projector::ViewKind;
use crate::storage::{ProjectRecord, ProjectType, StorageError};

// ==================== Response Types ====================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ProjectResponse {
    #[serde(flatten)]
    pub record: ProjectRecord,
    pub node_count: usize,
    pub edge_count: usize,
}

impl ProjectResponse {
    fn new(record: ProjectRecord, project: &Project) -> Self {
        Self {
            record,
            node_count: project.nodes.len(),
            edge_count: project.edges.len(),
        }
    }
}

#[derive(Serialize)]
pub struct LanguageInfo {
    pub id: String,
    pub extensions: Vec<String>,
}

// ==================== Request Types ====================

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    /// Directory already materialized on disk
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Language tag; detected from the files when absent
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, rename = "type")]
    pub project_type: Option<String>,
}

// ==================== Errors ====================

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: &str, message: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
}

/// Map store failures, turning not-found conditions into 404
fn storage_error(err: anyhow::Error) -> ApiError {
    let (status, error) = match err.downcast_ref::<StorageError>() {
        Some(StorageError::ProjectNotFound(_)) | Some(StorageError::ArtifactNotFound(_)) => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        Some(StorageError::InvalidProjectType(_)) => (StatusCode::BAD_REQUEST, "invalid_request"),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
    };
    api_error(status, error, format!("{:#}", err))
}

// ==================== Handlers ====================

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List supported languages
pub async fn list_languages(State(state): State<Arc<AppState>>) -> Json<Vec<LanguageInfo>> {
    let languages: Vec<LanguageInfo> = state
        .registry
        .list_languages()
        .iter()
        .map(|l| LanguageInfo {
            id: l.language_id().to_string(),
            extensions: l.file_extensions().iter().map(|s| s.to_string()).collect(),
        })
        .collect();

    Json(languages)
}

/// List all projects
pub async fn list_projects(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.lock().await;
    let projects = store.list_projects().map_err(storage_error)?;
    Ok(Json(projects))
}

/// Parse a directory and register it as a project
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project_type = match req.project_type.as_deref() {
        Some(value) => value
            .parse::<ProjectType>()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, "invalid_request", e))?,
        None => ProjectType::Local,
    };

    let root = PathBuf::from(&req.path);
    if !root.is_dir() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "invalid_path",
            format!("Project path {:?} is not a directory", root),
        ));
    }

    info!("Parsing project at {:?}", root);
    let task_state = state.clone();
    let language = req.language.clone();
    let parsed = tokio::task::spawn_blocking(move || {
        core::parse_project_with(&task_state.registry, &root, language.as_deref(), &task_state.config)
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, "parse_error", e))?;

    let mut project = parsed.map_err(|e| {
        warn!("Parse failed: {:#}", e);
        api_error(StatusCode::UNPROCESSABLE_ENTITY, "parse_error", format!("{:#}", e))
    })?;
    if let Some(name) = req.name {
        project.name = name;
    }

    let store = state.store.lock().await;
    let record = store.register(&project, project_type).map_err(storage_error)?;

    Ok((StatusCode::CREATED, Json(ProjectResponse::new(record, &project))))
}

/// Get project metadata
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.lock().await;
    let record = store.get_project(&id).map_err(storage_error)?;
    Ok(Json(record))
}

/// Delete a project and its artifacts
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.lock().await;
    store.delete_project(&id).map_err(storage_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Render (or serve the cached copy of) one view of a project
pub async fn get_view(
    State(state): State<Arc<AppState>>,
    Path((id, view)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = view
        .parse::<ViewKind>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "invalid_view", e))?;

    let store = state.store.lock().await;
    let view = store.load_view(&id, kind).map_err(storage_error)?;
    Ok(Json(view))
}
