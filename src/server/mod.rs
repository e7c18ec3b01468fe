//! HTTP server for the CodeViz service

mod handlers;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::Router;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::core::config::{Config, ServerConfig};
use crate::languages::LanguageRegistry;
use crate::storage::ProjectStore;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub registry: LanguageRegistry,
    pub store: Mutex<ProjectStore>,
}

impl AppState {
    pub fn new(config: Config, store: ProjectStore) -> Self {
        Self {
            config,
            registry: LanguageRegistry::new(),
            store: Mutex::new(store),
        }
    }
}

/// Build the application router around `state`
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server);
    let router = Router::new().merge(routes::api_routes());

    let router = match cors {
        Some(cors) => router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors)),
        None => router.layer(TraceLayer::new_for_http()),
    };
    router.with_state(state)
}

fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if !config.cors_enabled {
        return None;
    }

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_origins.iter().any(|o| o == "*") {
        return Some(layer.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    Some(layer.allow_origin(AllowOrigin::list(origins)))
}

/// Run the HTTP server
pub async fn run_server(config: Config) -> Result<()> {
    let store = ProjectStore::open(&config.storage)?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let state = Arc::new(AppState::new(config, store));
    let app = app(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ArtifactStore, Database};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_app(data: &TempDir) -> Router {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();
        let store = ProjectStore::new(db, ArtifactStore::new(data.path()));
        app(Arc::new(AppState::new(Config::default(), store)))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_languages() {
        let data = TempDir::new().unwrap();
        let app = test_app(&data);

        let (status, body) = send(&app, get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, get("/api/v1/languages")).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["id"].as_str().unwrap())
            .collect();
        assert!(ids.contains(&"rust"));
        assert!(ids.contains(&"python"));
    }

    #[tokio::test]
    async fn test_unknown_project_is_404() {
        let data = TempDir::new().unwrap();
        let app = test_app(&data);

        let (status, body) = send(&app, get("/api/v1/projects/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, _) = send(&app, get("/api/v1/projects/missing/views/graph")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_project_then_fetch_views() {
        let data = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        fs::write(
            source.path().join("app.py"),
            "def helper():\n    pass\n\ndef main():\n    helper()\n",
        )
        .unwrap();
        let app = test_app(&data);

        let request = serde_json::json!({
            "path": source.path().to_string_lossy(),
            "name": "demo",
            "type": "upload",
        });
        let (status, body) = send(&app, post_json("/api/v1/projects", request)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "demo");
        assert_eq!(body["type"], "upload");
        assert_eq!(body["language"], "python");
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, get(&format!("/api/v1/projects/{}/views/calls", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["links"].as_array().unwrap().len(), 1);

        let (status, body) = send(&app, get(&format!("/api/v1/projects/{}/views/hierarchy", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "demo");

        let (status, body) = send(&app, get("/api/v1/projects")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let data = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("lib.rs"), "fn f() {}\n").unwrap();
        let app = test_app(&data);

        let bad_type = serde_json::json!({ "path": source.path().to_string_lossy(), "type": "ftp" });
        let (status, _) = send(&app, post_json("/api/v1/projects", bad_type)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let bad_path = serde_json::json!({ "path": source.path().join("absent").to_string_lossy() });
        let (status, body) = send(&app, post_json("/api/v1/projects", bad_path)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_path");

        let created = serde_json::json!({ "path": source.path().to_string_lossy() });
        let (_, body) = send(&app, post_json("/api/v1/projects", created)).await;
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, get(&format!("/api/v1/projects/{}/views/treemap", id))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_view");
    }

    #[tokio::test]
    async fn test_delete_project() {
        let data = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("lib.rs"), "fn f() {}\n").unwrap();
        let app = test_app(&data);

        let created = serde_json::json!({ "path": source.path().to_string_lossy() });
        let (_, body) = send(&app, post_json("/api/v1/projects", created)).await;
        let id = body["id"].as_str().unwrap().to_string();

        let delete = Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/projects/{}", id))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, get(&format!("/api/v1/projects/{}", id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
