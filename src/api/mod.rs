//! Read-only task query API
//!
//! Observability surface over the task store: recent task records for
//! dashboard consumption plus a liveness probe. Strictly read-only; the
//! scheduler is never driven from here.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::domain::Task;
use crate::error::Result;
use crate::persistence::TaskStore;

/// Shared state for the query API
pub struct ApiState {
    pub store: Arc<dyn TaskStore>,
    pub started_at: DateTime<Utc>,
    /// Hard cap on one response's record count
    pub max_limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub limit: Option<usize>,
    /// Restrict to tasks in a non-terminal status
    pub active: Option<bool>,
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: i64,
}

pub fn create_router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/:id", get(get_task))
        .route("/health", get(health))
        .with_state(state)
        .layer(cors)
}

/// Bind and serve until shutdown is signalled
pub async fn serve(
    state: Arc<ApiState>,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let router = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Task query API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}

async fn list_tasks(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<TaskQuery>,
) -> impl IntoResponse {
    let result = if query.active.unwrap_or(false) {
        state.store.get_active_tasks().await
    } else {
        let begin = query
            .begin
            .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_else(Utc::now));
        state.store.get_all_tasks(begin, query.end).await
    };

    match result {
        Ok(mut tasks) => {
            // Most recent first for dashboard consumption
            tasks.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(a.id.cmp(&b.id)));
            let limit = query.limit.unwrap_or(state.max_limit).min(state.max_limit);
            tasks.truncate(limit);
            let total = tasks.len();
            (StatusCode::OK, Json(TaskListResponse { tasks, total })).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn get_task(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_task(&id).await {
        Ok(Some(task)) => (StatusCode::OK, Json(task)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("task {} not found", id) })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let now = Utc::now();
    Json(HealthResponse {
        status: "ok",
        timestamp: now,
        uptime_seconds: (now - state.started_at).num_seconds(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ResourceLock, TaskData};
    use crate::persistence::MemoryTaskStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn state_with_tasks(count: usize) -> Arc<ApiState> {
        let store = MemoryTaskStore::new();
        for i in 0..count {
            let task = Task::new(
                &format!("vault-sync-{}", i),
                vec![ResourceLock::vault(i as u64)],
                TaskData::Empty,
            );
            store.add_task(&task).await.unwrap();
        }
        Arc::new(ApiState {
            store: Arc::new(store),
            started_at: Utc::now(),
            max_limit: 500,
        })
    }

    #[tokio::test]
    async fn list_respects_the_limit() {
        let router = create_router(state_with_tasks(5).await);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/tasks?limit=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["tasks"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_task_is_a_404() {
        let router = create_router(state_with_tasks(0).await);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/tasks/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let router = create_router(state_with_tasks(0).await);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
