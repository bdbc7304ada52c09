use crate::auth::CurrentUser;
use crate::task::{Task, TaskService};
use crate::web::api::{ApiError, ErrorResponse};
use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get},
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone)]
pub struct TaskState {
    pub db: Arc<sea_orm::DatabaseConnection>,
}

/// JSON representation of a Task for API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaskJson {
    /// Unique identifier for the task
    pub id: u32,
    /// Identity of the owning user
    pub owner: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Task> for TaskJson {
    fn from(task: Task) -> Self {
        Self {
            id: task.id(),
            owner: task.owner().to_string(),
            title: task.title().to_string(),
            description: task.description().map(str::to_string),
            created_at: task.created_at(),
        }
    }
}

/// Payload for creating a task. The owner always comes from the session token;
/// unknown fields such as `owner` are ignored.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Query parameters for listing tasks.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TasksQuery {
    /// Optional case-insensitive title filter
    #[serde(default)]
    pub search: Option<String>,
}

/// Empty body returned after a successful delete.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteTaskResponse {}

/// Handler for POST /api/tasks
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 200, description = "Task created", body = TaskJson),
        (status = 400, description = "Invalid task", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("auth_token" = [])),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    user: CurrentUser,
    WithRejection(Json(payload), _): WithRejection<Json<CreateTaskRequest>, ApiError>,
) -> Result<Json<TaskJson>, ApiError> {
    let service = TaskService::new(&state.db);
    let task = service
        .create(
            &user.identity,
            &payload.title,
            payload.description.as_deref(),
        )
        .await?;
    Ok(Json(TaskJson::from(task)))
}

/// Handler for GET /api/tasks
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/tasks",
    params(TasksQuery),
    responses(
        (status = 200, description = "Tasks owned by the caller, newest first", body = [TaskJson]),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("auth_token" = [])),
    tag = "Tasks"
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<TaskState>>,
    user: CurrentUser,
    Query(query): Query<TasksQuery>,
) -> Result<Json<Vec<TaskJson>>, ApiError> {
    let service = TaskService::new(&state.db);
    let tasks = match query.search {
        Some(search) => service.search_for_owner(&user.identity, &search).await?,
        None => service.list_for_owner(&user.identity).await?,
    };
    Ok(Json(tasks.into_iter().map(TaskJson::from).collect()))
}

/// Handler for DELETE /api/tasks/{id}
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = u32, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted", body = DeleteTaskResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "No such task owned by the caller", body = ErrorResponse)
    ),
    security(("auth_token" = [])),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    user: CurrentUser,
    WithRejection(Path(id), _): WithRejection<Path<u32>, ApiError>,
) -> Result<Json<DeleteTaskResponse>, ApiError> {
    let service = TaskService::new(&state.db);
    service.delete_by_id(&user.identity, id).await?;
    Ok(Json(DeleteTaskResponse {}))
}

/// Creates and returns the tasks API router.
pub fn create_api_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks_handler).post(create_task_handler))
        .route("/tasks/{id}", delete(delete_task_handler))
        .with_state(state)
}
