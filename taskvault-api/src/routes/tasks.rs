/// Task endpoints
///
/// - `POST /api/v1/tasks` - Create a task owned by the caller
/// - `GET /api/v1/tasks` - List tasks (admins see all, members their own)
/// - `GET /api/v1/tasks/:id` - Read a task (owner or admin)
/// - `PUT /api/v1/tasks/:id` - Partially update a task (owner or admin)
/// - `DELETE /api/v1/tasks/:id` - Delete a task (owner or admin)
///
/// The `security_code` is encrypted before it reaches the database and
/// decrypted just before a response is built. Cache entries hold the
/// encrypted form.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiResult},
    response::ApiResponse,
    routes::{deny, parse_id, CreatedId},
};
use axum::extract::{Extension, Path, State};
use serde::Deserialize;
use taskvault_shared::{
    auth::{authorization::authorize_task, middleware::AuthContext},
    crypto,
    models::task::{CreateTask, Task, TaskStatus, TaskView, UpdateTask},
};
use validator::Validate;

const INVALID_TASK_ID: &str = "Invalid task ID";
const TASK_NOT_FOUND: &str = "Task not found";

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    /// One of `pending`, `in_progress`, `completed`
    pub status: TaskStatus,

    /// Plaintext; encrypted before storage, empty when absent
    #[serde(default)]
    pub security_code: String,
}

/// Partial task update; absent or empty text fields keep their value
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,

    /// Plaintext replacement for the security code
    pub security_code: Option<String>,
}

/// Create a task
///
/// # Response
///
/// ```json
/// { "message": "Task created successfully", "success": true, "status": 201, "data": { "id": 7 } }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body, missing field or unknown status
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> ApiResult<ApiResponse<CreatedId>> {
    req.validate()?;

    let sealed = crypto::encrypt(&req.security_code, state.encryption_key())?;

    let task = Task::create(
        &state.db,
        CreateTask {
            user_id: auth.user_id,
            title: req.title,
            description: req.description,
            status: req.status,
            security_code: Some(sealed),
        },
    )
    .await?;

    tracing::info!(target: "audit", user_id = auth.user_id, task_id = task.id, "Task created");
    Ok(ApiResponse::created(
        "Task created successfully",
        CreatedId { id: task.id },
    ))
}

/// List tasks visible to the caller
///
/// Every returned task is written to the cache. Unlike single reads, a
/// cache failure here fails the request.
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Vec<TaskView>>> {
    let tasks = if auth.is_admin() {
        Task::list_all(&state.db).await?
    } else {
        Task::list_by_owner(&state.db, auth.user_id).await?
    };

    state.cache.store_all(&tasks).await?;

    let key = state.encryption_key();
    let views = tasks
        .into_iter()
        .map(|task| task.reveal(key))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(target: "audit", user_id = auth.user_id, count = views.len(), "Tasks listed");
    Ok(ApiResponse::ok("Tasks fetched successfully", views))
}

/// Get one task
///
/// Ownership is checked on the fetched task, whether it came from the cache
/// or the database.
///
/// # Errors
///
/// - `400 Bad Request`: Non-numeric id
/// - `403 Forbidden`: Neither owner nor admin
/// - `404 Not Found`: No such task
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<TaskView>> {
    let id = parse_id(&id, INVALID_TASK_ID)?;

    let fetched = state
        .cache
        .get(id, || Task::find_by_id(&state.db, id))
        .await
        .ok_or_else(|| ApiError::NotFound(TASK_NOT_FOUND.to_string()))?;

    authorize_task(&auth, fetched.value.user_id).map_err(|e| deny(&auth, e, "Forbidden"))?;

    let message = if fetched.from_cache() {
        "Task found (from cache)"
    } else {
        "Task found"
    };
    let view = fetched.value.reveal(state.encryption_key())?;

    tracing::info!(target: "audit", user_id = auth.user_id, task_id = id, "Task read");
    Ok(ApiResponse::ok(message, view))
}

/// Update a task
///
/// Checks run in order: id, existence, ownership, body. A new security code
/// is encrypted; the refreshed task replaces the cache entry.
///
/// # Errors
///
/// - `400 Bad Request`: Non-numeric id, malformed body or unknown status
/// - `403 Forbidden`: Neither owner nor admin
/// - `404 Not Found`: No such task
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    body: Result<ApiJson<UpdateTaskRequest>, ApiError>,
) -> ApiResult<ApiResponse<TaskView>> {
    let id = parse_id(&id, INVALID_TASK_ID)?;

    let owner = Task::find_owner(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(TASK_NOT_FOUND.to_string()))?;
    authorize_task(&auth, owner)
        .map_err(|e| deny(&auth, e, "You don't have permission to update this task"))?;

    let ApiJson(req) = body?;

    let security_code = match req.security_code.as_deref() {
        Some(plain) => Some(crypto::encrypt(plain, state.encryption_key())?),
        None => None,
    };

    let changes = UpdateTask {
        title: req.title,
        description: req.description,
        status: req.status,
        security_code,
    };

    let task = state
        .cache
        .put(async {
            Task::update(&state.db, id, changes)
                .await
                .map_err(ApiError::from)?
                .ok_or_else(|| ApiError::NotFound(TASK_NOT_FOUND.to_string()))
        })
        .await?;

    let view = task.reveal(state.encryption_key())?;

    tracing::info!(target: "audit", user_id = auth.user_id, task_id = id, "Task updated");
    Ok(ApiResponse::ok("Task updated successfully", view))
}

/// Delete a task
///
/// # Errors
///
/// - `400 Bad Request`: Non-numeric id
/// - `403 Forbidden`: Neither owner nor admin
/// - `404 Not Found`: No such task
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let id = parse_id(&id, INVALID_TASK_ID)?;

    let owner = Task::find_owner(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(TASK_NOT_FOUND.to_string()))?;
    authorize_task(&auth, owner).map_err(|e| deny(&auth, e, "Forbidden"))?;

    if !Task::delete(&state.db, id).await? {
        return Err(ApiError::NotFound(TASK_NOT_FOUND.to_string()));
    }

    state.cache.invalidate::<Task>(id).await;

    tracing::info!(target: "audit", user_id = auth.user_id, task_id = id, "Task deleted");
    Ok(ApiResponse::message("Task deleted successfully"))
}
