//! HTTP server exposing the board as a JSON API.
//!
//! The caller identity arrives in the `x-user-id` header, set by whatever
//! authentication proxy sits in front of this process.

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request, State, rejection::JsonRejection,
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::board::{BoardService, MoveRequest};
use crate::error::{BoardError, BoardResult, ErrorCategory};
use crate::types::{
    BoardStats, BoardView, Column, ColumnInput, Comment, HistoryEvent, NewTask, SubtaskPatch,
    Task, TaskPatch,
};

/// Header carrying the authenticated user id.
pub const USER_HEADER: &str = "x-user-id";

/// Authenticated caller.
#[derive(Debug, Clone)]
pub struct UserId(pub String);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = BoardError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| UserId(v.to_string()))
            .ok_or_else(BoardError::unauthenticated)
    }
}

/// JSON request body. Malformed payloads are reported as board errors.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = BoardError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

impl From<JsonRejection> for BoardError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                BoardError::invalid_value("body", "Expected Content-Type: application/json")
            }
            other => BoardError::invalid_value("body", &other.body_text()),
        }
    }
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        let status = match self.category() {
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCategory::Persistence => {
                error!(code = ?self.code, message = %self.message, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// Board and columns

async fn get_board(
    State(service): State<BoardService>,
    UserId(user): UserId,
) -> BoardResult<Json<BoardView>> {
    Ok(Json(service.board(&user)?))
}

async fn list_columns(
    State(service): State<BoardService>,
    UserId(user): UserId,
) -> BoardResult<Json<Vec<Column>>> {
    Ok(Json(service.columns(&user)?))
}

async fn create_column(
    State(service): State<BoardService>,
    UserId(user): UserId,
    JsonBody(input): JsonBody<ColumnInput>,
) -> BoardResult<(StatusCode, Json<Column>)> {
    let column = service.create_column(&user, input)?;
    Ok((StatusCode::CREATED, Json(column)))
}

async fn update_column(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(column_id): Path<String>,
    JsonBody(input): JsonBody<ColumnInput>,
) -> BoardResult<Json<Column>> {
    Ok(Json(service.update_column(&user, &column_id, input)?))
}

async fn delete_column(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(column_id): Path<String>,
) -> BoardResult<StatusCode> {
    service.delete_column(&user, &column_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderBody {
    #[serde(default)]
    task_ids: Option<Vec<String>>,
}

async fn reorder_column(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(column_id): Path<String>,
    JsonBody(body): JsonBody<ReorderBody>,
) -> BoardResult<Json<Vec<Task>>> {
    let task_ids = body
        .task_ids
        .ok_or_else(|| BoardError::missing_field("taskIds"))?;
    Ok(Json(service.reorder_column(&user, &column_id, &task_ids)?))
}

// Tasks

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    #[serde(default)]
    include_archived: bool,
}

async fn list_tasks(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Query(params): Query<ListParams>,
) -> BoardResult<Json<Vec<Task>>> {
    Ok(Json(service.list_tasks(&user, params.include_archived)?))
}

async fn create_task(
    State(service): State<BoardService>,
    UserId(user): UserId,
    JsonBody(input): JsonBody<NewTask>,
) -> BoardResult<(StatusCode, Json<Task>)> {
    let task = service.create_task(&user, input)?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(task_id): Path<String>,
) -> BoardResult<Json<Task>> {
    Ok(Json(service.get_task(&user, &task_id)?))
}

async fn update_task(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(task_id): Path<String>,
    JsonBody(patch): JsonBody<TaskPatch>,
) -> BoardResult<Json<Task>> {
    Ok(Json(service.update_task(&user, &task_id, patch)?))
}

async fn delete_task(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(task_id): Path<String>,
) -> BoardResult<StatusCode> {
    service.delete_task(&user, &task_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn move_task(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(task_id): Path<String>,
    JsonBody(request): JsonBody<MoveRequest>,
) -> BoardResult<Json<Task>> {
    Ok(Json(service.move_task(&user, &task_id, request)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendMoveBody {
    #[serde(default)]
    target_column_id: Option<String>,
}

async fn move_to_column(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(task_id): Path<String>,
    JsonBody(body): JsonBody<AppendMoveBody>,
) -> BoardResult<Json<Task>> {
    let task = service.move_to_column(&user, &task_id, body.target_column_id.as_deref())?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
struct ArchiveBody {
    #[serde(default)]
    archived: Option<bool>,
}

async fn archive_task(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(task_id): Path<String>,
    JsonBody(body): JsonBody<ArchiveBody>,
) -> BoardResult<Json<Task>> {
    let archived = body
        .archived
        .ok_or_else(|| BoardError::missing_field("archived"))?;
    Ok(Json(service.set_archived(&user, &task_id, archived)?))
}

#[derive(Debug, Default, Deserialize)]
struct HistoryParams {
    /// `asc` for oldest first; newest first otherwise.
    #[serde(default)]
    order: Option<String>,
}

async fn task_history(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(task_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> BoardResult<Json<Vec<HistoryEvent>>> {
    let newest_first = !matches!(params.order.as_deref(), Some("asc"));
    Ok(Json(service.history(&user, &task_id, newest_first)?))
}

// Subtasks

#[derive(Debug, Deserialize)]
struct SubtaskBody {
    #[serde(default)]
    title: Option<String>,
}

async fn add_subtask(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(task_id): Path<String>,
    JsonBody(body): JsonBody<SubtaskBody>,
) -> BoardResult<(StatusCode, Json<Task>)> {
    let task = service.add_subtask(&user, &task_id, body.title.as_deref())?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_subtask(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path((task_id, subtask_id)): Path<(String, String)>,
    JsonBody(patch): JsonBody<SubtaskPatch>,
) -> BoardResult<Json<Task>> {
    Ok(Json(service.update_subtask(&user, &task_id, &subtask_id, patch)?))
}

async fn delete_subtask(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path((task_id, subtask_id)): Path<(String, String)>,
) -> BoardResult<Json<Task>> {
    Ok(Json(service.delete_subtask(&user, &task_id, &subtask_id)?))
}

// Comments

#[derive(Debug, Deserialize)]
struct CommentBody {
    #[serde(default)]
    content: Option<String>,
}

async fn list_comments(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(task_id): Path<String>,
) -> BoardResult<Json<Vec<Comment>>> {
    Ok(Json(service.comments(&user, &task_id)?))
}

async fn add_comment(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(task_id): Path<String>,
    JsonBody(body): JsonBody<CommentBody>,
) -> BoardResult<(StatusCode, Json<Comment>)> {
    let comment = service.add_comment(&user, &task_id, body.content.as_deref())?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn update_comment(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(comment_id): Path<String>,
    JsonBody(body): JsonBody<CommentBody>,
) -> BoardResult<Json<Comment>> {
    let comment = service.update_comment(&user, &comment_id, body.content.as_deref())?;
    Ok(Json(comment))
}

async fn delete_comment(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(comment_id): Path<String>,
) -> BoardResult<StatusCode> {
    service.delete_comment(&user, &comment_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// Dependencies

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependencyBody {
    #[serde(default)]
    blocker_id: Option<String>,
}

async fn add_dependency(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path(task_id): Path<String>,
    JsonBody(body): JsonBody<DependencyBody>,
) -> BoardResult<Json<Task>> {
    let task = service.add_dependency(&user, &task_id, body.blocker_id.as_deref())?;
    Ok(Json(task))
}

async fn remove_dependency(
    State(service): State<BoardService>,
    UserId(user): UserId,
    Path((task_id, blocker_id)): Path<(String, String)>,
) -> BoardResult<Json<Task>> {
    Ok(Json(service.remove_dependency(&user, &task_id, &blocker_id)?))
}

// Reporting

async fn board_stats(
    State(service): State<BoardService>,
    UserId(user): UserId,
) -> BoardResult<Json<BoardStats>> {
    Ok(Json(service.stats(&user)?))
}

/// Build the API router.
pub fn build_router(service: BoardService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/board", get(get_board))
        .route("/api/stats", get(board_stats))
        // Columns
        .route("/api/columns", get(list_columns).post(create_column))
        .route(
            "/api/columns/{column_id}",
            patch(update_column).delete(delete_column),
        )
        .route("/api/columns/{column_id}/order", put(reorder_column))
        // Tasks
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{task_id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/api/tasks/{task_id}/position", patch(move_task))
        .route("/api/tasks/{task_id}/move", post(move_to_column))
        .route("/api/tasks/{task_id}/archive", post(archive_task))
        .route("/api/tasks/{task_id}/history", get(task_history))
        .route("/api/tasks/{task_id}/subtasks", post(add_subtask))
        .route(
            "/api/tasks/{task_id}/subtasks/{subtask_id}",
            patch(update_subtask).delete(delete_subtask),
        )
        .route(
            "/api/tasks/{task_id}/comments",
            get(list_comments).post(add_comment),
        )
        .route(
            "/api/comments/{comment_id}",
            patch(update_comment).delete(delete_comment),
        )
        .route("/api/tasks/{task_id}/dependencies", post(add_dependency))
        .route(
            "/api/tasks/{task_id}/dependencies/{blocker_id}",
            axum::routing::delete(remove_dependency),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

/// A running API server.
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ApiHandle {
    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("API server task failed: {}", e);
        }
    }
}

/// Bind and serve the API in the background.
pub async fn start_server(service: BoardService, bind: &str, port: u16) -> anyhow::Result<ApiHandle> {
    let app = build_router(service);

    let listener = tokio::net::TcpListener::bind((bind, port)).await?;
    let addr = listener.local_addr()?;

    info!("Board API listening on http://{}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Board API shutting down");
            })
            .await
        {
            error!("Board API server error: {}", e);
        }
    });

    Ok(ApiHandle {
        addr,
        shutdown_tx,
        task,
    })
}
