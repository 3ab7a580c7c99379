//! HTTP surface over the access layer.
//!
//! Routes map one-to-one onto repository calls. Errors are returned as a JSON
//! body `{ "error": <code>, "message": <text> }`.

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

use quizdeck_core::{Group, GroupMember, Quiz};

use crate::access::{AccessError, Backend, QuizRepository};
use crate::ai::{AiError, GenerativeClient};
use crate::db::StoreError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    /// `None` when no AI endpoint is configured.
    pub ai: Option<Arc<GenerativeClient>>,
}

impl AppState {
    pub fn new(backend: Backend) -> Self {
        Self { backend, ai: None }
    }

    pub fn with_ai(mut self, client: GenerativeClient) -> Self {
        self.ai = Some(Arc::new(client));
        self
    }
}

/// Error body
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Errors returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    AiUnavailable,
    Access(AccessError),
    Ai(AiError),
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::GroupNotFound(gid) => {
                ApiError::NotFound(format!("Group not found: {}", gid))
            }
            AccessError::InvalidQuiz(e) => ApiError::BadRequest(format!("Invalid quiz: {}", e)),
            other => ApiError::Access(other),
        }
    }
}

impl From<AiError> for ApiError {
    fn from(e: AiError) -> Self {
        ApiError::Ai(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            ApiError::AiUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "No AI endpoint configured".to_string(),
            ),
            ApiError::Ai(AiError::InvalidRequest) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                AiError::InvalidRequest.to_string(),
            ),
            ApiError::Ai(e) => {
                tracing::warn!("AI request failed: {}", e);
                (StatusCode::BAD_GATEWAY, "upstream_error", e.to_string())
            }
            ApiError::Access(AccessError::Store(StoreError::Decode { collection, id, .. })) => {
                tracing::error!("Malformed {} document {}", collection, id);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    format!("Malformed {} document {}", collection, id),
                )
            }
            ApiError::Access(e) => {
                tracing::error!("Request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error, message })).into_response()
    }
}

/// Health check response
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

async fn create_quiz(
    State(state): State<AppState>,
    body: Result<Json<Quiz>, JsonRejection>,
) -> Result<(StatusCode, Json<Quiz>), ApiError> {
    let Json(quiz) = body?;
    state.backend.quizzes.create(&quiz).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

async fn get_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<String>,
) -> Result<Json<Quiz>, ApiError> {
    state
        .backend
        .quizzes
        .get(&quiz_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Quiz not found: {}", quiz_id)))
}

async fn delete_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.backend.quizzes.delete(&quiz_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Quiz not found: {}", quiz_id)))
    }
}

async fn list_user_quizzes(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<Vec<Quiz>>, ApiError> {
    Ok(Json(state.backend.quizzes.live_by_creator(&uid).await?))
}

async fn watch_user_quizzes(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Response {
    let quizzes = state.backend.quizzes.clone();
    ws.on_upgrade(move |socket| stream_quizzes(socket, quizzes, uid))
}

/// Pushes every snapshot of the subscription to the socket until either side
/// goes away.
async fn stream_quizzes(socket: WebSocket, quizzes: QuizRepository, uid: String) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let subscription = quizzes.subscribe_by_creator(uid.clone(), move |result| {
        // Receiver only goes away after the subscription is cancelled
        let _ = tx.send(result);
    });
    tracing::debug!("Quiz watch opened for {}", uid);

    loop {
        tokio::select! {
            Some(result) = rx.recv() => {
                let frame = match result {
                    Ok(quizzes) => serde_json::to_string(&quizzes),
                    Err(e) => serde_json::to_string(&json!({ "error": e.to_string() })),
                };
                let text = match frame {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("Failed to encode quiz snapshot: {}", e);
                        break;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    subscription.unsubscribe();
    tracing::debug!("Quiz watch closed for {}", uid);
}

#[derive(Serialize)]
struct CountResponse {
    count: u64,
}

async fn count_user_groups(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.backend.groups.get_total_groups(&uid).await?;
    Ok(Json(CountResponse { count }))
}

async fn get_group(
    State(state): State<AppState>,
    Path(gid): Path<String>,
) -> Result<Json<Group>, ApiError> {
    Ok(Json(state.backend.groups.get_group_data(&gid).await?))
}

async fn get_group_member(
    State(state): State<AppState>,
    Path((gid, uid)): Path<(String, String)>,
) -> Result<Json<GroupMember>, ApiError> {
    state
        .backend
        .groups
        .get_group_member_data(&gid, &uid)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{} is not a member of {}", uid, gid)))
}

async fn generate(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let client = state.ai.as_ref().ok_or(ApiError::AiUnavailable)?;
    let Json(body) = body?;
    Ok(Json(client.forward(body).await?))
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/quizzes", post(create_quiz))
        .route("/quizzes/{quiz_id}", get(get_quiz).delete(delete_quiz))
        .route("/users/{uid}/quizzes", get(list_user_quizzes))
        .route("/users/{uid}/quizzes/live", get(watch_user_quizzes))
        .route("/users/{uid}/groups/count", get(count_user_groups))
        .route("/groups/{gid}", get(get_group))
        .route("/groups/{gid}/members/{uid}", get(get_group_member))
        .route("/api/generate", post(generate))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_db, DocumentStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use quizdeck_core::{Collection, GroupDoc, QuizKind, TrueOrFalseQuestion};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::net::TcpStream;
    use tokio::time::{sleep, timeout};
    use tokio_tungstenite::{
        connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
    };
    use tower::ServiceExt;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    struct TestContext {
        store: DocumentStore,
        state: AppState,
        _temp_dir: TempDir, // Keep alive for duration of test
    }

    async fn setup() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(temp_dir.path().join("test.db")).await.unwrap();
        let store = DocumentStore::new(pool);
        TestContext {
            state: AppState::new(Backend::new(store.clone())),
            store,
            _temp_dir: temp_dir,
        }
    }

    /// Serves the router on an ephemeral port and returns its `ws://` base.
    async fn serve(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://{}", addr)
    }

    async fn connect(base: &str, uid: &str) -> Client {
        let (socket, _) = connect_async(format!("{}/users/{}/quizzes/live", base, uid))
            .await
            .unwrap();
        socket
    }

    async fn next_frame(socket: &mut Client) -> Value {
        loop {
            let message = timeout(Duration::from_secs(5), socket.next())
                .await
                .expect("no frame delivered")
                .expect("socket closed")
                .unwrap();
            if let WsMessage::Text(text) = message {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    fn frame_times(frame: &Value) -> Vec<i64> {
        frame
            .as_array()
            .unwrap()
            .iter()
            .map(|q| q["createdAt"].as_i64().unwrap())
            .collect()
    }

    async fn send(
        state: &AppState,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn tofq(id: &str, uid: &str, created_at: i64) -> Quiz {
        Quiz::new(
            uid,
            format!("Quiz {}", id),
            QuizKind::TrueOrFalse {
                questions: vec![TrueOrFalseQuestion::new("Water is wet", true)],
            },
        )
        .with_id(id)
        .with_created_at(created_at)
    }

    #[tokio::test]
    async fn test_health() {
        let ctx = setup().await;
        let (status, body) = send(&ctx.state, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_and_get_quiz() {
        let ctx = setup().await;
        let quiz = tofq("q1", "u1", 10);

        let (status, body) = send(
            &ctx.state,
            Method::POST,
            "/quizzes",
            Some(serde_json::to_value(&quiz).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["type"], "TOFQ");

        let (status, body) = send(&ctx.state, Method::GET, "/quizzes/q1", None).await;
        assert_eq!(status, StatusCode::OK);
        let fetched: Quiz = serde_json::from_value(body).unwrap();
        assert_eq!(fetched, quiz);
    }

    #[tokio::test]
    async fn test_create_rejects_mcq_with_answer_pool() {
        let ctx = setup().await;
        let body = json!({
            "quiz_id": "q1",
            "createdAt": 1,
            "createdBy": "u1",
            "title": "Bad",
            "type": "MCQ",
            "answers": ["a"],
            "questions": [{ "question": "?", "choices": ["a", "b"], "answer": "a" }]
        });

        let (status, body) = send(&ctx.state, Method::POST, "/quizzes", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");

        let (status, _) = send(&ctx.state, Method::GET, "/quizzes/q1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_quiz() {
        let ctx = setup().await;
        ctx.state
            .backend
            .quizzes
            .create(&tofq("q1", "u1", 10))
            .await
            .unwrap();

        let (status, _) = send(&ctx.state, Method::DELETE, "/quizzes/q1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&ctx.state, Method::GET, "/users/u1/quizzes", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, body) = send(&ctx.state, Method::DELETE, "/quizzes/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_user_quizzes_newest_first() {
        let ctx = setup().await;
        for (id, at) in [("a", 5), ("b", 20), ("c", 1)] {
            ctx.state
                .backend
                .quizzes
                .create(&tofq(id, "u1", at))
                .await
                .unwrap();
        }

        let (_, body) = send(&ctx.state, Method::GET, "/users/u1/quizzes", None).await;
        let times: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|q| q["createdAt"].as_i64().unwrap())
            .collect();
        assert_eq!(times, vec![20, 5, 1]);
    }

    #[tokio::test]
    async fn test_group_routes() {
        let ctx = setup().await;
        let groups = &ctx.state.backend.groups;
        groups
            .create_group(&GroupDoc::new("Biology", "owner1").with_id("g1"))
            .await
            .unwrap();
        groups.add_member("g1", "u1").await.unwrap();

        let (status, body) = send(&ctx.state, Method::GET, "/groups/g1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["memberCount"], 1);
        assert_eq!(body["ownerData"], Value::Null);

        let (status, body) = send(&ctx.state, Method::GET, "/groups/g1/members/u1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["gid"], "g1");

        let (status, _) = send(&ctx.state, Method::GET, "/groups/g1/members/u2", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&ctx.state, Method::GET, "/users/u1/groups/count", None).await;
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_missing_group() {
        let ctx = setup().await;
        let (status, body) = send(&ctx.state, Method::GET, "/groups/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_generate_without_ai_endpoint() {
        let ctx = setup().await;
        let (status, body) = send(
            &ctx.state,
            Method::POST,
            "/api/generate",
            Some(json!({ "prompt": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "unavailable");
    }

    #[tokio::test]
    async fn test_live_socket_pushes_snapshots() {
        let ctx = setup().await;
        for (id, at) in [("a", 5), ("b", 20), ("c", 1)] {
            ctx.state
                .backend
                .quizzes
                .create(&tofq(id, "u1", at))
                .await
                .unwrap();
        }
        let base = serve(ctx.state.clone()).await;
        let mut socket = connect(&base, "u1").await;

        assert_eq!(frame_times(&next_frame(&mut socket).await), vec![20, 5, 1]);

        ctx.state
            .backend
            .quizzes
            .create(&tofq("d", "u1", 30))
            .await
            .unwrap();
        assert_eq!(
            frame_times(&next_frame(&mut socket).await),
            vec![30, 20, 5, 1]
        );
    }

    #[tokio::test]
    async fn test_live_socket_sends_error_frame() {
        let ctx = setup().await;
        ctx.store
            .set(
                Collection::Quizzes,
                "bad",
                &json!({
                    "quiz_id": "bad",
                    "createdAt": 3,
                    "createdBy": "u1",
                    "title": "Essay",
                    "status": "LIVE",
                    "type": "ESSAY",
                    "questions": []
                }),
            )
            .await
            .unwrap();
        let base = serve(ctx.state.clone()).await;
        let mut socket = connect(&base, "u1").await;

        let frame = next_frame(&mut socket).await;
        assert!(frame["error"].is_string());

        ctx.state.backend.quizzes.delete("bad").await.unwrap();
        assert_eq!(next_frame(&mut socket).await, json!([]));
    }

    #[tokio::test]
    async fn test_live_socket_close_ends_subscription() {
        let ctx = setup().await;
        let base = serve(ctx.state.clone()).await;
        let mut socket = connect(&base, "u1").await;

        assert_eq!(next_frame(&mut socket).await, json!([]));
        assert_eq!(ctx.store.watcher_count(Collection::Quizzes).await, 1);

        socket.close(None).await.unwrap();

        let released = timeout(Duration::from_secs(5), async {
            while ctx.store.watcher_count(Collection::Quizzes).await > 0 {
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(released.is_ok());
    }
}
