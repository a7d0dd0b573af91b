/// 코디네이션 서비스 HTTP 서버
/// 하나의 네임스페이스를 여러 프론트엔드 프로세스가 공유할 수 있도록 노출한다
// region:    --- Imports
use super::{CoordError, CreateMode, Namespace, SessionId};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Wire Types
pub const SESSION_HEADER: &str = "x-session-id";

/// 롱 폴링 한 번의 최대 대기 시간
pub const WATCH_POLL: Duration = Duration::from_secs(20);

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionOpened {
    pub session_id: SessionId,
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRequest {
    pub path: String,
    #[serde(default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub mode: CreateMode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateResponse {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeData {
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WatchResponse {
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

/// 에러 코드별 HTTP 상태
pub fn status_of(error: &CoordError) -> StatusCode {
    match error {
        CoordError::NoNode(_) | CoordError::NoParent(_) => StatusCode::NOT_FOUND,
        CoordError::NodeExists(_)
        | CoordError::NotEmpty(_)
        | CoordError::NoChildrenForEphemerals(_) => StatusCode::CONFLICT,
        CoordError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        CoordError::SessionExpired => StatusCode::GONE,
        CoordError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

struct CoordErrorResponse(CoordError);

impl IntoResponse for CoordErrorResponse {
    fn into_response(self) -> Response {
        (status_of(&self.0), Json(self.0)).into_response()
    }
}

impl From<CoordError> for CoordErrorResponse {
    fn from(e: CoordError) -> Self {
        Self(e)
    }
}

type CoordReply<T> = Result<T, CoordErrorResponse>;

fn session_of(headers: &HeaderMap) -> Result<SessionId, CoordError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or(CoordError::SessionExpired)
}
// endregion: --- Wire Types

// region:    --- Router
#[derive(Clone)]
pub struct CoordinatorState {
    pub namespace: Arc<Namespace>,
    pub session_timeout: Duration,
}

pub fn router(state: CoordinatorState) -> Router {
    Router::new()
        .route("/sessions", post(open_session))
        .route("/sessions/:id", axum::routing::delete(close_session))
        .route("/sessions/:id/heartbeat", post(heartbeat))
        .route("/nodes", post(create_node).get(get_node).delete(delete_node))
        .route("/children", get(list_children))
        .route("/exists", get(node_exists))
        .route("/watch", get(watch_deletion))
        .with_state(state)
}

async fn open_session(State(state): State<CoordinatorState>) -> Json<SessionOpened> {
    let session_id = state.namespace.open_session();
    info!("{:<12} --> 세션 연결: {}", "Coordinator", session_id);
    Json(SessionOpened {
        session_id,
        timeout_ms: state.session_timeout.as_millis() as u64,
    })
}

async fn close_session(
    State(state): State<CoordinatorState>,
    Path(id): Path<SessionId>,
) -> StatusCode {
    info!("{:<12} --> 세션 종료 요청: {}", "Coordinator", id);
    state.namespace.close_session(id);
    StatusCode::NO_CONTENT
}

async fn heartbeat(
    State(state): State<CoordinatorState>,
    Path(id): Path<SessionId>,
) -> CoordReply<StatusCode> {
    state.namespace.touch(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_node(
    State(state): State<CoordinatorState>,
    headers: HeaderMap,
    Json(req): Json<CreateRequest>,
) -> CoordReply<Json<CreateResponse>> {
    let session = session_of(&headers)?;
    let path = state
        .namespace
        .create(session, &req.path, req.data, req.mode)?;
    debug!("{:<12} --> 노드 생성: {}", "Coordinator", path);
    Ok(Json(CreateResponse { path }))
}

async fn get_node(
    State(state): State<CoordinatorState>,
    headers: HeaderMap,
    Query(q): Query<PathQuery>,
) -> CoordReply<Json<NodeData>> {
    let session = session_of(&headers)?;
    let data = state.namespace.get(session, &q.path)?;
    Ok(Json(NodeData { data }))
}

async fn delete_node(
    State(state): State<CoordinatorState>,
    headers: HeaderMap,
    Query(q): Query<PathQuery>,
) -> CoordReply<StatusCode> {
    let session = session_of(&headers)?;
    state.namespace.delete(session, &q.path)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_children(
    State(state): State<CoordinatorState>,
    headers: HeaderMap,
    Query(q): Query<PathQuery>,
) -> CoordReply<Json<Vec<String>>> {
    let session = session_of(&headers)?;
    Ok(Json(state.namespace.children(session, &q.path)?))
}

async fn node_exists(
    State(state): State<CoordinatorState>,
    headers: HeaderMap,
    Query(q): Query<PathQuery>,
) -> CoordReply<Json<bool>> {
    let session = session_of(&headers)?;
    Ok(Json(state.namespace.exists(session, &q.path)?))
}

/// 삭제 대기 롱 폴링: 시간 안에 삭제되지 않으면 deleted=false
async fn watch_deletion(
    State(state): State<CoordinatorState>,
    headers: HeaderMap,
    Query(q): Query<PathQuery>,
) -> CoordReply<Json<WatchResponse>> {
    let session = session_of(&headers)?;
    match tokio::time::timeout(
        WATCH_POLL,
        state.namespace.wait_for_deletion(session, &q.path),
    )
    .await
    {
        Ok(result) => {
            result?;
            Ok(Json(WatchResponse { deleted: true }))
        }
        Err(_) => Ok(Json(WatchResponse { deleted: false })),
    }
}
// endregion: --- Router

// region:    --- Session Reaper
/// 하트비트가 끊긴 세션을 주기적으로 만료시킨다
pub fn spawn_session_reaper(namespace: Arc<Namespace>, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(1)); // 1초마다 실행
        loop {
            interval.tick().await;
            let expired = namespace.expire_idle_sessions(timeout);
            if !expired.is_empty() {
                info!(
                    "{:<12} --> 만료된 세션 {}개 정리: {:?}",
                    "Reaper",
                    expired.len(),
                    expired
                );
            }
        }
    })
}
// endregion: --- Session Reaper
