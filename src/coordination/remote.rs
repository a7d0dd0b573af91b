/// 원격 코디네이션 서비스 클라이언트
/// 코디네이터 프로세스에 HTTP로 붙는 세션. 세션 타임아웃의 1/3 주기로 하트비트를 보낸다.
/// 코디네이터가 세션을 만료시키면 새 세션을 열어 교체한다. 이전 세션의 임시 노드(잡고 있던 잠금)는
/// 복구되지 않으므로 만료를 알아챈 요청은 `SessionExpired`로 실패하고, 재시도는 새 세션으로 나간다.
// region:    --- Imports
use super::server::{
    CreateRequest, CreateResponse, NodeData, SessionOpened, WatchResponse, SESSION_HEADER,
    WATCH_POLL,
};
use super::{CoordError, CoordResult, CoordinationClient, CreateMode, SessionId};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- Session State
/// 하트비트 작업과 요청 경로가 함께 보는 현재 세션
struct SessionState {
    http: Client,
    base_url: String,
    id: AtomicU64,
    renewing: Mutex<()>,
}

impl SessionState {
    fn id(&self) -> SessionId {
        self.id.load(Ordering::SeqCst)
    }

    /// 만료된 세션을 새 세션으로 교체한다. 다른 호출이 이미 교체했다면 그 세션을 쓴다
    async fn renew(&self, expired: SessionId) -> CoordResult<SessionId> {
        let _renewing = self.renewing.lock().await;
        let current = self.id();
        if current != expired {
            return Ok(current);
        }
        let opened = open_session(&self.http, &self.base_url).await?;
        self.id.store(opened.session_id, Ordering::SeqCst);
        warn!(
            "{:<12} --> 세션 만료, 새 세션으로 교체: {} -> {}",
            "Remote", expired, opened.session_id
        );
        Ok(opened.session_id)
    }
}

async fn open_session(http: &Client, base_url: &str) -> CoordResult<SessionOpened> {
    let response = http
        .post(format!("{}/sessions", base_url))
        .send()
        .await
        .map_err(unavailable)?;
    decode(response).await
}
// endregion: --- Session State

// region:    --- Remote Session
pub struct RemoteSession {
    state: Arc<SessionState>,
    heartbeat: JoinHandle<()>,
}

impl RemoteSession {
    /// 코디네이터에 세션을 열고 하트비트를 시작한다
    pub async fn connect(base_url: &str) -> CoordResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(WATCH_POLL + Duration::from_secs(10))
            .build()
            .map_err(unavailable)?;

        let opened = open_session(&http, &base_url).await?;
        info!(
            "{:<12} --> 코디네이터 세션 연결: {} (timeout {}ms)",
            "Remote", opened.session_id, opened.timeout_ms
        );

        let state = Arc::new(SessionState {
            http,
            base_url,
            id: AtomicU64::new(opened.session_id),
            renewing: Mutex::new(()),
        });
        let heartbeat = spawn_heartbeat(
            Arc::clone(&state),
            Duration::from_millis((opened.timeout_ms / 3).max(100)),
        );

        Ok(Self { state, heartbeat })
    }

    /// 현재 세션 id (만료 후 교체되면 바뀐다)
    pub fn id(&self) -> SessionId {
        self.state.id()
    }

    /// 세션을 명시적으로 종료한다 (임시 노드가 즉시 사라진다)
    pub async fn close(&self) -> CoordResult<()> {
        self.heartbeat.abort();
        let response = self
            .state
            .http
            .delete(format!("{}/sessions/{}", self.state.base_url, self.id()))
            .send()
            .await
            .map_err(unavailable)?;
        expect_empty(response).await
    }

    fn http(&self) -> &Client {
        &self.state.http
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.state.base_url, route)
    }

    async fn call<T: DeserializeOwned>(&self, req: RequestBuilder) -> CoordResult<T> {
        let id = self.id();
        let response = req
            .header(SESSION_HEADER, id.to_string())
            .send()
            .await
            .map_err(unavailable)?;
        self.renew_on_expiry(id, decode(response).await).await
    }

    async fn call_empty(&self, req: RequestBuilder) -> CoordResult<()> {
        let id = self.id();
        let response = req
            .header(SESSION_HEADER, id.to_string())
            .send()
            .await
            .map_err(unavailable)?;
        self.renew_on_expiry(id, expect_empty(response).await).await
    }

    /// 만료 응답이면 다음 요청을 위해 세션을 교체하고, 이번 결과는 그대로 돌려준다
    async fn renew_on_expiry<T>(&self, id: SessionId, result: CoordResult<T>) -> CoordResult<T> {
        if let Err(CoordError::SessionExpired) = &result {
            if let Err(e) = self.state.renew(id).await {
                warn!("{:<12} --> 세션 교체 실패: {}", "Remote", e);
            }
        }
        result
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        // 명시적 종료가 없으면 서버의 세션 만료에 맡긴다
        self.heartbeat.abort();
    }
}

fn spawn_heartbeat(state: Arc<SessionState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let id = state.id();
            let url = format!("{}/sessions/{}/heartbeat", state.base_url, id);
            match state.http.post(&url).send().await {
                Ok(r) if r.status() == StatusCode::GONE => {
                    error!("{:<12} --> 세션이 만료됨: {}", "Remote", id);
                    if let Err(e) = state.renew(id).await {
                        warn!("{:<12} --> 세션 교체 실패: {}", "Remote", e);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("{:<12} --> 하트비트 실패: {}", "Remote", e),
            }
        }
    })
}

fn unavailable(e: reqwest::Error) -> CoordError {
    CoordError::Unavailable(e.to_string())
}

/// 실패 응답 바디를 코디네이션 에러로 되돌린다
async fn error_of(response: reqwest::Response) -> CoordError {
    let status = response.status();
    match response.json::<CoordError>().await {
        Ok(e) => e,
        Err(_) => CoordError::Unavailable(format!("코디네이터 응답 상태 {}", status)),
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> CoordResult<T> {
    if !response.status().is_success() {
        return Err(error_of(response).await);
    }
    response.json::<T>().await.map_err(unavailable)
}

async fn expect_empty(response: reqwest::Response) -> CoordResult<()> {
    if !response.status().is_success() {
        return Err(error_of(response).await);
    }
    Ok(())
}
// endregion: --- Remote Session

// region:    --- Coordination Client
#[async_trait]
impl CoordinationClient for RemoteSession {
    async fn create(&self, path: &str, data: Vec<u8>, mode: CreateMode) -> CoordResult<String> {
        let req = self.http().post(self.url("/nodes")).json(&CreateRequest {
            path: path.to_string(),
            data,
            mode,
        });
        let created: CreateResponse = self.call(req).await?;
        Ok(created.path)
    }

    async fn get(&self, path: &str) -> CoordResult<Vec<u8>> {
        let req = self.http().get(self.url("/nodes")).query(&[("path", path)]);
        let node: NodeData = self.call(req).await?;
        Ok(node.data)
    }

    async fn children(&self, path: &str) -> CoordResult<Vec<String>> {
        let req = self.http().get(self.url("/children")).query(&[("path", path)]);
        self.call(req).await
    }

    async fn exists(&self, path: &str) -> CoordResult<bool> {
        let req = self.http().get(self.url("/exists")).query(&[("path", path)]);
        self.call(req).await
    }

    async fn delete(&self, path: &str) -> CoordResult<()> {
        let req = self.http().delete(self.url("/nodes")).query(&[("path", path)]);
        self.call_empty(req).await
    }

    async fn wait_for_deletion(&self, path: &str) -> CoordResult<()> {
        loop {
            let req = self.http().get(self.url("/watch")).query(&[("path", path)]);
            let watched: WatchResponse = self.call(req).await?;
            if watched.deleted {
                return Ok(());
            }
        }
    }
}
// endregion: --- Coordination Client
