/// 인메모리 코디네이션 네임스페이스
/// 단일 권한 프로세스 안에서 계층형 노드 트리와 세션 테이블을 관리한다.
/// 모든 변경은 하나의 뮤텍스 아래에서 일어나므로 연산은 자연스럽게 선형화된다.
// region:    --- Imports
use super::{
    format_sequence, join_path, parent_path, validate_path, CoordError, CoordResult,
    CoordinationClient, CreateMode, SessionId,
};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- State
struct Node {
    data: Vec<u8>,
    owner: Option<SessionId>,
    children: BTreeSet<String>,
    next_sequence: u64,
}

impl Node {
    fn new(data: Vec<u8>, owner: Option<SessionId>) -> Self {
        Self {
            data,
            owner,
            children: BTreeSet::new(),
            next_sequence: 0,
        }
    }
}

struct Session {
    last_seen: Instant,
    ephemerals: BTreeSet<String>,
}

struct State {
    nodes: HashMap<String, Node>,
    sessions: HashMap<SessionId, Session>,
    next_session: SessionId,
    /// 삭제를 기다리는 대기자가 있는 경로별 알림 채널
    watches: HashMap<String, watch::Sender<()>>,
}

impl State {
    /// 세션 생존 확인 및 마지막 사용 시각 갱신
    fn touch(&mut self, session: SessionId) -> CoordResult<()> {
        match self.sessions.get_mut(&session) {
            Some(s) => {
                s.last_seen = Instant::now();
                Ok(())
            }
            None => Err(CoordError::SessionExpired),
        }
    }

    fn remove_node(&mut self, path: &str) -> CoordResult<()> {
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| CoordError::NoNode(path.to_string()))?;
        if !node.children.is_empty() {
            return Err(CoordError::NotEmpty(path.to_string()));
        }
        let owner = node.owner;
        self.nodes.remove(path);

        if let Some(parent) = parent_path(path).and_then(|p| self.nodes.get_mut(p)) {
            if let Some(name) = path.rsplit('/').next() {
                parent.children.remove(name);
            }
        }
        if let Some(session) = owner.and_then(|id| self.sessions.get_mut(&id)) {
            session.ephemerals.remove(path);
        }
        // 이 경로를 지켜보던 대기자만 깨운다
        if let Some(watchers) = self.watches.remove(path) {
            watchers.send_replace(());
        }
        Ok(())
    }
}
// endregion: --- State

// region:    --- Namespace
/// 공유 네임스페이스
pub struct Namespace {
    state: Mutex<State>,
}

impl Namespace {
    pub fn new() -> Arc<Self> {
        let mut nodes = HashMap::new();
        nodes.insert("/".to_string(), Node::new(Vec::new(), None));
        Arc::new(Self {
            state: Mutex::new(State {
                nodes,
                sessions: HashMap::new(),
                next_session: 1,
                watches: HashMap::new(),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 새 세션 생성
    pub fn open_session(&self) -> SessionId {
        let mut state = self.state();
        let id = state.next_session;
        state.next_session += 1;
        state.sessions.insert(
            id,
            Session {
                last_seen: Instant::now(),
                ephemerals: BTreeSet::new(),
            },
        );
        debug!("{:<12} --> 세션 생성: {}", "Namespace", id);
        id
    }

    /// 하트비트
    pub fn touch(&self, session: SessionId) -> CoordResult<()> {
        self.state().touch(session)
    }

    pub fn is_alive(&self, session: SessionId) -> bool {
        self.state().sessions.contains_key(&session)
    }

    /// 세션 종료: 세션이 소유한 임시 노드를 모두 제거한다
    pub fn close_session(&self, session: SessionId) {
        let removed = {
            let mut state = self.state();
            let Some(s) = state.sessions.remove(&session) else {
                return;
            };
            for path in &s.ephemerals {
                // 임시 노드는 자식이 없으므로 실패하지 않는다
                let _ = state.remove_node(path);
            }
            s.ephemerals.len()
        };
        debug!(
            "{:<12} --> 세션 종료: {}, 임시 노드 {}개 제거",
            "Namespace", session, removed
        );
    }

    /// 주어진 시간 동안 사용되지 않은 세션을 만료시킨다
    pub fn expire_idle_sessions(&self, timeout: Duration) -> Vec<SessionId> {
        let expired: Vec<SessionId> = self
            .state()
            .sessions
            .iter()
            .filter(|(_, s)| s.last_seen.elapsed() > timeout)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            info!("{:<12} --> 세션 만료: {}", "Namespace", id);
            self.close_session(*id);
        }
        expired
    }

    pub fn create(
        &self,
        session: SessionId,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> CoordResult<String> {
        validate_path(path)?;
        let mut state = self.state();
        state.touch(session)?;

        let parent = parent_path(path).ok_or_else(|| CoordError::NodeExists(path.to_string()))?;
        let created = {
            let parent_node = state
                .nodes
                .get_mut(parent)
                .ok_or_else(|| CoordError::NoParent(parent.to_string()))?;
            if parent_node.owner.is_some() {
                return Err(CoordError::NoChildrenForEphemerals(parent.to_string()));
            }
            if mode.is_sequential() {
                let seq = parent_node.next_sequence;
                parent_node.next_sequence += 1;
                format!("{}{}", path, format_sequence(seq))
            } else {
                path.to_string()
            }
        };
        if state.nodes.contains_key(&created) {
            return Err(CoordError::NodeExists(created));
        }

        let owner = mode.is_ephemeral().then_some(session);
        let name = created.rsplit('/').next().unwrap_or_default().to_string();
        state.nodes.insert(created.clone(), Node::new(data, owner));
        if let Some(parent_node) = state.nodes.get_mut(parent) {
            parent_node.children.insert(name);
        }
        if let Some(s) = owner.and_then(|id| state.sessions.get_mut(&id)) {
            s.ephemerals.insert(created.clone());
        }
        Ok(created)
    }

    pub fn get(&self, session: SessionId, path: &str) -> CoordResult<Vec<u8>> {
        validate_path(path)?;
        let mut state = self.state();
        state.touch(session)?;
        state
            .nodes
            .get(path)
            .map(|n| n.data.clone())
            .ok_or_else(|| CoordError::NoNode(path.to_string()))
    }

    pub fn children(&self, session: SessionId, path: &str) -> CoordResult<Vec<String>> {
        validate_path(path)?;
        let mut state = self.state();
        state.touch(session)?;
        state
            .nodes
            .get(path)
            .map(|n| n.children.iter().cloned().collect())
            .ok_or_else(|| CoordError::NoNode(path.to_string()))
    }

    pub fn exists(&self, session: SessionId, path: &str) -> CoordResult<bool> {
        validate_path(path)?;
        let mut state = self.state();
        state.touch(session)?;
        Ok(state.nodes.contains_key(path))
    }

    pub fn delete(&self, session: SessionId, path: &str) -> CoordResult<()> {
        validate_path(path)?;
        if path == "/" {
            return Err(CoordError::InvalidPath(path.to_string()));
        }
        let mut state = self.state();
        state.touch(session)?;
        state.remove_node(path)
    }

    /// 노드가 사라질 때까지 대기
    /// 해당 경로의 삭제만 대기자를 깨우므로 다른 노드의 변경에는 반응하지 않는다
    pub async fn wait_for_deletion(&self, session: SessionId, path: &str) -> CoordResult<()> {
        validate_path(path)?;
        loop {
            // 존재 확인과 구독을 같은 잠금 아래에서 해야 그 사이의 삭제를 놓치지 않는다
            let mut deleted = {
                let mut state = self.state();
                state.touch(session)?;
                if !state.nodes.contains_key(path) {
                    return Ok(());
                }
                let receiver = state
                    .watches
                    .entry(path.to_string())
                    .or_insert_with(|| watch::channel(()).0)
                    .subscribe();
                receiver
            };
            // 송신측이 사라진 경우도 삭제 신호로 보고 다시 확인한다
            let _ = deleted.changed().await;
        }
    }

    /// 삭제 대기자가 걸려 있는 경로 (디버깅 및 테스트용)
    pub fn watched_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.state().watches.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// 전체 경로로 자식 목록 (디버깅 및 테스트용)
    pub fn child_paths(&self, path: &str) -> Vec<String> {
        self.state()
            .nodes
            .get(path)
            .map(|n| n.children.iter().map(|c| join_path(path, c)).collect())
            .unwrap_or_default()
    }
}
// endregion: --- Namespace

// region:    --- Memory Session
/// 같은 프로세스 안의 네임스페이스에 붙는 세션 핸들
/// 닫히거나 드롭되면 세션이 소유한 임시 노드가 사라진다
pub struct MemorySession {
    namespace: Arc<Namespace>,
    id: SessionId,
}

impl MemorySession {
    pub fn open(namespace: &Arc<Namespace>) -> Self {
        let id = namespace.open_session();
        Self {
            namespace: Arc::clone(namespace),
            id,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// 세션을 종료한다 (프로세스 크래시와 같은 효과)
    pub fn close(&self) {
        self.namespace.close_session(self.id);
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.namespace.close_session(self.id);
    }
}

#[async_trait]
impl CoordinationClient for MemorySession {
    async fn create(&self, path: &str, data: Vec<u8>, mode: CreateMode) -> CoordResult<String> {
        self.namespace.create(self.id, path, data, mode)
    }

    async fn get(&self, path: &str) -> CoordResult<Vec<u8>> {
        self.namespace.get(self.id, path)
    }

    async fn children(&self, path: &str) -> CoordResult<Vec<String>> {
        self.namespace.children(self.id, path)
    }

    async fn exists(&self, path: &str) -> CoordResult<bool> {
        self.namespace.exists(self.id, path)
    }

    async fn delete(&self, path: &str) -> CoordResult<()> {
        self.namespace.delete(self.id, path)
    }

    async fn wait_for_deletion(&self, path: &str) -> CoordResult<()> {
        self.namespace.wait_for_deletion(self.id, path).await
    }
}
// endregion: --- Memory Session
