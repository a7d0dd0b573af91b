/// 코디네이션 서비스 연동
/// 계층형 네임스페이스, 순차 노드, 세션에 묶인 임시(ephemeral) 노드를 제공하는
/// 외부 서비스에 대한 클라이언트 계약과 구현체들
// region:    --- Imports
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// endregion: --- Imports

// region:    --- Modules
pub mod lock;
pub mod namespace;
pub mod remote;
pub mod server;

pub use lock::{DistributedLock, LockGuard};
pub use namespace::{MemorySession, Namespace};
pub use remote::RemoteSession;

// endregion: --- Modules

// region:    --- Types
/// 순차 노드 접미사 자릿수
pub const SEQUENCE_WIDTH: usize = 10;

pub type SessionId = u64;

pub type CoordResult<T> = Result<T, CoordError>;

/// 노드 생성 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateMode {
    #[default]
    Persistent,
    PersistentSequential,
    Ephemeral,
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }

    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }
}

/// 코디네이션 서비스 에러
/// 원격 서버와 클라이언트가 같은 값을 주고받도록 직렬화 가능하다
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", content = "path", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordError {
    #[error("노드가 없습니다: {0}")]
    NoNode(String),

    #[error("노드가 이미 존재합니다: {0}")]
    NodeExists(String),

    #[error("부모 노드가 없습니다: {0}")]
    NoParent(String),

    #[error("자식 노드가 남아 있습니다: {0}")]
    NotEmpty(String),

    #[error("임시 노드는 자식을 가질 수 없습니다: {0}")]
    NoChildrenForEphemerals(String),

    #[error("잘못된 경로: {0}")]
    InvalidPath(String),

    #[error("세션이 만료되었습니다")]
    SessionExpired,

    #[error("코디네이션 서비스에 연결할 수 없습니다: {0}")]
    Unavailable(String),
}
// endregion: --- Types

// region:    --- Coordination Client
/// 코디네이션 서비스 클라이언트 계약
/// 모든 연산은 하나의 논리 네임스페이스에 대해 선형화 가능해야 한다
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// 노드를 생성하고 실제 생성된 경로를 반환한다 (순차 모드면 접미사 포함)
    async fn create(&self, path: &str, data: Vec<u8>, mode: CreateMode) -> CoordResult<String>;

    async fn get(&self, path: &str) -> CoordResult<Vec<u8>>;

    /// 자식 노드 이름 목록 (전체 경로가 아님)
    async fn children(&self, path: &str) -> CoordResult<Vec<String>>;

    async fn exists(&self, path: &str) -> CoordResult<bool>;

    async fn delete(&self, path: &str) -> CoordResult<()>;

    /// 노드가 존재하지 않게 될 때까지 대기한다 (이미 없으면 즉시 반환)
    async fn wait_for_deletion(&self, path: &str) -> CoordResult<()>;
}
// endregion: --- Coordination Client

// region:    --- Path Helpers
/// 경로 형식 검증: `/`로 시작, 빈 구성요소 없음, 루트 외에는 `/`로 끝나지 않음
pub fn validate_path(path: &str) -> CoordResult<()> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') || path[1..].split('/').any(str::is_empty) {
        return Err(CoordError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// 부모 경로 (루트는 부모가 없음)
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// 경로 결합
pub fn join_path(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{}", child)
    } else {
        format!("{}/{}", parent, child)
    }
}

/// 노드 이름 끝의 순차 접미사를 숫자로 해석한다
/// 접미사가 없거나 ASCII 숫자가 아니면 None
pub fn sequence_of(name: &str) -> Option<u64> {
    let start = name.len().checked_sub(SEQUENCE_WIDTH)?;
    let suffix = name.get(start..)?;
    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// 순차 접미사 형식
pub fn format_sequence(seq: u64) -> String {
    format!("{:0width$}", seq, width = SEQUENCE_WIDTH)
}
// endregion: --- Path Helpers

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_validation() {
        assert!(validate_path("/").is_ok());
        assert!(validate_path("/a/b").is_ok());
        assert!(validate_path("a/b").is_err());
        assert!(validate_path("/a/").is_err());
        assert!(validate_path("/a//b").is_err());
        assert!(validate_path("").is_err());
    }

    #[test]
    fn parent_and_join() {
        assert_eq!(parent_path("/a"), Some("/"));
        assert_eq!(parent_path("/a/b/c"), Some("/a/b"));
        assert_eq!(parent_path("/"), None);
        assert_eq!(join_path("/", "a"), "/a");
        assert_eq!(join_path("/a", "b"), "/a/b");
    }

    #[test]
    fn sequence_suffix_round_trips_through_names() {
        let name = format!("bid-{}", format_sequence(42));
        assert_eq!(name, "bid-0000000042");
        assert_eq!(sequence_of(&name), Some(42));
        assert_eq!(sequence_of("bid-"), None);
        assert_eq!(sequence_of("lock-00000000x1"), None);
    }

    #[test]
    fn non_ascii_names_have_no_sequence() {
        assert_eq!(sequence_of("bid-입찰입찰"), None);
        assert_eq!(sequence_of("입찰입찰입찰입찰"), None);
        assert_eq!(sequence_of("입찰-0000000007"), Some(7));
    }
}
