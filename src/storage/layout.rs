/// 네임스페이스 경로 규칙
///
/// ```text
/// {root}/auctions/{auctionId}   경매 메타데이터
/// {root}/bids/{auctionId}/bid-N 입찰 레코드 (순차 노드)
/// {root}/locks/{auctionId}      상호 배제 전용 (업무 데이터 없음)
/// ```
// region:    --- Imports
use crate::coordination::{join_path, CoordError, CoordinationClient, CreateMode};
use crate::error::{StorageError, StorageResult};
use tracing::info;

// endregion: --- Imports

pub const DEFAULT_ROOT: &str = "/auction-system";

const BID_PREFIX: &str = "bid-";

// region:    --- Namespace Layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceLayout {
    root: String,
}

impl Default for NamespaceLayout {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl NamespaceLayout {
    /// 앞의 `/`를 보장하고 뒤의 `/`는 제거한다
    pub fn new(root: &str) -> Self {
        let trimmed = root.trim().trim_matches('/');
        let root = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", trimmed)
        };
        Self { root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn auctions(&self) -> String {
        join_path(&self.root, "auctions")
    }

    pub fn bids(&self) -> String {
        join_path(&self.root, "bids")
    }

    pub fn locks(&self) -> String {
        join_path(&self.root, "locks")
    }

    pub fn auction(&self, id: &str) -> String {
        join_path(&self.auctions(), id)
    }

    pub fn bid_container(&self, id: &str) -> String {
        join_path(&self.bids(), id)
    }

    /// 순차 노드 생성에 쓰는 접두 경로
    pub fn bid_prefix(&self, id: &str) -> String {
        join_path(&self.bid_container(id), BID_PREFIX)
    }

    pub fn lock(&self, id: &str) -> String {
        join_path(&self.locks(), id)
    }

    /// 시작 시 만들어야 하는 컨테이너들 (부모가 먼저)
    pub fn containers(&self) -> Vec<String> {
        let mut paths = Vec::new();
        let mut current = String::new();
        for part in self.root.split('/').filter(|p| !p.is_empty()) {
            let parent = if current.is_empty() { "/" } else { current.as_str() };
            current = join_path(parent, part);
            paths.push(current.clone());
        }
        paths.push(self.auctions());
        paths.push(self.bids());
        paths.push(self.locks());
        paths
    }

    /// 컨테이너를 멱등하게 생성한다. 이미 존재하면 성공으로 본다
    pub async fn ensure(&self, client: &dyn CoordinationClient) -> StorageResult<()> {
        for path in self.containers() {
            match client.create(&path, Vec::new(), CreateMode::Persistent).await {
                Ok(_) | Err(CoordError::NodeExists(_)) => {}
                Err(e) => return Err(StorageError::StorageUnavailable(e.to_string())),
            }
        }
        info!("{:<12} --> 네임스페이스 준비 완료: {}", "Layout", self.root);
        Ok(())
    }
}

/// 경매 id는 경로 구성요소 하나여야 한다
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.contains('/') && id != "." && id != ".."
}
// endregion: --- Namespace Layout

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_under_root() {
        let layout = NamespaceLayout::new("/auction-system/");
        assert_eq!(layout.root(), "/auction-system");
        assert_eq!(layout.auction("a1"), "/auction-system/auctions/a1");
        assert_eq!(layout.bid_container("a1"), "/auction-system/bids/a1");
        assert_eq!(layout.bid_prefix("a1"), "/auction-system/bids/a1/bid-");
        assert_eq!(layout.lock("a1"), "/auction-system/locks/a1");
    }

    #[test]
    fn nested_root_creates_every_ancestor() {
        let layout = NamespaceLayout::new("tenants/east");
        assert_eq!(
            layout.containers(),
            vec![
                "/tenants",
                "/tenants/east",
                "/tenants/east/auctions",
                "/tenants/east/bids",
                "/tenants/east/locks",
            ]
        );
    }

    #[test]
    fn ids_must_be_single_components() {
        assert!(is_valid_id("a-1"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("a/b"));
        assert!(!is_valid_id(".."));
    }
}
