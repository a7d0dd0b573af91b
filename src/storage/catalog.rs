/// 경매 카탈로그
/// 경매 메타데이터 노드의 생성/조회/목록. 경합이 적어 잠금을 쓰지 않는다.
// region:    --- Imports
use super::layout::{is_valid_id, NamespaceLayout};
use crate::auction::AuctionItem;
use crate::clock::Clock;
use crate::coordination::{CoordError, CoordinationClient, CreateMode};
use crate::error::{StorageError, StorageResult};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// endregion: --- Imports

// region:    --- Auction Catalog
#[derive(Clone)]
pub struct AuctionCatalog {
    client: Arc<dyn CoordinationClient>,
    layout: NamespaceLayout,
    clock: Arc<dyn Clock>,
}

impl AuctionCatalog {
    pub fn new(
        client: Arc<dyn CoordinationClient>,
        layout: NamespaceLayout,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            layout,
            clock,
        }
    }

    /// 경매 생성: 메타데이터 노드와 빈 입찰 컨테이너를 차례로 만든다
    /// 두 번째 쓰기가 실패하면 첫 번째를 지워 보상한다
    pub async fn create(&self, mut item: AuctionItem) -> StorageResult<AuctionItem> {
        item.stamp(self.clock.now());
        item.validate()?;
        if !is_valid_id(&item.id) {
            return Err(StorageError::InvalidInput(format!(
                "사용할 수 없는 경매 id: {}",
                item.id
            )));
        }
        info!("{:<12} --> 경매 생성 시작 id: {}", "Catalog", item.id);

        let data = serde_json::to_vec(&item)?;
        let auction_path = self.layout.auction(&item.id);
        self.client
            .create(&auction_path, data, CreateMode::Persistent)
            .await
            .map_err(|e| creation_error(e, &item.id))?;

        let container = self.layout.bid_container(&item.id);
        if let Err(e) = self
            .client
            .create(&container, Vec::new(), CreateMode::Persistent)
            .await
        {
            warn!(
                "{:<12} --> 입찰 컨테이너 생성 실패, 메타데이터 롤백: {} ({})",
                "Catalog", item.id, e
            );
            if let Err(rollback) = self.client.delete(&auction_path).await {
                error!(
                    "{:<12} --> 롤백 실패, 손상된 경매가 남음: {} ({})",
                    "Catalog", item.id, rollback
                );
            }
            return Err(creation_error(e, &item.id));
        }

        info!("{:<12} --> 경매 생성 완료 id: {}", "Catalog", item.id);
        Ok(item)
    }

    /// 경매 조회
    pub async fn get(&self, id: &str) -> StorageResult<AuctionItem> {
        debug!("{:<12} --> 경매 조회 id: {}", "Catalog", id);
        if !is_valid_id(id) {
            return Err(StorageError::NotFound(id.to_string()));
        }
        let data = self
            .client
            .get(&self.layout.auction(id))
            .await
            .map_err(|e| match e {
                CoordError::NoNode(_) => StorageError::NotFound(id.to_string()),
                e => e.into(),
            })?;
        serde_json::from_slice(&data)
            .map_err(|e| StorageError::Corrupt(format!("경매 {}: {}", id, e)))
    }

    /// 메타데이터 노드 존재 여부
    pub async fn exists(&self, id: &str) -> StorageResult<bool> {
        if !is_valid_id(id) {
            return Ok(false);
        }
        Ok(self.client.exists(&self.layout.auction(id)).await?)
    }

    /// 모든 경매 조회 (트랜잭션이 아닌 최선의 스냅샷)
    pub async fn list(&self) -> StorageResult<Vec<AuctionItem>> {
        debug!("{:<12} --> 모든 경매 조회", "Catalog");
        let children = self.client.children(&self.layout.auctions()).await?;

        let mut items = Vec::with_capacity(children.len());
        for child in children {
            let data = match self.client.get(&self.layout.auction(&child)).await {
                Ok(data) => data,
                // 목록 조회 중 사라진 항목
                Err(CoordError::NoNode(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice::<AuctionItem>(&data) {
                Ok(item) => items.push(item),
                Err(e) => warn!(
                    "{:<12} --> 손상된 경매 레코드 건너뜀: {} ({})",
                    "Catalog", child, e
                ),
            }
        }

        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }
}

fn creation_error(e: CoordError, id: &str) -> StorageError {
    match e {
        CoordError::NodeExists(_) => StorageError::AlreadyExists(id.to_string()),
        e => e.into(),
    }
}
// endregion: --- Auction Catalog
