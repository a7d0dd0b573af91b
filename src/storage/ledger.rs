/// 입찰 원장
/// 경매별 추가 전용, 전순서 입찰 기록.
/// 쓰기는 경매별 분산 잠금 안에서 직렬화되고, 읽기는 잠금 없이 목록+정렬로 재구성한다.
// region:    --- Imports
use super::catalog::AuctionCatalog;
use super::layout::{is_valid_id, NamespaceLayout};
use crate::auction::{highest_by_price, AuctionItem, Bid, LedgerEntry};
use crate::clock::Clock;
use crate::coordination::{
    sequence_of, CoordError, CoordinationClient, CreateMode, DistributedLock,
};
use crate::error::{StorageError, StorageResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// endregion: --- Imports

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

// region:    --- Bid Ledger
pub struct BidLedger {
    client: Arc<dyn CoordinationClient>,
    layout: NamespaceLayout,
    catalog: AuctionCatalog,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
}

impl BidLedger {
    pub fn new(
        client: Arc<dyn CoordinationClient>,
        layout: NamespaceLayout,
        catalog: AuctionCatalog,
        clock: Arc<dyn Clock>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            client,
            layout,
            catalog,
            clock,
            lock_timeout,
        }
    }

    /// 입찰 (경매별로 선형화 가능한 쓰기 경로)
    pub async fn place(&self, bid: Bid) -> StorageResult<Bid> {
        info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Ledger", bid);
        bid.validate()?;
        let auction_id = bid.auction_item_id.clone();

        // 낙관적 사전 검증: 잠금 안에서 다시 확인한다
        let item = self.catalog.get(&auction_id).await?;
        if item.is_expired_at(self.clock.now()) {
            return Err(StorageError::AuctionExpired(auction_id));
        }
        if bid.bid_price < item.minimum_bid {
            return Err(StorageError::BidTooLow {
                bid_price: bid.bid_price,
                minimum_bid: item.minimum_bid,
            });
        }
        if !self
            .client
            .exists(&self.layout.bid_container(&auction_id))
            .await?
        {
            return Err(StorageError::CorruptAuction(auction_id));
        }

        let lock = DistributedLock::new(Arc::clone(&self.client), self.layout.lock(&auction_id));
        let guard = match tokio::time::timeout(self.lock_timeout, lock.acquire()).await {
            Ok(Ok(guard)) => guard,
            Ok(Err(e)) => return Err(StorageError::StorageUnavailable(e.to_string())),
            Err(_) => {
                warn!(
                    "{:<12} --> 잠금 대기 시간 초과: {} ({:?})",
                    "Ledger", auction_id, self.lock_timeout
                );
                return Err(StorageError::LockTimeout(auction_id));
            }
        };

        let result = self.append_locked(&item, bid).await;

        if let Err(e) = guard.release().await {
            warn!(
                "{:<12} --> 잠금 해제 실패, 세션 정리에 맡김: {} ({})",
                "Ledger", auction_id, e
            );
        }
        result
    }

    /// 임계 구역: 최고가 재계산 후 순차 노드로 추가
    async fn append_locked(&self, item: &AuctionItem, mut bid: Bid) -> StorageResult<Bid> {
        let now = self.clock.now();
        if item.is_expired_at(now) {
            return Err(StorageError::AuctionExpired(item.id.clone()));
        }

        let entries = self.read_entries(&item.id).await?;
        match highest_by_price(entries.iter().map(|e| &e.bid)) {
            Some(highest) if bid.bid_price <= highest.bid_price => {
                info!(
                    "{:<12} --> 입찰 거절: {} <= 현재 최고가 {}",
                    "Ledger", bid.bid_price, highest.bid_price
                );
                return Err(StorageError::BidNotHighEnough {
                    bid_price: bid.bid_price,
                    highest: highest.bid_price,
                });
            }
            // 첫 입찰은 최소 입찰가를 넘어야 한다
            None if bid.bid_price <= item.minimum_bid => {
                return Err(StorageError::BidNotHighEnough {
                    bid_price: bid.bid_price,
                    highest: item.minimum_bid,
                });
            }
            _ => {}
        }

        bid.stamp(now);
        let data = serde_json::to_vec(&bid)?;
        let created = self
            .client
            .create(
                &self.layout.bid_prefix(&item.id),
                data,
                CreateMode::PersistentSequential,
            )
            .await
            .map_err(|e| match e {
                CoordError::NoParent(_) => StorageError::CorruptAuction(item.id.clone()),
                e => e.into(),
            })?;

        info!(
            "{:<12} --> 입찰 성공: {} 가격 {} ({})",
            "Ledger", item.id, bid.bid_price, created
        );
        Ok(bid)
    }

    /// 가격 기준 최고 입찰 (잠금 없음)
    pub async fn highest(&self, auction_id: &str) -> StorageResult<Bid> {
        debug!("{:<12} --> 최고 입찰가 조회 id: {}", "Ledger", auction_id);
        let entries = self.entries(auction_id).await?;
        highest_by_price(entries.iter().map(|e| &e.bid))
            .cloned()
            .ok_or_else(|| StorageError::NoBidsYet(auction_id.to_string()))
    }

    /// 순번 순서의 입찰 이력 (잠금 없음)
    pub async fn history(&self, auction_id: &str) -> StorageResult<Vec<Bid>> {
        debug!("{:<12} --> 입찰 이력 조회 id: {}", "Ledger", auction_id);
        Ok(self
            .entries(auction_id)
            .await?
            .into_iter()
            .map(|e| e.bid)
            .collect())
    }

    /// 순번과 함께 원장 항목 조회
    pub async fn entries(&self, auction_id: &str) -> StorageResult<Vec<LedgerEntry>> {
        if !is_valid_id(auction_id) {
            return Err(StorageError::NotFound(auction_id.to_string()));
        }
        self.read_entries(auction_id).await
    }

    /// 컨테이너 자식을 순번으로 정렬해 역직렬화한다. 손상된 레코드는 건너뛴다
    async fn read_entries(&self, auction_id: &str) -> StorageResult<Vec<LedgerEntry>> {
        let container = self.layout.bid_container(auction_id);
        let children = match self.client.children(&container).await {
            Ok(children) => children,
            Err(CoordError::NoNode(_)) => return Err(self.missing_container(auction_id).await),
            Err(e) => return Err(e.into()),
        };

        let mut ordered: Vec<(u64, String)> = Vec::with_capacity(children.len());
        for name in children {
            match sequence_of(&name) {
                Some(seq) => ordered.push((seq, name)),
                None => warn!(
                    "{:<12} --> 순번 없는 노드 건너뜀: {}/{}",
                    "Ledger", container, name
                ),
            }
        }
        ordered.sort();

        let mut entries = Vec::with_capacity(ordered.len());
        for (sequence, name) in ordered {
            let path = format!("{}/{}", container, name);
            let data = match self.client.get(&path).await {
                Ok(data) => data,
                Err(CoordError::NoNode(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice::<Bid>(&data) {
                Ok(bid) => entries.push(LedgerEntry { sequence, bid }),
                Err(e) => warn!(
                    "{:<12} --> 손상된 입찰 레코드 건너뜀: {} ({})",
                    "Ledger", path, e
                ),
            }
        }
        Ok(entries)
    }

    /// 입찰 컨테이너가 없을 때: 메타데이터가 있으면 손상된 경매, 없으면 없는 경매
    async fn missing_container(&self, auction_id: &str) -> StorageError {
        match self.catalog.exists(auction_id).await {
            Ok(true) => {
                warn!(
                    "{:<12} --> 입찰 컨테이너 없는 경매 감지: {}",
                    "Ledger", auction_id
                );
                StorageError::CorruptAuction(auction_id.to_string())
            }
            Ok(false) => StorageError::NotFound(auction_id.to_string()),
            Err(e) => e,
        }
    }
}
// endregion: --- Bid Ledger
