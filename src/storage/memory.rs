/// 단일 프로세스용 인메모리 저장소
/// 코디네이션 서비스 없이 같은 저장소 계약을 만족하는 기준 구현
// region:    --- Imports
use super::layout::is_valid_id;
use super::AuctionStore;
use crate::auction::{highest_by_price, AuctionItem, Bid};
use crate::clock::{Clock, SystemClock};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

// endregion: --- Imports

// region:    --- Memory Store
#[derive(Default)]
struct MemoryState {
    auctions: HashMap<String, AuctionItem>,
    bids: HashMap<String, Vec<Bid>>,
}

pub struct MemoryStore {
    state: Mutex<MemoryState>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            clock,
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AuctionStore for MemoryStore {
    async fn create_auction(&self, mut item: AuctionItem) -> StorageResult<AuctionItem> {
        item.stamp(self.clock.now());
        item.validate()?;
        if !is_valid_id(&item.id) {
            return Err(StorageError::InvalidInput(format!(
                "사용할 수 없는 경매 id: {}",
                item.id
            )));
        }

        let mut state = self.state();
        if state.auctions.contains_key(&item.id) {
            return Err(StorageError::AlreadyExists(item.id));
        }
        state.auctions.insert(item.id.clone(), item.clone());
        state.bids.insert(item.id.clone(), Vec::new());
        info!("{:<12} --> 경매 생성 완료 id: {}", "Memory", item.id);
        Ok(item)
    }

    async fn list_auctions(&self) -> StorageResult<Vec<AuctionItem>> {
        let mut items: Vec<AuctionItem> = self.state().auctions.values().cloned().collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn get_auction(&self, id: &str) -> StorageResult<AuctionItem> {
        self.state()
            .auctions
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn place_bid(&self, mut bid: Bid) -> StorageResult<Bid> {
        bid.validate()?;
        let now = self.clock.now();

        let mut state = self.state();
        let item = state
            .auctions
            .get(&bid.auction_item_id)
            .ok_or_else(|| StorageError::NotFound(bid.auction_item_id.clone()))?;
        if item.is_expired_at(now) {
            return Err(StorageError::AuctionExpired(item.id.clone()));
        }
        if bid.bid_price < item.minimum_bid {
            return Err(StorageError::BidTooLow {
                bid_price: bid.bid_price,
                minimum_bid: item.minimum_bid,
            });
        }
        let minimum_bid = item.minimum_bid;

        let bids = state
            .bids
            .entry(bid.auction_item_id.clone())
            .or_default();
        let floor = highest_by_price(bids.iter()).map_or(minimum_bid, |b| b.bid_price);
        if bid.bid_price <= floor {
            return Err(StorageError::BidNotHighEnough {
                bid_price: bid.bid_price,
                highest: floor,
            });
        }

        bid.stamp(now);
        bids.push(bid.clone());
        Ok(bid)
    }

    async fn get_highest_bid(&self, auction_id: &str) -> StorageResult<Bid> {
        let state = self.state();
        let bids = state
            .bids
            .get(auction_id)
            .ok_or_else(|| StorageError::NotFound(auction_id.to_string()))?;
        highest_by_price(bids.iter())
            .cloned()
            .ok_or_else(|| StorageError::NoBidsYet(auction_id.to_string()))
    }

    async fn get_bid_history(&self, auction_id: &str) -> StorageResult<Vec<Bid>> {
        self.state()
            .bids
            .get(auction_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(auction_id.to_string()))
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}
// endregion: --- Memory Store
