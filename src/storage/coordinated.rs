/// 코디네이션 서비스 기반 저장소
// region:    --- Imports
use super::catalog::AuctionCatalog;
use super::layout::{NamespaceLayout, DEFAULT_ROOT};
use super::ledger::{BidLedger, DEFAULT_LOCK_TIMEOUT};
use super::AuctionStore;
use crate::auction::{AuctionItem, Bid, LedgerEntry};
use crate::clock::{Clock, SystemClock};
use crate::coordination::CoordinationClient;
use crate::error::StorageResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

// endregion: --- Imports

// region:    --- Options
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub root: String,
    pub lock_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}
// endregion: --- Options

// region:    --- Coordinated Store
pub struct CoordinatedStore {
    layout: NamespaceLayout,
    clock: Arc<dyn Clock>,
    catalog: AuctionCatalog,
    ledger: BidLedger,
}

impl CoordinatedStore {
    /// 네임스페이스 컨테이너를 준비하고 저장소를 만든다
    pub async fn connect(
        client: Arc<dyn CoordinationClient>,
        options: StoreOptions,
    ) -> StorageResult<Self> {
        Self::connect_with_clock(client, options, Arc::new(SystemClock)).await
    }

    pub async fn connect_with_clock(
        client: Arc<dyn CoordinationClient>,
        options: StoreOptions,
        clock: Arc<dyn Clock>,
    ) -> StorageResult<Self> {
        let layout = NamespaceLayout::new(&options.root);
        layout.ensure(client.as_ref()).await?;

        let catalog = AuctionCatalog::new(Arc::clone(&client), layout.clone(), Arc::clone(&clock));
        let ledger = BidLedger::new(
            client,
            layout.clone(),
            catalog.clone(),
            Arc::clone(&clock),
            options.lock_timeout,
        );
        Ok(Self {
            layout,
            clock,
            catalog,
            ledger,
        })
    }

    pub fn layout(&self) -> &NamespaceLayout {
        &self.layout
    }

    pub fn catalog(&self) -> &AuctionCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &BidLedger {
        &self.ledger
    }

    /// 순번이 붙은 원장 항목
    pub async fn ledger_entries(&self, auction_id: &str) -> StorageResult<Vec<LedgerEntry>> {
        self.ledger.entries(auction_id).await
    }
}

#[async_trait]
impl AuctionStore for CoordinatedStore {
    async fn create_auction(&self, item: AuctionItem) -> StorageResult<AuctionItem> {
        self.catalog.create(item).await
    }

    async fn list_auctions(&self) -> StorageResult<Vec<AuctionItem>> {
        self.catalog.list().await
    }

    async fn get_auction(&self, id: &str) -> StorageResult<AuctionItem> {
        self.catalog.get(id).await
    }

    async fn place_bid(&self, bid: Bid) -> StorageResult<Bid> {
        self.ledger.place(bid).await
    }

    async fn get_highest_bid(&self, auction_id: &str) -> StorageResult<Bid> {
        self.ledger.highest(auction_id).await
    }

    async fn get_bid_history(&self, auction_id: &str) -> StorageResult<Vec<Bid>> {
        self.ledger.history(auction_id).await
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}
// endregion: --- Coordinated Store
