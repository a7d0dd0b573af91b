/// 경매 저장소
/// 요청 계층이 사용하는 저장소 계약과 두 구현체(단일 프로세스 / 코디네이션 서비스 기반)
// region:    --- Imports
use crate::auction::{AuctionItem, Bid};
use crate::clock::Clock;
use crate::error::StorageResult;
use async_trait::async_trait;

// endregion: --- Imports

// region:    --- Modules
pub mod catalog;
pub mod coordinated;
pub mod layout;
pub mod ledger;
pub mod memory;

pub use catalog::AuctionCatalog;
pub use coordinated::{CoordinatedStore, StoreOptions};
pub use layout::NamespaceLayout;
pub use ledger::BidLedger;
pub use memory::MemoryStore;

// endregion: --- Modules

// region:    --- Auction Store Trait
/// 저장소 계약
/// 두 구현체는 같은 입력에 같은 결과와 같은 에러 종류를 돌려준다
#[async_trait]
pub trait AuctionStore: Send + Sync {
    /// 경매 생성 (id가 비어 있으면 부여, 생성 시각 기록)
    async fn create_auction(&self, item: AuctionItem) -> StorageResult<AuctionItem>;

    async fn list_auctions(&self) -> StorageResult<Vec<AuctionItem>>;

    async fn get_auction(&self, id: &str) -> StorageResult<AuctionItem>;

    /// 입찰. 성공하면 id와 시각이 채워진 저장된 입찰을 돌려준다
    async fn place_bid(&self, bid: Bid) -> StorageResult<Bid>;

    /// 가격 기준 최고 입찰
    async fn get_highest_bid(&self, auction_id: &str) -> StorageResult<Bid>;

    /// 생성 순서대로 정렬된 입찰 이력
    async fn get_bid_history(&self, auction_id: &str) -> StorageResult<Vec<Bid>>;

    /// 종료 판정에 쓰는 시계 (상태 조회도 같은 시계를 본다)
    fn clock(&self) -> &dyn Clock;
}
// endregion: --- Auction Store Trait
