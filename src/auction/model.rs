use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// region:    --- Auction Item
/// 경매 상품 모델
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionItem {
    /// 비어 있으면 생성 시 서버가 부여
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub minimum_bid: f64,
    pub expiry_time: DateTime<Utc>,
    /// 생성 시 서버가 기록, 이후 변경되지 않음
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuctionItem {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        minimum_bid: f64,
        expiry_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: description.into(),
            minimum_bid,
            expiry_time,
            created_at: None,
        }
    }

    /// 필수 필드 검증
    pub fn validate(&self) -> StorageResult<()> {
        if self.name.trim().is_empty() {
            return Err(StorageError::InvalidInput("name은 비어 있을 수 없습니다".into()));
        }
        if !self.minimum_bid.is_finite() || self.minimum_bid <= 0.0 {
            return Err(StorageError::InvalidInput(
                "minimum_bid는 0보다 커야 합니다".into(),
            ));
        }
        Ok(())
    }

    /// 생성 직전 id와 생성 시각을 채운다
    pub(crate) fn stamp(&mut self, now: DateTime<Utc>) {
        if self.id.is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
        self.created_at = Some(now);
    }

    /// 주어진 시각에 경매가 종료되었는지 여부 (종료 시각 포함)
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_time
    }
}
// endregion: --- Auction Item

// region:    --- Bid
/// 입찰 모델
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    #[serde(default)]
    pub id: String,
    pub participant_id: String,
    #[serde(default)]
    pub auction_item_id: String,
    pub bid_price: f64,
    /// 클라이언트가 보낸 값은 정렬에 쓰지 않는다
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Bid {
    pub fn new(
        auction_item_id: impl Into<String>,
        participant_id: impl Into<String>,
        bid_price: f64,
    ) -> Self {
        Self {
            id: String::new(),
            participant_id: participant_id.into(),
            auction_item_id: auction_item_id.into(),
            bid_price,
            timestamp: None,
        }
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.participant_id.trim().is_empty() {
            return Err(StorageError::InvalidInput(
                "participant_id는 비어 있을 수 없습니다".into(),
            ));
        }
        if self.auction_item_id.trim().is_empty() {
            return Err(StorageError::InvalidInput(
                "auction_item_id는 비어 있을 수 없습니다".into(),
            ));
        }
        if !self.bid_price.is_finite() || self.bid_price <= 0.0 {
            return Err(StorageError::InvalidInput(
                "bid_price는 0보다 커야 합니다".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn stamp(&mut self, now: DateTime<Utc>) {
        if self.id.is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(now);
        }
    }
}

/// 가격 기준 최고 입찰
pub fn highest_by_price<'a, I>(bids: I) -> Option<&'a Bid>
where
    I: IntoIterator<Item = &'a Bid>,
{
    bids.into_iter()
        .max_by(|a, b| a.bid_price.total_cmp(&b.bid_price))
}
// endregion: --- Bid

// region:    --- Ledger Entry
/// 코디네이션 서비스가 부여한 순번과 함께 저장된 입찰
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub bid: Bid,
}
// endregion: --- Ledger Entry
