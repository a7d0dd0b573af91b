/// 경매 저장소 에러 정의
// region:    --- Imports
use crate::coordination::CoordError;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Storage Error
pub type StorageResult<T> = Result<T, StorageError>;

/// 저장소 계약(AuctionStore)이 반환하는 에러
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("경매를 찾을 수 없습니다: {0}")]
    NotFound(String),

    #[error("이미 존재하는 경매입니다: {0}")]
    AlreadyExists(String),

    #[error("경매가 이미 종료되었습니다: {0}")]
    AuctionExpired(String),

    #[error("입찰 금액이 최소 입찰가보다 낮습니다: bid={bid_price}, minimum={minimum_bid}")]
    BidTooLow { bid_price: f64, minimum_bid: f64 },

    #[error("입찰 금액이 현재 최고 입찰가보다 높지 않습니다: bid={bid_price}, highest={highest}")]
    BidNotHighEnough { bid_price: f64, highest: f64 },

    #[error("아직 입찰이 없습니다: {0}")]
    NoBidsYet(String),

    #[error("잠금 획득 대기 시간 초과: {0}")]
    LockTimeout(String),

    #[error("저장소를 사용할 수 없습니다: {0}")]
    StorageUnavailable(String),

    #[error("손상된 레코드: {0}")]
    Corrupt(String),

    /// 메타데이터는 있으나 입찰 컨테이너가 없는 경매 (생성 보상 실패)
    #[error("입찰 컨테이너가 없는 손상된 경매: {0}")]
    CorruptAuction(String),

    #[error("잘못된 요청: {0}")]
    InvalidInput(String),
}

impl StorageError {
    /// 호출자가 백오프 후 재시도할 수 있는 에러인지 여부
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::LockTimeout(_) | StorageError::StorageUnavailable(_)
        )
    }

    /// 응답 바디에 실리는 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::NotFound(_) => "NOT_FOUND",
            StorageError::AlreadyExists(_) => "ALREADY_EXISTS",
            StorageError::AuctionExpired(_) => "AUCTION_EXPIRED",
            StorageError::BidTooLow { .. } => "BID_TOO_LOW",
            StorageError::BidNotHighEnough { .. } => "BID_NOT_HIGH_ENOUGH",
            StorageError::NoBidsYet(_) => "NO_BIDS_YET",
            StorageError::LockTimeout(_) => "LOCK_TIMEOUT",
            StorageError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            StorageError::Corrupt(_) => "CORRUPT",
            StorageError::CorruptAuction(_) => "CORRUPT_AUCTION",
            StorageError::InvalidInput(_) => "INVALID_INPUT",
        }
    }
}

/// 코디네이션 에러 중 호출부에서 따로 매핑하지 않은 것은 모두 저장소 장애로 본다
impl From<CoordError> for StorageError {
    fn from(e: CoordError) -> Self {
        StorageError::StorageUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Corrupt(e.to_string())
    }
}
// endregion: --- Storage Error
