// region:    --- Imports
use crate::auction::{AuctionItem, Bid};
use crate::error::StorageError;
use crate::storage::AuctionStore;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

// endregion: --- Imports

pub type SharedStore = Arc<dyn AuctionStore>;

// region:    --- Router
/// 라우터 설정
pub fn routes(store: SharedStore) -> Router {
    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/auctions",
            get(handle_list_auctions).post(handle_create_auction),
        )
        .route("/auctions/:id", get(handle_get_auction))
        .route("/auctions/:id/bids", axum::routing::post(handle_place_bid))
        .route("/auctions/:id/status", get(handle_get_auction_status))
        .route("/auctions/:id/highest-bid", get(handle_get_highest_bid))
        .route("/auctions/:id/history", get(handle_get_bid_history))
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(store)
}
// endregion: --- Router

// region:    --- Error Response
/// 저장소 에러를 HTTP 응답으로 변환
pub struct ApiError(pub StorageError);

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        Self(e)
    }
}

pub fn status_of(error: &StorageError) -> StatusCode {
    match error {
        StorageError::NotFound(_) | StorageError::NoBidsYet(_) => StatusCode::NOT_FOUND,
        StorageError::AlreadyExists(_) => StatusCode::CONFLICT,
        StorageError::AuctionExpired(_)
        | StorageError::BidTooLow { .. }
        | StorageError::BidNotHighEnough { .. }
        | StorageError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        StorageError::LockTimeout(_) | StorageError::StorageUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        StorageError::Corrupt(_) | StorageError::CorruptAuction(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self.0);
        if status.is_server_error() {
            warn!("{:<12} --> 요청 실패: {}", "Handler", self.0);
        }
        (
            status,
            Json(serde_json::json!({
                "error": self.0.to_string(),
                "code": self.0.code(),
                "retryable": self.0.is_retryable(),
            })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;
// endregion: --- Error Response

// region:    --- Command Handlers

/// 경매 생성
pub async fn handle_create_auction(
    State(store): State<SharedStore>,
    Json(item): Json<AuctionItem>,
) -> ApiResult<impl IntoResponse> {
    info!("{:<12} --> 경매 생성 요청: {:?}", "Handler", item.name);
    let created = store.create_auction(item).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// 입찰 요청 처리 (경로의 경매 id가 바디보다 우선한다)
pub async fn handle_place_bid(
    State(store): State<SharedStore>,
    Path(auction_id): Path<String>,
    Json(mut bid): Json<Bid>,
) -> ApiResult<impl IntoResponse> {
    info!("{:<12} --> 입찰 요청 처리 시작: {}", "Handler", auction_id);
    bid.auction_item_id = auction_id;
    let placed = store.place_bid(bid).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "입찰이 성공적으로 처리되었습니다.",
            "bid": placed,
        })),
    ))
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 모든 경매 조회
pub async fn handle_list_auctions(
    State(store): State<SharedStore>,
) -> ApiResult<Json<Vec<AuctionItem>>> {
    info!("{:<12} --> 모든 경매 조회", "HandlerQuery");
    Ok(Json(store.list_auctions().await?))
}

/// 경매 조회
pub async fn handle_get_auction(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> ApiResult<Json<AuctionItem>> {
    info!("{:<12} --> 경매 조회 id: {}", "HandlerQuery", id);
    Ok(Json(store.get_auction(&id).await?))
}

/// 경매 상태 응답
#[derive(Debug, Serialize)]
pub struct AuctionStatus {
    pub auction: AuctionItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_bid: Option<Bid>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_secs: Option<i64>,
}

/// 경매 상태 조회 (경매 정보 + 최고 입찰 + 진행 여부)
pub async fn handle_get_auction_status(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> ApiResult<Json<AuctionStatus>> {
    info!("{:<12} --> 경매 상태 조회 id: {}", "HandlerQuery", id);
    let auction = store.get_auction(&id).await?;
    let highest_bid = match store.get_highest_bid(&id).await {
        Ok(bid) => Some(bid),
        Err(StorageError::NoBidsYet(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let now = store.clock().now();
    let (status, time_remaining_secs) = if auction.is_expired_at(now) {
        ("expired", None)
    } else {
        ("active", Some((auction.expiry_time - now).num_seconds()))
    };

    Ok(Json(AuctionStatus {
        auction,
        highest_bid,
        status,
        time_remaining_secs,
    }))
}

/// 최고 입찰가 조회
pub async fn handle_get_highest_bid(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> ApiResult<Json<Bid>> {
    info!(
        "{:<12} --> 최고 입찰가 조회 id: {}",
        "HandlerQuery", id
    );
    Ok(Json(store.get_highest_bid(&id).await?))
}

/// 입찰 이력 조회
pub async fn handle_get_bid_history(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Bid>>> {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "HandlerQuery", id);
    Ok(Json(store.get_bid_history(&id).await?))
}

// endregion: --- Query Handlers
