use auction_ledger::auction::{AuctionItem, Bid};
use auction_ledger::clock::FakeClock;
use auction_ledger::coordination::server::{self, CoordinatorState};
use auction_ledger::coordination::{
    CoordError, CoordinationClient, CreateMode, Namespace, RemoteSession,
};
use auction_ledger::handlers;
use auction_ledger::storage::{AuctionStore, CoordinatedStore, MemoryStore, StoreOptions};
use axum::http::StatusCode;
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// 트레이싱 초기화
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// 임의 포트에 라우터를 띄운다
async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });
    addr
}

/// 코디네이터 실행
async fn start_coordinator() -> String {
    serve_coordinator(Namespace::new()).await
}

/// 주어진 네임스페이스를 노출하는 코디네이터
async fn serve_coordinator(namespace: Arc<Namespace>) -> String {
    let addr = serve(server::router(CoordinatorState {
        namespace,
        session_timeout: std::time::Duration::from_secs(10),
    }))
    .await;
    format!("http://{}", addr)
}

/// 코디네이터에 붙는 프론트엔드 실행
async fn start_frontend(coordinator: &str) -> String {
    let session: Arc<dyn CoordinationClient> =
        Arc::new(RemoteSession::connect(coordinator).await.unwrap());
    let store = CoordinatedStore::connect(session, StoreOptions::default())
        .await
        .unwrap();
    let addr = serve(handlers::routes(Arc::new(store))).await;
    format!("http://{}", addr)
}

/// 테스트용 경매 생성 요청
async fn create_test_auction(client: &Client, server: &str, name: &str) -> AuctionItem {
    let response = client
        .post(format!("{}/auctions", server))
        .json(&json!({
            "name": name,
            "description": "통합 테스트 경매",
            "minimum_bid": 10.0,
            "expiry_time": Utc::now() + Duration::hours(1),
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn place_bid(client: &Client, server: &str, auction_id: &str, price: f64) -> (StatusCode, Value) {
    let response = client
        .post(format!("{}/auctions/{}/bids", server, auction_id))
        .json(&json!({ "participant_id": "tester", "bid_price": price }))
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status();
    (status, response.json().await.unwrap())
}

async fn bid_history(client: &Client, server: &str, auction_id: &str) -> Vec<Bid> {
    client
        .get(format!("{}/auctions/{}/history", server, auction_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// 여러 프론트엔드에 걸친 입찰 테스트
#[tokio::test]
async fn test_bids_across_frontends_share_one_ledger() {
    init_tracing();
    let coordinator = start_coordinator().await;
    let frontends = [
        start_frontend(&coordinator).await,
        start_frontend(&coordinator).await,
        start_frontend(&coordinator).await,
    ];
    let client = Client::new();

    let item = create_test_auction(&client, &frontends[0], "분산 경매").await;

    let (status, body) = place_bid(&client, &frontends[1], &item.id, 5.0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BID_TOO_LOW");

    let (status, body) = place_bid(&client, &frontends[1], &item.id, 15.0).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["bid"]["bid_price"], 15.0);

    let (status, body) = place_bid(&client, &frontends[2], &item.id, 12.0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BID_NOT_HIGH_ENOUGH");

    let (status, _) = place_bid(&client, &frontends[0], &item.id, 20.0).await;
    assert_eq!(status, StatusCode::CREATED);

    // 모든 프론트엔드가 같은 이력을 본다
    for frontend in &frontends {
        let history = bid_history(&client, frontend, &item.id).await;
        let prices: Vec<f64> = history.iter().map(|b| b.bid_price).collect();
        assert_eq!(prices, vec![15.0, 20.0]);
    }

    let status: Value = client
        .get(format!("{}/auctions/{}/status", frontends[2], item.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "active");
    assert_eq!(status["highest_bid"]["bid_price"], 20.0);
    assert_eq!(status["auction"]["id"], item.id.as_str());

    let listed: Vec<AuctionItem> = client
        .get(format!("{}/auctions", frontends[1]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed, vec![item]);
}

/// 여러 프론트엔드 동시 입찰 테스트
#[tokio::test]
async fn test_concurrent_bidding_over_http() {
    init_tracing();
    let coordinator = start_coordinator().await;
    let frontends = vec![
        start_frontend(&coordinator).await,
        start_frontend(&coordinator).await,
    ];
    let client = Client::new();
    let item = create_test_auction(&client, &frontends[0], "동시 입찰").await;

    // 20개의 동시 입찰 생성
    let mut handles = vec![];
    for i in 1..=20 {
        let client = client.clone();
        let server = frontends[i % frontends.len()].clone();
        let auction_id = item.id.clone();
        handles.push(tokio::spawn(async move {
            place_bid(&client, &server, &auction_id, 10.0 + i as f64).await.0
        }));
    }

    let mut successful_bids = 0;
    for handle in handles {
        let status = handle.await.unwrap();
        match status {
            StatusCode::CREATED => successful_bids += 1,
            StatusCode::BAD_REQUEST => {}
            other => panic!("예상하지 못한 상태 코드: {}", other),
        }
    }
    info!("성공한 입찰 수: {}", successful_bids);

    let history = bid_history(&client, &frontends[1], &item.id).await;
    assert_eq!(history.len(), successful_bids);
    assert!(history.windows(2).all(|w| w[0].bid_price < w[1].bid_price));
    // 최고가 입찰은 항상 수락된다
    assert_eq!(history.last().unwrap().bid_price, 30.0);
}

/// 에러 응답 테스트
#[tokio::test]
async fn test_error_responses() {
    init_tracing();
    let server = format!(
        "http://{}",
        serve(handlers::routes(Arc::new(MemoryStore::new()))).await
    );
    let client = Client::new();

    let response = client
        .get(format!("{}/auctions/missing", server))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .post(format!("{}/auctions", server))
        .json(&json!({
            "name": "",
            "minimum_bid": 10.0,
            "expiry_time": Utc::now() + Duration::hours(1),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_INPUT");

    let item = create_test_auction(&client, &server, "에러").await;
    let response = client
        .get(format!("{}/auctions/{}/highest-bid", server, item.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NO_BIDS_YET");

    let status: Value = client
        .get(format!("{}/auctions/{}/status", server, item.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(status.get("highest_bid").is_none());
}

/// 상태 조회는 입찰 검증과 같은 시계로 종료 여부를 판단한다
#[tokio::test]
async fn test_status_follows_store_clock() {
    init_tracing();
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(FakeClock::new(start));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let server = format!("http://{}", serve(handlers::routes(store)).await);
    let client = Client::new();

    let item: AuctionItem = client
        .post(format!("{}/auctions", server))
        .json(&json!({
            "name": "시계",
            "minimum_bid": 10.0,
            "expiry_time": start + Duration::hours(1),
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let status: Value = client
        .get(format!("{}/auctions/{}/status", server, item.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "active");
    assert_eq!(status["time_remaining_secs"], 3600);

    // 실제 시각과 무관하게 저장소 시계 기준으로 종료된다
    clock.advance(Duration::hours(2));
    let status: Value = client
        .get(format!("{}/auctions/{}/status", server, item.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "expired");
    assert!(status.get("time_remaining_secs").is_none());

    let (status, body) = place_bid(&client, &server, &item.id, 20.0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "AUCTION_EXPIRED");
}

/// 원격 세션의 코디네이션 계약 테스트
#[tokio::test]
async fn test_remote_session_contract() {
    init_tracing();
    let coordinator = start_coordinator().await;
    let owner = RemoteSession::connect(&coordinator).await.unwrap();
    let observer = RemoteSession::connect(&coordinator).await.unwrap();

    owner
        .create("/remote", b"data".to_vec(), CreateMode::Persistent)
        .await
        .unwrap();
    assert_eq!(
        owner
            .create("/remote", Vec::new(), CreateMode::Persistent)
            .await,
        Err(CoordError::NodeExists("/remote".into()))
    );
    assert_eq!(observer.get("/remote").await.unwrap(), b"data".to_vec());

    let first = owner
        .create("/remote/e-", Vec::new(), CreateMode::EphemeralSequential)
        .await
        .unwrap();
    let second = owner
        .create("/remote/e-", Vec::new(), CreateMode::EphemeralSequential)
        .await
        .unwrap();
    assert!(first < second);
    assert_eq!(observer.children("/remote").await.unwrap().len(), 2);

    // 원격 watch: 삭제되면 대기가 끝난다
    let watched = first.clone();
    let waiter = tokio::spawn(async move { observer.wait_for_deletion(&watched).await.map(|_| observer) });
    owner.delete(&first).await.unwrap();
    let observer = waiter.await.unwrap().unwrap();

    owner.close().await.unwrap();
    assert!(!observer.exists(&second).await.unwrap());
    assert!(observer.exists("/remote").await.unwrap());
    assert_eq!(
        observer.get("/missing").await,
        Err(CoordError::NoNode("/missing".into()))
    );
}

/// 코디네이터가 세션을 만료시켜도 재시도는 새 세션으로 성공한다
#[tokio::test]
async fn test_remote_session_recovers_after_expiry() {
    init_tracing();
    let namespace = Namespace::new();
    let coordinator = serve_coordinator(namespace.clone()).await;
    let session = Arc::new(RemoteSession::connect(&coordinator).await.unwrap());
    let store = CoordinatedStore::connect(session.clone(), StoreOptions::default())
        .await
        .unwrap();
    let expired = session.id();

    // 하트비트가 끊긴 것처럼 코디네이터 쪽에서 세션을 닫는다
    namespace.close_session(expired);

    let mut attempts = 0;
    let created = loop {
        attempts += 1;
        let item = AuctionItem::new("복구", "", 10.0, Utc::now() + Duration::hours(1));
        match store.create_auction(item).await {
            Ok(item) => break item,
            Err(e) if attempts < 3 => assert!(e.is_retryable(), "재시도할 수 없는 에러: {e}"),
            Err(e) => panic!("세션이 복구되지 않음: {e}"),
        }
    };

    assert_ne!(session.id(), expired);
    assert!(namespace.is_alive(session.id()));
    assert!(!namespace.is_alive(expired));
    assert_eq!(store.get_auction(&created.id).await.unwrap(), created);

    // 새 세션의 임시 노드로 잠금을 잡는 입찰도 동작한다
    store
        .place_bid(Bid::new(&created.id, "p1", 11.0))
        .await
        .unwrap();
    session.close().await.unwrap();
}
