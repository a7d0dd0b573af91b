// region:    --- Imports
use auction_ledger::config::{Backend, ServerConfig};
use auction_ledger::coordination::{CoordinationClient, RemoteSession};
use auction_ledger::handlers::{self, SharedStore};
use auction_ledger::storage::{CoordinatedStore, MemoryStore};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let config = ServerConfig::parse();

    // 저장소 선택
    let store: SharedStore = match config.backend {
        Backend::Memory => {
            info!("{:<12} --> 단일 프로세스 인메모리 저장소 사용", "Main");
            Arc::new(MemoryStore::new())
        }
        Backend::Coordinated => {
            let session: Arc<dyn CoordinationClient> =
                match RemoteSession::connect(&config.coordinator).await {
                    Ok(session) => Arc::new(session),
                    Err(e) => {
                        error!("{:<12} --> 코디네이터 연결 실패: {}", "Main", e);
                        return Err(e.into());
                    }
                };
            let store = CoordinatedStore::connect(session, config.store_options()).await?;
            info!(
                "{:<12} --> 분산 저장소 사용: {} (root {})",
                "Main",
                config.coordinator,
                store.layout().root()
            );
            Arc::new(store)
        }
    };

    let routes_all = handlers::routes(store);

    // 리스너 생성
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
