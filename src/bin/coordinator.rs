// region:    --- Imports
use auction_ledger::config::CoordinatorConfig;
use auction_ledger::coordination::server::{self, CoordinatorState};
use auction_ledger::coordination::Namespace;
use clap::Parser;
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

    let config = CoordinatorConfig::parse();
    let namespace = Namespace::new();

    // 만료 세션 정리 작업
    let _reaper = server::spawn_session_reaper(namespace.clone(), config.session_timeout());

    let routes_all = server::router(CoordinatorState {
        namespace,
        session_timeout: config.session_timeout(),
    });

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(
        "{:<12} --> Coordinator: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
