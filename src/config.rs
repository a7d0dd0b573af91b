/// 실행 설정 (CLI 플래그, 없으면 환경 변수, 없으면 기본값)
use crate::storage::layout::DEFAULT_ROOT;
use crate::storage::StoreOptions;
use clap::{Parser, ValueEnum};
use std::time::Duration;

/// 저장소 백엔드 선택 (시작 시 한 번 결정)
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// 단일 프로세스 인메모리 저장소
    Memory,
    /// 코디네이션 서비스 기반 분산 저장소
    Coordinated,
}

/// 경매 프론트엔드 서버 설정
#[derive(Debug, Clone, Parser)]
#[command(name = "auction-service")]
#[command(about = "Auction front-end backed by a coordination service")]
pub struct ServerConfig {
    /// HTTP 포트
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "AUCTION_BACKEND", value_enum, default_value_t = Backend::Memory)]
    pub backend: Backend,

    /// 코디네이터 주소
    #[arg(long, env = "COORDINATOR_URL", default_value = "http://127.0.0.1:2181")]
    pub coordinator: String,

    /// 네임스페이스 루트
    #[arg(long, env = "AUCTION_ROOT", default_value = DEFAULT_ROOT)]
    pub root: String,

    /// 입찰 잠금 대기 제한 (밀리초)
    #[arg(long, env = "LOCK_TIMEOUT_MS", default_value_t = 5000)]
    pub lock_timeout_ms: u64,
}

impl ServerConfig {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            root: self.root.clone(),
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
        }
    }
}

/// 코디네이터 서버 설정
#[derive(Debug, Clone, Parser)]
#[command(name = "auction-coordinator")]
#[command(about = "Coordination service holding the shared auction namespace")]
pub struct CoordinatorConfig {
    #[arg(long, env = "COORDINATOR_PORT", default_value_t = 2181)]
    pub port: u16,

    /// 하트비트가 끊긴 세션을 만료시키는 시간 (밀리초)
    #[arg(long, env = "SESSION_TIMEOUT_MS", default_value_t = 10_000)]
    pub session_timeout_ms: u64,
}

impl CoordinatorConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let config = ServerConfig::try_parse_from(["auction-service"]).unwrap();
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.root, "/auction-system");
        assert_eq!(
            config.store_options().lock_timeout,
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn coordinated_backend_flag() {
        let config = ServerConfig::try_parse_from([
            "auction-service",
            "--backend",
            "coordinated",
            "--coordinator",
            "http://zk:2181",
            "--port",
            "8081",
        ])
        .unwrap();
        assert_eq!(config.backend, Backend::Coordinated);
        assert_eq!(config.coordinator, "http://zk:2181");
        assert_eq!(config.port, 8081);
    }
}
