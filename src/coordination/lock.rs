/// 큐 기반 분산 상호 배제
/// 잠금 노드 아래에 임시-순차 자식을 만들고, 자신보다 작은 순번이 모두 사라지면
/// 소유권을 얻는다. 순번은 코디네이션 서비스가 부여하므로 모든 프론트엔드에 걸쳐 FIFO다.
// region:    --- Imports
use super::{join_path, sequence_of, CoordError, CoordResult, CoordinationClient, CreateMode};
use std::sync::Arc;
use tracing::{debug, warn};

// endregion: --- Imports

const LOCK_PREFIX: &str = "lock-";

// region:    --- Distributed Lock
pub struct DistributedLock {
    client: Arc<dyn CoordinationClient>,
    path: String,
}

impl DistributedLock {
    pub fn new(client: Arc<dyn CoordinationClient>, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// 잠금 획득 (바쁜 대기 없이 선행자의 삭제를 기다린다)
    /// 반환된 future를 중간에 버려도 대기열 항목은 가드가 정리한다
    pub async fn acquire(&self) -> CoordResult<LockGuard> {
        match self
            .client
            .create(&self.path, Vec::new(), CreateMode::Persistent)
            .await
        {
            Ok(_) | Err(CoordError::NodeExists(_)) => {}
            Err(e) => return Err(e),
        }

        let node = self
            .client
            .create(
                &join_path(&self.path, LOCK_PREFIX),
                Vec::new(),
                CreateMode::EphemeralSequential,
            )
            .await?;
        let guard = LockGuard {
            client: Arc::clone(&self.client),
            node: Some(node.clone()),
        };
        let my_sequence = node
            .rsplit('/')
            .next()
            .and_then(sequence_of)
            .ok_or_else(|| CoordError::InvalidPath(node.clone()))?;

        loop {
            let mut queue: Vec<(u64, String)> = self
                .client
                .children(&self.path)
                .await?
                .into_iter()
                .filter_map(|name| sequence_of(&name).map(|seq| (seq, name)))
                .collect();
            queue.sort();

            // 자신의 노드가 사라졌다면 세션이 만료된 것이다
            let Some(position) = queue.iter().position(|(seq, _)| *seq == my_sequence) else {
                return Err(CoordError::SessionExpired);
            };
            if position == 0 {
                debug!("{:<12} --> 잠금 획득: {}", "Lock", node);
                return Ok(guard);
            }

            let predecessor = join_path(&self.path, &queue[position - 1].1);
            debug!(
                "{:<12} --> 잠금 대기: {} (선행자 {})",
                "Lock", node, predecessor
            );
            self.client.wait_for_deletion(&predecessor).await?;
        }
    }
}
// endregion: --- Distributed Lock

// region:    --- Lock Guard
/// 잠금 소유권
/// `release`로 해제하고, 해제 없이 드롭되면 삭제를 백그라운드로 예약한다
pub struct LockGuard {
    client: Arc<dyn CoordinationClient>,
    node: Option<String>,
}

impl LockGuard {
    /// 대기열에 만든 잠금 노드 경로
    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub async fn release(mut self) -> CoordResult<()> {
        let Some(node) = self.node.take() else {
            return Ok(());
        };
        match self.client.delete(&node).await {
            Ok(()) | Err(CoordError::NoNode(_)) => {
                debug!("{:<12} --> 잠금 해제: {}", "Lock", node);
                Ok(())
            }
            Err(e) => {
                // 드롭 시 한 번 더 시도한다
                self.node = Some(node);
                Err(e)
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(node) = self.node.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                "{:<12} --> 런타임 없음, 세션 만료에 정리를 맡김: {}",
                "Lock", node
            );
            return;
        };
        let client = Arc::clone(&self.client);
        handle.spawn(async move {
            match client.delete(&node).await {
                Ok(()) | Err(CoordError::NoNode(_)) => {
                    debug!("{:<12} --> 잠금 노드 정리: {}", "Lock", node)
                }
                Err(e) => warn!(
                    "{:<12} --> 잠금 노드 정리 실패, 세션 만료에 맡김: {} ({})",
                    "Lock", node, e
                ),
            }
        });
    }
}
// endregion: --- Lock Guard
