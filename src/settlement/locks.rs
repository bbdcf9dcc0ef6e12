use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::errors::EngineError;

/// Per-market mutual exclusion for settlements and resolutions.
///
/// Markets never share a lock, so trades on different markets proceed in
/// parallel. Acquisition is bounded: a caller that cannot get the lock in
/// time receives `EngineError::Busy` instead of queueing indefinitely.
#[derive(Clone, Default)]
pub struct MarketLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl MarketLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for exclusive access to `market_id`.
    pub async fn acquire(
        &self,
        market_id: Uuid,
        timeout: Duration,
    ) -> Result<OwnedMutexGuard<()>, EngineError> {
        let lock = self
            .locks
            .entry(market_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(
                    market_id = %market_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Market lock acquisition timed out"
                );
                Err(EngineError::Busy(market_id))
            }
        }
    }
}
