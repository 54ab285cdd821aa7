use crate::coordination::Coordinator;
use std::{sync::Arc, time::Duration};
use tokio::sync::OnceCell;

#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    #[error("timed out waiting for the allocation lock")]
    Timeout,
    #[error("coordination service error: {0}")]
    Coordination(#[source] anyhow::Error),
}

/// Hands out system-wide-unique sequence numbers by advancing a shared
/// counter node under a distributed mutual-exclusion lock.
///
/// Every instance of the service runs one of these against the same
/// coordinator, so the lock is the only thing standing between concurrent
/// allocations and duplicate codes.
pub struct SequenceAllocator {
    coordinator: Arc<dyn Coordinator>,
    counter_path: String,
    lock_name: String,
    /// Counter value the node is seeded with, and the value the counter is
    /// reset to if its contents ever become unparseable.
    start_value: u64,
    /// How far the counter advances per allocation. 1 hands out a single
    /// sequence per lock round-trip; larger steps reserve a whole block.
    step: u64,
    lock_timeout: Duration,
    init: OnceCell<()>,
}

impl SequenceAllocator {
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        counter_path: &str,
        start_value: u64,
        step: u64,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            counter_path: counter_path.to_owned(),
            lock_name: format!("{counter_path}/lock"),
            start_value,
            step,
            lock_timeout,
            init: OnceCell::new(),
        }
    }

    /// Allocate a fresh sequence number.
    ///
    /// Fails with [`AllocError::Timeout`] when the lock is not granted within
    /// the configured bound; the caller may retry the whole operation.
    pub async fn next_sequence(&self) -> Result<u64, AllocError> {
        self.ensure_counter().await?;

        let granted = self
            .coordinator
            .acquire_lock(&self.lock_name, self.lock_timeout)
            .await
            .map_err(AllocError::Coordination)?;
        if !granted {
            return Err(AllocError::Timeout);
        }

        let result = self.advance().await;

        // Release always runs, even when advancing failed. Its own failure
        // is logged rather than propagated: the coordinator's session expiry
        // reclaims the lock eventually.
        if let Err(e) = self.coordinator.release_lock(&self.lock_name).await {
            tracing::warn!(
                "failed to release allocation lock '{}': {e:#}",
                self.lock_name
            );
        }

        result
    }

    /// Seed the counter node on first use so a fresh deployment starts
    /// allocating from `start_value`.
    async fn ensure_counter(&self) -> Result<(), AllocError> {
        self.init
            .get_or_try_init(|| async {
                self.coordinator
                    .create_node_if_absent(
                        &self.counter_path,
                        self.start_value.to_string().into_bytes(),
                    )
                    .await
            })
            .await
            .map_err(AllocError::Coordination)?;
        Ok(())
    }

    /// Read-increment-write of the counter node. Caller must hold the lock.
    async fn advance(&self) -> Result<u64, AllocError> {
        let raw = self
            .coordinator
            .read_node(&self.counter_path)
            .await
            .map_err(AllocError::Coordination)?;

        let current = match std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            Some(value) => value,
            None => {
                // Lossy recovery: a corrupt counter restarts from the seed
                // value, which can reissue codes already handed out.
                tracing::error!(
                    "counter node '{}' holds unparseable data; resetting to {}",
                    self.counter_path,
                    self.start_value
                );
                self.start_value
            }
        };

        let next = current + self.step;
        self.coordinator
            .write_node(&self.counter_path, next.to_string().into_bytes())
            .await
            .map_err(AllocError::Coordination)?;

        Ok(next)
    }
}
