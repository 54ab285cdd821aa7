use anyhow::Result;
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

// ── Collaborator interface ─────────────────────────────────────────────────

/// Distributed-coordination primitives consumed by the sequence allocator:
/// named mutual-exclusion locks plus small durable key/value nodes.
///
/// Implementations must release a holder's locks when its session dies, so a
/// crashed process can never wedge allocation forever.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Try to take the named lock, blocking up to `timeout`. Returns `false`
    /// if the lock was not granted within the bound.
    async fn acquire_lock(&self, name: &str, timeout: Duration) -> Result<bool>;

    /// Release the named lock. A no-op if it is not currently held.
    async fn release_lock(&self, name: &str) -> Result<()>;

    /// Read the contents of a node. Fails if the node does not exist.
    async fn read_node(&self, path: &str) -> Result<Vec<u8>>;

    /// Overwrite the contents of a node, creating it if needed.
    async fn write_node(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// Create a node with `initial` contents if and only if it does not
    /// already exist. Existing contents are left untouched.
    async fn create_node_if_absent(&self, path: &str, initial: Vec<u8>) -> Result<()>;
}

// ── In-process implementation ──────────────────────────────────────────────

/// Coordinator backed by process-local state.
///
/// Serves single-instance deployments and tests; a multi-instance deployment
/// swaps in a consensus-backed client behind the same trait. Lock holds carry
/// a session deadline: a holder that never releases (crashed task, lost
/// caller) is expired and the lock becomes grabbable again, mirroring the
/// session semantics the trait demands.
pub struct LocalCoordinator {
    nodes: DashMap<String, Vec<u8>>,
    /// name → instant the current hold's session expires.
    locks: DashMap<String, Instant>,
    session_ttl: Duration,
    released: Notify,
}

impl LocalCoordinator {
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            nodes: DashMap::new(),
            locks: DashMap::new(),
            session_ttl,
            released: Notify::new(),
        }
    }

    /// Attempt to take the lock right now. Succeeds on a free slot or an
    /// expired session.
    fn try_take(&self, name: &str) -> bool {
        let now = Instant::now();
        match self.locks.entry(name.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(now + self.session_ttl);
                true
            }
            Entry::Occupied(mut held) => {
                if *held.get() <= now {
                    held.insert(now + self.session_ttl);
                    true
                } else {
                    false
                }
            }
        }
    }
}

#[async_trait]
impl Coordinator for LocalCoordinator {
    async fn acquire_lock(&self, name: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_take(name) {
                return Ok(true);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }

            // Wake on release, or re-check periodically so expired sessions
            // are noticed even when nobody calls release.
            tokio::select! {
                _ = self.released.notified() => {}
                _ = tokio::time::sleep(remaining.min(Duration::from_millis(10))) => {}
            }
        }
    }

    async fn release_lock(&self, name: &str) -> Result<()> {
        self.locks.remove(name);
        self.released.notify_waiters();
        Ok(())
    }

    async fn read_node(&self, path: &str) -> Result<Vec<u8>> {
        self.nodes
            .get(path)
            .map(|data| data.clone())
            .ok_or_else(|| anyhow::anyhow!("node '{path}' does not exist"))
    }

    async fn write_node(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.nodes.insert(path.to_owned(), data);
        Ok(())
    }

    async fn create_node_if_absent(&self, path: &str, initial: Vec<u8>) -> Result<()> {
        self.nodes.entry(path.to_owned()).or_insert(initial);
        Ok(())
    }
}
