// # Peer Registry Trait
//
// Recovery hooks into the membership registry the binder serves. An instance
// that lost (or never had) its stable address most likely also holds a stale
// membership view, so each unbound pass clears local registry state, resyncs
// from a peer, and reopens for traffic before trying to bind.

use async_trait::async_trait;
use tracing::info;

/// Membership registry recovery sequence
#[async_trait]
pub trait PeerRegistry: Send + Sync {
    /// Drop all locally held registrations
    async fn clear_registry(&self) -> Result<(), crate::Error>;

    /// Pull registrations from a peer node
    ///
    /// # Returns
    ///
    /// Number of registrations copied
    async fn sync_up(&self) -> Result<usize, crate::Error>;

    /// Start serving traffic again, expecting `count` registrations
    async fn open_for_traffic(&self, count: usize) -> Result<(), crate::Error>;
}

/// Registry that only logs the recovery sequence
///
/// For deployments where the binder runs beside a registry it cannot reach.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPeerRegistry;

#[async_trait]
impl PeerRegistry for NoopPeerRegistry {
    async fn clear_registry(&self) -> Result<(), crate::Error> {
        info!("Peer registry clear requested (no registry attached)");
        Ok(())
    }

    async fn sync_up(&self) -> Result<usize, crate::Error> {
        Ok(0)
    }

    async fn open_for_traffic(&self, count: usize) -> Result<(), crate::Error> {
        info!(count, "Peer registry open for traffic (no registry attached)");
        Ok(())
    }
}
